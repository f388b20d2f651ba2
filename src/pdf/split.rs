//! Page-range extraction and document merging.

use super::{inherited_attr, load};
use crate::error::{Error, Result};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use std::collections::BTreeMap;

/// Keys a page may inherit from ancestor pages nodes. Pushed down onto
/// each page before restructuring so extraction and merging never lose
/// them.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Extract the given 1-indexed pages into a new PDF byte buffer.
///
/// Pages must be sorted, deduplicated, and within range (the
/// [`PageSelection::resolve`](crate::select::PageSelection::resolve)
/// contract).
pub fn extract_pages(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>> {
    let mut doc = load(bytes)?;
    let total = doc.get_pages().len() as u32;

    if pages.is_empty() {
        return Err(Error::InvalidPageRange("empty selection".into()));
    }
    if let Some(&last) = pages.last() {
        if last > total {
            return Err(Error::PageOutOfRange(last, total));
        }
    }

    push_down_inherited(&mut doc);

    let delete: Vec<u32> = (1..=total).filter(|p| !pages.contains(p)).collect();
    if !delete.is_empty() {
        doc.delete_pages(&delete);
    }

    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// Concatenate multiple PDF byte buffers into one document.
///
/// Page objects keep their content and resources; the catalogs and
/// pages trees of the inputs are replaced by a single new tree.
pub fn merge_documents(inputs: &[&[u8]]) -> Result<Vec<u8>> {
    if inputs.is_empty() {
        return Err(Error::EmptyDocument);
    }

    let mut max_id = 1u32;
    let mut page_order: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for bytes in inputs {
        let mut doc = load(bytes)?;
        push_down_inherited(&mut doc);

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, page_id) in doc.get_pages() {
            page_order.push(page_id);
        }
        objects.extend(doc.objects);
    }

    let mut merged = LopdfDocument::with_version("1.7");

    // The old catalogs and pages-tree nodes are rebuilt below; every
    // other object carries over untouched.
    for (id, obj) in objects {
        if is_dict_type(&obj, b"Catalog") || is_dict_type(&obj, b"Pages") {
            continue;
        }
        merged.objects.insert(id, obj);
    }

    let pages_id: ObjectId = (max_id, 0);
    let catalog_id: ObjectId = (max_id + 1, 0);

    for page_id in &page_order {
        if let Some(Object::Dictionary(dict)) = merged.objects.get_mut(page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    let kids: Vec<Object> = page_order
        .iter()
        .map(|id| Object::Reference(*id))
        .collect();
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(kids.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = catalog_id.0;

    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();

    let mut out = Vec::new();
    merged.save_to(&mut out)?;
    Ok(out)
}

/// Copy inheritable attributes from ancestor pages nodes onto each page
/// dictionary that lacks them.
fn push_down_inherited(doc: &mut LopdfDocument) {
    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    let mut updates: Vec<(ObjectId, &[u8], Object)> = Vec::new();
    for page_id in pages {
        let Ok(dict) = doc.get_dictionary(page_id) else {
            continue;
        };
        for key in INHERITABLE_KEYS {
            if dict.get(key).is_ok() {
                continue;
            }
            if let Some(value) = inherited_attr(doc, page_id, key) {
                updates.push((page_id, key, value.clone()));
            }
        }
    }

    for (page_id, key, value) in updates {
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set(key, value);
        }
    }
}

fn is_dict_type(obj: &Object, type_name: &[u8]) -> bool {
    match obj {
        Object::Dictionary(dict) => dict
            .get(b"Type")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| n == type_name)
            .unwrap_or(false),
        _ => false,
    }
}
