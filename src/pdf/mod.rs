//! PDF structural access and page-range manipulation via lopdf.

mod split;

pub use split::{extract_pages, merge_documents};

use crate::error::{Error, Result};
use lopdf::{Document as LopdfDocument, Object, ObjectId};

/// Load a lopdf document from raw bytes.
pub(crate) fn load(bytes: &[u8]) -> Result<LopdfDocument> {
    Ok(LopdfDocument::load_mem(bytes)?)
}

/// Number of pages in a PDF byte buffer.
pub fn page_count(bytes: &[u8]) -> Result<u32> {
    let doc = load(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Page dimensions in points for a 1-indexed page.
///
/// The MediaBox may live on an ancestor pages node; missing entirely,
/// Letter size is assumed.
pub fn page_dimensions(bytes: &[u8], page_number: u32) -> Result<(f32, f32)> {
    let doc = load(bytes)?;
    let pages = doc.get_pages();
    let page_id = *pages
        .get(&page_number)
        .ok_or(Error::PageOutOfRange(page_number, pages.len() as u32))?;

    let media_box = match inherited_attr(&doc, page_id, b"MediaBox") {
        Some(obj) => media_box_dimensions(&doc, obj)?,
        None => (612.0, 792.0),
    };

    Ok(media_box)
}

fn media_box_dimensions(doc: &LopdfDocument, obj: &Object) -> Result<(f32, f32)> {
    let arr = resolve(doc, obj)
        .as_array()
        .map_err(|_| Error::PdfParse("MediaBox is not an array".into()))?;

    if arr.len() != 4 {
        return Err(Error::PdfParse("MediaBox must have 4 entries".into()));
    }

    let coords: Vec<f32> = arr.iter().filter_map(number).collect();
    if coords.len() != 4 {
        return Err(Error::PdfParse("MediaBox entries must be numbers".into()));
    }

    Ok(((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs()))
}

/// Look up an attribute on a page dictionary, walking Parent links for
/// inheritable keys.
pub(crate) fn inherited_attr<'a>(
    doc: &'a LopdfDocument,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_id;
    // Parent chains are short; the bound guards against cycles.
    for _ in 0..64 {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(obj) = dict.get(key) {
            return Some(obj);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

/// Follow a reference to its target object, or return the object itself.
pub(crate) fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Numeric value of an integer or real object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
