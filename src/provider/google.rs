//! Google Document AI adapter.
//!
//! Talks to the synchronous `:process` REST endpoint. Documents over
//! the endpoint's page or byte limits are sub-split and submitted as
//! multiple requests, with results renumbered back to the source
//! document's pages.

use super::{
    send_with_retry, subset_for_selection, Capability, OcrProvider, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_SECS,
};
use crate::error::{Error, Result};
use crate::model::{
    BlockLevel, BoundingPoly, Direction, Document, Geometry, NormBBox, OcrPageResult, Point,
    ProviderResult, TextBlock,
};
use crate::select::PageSelection;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const PROVIDER_NAME: &str = "google-documentai";

/// Synchronous processing limits documented for the `:process` endpoint.
const MAX_SYNC_PAGES: u32 = 15;
const MAX_SYNC_BYTES: usize = 20 * 1024 * 1024;

const CAPABILITIES: &[Capability] = &[Capability::TextExtraction, Capability::LayoutAnalysis];

/// Client for a Google Document AI processor.
#[derive(Debug, Clone)]
pub struct GoogleDocumentAiProvider {
    project_id: String,
    location: String,
    processor_id: String,
    access_token: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl GoogleDocumentAiProvider {
    pub fn new(
        project_id: impl Into<String>,
        processor_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            project_id: project_id.into(),
            location: "us".to_string(),
            processor_id: processor_id.into(),
            access_token: access_token.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Build a client taking the access token from the
    /// `OCRFLOW_GCP_ACCESS_TOKEN` environment variable.
    pub fn from_env(
        project_id: impl Into<String>,
        processor_id: impl Into<String>,
    ) -> Result<Self> {
        let token = std::env::var("OCRFLOW_GCP_ACCESS_TOKEN")
            .map_err(|_| Error::MissingCredentials("OCRFLOW_GCP_ACCESS_TOKEN".into()))?;
        Self::new(project_id, processor_id, token)
    }

    /// Processor location, `us` by default.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}-documentai.googleapis.com/v1/projects/{}/locations/{}/processors/{}:process",
            self.location, self.project_id, self.location, self.processor_id
        )
    }

    async fn process_chunk(&self, chunk: &Document) -> Result<GcpDocument> {
        let body = json!({
            "rawDocument": {
                "content": BASE64.encode(chunk.bytes()),
                "mimeType": "application/pdf",
            },
            "skipHumanReview": true,
        });

        let url = self.endpoint();
        let response = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.access_token)
                    .json(&body)
            },
            PROVIDER_NAME,
            self.max_retries,
        )
        .await?;

        let decoded: ProcessResponse = response.json().await?;
        decoded
            .document
            .ok_or_else(|| Error::Decode("process response missing document".into()))
    }
}

impl OcrProvider for GoogleDocumentAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    async fn process_document(
        &self,
        document: &Document,
        selection: &PageSelection,
    ) -> Result<ProviderResult> {
        let (subset, mapping) = subset_for_selection(document, selection)?;
        let chunks = subset.split_batches(MAX_SYNC_PAGES, Some(MAX_SYNC_BYTES))?;
        log::info!(
            "{PROVIDER_NAME}: processing '{}' ({} page(s)) in {} request(s)",
            document.name(),
            mapping.len(),
            chunks.len()
        );

        let mut decoded = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            decoded.push((self.process_chunk(chunk).await?, chunk.page_count()));
        }

        collect_chunk_results(&decoded, &mapping)
    }
}

/// Assemble per-chunk responses into one result keyed by absolute page
/// numbers of the source document.
///
/// Each entry pairs a decoded response with the page count that was
/// submitted for it; page `i` of a chunk maps to
/// `mapping[pages consumed so far + i]`.
fn collect_chunk_results(
    chunks: &[(GcpDocument, u32)],
    mapping: &[u32],
) -> Result<ProviderResult> {
    let mut result = ProviderResult::new(PROVIDER_NAME);
    let mut consumed = 0usize;

    for (document, submitted) in chunks {
        for (i, page) in document.pages.iter().enumerate() {
            let absolute = *mapping.get(consumed + i).ok_or_else(|| {
                Error::Decode("provider returned more pages than submitted".into())
            })?;
            result.insert(page_result(page, &document.text, absolute));
        }

        consumed += *submitted as usize;
    }

    Ok(result)
}

fn page_result(page: &GcpPage, full_text: &str, page_number: u32) -> OcrPageResult {
    let page_text = page
        .layout
        .as_ref()
        .map(|layout| text_from_layout(layout, full_text))
        .unwrap_or_default();

    let mut result = OcrPageResult::new(PROVIDER_NAME, page_number, page_text);
    result.words = convert_elements(&page.tokens, BlockLevel::Word, full_text);
    result.lines = convert_elements(&page.lines, BlockLevel::Line, full_text);

    result.blocks = convert_elements(&page.blocks, BlockLevel::Block, full_text);
    if result.blocks.is_empty() {
        result.blocks = convert_elements(&page.paragraphs, BlockLevel::Paragraph, full_text);
    }

    result
}

fn convert_elements(elements: &[GcpElement], level: BlockLevel, full_text: &str) -> Vec<TextBlock> {
    elements
        .iter()
        .filter_map(|element| element.layout.as_ref())
        .filter_map(|layout| text_block(layout, level, full_text))
        .collect()
}

fn text_block(layout: &GcpLayout, level: BlockLevel, full_text: &str) -> Option<TextBlock> {
    let geometry = geometry_from(layout.bounding_poly.as_ref())?;
    let mut block = TextBlock::new(text_from_layout(layout, full_text), level, geometry);

    if layout.confidence > 0.0 {
        block = block.with_confidence(layout.confidence);
    }
    if let Some(direction) = direction_from(layout.orientation.as_deref()) {
        block = block.with_direction(direction);
    }

    Some(block)
}

/// Resolve a layout's text anchor against the full document text.
///
/// Anchor indices are byte offsets; segments falling outside the text
/// or splitting a UTF-8 sequence are dropped rather than panicking.
fn text_from_layout(layout: &GcpLayout, full_text: &str) -> String {
    let Some(anchor) = &layout.text_anchor else {
        return String::new();
    };

    let mut out = String::new();
    for segment in &anchor.text_segments {
        let start = segment.start_index as usize;
        let end = segment.end_index as usize;
        if let Some(slice) = full_text.get(start..end) {
            out.push_str(slice);
        }
    }
    out
}

fn geometry_from(poly: Option<&GcpBoundingPoly>) -> Option<Geometry> {
    let vertices: Vec<Point> = poly?
        .normalized_vertices
        .iter()
        .map(|v| Point::new(v.x, v.y))
        .collect();

    if vertices.len() == 4 {
        let poly = BoundingPoly::new(vertices);
        let bbox = NormBBox::from_bounding_poly(&poly).ok()?;
        return Some(Geometry::with_poly(bbox, poly));
    }

    // Degenerate polygons fall back to the min/max envelope.
    let first = vertices.first()?;
    let mut bbox = NormBBox::new(first.x, first.y, first.x, first.y);
    for v in &vertices[1..] {
        bbox.x0 = bbox.x0.min(v.x);
        bbox.top = bbox.top.min(v.y);
        bbox.x1 = bbox.x1.max(v.x);
        bbox.bottom = bbox.bottom.max(v.y);
    }
    Some(Geometry::new(bbox))
}

fn direction_from(orientation: Option<&str>) -> Option<Direction> {
    match orientation? {
        "PAGE_UP" => Some(Direction::Up),
        "PAGE_RIGHT" => Some(Direction::Right),
        "PAGE_DOWN" => Some(Direction::Down),
        "PAGE_LEFT" => Some(Direction::Left),
        _ => None,
    }
}

// Wire format. Document AI serializes int64 fields as JSON strings and
// omits zero-valued fields entirely.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    document: Option<GcpDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GcpDocument {
    text: String,
    pages: Vec<GcpPage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GcpPage {
    layout: Option<GcpLayout>,
    tokens: Vec<GcpElement>,
    lines: Vec<GcpElement>,
    blocks: Vec<GcpElement>,
    paragraphs: Vec<GcpElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GcpElement {
    layout: Option<GcpLayout>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GcpLayout {
    text_anchor: Option<GcpTextAnchor>,
    bounding_poly: Option<GcpBoundingPoly>,
    confidence: f32,
    orientation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GcpTextAnchor {
    text_segments: Vec<GcpTextSegment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GcpTextSegment {
    #[serde(deserialize_with = "de_index")]
    start_index: u64,
    #[serde(deserialize_with = "de_index")]
    end_index: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GcpBoundingPoly {
    normalized_vertices: Vec<GcpVertex>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(default)]
struct GcpVertex {
    x: f32,
    y: f32,
}

/// Accept an index as a JSON number or a stringified int64.
fn de_index<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct IndexVisitor;

    impl serde::de::Visitor<'_> for IndexVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("an integer or integer string")
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<u64, E> {
            u64::try_from(v).map_err(E::custom)
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<u64, E> {
            v.parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(IndexVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"{
        "text": "Invoice 42\nTotal due\n",
        "pages": [{
            "layout": {
                "textAnchor": {"textSegments": [{"endIndex": "21"}]}
            },
            "tokens": [
                {
                    "layout": {
                        "textAnchor": {"textSegments": [{"endIndex": "8"}]},
                        "confidence": 0.99,
                        "orientation": "PAGE_UP",
                        "boundingPoly": {"normalizedVertices": [
                            {"x": 0.1, "y": 0.1},
                            {"x": 0.3, "y": 0.1},
                            {"x": 0.3, "y": 0.15},
                            {"x": 0.1, "y": 0.15}
                        ]}
                    }
                },
                {
                    "layout": {
                        "textAnchor": {"textSegments": [{"startIndex": "8", "endIndex": "10"}]},
                        "confidence": 0.97,
                        "boundingPoly": {"normalizedVertices": [
                            {"x": 0.35, "y": 0.1},
                            {"x": 0.4, "y": 0.1},
                            {"x": 0.4, "y": 0.15},
                            {"x": 0.35, "y": 0.15}
                        ]}
                    }
                }
            ],
            "lines": [{
                "layout": {
                    "textAnchor": {"textSegments": [{"endIndex": "11"}]},
                    "boundingPoly": {"normalizedVertices": [
                        {"x": 0.1, "y": 0.1},
                        {"x": 0.4, "y": 0.1},
                        {"x": 0.4, "y": 0.15},
                        {"x": 0.1, "y": 0.15}
                    ]}
                }
            }],
            "blocks": [{
                "layout": {
                    "textAnchor": {"textSegments": [{"endIndex": "21"}]},
                    "boundingPoly": {"normalizedVertices": [
                        {"x": 0.1, "y": 0.1},
                        {"x": 0.4, "y": 0.1},
                        {"x": 0.4, "y": 0.3},
                        {"x": 0.1, "y": 0.3}
                    ]}
                }
            }]
        }]
    }"#;

    #[test]
    fn test_decode_stringified_indices() {
        let doc: GcpDocument = serde_json::from_str(SAMPLE_PAGE).unwrap();
        let anchor = doc.pages[0]
            .tokens[1]
            .layout
            .as_ref()
            .unwrap()
            .text_anchor
            .as_ref()
            .unwrap();
        assert_eq!(anchor.text_segments[0].start_index, 8);
        assert_eq!(anchor.text_segments[0].end_index, 10);

        // Omitted startIndex means zero
        let first = doc.pages[0].tokens[0].layout.as_ref().unwrap();
        assert_eq!(
            first.text_anchor.as_ref().unwrap().text_segments[0].start_index,
            0
        );
    }

    #[test]
    fn test_page_result_conversion() {
        let doc: GcpDocument = serde_json::from_str(SAMPLE_PAGE).unwrap();
        let result = page_result(&doc.pages[0], &doc.text, 3);

        assert_eq!(result.page_number, 3);
        assert_eq!(result.provider_name, PROVIDER_NAME);
        assert_eq!(result.page_text, "Invoice 42\nTotal due\n");

        assert_eq!(result.words.len(), 2);
        assert_eq!(result.words[0].text, "Invoice ");
        assert_eq!(result.words[0].direction, Some(Direction::Up));
        assert_eq!(result.words[1].text, "42");
        assert_eq!(result.words[1].confidence, Some(0.97));

        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].text, "Invoice 42\n");

        assert_eq!(result.blocks.len(), 1);
        assert!(result.blocks[0].has_vertices());
        let bbox = result.blocks[0].bounding_box();
        assert!((bbox.x0 - 0.1).abs() < 1e-6);
        assert!((bbox.bottom - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_text_anchor_out_of_bounds_is_dropped() {
        let layout = GcpLayout {
            text_anchor: Some(GcpTextAnchor {
                text_segments: vec![GcpTextSegment {
                    start_index: 0,
                    end_index: 999,
                }],
            }),
            ..Default::default()
        };
        assert_eq!(text_from_layout(&layout, "short"), "");
    }

    #[test]
    fn test_geometry_fallback_for_degenerate_poly() {
        let poly = GcpBoundingPoly {
            normalized_vertices: vec![
                GcpVertex { x: 0.2, y: 0.5 },
                GcpVertex { x: 0.6, y: 0.1 },
                GcpVertex { x: 0.4, y: 0.9 },
            ],
        };
        let geometry = geometry_from(Some(&poly)).unwrap();
        assert!(geometry.bounding_poly.is_none());
        assert_eq!(geometry.bounding_box, NormBBox::new(0.2, 0.1, 0.6, 0.9));

        assert!(geometry_from(None).is_none());
    }

    #[test]
    fn test_direction_mapping() {
        assert_eq!(direction_from(Some("PAGE_UP")), Some(Direction::Up));
        assert_eq!(direction_from(Some("PAGE_RIGHT")), Some(Direction::Right));
        assert_eq!(direction_from(Some("PAGE_DOWN")), Some(Direction::Down));
        assert_eq!(direction_from(Some("PAGE_LEFT")), Some(Direction::Left));
        assert_eq!(direction_from(Some("ORIENTATION_UNSPECIFIED")), None);
        assert_eq!(direction_from(None), None);
    }

    /// A decoded response whose pages each cover one slice of the
    /// chunk's full text.
    fn chunk_with_pages(texts: &[&str]) -> GcpDocument {
        let mut full = String::new();
        let mut pages = Vec::new();
        for text in texts {
            let start = full.len() as u64;
            full.push_str(text);
            let end = full.len() as u64;
            pages.push(GcpPage {
                layout: Some(GcpLayout {
                    text_anchor: Some(GcpTextAnchor {
                        text_segments: vec![GcpTextSegment {
                            start_index: start,
                            end_index: end,
                        }],
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        GcpDocument { text: full, pages }
    }

    #[test]
    fn test_chunk_results_renumber_to_absolute_pages() {
        // Pages 2, 3, and 5 of the source document, split over two
        // requests of 2 and 1 pages.
        let chunks = vec![
            (chunk_with_pages(&["second\n", "third\n"]), 2),
            (chunk_with_pages(&["fifth\n"]), 1),
        ];
        let mapping = vec![2, 3, 5];

        let result = collect_chunk_results(&chunks, &mapping).unwrap();
        assert_eq!(
            result.pages.keys().copied().collect::<Vec<_>>(),
            vec![2, 3, 5]
        );
        assert_eq!(result.page(2).unwrap().page_text, "second\n");
        assert_eq!(result.page(3).unwrap().page_text, "third\n");
        assert_eq!(result.page(5).unwrap().page_text, "fifth\n");
    }

    #[test]
    fn test_chunk_results_reject_excess_pages() {
        let chunks = vec![(chunk_with_pages(&["a", "b"]), 2)];
        assert!(matches!(
            collect_chunk_results(&chunks, &[1]),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_endpoint_url() {
        let provider = GoogleDocumentAiProvider::new("proj", "proc-1", "token")
            .unwrap()
            .with_location("eu");
        assert_eq!(
            provider.endpoint(),
            "https://eu-documentai.googleapis.com/v1/projects/proj/locations/eu/processors/proc-1:process"
        );
    }
}
