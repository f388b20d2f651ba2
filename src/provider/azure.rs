//! Azure Document Intelligence adapter.
//!
//! Uses the asynchronous analyze flow of the `prebuilt-read` model:
//! submit the document, then poll the returned operation URL until the
//! analysis settles. Azure reports geometry in page units (inches or
//! pixels), so polygons are normalized against the page size here.

use super::{
    send_with_retry, Capability, OcrProvider, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS,
};
use crate::error::{Error, Result};
use crate::model::{
    BlockLevel, BoundingPoly, Document, Geometry, NormBBox, OcrPageResult, Point, ProviderResult,
    TextBlock,
};
use crate::select::PageSelection;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const PROVIDER_NAME: &str = "azure-document-intelligence";
const API_VERSION: &str = "2023-07-31";
const DEFAULT_MODEL_ID: &str = "prebuilt-read";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

const CAPABILITIES: &[Capability] = &[Capability::TextExtraction, Capability::LayoutAnalysis];

/// Client for an Azure Document Intelligence resource.
#[derive(Debug, Clone)]
pub struct AzureDocumentIntelligenceProvider {
    endpoint: String,
    api_key: String,
    model_id: String,
    client: reqwest::Client,
    max_retries: u32,
    poll_interval: Duration,
    max_polls: u32,
}

impl AzureDocumentIntelligenceProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: Duration::from_secs(2),
            max_polls: 60,
        })
    }

    /// Build a client from the `OCRFLOW_AZURE_ENDPOINT` and
    /// `OCRFLOW_AZURE_KEY` environment variables.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("OCRFLOW_AZURE_ENDPOINT")
            .map_err(|_| Error::MissingCredentials("OCRFLOW_AZURE_ENDPOINT".into()))?;
        let key = std::env::var("OCRFLOW_AZURE_KEY")
            .map_err(|_| Error::MissingCredentials("OCRFLOW_AZURE_KEY".into()))?;
        Self::new(endpoint, key)
    }

    /// Analysis model, `prebuilt-read` by default.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, API_VERSION
        )
    }

    async fn poll_operation(&self, operation_url: &str) -> Result<AnalyzeResult> {
        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let response = send_with_retry(
                || self.client.get(operation_url).header(KEY_HEADER, &self.api_key),
                PROVIDER_NAME,
                self.max_retries,
            )
            .await?;

            let operation: AnalyzeOperation = response.json().await?;
            match operation.status.as_str() {
                "succeeded" => {
                    return operation.analyze_result.ok_or_else(|| {
                        Error::Decode("succeeded operation missing analyzeResult".into())
                    })
                }
                "failed" => {
                    let message = operation
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "analysis failed".to_string());
                    return Err(Error::Provider {
                        provider: PROVIDER_NAME.to_string(),
                        message,
                    });
                }
                status => {
                    log::debug!("{PROVIDER_NAME}: poll {attempt}: status {status}");
                }
            }
        }

        Err(Error::Provider {
            provider: PROVIDER_NAME.to_string(),
            message: "operation did not complete before the poll limit".to_string(),
        })
    }
}

impl OcrProvider for AzureDocumentIntelligenceProvider {
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
        let resolved = selection.resolve(document.page_count())?;

        // The analyze endpoint takes the page subset as a query
        // parameter and numbers results against the full document, so
        // no sub-splitting is needed.
        let pages_param = if resolved.len() == document.page_count() as usize {
            None
        } else {
            Some(
                resolved
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            )
        };

        log::info!(
            "{PROVIDER_NAME}: analyzing '{}' ({} page(s)) with model {}",
            document.name(),
            resolved.len(),
            self.model_id
        );

        let body = json!({ "base64Source": BASE64.encode(document.bytes()) });
        let url = self.analyze_url();

        let response = send_with_retry(
            || {
                let mut request = self
                    .client
                    .post(&url)
                    .header(KEY_HEADER, &self.api_key)
                    .json(&body);
                if let Some(pages) = &pages_param {
                    request = request.query(&[("pages", pages)]);
                }
                request
            },
            PROVIDER_NAME,
            self.max_retries,
        )
        .await?;

        let operation_url = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Decode("analyze response missing operation-location".into()))?;

        let analysis = self.poll_operation(&operation_url).await?;

        let mut result = ProviderResult::new(PROVIDER_NAME);
        for page in &analysis.pages {
            result.insert(page_result(page, &analysis.paragraphs));
        }
        Ok(result)
    }
}

fn page_result(page: &AzurePage, paragraphs: &[AzureParagraph]) -> OcrPageResult {
    // Guard against a degenerate page size so normalization never
    // divides by zero.
    let width = if page.width > 0.0 { page.width } else { 1.0 };
    let height = if page.height > 0.0 { page.height } else { 1.0 };

    let page_text = page
        .lines
        .iter()
        .map(|line| line.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut result = OcrPageResult::new(PROVIDER_NAME, page.page_number, page_text);

    result.words = page
        .words
        .iter()
        .filter_map(|word| {
            let geometry = polygon_geometry(&word.polygon, width, height)?;
            Some(
                TextBlock::new(word.content.clone(), BlockLevel::Word, geometry)
                    .with_confidence(word.confidence),
            )
        })
        .collect();

    result.lines = page
        .lines
        .iter()
        .filter_map(|line| {
            let geometry = polygon_geometry(&line.polygon, width, height)?;
            Some(TextBlock::new(line.content.clone(), BlockLevel::Line, geometry))
        })
        .collect();

    result.blocks = paragraphs
        .iter()
        .filter_map(|paragraph| {
            let region = paragraph
                .bounding_regions
                .iter()
                .find(|r| r.page_number == page.page_number)?;
            let geometry = polygon_geometry(&region.polygon, width, height)?;
            Some(TextBlock::new(
                paragraph.content.clone(),
                BlockLevel::Paragraph,
                geometry,
            ))
        })
        .collect();

    result
}

/// Normalize a flat `[x1, y1, x2, y2, ...]` polygon against the page
/// size. Quadrilaterals keep their polygon; anything else collapses to
/// the min/max envelope.
fn polygon_geometry(polygon: &[f32], width: f32, height: f32) -> Option<Geometry> {
    if polygon.len() < 6 || polygon.len() % 2 != 0 {
        return None;
    }

    let points: Vec<Point> = polygon
        .chunks_exact(2)
        .map(|pair| Point::new(pair[0] / width, pair[1] / height))
        .collect();

    if points.len() == 4 {
        let poly = BoundingPoly::new(points);
        let bbox = NormBBox::from_bounding_poly(&poly).ok()?;
        return Some(Geometry::with_poly(bbox, poly));
    }

    let first = points[0];
    let mut bbox = NormBBox::new(first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        bbox.x0 = bbox.x0.min(p.x);
        bbox.top = bbox.top.min(p.y);
        bbox.x1 = bbox.x1.max(p.x);
        bbox.bottom = bbox.bottom.max(p.y);
    }
    Some(Geometry::new(bbox))
}

// Wire format for the v3 analyze flow.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<AzureError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnalyzeResult {
    pages: Vec<AzurePage>,
    paragraphs: Vec<AzureParagraph>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AzurePage {
    page_number: u32,
    width: f32,
    height: f32,
    words: Vec<AzureWord>,
    lines: Vec<AzureLine>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AzureWord {
    content: String,
    polygon: Vec<f32>,
    confidence: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AzureLine {
    content: String,
    polygon: Vec<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AzureParagraph {
    content: String,
    bounding_regions: Vec<AzureBoundingRegion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AzureBoundingRegion {
    page_number: u32,
    polygon: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureError {
    #[serde(default)]
    message: String,
}
