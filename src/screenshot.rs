use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::storage::{KeyValueStore, SCREENSHOTS_KEY, get_json, set_json};
use crate::url_utils::{CanonicalUrl, normalize};

/// Message sent across the privileged boundary to ask for a tab capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CaptureRequest {
    CaptureScreenshot { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureResponse {
    pub fn captured(data_url: String) -> Self {
        Self {
            success: true,
            data_url: Some(data_url),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data_url: None,
            error: Some(error.into()),
        }
    }

    /// Collapses the wire shape into a single-reason result.
    pub fn into_result(self) -> Result<String, String> {
        match (self.success, self.data_url) {
            (true, Some(data_url)) => Ok(data_url),
            (true, None) => Err("capture succeeded without image data".to_string()),
            (false, _) => Err(self.error.unwrap_or_else(|| "Unknown error".to_string())),
        }
    }
}

#[async_trait]
pub trait CaptureService: Send + Sync {
    async fn capture(&self, request: CaptureRequest) -> CaptureResponse;
}

/// Serves captures from an image file on disk.
#[derive(Debug, Clone)]
pub struct FileCapture {
    image_path: PathBuf,
}

impl FileCapture {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
        }
    }

    async fn read_data_url(&self) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(&self.image_path)
            .await
            .with_context(|| format!("read image: {}", self.image_path.display()))?;
        let mime = mime_for_path(&self.image_path)
            .ok_or_else(|| anyhow::anyhow!("unsupported image: {}", self.image_path.display()))?;
        Ok(image_data_url(mime, &bytes))
    }
}

#[async_trait]
impl CaptureService for FileCapture {
    async fn capture(&self, request: CaptureRequest) -> CaptureResponse {
        let CaptureRequest::CaptureScreenshot { url } = request;
        match self.read_data_url().await {
            Ok(data_url) => CaptureResponse::captured(data_url),
            Err(err) => {
                tracing::debug!(%url, ?err, "file capture failed");
                CaptureResponse::failed(format!("{err:#}"))
            }
        }
    }
}

fn mime_for_path(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn image_data_url(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRecord {
    pub data_url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotData {
    #[serde(default)]
    screenshots_by_url: HashMap<CanonicalUrl, ScreenshotRecord>,
}

/// Captured screenshots keyed by canonical URL, pruned independently of
/// the visit ledger.
pub struct ScreenshotLedger {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl ScreenshotLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn save(&self, url: &CanonicalUrl, record: ScreenshotRecord) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        data.screenshots_by_url.insert(url.clone(), record);
        self.store_data(&data).await
    }

    pub async fn get(&self, url: &CanonicalUrl) -> anyhow::Result<Option<ScreenshotRecord>> {
        Ok(self.load().await?.screenshots_by_url.remove(url))
    }

    pub async fn get_all(&self) -> anyhow::Result<HashMap<CanonicalUrl, ScreenshotRecord>> {
        Ok(self.load().await?.screenshots_by_url)
    }

    pub async fn prune(&self, max_age: Duration) -> anyhow::Result<usize> {
        self.prune_at(max_age, Utc::now()).await
    }

    pub async fn prune_at(&self, max_age: Duration, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        let cutoff = crate::visits::cutoff(now, max_age)?;

        let before = data.screenshots_by_url.len();
        data.screenshots_by_url
            .retain(|_, record| record.captured_at >= cutoff);
        let removed = before - data.screenshots_by_url.len();

        self.store_data(&data).await?;
        tracing::debug!(removed, "pruned screenshot ledger");
        Ok(removed)
    }

    async fn load(&self) -> anyhow::Result<ScreenshotData> {
        let data = get_json::<ScreenshotData>(self.store.as_ref(), SCREENSHOTS_KEY)
            .await
            .context("load screenshot ledger")?;
        Ok(data.unwrap_or_default())
    }

    async fn store_data(&self, data: &ScreenshotData) -> anyhow::Result<()> {
        set_json(self.store.as_ref(), SCREENSHOTS_KEY, data)
            .await
            .context("save screenshot ledger")
    }
}

/// Captures the current page once it has settled and files the image under
/// the page's canonical URL.
pub struct ScreenshotPipeline {
    ledger: Arc<ScreenshotLedger>,
    capture: Arc<dyn CaptureService>,
    settle_delay: Duration,
}

impl ScreenshotPipeline {
    pub fn new(
        ledger: Arc<ScreenshotLedger>,
        capture: Arc<dyn CaptureService>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            ledger,
            capture,
            settle_delay,
        }
    }

    /// Call once the page's load event fired. Failures are logged, never
    /// returned: a missing screenshot only means cards fall back to a
    /// gradient.
    pub async fn capture_after_load(&self, page_url: &str) -> Option<CanonicalUrl> {
        tokio::time::sleep(self.settle_delay).await;

        let url = normalize(page_url);
        let request = CaptureRequest::CaptureScreenshot {
            url: url.to_string(),
        };
        let data_url = match self.capture.capture(request).await.into_result() {
            Ok(data_url) => data_url,
            Err(reason) => {
                tracing::warn!(%url, %reason, "screenshot capture failed");
                return None;
            }
        };

        let record = ScreenshotRecord {
            data_url,
            captured_at: Utc::now(),
        };
        if let Err(err) = self.ledger.save(&url, record).await {
            tracing::warn!(%url, ?err, "failed to persist screenshot");
            return None;
        }

        tracing::debug!(%url, "screenshot captured");
        Some(url)
    }
}

/// Two-hue diagonal gradient used as a card background when no screenshot
/// exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gradient {
    pub hue_start: u32,
    pub hue_end: u32,
}

impl Gradient {
    pub fn to_css(&self) -> String {
        format!(
            "linear-gradient(135deg, hsl({}, 70%, 60%) 0%, hsl({}, 70%, 45%) 100%)",
            self.hue_start, self.hue_end
        )
    }
}

pub fn gradient_for(url: &str) -> Gradient {
    let hash = url_hash(url);
    Gradient {
        hue_start: hash % 360,
        hue_end: (hash + 40) % 360,
    }
}

/// 31-multiplier string hash over UTF-16 code units with 32-bit wrapping,
/// folded to its absolute value.
fn url_hash(url: &str) -> u32 {
    let hash = url
        .encode_utf16()
        .fold(0i32, |acc, unit| {
            acc.wrapping_shl(5)
                .wrapping_sub(acc)
                .wrapping_add(i32::from(unit))
        });
    hash.unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    struct FixedCapture(CaptureResponse);

    #[async_trait]
    impl CaptureService for FixedCapture {
        async fn capture(&self, _request: CaptureRequest) -> CaptureResponse {
            self.0.clone()
        }
    }

    fn pipeline(response: CaptureResponse) -> (Arc<ScreenshotLedger>, ScreenshotPipeline) {
        let ledger = Arc::new(ScreenshotLedger::new(Arc::new(MemoryStore::new())));
        let pipeline = ScreenshotPipeline::new(
            Arc::clone(&ledger),
            Arc::new(FixedCapture(response)),
            Duration::from_millis(1000),
        );
        (ledger, pipeline)
    }

    #[test]
    fn capture_messages_match_wire_shape() {
        let request = CaptureRequest::CaptureScreenshot {
            url: "https://a.test/".into(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"type": "capture-screenshot", "url": "https://a.test/"})
        );

        let response: CaptureResponse =
            serde_json::from_value(serde_json::json!({"success": false, "error": "No tab ID provided"}))
                .unwrap();
        assert_eq!(response.into_result(), Err("No tab ID provided".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_capture_is_persisted_under_canonical_url() {
        let (ledger, pipeline) = pipeline(CaptureResponse::captured("data:image/jpeg;base64,AA==".into()));

        let started = tokio::time::Instant::now();
        let url = pipeline
            .capture_after_load("https://a.test/page?utm_source=x#top")
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(url.as_str(), "https://a.test/page");

        let record = ledger.get(&url).await.unwrap().unwrap();
        assert_eq!(record.data_url, "data:image/jpeg;base64,AA==");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_capture_is_skipped() {
        let (ledger, pipeline) = pipeline(CaptureResponse::failed("tab gone"));
        assert!(pipeline.capture_after_load("https://a.test/").await.is_none());
        assert!(ledger.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_capture_encodes_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let response = FileCapture::new(&path)
            .capture(CaptureRequest::CaptureScreenshot {
                url: "https://a.test/".into(),
            })
            .await;
        assert_eq!(response.into_result(), Ok("data:image/png;base64,AQID".to_string()));

        let missing = FileCapture::new(dir.path().join("missing.png"))
            .capture(CaptureRequest::CaptureScreenshot {
                url: "https://a.test/".into(),
            })
            .await;
        assert!(!missing.success);
        assert!(missing.error.unwrap().contains("read image"));
    }

    #[tokio::test]
    async fn prune_drops_old_screenshots() {
        let ledger = ScreenshotLedger::new(Arc::new(MemoryStore::new()));
        let old = normalize("https://old.test/");
        let fresh = normalize("https://fresh.test/");
        let at = |ms| DateTime::from_timestamp_millis(ms).unwrap();
        for (url, ms) in [(&old, 0), (&fresh, 50_000)] {
            ledger
                .save(
                    url,
                    ScreenshotRecord {
                        data_url: "data:,".into(),
                        captured_at: at(ms),
                    },
                )
                .await
                .unwrap();
        }

        let removed = ledger
            .prune_at(Duration::from_secs(10), at(55_000))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(ledger.get(&fresh).await.unwrap().is_some());
    }

    #[test]
    fn gradient_is_deterministic_and_offset_by_forty() {
        let a = gradient_for("https://a.test/page");
        assert_eq!(a, gradient_for("https://a.test/page"));
        assert_eq!(a.hue_end, (a.hue_start + 40) % 360);
        assert!(a.hue_start < 360);
        assert!(a.to_css().starts_with("linear-gradient(135deg"));
    }

    #[test]
    fn hash_matches_known_values() {
        assert_eq!(url_hash(""), 0);
        assert_eq!(url_hash("a"), 97);
        assert_eq!(url_hash("ab"), 97 * 31 + 98);
    }
}
