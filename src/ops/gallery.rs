//! Gallery backend client: upload a finished meme, list recent ones.
//!
//! A single upload call has no durability guarantee, so the caller-facing
//! entry point is `upload_with_retry`: a bounded number of attempts with a
//! fixed delay, reporting each attempt for progress display.  Exhausting the
//! retries yields an `UploadError` carrying the attempt count and the last
//! failure — the artifact itself is the caller's to keep.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read as _;
use std::time::Duration;

pub const MAX_UPLOAD_RETRIES: u32 = 5;
pub const RETRY_DELAY: Duration = Duration::from_millis(1500);

/// How many recent creations the gallery strip shows.
pub const RECENT_LIMIT: usize = 5;

/// A finalized meme as the backend stores it.  `image_url` is a base64 data
/// URL on upload and a durable HTTP URL once persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meme {
    pub id: String,
    pub image_url: String,
    pub wallet_address: String,
    pub tx_signature: String,
    pub creator_name: String,
    /// Unix timestamp, seconds.
    pub created_at: u64,
    /// Fee paid, in SOL.
    pub fee_amount: f64,
}

#[derive(Debug)]
pub struct UploadError {
    pub attempts: u32,
    pub detail: String,
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upload failed after {} attempts: {}", self.attempts, self.detail)
    }
}

/// Wrap flattened JPEG bytes as the data URL the backend expects.
pub fn jpeg_data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg))
}

/// Fetch raw bytes from a URL (template images, gallery thumbnails).
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>, String> {
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(30))
        .build();
    let response = agent.get(url).call().map_err(|e| format!("could not fetch {url}: {e}"))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| format!("could not read body of {url}: {e}"))?;
    Ok(bytes)
}

pub struct GalleryClient {
    agent: ureq::Agent,
    base_url: String,
}

impl GalleryClient {
    pub fn new(base_url: String) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            base_url,
        }
    }

    /// Fetch all persisted memes.  The backend must return a JSON array;
    /// anything else is an error (never a partial/implicit default).
    pub fn list(&self) -> Result<Vec<Meme>, String> {
        let response = self
            .agent
            .get(&format!("{}/api/memes", self.base_url))
            .call()
            .map_err(|e| format!("could not fetch meme list: {e}"))?;
        response
            .into_json::<Vec<Meme>>()
            .map_err(|e| format!("server returned an invalid meme list: {e}"))
    }

    /// One upload attempt.  Returns the durable image URL on success.
    pub fn upload(&self, meme: &Meme) -> Result<String, String> {
        let response = self
            .agent
            .post(&format!("{}/api/upload", self.base_url))
            .send_json(serde_json::to_value(meme).map_err(|e| e.to_string())?)
            .map_err(|e| format!("backend upload failed: {e}"))?;
        let value: Value = response
            .into_json()
            .map_err(|e| format!("invalid upload response: {e}"))?;
        value["imageUrl"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "upload response missing imageUrl".to_string())
    }

    /// Upload with bounded retry and a fixed delay between attempts.
    /// `progress` is called with the attempt number (1-based) before each try.
    pub fn upload_with_retry(
        &self,
        meme: &Meme,
        progress: &mut dyn FnMut(u32),
    ) -> Result<String, UploadError> {
        retry(MAX_UPLOAD_RETRIES, RETRY_DELAY, progress, |_| self.upload(meme))
    }
}

/// Bounded-retry driver, separated from HTTP so the policy is testable.
fn retry<T>(
    attempts: u32,
    delay: Duration,
    progress: &mut dyn FnMut(u32),
    mut op: impl FnMut(u32) -> Result<T, String>,
) -> Result<T, UploadError> {
    let mut last = String::new();
    for attempt in 1..=attempts {
        progress(attempt);
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                crate::log_warn!("upload attempt {attempt}/{attempts} failed: {e}");
                last = e;
                if attempt < attempts {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(UploadError { attempts, detail: last })
}
