//! AI image editing: image + instruction in, new image out.
//!
//! A safety refusal comes back as a response with no inline image payload —
//! that is surfaced as `EditError::NoImage` rather than a transport failure.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbaImage;
use serde_json::{Value, json};
use std::time::Duration;

use crate::settings::EDIT_MODEL;

#[derive(Debug)]
pub enum EditError {
    Http(String),
    /// The model returned no image payload (e.g. a safety refusal).
    NoImage,
    Decode(String),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::Http(e) => write!(f, "image edit request failed: {e}"),
            EditError::NoImage => {
                write!(f, "the model returned no image (it may have refused the instruction)")
            }
            EditError::Decode(e) => write!(f, "could not decode edited image: {e}"),
        }
    }
}

pub struct EditClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl EditClient {
    pub fn new(api_key: String) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(120))
                .build(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key,
        }
    }

    /// Apply a free-text edit instruction to a JPEG image.
    pub fn edit(&self, image_jpeg: &[u8], instruction: &str) -> Result<RgbaImage, EditError> {
        let body = json!({
            "contents": {
                "parts": [
                    { "inlineData": { "mimeType": "image/jpeg", "data": BASE64.encode(image_jpeg) } },
                    { "text": instruction }
                ]
            },
            "generationConfig": { "responseModalities": ["IMAGE"] }
        });
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, EDIT_MODEL);
        let response = self
            .agent
            .post(&url)
            .set("x-goog-api-key", &self.api_key)
            .send_json(body)
            .map_err(|e| EditError::Http(e.to_string()))?;
        let value: Value = response.into_json().map_err(|e| EditError::Http(e.to_string()))?;
        let bytes = extract_image_bytes(&value)?;
        crate::io::decode_image(&bytes).map_err(EditError::Decode)
    }
}

/// Find the first inline-image part in a generateContent response and decode
/// its base64 payload.
pub fn extract_image_bytes(response: &Value) -> Result<Vec<u8>, EditError> {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or(EditError::NoImage)?;
    let data = parts
        .iter()
        .find_map(|p| p["inlineData"]["data"].as_str())
        .ok_or(EditError::NoImage)?;
    BASE64.decode(data).map_err(|e| EditError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn refusal_without_image_part_is_no_image() {
        let response = json!({
            "candidates": [ { "content": { "parts": [ { "text": "I cannot do that." } ] } } ]
        });
        assert!(matches!(extract_image_bytes(&response), Err(EditError::NoImage)));

        let empty = json!({ "candidates": [] });
        assert!(matches!(extract_image_bytes(&empty), Err(EditError::NoImage)));
    }

    #[test]
    fn inline_image_part_round_trips() {
        // Encode a tiny PNG, wrap it the way the API would
        let img = RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();
        let response = json!({
            "candidates": [ { "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(&png) } }
            ] } } ]
        });
        let bytes = extract_image_bytes(&response).unwrap();
        let decoded = crate::io::decode_image(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
    }

    #[test]
    fn corrupt_base64_is_a_decode_error() {
        let response = json!({
            "candidates": [ { "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "!!! not base64 !!!" } }
            ] } } ]
        });
        assert!(matches!(extract_image_bytes(&response), Err(EditError::Decode(_))));
    }
}
