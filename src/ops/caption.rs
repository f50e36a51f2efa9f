//! Caption generation and translation via the Gemini REST API.
//!
//! The service is asked for strict JSON (`responseMimeType` +
//! `responseSchema`), but the reply still arrives as model-produced text, so
//! parsing is defensive: anything that does not match the expected shape
//! becomes a `GenerationError` with the parse detail attached.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use std::time::Duration;

use crate::settings::CAPTION_MODEL;

/// Languages offered for caption translation (code, display name).
/// "en" short-circuits back to the original captions without a network call.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("tr", "Turkish"),
    ("ru", "Russian"),
    ("de", "German"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("uk", "Ukrainian"),
    ("ar", "Arabic"),
];

/// At most this many captions are kept from a generation response.
pub const MAX_CAPTIONS: usize = 5;

#[derive(Debug)]
pub enum GenerationError {
    Http(String),
    /// The upstream response could not be parsed into the expected shape.
    Parse(String),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Http(e) => write!(f, "caption service request failed: {e}"),
            GenerationError::Parse(e) => write!(f, "could not parse caption response: {e}"),
        }
    }
}

pub struct CaptionClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl CaptionClient {
    pub fn new(api_key: String) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key,
        }
    }

    /// Generate up to [`MAX_CAPTIONS`] witty captions for a JPEG image.
    pub fn generate(&self, image_jpeg: &[u8]) -> Result<Vec<String>, GenerationError> {
        let body = json!({
            "contents": {
                "parts": [
                    { "text": "Analyze this image and generate exactly 5 witty, funny, and \
                               contextually relevant captions suitable for a meme. The captions \
                               should be short and punchy. Return the result as a JSON object \
                               with a single key 'captions' which is an array of 5 strings." },
                    { "inlineData": { "mimeType": "image/jpeg", "data": BASE64.encode(image_jpeg) } }
                ]
            },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": { "captions": { "type": "ARRAY", "items": { "type": "STRING" } } }
                }
            }
        });
        let text = self.request(CAPTION_MODEL, body)?;
        parse_captions(&text)
    }

    /// Translate captions, preserving count and order.
    pub fn translate(
        &self,
        captions: &[String],
        language_name: &str,
    ) -> Result<Vec<String>, GenerationError> {
        let prompt = format!(
            "Translate the following JSON array of English captions into {language_name}. \
             Maintain the tone and humor of the original captions. Return the result as a JSON \
             object with a single key \"translated_captions\" which is an array of the translated \
             strings, in the same order as the input.\nInput captions: {}",
            serde_json::to_string(captions).unwrap_or_default()
        );
        let body = json!({
            "contents": { "parts": [ { "text": prompt } ] },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "translated_captions": { "type": "ARRAY", "items": { "type": "STRING" } }
                    }
                }
            }
        });
        let text = self.request(CAPTION_MODEL, body)?;
        parse_translations(&text, captions.len())
    }

    /// POST a generateContent request and return the first candidate's text.
    fn request(&self, model: &str, body: Value) -> Result<String, GenerationError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let response = self
            .agent
            .post(&url)
            .set("x-goog-api-key", &self.api_key)
            .send_json(body)
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        let value: Value = response
            .into_json()
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        candidate_text(&value)
    }
}

/// Pull the first candidate's text part out of a generateContent response.
pub(crate) fn candidate_text(response: &Value) -> Result<String, GenerationError> {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .and_then(|parts| parts.iter().find_map(|p| p["text"].as_str()))
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Parse("response has no text candidate".to_string()))
}

/// Parse `{"captions": [...]}` from model output, capped at [`MAX_CAPTIONS`].
pub fn parse_captions(text: &str) -> Result<Vec<String>, GenerationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| GenerationError::Parse(e.to_string()))?;
    let captions = value["captions"]
        .as_array()
        .ok_or_else(|| GenerationError::Parse("missing 'captions' array".to_string()))?;
    let mut out = string_array(captions)
        .ok_or_else(|| GenerationError::Parse("'captions' is not an array of strings".to_string()))?;
    out.truncate(MAX_CAPTIONS);
    Ok(out)
}

/// Parse `{"translated_captions": [...]}`; the list must be the same length
/// as the input so captions stay aligned with their originals.
pub fn parse_translations(text: &str, expected_len: usize) -> Result<Vec<String>, GenerationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| GenerationError::Parse(e.to_string()))?;
    let translated = value["translated_captions"]
        .as_array()
        .ok_or_else(|| GenerationError::Parse("missing 'translated_captions' array".to_string()))?;
    let out = string_array(translated).ok_or_else(|| {
        GenerationError::Parse("'translated_captions' is not an array of strings".to_string())
    })?;
    if out.len() != expected_len {
        return Err(GenerationError::Parse(format!(
            "expected {} translations, got {}",
            expected_len,
            out.len()
        )));
    }
    Ok(out)
}

fn string_array(values: &[Value]) -> Option<Vec<String>> {
    values.iter().map(|v| v.as_str().map(str::to_string)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_captions_happy_path() {
        let out = parse_captions(r#"{"captions": ["a", "b", "c"]}"#).unwrap();
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_captions_truncates_to_five() {
        let out = parse_captions(r#"{"captions": ["1","2","3","4","5","6","7"]}"#).unwrap();
        assert_eq!(out.len(), MAX_CAPTIONS);
        assert_eq!(out[4], "5");
    }

    #[test]
    fn invalid_json_reports_parse_detail() {
        let err = parse_captions("invalid json").unwrap_err();
        match err {
            GenerationError::Parse(detail) => assert!(!detail.is_empty()),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        assert!(matches!(
            parse_captions(r#"{"something_else": 1}"#),
            Err(GenerationError::Parse(_))
        ));
        assert!(matches!(
            parse_captions(r#"{"captions": "not an array"}"#),
            Err(GenerationError::Parse(_))
        ));
        assert!(matches!(
            parse_captions(r#"{"captions": [1, 2, 3]}"#),
            Err(GenerationError::Parse(_))
        ));
        // An empty array is the expected shape, just with nothing in it
        assert_eq!(parse_captions(r#"{"captions": []}"#).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn translations_preserve_order_and_length() {
        let out = parse_translations(r#"{"translated_captions": ["x", "y"]}"#, 2).unwrap();
        assert_eq!(out, vec!["x", "y"]);
    }

    #[test]
    fn translation_length_mismatch_is_rejected() {
        assert!(matches!(
            parse_translations(r#"{"translated_captions": ["only one"]}"#, 3),
            Err(GenerationError::Parse(_))
        ));
    }

    #[test]
    fn candidate_text_extraction() {
        let response = serde_json::json!({
            "candidates": [ { "content": { "parts": [ { "text": "{\"captions\": []}" } ] } } ]
        });
        assert_eq!(candidate_text(&response).unwrap(), "{\"captions\": []}");

        let empty = serde_json::json!({ "candidates": [] });
        assert!(candidate_text(&empty).is_err());
    }
}
