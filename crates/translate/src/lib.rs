use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_ENDPOINT: &str = "https://translation.googleapis.com/v3";

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("translation response contained no translations")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, TranslateError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest<'a> {
    contents: Vec<&'a str>,
    mime_type: &'a str,
    source_language_code: &'a str,
    target_language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// Thin authenticated client for the Cloud Translation v3 REST API.
/// Retries, token refresh and quota handling are the service's and the
/// caller's concern; this only shapes requests and parses responses.
pub struct TranslationClient {
    http: reqwest::blocking::Client,
    project_id: String,
    access_token: String,
    endpoint: String,
}

impl TranslationClient {
    pub fn new<S: Into<String>>(project_id: S, access_token: S) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            project_id: project_id.into(),
            access_token: access_token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Overrides the API endpoint (tests, regional endpoints).
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Translates one plain-text string between the given BCP-47
    /// language codes (e.g. "en-US" to "zh").
    pub fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let url = format!(
            "{}/projects/{}/locations/global:translateText",
            self.endpoint, self.project_id
        );
        let request = TranslateRequest {
            contents: vec![text],
            mime_type: "text/plain",
            source_language_code: source,
            target_language_code: target,
        };

        log::debug!("translating {} chars {} -> {}", text.len(), source, target);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("translation request failed with status {}", status);
            return Err(TranslateError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let body: TranslateResponse = response.json()?;
        body.translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or(TranslateError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_api_field_names() {
        let request = TranslateRequest {
            contents: vec!["hello"],
            mime_type: "text/plain",
            source_language_code: "en-US",
            target_language_code: "zh",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0], "hello");
        assert_eq!(json["mimeType"], "text/plain");
        assert_eq!(json["sourceLanguageCode"], "en-US");
        assert_eq!(json["targetLanguageCode"], "zh");
    }

    #[test]
    fn response_parsing_extracts_translated_text() {
        let body = r#"{"translations":[{"translatedText":"你好","detectedLanguageCode":"en"}]}"#;
        let parsed: TranslateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.translations[0].translated_text, "你好");
    }

    #[test]
    fn missing_translations_field_parses_as_empty() {
        let parsed: TranslateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.translations.is_empty());
    }
}
