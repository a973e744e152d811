pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ContextError, Result};

pub use http::HttpSuggestionClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One resolved round trip to the suggestion service.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionCall {
    pub method: Method,
    /// Decoded path segments, e.g. `["ai_suggestion", "subjective", "body_function"]`.
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl SuggestionCall {
    pub fn post(segments: Vec<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            segments,
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn get(segments: Vec<String>) -> Self {
        Self {
            method: Method::Get,
            segments,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Slash-joined path for logs and tests.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Request/response contract shared by every screen.
///
/// Returns the suggestion text, or an error carrying the reason: a
/// transport failure (`ContextError::Http`), a service-reported error
/// (`ContextError::Suggestion`), or an answer without text
/// (`ContextError::NoSuggestion`).  No retries.
#[async_trait]
pub trait SuggestionTransport: Send + Sync {
    async fn request(&self, call: &SuggestionCall) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// `{suggestion|suggestions|summary|diagnosis: string}` or `{error: string}`.
#[derive(Debug, Default, Deserialize)]
pub struct SuggestionEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub suggestions: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
}

impl SuggestionEnvelope {
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// An `error` entry wins over any text.  Blank text counts as none.
    pub fn into_result(self) -> Result<String> {
        if let Some(err) = self.error.filter(|e| !e.trim().is_empty()) {
            return Err(ContextError::Suggestion(err));
        }
        [self.suggestion, self.suggestions, self.summary, self.diagnosis]
            .into_iter()
            .flatten()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .ok_or(ContextError::NoSuggestion)
    }
}

// ---------------------------------------------------------------------------
// Endpoint templates
// ---------------------------------------------------------------------------

/// Expand `{field}` and `{patient_id}` in a slash-separated template.
///
/// Each placeholder fills one whole segment, so values containing `/` stay
/// a single segment once the URL is encoded.
pub fn resolve_segments(template: &str, field: &str, patient: Option<&str>) -> Result<Vec<String>> {
    template
        .trim_matches('/')
        .split('/')
        .map(|seg| match seg {
            "{field}" => Ok(field.to_string()),
            "{patient_id}" => patient
                .map(str::to_string)
                .ok_or_else(|| ContextError::MissingPatient(template.to_string())),
            other => Ok(other.to_string()),
        })
        .collect()
}

/// Extract the `csrf_token` entry from a cookie string.
pub fn csrf_from_cookie(cookie: &str) -> Option<String> {
    cookie
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("csrf_token="))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
