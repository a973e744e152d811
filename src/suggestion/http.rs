use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use super::{Method, SuggestionCall, SuggestionEnvelope, SuggestionTransport, csrf_from_cookie};
use crate::config::ServerConfig;
use crate::error::{ContextError, Result};

/// Suggestion service reached over HTTP.
///
/// POST bodies are sent as JSON together with the `X-CSRFToken` header
/// when a token is configured.  GET calls carry only the query string.
pub struct HttpSuggestionClient {
    client: Client,
    base_url: Url,
    csrf_token: Option<String>,
}

impl HttpSuggestionClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ContextError::Config(format!("invalid base_url {:?}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ContextError::Config(format!(
                "base_url {:?} cannot carry a path",
                config.base_url
            )));
        }

        let csrf_token = if config.csrf_token.is_empty() {
            csrf_from_cookie(&config.cookie)
        } else {
            Some(config.csrf_token.clone())
        };

        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| ContextError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(
            base_url = %base_url,
            timeout_secs = config.timeout_secs,
            csrf = csrf_token.is_some(),
            "suggestion client initialized"
        );

        Ok(Self {
            client,
            base_url,
            csrf_token,
        })
    }

    fn url_for(&self, call: &SuggestionCall) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ContextError::Config("base_url cannot carry a path".into()))?;
            path.pop_if_empty();
            path.extend(call.segments.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl SuggestionTransport for HttpSuggestionClient {
    async fn request(&self, call: &SuggestionCall) -> Result<String> {
        let url = self.url_for(call)?;

        let mut req = match call.method {
            Method::Get => self.client.get(url),
            Method::Post => {
                let mut req = self.client.post(url);
                if let Some(ref token) = self.csrf_token {
                    req = req.header("X-CSRFToken", token.as_str());
                }
                req
            }
        };
        if !call.query.is_empty() {
            req = req.query(&call.query);
        }
        if let Some(ref body) = call.body {
            req = req.json(body);
        }

        debug!(path = %call.path(), method = ?call.method, "requesting suggestion");

        let resp = req.send().await.map_err(|e| {
            warn!(path = %call.path(), err = %e, "suggestion request failed");
            ContextError::Http(e)
        })?;
        let status = resp.status();
        let text = resp.text().await?;

        let envelope = match serde_json::from_str::<SuggestionEnvelope>(&text) {
            Ok(env) => env,
            Err(e) => {
                warn!(path = %call.path(), status = %status, err = %e, "unreadable suggestion response");
                return Err(ContextError::Suggestion(if status.is_success() {
                    format!("unreadable response: {e}")
                } else {
                    format!("service returned {status}")
                }));
            }
        };

        if !status.is_success() && !envelope.is_error() {
            warn!(path = %call.path(), status = %status, "suggestion service error without message");
            return Err(ContextError::Suggestion(format!("service returned {status}")));
        }

        let result = envelope.into_result();
        match &result {
            Ok(s) => info!(path = %call.path(), len = s.len(), "suggestion received"),
            Err(e) => warn!(path = %call.path(), status = %status, err = %e, "suggestion service reported error"),
        }
        result
    }
}
