mod query;

pub use query::QueryParams;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error as ThisError;

///
/// TransportError
///
/// Failure surfaced by the transport. Carried through the core verbatim;
/// the core never retries, wraps, or suppresses transport failures.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
    pub body: Option<JsonValue>,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Replace the message with the response body's `message` field when
    /// the body carries one. Read failures surface this preferred form.
    #[must_use]
    pub fn prefer_body_message(mut self) -> Self {
        if let Some(message) = self
            .body
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(JsonValue::as_str)
        {
            self.message = message.to_string();
        }

        self
    }
}

///
/// ApiConfig
///
/// Externally supplied transport configuration. The core reads it only to
/// canonicalize entity hrefs against the currently configured server.
///

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// API root, without a trailing slash (e.g. `https://play.example.com/api`).
    pub base_url: String,
    /// Optional pinned API version appended to the root.
    #[serde(default)]
    pub api_version: Option<u32>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: None,
        }
    }

    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Effective API root including the pinned version, if any.
    #[must_use]
    pub fn root(&self) -> String {
        match self.api_version {
            Some(version) => format!("{}/{version}", self.base_url),
            None => self.base_url.clone(),
        }
    }

    /// Canonical href for one entity under the configured server.
    #[must_use]
    pub fn model_href(&self, endpoint: &str, id: &str) -> String {
        format!("{}/{endpoint}/{id}", self.root())
    }
}

///
/// Api
///
/// The transport contract the model core consumes. Implementations own
/// base URLs, headers, authentication, and retry policy; the core only
/// issues requests against relative paths (or absolute hrefs it
/// canonicalized itself) and interprets the JSON that comes back.
///

#[async_trait]
pub trait Api: Send + Sync {
    async fn get(&self, path: &str, query: &QueryParams) -> Result<JsonValue, TransportError>;

    async fn post(&self, path: &str, body: JsonValue) -> Result<JsonValue, TransportError>;

    /// `replace_merge` selects replace semantics for the server-side merge.
    async fn put(
        &self,
        path: &str,
        body: JsonValue,
        replace_merge: bool,
    ) -> Result<JsonValue, TransportError>;

    async fn delete(&self, path: &str) -> Result<JsonValue, TransportError>;

    fn config(&self) -> &ApiConfig;
}
