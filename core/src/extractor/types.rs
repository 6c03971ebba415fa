use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::session::SessionContext;
use crate::format::VideoInfo;

/// Expected, user-facing reasons an extraction can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    GeoBlocked,
    Removed,
    AuthRequired,
    NotFound,
    Unsupported,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::GeoBlocked => "not available from your location",
            FailureKind::Removed => "removed",
            FailureKind::AuthRequired => "login required",
            FailureKind::NotFound => "not found",
            FailureKind::Unsupported => "unsupported",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ExtractionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ExtractionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unsupported, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }
}

/// What an extractor found behind a url.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    /// A single media item with its formats
    Direct(VideoInfo),
    /// The content lives elsewhere; `hint` names the extractor to use
    Redirect { url: String, hint: Option<String> },
    Playlist {
        title: Option<String>,
        entries: Vec<ExtractionResult>,
    },
}

/// Site-specific logic turning a url into an [`ExtractionResult`].
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Stable name, also used as a redirect hint
    fn key(&self) -> &str;

    fn suitable(&self, url: &str) -> bool;

    async fn extract(
        &self,
        url: &str,
        session: &mut SessionContext,
    ) -> Result<ExtractionResult, ExtractionFailure>;
}

/// Capability: download and decode a JSON document.
#[async_trait]
pub trait FetchesJson: Send + Sync {
    async fn fetch_json(
        &self,
        url: &str,
        session: &mut SessionContext,
    ) -> Result<Value, ExtractionFailure>;
}

/// Capability: turn a raw media url into one the host will serve.
pub trait SignsUrls: Send + Sync {
    fn sign(&self, url: &str, session: &SessionContext) -> String;
}
