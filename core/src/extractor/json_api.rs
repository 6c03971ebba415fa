use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use super::session::SessionContext;
use super::types::*;
use crate::format::{records_from_json, VideoInfo};

/// Generic extractor for sites exposing a JSON metadata endpoint.
///
/// `pattern` must capture the media id in a group named `id`; `{id}` in
/// `api_template` is replaced by it. The response is read as:
///
/// - `{"error": {"kind": "geo_blocked", "message": "..."}}` : a failure
/// - `{"url": "...", "extractor": "direct"}` without `formats` : a redirect
/// - `{"title": "...", "entries": [...]}` : a playlist of redirects
/// - anything else is handed to [`records_from_json`]
pub struct JsonApiExtractor<F> {
    key: String,
    pattern: Regex,
    api_template: String,
    fetcher: F,
}

fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(|s| s.to_string())
}

fn redirect_from(value: &Value) -> Option<ExtractionResult> {
    Some(ExtractionResult::Redirect {
        url: text(value, "url")?,
        hint: text(value, "extractor"),
    })
}

impl<F: FetchesJson> JsonApiExtractor<F> {
    pub fn new(
        key: impl Into<String>,
        pattern: &str,
        api_template: impl Into<String>,
        fetcher: F,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            key: key.into(),
            pattern: Regex::new(pattern)?,
            api_template: api_template.into(),
            fetcher,
        })
    }

    fn media_id(&self, url: &str) -> Option<String> {
        self.pattern
            .captures(url)
            .and_then(|caps| caps.name("id"))
            .map(|m| m.as_str().to_string())
    }

    fn interpret(&self, id: &str, value: Value) -> Result<ExtractionResult, ExtractionFailure> {
        if let Some(error) = value.get("error") {
            let kind = error
                .get("kind")
                .cloned()
                .and_then(|kind| serde_json::from_value(kind).ok())
                .unwrap_or(FailureKind::NotFound);
            let message = text(error, "message").unwrap_or_else(|| format!("{}: {}", self.key, id));
            return Err(ExtractionFailure::new(kind, message));
        }

        if let Some(Value::Array(entries)) = value.get("entries") {
            let entries: Vec<ExtractionResult> = entries.iter().filter_map(redirect_from).collect();
            debug!("[{}] {} playlist entries", self.key, entries.len());
            return Ok(ExtractionResult::Playlist {
                title: text(&value, "title"),
                entries,
            });
        }

        if value.get("formats").is_none() {
            if let Some(redirect) = redirect_from(&value) {
                return Ok(redirect);
            }
        }

        let intake = records_from_json(&value)
            .map_err(|e| ExtractionFailure::unsupported(format!("{}: {}", self.key, e)))?;
        if intake.records.is_empty() {
            return Err(ExtractionFailure::not_found(format!(
                "No video formats found for {}",
                id
            )));
        }

        Ok(ExtractionResult::Direct(VideoInfo {
            id: text(&value, "id").unwrap_or_else(|| id.to_string()),
            title: text(&value, "title").unwrap_or_else(|| id.to_string()),
            uploader: text(&value, "uploader"),
            duration: value.get("duration").and_then(Value::as_u64),
            formats: intake.records,
        }))
    }
}

#[async_trait]
impl<F: FetchesJson> Extractor for JsonApiExtractor<F> {
    fn key(&self) -> &str {
        &self.key
    }

    fn suitable(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    async fn extract(
        &self,
        url: &str,
        session: &mut SessionContext,
    ) -> Result<ExtractionResult, ExtractionFailure> {
        let id = self
            .media_id(url)
            .ok_or_else(|| ExtractionFailure::unsupported(format!("No media id in {}", url)))?;
        let api_url = self.api_template.replace("{id}", &id);

        info!("[{}] {}: Downloading JSON metadata", self.key, id);
        let value = self.fetcher.fetch_json(&api_url, session).await?;
        self.interpret(&id, value)
    }
}
