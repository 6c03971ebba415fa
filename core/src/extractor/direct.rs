use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::session::SessionContext;
use super::types::*;
use crate::format::{FormatRecord, VideoInfo, NO_CODEC};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov", "flv", "m3u8", "ts", "3gp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "flac", "wav", "ogg", "opus"];

/// Handles urls that point straight at a media file.
#[derive(Clone, Default)]
pub struct DirectFileExtractor {
    signer: Option<Arc<dyn SignsUrls>>,
}

/// Lower-cased extension of the last path segment, if it is a media one.
fn media_ext(url: &Url) -> Option<String> {
    let segment = url.path().rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) || AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(ext)
    } else {
        None
    }
}

impl DirectFileExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signer(signer: Arc<dyn SignsUrls>) -> Self {
        Self {
            signer: Some(signer),
        }
    }
}

#[async_trait]
impl Extractor for DirectFileExtractor {
    fn key(&self) -> &str {
        "direct"
    }

    fn suitable(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|parsed| media_ext(&parsed))
            .is_some()
    }

    async fn extract(
        &self,
        url: &str,
        session: &mut SessionContext,
    ) -> Result<ExtractionResult, ExtractionFailure> {
        let parsed = Url::parse(url)
            .map_err(|e| ExtractionFailure::unsupported(format!("Invalid URL {}: {}", url, e)))?;
        let ext = media_ext(&parsed).ok_or_else(|| {
            ExtractionFailure::unsupported(format!("Not a direct media file: {}", url))
        })?;

        let filename = parsed
            .path()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let id = filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| filename.clone());

        let media_url = match &self.signer {
            Some(signer) => signer.sign(url, session),
            None => url.to_string(),
        };
        debug!("Direct {} file: {}", ext, media_url);

        let mut format = FormatRecord::new("direct", media_url);
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            format.vcodec = Some(NO_CODEC.to_string());
        }
        format.ext = Some(ext);

        Ok(ExtractionResult::Direct(VideoInfo {
            id,
            title: filename,
            uploader: parsed.host_str().map(|s| s.to_string()),
            duration: None,
            formats: vec![format],
        }))
    }
}
