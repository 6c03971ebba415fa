use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::utils::format_bytes;

/// Extension reported when nothing usable can be read from the url.
pub const UNKNOWN_EXT: &str = "unknown_video";

/// Codec value meaning "this rendition carries no such track".
pub const NO_CODEC: &str = "none";

/// Video information handed over by an extractor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub formats: Vec<FormatRecord>,
}

/// One discovered rendition of a media item.
///
/// Every field except `url` is optional and extractors populate whatever
/// subset their site exposes. Absent values mean "unknown", never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatRecord {
    pub format_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference: Option<f64>,
    #[serde(
        default,
        deserialize_with = "signed_whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub language_preference: Option<i32>,
    #[serde(
        default,
        deserialize_with = "signed_whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_preference: Option<i32>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub width: Option<u32>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbr: Option<f64>, // Total bitrate, kbps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vbr: Option<f64>, // Video bitrate, kbps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abr: Option<f64>, // Audio bitrate, kbps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub filesize: Option<u64>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub filesize_approx: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcodec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acodec: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub http_headers: HashMap<String, String>,
}

/// Accepts `720` as well as `720.0`, rejects fractions, negatives and
/// anything that is not a number.
fn whole_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => T::try_from(v as u64)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("value {} out of range", v))),
        Some(v) => Err(D::Error::custom(format!(
            "expected a whole non-negative number, got {}",
            v
        ))),
    }
}

/// Like [`whole_number`] but for preferences, which may be negative.
fn signed_whole_number<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(v) if v.is_finite() && v.fract() == 0.0 => i32::try_from(v as i64)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("value {} out of range", v))),
        Some(v) => Err(D::Error::custom(format!("expected a whole number, got {}", v))),
    }
}

impl FormatRecord {
    pub fn new(format_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            format_id: format_id.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Both tracks flagged absent: nothing left to download.
    pub fn is_malformed(&self) -> bool {
        self.is_audio_only() && self.is_video_only()
    }

    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some(NO_CODEC)
    }

    pub fn is_video_only(&self) -> bool {
        self.acodec.as_deref() == Some(NO_CODEC)
    }

    /// Declared extension, or the one guessed from the url.
    pub fn effective_ext(&self) -> Cow<'_, str> {
        match &self.ext {
            Some(ext) => Cow::Borrowed(ext.as_str()),
            None => Cow::Owned(determine_ext(&self.url)),
        }
    }

    /// Declared protocol, or the one guessed from the url.
    pub fn effective_protocol(&self) -> Cow<'_, str> {
        match &self.protocol {
            Some(protocol) => Cow::Borrowed(protocol.as_str()),
            None => Cow::Owned(determine_protocol(&self.url)),
        }
    }

    /// Declared total bitrate, else audio plus video bitrate when both are known.
    pub fn effective_tbr(&self) -> Option<f64> {
        self.tbr.or(match (self.abr, self.vbr) {
            (Some(abr), Some(vbr)) => Some(abr + vbr),
            _ => None,
        })
    }

    /// Numeric field by name, as used in filters and custom sort keys.
    pub fn numeric_field(&self, name: &str) -> Option<f64> {
        match name {
            "quality" => self.quality,
            "preference" => self.preference,
            "language_preference" => self.language_preference.map(f64::from),
            "source_preference" => self.source_preference.map(f64::from),
            "width" => self.width.map(f64::from),
            "height" => self.height.map(f64::from),
            "tbr" => self.effective_tbr(),
            "vbr" => self.vbr,
            "abr" => self.abr,
            "fps" => self.fps,
            "filesize" => self.filesize.map(|v| v as f64),
            "filesize_approx" => self.filesize_approx.map(|v| v as f64),
            _ => None,
        }
    }

    /// Text field by name. `ext` and `protocol` report the inferred value.
    pub fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "format_id" => Cow::Borrowed(self.format_id.as_str()),
            "url" => Cow::Borrowed(self.url.as_str()),
            "ext" => self.effective_ext(),
            "protocol" => self.effective_protocol(),
            "vcodec" => Cow::Borrowed(self.vcodec.as_deref()?),
            "acodec" => Cow::Borrowed(self.acodec.as_deref()?),
            "format_note" => Cow::Borrowed(self.format_note.as_deref()?),
            _ => return None,
        };
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// "1280x720", "720p" or "unknown"
    pub fn resolution(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            (None, Some(h)) => format!("{}p", h),
            _ => "unknown".to_string(),
        }
    }
}

/// Guess a container extension from the last path segment of a url.
pub fn determine_ext(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);

    match segment.rsplit_once('.') {
        Some((_, guess)) if !guess.is_empty() && guess.chars().all(|c| c.is_ascii_alphanumeric()) => {
            guess.to_string()
        }
        _ => UNKNOWN_EXT.to_string(),
    }
}

/// Guess a transport from a url: streaming schemes first, then manifest
/// extensions, then the plain url scheme. Empty when nothing is known.
pub fn determine_protocol(url: &str) -> String {
    for scheme in ["rtmp", "mms", "rtsp"] {
        if url.starts_with(scheme) {
            return scheme.to_string();
        }
    }

    let ext = determine_ext(url);
    if ext == "m3u8" || ext == "f4m" {
        return ext;
    }

    Url::parse(url)
        .map(|u| u.scheme().to_string())
        .unwrap_or_default()
}

/// Fill the fields later stages rely on: a positional `format_id` when the
/// extractor gave none, the inferred `ext`, and `tbr` from `abr + vbr`.
/// Running it twice changes nothing.
pub fn normalize_formats(formats: &mut [FormatRecord]) {
    for (index, format) in formats.iter_mut().enumerate() {
        if format.format_id.is_empty() {
            format.format_id = index.to_string();
        }
        if format.ext.is_none() {
            format.ext = Some(determine_ext(&format.url));
        }
        if format.tbr.is_none() {
            format.tbr = format.effective_tbr();
        }
    }
}

/// Keep the first record for every url. Records without a url are kept.
pub fn remove_duplicate_formats(formats: &mut Vec<FormatRecord>) {
    let mut seen = HashSet::new();
    let before = formats.len();

    formats.retain(|f| f.url.is_empty() || seen.insert(f.url.clone()));

    if formats.len() != before {
        debug!("Dropped {} duplicate format(s)", before - formats.len());
    }
}

/// A format list element that could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
}

/// Result of reading extractor JSON: the usable records and what was skipped.
#[derive(Debug, Clone, Default)]
pub struct FormatIntake {
    pub records: Vec<FormatRecord>,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Expected a JSON array of formats or an object with a \"formats\" array")]
    NotAFormatList,
}

/// Read format records from extractor JSON.
///
/// Accepts a bare array or an info object carrying `formats`. Elements with
/// wrongly typed fields (e.g. `"height": "N/A"`) are skipped and reported
/// in `rejected`.
pub fn records_from_json(value: &Value) -> Result<FormatIntake, IntakeError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("formats") {
            Some(Value::Array(items)) => items,
            _ => return Err(IntakeError::NotAFormatList),
        },
        _ => return Err(IntakeError::NotAFormatList),
    };

    let mut intake = FormatIntake::default();
    for (index, item) in items.iter().enumerate() {
        match FormatRecord::deserialize(item) {
            Ok(record) => intake.records.push(record),
            Err(e) => {
                warn!("Skipping malformed format #{}: {}", index, e);
                intake.rejected.push(RejectedRecord {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(intake)
}

/// Render a ranked list as a text table, marking the worst and best rows.
pub fn format_table(formats: &[FormatRecord]) -> String {
    fn line(id: &str, ext: &str, resolution: &str, size: &str, note: &str) -> String {
        format!("{:<20}{:<14}{:<12}{:<10}{}", id, ext, resolution, size, note)
    }

    let mut rows: Vec<String> = formats
        .iter()
        .map(|f| {
            line(
                &f.format_id,
                &f.effective_ext(),
                &f.resolution(),
                &f.filesize.map(format_bytes).unwrap_or_default(),
                f.format_note.as_deref().unwrap_or(""),
            )
        })
        .collect();

    if rows.len() > 1 {
        let last = rows.len() - 1;
        for (index, marker) in [(0, "(worst)"), (last, "(best)")] {
            let has_note = formats[index].format_note.is_some();
            rows[index].push_str(if has_note { " " } else { "" });
            rows[index].push_str(marker);
        }
    }

    let mut table = line("format code", "extension", "resolution", "filesize", "note");
    for row in rows {
        table.push('\n');
        table.push_str(row.trim_end_matches(' '));
    }
    table
}
