use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

use crate::config::RankConfig;
use crate::format::FormatRecord;

/// A single comparison key. Larger values rank better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Preference,
    LanguagePreference,
    Quality,
    Tbr,
    Filesize,
    Vbr,
    Height,
    Width,
    ProtoPreference,
    ExtPreference,
    Abr,
    AudioExtPreference,
    Fps,
    FilesizeApprox,
    SourcePreference,
    FormatId,
    Ext,
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown sort field: {0}")]
pub struct UnknownSortField(pub String);

impl SortField {
    /// Key order used when no field preference is given, most significant first.
    pub const DEFAULT_ORDER: [SortField; 16] = [
        SortField::Preference,
        SortField::LanguagePreference,
        SortField::Quality,
        SortField::Tbr,
        SortField::Filesize,
        SortField::Vbr,
        SortField::Height,
        SortField::Width,
        SortField::ProtoPreference,
        SortField::ExtPreference,
        SortField::Abr,
        SortField::AudioExtPreference,
        SortField::Fps,
        SortField::FilesizeApprox,
        SortField::SourcePreference,
        SortField::FormatId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortField::Preference => "preference",
            SortField::LanguagePreference => "language_preference",
            SortField::Quality => "quality",
            SortField::Tbr => "tbr",
            SortField::Filesize => "filesize",
            SortField::Vbr => "vbr",
            SortField::Height => "height",
            SortField::Width => "width",
            SortField::ProtoPreference => "proto_preference",
            SortField::ExtPreference => "ext_preference",
            SortField::Abr => "abr",
            SortField::AudioExtPreference => "audio_ext_preference",
            SortField::Fps => "fps",
            SortField::FilesizeApprox => "filesize_approx",
            SortField::SourcePreference => "source_preference",
            SortField::FormatId => "format_id",
            SortField::Ext => "ext",
            SortField::Protocol => "protocol",
        }
    }

    /// Parse a comma separated list such as `"height,tbr,format_id"`.
    pub fn parse_list(text: &str) -> Result<Vec<SortField>, UnknownSortField> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }

    fn is_text(self) -> bool {
        matches!(self, SortField::FormatId | SortField::Ext | SortField::Protocol)
    }
}

impl FromStr for SortField {
    type Err = UnknownSortField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortField::DEFAULT_ORDER
            .iter()
            .chain([SortField::Ext, SortField::Protocol].iter())
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| UnknownSortField(s.to_string()))
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum KeyPart {
    Num(f64),
    Text(String),
}

impl KeyPart {
    fn num(value: f64) -> Self {
        // keep -0.0 and 0.0 equal under total_cmp
        KeyPart::Num(if value == 0.0 { 0.0 } else { value })
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Num(a), KeyPart::Num(b)) => a.total_cmp(b),
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            (KeyPart::Num(_), KeyPart::Text(_)) => Ordering::Less,
            (KeyPart::Text(_), KeyPart::Num(_)) => Ordering::Greater,
        }
    }
}

fn compare_keys(a: &[KeyPart], b: &[KeyPart]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.compare(y))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn order_index(order: &[String], ext: &str) -> f64 {
    order
        .iter()
        .position(|candidate| candidate == ext)
        .map(|i| i as f64)
        .unwrap_or(-1.0)
}

/// Orders format lists from least to most preferred.
#[derive(Debug, Clone, Copy)]
pub struct Ranker<'c> {
    config: &'c RankConfig,
}

impl<'c> Ranker<'c> {
    pub fn new(config: &'c RankConfig) -> Self {
        Self { config }
    }

    /// Sort `formats` worst to best.
    ///
    /// Records whose video and audio codecs are both `"none"` are dropped.
    /// `field_preference` (or, failing that, the configured one) replaces
    /// the default key order. The sort is stable and never fails.
    pub fn rank(
        &self,
        formats: Vec<FormatRecord>,
        field_preference: Option<&[SortField]>,
    ) -> Vec<FormatRecord> {
        let fields = field_preference.or(self.config.field_preference.as_deref());

        let mut keyed: Vec<(Vec<KeyPart>, FormatRecord)> = formats
            .into_iter()
            .filter_map(|format| {
                if format.is_malformed() {
                    debug!(
                        "Excluding format {:?}: both vcodec and acodec are \"none\"",
                        format.format_id
                    );
                    return None;
                }
                let key = self.key(&format, fields);
                Some((key, format))
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b));
        keyed.into_iter().map(|(_, format)| format).collect()
    }

    /// Compare two records the way `rank` would with the default key order.
    pub fn compare(&self, a: &FormatRecord, b: &FormatRecord) -> Ordering {
        compare_keys(&self.key(a, None), &self.key(b, None))
    }

    fn key(&self, format: &FormatRecord, fields: Option<&[SortField]>) -> Vec<KeyPart> {
        match fields {
            Some(fields) => fields
                .iter()
                .map(|&field| self.raw_value(format, field))
                .collect(),
            None => SortField::DEFAULT_ORDER
                .iter()
                .map(|&field| self.default_value(format, field))
                .collect(),
        }
    }

    /// Default-order value: penalties folded into `preference`, missing
    /// language match counted as neutral.
    fn default_value(&self, format: &FormatRecord, field: SortField) -> KeyPart {
        match field {
            SortField::Preference => KeyPart::num(self.effective_preference(format)),
            SortField::LanguagePreference => {
                KeyPart::num(format.language_preference.map(f64::from).unwrap_or(0.0))
            }
            other => self.raw_value(format, other),
        }
    }

    fn effective_preference(&self, format: &FormatRecord) -> f64 {
        let mut preference = match format.preference {
            Some(preference) => preference,
            None => match format.effective_ext().as_ref() {
                "f4f" | "f4m" => -self.config.unsupported_ext_penalty,
                _ => 0.0,
            },
        };

        if format.is_audio_only() {
            preference -= self.config.audio_only_penalty;
        } else if format.is_video_only() {
            preference -= self.config.video_only_penalty;
        }
        preference
    }

    fn raw_value(&self, format: &FormatRecord, field: SortField) -> KeyPart {
        match field {
            SortField::ProtoPreference => {
                KeyPart::num(self.config.protocol_score(&format.effective_protocol()))
            }
            SortField::ExtPreference => KeyPart::num(if format.is_audio_only() {
                0.0
            } else {
                order_index(self.config.video_ext_order(), &format.effective_ext())
            }),
            SortField::AudioExtPreference => KeyPart::num(if format.is_audio_only() {
                order_index(self.config.audio_ext_order(), &format.effective_ext())
            } else {
                0.0
            }),
            text if text.is_text() => KeyPart::Text(
                format
                    .text_field(text.name())
                    .map(|value| value.into_owned())
                    .unwrap_or_default(),
            ),
            numeric => KeyPart::num(format.numeric_field(numeric.name()).unwrap_or(-1.0)),
        }
    }
}

fn default_config() -> &'static RankConfig {
    static DEFAULT: OnceLock<RankConfig> = OnceLock::new();
    DEFAULT.get_or_init(RankConfig::default)
}

/// Rank with the default configuration. See [`Ranker::rank`].
pub fn rank(formats: Vec<FormatRecord>, field_preference: Option<&[SortField]>) -> Vec<FormatRecord> {
    Ranker::new(default_config()).rank(formats, field_preference)
}
