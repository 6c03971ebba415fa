use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::format::FormatRecord;
use crate::utils::parse_filesize;

const NUMERIC_KEYS: &[&str] = &[
    "quality",
    "preference",
    "language_preference",
    "source_preference",
    "width",
    "height",
    "tbr",
    "vbr",
    "abr",
    "fps",
    "filesize",
    "filesize_approx",
];

const TEXT_KEYS: &[&str] = &[
    "format_id",
    "url",
    "ext",
    "protocol",
    "vcodec",
    "acodec",
    "format_note",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Unknown field {key:?} in filter {filter:?}")]
    UnknownField { key: String, filter: String },
    #[error("Operator {op} does not support string values (filter {filter:?})")]
    StringOperator { op: String, filter: String },
    #[error("Invalid numeric value {value:?} in filter {filter:?}")]
    InvalidNumber { value: String, filter: String },
    #[error("Invalid filter {0:?}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Eq,
    Ne,
    StartsWith,
    EndsWith,
    Contains,
}

/// One `[...]` condition of a format spec.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatFilter {
    Numeric {
        key: String,
        op: NumericOp,
        value: f64,
        /// `?` after the operator: also pass records lacking the field
        none_inclusive: bool,
    },
    Text {
        key: String,
        op: TextOp,
        value: String,
        none_inclusive: bool,
    },
    Present {
        key: String,
        negated: bool,
    },
}

fn comparison_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<key>[a-z_]+)\s*(?P<op><=|>=|!=|\^=|\$=|\*=|<|>|=)(?P<none>\s*\?)?\s*(?P<value>[A-Za-z0-9._+-]*)\s*$",
        )
        .expect("valid comparison regex")
    })
}

fn presence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<neg>!)?\s*(?P<key>[a-z_]+)\s*$").expect("valid presence regex")
    })
}

/// `720`, `1.5`, or a size such as `10M` / `1.5GiB`.
fn parse_number(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .or_else(|| parse_filesize(value).map(|bytes| bytes as f64))
}

impl FormatFilter {
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        if let Some(caps) = comparison_regex().captures(text) {
            let key = caps["key"].to_string();
            let op = &caps["op"];
            let value = &caps["value"];
            let none_inclusive = caps.name("none").is_some();

            if NUMERIC_KEYS.contains(&key.as_str()) {
                let op = match op {
                    "<" => NumericOp::Lt,
                    "<=" => NumericOp::Le,
                    ">" => NumericOp::Gt,
                    ">=" => NumericOp::Ge,
                    "=" => NumericOp::Eq,
                    "!=" => NumericOp::Ne,
                    other => {
                        return Err(FilterError::StringOperator {
                            op: other.to_string(),
                            filter: text.to_string(),
                        })
                    }
                };
                let value = parse_number(value).ok_or_else(|| FilterError::InvalidNumber {
                    value: value.to_string(),
                    filter: text.to_string(),
                })?;
                return Ok(FormatFilter::Numeric {
                    key,
                    op,
                    value,
                    none_inclusive,
                });
            }

            if TEXT_KEYS.contains(&key.as_str()) {
                let op = match op {
                    "=" => TextOp::Eq,
                    "!=" => TextOp::Ne,
                    "^=" => TextOp::StartsWith,
                    "$=" => TextOp::EndsWith,
                    "*=" => TextOp::Contains,
                    other => {
                        return Err(FilterError::StringOperator {
                            op: other.to_string(),
                            filter: text.to_string(),
                        })
                    }
                };
                return Ok(FormatFilter::Text {
                    key,
                    op,
                    value: value.to_string(),
                    none_inclusive,
                });
            }

            return Err(FilterError::UnknownField {
                key,
                filter: text.to_string(),
            });
        }

        if let Some(caps) = presence_regex().captures(text) {
            let key = caps["key"].to_string();
            if !NUMERIC_KEYS.contains(&key.as_str()) && !TEXT_KEYS.contains(&key.as_str()) {
                return Err(FilterError::UnknownField {
                    key,
                    filter: text.to_string(),
                });
            }
            return Ok(FormatFilter::Present {
                key,
                negated: caps.name("neg").is_some(),
            });
        }

        Err(FilterError::Invalid(text.to_string()))
    }

    pub fn matches(&self, format: &FormatRecord) -> bool {
        match self {
            FormatFilter::Numeric {
                key,
                op,
                value,
                none_inclusive,
            } => match format.numeric_field(key) {
                None => *none_inclusive,
                Some(actual) => match op {
                    NumericOp::Lt => actual < *value,
                    NumericOp::Le => actual <= *value,
                    NumericOp::Gt => actual > *value,
                    NumericOp::Ge => actual >= *value,
                    NumericOp::Eq => actual == *value,
                    NumericOp::Ne => actual != *value,
                },
            },
            FormatFilter::Text {
                key,
                op,
                value,
                none_inclusive,
            } => match format.text_field(key) {
                None => *none_inclusive,
                Some(actual) => match op {
                    TextOp::Eq => actual == value.as_str(),
                    TextOp::Ne => actual != value.as_str(),
                    TextOp::StartsWith => actual.starts_with(value.as_str()),
                    TextOp::EndsWith => actual.ends_with(value.as_str()),
                    TextOp::Contains => actual.contains(value.as_str()),
                },
            },
            FormatFilter::Present { key, negated } => {
                let present =
                    format.numeric_field(key).is_some() || format.text_field(key).is_some();
                present != *negated
            }
        }
    }
}

impl FromStr for FormatFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatFilter::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FormatRecord {
        FormatRecord {
            height: Some(720),
            width: Some(1280),
            filesize: Some(8_000_000),
            vcodec: Some("avc1.4d401f".to_string()),
            ..FormatRecord::new("hd", "https://example.com/hd.mp4")
        }
    }

    #[test]
    fn test_numeric_comparisons() {
        let f = sample();
        for (filter, expected) in [
            ("height<=720", true),
            ("height<720", false),
            ("height >= 480", true),
            ("height=720", true),
            ("height!=720", false),
            ("width>1920", false),
            ("filesize<10M", true),
            ("filesize>1MiB", true),
        ] {
            let parsed = FormatFilter::parse(filter).unwrap();
            assert_eq!(parsed.matches(&f), expected, "{}", filter);
        }
    }

    #[test]
    fn test_none_inclusive() {
        let f = sample();
        assert!(!FormatFilter::parse("fps>30").unwrap().matches(&f));
        assert!(FormatFilter::parse("fps>?30").unwrap().matches(&f));
        assert!(FormatFilter::parse("acodec=?aac").unwrap().matches(&f));
    }

    #[test]
    fn test_text_comparisons() {
        let f = sample();
        assert!(FormatFilter::parse("ext=mp4").unwrap().matches(&f));
        assert!(FormatFilter::parse("ext!=webm").unwrap().matches(&f));
        assert!(FormatFilter::parse("vcodec^=avc1").unwrap().matches(&f));
        assert!(FormatFilter::parse("vcodec$=401f").unwrap().matches(&f));
        assert!(FormatFilter::parse("format_id*=h").unwrap().matches(&f));
        assert!(FormatFilter::parse("protocol=https").unwrap().matches(&f));
    }

    #[test]
    fn test_presence() {
        let f = sample();
        assert!(FormatFilter::parse("height").unwrap().matches(&f));
        assert!(FormatFilter::parse("!fps").unwrap().matches(&f));
        assert!(!FormatFilter::parse("!vcodec").unwrap().matches(&f));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            FormatFilter::parse("ext<mp4"),
            Err(FilterError::StringOperator { .. })
        ));
        assert!(matches!(
            FormatFilter::parse("height^=7"),
            Err(FilterError::StringOperator { .. })
        ));
        assert!(matches!(
            FormatFilter::parse("height<=tall"),
            Err(FilterError::InvalidNumber { .. })
        ));
        assert!(matches!(
            FormatFilter::parse("loudness>3"),
            Err(FilterError::UnknownField { .. })
        ));
        assert!(matches!(FormatFilter::parse("height <= 7 20"), Err(FilterError::Invalid(_))));
    }
}
