use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::filter::FormatFilter;
use crate::format::FormatRecord;

/// Bare words that select by container instead of by id.
const EXTENSION_ATOMS: &[&str] = &["mp4", "flv", "webm", "3gp", "m4a", "mp3", "ogg", "aac", "wav"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectError {
    #[error("Requested format not available: {requested}")]
    FormatNotFound {
        requested: String,
        /// Ranked `format_id`s, worst first
        available: Vec<String>,
    },
    #[error("Invalid format spec {spec:?}: {reason}")]
    InvalidSpec { spec: String, reason: String },
}

/// Video track present, audio explicitly absent.
fn is_video_stream(format: &FormatRecord) -> bool {
    !format.is_audio_only() && format.is_video_only()
}

/// What a single selector picks before filters are considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Best,
    Worst,
    BestVideo,
    WorstVideo,
    BestAudio,
    WorstAudio,
    All,
    Ext(String),
    FormatId(String),
}

impl Atom {
    fn from_word(word: &str) -> Self {
        match word {
            "" | "best" => Atom::Best,
            "worst" => Atom::Worst,
            "bestvideo" => Atom::BestVideo,
            "worstvideo" => Atom::WorstVideo,
            "bestaudio" => Atom::BestAudio,
            "worstaudio" => Atom::WorstAudio,
            "all" | "-1" => Atom::All,
            ext if EXTENSION_ATOMS.contains(&ext) => Atom::Ext(ext.to_string()),
            id => Atom::FormatId(id.to_string()),
        }
    }

    /// Pick from `candidates` (ranked worst first, already filtered).
    fn pick<'a>(&self, candidates: &[&'a FormatRecord]) -> Vec<&'a FormatRecord> {
        let picked = match self {
            Atom::All => return candidates.to_vec(),
            Atom::Best => candidates.last(),
            Atom::Worst => candidates.first(),
            Atom::BestVideo => candidates.iter().rev().find(|f| is_video_stream(f)),
            Atom::WorstVideo => candidates.iter().find(|f| is_video_stream(f)),
            Atom::BestAudio => candidates.iter().rev().find(|f| f.is_audio_only()),
            Atom::WorstAudio => candidates.iter().find(|f| f.is_audio_only()),
            Atom::Ext(ext) => candidates
                .iter()
                .rev()
                .find(|f| f.effective_ext() == ext.as_str()),
            Atom::FormatId(id) => candidates.iter().rev().find(|f| &f.format_id == id),
        };
        picked.copied().into_iter().collect()
    }
}

/// An atom narrowed by zero or more `[...]` filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub atom: Atom,
    pub filters: Vec<FormatFilter>,
}

impl Selector {
    fn resolve<'a>(&self, ranked: &'a [FormatRecord]) -> Vec<&'a FormatRecord> {
        let candidates: Vec<&FormatRecord> = ranked
            .iter()
            .filter(|f| self.filters.iter().all(|filter| filter.matches(f)))
            .collect();
        self.atom.pick(&candidates)
    }
}

/// A parsed format spec: `/`-separated alternatives, each a `+`-joined
/// group of selectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatSpec {
    raw: String,
    alternatives: Vec<Vec<Selector>>,
}

/// Split on `sep` outside of brackets.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_selector(text: &str) -> Result<Selector, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty selector".to_string());
    }

    let (word, mut rest) = match text.find('[') {
        Some(pos) => (text[..pos].trim(), &text[pos..]),
        None => (text, ""),
    };
    if word.contains(']') {
        return Err(format!("unexpected ']' in {:?}", text));
    }

    let mut filters = Vec::new();
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .ok_or_else(|| format!("unexpected text {:?} after filter", rest))?;
        let end = inner
            .find(']')
            .ok_or_else(|| format!("unclosed '[' in {:?}", text))?;
        let body = &inner[..end];
        if body.contains('[') {
            return Err(format!("nested '[' in {:?}", text));
        }
        filters.push(FormatFilter::parse(body).map_err(|e| e.to_string())?);
        rest = inner[end + 1..].trim_start();
    }

    Ok(Selector {
        atom: Atom::from_word(word),
        filters,
    })
}

impl FormatSpec {
    pub fn parse(spec: &str) -> Result<Self, SelectError> {
        let invalid = |reason: String| SelectError::InvalidSpec {
            spec: spec.to_string(),
            reason,
        };

        if spec.trim().is_empty() {
            return Err(invalid("empty format spec".to_string()));
        }

        let alternatives = split_top_level(spec, '/')
            .into_iter()
            .map(|alternative| {
                split_top_level(alternative, '+')
                    .into_iter()
                    .map(parse_selector)
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;

        Ok(Self {
            raw: spec.to_string(),
            alternatives,
        })
    }

    /// Resolve against a ranked list (worst first). The first alternative
    /// whose every part matches wins.
    pub fn resolve(&self, ranked: &[FormatRecord]) -> Result<Vec<FormatRecord>, SelectError> {
        for (index, group) in self.alternatives.iter().enumerate() {
            let mut chosen: Vec<&FormatRecord> = Vec::new();
            let mut complete = true;

            for selector in group {
                let picked = selector.resolve(ranked);
                if picked.is_empty() {
                    complete = false;
                    break;
                }
                chosen.extend(picked);
            }

            if complete {
                debug!(
                    "Format spec {:?} resolved by alternative #{} to {:?}",
                    self.raw,
                    index + 1,
                    chosen.iter().map(|f| f.format_id.as_str()).collect::<Vec<_>>()
                );
                return Ok(chosen.into_iter().cloned().collect());
            }
        }

        Err(SelectError::FormatNotFound {
            requested: self.raw.clone(),
            available: ranked.iter().map(|f| f.format_id.clone()).collect(),
        })
    }
}

impl FromStr for FormatSpec {
    type Err = SelectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatSpec::parse(s)
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Narrow a ranked list (worst first) to what `spec` asks for.
///
/// `spec` is e.g. `"best"`, `"worst"`, `"22"`, `"22/18/best"`,
/// `"best[height<=720]"` or `"bestvideo+bestaudio/best"`.
pub fn select(ranked: &[FormatRecord], spec: &str) -> Result<Vec<FormatRecord>, SelectError> {
    FormatSpec::parse(spec)?.resolve(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankConfig;
    use crate::ranking::{rank, Ranker};

    fn ids(formats: &[FormatRecord]) -> Vec<&str> {
        formats.iter().map(|f| f.format_id.as_str()).collect()
    }

    fn sample() -> Vec<FormatRecord> {
        let formats = vec![
            FormatRecord { height: Some(480), ..FormatRecord::new("a", "") },
            FormatRecord { height: Some(720), ..FormatRecord::new("b", "") },
            FormatRecord { height: Some(720), tbr: Some(500.0), ..FormatRecord::new("c", "") },
            FormatRecord {
                vcodec: Some("none".to_string()),
                acodec: Some("none".to_string()),
                ..FormatRecord::new("d", "")
            },
        ];
        rank(formats, None)
    }

    fn streams() -> Vec<FormatRecord> {
        let formats = vec![
            FormatRecord {
                vcodec: Some("none".to_string()),
                acodec: Some("opus".to_string()),
                abr: Some(160.0),
                ..FormatRecord::new("251", "https://example.com/251.webm")
            },
            FormatRecord {
                vcodec: Some("none".to_string()),
                acodec: Some("mp4a.40.2".to_string()),
                abr: Some(128.0),
                ..FormatRecord::new("140", "https://example.com/140.m4a")
            },
            FormatRecord {
                acodec: Some("none".to_string()),
                vcodec: Some("avc1".to_string()),
                height: Some(1080),
                ..FormatRecord::new("137", "https://example.com/137.mp4")
            },
            FormatRecord {
                acodec: Some("none".to_string()),
                vcodec: Some("vp9".to_string()),
                height: Some(720),
                ..FormatRecord::new("247", "https://example.com/247.webm")
            },
            FormatRecord {
                height: Some(360),
                ..FormatRecord::new("18", "https://example.com/18.mp4")
            },
            FormatRecord {
                height: Some(720),
                ..FormatRecord::new("22", "https://example.com/22.mp4")
            },
        ];
        // Split streams below muxed ones: 140, 251, 247, 137, 18, 22
        let config = RankConfig::default().with_stream_penalties();
        Ranker::new(&config).rank(formats, None)
    }

    #[test]
    fn test_best_and_worst() {
        let ranked = sample();
        assert_eq!(select(&ranked, "best").unwrap(), vec![ranked[ranked.len() - 1].clone()]);
        assert_eq!(select(&ranked, "worst").unwrap(), vec![ranked[0].clone()]);
        assert_eq!(ids(&select(&ranked, "best").unwrap()), vec!["c"]);
    }

    #[test]
    fn test_explicit_id() {
        let ranked = sample();
        assert_eq!(ids(&select(&ranked, "b").unwrap()), vec!["b"]);
    }

    #[test]
    fn test_fallback_chain() {
        let ranked = sample();
        assert_eq!(
            select(&ranked, "missing_id/best").unwrap(),
            select(&ranked, "best").unwrap()
        );
        assert_eq!(ids(&select(&ranked, "zzz/a/best").unwrap()), vec!["a"]);
        assert_eq!(ids(&select(&ranked, "zzz/worst").unwrap()), vec!["a"]);
    }

    #[test]
    fn test_format_not_found_lists_available() {
        let ranked = sample();
        let err = select(&ranked, "x/y").unwrap_err();
        assert_eq!(
            err,
            SelectError::FormatNotFound {
                requested: "x/y".to_string(),
                available: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            }
        );
    }

    #[test]
    fn test_best_on_empty_list_is_not_found() {
        assert!(matches!(
            select(&[], "best"),
            Err(SelectError::FormatNotFound { .. })
        ));
    }

    #[test]
    fn test_split_stream_atoms() {
        let ranked = streams();
        assert_eq!(ids(&select(&ranked, "bestaudio").unwrap()), vec!["251"]);
        assert_eq!(ids(&select(&ranked, "worstaudio").unwrap()), vec!["140"]);
        assert_eq!(ids(&select(&ranked, "bestvideo").unwrap()), vec!["137"]);
        assert_eq!(ids(&select(&ranked, "worstvideo").unwrap()), vec!["247"]);
        assert_eq!(ids(&select(&ranked, "best").unwrap()), vec!["22"]);
    }

    #[test]
    fn test_merge_parts() {
        let ranked = streams();
        assert_eq!(
            ids(&select(&ranked, "bestvideo+bestaudio/best").unwrap()),
            vec!["137", "251"]
        );
        assert_eq!(
            ids(&select(&ranked, "bestvideo[height>2000]+bestaudio/best").unwrap()),
            vec!["22"]
        );
    }

    #[test]
    fn test_extension_atom() {
        let ranked = streams();
        assert_eq!(ids(&select(&ranked, "webm").unwrap()), vec!["247"]);
        assert_eq!(ids(&select(&ranked, "mp4").unwrap()), vec!["22"]);
        assert!(select(&ranked, "flv").is_err());
    }

    #[test]
    fn test_filters() {
        let ranked = streams();
        assert_eq!(ids(&select(&ranked, "best[height<=480]").unwrap()), vec!["18"]);
        assert_eq!(ids(&select(&ranked, "[height<=480]").unwrap()), vec!["18"]);
        assert_eq!(
            ids(&select(&ranked, "bestvideo[ext=webm]").unwrap()),
            vec!["247"]
        );
        assert_eq!(
            ids(&select(&ranked, "best[height>4000]/worst").unwrap()),
            vec![ranked[0].format_id.as_str()]
        );
    }

    #[test]
    fn test_all() {
        let ranked = streams();
        assert_eq!(select(&ranked, "all").unwrap(), ranked);
        assert_eq!(ids(&select(&ranked, "all[height>=720]").unwrap()), vec!["247", "137", "22"]);
    }

    #[test]
    fn test_invalid_specs() {
        for spec in ["", "  ", "a//b", "best[height<=720", "best]", "best[height<=720]x", "best[loud>1]", "+best"] {
            assert!(
                matches!(select(&[], spec), Err(SelectError::InvalidSpec { .. })),
                "{:?} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_spec_display_round_trips_raw_text() {
        let spec: FormatSpec = "22/best[height<=720]".parse().unwrap();
        assert_eq!(spec.to_string(), "22/best[height<=720]");
    }
}
