pub mod config;
pub mod extractor;
pub mod filter;
pub mod format;
pub mod ranking;
pub mod selector;
pub mod utils;

pub use self::config::*;
pub use extractor::*;
pub use filter::*;
pub use format::*;
pub use ranking::*;
pub use selector::*;
pub use utils::*;

use tracing::{debug, info};

/// Main ranking pipeline: normalize, rank, limit and select formats
#[derive(Debug, Clone, Default)]
pub struct FormatEngine {
    config: RankConfig,
}

impl FormatEngine {
    /// Create an engine with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RankConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    /// Rank formats worst to best using the configured key order
    pub fn rank(&self, formats: Vec<FormatRecord>) -> Vec<FormatRecord> {
        Ranker::new(&self.config).rank(formats, None)
    }

    /// Rank with an explicit key order, overriding the configured one
    pub fn rank_by(
        &self,
        formats: Vec<FormatRecord>,
        field_preference: &[SortField],
    ) -> Vec<FormatRecord> {
        Ranker::new(&self.config).rank(formats, Some(field_preference))
    }

    /// Everything `choose` does short of selection: the ranked candidates.
    pub fn prepare(&self, mut formats: Vec<FormatRecord>) -> Vec<FormatRecord> {
        normalize_formats(&mut formats);
        remove_duplicate_formats(&mut formats);

        let mut ranked = self.rank(formats);
        if let Some(limit) = &self.config.format_limit {
            apply_format_limit(&mut ranked, limit);
        }
        ranked
    }

    /// Pick the formats a format spec asks for
    pub fn choose(
        &self,
        formats: Vec<FormatRecord>,
        spec: &str,
    ) -> Result<Vec<FormatRecord>, SelectError> {
        let ranked = self.prepare(formats);
        let chosen = select(&ranked, spec)?;

        info!(
            "Selected format(s) {} for {:?}",
            chosen
                .iter()
                .map(|f| f.format_id.as_str())
                .collect::<Vec<_>>()
                .join("+"),
            spec
        );
        Ok(chosen)
    }

    pub fn choose_for(
        &self,
        video: &VideoInfo,
        spec: &str,
    ) -> Result<Vec<FormatRecord>, SelectError> {
        info!("{}: choosing among {} formats", video.id, video.formats.len());
        self.choose(video.formats.clone(), spec)
    }
}

/// Drop everything ranked above `limit`. Unknown ids leave the list alone.
fn apply_format_limit(ranked: &mut Vec<FormatRecord>, limit: &str) {
    if let Some(pos) = ranked.iter().position(|f| f.format_id == limit) {
        debug!("Format limit {}: dropping {} better format(s)", limit, ranked.len() - pos - 1);
        ranked.truncate(pos + 1);
    }
}
