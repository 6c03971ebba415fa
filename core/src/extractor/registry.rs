use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use super::direct::DirectFileExtractor;
use super::session::SessionContext;
use super::types::*;
use crate::format::VideoInfo;

/// Redirect chains longer than this are reported as unsupported.
const MAX_REDIRECTS: usize = 8;

/// Fully resolved outcome of [`ExtractorRegistry::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Video(VideoInfo),
    /// Nested playlists are flattened; entries that failed keep their error.
    Playlist {
        title: Option<String>,
        entries: Vec<Result<VideoInfo, ExtractionFailure>>,
    },
}

/// A redirect chain ends in one of these.
enum Terminal {
    Video(VideoInfo),
    Playlist {
        /// Url whose extraction produced the playlist
        source: String,
        title: Option<String>,
        entries: Vec<ExtractionResult>,
    },
}

/// Ordered set of extractors; the first suitable one wins.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registry holding only the built-in direct file extractor.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DirectFileExtractor::new()));
        registry
    }

    pub fn register(&mut self, extractor: Box<dyn Extractor>) -> &mut Self {
        debug!("Registered extractor: {}", extractor.key());
        self.extractors.push(extractor);
        self
    }

    pub fn keys(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.key()).collect()
    }

    /// A hint names the extractor directly; otherwise ask each in turn.
    pub fn find(&self, url: &str, hint: Option<&str>) -> Option<&dyn Extractor> {
        let by_hint = hint.and_then(|key| self.extractors.iter().find(|e| e.key() == key));
        by_hint
            .or_else(|| self.extractors.iter().find(|e| e.suitable(url)))
            .map(|e| e.as_ref())
    }

    /// Extract `url`, follow redirects and flatten playlists.
    pub async fn resolve(
        &self,
        url: &str,
        session: &mut SessionContext,
    ) -> Result<Resolved, ExtractionFailure> {
        info!("Resolving {} (job {})", url, session.job_id());

        let (source, title, entries) = match self.follow(url.to_string(), None, session, 0).await? {
            Terminal::Video(info) => return Ok(Resolved::Video(info)),
            Terminal::Playlist {
                source,
                title,
                entries,
            } => (source, title, entries),
        };

        // Each playlist url is expanded at most once.
        let mut expanded = HashSet::from([source]);
        let mut pending: VecDeque<ExtractionResult> = entries.into();
        let mut videos = Vec::new();

        while let Some(entry) = pending.pop_front() {
            match entry {
                ExtractionResult::Direct(info) => videos.push(Ok(info)),
                ExtractionResult::Playlist { entries, .. } => {
                    for nested in entries.into_iter().rev() {
                        pending.push_front(nested);
                    }
                }
                ExtractionResult::Redirect { url, hint } => {
                    match self.follow(url.clone(), hint, session, 0).await {
                        Ok(Terminal::Video(info)) => videos.push(Ok(info)),
                        Ok(Terminal::Playlist { source, entries, .. }) => {
                            if !expanded.insert(source.clone()) {
                                warn!("Skipping playlist entry {}: {} already expanded", url, source);
                                videos.push(Err(ExtractionFailure::unsupported(format!(
                                    "Playlist {} was already expanded",
                                    source
                                ))));
                                continue;
                            }
                            pending.push_front(ExtractionResult::Playlist {
                                title: None,
                                entries,
                            });
                        }
                        Err(e) => {
                            warn!("Skipping playlist entry {}: {}", url, e);
                            videos.push(Err(e));
                        }
                    }
                }
            }
        }

        info!("Playlist resolved: {} entries", videos.len());
        Ok(Resolved::Playlist {
            title,
            entries: videos,
        })
    }

    fn follow<'a>(
        &'a self,
        url: String,
        hint: Option<String>,
        session: &'a mut SessionContext,
        depth: usize,
    ) -> BoxFuture<'a, Result<Terminal, ExtractionFailure>> {
        async move {
            if depth > MAX_REDIRECTS {
                return Err(ExtractionFailure::unsupported(format!(
                    "Too many redirects while resolving {}",
                    url
                )));
            }

            let extractor = self.find(&url, hint.as_deref()).ok_or_else(|| {
                ExtractionFailure::unsupported(format!("No extractor found for URL: {}", url))
            })?;
            debug!("[{}] Extracting {}", extractor.key(), url);

            let result = extractor.extract(&url, session).await?;
            match result {
                ExtractionResult::Direct(info) => Ok(Terminal::Video(info)),
                ExtractionResult::Playlist { title, entries } => Ok(Terminal::Playlist {
                    source: url,
                    title,
                    entries,
                }),
                ExtractionResult::Redirect { url, hint } => {
                    self.follow(url, hint, session, depth + 1).await
                }
            }
        }
        .boxed()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Redirects every url it sees to `target`.
    struct Forwarder {
        key: &'static str,
        prefix: &'static str,
        target: &'static str,
        hint: Option<&'static str>,
    }

    #[async_trait]
    impl Extractor for Forwarder {
        fn key(&self) -> &str {
            self.key
        }

        fn suitable(&self, url: &str) -> bool {
            url.starts_with(self.prefix)
        }

        async fn extract(
            &self,
            _url: &str,
            _session: &mut SessionContext,
        ) -> Result<ExtractionResult, ExtractionFailure> {
            Ok(ExtractionResult::Redirect {
                url: self.target.to_string(),
                hint: self.hint.map(|h| h.to_string()),
            })
        }
    }

    struct Lister;

    #[async_trait]
    impl Extractor for Lister {
        fn key(&self) -> &str {
            "lister"
        }

        fn suitable(&self, url: &str) -> bool {
            url.starts_with("list://")
        }

        async fn extract(
            &self,
            _url: &str,
            _session: &mut SessionContext,
        ) -> Result<ExtractionResult, ExtractionFailure> {
            Ok(ExtractionResult::Playlist {
                title: Some("mix".to_string()),
                entries: vec![
                    ExtractionResult::Redirect {
                        url: "https://cdn.example.com/one.mp4".to_string(),
                        hint: None,
                    },
                    ExtractionResult::Playlist {
                        title: None,
                        entries: vec![ExtractionResult::Redirect {
                            url: "https://cdn.example.com/two.mp3".to_string(),
                            hint: None,
                        }],
                    },
                    ExtractionResult::Redirect {
                        url: "gopher://nowhere".to_string(),
                        hint: None,
                    },
                ],
            })
        }
    }

    /// `list://a` lists `list://b`, which lists `list://a` and a file.
    struct Cycle;

    #[async_trait]
    impl Extractor for Cycle {
        fn key(&self) -> &str {
            "cycle"
        }

        fn suitable(&self, url: &str) -> bool {
            url.starts_with("list://")
        }

        async fn extract(
            &self,
            url: &str,
            _session: &mut SessionContext,
        ) -> Result<ExtractionResult, ExtractionFailure> {
            let redirect = |target: &str| ExtractionResult::Redirect {
                url: target.to_string(),
                hint: None,
            };
            let entries = match url {
                "list://self" => vec![redirect("list://self")],
                "list://a" => vec![redirect("list://b")],
                _ => vec![redirect("list://a"), redirect("https://cdn.example.com/b1.mp4")],
            };
            Ok(ExtractionResult::Playlist {
                title: Some(url.to_string()),
                entries,
            })
        }
    }

    #[tokio::test]
    async fn test_resolve_direct() {
        let registry = ExtractorRegistry::with_defaults();
        let mut session = SessionContext::new();

        let resolved = registry
            .resolve("https://cdn.example.com/a.webm", &mut session)
            .await
            .unwrap();
        match resolved {
            Resolved::Video(info) => assert_eq!(info.id, "a"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_follows_redirect_hint() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Box::new(Forwarder {
            key: "short",
            prefix: "https://sho.rt/",
            // Not recognisable by extension, so only the hint can route it.
            target: "https://cdn.example.com/stream",
            hint: Some("direct"),
        }));
        let mut session = SessionContext::new();

        let err = registry
            .resolve("https://sho.rt/x", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Unsupported);
        assert!(err.message.contains("Not a direct media file"));
    }

    #[tokio::test]
    async fn test_resolve_redirect_by_suitability() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Box::new(Forwarder {
            key: "short",
            prefix: "https://sho.rt/",
            target: "https://cdn.example.com/b.mp4",
            hint: None,
        }));
        let mut session = SessionContext::new();

        let resolved = registry.resolve("https://sho.rt/b", &mut session).await.unwrap();
        assert!(matches!(resolved, Resolved::Video(ref info) if info.id == "b"));
    }

    #[tokio::test]
    async fn test_redirect_loop_is_unsupported() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(Forwarder {
            key: "loop",
            prefix: "loop://",
            target: "loop://again",
            hint: None,
        }));
        let mut session = SessionContext::new();

        let err = registry.resolve("loop://start", &mut session).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Unsupported);
        assert!(err.message.contains("Too many redirects"));
    }

    #[tokio::test]
    async fn test_unknown_url_is_unsupported() {
        let registry = ExtractorRegistry::with_defaults();
        let mut session = SessionContext::new();

        let err = registry
            .resolve("https://example.com/watch?v=1", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Unsupported);
    }

    #[tokio::test]
    async fn test_playlist_is_flattened() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Box::new(Lister));
        let mut session = SessionContext::new();

        let resolved = registry.resolve("list://mix", &mut session).await.unwrap();
        let Resolved::Playlist { title, entries } = resolved else {
            panic!("expected a playlist");
        };
        assert_eq!(title.as_deref(), Some("mix"));
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].as_ref().unwrap().id, "one");
        assert_eq!(entries[1].as_ref().unwrap().id, "two");
        assert_eq!(entries[2].as_ref().unwrap_err().kind, FailureKind::Unsupported);
    }

    #[tokio::test]
    async fn test_self_referencing_playlist_terminates() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Box::new(Cycle));
        let mut session = SessionContext::new();

        let resolved = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            registry.resolve("list://self", &mut session),
        )
        .await
        .expect("resolve should finish")
        .unwrap();

        let Resolved::Playlist { entries, .. } = resolved else {
            panic!("expected a playlist");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_ref().unwrap_err().kind, FailureKind::Unsupported);
    }

    #[tokio::test]
    async fn test_mutually_nested_playlists_expand_once() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Box::new(Cycle));
        let mut session = SessionContext::new();

        let resolved = registry.resolve("list://a", &mut session).await.unwrap();
        let Resolved::Playlist { title, entries } = resolved else {
            panic!("expected a playlist");
        };
        assert_eq!(title.as_deref(), Some("list://a"));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].as_ref().unwrap_err().kind, FailureKind::Unsupported);
        assert_eq!(entries[1].as_ref().unwrap().id, "b1");
    }

    #[test]
    fn test_find_prefers_hint() {
        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(Box::new(Lister));

        assert_eq!(registry.keys(), vec!["direct", "lister"]);
        let found = registry.find("https://cdn.example.com/a.mp4", Some("lister"));
        assert_eq!(found.map(|e| e.key()), Some("lister"));
        let found = registry.find("https://cdn.example.com/a.mp4", Some("missing"));
        assert_eq!(found.map(|e| e.key()), Some("direct"));
    }
}
