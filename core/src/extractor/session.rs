use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Mutable state shared by every extractor call of one job.
///
/// Extractors use the string cache for tokens, cookies or anything else
/// worth reusing between redirects and playlist entries.
#[derive(Debug, Clone)]
pub struct SessionContext {
    job_id: Uuid,
    created_at: DateTime<Utc>,
    values: HashMap<String, String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            job_id: Uuid::new_v4(),
            created_at: Utc::now(),
            values: HashMap::new(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
