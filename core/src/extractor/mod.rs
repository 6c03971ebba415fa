//! The boundary between site extractors and the ranking engine.
//!
//! Extractors are plain trait objects collected in an [`ExtractorRegistry`].
//! They report what they found as an [`ExtractionResult`] and expected
//! failures (geo blocks, removed videos, ...) as an [`ExtractionFailure`].
//! Per-job state lives in a [`SessionContext`] handed to every call.

mod direct;
mod json_api;
mod registry;
mod session;
mod types;

pub use direct::DirectFileExtractor;
pub use json_api::JsonApiExtractor;
pub use registry::{ExtractorRegistry, Resolved};
pub use session::SessionContext;
pub use types::*;
