pub mod error;
pub mod manifest;
pub mod runtime;
pub mod types;

pub use error::{Result, ToolError};
pub use runtime::{ToolRuntime, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_CAP_BYTES, DEFAULT_TIMEOUT_MS, MANIFEST_CACHE_TTL_SECS};
pub use types::{ToolManifest, ToolManifestEntry};
