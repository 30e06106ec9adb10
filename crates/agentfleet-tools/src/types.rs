use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One tool entry as declared in a tenant's manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifestEntry {
    pub name: String,
    pub description: String,
    /// Path to the executable script, relative to the tenant's tool directory.
    pub script: String,
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// A tenant's loaded and validated tool manifest, cached for
/// [`crate::runtime::MANIFEST_CACHE_TTL_SECS`].
#[derive(Debug, Clone)]
pub struct ToolManifest {
    pub tenant_id: String,
    pub tools_dir: PathBuf,
    pub entries: Vec<ToolManifestEntry>,
}

impl ToolManifest {
    pub fn find(&self, name: &str) -> Option<&ToolManifestEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}
