use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::types::{ToolManifest, ToolManifestEntry};

/// Load and validate `tools_dir/manifest.json`. Entries whose script file is
/// missing or whose `input_schema` is not a JSON object are skipped with a
/// warning rather than failing the whole load.
pub fn load(tenant_id: &str, tools_dir: &Path) -> Result<ToolManifest> {
    let manifest_path = tools_dir.join("manifest.json");
    let raw = match std::fs::read_to_string(&manifest_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ToolManifest {
                tenant_id: tenant_id.to_string(),
                tools_dir: tools_dir.to_path_buf(),
                entries: Vec::new(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let declared: Vec<ToolManifestEntry> = serde_json::from_str(&raw)
        .map_err(|e| crate::error::ToolError::Manifest(format!("malformed manifest.json: {e}")))?;

    let mut entries = Vec::with_capacity(declared.len());
    for entry in declared {
        if !entry.input_schema.is_object() {
            warn!(tenant_id, tool = %entry.name, "skipping tool with malformed input_schema");
            continue;
        }
        let script_path = tools_dir.join(&entry.script);
        if !script_path.is_file() {
            warn!(tenant_id, tool = %entry.name, path = %script_path.display(), "skipping tool with missing script");
            continue;
        }
        entries.push(entry);
    }

    Ok(ToolManifest {
        tenant_id: tenant_id.to_string(),
        tools_dir: tools_dir.to_path_buf(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_entries_with_missing_script_or_bad_schema() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.sh"), "#!/bin/sh\n").unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"[
                {"name":"ok","description":"d","script":"present.sh","input_schema":{}},
                {"name":"missing_script","description":"d","script":"absent.sh","input_schema":{}},
                {"name":"bad_schema","description":"d","script":"present.sh","input_schema":"oops"}
            ]"#,
        )
        .unwrap();

        let manifest = load("tenant-1", dir.path()).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].name, "ok");
    }

    #[test]
    fn missing_manifest_file_yields_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = load("tenant-1", dir.path()).unwrap();
        assert!(manifest.entries.is_empty());
    }
}
