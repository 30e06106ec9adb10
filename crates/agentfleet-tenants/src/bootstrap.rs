//! Per-tenant filesystem bootstrap: ensures the fixed skeleton under
//! `tenants/<id>/` exists on first use per process. Creation is additive
//! only — existing files and directories are never overwritten.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Absolute path to a tenant's filesystem root: `<root_dir>/<tenant_id>/`.
pub fn tenant_dir(root_dir: &Path, tenant_id: &str) -> PathBuf {
    root_dir.join(tenant_id)
}

/// Create every fixed file/directory a tenant's root is guaranteed to have,
/// if it doesn't already exist. Safe to call on every process startup and
/// on every first-touch of a tenant within a process.
pub fn ensure(root_dir: &Path, tenant_id: &str) -> Result<()> {
    let root = tenant_dir(root_dir, tenant_id);

    std::fs::create_dir_all(&root)?;
    std::fs::create_dir_all(root.join("shared-tools"))?;
    std::fs::create_dir_all(root.join("state"))?;
    std::fs::create_dir_all(root.join("timeline"))?;
    std::fs::create_dir_all(root.join("life"))?;
    std::fs::create_dir_all(root.join("life").join("people"))?;
    std::fs::create_dir_all(root.join("life").join("notes"))?;

    create_if_absent(&root.join("settings.json"), "{}\n")?;
    create_if_absent(&root.join("permissions.json"), "{}\n")?;
    create_if_absent(&root.join("history.jsonl"), "")?;

    debug!(tenant_id, root = %root.display(), "tenant filesystem bootstrap ensured");
    Ok(())
}

fn create_if_absent(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_full_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        ensure(dir.path(), "tenant-1").unwrap();

        let root = tenant_dir(dir.path(), "tenant-1");
        assert!(root.join("shared-tools").is_dir());
        assert!(root.join("state").is_dir());
        assert!(root.join("timeline").is_dir());
        assert!(root.join("life").join("people").is_dir());
        assert!(root.join("settings.json").is_file());
        assert!(root.join("permissions.json").is_file());
        assert!(root.join("history.jsonl").is_file());
    }

    #[test]
    fn is_additive_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        ensure(dir.path(), "tenant-1").unwrap();

        let root = tenant_dir(dir.path(), "tenant-1");
        std::fs::write(root.join("settings.json"), "{\"custom\":true}\n").unwrap();

        ensure(dir.path(), "tenant-1").unwrap();

        let contents = std::fs::read_to_string(root.join("settings.json")).unwrap();
        assert_eq!(contents, "{\"custom\":true}\n");
    }
}
