use std::fs;
use std::os::unix::fs as unix_fs;
use std::path::PathBuf;

use crate::error::OtaError;

/// Double-buffered version directory: each release lands in its own
/// `versions/{version}/` directory, and a `current` symlink is swapped with
/// a single atomic rename to activate it. A failed swap back-out is just
/// another atomic rename, never a partial file copy.
pub struct VersionStore {
    root: PathBuf,
}

impl VersionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    fn current_link(&self) -> PathBuf {
        self.root.join("current")
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    /// Write `package_bytes` into a fresh `versions/{version}/` directory.
    pub fn stage(&self, version: &str, binary_name: &str, package_bytes: &[u8]) -> Result<(), OtaError> {
        let dir = self.version_dir(version);
        fs::create_dir_all(&dir).map_err(|e| OtaError::StageFailed(e.to_string()))?;
        fs::write(dir.join(binary_name), package_bytes).map_err(|e| OtaError::StageFailed(e.to_string()))?;
        Ok(())
    }

    /// The version the `current` symlink points at, if any.
    pub fn current_version(&self) -> Option<String> {
        let target = fs::read_link(self.current_link()).ok()?;
        target.file_name()?.to_str().map(str::to_string)
    }

    /// Atomically repoint `current` at `version`'s directory. Builds the new
    /// link under a temp name then renames over the old one, so readers of
    /// `current` never observe a half-updated link.
    pub fn swap_to(&self, version: &str) -> Result<(), OtaError> {
        let target = self.version_dir(version);
        if !target.exists() {
            return Err(OtaError::SwapFailed(format!("version dir missing: {version}")));
        }

        let tmp_link = self.root.join("current.tmp");
        if tmp_link.exists() || fs::symlink_metadata(&tmp_link).is_ok() {
            let _ = fs::remove_file(&tmp_link);
        }
        unix_fs::symlink(&target, &tmp_link).map_err(|e| OtaError::SwapFailed(e.to_string()))?;
        fs::rename(&tmp_link, self.current_link()).map_err(|e| OtaError::SwapFailed(e.to_string()))?;
        Ok(())
    }

    /// Delete staged versions beyond the most recent `keep`, by semver order,
    /// never touching whatever `current` points at even if it's older than
    /// the cutoff — a rollback target must survive pruning. Mirrors the
    /// reference appliance's double-buffered retention policy.
    pub fn prune_old_versions(&self, keep: usize) -> Result<(), OtaError> {
        let dir = self.versions_dir();
        let Ok(entries) = fs::read_dir(&dir) else {
            return Ok(());
        };

        let mut versions: Vec<semver::Version> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter_map(|name| semver::Version::parse(&name).ok())
            .collect();
        versions.sort();

        if versions.len() <= keep {
            return Ok(());
        }

        let current = self.current_version();
        let cutoff = versions.len() - keep;
        for version in &versions[..cutoff] {
            let version_str = version.to_string();
            if current.as_deref() == Some(version_str.as_str()) {
                continue;
            }
            let _ = fs::remove_dir_all(self.version_dir(&version_str));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_then_swap_points_current_at_the_new_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(dir.path());

        store.stage("1.0.0", "station", b"binary-v1").unwrap();
        store.swap_to("1.0.0").unwrap();
        assert_eq!(store.current_version().as_deref(), Some("1.0.0"));

        store.stage("1.1.0", "station", b"binary-v2").unwrap();
        store.swap_to("1.1.0").unwrap();
        assert_eq!(store.current_version().as_deref(), Some("1.1.0"));
    }

    #[test]
    fn swap_can_roll_back_to_a_prior_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(dir.path());

        store.stage("1.0.0", "station", b"binary-v1").unwrap();
        store.swap_to("1.0.0").unwrap();
        store.stage("1.1.0", "station", b"binary-v2").unwrap();
        store.swap_to("1.1.0").unwrap();

        store.swap_to("1.0.0").unwrap();
        assert_eq!(store.current_version().as_deref(), Some("1.0.0"));
    }

    #[test]
    fn swap_to_missing_version_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(dir.path());
        assert!(store.swap_to("9.9.9").is_err());
    }

    #[test]
    fn prune_keeps_the_newest_versions_and_the_current_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(dir.path());

        for v in ["1.0.0", "1.1.0", "1.2.0", "1.3.0"] {
            store.stage(v, "station", b"binary").unwrap();
        }
        store.swap_to("1.0.0").unwrap();

        store.prune_old_versions(2).unwrap();

        assert!(store.version_dir("1.0.0").exists(), "current version must survive pruning");
        assert!(!store.version_dir("1.1.0").exists());
        assert!(store.version_dir("1.2.0").exists());
        assert!(store.version_dir("1.3.0").exists());
    }

    #[test]
    fn prune_is_a_no_op_when_within_the_retention_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(dir.path());
        store.stage("1.0.0", "station", b"binary").unwrap();

        store.prune_old_versions(2).unwrap();
        assert!(store.version_dir("1.0.0").exists());
    }
}
