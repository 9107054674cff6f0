use crate::error::OtaError;

/// Versions that failed verification or health-check once and are never
/// retried automatically. Persisted so a reboot doesn't re-attempt a version
/// already known bad.
pub struct SkipList {
    tree: sled::Tree,
}

impl SkipList {
    pub fn open(db: &sled::Db) -> Result<Self, OtaError> {
        Ok(Self {
            tree: db.open_tree("ota_skip_list")?,
        })
    }

    pub fn add(&self, version: &str, reason: &str) -> Result<(), OtaError> {
        self.tree.insert(version.as_bytes(), reason.as_bytes())?;
        Ok(())
    }

    pub fn contains(&self, version: &str) -> Result<bool, OtaError> {
        Ok(self.tree.contains_key(version.as_bytes())?)
    }

    pub fn reason(&self, version: &str) -> Result<Option<String>, OtaError> {
        match self.tree.get(version.as_bytes())? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_version_is_reported_as_contained() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let skip_list = SkipList::open(&db).unwrap();

        assert!(!skip_list.contains("1.2.3").unwrap());
        skip_list.add("1.2.3", "health check failed").unwrap();
        assert!(skip_list.contains("1.2.3").unwrap());
    }
}
