use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MonitorError, MonitorResult};

/// On-disk envelope around one opaque blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBlob {
    pub key: String,
    pub saved_at: String,
    pub bytes: Vec<u8>,
}

/// Namespaced key-value store for the fusion library's calibration state.
///
/// Each key lives in `<root>/<namespace>/<key>.json`. Blobs that are empty or
/// larger than `max_blob_size` are treated as absent on load and refused on save.
pub struct StateStore {
    dir: PathBuf,
    max_blob_size: usize,
}

/// Namespaces and keys become path components, so they must stay a single one
fn check_name(kind: &str, name: &str) -> MonitorResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(MonitorError::InvalidParameters(format!(
            "bad state {} {:?}",
            kind, name
        )));
    }
    Ok(())
}

impl StateStore {
    pub fn open(root: &Path, namespace: &str, max_blob_size: usize) -> MonitorResult<Self> {
        check_name("namespace", namespace)?;
        let dir = root.join(namespace);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_blob_size })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn load(&self, key: &str) -> MonitorResult<Option<Vec<u8>>> {
        check_name("key", key)?;
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path)?;
        let stored: StoredBlob = serde_json::from_str(&text)?;
        let len = stored.bytes.len();
        if len == 0 || len > self.max_blob_size {
            log::warn!(
                "Ignoring state blob {} ({} bytes, limit {})",
                path.display(),
                len,
                self.max_blob_size
            );
            return Ok(None);
        }
        Ok(Some(stored.bytes))
    }

    pub fn save(&self, key: &str, blob: &[u8]) -> MonitorResult<()> {
        check_name("key", key)?;
        if blob.is_empty() || blob.len() > self.max_blob_size {
            return Err(MonitorError::InvalidParameters(format!(
                "state blob of {} bytes (limit {})",
                blob.len(),
                self.max_blob_size
            )));
        }

        let stored = StoredBlob {
            key: key.to_string(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            bytes: blob.to_vec(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        // Write then rename so a crash never leaves a half-written blob
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
pub(crate) fn scratch_dir(tag: &str) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!(
        "air_monitor_{}_{}_{}",
        tag,
        std::process::id(),
        nanos
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let root = scratch_dir("store_roundtrip");
        let store = StateStore::open(&root, "bsec2", 16).unwrap();

        assert_eq!(store.load("state").unwrap(), None);
        store.save("state", &[1, 2, 3, 250]).unwrap();
        assert_eq!(store.load("state").unwrap(), Some(vec![1, 2, 3, 250]));
        assert!(store.dir().join("state.json").exists());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_rejects_oversized_blob() {
        let root = scratch_dir("store_oversized");
        let store = StateStore::open(&root, "bsec2", 4).unwrap();

        assert!(store.save("state", &[0; 5]).is_err());
        assert!(store.save("state", &[]).is_err());

        // A blob written by a store with a larger limit is ignored on load
        let big = StateStore::open(&root, "bsec2", 64).unwrap();
        big.save("state", &[7; 10]).unwrap();
        assert_eq!(store.load("state").unwrap(), None);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_corrupt_blob_is_error() {
        let root = scratch_dir("store_corrupt");
        let store = StateStore::open(&root, "bsec2", 16).unwrap();
        fs::write(store.dir().join("state.json"), "{ not json").unwrap();

        assert!(matches!(store.load("state"), Err(MonitorError::Storage(_))));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_bad_namespace() {
        let root = scratch_dir("store_ns");
        assert!(StateStore::open(&root, "", 16).is_err());
        assert!(StateStore::open(&root, "a/b", 16).is_err());
        assert!(StateStore::open(&root, "..", 16).is_err());
    }

    #[test]
    fn test_key_cannot_escape_namespace() {
        let root = scratch_dir("store_key");
        let store = StateStore::open(&root, "bsec2", 16).unwrap();

        for key in ["../../x", "..", "a\\b", ""] {
            assert!(matches!(
                store.save(key, &[1, 2, 3]),
                Err(MonitorError::InvalidParameters(_))
            ));
            assert!(store.load(key).is_err());
        }
        assert!(!root.join("x.json").exists());

        let _ = fs::remove_dir_all(root);
    }
}
