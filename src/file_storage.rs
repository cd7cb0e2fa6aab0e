use std::fs;
use std::path::{Path, PathBuf};

use finlog_core::storage::{KeyValueStore, StorageError};

/// File-backed key-value store: one file per key under a data directory.
/// Writes go to a temp file first and are renamed into place so a crash
/// mid-write never leaves a half-written primary blob.
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(sanitize_key(key))
    }
}

/// Keys become file names, so anything outside a conservative character set
/// is replaced.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let wanted = sanitize_key(prefix);
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&wanted) && !name.ends_with(".tmp") {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();

        assert_eq!(kv.get("finlog_records").unwrap(), None);
        kv.set("finlog_records", "{\"version\":1}").unwrap();
        assert_eq!(
            kv.get("finlog_records").unwrap().as_deref(),
            Some("{\"version\":1}")
        );

        kv.remove("finlog_records").unwrap();
        assert_eq!(kv.get("finlog_records").unwrap(), None);
    }

    #[test]
    fn prefix_scan_sorts_keys() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();
        kv.set("finlog_backup_200", "b").unwrap();
        kv.set("finlog_backup_100", "a").unwrap();
        kv.set("finlog_records", "r").unwrap();

        let keys = kv.keys_with_prefix("finlog_backup_").unwrap();
        assert_eq!(keys, vec!["finlog_backup_100", "finlog_backup_200"]);
    }

    #[test]
    fn hostile_keys_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path()).unwrap();
        kv.set("../escape", "v").unwrap();
        assert_eq!(kv.get("../escape").unwrap().as_deref(), Some("v"));
        // The file lands inside the data dir, not its parent
        assert!(dir.path().join(".._escape").exists());
    }
}
