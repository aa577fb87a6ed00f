//! On-disk layout under `<data_dir>/store/users/<identity>/` (spec §6):
//! `.keystore` (metadata), `keys/<ADDRESS>.key` (one encrypted envelope per
//! record). Every write goes through [`atomic_write`] — write to a sibling
//! temp file, `fsync`, then rename — so a crash mid-write never leaves a
//! half-written file behind (spec §4.1: "the keystore never partially
//! persists").

use crate::error::{KeystoreError, Result};
use crate::model::KeystoreMetadata;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct IdentityStore {
    root: PathBuf,
}

impl IdentityStore {
    pub fn new(data_dir: impl AsRef<Path>, identity: &str) -> Self {
        Self {
            root: data_dir.as_ref().join("store").join("users").join(identity),
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(".keystore")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.root.join("keys")
    }

    pub fn key_file_path(&self, address: &str) -> PathBuf {
        self.keys_dir().join(format!("{address}.key"))
    }

    pub fn token_path(&self) -> PathBuf {
        self.root.join("aplane.token")
    }

    pub fn metadata_exists(&self) -> bool {
        self.metadata_path().is_file()
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.keys_dir())
            .map_err(|e| KeystoreError::DiskPersistence(format!("create store dirs: {e}")))
    }

    pub fn load_metadata(&self) -> Result<KeystoreMetadata> {
        let bytes = fs::read(self.metadata_path())
            .map_err(|e| KeystoreError::DiskPersistence(format!("read .keystore: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| KeystoreError::MalformedKeyFile(".keystore".into(), e.to_string()))
    }

    pub fn save_metadata(&self, metadata: &KeystoreMetadata) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(metadata)
            .map_err(|e| KeystoreError::DiskPersistence(format!("encode .keystore: {e}")))?;
        atomic_write(&self.metadata_path(), &bytes)
    }

    /// List every `<ADDRESS>.key` file's address stem, in directory order.
    /// Order is not semantically meaningful; [`crate::cache::Cache`] sorts
    /// for checksum stability.
    pub fn list_key_files(&self) -> Result<Vec<String>> {
        let dir = self.keys_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut addresses = Vec::new();
        for entry in fs::read_dir(&dir)
            .map_err(|e| KeystoreError::DiskPersistence(format!("read keys dir: {e}")))?
        {
            let entry =
                entry.map_err(|e| KeystoreError::DiskPersistence(format!("read dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("key") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    addresses.push(stem.to_string());
                }
            }
        }
        Ok(addresses)
    }

    pub fn read_key_envelope(&self, address: &str) -> Result<Vec<u8>> {
        fs::read(self.key_file_path(address))
            .map_err(|e| KeystoreError::DiskPersistence(format!("read key file: {e}")))
    }

    pub fn write_key_envelope(&self, address: &str, envelope: &[u8]) -> Result<()> {
        atomic_write(&self.key_file_path(address), envelope)
    }

    pub fn delete_key_file(&self, address: &str) -> Result<()> {
        let path = self.key_file_path(address);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| KeystoreError::DiskPersistence(format!("remove key file: {e}")))?;
        }
        Ok(())
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .expect("key/metadata paths always have a parent directory");
    fs::create_dir_all(parent)
        .map_err(|e| KeystoreError::DiskPersistence(format!("create parent dir: {e}")))?;
    let tmp_path = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));
    {
        let mut tmp = fs::File::create(&tmp_path)
            .map_err(|e| KeystoreError::DiskPersistence(format!("create temp file: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| KeystoreError::DiskPersistence(format!("write temp file: {e}")))?;
        tmp.sync_all()
            .map_err(|e| KeystoreError::DiskPersistence(format!("fsync temp file: {e}")))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        KeystoreError::DiskPersistence(format!("rename into place: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path(), "default");
        store.ensure_dirs().unwrap();
        let metadata = KeystoreMetadata {
            format_version: 1,
            salt: vec![1, 2, 3],
            verification_ciphertext: vec![4, 5, 6],
        };
        store.save_metadata(&metadata).unwrap();
        assert!(store.metadata_exists());
        let loaded = store.load_metadata().unwrap();
        assert_eq!(loaded.salt, metadata.salt);
    }

    #[test]
    fn key_file_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path(), "default");
        store.ensure_dirs().unwrap();
        store.write_key_envelope("ADDR1", b"envelope-bytes").unwrap();
        assert_eq!(store.list_key_files().unwrap(), vec!["ADDR1".to_string()]);
        assert_eq!(store.read_key_envelope("ADDR1").unwrap(), b"envelope-bytes");
        store.delete_key_file("ADDR1").unwrap();
        assert!(store.list_key_files().unwrap().is_empty());
    }
}
