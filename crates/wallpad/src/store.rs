//! On-disk list of known identities, so entities survive restarts before the
//! bus reports them again.

use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use wallpad_packet::Identity;

use crate::error::Error;
use crate::error::Result;
use crate::error::StoreError;

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredRegistry {
    version: u32,
    entities: Vec<Identity>,
}

#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read persisted identities. A missing file is an empty registry.
    pub async fn load(&self) -> Result<Vec<Identity>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No registry at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.error(e.into())),
        };

        let stored: StoredRegistry =
            serde_json::from_slice(&contents).map_err(|e| self.error(e.into()))?;
        if stored.version != STORE_VERSION {
            return Err(self.error(StoreError::Version(stored.version)));
        }
        Ok(stored.entities)
    }

    /// Replace the persisted identities.
    ///
    /// Writes a sibling temp file and renames it over the target, so a crash
    /// leaves either the old or the new list.
    pub async fn save(&self, identities: &[Identity]) -> Result<()> {
        let stored = StoredRegistry {
            version: STORE_VERSION,
            entities: identities.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&stored).map_err(|e| self.error(e.into()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.error(e.into()))?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.error(e.into()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.error(e.into()))?;

        debug!(
            "Saved {} entities to {}",
            identities.len(),
            self.path.display()
        );
        Ok(())
    }

    fn error(&self, source: StoreError) -> Error {
        Error::Store(self.path.clone(), source)
    }
}

#[cfg(test)]
mod tests {
    use wallpad_packet::DeviceKind;

    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("entities.json"));

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path().join("state").join("entities.json"));
        let identities = vec![
            Identity::new(DeviceKind::Light, 1, 0),
            Identity::new(DeviceKind::AwayGas, 1, 1),
            Identity::new(DeviceKind::Thermostat, 2, 0),
        ];

        store.save(&identities).await.unwrap();
        assert_eq!(store.load().await.unwrap(), identities);

        store.save(&identities[..1]).await.unwrap();
        assert_eq!(store.load().await.unwrap(), identities[..1]);
        assert!(!dir.path().join("state").join("entities.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        let store = RegistryStore::new(&path);

        store
            .save(&[Identity::new(DeviceKind::AwayLight, 1, 1)])
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "version": 1,
                "entities": [{"kind": "away_light", "room": 1, "channel": 1}],
            })
        );
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        std::fs::write(&path, "not json").unwrap();

        match RegistryStore::new(&path).load().await {
            Err(Error::Store(p, StoreError::Json(_))) => assert_eq!(p, path),
            other => panic!("expected a JSON store error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        std::fs::write(&path, r#"{"version": 9, "entities": []}"#).unwrap();

        assert!(matches!(
            RegistryStore::new(&path).load().await,
            Err(Error::Store(_, StoreError::Version(9)))
        ));
    }
}
