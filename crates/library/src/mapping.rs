use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::LibraryError;

/// Sources already copied into the library, keyed by absolute source path.
pub struct MappingStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl MappingStore {
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let entries = if path.exists() {
            let contents = fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn target_of(&self, source: &Path) -> Option<&str> {
        self.entries
            .get(source.to_string_lossy().as_ref())
            .map(String::as_str)
    }

    pub fn contains(&self, source: &Path) -> bool {
        self.target_of(source).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records `source -> target` and saves the store right away.
    pub fn record(&mut self, source: &Path, target: &Path) -> Result<(), LibraryError> {
        self.entries.insert(
            source.to_string_lossy().to_string(),
            target.to_string_lossy().to_string(),
        );
        self.save()?;
        info!("Recorded {:?} -> {:?}", source, target);
        Ok(())
    }

    pub fn save(&self) -> Result<(), LibraryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MappingStore;
    use std::path::Path;

    #[test]
    fn records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        let mut store = MappingStore::load(&path).unwrap();
        assert!(store.is_empty());

        store
            .record(Path::new("/incoming/album"), Path::new("/music/[2020] Album [FLAC]"))
            .unwrap();

        let reloaded = MappingStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains(Path::new("/incoming/album")));
        assert_eq!(
            reloaded.target_of(Path::new("/incoming/album")),
            Some("/music/[2020] Album [FLAC]")
        );
        assert!(!reloaded.contains(Path::new("/incoming/other")));
    }
}
