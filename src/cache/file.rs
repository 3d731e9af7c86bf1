//! JSON file snapshot cache.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use backlogwatch_types::Snapshot;

use super::{CacheError, SnapshotCache};

/// Snapshot cache backed by a JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a reader in another process never sees a partial snapshot.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

impl SnapshotCache for FileCache {
    fn store(&self, snapshot: &Snapshot) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        let json = serde_json::to_vec_pretty(snapshot)?;
        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(
            path = %self.path.display(),
            incidents = snapshot.incidents.len(),
            "Stored snapshot"
        );
        Ok(())
    }

    fn latest(&self) -> Result<Option<Snapshot>, CacheError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_str(&content)?;
        if !snapshot.version.is_compatible() {
            return Err(CacheError::IncompatibleVersion {
                major: snapshot.version.major,
                minor: snapshot.version.minor,
            });
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backlogwatch_types::{ExceededBound, Incident, Measurement, SubType};
    use tempfile::tempdir;

    fn degraded() -> Snapshot {
        let m = Measurement::new(7, "Welcome", SubType::Kickoff)
            .with_count(50)
            .with_avg_delay_seconds(7200.0);
        let mut snapshot = Snapshot::with_timestamp(1_700_000_000_000);
        snapshot.measurements.push(m.clone());
        snapshot.incidents.push(Incident {
            measurement: m,
            exceeded: ExceededBound::Delay,
            message: "slow".to_string(),
        });
        snapshot
    }

    #[test]
    fn test_missing_file_is_no_data() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("snapshot.json"));
        assert!(cache.latest().unwrap().is_none());
    }

    #[test]
    fn test_store_then_read() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested").join("snapshot.json"));

        cache.store(&degraded()).unwrap();
        assert_eq!(cache.latest().unwrap(), Some(degraded()));

        let healthy = Snapshot::with_timestamp(2);
        cache.store(&healthy).unwrap();
        assert_eq!(cache.latest().unwrap(), Some(healthy));
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("snapshot.json"));
        cache.store(&degraded()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("snapshot.json")]);
    }

    #[test]
    fn test_incompatible_version_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(
            &path,
            r#"{ "version": { "major": 99, "minor": 0 }, "generated_at_ms": 1 }"#,
        )
        .unwrap();

        let err = FileCache::new(&path).latest().unwrap_err();
        assert!(matches!(
            err,
            CacheError::IncompatibleVersion { major: 99, .. }
        ));
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileCache::new(&path).latest(),
            Err(CacheError::Serde(_))
        ));
    }
}
