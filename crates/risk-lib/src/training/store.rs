//! Versioned on-disk model store
//!
//! Layout under the root directory:
//!
//! ```text
//! versions/v0001/{classifier.json, regressor.json, scaler.json, metadata.json}
//! versions/v0002/...
//! CURRENT            (name of the active version)
//! ```
//!
//! A version directory is only renamed into place once every file in it is
//! written and synced, and `CURRENT` is swapped with a temp-file rename, so
//! a crash mid-save leaves the previous model active.

use super::artifact::{ModelMetadata, TrainedModel};
use crate::error::{EngineError, Result};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const VERSIONS_DIR: &str = "versions";
const CURRENT_FILE: &str = "CURRENT";
const STAGING_PREFIX: &str = ".staging-";

pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const REGRESSOR_FILE: &str = "regressor.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
    versions_to_keep: usize,
}

impl ModelStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>, versions_to_keep: usize) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(VERSIONS_DIR)).map_err(|e| {
            EngineError::Persistence(format!("failed to create model directory {:?}: {}", root, e))
        })?;
        Ok(Self {
            root,
            versions_to_keep: versions_to_keep.max(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn versions_dir(&self) -> PathBuf {
        self.root.join(VERSIONS_DIR)
    }

    fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    /// Committed versions, oldest first
    pub fn list_versions(&self) -> Result<Vec<String>> {
        let mut versions: Vec<(u32, String)> = Vec::new();
        for entry in fs::read_dir(self.versions_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(number) = parse_version(&name) {
                versions.push((number, name));
            }
        }
        versions.sort();
        Ok(versions.into_iter().map(|(_, name)| name).collect())
    }

    pub fn current_version(&self) -> Result<Option<String>> {
        let path = self.root.join(CURRENT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let version = fs::read_to_string(&path)?.trim().to_string();
        if version.is_empty() {
            return Ok(None);
        }
        Ok(Some(version))
    }

    fn next_version(&self) -> Result<String> {
        let last = self
            .list_versions()?
            .iter()
            .filter_map(|v| parse_version(v))
            .max()
            .unwrap_or(0);
        Ok(format_version(last + 1))
    }

    /// Persist a model as a new version and make it current.
    ///
    /// Returns the model with its version and checksums filled in.
    pub fn save(&self, mut model: TrainedModel) -> Result<TrainedModel> {
        let version = self.next_version()?;
        let staging = self.versions_dir().join(format!("{}{}", STAGING_PREFIX, version));

        let result = self.write_staging(&staging, &version, &mut model);
        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                debug!(path = %staging.display(), error = %cleanup, "Failed to remove staging directory");
            }
            return Err(e);
        }

        let target = self.version_dir(&version);
        if let Err(e) = fs::rename(&staging, &target) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                debug!(path = %staging.display(), error = %cleanup, "Failed to remove staging directory");
            }
            return Err(EngineError::Persistence(format!(
                "failed to commit {:?} to {:?}: {}",
                staging, target, e
            )));
        }

        self.set_current(&version)?;

        info!(
            version = %version,
            path = %target.display(),
            samples = model.metadata.training_samples,
            "Model artifact saved"
        );

        self.prune();
        Ok(model)
    }

    fn write_staging(&self, staging: &Path, version: &str, model: &mut TrainedModel) -> Result<()> {
        if staging.exists() {
            fs::remove_dir_all(staging)?;
        }
        fs::create_dir_all(staging)?;

        let blobs = [
            (CLASSIFIER_FILE, serde_json::to_vec(&model.classifier)?),
            (REGRESSOR_FILE, serde_json::to_vec(&model.regressor)?),
            (SCALER_FILE, serde_json::to_vec(&model.scaler)?),
        ];

        model.metadata.version = version.to_string();
        model.metadata.checksums.clear();
        for (name, bytes) in &blobs {
            write_synced(&staging.join(name), bytes)?;
            model
                .metadata
                .checksums
                .insert(name.to_string(), compute_checksum(bytes));
        }

        let metadata = serde_json::to_vec_pretty(&model.metadata)?;
        write_synced(&staging.join(METADATA_FILE), &metadata)
    }

    fn set_current(&self, version: &str) -> Result<()> {
        let path = self.root.join(CURRENT_FILE);
        let temp_path = path.with_extension("tmp");
        write_synced(&temp_path, version.as_bytes())?;
        fs::rename(&temp_path, &path).map_err(|e| {
            EngineError::Persistence(format!("failed to swap {:?} to {:?}: {}", temp_path, path, e))
        })
    }

    /// Load the current model, if any
    pub fn load(&self) -> Result<Option<TrainedModel>> {
        match self.current_version()? {
            Some(version) => self.load_version(&version).map(Some),
            None => Ok(None),
        }
    }

    /// Load one version, verifying blob checksums
    pub fn load_version(&self, version: &str) -> Result<TrainedModel> {
        let dir = self.version_dir(version);
        if !dir.is_dir() {
            return Err(EngineError::Persistence(format!(
                "model version {} not found at {:?}",
                version, dir
            )));
        }

        let metadata: ModelMetadata = serde_json::from_slice(&fs::read(dir.join(METADATA_FILE))?)?;
        let classifier = read_verified(&dir, CLASSIFIER_FILE, &metadata)?;
        let regressor = read_verified(&dir, REGRESSOR_FILE, &metadata)?;
        let scaler = read_verified(&dir, SCALER_FILE, &metadata)?;

        let model = TrainedModel {
            scaler,
            classifier,
            regressor,
            metadata,
        };
        model.validate().map_err(|e| {
            EngineError::Persistence(format!("model version {} is invalid: {}", version, e))
        })?;

        debug!(version = %version, "Model artifact loaded");
        Ok(model)
    }

    /// Point `CURRENT` at the version before the current one.
    ///
    /// The abandoned version is removed from disk. Returns the new current
    /// version, or `None` when there is nothing to roll back to.
    pub fn rollback(&self) -> Result<Option<String>> {
        let versions = self.list_versions()?;
        let Some(current) = self.current_version()? else {
            warn!("No current model version; nothing to roll back");
            return Ok(None);
        };
        let current_number = parse_version(&current).unwrap_or(u32::MAX);

        let Some(previous) = versions
            .iter()
            .filter(|v| parse_version(v).map_or(false, |n| n < current_number))
            .last()
            .cloned()
        else {
            warn!(current = %current, "No previous model version available for rollback");
            return Ok(None);
        };

        // verify before switching
        self.load_version(&previous)?;
        self.set_current(&previous)?;

        if let Err(e) = fs::remove_dir_all(self.version_dir(&current)) {
            warn!(version = %current, error = %e, "Failed to remove rolled-back model version");
        }

        info!(from = %current, to = %previous, "Rolled back to previous model version");
        Ok(Some(previous))
    }

    /// Drop the oldest versions beyond `versions_to_keep`; never the current one
    fn prune(&self) {
        let versions = match self.list_versions() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to list model versions for pruning");
                return;
            }
        };
        let current = self.current_version().ok().flatten();
        let excess = versions.len().saturating_sub(self.versions_to_keep);

        for version in versions.iter().take(excess) {
            if current.as_deref() == Some(version.as_str()) {
                continue;
            }
            let path = self.version_dir(version);
            match fs::remove_dir_all(&path) {
                Ok(()) => debug!(version = %version, "Pruned old model version"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove old model version"),
            }
        }
    }
}

fn parse_version(name: &str) -> Option<u32> {
    name.strip_prefix('v')?.parse().ok()
}

fn format_version(number: u32) -> String {
    format!("v{:04}", number)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .map_err(|e| EngineError::Persistence(format!("failed to create {:?}: {}", path, e)))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn read_verified<T: DeserializeOwned>(dir: &Path, name: &str, metadata: &ModelMetadata) -> Result<T> {
    let bytes = fs::read(dir.join(name))?;
    let expected = metadata
        .checksums
        .get(name)
        .ok_or_else(|| EngineError::Persistence(format!("no checksum recorded for {}", name)))?;
    let actual = compute_checksum(&bytes);
    if &actual != expected {
        return Err(EngineError::Persistence(format!(
            "checksum mismatch for {}: expected {}, got {}",
            name, expected, actual
        )));
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// SHA-256 of a blob, hex encoded
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
