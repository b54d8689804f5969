//! Directory-backed model store.
//!
//! Each artifact is two files: `<id>.model` (bincode `FittedModel`) and
//! `<id>.meta.json` (metadata with the payload's SHA-256). `LATEST` holds the
//! id of the most recent save. Files are written to a temporary name and
//! renamed into place; the store assumes a single writer.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{ForecastError, Result};
use crate::evaluation::EvaluationMetrics;
use crate::model::FittedModel;
use crate::series::PeriodRange;
use crate::types::ModelSpec;

pub const FORMAT_VERSION: u32 = 1;
const LATEST_POINTER: &str = "LATEST";
const PAYLOAD_EXT: &str = "model";
const META_SUFFIX: &str = ".meta.json";

/// Which artifact to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRef {
    Latest,
    Id(String),
}

impl From<&str> for ArtifactRef {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("latest") {
            ArtifactRef::Latest
        } else {
            ArtifactRef::Id(s.to_string())
        }
    }
}

impl From<String> for ArtifactRef {
    fn from(s: String) -> Self {
        ArtifactRef::from(s.as_str())
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactRef::Latest => write!(f, "latest"),
            ArtifactRef::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Sidecar metadata. Floats here are informational; the payload is the
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub artifact_id: String,
    pub format_version: u32,
    pub spec: ModelSpec,
    pub training_window: PeriodRange,
    pub n_obs: usize,
    pub fit_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub evaluation: Option<EvaluationMetrics>,
    pub loglike: f64,
    pub aic: f64,
    pub bic: f64,
    pub payload_sha256: String,
    pub payload_bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: FittedModel,
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write `bytes` next to `path` and rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|e| ForecastError::persistence(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| ForecastError::persistence(path, e))
}

impl ModelStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ForecastError::persistence(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn payload_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, PAYLOAD_EXT))
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", id, META_SUFFIX))
    }

    fn not_found(&self, reference: impl fmt::Display) -> ForecastError {
        ForecastError::ArtifactNotFound {
            reference: reference.to_string(),
            dir: self.dir.clone(),
        }
    }

    /// Persist `model` with an optional evaluation snapshot and point
    /// `LATEST` at it. Returns the new artifact id.
    pub fn save(&self, model: &FittedModel, evaluation: Option<&EvaluationMetrics>) -> Result<String> {
        let payload = bincode::serialize(model).map_err(|e| ForecastError::persistence(&self.dir, e))?;
        let checksum = sha256_hex(&payload);
        let created_at = Utc::now();
        let artifact_id = format!(
            "sarima-{}-{}",
            created_at.format("%Y%m%dT%H%M%S%.6fZ"),
            &checksum[..8]
        );

        let metadata = ModelMetadata {
            artifact_id: artifact_id.clone(),
            format_version: FORMAT_VERSION,
            spec: *model.spec(),
            training_window: model.training_window(),
            n_obs: model.training().len(),
            fit_timestamp: model.fitted_at(),
            created_at,
            evaluation: evaluation.cloned(),
            loglike: model.loglike(),
            aic: model.aic(),
            bic: model.bic(),
            payload_sha256: checksum,
            payload_bytes: payload.len() as u64,
        };
        let meta_json =
            serde_json::to_vec_pretty(&metadata).map_err(|e| ForecastError::persistence(&self.dir, e))?;

        write_atomic(&self.payload_path(&artifact_id), &payload)?;
        write_atomic(&self.meta_path(&artifact_id), &meta_json)?;
        write_atomic(&self.dir.join(LATEST_POINTER), artifact_id.as_bytes())?;

        info!(artifact_id = %artifact_id, spec = %model.spec(), bytes = payload.len(), "model saved");
        Ok(artifact_id)
    }

    /// Id that `LATEST` points at, if any.
    pub fn latest_id(&self) -> Result<Option<String>> {
        let path = self.dir.join(LATEST_POINTER);
        match fs::read_to_string(&path) {
            Ok(s) => {
                let id = s.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ForecastError::persistence(&path, e)),
        }
    }

    fn resolve(&self, reference: &ArtifactRef) -> Result<String> {
        let id = match reference {
            ArtifactRef::Latest => self.latest_id()?.ok_or_else(|| self.not_found(reference))?,
            ArtifactRef::Id(id) => id.clone(),
        };
        if id.is_empty() || id.contains(|c: char| c == '/' || c == '\\') || id.contains("..") {
            return Err(self.not_found(reference));
        }
        Ok(id)
    }

    fn read_metadata(&self, id: &str) -> Result<ModelMetadata> {
        let path = self.meta_path(id);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(self.not_found(id)),
            Err(e) => return Err(ForecastError::persistence(&path, e)),
        };
        let metadata: ModelMetadata = serde_json::from_slice(&bytes)
            .map_err(|e| ForecastError::corrupt(id, format!("unreadable metadata: {}", e)))?;
        if metadata.format_version != FORMAT_VERSION {
            return Err(ForecastError::corrupt(
                id,
                format!(
                    "format version {} (expected {})",
                    metadata.format_version, FORMAT_VERSION
                ),
            ));
        }
        if metadata.artifact_id != id {
            return Err(ForecastError::corrupt(
                id,
                format!("metadata names artifact '{}'", metadata.artifact_id),
            ));
        }
        Ok(metadata)
    }

    /// Load and verify an artifact: checksum, format version, and agreement
    /// between the payload and its metadata.
    pub fn load_artifact(&self, reference: impl Into<ArtifactRef>) -> Result<ModelArtifact> {
        let reference = reference.into();
        let id = self.resolve(&reference)?;
        let metadata = self.read_metadata(&id)?;

        let path = self.payload_path(&id);
        let payload = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForecastError::corrupt(&id, "payload file missing"))
            }
            Err(e) => return Err(ForecastError::persistence(&path, e)),
        };
        let checksum = sha256_hex(&payload);
        if checksum != metadata.payload_sha256 {
            return Err(ForecastError::corrupt(
                &id,
                format!(
                    "checksum mismatch: stored {}, computed {}",
                    metadata.payload_sha256, checksum
                ),
            ));
        }

        let model: FittedModel = bincode::deserialize(&payload)
            .map_err(|e| ForecastError::corrupt(&id, format!("undecodable payload: {}", e)))?;
        if *model.spec() != metadata.spec {
            return Err(ForecastError::corrupt(
                &id,
                format!("payload spec {} differs from metadata {}", model.spec(), metadata.spec),
            ));
        }
        if model.training_window() != metadata.training_window || model.training().len() != metadata.n_obs {
            return Err(ForecastError::corrupt(
                &id,
                format!(
                    "payload window {} differs from metadata {}",
                    model.training_window(),
                    metadata.training_window
                ),
            ));
        }
        model
            .spec()
            .validate()
            .map_err(|e| ForecastError::corrupt(&id, e.to_string()))?;

        debug!(artifact_id = %id, "artifact verified");
        Ok(ModelArtifact { metadata, model })
    }

    pub fn load(&self, reference: impl Into<ArtifactRef>) -> Result<FittedModel> {
        Ok(self.load_artifact(reference)?.model)
    }

    /// Metadata of every artifact, oldest first. Unreadable sidecars are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<ModelMetadata>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ForecastError::persistence(&self.dir, e))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ForecastError::persistence(&self.dir, e))?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(META_SUFFIX)) else {
                continue;
            };
            match self.read_metadata(id) {
                Ok(meta) => out.push(meta),
                Err(e) => warn!(artifact_id = id, error = %e, "skipping unreadable artifact"),
            }
        }
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.artifact_id.cmp(&b.artifact_id))
        });
        Ok(out)
    }

    /// Remove an artifact. When it was the latest, `LATEST` moves to the
    /// newest remaining artifact.
    pub fn delete(&self, id: &str) -> Result<()> {
        let id = self.resolve(&ArtifactRef::Id(id.to_string()))?;
        let meta = self.meta_path(&id);
        if !meta.exists() {
            return Err(self.not_found(&id));
        }
        for path in [self.payload_path(&id), meta] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ForecastError::persistence(&path, e)),
            }
        }

        if self.latest_id()?.as_deref() == Some(id.as_str()) {
            let pointer = self.dir.join(LATEST_POINTER);
            match self.list()?.last() {
                Some(newest) => write_atomic(&pointer, newest.artifact_id.as_bytes())?,
                None => fs::remove_file(&pointer).map_err(|e| ForecastError::persistence(&pointer, e))?,
            }
        }
        info!(artifact_id = %id, "artifact deleted");
        Ok(())
    }

    /// True when no verified artifact matches `spec` fitted on exactly
    /// `training_window`.
    pub fn needs_retraining(
        &self,
        reference: impl Into<ArtifactRef>,
        spec: &ModelSpec,
        training_window: PeriodRange,
    ) -> Result<bool> {
        match self.load_artifact(reference) {
            Ok(artifact) => {
                Ok(artifact.metadata.spec != *spec || artifact.metadata.training_window != training_window)
            }
            Err(ForecastError::ArtifactNotFound { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }
}
