//! Model persistence - one artifact per dsid under the models directory
//!
//! Artifacts are written to a temporary file, synced and renamed over the
//! final path, so a reader never sees a half-written model. The payload is
//! wrapped in an envelope carrying a format version and a SHA-256 digest,
//! which is checked on every load.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::classifier::TrainedModel;
use super::ModelError;
use crate::models::Dsid;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    checksum: String,
    payload: Vec<u8>,
}

fn digest(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct ModelRepository {
    dir: PathBuf,
}

impl ModelRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Deterministic artifact location for a dataset
    pub fn path_for(&self, dsid: Dsid) -> PathBuf {
        self.dir.join(format!("model_dsid{}.bin", dsid))
    }

    pub async fn exists(&self, dsid: Dsid) -> Result<bool, ModelError> {
        Ok(fs::try_exists(self.path_for(dsid)).await?)
    }

    /// Persist a model, replacing any previous artifact for its dsid
    pub async fn save(&self, model: &TrainedModel) -> Result<PathBuf, ModelError> {
        let payload = bincode::serialize(model)?;
        let envelope = ArtifactEnvelope {
            format_version: FORMAT_VERSION,
            checksum: digest(&payload),
            payload,
        };
        let bytes = bincode::serialize(&envelope)?;

        fs::create_dir_all(&self.dir).await?;
        let target = self.path_for(model.dsid);
        let tmp = self
            .dir
            .join(format!(".model_dsid{}.{}.tmp", model.dsid, Uuid::new_v4()));

        if let Err(e) = write_synced(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!("Model for DSID {} written to {}", model.dsid, target.display());
        Ok(target)
    }

    /// Load the artifact for a dsid; `Ok(None)` when none was ever saved
    pub async fn load(&self, dsid: Dsid) -> Result<Option<TrainedModel>, ModelError> {
        let path = self.path_for(dsid);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| ModelError::Corrupt { dsid, reason };

        let envelope: ArtifactEnvelope =
            bincode::deserialize(&bytes).map_err(|e| corrupt(format!("bad envelope: {}", e)))?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                envelope.format_version
            )));
        }
        if digest(&envelope.payload) != envelope.checksum {
            return Err(corrupt("checksum mismatch".to_string()));
        }

        let model: TrainedModel = bincode::deserialize(&envelope.payload)
            .map_err(|e| corrupt(format!("bad payload: {}", e)))?;
        if model.dsid != dsid {
            return Err(corrupt(format!("artifact belongs to DSID {}", model.dsid)));
        }

        tracing::info!("Loaded model for DSID {} from {}", dsid, path.display());
        Ok(Some(model))
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}
