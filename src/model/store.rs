// src/model/store.rs
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::{EstimatorError, Result};
use crate::model::artifact::ModelArtifact;
use crate::utils::progress_bars::logging::{PipelineStage, TrainingLogger};

/// Bumped whenever the bundle layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    sha256: String,
    payload: Box<RawValue>,
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Sibling temp name, unique per call.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

fn discard_temp(tmp_path: &Path) {
    if let Err(e) = fs::remove_file(tmp_path) {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed removing temp file {}: {}", tmp_path.display(), e);
        }
    }
}

/// Writes the artifact as one checksummed bundle. Readers see either the old
/// file or the complete new one.
pub fn save(artifact: &ModelArtifact, path: &Path) -> Result<String> {
    let logger = TrainingLogger::new(PipelineStage::Store);
    let payload = serde_json::to_string(artifact)
        .map_err(|e| EstimatorError::Store(format!("failed encoding artifact: {}", e)))?;
    let digest = checksum(payload.as_bytes());
    let envelope = Envelope {
        format_version: ARTIFACT_FORMAT_VERSION,
        sha256: digest.clone(),
        payload: RawValue::from_string(payload)
            .map_err(|e| EstimatorError::Store(format!("failed wrapping artifact: {}", e)))?,
    };
    let raw = serde_json::to_vec(&envelope)
        .map_err(|e| EstimatorError::Store(format!("failed encoding bundle: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            EstimatorError::Store(format!("failed creating {}: {}", parent.display(), e))
        })?;
    }
    let tmp_path = temp_path(path);
    if let Err(e) = fs::write(&tmp_path, &raw) {
        discard_temp(&tmp_path);
        return Err(EstimatorError::Store(format!(
            "failed writing temp {}: {}",
            tmp_path.display(),
            e
        )));
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        discard_temp(&tmp_path);
        return Err(EstimatorError::Store(format!(
            "failed replacing {}: {}",
            path.display(),
            e
        )));
    }

    logger.log_completion(&format!(
        "Saved artifact {} to {} ({} bytes, sha256 {})",
        artifact.metadata().artifact_id,
        path.display(),
        raw.len(),
        &digest[..12]
    ));
    Ok(digest)
}

pub fn load(path: &Path) -> Result<ModelArtifact> {
    let raw = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            EstimatorError::Store(format!("model file not found: {}", path.display()))
        }
        _ => EstimatorError::Store(format!("failed reading {}: {}", path.display(), e)),
    })?;
    let envelope: Envelope = serde_json::from_slice(&raw).map_err(|e| {
        EstimatorError::Store(format!("malformed model bundle {}: {}", path.display(), e))
    })?;
    if envelope.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(EstimatorError::Store(format!(
            "unsupported bundle format version {} (expected {})",
            envelope.format_version, ARTIFACT_FORMAT_VERSION
        )));
    }
    let actual = checksum(envelope.payload.get().as_bytes());
    if actual != envelope.sha256 {
        return Err(EstimatorError::Store(format!(
            "checksum mismatch for {}: recorded {}, computed {}",
            path.display(),
            envelope.sha256,
            actual
        )));
    }
    debug!("Checksum verified for {}", path.display());

    let artifact: ModelArtifact = serde_json::from_str(envelope.payload.get())
        .map_err(|e| EstimatorError::Store(format!("corrupt artifact payload: {}", e)))?;
    artifact.check_compatible()?;
    info!(
        "Loaded {} artifact {} trained at {}",
        artifact.family(),
        artifact.metadata().artifact_id,
        artifact.metadata().trained_at
    );
    Ok(artifact)
}
