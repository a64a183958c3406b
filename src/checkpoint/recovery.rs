//! Checkpoint persistence
//!
//! Snapshots are written atomically: the bytes go to a temporary file in the
//! target directory, then a rename swaps it into place, so a crash mid-write
//! never leaves a truncated checkpoint behind. Binary files carry a magic
//! prefix and a little-endian version word ahead of the bincode payload;
//! anything else is treated as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use crate::checkpoint::state::{Checkpoint, CHECKPOINT_VERSION};
use crate::config::{CheckpointConfig, CheckpointFormat};
use crate::error::CheckpointError;
use crate::payload::Payload;

/// Magic prefix identifying a binary checkpoint file
pub const BINARY_MAGIC: &[u8; 4] = b"DEVO";

/// Serialize and atomically write a checkpoint
pub fn save_checkpoint<P: Payload>(
    path: &Path,
    checkpoint: &Checkpoint<P>,
    format: CheckpointFormat,
) -> Result<(), CheckpointError> {
    let bytes = match format {
        CheckpointFormat::Json => serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?,
        CheckpointFormat::Binary => {
            let body = bincode::serialize(checkpoint)
                .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
            let mut bytes = Vec::with_capacity(body.len() + 8);
            bytes.extend_from_slice(BINARY_MAGIC);
            bytes.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
            bytes.extend_from_slice(&body);
            bytes
        }
    };

    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(directory)?;
    let tmp = directory.join(format!(
        ".{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".to_string())
    ));
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a checkpoint, detecting its format from the file contents
pub fn load_checkpoint<P: Payload>(path: &Path) -> Result<Checkpoint<P>, CheckpointError> {
    if !path.exists() {
        return Err(CheckpointError::NotFound(path.display().to_string()));
    }
    let bytes = fs::read(path)?;

    let checkpoint: Checkpoint<P> = if bytes.starts_with(BINARY_MAGIC) {
        if bytes.len() < 8 {
            return Err(CheckpointError::Corrupted(
                "binary header truncated".to_string(),
            ));
        }
        let mut version_bytes = [0u8; 4];
        version_bytes.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version_bytes);
        if version > CHECKPOINT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: CHECKPOINT_VERSION,
                found: version,
            });
        }
        bincode::deserialize(&bytes[8..])
            .map_err(|e| CheckpointError::Deserialization(e.to_string()))?
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|e| CheckpointError::Deserialization(e.to_string()))?
    };

    if !checkpoint.is_compatible() {
        return Err(CheckpointError::VersionMismatch {
            expected: CHECKPOINT_VERSION,
            found: checkpoint.version,
        });
    }
    Ok(checkpoint)
}

/// Cadenced checkpoint writer with rotation
pub struct CheckpointManager {
    directory: PathBuf,
    base_name: String,
    format: CheckpointFormat,
    interval: usize,
    keep_n: usize,
}

impl CheckpointManager {
    /// Build a manager from configuration
    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            base_name: config.base_name.clone(),
            format: config.format,
            interval: config.interval.max(1),
            keep_n: config.keep_n.max(1),
        }
    }

    /// True when the cadence calls for a save at this generation
    pub fn should_save(&self, generation: usize) -> bool {
        generation > 0 && generation % self.interval == 0
    }

    fn extension(&self) -> &'static str {
        match self.format {
            CheckpointFormat::Json => "json",
            CheckpointFormat::Binary => "bin",
        }
    }

    fn path_for(&self, generation: usize) -> PathBuf {
        self.directory.join(format!(
            "{}_gen{:06}.{}",
            self.base_name,
            generation,
            self.extension()
        ))
    }

    /// Files managed by this manager, sorted by embedded generation number
    fn managed_files(&self) -> Vec<(usize, PathBuf)> {
        let prefix = format!("{}_gen", self.base_name);
        let suffix = format!(".{}", self.extension());
        let mut files = Vec::new();
        let Ok(entries) = fs::read_dir(&self.directory) else {
            return files;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(middle) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
            else {
                continue;
            };
            if let Ok(generation) = middle.parse::<usize>() {
                files.push((generation, entry.path()));
            }
        }
        files.sort_by_key(|(generation, _)| *generation);
        files
    }

    /// Write a checkpoint and rotate old files
    pub fn save<P: Payload>(&self, checkpoint: &Checkpoint<P>) -> Result<PathBuf, CheckpointError> {
        let path = self.path_for(checkpoint.generation);
        save_checkpoint(&path, checkpoint, self.format)?;
        log::info!("checkpoint written to {}", path.display());

        let files = self.managed_files();
        if files.len() > self.keep_n {
            for (_, old) in &files[..files.len() - self.keep_n] {
                if let Err(err) = fs::remove_file(old) {
                    log::warn!("failed to rotate checkpoint {}: {err}", old.display());
                }
            }
        }
        Ok(path)
    }

    /// Load the newest readable checkpoint, skipping corrupted files
    pub fn load_latest<P: Payload>(&self) -> Result<Checkpoint<P>, CheckpointError> {
        let files = self.managed_files();
        for (_, path) in files.iter().rev() {
            match load_checkpoint(path) {
                Ok(checkpoint) => return Ok(checkpoint),
                Err(err) => {
                    log::warn!("skipping unreadable checkpoint {}: {err}", path.display());
                }
            }
        }
        Err(CheckpointError::NotFound(format!(
            "no readable checkpoint under {}",
            self.directory.display()
        )))
    }
}
