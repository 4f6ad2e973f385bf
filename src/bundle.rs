// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Model bundle discovery and loading.
//!
//! A bundle is a packaged set of pretrained weights (`.mag`). Its file stem
//! names the model configuration that can consume it, e.g.
//! `attention_rnn.mag` is read by the `attention_rnn` generator.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// File extension of model bundles
pub const BUNDLE_EXTENSION: &str = "mag";

/// Errors raised while opening a bundle
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Bundle file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Bundle file is empty: {}", .0.display())]
    Empty(PathBuf),

    #[error("Bundle file has no usable name: {}", .0.display())]
    NoConfigId(PathBuf),

    #[error("failed to read bundle file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
}

/// A model bundle on disk.
///
/// Opening only checks the file; the weights are read by loaders that need
/// them in memory. The external generator is handed the path instead.
#[derive(Debug, Clone)]
pub struct Bundle {
    path: PathBuf,
    config_id: String,
}

impl Bundle {
    /// Open a bundle file, checking that it exists and is not empty
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BundleError> {
        let path = path.as_ref();
        debug!("Initializing model with bundle file: {}", path.display());

        if !path.is_file() {
            return Err(BundleError::NotFound(path.to_path_buf()));
        }

        let config_id = config_id_for(path)
            .ok_or_else(|| BundleError::NoConfigId(path.to_path_buf()))?;

        let metadata = fs::metadata(path).map_err(|source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() == 0 {
            return Err(BundleError::Empty(path.to_path_buf()));
        }

        Ok(Self::new(path, config_id))
    }

    /// Bundle at `path` for the given configuration, without touching the file
    pub fn new(path: impl Into<PathBuf>, config_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            config_id: config_id.into(),
        }
    }

    /// Path of the bundle file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Model configuration identifier
    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    /// Read the serialized model weights
    pub fn read_weights(&self) -> Result<Vec<u8>, BundleError> {
        fs::read(&self.path).map_err(|source| BundleError::Read {
            path: self.path.clone(),
            source,
        })
    }
}

/// Configuration id encoded in a bundle's file name
pub fn config_id_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Whether `path` carries the bundle extension
pub fn is_bundle_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(BUNDLE_EXTENSION))
        .unwrap_or(false)
}

/// List bundle files in `folder`, sorted by name.
///
/// A missing or unreadable folder yields an empty list.
pub fn list_bundles(folder: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list bundles in {}: {}", folder.display(), e);
            return Vec::new();
        }
    };

    let mut bundles: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_bundle_file(path))
        .collect();
    bundles.sort();

    debug!("Found {} bundle files in {}", bundles.len(), folder.display());
    bundles
}
