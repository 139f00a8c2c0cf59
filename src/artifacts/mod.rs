//! # Derived artifacts.
//!
//! [`ArtifactWriter`] regenerates the two files derived from [`SharedConfig`]:
//!
//! - the persisted settings document ([`SettingsDocument`]), read back on next start;
//! - the connection-descriptor list, one line per [`Protocol`].
//!
//! Both are overwritten in place on every call. There is a single writer at a time,
//! so no partial-write protection is attempted.

mod descriptor;

pub use descriptor::{Protocol, render_all};

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Paths;
use crate::error::ArtifactError;
use crate::settings::{SettingsDocument, SharedConfig};

/// Writes the settings document and the descriptor file.
#[derive(Clone, Debug)]
pub struct ArtifactWriter {
    settings: PathBuf,
    descriptors: PathBuf,
}

impl ArtifactWriter {
    /// Writer targeting the files of `paths`.
    pub fn new(paths: &Paths) -> Self {
        Self {
            settings: paths.settings.clone(),
            descriptors: paths.descriptors.clone(),
        }
    }

    /// Path of the descriptor file.
    pub fn descriptors_path(&self) -> &Path {
        &self.descriptors
    }

    /// Path of the settings document.
    pub fn settings_path(&self) -> &Path {
        &self.settings
    }

    /// Overwrites the settings document with `cfg`.
    pub fn write_settings(&self, cfg: &SharedConfig) -> Result<(), ArtifactError> {
        SettingsDocument::from_config(cfg).save(&self.settings)
    }

    /// Overwrites the descriptor file with `cfg`.
    pub fn write_descriptors(&self, cfg: &SharedConfig) -> Result<(), ArtifactError> {
        fs::write(&self.descriptors, render_all(cfg)).map_err(|source| ArtifactError::Io {
            path: self.descriptors.clone(),
            source,
        })
    }

    /// Rewrites both artifacts: settings first, then descriptors.
    pub fn regenerate(&self, cfg: &SharedConfig) -> Result<(), ArtifactError> {
        self.write_settings(cfg)?;
        self.write_descriptors(cfg)
    }
}
