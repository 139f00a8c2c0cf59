//! Error types used by the proxyvisor runtime and its services.
//!
//! This module defines four enums:
//!
//! - [`InstallError`]: a service's one-time install step failed (download, extract,
//!   permissions, key or certificate generation, config templating).
//! - [`RuntimeError`]: supervision itself failed (process could not be spawned,
//!   shutdown exceeded its grace period).
//! - [`ArtifactError`]: a derived file could not be written.
//! - [`SettingsError`]: the persisted settings document could not be read back.
//!
//! A non-zero process exit is **not** an error: it is a supervised condition that
//! drives the restart loop and is reported through [`EventKind::ProcessExited`](crate::EventKind::ProcessExited).
//!
//! All types provide `as_label` (stable snake_case label for logs) where it helps.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced while installing a managed service.
///
/// Install errors are fatal to that service's install attempt only; sibling
/// services keep installing and running.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InstallError {
    /// The release artifact (or a config template) could not be downloaded.
    #[error("download of {url} failed: {reason}")]
    Download {
        /// Source URL.
        url: String,
        /// Underlying transport or I/O message.
        reason: String,
    },

    /// A named entry could not be extracted from an archive.
    #[error("extracting {entry:?} from {archive:?} failed: {reason}")]
    Extract {
        /// Archive on disk.
        archive: PathBuf,
        /// Entry name inside the archive.
        entry: String,
        /// Extractor message.
        reason: String,
    },

    /// The execute bits could not be set on the installed binary.
    #[error("cannot set permissions on {path:?}: {source}")]
    Permission {
        /// Binary path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Generic filesystem failure while preparing the install directory.
    #[error("i/o error at {path:?}: {source}")]
    Io {
        /// Path being touched.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TLS certificate pair could not be generated.
    #[error("tls certificate generation failed: {reason}")]
    CertGeneration {
        /// Generator message.
        reason: String,
    },

    /// The proxy server's key-generation subcommand failed.
    ///
    /// Downstream config is unusable without reality keys, so this is never retried.
    #[error("reality key generation failed: {reason}")]
    KeyGeneration {
        /// Exit code or missing-output description.
        reason: String,
    },
}

impl InstallError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use proxyvisor::InstallError;
    ///
    /// let err = InstallError::KeyGeneration { reason: "exit code 1".into() };
    /// assert_eq!(err.as_label(), "install_key_generation");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            InstallError::Download { .. } => "install_download",
            InstallError::Extract { .. } => "install_extract",
            InstallError::Permission { .. } => "install_permission",
            InstallError::Io { .. } => "install_io",
            InstallError::CertGeneration { .. } => "install_cert_generation",
            InstallError::KeyGeneration { .. } => "install_key_generation",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }
}

/// # Errors produced by the supervision runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The managed process could not be started at all.
    ///
    /// Fatal for that supervisor; siblings are unaffected.
    #[error("service {service} failed to spawn: {source}")]
    Spawn {
        /// Service name.
        service: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// A supervisor task panicked or was aborted.
    #[error("supervisor for {service} did not complete: {reason}")]
    Join {
        /// Service name.
        service: String,
        /// Join failure message.
        reason: String,
    },

    /// Shutdown grace period was exceeded; some supervisors remained alive.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Services that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use proxyvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Spawn { .. } => "runtime_spawn",
            RuntimeError::Join { .. } => "runtime_join",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced while writing derived artifacts.
///
/// Logged and tolerated: a stale artifact is repaired by the next regeneration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The file could not be written.
    #[error("cannot write {path:?}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings snapshot could not be serialized.
    #[error("cannot serialize settings: {reason}")]
    Serialize {
        /// Serializer message.
        reason: String,
    },
}

/// # Errors produced while loading the persisted settings document.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read {path:?}: {source}")]
    Io {
        /// Settings path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid settings document.
    #[error("cannot parse {path:?}: {reason}")]
    Parse {
        /// Settings path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
}
