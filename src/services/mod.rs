//! # Managed services.
//!
//! A [`Service`] knows how to install one binary and how to launch it. The
//! [`ProcessSupervisor`](crate::ProcessSupervisor) drives it:
//!
//! ```text
//!                ┌──────────────┐  install()  ┌──────────────┐
//! ServiceContext │ ProxyServer  │ ──────────► │  bin/xy/...  │
//!  config        │ Hy2Server    │             │  bin/h2/...  │
//!  paths         │ TunnelClient │             │  bin/cf/...  │
//!  artifacts     └──────┬───────┘             └──────────────┘
//!  fetcher              │ plan()
//!  extractor            ▼
//!  certs         RunPlan { command(), sink() }  ──► ProcessActor
//!  launcher
//!  bus
//! ```
//!
//! Installs run one at a time before any supervisor starts, so install-time
//! writes to the shared config never race with running supervisors.

mod hy2;
mod install;
mod tunnel;
mod xray;

pub use hy2::Hy2Server;
pub use tunnel::{TunnelClient, TunnelMode};
pub use xray::{ProxyServer, RealityKeys};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::artifacts::ArtifactWriter;
use crate::config::Paths;
use crate::error::InstallError;
use crate::events::Bus;
use crate::external::{CertGenerator, Extract, Fetch};
use crate::process::{LauncherRef, RunPlan};
use crate::settings::ConfigHandle;

/// One managed binary.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Short name; also the binary's file name and install directory.
    fn name(&self) -> &str;

    /// Path of the installed binary.
    fn binary(&self) -> PathBuf;

    /// Returns `true` when the binary is already present.
    fn is_installed(&self) -> bool {
        self.binary().is_file()
    }

    /// Downloads and prepares the binary and its config.
    async fn install(&self) -> Result<(), InstallError>;

    /// Chooses how the service is launched for this supervision run.
    fn plan(&self) -> Box<dyn RunPlan>;
}

/// CPU architecture of the host, as named in release artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    /// Architecture of the running host; anything not ARM is treated as x86-64.
    pub fn detect() -> Self {
        match std::env::consts::ARCH {
            "aarch64" | "arm" => Arch::Arm64,
            _ => Arch::Amd64,
        }
    }

    /// Name used by the tunnel and hy2 releases.
    pub fn go_name(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Name used by the proxy-server releases.
    pub fn xray_name(&self) -> &'static str {
        match self {
            Arch::Amd64 => "64",
            Arch::Arm64 => "arm64-v8a",
        }
    }
}

/// Shared collaborators handed to every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub config: ConfigHandle,
    pub paths: Paths,
    pub artifacts: ArtifactWriter,
    pub fetcher: Arc<dyn Fetch>,
    pub extractor: Arc<dyn Extract>,
    pub certs: Arc<dyn CertGenerator>,
    pub launcher: LauncherRef,
    pub bus: Bus,
    pub arch: Arch,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arch_names() {
        assert_eq!(Arch::Arm64.go_name(), "arm64");
        assert_eq!(Arch::Amd64.go_name(), "amd64");
        assert_eq!(Arch::Arm64.xray_name(), "arm64-v8a");
        assert_eq!(Arch::Amd64.xray_name(), "64");
    }
}
