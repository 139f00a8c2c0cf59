use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use proxyvisor::SharedConfig;

/// Installs and supervises the proxy fleet, then hands the terminal to a shell.
#[derive(Parser, Debug)]
#[command(name = "proxyvisor", version)]
#[command(about = "Proxy fleet supervisor with tunnel host discovery")]
pub struct Cli {
    /// Work directory holding binaries, settings and descriptors
    #[arg(long, env = "PROXYVISOR_WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Public address of this host
    #[arg(long, env = "APP_DOMAIN")]
    pub domain: Option<String>,

    /// Listen port shared by the proxy and hy2 servers
    #[arg(long, env = "APP_PORT")]
    pub port: Option<String>,

    /// Client identity; generated on first start when absent
    #[arg(long, env = "APP_UUID")]
    pub uuid: Option<String>,

    #[arg(long, env = "APP_XRAY_VERSION")]
    pub xray_version: Option<String>,

    #[arg(long, env = "APP_HY2_VERSION")]
    pub hy2_version: Option<String>,

    #[arg(long, env = "APP_ARGO_VERSION")]
    pub argo_version: Option<String>,

    /// Tunnel host; only meaningful together with --argo-token
    #[arg(long, env = "APP_ARGO_DOMAIN")]
    pub argo_domain: Option<String>,

    /// Static tunnel token; switches the tunnel to persistent mode
    #[arg(long, env = "APP_ARGO_TOKEN", hide_env_values = true)]
    pub argo_token: Option<String>,

    /// Prefix of the descriptor labels
    #[arg(long, env = "APP_REMARKS_PREFIX")]
    pub remarks_prefix: Option<String>,

    /// Program occupying the foreground while services run
    #[arg(long, default_value = "bash", conflicts_with = "no_shell")]
    pub shell: PathBuf,

    /// Wait for a termination signal instead of running a shell
    #[arg(long)]
    pub no_shell: bool,

    /// Seconds to wait for services to stop on shutdown
    #[arg(long, default_value_t = 10)]
    pub grace_secs: u64,
}

impl Cli {
    /// Creates the work directory and returns its absolute, symlink-free path.
    ///
    /// Descriptors and configs embed paths under it, and the services' working
    /// directory must not change its meaning.
    pub fn prepare_work_dir(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("creating work dir {}", self.work_dir.display()))?;
        std::fs::canonicalize(&self.work_dir)
            .with_context(|| format!("resolving work dir {}", self.work_dir.display()))
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    /// Values given on the command line or in the environment; unset fields stay blank.
    pub fn overrides(&self) -> SharedConfig {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        SharedConfig {
            domain: opt(&self.domain),
            port: opt(&self.port),
            identity: opt(&self.uuid),
            xray_version: opt(&self.xray_version),
            hy2_version: opt(&self.hy2_version),
            tunnel_version: opt(&self.argo_version),
            tunnel_domain: opt(&self.argo_domain),
            tunnel_token: self.argo_token.clone(),
            remarks_prefix: opt(&self.remarks_prefix),
            ..SharedConfig::default()
        }
    }
}
