//! Proxy server (`xy`): reality endpoint.
//!
//! Install downloads the release zip, extracts and renames the binary, generates
//! the reality key pair with `xy x25519`, renders `config.json` from the remote
//! template, and persists the settings document.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::InstallError;
use crate::events::{Event, EventKind};
use crate::process::{CommandSpec, OutputMode, RunPlan, StaticPlan, run_to_completion};
use crate::services::install::{
    discard_binary, make_executable, prepare_dir, render_template, write_config,
};
use crate::services::{Service, ServiceContext};

const NAME: &str = "xy";
const ARCHIVE_NAME: &str = "Xray-linux.zip";
const ARCHIVE_ENTRY: &str = "xray";
const CONFIG_NAME: &str = "config.json";
const CONFIG_URL: &str =
    "https://raw.githubusercontent.com/vevc/java-xah/refs/heads/main/xray-config.json";

const PRIVATE_KEY_PREFIX: &str = "PrivateKey: ";
const PUBLIC_KEY_PREFIX: &str = "Password: ";

/// Reality key material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealityKeys {
    pub public_key: String,
    pub private_key: String,
    pub short_id: String,
}

impl RealityKeys {
    /// Parses `x25519` output; both key lines must be present.
    pub fn parse(lines: &[String]) -> Option<(String, String)> {
        let find = |prefix: &str| {
            lines
                .iter()
                .find_map(|l| l.trim().strip_prefix(prefix))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Some((find(PUBLIC_KEY_PREFIX)?, find(PRIVATE_KEY_PREFIX)?))
    }
}

/// First eight characters of a random UUID.
fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// The reality proxy server.
pub struct ProxyServer {
    ctx: ServiceContext,
}

impl ProxyServer {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    fn dir(&self) -> PathBuf {
        self.ctx.paths.bin_dir(NAME)
    }

    fn config_path(&self) -> PathBuf {
        self.dir().join(CONFIG_NAME)
    }

    fn download_url(&self) -> String {
        let version = self.ctx.config.snapshot().xray_version;
        format!(
            "https://github.com/XTLS/Xray-core/releases/download/v{version}/Xray-linux-{}.zip",
            self.ctx.arch.xray_name()
        )
    }

    async fn generate_keys(&self) -> Result<RealityKeys, InstallError> {
        let cmd = CommandSpec::new(self.binary()).arg("x25519");
        let (lines, exit) = run_to_completion(self.ctx.launcher.as_ref(), &cmd)
            .await
            .map_err(|e| InstallError::KeyGeneration {
                reason: e.to_string(),
            })?;
        if !exit.success() {
            return Err(InstallError::KeyGeneration {
                reason: format!("x25519 exited with {:?}", exit.code()),
            });
        }
        let (public_key, private_key) =
            RealityKeys::parse(&lines).ok_or_else(|| InstallError::KeyGeneration {
                reason: "key lines missing from x25519 output".into(),
            })?;
        Ok(RealityKeys {
            public_key,
            private_key,
            short_id: short_id(),
        })
    }

    async fn install_binary(&self) -> Result<(), InstallError> {
        let dir = self.dir();
        let archive = dir.join(ARCHIVE_NAME);
        self.ctx.fetcher.fetch(&self.download_url(), &archive).await?;
        self.ctx
            .extractor
            .extract(&archive, ARCHIVE_ENTRY, &dir)
            .await?;
        let extracted = dir.join(ARCHIVE_ENTRY);
        std::fs::rename(&extracted, self.binary()).map_err(|e| InstallError::io(&extracted, e))?;
        let _ = std::fs::remove_file(&archive);
        make_executable(&self.binary())
    }

    async fn configure(&self) -> Result<(), InstallError> {
        let keys = self.generate_keys().await?;
        self.ctx
            .config
            .set_reality_keys(&keys.public_key, &keys.private_key, &keys.short_id);
        info!(service = NAME, "reality keys generated");

        let cfg = self.ctx.config.snapshot();
        let template = self.ctx.fetcher.fetch_text(CONFIG_URL).await?;
        let text = render_template(
            &template,
            &[
                ("10008", cfg.port.as_str()),
                ("YOUR_UUID", cfg.identity.as_str()),
                ("YOUR_PRIVATE_KEY", cfg.reality_private_key.as_str()),
                ("YOUR_SHORT_ID", cfg.reality_short_id.as_str()),
            ],
        );
        write_config(&self.config_path(), &text)?;

        if let Err(e) = self.ctx.artifacts.write_settings(&cfg) {
            self.ctx.bus.publish(
                Event::new(EventKind::ArtifactWriteFailed)
                    .with_service(NAME)
                    .with_reason(e.to_string()),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Service for ProxyServer {
    fn name(&self) -> &str {
        NAME
    }

    fn binary(&self) -> PathBuf {
        self.dir().join(NAME)
    }

    async fn install(&self) -> Result<(), InstallError> {
        prepare_dir(&self.dir())?;
        self.install_binary().await?;
        if let Err(e) = self.configure().await {
            discard_binary(&self.binary());
            return Err(e);
        }
        Ok(())
    }

    fn plan(&self) -> Box<dyn RunPlan> {
        let cmd = CommandSpec::new(self.binary())
            .arg("-c")
            .arg(self.config_path().display().to_string())
            .output(OutputMode::Capture);
        Box::new(StaticPlan::new(Arc::<str>::from(NAME), cmd))
    }
}
