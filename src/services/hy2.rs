//! Hysteria2 server (`h2`).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::InstallError;
use crate::process::{CommandSpec, OutputMode, RunPlan, StaticPlan};
use crate::services::install::{
    discard_binary, make_executable, prepare_dir, render_template, write_config,
};
use crate::services::{Service, ServiceContext};

const NAME: &str = "h2";
const CONFIG_NAME: &str = "config.yaml";
const CONFIG_URL: &str =
    "https://raw.githubusercontent.com/vevc/java-xah/refs/heads/main/hysteria-config.yaml";

/// The hy2 server. Serves on the shared port with a self-signed certificate.
pub struct Hy2Server {
    ctx: ServiceContext,
}

impl Hy2Server {
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
        let version = self.ctx.config.snapshot().hy2_version;
        format!(
            "https://github.com/apernet/hysteria/releases/download/app%2Fv{version}/hysteria-linux-{}",
            self.ctx.arch.go_name()
        )
    }

    async fn configure(&self) -> Result<(), InstallError> {
        let cfg = self.ctx.config.snapshot();
        let dir = self.dir();
        self.ctx.certs.generate(&cfg.domain, &dir).await?;
        info!(service = NAME, "tls certificate generated");

        let template = self.ctx.fetcher.fetch_text(CONFIG_URL).await?;
        let cert_dir = dir.display().to_string();
        let text = render_template(
            &template,
            &[
                ("10008", cfg.port.as_str()),
                ("CERT_FILE_PATH", cert_dir.as_str()),
                ("HY2_PASSWORD", cfg.identity.as_str()),
            ],
        );
        write_config(&self.config_path(), &text)
    }
}

#[async_trait]
impl Service for Hy2Server {
    fn name(&self) -> &str {
        NAME
    }

    fn binary(&self) -> PathBuf {
        self.dir().join(NAME)
    }

    async fn install(&self) -> Result<(), InstallError> {
        prepare_dir(&self.dir())?;
        let binary = self.binary();
        self.ctx.fetcher.fetch(&self.download_url(), &binary).await?;
        make_executable(&binary)?;
        if let Err(e) = self.configure().await {
            discard_binary(&binary);
            return Err(e);
        }
        Ok(())
    }

    fn plan(&self) -> Box<dyn RunPlan> {
        let cmd = CommandSpec::new(self.binary())
            .arg("server")
            .arg("-c")
            .arg(self.config_path().display().to_string())
            .output(OutputMode::Discard);
        Box::new(StaticPlan::new(Arc::<str>::from(NAME), cmd))
    }
}
