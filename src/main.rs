mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use proxyvisor::{
    Arch, ArtifactWriter, CommandSpec, ConfigHandle, Hy2Server, HttpFetcher, Launcher,
    LauncherRef, LogWriter, Orchestrator, OutputMode, Paths, ProxyServer, SelfSignedCertGenerator,
    ServiceContext, SettingsDocument, SupervisorConfig, TokioLauncher, TunnelClient,
    UnzipExtractor, wait_for_shutdown_signal,
};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let work_dir = cli.prepare_work_dir()?;
    let paths = Paths::new(&work_dir);

    // CLI/env over the settings file, the settings file over defaults.
    let mut shared = SettingsDocument::load(&paths.settings)
        .with_context(|| format!("reading {}", paths.settings.display()))?
        .map(SettingsDocument::into_config)
        .unwrap_or_default();
    shared.overlay(cli.overrides());
    let config = ConfigHandle::new(shared);

    let artifacts = ArtifactWriter::new(&paths);
    artifacts
        .write_settings(&config.snapshot())
        .context("persisting settings")?;

    let launcher: LauncherRef = Arc::new(TokioLauncher::new());
    let orchestrator = Orchestrator::new(
        SupervisorConfig {
            grace: cli.grace(),
            ..SupervisorConfig::default()
        },
        Arc::clone(&launcher),
        vec![Arc::new(LogWriter::new())],
    );

    let ctx = ServiceContext {
        config,
        artifacts,
        fetcher: Arc::new(HttpFetcher::new()),
        extractor: Arc::new(UnzipExtractor::new(Arc::clone(&launcher))),
        certs: Arc::new(SelfSignedCertGenerator::new()),
        launcher: Arc::clone(&launcher),
        bus: orchestrator.bus().clone(),
        arch: Arch::detect(),
        paths,
    };

    let handle = orchestrator
        .with_service(Arc::new(ProxyServer::new(ctx.clone())))
        .with_service(Arc::new(Hy2Server::new(ctx.clone())))
        .with_service(Arc::new(TunnelClient::new(ctx)))
        .start()
        .await;
    info!(services = ?handle.services(), "supervision started");

    if cli.no_shell {
        wait_for_shutdown_signal().await?;
    } else {
        tokio::select! {
            res = run_shell(launcher.as_ref(), &cli) => {
                if let Err(e) = res {
                    warn!(error = %e, "foreground shell failed");
                }
            }
            res = wait_for_shutdown_signal() => { res?; }
        }
    }

    info!(active = ?handle.active().await, "shutting down");
    handle.shutdown().await.context("shutdown")?;
    Ok(())
}

/// Runs the foreground shell on the terminal until it exits.
async fn run_shell(launcher: &dyn Launcher, cli: &Cli) -> std::io::Result<()> {
    let cmd = CommandSpec::new(&cli.shell).output(OutputMode::Inherit);
    let mut shell = launcher.launch(&cmd).await?;
    let exit = shell.wait().await?;
    info!(code = ?exit.code(), "foreground shell exited");
    Ok(())
}
