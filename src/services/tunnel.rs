//! # Tunnel client (`cf`).
//!
//! Runs in one of two modes, chosen once when supervision starts:
//!
//! ```text
//! token configured?
//!   ├─ no  → Ephemeral: capture output ──► DiscoverySink ──► StreamFactExtractor
//!   │                                                           │ first match
//!   │                                                           ▼
//!   │                         Propagator: set tunnel_domain → regenerate artifacts
//!   └─ yes → Persistent: regenerate descriptors now, discard output, run --token
//! ```
//!
//! Every restarted ephemeral instance gets a fresh extractor, so a tunnel that
//! comes back with a new host rewrites the artifacts again.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::artifacts::ArtifactWriter;
use crate::discovery::StreamFactExtractor;
use crate::error::InstallError;
use crate::events::{Bus, Event, EventKind};
use crate::process::{CommandSpec, LineSink, OutputMode, RunPlan, StaticPlan};
use crate::services::install::{make_executable, prepare_dir};
use crate::services::{Service, ServiceContext};
use crate::settings::{ConfigHandle, SharedConfig};

const NAME: &str = "cf";
const LOCAL_ORIGIN: &str = "http://localhost:8001";

/// How the tunnel client obtains its public host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TunnelMode {
    /// Quick tunnel; the host is discovered from the client's output.
    Ephemeral,
    /// Named tunnel authenticated by a static token.
    Persistent { token: String },
}

impl TunnelMode {
    pub fn from_config(cfg: &SharedConfig) -> Self {
        match cfg.token() {
            Some(token) => TunnelMode::Persistent {
                token: token.to_string(),
            },
            None => TunnelMode::Ephemeral,
        }
    }
}

/// The reverse-tunnel client.
pub struct TunnelClient {
    ctx: ServiceContext,
}

impl TunnelClient {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    fn dir(&self) -> PathBuf {
        self.ctx.paths.bin_dir(NAME)
    }

    fn download_url(&self) -> String {
        let version = self.ctx.config.snapshot().tunnel_version;
        format!(
            "https://github.com/cloudflare/cloudflared/releases/download/{version}/cloudflared-linux-{}",
            self.ctx.arch.go_name()
        )
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(self.binary()).args([
            "tunnel",
            "--no-autoupdate",
            "--edge-ip-version",
            "auto",
            "--protocol",
            "http2",
        ])
    }

    fn propagator(&self) -> Propagator {
        Propagator {
            config: self.ctx.config.clone(),
            artifacts: self.ctx.artifacts.clone(),
            bus: self.ctx.bus.clone(),
        }
    }
}

#[async_trait]
impl Service for TunnelClient {
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

        let cfg = self.ctx.config.snapshot();
        if let Err(e) = self.ctx.artifacts.write_descriptors(&cfg) {
            self.ctx.bus.publish(
                Event::new(EventKind::ArtifactWriteFailed)
                    .with_service(NAME)
                    .with_reason(e.to_string()),
            );
        }
        Ok(())
    }

    fn plan(&self) -> Box<dyn RunPlan> {
        match TunnelMode::from_config(&self.ctx.config.snapshot()) {
            TunnelMode::Ephemeral => {
                info!(service = NAME, "no tunnel token, discovering quick tunnel host");
                Box::new(EphemeralPlan {
                    cmd: self
                        .command()
                        .args(["--url", LOCAL_ORIGIN])
                        .output(OutputMode::Capture),
                    propagator: self.propagator(),
                })
            }
            TunnelMode::Persistent { token } => {
                self.propagator().publish_descriptors();
                let cmd = self
                    .command()
                    .args(["run", "--token", token.as_str()])
                    .output(OutputMode::Discard);
                Box::new(StaticPlan::new(Arc::<str>::from(NAME), cmd))
            }
        }
    }
}

/// Writes a discovered host into the shared config and regenerates the artifacts.
#[derive(Clone)]
struct Propagator {
    config: ConfigHandle,
    artifacts: ArtifactWriter,
    bus: Bus,
}

impl Propagator {
    fn propagate(&self, host: &str) {
        let changed = self.config.set_tunnel_domain(host);
        self.bus.publish(
            Event::new(EventKind::FactDiscovered)
                .with_service(NAME)
                .with_host(host),
        );
        debug!(service = NAME, host, changed, "tunnel domain recorded");

        // Runs on the line reader task; both files are a few hundred bytes, so the
        // synchronous writes stay inline.
        let cfg = self.config.snapshot();
        match self.artifacts.regenerate(&cfg) {
            Ok(()) => self.completed(),
            Err(e) => self.bus.publish(
                Event::new(EventKind::ArtifactWriteFailed)
                    .with_service(NAME)
                    .with_reason(e.to_string()),
            ),
        }
    }

    /// Rewrites the descriptor file only; the tunnel domain is left as configured.
    fn publish_descriptors(&self) {
        let cfg = self.config.snapshot();
        match self.artifacts.write_descriptors(&cfg) {
            Ok(()) => self.completed(),
            Err(e) => self.bus.publish(
                Event::new(EventKind::ArtifactWriteFailed)
                    .with_service(NAME)
                    .with_reason(e.to_string()),
            ),
        }
    }

    fn completed(&self) {
        let path = self.artifacts.descriptors_path().display().to_string();
        self.bus.publish(
            Event::new(EventKind::ArtifactsRegenerated)
                .with_service(NAME)
                .with_reason(path.clone()),
        );
        info!(service = NAME, path = %path, "startup completed, connection details written");
    }
}

struct EphemeralPlan {
    cmd: CommandSpec,
    propagator: Propagator,
}

impl RunPlan for EphemeralPlan {
    fn command(&self) -> CommandSpec {
        self.cmd.clone()
    }

    fn sink(&self) -> Box<dyn LineSink> {
        let propagator = self.propagator.clone();
        Box::new(DiscoverySink {
            extractor: StreamFactExtractor::new(move |host: String| propagator.propagate(&host)),
        })
    }
}

/// Feeds lines to the extractor and stops looking once it has settled.
struct DiscoverySink<F> {
    extractor: StreamFactExtractor<F>,
}

impl<F> LineSink for DiscoverySink<F>
where
    F: FnMut(String) + Send,
{
    fn on_line(&mut self, line: &str) {
        if self.extractor.is_settled() {
            return;
        }
        debug!(service = NAME, "{line}");
        self.extractor.observe(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tokio_util::sync::CancellationToken;

    use crate::config::SupervisorConfig;
    use crate::core::ProcessSupervisor;
    use crate::services::fixtures::context;
    use crate::settings::{PLACEHOLDER_TUNNEL_DOMAIN, SettingsDocument};
    use crate::subscribers::ProcessState;
    use crate::testing::{FakeFetcher, FakeLauncher, FakeRun};

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn descriptor_lines(ctx: &ServiceContext) -> Vec<String> {
        fs::read_to_string(&ctx.paths.descriptors)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_discovered_host_flows_into_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let launcher = Arc::new(FakeLauncher::new().script(
            "cf",
            [FakeRun::print_then_exit(
                &[
                    "INF Requesting new quick Tunnel on trycloudflare.com...",
                    "visit https://foo-bar.trycloudflare.com now",
                    "INF https://ignored-later.trycloudflare.com",
                ],
                0,
            )],
        ));
        let ctx = context(
            dir.path(),
            SharedConfig::default(),
            Arc::new(FakeFetcher::new()),
            launcher.clone(),
            &bus,
        );
        let sup = ProcessSupervisor::new(
            Arc::new(TunnelClient::new(ctx.clone())),
            launcher.clone(),
            bus.clone(),
            &SupervisorConfig::default(),
        );

        let mut handle = sup.startup(CancellationToken::new());
        assert_eq!(handle.wait().await.unwrap(), ProcessState::Stopped);

        let args = launcher.launched()[0].arguments().to_vec();
        assert_eq!(args[args.len() - 2..], ["--url", LOCAL_ORIGIN]);

        assert_eq!(ctx.config.snapshot().tunnel_domain, "foo-bar.trycloudflare.com");
        let ws = &descriptor_lines(&ctx)[0];
        assert!(ws.contains("@foo-bar.trycloudflare.com:443?"), "{ws}");
        assert!(ws.contains("sni=foo-bar.trycloudflare.com&"), "{ws}");

        let saved = SettingsDocument::load(&ctx.paths.settings)
            .unwrap()
            .unwrap()
            .into_config();
        assert_eq!(saved.tunnel_domain, "foo-bar.trycloudflare.com");

        let facts: Vec<Event> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == EventKind::FactDiscovered)
            .collect();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].host.as_deref(), Some("foo-bar.trycloudflare.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarted_instance_rediscovers() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let launcher = Arc::new(FakeLauncher::new().script(
            "cf",
            [
                FakeRun::print_then_exit(&["https://first-1.trycloudflare.com"], 1),
                FakeRun::print_then_exit(&["https://second-2.trycloudflare.com"], 0),
            ],
        ));
        let ctx = context(
            dir.path(),
            SharedConfig::default(),
            Arc::new(FakeFetcher::new()),
            launcher.clone(),
            &bus,
        );
        let sup = ProcessSupervisor::new(
            Arc::new(TunnelClient::new(ctx.clone())),
            launcher,
            bus.clone(),
            &SupervisorConfig::default(),
        );

        let mut handle = sup.startup(CancellationToken::new());
        assert_eq!(handle.wait().await.unwrap(), ProcessState::Stopped);

        assert_eq!(ctx.config.snapshot().tunnel_domain, "second-2.trycloudflare.com");
        assert!(descriptor_lines(&ctx)[0].contains("sni=second-2.trycloudflare.com&"));
        let hosts: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == EventKind::FactDiscovered)
            .filter_map(|e| e.host.as_deref().map(str::to_string))
            .collect();
        assert_eq!(
            hosts,
            vec!["first-1.trycloudflare.com", "second-2.trycloudflare.com"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_artifact_write_keeps_supervising() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let launcher = Arc::new(FakeLauncher::new().script(
            "cf",
            [
                FakeRun::print_then_exit(&["https://lost-1.trycloudflare.com"], 1),
                FakeRun::exit(0),
            ],
        ));
        // Work dir never created: every artifact write fails.
        let ctx = context(
            &dir.path().join("missing"),
            SharedConfig::default(),
            Arc::new(FakeFetcher::new()),
            launcher.clone(),
            &bus,
        );
        let sup = ProcessSupervisor::new(
            Arc::new(TunnelClient::new(ctx.clone())),
            launcher.clone(),
            bus.clone(),
            &SupervisorConfig::default(),
        );

        let mut handle = sup.startup(CancellationToken::new());
        assert_eq!(handle.wait().await.unwrap(), ProcessState::Stopped);

        assert_eq!(launcher.launched().len(), 2);
        assert_eq!(ctx.config.snapshot().tunnel_domain, "lost-1.trycloudflare.com");
        assert!(!ctx.paths.descriptors.exists());

        let kinds: Vec<EventKind> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EventKind::ArtifactWriteFailed));
        assert!(kinds.contains(&EventKind::BackoffScheduled));
        assert!(!kinds.contains(&EventKind::ArtifactsRegenerated));
    }

    #[tokio::test]
    async fn test_no_match_leaves_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Bus::new(64);
        let launcher = Arc::new(FakeLauncher::new().script(
            "cf",
            [FakeRun::print_then_exit(&["ERR failed to request quick Tunnel"], 0)],
        ));
        let ctx = context(
            dir.path(),
            SharedConfig::default(),
            Arc::new(FakeFetcher::new()),
            launcher.clone(),
            &bus,
        );
        let sup = ProcessSupervisor::new(
            Arc::new(TunnelClient::new(ctx.clone())),
            launcher,
            bus,
            &SupervisorConfig::default(),
        );

        let mut handle = sup.startup(CancellationToken::new());
        handle.wait().await.unwrap();
        assert_eq!(ctx.config.snapshot().tunnel_domain, PLACEHOLDER_TUNNEL_DOMAIN);
        assert!(!ctx.paths.descriptors.exists());
    }

    #[test]
    fn test_persistent_mode_writes_descriptors_and_runs_with_token() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SharedConfig {
            tunnel_token: Some("tok".into()),
            tunnel_domain: "named.example.com".into(),
            ..SharedConfig::default()
        };
        let ctx = context(
            dir.path(),
            cfg,
            Arc::new(FakeFetcher::new()),
            Arc::new(FakeLauncher::new()),
            &Bus::new(8),
        );

        let plan = TunnelClient::new(ctx.clone()).plan();
        let cmd = plan.command();
        let args = cmd.arguments();
        assert_eq!(args[args.len() - 3..], ["run", "--token", "tok"]);
        assert_eq!(cmd.output_mode(), OutputMode::Discard);

        let ws = &descriptor_lines(&ctx)[0];
        assert!(ws.contains("sni=named.example.com&"), "{ws}");
    }

    #[tokio::test]
    async fn test_install_is_skipped_when_binary_present() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::new());
        let launcher = Arc::new(FakeLauncher::new());
        let bus = Bus::new(64);
        let ctx = context(
            dir.path(),
            SharedConfig::default(),
            fetcher.clone(),
            launcher.clone(),
            &bus,
        );
        let svc = Arc::new(TunnelClient::new(ctx.clone()));
        let sup = ProcessSupervisor::new(svc.clone(), launcher, bus, &SupervisorConfig::default());

        sup.install().await.unwrap();
        let bytes = fs::read(svc.binary()).unwrap();
        assert_eq!(descriptor_lines(&ctx).len(), 3);

        sup.install().await.unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(fs::read(svc.binary()).unwrap(), bytes);
        assert_eq!(
            fetcher.urls()[0],
            "https://github.com/cloudflare/cloudflared/releases/download/2025.10.0/cloudflared-linux-amd64"
        );
    }
}
