//! nova-exporterd: OpenStack Nova metrics exporter daemon.
//!
//! Assembles the exporter:
//! - Cloud client (Keystone + Nova over HTTP, or a JSON fixture)
//! - Team cache and its background refresh job
//! - Metric registry filtered for the running microversion
//! - HTTP server for `/metrics` and `/healthz`
//!
//! # Usage
//!
//! ```text
//! nova-exporterd run --config /etc/nova-exporter.toml
//! nova-exporterd run --fixture demos/cloud.json --listen 127.0.0.1:9180
//! nova-exporterd catalog --config /etc/nova-exporter.toml --collect-expensive
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nova_client::{CloudClient, CloudSnapshot, HttpCloudClient, StaticCloudClient};
use nova_core::{ApiVersion, Config, ExporterSettings};
use nova_metrics::{Exporter, ExporterOptions, nova_catalog, resolve_api_version};
use nova_teams::{TeamCache, TeamRefresher};

const DEFAULT_LOG_FILTER: &str = "info,nova_exporterd=debug,nova=debug";

#[derive(Parser)]
#[command(name = "nova-exporterd", about = "OpenStack Nova metrics exporter")]
struct Cli {
    /// Log as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve metrics until interrupted.
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Address to listen on; overrides `exporter.listen`.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Print the active metric catalog and exit.
    Catalog {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug, Default)]
struct CommonArgs {
    /// Path to nova-exporter.toml. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Include metrics that issue one API call per tenant or server.
    #[arg(long)]
    collect_expensive: bool,

    /// Fixed compute microversion, e.g. `2.53` or `latest`.
    #[arg(long)]
    compute_api_version: Option<ApiVersion>,

    /// Serve a JSON cloud snapshot instead of contacting the API.
    #[arg(long)]
    fixture: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run { common, listen } => run(common, listen).await,
        Command::Catalog { common } => print_catalog(common).await,
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// File, then environment, then flags.
fn load_config(args: &CommonArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    apply_flags(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_flags(config: &mut Config, args: &CommonArgs) {
    if args.collect_expensive {
        config.exporter.collect_expensive = true;
    }
    if let Some(version) = args.compute_api_version {
        config.exporter.compute_api_version = Some(version);
    }
}

fn build_client(config: &Config, fixture: Option<&Path>) -> anyhow::Result<Arc<dyn CloudClient>> {
    match fixture {
        Some(path) => {
            let snapshot = CloudSnapshot::from_file(path)?;
            info!(
                path = %path.display(),
                tenants = snapshot.tenants.len(),
                servers = snapshot.servers.len(),
                "serving cloud fixture"
            );
            Ok(Arc::new(StaticCloudClient::new(snapshot)))
        }
        None => {
            let client = HttpCloudClient::new(config.cloud.clone())?;
            Ok(Arc::new(client))
        }
    }
}

fn exporter_options(settings: &ExporterSettings, api_version: ApiVersion) -> ExporterOptions {
    ExporterOptions {
        prefix: settings.prefix.clone(),
        api_version,
        include_expensive: settings.collect_expensive,
        channel_capacity: settings.channel_capacity,
        ..ExporterOptions::default()
    }
}

async fn run(common: CommonArgs, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    info!("nova exporter starting");

    let config = load_config(&common)?;
    let settings = &config.exporter;
    let addr = match listen {
        Some(addr) => addr,
        None => settings.listen_addr()?,
    };

    // ── Initialize subsystems ──────────────────────────────────

    let client = build_client(&config, common.fixture.as_deref())?;
    let api_version = resolve_api_version(settings.compute_api_version, client.as_ref()).await;

    let teams = TeamCache::new(settings.team_suffix.clone());
    let exporter = Exporter::new(
        nova_catalog(),
        exporter_options(settings, api_version),
        client.clone(),
        teams.clone(),
    )?;

    let refresher = TeamRefresher::new(
        teams,
        client,
        settings.team_refresh_interval()?,
        settings.team_retry_delay()?,
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let refresh_handle = tokio::spawn(async move {
        refresher.run(shutdown_rx).await;
    });

    // ── Start HTTP server ──────────────────────────────────────

    let router = nova_api::build_router(Arc::new(exporter));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "metrics server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for ctrl-c, running until killed");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Err(e) = refresh_handle.await {
        warn!(error = %e, "team refresher task ended abnormally");
    }

    info!("nova exporter stopped");
    Ok(())
}

async fn print_catalog(common: CommonArgs) -> anyhow::Result<()> {
    let config = load_config(&common)?;
    let settings = &config.exporter;

    // Only a fixture is asked for its version; the catalog command never
    // goes to the network.
    let api_version = match (&settings.compute_api_version, &common.fixture) {
        (Some(v), _) => *v,
        (None, Some(_)) => {
            let client = build_client(&config, common.fixture.as_deref())?;
            resolve_api_version(None, client.as_ref()).await
        }
        (None, None) => ApiVersion::BASE,
    };

    let client: Arc<dyn CloudClient> = Arc::new(StaticCloudClient::default());
    let exporter = Exporter::new(
        nova_catalog(),
        exporter_options(settings, api_version),
        client,
        TeamCache::new(settings.team_suffix.clone()),
    )?;

    print!("{}", render_catalog(&exporter));
    Ok(())
}

fn render_catalog(exporter: &Exporter) -> String {
    let mut out = format!(
        "# compute microversion {}, expensive metrics {}\n",
        exporter.api_version(),
        if exporter.options().include_expensive { "on" } else { "off" }
    );
    for spec in exporter.active_specs() {
        let mut flags = Vec::new();
        if spec.producer().is_none() {
            flags.push("shared".to_string());
        }
        if spec.expensive {
            flags.push("expensive".to_string());
        }
        if let Some(v) = spec.deprecated_since {
            flags.push(format!("deprecated>={v}"));
        }
        let name = exporter
            .descriptor(spec.name)
            .map_or(spec.name, |d| d.name.as_str());
        out.push_str(&format!(
            "{name}\t[{}]\t{}\n",
            spec.labels.join(","),
            flags.join(",")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "nova-exporterd",
            "run",
            "--config",
            "/etc/nova.toml",
            "--listen",
            "127.0.0.1:9999",
            "--collect-expensive",
            "--compute-api-version",
            "2.60",
            "--log-json",
        ])
        .unwrap();
        assert!(cli.log_json);
        match cli.command {
            Command::Run { common, listen } => {
                assert_eq!(common.config, Some(PathBuf::from("/etc/nova.toml")));
                assert!(common.collect_expensive);
                assert_eq!(common.compute_api_version, Some(ApiVersion::new(2, 60)));
                assert_eq!(listen, Some("127.0.0.1:9999".parse().unwrap()));
            }
            Command::Catalog { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn cli_rejects_bad_microversion() {
        assert!(
            Cli::try_parse_from(["nova-exporterd", "catalog", "--compute-api-version", "two"])
                .is_err()
        );
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[exporter]\ncollect_expensive = false\ncompute_api_version = \"2.10\"\nprefix = \"os\""
        )
        .unwrap();

        let mut config = Config::from_file(file.path()).unwrap();
        apply_flags(
            &mut config,
            &CommonArgs {
                collect_expensive: true,
                compute_api_version: Some(ApiVersion::new(2, 90)),
                ..CommonArgs::default()
            },
        );
        assert!(config.exporter.collect_expensive);
        assert_eq!(config.exporter.compute_api_version, Some(ApiVersion::new(2, 90)));
        assert_eq!(config.exporter.prefix, "os");
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut config = Config::from_toml("[exporter]\ncollect_expensive = true\n").unwrap();
        apply_flags(&mut config, &CommonArgs::default());
        assert!(config.exporter.collect_expensive);
        assert_eq!(config.exporter.compute_api_version, None);
    }

    #[test]
    fn catalog_listing_marks_flags() {
        let settings = ExporterSettings {
            collect_expensive: true,
            ..ExporterSettings::default()
        };
        let exporter = Exporter::new(
            nova_catalog(),
            exporter_options(&settings, ApiVersion::new(2, 10)),
            Arc::new(StaticCloudClient::default()),
            TeamCache::new("-team"),
        )
        .unwrap();
        let listing = render_catalog(&exporter);

        assert!(listing.starts_with("# compute microversion 2.10, expensive metrics on\n"));
        assert!(listing.contains("openstack_nova_security_groups\t[]\tdeprecated>=2.36\n"));
        assert!(listing.contains("openstack_nova_vcpus_used\t[hostname,availability_zone,aggregates]\tshared,deprecated>=2.88\n"));
        assert!(listing.contains("openstack_nova_limits_vcpus_max\t[tenant,tenant_id]\texpensive\n"));
    }

    #[test]
    fn demo_files_load() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        let config = Config::from_file(&demos.join("nova-exporter.toml")).unwrap();
        assert_eq!(config.cloud.interface.as_str(), "internal");
        let snapshot = CloudSnapshot::from_file(&demos.join("cloud.json")).unwrap();
        assert_eq!(snapshot.servers.len(), 3);
        assert_eq!(snapshot.limits.len(), 2);
    }

    #[tokio::test]
    async fn fixture_client_serves_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"api_version":"2.79","flavors":[{{"id":"1"}}]}}"#).unwrap();

        let client = build_client(&Config::default(), Some(file.path())).unwrap();
        assert_eq!(client.api_version().await.unwrap(), ApiVersion::new(2, 79));
        assert_eq!(client.list_flavors().await.unwrap().len(), 1);
    }
}
