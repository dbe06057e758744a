//! nexus-daemon - runs the Nexus Monitor session engine behind HTTP/WebSocket.

use clap::Parser;
use nexus_core::config::EngineConfig;
use nexus_core::persistence::{JsonlStore, SessionStore};
use nexus_core::EngineContext;
use nexus_http::SharedState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "nexus-daemon", about = "Nexus Monitor session engine")]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Directory for the JSONL session store. Without it nothing is persisted.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seconds without an update before a session is reaped.
    #[arg(long, default_value_t = 600)]
    inactivity_secs: u64,

    #[arg(long, default_value_t = 60)]
    reaper_interval_secs: u64,

    #[arg(long, default_value_t = 30)]
    analytics_interval_secs: u64,
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig, String> {
        if self.reaper_interval_secs == 0 || self.analytics_interval_secs == 0 {
            return Err("Monitor intervals must be at least one second".to_string());
        }
        Ok(EngineConfig {
            inactivity_threshold: Duration::from_secs(self.inactivity_secs),
            reaper_interval: Duration::from_secs(self.reaper_interval_secs),
            analytics_interval: Duration::from_secs(self.analytics_interval_secs),
            ..EngineConfig::default()
        })
    }
}

fn build_context(args: &Args) -> Result<EngineContext, String> {
    let mut builder = EngineContext::builder().config(args.engine_config()?);
    if let Some(dir) = &args.data_dir {
        let store = JsonlStore::open(dir)
            .map_err(|e| format!("Failed to open data directory {}: {}", dir.display(), e))?;
        log::info!("Persisting sessions to {}", store.dir().display());
        let store: Arc<dyn SessionStore> = Arc::new(store);
        builder = builder.store(store);
    }

    let context = builder.build();
    match context.restore_from_store() {
        Ok(0) => {}
        Ok(count) => log::info!("Loaded {} completed sessions from store", count),
        Err(e) => log::warn!("Failed to load session history: {}", e),
    }
    Ok(context)
}

async fn run(args: Args) -> Result<(), String> {
    let context = build_context(&args)?;
    let tasks = context.start_background();

    let state = Arc::new(SharedState::new(context));
    let (host, port) = (args.host.clone(), args.port);
    let mut server = tokio::task::spawn_blocking(move || nexus_http::start(state, host, port))
        .await
        .map_err(|e| format!("HTTP startup task failed: {}", e))??;
    log::info!("Nexus Monitor ready on {}:{}", args.host, args.port);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for shutdown signal: {}", e))?;
    log::info!("Shutdown requested");

    tokio::task::spawn_blocking(move || server.stop())
        .await
        .map_err(|e| format!("HTTP shutdown task failed: {}", e))?;
    tasks.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_config() {
        let args = Args::parse_from(["nexus-daemon"]);
        assert_eq!(args.port, 8000);
        assert_eq!(args.engine_config().unwrap(), EngineConfig::default());
    }

    #[test]
    fn flags_override_intervals() {
        let args = Args::parse_from([
            "nexus-daemon",
            "--inactivity-secs",
            "120",
            "--reaper-interval-secs",
            "10",
            "--analytics-interval-secs",
            "5",
        ]);
        let config = args.engine_config().unwrap();
        assert_eq!(config.inactivity_threshold, Duration::from_secs(120));
        assert_eq!(config.reaper_interval, Duration::from_secs(10));
        assert_eq!(config.analytics_interval, Duration::from_secs(5));
        assert_eq!(config.mission_time_budget, 5280);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let args = Args::parse_from(["nexus-daemon", "--reaper-interval-secs", "0"]);
        assert!(args.engine_config().is_err());
    }

    #[test]
    fn build_context_without_data_dir_uses_null_store() {
        let args = Args::parse_from(["nexus-daemon"]);
        let context = build_context(&args).unwrap();
        assert!(context.registry.history().is_empty());
    }

    #[tokio::test]
    async fn run_fails_when_port_is_taken() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port().to_string();
        let args = Args::parse_from(["nexus-daemon", "--host", "127.0.0.1", "--port", port.as_str()]);

        let err = run(args).await.unwrap_err();
        assert!(err.contains("Failed to bind"), "{err}");
    }
}
