//! Warden - content moderation service.
//!
//! Loads the moderation rules, connects and warms up the classifier backend,
//! then serves the HTTP API until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use directories::ProjectDirs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use warden_core::config::DEFAULT_CONFIG_FILE;
use warden_core::{ContentClassifier, DisabledClassifier, LlamaServerClassifier, ModerationConfig};
use warden_server::{AppState, Server, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};

/// Warden - cached content moderation service
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
struct Args {
    /// Path to the moderation rules file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to bind to
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Override the classifier backend URL from the config file
    #[arg(long)]
    classifier_url: Option<String>,

    /// Run without a classifier backend (every request degrades)
    #[arg(long)]
    no_classifier: bool,

    /// Skip the classifier warm-up at startup
    #[arg(long)]
    skip_warm_up: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Get the default logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "warden", "Warden").map(|dirs| dirs.data_dir().join("logs"))
}

fn env_filter(args: &Args) -> EnvFilter {
    let level = if args.debug { "debug" } else { args.log_level.as_str() };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warden={0},warden_core={0},warden_server={0},warden_app={0},warn",
            level
        ))
    })
}

/// Initialize logging to stdout plus a daily rolling file.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if let Some(log_dir) = args.log_dir.clone().or_else(logs_dir) {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(10)
                .filename_prefix("moderation")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter(args))
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    tracing_subscriber::fmt().with_env_filter(env_filter(args)).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

/// Picks the classifier backend from config and CLI flags.
fn build_classifier(
    args: &Args,
    config: &mut ModerationConfig,
) -> anyhow::Result<Arc<dyn ContentClassifier>> {
    if let Some(url) = &args.classifier_url {
        config.classifier.base_url = url.clone();
    }

    if args.no_classifier || !config.classifier.enabled {
        tracing::warn!("No classifier backend configured; all requests will degrade");
        return Ok(Arc::new(DisabledClassifier));
    }

    let classifier = LlamaServerClassifier::new(config.classifier.clone())
        .context("failed to create classifier client")?;
    Ok(Arc::new(classifier))
}

/// Loads and exercises the classifier once. Failure is logged, never fatal.
async fn warm_up(classifier: &dyn ContentClassifier) {
    tracing::info!(classifier = classifier.name(), "Warming up classifier");
    match classifier.warm_up().await {
        Ok(()) => tracing::info!("Classifier ready"),
        Err(e) => tracing::warn!(
            "Classifier warm-up failed, serving degraded results until it loads: {}",
            e
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args);

    tracing::info!("Starting Warden v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ModerationConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    tracing::info!(
        cache_size = config.cache.max_size,
        ttl_seconds = config.cache.ttl_seconds,
        block_at = config.thresholds.block_at,
        scoring_version = config.scoring.version(),
        "Loaded moderation rules"
    );

    let classifier = build_classifier(&args, &mut config)?;
    if !args.skip_warm_up {
        warm_up(classifier.as_ref()).await;
    }

    let state = AppState::from_config(&config, classifier)?;
    let server_config = ServerConfig::default()
        .with_host(args.host.clone())
        .with_port(args.port);
    let server = Server::new(server_config, state)?;

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "cache_settings": {"max_size": 10, "ttl_seconds": 60},
        "scoring_table": {"levels": {
            "0": {"category": "clean", "reason": "ok"},
            "1": {"category": "clean", "reason": "ok"},
            "2": {"category": "clean", "reason": "ok"},
            "3": {"category": "borderline", "reason": "hm"},
            "4": {"category": "borderline", "reason": "hm"},
            "5": {"category": "inappropriate", "reason": "rude"},
            "6": {"category": "inappropriate", "reason": "rude"},
            "7": {"category": "harmful", "reason": "bad"},
            "8": {"category": "harmful", "reason": "bad"},
            "9": {"category": "toxic", "reason": "hate"}
        }},
        "thresholds": {"block_at": 9}
    }"#;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["warden"]).unwrap();
        assert_eq!(args.config, PathBuf::from("moderation-rules.json"));
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 5000);
        assert!(!args.no_classifier);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_no_classifier_flag_disables_backend() {
        let args = Args::try_parse_from(["warden", "--no-classifier"]).unwrap();
        let mut config = ModerationConfig::from_json(CONFIG).unwrap();

        let classifier = build_classifier(&args, &mut config).unwrap();
        assert_eq!(classifier.name(), "none");
        assert!(!classifier.is_loaded());
    }

    #[test]
    fn test_classifier_url_override_applies() {
        let args =
            Args::try_parse_from(["warden", "--classifier-url", "http://10.0.0.5:9000"]).unwrap();
        let mut config = ModerationConfig::from_json(CONFIG).unwrap();

        let classifier = build_classifier(&args, &mut config).unwrap();
        assert_eq!(config.classifier.base_url, "http://10.0.0.5:9000");
        assert_eq!(classifier.name(), "phi-3-mini");
    }
}
