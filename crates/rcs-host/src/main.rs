//! rcs-host binary entry point.
//!
//! Loads the configuration, wires the native platform backends into a
//! [`SessionRegistry`], and either runs the engine until Ctrl+C (`serve`) or
//! takes a single PNG screenshot (`screenshot`).  `init-config` writes the
//! effective configuration out as a starting point for editing.
//!
//! The transport that carries frames, audio and control calls to the
//! operator is a separate collaborator; `serve` drains the engine outputs
//! into the log so the engine can be exercised on its own.
//!
//! # Usage
//!
//! ```text
//! rcs-host [--config <PATH>] [--log-level <FILTER>] serve
//! rcs-host screenshot --out screen.png
//! rcs-host --config ./rcs.toml init-config
//! ```
//!
//! # Environment variables
//!
//! | Variable        | Equivalent flag  | Default                       |
//! |-----------------|------------------|-------------------------------|
//! | `RCS_CONFIG`    | `--config`       | platform config dir           |
//! | `RCS_LOG_LEVEL` | `--log-level`    | `server.log_level` in config  |
//! | `RUST_LOG`      | (overrides both) | unset                         |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rcs_core::EngineEvent;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use rcs_host::application::input_injector::ClipboardBackend;
use rcs_host::application::platform::PlatformServices;
use rcs_host::application::session_registry::SessionRegistry;
use rcs_host::infrastructure::audio::NativeAudio;
use rcs_host::infrastructure::clipboard::ArboardClipboard;
use rcs_host::infrastructure::platform::unavailable::UnavailablePlatform;
use rcs_host::infrastructure::platform::NativePlatform;
use rcs_host::infrastructure::storage::config::{
    config_file_path, load_config, save_config, AppConfig,
};

#[derive(Debug, Parser)]
#[command(
    name = "rcs-host",
    about = "Remote-control host session engine",
    version
)]
struct Cli {
    /// Path of the TOML configuration file.
    ///
    /// A missing file means every setting takes its default.
    #[arg(long, env = "RCS_CONFIG")]
    config: Option<PathBuf>,

    /// `tracing` filter directive, e.g. `debug` or `rcs_host=trace`.
    ///
    /// Overrides `server.log_level` from the config file.
    #[arg(long, env = "RCS_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the engine until Ctrl+C.
    Serve,
    /// Capture one full-resolution PNG of the screen and exit.
    Screenshot {
        /// Output file.
        #[arg(long, default_value = "screenshot.png")]
        out: PathBuf,
    },
    /// Write the effective configuration to the config file and exit.
    InitConfig,
}

fn init_logging(cli: &Cli, config: &AppConfig) {
    let fallback = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.server.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

/// Opens the native backends.
///
/// Input and capture must be available.  A missing system clipboard only
/// disables paste, so it degrades to a backend that fails each call.
fn native_services() -> anyhow::Result<PlatformServices> {
    let platform =
        Arc::new(NativePlatform::new().context("failed to open the input and capture backend")?);

    let clipboard: Arc<dyn ClipboardBackend> = match ArboardClipboard::new() {
        Ok(clipboard) => Arc::new(clipboard),
        Err(e) => {
            warn!("system clipboard unavailable, paste is disabled: {e}");
            Arc::new(UnavailablePlatform)
        }
    };

    Ok(PlatformServices {
        input: platform.clone(),
        clipboard,
        capture: platform,
        audio: Arc::new(NativeAudio::new()),
    })
}

async fn serve(registry: SessionRegistry) -> anyhow::Result<()> {
    let outputs = registry.outputs();

    if let Some(mut events) = outputs.events {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    EngineEvent::ChannelStopped { kind, reason } => {
                        warn!(channel = %kind, "channel stopped: {reason}");
                    }
                    EngineEvent::ShellClosed { session_id } => {
                        info!(session = %session_id, "shell closed");
                    }
                }
            }
        });
    }

    if let Some(mut audio) = outputs.audio {
        tokio::spawn(async move {
            while let Some(chunk) = audio.recv().await {
                debug!(channel = %chunk.channel, bytes = chunk.data.len(), "audio chunk");
            }
        });
    }

    let mut frames = outputs.frames;
    tokio::spawn(async move {
        while frames.changed().await.is_ok() {
            if let Some(frame) = frames.borrow_and_update().as_ref() {
                debug!(
                    seq = frame.sequence,
                    fps = frame.fps,
                    bytes = frame.image.len(),
                    "video frame"
                );
            }
        }
    });

    info!("rcs-host engine running; press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("received Ctrl+C, releasing devices");
    registry.disconnect();
    Ok(())
}

/// Writes `config` to `--config` or the default location.
fn init_config(config: &AppConfig, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => config_file_path().context("no default config location")?,
    };
    save_config(config, Some(&path)).context("failed to write configuration")?;
    info!(path = %path.display(), "configuration written");
    Ok(())
}

fn engine(config: &AppConfig) -> anyhow::Result<SessionRegistry> {
    let services = native_services()?;
    SessionRegistry::new(services, config.engine_settings()).context("invalid engine settings")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(&cli, &config);

    info!("rcs-host {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::InitConfig => init_config(&config, cli.config),
        Command::Serve => serve(engine(&config)?).await,
        Command::Screenshot { out } => {
            let png = engine(&config)?
                .screenshot()
                .context("screenshot failed")?;
            std::fs::write(&out, &png)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), bytes = png.len(), "screenshot saved");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_takes_no_arguments() {
        // Arrange / Act
        let cli = Cli::parse_from(["rcs-host", "serve"]);

        // Assert
        assert!(matches!(cli.command, Command::Serve));
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn test_screenshot_out_defaults_to_cwd_file() {
        let cli = Cli::parse_from(["rcs-host", "screenshot"]);

        match cli.command {
            Command::Screenshot { out } => assert_eq!(out, PathBuf::from("screenshot.png")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_init_config_honours_config_flag() {
        // Arrange / Act
        let cli = Cli::parse_from(["rcs-host", "--config", "./rcs.toml", "init-config"]);

        // Assert
        assert!(matches!(cli.command, Command::InitConfig));
        assert_eq!(cli.config, Some(PathBuf::from("./rcs.toml")));
    }

    #[test]
    fn test_init_config_writes_a_loadable_file() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("rcs-init-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.server.log_level = "trace".into();

        // Act
        init_config(&config, Some(path.clone())).unwrap();

        // Assert
        assert_eq!(load_config(Some(&path)).unwrap(), config);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_global_flags_precede_subcommand() {
        let cli = Cli::parse_from([
            "rcs-host",
            "--config",
            "/tmp/rcs.toml",
            "--log-level",
            "debug",
            "serve",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/rcs.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
