//! Structured logging and tracing for the PowerShades bridge
//!
//! Console and rolling-file output on top of `tracing-subscriber`, plus the
//! component-scoped [`StructuredLogger`] the rest of the crate logs through.

use crate::config::LoggingConfig;
use crate::error::{Result, ShadesError};
use std::path::Path;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

pub mod level;
pub mod state;
pub mod structured;

pub use level::{level_rank, min_level, parse_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger, get_logger_with_context};

use state::{INIT_ERROR, INIT_ONCE, LOG_GUARD};

/// Environment variable that forces console-only output
pub const DISABLE_FILE_LOG_ENV: &str = "POWERSHADES_DISABLE_FILE_LOG";

type Filtered = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync + 'static>;

/// Initialize logging system based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        let init_result = (|| -> Result<()> {
            let base_level = parse_log_level(&config.level)?;

            let console_level = config
                .console_level
                .as_ref()
                .and_then(|s| parse_log_level(s).ok())
                .unwrap_or(base_level);
            let file_level = config
                .file_level
                .as_ref()
                .and_then(|s| parse_log_level(s).ok())
                .unwrap_or(base_level);

            // Most verbose of the two so the per-layer filters can narrow down
            let filter = build_env_filter(min_level(console_level, file_level));

            if should_use_console_only() {
                install(filter, vec![console_layer(config.json_format, console_level)])?;
                info!(
                    "Logging initialized - console_level: {:?}, console-only",
                    console_level
                );
                return Ok(());
            }

            let mut layers = vec![file_layer(config, file_level)?];
            if config.console_output {
                layers.push(console_layer(config.json_format, console_level));
            }
            install(filter, layers)?;

            info!(
                "Logging initialized - console_level: {:?}, file_level: {:?}, file: {}",
                console_level, file_level, config.file
            );
            Ok(())
        })();

        if let Err(e) = init_result {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    if let Some(err) = INIT_ERROR.get() {
        return Err(ShadesError::config(err.clone()));
    }
    Ok(())
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let lvl = level.as_str().to_lowercase();
        format!("powershades={lvl},reqwest=warn,hyper=warn").into()
    })
}

fn should_use_console_only() -> bool {
    cfg!(test) || std::env::var_os(DISABLE_FILE_LOG_ENV).is_some()
}

fn install(filter: EnvFilter, layers: Vec<BoxedLayer>) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| ShadesError::config(format!("Failed to install log subscriber: {}", e)))
}

fn console_layer(json_format: bool, level: Level) -> BoxedLayer {
    let base = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    if json_format {
        base.json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        base.with_filter(LevelFilter::from_level(level)).boxed()
    }
}

fn file_layer(config: &LoggingConfig, level: Level) -> Result<BoxedLayer> {
    let file_appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("powershades")
        .filename_suffix("log")
        .max_log_files(config.backup_count.max(1) as usize)
        .build(log_directory(&config.file))
        .map_err(|e| ShadesError::io(format!("Failed to create log file appender: {}", e)))?;

    let (writer, guard) = non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    Ok(if config.json_format {
        base.json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        base.with_filter(LevelFilter::from_level(level)).boxed()
    })
}

/// Directory receiving rotated files: the parent of a file path, or the path itself
fn log_directory(file: &str) -> &Path {
    let p = Path::new(file);
    if p.extension().is_some() {
        p.parent().unwrap_or(p)
    } else {
        p
    }
}
