use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use cvm_core::{CvmError, ErrorInfo};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter for a `-v` count. Without flags `RUST_LOG` is honoured, falling
/// back to `info` so the log file records every temperature.
pub fn filter_for(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Installs the global subscriber: the log file always, stdout when
/// `to_screen` is set. The file is truncated.
pub fn init(log_path: &Path, verbose: u8, to_screen: bool) -> Result<(), CvmError> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(|err| CvmError::io("log-mkdir", &err, parent))?;
    }
    let file = File::create(log_path).map_err(|err| CvmError::io("log-create", &err, log_path))?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);
    let screen_layer = to_screen.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter_for(verbose))
        .with(file_layer)
        .with(screen_layer)
        .try_init()
        .map_err(|err| {
            CvmError::Config(
                ErrorInfo::new("log-init", err.to_string())
                    .with_context("path", log_path.display().to_string()),
            )
        })
}
