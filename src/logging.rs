use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::settings::Settings;

/// Install the global subscriber: everything allowed by `RUST_LOG` (or the
/// configured level) goes to the log file, warnings and errors also to stderr.
///
/// Returns the log file path, or `None` when the file could not be opened.
pub fn init(settings: &Settings) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let path = settings.log_file();
    let opened = std::fs::create_dir_all(settings.log_dir())
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));
    let (file, open_error) = match opened {
        Ok(file) => (Some(file), None),
        Err(e) => (None, Some(e)),
    };

    // The file layer is optional so one subscriber type covers both cases.
    let to_file = file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_filter(filter)
    });
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(LevelFilter::WARN);
    let installed = tracing_subscriber::registry()
        .with(to_file)
        .with(stderr)
        .try_init()
        .is_ok();

    if let Some(e) = open_error {
        tracing::warn!(path = %path.display(), error = %e, "log file unavailable; logging to stderr only");
        return None;
    }
    installed.then_some(path)
}
