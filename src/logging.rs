//! Server log setup.
//!
//! Connection lifecycle and error events go through `tracing` and are
//! written both to stdout and to `<log_dir>/echotown.log`.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// File name of the shared server log.
pub const SERVER_LOG: &str = "echotown.log";

/// Create the log directory and open the server log for appending.
pub fn open_server_log(dir: &Path) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(SERVER_LOG);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level` when set.
pub fn init(level: &str, dir: &Path) -> io::Result<PathBuf> {
    let (path, file) = open_server_log(dir)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(path)
}
