//! Stderr logging for the command-line tool.
//!
//! The library logs through the `log` facade; the subscriber picks those
//! records up and prints them to stderr.

use tracing_subscriber::filter::LevelFilter;

/// Install the stderr subscriber at `level`. A second call keeps the first.
pub fn init(level: LevelFilter) {
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
    if let Err(e) = installed {
        log::debug!("logger already installed: {}", e);
    }
}
