use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;

/// Map a textual level to a filter. Unknown names fall back to `INFO`.
pub fn level_filter(default_level: &str, enabled: bool) -> LevelFilter {
    if !enabled {
        return LevelFilter::OFF;
    }
    match default_level.to_lowercase().as_str() {
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// File name for a log session started now, e.g. `log_20250101_120000.txt`.
pub fn log_file_name() -> String {
    format!("log_{}.txt", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Initialize tracing for the application.
///
/// `enabled` is the user's logging preference; when it is false nothing is
/// emitted at all. When `log_dir` is given, output goes to a fresh timestamped
/// file in that directory and its path is returned; otherwise to stderr.
pub fn init(default_level: &str, enabled: bool, log_dir: Option<&Path>) -> Option<PathBuf> {
    let lvl = level_filter(default_level, enabled);

    let log_file = match log_dir {
        Some(dir) if enabled => open_log_file(dir),
        _ => None,
    };

    // try_init so tests and repeated calls don't panic
    match log_file {
        Some((path, file)) => {
            let _ = tracing_subscriber::fmt()
                .with_max_level(lvl)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
            Some(path)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_max_level(lvl)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}

fn open_log_file(dir: &Path) -> Option<(PathBuf, File)> {
    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("Cannot create log directory {}: {e}", dir.display());
        return None;
    }
    let path = dir.join(log_file_name());
    match File::create(&path) {
        Ok(file) => Some((path, file)),
        Err(e) => {
            eprintln!("Cannot create log file {}: {e}", path.display());
            None
        }
    }
}
