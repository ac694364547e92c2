//! Global `tklog` setup. Console output is always on; the rotating file sink
//! is opt-in and the choice survives restarts.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tklog::{Format, LEVEL, LOG};

pub const LOG_FILE_ENV: &str = "KREVIEW_LOG_FILE";

const LOG_FILE_MAX_BYTES: u64 = 10 * 1024 * 1024;
const LOG_FILE_BACKUPS: u32 = 5;

struct LogPaths {
    log_file: Option<PathBuf>,
    toggle_file: PathBuf,
}

static PATHS: OnceLock<LogPaths> = OnceLock::new();
static FILE_LOGGING_ENABLED: AtomicBool = AtomicBool::new(false);
static FILE_SINK_INSTALLED: AtomicBool = AtomicBool::new(false);

fn state_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    if let Some(app_data) = std::env::var_os("APPDATA") {
        return Some(PathBuf::from(app_data).join("kreview"));
    }

    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kreview"))
}

fn forced_log_file() -> Option<PathBuf> {
    std::env::var_os(LOG_FILE_ENV)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

fn paths() -> &'static LogPaths {
    PATHS.get_or_init(|| {
        let dir = state_dir();

        #[cfg(target_os = "macos")]
        let platform_log = std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join("Library")
                .join("Logs")
                .join("kReview")
                .join("debug.log")
        });
        #[cfg(not(target_os = "macos"))]
        let platform_log = dir.as_ref().map(|dir| dir.join("logs").join("debug.log"));

        let log_file = forced_log_file()
            .or(platform_log)
            .or_else(|| Some(std::env::temp_dir().join("kreview-debug.log")));
        let toggle_file = dir
            .map(|dir| dir.join("logging_enabled"))
            .unwrap_or_else(|| std::env::temp_dir().join("kreview-logging-enabled"));

        LogPaths {
            log_file,
            toggle_file,
        }
    })
}

fn read_toggle() -> bool {
    std::fs::read_to_string(&paths().toggle_file)
        .map(|raw| {
            matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

fn write_toggle(enabled: bool) {
    let path = &paths().toggle_file;
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, if enabled { "1" } else { "0" });
}

pub fn log_file_path() -> Option<PathBuf> {
    paths().log_file.clone()
}

pub fn file_logging_enabled() -> bool {
    FILE_LOGGING_ENABLED.load(Ordering::Relaxed)
}

/// Turns the file sink on and remembers the choice. Returns false when no
/// log directory can be created.
pub fn enable_file_logging() -> bool {
    if file_logging_enabled() {
        return true;
    }

    let Some(path) = log_file_path() else {
        eprintln!("[log] cannot enable file logging: no writable path");
        return false;
    };
    if let Some(parent) = path.parent()
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("[log] failed to create log dir: {} | {}", parent.display(), err);
        return false;
    }

    if !FILE_SINK_INSTALLED.swap(true, Ordering::Relaxed) {
        LOG.set_cutmode_by_size(
            &path.to_string_lossy(),
            LOG_FILE_MAX_BYTES,
            LOG_FILE_BACKUPS,
            true,
        );
    }

    FILE_LOGGING_ENABLED.store(true, Ordering::Relaxed);
    write_toggle(true);
    true
}

pub fn disable_file_logging() {
    FILE_LOGGING_ENABLED.store(false, Ordering::Relaxed);
    write_toggle(false);
}

/// Configures the global logger. File logging starts on when
/// `KREVIEW_LOG_FILE` is set or when it was left on last session.
pub fn initialize() {
    LOG.set_level(LEVEL::Debug)
        .set_console(true)
        .set_format(Format::LevelFlag | Format::Date | Format::Time | Format::ShortFileName)
        .set_formatter("{level}{time} {file}:{message}\n");

    if forced_log_file().is_some() || read_toggle() {
        let _ = enable_file_logging();
    }
}

/// Debug line, written only while file logging is on.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        if $crate::logger::file_logging_enabled() {
            tklog::debug!(format!($($arg)*));
        }
    }};
}

/// Warning line, always written.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {{
        tklog::warn!(format!($($arg)*));
    }};
}
