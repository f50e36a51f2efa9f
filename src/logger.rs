//! Session log: one file per launch in the OS data directory, truncated on
//! startup so it never grows across sessions.
//!
//!   Linux:    `~/.local/share/MemeFE/memefe.log`
//!   Windows:  `%APPDATA%\MemeFE\memefe.log`
//!   macOS:    `~/Library/Application Support/MemeFE/memefe.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the
//! crate.  Logging failures are swallowed; the log must never take the
//! application down with it.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static SINK: OnceLock<Mutex<File>> = OnceLock::new();

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*))
    };
}

/// Append one level-tagged, timestamped line to the session log.
pub fn write(level: &str, msg: &str) {
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.lock()
    {
        let _ = writeln!(file, "[{}] [{}] {}", clock(), level, msg);
    }
}

/// Open (truncating) the session log and install a panic hook that mirrors
/// panic messages into it.  Called once at startup, before any logging.
pub fn init() {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new().create(true).write(true).truncate(true).open(&path);
    match file {
        Ok(mut f) => {
            let unix = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let _ = writeln!(f, "=== MemeFE session started (unix {unix}) ===");
            let _ = writeln!(f, "Log file: {}", path.display());
            let _ = writeln!(f);
            let _ = SINK.set(Mutex::new(f));
        }
        Err(e) => {
            eprintln!("[logger] could not open log file {:?}: {}", path, e);
            return;
        }
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write("PANIC", &info.to_string());
        prev(info);
    }));
}

fn log_file_path() -> PathBuf {
    data_dir().join("MemeFE").join("memefe.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS within the current day, enough to order a single session's lines.
fn clock() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60)
        }
        Err(_) => "??:??:??".to_string(),
    }
}
