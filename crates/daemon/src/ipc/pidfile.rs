//! PID file utilities for daemon running detection.
//!
//! The PID file is stored at:
//! - `$XDG_DATA_HOME/pcwake/daemon.pid` if XDG_DATA_HOME is set
//! - `~/.local/share/pcwake/daemon.pid` otherwise

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Get the path to the daemon PID file.
pub fn get_pid_file_path() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local/share")
        });
    data_dir.join("pcwake").join("daemon.pid")
}

/// Check if a daemon process is currently running.
///
/// Cleans up stale PID files automatically.
pub fn is_daemon_running() -> bool {
    get_daemon_pid().is_some()
}

/// Get the PID of the running daemon, if any.
pub fn get_daemon_pid() -> Option<u32> {
    read_live_pid(&get_pid_file_path())
}

/// Writes the current process id to `path`.
pub fn write_pid_file(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{}\n", std::process::id()))
}

/// Removes the PID file if it still names this process.
pub fn remove_pid_file(path: &Path) {
    let ours = fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        == Some(std::process::id());
    if ours {
        let _ = fs::remove_file(path);
    }
}

fn read_live_pid(pid_path: &Path) -> Option<u32> {
    let pid_str = fs::read_to_string(pid_path).ok()?;

    let pid: u32 = match pid_str.trim().parse() {
        Ok(p) => p,
        Err(_) => {
            cleanup_stale_pid_file(pid_path);
            return None;
        }
    };

    if is_process_running(pid) {
        Some(pid)
    } else {
        cleanup_stale_pid_file(pid_path);
        None
    }
}

/// Signal 0 probes for existence without delivering anything. `EPERM`
/// means the process exists but belongs to someone else.
fn is_process_running(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

fn cleanup_stale_pid_file(path: &Path) {
    let _ = fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_pid_file_path_structure() {
        let path = get_pid_file_path();
        assert!(path.ends_with("pcwake/daemon.pid"));
    }

    #[test]
    fn test_is_process_running_current() {
        assert!(is_process_running(std::process::id()));
    }

    #[test]
    fn test_is_process_running_invalid() {
        assert!(!is_process_running(4_000_000_000));
        assert!(!is_process_running(0));
    }

    #[test]
    fn test_is_process_running_init() {
        assert!(is_process_running(1), "PID 1 should always be running");
    }

    #[test]
    fn test_write_then_read_own_pid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pid_file = temp_dir.path().join("pcwake").join("daemon.pid");

        write_pid_file(&pid_file).unwrap();
        assert_eq!(read_live_pid(&pid_file), Some(std::process::id()));

        remove_pid_file(&pid_file);
        assert!(!pid_file.exists());
    }

    #[test]
    fn test_remove_leaves_foreign_pid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");
        fs::write(&pid_file, "1\n").unwrap();

        remove_pid_file(&pid_file);
        assert!(pid_file.exists());
    }

    #[test]
    fn test_stale_pid_file_is_cleaned_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");
        fs::write(&pid_file, "4000000000\n").unwrap();

        assert_eq!(read_live_pid(&pid_file), None);
        assert!(!pid_file.exists(), "Stale PID file should be cleaned up");
    }

    #[test]
    fn test_garbage_pid_file_is_cleaned_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pid_file = temp_dir.path().join("daemon.pid");
        fs::write(&pid_file, "not-a-pid").unwrap();

        assert_eq!(read_live_pid(&pid_file), None);
        assert!(!pid_file.exists());
    }
}
