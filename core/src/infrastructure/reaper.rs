//! Reaping of processes known to hang after winetricks returns.
//!
//! Some .NET installers leave `mscorsvw.exe` running forever, which keeps
//! wineserver alive and stalls the game launch. After the installer exits we
//! scan every process and SIGKILL those whose command line names a
//! denylisted executable.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Kills leftover processes whose command line mentions a denylisted name.
pub trait HangReaper {
    /// Returns the PIDs that were sent a kill signal.
    fn reap_known_hangers(&self, denylist: &[String]) -> Vec<u32>;
}

/// Linux implementation that scans `/proc/<pid>/cmdline`.
#[derive(Debug, Clone)]
pub struct ProcReaper {
    proc_root: PathBuf,
}

impl ProcReaper {
    pub fn new() -> Self {
        ProcReaper {
            proc_root: PathBuf::from("/proc"),
        }
    }

    /// Scan a different procfs root. Used by tests.
    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        ProcReaper {
            proc_root: proc_root.into(),
        }
    }

    /// PIDs whose command line contains any denylisted name. Our own process
    /// is never matched; processes that vanish mid-scan are skipped.
    pub fn matching_pids(&self, denylist: &[String]) -> Vec<u32> {
        if denylist.is_empty() {
            return Vec::new();
        }
        let entries = match std::fs::read_dir(&self.proc_root) {
            Ok(e) => e,
            Err(e) => {
                warn!(root = %self.proc_root.display(), error = %e, "cannot list processes");
                return Vec::new();
            }
        };
        let own = std::process::id();

        let mut pids: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter(|&pid| pid != own)
            .filter(|&pid| {
                read_cmdline(&self.proc_root, pid)
                    .is_some_and(|cmd| denylist.iter().any(|exe| cmd.contains(exe.as_str())))
            })
            .collect();
        pids.sort_unstable();
        pids
    }
}

impl Default for ProcReaper {
    fn default() -> Self {
        Self::new()
    }
}

impl HangReaper for ProcReaper {
    fn reap_known_hangers(&self, denylist: &[String]) -> Vec<u32> {
        debug!(?denylist, "killing hanging wine processes");
        let mut killed = Vec::new();
        for pid in self.matching_pids(denylist) {
            if kill_pid(pid) {
                warn!(pid, "killed hanging process");
                killed.push(pid);
            } else {
                debug!(pid, "hanging process already gone");
            }
        }
        killed
    }
}

/// Raw command line with NUL separators turned into spaces. `None` when the
/// process has exited or the file is unreadable.
fn read_cmdline(proc_root: &Path, pid: u32) -> Option<String> {
    let bytes = std::fs::read(proc_root.join(pid.to_string()).join("cmdline")).ok()?;
    Some(String::from_utf8_lossy(&bytes).replace('\0', " "))
}

fn kill_pid(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) == 0 }
}

/// Test-double reaper that records each denylist it was asked to reap and
/// reports a fixed set of PIDs.
pub struct MockReaper {
    calls: RefCell<Vec<Vec<String>>>,
    killed: Vec<u32>,
}

impl MockReaper {
    pub fn new() -> Self {
        MockReaper::reporting(Vec::new())
    }

    pub fn reporting(killed: Vec<u32>) -> Self {
        MockReaper {
            calls: RefCell::new(Vec::new()),
            killed,
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl Default for MockReaper {
    fn default() -> Self {
        Self::new()
    }
}

impl HangReaper for MockReaper {
    fn reap_known_hangers(&self, denylist: &[String]) -> Vec<u32> {
        self.calls.borrow_mut().push(denylist.to_vec());
        self.killed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_proc(entries: &[(&str, &str)]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for (name, cmdline) in entries {
            let dir = tmp.path().join(name);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("cmdline"), cmdline).unwrap();
        }
        tmp
    }

    fn denylist() -> Vec<String> {
        vec!["mscorsvw.exe".to_string()]
    }

    #[test]
    fn matches_denylisted_command_lines() {
        let root = fake_proc(&[
            ("101", "C:\\windows\\Microsoft.NET\\mscorsvw.exe\0-StartupEvent\0"),
            ("102", "/usr/bin/bash\0"),
            ("103", "wine64\0C:\\mscorsvw.exe\0"),
        ]);
        let reaper = ProcReaper::with_root(root.path());
        assert_eq!(reaper.matching_pids(&denylist()), vec![101, 103]);
    }

    #[test]
    fn skips_non_pid_entries_and_unreadable_processes() {
        let root = fake_proc(&[("self", "mscorsvw.exe\0"), ("sys", "mscorsvw.exe\0")]);
        // A PID directory without a cmdline file behaves like a vanished process.
        std::fs::create_dir_all(root.path().join("200")).unwrap();
        let reaper = ProcReaper::with_root(root.path());
        assert!(reaper.matching_pids(&denylist()).is_empty());
    }

    #[test]
    fn never_matches_own_pid() {
        let own = std::process::id().to_string();
        let root = fake_proc(&[(own.as_str(), "mscorsvw.exe\0")]);
        let reaper = ProcReaper::with_root(root.path());
        assert!(reaper.matching_pids(&denylist()).is_empty());
    }

    #[test]
    fn empty_denylist_matches_nothing() {
        let root = fake_proc(&[("101", "mscorsvw.exe\0")]);
        let reaper = ProcReaper::with_root(root.path());
        assert!(reaper.matching_pids(&[]).is_empty());
    }

    #[test]
    fn missing_proc_root_is_not_fatal() {
        let reaper = ProcReaper::with_root("/nonexistent/proc");
        assert!(reaper.reap_known_hangers(&denylist()).is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn kills_a_live_hanger() {
        // $0 of the shell carries the marker, so it shows up in its cmdline.
        let marker = format!("protonfix-hanger-{}.exe", std::process::id());
        let mut child = std::process::Command::new("/bin/sh")
            .args(["-c", "sleep 30; true", marker.as_str()])
            .spawn()
            .unwrap();

        let reaper = ProcReaper::new();
        let mut killed = Vec::new();
        // The exec into sh may not be visible in /proc immediately.
        for _ in 0..50 {
            killed = reaper.reap_known_hangers(&[marker.clone()]);
            if !killed.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_eq!(killed, vec![child.id()]);
        let status = child.wait().unwrap();
        assert!(!status.success());
        assert_eq!(status.code(), None);
    }

    #[test]
    fn mock_reaper_records_calls() {
        let reaper = MockReaper::reporting(vec![42]);
        assert_eq!(reaper.reap_known_hangers(&denylist()), vec![42]);
        assert_eq!(reaper.calls(), vec![denylist()]);
    }
}
