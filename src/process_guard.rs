//! Child process lifecycle
//!
//! Partitioning and formatting must not outlive the installer. Every child is
//! spawned in its own process group with a parent-death signal, recorded in a
//! global registry while it runs, and the whole group is terminated when the
//! installer is interrupted (SIGINT, SIGTERM, SIGHUP) or exits early.
//!
//! Termination sends SIGTERM to each group, waits for a grace period, then
//! sends SIGKILL to whatever is left. The terminal settings seen at startup
//! are put back before a signal exit, since a prompt may have changed them.

use nix::sys::signal::{self, Signal};
use nix::sys::termios::{SetArg, Termios, tcgetattr, tcsetattr};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::os::fd::AsFd;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Terminal settings of stdin when the signal handlers were installed
static SAVED_TERMINAL: Mutex<Option<Termios>> = Mutex::new(None);

/// Grace period between SIGTERM and SIGKILL on interrupt
pub const SIGNAL_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Grace period when the installer exits with children still running
pub const EXIT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Registry tracking all spawned child processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked children and their process groups.
    ///
    /// Runs at most once per registry.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            debug!("No child processes to terminate");
            return;
        }

        info!("Terminating {} child process(es)...", self.pids.len());

        let pids: Vec<u32> = self.pids.drain().collect();
        for &pid in &pids {
            signal_group_or_process(pid, Signal::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if !pids.iter().any(|&pid| is_process_alive(pid)) {
                info!("All child processes terminated gracefully");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in pids.iter().filter(|&&pid| is_process_alive(pid)) {
            warn!("Process group {} did not terminate, sending SIGKILL", pid);
            signal_group_or_process(pid, Signal::SIGKILL);
        }
        info!("Child process cleanup complete");
    }
}

/// Signal the process group led by `pid`, falling back to the process alone.
///
/// Interactive children stay in the installer's group, so the group signal
/// fails for them and only the child itself is signalled.
fn signal_group_or_process(pid: u32, sig: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match signal::kill(Pid::from_raw(-raw), sig) {
        Ok(()) => debug!("Sent {:?} to process group {}", sig, pid),
        Err(group_err) => {
            if let Err(e) = signal::kill(Pid::from_raw(raw), sig) {
                error!(
                    "Failed to send {:?} to PID {} (group: {}, process: {})",
                    sig, pid, group_err, e
                );
            }
        }
    }
}

/// Check if a process is still alive (not dead or zombie)
fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if signal::kill(Pid::from_raw(raw), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the state; a zombie is already done.
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        if let Some(state) = stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
        {
            return !matches!(state, "Z" | "X");
        }
    }

    true
}

/// Registration of one running child in the global registry.
///
/// Dropping it unregisters the child, so a child is tracked exactly as long
/// as the runner is waiting on it.
pub struct TrackedChild {
    pid: u32,
}

impl TrackedChild {
    pub fn register(pid: u32) -> Self {
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }
        Self { pid }
    }
}

impl Drop for TrackedChild {
    fn drop(&mut self) {
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(self.pid);
        }
    }
}

/// Terminates every tracked child when dropped. Held by `main` for the
/// whole run so early returns also clean up.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        debug!("ProcessGuard dropped, initiating cleanup");
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(EXIT_GRACE_PERIOD);
        }
    }
}

/// Settings of the terminal behind `fd`, or `None` if it is not a terminal
pub fn snapshot_terminal<Fd: AsFd>(fd: Fd) -> Option<Termios> {
    tcgetattr(fd).ok()
}

/// Put back settings taken with [`snapshot_terminal`]
pub fn restore_terminal<Fd: AsFd>(fd: Fd, saved: &Termios) -> nix::Result<()> {
    tcsetattr(fd, SetArg::TCSANOW, saved)
}

fn restore_saved_terminal() {
    let Ok(saved) = SAVED_TERMINAL.lock() else {
        return;
    };
    if let Some(termios) = saved.as_ref() {
        if let Err(e) = restore_terminal(std::io::stdin(), termios) {
            debug!("Failed to restore terminal settings: {}", e);
        }
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
///
/// The handler thread kills all tracked children, restores the terminal,
/// then exits with `128 + signal`. Call once at program start.
pub fn init_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    if let Ok(mut saved) = SAVED_TERMINAL.lock() {
        *saved = snapshot_terminal(std::io::stdin());
    }

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "signal",
            };
            warn!("Received {}, stopping running commands...", name);

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(SIGNAL_GRACE_PERIOD);
            }
            restore_saved_terminal();

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for `std::process::Command` to isolate children
pub trait CommandProcessGroup {
    /// Run the child as leader of its own process group, and have the kernel
    /// send it SIGTERM if the installer dies first.
    fn in_new_process_group(&mut self) -> &mut Self;

    /// Keep the installer's process group (so the child can read the
    /// terminal) but still die with the installer.
    fn with_parent_death_signal(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        self.process_group(0);
        self.with_parent_death_signal();
        self
    }

    fn with_parent_death_signal(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        // SAFETY: prctl is async-signal-safe and touches no parent state.
        unsafe {
            self.pre_exec(|| {
                nix::sys::prctl::set_pdeathsig(Signal::SIGTERM).map_err(std::io::Error::from)
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn wait_for_process_death(pid: u32, timeout: Duration) -> bool {
        use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};

        let start = Instant::now();
        let nix_pid = Pid::from_raw(pid as i32);
        while start.elapsed() < timeout {
            match waitpid(nix_pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => return true,
                Err(nix::errno::Errno::ECHILD) if !is_process_alive(pid) => return true,
                _ => {}
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_terminal_settings_restored_after_echo_disabled() {
        use nix::sys::termios::LocalFlags;

        let pty = nix::pty::openpty(None, None).unwrap();
        let saved = snapshot_terminal(&pty.slave).unwrap();
        assert!(saved.local_flags.contains(LocalFlags::ECHO));

        let mut silent = saved.clone();
        silent.local_flags.remove(LocalFlags::ECHO);
        tcsetattr(&pty.slave, SetArg::TCSANOW, &silent).unwrap();
        assert!(!tcgetattr(&pty.slave).unwrap().local_flags.contains(LocalFlags::ECHO));

        restore_terminal(&pty.slave, &saved).unwrap();
        assert!(tcgetattr(&pty.slave).unwrap().local_flags.contains(LocalFlags::ECHO));
    }

    #[test]
    fn test_snapshot_of_non_terminal_is_none() {
        let file = tempfile::tempfile().unwrap();
        assert!(snapshot_terminal(&file).is_none());
    }

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();
        registry.register(1234);
        registry.register(5678);
        registry.register(1234);
        assert_eq!(registry.count(), 2);

        registry.unregister(1234);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_tracked_child_unregisters_on_drop() {
        let pid = 4_000_001;
        {
            let _tracked = TrackedChild::register(pid);
            assert!(ChildRegistry::global().lock().unwrap().pids.contains(&pid));
        }
        assert!(!ChildRegistry::global().lock().unwrap().pids.contains(&pid));
    }

    #[test]
    fn test_terminate_all_kills_process_group() {
        let child = Command::new("sleep")
            .arg("60")
            .in_new_process_group()
            .spawn()
            .expect("spawn sleep");
        let pid = child.id();

        let mut registry = ChildRegistry::default();
        registry.register(pid);
        assert!(is_process_alive(pid));

        registry.terminate_all(Duration::from_millis(500));
        assert!(wait_for_process_death(pid, Duration::from_secs(2)));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_terminate_all_runs_once() {
        let mut registry = ChildRegistry::default();
        registry.register(999_999);
        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.cleanup_initiated);

        registry.register(999_998);
        registry.terminate_all(Duration::from_millis(10));
        assert_eq!(registry.count(), 1, "second call is a no-op");
    }

    #[test]
    fn test_is_process_alive_nonexistent() {
        assert!(!is_process_alive(999_999));
        assert!(is_process_alive(std::process::id()));
    }
}
