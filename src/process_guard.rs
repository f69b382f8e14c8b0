//! Process lifecycle management for child processes
//!
//! Unprivileged children (cargo, git, curl, the rustup pipeline) get a
//! parent-death signal so killing the installer does not leave an orphaned
//! build or download running. The kernel clears the signal when a setuid
//! binary is exec'd, so commands wrapped in `sudo` are not covered; when
//! the installer already runs as root they are. The installer itself does
//! no signal handling.

use std::os::unix::process::CommandExt;
use std::process::Command;

/// Extension trait for commands that must not outlive the installer
pub trait CommandLifecycle {
    /// Deliver SIGTERM to the child when the installer exits.
    /// Lost across a setuid exec such as `sudo`.
    fn die_with_parent(&mut self) -> &mut Self;
}

impl CommandLifecycle for Command {
    fn die_with_parent(&mut self) -> &mut Self {
        // SAFETY: the pre_exec closure only calls prctl(2), which is
        // async-signal-safe, and does not allocate.
        unsafe {
            self.pre_exec(|| {
                #[cfg(target_os = "linux")]
                if nix::libc::prctl(nix::libc::PR_SET_PDEATHSIG, nix::libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
