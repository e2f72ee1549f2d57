//! Process-group helpers for reliable child process cleanup.
//!
//! Commands are spawned as leaders of their own process group, so a timeout
//! can signal the shell together with everything it forked. On non-Unix
//! platforms these helpers are no-ops; `kill_on_drop` on the child handle is
//! the only cleanup there.

use std::io;

/// SIGKILL a process group (best-effort). A group that no longer exists is
/// not an error.
#[cfg(unix)]
pub fn kill_process_group(process_group_id: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(process_group_id)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "process group id out of range"))?;
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }

    Ok(())
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn kill_process_group(_process_group_id: u32) -> io::Result<()> {
    Ok(())
}
