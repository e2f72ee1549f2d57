use anyhow::{Context, Result};

/// Make the gateway process harder to inspect: no ptrace attach or core
/// dumps that could leak the bearer token. Call before anything else runs.
pub fn apply_process_hardening() -> Result<()> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        harden_linux().context("failed to apply Linux process hardening")?;
    }

    #[cfg(target_os = "macos")]
    {
        disable_core_dumps().context("failed to apply macOS process hardening")?;
    }

    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn harden_linux() -> Result<()> {
    // SAFETY: PR_SET_DUMPABLE takes plain integer arguments.
    let ret_code = unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) };
    if ret_code != 0 {
        return Err(std::io::Error::last_os_error()).context("prctl(PR_SET_DUMPABLE, 0) failed");
    }
    disable_core_dumps()
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
fn disable_core_dumps() -> Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };

    // SAFETY: `rlim` is a valid, initialized rlimit for the duration of the call.
    let ret_code = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &rlim) };
    if ret_code != 0 {
        return Err(std::io::Error::last_os_error()).context("setrlimit(RLIMIT_CORE) failed");
    }
    Ok(())
}
