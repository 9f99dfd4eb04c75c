use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("bot is already running with PID {0}")]
    AlreadyRunning(u32),
    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Single-instance guard: a file holding the PID of the running bot.
/// Removed again when dropped.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
}

impl InstanceLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let io_error = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        match fs::read_to_string(&path) {
            Ok(contents) => match contents.trim().parse::<u32>() {
                Ok(old_pid) if process_alive(old_pid) => {
                    log::warn!("Bot already running with PID {}", old_pid);
                    return Err(LockError::AlreadyRunning(old_pid));
                }
                Ok(old_pid) => {
                    log::info!("Previous process {} is gone, removing stale lock", old_pid);
                }
                Err(e) => {
                    log::error!("Unreadable lock file {}: {}", path.display(), e);
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(e)),
        }

        let pid = std::process::id();
        fs::write(&path, pid.to_string()).map_err(io_error)?;
        log::info!("Lock acquired with PID {}", pid);

        Ok(InstanceLock { path, pid })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::info!("Lock released for PID {}", self.pid),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::error!("Error releasing lock {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 only checks that the process exists.
    let ret = unsafe { libc::kill(pid, 0) };
    ret == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(pid: u32) -> bool {
    pid == std::process::id()
}
