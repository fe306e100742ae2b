//! Advisory lock file serializing operations on one installation root.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StepError;

/// Held for the duration of an install or update; the file is removed on drop.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    /// Claim `path` exclusively. A lock left behind by a dead process is
    /// reclaimed once; a live holder yields [`StepError::Locked`].
    pub fn acquire(path: &Path) -> Result<Self, StepError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                StepError::io(format!("Failed to create {}", parent.display()), err)
            })?;
        }

        let mut reclaimed = false;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
            {
                Ok(mut file) => {
                    file.write_all(format!("{}\n", std::process::id()).as_bytes())
                        .map_err(|err| {
                            StepError::io(format!("Failed to write lock {}", path.display()), err)
                        })?;
                    debug!(lock = %path.display(), "acquired install lock");
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    let holder = read_holder(path);
                    let stale = holder.is_some_and(|pid| !is_process_alive(pid));
                    if stale && !reclaimed {
                        warn!(lock = %path.display(), pid = ?holder, "reclaiming stale install lock");
                        let _ = fs::remove_file(path);
                        reclaimed = true;
                        continue;
                    }
                    return Err(StepError::Locked {
                        path: path.to_path_buf(),
                        holder,
                    });
                }
                Err(err) => {
                    return Err(StepError::io(
                        format!("Failed to claim lock {}", path.display()),
                        err,
                    ));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %err, "failed to release install lock");
        }
    }
}

fn read_holder(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Conservative liveness check; unknown platforms report alive.
fn is_process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{}", pid)).exists()
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ps")
            .args(["-p", &pid.to_string()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(true)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = pid;
        true
    }
}
