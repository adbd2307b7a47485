// Single-instance guard: exclusive advisory flock on a lock file. The lock
// is held for the process lifetime; drop releases it and removes the file.

use std::fs::File;
use std::path::PathBuf;

use nix::fcntl::{Flock, FlockArg};

/// Default lock file, created in the working directory.
pub const LOCK_FILE: &str = "server_exporter.lock";

#[derive(Debug)]
pub struct SingletonLock {
    lock: Option<Flock<File>>,
    path: PathBuf,
}

impl SingletonLock {
    /// Takes the exclusive lock without blocking; an error means another
    /// instance already holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .map_err(|e| anyhow::anyhow!("creating lock file {}: {}", path.display(), e))?;
        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            anyhow::anyhow!("server-exporter is already running ({})", errno)
        })?;
        Ok(Self {
            lock: Some(lock),
            path,
        })
    }
}

impl Drop for SingletonLock {
    fn drop(&mut self) {
        drop(self.lock.take());
        let _ = std::fs::remove_file(&self.path);
    }
}
