//! Блокировка каталога лог-тома (advisory, через fs2).
//!
//! - `VolumeLock::writer` - эксклюзивно, на время `LogVolume::flush`;
//! - `VolumeLock::reader` - разделяемо, на время `LogVolume::open` / dump-log.
//!
//! Файл блокировки: `<log dir>/LOCK`. Снимается при Drop.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use log::debug;

use crate::consts::LOG_LOCK_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct VolumeLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl VolumeLock {
    /// Ждать эксклюзивной блокировки (писатель тома).
    pub fn writer(dir: &Path) -> Result<Self> {
        Self::acquire(dir, LockMode::Exclusive, true)
    }

    /// Ждать разделяемой блокировки (читатель тома).
    pub fn reader(dir: &Path) -> Result<Self> {
        Self::acquire(dir, LockMode::Shared, true)
    }

    /// Эксклюзивно без ожидания; Err, если том кто-то держит.
    pub fn try_writer(dir: &Path) -> Result<Self> {
        Self::acquire(dir, LockMode::Exclusive, false)
    }

    fn acquire(dir: &Path, mode: LockMode, wait: bool) -> Result<Self> {
        let path = dir.join(LOG_LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open volume lock {}", path.display()))?;
        // явно через fs2: у std::fs::File есть одноимённые методы
        let res = match (mode, wait) {
            (LockMode::Shared, true) => FileExt::lock_shared(&file),
            (LockMode::Shared, false) => FileExt::try_lock_shared(&file),
            (LockMode::Exclusive, true) => FileExt::lock_exclusive(&file),
            (LockMode::Exclusive, false) => FileExt::try_lock_exclusive(&file),
        };
        res.with_context(|| format!("{:?} lock on log volume {}", mode, dir.display()))?;
        debug!("{:?} lock taken on {}", mode, path.display());
        Ok(Self { file, path, mode })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for VolumeLock {
    fn drop(&mut self) {
        // ошибки unlock при drop игнорируются
        let _ = FileExt::unlock(&self.file);
    }
}
