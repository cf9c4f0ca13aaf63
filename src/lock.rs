use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{LedgerError, Result};

/// Exclusive advisory lock on one linked account. Released on drop.
#[derive(Debug)]
pub struct AccountLock {
    file: File,
    path: PathBuf,
}

impl Drop for AccountLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "released account lock");
    }
}

pub fn account_lock_path(lock_dir: &Path, account_id: i64) -> PathBuf {
    lock_dir.join(format!("account-{account_id}.lock"))
}

/// Take the lock without waiting. Another run holding it yields `AccountLocked`.
pub fn acquire_account_lock(lock_dir: &Path, account_id: i64) -> Result<AccountLock> {
    std::fs::create_dir_all(lock_dir)?;
    let path = account_lock_path(lock_dir, account_id);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)?;
    if let Err(e) = file.try_lock_exclusive() {
        if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
            return Err(LedgerError::AccountLocked(account_id));
        }
        return Err(e.into());
    }
    debug!(path = %path.display(), "acquired account lock");
    Ok(AccountLock { file, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lock_on_same_account_fails() {
        let dir = tempfile::tempdir().unwrap();
        let held = acquire_account_lock(dir.path(), 1).unwrap();
        let err = acquire_account_lock(dir.path(), 1).unwrap_err();
        assert!(matches!(err, LedgerError::AccountLocked(1)));
        drop(held);
        acquire_account_lock(dir.path(), 1).unwrap();
    }

    #[test]
    fn test_accounts_lock_independently() {
        let dir = tempfile::tempdir().unwrap();
        let _a = acquire_account_lock(dir.path(), 1).unwrap();
        let _b = acquire_account_lock(dir.path(), 2).unwrap();
        assert!(account_lock_path(dir.path(), 2).exists());
    }

    #[test]
    fn test_unusable_lock_file_is_not_reported_as_locked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(account_lock_path(dir.path(), 3)).unwrap();
        let err = acquire_account_lock(dir.path(), 3).unwrap_err();
        assert!(matches!(err, LedgerError::Io(_)));
    }
}
