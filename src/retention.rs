//! Retention sweep – removes stale artifacts from the work directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;

/// Delete every regular file in `dir` last modified `days` or more days
/// ago. `days == 0` is treated as "not configured" and deletes nothing.
///
/// Returns the removed paths.
pub fn sweep(dir: &Path, days: u32) -> Result<Vec<PathBuf>> {
    if days == 0 {
        log::warn!("Retention sweep skipped: no number of days configured");
        return Ok(Vec::new());
    }
    sweep_before(dir, Utc::now() - Duration::days(i64::from(days)))
}

/// Delete every regular file in `dir` modified at or before `cutoff`.
pub fn sweep_before(dir: &Path, cutoff: DateTime<Utc>) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified: DateTime<Utc> = meta.modified()?.into();
        if modified > cutoff {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            // a concurrent sweep or delivery may have won the race
            Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
        }
    }

    log::info!("Retention sweep removed {} file(s) from {}", removed.len(), dir.display());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration as StdDuration, SystemTime};

    fn touch(path: &Path, age_days: u64) {
        fs::write(path, b"x").unwrap();
        let mtime = SystemTime::now() - StdDuration::from_secs(age_days * 86_400);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn removes_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.pdf");
        let fresh = dir.path().join("fresh.pdf");
        touch(&old, 10);
        touch(&fresh, 1);
        fs::create_dir(dir.path().join("sub")).unwrap();

        let removed = sweep(dir.path(), 7).unwrap();
        assert_eq!(removed, vec![old.clone()]);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(dir.path().join("sub").exists());
    }

    #[test]
    fn zero_days_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("ancient.html");
        touch(&f, 400);
        assert!(sweep(dir.path(), 0).unwrap().is_empty());
        assert!(f.exists());
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(sweep(Path::new("/nonexistent/htmltopdf-work"), 3).is_err());
    }
}
