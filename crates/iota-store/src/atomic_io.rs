use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

/// Replaces a state table on disk without a window where a concurrent reader
/// sees partial JSON: the payload is written and synced to a sibling temp
/// file, then renamed over the destination.
pub fn write_state_table(path: &Path, payload: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("state table path cannot be empty");
    }
    if path.is_dir() {
        bail!("state table path '{}' is a directory", path.display());
    }

    let table_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(table_dir)
        .with_context(|| format!("failed to create state directory {}", table_dir.display()))?;

    let temp_path = table_dir.join(format!(
        ".{}.swap-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("table"),
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or(0)
    ));
    let written = File::create(&temp_path)
        .and_then(|mut swap| {
            swap.write_all(payload.as_bytes())?;
            swap.sync_all()
        })
        .with_context(|| format!("failed to stage state table at {}", temp_path.display()));
    if let Err(error) = written {
        // Best effort; a stale swap file is harmless but ugly.
        let _ = std::fs::remove_file(&temp_path);
        return Err(error);
    }
    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to swap state table {} into {}",
            temp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::write_state_table;
    use tempfile::tempdir;

    #[test]
    fn unit_write_state_table_creates_missing_parent_directories() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("table.json");
        write_state_table(&path, "{}\n").expect("write");
        let raw = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(raw, "{}\n");
    }

    #[test]
    fn unit_write_state_table_rejects_directory_destination() {
        let temp = tempdir().expect("tempdir");
        let error = write_state_table(temp.path(), "x").expect_err("directory should fail");
        assert!(error.to_string().contains("is a directory"));
    }

    #[test]
    fn unit_write_state_table_leaves_no_swap_file_behind() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("table.json");
        write_state_table(&path, "first\n").expect("write");
        write_state_table(&path, "second\n").expect("rewrite");
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path() != path)
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read back"),
            "second\n"
        );
    }
}
