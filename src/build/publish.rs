//! Writing the output root.
//!
//! With `clean`, files go to a sibling staging directory that replaces the
//! output root only once every file is written. Otherwise files are written
//! over the existing output in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::BuildError;
use super::emit::{OutputSet, output_path};

/// Write `set` under `output`. Returns the number of files written.
pub fn publish(set: &OutputSet, output: &Path, clean: bool) -> Result<usize, BuildError> {
    if !clean {
        write_all(set, output)?;
        return Ok(set.len());
    }

    let staging = sibling(output, "staging");
    remove_dir_if_exists(&staging)
        .and_then(|()| fs::create_dir_all(&staging))
        .map_err(|e| BuildError::Write(staging.clone(), e))?;
    if let Err(e) = write_all(set, &staging) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    let retired = sibling(output, "old");
    remove_dir_if_exists(&retired).map_err(|e| BuildError::Write(retired.clone(), e))?;
    if output.exists() {
        fs::rename(output, &retired).map_err(|e| BuildError::Write(output.to_path_buf(), e))?;
    }
    fs::rename(&staging, output).map_err(|e| BuildError::Write(output.to_path_buf(), e))?;
    let _ = fs::remove_dir_all(&retired);
    Ok(set.len())
}

fn write_all(set: &OutputSet, root: &Path) -> Result<(), BuildError> {
    for (rel, bytes) in set.iter() {
        let path = output_path(root, rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::Write(parent.to_path_buf(), e))?;
        }
        fs::write(&path, bytes).map_err(|e| BuildError::Write(path.clone(), e))?;
    }
    Ok(())
}

/// `dist` -> `.dist.<suffix>` next to it.
fn sibling(output: &Path, suffix: &str) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    output.with_file_name(format!(".{name}.{suffix}"))
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set() -> OutputSet {
        let mut set = OutputSet::default();
        set.insert("index.html", b"<html></html>".to_vec());
        set.insert("static/js/main.js", b"console.log(1);".to_vec());
        set
    }

    #[test]
    fn test_clean_publish_replaces_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dist");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("stale.js"), "old").unwrap();

        assert_eq!(publish(&set(), &output, true).unwrap(), 2);
        assert!(!output.join("stale.js").exists());
        assert_eq!(fs::read_to_string(output.join("static/js/main.js")).unwrap(), "console.log(1);");
        assert!(!dir.path().join(".dist.staging").exists());
        assert!(!dir.path().join(".dist.old").exists());
    }

    #[test]
    fn test_publish_in_place_keeps_other_files() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dist");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("keep.txt"), "keep").unwrap();

        publish(&set(), &output, false).unwrap();
        assert!(output.join("keep.txt").exists());
        assert!(output.join("index.html").exists());
    }

    #[test]
    fn test_clean_publish_into_missing_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("nested/dist");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        publish(&set(), &output, true).unwrap();
        assert!(output.join("index.html").exists());
    }

    #[test]
    fn test_sibling_names() {
        assert_eq!(sibling(Path::new("/p/dist"), "staging"), PathBuf::from("/p/.dist.staging"));
    }
}
