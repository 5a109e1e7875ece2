//! Path utilities.
//!
//! Pure functions for path manipulation. No side effects besides
//! `canonicalize` lookups in [`normalize_path`].

use std::path::{Component, Path, PathBuf};

/// Normalize a path to absolute form.
///
/// Canonicalizes when the path exists, otherwise joins it onto the
/// current directory.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Lexically resolve `.` and `..` components without touching the file system.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path relative to `root` with forward slashes, for logs and manifests.
///
/// Falls back to the full path when `path` is outside `root`.
pub fn rel_slash(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    to_slash(rel)
}

/// Render a path with `/` separators on every platform.
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        assert_eq!(
            clean_path(Path::new("/src/pages/../lib/./util.js")),
            PathBuf::from("/src/lib/util.js")
        );
        assert_eq!(clean_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_rel_slash() {
        assert_eq!(
            rel_slash(Path::new("/site/src/styles/a.scss"), Path::new("/site")),
            "src/styles/a.scss"
        );
        assert_eq!(rel_slash(Path::new("/other/x.js"), Path::new("/site")), "/other/x.js");
    }

    #[test]
    fn test_normalize_relative_is_absolute() {
        let p = normalize_path(Path::new("definitely/not/here.txt"));
        assert!(p.is_absolute());
    }
}
