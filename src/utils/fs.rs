//! Filesystem path helpers.

use std::path::{Path, PathBuf};

/// Absolute form of `path` with its parent directory resolved.
///
/// The file name itself is kept as given, so a symlinked source keeps the
/// key it was scanned under. Falls back to joining with cwd when the
/// parent doesn't exist (e.g. it was just deleted), so removal events
/// still produce comparable keys.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map_or_else(|_| absolute.clone(), |parent| parent.join(name)),
        _ => absolute.canonicalize().unwrap_or(absolute),
    }
}

/// Check if path is a temp/backup file (editor artifacts).
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_files() {
        for name in ["a.md.swp", "a.md~", ".DS_Store", "4913.tmp", "post.bak"] {
            assert!(is_temp_file(Path::new(name)), "{name}");
        }
        for name in ["post.md", "style.css", "index.html"] {
            assert!(!is_temp_file(Path::new(name)), "{name}");
        }
    }

    #[test]
    fn test_normalize_missing_absolute_path() {
        let path = Path::new("/no/such/dir/file.md");
        assert_eq!(normalize_path(path), path);
    }

    #[test]
    fn test_normalize_existing_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir(&nested).unwrap();

        let normalized = normalize_path(&nested.join("..").join("a"));
        assert_eq!(normalized, nested.canonicalize().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_keeps_symlinked_file_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let target = root.join("target.md");
        let link = root.join("link.md");
        std::fs::write(&target, "x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(normalize_path(&link), link);
        assert_eq!(normalize_path(&dir.path().join("link.md")), link);
    }
}
