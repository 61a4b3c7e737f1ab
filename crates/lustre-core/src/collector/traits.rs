//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait allows the collector to work with both the real Lustre
//! pseudo-filesystems on a node and mock implementations for testing in CI.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Abstraction for filesystem operations.
///
/// This trait allows collectors to read from the real filesystem or from
/// a mock implementation for testing purposes.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as raw bytes.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Reads the entire contents of a file as a string.
    ///
    /// Invalid UTF-8 sequences are dropped rather than reported, since
    /// kernel pseudo-files occasionally carry garbage in identifiers.
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read(path).map(sanitize_utf8)
    }

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// # Returns
    /// A vector of paths to entries in the directory, or an I/O error.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
///
/// Use this in production to read from the actual `/proc` and `/sys` trees.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

/// Converts raw file content to a string, dropping invalid UTF-8 bytes.
pub fn sanitize_utf8(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes())
            .chars()
            .filter(|&c| c != char::REPLACEMENT_CHARACTER)
            .collect(),
    }
}

/// Expands a glob pattern against the given filesystem.
///
/// Supports `*` (any run of characters) and `?` (one character) inside a
/// single path component. Matches are returned sorted. A pattern that points
/// into a missing directory simply matches nothing.
pub fn expand_glob<F: FileSystem + ?Sized>(fs: &F, pattern: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::new()];

    for component in pattern.components() {
        let part = match component {
            Component::Normal(part) => part.to_string_lossy(),
            other => {
                for candidate in &mut candidates {
                    candidate.push(other.as_os_str());
                }
                continue;
            }
        };

        if !has_wildcard(&part) {
            for candidate in &mut candidates {
                candidate.push(part.as_ref());
            }
            continue;
        }

        let mut next = Vec::new();
        for dir in &candidates {
            let Ok(mut entries) = fs.read_dir(dir) else {
                continue;
            };
            entries.sort();
            for entry in entries {
                let matched = entry
                    .file_name()
                    .map(|name| wildcard_match(&part, &name.to_string_lossy()))
                    .unwrap_or(false);
                if matched {
                    next.push(entry);
                }
            }
        }
        candidates = next;
        if candidates.is_empty() {
            return candidates;
        }
    }

    let mut matches: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|p| !p.as_os_str().is_empty() && fs.exists(p))
        .collect();
    matches.sort();
    matches.dedup();
    matches
}

fn has_wildcard(part: &str) -> bool {
    part.contains(['*', '?'])
}

/// Matches `name` against a shell-style pattern with `*` and `?`.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_real_fs_read_to_string() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("kbytestotal");
        fs::write(&file, "1024\n").unwrap();

        let content = RealFs::new().read_to_string(&file).unwrap();
        assert_eq!(content, "1024\n");
    }

    #[test]
    fn test_real_fs_exists() {
        let dir = tempfile::tempdir().unwrap();
        let rfs = RealFs::new();
        assert!(rfs.exists(dir.path()));
        assert!(!rfs.exists(Path::new("/nonexistent/path/12345")));
    }

    #[test]
    fn test_sanitize_utf8_drops_invalid_bytes() {
        let raw = b"job_id: a\xffb\n".to_vec();
        assert_eq!(sanitize_utf8(raw), "job_id: ab\n");
        assert_eq!(sanitize_utf8(b"plain".to_vec()), "plain");
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", "OST0000"));
        assert!(wildcard_match("filter-*", "filter-lustre-OST0001_UUID"));
        assert!(!wildcard_match("filter-*", "lustre-OST0001"));
        assert!(wildcard_match("OST000?", "OST0003"));
        assert!(!wildcard_match("OST000?", "OST00031"));
        assert!(wildcard_match("*_UUID", "x_UUID"));
    }

    #[test]
    fn test_expand_glob_real_fs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("obdfilter");
        for target in ["lustre-OST0001", "lustre-OST0000"] {
            fs::create_dir_all(base.join(target)).unwrap();
            fs::write(base.join(target).join("filesfree"), "10\n").unwrap();
        }
        fs::create_dir_all(base.join("lustre-OST0002")).unwrap();

        let matches = expand_glob(&RealFs::new(), &base.join("*").join("filesfree"));
        assert_eq!(
            matches,
            vec![
                base.join("lustre-OST0000/filesfree"),
                base.join("lustre-OST0001/filesfree"),
            ]
        );
    }

    #[test]
    fn test_expand_glob_missing_tree() {
        let dir = tempfile::tempdir().unwrap();
        let matches = expand_glob(&RealFs::new(), &dir.path().join("nope/*/stats"));
        assert!(matches.is_empty());
    }
}
