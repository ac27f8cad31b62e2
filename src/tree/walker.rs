//! Depth-first directory walker driven by an explicit stack
//!
//! Entries of each directory are visited in name order; a subdirectory is
//! descended into at the point it is met, so files listed before it are
//! yielded first. Symlinks are never followed.

use crate::tree::paths::relative_key;
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};

/// A regular file found under the walk root
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub path: PathBuf,
    /// Root-relative `/`-separated key
    pub key: String,
}

pub struct TreeWalker {
    root: PathBuf,
    stack: Vec<std::vec::IntoIter<DirEntry>>,
    started: bool,
    skipped_symlinks: u64,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stack: Vec::new(),
            started: false,
            skipped_symlinks: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn skipped_symlinks(&self) -> u64 {
        self.skipped_symlinks
    }

    fn read_sorted(dir: &Path) -> io::Result<std::vec::IntoIter<DirEntry>> {
        let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());
        Ok(entries.into_iter())
    }
}

impl Iterator for TreeWalker {
    type Item = io::Result<TreeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            match Self::read_sorted(&self.root) {
                Ok(entries) => self.stack.push(entries),
                Err(e) => return Some(Err(e)),
            }
        }

        loop {
            let entry = match self.stack.last_mut()?.next() {
                Some(entry) => entry,
                None => {
                    self.stack.pop();
                    continue;
                }
            };

            // DirEntry::file_type does not traverse symlinks
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => return Some(Err(e)),
            };

            if file_type.is_symlink() {
                self.skipped_symlinks += 1;
                tracing::trace!(path = %entry.path().display(), "skipping symlink");
                continue;
            }

            if file_type.is_dir() {
                match Self::read_sorted(&entry.path()) {
                    Ok(entries) => self.stack.push(entries),
                    Err(e) => return Some(Err(e)),
                }
                continue;
            }

            if file_type.is_file() {
                let path = entry.path();
                let Some(key) = relative_key(&self.root, &path) else {
                    return Some(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("file name is not valid UTF-8: {}", path.display()),
                    )));
                };
                return Some(Ok(TreeEntry { path, key }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keys(root: &Path) -> Vec<String> {
        TreeWalker::new(root)
            .map(|entry| entry.unwrap().key)
            .collect()
    }

    #[test]
    fn test_walk_order() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("b_dir/nested")).unwrap();
        fs::write(root.join("a.sav"), b"a").unwrap();
        fs::write(root.join("b_dir/inner.sav"), b"b").unwrap();
        fs::write(root.join("b_dir/nested/deep.sav"), b"c").unwrap();
        fs::write(root.join("c.sav"), b"d").unwrap();

        assert_eq!(
            keys(root),
            vec![
                "/a.sav".to_string(),
                "/b_dir/inner.sav".to_string(),
                "/b_dir/nested/deep.sav".to_string(),
                "/c.sav".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_root() {
        let temp = TempDir::new().unwrap();
        assert!(keys(temp.path()).is_empty());
    }

    #[test]
    fn test_missing_root_yields_error() {
        let temp = TempDir::new().unwrap();
        let mut walker = TreeWalker::new(temp.path().join("absent"));
        assert!(matches!(walker.next(), Some(Err(_))));
        assert!(walker.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("real.sav"), b"data").unwrap();
        std::os::unix::fs::symlink(root.join("real.sav"), root.join("link.sav")).unwrap();
        std::os::unix::fs::symlink(temp.path(), root.join("loop")).unwrap();

        let mut walker = TreeWalker::new(&root);
        let found: Vec<String> = walker.by_ref().map(|e| e.unwrap().key).collect();

        assert_eq!(found, vec!["/real.sav".to_string()]);
        assert_eq!(walker.skipped_symlinks(), 2);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_name_is_an_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("good.sav"), b"a").unwrap();
        fs::write(temp.path().join(OsStr::from_bytes(b"bad\xfe.sav")), b"b").unwrap();

        let results: Vec<_> = TreeWalker::new(temp.path()).collect();
        let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

        assert_eq!(results.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), io::ErrorKind::InvalidData);
    }
}
