//! Inode ↔ virtual path table.
//!
//! FUSE addresses everything but the root by inode number, while the
//! adapter speaks in virtual paths. The table hands out a stable inode per
//! path, counts kernel lookups, and drops an entry once the kernel forgets it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants::FUSE_ROOT_ID;

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    lookups: u64,
}

/// Inode allocation and path bookkeeping for one mount.
#[derive(Debug)]
pub struct InodeTable {
    by_ino: HashMap<u64, Entry>,
    by_path: HashMap<PathBuf, u64>,
    next_ino: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Create a table holding only the root (`/`, inode 1).
    pub fn new() -> Self {
        let root = PathBuf::from("/");
        let mut by_ino = HashMap::new();
        by_ino.insert(
            FUSE_ROOT_ID,
            Entry {
                path: root.clone(),
                lookups: 1,
            },
        );
        let mut by_path = HashMap::new();
        by_path.insert(root, FUSE_ROOT_ID);

        Self {
            by_ino,
            by_path,
            next_ino: FUSE_ROOT_ID + 1,
        }
    }

    /// Virtual path of an inode, if the kernel still knows it.
    pub fn path(&self, ino: u64) -> Option<&Path> {
        self.by_ino.get(&ino).map(|e| e.path.as_path())
    }

    /// Inode of a path, without counting a lookup.
    pub fn peek(&self, path: &Path) -> Option<u64> {
        self.by_path.get(path).copied()
    }

    /// Record a kernel lookup of `path`, allocating an inode on first sight.
    pub fn lookup(&mut self, path: &Path) -> u64 {
        if let Some(&ino) = self.by_path.get(path) {
            if let Some(entry) = self.by_ino.get_mut(&ino) {
                entry.lookups += 1;
            }
            return ino;
        }

        let ino = self.next_ino;
        self.next_ino += 1;
        self.by_ino.insert(
            ino,
            Entry {
                path: path.to_path_buf(),
                lookups: 1,
            },
        );
        self.by_path.insert(path.to_path_buf(), ino);
        ino
    }

    /// Drop `nlookup` references; the entry goes away when none remain.
    pub fn forget(&mut self, ino: u64, nlookup: u64) {
        if ino == FUSE_ROOT_ID {
            return;
        }
        let Some(entry) = self.by_ino.get_mut(&ino) else {
            return;
        };

        entry.lookups = entry.lookups.saturating_sub(nlookup);
        if entry.lookups == 0 {
            let path = entry.path.clone();
            self.by_ino.remove(&ino);
            if self.by_path.get(&path) == Some(&ino) {
                self.by_path.remove(&path);
            }
        }
    }

    /// Detach `path` after unlink/rmdir so a new entry there gets a fresh inode.
    ///
    /// The old inode stays addressable until the kernel forgets it.
    pub fn remove(&mut self, path: &Path) {
        self.by_path.remove(path);
    }

    /// Re-point `old` and everything beneath it at `new`.
    pub fn rename(&mut self, old: &Path, new: &Path) {
        // Whatever `new` named before was replaced on the host.
        let replaced: Vec<PathBuf> = self
            .by_path
            .keys()
            .filter(|p| p.starts_with(new) && !p.starts_with(old))
            .cloned()
            .collect();
        for path in replaced {
            self.by_path.remove(&path);
        }

        let moved: Vec<(PathBuf, u64)> = self
            .by_path
            .iter()
            .filter(|(p, _)| p.starts_with(old))
            .map(|(p, &ino)| (p.clone(), ino))
            .collect();

        for (path, ino) in moved {
            let Ok(suffix) = path.strip_prefix(old) else {
                continue;
            };
            let renamed = if suffix.as_os_str().is_empty() {
                new.to_path_buf()
            } else {
                new.join(suffix)
            };

            self.by_path.remove(&path);
            self.by_path.insert(renamed.clone(), ino);
            if let Some(entry) = self.by_ino.get_mut(&ino) {
                entry.path = renamed;
            }
        }
    }

    /// Number of live inodes, root included.
    pub fn len(&self) -> usize {
        self.by_ino.len()
    }

    /// Returns true if only the root is known.
    pub fn is_empty(&self) -> bool {
        self.by_ino.len() <= 1
    }
}
