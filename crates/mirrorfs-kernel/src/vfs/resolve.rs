//! Virtual path → host path translation.

use std::path::{Component, Path, PathBuf};

/// The real directory tree being mirrored.
///
/// Established once at startup and never mutated. Paths resolve under the
/// configured spelling; the canonical spelling (symlinks resolved, e.g.
/// macOS `/tmp` → `/private/tmp`) is kept alongside so absolute link
/// targets written either way are recognized as inside the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    path: PathBuf,
    canonical: PathBuf,
}

impl Root {
    /// Create a root from a host directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let canonical = dunce::canonicalize(&path).unwrap_or_else(|_| path.clone());
        Self { path, canonical }
    }

    /// The host path of the root, as configured.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The root with all symlinks resolved; equal to [`Root::path`] when the
    /// directory did not exist at construction.
    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    /// Map a virtual path to the host path under the root.
    ///
    /// A single leading separator is stripped; anything else is joined
    /// verbatim. No existence check and no `..` interpretation: the host
    /// primitive consuming the result decides.
    pub fn resolve(&self, virtual_path: &Path) -> PathBuf {
        let relative = virtual_path.strip_prefix("/").unwrap_or(virtual_path);
        self.path.join(relative)
    }

    /// Rewrite an absolute host path relative to the root.
    ///
    /// Purely lexical. A target under either spelling of the root is made
    /// relative to that spelling. Other targets climb out of the configured
    /// root with `..` components; the root itself becomes `.`.
    pub fn relativize(&self, target: &Path) -> PathBuf {
        let target = lexical_normalize(target);
        let configured = lexical_normalize(&self.path);
        let canonical = lexical_normalize(&self.canonical);

        let base = if !target.starts_with(&configured) && target.starts_with(&canonical) {
            canonical
        } else {
            configured
        };

        let target_parts: Vec<Component> = target.components().collect();
        let base_parts: Vec<Component> = base.components().collect();

        let common = target_parts
            .iter()
            .zip(base_parts.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut relative = PathBuf::new();
        for _ in common..base_parts.len() {
            relative.push("..");
        }
        for part in &target_parts[common..] {
            relative.push(part.as_os_str());
        }

        if relative.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            relative
        }
    }
}

/// Remove `.` and resolve `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) => {}
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }

    components.iter().collect()
}
