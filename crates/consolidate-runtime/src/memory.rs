/*
 * memory.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * MemoryRuntime: templates served from an in-memory file tree.
 *
 * Besides embedding template sets in an application, this runtime is the
 * instrument the render tests use: it counts every read and can be told
 * to refuse reads, which is how cache behaviour is observed.
 */

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::traits::{PathKind, RuntimeError, RuntimeResult, SystemRuntime};

/// Helper function to create a "not found" error.
fn not_found_error(path: &Path) -> RuntimeError {
    RuntimeError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("Path not found: {}", path.display()),
    ))
}

/// In-memory file tree.
///
/// Paths are normalized to absolute form; relative paths are taken relative
/// to the tree's root directory. Directories are implied by the files
/// added under them.
#[derive(Debug, Default)]
pub struct FileTree {
    /// File contents, keyed by normalized absolute path
    files: HashMap<PathBuf, Vec<u8>>,
    /// Directory entries (automatically includes parents of all files)
    directories: HashSet<PathBuf>,
    /// Base for relative paths
    root: PathBuf,
}

impl FileTree {
    /// Create an empty tree rooted at `/`.
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/"))
    }

    /// Create an empty tree that resolves relative paths against `root`.
    pub fn with_root(root: PathBuf) -> Self {
        let mut tree = Self {
            files: HashMap::new(),
            directories: HashSet::new(),
            root: PathBuf::new(),
        };
        let root = tree.normalize_components(&Path::new("/").join(root));
        tree.add_directory_and_parents(&root);
        tree.root = root;
        tree
    }

    /// Add (or replace) a file. Parent directories are created implicitly.
    pub fn add_file(&mut self, path: &Path, contents: Vec<u8>) {
        let normalized = self.normalize_path(path);
        if let Some(parent) = normalized.parent() {
            self.add_directory_and_parents(parent);
        }
        self.files.insert(normalized, contents);
    }

    /// Remove a file. Returns true if the file existed.
    pub fn remove_file(&mut self, path: &Path) -> bool {
        let normalized = self.normalize_path(path);
        self.files.remove(&normalized).is_some()
    }

    /// Check if a path is a file.
    pub fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&self.normalize_path(path))
    }

    /// Check if a path is a directory.
    pub fn is_directory(&self, path: &Path) -> bool {
        self.directories.contains(&self.normalize_path(path))
    }

    /// Read file contents.
    pub fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let normalized = self.normalize_path(path);
        self.files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| not_found_error(&normalized))
    }

    /// The directory relative paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalize a path to an absolute path.
    pub fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return self.normalize_components(path);
        }
        let absolute = self.root.join(path);
        self.normalize_components(&absolute)
    }

    /// Normalize path components (remove . and resolve ..)
    fn normalize_components(&self, path: &Path) -> PathBuf {
        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    // popping the root itself is a no-op
                    if normalized.parent().is_some() {
                        normalized.pop();
                    }
                }
                Component::CurDir => {}
                other => normalized.push(other),
            }
        }
        if normalized.as_os_str().is_empty() {
            normalized.push("/");
        }
        normalized
    }

    fn add_directory_and_parents(&mut self, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            self.directories.insert(current.clone());
        }
    }
}

/// Runtime serving files from a [`FileTree`].
///
/// Every successful or failed `file_read` increments [`read_count`]; existence checks
/// through `path_exists` do not. The paths themselves are only kept while
/// [`record_reads`] is on, so a long-lived runtime does not grow. With
/// [`deny_reads`] enabled every read fails with `PermissionDenied`,
/// simulating a store that must not be touched again.
///
/// [`read_count`]: MemoryRuntime::read_count
/// [`record_reads`]: MemoryRuntime::record_reads
/// [`deny_reads`]: MemoryRuntime::deny_reads
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    tree: RwLock<FileTree>,
    reads: AtomicUsize,
    read_log: RwLock<Vec<PathBuf>>,
    record_reads: AtomicBool,
    deny_reads: AtomicBool,
}

impl MemoryRuntime {
    /// Create a runtime with an empty tree rooted at `/`.
    pub fn new() -> Self {
        Self::with_tree(FileTree::new())
    }

    /// Create a runtime over a pre-populated tree.
    pub fn with_tree(tree: FileTree) -> Self {
        Self {
            tree: RwLock::new(tree),
            reads: AtomicUsize::new(0),
            read_log: RwLock::new(Vec::new()),
            record_reads: AtomicBool::new(false),
            deny_reads: AtomicBool::new(false),
        }
    }

    /// Create a runtime pre-populated with text files.
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: AsRef<Path>,
        C: Into<String>,
    {
        let rt = Self::new();
        for (path, contents) in files {
            rt.add_file(path.as_ref(), contents);
        }
        rt
    }

    /// Add (or replace) a text file.
    pub fn add_file(&self, path: &Path, contents: impl Into<String>) {
        self.tree
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_file(path, contents.into().into_bytes());
    }

    /// Remove a file. Returns true if it existed.
    pub fn remove_file(&self, path: &Path) -> bool {
        self.tree
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_file(path)
    }

    /// Number of `file_read` calls since creation or the last reset.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Paths passed to `file_read` while recording was on, in call order.
    pub fn reads(&self) -> Vec<PathBuf> {
        self.read_log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reset the read counter and log.
    pub fn reset_reads(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.read_log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Start (or stop) keeping the path of every read in [`reads`].
    ///
    /// Off by default; turning it off drops the paths kept so far.
    ///
    /// [`reads`]: MemoryRuntime::reads
    pub fn record_reads(&self, record: bool) {
        self.record_reads.store(record, Ordering::SeqCst);
        if !record {
            self.read_log
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    /// Make every subsequent read fail (or succeed again).
    pub fn deny_reads(&self, deny: bool) {
        self.deny_reads.store(deny, Ordering::SeqCst);
    }
}

#[async_trait]
impl SystemRuntime for MemoryRuntime {
    async fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.record_reads.load(Ordering::SeqCst) {
            self.read_log
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(path.to_path_buf());
        }

        if self.deny_reads.load(Ordering::SeqCst) {
            return Err(RuntimeError::PermissionDenied(format!(
                "reads are disabled: {}",
                path.display()
            )));
        }

        self.tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .read_file(path)
    }

    async fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        Ok(match kind {
            None => tree.is_file(path) || tree.is_directory(path),
            Some(PathKind::File) => tree.is_file(path),
            Some(PathKind::Directory) => tree.is_directory(path),
        })
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self
            .tree
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .root()
            .to_path_buf())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
