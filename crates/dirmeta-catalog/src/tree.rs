//! Directory tree collaborator.
//!
//! The catalog never owns the namespace. It resolves paths, ancestor
//! chains and subtrees through `DirectoryTree`. `MemoryDirectoryTree` is a
//! self-contained implementation used by tests and embedded callers.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::error::{CatalogError, CatalogResult};
use crate::types::{DirId, FileEntry, FileId};

/// Namespace operations the catalog depends on.
pub trait DirectoryTree: Send + Sync {
    /// Resolves a path to its directory ID.
    fn find_directory(&self, path: &str) -> CatalogResult<DirId>;

    /// Returns the directory IDs from the root down to the directory itself.
    fn ancestor_chain(&self, path: &str) -> CatalogResult<Vec<DirId>>;

    /// Same as `ancestor_chain`, starting from a directory ID.
    fn ancestor_chain_of(&self, dir: DirId) -> CatalogResult<Vec<DirId>>;

    /// Returns every directory below `dir`, plus `dir` itself if requested.
    fn subtree_ids(&self, dir: DirId, include_self: bool) -> CatalogResult<BTreeSet<DirId>>;

    /// Returns every strict descendant of any of the given directories.
    fn subtree_ids_bulk(&self, dirs: &BTreeSet<DirId>) -> CatalogResult<BTreeSet<DirId>> {
        let mut out = BTreeSet::new();
        for dir in dirs {
            out.extend(self.subtree_ids(*dir, false)?);
        }
        Ok(out)
    }

    /// Returns every directory of the tree.
    fn all_directories(&self) -> CatalogResult<BTreeSet<DirId>>;

    /// Reconstructs the paths of the given directories.
    fn paths(&self, dirs: &BTreeSet<DirId>) -> CatalogResult<BTreeMap<DirId, String>>;

    /// Lists the files stored directly in the given directories.
    fn list_files(&self, dirs: &BTreeSet<DirId>) -> CatalogResult<Vec<FileEntry>>;
}

/// Normalizes a path into its components. Handles "/", "//" and trailing slashes.
pub fn parse_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".").collect()
}

/// Joins a directory path and a file name.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Returns true if `path` names the root directory.
pub fn is_root_path(path: &str) -> bool {
    parse_path(path).is_empty()
}

#[derive(Clone, Debug)]
struct DirNode {
    parent: Option<DirId>,
    name: String,
    children: BTreeMap<String, DirId>,
    files: Vec<(FileId, String)>,
}

#[derive(Debug)]
struct TreeState {
    nodes: BTreeMap<DirId, DirNode>,
    next_dir: u64,
    next_file: u64,
}

impl TreeState {
    fn node(&self, dir: DirId) -> CatalogResult<&DirNode> {
        self.nodes
            .get(&dir)
            .ok_or(CatalogError::DirectoryIdNotFound(dir))
    }

    fn resolve(&self, path: &str) -> Option<DirId> {
        let mut current = DirId::ROOT;
        for component in parse_path(path) {
            current = *self.nodes.get(&current)?.children.get(component)?;
        }
        Some(current)
    }

    fn chain(&self, dir: DirId) -> CatalogResult<Vec<DirId>> {
        let mut chain = vec![dir];
        let mut current = self.node(dir)?;
        while let Some(parent) = current.parent {
            chain.push(parent);
            current = self.node(parent)?;
        }
        chain.reverse();
        Ok(chain)
    }

    fn path_of(&self, dir: DirId) -> CatalogResult<String> {
        let chain = self.chain(dir)?;
        if chain.len() == 1 {
            return Ok("/".to_string());
        }
        let mut path = String::new();
        for id in &chain[1..] {
            path.push('/');
            path.push_str(&self.node(*id)?.name);
        }
        Ok(path)
    }
}

/// In-memory directory tree rooted at `DirId::ROOT`.
pub struct MemoryDirectoryTree {
    state: RwLock<TreeState>,
}

impl MemoryDirectoryTree {
    /// Creates a tree containing only the root directory.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            DirId::ROOT,
            DirNode {
                parent: None,
                name: String::new(),
                children: BTreeMap::new(),
                files: Vec::new(),
            },
        );
        Self {
            state: RwLock::new(TreeState {
                nodes,
                next_dir: DirId::ROOT.as_u64() + 1,
                next_file: 1,
            }),
        }
    }

    /// Creates the directory and any missing parents, returning its ID.
    pub fn make_dirs(&self, path: &str) -> DirId {
        let mut state = self.state.write();
        let mut current = DirId::ROOT;
        for component in parse_path(path) {
            let existing = state
                .nodes
                .get(&current)
                .and_then(|node| node.children.get(component).copied());
            current = match existing {
                Some(child) => child,
                None => {
                    let child = DirId::new(state.next_dir);
                    state.next_dir += 1;
                    state.nodes.insert(
                        child,
                        DirNode {
                            parent: Some(current),
                            name: component.to_string(),
                            children: BTreeMap::new(),
                            files: Vec::new(),
                        },
                    );
                    if let Some(parent) = state.nodes.get_mut(&current) {
                        parent.children.insert(component.to_string(), child);
                    }
                    child
                }
            };
        }
        current
    }

    /// Adds a file to an existing directory.
    pub fn add_file(&self, dir_path: &str, name: &str) -> CatalogResult<FileId> {
        let mut state = self.state.write();
        let dir = state
            .resolve(dir_path)
            .ok_or_else(|| CatalogError::DirectoryNotFound(dir_path.to_string()))?;
        let file = FileId::new(state.next_file);
        state.next_file += 1;
        if let Some(node) = state.nodes.get_mut(&dir) {
            node.files.push((file, name.to_string()));
        }
        Ok(file)
    }

    /// Number of directories, root included.
    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Always false: the root directory always exists.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for MemoryDirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree for MemoryDirectoryTree {
    fn find_directory(&self, path: &str) -> CatalogResult<DirId> {
        self.state
            .read()
            .resolve(path)
            .ok_or_else(|| CatalogError::DirectoryNotFound(path.to_string()))
    }

    fn ancestor_chain(&self, path: &str) -> CatalogResult<Vec<DirId>> {
        let state = self.state.read();
        let dir = state
            .resolve(path)
            .ok_or_else(|| CatalogError::DirectoryNotFound(path.to_string()))?;
        state.chain(dir)
    }

    fn ancestor_chain_of(&self, dir: DirId) -> CatalogResult<Vec<DirId>> {
        self.state.read().chain(dir)
    }

    fn subtree_ids(&self, dir: DirId, include_self: bool) -> CatalogResult<BTreeSet<DirId>> {
        let state = self.state.read();
        let mut out = BTreeSet::new();
        let mut pending: Vec<DirId> = state.node(dir)?.children.values().copied().collect();
        while let Some(next) = pending.pop() {
            if out.insert(next) {
                pending.extend(state.node(next)?.children.values().copied());
            }
        }
        if include_self {
            out.insert(dir);
        }
        Ok(out)
    }

    fn all_directories(&self) -> CatalogResult<BTreeSet<DirId>> {
        Ok(self.state.read().nodes.keys().copied().collect())
    }

    fn paths(&self, dirs: &BTreeSet<DirId>) -> CatalogResult<BTreeMap<DirId, String>> {
        let state = self.state.read();
        dirs.iter()
            .map(|dir| Ok((*dir, state.path_of(*dir)?)))
            .collect()
    }

    fn list_files(&self, dirs: &BTreeSet<DirId>) -> CatalogResult<Vec<FileEntry>> {
        let state = self.state.read();
        let mut files = Vec::new();
        for dir in dirs {
            for (file_id, name) in &state.node(*dir)?.files {
                files.push(FileEntry {
                    file_id: *file_id,
                    dir: *dir,
                    name: name.clone(),
                });
            }
        }
        Ok(files)
    }
}
