//! The status tree: directories and files annotated with git status.
//!
//! Nodes live in an arena owned by [`Tree`] and refer to each other by [`NodeId`]. Parent
//! links are plain ids, so upward traversal is O(1) without shared ownership, and the whole
//! graph is dropped at once when a refresh replaces it.
//!
//! Invariants kept by this module:
//!
//! - Children are ordered directories first, then case-insensitively by name. [`Tree::sort`]
//!   is idempotent.
//! - After [`Tree::update_parent_statuses`], a directory is [`StatusCode::Modified`] iff some
//!   descendant file is not clean, and [`StatusCode::Clean`] otherwise. The root's own status
//!   is never touched.
//! - A node's id is always greater than its parent's.

use crate::status::{StatusCode, StatusMap};
use rustc_hash::FxHashMap;
use std::{
    io,
    path::{Component, Path, PathBuf},
};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
    pub is_dir: bool,
    pub status: StatusCode,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

#[derive(Clone, Debug)]
pub struct Tree {
    root_path: PathBuf,
    nodes: Vec<Node>,
    index: FxHashMap<PathBuf, NodeId>,
}

impl Tree {
    pub const ROOT: NodeId = NodeId(0);

    /// A tree holding only its root directory.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        let root_path = root_path.into();
        let name = root_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root_path.display().to_string());

        let mut index = FxHashMap::default();
        index.insert(root_path.clone(), Self::ROOT);

        Self {
            nodes: vec![Node {
                name,
                path: root_path.clone(),
                is_dir: true,
                status: StatusCode::Clean,
                children: Vec::new(),
                parent: None,
            }],
            root_path,
            index,
        }
    }

    /// Build a tree from every entry under `root_path`, skipping dot-prefixed names.
    ///
    /// Blocking. Symlinks are listed but not followed. Subdirectories that cannot be read
    /// are kept as empty directories.
    pub fn scan(root_path: impl Into<PathBuf>) -> io::Result<Self> {
        let mut tree = Self::new(root_path);
        let root = tree.root_path.clone();
        tree.scan_dir(Self::ROOT, &root, true)?;
        tree.sort();
        Ok(tree)
    }

    fn scan_dir(&mut self, parent: NodeId, dir: &Path, is_root: bool) -> io::Result<()> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if !is_root => {
                debug!("Skipping unreadable directory {}: {err}", dir.display());
                return Ok(());
            },
            Err(err) => return Err(err),
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let id = self.push_child(parent, name, is_dir);
            if is_dir {
                let path = entry.path();
                self.scan_dir(id, &path, false)?;
            }
        }
        Ok(())
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn root(&self) -> &Node {
        &self.nodes[Self::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root().children.is_empty()
    }

    /// Node at an absolute path.
    pub fn find(&self, path: &Path) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn status_of(&self, path: &Path) -> Option<StatusCode> {
        self.find(path).map(|id| self.node(id).status)
    }

    fn push_child(&mut self, parent: NodeId, name: String, is_dir: bool) -> NodeId {
        let id = NodeId(self.nodes.len());
        let path = self.nodes[parent.0].path.join(&name);
        self.index.insert(path.clone(), id);
        self.nodes.push(Node {
            name,
            path,
            is_dir,
            status: StatusCode::Clean,
            children: Vec::new(),
            parent: Some(parent),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Find or create the node at `rel` (relative to the root), creating missing ancestors
    /// as directories.
    pub fn insert(&mut self, rel: &Path, is_dir: bool) -> NodeId {
        let mut current = Self::ROOT;
        let mut components = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .peekable();

        while let Some(name) = components.next() {
            let last = components.peek().is_none();
            let path = self.nodes[current.0].path.join(&name);
            current = match self.index.get(&path) {
                Some(&id) => {
                    if !last {
                        self.nodes[id.0].is_dir = true;
                    }
                    id
                },
                None => self.push_child(current, name, !last || is_dir),
            };
        }
        current
    }

    /// Set the status of the node at `rel`, creating it as a file if it is not in the tree
    /// (e.g. a deleted file).
    pub fn set_status(&mut self, rel: &Path, status: StatusCode) -> NodeId {
        let id = self.insert(rel, false);
        self.nodes[id.0].status = status;
        id
    }

    /// Overlay git statuses whose paths are relative to `toplevel`.
    ///
    /// Paths that do not fall under this tree's root are ignored.
    pub fn apply_statuses(&mut self, statuses: &StatusMap, toplevel: &Path) {
        for (rel, status) in statuses {
            let absolute = toplevel.join(rel);
            match absolute.strip_prefix(&self.root_path) {
                Ok(under_root) if under_root.as_os_str().is_empty() => {},
                Ok(under_root) => {
                    let under_root = under_root.to_path_buf();
                    self.set_status(&under_root, *status);
                },
                Err(_) => debug!("{} is outside {}", absolute.display(), self.root_path.display()),
            }
        }
    }

    /// Order every directory's children: directories first, then by case-folded name.
    pub fn sort(&mut self) {
        for idx in 0..self.nodes.len() {
            if self.nodes[idx].children.len() < 2 {
                continue;
            }
            let mut children = std::mem::take(&mut self.nodes[idx].children);
            children.sort_by(|a, b| {
                let (a, b) = (&self.nodes[a.0], &self.nodes[b.0]);
                b.is_dir
                    .cmp(&a.is_dir)
                    .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                    .then_with(|| a.name.cmp(&b.name))
            });
            self.nodes[idx].children = children;
        }
    }

    /// Derive directory statuses bottom-up from the files beneath them.
    pub fn update_parent_statuses(&mut self) {
        let mut dirty = vec![false; self.nodes.len()];

        // Children always have larger ids than their parents.
        for idx in (0..self.nodes.len()).rev() {
            let node = &self.nodes[idx];
            let is_dirty = if node.is_dir {
                node.children.iter().any(|child| dirty[child.0])
            } else {
                !node.status.is_clean()
            };
            dirty[idx] = is_dirty;

            if node.is_dir && idx != Self::ROOT.0 {
                self.nodes[idx].status = if is_dirty {
                    StatusCode::Modified
                } else {
                    StatusCode::Clean
                };
            }
        }
    }

    /// Every node below the root in display order, with its depth (root's children are 0).
    pub fn walk(&self) -> Vec<(usize, NodeId)> {
        let mut out = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut stack: Vec<(usize, NodeId)> = self
            .root()
            .children
            .iter()
            .rev()
            .map(|id| (0, *id))
            .collect();

        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            stack.extend(
                self.nodes[id.0]
                    .children
                    .iter()
                    .rev()
                    .map(|child| (depth + 1, *child)),
            );
        }
        out
    }

    /// Non-clean files in display order.
    pub fn changed_files(&self) -> Vec<(&Path, StatusCode)> {
        self.walk()
            .into_iter()
            .map(|(_, id)| self.node(id))
            .filter(|node| !node.is_dir && !node.status.is_clean())
            .map(|node| (node.path.as_path(), node.status))
            .collect()
    }
}
