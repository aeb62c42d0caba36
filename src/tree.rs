//! The topic tree.
//!
//! An in-memory mirror of the broker's topic namespace. Nodes live in
//! an inode table keyed by a monotonic, never-reused identifier so the
//! kernel always sees stable inode numbers. Directory children are
//! kept name-sorted for deterministic listings. Every access goes
//! through the single tree mutex owned by the caller; nothing in here
//! blocks.

use std::collections::BTreeMap;
use std::time::SystemTime;

use ahash::AHashMap;

use crate::error::TreeError;

pub type Ino = u64;
pub type Fh = u64;

/// Inode number of the tree root, as fixed by the kernel protocol.
pub const ROOT_INO: Ino = 1;

/// What a node is, structurally. A node created by a publish is a
/// `File`; intermediates and mkdir'd nodes are `Directory`.
#[derive(Debug)]
pub enum NodeKind {
    Directory {
        /// Children keyed by name; sorted iteration order drives
        /// listings.
        children: BTreeMap<String, Ino>,
        /// True for nodes made by an explicit mkdir, which keep their
        /// directory presentation even with no children.
        explicit: bool,
    },
    File {
        payload: Vec<u8>,
        /// Open handles attached to this node.
        handles: Vec<Fh>,
    },
}

#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub parent: Ino,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub kind: NodeKind,
}

impl Node {
    fn new(name: String, parent: Ino, kind: NodeKind) -> Self {
        let now = SystemTime::now();
        Node {
            name,
            parent,
            atime: now,
            mtime: now,
            kind,
        }
    }

    /// A node is presented to the kernel as a directory iff it was
    /// explicitly created as one or currently has children.
    pub fn presents_as_dir(&self) -> bool {
        match &self.kind {
            NodeKind::Directory { children, explicit } => *explicit || !children.is_empty(),
            NodeKind::File { .. } => false,
        }
    }

    /// Payload length; zero for directories.
    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { .. } => 0,
            NodeKind::File { payload, .. } => payload.len() as u64,
        }
    }
}

/// Per-open state for a file handle.
#[derive(Debug)]
pub struct Handle {
    pub ino: Ino,
    /// Kernel poll token stored by a POLL request that asked to be
    /// notified. Consumed when a wakeup is emitted.
    pub poll_handle: Option<u64>,
    /// Set when the payload changed since the last POLL observation.
    pub updated: bool,
}

/// One entry of a materialized directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: Ino,
    pub is_dir: bool,
    pub name: String,
}

pub struct Tree {
    nodes: AHashMap<Ino, Node>,
    handles: AHashMap<Fh, Handle>,
    /// Listings materialized at opendir time, served by readdir.
    dir_handles: AHashMap<Fh, Vec<DirEntry>>,
    next_ino: Ino,
    next_fh: Fh,
}

impl Tree {
    pub fn new() -> Self {
        let mut nodes = AHashMap::new();
        nodes.insert(
            ROOT_INO,
            Node::new(
                String::new(),
                ROOT_INO,
                NodeKind::Directory {
                    children: BTreeMap::new(),
                    explicit: true,
                },
            ),
        );
        Tree {
            nodes,
            handles: AHashMap::new(),
            dir_handles: AHashMap::new(),
            next_ino: ROOT_INO + 1,
            next_fh: 1,
        }
    }

    pub fn node(&self, ino: Ino) -> Option<&Node> {
        self.nodes.get(&ino)
    }

    pub fn handle(&self, fh: Fh) -> Option<&Handle> {
        self.handles.get(&fh)
    }

    fn alloc_ino(&mut self) -> Ino {
        let ino = self.next_ino;
        self.next_ino += 1;
        ino
    }

    fn alloc_fh(&mut self) -> Fh {
        let fh = self.next_fh;
        self.next_fh += 1;
        fh
    }

    fn children_of(&self, ino: Ino) -> Result<&BTreeMap<String, Ino>, TreeError> {
        let node = self.nodes.get(&ino).ok_or(TreeError::NotFound)?;
        match &node.kind {
            NodeKind::Directory { children, .. } => Ok(children),
            NodeKind::File { .. } => Err(TreeError::NotADirectory),
        }
    }

    /// Single-level child lookup.
    pub fn lookup(&self, parent: Ino, name: &str) -> Result<Ino, TreeError> {
        let children = self.children_of(parent)?;
        children.get(name).copied().ok_or(TreeError::NotFound)
    }

    /// Resolve a full `/`-separated topic path from the root.
    #[allow(dead_code)] // Kernel traffic resolves level by level; handy in tests
    pub fn find(&self, topic: &str) -> Result<Ino, TreeError> {
        let mut ino = ROOT_INO;
        for segment in topic.split('/') {
            if segment.is_empty() {
                return Err(TreeError::InvalidName);
            }
            ino = self.lookup(ino, segment)?;
        }
        Ok(ino)
    }

    /// The topic corresponding to a node: path segments from the root
    /// joined with `/`, no leading separator.
    pub fn topic_of(&self, ino: Ino) -> Option<String> {
        let mut segments = Vec::new();
        let mut cur = ino;
        while cur != ROOT_INO {
            let node = self.nodes.get(&cur)?;
            segments.push(node.name.clone());
            cur = node.parent;
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    /// Store an inbound payload at `topic`, creating missing
    /// intermediate directories and the leaf file as needed.
    ///
    /// Returns the leaf inode and the kernel poll tokens taken from
    /// handles that had requested notification; the caller emits one
    /// wakeup per token, and exactly those handles get their `updated`
    /// flag set. The operation is all-or-nothing: the whole path is
    /// validated before any node is created.
    pub fn insert_path(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(Ino, Vec<u64>), TreeError> {
        let segments: Vec<&str> = topic.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(TreeError::InvalidName);
        }

        // Validation pass: existing intermediates must be directories
        // and an existing leaf must be a file.
        let mut ino = ROOT_INO;
        for (i, segment) in segments.iter().enumerate() {
            let children = self.children_of(ino)?;
            match children.get(*segment) {
                Some(&child) => {
                    let node = &self.nodes[&child];
                    let last = i + 1 == segments.len();
                    match &node.kind {
                        NodeKind::Directory { .. } if last => {
                            return Err(TreeError::IsADirectory)
                        }
                        NodeKind::File { .. } if !last => {
                            return Err(TreeError::NotADirectory)
                        }
                        _ => ino = child,
                    }
                }
                None => break,
            }
        }

        // Creation pass.
        let mut ino = ROOT_INO;
        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            if let Ok(child) = self.lookup(ino, segment) {
                ino = child;
                continue;
            }
            let kind = if last {
                NodeKind::File {
                    payload: Vec::new(),
                    handles: Vec::new(),
                }
            } else {
                NodeKind::Directory {
                    children: BTreeMap::new(),
                    explicit: false,
                }
            };
            let child_ino = self.alloc_ino();
            let child = Node::new(segment.to_string(), ino, kind);
            self.nodes.insert(child_ino, child);
            match &mut self.nodes.get_mut(&ino).unwrap().kind {
                NodeKind::Directory { children, .. } => {
                    children.insert(segment.to_string(), child_ino);
                }
                NodeKind::File { .. } => unreachable!("validated as directory"),
            }
            ino = child_ino;
        }

        let tokens = self.apply_payload(ino, payload);
        Ok((ino, tokens))
    }

    /// Replace the payload of the file at `ino` and refresh `mtime`.
    /// Handles that scheduled a poll notification have their stored
    /// token taken out for the caller to notify and are marked
    /// updated; handles that never polled stay untouched.
    fn apply_payload(&mut self, ino: Ino, payload: &[u8]) -> Vec<u64> {
        let node = self.nodes.get_mut(&ino).expect("leaf exists");
        node.mtime = SystemTime::now();
        let fhs = match &mut node.kind {
            NodeKind::File {
                payload: stored,
                handles,
            } => {
                stored.clear();
                stored.extend_from_slice(payload);
                handles.clone()
            }
            NodeKind::Directory { .. } => unreachable!("leaf is a file"),
        };
        let mut tokens = Vec::new();
        for fh in fhs {
            if let Some(handle) = self.handles.get_mut(&fh) {
                if let Some(token) = handle.poll_handle.take() {
                    handle.updated = true;
                    tokens.push(token);
                }
            }
        }
        tokens
    }

    /// Replace a file's payload from a local write. Handles are marked
    /// updated but poll tokens stay put; the broker's echo of the
    /// publish is what wakes pollers.
    pub fn set_payload(&mut self, ino: Ino, payload: &[u8]) -> Result<(), TreeError> {
        let node = self.nodes.get_mut(&ino).ok_or(TreeError::NotFound)?;
        node.mtime = SystemTime::now();
        let fhs = match &mut node.kind {
            NodeKind::File {
                payload: stored,
                handles,
            } => {
                stored.clear();
                stored.extend_from_slice(payload);
                handles.clone()
            }
            NodeKind::Directory { .. } => return Err(TreeError::IsADirectory),
        };
        for fh in fhs {
            if let Some(handle) = self.handles.get_mut(&fh) {
                handle.updated = true;
            }
        }
        Ok(())
    }

    /// Resize a file's payload in place, zero-filling on extension.
    /// Local only; nothing is published and pollers are not marked.
    pub fn truncate(&mut self, ino: Ino, size: u64) -> Result<(), TreeError> {
        let node = self.nodes.get_mut(&ino).ok_or(TreeError::NotFound)?;
        match &mut node.kind {
            NodeKind::File { payload, .. } => {
                payload.resize(size as usize, 0);
                node.mtime = SystemTime::now();
                Ok(())
            }
            NodeKind::Directory { .. } => Err(TreeError::IsADirectory),
        }
    }

    pub fn set_times(
        &mut self,
        ino: Ino,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> Result<(), TreeError> {
        let node = self.nodes.get_mut(&ino).ok_or(TreeError::NotFound)?;
        if let Some(t) = atime {
            node.atime = t;
        }
        if let Some(t) = mtime {
            node.mtime = t;
        }
        Ok(())
    }

    /// Create an explicitly-directory child.
    pub fn mkdir(&mut self, parent: Ino, name: &str) -> Result<Ino, TreeError> {
        if name.is_empty() || name.contains('/') {
            return Err(TreeError::InvalidName);
        }
        let children = self.children_of(parent)?;
        if children.contains_key(name) {
            return Err(TreeError::Exists);
        }
        let ino = self.alloc_ino();
        let node = Node::new(
            name.to_string(),
            parent,
            NodeKind::Directory {
                children: BTreeMap::new(),
                explicit: true,
            },
        );
        self.nodes.insert(ino, node);
        match &mut self.nodes.get_mut(&parent).unwrap().kind {
            NodeKind::Directory { children, .. } => {
                children.insert(name.to_string(), ino);
            }
            NodeKind::File { .. } => unreachable!("checked above"),
        }
        Ok(ino)
    }

    /// Create an empty file child and open a handle on it in one step.
    pub fn create_file(&mut self, parent: Ino, name: &str) -> Result<(Ino, Fh), TreeError> {
        if name.is_empty() || name.contains('/') {
            return Err(TreeError::InvalidName);
        }
        let children = self.children_of(parent)?;
        if children.contains_key(name) {
            return Err(TreeError::Exists);
        }
        let ino = self.alloc_ino();
        let node = Node::new(
            name.to_string(),
            parent,
            NodeKind::File {
                payload: Vec::new(),
                handles: Vec::new(),
            },
        );
        self.nodes.insert(ino, node);
        match &mut self.nodes.get_mut(&parent).unwrap().kind {
            NodeKind::Directory { children, .. } => {
                children.insert(name.to_string(), ino);
            }
            NodeKind::File { .. } => unreachable!("checked above"),
        }
        let fh = self.open(ino)?;
        Ok((ino, fh))
    }

    /// Remove a named child and its whole subtree. Handles attached to
    /// removed nodes are torn down with them.
    pub fn remove(&mut self, parent: Ino, name: &str) -> Result<(), TreeError> {
        let child = self.lookup(parent, name)?;
        match &mut self.nodes.get_mut(&parent).unwrap().kind {
            NodeKind::Directory { children, .. } => {
                children.remove(name);
            }
            NodeKind::File { .. } => unreachable!("lookup succeeded"),
        }

        let mut stack = vec![child];
        while let Some(ino) = stack.pop() {
            let node = match self.nodes.remove(&ino) {
                Some(n) => n,
                None => continue,
            };
            match node.kind {
                NodeKind::Directory { children, .. } => {
                    stack.extend(children.into_values());
                }
                NodeKind::File { handles, .. } => {
                    for fh in handles {
                        self.handles.remove(&fh);
                    }
                }
            }
        }
        Ok(())
    }

    /// Attach a new handle to the file at `ino`.
    pub fn open(&mut self, ino: Ino) -> Result<Fh, TreeError> {
        let fh = self.alloc_fh();
        let node = self.nodes.get_mut(&ino).ok_or(TreeError::NotFound)?;
        match &mut node.kind {
            NodeKind::File { handles, .. } => handles.push(fh),
            NodeKind::Directory { .. } => return Err(TreeError::IsADirectory),
        }
        self.handles.insert(
            fh,
            Handle {
                ino,
                poll_handle: None,
                updated: false,
            },
        );
        Ok(fh)
    }

    /// Detach a handle. Succeeds even if the owning node is already
    /// gone.
    pub fn release(&mut self, fh: Fh) {
        if let Some(handle) = self.handles.remove(&fh) {
            if let Some(node) = self.nodes.get_mut(&handle.ino) {
                if let NodeKind::File { handles, .. } = &mut node.kind {
                    handles.retain(|&h| h != fh);
                }
            }
        }
    }

    /// Copy out `[offset, min(offset + size, len))` of the payload
    /// behind `fh` and refresh the node's `atime`.
    pub fn read_at(&mut self, fh: Fh, offset: u64, size: u32) -> Result<Vec<u8>, TreeError> {
        let ino = self.handles.get(&fh).ok_or(TreeError::NotFound)?.ino;
        let node = self.nodes.get_mut(&ino).ok_or(TreeError::NotFound)?;
        node.atime = SystemTime::now();
        match &node.kind {
            NodeKind::File { payload, .. } => {
                let start = (offset as usize).min(payload.len());
                let end = (start + size as usize).min(payload.len());
                Ok(payload[start..end].to_vec())
            }
            NodeKind::Directory { .. } => Err(TreeError::IsADirectory),
        }
    }

    /// Materialize a listing of `ino`: `.`, `..`, then children in
    /// name order. Returns an opaque directory handle.
    pub fn opendir(&mut self, ino: Ino) -> Result<Fh, TreeError> {
        let node = self.nodes.get(&ino).ok_or(TreeError::NotFound)?;
        let children = match &node.kind {
            NodeKind::Directory { children, .. } => children,
            NodeKind::File { .. } => return Err(TreeError::NotADirectory),
        };
        let mut entries = vec![
            DirEntry {
                ino,
                is_dir: true,
                name: ".".to_string(),
            },
            DirEntry {
                ino: node.parent,
                is_dir: true,
                name: "..".to_string(),
            },
        ];
        for (name, &child) in children {
            entries.push(DirEntry {
                ino: child,
                is_dir: self.nodes[&child].presents_as_dir(),
                name: name.clone(),
            });
        }
        let fh = self.alloc_fh();
        self.dir_handles.insert(fh, entries);
        Ok(fh)
    }

    pub fn readdir_entries(&self, fh: Fh) -> Result<&[DirEntry], TreeError> {
        self.dir_handles
            .get(&fh)
            .map(|v| v.as_slice())
            .ok_or(TreeError::NotFound)
    }

    pub fn releasedir(&mut self, fh: Fh) {
        self.dir_handles.remove(&fh);
    }

    /// Answer a POLL request on `fh`: store the kernel token when
    /// notification was requested, and report (and clear) a pending
    /// update.
    pub fn poll(
        &mut self,
        fh: Fh,
        kernel_handle: Option<u64>,
    ) -> Result<bool, TreeError> {
        let handle = self.handles.get_mut(&fh).ok_or(TreeError::NotFound)?;
        if let Some(kh) = kernel_handle {
            handle.poll_handle = Some(kh);
        }
        if handle.updated {
            handle.updated = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_find() {
        let mut tree = Tree::new();
        let (ino, tokens) = tree.insert_path("sensors/temp", b"21.5").unwrap();
        assert!(tokens.is_empty());
        assert_eq!(tree.find("sensors/temp").unwrap(), ino);

        let node = tree.node(ino).unwrap();
        assert!(!node.presents_as_dir());
        assert_eq!(node.size(), 4);

        let parent = tree.find("sensors").unwrap();
        assert!(tree.node(parent).unwrap().presents_as_dir());
    }

    #[test]
    fn test_insert_replaces_payload() {
        let mut tree = Tree::new();
        let (ino, _) = tree.insert_path("a", b"first").unwrap();
        let (ino2, _) = tree.insert_path("a", b"second").unwrap();
        assert_eq!(ino, ino2);
        match &tree.node(ino).unwrap().kind {
            NodeKind::File { payload, .. } => assert_eq!(payload, b"second"),
            _ => panic!("expected file"),
        }
    }

    #[test]
    fn test_insert_rejects_empty_segments() {
        let mut tree = Tree::new();
        assert_eq!(
            tree.insert_path("", b"x").unwrap_err(),
            TreeError::InvalidName
        );
        assert_eq!(
            tree.insert_path("/a", b"x").unwrap_err(),
            TreeError::InvalidName
        );
        assert_eq!(
            tree.insert_path("a//b", b"x").unwrap_err(),
            TreeError::InvalidName
        );
    }

    #[test]
    fn test_insert_collision_with_file() {
        let mut tree = Tree::new();
        tree.insert_path("a", b"leaf").unwrap();
        // "a" exists as a file; it cannot become an intermediate.
        assert_eq!(
            tree.insert_path("a/b", b"x").unwrap_err(),
            TreeError::NotADirectory
        );
        // The failed insert must not have disturbed the file.
        match &tree.node(tree.find("a").unwrap()).unwrap().kind {
            NodeKind::File { payload, .. } => assert_eq!(payload, b"leaf"),
            _ => panic!("expected file"),
        }
    }

    #[test]
    fn test_insert_collision_with_directory() {
        let mut tree = Tree::new();
        tree.insert_path("a/b", b"x").unwrap();
        assert_eq!(
            tree.insert_path("a", b"x").unwrap_err(),
            TreeError::IsADirectory
        );
    }

    #[test]
    fn test_mkdir_presents_as_dir_when_empty() {
        let mut tree = Tree::new();
        let ino = tree.mkdir(ROOT_INO, "x").unwrap();
        assert!(tree.node(ino).unwrap().presents_as_dir());
        assert_eq!(tree.mkdir(ROOT_INO, "x").unwrap_err(), TreeError::Exists);
    }

    #[test]
    fn test_listing_is_sorted() {
        let mut tree = Tree::new();
        tree.insert_path("b", b"").unwrap();
        tree.insert_path("a/c", b"").unwrap();
        tree.insert_path("a/b", b"").unwrap();

        let fh = tree.opendir(ROOT_INO).unwrap();
        let names: Vec<&str> = tree
            .readdir_entries(fh)
            .unwrap()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, [".", "..", "a", "b"]);
        tree.releasedir(fh);

        let a = tree.find("a").unwrap();
        let fh = tree.opendir(a).unwrap();
        let names: Vec<&str> = tree
            .readdir_entries(fh)
            .unwrap()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, [".", "..", "b", "c"]);
    }

    #[test]
    fn test_remove_is_recursive() {
        let mut tree = Tree::new();
        let (leaf, _) = tree.insert_path("a/b/c", b"x").unwrap();
        let fh = tree.open(leaf).unwrap();

        tree.remove(ROOT_INO, "a").unwrap();
        assert_eq!(tree.find("a").unwrap_err(), TreeError::NotFound);
        assert!(tree.node(leaf).is_none());
        // Handle went down with the node.
        assert!(tree.handle(fh).is_none());
        assert_eq!(
            tree.remove(ROOT_INO, "a").unwrap_err(),
            TreeError::NotFound
        );
    }

    #[test]
    fn test_read_at_bounds() {
        let mut tree = Tree::new();
        let (ino, _) = tree.insert_path("t", b"hello").unwrap();
        let fh = tree.open(ino).unwrap();

        assert_eq!(tree.read_at(fh, 0, 5).unwrap(), b"hello");
        assert_eq!(tree.read_at(fh, 0, 100).unwrap(), b"hello");
        assert_eq!(tree.read_at(fh, 3, 100).unwrap(), b"lo");
        assert_eq!(tree.read_at(fh, 5, 10).unwrap(), b"");
        assert_eq!(tree.read_at(fh, 99, 10).unwrap(), b"");
    }

    #[test]
    fn test_open_directory_fails() {
        let mut tree = Tree::new();
        tree.insert_path("d/f", b"").unwrap();
        let d = tree.find("d").unwrap();
        assert_eq!(tree.open(d).unwrap_err(), TreeError::IsADirectory);
    }

    #[test]
    fn test_release_tolerates_missing_handle() {
        let mut tree = Tree::new();
        tree.release(12345);
    }

    #[test]
    fn test_poll_and_update_flow() {
        let mut tree = Tree::new();
        let (ino, _) = tree.insert_path("t", b"v1").unwrap();
        let fh = tree.open(ino).unwrap();

        // Nothing pending; register for notification.
        assert!(!tree.poll(fh, Some(77)).unwrap());

        // Inbound publish takes the stored token and marks the handle.
        let (_, tokens) = tree.insert_path("t", b"v2").unwrap();
        assert_eq!(tokens, [77]);
        assert!(tree.handle(fh).unwrap().updated);
        assert!(tree.handle(fh).unwrap().poll_handle.is_none());

        // Poll observes and clears the update exactly once.
        assert!(tree.poll(fh, None).unwrap());
        assert!(!tree.poll(fh, None).unwrap());

        // Without a re-registered token no further wakeups are owed
        // and the handle is not marked either.
        let (_, tokens) = tree.insert_path("t", b"v3").unwrap();
        assert!(tokens.is_empty());
        assert!(!tree.handle(fh).unwrap().updated);
    }

    #[test]
    fn test_local_write_keeps_poll_token() {
        let mut tree = Tree::new();
        let (ino, _) = tree.insert_path("t", b"v1").unwrap();
        let fh = tree.open(ino).unwrap();
        assert!(!tree.poll(fh, Some(5)).unwrap());

        tree.set_payload(ino, b"v2").unwrap();
        let handle = tree.handle(fh).unwrap();
        assert!(handle.updated);
        // Token waits for the broker echo.
        assert_eq!(handle.poll_handle, Some(5));
    }

    #[test]
    fn test_truncate() {
        let mut tree = Tree::new();
        let (ino, _) = tree.insert_path("t", b"hello").unwrap();
        tree.truncate(ino, 2).unwrap();
        assert_eq!(tree.node(ino).unwrap().size(), 2);
        tree.truncate(ino, 4).unwrap();
        match &tree.node(ino).unwrap().kind {
            NodeKind::File { payload, .. } => assert_eq!(payload, b"he\0\0"),
            _ => panic!("expected file"),
        }
    }

    #[test]
    fn test_topic_of() {
        let mut tree = Tree::new();
        let (ino, _) = tree.insert_path("a/b/c", b"").unwrap();
        assert_eq!(tree.topic_of(ino).unwrap(), "a/b/c");
        assert_eq!(tree.topic_of(ROOT_INO).unwrap(), "");
    }

    #[test]
    fn test_create_file_opens_handle() {
        let mut tree = Tree::new();
        let dir = tree.mkdir(ROOT_INO, "x").unwrap();
        let (ino, fh) = tree.create_file(dir, "y").unwrap();
        assert_eq!(tree.handle(fh).unwrap().ino, ino);
        assert_eq!(
            tree.create_file(dir, "y").unwrap_err(),
            TreeError::Exists
        );
    }

    #[test]
    fn test_inode_numbers_never_reused() {
        let mut tree = Tree::new();
        let (first, _) = tree.insert_path("a", b"").unwrap();
        tree.remove(ROOT_INO, "a").unwrap();
        let (second, _) = tree.insert_path("a", b"").unwrap();
        assert_ne!(first, second);
    }
}
