//! The merged tree view over all stores.
//!
//! Folders and entries from the root store and every mount are merged
//! into one tree; mount points carry their store URL, template folders
//! are flagged, and leaves are classified by their logical-name suffix.

use std::collections::BTreeMap;
use std::fmt::Write;

/// How a leaf's content is interpreted, derived from the logical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Password line plus optional YAML body.
    Plain,
    /// Whole-secret YAML document (`.yml` / `.yaml`).
    Yaml,
    /// Base64-wrapped binary payload (`.b64`).
    Binary,
}

impl ContentType {
    fn from_name(name: &str) -> Self {
        if name.ends_with(".b64") {
            Self::Binary
        } else if name.ends_with(".yml") || name.ends_with(".yaml") {
            Self::Yaml
        } else {
            Self::Plain
        }
    }
}

/// One node of the merged tree.  A node can be a folder and a leaf at
/// the same time when an entry shadows a folder of the same name.
#[derive(Debug, Default)]
pub struct TreeNode {
    children: BTreeMap<String, TreeNode>,
    is_leaf: bool,
    content: Option<ContentType>,
    mount_url: Option<String>,
    has_template: bool,
}

impl TreeNode {
    /// The leaf content type, when this node is a leaf.
    pub fn content(&self) -> Option<ContentType> {
        self.content
    }

    pub fn is_mount(&self) -> bool {
        self.mount_url.is_some()
    }

    pub fn has_template(&self) -> bool {
        self.has_template
    }
}

/// The merged tree of every store.
#[derive(Debug, Default)]
pub struct Tree {
    root: TreeNode,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one entry by its full logical name.
    pub fn insert(&mut self, name: &str) {
        let node = self.node_at(name);
        node.is_leaf = true;
        let base = name.rsplit('/').next().unwrap_or(name);
        node.content = Some(ContentType::from_name(base));
    }

    /// Flag the folder at `path` as a mount point.
    pub fn mark_mount(&mut self, path: &str, url: &str) {
        self.node_at(path).mount_url = Some(url.to_string());
    }

    /// Flag the folder at `path` as carrying a generation template.
    /// The empty path flags the tree root.
    pub fn mark_template(&mut self, path: &str) {
        if path.is_empty() {
            self.root.has_template = true;
        } else {
            self.node_at(path).has_template = true;
        }
    }

    /// The node at `path`, if present.
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        let mut node = &self.root;
        for part in path.split('/') {
            node = node.children.get(part)?;
        }
        Some(node)
    }

    fn node_at(&mut self, path: &str) -> &mut TreeNode {
        let mut node = &mut self.root;
        for part in path.split('/') {
            node = node.children.entry(part.to_string()).or_default();
        }
        node
    }

    /// Flatten the tree into sorted full entry names, descending at
    /// most `depth` folder levels when given.
    pub fn list(&self, depth: Option<usize>) -> Vec<String> {
        let mut out = Vec::new();
        collect(&self.root, "", depth, &mut out);
        out
    }

    /// Render the tree with box-drawing glyphs, descending at most
    /// `depth` folder levels when given.
    pub fn format(&self, depth: Option<usize>) -> String {
        let mut out = String::from(".\n");
        render(&self.root, "", depth, &mut out);
        out
    }
}

fn collect(node: &TreeNode, prefix: &str, depth: Option<usize>, out: &mut Vec<String>) {
    for (name, child) in &node.children {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        if child.is_leaf {
            out.push(path.clone());
        }
        match depth {
            Some(0) => {}
            _ => collect(child, &path, depth.map(|d| d - 1), out),
        }
    }
}

fn render(node: &TreeNode, indent: &str, depth: Option<usize>, out: &mut String) {
    let last = node.children.len().saturating_sub(1);
    for (i, (name, child)) in node.children.iter().enumerate() {
        let (branch, next_indent) = if i == last {
            ("└── ", format!("{indent}    "))
        } else {
            ("├── ", format!("{indent}│   "))
        };
        let _ = write!(out, "{indent}{branch}{name}");
        for annotation in annotations(child) {
            let _ = write!(out, " ({annotation})");
        }
        out.push('\n');

        match depth {
            Some(0) => {}
            _ => render(child, &next_indent, depth.map(|d| d - 1), out),
        }
    }
}

fn annotations(node: &TreeNode) -> Vec<String> {
    let mut a = Vec::new();
    if let Some(url) = &node.mount_url {
        a.push(url.clone());
    }
    if node.has_template {
        a.push("template".to_string());
    }
    match node.content {
        Some(ContentType::Binary) => a.push("binary".to_string()),
        Some(ContentType::Yaml) => a.push("yaml".to_string()),
        _ => {}
    }
    a
}
