//! Directory tree listing
//!
//! Always walks the live filesystem; the metadata cache is never consulted.

use serde::Serialize;
use std::cmp::Ordering;
use std::io;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    // Declared first so folders sort before files
    Folder,
    File,
}

/// One entry of a directory tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Path relative to the walked root, `/`-separated; empty for the root
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// Build the tree rooted at `root`.
///
/// Children are ordered folders first, then by name. Symbolic links are
/// listed as files and never followed.
pub fn build_tree(root: &Path) -> io::Result<TreeNode> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by(compare_entries);

    // Open folders from the root down to the current entry's parent
    let mut open: Vec<TreeNode> = Vec::new();
    for entry in walker {
        let entry = entry?;
        while open.len() > entry.depth() {
            close_folder(&mut open);
        }

        let node = to_node(root, &entry);
        if node.kind == NodeKind::Folder {
            open.push(node);
        } else if let Some(parent) = open.last_mut() {
            parent.children.get_or_insert_with(Vec::new).push(node);
        } else {
            return Ok(node);
        }
    }

    while open.len() > 1 {
        close_folder(&mut open);
    }
    open.pop().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} yielded no entries", root.display()),
        )
    })
}

/// Pop the innermost open folder into its parent
fn close_folder(open: &mut Vec<TreeNode>) {
    if let Some(folder) = open.pop() {
        if let Some(parent) = open.last_mut() {
            parent.children.get_or_insert_with(Vec::new).push(folder);
        } else {
            open.push(folder);
        }
    }
}

fn to_node(root: &Path, entry: &DirEntry) -> TreeNode {
    let (name, path) = if entry.depth() == 0 {
        let name = root
            .file_name()
            .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned());
        (name, String::new())
    } else {
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        (entry.file_name().to_string_lossy().into_owned(), path)
    };

    let kind = entry_kind(entry);
    TreeNode {
        name,
        kind,
        path,
        children: (kind == NodeKind::Folder).then(Vec::new),
    }
}

// Without follow_links the file type is the link's own
fn entry_kind(entry: &DirEntry) -> NodeKind {
    if entry.file_type().is_dir() {
        NodeKind::Folder
    } else {
        NodeKind::File
    }
}

fn compare_entries(a: &DirEntry, b: &DirEntry) -> Ordering {
    entry_kind(a)
        .cmp(&entry_kind(b))
        .then_with(|| a.file_name().cmp(b.file_name()))
}
