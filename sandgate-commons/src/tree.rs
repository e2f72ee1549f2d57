use serde::{Deserialize, Serialize};

/// Whether a tree node is a leaf file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// One entry in a recursive directory listing.
///
/// `size` is only present for files and `children` only for directories;
/// both are skipped on the wire when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileTreeNode>>,
}

impl FileTreeNode {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            size: Some(size),
            children: None,
        }
    }

    pub fn directory(name: impl Into<String>, children: Vec<FileTreeNode>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            size: None,
            children: Some(children),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&FileTreeNode> {
        self.children
            .as_deref()
            .and_then(|children| children.iter().find(|child| child.name == name))
    }
}
