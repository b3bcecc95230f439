use super::Artifact;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Name of the synthetic root directory
const ROOT_NAME: &str = ".";

/// Project tree derived from the artifact store. Holds no state of its own;
/// it is rebuilt from a snapshot whenever the store changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileTreeNode {
    Directory {
        name: String,
        path: String,
        children: Vec<FileTreeNode>,
    },
    File {
        name: String,
        path: String,
        content: String,
    },
}

impl FileTreeNode {
    pub fn name(&self) -> &str {
        match self {
            FileTreeNode::Directory { name, .. } | FileTreeNode::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileTreeNode::Directory { path, .. } | FileTreeNode::File { path, .. } => path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FileTreeNode::File { .. })
    }

    pub fn children(&self) -> &[FileTreeNode] {
        match self {
            FileTreeNode::Directory { children, .. } => children,
            FileTreeNode::File { .. } => &[],
        }
    }

    /// Look up a node by its slash-separated path relative to this node
    pub fn find(&self, path: &str) -> Option<&FileTreeNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| {
                node.children().iter().find(|child| child.name() == segment)
            })
    }

    /// Paths of all files below this node, in display order
    pub fn file_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_file_paths(&mut paths);
        paths
    }

    fn collect_file_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            FileTreeNode::File { path, .. } => paths.push(path),
            FileTreeNode::Directory { children, .. } => {
                for child in children {
                    child.collect_file_paths(paths);
                }
            }
        }
    }

    fn sort_recursive(&mut self) {
        if let FileTreeNode::Directory { children, .. } = self {
            // Directories first, then files, both by name
            children.sort_by(|a, b| (a.is_file(), a.name()).cmp(&(b.is_file(), b.name())));
            for child in children.iter_mut() {
                child.sort_recursive();
            }
        }
    }

    fn to_string_with_indent(&self, level: usize, prefix: &str) -> String {
        let mut result = String::new();

        if level == 0 {
            result.push_str(&format!("{}/\n", self.name()));
        } else {
            result.push_str(prefix);
            result.push_str(self.name());
            if !self.is_file() {
                result.push('/');
            }
            result.push('\n');
        }

        let children = self.children();
        for (i, child) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            let continuation = prefix.replace("├─ ", "│  ").replace("└─ ", "   ");
            let child_prefix = if is_last {
                format!("{continuation}└─ ")
            } else {
                format!("{continuation}├─ ")
            };
            result.push_str(&child.to_string_with_indent(level + 1, &child_prefix));
        }

        result
    }
}

impl fmt::Display for FileTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_indent(0, ""))
    }
}

/// Build the project tree for a store snapshot.
///
/// Path collisions between a file and a directory are resolved first-write-wins
/// in snapshot order: the later artifact is left out of the tree.
pub fn build_tree(artifacts: &[Artifact]) -> FileTreeNode {
    let mut children = Vec::new();

    for artifact in artifacts {
        let segments: Vec<&str> = artifact
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        if segments.is_empty() {
            warn!("Skipping artifact with empty path in project tree");
            continue;
        }

        if let Err(conflict) = insert(&mut children, "", &segments, &artifact.content) {
            warn!(
                "Artifact {} collides with existing tree entry {}, keeping the first",
                artifact.path, conflict
            );
        }
    }

    let mut root = FileTreeNode::Directory {
        name: ROOT_NAME.to_string(),
        path: String::new(),
        children,
    };
    root.sort_recursive();
    root
}

/// Insert a file below `children`, creating directories on the way.
/// Returns the conflicting path when a segment is already taken.
fn insert(
    children: &mut Vec<FileTreeNode>,
    parent_path: &str,
    segments: &[&str],
    content: &str,
) -> Result<(), String> {
    let Some((name, rest)) = segments.split_first() else {
        return Ok(());
    };
    let path = if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{parent_path}/{name}")
    };

    let existing = children.iter().position(|child| child.name() == *name);
    match (existing, rest.is_empty()) {
        (None, true) => {
            children.push(FileTreeNode::File {
                name: name.to_string(),
                path,
                content: content.to_string(),
            });
            Ok(())
        }
        (None, false) => {
            let mut grandchildren = Vec::new();
            insert(&mut grandchildren, &path, rest, content)?;
            children.push(FileTreeNode::Directory {
                name: name.to_string(),
                path,
                children: grandchildren,
            });
            Ok(())
        }
        (Some(index), false) => match &mut children[index] {
            FileTreeNode::Directory {
                children: grandchildren,
                ..
            } => insert(grandchildren, &path, rest, content),
            FileTreeNode::File { .. } => Err(path),
        },
        (Some(_), true) => Err(path),
    }
}
