//! File artifacts declared inside the stream and the views derived from them

mod extractor;
mod store;
mod tree;

pub use extractor::{collapse_declarations, extract_all, ArtifactExtractor};
pub use store::{ArtifactStore, StoreSnapshot, UpsertOutcome};
pub use tree::{build_tree, FileTreeNode};

use serde::{Deserialize, Serialize};

/// A named unit of file content extracted from the stream. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub content: String,
    pub language: String,
}

impl Artifact {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let language = language_for_path(&path).to_string();
        Self {
            path,
            content: content.into(),
            language,
        }
    }
}

/// Map a path's lowercased final extension to a display language
pub fn language_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "text",
    };

    match extension.as_str() {
        "js" | "jsx" | "ts" | "tsx" => "javascript",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "py" => "python",
        _ => "text",
    }
}
