//! Policy and schema loading types (§6.2): policies are loaded from a set of
//! file paths or from an in-memory text blob; schema validation, when
//! enabled, runs once at construction time.

use std::path::Path;

/// A policy in Cedar DSL text form, addressed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    pub id: String,
    pub content: String,
}

impl PolicyDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Where the engine's schema comes from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    CedarDsl(String),
    Json(String),
}

/// Reads every `*.cedar` file under `dir`, one `PolicyDocument` per file
/// keyed by its file stem.
pub fn load_policy_files(dir: &Path) -> std::io::Result<Vec<PolicyDocument>> {
    let mut documents = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("cedar") {
            continue;
        }
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("policy")
            .to_string();
        let content = std::fs::read_to_string(&path)?;
        documents.push(PolicyDocument::new(id, content));
    }
    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(documents)
}
