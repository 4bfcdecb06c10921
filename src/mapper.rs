//! URI↔relative-path conversion and path cleaning.
//!
//! `PartialIndex` and `QueryRegistry` key every cache and map by a cleaned
//! relative path (§4.F: "All `relPath` keys are canonicalized with a
//! path-cleaning step ... before insertion or lookup"); this module is the
//! single place that cleaning happens so every caller agrees on the key.

use std::path::{Component, Path, PathBuf};

/// Collapses `./`, `..`, and duplicate separators the way a shell `cd`
/// would, without touching the filesystem. Relative and does not resolve
/// symlinks; purely lexical, matching the spec's "path-cleaning step".
pub fn clean_path(path: &str) -> String {
    let mut out: Vec<Component> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match out.last() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    _ => out.push(component),
                }
            }
            other => out.push(other),
        }
    }
    let cleaned: PathBuf = out.iter().collect();
    cleaned.to_string_lossy().replace('\\', "/")
}

/// `uri_to_rel(uri) = relative(workspaceRoot, uri.file_path)`; returns an
/// empty string on any error (malformed URI, path outside the workspace).
pub fn uri_to_rel(workspace_root: &Path, uri: &str) -> String {
    let file_path = match uri.strip_prefix("file://") {
        Some(p) => p,
        None => uri,
    };
    let path = Path::new(file_path);
    match path.strip_prefix(workspace_root) {
        Ok(rel) => clean_path(&rel.to_string_lossy()),
        Err(_) => String::new(),
    }
}

/// `rel_to_uri(rel) = file_uri(join(workspaceRoot, rel))`.
pub fn rel_to_uri(workspace_root: &Path, rel: &str) -> String {
    let joined = workspace_root.join(rel);
    format!("file://{}", joined.to_string_lossy())
}
