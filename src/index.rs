//! Lazy index facade: glues the wire scanner and the symbol prefix tree
//! together behind per-document caching and a modification lock.
//!
//! Lock order, enforced by code layout (only methods here ever hold more
//! than one lock, and always in this order): `modification` → `prefix_tree`
//! → `loaded_documents` → the `DashMap`s (each shards its own locking).

use crate::buffer::BufferPool;
use crate::error::{IndexError, IndexResult, TreeError};
use crate::mapper::clean_path;
use crate::symbol::parse_symbol;
use crate::tree::{NodeId, SymbolPrefixTree};
use crate::types::{Descriptor, Document, Occurrence, SymbolInformation};
use crate::wire::Scanner;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type DocumentLoadedCallback = dyn Fn(&Document) + Send + Sync;

struct DocTreeEntry {
    nodes: Vec<NodeId>,
    revision: i64,
}

#[derive(Default)]
struct LocalLoadState {
    tree: SymbolPrefixTree,
    doc_to_index: HashMap<String, PathBuf>,
    updated_docs: HashMap<String, i64>,
    doc_tree_nodes: HashMap<String, (Vec<NodeId>, i64)>,
    implementors: HashMap<String, HashSet<String>>,
}

/// Facade combining the scanner and prefix tree: per-document caching,
/// per-file revision tracking, a references scan, descriptor lookup, and
/// the reverse-implementors index (`spec.md` §4.E).
pub struct PartialIndex {
    index_folder: PathBuf,
    pool: Arc<BufferPool>,
    max_concurrency: usize,

    prefix_tree_root: Arc<RwLock<SymbolPrefixTree>>,
    loaded_documents: Arc<RwLock<HashMap<String, Document>>>,
    doc_tree_nodes: Arc<DashMap<String, DocTreeEntry>>,
    doc_to_index: Arc<DashMap<String, PathBuf>>,
    implementors_by_symbol: Arc<DashMap<String, HashSet<String>>>,
    updated_docs: Arc<DashMap<String, i64>>,
    index_content_hash: Arc<DashMap<PathBuf, [u8; 32]>>,
    external_symbols: Arc<RwLock<HashMap<String, SymbolInformation>>>,
    revision: Arc<AtomicU64>,
    modification: Arc<Mutex<()>>,
    document_loaded_callback: Arc<RwLock<Option<Arc<DocumentLoadedCallback>>>>,
}

impl PartialIndex {
    pub fn new(index_folder: impl Into<PathBuf>) -> Self {
        Self::with_scanner_config(index_folder, 4096, 8, num_cpus::get())
    }

    pub fn with_scanner_config(
        index_folder: impl Into<PathBuf>,
        start_bucket_size: usize,
        bucket_count: usize,
        max_concurrency: usize,
    ) -> Self {
        Self {
            index_folder: index_folder.into(),
            pool: Arc::new(BufferPool::new(start_bucket_size, bucket_count, 32)),
            max_concurrency: max_concurrency.max(1),
            prefix_tree_root: Arc::new(RwLock::new(SymbolPrefixTree::new())),
            loaded_documents: Arc::new(RwLock::new(HashMap::new())),
            doc_tree_nodes: Arc::new(DashMap::new()),
            doc_to_index: Arc::new(DashMap::new()),
            implementors_by_symbol: Arc::new(DashMap::new()),
            updated_docs: Arc::new(DashMap::new()),
            index_content_hash: Arc::new(DashMap::new()),
            external_symbols: Arc::new(RwLock::new(HashMap::new())),
            revision: Arc::new(AtomicU64::new(0)),
            modification: Arc::new(Mutex::new(())),
            document_loaded_callback: Arc::new(RwLock::new(None)),
        }
    }

    pub fn index_folder(&self) -> &Path {
        &self.index_folder
    }

    pub fn load_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn set_document_loaded_callback(&self, f: impl Fn(&Document) + Send + Sync + 'static) {
        *self.document_loaded_callback.write() = Some(Arc::new(f));
    }

    fn fire_loaded(callback: &Arc<RwLock<Option<Arc<DocumentLoadedCallback>>>>, doc: &Document) {
        if let Some(cb) = callback.read().as_ref() {
            cb(doc);
        }
    }

    /// Scans `reader` (the content of `index_path`) into a local tree and
    /// local maps, then merges into global state under the modification
    /// lock. Per the open question resolved in `DESIGN.md`: merges happen
    /// even when the scanner later reports an error, reflecting whatever
    /// was read up to that point — the local-tree-then-merge pattern never
    /// leaves the global tree partially mutated mid-scan.
    pub fn load_index<R: Read>(&self, index_path: &Path, reader: &mut R) -> IndexResult<()> {
        let local = Arc::new(Mutex::new(LocalLoadState::default()));
        let index_path_owned = index_path.to_path_buf();

        let revision_for_match = Arc::clone(&self.revision);
        let local_for_match = Arc::clone(&local);
        let loaded_documents_for_match = Arc::clone(&self.loaded_documents);
        let index_path_for_match = index_path_owned.clone();

        let loaded_documents_for_visit = Arc::clone(&self.loaded_documents);
        let callback_for_visit = Arc::clone(&self.document_loaded_callback);

        let revision_for_symbol = Arc::clone(&self.revision);
        let local_for_symbol = Arc::clone(&local);

        let scanner = Scanner::new(Arc::clone(&self.pool))
            .with_match_document_path(move |p| {
                let clean = clean_path(p);
                let rev = revision_for_match.fetch_add(1, Ordering::SeqCst) + 1;
                let mut state = local_for_match.lock();
                state
                    .doc_to_index
                    .insert(clean.clone(), index_path_for_match.clone());
                state.updated_docs.insert(clean.clone(), rev as i64);
                loaded_documents_for_match.read().contains_key(&clean)
            })
            .with_visit_document(move |doc| {
                let clean = clean_path(&doc.relative_path);
                loaded_documents_for_visit.write().insert(clean, doc.clone());
                Self::fire_loaded(&callback_for_visit, doc);
            })
            .with_match_symbol(|_| true)
            .with_visit_symbol(move |p, info| {
                let clean = clean_path(p);
                let rev = revision_for_symbol.load(Ordering::SeqCst) as i64;
                let mut state = local_for_symbol.lock();
                let (node, is_new) = match state.tree.add_symbol(&clean, info.clone(), rev) {
                    Ok(result) => result,
                    Err(_) => return, // malformed symbol moniker, skip
                };
                if is_new {
                    state
                        .doc_tree_nodes
                        .entry(clean.clone())
                        .or_insert_with(|| (Vec::new(), rev))
                        .0
                        .push(node);
                }
                for rel in &info.relationships {
                    if rel.is_implementation {
                        state
                            .implementors
                            .entry(rel.symbol.clone())
                            .or_default()
                            .insert(info.symbol.clone());
                    }
                }
            });

        let scan_result = scanner.scan_index(reader);
        drop(scanner);

        let local_state = Arc::try_unwrap(local)
            .unwrap_or_else(|_| unreachable!("scanner closures dropped, local is uniquely owned"))
            .into_inner();

        {
            let _guard = self.modification.lock();
            self.prefix_tree_root.write().merge(local_state.tree);

            for (path, (nodes, revision)) in local_state.doc_tree_nodes {
                let mut entry = self.doc_tree_nodes.entry(path).or_insert_with(|| DocTreeEntry {
                    nodes: Vec::new(),
                    revision: 0,
                });
                entry.nodes.extend(nodes);
                entry.revision = entry.revision.max(revision);
            }
            for (path, revision) in local_state.updated_docs {
                let merged = match self.updated_docs.get(&path) {
                    Some(existing) => (*existing).max(revision),
                    None => revision,
                };
                self.updated_docs.insert(path, merged);
            }
            for (path, index_path) in local_state.doc_to_index {
                self.doc_to_index.insert(path, index_path);
            }
            for (symbol, implementors) in local_state.implementors {
                self.implementors_by_symbol
                    .entry(symbol)
                    .or_default()
                    .extend(implementors);
            }
        }

        scan_result.map_err(IndexError::from)
    }

    /// Opens `path`, computing its content hash and checking it against the
    /// last recorded one (kept both in memory and in a `<path>.sha256`
    /// companion file): unchanged content short-circuits the reload.
    pub fn load_index_file(&self, path: &Path) -> IndexResult<()> {
        let bytes = std::fs::read(path).map_err(|source| {
            IndexError::Scanner(crate::error::ScannerError::Io {
                path: path.to_path_buf(),
                source,
            })
        })?;
        let hash: [u8; 32] = Sha256::digest(&bytes).into();

        if self
            .index_content_hash
            .get(path)
            .map(|existing| *existing == hash)
            .unwrap_or(false)
        {
            return Ok(());
        }

        let mut reader = BufReader::new(bytes.as_slice());
        self.load_index(path, &mut reader)?;

        self.index_content_hash.insert(path.to_path_buf(), hash);
        let hash_path = PathBuf::from(format!("{}.sha256", path.display()));
        let _ = std::fs::write(&hash_path, hash);
        Ok(())
    }

    pub fn load_index_folder(&self, parallel: bool) -> IndexResult<()> {
        let files = crate::wire::collect_scip_files(&self.index_folder);
        if parallel {
            use rayon::prelude::*;
            let errors: Vec<IndexError> = files
                .par_iter()
                .filter_map(|f| self.load_index_file(f).err())
                .collect();
            if errors.is_empty() {
                Ok(())
            } else {
                Err(IndexError::Aggregate(errors))
            }
        } else {
            let mut errors = Vec::new();
            for f in &files {
                if let Err(e) = self.load_index_file(f) {
                    errors.push(e);
                }
            }
            if errors.is_empty() {
                Ok(())
            } else {
                Err(IndexError::Aggregate(errors))
            }
        }
    }

    pub fn load_document(&self, rel_path: &str) -> IndexResult<Option<Document>> {
        let clean = clean_path(rel_path);
        if let Some(doc) = self.loaded_documents.read().get(&clean) {
            return Ok(Some(doc.clone()));
        }

        let target = clean.clone();
        let loaded_documents = Arc::clone(&self.loaded_documents);
        let callback = Arc::clone(&self.document_loaded_callback);
        let target_for_match = target.clone();
        let target_for_visit = target.clone();
        let scanner = Scanner::new(Arc::clone(&self.pool))
            .with_match_document_path(move |p| clean_path(p) == target_for_match)
            .with_visit_document(move |doc| {
                loaded_documents
                    .write()
                    .insert(target_for_visit.clone(), doc.clone());
                Self::fire_loaded(&callback, doc);
            });

        if let Some(index_path) = self.doc_to_index.get(&clean).map(|v| v.clone()) {
            scanner.scan_file(&index_path)?;
        } else {
            scanner.scan_folder(&self.index_folder, false)?;
        }

        Ok(self.loaded_documents.read().get(&clean).cloned())
    }

    /// `None` for local symbols. Scans the whole folder in parallel,
    /// grouping matching occurrences by document.
    pub fn references(&self, symbol: &str) -> IndexResult<Option<HashMap<String, Vec<Occurrence>>>> {
        let parsed = parse_symbol(symbol)?;
        if parsed.is_local() {
            return Ok(None);
        }

        let results = Arc::new(Mutex::new(HashMap::<String, Vec<Occurrence>>::new()));
        let results_for_visit = Arc::clone(&results);
        let target = symbol.to_string();

        let scanner = Scanner::new(Arc::clone(&self.pool))
            .with_max_concurrency(self.max_concurrency)
            .with_match_occurrence(move |sym| sym == target)
            .with_visit_occurrence(move |path, occ| {
                results_for_visit
                    .lock()
                    .entry(path.to_string())
                    .or_default()
                    .push(occ.clone());
            });

        scanner.scan_folder(&self.index_folder, true)?;
        drop(scanner);

        let map = results.lock().clone();
        Ok(Some(map))
    }

    /// Walks the tree by descriptors; falls back to the lexicographically
    /// smallest version key when `version` is unknown at the leaf.
    pub fn get_symbol_information_from_descriptors(
        &self,
        descriptors: &[Descriptor],
        version: &str,
    ) -> IndexResult<(Option<SymbolInformation>, String)> {
        if descriptors.is_empty() {
            return Err(TreeError::EmptyDescriptors.into());
        }
        let tree = self.prefix_tree_root.read();
        let node = match tree.get_node_by_descriptors(descriptors) {
            Some(n) => n,
            None => return Ok((None, String::new())),
        };
        let versions = tree.node_symbol_versions(node);
        if let Some(entry) = versions.get(version) {
            return Ok((entry.info.clone(), entry.document_path.clone()));
        }
        match versions.keys().min() {
            Some(smallest) => {
                let entry = &versions[smallest];
                Ok((entry.info.clone(), entry.document_path.clone()))
            }
            None => Ok((None, String::new())),
        }
    }

    /// Parses then delegates; `(None, "")` for local symbols.
    pub fn get_symbol_information(
        &self,
        symbol: &str,
    ) -> IndexResult<(Option<SymbolInformation>, String)> {
        let parsed = parse_symbol(symbol)?;
        if parsed.is_local() {
            return Ok((None, String::new()));
        }
        self.get_symbol_information_from_descriptors(&parsed.descriptors, &parsed.package.version)
    }

    /// Prunes every node introduced solely for a tracked document at a
    /// revision below its current high-water mark, then clears the
    /// high-water marks.
    pub fn tidy(&self) -> IndexResult<()> {
        let _guard = self.modification.lock();
        let mut tree = self.prefix_tree_root.write();
        let root = tree.root();
        for entry in self.updated_docs.iter() {
            tree.prune(root, entry.key(), *entry.value());
        }
        self.updated_docs.clear();
        Ok(())
    }

    pub fn get_implementation_symbols(&self, symbol: &str) -> Vec<String> {
        match self.implementors_by_symbol.get(symbol) {
            Some(set) => {
                let mut out: Vec<String> = set.iter().cloned().collect();
                out.sort();
                out
            }
            None => Vec::new(),
        }
    }

    pub fn external_symbol(&self, symbol: &str) -> Option<SymbolInformation> {
        self.external_symbols.read().get(symbol).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OccurrenceRoles, Range, Relationship};
    use crate::wire::encode_document;
    use tempfile::TempDir;

    fn write_fixture_index(dir: &Path, file_name: &str) -> PathBuf {
        let occ_def = Occurrence {
            range: Range::SingleLine { line: 0, start_char: 0, end_char: 3 },
            symbol: "scheme mgr name v1 Foo#".to_string(),
            roles: OccurrenceRoles::DEFINITION,
            syntax_kind: None,
            enclosing_range: None,
            override_docs: vec![],
            diagnostics: vec![],
        };
        let occ_ref = Occurrence {
            range: Range::SingleLine { line: 5, start_char: 0, end_char: 3 },
            symbol: "scheme mgr name v1 Foo#".to_string(),
            roles: OccurrenceRoles::READ_ACCESS,
            syntax_kind: None,
            enclosing_range: None,
            override_docs: vec![],
            diagnostics: vec![],
        };
        let info = SymbolInformation {
            symbol: "scheme mgr name v1 Foo#".to_string(),
            display_name: "Foo".to_string(),
            kind: None,
            documentation: vec!["docs for Foo".to_string()],
            relationships: vec![Relationship {
                symbol: "scheme mgr name v1 Abstract#".to_string(),
                is_reference: false,
                is_implementation: true,
                is_type_definition: false,
                is_definition: false,
            }],
            signature_documentation: None,
            enclosing_symbol: None,
        };
        let mut doc = Document::new("src/foo.rs", "rust");
        doc.occurrences.push(occ_def);
        doc.occurrences.push(occ_ref);
        doc.symbols.push(info);

        let doc_bytes = encode_document(&doc);
        let mut top = Vec::new();
        crate::wire::write_tag(&mut top, crate::wire::FIELD_DOCUMENTS, crate::wire::WIRE_LENGTH_DELIMITED);
        crate::wire::write_varint(&mut top, doc_bytes.len() as u64);
        top.extend_from_slice(&doc_bytes);

        let path = dir.join(file_name);
        std::fs::write(&path, &top).unwrap();
        path
    }

    #[test]
    fn load_then_load_document_roundtrips() {
        let dir = TempDir::new().unwrap();
        let index_path = write_fixture_index(dir.path(), "a.scip");
        let index = PartialIndex::new(dir.path());
        index.load_index_file(&index_path).unwrap();

        let doc = index.load_document("src/foo.rs").unwrap().unwrap();
        assert_eq!(doc.relative_path, "src/foo.rs");
        assert_eq!(doc.occurrences.len(), 2);
    }

    #[test]
    fn get_symbol_information_resolves_by_descriptors() {
        let dir = TempDir::new().unwrap();
        let index_path = write_fixture_index(dir.path(), "a.scip");
        let index = PartialIndex::new(dir.path());
        index.load_index_file(&index_path).unwrap();

        let (info, doc_path) = index
            .get_symbol_information("scheme mgr name v1 Foo#")
            .unwrap();
        assert_eq!(info.unwrap().display_name, "Foo");
        assert_eq!(doc_path, "src/foo.rs");
    }

    #[test]
    fn references_groups_by_document() {
        let dir = TempDir::new().unwrap();
        let index_path = write_fixture_index(dir.path(), "a.scip");
        let index = PartialIndex::new(dir.path());
        index.load_index_file(&index_path).unwrap();

        let refs = index
            .references("scheme mgr name v1 Foo#")
            .unwrap()
            .unwrap();
        assert_eq!(refs["src/foo.rs"].len(), 2);
    }

    #[test]
    fn implementation_reverse_index_resolves() {
        let dir = TempDir::new().unwrap();
        let index_path = write_fixture_index(dir.path(), "a.scip");
        let index = PartialIndex::new(dir.path());
        index.load_index_file(&index_path).unwrap();

        let implementors = index.get_implementation_symbols("scheme mgr name v1 Abstract#");
        assert_eq!(implementors, vec!["scheme mgr name v1 Foo#".to_string()]);
    }

    #[test]
    fn tidy_prunes_stale_nodes_for_reloaded_document() {
        let dir = TempDir::new().unwrap();
        let index_path = write_fixture_index(dir.path(), "a.scip");
        let index = PartialIndex::new(dir.path());
        index.load_index_file(&index_path).unwrap();
        // Reload bumps the document's revision; tidy should not remove the
        // still-current node (revision is never below the high-water mark
        // immediately after a load).
        index.load_index_file(&index_path).unwrap();
        index.tidy().unwrap();

        let (info, _) = index
            .get_symbol_information("scheme mgr name v1 Foo#")
            .unwrap();
        assert!(info.is_some());
    }

    #[test]
    fn empty_descriptors_is_an_error() {
        let dir = TempDir::new().unwrap();
        let index = PartialIndex::new(dir.path());
        let err = index
            .get_symbol_information_from_descriptors(&[], "v1")
            .unwrap_err();
        assert!(matches!(err, IndexError::Tree(TreeError::EmptyDescriptors)));
    }
}
