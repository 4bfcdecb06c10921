//! Language-server-facing query registry: definition, references, hover,
//! document-symbols, implementation. Owns URI↔relative-path mapping and
//! local-vs-global symbol dispatch; layered entirely on top of
//! [`crate::index::PartialIndex`].

use crate::error::{IndexError, IndexResult};
use crate::index::PartialIndex;
use crate::mapper::{rel_to_uri, uri_to_rel};
use crate::symbol::parse_symbol;
use crate::types::{Location, Occurrence, Position, SymbolOccurrence};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct QueryRegistry {
    index: Arc<PartialIndex>,
    workspace_root: PathBuf,
}

impl QueryRegistry {
    pub fn new(index: Arc<PartialIndex>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            index,
            workspace_root: workspace_root.into(),
        }
    }

    pub fn get_uri(&self, rel_path: &str) -> String {
        rel_to_uri(&self.workspace_root, rel_path)
    }

    fn rel(&self, uri: &str) -> String {
        uri_to_rel(&self.workspace_root, uri)
    }

    pub fn did_open(&self, uri: &str, _text: &str) -> IndexResult<()> {
        let rel = self.rel(uri);
        match self.index.load_document(&rel) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(target: "registry", uri, "did_open failed: {e}");
                Err(e)
            }
        }
    }

    pub fn did_close(&self, _uri: &str) -> IndexResult<()> {
        Ok(())
    }

    pub fn definition(
        &self,
        uri: &str,
        pos: Position,
    ) -> IndexResult<Option<(SymbolOccurrence, Option<SymbolOccurrence>)>> {
        debug!(target: "registry", uri, line = pos.line, character = pos.character, "definition");
        let rel = self.rel(uri);
        let doc = match self.index.load_document(&rel)? {
            Some(d) => d,
            None => return Ok(None),
        };
        let source_occ = match occurrence_for_position(&doc.occurrences, pos) {
            Some(o) => o.clone(),
            None => return Ok(None),
        };

        let source = SymbolOccurrence {
            symbol_information: doc.symbol_map.get(&source_occ.symbol).cloned(),
            location: Location {
                uri: uri.to_string(),
                range: Some(source_occ.range),
            },
            occurrence: Some(source_occ.clone()),
        };

        let parsed = parse_symbol(&source_occ.symbol)?;
        if parsed.is_local() {
            let def_occ = doc
                .occurrences
                .iter()
                .find(|o| o.symbol == source_occ.symbol && o.is_definition())
                .cloned();
            let def_info = doc.symbol_map.get(&source_occ.symbol).cloned();
            let definition = if def_occ.is_none() && def_info.is_none() {
                None
            } else {
                Some(SymbolOccurrence {
                    symbol_information: def_info,
                    location: Location {
                        uri: uri.to_string(),
                        range: def_occ.as_ref().map(|o| o.range),
                    },
                    occurrence: def_occ,
                })
            };
            return Ok(Some((source, definition)));
        }

        let definition = self
            .get_symbol_definition_occurrence(&parsed.descriptors, &parsed.package.version)?;
        Ok(Some((source, definition)))
    }

    /// Resolve a symbol's own definition occurrence, given its descriptor
    /// chain and version (the fallback from `spec.md` §4.E already applies
    /// inside `get_symbol_information_from_descriptors`).
    pub fn get_symbol_definition_occurrence(
        &self,
        descriptors: &[crate::types::Descriptor],
        version: &str,
    ) -> IndexResult<Option<SymbolOccurrence>> {
        let (info, def_doc_path) = self
            .index
            .get_symbol_information_from_descriptors(descriptors, version)?;
        let info = match info {
            Some(i) => i,
            None => return Ok(None),
        };
        if def_doc_path.is_empty() {
            return Ok(Some(SymbolOccurrence {
                symbol_information: Some(info),
                location: Location { uri: String::new(), range: None },
                occurrence: None,
            }));
        }
        let doc = self.index.load_document(&def_doc_path)?;
        let occurrence = doc.as_ref().and_then(|d| {
            d.occurrences
                .iter()
                .find(|o| o.is_definition() && o.symbol == info.symbol)
                .cloned()
        });
        Ok(Some(SymbolOccurrence {
            symbol_information: Some(info),
            location: Location {
                uri: self.get_uri(&def_doc_path),
                range: occurrence.as_ref().map(|o| o.range),
            },
            occurrence,
        }))
    }

    pub fn references(&self, uri: &str, pos: Position) -> IndexResult<Vec<Location>> {
        let rel = self.rel(uri);
        let doc = match self.index.load_document(&rel)? {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };
        let source_occ = match occurrence_for_position(&doc.occurrences, pos) {
            Some(o) => o.clone(),
            None => return Ok(Vec::new()),
        };

        let parsed = parse_symbol(&source_occ.symbol)?;
        if parsed.is_local() {
            let locs = doc
                .occurrences
                .iter()
                .filter(|o| o.symbol == source_occ.symbol)
                .map(|o| Location {
                    uri: uri.to_string(),
                    range: Some(o.range),
                })
                .collect();
            return Ok(locs);
        }

        let grouped = self.index.references(&source_occ.symbol)?.unwrap_or_default();
        let mut locations = Vec::new();
        for (path, occurrences) in grouped {
            let file_uri = self.get_uri(&path);
            for occ in occurrences {
                locations.push(Location {
                    uri: file_uri.clone(),
                    range: Some(occ.range),
                });
            }
        }
        Ok(locations)
    }

    pub fn hover(&self, uri: &str, pos: Position) -> IndexResult<Option<(String, Occurrence)>> {
        let rel = self.rel(uri);
        let doc = match self.index.load_document(&rel)? {
            Some(d) => d,
            None => return Ok(None),
        };
        let occ = match occurrence_for_position(&doc.occurrences, pos) {
            Some(o) => o.clone(),
            None => return Ok(None),
        };

        if !occ.override_docs.is_empty() {
            return Ok(Some((occ.override_docs.join("\n"), occ)));
        }
        if let Some(info) = doc.symbol_map.get(&occ.symbol) {
            if !info.documentation.is_empty() {
                return Ok(Some((info.documentation.join("\n"), occ)));
            }
            if let Some(sig) = &info.signature_documentation {
                if let Some(text) = &sig.text {
                    if !text.is_empty() {
                        return Ok(Some((text.clone(), occ)));
                    }
                }
            }
        }
        Ok(Some((String::new(), occ)))
    }

    pub fn document_symbols(&self, uri: &str) -> IndexResult<Vec<SymbolOccurrence>> {
        let rel = self.rel(uri);
        let doc = match self.index.load_document(&rel)? {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        for occ in &doc.occurrences {
            if !occ.is_definition() {
                continue;
            }
            let parsed = match parse_symbol(&occ.symbol) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if parsed.is_local() {
                continue;
            }
            let mut info = doc.symbol_map.get(&occ.symbol).cloned();
            if let Some(info) = &mut info {
                if info.display_name.is_empty() {
                    info.display_name = crate::symbol::display_name(&occ.symbol);
                }
            }
            out.push(SymbolOccurrence {
                symbol_information: info,
                location: Location {
                    uri: uri.to_string(),
                    range: Some(occ.range),
                },
                occurrence: Some(occ.clone()),
            });
        }
        Ok(out)
    }

    pub fn implementation(&self, uri: &str, pos: Position) -> IndexResult<Vec<Location>> {
        let rel = self.rel(uri);
        let doc = match self.index.load_document(&rel)? {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };
        let occ = match occurrence_for_position(&doc.occurrences, pos) {
            Some(o) => o.clone(),
            None => return Ok(Vec::new()),
        };

        let fast = self.index.get_implementation_symbols(&occ.symbol);
        if !fast.is_empty() {
            return self.resolve_implementor_locations(&fast);
        }

        let (info, _) = self.index.get_symbol_information(&occ.symbol)?;
        let info = match info {
            Some(i) => i,
            None => return Ok(Vec::new()),
        };
        let implementors: Vec<String> = info
            .relationships
            .iter()
            .filter(|r| r.is_implementation)
            .map(|r| r.symbol.clone())
            .collect();
        self.resolve_implementor_locations(&implementors)
    }

    fn resolve_implementor_locations(&self, symbols: &[String]) -> IndexResult<Vec<Location>> {
        let mut out = Vec::new();
        for symbol in symbols {
            let parsed = parse_symbol(symbol)?;
            if parsed.is_local() {
                continue;
            }
            if let Some(occ) = self
                .get_symbol_definition_occurrence(&parsed.descriptors, &parsed.package.version)?
            {
                out.push(occ.location);
            }
        }
        Ok(out)
    }

    /// Unsupported by this lazy backend; a future backend could populate it
    /// from the occurrence-embedded diagnostic records directly.
    pub fn diagnostics(&self, _uri: &str) -> IndexResult<Vec<crate::types::Diagnostic>> {
        Err(IndexError::NotImplemented {
            operation: "diagnostics".to_string(),
        })
    }
}

/// Binary search over occurrences sorted by start position (`spec.md`
/// §4.F "Algorithm"). Returns an occurrence containing `pos` if one
/// exists, never a non-containing one.
pub fn occurrence_for_position(occurrences: &[Occurrence], pos: Position) -> Option<&Occurrence> {
    if occurrences.is_empty() {
        return None;
    }
    let mut lo: i64 = 0;
    let mut hi: i64 = occurrences.len() as i64 - 1;
    while lo <= hi {
        let mid = ((lo + hi) / 2) as usize;
        let occ = &occurrences[mid];
        if occ.range.contains_position(pos.line, pos.character) {
            return Some(occ);
        } else if occ.range.ends_before(pos.line, pos.character) {
            lo = mid as i64 + 1;
        } else {
            hi = mid as i64 - 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OccurrenceRoles, Range};
    use crate::wire::encode_document;
    use tempfile::TempDir;

    fn occ(line: u32, start: u32, end: u32, symbol: &str, roles: OccurrenceRoles) -> Occurrence {
        Occurrence {
            range: Range::SingleLine { line, start_char: start, end_char: end },
            symbol: symbol.to_string(),
            roles,
            syntax_kind: None,
            enclosing_range: None,
            override_docs: vec![],
            diagnostics: vec![],
        }
    }

    #[test]
    fn occurrence_for_position_finds_containing_range() {
        let occs = vec![
            occ(1, 0, 3, "a", OccurrenceRoles::empty()),
            occ(5, 0, 3, "b", OccurrenceRoles::empty()),
            occ(10, 0, 3, "c", OccurrenceRoles::empty()),
        ];
        let found = occurrence_for_position(&occs, Position { line: 5, character: 2 }).unwrap();
        assert_eq!(found.symbol, "b");
    }

    #[test]
    fn occurrence_for_position_returns_none_between_ranges() {
        let occs = vec![occ(1, 0, 3, "a", OccurrenceRoles::empty()), occ(5, 0, 3, "b", OccurrenceRoles::empty())];
        assert!(occurrence_for_position(&occs, Position { line: 3, character: 0 }).is_none());
    }

    fn setup_index(dir: &std::path::Path) -> (Arc<PartialIndex>, PathBuf) {
        let def = occ(0, 0, 3, "scheme mgr name v1 Foo#", OccurrenceRoles::DEFINITION);
        let usage = occ(4, 0, 3, "scheme mgr name v1 Foo#", OccurrenceRoles::READ_ACCESS);
        let info = crate::types::SymbolInformation {
            symbol: "scheme mgr name v1 Foo#".to_string(),
            display_name: "Foo".to_string(),
            kind: None,
            documentation: vec!["Foo docs".to_string()],
            relationships: vec![],
            signature_documentation: None,
            enclosing_symbol: None,
        };
        let mut doc = crate::types::Document::new("src/foo.rs", "rust");
        doc.occurrences.push(def);
        doc.occurrences.push(usage);
        doc.symbols.push(info);

        let doc_bytes = encode_document(&doc);
        let mut top = Vec::new();
        crate::wire::write_tag(&mut top, crate::wire::FIELD_DOCUMENTS, crate::wire::WIRE_LENGTH_DELIMITED);
        crate::wire::write_varint(&mut top, doc_bytes.len() as u64);
        top.extend_from_slice(&doc_bytes);

        let index_path = dir.join("a.scip");
        std::fs::write(&index_path, &top).unwrap();

        let index = Arc::new(PartialIndex::new(dir));
        index.load_index_file(&index_path).unwrap();
        (index, dir.to_path_buf())
    }

    #[test]
    fn definition_resolves_global_symbol() {
        let dir = TempDir::new().unwrap();
        let (index, root) = setup_index(dir.path());
        let registry = QueryRegistry::new(index, root.clone());
        let uri = registry.get_uri("src/foo.rs");

        let (source, definition) = registry
            .definition(&uri, Position { line: 4, character: 1 })
            .unwrap()
            .unwrap();
        assert_eq!(source.occurrence.unwrap().range.start_line(), 4);
        let def = definition.unwrap();
        assert_eq!(def.occurrence.unwrap().range.start_line(), 0);
        assert_eq!(def.symbol_information.unwrap().display_name, "Foo");
    }

    #[test]
    fn hover_uses_symbol_documentation() {
        let dir = TempDir::new().unwrap();
        let (index, root) = setup_index(dir.path());
        let registry = QueryRegistry::new(index, root);
        let uri = registry.get_uri("src/foo.rs");

        let (docs, occ) = registry
            .hover(&uri, Position { line: 0, character: 1 })
            .unwrap()
            .unwrap();
        assert_eq!(docs, "Foo docs");
        assert_eq!(occ.range.start_line(), 0);
    }

    #[test]
    fn document_symbols_lists_global_definitions() {
        let dir = TempDir::new().unwrap();
        let (index, root) = setup_index(dir.path());
        let registry = QueryRegistry::new(index, root);
        let uri = registry.get_uri("src/foo.rs");

        let symbols = registry.document_symbols(&uri).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].symbol_information.as_ref().unwrap().display_name, "Foo");
    }

    #[test]
    fn diagnostics_is_not_implemented() {
        let dir = TempDir::new().unwrap();
        let (index, root) = setup_index(dir.path());
        let registry = QueryRegistry::new(index, root);
        let uri = registry.get_uri("src/foo.rs");
        let err = registry.diagnostics(&uri).unwrap_err();
        assert!(matches!(err, IndexError::NotImplemented { .. }));
    }
}
