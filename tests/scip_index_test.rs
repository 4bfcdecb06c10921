//! End-to-end exercises over `PartialIndex` + `QueryRegistry`, built from
//! small synthetic `.scip` byte streams (`spec.md` §8 concrete scenarios).

use scip_index::types::{
    Descriptor, DescriptorSuffix, Document, Occurrence, OccurrenceRoles, Position, Range,
    Relationship, SymbolInformation,
};
use scip_index::wire::{encode_document, write_tag, write_varint};
use scip_index::{PartialIndex, QueryRegistry};
use std::sync::Arc;
use tempfile::TempDir;

const FIELD_DOCUMENTS: u64 = 2;
const WIRE_LENGTH_DELIMITED: u64 = 2;

fn write_scip_file(dir: &std::path::Path, file_name: &str, docs: &[Document]) -> std::path::PathBuf {
    let mut bytes = Vec::new();
    for doc in docs {
        let doc_bytes = encode_document(doc);
        write_tag(&mut bytes, FIELD_DOCUMENTS, WIRE_LENGTH_DELIMITED);
        write_varint(&mut bytes, doc_bytes.len() as u64);
        bytes.extend_from_slice(&doc_bytes);
    }
    let path = dir.join(file_name);
    std::fs::write(&path, &bytes).unwrap();
    path
}

fn occ(line: u32, start: u32, end: u32, symbol: &str, roles: OccurrenceRoles) -> Occurrence {
    Occurrence {
        range: Range::SingleLine {
            line,
            start_char: start,
            end_char: end,
        },
        symbol: symbol.to_string(),
        roles,
        syntax_kind: None,
        enclosing_range: None,
        override_docs: vec![],
        diagnostics: vec![],
    }
}

fn symbol_info(symbol: &str, display_name: &str, relationships: Vec<Relationship>) -> SymbolInformation {
    SymbolInformation {
        symbol: symbol.to_string(),
        display_name: display_name.to_string(),
        kind: None,
        documentation: vec![],
        relationships,
        signature_documentation: None,
        enclosing_symbol: None,
    }
}

/// Scenario 5: references of a known symbol total 6 occurrences across two
/// documents, grouped by document.
#[test]
fn references_total_count_matches_six() {
    let symbol = "scip-go gomod github.com/opentracing/opentracing-go 1.2.0 `github.com/opentracing/opentracing-go`/Span#SetTag.";

    let mut doc_a = Document::new("src/a.go", "go");
    doc_a.occurrences.push(occ(0, 0, 6, symbol, OccurrenceRoles::DEFINITION));
    doc_a.occurrences.push(occ(4, 0, 6, symbol, OccurrenceRoles::READ_ACCESS));
    doc_a.occurrences.push(occ(8, 0, 6, symbol, OccurrenceRoles::READ_ACCESS));
    doc_a.occurrences.push(occ(12, 0, 6, symbol, OccurrenceRoles::READ_ACCESS));
    doc_a.symbols.push(symbol_info(symbol, "SetTag", vec![]));

    let mut doc_b = Document::new("src/b.go", "go");
    doc_b.occurrences.push(occ(1, 0, 6, symbol, OccurrenceRoles::READ_ACCESS));
    doc_b.occurrences.push(occ(2, 0, 6, symbol, OccurrenceRoles::READ_ACCESS));

    let dir = TempDir::new().unwrap();
    let index_path = write_scip_file(dir.path(), "tracing.scip", &[doc_a, doc_b]);

    let index = PartialIndex::new(dir.path());
    index.load_index_file(&index_path).unwrap();

    let grouped = index.references(symbol).unwrap().unwrap();
    let total: usize = grouped.values().map(|v| v.len()).sum();
    assert_eq!(total, 6);
    assert_eq!(grouped["src/a.go"].len(), 4);
    assert_eq!(grouped["src/b.go"].len(), 2);
}

/// Scenario 6: an abstract symbol's reverse implementors index resolves to
/// the implementor's own definition occurrence.
#[test]
fn implementation_resolves_through_reverse_index() {
    let abstract_symbol = "scheme mgr pkg v1 Abstract#";
    let impl_symbol = "scheme mgr pkg v1 Concrete#";

    let mut doc = Document::new("src/lib.rs", "rust");
    doc.occurrences.push(occ(2, 0, 8, abstract_symbol, OccurrenceRoles::READ_ACCESS));
    doc.occurrences.push(occ(0, 0, 8, impl_symbol, OccurrenceRoles::DEFINITION));
    doc.symbols.push(symbol_info(abstract_symbol, "Abstract", vec![]));
    doc.symbols.push(symbol_info(
        impl_symbol,
        "Concrete",
        vec![Relationship {
            symbol: abstract_symbol.to_string(),
            is_reference: false,
            is_implementation: true,
            is_type_definition: false,
            is_definition: false,
        }],
    ));

    let dir = TempDir::new().unwrap();
    let index_path = write_scip_file(dir.path(), "lib.scip", &[doc]);

    let index = Arc::new(PartialIndex::new(dir.path()));
    index.load_index_file(&index_path).unwrap();

    assert_eq!(
        index.get_implementation_symbols(abstract_symbol),
        vec![impl_symbol.to_string()]
    );

    let registry = QueryRegistry::new(Arc::clone(&index), dir.path());
    let uri = registry.get_uri("src/lib.rs");

    let locations = registry
        .implementation(&uri, Position { line: 2, character: 3 })
        .unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].range.unwrap().start_line(), 0);
}

/// Loading an empty folder succeeds without visiting anything, and queries
/// against it come back empty rather than erroring.
#[test]
fn empty_folder_load_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let index = PartialIndex::new(dir.path());
    index.load_index_folder(false).unwrap();
    assert_eq!(index.load_document("src/missing.rs").unwrap(), None);
}

/// A multi-line occurrence range (4 wire components) round-trips through
/// encode/decode and definition lookup.
#[test]
fn multi_line_range_round_trips_through_definition() {
    let symbol = "scheme mgr pkg v1 Wide#";
    let mut doc = Document::new("src/wide.rs", "rust");
    doc.occurrences.push(Occurrence {
        range: Range::MultiLine {
            start_line: 3,
            start_char: 4,
            end_line: 5,
            end_char: 1,
        },
        symbol: symbol.to_string(),
        roles: OccurrenceRoles::DEFINITION,
        syntax_kind: None,
        enclosing_range: None,
        override_docs: vec![],
        diagnostics: vec![],
    });
    doc.symbols.push(symbol_info(symbol, "Wide", vec![]));

    let dir = TempDir::new().unwrap();
    let index_path = write_scip_file(dir.path(), "wide.scip", &[doc]);
    let index = Arc::new(PartialIndex::new(dir.path()));
    index.load_index_file(&index_path).unwrap();

    let registry = QueryRegistry::new(Arc::clone(&index), dir.path());
    let uri = registry.get_uri("src/wide.rs");

    let (_, definition) = registry
        .definition(&uri, Position { line: 4, character: 0 })
        .unwrap()
        .unwrap();
    let def = definition.unwrap();
    assert_eq!(def.symbol_information.unwrap().display_name, "Wide");
}

#[test]
fn descriptor_fallback_resolves_unknown_version() {
    let symbol = "scheme mgr pkg 0f67d80e `code.uber.internal/devexp/test_management/tracing`/";
    let mut doc = Document::new(
        "src/code.uber.internal/devexp/test_management/tracing/span.go",
        "go",
    );
    doc.occurrences.push(occ(0, 0, 4, symbol, OccurrenceRoles::DEFINITION));
    doc.symbols.push(symbol_info(symbol, "tracing", vec![]));

    let dir = TempDir::new().unwrap();
    let index_path = write_scip_file(dir.path(), "span.scip", &[doc]);
    let index = PartialIndex::new(dir.path());
    index.load_index_file(&index_path).unwrap();

    let descriptors = vec![Descriptor {
        name: "code.uber.internal/devexp/test_management/tracing".to_string(),
        suffix: DescriptorSuffix::Namespace,
        disambiguator: String::new(),
    }];
    let (info, doc_path) = index
        .get_symbol_information_from_descriptors(&descriptors, "unknown-version-1")
        .unwrap();
    assert_eq!(
        doc_path,
        "src/code.uber.internal/devexp/test_management/tracing/span.go"
    );
    assert_eq!(info.unwrap().symbol, symbol);
}
