//! Streaming, allocation-frugal wire-format scanner.
//!
//! The container format is a sequence of `<tag><varint-length><bytes>`
//! records (`spec.md` §6): a tag byte(s) encoding `(field_number, wire_type)`,
//! a varint payload length, and exactly that many payload bytes. Only
//! length-delimited fields carry data of interest; every other wire type is
//! skipped by consuming its encoded length without allocating.
//!
//! The scanner never decodes an occurrence or symbol whose moniker doesn't
//! match a configured predicate — monikers are extracted with a cheap
//! sub-scan that copies only the moniker bytes, reusing one pooled buffer
//! per top-level document record.

mod decode;
mod encode;

pub use decode::{extract_document_path, extract_occurrence_symbol, extract_symbol_moniker};
pub use encode::{
    encode_diagnostic, encode_document, encode_metadata, encode_occurrence, encode_relationship,
    encode_symbol_information, write_tag, write_varint,
};

use crate::buffer::BufferPool;
use crate::error::ScannerError;
use crate::types::{Document, Occurrence, SymbolInformation};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

pub(crate) const FIELD_METADATA: u64 = 1;
pub(crate) const FIELD_DOCUMENTS: u64 = 2;
pub(crate) const FIELD_EXTERNAL_SYMBOLS: u64 = 3;

pub(crate) const DOC_FIELD_RELATIVE_PATH: u64 = 1;
pub(crate) const DOC_FIELD_OCCURRENCES: u64 = 2;
pub(crate) const DOC_FIELD_SYMBOLS: u64 = 3;
pub(crate) const DOC_FIELD_LANGUAGE: u64 = 4;

pub(crate) const OCC_FIELD_RANGE: u64 = 1;
pub(crate) const OCC_FIELD_SYMBOL: u64 = 2;
pub(crate) const OCC_FIELD_ROLES: u64 = 3;
pub(crate) const OCC_FIELD_SYNTAX_KIND: u64 = 4;
pub(crate) const OCC_FIELD_OVERRIDE_DOCS: u64 = 5;
pub(crate) const OCC_FIELD_DIAGNOSTICS: u64 = 6;
pub(crate) const OCC_FIELD_ENCLOSING_RANGE: u64 = 7;

pub(crate) const SYM_FIELD_SYMBOL: u64 = 1;
pub(crate) const SYM_FIELD_DISPLAY_NAME: u64 = 2;
pub(crate) const SYM_FIELD_KIND: u64 = 3;
pub(crate) const SYM_FIELD_DOCUMENTATION: u64 = 4;
pub(crate) const SYM_FIELD_RELATIONSHIPS: u64 = 5;
pub(crate) const SYM_FIELD_SIGNATURE_DOC: u64 = 6;
pub(crate) const SYM_FIELD_ENCLOSING_SYMBOL: u64 = 7;

pub(crate) const REL_FIELD_SYMBOL: u64 = 1;
pub(crate) const REL_FIELD_IS_REFERENCE: u64 = 2;
pub(crate) const REL_FIELD_IS_IMPLEMENTATION: u64 = 3;
pub(crate) const REL_FIELD_IS_TYPE_DEFINITION: u64 = 4;
pub(crate) const REL_FIELD_IS_DEFINITION: u64 = 5;

pub(crate) const DIAG_FIELD_RANGE: u64 = 1;
pub(crate) const DIAG_FIELD_SEVERITY: u64 = 2;
pub(crate) const DIAG_FIELD_MESSAGE: u64 = 3;
pub(crate) const DIAG_FIELD_SOURCE: u64 = 4;

pub(crate) const WIRE_VARINT: u64 = 0;
pub(crate) const WIRE_FIXED64: u64 = 1;
pub(crate) const WIRE_LENGTH_DELIMITED: u64 = 2;
pub(crate) const WIRE_FIXED32: u64 = 5;

type MatchDocumentPath = dyn Fn(&str) -> bool + Send + Sync;
type VisitDocument = dyn Fn(&Document) + Send + Sync;
type MatchSymbol = dyn Fn(&str) -> bool + Send + Sync;
type VisitSymbol = dyn Fn(&str, &SymbolInformation) + Send + Sync;
type MatchOccurrence = dyn Fn(&str) -> bool + Send + Sync;
type VisitOccurrence = dyn Fn(&str, &Occurrence) + Send + Sync;
type VisitMetadata = dyn Fn(&[u8]) + Send + Sync;

/// Configures the match/visit hooks driving a single scan, and owns the
/// buffer pool used while scanning.
#[derive(Clone, Default)]
pub struct Scanner {
    pool: Option<Arc<BufferPool>>,
    match_document_path: Option<Arc<MatchDocumentPath>>,
    visit_document: Option<Arc<VisitDocument>>,
    match_symbol: Option<Arc<MatchSymbol>>,
    visit_symbol: Option<Arc<VisitSymbol>>,
    match_occurrence: Option<Arc<MatchOccurrence>>,
    visit_occurrence: Option<Arc<VisitOccurrence>>,
    visit_metadata: Option<Arc<VisitMetadata>>,
    max_concurrency: usize,
}

impl Scanner {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            pool: Some(pool),
            max_concurrency: num_cpus::get(),
            ..Default::default()
        }
    }

    pub fn with_match_document_path(
        mut self,
        f: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.match_document_path = Some(Arc::new(f));
        self
    }

    pub fn with_visit_document(mut self, f: impl Fn(&Document) + Send + Sync + 'static) -> Self {
        self.visit_document = Some(Arc::new(f));
        self
    }

    pub fn with_match_symbol(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.match_symbol = Some(Arc::new(f));
        self
    }

    pub fn with_visit_symbol(
        mut self,
        f: impl Fn(&str, &SymbolInformation) + Send + Sync + 'static,
    ) -> Self {
        self.visit_symbol = Some(Arc::new(f));
        self
    }

    pub fn with_match_occurrence(
        mut self,
        f: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.match_occurrence = Some(Arc::new(f));
        self
    }

    pub fn with_visit_occurrence(
        mut self,
        f: impl Fn(&str, &Occurrence) + Send + Sync + 'static,
    ) -> Self {
        self.visit_occurrence = Some(Arc::new(f));
        self
    }

    pub fn with_visit_metadata(mut self, f: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        self.visit_metadata = Some(Arc::new(f));
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    fn pool(&self) -> Arc<BufferPool> {
        self.pool.clone().unwrap_or_else(|| Arc::new(BufferPool::with_defaults()))
    }

    /// Iterate top-level records. For each `documents` record, sub-scan the
    /// relative path, optionally fully decode and visit it, then always
    /// hand it to `scan_document`.
    pub fn scan_index<R: Read>(&self, reader: &mut R) -> Result<(), ScannerError> {
        let pool = self.pool();
        loop {
            let tag = match decode::read_varint_opt(reader)? {
                Some(t) => t,
                None => return Ok(()), // clean end of stream
            };
            let field_number = tag >> 3;
            let wire_type = tag & 0x7;

            if wire_type != WIRE_LENGTH_DELIMITED {
                decode::skip_non_delimited(reader, wire_type)?;
                continue;
            }
            let len = decode::read_varint(reader)?;
            let len = usize::try_from(len).map_err(|_| ScannerError::Truncated {
                expected: len,
                available: 0,
            })?;

            let mut buffer = pool.get(len);
            decode::read_exact_tracked(reader, &mut buffer)?;

            match field_number {
                FIELD_DOCUMENTS => {
                    let path = extract_document_path(&buffer)?;
                    let should_decode = self
                        .match_document_path
                        .as_ref()
                        .map(|f| f(&path))
                        .unwrap_or(false);
                    if should_decode && self.visit_document.is_some() {
                        let doc = decode::decode_document(&path, &buffer)?;
                        if let Some(visit) = &self.visit_document {
                            visit(&doc);
                        }
                    }
                    self.scan_document(&path, &mut std::io::Cursor::new(&buffer[..]))?;
                }
                FIELD_METADATA => {
                    if let Some(visit) = &self.visit_metadata {
                        visit(&buffer);
                    }
                }
                FIELD_EXTERNAL_SYMBOLS => {
                    // Concatenated length-delimited SymbolInformation entries.
                    let mut cursor = std::io::Cursor::new(&buffer[..]);
                    while let Some(sub_len) = decode::read_varint_opt(&mut cursor)? {
                        let sub_len = usize::try_from(sub_len).unwrap_or(0);
                        let mut sub = vec![0u8; sub_len];
                        decode::read_exact_tracked(&mut cursor, &mut sub)?;
                        let info = decode::decode_symbol_information(&sub)?;
                        if let Some(visit) = &self.visit_symbol {
                            visit("", &info);
                        }
                    }
                }
                _ => { /* unknown top-level field, already fully consumed as bytes */ }
            }

            pool.put(buffer);
        }
    }

    /// Iterate records within a single document's already-buffered bytes.
    pub fn scan_document<R: Read>(&self, path: &str, reader: &mut R) -> Result<(), ScannerError> {
        loop {
            let tag = match decode::read_varint_opt(reader)? {
                Some(t) => t,
                None => return Ok(()),
            };
            let field_number = tag >> 3;
            let wire_type = tag & 0x7;
            if wire_type != WIRE_LENGTH_DELIMITED {
                decode::skip_non_delimited(reader, wire_type)?;
                continue;
            }
            let len = decode::read_varint(reader)?;
            let len = usize::try_from(len).unwrap_or(0);
            let mut buffer = vec![0u8; len];
            decode::read_exact_tracked(reader, &mut buffer)?;

            match field_number {
                DOC_FIELD_SYMBOLS => {
                    let moniker = extract_symbol_moniker(&buffer)?;
                    let should_decode = self
                        .match_symbol
                        .as_ref()
                        .map(|f| f(&moniker))
                        .unwrap_or(false);
                    if should_decode {
                        if let Some(visit) = &self.visit_symbol {
                            let info = decode::decode_symbol_information(&buffer)?;
                            visit(path, &info);
                        }
                    }
                }
                DOC_FIELD_OCCURRENCES => {
                    let moniker = extract_occurrence_symbol(&buffer)?;
                    let should_decode = self
                        .match_occurrence
                        .as_ref()
                        .map(|f| f(&moniker))
                        .unwrap_or(false);
                    if should_decode {
                        if let Some(visit) = &self.visit_occurrence {
                            let occ = decode::decode_occurrence(&buffer)?;
                            visit(path, &occ);
                        }
                    }
                }
                DOC_FIELD_RELATIVE_PATH | DOC_FIELD_LANGUAGE => { /* already skipped via read */ }
                _ => {}
            }
        }
    }

    pub fn scan_file(&self, path: &Path) -> Result<(), ScannerError> {
        let file = File::open(path).map_err(|source| ScannerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        self.scan_index(&mut reader)
    }

    /// Enumerate `.scip` files under `folder`. Sequential mode preserves
    /// directory-entry order; parallel mode bounds concurrency by
    /// `max_concurrency` and always drains every file, aggregating
    /// per-file failures.
    pub fn scan_folder(&self, folder: &Path, parallel: bool) -> Result<(), ScannerError> {
        let files = collect_scip_files(folder);
        if parallel {
            self.scan_folder_parallel(&files)
        } else {
            for file in &files {
                self.scan_file(file)?;
            }
            Ok(())
        }
    }

    fn scan_folder_parallel(&self, files: &[std::path::PathBuf]) -> Result<(), ScannerError> {
        use rayon::prelude::*;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_concurrency)
            .build()
            .map_err(|e| ScannerError::DecodeWire {
                reason: format!("failed to build scan thread pool: {e}"),
            })?;

        let errors: Vec<ScannerError> = pool.install(|| {
            files
                .par_iter()
                .filter_map(|file| self.scan_file(file).err())
                .collect()
        });

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ScannerError::Aggregate(errors))
        }
    }
}

pub(crate) fn collect_scip_files(folder: &Path) -> Vec<std::path::PathBuf> {
    walkdir::WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|ext| ext == "scip").unwrap_or(false))
        .map(|e| e.path().to_path_buf())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OccurrenceRoles, Range};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn sample_index_bytes() -> Vec<u8> {
        let occ = Occurrence {
            range: Range::SingleLine { line: 1, start_char: 0, end_char: 5 },
            symbol: "scheme mgr name ver foo#".to_string(),
            roles: OccurrenceRoles::DEFINITION,
            syntax_kind: None,
            enclosing_range: None,
            override_docs: vec![],
            diagnostics: vec![],
        };
        let info = SymbolInformation {
            symbol: "scheme mgr name ver foo#".to_string(),
            display_name: "foo".to_string(),
            kind: None,
            documentation: vec!["docs".to_string()],
            relationships: vec![],
            signature_documentation: None,
            enclosing_symbol: None,
        };
        let mut doc = Document::new("src/foo.rs", "rust");
        doc.occurrences.push(occ);
        doc.symbols.push(info);

        let doc_bytes = encode_document(&doc);
        let mut top = Vec::new();
        encode::write_tag(&mut top, FIELD_DOCUMENTS, WIRE_LENGTH_DELIMITED);
        encode::write_varint(&mut top, doc_bytes.len() as u64);
        top.extend_from_slice(&doc_bytes);
        top
    }

    #[test]
    fn scan_index_visits_matching_document() {
        let bytes = sample_index_bytes();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let scanner = Scanner::new(Arc::new(BufferPool::with_defaults()))
            .with_match_document_path(|_| true)
            .with_visit_document(move |doc| seen2.lock().push(doc.relative_path.clone()));
        scanner.scan_index(&mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(seen.lock().as_slice(), ["src/foo.rs"]);
    }

    #[test]
    fn scan_index_skips_non_matching_symbols_and_occurrences() {
        let bytes = sample_index_bytes();
        let sym_visits = Arc::new(Mutex::new(0usize));
        let occ_visits = Arc::new(Mutex::new(0usize));
        let sv = Arc::clone(&sym_visits);
        let ov = Arc::clone(&occ_visits);
        let scanner = Scanner::new(Arc::new(BufferPool::with_defaults()))
            .with_match_document_path(|_| true)
            .with_match_symbol(|_| false)
            .with_visit_symbol(move |_, _| *sv.lock() += 1)
            .with_match_occurrence(|_| false)
            .with_visit_occurrence(move |_, _| *ov.lock() += 1);
        scanner.scan_index(&mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(*sym_visits.lock(), 0);
        assert_eq!(*occ_visits.lock(), 0);
    }

    #[test]
    fn scan_index_visits_matching_symbol() {
        let bytes = sample_index_bytes();
        let names = Arc::new(Mutex::new(Vec::new()));
        let n2 = Arc::clone(&names);
        let scanner = Scanner::new(Arc::new(BufferPool::with_defaults()))
            .with_match_document_path(|_| true)
            .with_match_symbol(|_| true)
            .with_visit_symbol(move |_, info| n2.lock().push(info.display_name.clone()));
        scanner.scan_index(&mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(names.lock().as_slice(), ["foo"]);
    }

    #[test]
    fn empty_input_returns_without_visits() {
        let scanner = Scanner::new(Arc::new(BufferPool::with_defaults()))
            .with_match_document_path(|_| true);
        scanner.scan_index(&mut std::io::Cursor::new(Vec::<u8>::new())).unwrap();
    }

    #[test]
    fn truncated_varint_is_decode_wire_error() {
        let scanner = Scanner::new(Arc::new(BufferPool::with_defaults()));
        let bytes = vec![0xFFu8]; // continuation bit set, no terminator
        let err = scanner.scan_index(&mut std::io::Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ScannerError::DecodeWire { .. }));
    }

    #[test]
    fn truncated_payload_is_truncated_error() {
        let scanner = Scanner::new(Arc::new(BufferPool::with_defaults()));
        let mut bytes = Vec::new();
        encode::write_tag(&mut bytes, FIELD_DOCUMENTS, WIRE_LENGTH_DELIMITED);
        encode::write_varint(&mut bytes, 100); // claim 100 bytes, provide none
        let err = scanner.scan_index(&mut std::io::Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ScannerError::Truncated { .. } | ScannerError::Io { .. }));
    }
}
