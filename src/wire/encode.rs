//! Minimal encoders used only to build synthetic `.scip`-shaped byte
//! streams for tests and fixtures. The crate never writes a real index
//! (§1 Non-goal (a)); this exists purely so the decoder in [`super::decode`]
//! has something concrete to exercise without a real SCIP producer on hand.

use super::*;
use crate::types::{Diagnostic, Document, Occurrence, Range, Relationship, SymbolInformation};

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        } else {
            out.push(byte | 0x80);
        }
    }
}

pub fn write_tag(out: &mut Vec<u8>, field_number: u64, wire_type: u64) {
    write_varint(out, (field_number << 3) | wire_type);
}

fn write_length_delimited(out: &mut Vec<u8>, field_number: u64, payload: &[u8]) {
    write_tag(out, field_number, WIRE_LENGTH_DELIMITED);
    write_varint(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

fn write_string_field(out: &mut Vec<u8>, field_number: u64, s: &str) {
    if !s.is_empty() {
        write_length_delimited(out, field_number, s.as_bytes());
    }
}

fn write_varint_field(out: &mut Vec<u8>, field_number: u64, value: u64) {
    let mut payload = Vec::new();
    write_varint(&mut payload, value);
    write_length_delimited(out, field_number, &payload);
}

fn write_range_field(out: &mut Vec<u8>, field_number: u64, range: &Range) {
    let mut payload = Vec::new();
    match range {
        Range::SingleLine { line, start_char, end_char } => {
            write_varint(&mut payload, *line as u64);
            write_varint(&mut payload, *start_char as u64);
            write_varint(&mut payload, *end_char as u64);
        }
        Range::MultiLine { start_line, start_char, end_line, end_char } => {
            write_varint(&mut payload, *start_line as u64);
            write_varint(&mut payload, *start_char as u64);
            write_varint(&mut payload, *end_line as u64);
            write_varint(&mut payload, *end_char as u64);
        }
    }
    write_length_delimited(out, field_number, &payload);
}

pub fn encode_relationship(rel: &Relationship) -> Vec<u8> {
    let mut out = Vec::new();
    write_string_field(&mut out, REL_FIELD_SYMBOL, &rel.symbol);
    if rel.is_reference {
        write_varint_field(&mut out, REL_FIELD_IS_REFERENCE, 1);
    }
    if rel.is_implementation {
        write_varint_field(&mut out, REL_FIELD_IS_IMPLEMENTATION, 1);
    }
    if rel.is_type_definition {
        write_varint_field(&mut out, REL_FIELD_IS_TYPE_DEFINITION, 1);
    }
    if rel.is_definition {
        write_varint_field(&mut out, REL_FIELD_IS_DEFINITION, 1);
    }
    out
}

pub fn encode_diagnostic(diag: &Diagnostic) -> Vec<u8> {
    let mut out = Vec::new();
    write_range_field(&mut out, DIAG_FIELD_RANGE, &diag.range);
    if let Some(sev) = &diag.severity {
        write_string_field(&mut out, DIAG_FIELD_SEVERITY, sev);
    }
    write_string_field(&mut out, DIAG_FIELD_MESSAGE, &diag.message);
    if let Some(src) = &diag.source {
        write_string_field(&mut out, DIAG_FIELD_SOURCE, src);
    }
    out
}

pub fn encode_occurrence(occ: &Occurrence) -> Vec<u8> {
    let mut out = Vec::new();
    write_range_field(&mut out, OCC_FIELD_RANGE, &occ.range);
    write_string_field(&mut out, OCC_FIELD_SYMBOL, &occ.symbol);
    if !occ.roles.is_empty() {
        write_varint_field(&mut out, OCC_FIELD_ROLES, occ.roles.bits() as u64);
    }
    if let Some(kind) = occ.syntax_kind {
        write_varint_field(&mut out, OCC_FIELD_SYNTAX_KIND, kind as u64);
    }
    for doc in &occ.override_docs {
        write_string_field(&mut out, OCC_FIELD_OVERRIDE_DOCS, doc);
    }
    for diag in &occ.diagnostics {
        write_length_delimited(&mut out, OCC_FIELD_DIAGNOSTICS, &encode_diagnostic(diag));
    }
    if let Some(range) = &occ.enclosing_range {
        write_range_field(&mut out, OCC_FIELD_ENCLOSING_RANGE, range);
    }
    out
}

pub fn encode_symbol_information(info: &SymbolInformation) -> Vec<u8> {
    let mut out = Vec::new();
    write_string_field(&mut out, SYM_FIELD_SYMBOL, &info.symbol);
    write_string_field(&mut out, SYM_FIELD_DISPLAY_NAME, &info.display_name);
    if let Some(kind) = info.kind {
        write_varint_field(&mut out, SYM_FIELD_KIND, kind as u64);
    }
    for doc in &info.documentation {
        write_string_field(&mut out, SYM_FIELD_DOCUMENTATION, doc);
    }
    for rel in &info.relationships {
        write_length_delimited(&mut out, SYM_FIELD_RELATIONSHIPS, &encode_relationship(rel));
    }
    if let Some(sig) = &info.signature_documentation {
        write_length_delimited(&mut out, SYM_FIELD_SIGNATURE_DOC, &encode_document(sig));
    }
    if let Some(enclosing) = &info.enclosing_symbol {
        write_string_field(&mut out, SYM_FIELD_ENCLOSING_SYMBOL, enclosing);
    }
    out
}

pub fn encode_document(doc: &Document) -> Vec<u8> {
    let mut out = Vec::new();
    write_string_field(&mut out, DOC_FIELD_RELATIVE_PATH, &doc.relative_path);
    for occ in &doc.occurrences {
        write_length_delimited(&mut out, DOC_FIELD_OCCURRENCES, &encode_occurrence(occ));
    }
    for sym in &doc.symbols {
        write_length_delimited(&mut out, DOC_FIELD_SYMBOLS, &encode_symbol_information(sym));
    }
    write_string_field(&mut out, DOC_FIELD_LANGUAGE, &doc.language);
    out
}

pub fn encode_metadata(tool_name: &str, tool_version: &str, project_root: &str) -> Vec<u8> {
    let mut out = Vec::new();
    write_string_field(&mut out, 1, tool_name);
    write_string_field(&mut out, 2, tool_version);
    write_string_field(&mut out, 3, project_root);
    out
}
