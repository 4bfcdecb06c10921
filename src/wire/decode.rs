//! Low-level varint/tag decoding and the document/symbol/occurrence
//! sub-scans and full decoders built on top of it.

use super::*;
use crate::error::ScannerError;
use crate::types::{
    Diagnostic, Document, Occurrence, OccurrenceRoles, Range, Relationship, SymbolInformation,
};
use std::io::Read;

/// Reads one varint, little-endian base-128 with continuation bit in the
/// high bit, maximum 10 bytes. Returns `VarintOverflow` past that.
pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64, ScannerError> {
    read_varint_opt(reader)?.ok_or(ScannerError::Io {
        path: std::path::PathBuf::new(),
        source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "expected varint"),
    })
}

/// Like `read_varint`, but returns `Ok(None)` if the stream ends cleanly
/// before any byte of the varint is read (used to detect end-of-stream at
/// a top-level record boundary, which is not an error).
pub fn read_varint_opt<R: Read>(reader: &mut R) -> Result<Option<u64>, ScannerError> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    let mut byte = [0u8; 1];
    for i in 0..10 {
        match reader.read(&mut byte) {
            Ok(0) => {
                if i == 0 {
                    return Ok(None);
                }
                return Err(ScannerError::DecodeWire {
                    reason: "failed to consume tag / length: truncated varint".to_string(),
                });
            }
            Ok(_) => {}
            Err(source) => {
                return Err(ScannerError::Io {
                    path: std::path::PathBuf::new(),
                    source,
                });
            }
        }
        result |= ((byte[0] & 0x7F) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(result));
        }
        shift += 7;
    }
    Err(ScannerError::VarintOverflow)
}

pub fn read_exact_tracked<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), ScannerError> {
    reader.read_exact(buf).map_err(|source| {
        if source.kind() == std::io::ErrorKind::UnexpectedEof {
            ScannerError::Truncated {
                expected: buf.len() as u64,
                available: 0,
            }
        } else {
            ScannerError::Io {
                path: std::path::PathBuf::new(),
                source,
            }
        }
    })
}

/// Skips a field whose wire type is not length-delimited, by consuming
/// exactly its encoding (a varint, 4, or 8 bytes).
pub fn skip_non_delimited<R: Read>(reader: &mut R, wire_type: u64) -> Result<(), ScannerError> {
    match wire_type {
        WIRE_VARINT => {
            read_varint(reader)?;
            Ok(())
        }
        WIRE_FIXED64 => {
            let mut buf = [0u8; 8];
            read_exact_tracked(reader, &mut buf)
        }
        WIRE_FIXED32 => {
            let mut buf = [0u8; 4];
            read_exact_tracked(reader, &mut buf)
        }
        _ => Err(ScannerError::UnexpectedWireType { wire_type }),
    }
}

fn read_string_field(buf: &[u8]) -> Result<String, ScannerError> {
    String::from_utf8(buf.to_vec()).map_err(|e| ScannerError::DecodeWire {
        reason: format!("invalid utf-8 in string field: {e}"),
    })
}

fn read_length_delimited(
    cursor: &mut std::io::Cursor<&[u8]>,
) -> Result<Option<(u64, Vec<u8>)>, ScannerError> {
    let tag = match read_varint_opt(cursor)? {
        Some(t) => t,
        None => return Ok(None),
    };
    let field_number = tag >> 3;
    let wire_type = tag & 0x7;
    if wire_type != WIRE_LENGTH_DELIMITED {
        skip_non_delimited(cursor, wire_type)?;
        return Ok(Some((field_number, Vec::new())));
    }
    let len = read_varint(cursor)?;
    let len = usize::try_from(len).unwrap_or(0);
    let mut payload = vec![0u8; len];
    read_exact_tracked(cursor, &mut payload)?;
    Ok(Some((field_number, payload)))
}

/// Cheap sub-scan: decode only `relative_path` (Document field 1), skip
/// everything else without materializing occurrences/symbols.
pub fn extract_document_path(buf: &[u8]) -> Result<String, ScannerError> {
    let mut cursor = std::io::Cursor::new(buf);
    while let Some((field, payload)) = read_length_delimited(&mut cursor)? {
        if field == DOC_FIELD_RELATIVE_PATH {
            return read_string_field(&payload);
        }
    }
    Ok(String::new())
}

/// Cheap sub-scan: decode only `symbol` (SymbolInformation field 1).
pub fn extract_symbol_moniker(buf: &[u8]) -> Result<String, ScannerError> {
    let mut cursor = std::io::Cursor::new(buf);
    while let Some((field, payload)) = read_length_delimited(&mut cursor)? {
        if field == SYM_FIELD_SYMBOL {
            return read_string_field(&payload);
        }
    }
    Ok(String::new())
}

/// Cheap sub-scan: decode only `symbol` (Occurrence field 2).
pub fn extract_occurrence_symbol(buf: &[u8]) -> Result<String, ScannerError> {
    let mut cursor = std::io::Cursor::new(buf);
    while let Some((field, payload)) = read_length_delimited(&mut cursor)? {
        if field == OCC_FIELD_SYMBOL {
            return read_string_field(&payload);
        }
    }
    Ok(String::new())
}

fn decode_packed_range(payload: &[u8]) -> Result<Option<Range>, ScannerError> {
    if payload.is_empty() {
        return Ok(None);
    }
    let mut cursor = std::io::Cursor::new(payload);
    let mut components = Vec::with_capacity(4);
    while let Some(v) = read_varint_opt(&mut cursor)? {
        components.push(v as i32);
    }
    Ok(Range::from_components(&components))
}

pub fn decode_document(path: &str, buf: &[u8]) -> Result<Document, ScannerError> {
    let mut doc = Document::new(path, "");
    let mut cursor = std::io::Cursor::new(buf);
    while let Some((field, payload)) = read_length_delimited(&mut cursor)? {
        match field {
            DOC_FIELD_RELATIVE_PATH => doc.relative_path = read_string_field(&payload)?,
            DOC_FIELD_LANGUAGE => doc.language = read_string_field(&payload)?,
            DOC_FIELD_OCCURRENCES => doc.occurrences.push(decode_occurrence(&payload)?),
            DOC_FIELD_SYMBOLS => doc.symbols.push(decode_symbol_information(&payload)?),
            _ => {}
        }
    }
    doc.occurrences.sort_by_key(|o| o.range.start());
    doc.index_symbols();
    Ok(doc)
}

pub fn decode_occurrence(buf: &[u8]) -> Result<Occurrence, ScannerError> {
    let mut range = None;
    let mut symbol = String::new();
    let mut roles = OccurrenceRoles::empty();
    let mut syntax_kind = None;
    let mut enclosing_range = None;
    let mut override_docs = Vec::new();
    let mut diagnostics = Vec::new();

    let mut cursor = std::io::Cursor::new(buf);
    while let Some((field, payload)) = read_length_delimited(&mut cursor)? {
        match field {
            OCC_FIELD_RANGE => range = decode_packed_range(&payload)?,
            OCC_FIELD_SYMBOL => symbol = read_string_field(&payload)?,
            OCC_FIELD_ROLES => {
                roles = OccurrenceRoles::from_bits_truncate(decode_embedded_varint(&payload)? as u32)
            }
            OCC_FIELD_SYNTAX_KIND => syntax_kind = Some(decode_embedded_varint(&payload)? as i32),
            OCC_FIELD_OVERRIDE_DOCS => override_docs.push(read_string_field(&payload)?),
            OCC_FIELD_DIAGNOSTICS => diagnostics.push(decode_diagnostic(&payload)?),
            OCC_FIELD_ENCLOSING_RANGE => enclosing_range = decode_packed_range(&payload)?,
            _ => {}
        }
    }

    let range = range.unwrap_or(Range::SingleLine {
        line: 0,
        start_char: 0,
        end_char: 0,
    });

    Ok(Occurrence {
        range,
        symbol,
        roles,
        syntax_kind,
        enclosing_range,
        override_docs,
        diagnostics,
    })
}

fn decode_embedded_varint(payload: &[u8]) -> Result<u64, ScannerError> {
    let mut cursor = std::io::Cursor::new(payload);
    read_varint(&mut cursor)
}

pub fn decode_symbol_information(buf: &[u8]) -> Result<SymbolInformation, ScannerError> {
    let mut symbol = String::new();
    let mut display_name = String::new();
    let mut kind = None;
    let mut documentation = Vec::new();
    let mut relationships = Vec::new();
    let mut signature_documentation = None;
    let mut enclosing_symbol = None;

    let mut cursor = std::io::Cursor::new(buf);
    while let Some((field, payload)) = read_length_delimited(&mut cursor)? {
        match field {
            SYM_FIELD_SYMBOL => symbol = read_string_field(&payload)?,
            SYM_FIELD_DISPLAY_NAME => display_name = read_string_field(&payload)?,
            SYM_FIELD_KIND => kind = Some(decode_embedded_varint(&payload)? as i32),
            SYM_FIELD_DOCUMENTATION => documentation.push(read_string_field(&payload)?),
            SYM_FIELD_RELATIONSHIPS => relationships.push(decode_relationship(&payload)?),
            SYM_FIELD_SIGNATURE_DOC => {
                signature_documentation = Some(Box::new(decode_document("", &payload)?))
            }
            SYM_FIELD_ENCLOSING_SYMBOL => enclosing_symbol = Some(read_string_field(&payload)?),
            _ => {}
        }
    }

    if display_name.is_empty() {
        display_name = crate::symbol::display_name(&symbol);
    }

    Ok(SymbolInformation {
        symbol,
        display_name,
        kind,
        documentation,
        relationships,
        signature_documentation,
        enclosing_symbol,
    })
}

pub fn decode_relationship(buf: &[u8]) -> Result<Relationship, ScannerError> {
    let mut rel = Relationship {
        symbol: String::new(),
        is_reference: false,
        is_implementation: false,
        is_type_definition: false,
        is_definition: false,
    };
    let mut cursor = std::io::Cursor::new(buf);
    while let Some((field, payload)) = read_length_delimited(&mut cursor)? {
        match field {
            REL_FIELD_SYMBOL => rel.symbol = read_string_field(&payload)?,
            REL_FIELD_IS_REFERENCE => rel.is_reference = decode_embedded_varint(&payload)? != 0,
            REL_FIELD_IS_IMPLEMENTATION => {
                rel.is_implementation = decode_embedded_varint(&payload)? != 0
            }
            REL_FIELD_IS_TYPE_DEFINITION => {
                rel.is_type_definition = decode_embedded_varint(&payload)? != 0
            }
            REL_FIELD_IS_DEFINITION => rel.is_definition = decode_embedded_varint(&payload)? != 0,
            _ => {}
        }
    }
    Ok(rel)
}

pub fn decode_diagnostic(buf: &[u8]) -> Result<Diagnostic, ScannerError> {
    let mut range = None;
    let mut severity = None;
    let mut message = String::new();
    let mut source = None;
    let mut cursor = std::io::Cursor::new(buf);
    while let Some((field, payload)) = read_length_delimited(&mut cursor)? {
        match field {
            DIAG_FIELD_RANGE => range = decode_packed_range(&payload)?,
            DIAG_FIELD_SEVERITY => severity = Some(read_string_field(&payload)?),
            DIAG_FIELD_MESSAGE => message = read_string_field(&payload)?,
            DIAG_FIELD_SOURCE => source = Some(read_string_field(&payload)?),
            _ => {}
        }
    }
    Ok(Diagnostic {
        range: range.unwrap_or(Range::SingleLine {
            line: 0,
            start_char: 0,
            end_char: 0,
        }),
        severity,
        message,
        source,
    })
}
