//! Core data model: descriptors, symbol monikers, ranges, occurrences,
//! symbol information, documents, and packages.
//!
//! These are value types: immutable after construction, cheap to clone,
//! and safe to share across the concurrent readers that make up most of
//! this crate's query surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

bitflags::bitflags! {
    /// Roles an occurrence can carry, mirrors the SCIP `SymbolRole` bitset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct OccurrenceRoles: u32 {
        const DEFINITION   = 0b0000_0001;
        const READ_ACCESS  = 0b0000_0010;
        const WRITE_ACCESS = 0b0000_0100;
        const IMPORT       = 0b0000_1000;
        const GENERATED    = 0b0001_0000;
        const TEST         = 0b0010_0000;
    }
}

/// One segment of a symbol's qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub suffix: DescriptorSuffix,
    pub disambiguator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorSuffix {
    Namespace,
    Type,
    Term,
    Method,
    TypeParameter,
    Parameter,
    Meta,
    Local,
    Macro,
}

/// `{ manager, name, version }`, identity is the triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    pub manager: String,
    pub name: String,
    pub version: String,
}

impl Package {
    pub fn id(&self) -> String {
        format!("{}|{}|{}", self.manager, self.name, self.version)
    }
}

/// A source span, either single-line or multi-line, matching the 3-vs-4
/// element wire encoding of `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Range {
    SingleLine {
        line: u32,
        start_char: u32,
        end_char: u32,
    },
    MultiLine {
        start_line: u32,
        start_char: u32,
        end_line: u32,
        end_char: u32,
    },
}

impl Range {
    pub fn from_components(components: &[i32]) -> Option<Self> {
        match components {
            [line, start_char, end_char] => Some(Range::SingleLine {
                line: *line as u32,
                start_char: *start_char as u32,
                end_char: *end_char as u32,
            }),
            [start_line, start_char, end_line, end_char] => Some(Range::MultiLine {
                start_line: *start_line as u32,
                start_char: *start_char as u32,
                end_line: *end_line as u32,
                end_char: *end_char as u32,
            }),
            _ => None,
        }
    }

    pub fn start_line(&self) -> u32 {
        match self {
            Range::SingleLine { line, .. } => *line,
            Range::MultiLine { start_line, .. } => *start_line,
        }
    }

    pub fn start_char(&self) -> u32 {
        match self {
            Range::SingleLine { start_char, .. } => *start_char,
            Range::MultiLine { start_char, .. } => *start_char,
        }
    }

    pub fn end_line(&self) -> u32 {
        match self {
            Range::SingleLine { line, .. } => *line,
            Range::MultiLine { end_line, .. } => *end_line,
        }
    }

    pub fn end_char(&self) -> u32 {
        match self {
            Range::SingleLine { end_char, .. } => *end_char,
            Range::MultiLine { end_char, .. } => *end_char,
        }
    }

    /// Lexicographic `(endLine, endChar) < (line, char)`, used by the
    /// binary search in `occurrence_for_position` to decide "this range
    /// ends strictly before the query position".
    pub fn ends_before(&self, line: u32, character: u32) -> bool {
        (self.end_line(), self.end_char()) < (line, character)
    }

    pub fn contains_position(&self, line: u32, character: u32) -> bool {
        match self {
            Range::SingleLine {
                line: l,
                start_char,
                end_char,
            } => line == *l && *start_char <= character && character <= *end_char,
            Range::MultiLine {
                start_line,
                start_char,
                end_line,
                end_char,
            } => {
                if line < *start_line || line > *end_line {
                    false
                } else if line == *start_line && line == *end_line {
                    *start_char <= character && character <= *end_char
                } else if line == *start_line {
                    *start_char <= character
                } else if line == *end_line {
                    character <= *end_char
                } else {
                    true
                }
            }
        }
    }

    /// Start position as `(line, character)`, used to keep occurrence
    /// lists sorted for binary search.
    pub fn start(&self) -> (u32, u32) {
        (self.start_line(), self.start_char())
    }
}

/// A 0-based `(line, character)` cursor position, as supplied by a caller
/// of `definition`/`references`/`hover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Option<String>,
    pub message: String,
    pub source: Option<String>,
}

/// A source span annotated with a symbol reference and roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub range: Range,
    pub symbol: String,
    pub roles: OccurrenceRoles,
    pub syntax_kind: Option<i32>,
    pub enclosing_range: Option<Range>,
    pub override_docs: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Occurrence {
    pub fn is_definition(&self) -> bool {
        self.roles.contains(OccurrenceRoles::DEFINITION)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub symbol: String,
    pub is_reference: bool,
    pub is_implementation: bool,
    pub is_type_definition: bool,
    pub is_definition: bool,
}

/// Metadata about a symbol: kind, documentation, relationships, display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInformation {
    pub symbol: String,
    pub display_name: String,
    pub kind: Option<i32>,
    pub documentation: Vec<String>,
    pub relationships: Vec<Relationship>,
    pub signature_documentation: Option<Box<Document>>,
    pub enclosing_symbol: Option<String>,
}

/// `{ relativePath; language; text?; occurrences; symbols; symbolMap; diagnostics }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub relative_path: String,
    pub language: String,
    pub text: Option<String>,
    pub occurrences: Vec<Occurrence>,
    pub symbols: Vec<SymbolInformation>,
    pub symbol_map: HashMap<String, SymbolInformation>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub fn new(relative_path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            language: language.into(),
            text: None,
            occurrences: Vec::new(),
            symbols: Vec::new(),
            symbol_map: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Populate `symbol_map` from `symbols`. Called once after full decode.
    pub fn index_symbols(&mut self) {
        self.symbol_map = self
            .symbols
            .iter()
            .map(|s| (s.symbol.clone(), s.clone()))
            .collect();
    }
}

/// A resolved symbol location: where it was used and, if known, where it
/// is defined — the shape `definition`/`references` hand back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolOccurrence {
    pub symbol_information: Option<SymbolInformation>,
    pub location: Location,
    pub occurrence: Option<Occurrence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Option<Range>,
}
