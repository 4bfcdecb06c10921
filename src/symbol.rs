//! Parses the symbol moniker grammar:
//!
//!   `<scheme> <manager> <package-name> <version> <descriptor-chain>`
//!
//! `.` is the empty-token literal; a leading `local ` marks a file-local
//! symbol whose descriptor chain is never traversed in the prefix tree.

use crate::error::SymbolError;
use crate::types::{Descriptor, DescriptorSuffix, Package};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSymbol {
    pub scheme: String,
    pub package: Package,
    pub descriptors: Vec<Descriptor>,
    /// `Some(id)` for `local N` symbols; these never walk the prefix tree.
    pub local_id: Option<String>,
}

impl ParsedSymbol {
    pub fn is_local(&self) -> bool {
        self.local_id.is_some()
    }
}

fn token_or_empty(token: &str) -> String {
    if token == "." { String::new() } else { token.to_string() }
}

/// Parse a symbol moniker string per `spec.md` §4.B.
pub fn parse_symbol(input: &str) -> Result<ParsedSymbol, SymbolError> {
    if let Some(rest) = input.strip_prefix("local ") {
        if rest.is_empty() {
            return Err(SymbolError::MalformedSymbol {
                input: input.to_string(),
                reason: "local symbol missing id".to_string(),
            });
        }
        return Ok(ParsedSymbol {
            scheme: String::new(),
            package: Package {
                manager: String::new(),
                name: String::new(),
                version: String::new(),
            },
            descriptors: Vec::new(),
            local_id: Some(rest.to_string()),
        });
    }

    // Five space-delimited preamble tokens: scheme, manager, name, version,
    // then the descriptor chain (which may itself contain spaces inside
    // method signatures, so it's everything after the fourth space).
    let mut rest = input;
    let mut preamble = Vec::with_capacity(4);
    for _ in 0..4 {
        let space = rest.find(' ').ok_or_else(|| SymbolError::MalformedSymbol {
            input: input.to_string(),
            reason: "fewer than five space-delimited preamble tokens".to_string(),
        })?;
        preamble.push(&rest[..space]);
        rest = &rest[space + 1..];
    }
    if preamble.iter().any(|t| t.is_empty()) {
        return Err(SymbolError::MalformedSymbol {
            input: input.to_string(),
            reason: "empty preamble token".to_string(),
        });
    }
    let descriptor_chain = rest;
    if descriptor_chain.is_empty() {
        return Err(SymbolError::MalformedSymbol {
            input: input.to_string(),
            reason: "descriptor chain truncated before a terminating suffix character"
                .to_string(),
        });
    }

    let scheme = preamble[0].to_string();
    let package = Package {
        manager: token_or_empty(preamble[1]),
        name: token_or_empty(preamble[2]),
        version: token_or_empty(preamble[3]),
    };

    let descriptors = parse_descriptor_chain(descriptor_chain)
        .ok_or_else(|| SymbolError::MalformedSymbol {
            input: input.to_string(),
            reason: "descriptor chain truncated before a terminating suffix character"
                .to_string(),
        })?;

    Ok(ParsedSymbol {
        scheme,
        package,
        descriptors,
        local_id: None,
    })
}

/// Parses the descriptor chain according to the terminator table in
/// `spec.md` §4.B. Returns `None` if the chain ends mid-descriptor.
fn parse_descriptor_chain(chain: &str) -> Option<Vec<Descriptor>> {
    let bytes = chain.as_bytes();
    let mut i = 0usize;
    let mut out = Vec::new();

    while i < bytes.len() {
        // `` `name` `` backtick-quoted names (used for names containing
        // reserved characters, e.g. dotted namespaces) are read verbatim.
        let (name, mut j) = if bytes[i] == b'`' {
            let close = chain[i + 1..].find('`')? + i + 1;
            (chain[i + 1..close].to_string(), close + 1)
        } else {
            let start = i;
            while j_is_name_char(bytes, i) {
                i += 1;
            }
            (chain[start..i].to_string(), i)
        };

        if j >= bytes.len() {
            return None;
        }

        let suffix_char = bytes[j] as char;
        let (suffix, disambiguator, next) = match suffix_char {
            '/' => (DescriptorSuffix::Namespace, String::new(), j + 1),
            '#' => (DescriptorSuffix::Type, String::new(), j + 1),
            '.' => (DescriptorSuffix::Term, String::new(), j + 1),
            ':' => (DescriptorSuffix::Meta, String::new(), j + 1),
            '[' => {
                let close = chain[j + 1..].find(']')? + j + 1;
                (
                    DescriptorSuffix::TypeParameter,
                    chain[j + 1..close].to_string(),
                    close + 1,
                )
            }
            '(' => {
                // Method: signature within parens consumed as disambiguator,
                // terminated by the `.` that SCIP appends after `)`.
                let close = chain[j + 1..].find(')')? + j + 1;
                let disamb = chain[j + 1..close].to_string();
                let after = close + 1;
                if after >= bytes.len() || bytes[after] != b'.' {
                    return None;
                }
                (DescriptorSuffix::Method, disamb, after + 1)
            }
            ')' => (DescriptorSuffix::Parameter, String::new(), j + 1),
            _ => return None,
        };

        out.push(Descriptor {
            name,
            suffix,
            disambiguator,
        });
        j = next;
        i = j;
    }

    if out.is_empty() { None } else { Some(out) }
}

fn j_is_name_char(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i) {
        None => false,
        Some(&b) => !matches!(b, b'/' | b'#' | b'.' | b':' | b'[' | b'(' | b')'),
    }
}

/// For a well-formed symbol, the last descriptor's name. For a malformed
/// one, the original input — per `spec.md` §4.B.
pub fn display_name(input: &str) -> String {
    match parse_symbol(input) {
        Ok(parsed) if !parsed.is_local() => parsed
            .descriptors
            .last()
            .map(|d| d.name.clone())
            .unwrap_or_else(|| input.to_string()),
        _ => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mockito_symbol() {
        let input = "semanticdb maven maven/./. org_mockito_mockito_core-4.5.1-ijar org/mockito/Mockito#when().";
        let parsed = parse_symbol(input).unwrap();
        assert_eq!(parsed.package.manager, "maven");
        assert_eq!(parsed.package.name, "maven/./.");
        assert_eq!(parsed.package.version, "org_mockito_mockito_core-4.5.1-ijar");
        assert_eq!(parsed.descriptors.len(), 4);
        assert_eq!(parsed.descriptors[0].name, "org");
        assert_eq!(parsed.descriptors[0].suffix, DescriptorSuffix::Namespace);
        assert_eq!(parsed.descriptors[1].name, "mockito");
        assert_eq!(parsed.descriptors[2].name, "Mockito");
        assert_eq!(parsed.descriptors[2].suffix, DescriptorSuffix::Type);
        assert_eq!(parsed.descriptors[3].name, "when");
        assert_eq!(parsed.descriptors[3].suffix, DescriptorSuffix::Method);
        assert_eq!(display_name(input), "when");
    }

    #[test]
    fn parses_backtick_namespace() {
        let input = "scip-go gomod example v1 `example`/Foo#";
        let parsed = parse_symbol(input).unwrap();
        assert_eq!(parsed.descriptors[0].name, "example");
        assert_eq!(parsed.descriptors[0].suffix, DescriptorSuffix::Namespace);
        assert_eq!(parsed.descriptors[1].name, "Foo");
        assert_eq!(parsed.descriptors[1].suffix, DescriptorSuffix::Type);
    }

    #[test]
    fn local_symbol_is_never_traversed() {
        let parsed = parse_symbol("local 3").unwrap();
        assert!(parsed.is_local());
        assert!(parsed.descriptors.is_empty());
    }

    #[test]
    fn malformed_missing_preamble_tokens() {
        let err = parse_symbol("scheme manager name").unwrap_err();
        assert!(matches!(err, SymbolError::MalformedSymbol { .. }));
    }

    #[test]
    fn malformed_truncated_descriptor_chain() {
        let err = parse_symbol("scheme manager name version org/mockito").unwrap_err();
        assert!(matches!(err, SymbolError::MalformedSymbol { .. }));
    }

    #[test]
    fn malformed_display_name_returns_original_input() {
        let input = "not a valid symbol at all";
        assert_eq!(display_name(input), input);
    }

    #[test]
    fn type_parameter_and_parameter_descriptors() {
        let input = "scheme mgr name ver Outer#method().[T][U])";
        let parsed = parse_symbol(input).unwrap();
        let suffixes: Vec<_> = parsed.descriptors.iter().map(|d| d.suffix).collect();
        assert!(suffixes.contains(&DescriptorSuffix::TypeParameter));
        assert!(suffixes.contains(&DescriptorSuffix::Parameter));
    }
}
