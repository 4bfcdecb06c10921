pub mod buffer;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod mapper;
pub mod registry;
pub mod symbol;
pub mod tree;
pub mod types;
pub mod wire;

pub use config::Settings;
pub use error::{IndexError, IndexResult, ScannerError, SymbolError, TreeError};
pub use index::PartialIndex;
pub use registry::{occurrence_for_position, QueryRegistry};
pub use symbol::{display_name, parse_symbol, ParsedSymbol};
pub use tree::{NodeId, SymbolPrefixTree, SymbolVersionEntry};
pub use types::{
    Descriptor, DescriptorSuffix, Diagnostic, Document, Location, Occurrence, OccurrenceRoles,
    Package, Position, Range, Relationship, SymbolInformation, SymbolOccurrence,
};
