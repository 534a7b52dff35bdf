//! # snomed-loader
//!
//! High-performance parallel parser for SNOMED CT RF2 distribution files.
//!
//! This crate provides a streaming parser for SNOMED CT Release Format 2 (RF2) files,
//! including concepts, descriptions, and relationships. Includes parallel parsing
//! support via rayon for maximum performance on multi-core systems.
//!
//! ## Features
//!
//! - `parallel` - Enables parallel parsing via rayon (default)
//! - `progress` - Enables progress bar support via indicatif (optional)
//!
//! ## Usage
//!
//! ### Basic Parsing
//!
//! ```ignore
//! use snomed_loader::{Rf2Parser, Rf2Config};
//! use snomed_types::Rf2Concept;
//!
//! let config = Rf2Config::default();
//! let parser = Rf2Parser::<_, Rf2Concept>::from_path("concepts.txt", config)?;
//!
//! for result in parser {
//!     match result {
//!         Ok(concept) => println!("Concept: {} (active: {})", concept.id, concept.active),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! ### Importing a whole release into the component store
//!
//! ```ignore
//! use snomed_loader::{import_release, Rf2Config};
//! use snomed_store::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::default())?;
//! let stats = import_release("/path/to/snomed/release", &store, &Rf2Config::default())?;
//! println!("{} rows written, {} failed to parse", stats.written, stats.parse_errors);
//! ```
//!
//! ### Filtering
//!
//! ```ignore
//! use snomed_loader::{Rf2Parser, DescriptionConfig, DescriptionFilter};
//! use snomed_types::Rf2Description;
//!
//! // Parse only English FSN descriptions
//! let config = DescriptionConfig::fsn_only();
//! let parser = Rf2Parser::<_, Rf2Description>::from_path("descriptions.txt", config.base)?;
//!
//! let fsn_descriptions: Vec<_> = parser
//!     .filter_map(Result::ok)
//!     .filter(|d| d.passes_description_filter(&config))
//!     .collect();
//! ```

#![warn(missing_docs)]

mod concept;
mod concrete_relationship;
mod description;
mod import;
mod loader;
mod owl_expression;
mod parser;
mod refset;
mod relationship;
mod types;

// Re-export main types and functions
pub use import::{import_release, ImportStats};
pub use loader::{discover_rf2_files, format_bytes};
pub use owl_expression::OwlExpressionRow;
pub use parser::{parse, Rf2Parser, Rf2Record};
pub use refset::{
    AssociationRefsetRow, AttributeValueRefsetRow, ComplexMapRefsetRow, ExtendedMapRefsetRow,
    LanguageRefsetRow, ModuleDependencyRow, MrcmAttributeDomainRow, MrcmAttributeRangeRow,
    MrcmDomainRow, RefsetDescriptorRow, SimpleMapRefsetRow, SimpleRefsetRow,
};
pub use types::{
    DescriptionConfig, ParseStats, RelationshipConfig, Rf2Config, Rf2Error, Rf2Files, Rf2Result,
};

// Re-export filter traits
pub use description::DescriptionFilter;
pub use relationship::RelationshipFilter;

// Re-export snomed-types for convenience
pub use snomed_types;
