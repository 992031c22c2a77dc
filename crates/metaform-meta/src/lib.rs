//! Metaform Meta - declarative entity metadata
//!
//! Describes record types once so forms, tables and reference pickers can be
//! derived from the description:
//! - [`FieldDescriptor`] and [`FieldKind`] for individual attributes
//! - [`EntityMetadata`] for validated, immutable entity descriptions
//! - [`Validation`] rules and [`ValidationErrors`] maps
//! - [`Projection`]s for labels, identifiers and table cells
//! - [`Catalog`] loading from JSON or YAML files
//!
//! # Example
//!
//! ```rust
//! use metaform_meta::prelude::*;
//! use std::sync::Arc;
//!
//! let bank = Arc::new(
//!     EntityMetadata::builder("Bank", "/banks")
//!         .field(FieldDescriptor::text("name").required())
//!         .build()
//!         .unwrap(),
//! );
//!
//! let account = EntityMetadata::builder("Bank Account", "/employeebankaccounts")
//!     .field(FieldDescriptor::text("accountNumber").required().column("Account"))
//!     .field(
//!         FieldDescriptor::reference("bank", ReferenceConfig::new("/banks").allow_create(bank))
//!             .required()
//!             .column("Bank"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(account.columns().count(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod catalog;
pub mod entity;
pub mod error;
pub mod field;
pub mod path;
pub mod projection;
pub mod validation;

pub use catalog::Catalog;
pub use entity::{EntityMetadata, EntityMetadataBuilder, Operation};
pub use error::{MetadataError, MetadataResult};
pub use field::{
    EnumOption, FieldDescriptor, FieldKind, ReferenceConfig, TableDisplay, HINT_LABEL_KEY,
};
pub use projection::{Projection, ProjectionFn};
pub use validation::{DefinitionIssue, PredicateFn, Rule, Validation, ValidationErrors};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for describing entities
    pub use crate::{
        Catalog, EntityMetadata, EnumOption, FieldDescriptor, FieldKind, MetadataError,
        Operation, Projection, ReferenceConfig, TableDisplay, Validation, ValidationErrors,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
