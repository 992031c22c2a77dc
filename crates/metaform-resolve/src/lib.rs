//! Metaform Resolve - reference resolution for relational fields
//!
//! Every "pick another record" control is backed by:
//! - a [`ReferenceCache`] mapping identifiers to the last known record,
//!   append-only for the lifetime of the control
//! - an [`OptionResolver`] turning debounced search text into options,
//!   discarding results of superseded searches via a [`TaskSlot`]
//! - [`reconcile`] rules turning stored identifiers back into records,
//!   using initial [`DisplayHint`]s until the full record is known
//!
//! [`ReferenceField`] bundles the three for one field of one form.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod error;
pub mod field;
pub mod reconcile;
pub mod resolver;
pub mod task;

pub use cache::{CacheStats, ReferenceCache};
pub use error::{ResolveError, ResolveResult};
pub use field::ReferenceField;
pub use reconcile::{
    id_value, offered_options, resolve_many, resolve_single, DisplayHint, HintMap,
};
pub use resolver::{OptionResolver, ResolverConfig};
pub use task::{LiveToken, TaskHandle, TaskSlot};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for reference controls
    pub use crate::{
        DisplayHint, OptionResolver, ReferenceCache, ReferenceField, ResolveError,
        ResolverConfig, TaskSlot,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
