//! Metaform Engine - forms, tables and CRUD flows from entity metadata
//!
//! Given an [`EntityMetadata`](metaform_meta::EntityMetadata) and a
//! [`Transport`](metaform_transport::Transport), the engine provides:
//! - a headless renderer turning fields into typed [`Control`]s
//! - [`FormRecord`]s that keep relational values as identifiers and build
//!   `{ id }` mutation payloads
//! - an [`Orchestrator`] driving list loading, create/edit/view forms,
//!   guarded submits, two-step deletes and nested creation of references
//!
//! # Example
//!
//! ```rust,ignore
//! use metaform_engine::prelude::*;
//!
//! let orchestrator = Orchestrator::new(meta, transport, EngineConfig::default());
//! orchestrator.open_create(&Default::default())?;
//! orchestrator.set_field("accountNumber", json!("12345"))?;
//! orchestrator.select("bank", &json!({"id": "b1", "name": "Commercial Bank"}))?;
//! orchestrator.submit().await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod form;
pub mod notice;
pub mod orchestrator;
pub mod record;
pub mod render;
pub mod state;
pub mod table;

pub use config::{EngineConfig, UpdateMethod};
pub use error::{EngineError, EngineResult};
pub use form::{FieldListener, Form, InlineCreate};
pub use notice::{Notice, NoticeLevel};
pub use orchestrator::{OpenSeed, Orchestrator, SubmitOutcome};
pub use record::{FormRecord, RelationSeed};
pub use render::{
    Control, Mode, OptionItem, ReferencePicker, RenderedField, RenderedForm,
    RenderedSection, Renderer,
};
pub use state::{allowed_transitions, validate_transition, FormMode, FormState};
pub use table::{Column, Row, RowAction, Table};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosts driving the engine
    pub use crate::{
        Control, EngineConfig, EngineError, FieldListener, FormMode, FormRecord, FormState,
        Notice, OpenSeed, Orchestrator, RenderedForm, SubmitOutcome, Table,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
