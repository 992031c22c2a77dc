//! Form lifecycle state machine
//!
//! ```text
//! Closed ──► Creating ──► Submitting(Create) ──► Closed
//!    │          ▲                 │
//!    │          └─────────────────┘ (failure)
//!    ├─────► Editing  ──► Submitting(Edit)   ──► Closed
//!    │          ▲                 │
//!    │          └─────────────────┘ (failure)
//!    └─────► Viewing  ──► Editing | Closed
//! ```

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Purpose a form was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    /// New record
    Create,
    /// Existing record, editable
    Edit,
    /// Existing record, read-only
    View,
}

/// State of the orchestrator's form slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormState {
    /// No form open
    Closed,
    /// Create form open
    Creating,
    /// Edit form open
    Editing,
    /// Read-only form open
    Viewing,
    /// Mutation in flight for a create or edit form
    Submitting(FormMode),
}

impl FormState {
    /// State a form opened in `mode` starts in
    #[must_use]
    pub fn opened(mode: FormMode) -> Self {
        match mode {
            FormMode::Create => Self::Creating,
            FormMode::Edit => Self::Editing,
            FormMode::View => Self::Viewing,
        }
    }

    /// Mode of the open form, if any
    #[must_use]
    pub fn mode(self) -> Option<FormMode> {
        match self {
            Self::Closed => None,
            Self::Creating => Some(FormMode::Create),
            Self::Editing => Some(FormMode::Edit),
            Self::Viewing => Some(FormMode::View),
            Self::Submitting(mode) => Some(mode),
        }
    }

    /// Whether a mutation is in flight
    #[inline]
    #[must_use]
    pub fn is_submitting(self) -> bool {
        matches!(self, Self::Submitting(_))
    }
}

impl fmt::Display for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Creating => f.write_str("creating"),
            Self::Editing => f.write_str("editing"),
            Self::Viewing => f.write_str("viewing"),
            Self::Submitting(FormMode::Create) => f.write_str("submitting (create)"),
            Self::Submitting(_) => f.write_str("submitting (update)"),
        }
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: FormState) -> Vec<FormState> {
    use FormState::{Closed, Creating, Editing, Submitting, Viewing};
    match from {
        Closed => vec![Creating, Editing, Viewing],
        Creating => vec![Submitting(FormMode::Create), Closed],
        Editing => vec![Submitting(FormMode::Edit), Closed],
        Viewing => vec![Editing, Closed],
        Submitting(FormMode::Create) => vec![Closed, Creating],
        Submitting(_) => vec![Closed, Editing],
    }
}

/// Check a transition
pub fn validate_transition(from: FormState, to: FormState) -> Result<(), EngineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from, to })
    }
}
