//! CRUD orchestration for one entity
//!
//! The [`Orchestrator`] owns the table rows and the form slot of one entity
//! and drives every network mutation:
//!
//! - list loading, tagged with a generation so an older response never
//!   replaces a newer one
//! - opening forms for create, edit and view (edit and view fetch the record)
//! - submit, guarded so one form has at most one mutation in flight
//! - two-step delete (request, then confirm)
//! - nested creation of reference targets from inside a form
//!
//! State lives behind a `parking_lot` mutex that is never held across an
//! await point; asynchronous results re-check the form instance they were
//! started for before touching anything.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::form::{FieldListener, Form};
use crate::notice::Notice;
use crate::record::FormRecord;
use crate::render::RenderedForm;
use crate::state::{validate_transition, FormMode, FormState};
use crate::table::Table;
use metaform_meta::{EntityMetadata, Operation};
use metaform_resolve::{DisplayHint, OptionResolver};
use metaform_transport::{extract_record, ApiRequest, Transport};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// How a form is opened
#[derive(Debug, Clone, PartialEq)]
pub enum OpenSeed {
    /// New record; the map overrides field defaults
    Defaults(Map<String, Value>),
    /// Existing record, fetched by identifier
    Id(String),
    /// Existing record already at hand, with display hints per field
    Record {
        /// Record as returned by the API
        record: Value,
        /// Field name to `{id, label}` hint (or an array of them)
        hints: HashMap<String, Value>,
    },
}

/// Result of a submit
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Mutation succeeded; carries the server's record (`Null` if none)
    Saved(Value),
    /// The form closed while the request was in flight; the result was dropped
    Discarded,
}

/// Pending or running delete
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeleteState {
    Idle,
    Confirming(String),
    Deleting(String),
}

struct State {
    form_state: FormState,
    form: Option<Form>,
    rows: Vec<Value>,
    list_error: Option<EngineError>,
    list_generation: u64,
    loading: bool,
    delete: DeleteState,
    notices: Vec<Notice>,
}

struct Inner {
    meta: Arc<EntityMetadata>,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    listeners: RwLock<Vec<Arc<dyn FieldListener>>>,
    state: Mutex<State>,
}

/// Table and form controller for one entity
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Orchestrator")
            .field("entity", &self.inner.meta.name())
            .field("form_state", &state.form_state)
            .field("rows", &state.rows.len())
            .field("delete", &state.delete)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator with a closed form and an empty table
    #[must_use]
    pub fn new(meta: Arc<EntityMetadata>, transport: Arc<dyn Transport>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                meta,
                transport,
                config,
                listeners: RwLock::new(Vec::new()),
                state: Mutex::new(State {
                    form_state: FormState::Closed,
                    form: None,
                    rows: Vec::new(),
                    list_error: None,
                    list_generation: 0,
                    loading: false,
                    delete: DeleteState::Idle,
                    notices: Vec::new(),
                }),
            }),
        }
    }

    /// Register a field listener for every form opened afterwards
    pub fn add_listener(&self, listener: Arc<dyn FieldListener>) {
        self.inner.listeners.write().push(listener);
    }

    #[inline]
    #[must_use]
    pub fn meta(&self) -> &Arc<EntityMetadata> {
        &self.inner.meta
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn form_state(&self) -> FormState {
        self.inner.state.lock().form_state
    }

    /// Snapshot of the open form's record
    #[must_use]
    pub fn form_record(&self) -> Option<FormRecord> {
        self.inner.state.lock().form.as_ref().map(|f| f.record().clone())
    }

    /// Identifier of the open form instance
    #[must_use]
    pub fn form_instance(&self) -> Option<Ulid> {
        self.inner.state.lock().form.as_ref().map(Form::instance)
    }

    /// Rows of the last successful list fetch
    #[must_use]
    pub fn rows(&self) -> Vec<Value> {
        self.inner.state.lock().rows.clone()
    }

    /// Error of the last list fetch, if it failed
    #[must_use]
    pub fn list_error(&self) -> Option<EngineError> {
        self.inner.state.lock().list_error.clone()
    }

    /// Take every queued notice
    #[must_use]
    pub fn drain_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.inner.state.lock().notices)
    }

    fn require(&self, operation: Operation) -> Result<(), EngineError> {
        if self.inner.meta.allows(operation) {
            Ok(())
        } else {
            Err(EngineError::OperationNotAllowed {
                entity: self.inner.meta.name().to_string(),
                operation,
            })
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn FieldListener>> {
        self.inner.listeners.read().clone()
    }

    // ---- table ----

    /// Fetch the list
    ///
    /// A response belonging to an older refresh is dropped. On failure the
    /// rows are cleared and the error kept for a retry affordance.
    ///
    /// # Errors
    /// [`EngineError::Fetch`] when the list could not be loaded.
    pub async fn refresh(&self) -> Result<(), EngineError> {
        self.require(Operation::Read)?;
        let generation = {
            let mut state = self.inner.state.lock();
            state.list_generation += 1;
            state.loading = true;
            state.list_generation
        };

        let request = ApiRequest::get(self.inner.meta.endpoint());
        let result = match self.inner.transport.send(request).await {
            Ok(body) => self.inner.config.envelope.extract_items(body),
            Err(err) => Err(err),
        };

        let mut state = self.inner.state.lock();
        if state.list_generation != generation {
            debug!(entity = self.inner.meta.name(), generation, "dropping superseded list response");
            return Ok(());
        }
        state.loading = false;
        match result {
            Ok(rows) => {
                debug!(entity = self.inner.meta.name(), rows = rows.len(), "list loaded");
                state.rows = rows;
                state.list_error = None;
                Ok(())
            }
            Err(err) => {
                warn!(entity = self.inner.meta.name(), error = %err, "list fetch failed");
                let err = EngineError::fetch(&err);
                state.rows.clear();
                state.list_error = Some(err.clone());
                state.notices.push(Notice::warning(err.user_message()));
                Err(err)
            }
        }
    }

    /// Current table
    #[must_use]
    pub fn table(&self) -> Table {
        let state = self.inner.state.lock();
        let mut table = Table::build(&self.inner.meta, &state.rows);
        table.loading = state.loading;
        table.error = state.list_error.as_ref().map(EngineError::user_message);
        table
    }

    // ---- forms ----

    /// Open a form
    ///
    /// # Errors
    /// - [`EngineError::OperationNotAllowed`] when the entity forbids the mode
    /// - [`EngineError::InvalidTransition`] when a form is already open
    /// - [`EngineError::Fetch`] when the record could not be loaded
    pub async fn open(&self, mode: FormMode, seed: OpenSeed) -> Result<(), EngineError> {
        match (mode, seed) {
            (FormMode::Create, OpenSeed::Defaults(initial)) => self.open_create(&initial),
            (FormMode::Create, _) => Err(EngineError::configuration(
                "create forms open from default values",
            )),
            (mode, OpenSeed::Id(id)) => self.open_existing(mode, &id).await,
            (mode, OpenSeed::Record { record, hints }) => self.open_record(mode, &record, &hints),
            (mode, OpenSeed::Defaults(_)) => Err(EngineError::configuration(format!(
                "{mode:?} forms need an existing record"
            ))),
        }
    }

    /// Open a create form; `initial` overrides field defaults
    ///
    /// # Errors
    /// See [`Orchestrator::open`].
    pub fn open_create(&self, initial: &Map<String, Value>) -> Result<(), EngineError> {
        self.require(Operation::Create)?;
        let record = FormRecord::with_values(&self.inner.meta, initial);
        self.install(FormMode::Create, record, |_| Ok(()))
    }

    /// Open an edit form for record `id`, fetching it first
    ///
    /// # Errors
    /// See [`Orchestrator::open`].
    pub async fn open_edit(&self, id: &str) -> Result<(), EngineError> {
        self.open_existing(FormMode::Edit, id).await
    }

    /// Open a read-only form for record `id`, fetching it first
    ///
    /// # Errors
    /// See [`Orchestrator::open`].
    pub async fn open_view(&self, id: &str) -> Result<(), EngineError> {
        self.open_existing(FormMode::View, id).await
    }

    async fn open_existing(&self, mode: FormMode, id: &str) -> Result<(), EngineError> {
        self.require(mode_operation(mode))?;
        validate_transition(self.form_state(), FormState::opened(mode))?;

        let request = ApiRequest::get(self.inner.meta.record_endpoint(id));
        let fetched = match self.inner.transport.send(request).await.and_then(extract_record) {
            Ok(record) => record,
            Err(err) => {
                warn!(entity = self.inner.meta.name(), %id, error = %err, "record fetch failed");
                let err = EngineError::fetch(&err);
                self.inner.state.lock().notices.push(Notice::warning(err.user_message()));
                return Err(err);
            }
        };
        self.open_record(mode, &fetched, &HashMap::new())
    }

    /// Open an edit or view form over a record already at hand
    ///
    /// `hints` supplies labels for reference values whose full records are
    /// not embedded, keyed by field name.
    ///
    /// # Errors
    /// See [`Orchestrator::open`].
    pub fn open_record(
        &self,
        mode: FormMode,
        fetched: &Value,
        hints: &HashMap<String, Value>,
    ) -> Result<(), EngineError> {
        self.require(mode_operation(mode))?;
        let (record, seeds) = FormRecord::hydrate(&self.inner.meta, fetched);
        self.install(mode, record, |form| {
            form.seed(&seeds);
            for (field, hint) in hints {
                form.add_hints(field, DisplayHint::parse_many(hint))?;
            }
            Ok(())
        })
    }

    fn install(
        &self,
        mode: FormMode,
        record: FormRecord,
        prepare: impl FnOnce(&mut Form) -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        let mut form = Form::open(
            Arc::clone(&self.inner.meta),
            mode,
            record,
            Arc::clone(&self.inner.transport),
            self.inner.config.resolver_config(),
        );
        prepare(&mut form)?;

        let mut state = self.inner.state.lock();
        let next = FormState::opened(mode);
        validate_transition(state.form_state, next)?;
        info!(entity = self.inner.meta.name(), instance = %form.instance(), ?mode, "form opened");
        state.form = Some(form);
        state.form_state = next;
        Ok(())
    }

    /// Switch an open view form to editing
    ///
    /// # Errors
    /// - [`EngineError::OperationNotAllowed`] when the entity forbids updates
    /// - [`EngineError::InvalidTransition`] unless a view form is open
    pub fn edit_current(&self) -> Result<(), EngineError> {
        self.require(Operation::Update)?;
        let mut state = self.inner.state.lock();
        validate_transition(state.form_state, FormState::Editing)?;
        let form = state.form.as_mut().ok_or(EngineError::NoOpenForm)?;
        form.promote_to_edit();
        state.form_state = FormState::Editing;
        Ok(())
    }

    /// Close the form, discarding its values
    ///
    /// An in-flight submit is not cancelled; its result is dropped.
    ///
    /// # Errors
    /// [`EngineError::NoOpenForm`] when no form is open.
    pub fn cancel(&self) -> Result<(), EngineError> {
        let mut state = self.inner.state.lock();
        let form = state.form.take().ok_or(EngineError::NoOpenForm)?;
        form.close();
        info!(entity = self.inner.meta.name(), instance = %form.instance(), "form closed");
        state.form_state = FormState::Closed;
        Ok(())
    }

    fn with_editable<T>(
        &self,
        apply: impl FnOnce(&mut Form, &[Arc<dyn FieldListener>]) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let listeners = self.listeners();
        let mut state = self.inner.state.lock();
        match state.form_state {
            FormState::Creating | FormState::Editing => {}
            FormState::Submitting(_) => return Err(EngineError::Busy),
            FormState::Closed => return Err(EngineError::NoOpenForm),
            FormState::Viewing => {
                return Err(EngineError::InvalidTransition {
                    from: FormState::Viewing,
                    to: FormState::Editing,
                })
            }
        }
        let form = state.form.as_mut().ok_or(EngineError::NoOpenForm)?;
        apply(form, &listeners)
    }

    /// Change a field value (dotted paths reach nested fields)
    ///
    /// # Errors
    /// [`EngineError::Busy`] while submitting, plus the errors of
    /// [`Form::set_value`].
    pub fn set_field(&self, path: &str, value: Value) -> Result<(), EngineError> {
        self.with_editable(|form, listeners| form.set_value(path, value, listeners))
    }

    fn resolver(&self, path: &str) -> Result<OptionResolver, EngineError> {
        let state = self.inner.state.lock();
        let form = state.form.as_ref().ok_or(EngineError::NoOpenForm)?;
        Ok(form.binding(path)?.resolver().clone())
    }

    /// Type search text into a reference picker (debounced)
    ///
    /// # Errors
    /// [`EngineError::UnknownField`] when `path` is not a reference field.
    pub fn search(&self, path: &str, query: &str) -> Result<(), EngineError> {
        let resolver = self.resolver(path)?;
        if !resolver.is_open() {
            resolver.open();
        }
        resolver.set_query(query);
        Ok(())
    }

    /// Search a reference picker immediately, returning the options
    ///
    /// # Errors
    /// [`EngineError::Fetch`] when the search failed or was superseded.
    pub async fn search_now(&self, path: &str, query: &str) -> Result<Vec<Value>, EngineError> {
        let resolver = self.resolver(path)?;
        if !resolver.is_open() {
            resolver.open();
        }
        resolver.search_now(query).await.map_err(|err| EngineError::Fetch {
            message: err.to_string(),
            retryable: err.is_retryable(),
        })
    }

    /// Repeat a reference picker's last search
    ///
    /// # Errors
    /// [`EngineError::UnknownField`] when `path` is not a reference field.
    pub fn retry_search(&self, path: &str) -> Result<bool, EngineError> {
        Ok(self.resolver(path)?.retry())
    }

    /// Close a reference picker, discarding any search in flight
    ///
    /// # Errors
    /// [`EngineError::UnknownField`] when `path` is not a reference field.
    pub fn close_picker(&self, path: &str) -> Result<(), EngineError> {
        self.resolver(path)?.close();
        Ok(())
    }

    /// Options a reference picker currently offers
    ///
    /// # Errors
    /// [`EngineError::UnknownField`] when `path` is not a reference field.
    pub fn options(&self, path: &str) -> Result<Vec<Value>, EngineError> {
        let state = self.inner.state.lock();
        let form = state.form.as_ref().ok_or(EngineError::NoOpenForm)?;
        Ok(form.binding(path)?.offered(form.record().get_path(path)))
    }

    /// Select a reference option
    ///
    /// # Errors
    /// See [`Form::select`].
    pub fn select(&self, path: &str, record: &Value) -> Result<Value, EngineError> {
        self.with_editable(|form, listeners| form.select(path, record, listeners))
    }

    /// Remove a selected reference
    ///
    /// # Errors
    /// See [`Form::deselect`].
    pub fn deselect(&self, path: &str, id: &str) -> Result<(), EngineError> {
        self.with_editable(|form, listeners| form.deselect(path, id, listeners))
    }

    /// Render the open form
    ///
    /// # Errors
    /// [`EngineError::NoOpenForm`] when no form is open, or a configuration
    /// error from rendering.
    pub fn render_form(&self) -> Result<RenderedForm, EngineError> {
        let state = self.inner.state.lock();
        let form = state.form.as_ref().ok_or(EngineError::NoOpenForm)?;
        form.render(state.form_state.is_submitting())
    }

    /// Validate and send the open form
    ///
    /// Creates use `POST <endpoint>`, edits the configured update method on
    /// `<endpoint>/<id>`. Invalid input never reaches the network. On success
    /// the form closes and the list reloads; on failure the form stays open
    /// with every value intact and a form-level error.
    ///
    /// # Errors
    /// - [`EngineError::Busy`] while a submit is in flight
    /// - [`EngineError::Validation`] for invalid input
    /// - [`EngineError::Mutation`] when the server refused the change
    pub async fn submit(&self) -> Result<SubmitOutcome, EngineError> {
        let (instance, mode, request) = {
            let mut state = self.inner.state.lock();
            let mode = match state.form_state {
                FormState::Submitting(_) => return Err(EngineError::Busy),
                FormState::Closed => return Err(EngineError::NoOpenForm),
                FormState::Viewing => {
                    return Err(EngineError::InvalidTransition {
                        from: FormState::Viewing,
                        to: FormState::Submitting(FormMode::Edit),
                    })
                }
                FormState::Creating => FormMode::Create,
                FormState::Editing => FormMode::Edit,
            };
            self.require(mode_operation(mode))?;

            let meta = Arc::clone(&self.inner.meta);
            let update = self.inner.config.update_method;
            let form = state.form.as_mut().ok_or(EngineError::NoOpenForm)?;
            if let Err(err) = form.validate() {
                debug!(entity = meta.name(), error = %err, "submit blocked by validation");
                return Err(err);
            }
            form.set_form_error(None);

            let payload = form.payload();
            let request = match (mode, form.record().id()) {
                (FormMode::Edit, Some(id)) => {
                    ApiRequest::new(update.into(), meta.record_endpoint(id)).with_body(payload)
                }
                (FormMode::Edit, None) => {
                    return Err(EngineError::configuration("edited record has no identifier"))
                }
                _ => ApiRequest::post(meta.endpoint(), payload),
            };
            let instance = form.instance();

            let next = FormState::Submitting(mode);
            validate_transition(state.form_state, next)?;
            state.form_state = next;
            (instance, mode, request)
        };

        info!(entity = self.inner.meta.name(), %instance, request = %request, "submitting");
        let result = self.inner.transport.send(request).await;

        let body = {
            let mut state = self.inner.state.lock();
            if state.form.as_ref().map(Form::instance) != Some(instance) {
                debug!(entity = self.inner.meta.name(), %instance, "form closed during submit, result dropped");
                return Ok(SubmitOutcome::Discarded);
            }
            match result {
                Ok(body) => {
                    if let Some(form) = state.form.take() {
                        form.close();
                    }
                    state.form_state = FormState::Closed;
                    let verb = if mode == FormMode::Create { "created" } else { "updated" };
                    state
                        .notices
                        .push(Notice::success(format!("{} {verb}", self.inner.meta.name())));
                    info!(entity = self.inner.meta.name(), %instance, "submit succeeded");
                    body
                }
                Err(err) => {
                    warn!(entity = self.inner.meta.name(), %instance, error = %err, "submit failed");
                    let err = EngineError::mutation(&err, &self.inner.config.generic_error_message);
                    let message = err.user_message();
                    state.form_state = FormState::opened(mode);
                    if let Some(form) = state.form.as_mut() {
                        form.set_form_error(Some(message.clone()));
                    }
                    state.notices.push(Notice::error(message));
                    return Err(err);
                }
            }
        };

        if self.refresh().await.is_err() {
            debug!(entity = self.inner.meta.name(), "list reload after submit failed");
        }
        Ok(SubmitOutcome::Saved(extract_record(body).unwrap_or(Value::Null)))
    }

    // ---- nested create ----

    /// Open a nested create form for a reference field's target entity
    ///
    /// # Errors
    /// [`EngineError::Configuration`] when the field does not allow creation.
    pub fn begin_inline_create(&self, path: &str) -> Result<(), EngineError> {
        self.with_editable(|form, _| form.begin_inline(path).map(|_| ()))
    }

    /// Change a value of the nested create form
    ///
    /// # Errors
    /// [`EngineError::NoOpenForm`] without a nested form, plus the errors of
    /// [`Form::set_value`].
    pub fn set_inline_field(&self, path: &str, value: Value) -> Result<(), EngineError> {
        self.with_editable(|form, listeners| {
            let inline = form.inline_mut().ok_or(EngineError::NoOpenForm)?;
            if inline.is_submitting() {
                return Err(EngineError::Busy);
            }
            inline.form_mut().set_value(path, value, listeners)
        })
    }

    /// Discard the nested create form
    ///
    /// # Errors
    /// [`EngineError::NoOpenForm`] without a nested form.
    pub fn cancel_inline(&self) -> Result<(), EngineError> {
        self.with_editable(|form, _| {
            if form.cancel_inline() {
                Ok(())
            } else {
                Err(EngineError::NoOpenForm)
            }
        })
    }

    /// Create the nested record and select it in the parent field
    ///
    /// The created record is written into the field's cache, so its label
    /// shows without another fetch.
    ///
    /// # Errors
    /// - [`EngineError::Validation`] for invalid nested input
    /// - [`EngineError::Mutation`] when creation failed (the nested form stays open)
    pub async fn submit_inline(&self) -> Result<Value, EngineError> {
        let (instance, target, request) = self.with_editable(|form, _| {
            let instance = form.instance();
            let inline = form.inline_mut().ok_or(EngineError::NoOpenForm)?;
            if inline.is_submitting() {
                return Err(EngineError::Busy);
            }
            let nested = inline.form_mut();
            nested.validate()?;
            nested.set_form_error(None);
            let target = Arc::clone(nested.meta());
            let request = ApiRequest::post(target.endpoint(), nested.payload());
            inline.set_submitting(true);
            Ok((instance, target, request))
        })?;

        info!(entity = target.name(), parent = self.inner.meta.name(), "creating referenced record");
        let result = self
            .inner
            .transport
            .send(request)
            .await
            .and_then(extract_record);

        let listeners = self.listeners();
        let mut state = self.inner.state.lock();
        let Some(form) = state.form.as_mut().filter(|f| f.instance() == instance) else {
            debug!(entity = target.name(), "parent form closed during nested create, result dropped");
            return Err(EngineError::NoOpenForm);
        };
        if let Some(inline) = form.inline_mut() {
            inline.set_submitting(false);
        }

        match result {
            Ok(created) if form.inline_identifies(&created) => {
                let value = form.finish_inline(&created, &listeners)?;
                state
                    .notices
                    .push(Notice::success(format!("{} created", target.name())));
                Ok(value)
            }
            Ok(_) => {
                let err = EngineError::Mutation {
                    status: None,
                    message: self.inner.config.generic_error_message.clone(),
                };
                warn!(entity = target.name(), "created record carries no identifier");
                if let Some(inline) = form.inline_mut() {
                    inline.form_mut().set_form_error(Some(err.user_message()));
                }
                Err(err)
            }
            Err(err) => {
                warn!(entity = target.name(), error = %err, "nested create failed");
                let err = EngineError::mutation(&err, &self.inner.config.generic_error_message);
                if let Some(inline) = form.inline_mut() {
                    inline.form_mut().set_form_error(Some(err.user_message()));
                }
                Err(err)
            }
        }
    }

    // ---- delete ----

    /// Ask to delete record `id`; nothing is sent until confirmed
    ///
    /// # Errors
    /// - [`EngineError::OperationNotAllowed`] when the entity forbids deletes
    /// - [`EngineError::Busy`] while a delete is in flight
    pub fn request_delete(&self, id: &str) -> Result<(), EngineError> {
        self.require(Operation::Delete)?;
        let mut state = self.inner.state.lock();
        if matches!(state.delete, DeleteState::Deleting(_)) {
            return Err(EngineError::Busy);
        }
        state.delete = DeleteState::Confirming(id.to_string());
        Ok(())
    }

    /// Record awaiting delete confirmation
    #[must_use]
    pub fn pending_delete(&self) -> Option<String> {
        match &self.inner.state.lock().delete {
            DeleteState::Confirming(id) => Some(id.clone()),
            _ => None,
        }
    }

    /// Drop the pending delete
    ///
    /// # Errors
    /// [`EngineError::NoPendingDelete`] when nothing awaits confirmation.
    pub fn cancel_delete(&self) -> Result<(), EngineError> {
        let mut state = self.inner.state.lock();
        match state.delete {
            DeleteState::Confirming(_) => {
                state.delete = DeleteState::Idle;
                Ok(())
            }
            DeleteState::Deleting(_) => Err(EngineError::Busy),
            DeleteState::Idle => Err(EngineError::NoPendingDelete),
        }
    }

    /// Send the pending delete; the list reloads on success
    ///
    /// # Errors
    /// - [`EngineError::NoPendingDelete`] when nothing awaits confirmation
    /// - [`EngineError::Busy`] while a delete is in flight
    /// - [`EngineError::Mutation`] when the server refused; rows stay as they were
    pub async fn confirm_delete(&self) -> Result<(), EngineError> {
        let id = {
            let mut state = self.inner.state.lock();
            let id = match &state.delete {
                DeleteState::Confirming(id) => id.clone(),
                DeleteState::Deleting(_) => return Err(EngineError::Busy),
                DeleteState::Idle => return Err(EngineError::NoPendingDelete),
            };
            state.delete = DeleteState::Deleting(id.clone());
            id
        };

        info!(entity = self.inner.meta.name(), %id, "deleting");
        let result = self
            .inner
            .transport
            .send(ApiRequest::delete(self.inner.meta.record_endpoint(&id)))
            .await;

        {
            let mut state = self.inner.state.lock();
            state.delete = DeleteState::Idle;
            if let Err(err) = result {
                warn!(entity = self.inner.meta.name(), %id, error = %err, "delete failed");
                let err = EngineError::mutation(&err, &self.inner.config.generic_error_message);
                state.notices.push(Notice::error(err.user_message()));
                return Err(err);
            }
            state
                .notices
                .push(Notice::success(format!("{} deleted", self.inner.meta.name())));
        }

        if self.refresh().await.is_err() {
            debug!(entity = self.inner.meta.name(), "list reload after delete failed");
        }
        Ok(())
    }
}

fn mode_operation(mode: FormMode) -> Operation {
    match mode {
        FormMode::Create => Operation::Create,
        FormMode::Edit => Operation::Update,
        FormMode::View => Operation::Read,
    }
}
