//! Debounced, cancellable option search
//!
//! An [`OptionResolver`] backs one reference control. While the control is
//! open, query changes are debounced and turned into
//! `GET <endpoint>?<search_param>=<query>` requests. Only the latest search
//! may update the option list; results of superseded or closed searches are
//! dropped. Successful results are also written into the field's
//! [`ReferenceCache`].

use crate::cache::ReferenceCache;
use crate::error::ResolveError;
use crate::task::TaskSlot;
use metaform_meta::ReferenceConfig;
use metaform_transport::{ApiRequest, EnvelopeShape, Transport};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Search behaviour shared by all resolvers of an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Quiet period after the last keystroke before searching
    pub debounce: Duration,
    /// Queries shorter than this (in characters, trimmed) never search
    pub min_query_len: usize,
    /// Query parameter carrying the search text
    pub search_param: String,
    /// Shape of search responses
    pub envelope: EnvelopeShape,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            min_query_len: 2,
            search_param: "search".to_string(),
            envelope: EnvelopeShape::Auto,
        }
    }
}

impl ResolverConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With debounce window
    #[inline]
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// With minimum query length
    #[inline]
    #[must_use]
    pub fn with_min_query_len(mut self, len: usize) -> Self {
        self.min_query_len = len;
        self
    }

    /// With search parameter name
    #[inline]
    #[must_use]
    pub fn with_search_param(mut self, param: impl Into<String>) -> Self {
        self.search_param = param.into();
        self
    }

    /// With response envelope shape
    #[inline]
    #[must_use]
    pub fn with_envelope(mut self, envelope: EnvelopeShape) -> Self {
        self.envelope = envelope;
        self
    }
}

#[derive(Debug, Default)]
struct ResolverState {
    open: bool,
    query: String,
    options: Vec<Value>,
    loading: bool,
    last_error: Option<ResolveError>,
    settled_query: Option<String>,
    /// Bumped whenever a search is issued or invalidated
    issued: u64,
}

/// Search-driven option source for one reference control
///
/// Cloning yields another handle to the same resolver.
#[derive(Clone)]
pub struct OptionResolver {
    reference: Arc<ReferenceConfig>,
    transport: Arc<dyn Transport>,
    cache: ReferenceCache,
    config: Arc<ResolverConfig>,
    state: Arc<Mutex<ResolverState>>,
    slot: Arc<TaskSlot>,
}

impl fmt::Debug for OptionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionResolver")
            .field("endpoint", &self.reference.endpoint)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl OptionResolver {
    /// Resolver writing into `cache`
    #[must_use]
    pub fn new(
        reference: ReferenceConfig,
        transport: Arc<dyn Transport>,
        cache: ReferenceCache,
        config: ResolverConfig,
    ) -> Self {
        Self {
            reference: Arc::new(reference),
            transport,
            cache,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(ResolverState::default())),
            slot: Arc::new(TaskSlot::new()),
        }
    }

    /// Arm the resolver; queries set while closed are remembered but not searched
    pub fn open(&self) {
        let mut state = self.state.lock();
        if !state.open {
            state.open = true;
            debug!(endpoint = %self.reference.endpoint, "option resolver opened");
        }
    }

    /// Disarm the resolver, dropping pending searches and the option list
    ///
    /// The cache is left untouched.
    pub fn close(&self) {
        let mut state = self.state.lock();
        self.slot.cancel();
        state.issued += 1;
        state.open = false;
        state.loading = false;
        state.options.clear();
        debug!(endpoint = %self.reference.endpoint, "option resolver closed");
    }

    /// Update the search text
    ///
    /// Short queries clear the options without searching; others search
    /// after the debounce window, superseding any earlier search.
    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        let mut state = self.state.lock();
        state.query.clone_from(&query);
        if !state.open {
            return;
        }

        let trimmed = query.trim();
        if trimmed.chars().count() < self.config.min_query_len {
            self.slot.cancel();
            state.issued += 1;
            state.loading = false;
            state.options.clear();
            return;
        }

        self.schedule(&mut state, trimmed.to_string(), self.config.debounce);
    }

    /// Re-issue the last settled query without debounce
    ///
    /// Falls back to the current query when nothing has settled yet.
    /// Returns whether a search was issued.
    pub fn retry(&self) -> bool {
        let mut state = self.state.lock();
        if !state.open {
            return false;
        }
        let query = state
            .settled_query
            .clone()
            .unwrap_or_else(|| state.query.trim().to_string());
        if query.chars().count() < self.config.min_query_len {
            return false;
        }
        self.schedule(&mut state, query, Duration::ZERO);
        true
    }

    /// Search immediately and wait for the result
    ///
    /// Supersedes pending searches. The result is applied like a debounced
    /// search, unless the resolver was closed or a newer search started in
    /// the meantime, in which case [`ResolveError::Cancelled`] is returned.
    pub async fn search_now(&self, query: &str) -> Result<Vec<Value>, ResolveError> {
        let query = query.trim().to_string();
        let issued = {
            let mut state = self.state.lock();
            if !state.open {
                return Err(ResolveError::Cancelled);
            }
            self.slot.cancel();
            state.issued += 1;
            state.query.clone_from(&query);
            if query.chars().count() < self.config.min_query_len {
                state.loading = false;
                state.options.clear();
                return Ok(Vec::new());
            }
            state.loading = true;
            state.issued
        };

        let result = fetch(self.transport.as_ref(), &self.reference, &self.config, &query).await;

        let mut state = self.state.lock();
        if !state.open || state.issued != issued {
            debug!(endpoint = %self.reference.endpoint, %query, "discarding superseded search");
            return Err(ResolveError::Cancelled);
        }
        apply(&mut state, &self.reference, &self.cache, query, result.clone());
        result
    }

    fn schedule(&self, state: &mut ResolverState, query: String, delay: Duration) {
        state.issued += 1;
        state.loading = true;
        let issued = state.issued;

        let transport = Arc::clone(&self.transport);
        let reference = Arc::clone(&self.reference);
        let config = Arc::clone(&self.config);
        let shared = Arc::clone(&self.state);
        let cache = self.cache.clone();

        self.slot.spawn(move |token| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if !token.is_live() {
                return;
            }
            let result = fetch(transport.as_ref(), &reference, &config, &query).await;

            let mut state = shared.lock();
            if !token.is_live() || !state.open || state.issued != issued {
                debug!(endpoint = %reference.endpoint, %query, "discarding stale search result");
                return;
            }
            apply(&mut state, &reference, &cache, query, result);
        });
    }

    /// Current option list
    #[must_use]
    pub fn options(&self) -> Vec<Value> {
        self.state.lock().options.clone()
    }

    /// Whether the resolver is armed
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Whether a search is pending or in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Error of the last settled search, cleared by the next success
    #[must_use]
    pub fn last_error(&self) -> Option<ResolveError> {
        self.state.lock().last_error.clone()
    }

    /// Current search text
    #[must_use]
    pub fn query(&self) -> String {
        self.state.lock().query.clone()
    }

    /// Cache this resolver writes into
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    /// Reference configuration
    #[inline]
    #[must_use]
    pub fn reference(&self) -> &ReferenceConfig {
        &self.reference
    }
}

async fn fetch(
    transport: &dyn Transport,
    reference: &ReferenceConfig,
    config: &ResolverConfig,
    query: &str,
) -> Result<Vec<Value>, ResolveError> {
    let request = ApiRequest::get(reference.endpoint.as_str())
        .with_query(config.search_param.as_str(), query);
    debug!(request = %request, "issuing option search");

    let response = transport
        .send(request)
        .await
        .map_err(|e| ResolveError::fetch(reference.endpoint.as_str(), &e))?;
    config
        .envelope
        .extract_items(response)
        .map_err(|e| ResolveError::fetch(reference.endpoint.as_str(), &e))
}

fn apply(
    state: &mut ResolverState,
    reference: &ReferenceConfig,
    cache: &ReferenceCache,
    query: String,
    result: Result<Vec<Value>, ResolveError>,
) {
    state.loading = false;
    state.settled_query = Some(query);
    match result {
        Ok(records) => {
            cache.insert_records(reference, &records);
            state.options = records;
            state.last_error = None;
        }
        Err(err) => {
            warn!(endpoint = %reference.endpoint, error = %err, "option search failed");
            state.options.clear();
            state.last_error = Some(err);
        }
    }
}
