//! Testing utilities for the metaform workspace
//!
//! Shared fixtures (Bank / Bank Account / Project metadata and records) and
//! [`ScriptedTransport`], an in-memory [`Transport`] with scripted replies,
//! per-route delays, failure injection and a call log.

#![allow(missing_docs)]

use async_trait::async_trait;
use metaform_meta::{
    EntityMetadata, EnumOption, FieldDescriptor, Operation, Projection, ReferenceConfig,
    Validation,
};
use metaform_transport::{ApiRequest, Method, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    delay: Duration,
    once: bool,
    reply: Result<Value, TransportError>,
}

impl Route {
    fn matches(&self, request: &ApiRequest) -> bool {
        self.method == request.method
            && self.path == request.path
            && self
                .query
                .iter()
                .all(|(k, v)| request.query_param(k) == Some(v.as_str()))
    }
}

/// In-memory transport answering from scripted routes
///
/// Routes are matched in registration order. A route registered with
/// [`RouteBuilder::once`] is consumed by its first match, which allows
/// scripting a sequence of different answers for the same request.
/// Unmatched requests fail with status 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start scripting a route
    pub fn when(&self, method: Method, path: impl Into<String>) -> RouteBuilder<'_> {
        RouteBuilder {
            transport: self,
            route: Route {
                method,
                path: path.into(),
                query: Vec::new(),
                delay: Duration::ZERO,
                once: false,
                reply: Ok(Value::Null),
            },
        }
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    /// Requests received for one method and path
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .cloned()
            .collect()
    }

    /// Most recent request
    pub fn last_call(&self) -> Option<ApiRequest> {
        self.calls.lock().last().cloned()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        self.calls.lock().push(request.clone());

        let route = {
            let mut routes = self.routes.lock();
            match routes.iter().position(|r| r.matches(&request)) {
                Some(i) if routes[i].once => Some(routes.remove(i)),
                Some(i) => Some(routes[i].clone()),
                None => None,
            }
        };

        let Some(route) = route else {
            return Err(TransportError::status(404, format!("no route for {request}")));
        };
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        route.reply
    }
}

/// Builder returned by [`ScriptedTransport::when`]
#[must_use]
pub struct RouteBuilder<'a> {
    transport: &'a ScriptedTransport,
    route: Route,
}

impl RouteBuilder<'_> {
    /// Only match requests carrying this query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.route.query.push((key.into(), value.into()));
        self
    }

    /// Delay the reply
    pub fn delay(mut self, delay: Duration) -> Self {
        self.route.delay = delay;
        self
    }

    /// Consume the route after its first match
    pub fn once(mut self) -> Self {
        self.route.once = true;
        self
    }

    /// Answer with a JSON body
    pub fn reply(mut self, body: Value) {
        self.route.reply = Ok(body);
        self.transport.routes.lock().push(self.route);
    }

    /// Answer with an error
    pub fn fail(mut self, error: TransportError) {
        self.route.reply = Err(error);
        self.transport.routes.lock().push(self.route);
    }
}

/// `Bank` entity: a required name and an optional code
pub fn bank() -> Arc<EntityMetadata> {
    Arc::new(
        EntityMetadata::builder("Bank", "/banks")
            .field(FieldDescriptor::text("name").label("Bank Name").required().column("Name"))
            .field(FieldDescriptor::text("code").column("Code"))
            .build()
            .unwrap(),
    )
}

/// `Bank Account` entity referencing `Bank` with inline create
pub fn bank_account() -> Arc<EntityMetadata> {
    Arc::new(
        EntityMetadata::builder("Bank Account", "/employeebankaccounts")
            .section("Account")
            .field(
                FieldDescriptor::text("accountNumber")
                    .label("Account Number")
                    .required()
                    .section("Account")
                    .validation(Validation::new().min_length(4).pattern("^[0-9]+$"))
                    .column("Account Number"),
            )
            .field(
                FieldDescriptor::reference("bank", ReferenceConfig::new("/banks").allow_create(bank()))
                    .label("Bank")
                    .required()
                    .section("Account")
                    .column("Bank"),
            )
            .field(
                FieldDescriptor::enumeration(
                    "type",
                    vec![EnumOption::new("SAVINGS", "Savings"), EnumOption::new("CURRENT", "Current")],
                )
                .default_value(json!("SAVINGS")),
            )
            .field(FieldDescriptor::boolean("primary"))
            .build()
            .unwrap(),
    )
}

/// `Project` entity with a multi-valued reference to employees
pub fn project() -> Arc<EntityMetadata> {
    Arc::new(
        EntityMetadata::builder("Project", "/projects")
            .operations([Operation::Create, Operation::Read, Operation::Update])
            .field(FieldDescriptor::text("title").required().column("Title"))
            .field(
                FieldDescriptor::reference_list(
                    "members",
                    ReferenceConfig::new("/employees")
                        .with_label(Projection::template("{firstName} {lastName}")),
                )
                .column_with(metaform_meta::TableDisplay::new("Members", "members").with_accessor(
                    Projection::custom(|row| {
                        let names: Vec<String> = row
                            .get("members")?
                            .as_array()?
                            .iter()
                            .filter_map(|m| m.get("lastName").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect();
                        Some(names.join(", "))
                    }),
                )),
            )
            .field(FieldDescriptor::text("createdAt").read_only())
            .build()
            .unwrap(),
    )
}

/// Search results for `/banks?search=Com`
pub fn bank_records() -> Value {
    json!([
        {"id": "b1", "name": "Commercial Bank"},
        {"id": "b2", "name": "Commonwealth Bank"}
    ])
}

/// Employee records for `/employees`
pub fn employee_records() -> Value {
    json!([
        {"id": 1, "firstName": "Ada", "lastName": "Lovelace"},
        {"id": 2, "firstName": "Alan", "lastName": "Turing"},
        {"id": 3, "firstName": "Grace", "lastName": "Hopper"}
    ])
}

/// Wait long enough for any debounce window to elapse
///
/// Intended for `#[tokio::test(start_paused = true)]` tests, where sleeping
/// advances the mock clock instantly.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
