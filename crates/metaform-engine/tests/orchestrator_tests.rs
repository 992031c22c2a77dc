use metaform_engine::prelude::*;
use metaform_engine::{NoticeLevel, ReferencePicker, UpdateMethod};
use metaform_meta::{EntityMetadata, FieldDescriptor, Projection, ReferenceConfig};
use metaform_test_utils::{bank, bank_account, bank_records, settle, ScriptedTransport};
use metaform_transport::{Method, TransportError};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn setup(
    meta: Arc<EntityMetadata>,
    config: EngineConfig,
) -> (Orchestrator, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new();
    let orchestrator = Orchestrator::new(meta, transport.clone(), config);
    (orchestrator, transport)
}

fn picker(orchestrator: &Orchestrator, field: &str) -> ReferencePicker {
    let form = orchestrator.render_form().unwrap();
    match &form.field(field).unwrap().control {
        Control::Reference(picker) => picker.clone(),
        other => panic!("expected reference picker, got {other:?}"),
    }
}

fn selected_labels(orchestrator: &Orchestrator, field: &str) -> Vec<String> {
    picker(orchestrator, field)
        .selected
        .into_iter()
        .map(|item| item.label)
        .collect()
}

fn fill_valid_account(orchestrator: &Orchestrator) {
    orchestrator.set_field("accountNumber", json!("12345")).unwrap();
    orchestrator
        .select("bank", &json!({"id": "b1", "name": "Commercial Bank"}))
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn bank_account_create_flow() {
    let (orchestrator, transport) = setup(bank_account(), EngineConfig::default());
    transport
        .when(Method::Get, "/banks")
        .query("search", "Com")
        .reply(json!({"data": bank_records()}));
    transport
        .when(Method::Post, "/employeebankaccounts")
        .reply(json!({"id": "a1", "accountNumber": "12345", "bank": {"id": "b1"}}));
    transport.when(Method::Get, "/employeebankaccounts").reply(json!([]));

    orchestrator.open_create(&Map::new()).unwrap();
    orchestrator.set_field("accountNumber", json!("12345")).unwrap();
    orchestrator.search("bank", "Com").unwrap();
    settle(Duration::from_millis(600)).await;

    let searches = transport.calls_to(Method::Get, "/banks");
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].to_string(), "GET /banks?search=Com");

    let options = orchestrator.options("bank").unwrap();
    assert_eq!(options.len(), 2);
    orchestrator.select("bank", &options[0]).unwrap();
    assert_eq!(selected_labels(&orchestrator, "bank"), vec!["Commercial Bank"]);

    let outcome = orchestrator.submit().await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Saved(json!({"id": "a1", "accountNumber": "12345", "bank": {"id": "b1"}})));

    let posts = transport.calls_to(Method::Post, "/employeebankaccounts");
    assert_eq!(posts.len(), 1);
    assert_eq!(
        posts[0].body,
        Some(json!({
            "accountNumber": "12345",
            "bank": {"id": "b1"},
            "type": "SAVINGS",
            "primary": false
        }))
    );
    assert_eq!(orchestrator.form_state(), FormState::Closed);
    assert_eq!(transport.calls_to(Method::Get, "/employeebankaccounts").len(), 1);

    let notices = orchestrator.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Success);
}

#[tokio::test(start_paused = true)]
async fn duplicate_submit_is_refused() {
    let (orchestrator, transport) = setup(bank_account(), EngineConfig::default());
    transport
        .when(Method::Post, "/employeebankaccounts")
        .delay(Duration::from_secs(1))
        .reply(json!({"id": "a1"}));
    transport.when(Method::Get, "/employeebankaccounts").reply(json!([]));

    orchestrator.open_create(&Map::new()).unwrap();
    fill_valid_account(&orchestrator);

    let (first, second) = tokio::join!(orchestrator.submit(), async {
        tokio::task::yield_now().await;
        assert!(orchestrator.form_state().is_submitting());
        assert!(orchestrator.render_form().unwrap().submitting);
        assert_eq!(
            orchestrator.set_field("accountNumber", json!("999")),
            Err(EngineError::Busy)
        );
        orchestrator.submit().await
    });

    assert!(matches!(first, Ok(SubmitOutcome::Saved(_))));
    assert_eq!(second, Err(EngineError::Busy));
    assert_eq!(transport.calls_to(Method::Post, "/employeebankaccounts").len(), 1);
}

#[tokio::test]
async fn failed_submit_preserves_input() {
    let (orchestrator, transport) = setup(bank_account(), EngineConfig::default());
    transport
        .when(Method::Post, "/employeebankaccounts")
        .once()
        .fail(TransportError::status(409, "Account already exists"));
    transport
        .when(Method::Post, "/employeebankaccounts")
        .reply(json!({"id": "a1"}));
    transport.when(Method::Get, "/employeebankaccounts").reply(json!([]));

    orchestrator.open_create(&Map::new()).unwrap();
    fill_valid_account(&orchestrator);
    let before = orchestrator.form_record().unwrap();

    let err = orchestrator.submit().await.unwrap_err();
    assert_eq!(err.user_message(), "Account already exists");
    assert_eq!(orchestrator.form_state(), FormState::Creating);
    assert_eq!(orchestrator.form_record().unwrap(), before);

    let form = orchestrator.render_form().unwrap();
    assert_eq!(form.form_error.as_deref(), Some("Account already exists"));
    assert_eq!(selected_labels(&orchestrator, "bank"), vec!["Commercial Bank"]);

    let notices = orchestrator.drain_notices();
    assert_eq!(notices[0].level, NoticeLevel::Error);

    // retrying the same values succeeds
    assert!(matches!(orchestrator.submit().await, Ok(SubmitOutcome::Saved(_))));
    assert_eq!(orchestrator.form_state(), FormState::Closed);
}

#[tokio::test]
async fn failure_without_server_message_uses_generic_text() {
    let config = EngineConfig::default().with_generic_error_message("Could not save");
    let (orchestrator, transport) = setup(bank_account(), config);
    transport
        .when(Method::Post, "/employeebankaccounts")
        .fail(TransportError::Network("connection reset".into()));

    orchestrator.open_create(&Map::new()).unwrap();
    fill_valid_account(&orchestrator);
    let err = orchestrator.submit().await.unwrap_err();
    assert_eq!(err, EngineError::Mutation { status: None, message: "Could not save".into() });
}

#[tokio::test(start_paused = true)]
async fn result_of_closed_form_is_dropped() {
    let (orchestrator, transport) = setup(bank_account(), EngineConfig::default());
    transport
        .when(Method::Post, "/employeebankaccounts")
        .delay(Duration::from_secs(1))
        .fail(TransportError::status(500, "boom"));

    orchestrator.open_create(&Map::new()).unwrap();
    fill_valid_account(&orchestrator);

    let (outcome, ()) = tokio::join!(orchestrator.submit(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        orchestrator.cancel().unwrap();
        orchestrator.open_create(&Map::new()).unwrap();
    });

    assert_eq!(outcome, Ok(SubmitOutcome::Discarded));
    assert_eq!(orchestrator.form_state(), FormState::Creating);
    let form = orchestrator.render_form().unwrap();
    assert_eq!(form.form_error, None);
    assert_eq!(orchestrator.form_record().unwrap().get("accountNumber"), &Value::Null);
    assert!(orchestrator.drain_notices().is_empty());
}

#[tokio::test]
async fn edit_uses_configured_update_method_and_hints() {
    for (method, config) in [
        (Method::Patch, EngineConfig::default()),
        (Method::Put, EngineConfig::default().with_update_method(UpdateMethod::Put)),
    ] {
        let (orchestrator, transport) = setup(bank_account(), config);
        transport
            .when(method, "/employeebankaccounts/a1")
            .reply(json!({"id": "a1"}));
        transport.when(Method::Get, "/employeebankaccounts").reply(json!([]));

        let hints = HashMap::from([("bank".to_string(), json!({"id": "b7", "label": "Hinted Bank"}))]);
        orchestrator
            .open(
                FormMode::Edit,
                OpenSeed::Record {
                    record: json!({"id": "a1", "accountNumber": "12345", "bank": "b7"}),
                    hints,
                },
            )
            .await
            .unwrap();
        assert_eq!(selected_labels(&orchestrator, "bank"), vec!["Hinted Bank"]);

        orchestrator.set_field("primary", json!(true)).unwrap();
        orchestrator.submit().await.unwrap();

        let calls = transport.calls_to(method, "/employeebankaccounts/a1");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body.as_ref().unwrap()["bank"], json!({"id": "b7"}));
        assert_eq!(calls[0].body.as_ref().unwrap()["primary"], json!(true));
    }
}

#[tokio::test]
async fn view_mode_shows_embedded_reference_labels() {
    let (orchestrator, transport) = setup(bank_account(), EngineConfig::default());
    transport.when(Method::Get, "/employeebankaccounts/a1").reply(json!({
        "id": "a1",
        "accountNumber": "12345",
        "bank": {"id": "b1", "name": "Commercial Bank"},
        "type": "CURRENT",
        "primary": true
    }));

    orchestrator
        .open(FormMode::View, OpenSeed::Id("a1".into()))
        .await
        .unwrap();
    let form = orchestrator.render_form().unwrap();
    assert_eq!(form.mode, FormMode::View);
    assert_eq!(
        form.field("bank").unwrap().control,
        Control::Display { text: "Commercial Bank".into() }
    );
    assert_eq!(
        form.field("type").unwrap().control,
        Control::Display { text: "Current".into() }
    );
    assert_eq!(
        form.field("primary").unwrap().control,
        Control::Display { text: "Yes".into() }
    );
    assert!(transport.calls_to(Method::Get, "/banks").is_empty());
    assert!(matches!(orchestrator.submit().await, Err(EngineError::InvalidTransition { .. })));
}

#[tokio::test]
async fn fetch_failure_keeps_form_closed() {
    let (orchestrator, transport) = setup(bank_account(), EngineConfig::default());
    transport
        .when(Method::Get, "/employeebankaccounts/a1")
        .fail(TransportError::status(503, "maintenance"));

    let err = orchestrator.open_edit("a1").await.unwrap_err();
    assert!(matches!(err, EngineError::Fetch { retryable: true, .. }));
    assert_eq!(orchestrator.form_state(), FormState::Closed);
}

#[tokio::test]
async fn inline_create_selects_new_record_without_refetch() {
    let (orchestrator, transport) = setup(bank_account(), EngineConfig::default());
    transport
        .when(Method::Post, "/banks")
        .reply(json!({"data": {"id": "b9", "name": "New Bank"}}));

    orchestrator.open_create(&Map::new()).unwrap();
    orchestrator.begin_inline_create("bank").unwrap();

    let invalid = orchestrator.submit_inline().await.unwrap_err();
    assert!(matches!(invalid, EngineError::Validation(_)));
    assert!(transport.calls().is_empty());

    orchestrator.set_inline_field("name", json!("New Bank")).unwrap();
    let value = orchestrator.submit_inline().await.unwrap();
    assert_eq!(value, json!("b9"));

    assert_eq!(transport.calls_to(Method::Post, "/banks")[0].body, Some(json!({"name": "New Bank", "code": null})));
    assert!(transport.calls_to(Method::Get, "/banks").is_empty());
    assert_eq!(orchestrator.form_record().unwrap().get("bank"), &json!("b9"));
    assert_eq!(selected_labels(&orchestrator, "bank"), vec!["New Bank"]);
    assert!(orchestrator.render_form().unwrap().inline.is_none());
}

#[tokio::test]
async fn inline_create_identifies_by_value_projection() {
    let reference = ReferenceConfig::new("/banks")
        .with_value(Projection::parse("code"))
        .allow_create(bank());
    let meta = Arc::new(
        EntityMetadata::builder("Branch", "/branches")
            .field(FieldDescriptor::reference("bank", reference).required())
            .build()
            .unwrap(),
    );
    let (orchestrator, transport) = setup(meta, EngineConfig::default());
    transport
        .when(Method::Post, "/banks")
        .reply(json!({"code": "CBE", "name": "Commercial Bank"}));

    orchestrator.open_create(&Map::new()).unwrap();
    orchestrator.begin_inline_create("bank").unwrap();
    orchestrator.set_inline_field("name", json!("Commercial Bank")).unwrap();
    let value = orchestrator.submit_inline().await.unwrap();

    assert_eq!(value, json!("CBE"));
    assert_eq!(orchestrator.form_record().unwrap().get("bank"), &json!("CBE"));
    assert_eq!(selected_labels(&orchestrator, "bank"), vec!["Commercial Bank"]);
}

fn employee_with_office() -> Arc<EntityMetadata> {
    Arc::new(
        EntityMetadata::builder("Employee", "/employees")
            .field(FieldDescriptor::text("name").required())
            .field(FieldDescriptor::nested(
                "office",
                vec![
                    FieldDescriptor::number("floor"),
                    FieldDescriptor::reference("site", ReferenceConfig::new("/sites")).required(),
                ],
            ))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn nested_reference_is_flattened_labelled_and_submitted() {
    let (orchestrator, transport) = setup(employee_with_office(), EngineConfig::default());
    transport.when(Method::Patch, "/employees/e1").reply(json!({"id": "e1"}));
    transport.when(Method::Get, "/employees").reply(json!([]));

    orchestrator
        .open_record(
            FormMode::Edit,
            &json!({
                "id": "e1",
                "name": "Ada",
                "office": {"floor": 3, "site": {"id": "s1", "name": "HQ"}}
            }),
            &HashMap::new(),
        )
        .unwrap();

    let record = orchestrator.form_record().unwrap();
    assert_eq!(record.get_path("office.site"), &json!("s1"));
    assert_eq!(selected_labels(&orchestrator, "office.site"), vec!["HQ"]);

    let outcome = orchestrator.submit().await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Saved(_)));
    assert!(transport.calls_to(Method::Get, "/sites").is_empty());

    let calls = transport.calls_to(Method::Patch, "/employees/e1");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].body,
        Some(json!({"name": "Ada", "office": {"floor": 3, "site": {"id": "s1"}}}))
    );
}

#[tokio::test]
async fn delete_needs_confirmation() {
    let (orchestrator, transport) = setup(bank(), EngineConfig::default());
    transport.when(Method::Get, "/banks").once().reply(bank_records());
    transport.when(Method::Delete, "/banks/b1").reply(Value::Null);
    transport
        .when(Method::Get, "/banks")
        .reply(json!([{"id": "b2", "name": "Commonwealth Bank"}]));

    orchestrator.refresh().await.unwrap();
    assert_eq!(orchestrator.confirm_delete().await, Err(EngineError::NoPendingDelete));

    orchestrator.request_delete("b1").unwrap();
    assert_eq!(orchestrator.pending_delete().as_deref(), Some("b1"));
    orchestrator.cancel_delete().unwrap();
    assert!(transport.calls_to(Method::Delete, "/banks/b1").is_empty());

    orchestrator.request_delete("b1").unwrap();
    orchestrator.confirm_delete().await.unwrap();
    assert_eq!(transport.calls_to(Method::Delete, "/banks/b1").len(), 1);
    assert_eq!(orchestrator.pending_delete(), None);
    assert_eq!(orchestrator.table().rows.len(), 1);
}

#[tokio::test]
async fn failed_delete_keeps_rows() {
    let (orchestrator, transport) = setup(bank(), EngineConfig::default());
    transport.when(Method::Get, "/banks").reply(bank_records());
    transport
        .when(Method::Delete, "/banks/b1")
        .fail(TransportError::status(409, "Bank has accounts"));

    orchestrator.refresh().await.unwrap();
    orchestrator.request_delete("b1").unwrap();
    let err = orchestrator.confirm_delete().await.unwrap_err();
    assert_eq!(err.user_message(), "Bank has accounts");
    assert_eq!(orchestrator.table().rows.len(), 2);
    assert_eq!(transport.calls_to(Method::Get, "/banks").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn newer_list_response_wins() {
    let (orchestrator, transport) = setup(bank(), EngineConfig::default());
    transport
        .when(Method::Get, "/banks")
        .once()
        .delay(Duration::from_secs(1))
        .reply(json!([{"id": "old", "name": "Old"}]));
    transport.when(Method::Get, "/banks").reply(bank_records());

    let (first, second) = tokio::join!(orchestrator.refresh(), async {
        tokio::task::yield_now().await;
        orchestrator.refresh().await
    });
    assert!(first.is_ok());
    assert!(second.is_ok());
    let ids: Vec<Option<String>> = orchestrator.table().rows.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![Some("b1".to_string()), Some("b2".to_string())]);
}

#[derive(Default)]
struct AccountWatcher {
    selected: Mutex<Vec<Value>>,
}

impl FieldListener for AccountWatcher {
    fn on_change(&self, field: &str, value: &Value, record: &mut FormRecord) {
        if field == "accountNumber" && value.as_str().is_some_and(|v| v.starts_with('0')) {
            record.set("primary", json!(true));
        }
    }

    fn on_select(&self, _field: &str, selected: &Value) {
        self.selected.lock().push(selected.clone());
    }
}

#[tokio::test]
async fn listeners_observe_changes_and_selections() {
    let (orchestrator, _) = setup(bank_account(), EngineConfig::default());
    let listener = Arc::new(AccountWatcher::default());
    orchestrator.add_listener(listener.clone());

    orchestrator.open_create(&Map::new()).unwrap();
    orchestrator.set_field("accountNumber", json!("0123")).unwrap();
    orchestrator
        .select("bank", &json!({"id": "b2", "name": "Commonwealth Bank"}))
        .unwrap();

    assert_eq!(orchestrator.form_record().unwrap().get("primary"), &json!(true));
    assert_eq!(listener.selected.lock().len(), 1);
}
