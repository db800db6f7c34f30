use super::*;

use std::collections::{HashMap, VecDeque};

use serde_json::json;
use shared::{
    domain::{InstanceId, ViewInstance},
    protocol::ForestResult,
};
use tokio::sync::{oneshot, Mutex};

use crate::{error::TransportError, normalize::normalize};

type TransportResult = Result<Option<ApplicationSnapshot>, TransportError>;

#[derive(Default)]
struct ScriptedTransport {
    navigations: Mutex<VecDeque<TransportResult>>,
    commands: Mutex<VecDeque<TransportResult>>,
    command_calls: Mutex<Vec<(String, String, Value)>>,
}

impl ScriptedTransport {
    fn navigating_to(results: Vec<TransportResult>) -> Self {
        Self {
            navigations: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    fn with_commands(self, results: Vec<TransportResult>) -> Self {
        Self {
            commands: Mutex::new(results.into()),
            ..self
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn navigate(&self, _template: &str) -> TransportResult {
        self.navigations.lock().await.pop_front().unwrap_or(Ok(None))
    }

    async fn invoke_command(
        &self,
        instance_id: &str,
        command: &str,
        arg: &Value,
    ) -> TransportResult {
        self.command_calls.lock().await.push((
            instance_id.to_string(),
            command.to_string(),
            arg.clone(),
        ));
        self.commands.lock().await.pop_front().unwrap_or(Ok(None))
    }
}

/// Holds each navigation or command, keyed by template or command name, until
/// the test releases it with a snapshot.
#[derive(Default)]
struct GatedTransport {
    gates: Mutex<HashMap<String, oneshot::Receiver<ApplicationSnapshot>>>,
}

impl GatedTransport {
    async fn gate(&self, key: &str) -> oneshot::Sender<ApplicationSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(key.to_string(), rx);
        tx
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn navigate(&self, template: &str) -> TransportResult {
        let gate = self.gates.lock().await.remove(template);
        match gate {
            Some(rx) => Ok(rx.await.ok()),
            None => Ok(None),
        }
    }

    async fn invoke_command(
        &self,
        _instance_id: &str,
        command: &str,
        _arg: &Value,
    ) -> TransportResult {
        let gate = self.gates.lock().await.remove(command);
        match gate {
            Some(rx) => Ok(rx.await.ok()),
            None => Ok(None),
        }
    }
}

fn page(template: &str) -> ApplicationSnapshot {
    normalize(ForestResult::new(
        template,
        vec![
            ViewInstance::new("shell", "Shell").with_region("main", ["editor"]),
            ViewInstance::new("editor", "Editor")
                .with_model(json!({"text": "draft"}))
                .with_command("save"),
        ],
    ))
}

fn update(template: &str, text: &str) -> ApplicationSnapshot {
    normalize(ForestResult::new(
        template,
        vec![ViewInstance::new("editor", "Editor")
            .with_model(json!({ "text": text }))
            .with_command("save")],
    ))
}

fn unavailable() -> TransportError {
    TransportError::InvalidUrl {
        target: "http://forest.invalid".to_string(),
        reason: "unreachable".to_string(),
    }
}

#[tokio::test]
async fn new_engine_is_active_and_bound_to_itself() {
    let engine = Engine::new(ScriptedTransport::default());
    let context = engine.current_context();

    assert_eq!(engine.phase(), StorePhase::Active);
    assert!(context.state.is_empty());
    assert!(context.engine.is_attached());
    assert!(context.engine.ptr_eq(&EngineRef::attach(&engine)));
}

#[tokio::test]
async fn navigate_replaces_context_and_notifies() {
    let engine = Engine::new(ScriptedTransport::navigating_to(vec![Ok(Some(page("home")))]));
    let mut rx = engine.subscribe();

    let context = engine
        .navigate("home")
        .await
        .expect("navigate")
        .expect("context");

    assert!(Arc::ptr_eq(&context, &engine.current_context()));
    assert_eq!(context.state.template, "home");
    assert_eq!(context.state.roots(), &[InstanceId::from("shell")]);
    assert!(context.engine.is_attached());

    let notified = rx.recv().await.expect("notification");
    assert!(Arc::ptr_eq(&notified, &context));
}

#[tokio::test]
async fn navigate_without_update_is_a_no_op() {
    let engine = Engine::new(ScriptedTransport::navigating_to(vec![
        Ok(Some(page("home"))),
        Ok(None),
    ]));
    engine.navigate("home").await.expect("navigate");
    let before = engine.current_context();

    let result = engine.navigate("elsewhere").await.expect("navigate");

    assert!(result.is_none());
    assert!(Arc::ptr_eq(&before, &engine.current_context()));
}

#[tokio::test]
async fn navigate_transport_failure_is_explicit_and_leaves_state() {
    let engine = Engine::new(ScriptedTransport::navigating_to(vec![Err(unavailable())]));
    let before = engine.current_context();

    let err = engine.navigate("home").await.expect_err("must fail");

    assert!(matches!(err, EngineError::Transport(_)), "unexpected error: {err}");
    assert!(Arc::ptr_eq(&before, &engine.current_context()));
}

#[tokio::test]
async fn invoke_command_merges_and_keeps_template() {
    let transport = Arc::new(
        ScriptedTransport::navigating_to(vec![Ok(Some(page("home")))])
            .with_commands(vec![Ok(Some(update("", "saved")))]),
    );
    let engine = Engine::new(Arc::clone(&transport));
    engine.navigate("home").await.expect("navigate");

    let merged = engine
        .invoke_command("editor", "save", json!({"text": "saved"}))
        .await
        .expect("invoke")
        .expect("merged");

    assert_eq!(merged.state.template, "home");
    assert_eq!(merged.state.instances.len(), 1);
    assert_eq!(
        merged.state.instance("editor").expect("editor").model,
        json!({"text": "saved"})
    );
    assert!(Arc::ptr_eq(&merged, &engine.current_context()));

    let calls = transport.command_calls.lock().await;
    assert_eq!(
        calls.as_slice(),
        &[(
            "editor".to_string(),
            "save".to_string(),
            json!({"text": "saved"})
        )]
    );
}

#[tokio::test]
async fn invoke_command_without_update_keeps_context() {
    let engine = Engine::new(
        ScriptedTransport::navigating_to(vec![Ok(Some(page("home")))])
            .with_commands(vec![Ok(None)]),
    );
    engine.navigate("home").await.expect("navigate");
    let before = engine.current_context();

    let result = engine
        .invoke_command("editor", "save", Value::Null)
        .await
        .expect("invoke");

    assert!(result.is_none());
    assert!(Arc::ptr_eq(&before, &engine.current_context()));
}

#[tokio::test]
async fn invoke_command_failure_is_returned() {
    let engine = Engine::new(ScriptedTransport::default().with_commands(vec![Err(unavailable())]));

    let err = engine
        .invoke_command("editor", "save", Value::Null)
        .await
        .expect_err("must fail");

    assert!(matches!(err, EngineError::Transport(_)));
}

#[tokio::test]
async fn concurrent_commands_merge_in_completion_order() {
    let transport = Arc::new(GatedTransport::default());
    let first_gate = transport.gate("first").await;
    let second_gate = transport.gate("second").await;
    let engine = Engine::new(Arc::clone(&transport));

    let first = engine.spawn_invoke_command("editor", "first", Value::Null);
    let second = engine.spawn_invoke_command("editor", "second", Value::Null);

    second_gate
        .send(update("", "from-second"))
        .expect("release second");
    second.await.expect("join").expect("second");
    first_gate
        .send(update("", "from-first"))
        .expect("release first");
    first.await.expect("join").expect("first");

    let current = engine.current_context();
    assert_eq!(
        current.state.instance("editor").expect("editor").model,
        json!({"text": "from-first"})
    );
}

#[tokio::test]
async fn newer_navigation_does_not_suppress_older_one() {
    let transport = Arc::new(GatedTransport::default());
    let home_gate = transport.gate("home").await;
    let settings_gate = transport.gate("settings").await;
    let engine = Engine::new(Arc::clone(&transport));

    let older = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.navigate("home").await }
    });
    let newer = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.navigate("settings").await }
    });

    settings_gate
        .send(page("settings"))
        .expect("release settings");
    let settings = newer.await.expect("join").expect("settings");
    assert_eq!(settings.expect("context").state.template, "settings");

    home_gate.send(page("home")).expect("release home");
    let home = older.await.expect("join").expect("home");
    assert!(home.is_some());

    let current = engine.current_context();
    assert_eq!(current.state.template, "home");
    assert!(current.engine.is_attached());
}

#[tokio::test]
async fn dangling_references_are_accepted_by_default() {
    let broken = normalize(ForestResult::new(
        "broken",
        vec![ViewInstance::new("a", "A").with_region("main", ["ghost"])],
    ));
    let engine = Engine::new(ScriptedTransport::navigating_to(vec![Ok(Some(broken))]));

    let context = engine
        .navigate("broken")
        .await
        .expect("navigate")
        .expect("context");
    assert!(context.state.instance("ghost").is_none());
}

#[tokio::test]
async fn dangling_references_are_rejected_when_configured() {
    let broken = normalize(ForestResult::new(
        "broken",
        vec![ViewInstance::new("a", "A").with_region("main", ["ghost"])],
    ));
    let engine = Engine::with_options(
        ScriptedTransport::navigating_to(vec![Ok(Some(broken))]),
        EngineOptions {
            reject_dangling_references: true,
        },
    );
    let before = engine.current_context();

    let err = engine.navigate("broken").await.expect_err("must reject");

    match err {
        EngineError::DanglingReferences(refs) => {
            assert_eq!(refs.len(), 1);
            assert_eq!(refs[0].missing.as_str(), "ghost");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(Arc::ptr_eq(&before, &engine.current_context()));
}

#[tokio::test]
async fn view_context_is_built_from_current_state() {
    let engine = Engine::new(ScriptedTransport::navigating_to(vec![Ok(Some(page("home")))]));
    assert!(engine.view_context("editor").is_none());

    engine.navigate("home").await.expect("navigate");

    let view = engine.view_context("editor").expect("editor view");
    assert_eq!(view.name, "Editor");
    assert_eq!(view.model, json!({"text": "draft"}));
    assert!(view.command("save").is_some());
}

#[tokio::test]
async fn engine_ref_falls_back_to_noop_after_drop() {
    let engine = Engine::new(ScriptedTransport::default());
    let engine_ref = engine.current_context().engine.clone();
    drop(engine);

    assert!(!engine_ref.is_attached());
    let err = engine_ref
        .upgrade()
        .navigate("home")
        .await
        .expect_err("noop navigate fails");
    assert!(matches!(err, EngineError::Detached));
}

#[tokio::test]
async fn noop_engine_ignores_commands() {
    let noop = NoopEngine;
    let result = noop
        .invoke_command("a", "save", Value::Null)
        .await
        .expect("noop invoke");
    assert!(result.is_none());
    assert!(noop.current_context().state.is_empty());
    assert!(noop.subscribe().recv().await.is_err());
}

#[test]
fn engine_options_follow_client_settings() {
    let settings = ClientSettings {
        reject_dangling_references: true,
        ..ClientSettings::default()
    };
    assert!(EngineOptions::from(&settings).reject_dangling_references);
}
