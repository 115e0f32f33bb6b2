//! Orchestration tests over a real HTTP tool host and scripted policies.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use runtime::{
    Backend, Decision, Error, ModelError, ModelRequest, Session, SessionConfig, ToolRequest,
    ToolResult, Turn, bind,
};
use storage::EventStore;
use wire::{HostClient, ToolDescriptor};

// ─── Test host ───────────────────────────────────────────────────────────────

struct TestHostState {
    descriptors: Vec<ToolDescriptor>,
    delays: HashMap<String, Duration>,
    invocations: AtomicUsize,
    last_arguments: Mutex<Option<Value>>,
}

async fn tools_handler(State(state): State<Arc<TestHostState>>) -> Json<Vec<ToolDescriptor>> {
    Json(state.descriptors.clone())
}

async fn invoke_handler(
    State(state): State<Arc<TestHostState>>,
    Path(name): Path<String>,
    Json(args): Json<Value>,
) -> Json<Value> {
    state.invocations.fetch_add(1, Ordering::SeqCst);
    *state.last_arguments.lock().unwrap() = Some(args.clone());
    if let Some(delay) = state.delays.get(&name) {
        tokio::time::sleep(*delay).await;
    }
    let echoed = args.get("text").cloned().unwrap_or_else(|| args.clone());
    Json(json!({ "result": echoed }))
}

async fn spawn_test_host(
    descriptors: Vec<ToolDescriptor>,
    delays: HashMap<String, Duration>,
) -> (String, Arc<TestHostState>) {
    let state = Arc::new(TestHostState {
        descriptors,
        delays,
        invocations: AtomicUsize::new(0),
        last_arguments: Mutex::new(None),
    });
    let app = Router::new()
        .route("/tools", get(tools_handler))
        .route("/tools/{name}", post(invoke_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

fn descriptor(name: &str) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        format!("test tool {name}"),
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": []
        }),
    )
}

// ─── Scripted policies ───────────────────────────────────────────────────────

enum Step {
    Answer(String),
    CallTools(Vec<ToolRequest>),
    NetworkError,
    Stall(Duration),
}

struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
}

impl ScriptedBackend {
    fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
        }
    }
}

impl Backend for ScriptedBackend {
    async fn decide(&self, _request: ModelRequest<'_>) -> Result<Decision, ModelError> {
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted");
        match step {
            Step::Answer(text) => Ok(Decision::Answer(text)),
            Step::CallTools(requests) => Ok(Decision::CallTools(requests)),
            Step::NetworkError => Err(ModelError::Network("backend unreachable".into())),
            Step::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(Decision::Answer("late".into()))
            }
        }
    }
}

/// A policy stuck in a loop: requests the same tool forever.
struct RepeatingBackend;

impl Backend for RepeatingBackend {
    async fn decide(&self, _request: ModelRequest<'_>) -> Result<Decision, ModelError> {
        Ok(Decision::CallTools(vec![ToolRequest::new(
            "call-again",
            "echo",
            json!({"text": "again"}),
        )]))
    }
}

fn test_config() -> SessionConfig {
    SessionConfig {
        max_rounds: 8,
        policy_timeout: Duration::from_secs(5),
    }
}

fn session_with<B: Backend>(
    backend: B,
    tools: runtime::ToolSet,
    config: SessionConfig,
) -> Session<B> {
    Session::new(EventStore::in_memory().unwrap(), backend, tools, config).unwrap()
}

// ─── Binder properties ───────────────────────────────────────────────────────

#[tokio::test]
async fn bind_produces_one_tool_per_descriptor_and_roundtrips_arguments() {
    let (base, state) = spawn_test_host(
        vec![descriptor("echo"), descriptor("grep"), descriptor("ls")],
        HashMap::new(),
    )
    .await;

    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(tools.len(), 3);
    assert!(tools.collisions().is_empty());

    let nested = json!({
        "text": "hi",
        "options": {"depth": 3, "flags": ["a", "b"]}
    });
    let result = tools.get("echo").unwrap().invoke(nested.clone()).await;
    assert!(!result.is_failure());
    assert_eq!(state.last_arguments.lock().unwrap().clone(), Some(nested));
}

#[tokio::test]
async fn duplicate_discovery_names_keep_first_and_report_collision() {
    let mut first = descriptor("echo");
    first.description = "the real one".into();
    let mut second = descriptor("echo");
    second.description = "an impostor".into();

    let (base, _state) =
        spawn_test_host(vec![first, descriptor("grep"), second], HashMap::new()).await;

    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools.collisions(), &["echo".to_string()]);
    assert_eq!(
        tools.get("echo").unwrap().descriptor().description,
        "the real one"
    );
}

#[tokio::test]
async fn unreachable_host_fails_discovery_after_retries() {
    // Nothing listens on port 9; connections are refused immediately.
    let client = HostClient::new("http://127.0.0.1:9").with_timeout(Duration::from_millis(200));
    let err = bind(client, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, Error::Discovery(_)));
}

// ─── Orchestrator properties ─────────────────────────────────────────────────

#[tokio::test]
async fn echo_scenario_end_to_end() {
    let (base, _state) = spawn_test_host(vec![descriptor("echo")], HashMap::new()).await;
    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();

    let backend = ScriptedBackend::new([
        Step::CallTools(vec![ToolRequest::new("c1", "echo", json!({"text": "hi"}))]),
        Step::Answer("hi".into()),
    ]);
    let mut session = session_with(backend, tools, test_config());

    let answer = session.process_turn("say hi via the tool").await.unwrap();
    assert_eq!(answer, "hi");

    let turns = session.conversation();
    assert_eq!(turns.len(), 4);
    assert!(matches!(&turns[0], Turn::User { text } if text == "say hi via the tool"));
    assert!(matches!(&turns[1], Turn::ToolCall { name, .. } if name == "echo"));
    match &turns[2] {
        Turn::ToolCallResult { result, .. } => {
            assert_eq!(result.output(), Some(&json!({"result": "hi"})));
        }
        other => panic!("expected tool result, got {other:?}"),
    }
    assert!(matches!(&turns[3], Turn::Assistant { text } if text == "hi"));
}

#[tokio::test]
async fn results_are_appended_in_request_order_not_completion_order() {
    let delays = HashMap::from([
        ("slow".to_string(), Duration::from_millis(300)),
        ("fast".to_string(), Duration::ZERO),
    ]);
    let (base, _state) =
        spawn_test_host(vec![descriptor("slow"), descriptor("fast")], delays).await;
    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();

    let backend = ScriptedBackend::new([
        Step::CallTools(vec![
            ToolRequest::new("c1", "slow", json!({"text": "first"})),
            ToolRequest::new("c2", "fast", json!({"text": "second"})),
        ]),
        Step::Answer("done".into()),
    ]);
    let mut session = session_with(backend, tools, test_config());
    session.process_turn("race them").await.unwrap();

    let names: Vec<&str> = session
        .conversation()
        .iter()
        .filter_map(|turn| match turn {
            Turn::ToolCall { name, .. } => Some(name.as_str()),
            Turn::ToolCallResult { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["slow", "slow", "fast", "fast"]);

    for turn in session.conversation() {
        if let Turn::ToolCallResult { result, .. } = turn {
            assert!(!result.is_failure());
        }
    }
}

#[tokio::test]
async fn unbound_tool_synthesizes_not_found_without_network_calls() {
    let (base, state) = spawn_test_host(vec![descriptor("echo")], HashMap::new()).await;
    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();

    let backend = ScriptedBackend::new([
        Step::CallTools(vec![ToolRequest::new("c1", "delete", json!({"path": "x"}))]),
        Step::Answer("that tool does not exist".into()),
    ]);
    let mut session = session_with(backend, tools, test_config());
    let answer = session.process_turn("delete something").await.unwrap();
    assert_eq!(answer, "that tool does not exist");

    assert_eq!(state.invocations.load(Ordering::SeqCst), 0);
    match &session.conversation()[2] {
        Turn::ToolCallResult { result, .. } => {
            assert_eq!(result, &ToolResult::failure("ToolNotFound"));
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn round_limit_yields_bounded_loop_exceeded_with_complete_rounds_only() {
    let (base, _state) = spawn_test_host(vec![descriptor("echo")], HashMap::new()).await;
    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();

    let config = SessionConfig {
        max_rounds: 3,
        ..test_config()
    };
    let mut session = session_with(RepeatingBackend, tools, config);

    let err = session.process_turn("loop forever").await.unwrap_err();
    assert!(matches!(err, Error::BoundedLoopExceeded(3)));

    // One user turn plus three complete call/result rounds, nothing partial.
    let turns = session.conversation();
    assert_eq!(turns.len(), 7);
    for round in 0..3 {
        assert!(matches!(&turns[1 + round * 2], Turn::ToolCall { .. }));
        assert!(matches!(&turns[2 + round * 2], Turn::ToolCallResult { .. }));
    }
}

#[tokio::test]
async fn tool_timeout_becomes_failure_data_not_an_error() {
    let delays = HashMap::from([("echo".to_string(), Duration::from_millis(500))]);
    let (base, _state) = spawn_test_host(vec![descriptor("echo")], delays).await;
    // The bound per-invocation deadline is well under the tool's delay.
    let tools = bind(HostClient::new(&base), Duration::from_millis(50))
        .await
        .unwrap();

    let backend = ScriptedBackend::new([
        Step::CallTools(vec![ToolRequest::new("c1", "echo", json!({"text": "hi"}))]),
        Step::Answer("the tool timed out".into()),
    ]);
    let mut session = session_with(backend, tools, test_config());

    let answer = session.process_turn("slow echo").await.unwrap();
    assert_eq!(answer, "the tool timed out");
    match &session.conversation()[2] {
        Turn::ToolCallResult { result, .. } => {
            assert_eq!(result, &ToolResult::failure("timeout"));
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn policy_network_failure_is_retried_once() {
    let (base, _state) = spawn_test_host(vec![descriptor("echo")], HashMap::new()).await;
    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();

    let backend = ScriptedBackend::new([Step::NetworkError, Step::Answer("recovered".into())]);
    let mut session = session_with(backend, tools, test_config());
    assert_eq!(session.process_turn("hello").await.unwrap(), "recovered");
}

#[tokio::test]
async fn repeated_policy_failure_aborts_turn_but_session_survives() {
    let (base, _state) = spawn_test_host(vec![descriptor("echo")], HashMap::new()).await;
    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();

    let backend = ScriptedBackend::new([
        Step::NetworkError,
        Step::NetworkError,
        Step::Answer("back online".into()),
    ]);
    let mut session = session_with(backend, tools, test_config());

    let err = session.process_turn("first try").await.unwrap_err();
    assert!(matches!(err, Error::PolicyUnavailable(_)));
    assert_eq!(session.conversation().len(), 1); // user turn preserved

    let answer = session.process_turn("second try").await.unwrap();
    assert_eq!(answer, "back online");
    assert_eq!(session.conversation().len(), 3);
}

#[tokio::test]
async fn policy_timeout_is_policy_unavailable() {
    let (base, _state) = spawn_test_host(vec![descriptor("echo")], HashMap::new()).await;
    let tools = bind(HostClient::new(&base), Duration::from_secs(5))
        .await
        .unwrap();

    let config = SessionConfig {
        policy_timeout: Duration::from_millis(50),
        ..test_config()
    };
    let backend = ScriptedBackend::new([Step::Stall(Duration::from_secs(10))]);
    let mut session = session_with(backend, tools, config);

    let err = session.process_turn("hello").await.unwrap_err();
    assert!(matches!(err, Error::PolicyUnavailable(_)));
}

#[tokio::test]
async fn full_stack_turn_against_the_real_host() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(host::standard_registry(
        dir.path(),
        Duration::from_secs(5),
        None,
    ));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = host::router(registry);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let tools = bind(HostClient::new(format!("http://{addr}")), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(tools.len(), 8);

    let backend = ScriptedBackend::new([
        Step::CallTools(vec![ToolRequest::new(
            "c1",
            "write_file",
            json!({"path": "notes.txt", "content": "remember this"}),
        )]),
        Step::CallTools(vec![ToolRequest::new(
            "c2",
            "read_file",
            json!({"path": "notes.txt"}),
        )]),
        Step::Answer("saved and verified".into()),
    ]);
    let mut session = session_with(backend, tools, test_config());

    let answer = session.process_turn("save a note").await.unwrap();
    assert_eq!(answer, "saved and verified");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "remember this"
    );

    // The read round fed the file contents back as result data.
    let read_result = session
        .conversation()
        .iter()
        .rev()
        .find_map(|turn| match turn {
            Turn::ToolCallResult { name, result, .. } if name == "read_file" => Some(result),
            _ => None,
        })
        .unwrap();
    assert_eq!(read_result.output(), Some(&json!("remember this")));
}

#[tokio::test]
async fn cancellation_keeps_completed_results_and_drops_in_flight_calls() {
    let delays = HashMap::from([
        ("fast".to_string(), Duration::ZERO),
        ("slow".to_string(), Duration::from_secs(30)),
    ]);
    let (base, _state) =
        spawn_test_host(vec![descriptor("fast"), descriptor("slow")], delays).await;
    let tools = bind(HostClient::new(&base), Duration::from_secs(60))
        .await
        .unwrap();

    let backend = ScriptedBackend::new([Step::CallTools(vec![
        ToolRequest::new("c1", "fast", json!({"text": "quick"})),
        ToolRequest::new("c2", "slow", json!({"text": "stuck"})),
    ])]);
    let mut session = session_with(backend, tools, test_config());
    let cancel = session.cancel_handle();

    // `Session` owns a rusqlite connection and is intentionally `!Send`, so it
    // cannot cross a `tokio::spawn` boundary. Drive it on the current thread via
    // a `LocalSet` while cancelling concurrently from the same task.
    let local = tokio::task::LocalSet::new();
    let (session, result) = local
        .run_until(async move {
            let turn = tokio::task::spawn_local(async move {
                let result = session.process_turn("go").await;
                (session, result)
            });

            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();

            turn.await.unwrap()
        })
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));

    // The fast call completed and kept its turns; the slow call appended
    // nothing.
    let turns = session.conversation();
    assert_eq!(turns.len(), 3);
    assert!(matches!(&turns[1], Turn::ToolCall { name, .. } if name == "fast"));
    assert!(matches!(&turns[2], Turn::ToolCallResult { name, .. } if name == "fast"));
}
