#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_agent::*;
use switchyard_core::{
    ChatMessage, ChatOverrides, InboundMessage, LlmResponse, OutboundMessage, Role,
    SwitchyardError, SwitchyardResult, ToolCall, ToolDefinition, ToolResult, UserIdentity,
};

/// Replays scripted responses and records every conversation it was sent.
struct ScriptedLlm {
    responses: tokio::sync::Mutex<Vec<SwitchyardResult<LlmResponse>>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    fn new(responses: Vec<SwitchyardResult<LlmResponse>>) -> Arc<Self> {
        Arc::new(Self {
            responses: tokio::sync::Mutex::new(responses),
            seen: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: tokio::sync::Mutex::new(vec![Ok(LlmResponse::text("too late"))]),
            seen: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl LlmChat for ScriptedLlm {
    async fn chat(
        &self,
        _agent_id: &str,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
        _overrides: Option<&ChatOverrides>,
    ) -> SwitchyardResult<LlmResponse> {
        self.seen.lock().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            // Keep asking for tools once the script runs out.
            return Ok(LlmResponse::with_tool_calls(
                "",
                vec![ToolCall::new("again", "counter", "{}")],
            ));
        }
        responses.remove(0)
    }
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSender {
    fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, message: OutboundMessage) -> SwitchyardResult<()> {
        self.sent.lock().push(message);
        Ok(())
    }
}

struct CounterTool {
    definition: ToolDefinition,
    runs: AtomicU32,
}

impl CounterTool {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            definition: ToolDefinition {
                name: "counter".into(),
                description: "Counts invocations".into(),
                parameters: serde_json::json!({"type": "object"}),
            },
            runs: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Tool for CounterTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> SwitchyardResult<String> {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("run {n}"))
    }
}

struct Harness {
    llm: Arc<ScriptedLlm>,
    sender: Arc<RecordingSender>,
    counter: Arc<CounterTool>,
    pairing: Arc<InMemoryPairingService>,
    deps: AgentLoopDeps,
}

fn harness(llm: Arc<ScriptedLlm>, config: AgentLoopConfig) -> Harness {
    let sender = Arc::new(RecordingSender::default());
    let counter = CounterTool::new();
    let mut registry = ToolRegistry::new();
    registry.register(counter.clone()).unwrap();
    let pairing = Arc::new(InMemoryPairingService::new());
    pairing.pair("u1", "telegram", Some("ana".into()));

    let deps = AgentLoopDeps {
        llm: llm.clone(),
        tools: Arc::new(registry),
        pairing: pairing.clone(),
        sender: sender.clone(),
        hooks: HookChain::new(),
        config,
        system_prompt: "You are a helpful assistant.".into(),
        agent_id: None,
    };
    Harness {
        llm,
        sender,
        counter,
        pairing,
        deps,
    }
}

fn inbound(user_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        id: "m1".into(),
        channel_id: "telegram".into(),
        sender: UserIdentity::new(user_id, "telegram"),
        text: text.into(),
        timestamp: chrono::Utc::now(),
        overrides: None,
    }
}

fn counter_calls(ids: &[&str]) -> LlmResponse {
    LlmResponse::with_tool_calls(
        "",
        ids.iter()
            .map(|id| ToolCall::new(*id, "counter", "{}"))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// 1. Pairing gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unpaired_sender_never_reaches_router_or_tools() {
    let h = harness(
        ScriptedLlm::new(vec![Ok(LlmResponse::text("hi"))]),
        AgentLoopConfig::default(),
    );

    let result = run_agent_loop(&inbound("stranger", "hello"), &h.deps).await;
    assert_eq!(result.abort_reason, Some(AbortReason::Unpaired));
    assert_eq!(result.iterations, 0);
    assert_eq!(result.tool_calls_total, 0);
    assert_eq!(h.llm.calls(), 0);
    assert_eq!(h.counter.runs.load(Ordering::SeqCst), 0);
    assert_eq!(h.sender.texts(), vec![UNPAIRED_MESSAGE]);
}

#[tokio::test]
async fn revoked_sender_is_rejected() {
    let h = harness(ScriptedLlm::new(vec![]), AgentLoopConfig::default());
    h.pairing.revoke("u1", "telegram");

    let result = run_agent_loop(&inbound("u1", "hello"), &h.deps).await;
    assert_eq!(result.abort_reason, Some(AbortReason::Unpaired));
    assert_eq!(h.llm.calls(), 0);
}

// ---------------------------------------------------------------------------
// 2. Final answers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_answer_is_sent() {
    let h = harness(
        ScriptedLlm::new(vec![Ok(LlmResponse::text("Hello there"))]),
        AgentLoopConfig::default(),
    );

    let result = run_agent_loop(&inbound("u1", "hello"), &h.deps).await;
    assert_eq!(result.final_response.as_deref(), Some("Hello there"));
    assert_eq!(result.abort_reason, None);
    assert_eq!(result.iterations, 1);
    assert_eq!(h.sender.texts(), vec!["Hello there"]);

    let first = &h.llm.seen.lock()[0];
    assert_eq!(first[0].role, Role::System);
    assert_eq!(first[1].role, Role::User);
    assert_eq!(first[1].content, "hello");

    let record = h.pairing.list().pop().unwrap();
    assert!(record.last_seen_at.is_some());
}

#[tokio::test]
async fn empty_answer_gets_placeholder() {
    let h = harness(
        ScriptedLlm::new(vec![Ok(LlmResponse::text(""))]),
        AgentLoopConfig::default(),
    );

    let result = run_agent_loop(&inbound("u1", "hello"), &h.deps).await;
    assert_eq!(
        result.final_response.as_deref(),
        Some(EMPTY_RESPONSE_PLACEHOLDER)
    );
    assert_eq!(h.sender.texts(), vec![EMPTY_RESPONSE_PLACEHOLDER]);
}

// ---------------------------------------------------------------------------
// 3. Tool execution and the tool-call cap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tool_results_feed_the_next_iteration() {
    let h = harness(
        ScriptedLlm::new(vec![
            Ok(counter_calls(&["c1"])),
            Ok(LlmResponse::text("done")),
        ]),
        AgentLoopConfig::default(),
    );

    let result = run_agent_loop(&inbound("u1", "count"), &h.deps).await;
    assert_eq!(result.final_response.as_deref(), Some("done"));
    assert_eq!(result.iterations, 2);
    assert_eq!(result.tool_calls_total, 1);

    let second = &h.llm.seen.lock()[1];
    assert_eq!(second.len(), 4);
    assert_eq!(second[2].role, Role::Assistant);
    assert_eq!(second[2].tool_calls.len(), 1);
    assert_eq!(second[3].role, Role::Tool);
    assert_eq!(second[3].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(second[3].content, "run 1");
}

#[tokio::test]
async fn calls_beyond_cap_are_answered_without_running() {
    let config = AgentLoopConfig {
        max_tool_calls: 2,
        ..Default::default()
    };
    let h = harness(
        ScriptedLlm::new(vec![
            Ok(counter_calls(&["c1", "c2", "c3"])),
            Ok(LlmResponse::text("ok")),
        ]),
        config,
    );

    let result = run_agent_loop(&inbound("u1", "count"), &h.deps).await;
    assert_eq!(result.tool_calls_total, 2);
    assert_eq!(h.counter.runs.load(Ordering::SeqCst), 2);

    let second = &h.llm.seen.lock()[1];
    let capped = second
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("c3"))
        .unwrap();
    assert_eq!(capped.content, MAX_TOOL_CALLS_MESSAGE);
}

#[tokio::test]
async fn unknown_tool_becomes_error_result() {
    let h = harness(
        ScriptedLlm::new(vec![
            Ok(LlmResponse::with_tool_calls(
                "",
                vec![ToolCall::new("c1", "launch_rockets", "{}")],
            )),
            Ok(LlmResponse::text("sorry")),
        ]),
        AgentLoopConfig::default(),
    );

    let result = run_agent_loop(&inbound("u1", "go"), &h.deps).await;
    assert_eq!(result.final_response.as_deref(), Some("sorry"));
    assert_eq!(result.tool_calls_total, 1);
    let second = &h.llm.seen.lock()[1];
    assert_eq!(second[3].content, "Error: Unknown tool \"launch_rockets\"");
}

// ---------------------------------------------------------------------------
// 4. Hooks
// ---------------------------------------------------------------------------

struct DenyAll {
    after_tool: AtomicU32,
}

#[async_trait]
impl LifecycleHook for DenyAll {
    async fn before_tool_exec(&self, _ctx: &ToolExecContext<'_>) -> HookDecision {
        HookDecision::Deny
    }

    async fn after_tool_exec(&self, _result: &ToolResult) {
        self.after_tool.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn denied_tool_counts_but_does_not_run() {
    let mut h = harness(
        ScriptedLlm::new(vec![
            Ok(counter_calls(&["c1"])),
            Ok(LlmResponse::text("understood")),
        ]),
        AgentLoopConfig::default(),
    );
    let hook = Arc::new(DenyAll {
        after_tool: AtomicU32::new(0),
    });
    h.deps.hooks.add(hook.clone());

    let result = run_agent_loop(&inbound("u1", "count"), &h.deps).await;
    assert_eq!(result.tool_calls_total, 1);
    assert_eq!(h.counter.runs.load(Ordering::SeqCst), 0);
    assert_eq!(hook.after_tool.load(Ordering::SeqCst), 0);
    assert_eq!(h.llm.seen.lock()[1][3].content, TOOL_DENIED_MESSAGE);
}

struct SystemRewriter {
    tag: &'static str,
}

#[async_trait]
impl LifecycleHook for SystemRewriter {
    async fn before_llm(&self, mut ctx: LlmContext) -> LlmContext {
        ctx.messages[0].content.push_str(self.tag);
        ctx
    }
}

#[derive(Default)]
struct ErrorRecorder {
    phases: Mutex<Vec<ErrorPhase>>,
}

#[async_trait]
impl LifecycleHook for ErrorRecorder {
    async fn on_error(&self, ctx: &ErrorContext<'_>) {
        self.phases.lock().push(ctx.phase);
    }
}

#[tokio::test]
async fn before_llm_hooks_fold_in_registration_order() {
    let mut h = harness(
        ScriptedLlm::new(vec![Ok(LlmResponse::text("hi"))]),
        AgentLoopConfig::default(),
    );
    h.deps.hooks.add(Arc::new(SystemRewriter { tag: " [a]" }));
    h.deps.hooks.add(Arc::new(SystemRewriter { tag: " [b]" }));

    run_agent_loop(&inbound("u1", "hello"), &h.deps).await;
    assert_eq!(
        h.llm.seen.lock()[0][0].content,
        "You are a helpful assistant. [a] [b]"
    );
}

// ---------------------------------------------------------------------------
// 5. Abort paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn router_failure_aborts_with_llm_error() {
    let mut h = harness(
        ScriptedLlm::new(vec![Err(SwitchyardError::AllCandidatesExhausted {
            last_error: "HTTP error: 503".into(),
        })]),
        AgentLoopConfig::default(),
    );
    let recorder = Arc::new(ErrorRecorder::default());
    h.deps.hooks.add(recorder.clone());

    let result = run_agent_loop(&inbound("u1", "hello"), &h.deps).await;
    assert_eq!(result.abort_reason, Some(AbortReason::LlmError));
    assert_eq!(result.iterations, 1);
    assert_eq!(*recorder.phases.lock(), vec![ErrorPhase::Llm]);
    assert_eq!(h.sender.texts(), vec![LLM_UNAVAILABLE_MESSAGE]);
}

#[tokio::test]
async fn iteration_budget_is_enforced() {
    let config = AgentLoopConfig {
        max_iterations: 3,
        max_tool_calls: 2,
        ..Default::default()
    };
    // Empty script: the backend asks for a tool forever.
    let h = harness(ScriptedLlm::new(vec![]), config);

    let result = run_agent_loop(&inbound("u1", "loop"), &h.deps).await;
    assert_eq!(result.abort_reason, Some(AbortReason::MaxIterations));
    assert_eq!(result.iterations, 3);
    assert_eq!(result.tool_calls_total, 2);
    assert_eq!(h.llm.calls(), 3);
    assert_eq!(h.counter.runs.load(Ordering::SeqCst), 2);
    assert_eq!(h.sender.texts(), vec![MAX_ITERATIONS_MESSAGE]);
}

#[tokio::test]
async fn deadline_drops_slow_router_call() {
    let config = AgentLoopConfig {
        timeout_ms: 50,
        ..Default::default()
    };
    let h = harness(ScriptedLlm::slow(Duration::from_secs(30)), config);

    let started = std::time::Instant::now();
    let result = run_agent_loop(&inbound("u1", "hello"), &h.deps).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.abort_reason, Some(AbortReason::Timeout));
    assert_eq!(result.final_response, None);
    assert_eq!(result.iterations, 1);
    assert_eq!(h.sender.texts(), vec![TIMEOUT_MESSAGE]);
}
