use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_adapters::{FakeDispatcherClient, SumHandler};
use agent_core::{AgentPhase, Assignment, BotId, FakeClock, HandlerRegistry, Job, RawJob};
use agent_storage::Outbox;
use parking_lot::RwLock;
use serde_json::json;

use super::Scheduler;

fn raw_job(id: &str, op: &str, payload: serde_json::Value) -> RawJob {
    RawJob {
        id: Some(id.to_string()),
        op: Some(op.to_string()),
        payload: Some(payload),
        lease_until: Some("2026-01-01T00:00:00Z".to_string()),
    }
}

fn scheduler(
    client: FakeDispatcherClient,
    handlers: HandlerRegistry,
    outbox: Arc<Outbox>,
    max_concurrency: u32,
) -> Scheduler<FakeClock> {
    Scheduler::new(
        Arc::new(client),
        BotId::new("bot-1"),
        "inst-1".to_string(),
        handlers,
        outbox,
        Assignment { operations: vec!["sum".to_string()], max_concurrency, paused: false },
        5,
        FakeClock::new(),
        Arc::new(RwLock::new(AgentPhase::Idle)),
    )
}

fn handlers_with_sum() -> HandlerRegistry {
    let mut reg = HandlerRegistry::new();
    reg.register("sum", SumHandler);
    reg
}

#[tokio::test]
async fn happy_path_reports_complete() {
    let client = FakeDispatcherClient::new();
    client.push_claim_batch(vec![raw_job("job_1", "sum", json!({"a": 2, "b": 3}))]);
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));

    let s = scheduler(client.clone(), handlers_with_sum(), outbox.clone(), 2);
    s.tick().await.unwrap();

    let reports = client.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].payload["result"]["result"], 5.0);
    assert!(outbox.drain(10).unwrap().is_empty(), "nothing should land in the outbox on success");
}

#[tokio::test]
async fn handler_failure_reports_fail_not_a_tick_error() {
    let client = FakeDispatcherClient::new();
    client.push_claim_batch(vec![raw_job("job_1", "sum", json!({"a": 1}))]);
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));

    let s = scheduler(client.clone(), handlers_with_sum(), outbox, 2);
    s.tick().await.unwrap();

    let reports = client.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].action, agent_core::Action::Fail);
    assert!(reports[0].payload["error"].as_str().unwrap().contains("payload.b"));
}

#[tokio::test]
async fn missing_handler_is_reported_as_a_job_failure() {
    let client = FakeDispatcherClient::new();
    client.push_claim_batch(vec![raw_job("job_1", "unknown_op", json!({}))]);
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));

    let s = scheduler(client.clone(), HandlerRegistry::new(), outbox, 2);
    s.tick().await.unwrap();

    let reports = client.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].action, agent_core::Action::Fail);
    assert_eq!(reports[0].payload["error"], "no handler registered for operation `unknown_op`");
}

#[tokio::test]
async fn report_failure_falls_back_to_outbox_and_next_tick_flushes_it() {
    let client = FakeDispatcherClient::new();
    client.push_claim_batch(vec![raw_job("job_1", "sum", json!({"a": 1, "b": 1}))]);
    client.fail_next_report();
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));

    let s = scheduler(client.clone(), handlers_with_sum(), outbox.clone(), 2);
    s.tick().await.unwrap();

    assert_eq!(client.reports().len(), 1, "the failed attempt still counts as one recorded call");
    let queued = outbox.drain(10).unwrap();
    assert_eq!(queued.len(), 1, "the lost report must be durably queued");
    assert_eq!(queued[0].job_id, agent_core::JobId::new("job_1"));

    outbox.append(&queued[0]).unwrap();
    let s2 = scheduler(client.clone(), handlers_with_sum(), outbox.clone(), 2);
    s2.tick().await.unwrap();

    assert_eq!(client.reports().len(), 2, "the retried flush succeeds on the next tick");
    assert!(outbox.drain(10).unwrap().is_empty());
}

#[tokio::test]
async fn outbox_flush_preserves_fifo_order_on_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = Outbox::new(dir.path());
    let entry_a = agent_core::TerminalReport::complete(
        agent_core::JobId::new("a"),
        "inst-1",
        json!({"result": 1}),
    );
    let entry_b = agent_core::TerminalReport::complete(
        agent_core::JobId::new("b"),
        "inst-1",
        json!({"result": 2}),
    );
    outbox.append(&entry_a).unwrap();
    outbox.append(&entry_b).unwrap();

    let client = FakeDispatcherClient::new();
    client.fail_next_report();
    let s = scheduler(client.clone(), handlers_with_sum(), Arc::new(outbox), 2);
    s.tick().await.unwrap();

    // "a" failed and was re-appended; "b" was never attempted and was
    // restored too, so both remain queued in their original order.
    assert_eq!(client.reports().len(), 1);
    assert_eq!(client.reports()[0].job_id, agent_core::JobId::new("a"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_never_exceeds_max_concurrency() {
    let client = FakeDispatcherClient::new();
    client.push_claim_batch(vec![
        raw_job("job_1", "slow", json!({})),
        raw_job("job_2", "slow", json!({})),
        raw_job("job_3", "slow", json!({})),
        raw_job("job_4", "slow", json!({})),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));

    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut handlers = HandlerRegistry::new();
    let (c, p) = (current.clone(), peak.clone());
    handlers.register("slow", move |_job: &Job| {
        let (current, peak) = (c.clone(), p.clone());
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(json!({}))
        }
    });

    let s = scheduler(client.clone(), handlers, outbox, 2);
    s.tick().await.unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 2, "peak concurrency must not exceed max_concurrency");
    assert_eq!(client.reports().len(), 4);
}

#[tokio::test]
async fn claim_requests_only_assignment_operations_and_claim_batch_size() {
    let client = FakeDispatcherClient::new();
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client.clone(), handlers_with_sum(), outbox, 2);

    s.tick().await.unwrap();

    let claims = client.claims();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].operations, vec!["sum".to_string()]);
    assert_eq!(claims[0].limit, 5);
}

#[tokio::test]
async fn paused_assignment_skips_the_claim_call_entirely() {
    let client = FakeDispatcherClient::new();
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client.clone(), handlers_with_sum(), outbox, 2);
    s.set_assignment(Assignment { operations: vec!["sum".to_string()], max_concurrency: 2, paused: true });

    s.tick().await.unwrap();

    assert!(client.claims().is_empty(), "a paused assignment must never issue a claim request");
}

#[tokio::test]
async fn reconfiguration_updates_the_next_claim_immediately() {
    let client = FakeDispatcherClient::new();
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client.clone(), handlers_with_sum(), outbox, 2);

    s.set_assignment(Assignment {
        operations: vec!["sum".to_string(), "subtract".to_string()],
        max_concurrency: 5,
        paused: false,
    });
    s.tick().await.unwrap();

    let claims = client.claims();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].operations, vec!["sum".to_string(), "subtract".to_string()]);
    assert_eq!(claims[0].limit, 5, "claim_batch_size is unaffected by max_concurrency changes");
}

#[tokio::test]
async fn malformed_claim_entry_aborts_the_tick() {
    let client = FakeDispatcherClient::new();
    client.push_claim_batch(vec![RawJob { id: None, op: Some("sum".to_string()), payload: Some(json!({})), lease_until: None }]);
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client.clone(), handlers_with_sum(), outbox, 2);

    let err = s.tick().await.unwrap_err();
    assert!(matches!(err, crate::error::TickError::MalformedClaim(_)));
    assert!(client.reports().is_empty(), "no report should be sent for a batch that failed to decode");
}

#[tokio::test]
async fn empty_batch_is_treated_as_idle() {
    let client = FakeDispatcherClient::new();
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client.clone(), handlers_with_sum(), outbox, 2);

    s.tick().await.unwrap();

    assert_eq!(client.claims().len(), 1);
    assert!(client.reports().is_empty());
}

#[tokio::test]
async fn running_snapshot_is_empty_once_tick_completes() {
    let client = FakeDispatcherClient::new();
    client.push_claim_batch(vec![raw_job("job_1", "sum", json!({"a": 1, "b": 1}))]);
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client.clone(), handlers_with_sum(), outbox, 2);

    s.tick().await.unwrap();

    assert!(s.running_snapshot().is_empty());
}

#[tokio::test]
async fn metrics_load_fraction_is_zero_when_idle() {
    let client = FakeDispatcherClient::new();
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client, handlers_with_sum(), outbox, 4);

    let m = s.metrics();
    assert_eq!(m.cpu, 0.0);
    assert_eq!(m.mem_mb, 0);
}

#[tokio::test]
async fn a_tick_with_work_ends_back_in_idle() {
    let client = FakeDispatcherClient::new();
    client.push_claim_batch(vec![raw_job("job_1", "sum", json!({"a": 1, "b": 1}))]);
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client, handlers_with_sum(), outbox, 2);

    assert_eq!(s.phase(), AgentPhase::Idle);
    s.tick().await.unwrap();
    assert_eq!(s.phase(), AgentPhase::Idle, "a completed tick settles back into idle");
}

#[tokio::test]
async fn an_empty_tick_leaves_the_phase_idle() {
    let client = FakeDispatcherClient::new();
    let dir = tempfile::tempdir().unwrap();
    let outbox = Arc::new(Outbox::new(dir.path()));
    let s = scheduler(client, handlers_with_sum(), outbox, 2);

    s.tick().await.unwrap();
    assert_eq!(s.phase(), AgentPhase::Idle);
}
