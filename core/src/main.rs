// src/main.rs
//
// Minimal demo node that wires up the govcore library:
//
// - an in-memory circuit breaker registry + metrics store feeding a
//   fallback orchestrator over a small scripted model fleet,
// - a governance chain and voting session carried through its full
//   lifecycle,
// - a Prometheus metrics exporter on /metrics.
//
// This is a smoke-test harness, not a production entrypoint: the gateway
// crate is the HTTP surface real callers use.

use std::collections::HashMap;
use std::sync::Arc;

use govcore::{
    AITask, Chain, CircuitBreakerRegistry, FallbackOrchestrator, FallbackStrategy, GovConfig,
    MetricsRegistry, MetricsStore, ModelIdentity, PartialBlock, ProposalVote, VotingSession,
    run_prometheus_http_server, system_clock,
};

use govcore::governance::block::{BlockPayload, BlockType};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "govcore=info".to_string()))
        .init();

    if let Err(err) = run_node().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = GovConfig::default();

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!(error = %e, "metrics HTTP server error");
            }
        });
        tracing::info!(%addr, "metrics exporter listening");
    }

    // ---------------------------
    // Resilience engine demo
    // ---------------------------

    demo_resilience().await;

    // ---------------------------
    // Governance chain + session demo
    // ---------------------------

    demo_governance();

    Ok(())
}

struct EchoExecutor;

#[async_trait::async_trait]
impl govcore::ModelExecutor for EchoExecutor {
    async fn execute(
        &self,
        model: &ModelIdentity,
        task: &AITask,
    ) -> Result<govcore::AIResponse, govcore::ResilienceError> {
        Ok(govcore::AIResponse {
            task_id: task.id.clone(),
            model_id: model.id.clone(),
            result: task.payload.clone(),
            success: true,
            response_time_ms: 5,
            timestamp_ms: 0,
            error: None,
            metadata: HashMap::new(),
        })
    }
}

async fn demo_resilience() {
    let cfg = GovConfig::default();
    let orchestrator = FallbackOrchestrator::new(
        Arc::new(EchoExecutor),
        Arc::new(CircuitBreakerRegistry::new(cfg.breaker)),
        Arc::new(MetricsStore::new()),
        cfg.retry,
        cfg.fallback_weight,
        govcore::default_prng(),
        system_clock(),
    );

    let task = AITask::new("demo-task", "chat", b"ping".to_vec());
    let candidates = vec![
        ModelIdentity::new("claude-4-sonnet", "Claude 4 Sonnet", "anthropic"),
        ModelIdentity::new("gpt-5", "GPT-5", "openai"),
    ];

    match orchestrator.execute(&task, &candidates, FallbackStrategy::Sequential, None).await {
        Ok(result) => tracing::info!(
            model = %result.winning_model,
            fallback_used = result.fallback_used,
            "resilience demo task completed"
        ),
        Err(e) => tracing::warn!(error = %e, "resilience demo task failed"),
    }
}

fn demo_governance() {
    let clock = system_clock();
    let chain = Chain::create("BIP-DEMO", serde_json::json!({"title": "demo minute"}), clock.clone());
    chain.append_block(PartialBlock {
        timestamp: govcore::Timestamp::from_millis(clock.now_millis() as i64),
        block_type: BlockType::Draft,
        model_id: Some("claude-4-sonnet".to_string()),
        action: "draft-proposal".to_string(),
        file_paths: vec!["BIP-DEMO.md".to_string()],
        file_hash: None,
        data: BlockPayload::Metadata(serde_json::json!({"proposalId": "BIP-01"})),
    });

    let participants: std::collections::HashSet<String> =
        ["model-a", "model-b"].iter().map(|s| s.to_string()).collect();
    let session = VotingSession::new(
        "2026-07",
        vec!["BIP-01".to_string()],
        participants,
        168,
        0.66,
        0.5,
        chain,
        clock,
    );
    session.start().expect("a freshly-created session can always start");
    session
        .submit_vote(
            "model-a",
            vec![ProposalVote { proposal_id: "BIP-01".to_string(), weight: 8, justification: None, veto: None }],
            "votes/model-a.json".to_string(),
            "deadbeef".to_string(),
        )
        .expect("model-a is a participant voting before the deadline");

    let verification = session.chain().verify();
    tracing::info!(valid = verification.valid, blocks = session.chain().len(), "demo chain state");
}
