// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `zapgate serve`: wire every component together and run until a signal.
//!
//! Startup order: tracing, signer, storage, oracle + breaker, relay pool,
//! queue workers, dispatcher. Startup fails when required config is absent
//! (checked by the caller) or when no relay connects within the window.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use zapgate_config::GatewayConfig;
use zapgate_core::{EventPublisher, GatewayError};
use zapgate_engine::{
    Dispatcher, EngineStats, PaymentGate, PendingEvent, Processor, ProcessorConfig, QueueConfig,
    RateLimiter, RateLimiterConfig, Responder, WorkQueue,
};
use zapgate_ledger::Ledger;
use zapgate_oracle::{BreakerConfig, CircuitBreaker, OracleClient};
use zapgate_proto::Filter;
use zapgate_relay::{IncomingEvent, RelayPool, SupervisorConfig};
use zapgate_signer::Signer;
use zapgate_store::{ConversationStore, SqliteKv};

use crate::shutdown;

/// Fallback sent when the oracle is unavailable or the circuit is open.
const ORACLE_FALLBACK: &str =
    "The AI service is briefly unavailable. Please try again in a few minutes.";

/// Runs the gateway until SIGINT/SIGTERM.
pub async fn run_serve(config: GatewayConfig) -> Result<(), GatewayError> {
    init_tracing(&config.agent.log_level);
    info!(bot = %config.agent.name, "starting zapgate");

    // Identity.
    let private_key = config
        .keys
        .private_key
        .as_deref()
        .ok_or_else(|| GatewayError::Config("keys.private_key is required".into()))?;
    let signer = Arc::new(
        Signer::from_secret(private_key)
            .map_err(|e| GatewayError::Config(format!("keys.private_key: {e}")))?,
    );
    info!(pubkey = %signer.public_key(), "gateway identity loaded");

    // Storage: one connection thread shared by the store and the ledger.
    let kv = SqliteKv::open(&config.storage.database_path).await?;
    let store = Arc::new(ConversationStore::new(kv.clone()));
    let ledger = Arc::new(Ledger::new(kv.clone()));
    info!(path = %config.storage.database_path, "storage ready");

    // Oracle behind the circuit breaker.
    let api_key = config
        .oracle
        .api_key
        .as_deref()
        .ok_or_else(|| GatewayError::Config("oracle.api_key is required".into()))?;
    let oracle_client = OracleClient::new(
        api_key,
        config.oracle.model.clone(),
        Duration::from_millis(config.oracle.timeout_ms),
    )?
    .with_system_prompt(format!(
        "You are {}, a helpful assistant reachable over Nostr. Replies are \
         paid per message, so keep them concise and useful.",
        config.agent.name
    ));
    let breaker = Arc::new(CircuitBreaker::new(
        Arc::new(oracle_client),
        BreakerConfig {
            failure_threshold: config.circuit.failure_threshold,
            success_threshold: config.circuit.success_threshold,
            call_timeout: Duration::from_millis(config.circuit.timeout_ms),
            reset_timeout: Duration::from_millis(config.circuit.reset_timeout_ms),
        },
        ORACLE_FALLBACK.to_string(),
    ));

    // Relay pool doubles as the fan-out publisher.
    let pool = Arc::new(RelayPool::new(
        &config.relays,
        SupervisorConfig {
            connect_timeout: Duration::from_millis(config.relay.connect_timeout_ms),
            backoff_base: Duration::from_millis(config.relay.backoff_base_ms),
            backoff_ceiling: Duration::from_millis(config.relay.backoff_ceiling_ms),
            max_reconnect_attempts: config.relay.max_reconnect_attempts,
            startup_window: Duration::from_millis(config.relay.startup_window_ms),
        },
    ));
    let publisher: Arc<dyn EventPublisher> = pool.clone();
    let responder = Arc::new(Responder::new(signer.clone(), publisher));

    // Engine pieces.
    let stats = Arc::new(EngineStats::default());
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        max_tokens: config.rate_limit.max_tokens,
        refill_rate: config.rate_limit.refill_rate,
        idle_window: Duration::from_millis(config.rate_limit.window_ms),
    }));
    let queue: WorkQueue<PendingEvent> = WorkQueue::new(QueueConfig {
        max_queue_size: config.engine.max_queue_size,
        max_concurrent: config.engine.max_concurrent,
        task_timeout: Duration::from_millis(config.engine.queue_timeout_ms),
        retry_attempts: config.engine.retry_attempts,
        retry_delay: Duration::from_millis(config.engine.retry_delay_ms),
    });
    let payments = Arc::new(PaymentGate::new(
        ledger.clone(),
        responder.clone(),
        stats.clone(),
        config.agent.name.clone(),
    ));
    let processor = Arc::new(Processor::new(
        signer.clone(),
        store.clone(),
        ledger,
        breaker,
        responder.clone(),
        ProcessorConfig {
            dm_cost: config.costs.dm_cost,
            public_cost: config.costs.public_cost,
            response_delay: Duration::from_millis(config.engine.response_delay_ms),
            ..ProcessorConfig::default()
        },
    ));

    let cancel = shutdown::install_signal_handler();

    queue.start(processor, cancel.clone());
    info!(
        workers = config.engine.max_concurrent,
        depth = config.engine.max_queue_size,
        "work queue started"
    );

    // Relay events flow through a forwarder into the dispatcher channel.
    let (relay_tx, mut relay_rx) = mpsc::unbounded_channel::<IncomingEvent>();
    let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel::<PendingEvent>();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    incoming = relay_rx.recv() => {
                        match incoming {
                            Some(IncomingEvent { event, relay_url }) => {
                                let _ = dispatch_tx.send(PendingEvent { event, relay_url });
                            }
                            None => break,
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }

    // Subscribe from startup time onward; missing events from before the
    // process existed are not replayed.
    let since = chrono::Utc::now().timestamp() as u64;
    let filters = vec![Filter::addressed_to(signer.public_key(), since)];
    pool.start(filters, relay_tx, cancel.clone()).await?;
    info!(relays = config.relays.len(), "relay supervision started");

    // Periodic idle-bucket sweep caps limiter memory.
    {
        let limiter = limiter.clone();
        let cancel = cancel.clone();
        let window = Duration::from_millis(config.rate_limit.window_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(window);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => limiter.sweep_idle(),
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }

    let dispatcher = Dispatcher::new(
        signer.public_key(),
        1000,
        limiter,
        queue.clone(),
        payments,
        responder,
        stats,
    );
    dispatcher.run(dispatch_rx, cancel.clone()).await;

    // Shutdown: refuse new work, drain in-flight, flush the WAL.
    queue.stop().await;
    kv.checkpoint().await?;
    debug!("storage checkpointed");
    info!("zapgate shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zapgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
