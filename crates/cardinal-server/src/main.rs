mod config;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cardinal_ecs::ComponentRegistry;
use cardinal_http::{router, AppState, CREATE_PERSONA_MESSAGE};
use cardinal_sched::Scheduler;
use cardinal_store::Store;
use cardinal_tx::{MessageRegistry, PersonaComponent, TxQueue, Verifier};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;

/// Ticks run at a fixed ten-per-second cadence; nothing in the wire surface
/// lets a client change this at runtime.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().map_err(|e| {
        error!(%e, "configuration error");
        anyhow::anyhow!(e)
    })?;

    info!(
        port = config.http_port,
        namespace = %config.namespace,
        store = %config.store_path.display(),
        debug = config.debug,
        allowlist = config.enable_allowlist,
        "cardinal starting"
    );
    if config.redis_addr.is_some() || config.redis_password_set {
        warn!("REDIS_ADDR/REDIS_PASSWORD are accepted for interface compatibility but not consumed by the embedded store");
    }

    let recovering = Arc::new(AtomicBool::new(true));

    let (store, pending) = Store::open(&config.store_path)?;

    let mut registry = ComponentRegistry::new();
    registry.register::<PersonaComponent>()?;
    registry.seal();

    let mut message_registry = MessageRegistry::new();
    message_registry.register(
        CREATE_PERSONA_MESSAGE,
        "CreatePersonaMsg",
        "CreatePersonaResult",
        false,
    )?;
    message_registry.seal();
    let message_registry = Arc::new(message_registry);

    let tx_queue = Arc::new(TxQueue::new());
    let verifier = Arc::new(Verifier::new(config.namespace.clone(), true, store.clone()));

    let scheduler = Scheduler::new(
        store,
        pending,
        registry,
        Arc::clone(&tx_queue),
        Vec::new(),
        Vec::new(),
        config.receipt_history_size,
    )?;
    let scheduler = Arc::new(RwLock::new(scheduler));

    recovering.store(false, std::sync::atomic::Ordering::Release);
    info!("startup recovery complete");

    let game_loop_running = Arc::new(AtomicBool::new(true));

    let state = AppState {
        scheduler: Arc::clone(&scheduler),
        tx_queue,
        verifier,
        message_registry,
        query_registry: Arc::new(cardinal_http::QueryRegistry::new()),
        namespace: config.namespace.clone(),
        debug: config.debug,
        enable_allowlist: config.enable_allowlist,
        allowlist: Arc::new(RwLock::new(Default::default())),
        recovering,
        game_loop_running: Arc::clone(&game_loop_running),
    };

    let tick_handle = tokio::spawn(run_tick_loop(scheduler, game_loop_running));

    let app = router(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).await?;
    tick_handle.abort();

    Ok(())
}

async fn run_tick_loop(scheduler: Arc<RwLock<Scheduler>>, running: Arc<AtomicBool>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        interval.tick().await;
        if !running.load(std::sync::atomic::Ordering::Acquire) {
            continue;
        }
        let mut guard = scheduler.write().await;
        if let Err(err) = guard.run_tick() {
            error!(%err, "tick failed, world remains on the last committed state");
        }
    }
}
