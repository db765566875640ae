//! Route handlers (§4.I, §6).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use cardinal_crypto::validate_address;
use cardinal_ecs::cql;
use cardinal_tx::{Envelope, PersonaIndex, QueuedTx};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

pub const CREATE_PERSONA_MESSAGE: &str = "create-persona";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tx/game/{name}", post(submit_game_tx))
        .route("/tx/persona/create-persona", post(submit_persona_claim))
        .route("/query/game/{name}", post(run_game_query))
        .route("/query/game/cql", post(run_cql_query))
        .route("/query/receipts/list", post(list_receipts))
        .route("/query/persona/signer", post(persona_signer))
        .route("/query/http/endpoints", post(list_endpoints))
        .route("/health", get(health))
        .route("/events", get(events_ws))
        .with_state(state)
}

#[derive(Serialize)]
struct TxAccepted {
    #[serde(rename = "txHash")]
    tx_hash: String,
    tick: u64,
}

fn guard_recovering(state: &AppState) -> Result<(), ApiError> {
    if state.is_recovering() {
        return Err(ApiError::Recovering);
    }
    Ok(())
}

async fn submit_game_tx(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(envelope): Json<Envelope>,
) -> Result<ApiResponse, ApiError> {
    guard_recovering(&state)?;
    let msg_type = state
        .message_registry
        .id_by_name(&name)
        .map_err(|_| ApiError::NotFound(format!("unknown game message `{name}`")))?;

    let (tick, persona) = {
        let guard = state.scheduler.read().await;
        let persona = PersonaIndex::rebuild(guard.world(), guard.registry())
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        (guard.current_tick(), persona)
    };

    let identity = state.verifier.verify(&envelope, false, &persona)?;
    debug!(signer = %identity.signer_address, %name, "accepted game transaction");

    let tx_hash = envelope.tx_hash().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.tx_queue.add_transaction(QueuedTx {
        msg_type,
        value: envelope.body.clone(),
        envelope,
    });

    Ok(ApiResponse::ok(TxAccepted {
        tx_hash: tx_hash.0,
        tick,
    }))
}

#[derive(Deserialize)]
struct PersonaClaimBody {
    #[serde(rename = "personaTag")]
    persona_tag: String,
    #[serde(rename = "signerAddress")]
    signer_address: String,
}

fn is_valid_persona_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn submit_persona_claim(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> Result<ApiResponse, ApiError> {
    guard_recovering(&state)?;
    let msg_type = state
        .message_registry
        .id_by_name(CREATE_PERSONA_MESSAGE)
        .map_err(|_| ApiError::NotFound("create-persona message type not registered".to_string()))?;

    let claim: PersonaClaimBody =
        serde_json::from_value(envelope.body.clone()).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !is_valid_persona_tag(&claim.persona_tag) {
        return Err(ApiError::BadRequest("personaTag must match ^[A-Za-z0-9_]+$".to_string()));
    }
    validate_address(&claim.signer_address).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if state.enable_allowlist {
        let allowed = state.allowlist.read().await.contains(&claim.signer_address);
        if !allowed {
            return Err(ApiError::Unauthorized(format!(
                "signer {} is not pre-registered to claim a persona",
                claim.signer_address
            )));
        }
    }

    let (tick, persona) = {
        let guard = state.scheduler.read().await;
        let persona = PersonaIndex::rebuild(guard.world(), guard.registry())
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        (guard.current_tick(), persona)
    };

    let identity = state.verifier.verify(&envelope, true, &persona)?;
    debug!(signer = %identity.signer_address, tag = %claim.persona_tag, "accepted persona claim");

    let tx_hash = envelope.tx_hash().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.tx_queue.add_transaction(QueuedTx {
        msg_type,
        value: envelope.body.clone(),
        envelope,
    });

    Ok(ApiResponse::ok(TxAccepted {
        tx_hash: tx_hash.0,
        tick,
    }))
}

async fn run_game_query(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse, ApiError> {
    let guard = state.scheduler.read().await;
    let handler = state
        .query_registry
        .get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("unknown query `{name}`")))?;
    let reply = handler.call(guard.world(), guard.registry(), body)?;
    Ok(ApiResponse::ok(reply))
}

#[derive(Deserialize)]
struct CqlRequest {
    query: String,
}

#[derive(Serialize)]
struct CqlEntityRow {
    id: u64,
    data: Vec<CqlComponentValue>,
}

#[derive(Serialize)]
struct CqlComponentValue {
    component: String,
    bytes: String,
}

async fn run_cql_query(
    State(state): State<AppState>,
    Json(req): Json<CqlRequest>,
) -> Result<ApiResponse, ApiError> {
    let guard = state.scheduler.read().await;
    let filter = cql::parse(&req.query, guard.registry()).map_err(|e| ApiError::UnprocessableCql(e.to_string()))?;

    let mut rows = Vec::new();
    for entity in guard.world().search(&filter) {
        let Some(archetype_id) = guard.world().entity_archetype(entity) else {
            continue;
        };
        let Some(table) = guard.world().archetype(archetype_id) else {
            continue;
        };
        let mut data = Vec::new();
        for component in &table.components {
            if let Some(bytes) = guard.world().get_component(entity, *component) {
                data.push(CqlComponentValue {
                    component: guard.registry().name_of(*component).unwrap_or("?").to_string(),
                    bytes: hex::encode(bytes),
                });
            }
        }
        rows.push(CqlEntityRow { id: entity.0, data });
    }

    Ok(ApiResponse::ok(rows))
}

#[derive(Deserialize)]
struct ReceiptsRequest {
    #[serde(rename = "startTick")]
    start_tick: u64,
}

#[derive(Serialize)]
struct ReceiptRow {
    #[serde(rename = "txHash")]
    tx_hash: String,
    tick: u64,
    result: Option<Value>,
    errors: Vec<String>,
}

async fn list_receipts(
    State(state): State<AppState>,
    Json(req): Json<ReceiptsRequest>,
) -> Result<ApiResponse, ApiError> {
    let guard = state.scheduler.read().await;
    let window = guard.receipts().window_since(req.start_tick);
    let receipts: Vec<ReceiptRow> = window
        .receipts
        .into_iter()
        .map(|r| ReceiptRow {
            tx_hash: r.tx_hash.0,
            tick: r.tick,
            result: r.result,
            errors: r.errors,
        })
        .collect();

    Ok(ApiResponse::ok(json!({
        "startTick": window.start_tick,
        "endTick": window.end_tick,
        "receipts": receipts,
    })))
}

#[derive(Deserialize)]
struct PersonaSignerRequest {
    #[serde(rename = "personaTag")]
    persona_tag: String,
    #[allow(dead_code)]
    tick: Option<u64>,
}

async fn persona_signer(
    State(state): State<AppState>,
    Json(req): Json<PersonaSignerRequest>,
) -> Result<ApiResponse, ApiError> {
    let guard = state.scheduler.read().await;
    let persona = PersonaIndex::rebuild(guard.world(), guard.registry())
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if let Some((_, signer_address, _)) = persona.resolve(&req.persona_tag) {
        return Ok(ApiResponse::ok(json!({
            "status": "assigned",
            "signerAddress": signer_address,
        })));
    }

    let has_pending_claim = state.tx_queue.peek_current().iter().any(|tx| {
        tx.envelope
            .body
            .get("personaTag")
            .and_then(Value::as_str)
            .map(|t| t.eq_ignore_ascii_case(&req.persona_tag))
            .unwrap_or(false)
    });

    if has_pending_claim {
        Ok(ApiResponse::ok(json!({ "status": "unknown" })))
    } else {
        Ok(ApiResponse::ok(json!({ "status": "available" })))
    }
}

async fn list_endpoints(State(state): State<AppState>) -> ApiResponse {
    let mut endpoints = vec![
        "POST /tx/game/{name}".to_string(),
        "POST /tx/persona/create-persona".to_string(),
        "POST /query/game/{name}".to_string(),
        "POST /query/game/cql".to_string(),
        "POST /query/receipts/list".to_string(),
        "POST /query/persona/signer".to_string(),
        "POST /query/http/endpoints".to_string(),
        "GET /health".to_string(),
        "GET /events".to_string(),
    ];
    for name in state.query_registry.names() {
        endpoints.push(format!("POST /query/game/{name} (registered)"));
    }
    ApiResponse::ok(json!({ "endpoints": endpoints }))
}

#[derive(Serialize)]
struct HealthResponse {
    #[serde(rename = "isServerRunning")]
    is_server_running: bool,
    #[serde(rename = "isGameLoopRunning")]
    is_game_loop_running: bool,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        is_server_running: true,
        is_game_loop_running: state.is_game_loop_running(),
    })
}

async fn events_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_events(socket, state))
}

async fn forward_events(mut socket: WebSocket, state: AppState) {
    let mut rx = {
        let guard = state.scheduler.read().await;
        guard.events().subscribe()
    };
    loop {
        match rx.recv().await {
            Ok(event) => {
                if socket.send(Message::Text(event.into())).await.is_err() {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagged, continuing from latest");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

