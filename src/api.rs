//! The HTTP surface of a node: the client-facing API and the peer RPC
//! endpoints, served from one router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Form, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use noobcash_core::{Block, Blockchain, Transaction};
use shared::{Amount, NodeId, Ring, INITIAL_NBC};

use crate::network::{resolve_conflict, PeerClient};
use crate::node::{BlockVerdict, Node};

#[derive(Clone)]
pub struct AppState {
    pub node: Arc<Node>,
    pub client: PeerClient,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // client-facing API
        .route("/", get(root))
        .route(
            "/api/create_transaction/:receiver_id/:amount",
            get(create_transaction),
        )
        .route("/api/view_transactions", get(view_transactions))
        .route("/api/get_balance", get(get_balance))
        .route("/api/get_chain_length", get(get_chain_length))
        .route("/api/get_chain", get(serve_chain))
        .route("/api/node_info", get(node_info))
        // peer RPC
        .route("/nodes/register", post(register_node))
        .route("/ring/receive", post(receive_ring))
        .route("/blockchain/receive", post(receive_chain))
        .route("/transactions/receive", post(receive_transaction))
        .route("/blocks/receive", post(receive_block))
        .route("/blockchain/length", get(chain_length))
        .route("/blockchain", get(serve_chain))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "name": "noobcash", "node_id": state.node.id }))
}

async fn create_transaction(
    State(state): State<AppState>,
    Path((receiver_id, amount)): Path<(NodeId, Amount)>,
) -> Response {
    if receiver_id >= state.node.total_nodes {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Node ID does not exist" })),
        )
            .into_response();
    }
    let receiver = {
        let ring = state.node.ring.lock().unwrap();
        ring.get(receiver_id).map(|peer| peer.address.clone())
    };
    let Some(receiver_address) = receiver else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Node ID does not exist" })),
        )
            .into_response();
    };

    match state.node.create_transaction(receiver_address, amount) {
        Ok(tx) => {
            Arc::clone(&state.node).add_transaction_to_pending(tx.clone(), &state.client);
            state.client.broadcast_transaction(&state.node, &tx).await;
            Json(json!({ "message": "Successful Transaction !" })).into_response()
        }
        Err(e) => {
            error!("could not create the transaction: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Transaction failed" })),
            )
                .into_response()
        }
    }
}

/// Transactions of the latest mined block, rendered with ring ids
async fn view_transactions(State(state): State<AppState>) -> Response {
    let latest = {
        let chain = state.node.blockchain.lock().unwrap();
        if chain.len() <= 1 {
            None
        } else {
            chain.last_block().cloned()
        }
    };
    let Some(latest) = latest else {
        return Json(json!("There are no mined blocks at the moment !")).into_response();
    };

    let ring = state.node.ring.lock().unwrap();
    let transactions: Vec<Value> = latest
        .transactions
        .iter()
        .map(|tx| {
            json!({
                "sender_id": ring.by_address(&tx.sender_address).map(|p| p.id),
                "receiver_id": ring.by_address(&tx.receiver_address).map(|p| p.id),
                "amount": tx.amount,
            })
        })
        .collect();
    Json(transactions).into_response()
}

async fn get_balance(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "balance": state.node.balance() }))
}

async fn get_chain_length(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "chain_length": state.node.blockchain.lock().unwrap().len() }))
}

async fn node_info(State(state): State<AppState>) -> Json<Value> {
    let node = &state.node;
    Json(json!({
        "id": node.id,
        "ip": node.ip,
        "port": node.port,
        "address": node.wallet.address,
        "balance": node.balance(),
    }))
}

/// Serialized chain, for both the client API and the consensus download
async fn serve_chain(State(state): State<AppState>) -> Response {
    let body = {
        let chain = state.node.blockchain.lock().unwrap();
        serde_json::to_vec(&*chain)
    };
    match body {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("could not serialize the chain: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn chain_length(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "chain_length": state.node.blockchain.lock().unwrap().len() }))
}

#[derive(Deserialize)]
struct RegisterForm {
    ip: String,
    port: u16,
    address: String,
}

/// Bootstrap only: hand out the next id and kick off the delayed
/// ring-complete check
async fn register_node(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    if !state.node.is_bootstrap {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Not the bootstrap node" })),
        )
            .into_response();
    }
    let id = state.node.register_peer(form.ip, form.port, form.address);
    tokio::spawn(check_full_ring(state.clone()));
    Json(json!({ "id": id })).into_response()
}

async fn receive_ring(State(state): State<AppState>, body: Bytes) -> Response {
    match serde_json::from_slice::<Ring>(&body) {
        Ok(ring) => {
            state.node.receive_ring(ring);
            "OK".into_response()
        }
        Err(e) => bad_payload("ring", &e),
    }
}

async fn receive_chain(State(state): State<AppState>, body: Bytes) -> Response {
    match serde_json::from_slice::<Blockchain>(&body) {
        Ok(chain) => {
            state.node.receive_chain(chain);
            "OK".into_response()
        }
        Err(e) => bad_payload("blockchain", &e),
    }
}

async fn receive_transaction(State(state): State<AppState>, body: Bytes) -> Response {
    match serde_json::from_slice::<Transaction>(&body) {
        Ok(tx) => {
            info!("📨 New transaction received");
            Arc::clone(&state.node).add_transaction_to_pending(tx, &state.client);
            "OK".into_response()
        }
        Err(e) => bad_payload("transaction", &e),
    }
}

async fn receive_block(State(state): State<AppState>, body: Bytes) -> Response {
    match serde_json::from_slice::<Block>(&body) {
        Ok(block) => {
            info!("📦 New block received");
            let verdict = state.node.handle_incoming_block(block);
            if verdict == BlockVerdict::Conflict {
                resolve_conflict(&state.client, &state.node).await;
            }
            "OK".into_response()
        }
        Err(e) => bad_payload("block", &e),
    }
}

fn bad_payload(what: &str, e: &serde_json::Error) -> Response {
    error!("undecodable {what} payload: {e}");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "message": format!("invalid {what} payload") })),
    )
        .into_response()
}

/// Bootstrap only: one second after each registration, check whether the
/// ring is complete and, if so, broadcast the ring, the chain and the
/// initial 100 NBC to every participant
async fn check_full_ring(state: AppState) {
    tokio::time::sleep(Duration::from_secs(1)).await;
    let complete = state.node.ring.lock().unwrap().len() == state.node.total_nodes;
    if !complete {
        return;
    }
    info!("🔔 Ring complete, broadcasting network state");
    state.client.broadcast_ring(&state.node).await;
    state.client.broadcast_chain(&state.node).await;
    broadcast_initial_nbc(&state).await;
}

async fn broadcast_initial_nbc(state: &AppState) {
    let recipients: Vec<String> = {
        let ring = state.node.ring.lock().unwrap();
        ring.others(state.node.id)
            .map(|peer| peer.address.clone())
            .collect()
    };
    for address in recipients {
        match state.node.create_transaction(address, INITIAL_NBC) {
            Ok(tx) => {
                Arc::clone(&state.node).add_transaction_to_pending(tx.clone(), &state.client);
                state.client.broadcast_transaction(&state.node, &tx).await;
            }
            Err(e) => error!("initial NBC transaction failed: {e}"),
        }
    }
    info!("💰 Initial NBC distribution complete");
}
