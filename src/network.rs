//! Peer networking: best-effort HTTP fan-out to the ring and the
//! longest-chain consensus resolver.

use std::time::Duration;

use noobcash_core::{Block, Blockchain, Transaction};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use shared::{BlockchainError, NodeId, PeerInfo, Result};
use tracing::{error, info, warn};

use crate::node::Node;

/// Timeout applied to every peer request
const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the peer RPC surface. Cheap to clone; all sends are
/// best-effort: failures are logged and the fan-out continues.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: NodeId,
}

#[derive(Deserialize)]
struct ChainLengthResponse {
    chain_length: usize,
}

impl PeerClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PEER_TIMEOUT)
            .build()
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?;
        Ok(Self { http })
    }

    /// Register with the bootstrap node and return the assigned id
    ///
    /// # Errors
    ///
    /// Returns an error if the bootstrap is unreachable or rejects the
    /// registration
    pub async fn register(
        &self,
        bootstrap_ip: &str,
        bootstrap_port: u16,
        ip: &str,
        port: u16,
        address: &str,
    ) -> Result<NodeId> {
        let url = format!("http://{bootstrap_ip}:{bootstrap_port}/nodes/register");
        let form = [
            ("ip", ip.to_string()),
            ("port", port.to_string()),
            ("address", address.to_string()),
        ];
        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BlockchainError::NetworkError(format!(
                "registration rejected: {}",
                response.status()
            )));
        }
        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?;
        Ok(body.id)
    }

    /// Broadcast a signed transaction to every other node in the ring
    pub async fn broadcast_transaction(&self, node: &Node, tx: &Transaction) {
        let Ok(body) = serde_json::to_vec(tx) else {
            error!("could not serialize the transaction for broadcast");
            return;
        };
        for peer in Self::targets(node) {
            let url = format!("{}/transactions/receive", peer.endpoint());
            if let Err(e) = self.post_bytes(&url, body.clone()).await {
                error!("🌐 Could not broadcast transaction to node {}: {e}", peer.id);
            }
        }
    }

    /// Broadcast a freshly-mined block to every other node in the ring
    pub async fn broadcast_block(&self, node: &Node, block: &Block) {
        let Ok(body) = serde_json::to_vec(block) else {
            error!("could not serialize the block for broadcast");
            return;
        };
        for peer in Self::targets(node) {
            let url = format!("{}/blocks/receive", peer.endpoint());
            if let Err(e) = self.post_bytes(&url, body.clone()).await {
                error!("🌐 Could not broadcast block to node {}: {e}", peer.id);
            }
        }
    }

    /// Bootstrap only: send the completed ring to every other node
    pub async fn broadcast_ring(&self, node: &Node) {
        let snapshot = node.ring.lock().unwrap().clone();
        let Ok(body) = serde_json::to_vec(&snapshot) else {
            error!("could not serialize the ring for broadcast");
            return;
        };
        for peer in Self::targets(node) {
            let url = format!("{}/ring/receive", peer.endpoint());
            if let Err(e) = self.post_bytes(&url, body.clone()).await {
                error!("🌐 Could not send the ring to node {}: {e}", peer.id);
            }
        }
        info!("🔗 Network ring broadcast to all nodes");
    }

    /// Bootstrap only: send the genesis chain to every other node
    pub async fn broadcast_chain(&self, node: &Node) {
        let snapshot = node.blockchain.lock().unwrap().clone();
        let Ok(body) = serde_json::to_vec(&snapshot) else {
            error!("could not serialize the chain for broadcast");
            return;
        };
        for peer in Self::targets(node) {
            let url = format!("{}/blockchain/receive", peer.endpoint());
            if let Err(e) = self.post_bytes(&url, body.clone()).await {
                error!("🌐 Could not send the chain to node {}: {e}", peer.id);
            }
        }
        info!("⛓️ Blockchain state broadcast to all nodes");
    }

    /// Ask a peer how long its chain is
    ///
    /// # Errors
    ///
    /// Returns an error if the peer is unreachable or answers garbage
    pub async fn chain_length(&self, peer: &PeerInfo) -> Result<usize> {
        let url = format!("{}/blockchain/length", peer.endpoint());
        let response: ChainLengthResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?
            .json()
            .await
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?;
        Ok(response.chain_length)
    }

    /// Download a peer's full serialized chain
    ///
    /// # Errors
    ///
    /// Returns an error if the peer is unreachable or the payload does not
    /// decode
    pub async fn download_chain(&self, peer: &PeerInfo) -> Result<Blockchain> {
        let url = format!("{}/blockchain", peer.endpoint());
        let bytes = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BlockchainError::SerializationError(e.to_string()))
    }

    async fn post_bytes(&self, url: &str, body: Vec<u8>) -> Result<()> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| BlockchainError::NetworkError(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(BlockchainError::NetworkError(format!(
                "peer answered {}",
                response.status()
            )))
        }
    }

    fn targets(node: &Node) -> Vec<PeerInfo> {
        node.ring
            .lock()
            .unwrap()
            .others(node.id)
            .cloned()
            .collect()
    }
}

/// The consensus protocol: query every other peer for its chain length,
/// download the longest strictly-greater chain (first seen wins ties) and
/// adopt it if it validates. The blockchain stays pure data; the node
/// carries the network identity, so this is a free function over both.
pub async fn resolve_conflict(client: &PeerClient, node: &Node) {
    warn!("⚠️ Conflict detected, running the consensus protocol");

    let local_len = node.blockchain.lock().unwrap().len();
    let peers: Vec<PeerInfo> = node.ring.lock().unwrap().others(node.id).cloned().collect();

    let mut best: Option<PeerInfo> = None;
    let mut max_len = local_len;
    for peer in peers {
        match client.chain_length(&peer).await {
            Ok(len) if len > max_len => {
                info!("Found longer chain candidate at node {} (length {len})", peer.id);
                max_len = len;
                best = Some(peer);
            }
            Ok(_) => {}
            Err(e) => error!("🌐 Consensus: could not reach node {}: {e}", peer.id),
        }
    }

    let Some(best) = best else {
        info!("Local chain is authoritative, no changes made");
        return;
    };

    match client.download_chain(&best).await {
        Ok(chain) => match chain.validate_chain() {
            Ok(()) => node.adopt_chain(chain),
            Err(e) => warn!("Downloaded chain failed validation ({e}), keeping the local chain"),
        },
        Err(e) => error!("Failed to download the chain from node {}: {e}", best.id),
    }
}
