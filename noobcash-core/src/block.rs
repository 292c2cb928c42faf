use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::hash;
use shared::{BlockchainError, Result};

use crate::blockchain::Blockchain;
use crate::transaction::Transaction;

/// Sentinela de hash anterior do bloco de génese
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Bloco da cadeia: cabeçalho mais transações ordenadas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash do bloco anterior; `"1"` na génese
    pub previous_hash: String,
    /// Momento de criação (milissegundos unix)
    pub timestamp: i64,
    /// Nonce de 32 bits descoberto pelo proof-of-work; 0 na génese
    pub nonce: u32,
    pub transactions: Vec<Transaction>,
    /// Digest SHA-256 em hexadecimal do payload canónico do bloco
    pub hash: String,
}

/// Payload canónico de hashing do bloco, com os campos exactamente nesta
/// ordem. O payload é ASCII puro (ids em hexadecimal e inteiros), pelo que
/// os bytes emitidos são os mesmos em qualquer codificação latina.
#[derive(Serialize)]
struct HashPayload<'a> {
    nonce: u32,
    timestamp: i64,
    transactions: Vec<&'a str>,
    previous_hash: &'a str,
}

impl Block {
    /// Cria um bloco vazio ligado ao hash da ponta corrente
    #[must_use]
    pub fn new(previous_hash: String) -> Self {
        Self {
            previous_hash,
            timestamp: Utc::now().timestamp_millis(),
            nonce: 0,
            transactions: Vec::new(),
            hash: String::new(),
        }
    }

    /// Bytes canónicos sobre os quais o hash do bloco é calculado
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização do payload falhar
    pub fn hash_payload(&self) -> Result<Vec<u8>> {
        let payload = HashPayload {
            nonce: self.nonce,
            timestamp: self.timestamp,
            transactions: self
                .transactions
                .iter()
                .map(|tx| tx.transaction_id.as_str())
                .collect(),
            previous_hash: &self.previous_hash,
        };
        serde_json::to_vec(&payload)
            .map_err(|e| BlockchainError::SerializationError(e.to_string()))
    }

    /// Recalcula o digest a partir do conteúdo corrente, sem o armazenar
    ///
    /// # Errors
    ///
    /// Retorna erro se o payload canónico não puder ser construído
    pub fn compute_hash(&self) -> Result<String> {
        Ok(hash::sha256_hex(&self.hash_payload()?))
    }

    /// Recalcula e armazena o hash do bloco
    ///
    /// # Errors
    ///
    /// Retorna erro se o payload canónico não puder ser construído
    pub fn calculate_hash(&mut self) -> Result<&str> {
        self.hash = self.compute_hash()?;
        Ok(&self.hash)
    }

    /// Forma do bloco de génese: sentinelas de hash anterior e de nonce
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREVIOUS_HASH && self.nonce == 0
    }

    /// Valida o bloco contra um antecessor concreto
    ///
    /// O digest é recalculado a partir do conteúdo antes da verificação do
    /// prefixo de dificuldade, pelo que um campo `hash` forjado não passa.
    ///
    /// # Errors
    ///
    /// Retorna `InvalidBlock` com o motivo da rejeição
    pub fn validate_against(&self, previous: &Block, difficulty: usize) -> Result<()> {
        if self.previous_hash != previous.hash {
            return Err(BlockchainError::InvalidBlock(
                "previous hash does not match the chain tip".to_string(),
            ));
        }
        let digest = self.compute_hash()?;
        if digest != self.hash {
            return Err(BlockchainError::InvalidBlock(
                "stored hash does not match the block contents".to_string(),
            ));
        }
        if !hash::meets_difficulty(&digest, difficulty) {
            return Err(BlockchainError::InvalidBlock(
                "hash does not meet the difficulty target".to_string(),
            ));
        }
        Ok(())
    }

    /// Valida o bloco contra a ponta corrente da cadeia
    ///
    /// # Errors
    ///
    /// Retorna `InvalidBlock` se o bloco não encaixar na ponta corrente
    pub fn validate(&self, blockchain: &Blockchain) -> Result<()> {
        if self.is_genesis() {
            return Ok(());
        }
        match blockchain.last_block() {
            Some(tip) => self.validate_against(tip, blockchain.difficulty),
            None => Err(BlockchainError::InvalidBlock(
                "the local chain has no blocks yet".to_string(),
            )),
        }
    }

    #[must_use]
    pub fn is_full(&self, capacity: usize) -> bool {
        self.transactions.len() >= capacity
    }
}
