use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared::{verify_signature, Amount, BlockchainError, NodeId, Result, Wallet};

use crate::utxo::UtxoTable;

/// Endereço sentinela do emissor da transação de génese
pub const COINBASE_ADDRESS: &str = "0";

/// Número de bytes aleatórios do identificador de transação
const TX_ID_BYTES: usize = 128;

/// Transferência de valor assinada entre duas carteiras
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Endereço (chave pública PEM) do remetente; `"0"` na génese
    pub sender_address: String,
    pub receiver_address: String,
    pub amount: Amount,
    /// Identificador aleatório, fixado na construção e coberto pela assinatura
    pub transaction_id: String,
    /// Assinatura PKCS#1 v1.5 do payload canónico; `None` na génese
    pub signature: Option<Vec<u8>>,
    // Campos reservados para rastreio explícito de entradas e saídas
    pub transaction_inputs: Vec<String>,
    pub transaction_outputs: Vec<String>,
}

/// Payload canónico de assinatura
///
/// A ordem de declaração dos campos segue a ordem alfabética das chaves,
/// pelo que o JSON emitido sai com as chaves ordenadas. Todos os nós têm de
/// reproduzir exactamente estes bytes para a verificação bater certo.
#[derive(Serialize)]
struct SigningPayload<'a> {
    amount: f64,
    id: &'a str,
    receiver: &'a str,
    sender: &'a str,
}

impl Transaction {
    /// Cria uma transferência por assinar com um id aleatório fresco
    #[must_use]
    pub fn new(sender_address: String, receiver_address: String, amount: Amount) -> Self {
        Self {
            sender_address,
            receiver_address,
            amount,
            transaction_id: random_id(),
            signature: None,
            transaction_inputs: Vec::new(),
            transaction_outputs: Vec::new(),
        }
    }

    /// Transação de génese: credita o bootstrap, sem chave nem assinatura
    #[must_use]
    pub fn coinbase(receiver_address: String, amount: Amount) -> Self {
        Self::new(COINBASE_ADDRESS.to_string(), receiver_address, amount)
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.sender_address == COINBASE_ADDRESS
    }

    /// Bytes canónicos sobre os quais a assinatura é calculada
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização do payload falhar
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let payload = SigningPayload {
            amount: self.amount as f64,
            id: &self.transaction_id,
            receiver: &self.receiver_address,
            sender: &self.sender_address,
        };
        serde_json::to_vec(&payload)
            .map_err(|e| BlockchainError::SerializationError(e.to_string()))
    }

    /// Assina a transação com a carteira do remetente
    ///
    /// # Errors
    ///
    /// Retorna erro se o payload canónico não puder ser construído
    pub fn sign(&mut self, wallet: &Wallet) -> Result<()> {
        let payload = self.signing_payload()?;
        self.signature = Some(wallet.sign(&payload)?);
        Ok(())
    }

    /// Verifica a assinatura contra o endereço do remetente
    ///
    /// Falha silenciosamente: qualquer erro devolve `false`.
    #[must_use]
    pub fn verify_signature(&self) -> bool {
        let Some(signature) = &self.signature else {
            return false;
        };
        let Ok(payload) = self.signing_payload() else {
            return false;
        };
        verify_signature(&self.sender_address, &payload, signature)
    }

    /// Valida a transação: assinatura e cobertura de saldo no conjunto de
    /// UTXOs dado. Só verifica; não reserva fundos.
    ///
    /// # Errors
    ///
    /// Retorna `InvalidSignature` se a assinatura não validar e
    /// `InsufficientFunds` se o saldo do remetente não cobrir o valor
    pub fn validate(&self, sender_id: NodeId, utxos: &UtxoTable) -> Result<()> {
        if !self.verify_signature() {
            return Err(BlockchainError::InvalidSignature);
        }
        if utxos.balance(sender_id) < self.amount {
            return Err(BlockchainError::InsufficientFunds);
        }
        Ok(())
    }
}

fn random_id() -> String {
    let mut bytes = [0u8; TX_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
