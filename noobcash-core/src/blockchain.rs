use serde::{Deserialize, Serialize};
use shared::{Amount, BlockchainError, NodeId, Result};
use std::collections::HashSet;

use crate::block::{Block, GENESIS_PREVIOUS_HASH};
use crate::transaction::Transaction;
use crate::utxo::UtxoTable;

/// Estado replicado da cadeia NoobCash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockchain {
    /// Cadeia de blocos; o índice 0 é a génese
    pub chain: Vec<Block>,
    /// Zeros hexadecimais exigidos pelo proof-of-work
    pub difficulty: usize,
    /// Capacidade de transações de um bloco minerado
    pub max_block_transactions: usize,
    /// Conjunto autoritativo de UTXOs por participante
    pub utxos: UtxoTable,
    /// Ids de transações já aceites nalgum bloco
    pub confirmed: HashSet<String>,
}

impl Blockchain {
    /// Cadeia vazia, para nós não-bootstrap antes da sincronização inicial
    #[must_use]
    pub fn new(difficulty: usize, max_block_transactions: usize) -> Self {
        Self {
            chain: Vec::new(),
            difficulty,
            max_block_transactions,
            utxos: UtxoTable::new(),
            confirmed: HashSet::new(),
        }
    }

    /// Cadeia com bloco de génese: uma única transação coinbase credita o
    /// bootstrap com a alocação inicial completa
    ///
    /// # Errors
    ///
    /// Retorna erro se o hash da génese não puder ser calculado
    pub fn genesis(
        difficulty: usize,
        max_block_transactions: usize,
        bootstrap_address: &str,
        total: Amount,
    ) -> Result<Self> {
        let mut ledger = Self::new(difficulty, max_block_transactions);

        let mut block = Block::new(GENESIS_PREVIOUS_HASH.to_string());
        block
            .transactions
            .push(Transaction::coinbase(bootstrap_address.to_string(), total));
        block.calculate_hash()?;
        ledger.chain.push(block);

        ledger.utxos.add_party();
        ledger.utxos.seed_genesis(total)?;
        Ok(ledger)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    #[must_use]
    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Hash da ponta, ou a sentinela de génese numa cadeia vazia
    #[must_use]
    pub fn tip_hash(&self) -> String {
        self.last_block()
            .map_or_else(|| GENESIS_PREVIOUS_HASH.to_string(), |b| b.hash.clone())
    }

    /// Valida a cadeia inteira: a génese pela forma, os restantes blocos
    /// contra o antecessor respectivo
    ///
    /// # Errors
    ///
    /// Retorna `InvalidBlock` no primeiro bloco que falhar
    pub fn validate_chain(&self) -> Result<()> {
        for (i, block) in self.chain.iter().enumerate() {
            if i == 0 {
                if !block.is_genesis() {
                    return Err(BlockchainError::InvalidBlock(
                        "genesis block has the wrong shape".to_string(),
                    ));
                }
            } else {
                block.validate_against(&self.chain[i - 1], self.difficulty)?;
            }
        }
        Ok(())
    }

    /// Saldo de um participante segundo o conjunto autoritativo
    #[must_use]
    pub fn wallet_balance(&self, id: NodeId) -> Amount {
        self.utxos.balance(id)
    }

    #[must_use]
    pub fn is_confirmed(&self, transaction_id: &str) -> bool {
        self.confirmed.contains(transaction_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::proof_of_work;
    use std::sync::Mutex;

    fn genesis_chain() -> Blockchain {
        Blockchain::genesis(1, 2, "bootstrap-addr", 500).unwrap()
    }

    fn mined_block(chain: &Blockchain) -> Block {
        let mut block = Block::new(chain.tip_hash());
        block
            .transactions
            .push(Transaction::new("a".into(), "b".into(), 10));
        assert!(proof_of_work(&mut block, chain.difficulty, &Mutex::new(false)).unwrap());
        block
    }

    #[test]
    fn test_genesis_construction() {
        let chain = genesis_chain();

        assert_eq!(chain.len(), 1);
        assert!(chain.chain[0].is_genesis());
        assert_eq!(chain.chain[0].transactions.len(), 1);
        assert!(chain.chain[0].transactions[0].is_coinbase());
        assert_eq!(chain.wallet_balance(0), 500);
        assert_eq!(chain.tip_hash(), chain.chain[0].hash);
    }

    #[test]
    fn test_validate_chain_accepts_extension() {
        let mut chain = genesis_chain();
        let block = mined_block(&chain);
        chain.chain.push(block);

        assert!(chain.validate_chain().is_ok());
    }

    #[test]
    fn test_validate_chain_rejects_broken_link() {
        let mut chain = genesis_chain();
        let mut block = mined_block(&chain);
        block.previous_hash = "quebrado".to_string();
        chain.chain.push(block);

        assert!(matches!(
            chain.validate_chain(),
            Err(BlockchainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_validate_chain_rejects_bad_genesis() {
        let mut chain = genesis_chain();
        chain.chain[0].nonce = 9;

        assert!(matches!(
            chain.validate_chain(),
            Err(BlockchainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_empty_chain_tip_is_sentinel() {
        let chain = Blockchain::new(1, 2);

        assert!(chain.is_empty());
        assert_eq!(chain.tip_hash(), GENESIS_PREVIOUS_HASH);
        assert!(chain.validate_chain().is_ok());
    }

    #[test]
    fn test_confirmed_set() {
        let mut chain = genesis_chain();
        chain.confirmed.insert("tx-1".to_string());

        assert!(chain.is_confirmed("tx-1"));
        assert!(!chain.is_confirmed("tx-2"));
    }
}
