use serde::{Deserialize, Serialize};
use shared::{Amount, BlockchainError, NodeId, Result};
use std::collections::VecDeque;

/// Remetente sentinela do crédito de génese
pub const GENESIS_SENDER: i64 = -1;

/// Saída de transação não gasta: um crédito de `amount` NBC do nó `sender`
/// para o nó `receiver`. Nunca é mutada depois de criada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub sender: i64,
    pub receiver: i64,
    pub amount: Amount,
}

impl Utxo {
    #[must_use]
    pub const fn new(sender: i64, receiver: i64, amount: Amount) -> Self {
        Self {
            sender,
            receiver,
            amount,
        }
    }
}

/// Conjunto de UTXOs da rede: uma fila FIFO por participante, indexada
/// pelo id do nó
///
/// Créditos entram pela cauda; débitos saem pela frente. O troco de um
/// débito volta para a cauda da fila do remetente.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoTable {
    queues: Vec<VecDeque<Utxo>>,
}

impl UtxoTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acrescenta a fila (vazia) de um novo participante
    pub fn add_party(&mut self) {
        self.queues.push(VecDeque::new());
    }

    /// Número de participantes com fila própria
    #[must_use]
    pub fn parties(&self) -> usize {
        self.queues.len()
    }

    /// Saldo de um participante: soma das suas UTXOs
    #[must_use]
    pub fn balance(&self, id: NodeId) -> Amount {
        self.queues
            .get(id)
            .map_or(0, |queue| queue.iter().map(|utxo| utxo.amount).sum())
    }

    /// Crédito inicial de génese: a alocação total inteira para o bootstrap
    ///
    /// # Errors
    ///
    /// Retorna erro se a fila do bootstrap ainda não existir
    pub fn seed_genesis(&mut self, total: Amount) -> Result<()> {
        self.queue_mut(0)?.push_back(Utxo::new(GENESIS_SENDER, 0, total));
        Ok(())
    }

    /// Aplica uma transferência: credita o destinatário com uma UTXO nova e
    /// debita o remetente pela frente da fila até cobrir o valor; o
    /// excedente volta como troco `(s, s, Δ)` para a cauda.
    ///
    /// # Errors
    ///
    /// Retorna `UtxoUnderflow` se a fila do remetente esgotar antes de o
    /// valor ficar coberto; o crédito ao destinatário já terá sido feito.
    pub fn apply(&mut self, sender: NodeId, receiver: NodeId, amount: Amount) -> Result<()> {
        self.queue_mut(receiver)?
            .push_back(Utxo::new(sender as i64, receiver as i64, amount));

        let queue = self.queue_mut(sender)?;
        let mut accumulated: Amount = 0;
        while accumulated < amount {
            match queue.pop_front() {
                Some(utxo) => accumulated += utxo.amount,
                None => return Err(BlockchainError::UtxoUnderflow(sender)),
            }
        }
        if accumulated > amount {
            queue.push_back(Utxo::new(sender as i64, sender as i64, accumulated - amount));
        }
        Ok(())
    }

    fn queue_mut(&mut self, id: NodeId) -> Result<&mut VecDeque<Utxo>> {
        self.queues
            .get_mut(id)
            .ok_or(BlockchainError::UnknownParty(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(parties: usize) -> UtxoTable {
        let mut table = UtxoTable::new();
        for _ in 0..parties {
            table.add_party();
        }
        table
    }

    #[test]
    fn test_genesis_seed() {
        let mut table = table(1);
        table.seed_genesis(500).unwrap();

        assert_eq!(table.balance(0), 500);
    }

    #[test]
    fn test_apply_credits_and_debits() {
        let mut table = table(2);
        table.seed_genesis(500).unwrap();

        table.apply(0, 1, 120).unwrap();

        assert_eq!(table.balance(0), 380);
        assert_eq!(table.balance(1), 120);
    }

    #[test]
    fn test_change_goes_to_sender_tail() {
        let mut table = table(2);
        table.seed_genesis(500).unwrap();

        // um débito parcial produz troco (0, 0, 380) na cauda do remetente
        table.apply(0, 1, 120).unwrap();
        // o troco cobre exactamente o próximo débito
        table.apply(0, 1, 380).unwrap();

        assert_eq!(table.balance(0), 0);
        assert_eq!(table.balance(1), 500);
    }

    #[test]
    fn test_debit_consumes_fifo() {
        let mut table = table(2);
        table.seed_genesis(100).unwrap();
        table.apply(0, 1, 40).unwrap(); // nó 1 fica com (0, 1, 40)
        table.apply(1, 0, 10).unwrap(); // consome a UTXO de 40, troco 30

        assert_eq!(table.balance(1), 30);
        assert_eq!(table.balance(0), 70);
    }

    #[test]
    fn test_underflow_is_reported() {
        let mut table = table(2);
        table.seed_genesis(50).unwrap();

        let result = table.apply(0, 1, 80);

        assert!(matches!(result, Err(BlockchainError::UtxoUnderflow(0))));
    }

    #[test]
    fn test_unknown_party() {
        let mut table = table(1);

        assert!(matches!(
            table.apply(0, 7, 10),
            Err(BlockchainError::UnknownParty(7))
        ));
    }

    #[test]
    fn test_balance_of_missing_queue_is_zero() {
        let table = table(1);
        assert_eq!(table.balance(9), 0);
    }
}
