//! The per-node consensus engine: pending pool, mining loop with network
//! preemption, dual UTXO bookkeeping and inbound-block arbitration.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use noobcash_core::{proof_of_work, Block, Blockchain, Transaction, UtxoTable};
use shared::{Amount, BlockchainError, NodeConfig, NodeId, Ring, Wallet, INITIAL_NBC};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::network::PeerClient;

/// Outcome of inbound-block arbitration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockVerdict {
    /// Committed on top of the local tip
    Accepted,
    /// Sibling of the current tip; the tie is broken in favour of the local chain
    RejectedSibling,
    /// Structural mismatch: the longest-chain protocol must run
    Conflict,
}

/// A NoobCash peer: wallet identity, replicated chain state and the mining
/// machinery, shared between the HTTP handlers and the miner thread.
///
/// Lock discipline: `processing_block` serializes every block commit (local
/// or inbound) and every pool-to-candidate admission step; `incoming_block`
/// is the preemption flag the miner polls between proof-of-work trials and
/// is only flipped while `processing_block` is held.
pub struct Node {
    pub wallet: Wallet,
    pub ip: String,
    pub port: u16,
    pub id: NodeId,
    pub is_bootstrap: bool,
    pub total_nodes: usize,
    pub config: NodeConfig,

    pub ring: Mutex<Ring>,
    pub blockchain: Mutex<Blockchain>,
    pending: Mutex<VecDeque<Transaction>>,
    current_block: Mutex<Option<Block>>,
    /// Speculative UTXO state used while a candidate block is assembled
    temp_utxos: Mutex<UtxoTable>,
    /// Transactions this wallet took part in (informational)
    wallet_log: Mutex<Vec<Transaction>>,

    processing_block: Mutex<()>,
    incoming_block: Mutex<bool>,
    is_mining: AtomicBool,
}

impl Node {
    pub fn new(
        wallet: Wallet,
        ip: String,
        port: u16,
        total_nodes: usize,
        config: NodeConfig,
        is_bootstrap: bool,
    ) -> Self {
        let blockchain = Blockchain::new(config.difficulty, config.block_size);
        Self {
            wallet,
            ip,
            port,
            id: 0,
            is_bootstrap,
            total_nodes,
            config,
            ring: Mutex::new(Ring::new()),
            blockchain: Mutex::new(blockchain),
            pending: Mutex::new(VecDeque::new()),
            current_block: Mutex::new(None),
            temp_utxos: Mutex::new(UtxoTable::new()),
            wallet_log: Mutex::new(Vec::new()),
            processing_block: Mutex::new(()),
            incoming_block: Mutex::new(false),
            is_mining: AtomicBool::new(false),
        }
    }

    /// Allocation minted at genesis: 100 NBC per declared participant
    #[must_use]
    pub fn total_supply(&self) -> Amount {
        self.total_nodes as Amount * INITIAL_NBC
    }

    /// Bootstrap start-up: id 0, the whole allocation on the ring entry, a
    /// genesis chain and a fresh candidate block
    ///
    /// # Errors
    ///
    /// Returns an error if the genesis block cannot be built
    pub fn init_bootstrap(&mut self) -> shared::Result<()> {
        let total = self.total_supply();
        self.ring.get_mut().unwrap().add(
            self.ip.clone(),
            self.port,
            self.wallet.address.clone(),
            total,
        );

        let chain = Blockchain::genesis(
            self.config.difficulty,
            self.config.block_size,
            &self.wallet.address,
            total,
        )?;
        *self.temp_utxos.get_mut().unwrap() = chain.utxos.clone();
        *self.current_block.get_mut().unwrap() = Some(Block::new(chain.tip_hash()));
        *self.blockchain.get_mut().unwrap() = chain;
        info!("👑 Genesis block created, {total} NBC allocated");
        Ok(())
    }

    /// Bootstrap only: add a node to the ring, grow the UTXO tables and
    /// hand out the next sequential id
    pub fn register_peer(&self, ip: String, port: u16, address: String) -> NodeId {
        let id = self.ring.lock().unwrap().add(ip, port, address, 0);
        self.blockchain.lock().unwrap().utxos.add_party();
        self.temp_utxos.lock().unwrap().add_party();
        info!("🔗 Node {id} joined the ring");
        id
    }

    /// Replace the local ring with the one the bootstrap broadcast
    pub fn receive_ring(&self, ring: Ring) {
        *self.ring.lock().unwrap() = ring;
        info!("🔗 Ring received");
    }

    /// Replace the local chain with the one the bootstrap broadcast and
    /// reseed the speculative table from it
    pub fn receive_chain(&self, chain: Blockchain) {
        *self.temp_utxos.lock().unwrap() = chain.utxos.clone();
        *self.blockchain.lock().unwrap() = chain;
        info!("⛓️ Blockchain received");
    }

    /// Current balance of the local wallet according to the ring
    #[must_use]
    pub fn balance(&self) -> Amount {
        self.ring
            .lock()
            .unwrap()
            .by_address(&self.wallet.address)
            .map_or(0, |peer| peer.balance)
    }

    /// Create and sign a transfer from the local wallet
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails
    pub fn create_transaction(
        &self,
        receiver_address: String,
        amount: Amount,
    ) -> shared::Result<Transaction> {
        let mut tx = Transaction::new(self.wallet.address.clone(), receiver_address, amount);
        tx.sign(&self.wallet)?;
        Ok(tx)
    }

    /// Push a transaction to the front of the pending pool and make sure a
    /// candidate block exists; the miner consumes from the back (FIFO)
    pub fn enqueue_transaction(&self, transaction: Transaction) {
        self.pending.lock().unwrap().push_front(transaction);
        self.ensure_current_block();
    }

    /// Pool entry point used by the API: enqueue and keep the miner running
    pub fn add_transaction_to_pending(self: Arc<Self>, transaction: Transaction, client: &PeerClient) {
        self.enqueue_transaction(transaction);
        self.spawn_miner(client);
    }

    /// Start the single miner thread if it is not already running
    pub fn spawn_miner(self: Arc<Self>, client: &PeerClient) {
        if self
            .is_mining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let node = Arc::clone(&self);
        let client = client.clone();
        let handle = Handle::current();
        let spawned = thread::Builder::new().name("miner".to_string()).spawn(move || {
            node.mine_loop(|block| handle.block_on(client.broadcast_block(&node, block)));
            node.is_mining.store(false, Ordering::SeqCst);
        });
        if let Err(e) = spawned {
            error!("could not spawn the miner thread: {e}");
            self.is_mining.store(false, Ordering::SeqCst);
        }
    }

    /// The mining loop: drain the pending pool into candidate blocks, run
    /// proof-of-work on every full candidate and commit the winners.
    fn mine_loop(&self, broadcast: impl Fn(&Block)) {
        // leftovers of an interrupted round go back to the pool first, and
        // the speculative table restarts from the authoritative one
        {
            let _guard = self.processing_block.lock().unwrap();
            self.requeue_current_block();
            self.reset_speculative_state();
        }

        while let Some(full) = self.admit_next_transaction() {
            if full {
                self.mine_and_commit(&broadcast);
            }
        }
    }

    /// One admission step, serialized against block commits: drop the pool
    /// tail if it is already confirmed or fails validation against the
    /// speculative table, otherwise move it into the candidate block.
    /// Returns whether the candidate became full, or `None` on an empty
    /// pool.
    fn admit_next_transaction(&self) -> Option<bool> {
        let _guard = self.processing_block.lock().unwrap();
        let tx = self.peek_pending()?;

        if self
            .blockchain
            .lock()
            .unwrap()
            .is_confirmed(&tx.transaction_id)
        {
            self.pop_pending();
            return Some(false);
        }

        let (sender_id, receiver_id) = match self.participant_ids(&tx) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Transaction dropped: {e}");
                self.pop_pending();
                return Some(false);
            }
        };

        if let Err(e) = tx.validate(sender_id, &self.temp_utxos.lock().unwrap()) {
            warn!("Transaction NOT validated ({e}), dropping");
            self.pop_pending();
            return Some(false);
        }

        if let Err(e) = self
            .temp_utxos
            .lock()
            .unwrap()
            .apply(sender_id, receiver_id, tx.amount)
        {
            error!("UTXO critical error: {e}");
        }
        let full = self.push_to_current(tx) >= self.config.block_size;
        self.pop_pending();
        Some(full)
    }

    /// Run proof-of-work on the current candidate and commit it unless the
    /// network preempted the round
    fn mine_and_commit(&self, broadcast: &impl Fn(&Block)) {
        let Some(mut candidate) = self.current_block.lock().unwrap().clone() else {
            return;
        };
        info!(
            "⛏️ Block full, starting proof-of-work on {} transactions",
            candidate.transactions.len()
        );

        let mined = match proof_of_work(&mut candidate, self.config.difficulty, &self.incoming_block)
        {
            Ok(mined) => mined,
            Err(e) => {
                error!("proof-of-work failed: {e}");
                false
            }
        };

        let committed = {
            let _guard = self.processing_block.lock().unwrap();
            let preempted = *self.incoming_block.lock().unwrap();
            if mined && !preempted {
                let validation = candidate.validate(&self.blockchain.lock().unwrap());
                match validation {
                    Ok(()) => {
                        self.commit_mined_block(&candidate);
                        true
                    }
                    Err(e) => {
                        debug!("Mined candidate rejected: {e}");
                        false
                    }
                }
            } else {
                debug!("Mining aborted: block mined elsewhere");
                false
            }
        };

        if committed {
            info!(
                "⛏️ Block mined | miner: node {} | hash: {}... | transactions: {} | nonce: {}",
                self.id,
                &candidate.hash[..15],
                candidate.transactions.len(),
                candidate.nonce
            );
            broadcast(&candidate);
        }

        // fresh candidate and speculative state for the next round
        self.reset_current_block();
        self.reset_speculative_state();
    }

    /// Commit a locally-mined block: the speculative table becomes the
    /// authoritative one
    fn commit_mined_block(&self, block: &Block) {
        {
            let mut chain = self.blockchain.lock().unwrap();
            chain.chain.push(block.clone());
            chain.utxos = self.temp_utxos.lock().unwrap().clone();
            for tx in &block.transactions {
                chain.confirmed.insert(tx.transaction_id.clone());
            }
        }
        for tx in &block.transactions {
            self.update_wallet_state(tx);
        }
    }

    /// Arbitrate a block received from a peer. All state changes happen
    /// under the processing lock; the consensus protocol itself is network
    /// IO and is left to the caller.
    pub fn handle_incoming_block(&self, block: Block) -> BlockVerdict {
        let _guard = self.processing_block.lock().unwrap();

        let (verdict, sibling) = {
            let chain = self.blockchain.lock().unwrap();
            (
                block.validate(&chain),
                chain
                    .last_block()
                    .is_some_and(|tip| tip.previous_hash == block.previous_hash),
            )
        };

        match verdict {
            Ok(()) => {
                *self.incoming_block.lock().unwrap() = true;
                self.adopt_block(&block);
                *self.incoming_block.lock().unwrap() = false;
                info!(
                    "📦 Block accepted from the network | chain length: {}",
                    self.blockchain.lock().unwrap().len()
                );
                BlockVerdict::Accepted
            }
            Err(_) if sibling => {
                warn!("Rejected incoming block: sibling of the current tip");
                BlockVerdict::RejectedSibling
            }
            Err(e) => {
                warn!("Incoming block rejected ({e}), consensus needed");
                BlockVerdict::Conflict
            }
        }
    }

    /// Replace the local chain wholesale after consensus found a longer
    /// valid one; ring balances follow the adopted UTXO table
    pub fn adopt_chain(&self, new_chain: Blockchain) {
        let _guard = self.processing_block.lock().unwrap();
        {
            let mut chain = self.blockchain.lock().unwrap();
            *chain = new_chain;
            let mut ring = self.ring.lock().unwrap();
            for peer in ring.iter_mut() {
                peer.balance = chain.utxos.balance(peer.id);
            }
        }
        self.requeue_current_block();
        self.prune_confirmed_pending();
        self.reset_current_block();
        self.reset_speculative_state();
        info!(
            "🔄 Chain replaced | new length: {}",
            self.blockchain.lock().unwrap().len()
        );
    }

    /// Apply a peer-mined block to the authoritative state
    fn adopt_block(&self, block: &Block) {
        {
            let mut chain = self.blockchain.lock().unwrap();
            chain.chain.push(block.clone());
            let ring = self.ring.lock().unwrap();
            for tx in &block.transactions {
                let sender = ring.by_address(&tx.sender_address).map(|p| p.id);
                let receiver = ring.by_address(&tx.receiver_address).map(|p| p.id);
                if let (Some(sender), Some(receiver)) = (sender, receiver) {
                    if let Err(e) = chain.utxos.apply(sender, receiver, tx.amount) {
                        error!("UTXO critical error: {e}");
                    }
                }
                chain.confirmed.insert(tx.transaction_id.clone());
            }
        }
        for tx in &block.transactions {
            self.update_wallet_state(tx);
        }
        self.reset_speculative_state();
        self.reconcile_pending(block);
    }

    /// Adjust ring balances for a committed transaction and keep the local
    /// wallet participation log
    fn update_wallet_state(&self, tx: &Transaction) {
        if tx.sender_address == self.wallet.address || tx.receiver_address == self.wallet.address {
            self.wallet_log.lock().unwrap().push(tx.clone());
        }

        let mut ring = self.ring.lock().unwrap();
        let mut sender_id = None;
        if let Some(sender) = ring.by_address_mut(&tx.sender_address) {
            sender.balance = sender.balance.saturating_sub(tx.amount);
            sender_id = Some(sender.id);
        }
        let mut receiver_id = None;
        if let Some(receiver) = ring.by_address_mut(&tx.receiver_address) {
            receiver.balance += tx.amount;
            receiver_id = Some(receiver.id);
        }
        drop(ring);

        if let (Some(sender), Some(receiver)) = (sender_id, receiver_id) {
            info!("💸 New transaction | {sender} --> {receiver} | {} NBC", tx.amount);
        }
    }

    /// Rebuild the pending pool after an externally-mined block: salvage
    /// the miner's uncommitted work, then drop everything already confirmed
    fn reconcile_pending(&self, incoming: &Block) {
        let salvaged = {
            let mut current = self.current_block.lock().unwrap();
            std::mem::replace(&mut *current, Some(Block::new(incoming.hash.clone())))
                .map_or(Vec::new(), |block| block.transactions)
        };

        let chain = self.blockchain.lock().unwrap();
        let mut pending = self.pending.lock().unwrap();
        for tx in salvaged {
            if !chain.is_confirmed(&tx.transaction_id) {
                pending.push_back(tx);
            }
        }
        pending.retain(|tx| !chain.is_confirmed(&tx.transaction_id));
    }

    /// Return the leftovers of a partially-filled candidate to the pool;
    /// the pool is consumed from the back, so the oldest leftover goes in
    /// last
    fn requeue_current_block(&self) {
        let leftovers = {
            let mut current = self.current_block.lock().unwrap();
            current
                .as_mut()
                .map_or(Vec::new(), |block| std::mem::take(&mut block.transactions))
        };
        if leftovers.is_empty() {
            return;
        }
        let mut pending = self.pending.lock().unwrap();
        for tx in leftovers.into_iter().rev() {
            pending.push_back(tx);
        }
    }

    fn prune_confirmed_pending(&self) {
        let chain = self.blockchain.lock().unwrap();
        self.pending
            .lock()
            .unwrap()
            .retain(|tx| !chain.is_confirmed(&tx.transaction_id));
    }

    fn ensure_current_block(&self) {
        let tip = self.blockchain.lock().unwrap().tip_hash();
        let mut current = self.current_block.lock().unwrap();
        if current.is_none() {
            *current = Some(Block::new(tip));
        }
    }

    /// Append a transaction to the candidate block, creating it if needed,
    /// and return the resulting size
    fn push_to_current(&self, tx: Transaction) -> usize {
        let tip = self.blockchain.lock().unwrap().tip_hash();
        let mut current = self.current_block.lock().unwrap();
        let block = current.get_or_insert_with(|| Block::new(tip));
        block.transactions.push(tx);
        block.transactions.len()
    }

    fn reset_current_block(&self) {
        let tip = self.blockchain.lock().unwrap().tip_hash();
        *self.current_block.lock().unwrap() = Some(Block::new(tip));
    }

    fn reset_speculative_state(&self) {
        let authoritative = self.blockchain.lock().unwrap().utxos.clone();
        *self.temp_utxos.lock().unwrap() = authoritative;
    }

    fn peek_pending(&self) -> Option<Transaction> {
        self.pending.lock().unwrap().back().cloned()
    }

    fn pop_pending(&self) {
        self.pending.lock().unwrap().pop_back();
    }

    /// Resolve both endpoints of a transfer to ring ids
    fn participant_ids(&self, tx: &Transaction) -> shared::Result<(NodeId, NodeId)> {
        let ring = self.ring.lock().unwrap();
        let sender = ring
            .by_address(&tx.sender_address)
            .ok_or_else(|| {
                BlockchainError::InvalidTransaction("sender address not in the ring".to_string())
            })?
            .id;
        let receiver = ring
            .by_address(&tx.receiver_address)
            .ok_or_else(|| {
                BlockchainError::InvalidTransaction("receiver address not in the ring".to_string())
            })?
            .id;
        Ok((sender, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn test_config() -> NodeConfig {
        NodeConfig {
            bootstrap_ip: "127.0.0.1".to_string(),
            bootstrap_port: 8000,
            block_size: 2,
            difficulty: 1,
        }
    }

    fn wallet_pool() -> &'static Vec<Wallet> {
        static POOL: OnceLock<Vec<Wallet>> = OnceLock::new();
        POOL.get_or_init(|| (0..3).map(|_| Wallet::generate().expect("keygen")).collect())
    }

    /// Mini-rede sem IO: o bootstrap cria a génese e regista os restantes,
    /// que depois recebem o anel e a cadeia como na difusão inicial
    fn build_network(n: usize) -> Vec<Node> {
        let wallets = wallet_pool();
        let mut nodes: Vec<Node> = (0..n)
            .map(|i| {
                Node::new(
                    wallets[i].clone(),
                    "127.0.0.1".to_string(),
                    8000 + u16::try_from(i).unwrap(),
                    n,
                    test_config(),
                    i == 0,
                )
            })
            .collect();
        nodes[0].init_bootstrap().unwrap();

        let (boot, rest) = nodes.split_at_mut(1);
        for node in rest.iter_mut() {
            node.id =
                boot[0].register_peer(node.ip.clone(), node.port, node.wallet.address.clone());
        }

        let ring = nodes[0].ring.lock().unwrap().clone();
        let chain = nodes[0].blockchain.lock().unwrap().clone();
        for node in &nodes[1..] {
            node.receive_ring(ring.clone());
            node.receive_chain(chain.clone());
        }
        nodes
    }

    /// Invariantes: saldo do anel == soma das UTXOs, oferta total conservada
    fn assert_ledger_consistent(node: &Node) {
        let chain = node.blockchain.lock().unwrap();
        let ring = node.ring.lock().unwrap();
        let mut total = 0;
        for peer in ring.iter() {
            assert_eq!(peer.balance, chain.utxos.balance(peer.id));
            total += peer.balance;
        }
        assert_eq!(total, node.total_supply());
    }

    #[test]
    fn test_bootstrap_holds_whole_allocation() {
        let nodes = build_network(3);

        assert_eq!(nodes[0].balance(), 300);
        assert_eq!(nodes[0].blockchain.lock().unwrap().len(), 1);
        for node in &nodes {
            assert_eq!(node.ring.lock().unwrap().len(), 3);
            assert_eq!(node.blockchain.lock().unwrap().utxos.parties(), 3);
        }
        assert_ledger_consistent(&nodes[0]);
    }

    #[test]
    fn test_full_block_is_mined_and_relayed() {
        let nodes = build_network(3);
        let gift1 = nodes[0]
            .create_transaction(nodes[1].wallet.address.clone(), 100)
            .unwrap();
        let gift2 = nodes[0]
            .create_transaction(nodes[2].wallet.address.clone(), 100)
            .unwrap();
        nodes[0].enqueue_transaction(gift1);
        nodes[0].enqueue_transaction(gift2);

        nodes[0].mine_loop(|_| {});

        {
            let chain = nodes[0].blockchain.lock().unwrap();
            assert_eq!(chain.len(), 2);
            let mined = chain.last_block().unwrap();
            assert_eq!(mined.transactions.len(), 2);
            assert!(mined.hash.starts_with('0'));
            assert!(chain.validate_chain().is_ok());
        }
        assert_eq!(nodes[0].balance(), 100);
        assert!(nodes[0].pending.lock().unwrap().is_empty());
        assert_eq!(nodes[0].wallet_log.lock().unwrap().len(), 2);
        assert_ledger_consistent(&nodes[0]);

        // os restantes nós aceitam o bloco difundido
        let mined = nodes[0]
            .blockchain
            .lock()
            .unwrap()
            .last_block()
            .unwrap()
            .clone();
        for node in &nodes[1..] {
            assert_eq!(
                node.handle_incoming_block(mined.clone()),
                BlockVerdict::Accepted
            );
            assert_eq!(node.balance(), 100);
            assert_eq!(node.wallet_log.lock().unwrap().len(), 1);
            assert_ledger_consistent(node);
        }
    }

    #[test]
    fn test_overspend_is_dropped_permanently() {
        let nodes = build_network(3);
        let node0 = &nodes[0];
        let tx1 = node0
            .create_transaction(nodes[1].wallet.address.clone(), 200)
            .unwrap();
        let tx2 = node0
            .create_transaction(nodes[1].wallet.address.clone(), 200)
            .unwrap();
        node0.enqueue_transaction(tx1);
        node0.enqueue_transaction(tx2);

        node0.mine_loop(|_| {});

        // só a primeira cabe no estado especulativo; a segunda cai de vez
        assert_eq!(node0.blockchain.lock().unwrap().len(), 1);
        assert!(node0.pending.lock().unwrap().is_empty());
        assert_eq!(
            node0
                .current_block
                .lock()
                .unwrap()
                .as_ref()
                .unwrap()
                .transactions
                .len(),
            1
        );

        // o bloco enche na ronda seguinte e o commit bate certo
        let tx3 = node0
            .create_transaction(nodes[2].wallet.address.clone(), 100)
            .unwrap();
        node0.enqueue_transaction(tx3);
        node0.mine_loop(|_| {});

        assert_eq!(node0.blockchain.lock().unwrap().len(), 2);
        assert_eq!(node0.balance(), 0);
        assert_eq!(node0.ring.lock().unwrap().get(1).unwrap().balance, 200);
        assert_eq!(node0.ring.lock().unwrap().get(2).unwrap().balance, 100);
        assert_ledger_consistent(node0);
    }

    #[test]
    fn test_tampered_transaction_never_mined() {
        let nodes = build_network(3);
        let node0 = &nodes[0];
        let mut tx = node0
            .create_transaction(nodes[1].wallet.address.clone(), 40)
            .unwrap();
        tx.amount = 240; // adulterada depois de assinada
        node0.enqueue_transaction(tx);

        node0.mine_loop(|_| {});

        assert_eq!(node0.blockchain.lock().unwrap().len(), 1);
        assert!(node0.pending.lock().unwrap().is_empty());
        assert!(node0
            .current_block
            .lock()
            .unwrap()
            .as_ref()
            .unwrap()
            .transactions
            .is_empty());
        assert_eq!(node0.balance(), 300);
    }

    #[test]
    fn test_incoming_block_reconciles_pending() {
        let nodes = build_network(3);
        let tx1 = nodes[0]
            .create_transaction(nodes[1].wallet.address.clone(), 60)
            .unwrap();
        let tx2 = nodes[0]
            .create_transaction(nodes[2].wallet.address.clone(), 40)
            .unwrap();
        // os dois primeiros nós vêem as mesmas transferências
        for node in &nodes[..2] {
            node.enqueue_transaction(tx1.clone());
            node.enqueue_transaction(tx2.clone());
        }

        // o nó 0 ganha a corrida
        nodes[0].mine_loop(|_| {});
        let mined = nodes[0]
            .blockchain
            .lock()
            .unwrap()
            .last_block()
            .unwrap()
            .clone();

        // o bloco recebido limpa o trabalho por confirmar do nó 1
        assert_eq!(
            nodes[1].handle_incoming_block(mined.clone()),
            BlockVerdict::Accepted
        );
        assert!(nodes[1].pending.lock().unwrap().is_empty());
        {
            let current = nodes[1].current_block.lock().unwrap();
            let reset = current.as_ref().unwrap();
            assert_eq!(reset.previous_hash, mined.hash);
            assert!(reset.transactions.is_empty());
        }
        assert_ledger_consistent(&nodes[1]);
        assert_eq!(
            nodes[1].blockchain.lock().unwrap().tip_hash(),
            nodes[0].blockchain.lock().unwrap().tip_hash()
        );
    }

    #[test]
    fn test_sibling_block_is_rejected() {
        let nodes = build_network(3);
        let tx1 = nodes[0]
            .create_transaction(nodes[1].wallet.address.clone(), 60)
            .unwrap();
        let tx2 = nodes[0]
            .create_transaction(nodes[2].wallet.address.clone(), 40)
            .unwrap();
        nodes[0].enqueue_transaction(tx1);
        nodes[0].enqueue_transaction(tx2);
        nodes[0].mine_loop(|_| {});

        // um rival com o mesmo antecessor perde o desempate local
        let mut rival = nodes[0]
            .blockchain
            .lock()
            .unwrap()
            .last_block()
            .unwrap()
            .clone();
        rival.nonce = rival.nonce.wrapping_add(1);

        assert_eq!(
            nodes[0].handle_incoming_block(rival),
            BlockVerdict::RejectedSibling
        );
        assert_eq!(nodes[0].blockchain.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_stale_node_detects_conflict_and_adopts() {
        let nodes = build_network(3);
        // o nó 0 minera dois blocos enquanto o nó 1 está isolado
        for _ in 0..2 {
            let a = nodes[0]
                .create_transaction(nodes[1].wallet.address.clone(), 10)
                .unwrap();
            let b = nodes[0]
                .create_transaction(nodes[2].wallet.address.clone(), 10)
                .unwrap();
            nodes[0].enqueue_transaction(a);
            nodes[0].enqueue_transaction(b);
            nodes[0].mine_loop(|_| {});
        }
        assert_eq!(nodes[0].blockchain.lock().unwrap().len(), 3);

        // o segundo bloco minerado não encaixa na ponta do nó 1
        let second = nodes[0].blockchain.lock().unwrap().chain[2].clone();
        assert_eq!(
            nodes[1].handle_incoming_block(second),
            BlockVerdict::Conflict
        );

        // a resolução adopta a cadeia mais longa e realinha os saldos
        let donor = nodes[0].blockchain.lock().unwrap().clone();
        assert!(donor.validate_chain().is_ok());
        nodes[1].adopt_chain(donor);

        assert_eq!(nodes[1].blockchain.lock().unwrap().len(), 3);
        assert_eq!(nodes[1].balance(), 20);
        assert_ledger_consistent(&nodes[1]);
    }

    #[test]
    fn test_duplicate_of_confirmed_transaction_is_skipped() {
        let nodes = build_network(3);
        let tx1 = nodes[0]
            .create_transaction(nodes[1].wallet.address.clone(), 60)
            .unwrap();
        let tx2 = nodes[0]
            .create_transaction(nodes[2].wallet.address.clone(), 40)
            .unwrap();
        nodes[0].enqueue_transaction(tx1.clone());
        nodes[0].enqueue_transaction(tx2);
        nodes[0].mine_loop(|_| {});
        assert_eq!(nodes[0].blockchain.lock().unwrap().len(), 2);

        // a mesma transferência volta a aparecer: já confirmada, é ignorada
        nodes[0].enqueue_transaction(tx1);
        nodes[0].mine_loop(|_| {});

        assert_eq!(nodes[0].blockchain.lock().unwrap().len(), 2);
        assert!(nodes[0].pending.lock().unwrap().is_empty());
        assert!(nodes[0]
            .current_block
            .lock()
            .unwrap()
            .as_ref()
            .unwrap()
            .transactions
            .is_empty());
    }
}
