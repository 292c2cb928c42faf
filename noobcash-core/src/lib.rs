pub mod block;
pub mod blockchain;
pub mod mining;
pub mod transaction;
pub mod utxo;

// Re-exports principais
pub use block::{Block, GENESIS_PREVIOUS_HASH};
pub use blockchain::Blockchain;
pub use mining::proof_of_work;
pub use transaction::{Transaction, COINBASE_ADDRESS};
pub use utxo::{Utxo, UtxoTable, GENESIS_SENDER};

// Re-exports de tipos partilhados
pub use shared::{Amount, BlockchainError, NodeId, Result};
