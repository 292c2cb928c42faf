pub mod crypto;
pub mod error;
pub mod hash;
pub mod types;

pub use crypto::{verify_signature, Wallet};
pub use error::BlockchainError;
pub use types::{Amount, NodeConfig, NodeId, PeerInfo, Ring, INITIAL_NBC};

pub type Result<T> = std::result::Result<T, BlockchainError>;
