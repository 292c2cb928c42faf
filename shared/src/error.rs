use thiserror::Error;

/// Erros relacionados à blockchain
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Transação inválida: {0}")]
    InvalidTransaction(String),

    #[error("Bloco inválido: {0}")]
    InvalidBlock(String),

    #[error("Assinatura inválida")]
    InvalidSignature,

    #[error("Fundos insuficientes")]
    InsufficientFunds,

    #[error("Fila de UTXOs do nó {0} esgotada durante o débito")]
    UtxoUnderflow(usize),

    #[error("Participante desconhecido: {0}")]
    UnknownParty(usize),

    #[error("Erro criptográfico: {0}")]
    CryptographicError(String),

    #[error("Erro de serialização: {0}")]
    SerializationError(String),

    #[error("Erro de rede: {0}")]
    NetworkError(String),

    #[error("Erro de I/O: {0}")]
    IoError(String),
}
