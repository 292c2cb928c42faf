//! Tipos partilhados entre os módulos do NoobCash

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Alias para o identificador numérico de um nó no anel
pub type NodeId = usize;

/// Alias para valores em NBC
pub type Amount = u64;

/// Crédito distribuído a cada participante quando o anel fecha
pub const INITIAL_NBC: Amount = 100;

/// Metadados de um participante do anel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: NodeId,
    pub ip: String,
    pub port: u16,
    /// Endereço da carteira (chave pública em PEM)
    pub address: String,
    /// Saldo corrente em NBC
    pub balance: Amount,
}

impl PeerInfo {
    /// URL base do nó
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

/// Anel fechado de nós participantes
///
/// A ordem de inserção é a ordem dos ids: o bootstrap entra primeiro com o
/// id 0 e atribui ids sequenciais aos que se registam a seguir. Depois de o
/// anel atingir o total declarado, a composição não muda.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ring {
    peers: Vec<PeerInfo>,
}

impl Ring {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Regista um participante e devolve o id atribuído
    pub fn add(&mut self, ip: String, port: u16, address: String, balance: Amount) -> NodeId {
        let id = self.peers.len();
        self.peers.push(PeerInfo {
            id,
            ip,
            port,
            address,
            balance,
        });
        id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&PeerInfo> {
        self.peers.get(id)
    }

    #[must_use]
    pub fn by_address(&self, address: &str) -> Option<&PeerInfo> {
        self.peers.iter().find(|peer| peer.address == address)
    }

    pub fn by_address_mut(&mut self, address: &str) -> Option<&mut PeerInfo> {
        self.peers.iter_mut().find(|peer| peer.address == address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerInfo> {
        self.peers.iter_mut()
    }

    /// Todos os participantes excepto o próprio
    pub fn others(&self, self_id: NodeId) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter().filter(move |peer| peer.id != self_id)
    }
}

/// Configuração do nó carregada do ambiente
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// IP declarado do bootstrap
    pub bootstrap_ip: String,
    /// Porta declarada do bootstrap
    pub bootstrap_port: u16,
    /// Transações por bloco minerado
    pub block_size: usize,
    /// Zeros hexadecimais exigidos pelo proof-of-work
    pub difficulty: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bootstrap_ip: "127.0.0.1".to_string(),
            bootstrap_port: 8000,
            block_size: 5,
            difficulty: 4,
        }
    }
}

impl NodeConfig {
    /// Lê a configuração das variáveis de ambiente, com defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bootstrap_ip: env::var("API_IP").unwrap_or(defaults.bootstrap_ip),
            bootstrap_port: env_parse("BOOTSTRAP_PORT", defaults.bootstrap_port),
            block_size: env_parse("BLOCK_SIZE", defaults.block_size),
            difficulty: env_parse("MINING_DIFFICULTY", defaults.difficulty),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
