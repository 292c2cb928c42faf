//! Identidade criptográfica dos nós: chaves RSA 2048 e assinaturas
//! PKCS#1 v1.5 sobre SHA-256

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

use crate::{BlockchainError, Result};

/// Tamanho da chave RSA em bits
const KEY_BITS: usize = 2048;

/// Carteira de um nó
///
/// A chave pública, exportada em PEM, é o endereço do nó na rede. A chave
/// privada nunca sai da carteira; os restantes módulos assinam através dela.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey<Sha256>,
    /// Endereço da carteira (chave pública em PEM)
    pub address: String,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Wallet {
    /// Gera uma carteira nova com um par de chaves fresco
    ///
    /// # Errors
    ///
    /// Retorna erro se a geração ou a exportação da chave falhar
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;
        let address = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;

        Ok(Self {
            signing_key: SigningKey::<Sha256>::new(private_key),
            address,
        })
    }

    /// Assina um payload canónico com a chave privada da carteira
    ///
    /// # Errors
    ///
    /// Retorna erro se a assinatura PKCS#1 v1.5 falhar
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign(payload)
            .map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;
        Ok(signature.to_vec())
    }
}

/// Verifica uma assinatura contra o endereço (chave pública PEM) do remetente
///
/// Falha fechado: qualquer erro de parse ou de verificação devolve `false`.
#[must_use]
pub fn verify_signature(address: &str, payload: &[u8], signature: &[u8]) -> bool {
    let Ok(public_key) = RsaPublicKey::from_public_key_pem(address) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public_key)
        .verify(payload, &signature)
        .is_ok()
}
