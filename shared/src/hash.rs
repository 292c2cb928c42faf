use sha2::{Digest, Sha256};

/// Calcula o digest SHA-256 dos dados e devolve-o em hexadecimal
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verifica se o digest satisfaz a dificuldade exigida
/// (número de zeros hexadecimais iniciais)
#[must_use]
pub fn meets_difficulty(digest: &str, difficulty: usize) -> bool {
    leading_zeros(digest) >= difficulty
}

/// Conta os zeros hexadecimais iniciais do digest
#[must_use]
pub fn leading_zeros(digest: &str) -> usize {
    digest.chars().take_while(|&c| c == '0').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(sha256_hex(b"noobcash"), sha256_hex(b"noobcash"));
        assert_ne!(sha256_hex(b"noobcash"), sha256_hex(b"noobcash!"));
    }

    #[test]
    fn test_difficulty_check() {
        assert!(meets_difficulty("000abc", 3));
        assert!(meets_difficulty("000abc", 2));
        assert!(!meets_difficulty("000abc", 4));
        assert!(meets_difficulty("zzz", 0));
    }

    #[test]
    fn test_leading_zeros_count() {
        assert_eq!(leading_zeros("0000ff"), 4);
        assert_eq!(leading_zeros("f000"), 0);
        assert_eq!(leading_zeros("0"), 1);
    }
}
