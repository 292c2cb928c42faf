use rand::Rng;
use shared::hash;
use shared::Result;
use std::sync::Mutex;

use crate::block::Block;

/// Procura um nonce que satisfaça a dificuldade
///
/// Tenta nonces aleatórios de 32 bits, recalculando o hash do bloco a cada
/// tentativa, e consulta a flag de interrupção entre tentativas. Devolve
/// `true` com o nonce e o hash gravados no bloco, ou `false` se um bloco
/// concorrente chegou da rede entretanto.
///
/// # Errors
///
/// Retorna erro se o payload de hashing do bloco não puder ser construído
pub fn proof_of_work(
    block: &mut Block,
    difficulty: usize,
    interrupted: &Mutex<bool>,
) -> Result<bool> {
    let mut rng = rand::thread_rng();
    while !*interrupted.lock().unwrap() {
        block.nonce = rng.gen();
        let digest = block.calculate_hash()?;
        if hash::meets_difficulty(digest, difficulty) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_of_work_finds_nonce() {
        let mut block = Block::new("abc".to_string());
        let mined = proof_of_work(&mut block, 1, &Mutex::new(false)).unwrap();

        assert!(mined);
        assert!(block.hash.starts_with('0'));
        assert_eq!(block.compute_hash().unwrap(), block.hash);
    }

    #[test]
    fn test_interrupted_flag_aborts() {
        let mut block = Block::new("abc".to_string());
        // dificuldade impossível: só a interrupção pode terminar o ciclo
        let mined = proof_of_work(&mut block, 65, &Mutex::new(true)).unwrap();

        assert!(!mined);
    }
}
