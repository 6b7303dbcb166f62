use rand::Rng;

use crate::db_types::DealCode;

/// Uppercase letters and digits only; codes get typed into chat clients by hand.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a fresh candidate deal code. Uniqueness is *not* guaranteed here; the ledger reserves
/// the code against the store and asks for another candidate on a collision.
pub fn generate_deal_code(length: usize) -> DealCode {
    let mut rng = rand::thread_rng();
    let code: String = (0..length).map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char).collect();
    DealCode(code)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_use_the_expected_alphabet() {
        for _ in 0..1000 {
            let code = generate_deal_code(6);
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)), "bad code: {code}");
        }
    }

    #[test]
    fn code_length_is_caller_controlled() {
        assert_eq!(generate_deal_code(8).as_str().len(), 8);
        assert_eq!(generate_deal_code(1).as_str().len(), 1);
    }
}
