//! Random session token generation.

use rand::Rng;

/// Base58-like alphabet: no 0, O, I or l, so tokens survive being read
/// aloud or retyped.
const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Generate a random token of the given length.
///
/// Length should be 24 to match ActiveRecord::SecureToken as used by the
/// Ruby protocol servers.
pub fn secure_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_length() {
        assert_eq!(secure_token(24).len(), 24);
        assert_eq!(secure_token(8).len(), 8);
    }

    #[test]
    fn stays_in_alphabet() {
        let token = secure_token(256);
        assert!(token.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn tokens_differ() {
        assert_ne!(secure_token(24), secure_token(24));
    }
}
