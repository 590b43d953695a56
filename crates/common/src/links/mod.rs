//! Short codes for candidate submission links

use rand::Rng;

/// Characters allowed in a short code
pub const SHORT_CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated short codes
pub const SHORT_CODE_LENGTH: usize = 6;

/// Attempts before giving up on finding an unused code
pub const MAX_CODE_ATTEMPTS: usize = 10;

/// Generate a random short code
pub fn generate_short_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_CODE_LENGTH)
        .map(|_| SHORT_CODE_ALPHABET[rng.gen_range(0..SHORT_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Whether a path segment could be a short code
pub fn is_short_code(code: &str) -> bool {
    code.len() == SHORT_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_use_alphabet() {
        for _ in 0..200 {
            let code = generate_short_code();
            assert_eq!(code.len(), SHORT_CODE_LENGTH);
            assert!(code.bytes().all(|b| SHORT_CODE_ALPHABET.contains(&b)));
            assert!(is_short_code(&code));
        }
    }

    #[test]
    fn test_is_short_code() {
        assert!(is_short_code("Ab12Cd"));
        assert!(!is_short_code("Ab12C"));
        assert!(!is_short_code("Ab1-Cd"));
        assert!(!is_short_code("Ab12Cde"));
    }
}
