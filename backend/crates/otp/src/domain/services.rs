//! Domain Services
//!
//! Code generation and the digest that is persisted instead of the code.

use platform::crypto::{random_digits, sha256_hex};

/// Generate a fixed-length numeric code
pub fn generate_otp(len: usize) -> String {
    random_digits(len)
}

/// Digest stored for a code
///
/// Bound to the identity so equal codes for different identities never
/// share a digest.
pub fn hash_code(identity: &str, code: &str) -> String {
    sha256_hex(format!("{identity}:{code}").as_bytes())
}

/// Codes are exactly `len` ASCII digits
pub fn is_well_formed(code: &str, len: usize) -> bool {
    code.len() == len && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_shape() {
        for len in [4, 6, 8] {
            let code = generate_otp(len);
            assert!(is_well_formed(&code, len), "bad code {code}");
        }
    }

    #[test]
    fn test_codes_vary() {
        let codes: std::collections::HashSet<_> = (0..20).map(|_| generate_otp(6)).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn test_hash_is_identity_bound() {
        assert_ne!(hash_code("+15550100000", "123456"), hash_code("+15550100001", "123456"));
        assert_eq!(hash_code("a@example.com", "123456").len(), 64);
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("012345", 6));
        assert!(!is_well_formed("12345", 6));
        assert!(!is_well_formed("12345a", 6));
        assert!(!is_well_formed("١٢٣٤٥٦", 6));
    }
}
