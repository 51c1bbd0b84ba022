//! Package code generation.

use chrono::{DateTime, Utc};
use rand::Rng;

const SUFFIX_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 5;

/// Prefix for packages minted with the admin promo code.
pub const ADMIN_PREFIX: &str = "ADMIN";

/// Prefix for single free lessons minted with a public promo code.
pub const FREE_PREFIX: &str = "FREE";

/// Generate a package code of the form `PREFIX-<unix millis>-<suffix>`.
///
/// The random base36 suffix keeps codes minted in the same millisecond apart.
pub fn generate_package_code(prefix: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();

    format!("{}-{}-{}", prefix, now.timestamp_millis(), suffix).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_code_shape() {
        let now = Utc::now();
        let code = generate_package_code("free", now);
        let parts: Vec<&str> = code.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "FREE");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_same_millisecond_codes_differ() {
        let now = Utc::now();
        let codes: HashSet<String> = (0..50)
            .map(|_| generate_package_code(ADMIN_PREFIX, now))
            .collect();

        assert_eq!(codes.len(), 50);
    }
}
