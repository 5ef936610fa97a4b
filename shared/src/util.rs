//! Shared utility functions

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a ledger reference of the form `<PREFIX>_<millis>_<random>`.
///
/// The random suffix is best-effort entropy only; actual uniqueness is
/// enforced by the database unique constraint on the reference column, and
/// a collision surfaces as a conflict rather than an overwrite.
pub fn generate_reference(prefix: &str) -> String {
    use rand::Rng;
    let suffix: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}_{}_{}", prefix, now_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        // 2024-01-01 as a floor, 2100-01-01 as a ceiling
        let now = now_millis();
        assert!(now > 1_704_067_200_000);
        assert!(now < 4_102_444_800_000);
    }

    #[test]
    fn test_reference_format() {
        let r = generate_reference("TXN");
        let parts: Vec<&str> = r.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_references_differ() {
        let a = generate_reference("ORD");
        let b = generate_reference("ORD");
        assert_ne!(a, b);
    }
}
