//! Seed normalization (§4.5): the invitee and the admitting member must
//! derive the exact same keypair from a seed transcribed by hand, so
//! whitespace and punctuation differences between the two copies cannot
//! matter.

/// Normalize a raw seed string: lowercase, then keep only alphanumerics.
///
/// `"abc 123"` and `"ABC-123!"` both normalize to `"abc123"`. No
/// unicode-normalization dependency is pulled in for this — the seed
/// space is expected to be simple dictionary words and digits, not
/// arbitrary Unicode.
pub fn normalize(seed: &str) -> String {
    seed.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_whitespace_and_case() {
        assert_eq!(normalize("abc 123"), "abc123");
        assert_eq!(normalize("ABC 123"), "abc123");
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(normalize("abc-123!"), "abc123");
    }

    #[test]
    fn idempotent() {
        let once = normalize("Abc 123!");
        assert_eq!(normalize(&once), once);
    }
}
