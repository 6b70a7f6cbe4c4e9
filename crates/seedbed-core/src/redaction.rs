/// Mask a credential for logs and debug output, keeping a short prefix.
pub fn redact_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(visible_prefix(secret)).collect();
    format!("{visible}***")
}

fn visible_prefix(secret: &str) -> usize {
    match secret.chars().count() {
        0..=7 => 0,
        8..=15 => 2,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secrets_are_fully_masked() {
        assert_eq!(redact_secret("abc"), "***");
        assert_eq!(redact_secret(""), "");
    }

    #[test]
    fn long_secrets_keep_a_prefix() {
        let redacted = redact_secret("0123456789abcdef0123");
        assert_eq!(redacted, "0123***");
        assert!(!redacted.contains("abcdef"));
    }
}
