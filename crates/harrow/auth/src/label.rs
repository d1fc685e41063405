use sha2::{Digest, Sha256};

/// Maximum length of a kubernetes label value.
const MAX_LEN: usize = 63;

const fn is_separator(c: char) -> bool {
    matches!(c, '-' | '_' | '.')
}

/// Converts an arbitrary identity string into a legal kubernetes label
/// value: `[A-Za-z0-9_.-]` internally, alphanumeric at both ends, at
/// most 63 characters.
///
/// Every run of disallowed characters becomes a single `-`; runs of 2+
/// separators collapse into the first one; the result is truncated and
/// trimmed so both ends stay alphanumeric. The function is total and
/// idempotent: an all-disallowed or empty input falls back to a hash of
/// the original so that the value is reproducible and non-empty.
pub fn sanitize(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len().min(MAX_LEN));
    let mut pending_separator = None;

    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || is_separator(c) {
            c
        } else {
            '-'
        };
        if is_separator(c) {
            pending_separator.get_or_insert(c);
            continue;
        }
        if let Some(separator) = pending_separator.take() {
            // leading separators are dropped entirely
            if !label.is_empty() {
                label.push(separator);
            }
        }
        label.push(c);
    }

    label.truncate(MAX_LEN);
    while label.ends_with(|c: char| !c.is_ascii_alphanumeric()) {
        label.pop();
    }

    if label.is_empty() {
        fallback(raw)
    } else {
        label
    }
}

/// A deterministic stand-in for inputs that sanitize away completely.
fn fallback(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let head: String = digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect();
    format!("id-{head}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_legal(value: &str) {
        assert!(!value.is_empty());
        assert!(value.len() <= MAX_LEN);
        assert!(value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || is_separator(c)));
        assert!(value.starts_with(|c: char| c.is_ascii_alphanumeric()));
        assert!(value.ends_with(|c: char| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn legal_values_pass_through() {
        assert_eq!(sanitize("alice"), "alice");
        assert_eq!(sanitize("alice.smith-01"), "alice.smith-01");
    }

    #[test]
    fn email_derived_usernames_stay_readable() {
        // the resolver rewrites `@` to `_` before sanitizing; a raw
        // address still sanitizes cleanly
        assert_eq!(sanitize("alice_example.org"), "alice_example.org");
        assert_eq!(sanitize("alice@example.org"), "alice-example.org");
    }

    #[test]
    fn disallowed_runs_become_one_dash() {
        assert_eq!(sanitize("a!!!b"), "a-b");
        assert_eq!(sanitize("a b\tc"), "a-b-c");
    }

    #[test]
    fn separator_runs_collapse_to_the_first() {
        assert_eq!(sanitize("a-_b"), "a-b");
        assert_eq!(sanitize("a_-b"), "a_b");
        assert_eq!(sanitize("a..b"), "a.b");
    }

    #[test]
    fn ends_are_trimmed() {
        assert_eq!(sanitize("--alice--"), "alice");
        assert_eq!(sanitize(".!alice!."), "alice");
    }

    #[test]
    fn long_inputs_are_truncated_and_stay_legal() {
        let raw = format!("{}-{}", "a".repeat(62), "b".repeat(32));
        let value = sanitize(&raw);
        assert_legal(&value);
        assert_eq!(value, "a".repeat(62));
    }

    #[test]
    fn unicode_is_replaced() {
        assert_eq!(sanitize("안녕-alice"), "alice");
        assert_eq!(sanitize("héllo"), "h-llo");
    }

    #[test]
    fn empty_and_all_symbols_fall_back_deterministically() {
        for raw in ["", "!!!", "@@@@", "안녕"] {
            let value = sanitize(raw);
            assert_legal(&value);
            assert!(value.starts_with("id-"), "unexpected fallback: {value}");
            assert_eq!(value.len(), "id-".len() + 16);
            assert_eq!(value, sanitize(raw));
        }
        assert_ne!(sanitize("!!!"), sanitize("@@@@"));
    }

    #[test]
    fn totality_and_idempotence() {
        let samples = [
            "",
            "alice",
            "alice@example.org",
            "a!!!b",
            "--alice--",
            "a-_b",
            "....",
            "🦀🦀🦀",
            &"x".repeat(200),
            "CN=Admin,OU=Users",
        ];
        for raw in samples {
            let once = sanitize(raw);
            assert_legal(&once);
            assert_eq!(sanitize(&once), once, "not idempotent for {raw:?}");
        }
    }
}
