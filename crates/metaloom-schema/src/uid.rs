//! Stable identifier (UID) syntax checks.
//!
//! Server-assigned identifiers are 11-character alphanumeric tokens that
//! start with a letter. The checks here are syntactic only; they say
//! nothing about whether an identifier resolves.

/// Length of a server-assigned stable identifier.
pub const UID_LENGTH: usize = 11;

/// Returns `true` if `value` has valid stable-identifier syntax.
#[must_use]
pub fn is_valid_uid(value: &str) -> bool {
    value.len() == UID_LENGTH
        && value.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && value.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_a_wellformed_uid() {
        assert!(is_valid_uid("a1234567890"));
        assert!(is_valid_uid("P3jJH5Tu5VC"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!is_valid_uid(""));
        assert!(!is_valid_uid("abc"));
        assert!(!is_valid_uid("a12345678901"));
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(!is_valid_uid("11234567890"));
    }

    #[test]
    fn rejects_non_alphanumerics() {
        assert!(!is_valid_uid("a123456789-"));
        assert!(!is_valid_uid("a12345 7890"));
    }

    proptest! {
        #[test]
        fn generated_uids_validate(
            head in "[A-Za-z]",
            tail in "[A-Za-z0-9]{10}",
        ) {
            let uid = format!("{head}{tail}");
            prop_assert!(is_valid_uid(&uid));
        }
    }
}
