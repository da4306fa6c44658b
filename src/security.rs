use subtle::ConstantTimeEq;

/// Byte comparison whose timing does not depend on where the inputs differ.
/// A length mismatch is rejected up front.
fn secrets_equal(expected: &str, provided: &str) -> bool {
    expected.len() == provided.len() && bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
}

/// Check the secret carried in the hook path against the configured one.
///
/// With no configured secret every delivery is accepted, with or without a
/// path segment.
pub fn hook_secret_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(expected), Some(provided)) => secrets_equal(expected, provided),
    }
}
