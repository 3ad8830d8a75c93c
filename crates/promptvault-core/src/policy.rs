//! Encryption policy
//!
//! Decides from a record's tags whether its body must be encrypted before it
//! leaves the device. Only an exact, case-insensitive `public` tag opts out.

/// Tag that marks a record as publicly readable.
pub const PUBLIC_TAG: &str = "public";

/// Returns `false` iff at least one tag lowercases to exactly `public`.
///
/// No trimming is done: `"Public "` is not public.
pub fn should_encrypt<S: AsRef<str>>(tags: &[S]) -> bool {
    !tags
        .iter()
        .any(|tag| tag.as_ref().to_lowercase() == PUBLIC_TAG)
}
