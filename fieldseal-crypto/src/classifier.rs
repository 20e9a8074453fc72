//! Key-free heuristic for telling field ciphertext from plaintext.
//!
//! This is not a verifier. Any value produced by [`encrypt_field`] is
//! classified as ciphertext, but long plaintext made only of base64
//! characters (no spaces or punctuation) is misclassified as ciphertext too.
//! Use it for integrity scanning and as a pre-filter, never in place of
//! actually decrypting.
//!
//! [`encrypt_field`]: crate::encrypt_field

/// Shortest string the classifier accepts: the base64 expansion of the
/// 28-byte nonce + tag minimum, rounded up.
pub const MIN_CIPHERTEXT_CHARS: usize = 40;

fn is_base64_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='
}

/// Guesses whether `value` is field ciphertext.
///
/// - absent → false
/// - `""` → true (empty values are stored unencrypted on purpose)
/// - fewer than 40 characters → false
/// - any character outside `[A-Za-z0-9+/=]` → false
pub fn looks_like_ciphertext(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return false;
    };
    if value.is_empty() {
        return true;
    }
    if value.len() < MIN_CIPHERTEXT_CHARS {
        return false;
    }
    value.bytes().all(is_base64_char)
}
