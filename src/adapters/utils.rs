//! Shared utilities for adapter-layer validation.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
///
/// Used to validate WiFi SSIDs from build-time configuration and before
/// they reach the WiFi driver.
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}
