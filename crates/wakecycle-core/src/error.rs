//! Shared error text helpers
//!
//! Platform adapters report their own error types. The core only needs them for
//! logging and fatal diagnostics, so they are captured as bounded `Debug` text.

use core::fmt::{Debug, Write};

/// Bounded, owned description of a platform error.
pub type ErrorText = heapless::String<64>;

/// Capture the `Debug` rendering of `err`, truncated to the text capacity.
pub fn error_text<E: Debug + ?Sized>(err: &E) -> ErrorText {
    let mut text = ErrorText::new();
    // A full buffer stops the write early, which is the truncation we want.
    let _ = write!(text, "{:?}", err);
    text
}

/// Build a bounded string from a `&str`, dropping whatever does not fit.
pub trait FromTruncated<T> {
    fn from_truncated(value: T) -> Self;
}

impl<'a, const N: usize> FromTruncated<&'a str> for heapless::String<N> {
    fn from_truncated(value: &'a str) -> Self {
        let mut out = heapless::String::<N>::new();
        for ch in value.chars() {
            if out.push(ch).is_err() {
                break;
            }
        }
        out
    }
}
