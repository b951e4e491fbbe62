//! Diagnostic payload rendering
//!
//! The published message is a JSON object with one array of the previous
//! cycle's ledger in milliseconds:
//!
//! ```text
//! {"timers": [ 1000.00,  2500.00,  3000.00,  3100.00,  3200.00,     0.00,     0.00]}
//! ```
//!
//! Each value has two decimals and a minimum field width of 8. The object is
//! followed by a single trailing space.

use core::fmt::{self, Write};

use thiserror_no_std::Error;

use crate::ledger::Ledger;

/// Rendered payloads never exceed this many bytes.
///
/// Seven values of at most 20 characters each (`i64::MIN` in milliseconds)
/// plus separators fit in well under this bound.
pub const PAYLOAD_CAPACITY: usize = 256;

pub type Payload = heapless::String<PAYLOAD_CAPACITY>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload exceeds {0} bytes")]
    Overflow(usize),
}

/// Render `ledger` as the `{"timers": [...]} ` payload
pub fn render_timers(ledger: &Ledger) -> Result<Payload, PayloadError> {
    let mut out = Payload::new();
    write_timers(&mut out, ledger).map_err(|_| PayloadError::Overflow(PAYLOAD_CAPACITY))?;
    Ok(out)
}

fn write_timers<W: Write>(out: &mut W, ledger: &Ledger) -> fmt::Result {
    out.write_str("{\"timers\": [")?;
    for (i, &micros) in ledger.slots().iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{:8.2}", micros_to_millis(micros))?;
    }
    out.write_str("]} ")
}

fn micros_to_millis(micros: i64) -> f64 {
    micros as f64 / 1000.0
}
