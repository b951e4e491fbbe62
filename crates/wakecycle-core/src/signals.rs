//! Wait signals shared between the sequencer and the event handlers

use core::net::Ipv4Addr;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// The two conditions a cycle waits on, plus the station retry counter
///
/// Setting a signal that is already set keeps it set: however many times an
/// event handler fires, the matching wait is released exactly once.
pub struct CycleSignals {
    joined: Signal<CriticalSectionRawMutex, Ipv4Addr>,
    published: Signal<CriticalSectionRawMutex, u16>,
    // Reset on every join, never incremented: nothing retries the station yet
    retries: AtomicU32,
}

impl CycleSignals {
    pub const fn new() -> Self {
        Self {
            joined: Signal::new(),
            published: Signal::new(),
            retries: AtomicU32::new(0),
        }
    }

    pub fn set_joined(&self, addr: Ipv4Addr) {
        self.joined.signal(addr);
    }

    pub fn is_joined(&self) -> bool {
        self.joined.signaled()
    }

    /// Wait for an address, consuming the signal
    pub async fn wait_joined(&self) -> Ipv4Addr {
        self.joined.wait().await
    }

    pub fn set_published(&self, msg_id: u16) {
        self.published.signal(msg_id);
    }

    pub fn is_published(&self) -> bool {
        self.published.signaled()
    }

    /// Wait for the publish acknowledgment, consuming the signal
    pub async fn wait_published(&self) -> u16 {
        self.published.wait().await
    }

    pub fn retry_count(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn reset_retries(&self) {
        self.retries.store(0, Ordering::Relaxed);
    }

    /// Clear both signals for a fresh cycle
    pub fn reset(&self) {
        self.joined.reset();
        self.published.reset();
    }
}

impl Default for CycleSignals {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn test_repeated_set_releases_one_wait() {
        let signals = CycleSignals::new();
        signals.set_published(7);
        signals.set_published(7);

        assert!(signals.is_published());
        assert_eq!(block_on(signals.wait_published()), 7);
        assert!(!signals.is_published());
    }

    #[test]
    fn test_latest_value_wins() {
        let signals = CycleSignals::new();
        signals.set_joined(Ipv4Addr::new(192, 168, 1, 20));
        signals.set_joined(Ipv4Addr::new(192, 168, 1, 21));

        assert_eq!(block_on(signals.wait_joined()), Ipv4Addr::new(192, 168, 1, 21));
    }

    #[test]
    fn test_signals_are_independent() {
        let signals = CycleSignals::new();
        signals.set_joined(Ipv4Addr::LOCALHOST);

        assert!(signals.is_joined());
        assert!(!signals.is_published());
    }

    #[test]
    fn test_reset_clears_pending_signals() {
        let signals = CycleSignals::new();
        signals.set_joined(Ipv4Addr::LOCALHOST);
        signals.set_published(1);

        signals.reset();

        assert!(!signals.is_joined());
        assert!(!signals.is_published());
    }
}
