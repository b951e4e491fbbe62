//! Seams between the sequencer and the hardware (or its stand-ins)

use core::fmt::Debug;

use embassy_time::Duration;

use crate::config::{BrokerUri, WifiConfig};
use crate::events::{MqttEvent, NetworkEvent, QoS};
use crate::ledger::RetainedImage;

/// Monotonic microseconds since boot
pub trait Clock {
    fn now_micros(&self) -> i64;
}

/// Memory that survives deep sleep but not power loss
pub trait RetainedRegion {
    fn load(&mut self) -> RetainedImage;
    fn store(&mut self, image: &RetainedImage);
}

/// Station-mode network interface
///
/// `next_event` waits until the interface has something to report. It is
/// only polled while the sequencer waits for an address.
#[allow(async_fn_in_trait)]
pub trait Network {
    type Error: Debug;

    /// Configure station mode with `wifi` and bring the interface up
    async fn start(&mut self, wifi: &WifiConfig<'_>) -> Result<(), Self::Error>;

    /// Ask the interface to associate with the configured access point
    async fn connect(&mut self) -> Result<(), Self::Error>;

    async fn next_event(&mut self) -> NetworkEvent;

    async fn stop(&mut self) -> Result<(), Self::Error>;

    /// Release the driver
    async fn deinit(self) -> Result<(), Self::Error>
    where
        Self: Sized;
}

/// MQTT client session
///
/// `open` only starts the session; the connection outcome arrives as an
/// [`MqttEvent`]. Subscribe and publish return the message id the matching
/// acknowledgment event will carry.
#[allow(async_fn_in_trait)]
pub trait Session {
    type Error: Debug;

    async fn open(&mut self, broker: &BrokerUri<'_>, client_id: &str) -> Result<(), Self::Error>;

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<u16, Self::Error>;

    async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS)
    -> Result<u16, Self::Error>;

    async fn next_event(&mut self) -> MqttEvent;

    /// Disconnect and release the client
    async fn close(self) -> Result<(), Self::Error>
    where
        Self: Sized;
}

/// Deep sleep with a timer wake source
pub trait Sleeper {
    type Error: Debug;

    fn arm_timer_wakeup(&mut self, after: Duration) -> Result<(), Self::Error>;

    /// Suspend the processor. Execution resumes at the entry point on wake.
    fn enter_deep_sleep(&mut self) -> !;
}
