//! Hardware-independent core library for wakecycle
//!
//! This crate contains all platform-agnostic logic for the wakecycle boot
//! sequence: the retained timing ledger, payload rendering, configuration,
//! the persistent-store layout check, the event types delivered by the
//! network and messaging stacks, and the sequencer that drives one wake cycle.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod ack;
pub mod config;
pub mod cycle;
pub mod error;
pub mod events;
pub mod ledger;
pub mod payload;
pub mod platform;
pub mod signals;
pub mod store;

pub use ack::{BrokerPacket, Outstanding, Step};
pub use config::{BrokerUri, Config, ConfigError, WifiConfig};
pub use cycle::{BootCycle, CycleError};
pub use events::{InboundMessage, MqttEvent, NetworkEvent, QoS, SessionErrorKind};
pub use ledger::{LEDGER_SLOTS, Ledger, RETAINED_LEN, RetainedImage, Slot};
pub use platform::{Clock, Network, RetainedRegion, Session, Sleeper};
pub use signals::CycleSignals;
pub use store::{FlashStore, PersistentStore, StoreError, StoreInit};
