//! Events delivered by the network and messaging stacks

use core::fmt;
use core::net::Ipv4Addr;

use crate::error::FromTruncated;

/// Station interface lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The station interface is up and may be asked to connect
    StationStarted,
    /// Associated with the access point
    Connected,
    /// An address was assigned
    GotIp(Ipv4Addr),
    Disconnected,
}

/// MQTT delivery guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// QoS 0 — At most once
    AtMostOnce,
    /// QoS 1 — At least once
    AtLeastOnce,
}

impl QoS {
    pub const fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
        }
    }
}

pub const TOPIC_CAPACITY: usize = 128;
pub const INBOUND_CAPACITY: usize = 256;

/// A message received on a subscribed topic, truncated to fixed capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<TOPIC_CAPACITY>,
    pub data: heapless::Vec<u8, INBOUND_CAPACITY>,
    /// Length of the payload as received, before truncation
    pub len: usize,
}

impl InboundMessage {
    pub fn new(topic: &str, data: &[u8]) -> Self {
        let kept = &data[..data.len().min(INBOUND_CAPACITY)];
        let mut buf = heapless::Vec::new();
        // Cannot fail: `kept` fits the capacity
        let _ = buf.extend_from_slice(kept);
        Self {
            topic: heapless::String::from_truncated(topic),
            data: buf,
            len: data.len(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.len > self.data.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// DNS lookup or TCP connect failed
    Connect,
    /// The connection dropped mid-exchange
    Transport,
    /// The broker sent something unexpected
    Protocol,
    /// The broker refused the request (non-success reason code)
    Rejected,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect failed",
            Self::Transport => "transport error",
            Self::Protocol => "protocol error",
            Self::Rejected => "rejected by broker",
        })
    }
}

/// Messaging session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    Connected,
    Disconnected,
    Subscribed { msg_id: u16 },
    Unsubscribed { msg_id: u16 },
    Published { msg_id: u16 },
    Data(InboundMessage),
    Error(SessionErrorKind),
    /// Anything else the client reports, by raw id
    Other(u8),
}
