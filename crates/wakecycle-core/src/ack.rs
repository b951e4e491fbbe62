//! Matching broker packets to the request waiting on them
//!
//! Clients that hand back raw packets instead of events feed each packet to
//! the [`Outstanding`] request. The resulting [`Step`] says what to report and
//! whether the request is settled.

use log::debug;

use crate::events::{InboundMessage, MqttEvent, SessionErrorKind};

/// PUBACK: accepted and delivered
pub const REASON_SUCCESS: u8 = 0x00;
/// PUBACK: accepted, nobody subscribes to the topic
pub const REASON_NO_MATCHING_SUBSCRIBERS: u8 = 0x10;

/// MQTT v5 reason codes below 0x80 report success
pub const fn is_success(reason: u8) -> bool {
    reason < 0x80
}

/// A packet read from the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerPacket<'a> {
    Connack,
    Suback { packet_id: u16 },
    Unsuback { packet_id: u16 },
    Puback { packet_id: u16, reason: u8 },
    Message { topic: &'a str, data: &'a [u8] },
    Pingresp,
    Disconnect { reason: u8 },
    /// The client could not turn the packet into an event
    Refused { reason: u8 },
}

/// A request sent to the broker and not yet acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outstanding {
    Connect,
    Subscribe { packet_id: u16, msg_id: u16 },
    /// QoS 1 publish
    Publish { packet_id: u16, msg_id: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Report the event; the request is done
    Settled(MqttEvent),
    /// Report the event and keep waiting
    Report(MqttEvent),
    /// Keep waiting
    Pending,
    /// The connection cannot be used any more
    Lost(SessionErrorKind),
}

impl Outstanding {
    pub fn on_packet(&self, packet: BrokerPacket<'_>) -> Step {
        match (*self, packet) {
            (_, BrokerPacket::Message { topic, data }) => {
                Step::Report(MqttEvent::Data(InboundMessage::new(topic, data)))
            }
            (_, BrokerPacket::Disconnect { reason }) => {
                debug!("broker disconnected, reason 0x{:02x}", reason);
                Step::Lost(SessionErrorKind::Transport)
            }

            (Self::Connect, BrokerPacket::Connack) => Step::Settled(MqttEvent::Connected),
            (Self::Connect, BrokerPacket::Refused { .. }) => Step::Lost(SessionErrorKind::Rejected),

            (Self::Subscribe { packet_id, msg_id }, BrokerPacket::Suback { packet_id: acked })
                if acked == packet_id =>
            {
                Step::Settled(MqttEvent::Subscribed { msg_id })
            }
            // Granted a different QoS than asked for
            (Self::Subscribe { msg_id, .. }, BrokerPacket::Refused { reason })
                if is_success(reason) =>
            {
                debug!("subscription granted with reason 0x{:02x}", reason);
                Step::Settled(MqttEvent::Subscribed { msg_id })
            }

            (Self::Publish { packet_id, msg_id }, BrokerPacket::Puback { packet_id: acked, reason })
                if acked == packet_id =>
            {
                if is_success(reason) {
                    Step::Settled(MqttEvent::Published { msg_id })
                } else {
                    Step::Settled(MqttEvent::Error(SessionErrorKind::Rejected))
                }
            }

            (Self::Subscribe { .. } | Self::Publish { .. }, BrokerPacket::Refused { reason }) => {
                debug!("request refused, reason 0x{:02x}", reason);
                Step::Settled(MqttEvent::Error(SessionErrorKind::Rejected))
            }

            (_, other) => {
                debug!("ignoring {:?} while waiting on {:?}", other, self);
                Step::Pending
            }
        }
    }
}
