use bytes::Bytes;

use mqtt_core::qos::{QosLevel, SubAckQoS};
use mqtt_core::topic::TopicName;

/// Overrideable hooks for the events a connected client produces.
///
/// Every method has a no-op default, so applications only implement the hooks they care about.
pub trait ClientHandler: Send + Sync + 'static {
    fn on_connack(&self, _session_present: bool) {}
    fn on_publish(&self, _topic: &TopicName, _payload: &Bytes, _qos: QosLevel, _retain: bool) {}
    fn on_suback(&self, _packet_id: u16, _return_codes: &[SubAckQoS]) {}
    fn on_unsuback(&self, _packet_id: u16) {}
    fn on_pingresp(&self) {}
    fn on_disconnect(&self) {}
}

/// The default handler installed when an application does not supply its own.
pub struct NoopHandler;

impl ClientHandler for NoopHandler {}
