use crate::{
    err::{DecodeError, EncodeError},
    io::{encode_packet_length, encode_utf8},
    qos::QosLevel,
    topic::{TopicFilter, TopicFilterResult, TopicSubscription},
    v3::PacketType,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/*
 * The SUBSCRIBE Packet is sent from the Client to the Server to create one or more
 * Subscriptions. Each Subscription registers a Client's interest in one or more Topics.
 *
 * The Server sends PUBLISH Packets to the Client in order to forward Application Messages
 * that were published to Topics that match these Subscriptions.
 */
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct SubscribePacket {
    packet_id: u16,
    payload: Vec<TopicFilterResult>,
}

impl SubscribePacket {
    pub fn new(packet_id: u16, payload: Vec<TopicSubscription>) -> Self {
        return Self {
            packet_id,
            payload: payload.into_iter().map(TopicFilterResult::Ok).collect(),
        };
    }

    pub fn decode(bytes: &mut Bytes) -> Result<Self, DecodeError> {
        let packet_id = bytes.get_u16();

        let mut payload: Vec<TopicFilterResult> = Vec::new();

        // The requested QoS field follows each UTF-8 encoded topic filter; the pairs are packed
        // contiguously, with no framing between them.
        loop {
            match TopicFilter::decode(bytes) {
                Ok(filter) => {
                    let qos: QosLevel = bytes.get_u8().try_into()?;
                    payload.push(TopicFilterResult::Ok(TopicSubscription::new(filter, qos)));
                    if bytes.remaining() == 0 {
                        break;
                    }
                }
                Err(_) => payload.push(TopicFilterResult::Err),
            }

            if bytes.remaining() == 0 {
                break;
            }
        }

        if payload.is_empty() {
            return Err(crate::err::DecodeError::new(
                crate::err::DecodeErrorKind::MalformedLength,
                String::from("SUBSCRIBE packets must request at least one topic filter."),
            ));
        }

        return Ok(Self { packet_id, payload });
    }

    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        // 2 for packet_id
        let mut len = 2;

        for topic in &self.payload {
            match topic {
                TopicFilterResult::Ok(sub) => {
                    // 2 for str length prefix, 1 for QoS byte
                    len += 2 + 1;
                    len += sub.filter().len();
                }
                TopicFilterResult::Err => {
                    panic!("Cannot encode an invalid TopicFilter.");
                }
            }
        }

        let mut bytes = BytesMut::with_capacity(len);

        bytes.put_u8(PacketType::SUBSCRIBE as u8 | 0x02);

        encode_packet_length(&mut bytes, len)?;

        bytes.put_u16(self.packet_id);

        for topic in &self.payload {
            match topic {
                TopicFilterResult::Ok(sub) => {
                    encode_utf8(&mut bytes, &sub.filter().clone().to_string())?;
                    bytes.put_u8(sub.qos() as u8);
                }
                TopicFilterResult::Err => panic!(),
            }
        }

        return Ok(bytes.into());
    }

    pub fn id(&self) -> u16 {
        return self.packet_id;
    }

    pub fn topic_filters(&self) -> &Vec<TopicFilterResult> {
        return &self.payload;
    }
}

#[cfg(test)]
mod packet {
    use super::SubscribePacket;
    use crate::{
        qos::QosLevel,
        topic::{TopicFilter, TopicSubscription},
        v3::{FixedHeader, MqttPacket},
    };

    #[test]
    fn serialize_deserialize() {
        let packet = SubscribePacket::new(
            1234,
            vec![TopicSubscription::new(
                TopicFilter::from_str("test").unwrap(),
                QosLevel::AtLeastOnce,
            )],
        );
        let mut buf = packet.encode().unwrap();

        let f_header = FixedHeader::decode(&mut buf).unwrap();
        let packet_de = MqttPacket::decode(f_header, &mut buf).expect("Could not decode packet");

        assert_eq!(packet_de, MqttPacket::Subscribe(packet));
    }

    #[test]
    fn fixture_bytes() {
        // Subscribe{packet_id=0xABCD, topics=[("/root/*", QoS2)]}
        let packet = SubscribePacket::new(
            0xABCD,
            vec![TopicSubscription::new(
                TopicFilter::from_str("/root/*").unwrap(),
                QosLevel::ExactlyOnce,
            )],
        );
        let bytes = packet.encode().unwrap();
        let mut expected = vec![0x82, 0x0C, 0xAB, 0xCD, 0x00, 0x07];
        expected.extend_from_slice(b"/root/*");
        expected.push(0x02);
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn fixed_header_flags_are_0b0010() {
        let packet = SubscribePacket::new(
            1,
            vec![TopicSubscription::new(
                TopicFilter::from_str("a").unwrap(),
                QosLevel::AtMostOnce,
            )],
        );
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes[0] & 0x0F, 0b0010);
    }
}
