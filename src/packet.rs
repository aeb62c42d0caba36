//! MQTT 3.1.1 frame codec.
//!
//! Encodes the five packet types the client emits (CONNECT, SUBSCRIBE,
//! PINGREQ, DISCONNECT, PUBLISH) and parses the inbound byte stream
//! into PUBLISH frames, skipping everything else. The client speaks
//! QoS 0 only, so no packet identifiers are tracked on the publish
//! path.

use crate::error::ProtocolError;
use crate::varint;

/// Fixed-header bytes for the frames this codec deals with.
const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 0x90;
const PINGREQ: u8 = 0xD0;
const DISCONNECT: u8 = 0xE0;

/// Packet identifier used for the single wildcard subscription.
const SUBSCRIBE_PACKET_ID: u16 = 1;

/// The one topic filter the client subscribes to.
pub const SUBSCRIBE_FILTER: &[u8] = b"+/#";

/// Largest legal topic length on the wire.
pub const MAX_TOPIC_LEN: usize = u16::MAX as usize;

/// A frame parsed out of the inbound stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A PUBLISH frame. Topic and payload borrow from the parse buffer
    /// and are only valid until the buffer is compacted.
    Publish { topic: &'a [u8], payload: &'a [u8] },
    /// A complete frame of some other type; ignored.
    Skipped,
}

/// Parse the next frame from `buf`.
///
/// Returns `Ok(Some((frame, consumed)))` when a complete frame is
/// available, `Ok(None)` when the buffer holds only a frame prefix
/// (nothing is consumed; the caller reads more and retries), or `Err`
/// on a malformed frame. A frame is never partially consumed.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Frame<'_>, usize)>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }
    let packet_type = buf[0];

    let (remaining, varint_len) = match varint::decode(&buf[1..])? {
        Some(decoded) => decoded,
        None => return Ok(None),
    };
    let header_len = 1 + varint_len;
    if buf.len() - header_len < remaining {
        return Ok(None);
    }
    let consumed = header_len + remaining;

    // Low nibble carries dup/QoS/retain flags; only the type matters.
    if packet_type & 0xF0 != PUBLISH {
        return Ok(Some((Frame::Skipped, consumed)));
    }

    let body = &buf[header_len..consumed];
    if body.len() < 2 {
        return Err(ProtocolError::MalformedPacket(
            "publish shorter than topic length field".to_string(),
        ));
    }
    let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    if 2 + topic_len > body.len() {
        return Err(ProtocolError::MalformedPacket(format!(
            "topic length {} exceeds remaining length {}",
            topic_len,
            body.len()
        )));
    }
    let topic = &body[2..2 + topic_len];
    let payload = &body[2 + topic_len..];
    Ok(Some((Frame::Publish { topic, payload }, consumed)))
}

/// Encode a CONNECT packet: protocol "MQTT" level 4, clean session,
/// empty client id.
pub fn encode_connect(keepalive: u16, buf: &mut Vec<u8>) {
    buf.push(CONNECT);
    buf.push(12); // Remaining length
    buf.extend_from_slice(&4u16.to_be_bytes());
    buf.extend_from_slice(b"MQTT");
    buf.push(4); // Protocol level
    buf.push(0x02); // Clean session
    buf.extend_from_slice(&keepalive.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // Empty client id
}

/// Encode a SUBSCRIBE packet for the `+/#` wildcard filter at QoS 0.
pub fn encode_subscribe(buf: &mut Vec<u8>) {
    buf.push(SUBSCRIBE);
    buf.push((2 + 2 + SUBSCRIBE_FILTER.len() + 1) as u8);
    buf.extend_from_slice(&SUBSCRIBE_PACKET_ID.to_be_bytes());
    buf.extend_from_slice(&(SUBSCRIBE_FILTER.len() as u16).to_be_bytes());
    buf.extend_from_slice(SUBSCRIBE_FILTER);
    buf.push(0); // Requested QoS
}

/// Encode a PINGREQ packet.
pub fn encode_pingreq(buf: &mut Vec<u8>) {
    buf.push(PINGREQ);
    buf.push(0);
}

/// Encode a DISCONNECT packet.
pub fn encode_disconnect(buf: &mut Vec<u8>) {
    buf.push(DISCONNECT);
    buf.push(0);
}

/// Encode a QoS 0 PUBLISH packet.
///
/// Fails when the topic does not fit a two-byte length or when the
/// remaining length exceeds the four-byte varint maximum.
pub fn encode_publish(
    topic: &[u8],
    payload: &[u8],
    buf: &mut Vec<u8>,
) -> Result<(), ProtocolError> {
    if topic.len() > MAX_TOPIC_LEN {
        return Err(ProtocolError::MalformedPacket(format!(
            "topic length {} exceeds {}",
            topic.len(),
            MAX_TOPIC_LEN
        )));
    }
    let remaining = 2 + topic.len() + payload.len();
    let mark = buf.len();
    buf.push(PUBLISH);
    if let Err(e) = varint::encode(remaining, buf) {
        buf.truncate(mark);
        return Err(e);
    }
    buf.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    buf.extend_from_slice(topic);
    buf.extend_from_slice(payload);
    Ok(())
}

/// Validate the four-byte CONNACK received during the handshake.
pub fn validate_connack(ack: &[u8; 4]) -> Result<(), ProtocolError> {
    if ack[0] != CONNACK || ack[1] != 2 {
        return Err(ProtocolError::ConnectRejected(format!(
            "unexpected connack header {:#04x} {:#04x}",
            ack[0], ack[1]
        )));
    }
    if ack[2] != 0 || ack[3] != 0 {
        return Err(ProtocolError::ConnectRejected(format!(
            "return code {}",
            ack[3]
        )));
    }
    Ok(())
}

/// Validate the five-byte SUBACK received during the handshake.
pub fn validate_suback(ack: &[u8; 5]) -> Result<(), ProtocolError> {
    if ack[0] != SUBACK || ack[1] != 3 {
        return Err(ProtocolError::SubscribeRejected(format!(
            "unexpected suback header {:#04x} {:#04x}",
            ack[0], ack[1]
        )));
    }
    if u16::from_be_bytes([ack[2], ack[3]]) != SUBSCRIBE_PACKET_ID {
        return Err(ProtocolError::SubscribeRejected(
            "packet identifier mismatch".to_string(),
        ));
    }
    if ack[4] != 0 {
        return Err(ProtocolError::SubscribeRejected(format!(
            "return code {:#04x}",
            ack[4]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_connect_bytes() {
        let mut buf = Vec::new();
        encode_connect(60, &mut buf);
        assert_eq!(
            buf,
            [
                0x10, 12, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 60, 0x00,
                0x00
            ]
        );
    }

    #[test]
    fn test_encode_subscribe_bytes() {
        let mut buf = Vec::new();
        encode_subscribe(&mut buf);
        assert_eq!(
            buf,
            [0x82, 8, 0x00, 0x01, 0x00, 0x03, b'+', b'/', b'#', 0x00]
        );
    }

    #[test]
    fn test_encode_control_bytes() {
        let mut buf = Vec::new();
        encode_pingreq(&mut buf);
        encode_disconnect(&mut buf);
        assert_eq!(buf, [0xD0, 0x00, 0xE0, 0x00]);
    }

    #[test]
    fn test_encode_publish_bytes() {
        let mut buf = Vec::new();
        encode_publish(b"room/light", b"ON", &mut buf).unwrap();
        let mut expected = vec![0x30, 14, 0x00, 10];
        expected.extend_from_slice(b"room/light");
        expected.extend_from_slice(b"ON");
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_encode_publish_topic_bounds() {
        let mut buf = Vec::new();
        let topic = vec![b'a'; MAX_TOPIC_LEN];
        assert!(encode_publish(&topic, b"", &mut buf).is_ok());

        buf.clear();
        let topic = vec![b'a'; MAX_TOPIC_LEN + 1];
        assert!(encode_publish(&topic, b"", &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_publish_empty_topic() {
        let mut buf = Vec::new();
        encode_publish(b"", b"x", &mut buf).unwrap();
        assert_eq!(buf, [0x30, 3, 0x00, 0x00, b'x']);
    }

    #[test]
    fn test_parse_publish() {
        let mut buf = Vec::new();
        encode_publish(b"sensors/temp", b"21.5", &mut buf).unwrap();
        let (frame, consumed) = parse_frame(&buf).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(
            frame,
            Frame::Publish {
                topic: b"sensors/temp",
                payload: b"21.5"
            }
        );
    }

    #[test]
    fn test_parse_publish_flags_ignored() {
        // Retain + QoS bits in the low nibble must not affect parsing.
        let buf = [0x31, 4, 0x00, 0x01, b't', b'v'];
        let (frame, consumed) = parse_frame(&buf).unwrap().unwrap();
        assert_eq!(consumed, 6);
        assert_eq!(
            frame,
            Frame::Publish {
                topic: b"t",
                payload: b"v"
            }
        );
    }

    #[test]
    fn test_parse_skips_other_packets() {
        // PINGRESP followed by a publish
        let mut buf = vec![0xD0, 0x00];
        encode_publish(b"a", b"1", &mut buf).unwrap();

        let (frame, consumed) = parse_frame(&buf).unwrap().unwrap();
        assert_eq!(frame, Frame::Skipped);
        assert_eq!(consumed, 2);

        let (frame, _) = parse_frame(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Publish {
                topic: b"a",
                payload: b"1"
            }
        );
    }

    #[test]
    fn test_parse_fragmented_one_byte_at_a_time() {
        let mut frame_bytes = Vec::new();
        encode_publish(b"a/b/c", b"payload", &mut frame_bytes).unwrap();

        // Every strict prefix must ask for more data without consuming.
        for len in 0..frame_bytes.len() {
            assert!(parse_frame(&frame_bytes[..len]).unwrap().is_none());
        }
        let (frame, consumed) = parse_frame(&frame_bytes).unwrap().unwrap();
        assert_eq!(consumed, frame_bytes.len());
        assert_eq!(
            frame,
            Frame::Publish {
                topic: b"a/b/c",
                payload: b"payload"
            }
        );
    }

    #[test]
    fn test_parse_inconsistent_topic_length() {
        // Remaining length 3, topic length claims 10
        let buf = [0x30, 3, 0x00, 10, b'x'];
        assert!(parse_frame(&buf).is_err());
    }

    #[test]
    fn test_parse_publish_too_short_for_topic_field() {
        let buf = [0x30, 1, 0x00];
        assert!(parse_frame(&buf).is_err());
    }

    #[test]
    fn test_parse_bad_remaining_length() {
        let buf = [0x30, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(parse_frame(&buf).is_err());
    }

    #[test]
    fn test_validate_connack() {
        assert!(validate_connack(&[0x20, 0x02, 0x00, 0x00]).is_ok());
        assert!(validate_connack(&[0x20, 0x02, 0x00, 0x05]).is_err());
        assert!(validate_connack(&[0x30, 0x02, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_validate_suback() {
        assert!(validate_suback(&[0x90, 0x03, 0x00, 0x01, 0x00]).is_ok());
        assert!(validate_suback(&[0x90, 0x03, 0x00, 0x02, 0x00]).is_err());
        assert!(validate_suback(&[0x90, 0x03, 0x00, 0x01, 0x80]).is_err());
    }
}
