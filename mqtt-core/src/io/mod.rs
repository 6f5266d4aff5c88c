use tokio::time::Duration;

use futures::FutureExt;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::sleep;

mod util;

pub(crate) use util::*;

use bytes::{Buf, BytesMut};

use crate::{
    err,
    err::DecodeError,
    v3::{FixedHeader, MqttPacket},
};

pub async fn read_packet_with_timeout<S, E>(
    stream: &mut S,
    buf: &mut BytesMut,
    timeout_us: u64,
) -> Result<Option<MqttPacket>, E>
where
    S: AsyncRead + Unpin,
    E: From<err::DecodeError>,
{
    futures::select! {
        _ = sleep(Duration::from_micros(timeout_us)).fuse() => {
            return Ok(None);
        }
        packet = read_packet::<S, E>(stream, buf).fuse() => {
            return packet
        }
    }
}

/// Reads one complete MQTT frame (fixed header + remaining-length payload) off `stream`,
/// using `buf` to accumulate bytes across reads.
///
/// `buf` is caller-owned and must be reused across calls on the same connection: a single
/// `read` can return more than one frame's worth of bytes, or less than one, and `buf` is
/// what carries a partial frame forward to the next call. Returns `Ok(None)` on a clean EOF
/// with no partial frame buffered.
pub async fn read_packet<S, E>(stream: &mut S, buf: &mut BytesMut) -> Result<Option<MqttPacket>, E>
where
    S: AsyncRead + Unpin,
    E: From<err::DecodeError>,
{
    loop {
        if let Some(packet) = try_decode_frame(buf)? {
            return Ok(Some(packet));
        }

        let n = stream
            .read_buf(buf)
            .await
            .map_err(|e| DecodeError::new(err::DecodeErrorKind::StreamRead, e.to_string()))?;

        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(DecodeError::new(
                err::DecodeErrorKind::StreamRead,
                String::from("connection closed mid-frame"),
            )
            .into());
        }
    }
}

/// Tries to decode a single frame from the front of `buf` without blocking. Leaves `buf`
/// untouched if it doesn't yet hold a complete frame.
fn try_decode_frame<E>(buf: &mut BytesMut) -> Result<Option<MqttPacket>, E>
where
    E: From<err::DecodeError>,
{
    if buf.is_empty() {
        return Ok(None);
    }

    let mut probe = buf.clone().freeze();
    let available = probe.len();

    // A fixed header is at most 5 bytes (1 type/flags byte + up to 4 length bytes). If we
    // don't have that many yet, a decode failure likely means the length field is still
    // arriving rather than being genuinely malformed.
    let f_header = match FixedHeader::decode(&mut probe) {
        Ok(f_header) => f_header,
        Err(_) if available < 5 => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if probe.len() < f_header.rest_len() {
        return Ok(None);
    }

    let consumed = f_header.header_len() + f_header.rest_len();
    let mut frame = buf.split_to(consumed).freeze();
    frame.advance(f_header.header_len());

    let packet = MqttPacket::decode(f_header, &mut frame)?;
    return Ok(Some(packet));
}
