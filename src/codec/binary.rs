// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use byteorder::{BigEndian, ByteOrder};
use smallvec::SmallVec;
use tokio_util::codec::{Decoder, Encoder};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    codec::rtu::calc_crc,
    frame::binary::*,
    slave::SlaveId,
};

use super::*;

const MAX_FRAME_LEN: usize = 256;

type DroppedBytes = SmallVec<[u8; MAX_FRAME_LEN]>;

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct FrameDecoder {
    dropped_bytes: DroppedBytes,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            dropped_bytes: DroppedBytes::new(),
        }
    }
}

/// Scans `buf` (everything after the leading `{`) for the unescaped `}` that
/// terminates the frame, unescaping `{{`/`}}` along the way. Returns the
/// unescaped body and the number of raw bytes consumed up to and including
/// the terminator, or `None` if the terminator has not arrived yet.
fn unescape_body(buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>> {
    let mut body = Vec::with_capacity(buf.len());
    let mut i = 0;
    loop {
        let Some(&b) = buf.get(i) else {
            return Ok(None);
        };
        match b {
            b'{' => {
                let Some(&next) = buf.get(i + 1) else {
                    return Ok(None);
                };
                if next != b'{' {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        "Unescaped '{' inside Binary frame body",
                    ));
                }
                body.push(b'{');
                i += 2;
            }
            b'}' => {
                if buf.get(i + 1) == Some(&b'}') {
                    body.push(b'}');
                    i += 2;
                } else {
                    return Ok(Some((body, i + 1)));
                }
            }
            b => {
                body.push(b);
                i += 1;
            }
        }
    }
}

impl FrameDecoder {
    /// Leaves `buf` untouched on `Err`, so the retry loop can drop exactly
    /// one byte and try again without losing anything beyond it.
    pub(crate) fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(SlaveId, Bytes)>> {
        let Some(start) = buf.iter().position(|&b| b == b'{') else {
            return Ok(None);
        };
        if start > 0 {
            let garbage = buf.split_to(start);
            log::debug!(
                "Dropped {} byte(s) before Binary frame start: {:X?}",
                garbage.len(),
                &garbage[..]
            );
        }

        let Some((body, raw_len)) = unescape_body(&buf[1..])? else {
            return Ok(None);
        };
        if body.len() < 3 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Binary frame too short for a slave id, PDU and CRC",
            ));
        }

        let (payload, crc_bytes) = body.split_at(body.len() - 2);
        let expected_crc = calc_crc(payload);
        let actual_crc = BigEndian::read_u16(crc_bytes);
        if expected_crc != actual_crc {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Invalid CRC: expected = 0x{expected_crc:0>4X}, actual = 0x{actual_crc:0>4X}"
                ),
            ));
        }

        buf.advance(1 + raw_len);

        if !self.dropped_bytes.is_empty() {
            log::warn!(
                "Successfully decoded frame after dropping {} byte(s): {:X?}",
                self.dropped_bytes.len(),
                self.dropped_bytes
            );
            self.dropped_bytes.clear();
        }
        let slave_id = payload[0];
        let pdu_data = Bytes::copy_from_slice(&payload[1..]);
        Ok(Some((slave_id, pdu_data)))
    }

    pub(crate) fn recover_on_error(&mut self, buf: &mut BytesMut) {
        debug_assert!(!buf.is_empty());
        let first = buf[0];
        log::debug!("Dropped first byte: {:X?}", first);
        if self.dropped_bytes.len() >= MAX_FRAME_LEN {
            log::error!(
                "Giving up to decode frame after dropping {} byte(s): {:X?}",
                self.dropped_bytes.len(),
                self.dropped_bytes
            );
            self.dropped_bytes.clear();
        }
        self.dropped_bytes.push(first);
        buf.advance(1);
    }
}

fn decode(
    pdu_type: &str,
    frame_decoder: &mut FrameDecoder,
    buf: &mut BytesMut,
) -> Result<Option<(SlaveId, Bytes)>> {
    const MAX_RETRIES: usize = 20;

    for _i in 0..MAX_RETRIES {
        let result = frame_decoder.decode(buf);
        if let Err(err) = result {
            log::warn!("Failed to decode {pdu_type} frame: {err}");
            frame_decoder.recover_on_error(buf);
            continue;
        }
        return result;
    }

    log::error!("Giving up to decode frame after {MAX_RETRIES} retries");
    Err(Error::new(ErrorKind::InvalidData, "Too many retries"))
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct RequestDecoder {
    frame_decoder: FrameDecoder,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ResponseDecoder {
    frame_decoder: FrameDecoder,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ClientCodec {
    pub(crate) decoder: ResponseDecoder,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ServerCodec {
    pub(crate) decoder: RequestDecoder,
}

impl Decoder for RequestDecoder {
    type Item = (SlaveId, Bytes);
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(SlaveId, Bytes)>> {
        decode("request", &mut self.frame_decoder, buf)
    }
}

impl Decoder for ResponseDecoder {
    type Item = (SlaveId, Bytes);
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(SlaveId, Bytes)>> {
        decode("response", &mut self.frame_decoder, buf)
    }
}

impl Decoder for ClientCodec {
    type Item = ResponseAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ResponseAdu>> {
        let Some((slave_id, pdu_data)) = self.decoder.decode(buf)? else {
            return Ok(None);
        };
        let hdr = Header { slave_id };
        ResponsePdu::try_from(pdu_data)
            .map(|pdu| Some(ResponseAdu { hdr, pdu }))
            .map_err(|err| {
                log::error!("Failed to decode response PDU: {err}");
                err
            })
    }
}

impl Decoder for ServerCodec {
    type Item = RequestAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RequestAdu>> {
        let Some((slave_id, pdu_data)) = self.decoder.decode(buf)? else {
            return Ok(None);
        };
        let hdr = Header { slave_id };
        RequestPdu::try_from(pdu_data)
            .map(|pdu| {
                Some(RequestAdu {
                    hdr,
                    pdu,
                    disconnect: false,
                })
            })
            .map_err(|err| {
                log::error!("Failed to decode request PDU: {err}");
                err
            })
    }
}

fn escape_push(byte: u8, buf: &mut BytesMut) {
    buf.put_u8(byte);
    if byte == b'{' || byte == b'}' {
        buf.put_u8(byte);
    }
}

fn encode_frame(slave_id: SlaveId, pdu_data: &[u8], buf: &mut BytesMut) {
    let mut payload = Vec::with_capacity(1 + pdu_data.len());
    payload.push(slave_id);
    payload.extend_from_slice(pdu_data);
    let crc = calc_crc(&payload);

    buf.reserve(1 + payload.len() * 2 + 4 + 1);
    buf.put_u8(b'{');
    for &b in &payload {
        escape_push(b, buf);
    }
    escape_push((crc >> 8) as u8, buf);
    escape_push((crc & 0xFF) as u8, buf);
    buf.put_u8(b'}');
}

impl Encoder<RequestAdu> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, adu: RequestAdu, buf: &mut BytesMut) -> Result<()> {
        if adu.disconnect {
            return Err(Error::new(
                ErrorKind::NotConnected,
                "Disconnecting - not an error",
            ));
        }
        let RequestAdu { hdr, pdu, .. } = adu;
        let pdu_data: Bytes = pdu.into();
        encode_frame(hdr.slave_id, &pdu_data, buf);
        Ok(())
    }
}

impl Encoder<ResponseAdu> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: ResponseAdu, buf: &mut BytesMut) -> Result<()> {
        let ResponseAdu { hdr, pdu } = adu;
        let pdu_data: Bytes = pdu.into();
        encode_frame(hdr.slave_id, &pdu_data, buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_request_matches_rtu_payload_wrapped_in_delimiters() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::new();
        let req = Request::ReadHoldingRegisters(0x082B, 2);
        let pdu = req.into();
        let hdr = Header { slave_id: 0x01 };
        let adu = RequestAdu {
            hdr,
            pdu,
            disconnect: false,
        };
        codec.encode(adu, &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[
                b'{', 0x01, 0x03, 0x08, 0x2B, 0x00, 0x02, 0xB6, 0x63, b'}'
            ][..]
        );
    }

    #[test]
    fn decode_response_matches_encoded_request_shape() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(
            &[
                b'{', 0x01, 0x03, 0x04, 0x89, 0x02, 0x42, 0xC7, 0x00, 0x9D, b'}',
            ][..],
        );
        let ResponseAdu { hdr, pdu } = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.slave_id, 0x01);
        if let Ok(Response::ReadHoldingRegisters(data)) = pdu.into() {
            assert_eq!(data, vec![0x8902, 0x42C7]);
        } else {
            panic!("unexpected response")
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn roundtrip_escapes_literal_delimiter_bytes_in_the_body() {
        // A coil address chosen so the PDU itself contains a raw 0x7B (`{`)
        // byte, exercising the byte-doubling escape on both ends.
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::new();
        let req = Request::ReadCoils(0x7B00, 1);
        let pdu = req.into();
        let hdr = Header { slave_id: 0x01 };
        let adu = RequestAdu {
            hdr,
            pdu,
            disconnect: false,
        };
        codec.encode(adu, &mut buf).unwrap();
        // one '{' opens the frame, the other two are the doubled escape for
        // the literal 0x7B byte in the address field
        assert_eq!(buf.iter().filter(|&&b| b == b'{').count(), 3);

        let mut server = ServerCodec::default();
        let decoded = server.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.hdr.slave_id, 0x01);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_resyncs_past_a_corrupt_leading_byte() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(
            &[
                0x99, // stray byte
                b'{', 0x01, 0x03, 0x04, 0x89, 0x02, 0x42, 0xC7, 0x00, 0x9D, b'}',
            ][..],
        );
        let ResponseAdu { hdr, .. } = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.slave_id, 0x01);
    }

    #[test]
    fn decode_rejects_bad_crc() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(
            &[
                b'{', 0x01, 0x03, 0x04, 0x89, 0x02, 0x42, 0xC7, 0xFF, 0xFF, b'}',
            ][..],
        );
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn decode_waits_for_more_bytes_on_incomplete_frame() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(&[b'{', 0x01, 0x03, 0x04][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);
    }
}
