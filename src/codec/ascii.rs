// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use smallvec::SmallVec;
use tokio_util::codec::{Decoder, Encoder};

use crate::{frame::ascii::*, slave::SlaveId};

use super::*;

// Same rationale as the RTU framer: bound how much noise we'll remember
// before giving up and clearing the dropped-byte log.
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

fn hex_nibble(byte: u8) -> Result<u8> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        _ => Err(Error::new(
            ErrorKind::InvalidData,
            format!("Invalid hex digit in ASCII frame: 0x{byte:02X}"),
        )),
    }
}

fn hex_byte(byte: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [DIGITS[(byte >> 4) as usize], DIGITS[(byte & 0x0F) as usize]]
}

pub(crate) fn calc_lrc(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    0u8.wrapping_sub(sum)
}

impl FrameDecoder {
    /// Leaves `buf` untouched on `Err`, so the retry loop can drop exactly
    /// one byte and try again without losing anything beyond it.
    pub(crate) fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(SlaveId, Bytes)>> {
        let Some(start) = buf.iter().position(|&b| b == b':') else {
            return Ok(None);
        };
        if start > 0 {
            let garbage = buf.split_to(start);
            log::debug!(
                "Dropped {} byte(s) before ASCII frame start: {:X?}",
                garbage.len(),
                &garbage[..]
            );
        }

        let Some(crlf_at) = buf[1..].windows(2).position(|w| w == b"\r\n") else {
            return Ok(None);
        };
        let body_end = 1 + crlf_at;
        let body = &buf[1..body_end];

        if body.len() % 2 != 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "ASCII frame has an odd-length hex body",
            ));
        }
        let mut data = Vec::with_capacity(body.len() / 2);
        for chunk in body.chunks_exact(2) {
            data.push((hex_nibble(chunk[0])? << 4) | hex_nibble(chunk[1])?);
        }
        if data.len() < 2 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "ASCII frame too short for a slave id and LRC",
            ));
        }

        let lrc_byte = *data.last().expect("checked len >= 2");
        let payload = &data[..data.len() - 1];
        let expected_lrc = calc_lrc(payload);
        if expected_lrc != lrc_byte {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Invalid LRC: expected = 0x{expected_lrc:02X}, actual = 0x{lrc_byte:02X}"),
            ));
        }

        buf.advance(body_end + 2);

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

fn encode_frame(slave_id: SlaveId, pdu_data: &[u8], buf: &mut BytesMut) {
    let mut payload = Vec::with_capacity(1 + pdu_data.len());
    payload.push(slave_id);
    payload.extend_from_slice(pdu_data);
    let lrc = calc_lrc(&payload);

    buf.reserve(1 + payload.len() * 2 + 2 + 2);
    buf.put_u8(b':');
    for b in &payload {
        buf.put_slice(&hex_byte(*b));
    }
    buf.put_slice(&hex_byte(lrc));
    buf.put_slice(b"\r\n");
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
    fn calc_lrc_matches_two_s_complement_of_byte_sum() {
        // uid=0x11, FC 0x0F write multiple coils, addr=0x0013, qty=0x000A,
        // bitmap=CD 01.
        let msg = [0x11, 0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01];
        assert_eq!(calc_lrc(&msg), 0xF3);

        // Textbook example: FC 0x03, addr=0, qty=0x0A, uid=0x01.
        let msg = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        assert_eq!(calc_lrc(&msg), 0xF2);
    }

    #[test]
    fn encode_request_matches_worked_example() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::new();
        let req = Request::WriteMultipleCoils(0x0013, vec![true, false, true, true, false, false, true, true, false, true]);
        let pdu = req.into();
        let hdr = Header { slave_id: 0x11 };
        let adu = RequestAdu {
            hdr,
            pdu,
            disconnect: false,
        };
        codec.encode(adu, &mut buf).unwrap();
        assert_eq!(&buf[..], b":110F0013000A02CD01F3\r\n".as_slice());
    }

    #[test]
    fn decode_response_matches_worked_example() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(b":110F0013000AC3\r\n".as_slice());
        let ResponseAdu { hdr, pdu } = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.slave_id, 0x11);
        if let Ok(Response::WriteMultipleCoils(addr, qty)) = pdu.into() {
            assert_eq!((addr, qty), (0x0013, 0x000A));
        } else {
            panic!("unexpected response")
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_accepts_lowercase_hex() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(b":110f0013000ac3\r\n".as_slice());
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_some());
    }

    #[test]
    fn decode_rejects_odd_length_hex_body() {
        let mut codec = ServerCodec::default();
        // One hex digit missing after the colon.
        let mut buf = BytesMut::from(b":110F0013000A02CD011\r\n".as_slice());
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn decode_resyncs_past_a_corrupt_leading_byte() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"\x99"); // stray byte before the real frame
        buf.extend_from_slice(b":110F0013000AC3\r\n");
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_some());
    }

    #[test]
    fn decode_rejects_bad_lrc() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(b":110F0013000AFF\r\n".as_slice());
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn decode_waits_for_more_bytes_on_incomplete_frame() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(b":110F0013".as_slice());
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_none());
        assert_eq!(buf.len(), 9);
    }
}
