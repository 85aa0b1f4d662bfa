// SPDX-License-Identifier: AGPL-3.0-or-later

//! The fixed 12-byte header + variable-length payload wire frame used on
//! event sessions: three big-endian `u32`s (`length`, `msg_id`, `seq`)
//! followed by exactly `length` payload bytes. The codec never buffers
//! more than one frame.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zerocopy::byteorder::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::ShortFrame;

pub const HEADER_LEN: usize = 12;

/// Message identifiers carried in a frame header.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgId {
    Request = 0,
    Notify = 1,
    Response = 2,
    SessionStart = 10,
    SessionStarted = 11,
    SessionStop = 20,
    SessionDisconnected = 21,
}

impl MsgId {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => MsgId::Request,
            1 => MsgId::Notify,
            2 => MsgId::Response,
            10 => MsgId::SessionStart,
            11 => MsgId::SessionStarted,
            20 => MsgId::SessionStop,
            21 => MsgId::SessionDisconnected,
            _ => return None,
        })
    }
}

/// Wire-exact, zero-copy view of the 12-byte frame header.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawHeader {
    length: U32,
    msg_id: U32,
    seq: U32,
}

/// A decoded frame: the raw `msg_id` (not all values are known
/// `MsgId`s — unrecognized ones are a `Protocol` error for the caller to
/// log and drop), the sequence number, and the payload bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub msg_id: u32,
    pub seq: u32,
    pub payload: Bytes,
}

/// Serializes a frame header + payload to bytes ready for a single
/// `write_all`.
pub fn encode(msg_id: u32, seq: u32, payload: &[u8]) -> BytesMut {
    let header = RawHeader {
        length: U32::new(payload.len() as u32),
        msg_id: U32::new(msg_id),
        seq: U32::new(seq),
    };
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Writes a frame directly to an async writer.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    msg_id: u32,
    seq: u32,
    payload: &[u8],
) -> std::io::Result<()> {
    let buf = encode(msg_id, seq, payload);
    w.write_all(&buf).await
}

/// Reads exactly one frame from an async reader. A short read at any
/// point (header or payload) yields `ShortFrame`; the caller must
/// terminate its reader loop in that case.
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<Frame, ShortFrameOrIo> {
    let mut header_buf = [0u8; HEADER_LEN];
    read_exact_short(r, &mut header_buf).await?;

    let header =
        RawHeader::read_from_bytes(&header_buf).expect("HEADER_LEN bytes always parse");
    let length = header.length.get() as usize;
    let msg_id = header.msg_id.get();
    let seq = header.seq.get();

    let payload = if length > 0 {
        let mut buf = BytesMut::zeroed(length);
        read_exact_short(r, &mut buf).await?;
        buf.freeze()
    } else {
        Bytes::new()
    };

    Ok(Frame {
        msg_id,
        seq,
        payload,
    })
}

/// Either a genuine short-frame condition or an underlying I/O error
/// that isn't about a short read (e.g. a reset connection).
#[derive(Debug, thiserror::Error)]
pub enum ShortFrameOrIo {
    #[error(transparent)]
    Short(#[from] ShortFrame),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

async fn read_exact_short<R: AsyncRead + Unpin>(
    r: &mut R,
    buf: &mut [u8],
) -> Result<(), ShortFrameOrIo> {
    match r.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ShortFrameOrIo::Short(
            ShortFrame {
                expected: buf.len(),
                got: 0,
            },
        )),
        Err(e) => Err(ShortFrameOrIo::Io(e)),
    }
}
