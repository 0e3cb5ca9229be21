// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record-marking framer for RPC over byte streams (RFC 1831 Sec.10).
//!
//! A stream transport carries no message boundaries, so each RPC record
//! is split into one or more *fragments*, each prefixed by a 4-byte
//! marker:
//!
//! ```text
//! +--------------------+-------------------+
//! | marker (4B BE)     | fragment body     |
//! +--------------------+-------------------+
//! marker = length | 0x8000_0000 (last-fragment bit)
//! ```
//!
//! The framer accumulates input and never starts reassembly until it can
//! prove a complete record is present: it walks consecutive markers,
//! summing the bytes a record needs, and only extracts once a
//! last-fragment marker *and* all of its bytes are available. Anything
//! after the record stays in the accumulator for the next one.
//!
//! Datagram transports need none of this: one datagram is one message.

use crate::error::{RpcError, RpcResult};
use crate::protocol::constants::{FRAGMENT_LEN_MASK, FRAGMENT_MARKER_SIZE, LAST_FRAGMENT};
use crate::xdr::XdrBuffer;
use parking_lot::Mutex;
use std::io::Write;

/// Default maximum record size (16 MB, anti-OOM protection).
pub const DEFAULT_MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Stream-side defragmenter: feeds of arbitrary byte chunks in, complete
/// records out.
pub struct RecordFramer {
    /// Accumulated input; consumed records are dropped lazily.
    accumulator: Vec<u8>,
    /// Read position of the first unconsumed byte.
    pos: usize,
    /// Maximum allowed record size.
    max_record_size: usize,
    records_decoded: u64,
    records_rejected: u64,
}

impl RecordFramer {
    pub fn new(max_record_size: usize) -> Self {
        Self {
            accumulator: Vec::with_capacity(16384),
            pos: 0,
            max_record_size,
            records_decoded: 0,
            records_rejected: 0,
        }
    }

    pub fn with_default_max() -> Self {
        Self::new(DEFAULT_MAX_RECORD_SIZE)
    }

    /// Append received bytes, compacting consumed space first when it
    /// dominates the buffer.
    pub fn feed(&mut self, data: &[u8]) {
        if self.pos > 0 && self.pos > self.accumulator.len() / 2 {
            self.accumulator.drain(..self.pos);
            self.pos = 0;
        }
        self.accumulator.extend_from_slice(data);
    }

    /// Records successfully reassembled so far.
    pub fn records_decoded(&self) -> u64 {
        self.records_decoded
    }

    /// Records dropped for exceeding the size limit.
    pub fn records_rejected(&self) -> u64 {
        self.records_rejected
    }

    /// True if bytes of a partially received record are buffered.
    pub fn is_partial(&self) -> bool {
        self.pos < self.accumulator.len()
    }

    /// Try to extract one complete record.
    ///
    /// Returns `Ok(None)` when more input is needed; the accumulator
    /// position is left untouched in that case.
    pub fn next_record(&mut self) -> RpcResult<Option<XdrBuffer>> {
        let mut off = self.pos;
        let mut body_total = 0usize;

        // First pass: prove the record is complete without consuming.
        loop {
            let Some(marker) = self.marker_at(off) else {
                return Ok(None);
            };
            let len = (marker & FRAGMENT_LEN_MASK) as usize;
            body_total += len;
            if body_total > self.max_record_size {
                self.records_rejected += 1;
                // Drop everything buffered; the stream is unrecoverable
                // without a resync point.
                self.pos = self.accumulator.len();
                return Err(RpcError::Envelope(format!(
                    "record exceeds {} bytes",
                    self.max_record_size
                )));
            }
            if self.accumulator.len() < off + FRAGMENT_MARKER_SIZE + len {
                return Ok(None);
            }
            off += FRAGMENT_MARKER_SIZE + len;
            if marker & LAST_FRAGMENT != 0 {
                break;
            }
        }

        // Second pass: extract. A single-fragment record is sliced out
        // directly; multiple fragments are concatenated once, here.
        let mut record = Vec::with_capacity(body_total);
        let mut cursor = self.pos;
        loop {
            let marker = self.marker_at(cursor).expect("proven complete above");
            let len = (marker & FRAGMENT_LEN_MASK) as usize;
            let body_start = cursor + FRAGMENT_MARKER_SIZE;
            record.extend_from_slice(&self.accumulator[body_start..body_start + len]);
            cursor = body_start + len;
            if marker & LAST_FRAGMENT != 0 {
                break;
            }
        }

        self.pos = off;
        self.records_decoded += 1;
        Ok(Some(XdrBuffer::from_bytes(record)))
    }

    fn marker_at(&self, off: usize) -> Option<u32> {
        if self.accumulator.len() < off + FRAGMENT_MARKER_SIZE {
            return None;
        }
        Some(u32::from_be_bytes([
            self.accumulator[off],
            self.accumulator[off + 1],
            self.accumulator[off + 2],
            self.accumulator[off + 3],
        ]))
    }
}

impl Default for RecordFramer {
    fn default() -> Self {
        Self::with_default_max()
    }
}

/// Frame one outgoing message as a single last-fragment record.
pub fn frame_into(payload: &[u8], out: &mut Vec<u8>) {
    let marker = payload.len() as u32 | LAST_FRAGMENT;
    out.extend_from_slice(&marker.to_be_bytes());
    out.extend_from_slice(payload);
}

/// Zero-copy record send: write the marker, the in-memory bytes, and
/// every external-payload chunk to `sink` while holding the connection's
/// send lock.
///
/// The lock spans the whole record; interleaving fragments from two
/// concurrently sent messages corrupts the stream irrecoverably.
pub fn write_record_locked(
    sink: &mut dyn Write,
    message: &XdrBuffer,
    send_lock: &Mutex<()>,
) -> RpcResult<()> {
    let total = message.wire_len();
    let marker = total as u32 | LAST_FRAGMENT;

    let _guard = send_lock.lock();
    sink.write_all(&marker.to_be_bytes())
        .map_err(|e| RpcError::SendFailed(e.to_string()))?;
    sink.write_all(message.as_written())
        .map_err(|e| RpcError::SendFailed(e.to_string()))?;
    if let Some(payload) = message.external() {
        payload.for_each_chunk(|chunk| {
            sink.write_all(chunk)
                .map_err(|e| crate::xdr::XdrError::PayloadSource {
                    reason: e.to_string(),
                })
        })?;
    }
    Ok(())
}

/// Datagram framing policy: one datagram is exactly one message, with no
/// reassembly state across datagrams.
pub struct DatagramFramer;

impl DatagramFramer {
    /// Wrap a received datagram as a complete message.
    pub fn message_from(datagram: Vec<u8>) -> XdrBuffer {
        XdrBuffer::from_bytes(datagram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(body: &[u8], last: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let marker = body.len() as u32 | if last { LAST_FRAGMENT } else { 0 };
        out.extend_from_slice(&marker.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_single_fragment_roundtrip() {
        let mut framer = RecordFramer::with_default_max();
        let mut wire = Vec::new();
        frame_into(b"hello rpc", &mut wire);
        framer.feed(&wire);

        let record = framer.next_record().expect("framing ok").expect("complete");
        assert_eq!(record.as_written(), b"hello rpc");
        assert_eq!(framer.records_decoded(), 1);
        assert!(!framer.is_partial());
    }

    #[test]
    fn test_incomplete_header_waits() {
        let mut framer = RecordFramer::with_default_max();
        framer.feed(&[0x80, 0x00]);
        assert!(framer.next_record().expect("ok").is_none());
    }

    #[test]
    fn test_incomplete_body_waits_without_consuming() {
        let mut framer = RecordFramer::with_default_max();
        let wire = fragment(b"abcdef", true);
        framer.feed(&wire[..7]);
        assert!(framer.next_record().expect("ok").is_none());
        // Completing the stream later still yields the full record.
        framer.feed(&wire[7..]);
        let record = framer.next_record().expect("ok").expect("complete");
        assert_eq!(record.as_written(), b"abcdef");
    }

    #[test]
    fn test_multi_fragment_reassembly() {
        let mut framer = RecordFramer::with_default_max();
        framer.feed(&fragment(b"one-", false));
        framer.feed(&fragment(b"two-", false));
        assert!(framer.next_record().expect("ok").is_none(), "no last fragment yet");
        framer.feed(&fragment(b"three", true));
        let record = framer.next_record().expect("ok").expect("complete");
        assert_eq!(record.as_written(), b"one-two-three");
    }

    #[test]
    fn test_fragmentation_idempotence() {
        // The same message split at every possible point, fed byte by
        // byte, must reconstruct identically to the unfragmented case.
        let message: Vec<u8> = (0u8..=41).collect();
        for split in 1..message.len() {
            let mut wire = Vec::new();
            wire.extend_from_slice(&fragment(&message[..split], false));
            wire.extend_from_slice(&fragment(&message[split..], true));

            let mut framer = RecordFramer::with_default_max();
            for b in &wire {
                framer.feed(std::slice::from_ref(b));
                if let Some(record) = framer.next_record().expect("ok") {
                    assert_eq!(record.as_written(), &message[..], "split={}", split);
                }
            }
            assert_eq!(framer.records_decoded(), 1, "split={}", split);
        }
    }

    #[test]
    fn test_leftover_belongs_to_next_record() {
        let mut framer = RecordFramer::with_default_max();
        let mut wire = Vec::new();
        frame_into(b"first", &mut wire);
        frame_into(b"second", &mut wire);
        wire.extend_from_slice(&fragment(b"par", false)); // start of a third
        framer.feed(&wire);

        assert_eq!(
            framer.next_record().expect("ok").expect("first").as_written(),
            b"first"
        );
        assert_eq!(
            framer.next_record().expect("ok").expect("second").as_written(),
            b"second"
        );
        assert!(framer.next_record().expect("ok").is_none());
        assert!(framer.is_partial());
    }

    #[test]
    fn test_oversize_record_rejected() {
        let mut framer = RecordFramer::new(8);
        framer.feed(&fragment(b"way too large body", true));
        let err = framer.next_record().unwrap_err();
        assert!(matches!(err, RpcError::Envelope(_)));
        assert_eq!(framer.records_rejected(), 1);
    }

    #[test]
    fn test_oversize_across_fragments_rejected() {
        let mut framer = RecordFramer::new(8);
        framer.feed(&fragment(b"12345", false));
        framer.feed(&fragment(b"67890", true));
        assert!(framer.next_record().is_err());
    }

    #[test]
    fn test_empty_last_fragment_terminates_record() {
        let mut framer = RecordFramer::with_default_max();
        framer.feed(&fragment(b"body", false));
        framer.feed(&fragment(b"", true));
        let record = framer.next_record().expect("ok").expect("complete");
        assert_eq!(record.as_written(), b"body");
    }

    #[test]
    fn test_write_record_locked_frames_and_appends_external() {
        use std::sync::Arc;
        let mut message = XdrBuffer::new();
        message.begin_encoding().expect("begin");
        message.encode_uint(5);
        message
            .encode_shallow_bytes(Arc::from(&b"hello"[..]))
            .expect("attach");
        message.end_encoding();

        let mut sink = Vec::new();
        let lock = Mutex::new(());
        write_record_locked(&mut sink, &message, &lock).expect("send");

        let expected_len = (4 + 5 + 3) as u32 | LAST_FRAGMENT;
        assert_eq!(&sink[..4], &expected_len.to_be_bytes());
        assert_eq!(&sink[4..8], &5u32.to_be_bytes());
        assert_eq!(&sink[8..13], b"hello");
        assert_eq!(&sink[13..], &[0, 0, 0]);
    }

    #[test]
    fn test_datagram_is_one_message() {
        let mut msg = DatagramFramer::message_from(vec![0, 0, 0, 9]);
        assert_eq!(msg.decode_uint().expect("uint"), 9);
    }
}
