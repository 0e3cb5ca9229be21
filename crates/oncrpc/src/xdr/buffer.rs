// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Growable XDR buffer with independent read/write cursors.
//!
//! One `XdrBuffer` carries one RPC message: header, credentials, and
//! payload are encoded into it in order, then the framer hands it to the
//! transport. Inbound, the framer produces one `XdrBuffer` per complete
//! message and the decoders walk it with the read cursor.
//!
//! A buffer may carry one *external payload* -- a byte region attached by
//! reference (shared bytes or a file-like chunk source) that is logically
//! appended after the in-memory bytes, followed by its own 4-byte
//! alignment padding. `materialize()` is the only place the external
//! region is copied into the contiguous buffer.

use super::{pad_for, XdrError, XdrResult};
use std::sync::Arc;

/// Generate big-endian encode methods for fixed-width primitives.
///
/// Each generated method:
/// 1. Grows the backing storage if needed (write cursor preserved)
/// 2. Converts the value via `to_be_bytes()`
/// 3. Copies bytes at the write cursor and advances it
macro_rules! impl_encode_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) {
            self.ensure_writable($size);
            let bytes = value.to_be_bytes();
            self.storage[self.write_pos..self.write_pos + $size].copy_from_slice(&bytes);
            self.write_pos += $size;
        }
    };
}

/// Generate big-endian decode methods for fixed-width primitives.
///
/// Each generated method:
/// 1. Checks the readable window (returns `XdrError::Truncated` if short)
/// 2. Reads N bytes at the read cursor
/// 3. Converts via `from_be_bytes()` and advances the cursor
macro_rules! impl_decode_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> XdrResult<$type> {
            if self.remaining() < $size {
                return Err(XdrError::Truncated {
                    offset: self.read_pos,
                    needed: $size,
                });
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.storage[self.read_pos..self.read_pos + $size]);
            self.read_pos += $size;
            Ok(<$type>::from_be_bytes(bytes))
        }
    };
}

/// Generate dynamic and fixed vector encode/decode for one element type.
macro_rules! impl_vector {
    ($enc:ident, $enc_fixed:ident, $dec:ident, $dec_fixed:ident, $elem_enc:ident, $elem_dec:ident, $type:ty) => {
        pub fn $enc(&mut self, values: &[$type]) {
            self.encode_uint(values.len() as u32);
            for v in values {
                self.$elem_enc(*v);
            }
        }

        pub fn $enc_fixed(&mut self, values: &[$type], expected: usize) -> XdrResult<()> {
            if values.len() != expected {
                return Err(XdrError::LengthMismatch {
                    expected,
                    actual: values.len(),
                });
            }
            for v in values {
                self.$elem_enc(*v);
            }
            Ok(())
        }

        pub fn $dec(&mut self) -> XdrResult<Vec<$type>> {
            let count = self.decode_count()?;
            let mut values = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                values.push(self.$elem_dec()?);
            }
            Ok(values)
        }

        pub fn $dec_fixed(&mut self, expected: usize) -> XdrResult<Vec<$type>> {
            let mut values = Vec::with_capacity(expected.min(4096));
            for _ in 0..expected {
                values.push(self.$elem_dec()?);
            }
            Ok(values)
        }
    };
}

/// Byte source backing a zero-copy file chunk attachment.
///
/// Implementations read a window of an underlying file-like object; the
/// engine never owns the file, only the (source, offset, len) triple.
pub trait ChunkSource: Send + Sync {
    /// Fill `out` with bytes starting at `offset`. Must fill it entirely.
    fn read_at(&self, offset: u64, out: &mut [u8]) -> XdrResult<()>;
}

/// External region attached to a buffer for zero-copy transmission.
enum ExternalRegion {
    /// Shared in-memory bytes, referenced without copying.
    Bytes(Arc<[u8]>),
    /// Window of a file-like source.
    Chunk {
        source: Arc<dyn ChunkSource>,
        offset: u64,
        len: usize,
    },
}

/// External payload: one region plus the alignment padding that follows it.
pub struct ExternalPayload {
    region: ExternalRegion,
    pad: usize,
}

impl ExternalPayload {
    /// Payload length on the wire, excluding padding.
    pub fn len(&self) -> usize {
        match &self.region {
            ExternalRegion::Bytes(b) => b.len(),
            ExternalRegion::Chunk { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trailing zero padding to 4-byte alignment.
    pub fn pad(&self) -> usize {
        self.pad
    }

    /// Visit the payload as wire-ready chunks, padding included.
    ///
    /// Shared bytes are passed through without copying; file chunks are
    /// staged through a bounded scratch buffer.
    pub fn for_each_chunk<F>(&self, mut f: F) -> XdrResult<()>
    where
        F: FnMut(&[u8]) -> XdrResult<()>,
    {
        const SCRATCH: usize = 64 * 1024;
        match &self.region {
            ExternalRegion::Bytes(b) => f(b)?,
            ExternalRegion::Chunk {
                source,
                offset,
                len,
            } => {
                let mut scratch = vec![0u8; SCRATCH.min(*len)];
                let mut done = 0usize;
                while done < *len {
                    let n = SCRATCH.min(len - done);
                    source.read_at(offset + done as u64, &mut scratch[..n])?;
                    f(&scratch[..n])?;
                    done += n;
                }
            }
        }
        if self.pad > 0 {
            f(&[0u8; 3][..self.pad])?;
        }
        Ok(())
    }
}

/// Owned, growable XDR buffer. Big-endian; independent read and write
/// cursors; optional external payload.
pub struct XdrBuffer {
    /// Backing storage; written data is `storage[..limit]`.
    storage: Vec<u8>,
    /// End of readable data (set by `end_encoding` or construction).
    limit: usize,
    read_pos: usize,
    write_pos: usize,
    encoding: bool,
    decoding: bool,
    external: Option<ExternalPayload>,
}

impl std::fmt::Debug for XdrBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XdrBuffer")
            .field("limit", &self.limit)
            .field("read_pos", &self.read_pos)
            .field("write_pos", &self.write_pos)
            .field("encoding", &self.encoding)
            .field("decoding", &self.decoding)
            .field("external", &self.external.as_ref().map(|p| p.len()))
            .finish_non_exhaustive()
    }
}

impl XdrBuffer {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity],
            limit: 0,
            read_pos: 0,
            write_pos: 0,
            encoding: false,
            decoding: false,
            external: None,
        }
    }

    /// Wrap received bytes, ready for decoding.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let limit = bytes.len();
        Self {
            storage: bytes,
            limit,
            read_pos: 0,
            write_pos: limit,
            encoding: false,
            decoding: false,
            external: None,
        }
    }

    // === pass management ===

    /// Start a fresh encode pass: write cursor to 0, prior content and any
    /// external attachment discarded.
    pub fn begin_encoding(&mut self) -> XdrResult<()> {
        if self.encoding {
            return Err(XdrError::InUse);
        }
        self.encoding = true;
        self.write_pos = 0;
        self.limit = 0;
        self.external = None;
        Ok(())
    }

    /// Finalize the encode pass and flip the buffer to readable.
    pub fn end_encoding(&mut self) {
        self.limit = self.write_pos;
        self.read_pos = 0;
        self.encoding = false;
    }

    /// Start a decode pass from the beginning of the readable window.
    pub fn begin_decoding(&mut self) -> XdrResult<()> {
        if self.decoding {
            return Err(XdrError::InUse);
        }
        self.decoding = true;
        self.read_pos = 0;
        Ok(())
    }

    pub fn end_decoding(&mut self) {
        self.decoding = false;
    }

    /// True between `begin_*` and `end_*` of either direction.
    pub fn in_use(&self) -> bool {
        self.encoding || self.decoding
    }

    /// Defensive copy of the written bytes. Fails while a pass is open.
    pub fn snapshot(&self) -> XdrResult<Vec<u8>> {
        if self.in_use() {
            return Err(XdrError::InUse);
        }
        Ok(self.storage[..self.limit].to_vec())
    }

    // === cursors / views ===

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Bytes still readable in the current decode window.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.read_pos)
    }

    /// The written in-memory bytes (external payload not included).
    pub fn as_written(&self) -> &[u8] {
        &self.storage[..self.limit]
    }

    /// Bytes written so far in the current encode pass. Security layers
    /// checksum the partially built header through this view.
    pub fn encoded_so_far(&self) -> &[u8] {
        &self.storage[..self.write_pos]
    }

    /// Total on-wire length: written bytes plus external payload and pad.
    pub fn wire_len(&self) -> usize {
        let base = if self.encoding { self.write_pos } else { self.limit };
        match &self.external {
            Some(p) => base + p.len() + p.pad(),
            None => base,
        }
    }

    pub fn external(&self) -> Option<&ExternalPayload> {
        self.external.as_ref()
    }

    // === growth ===

    /// Make room for `needed` more bytes at the write cursor. Growth is
    /// geometric and preserves all previously written bytes.
    fn ensure_writable(&mut self, needed: usize) {
        let required = self.write_pos + needed;
        if required <= self.storage.len() {
            return;
        }
        let grown = self.storage.len() + self.storage.len() / 2;
        self.storage.resize(grown.max(required), 0);
    }

    // === primitive encoders ===

    impl_encode_be!(encode_int, i32, 4);
    impl_encode_be!(encode_uint, u32, 4);
    impl_encode_be!(encode_long, i64, 8);
    impl_encode_be!(encode_ulong, u64, 8);

    pub fn encode_float(&mut self, value: f32) {
        self.encode_uint(value.to_bits());
    }

    pub fn encode_double(&mut self, value: f64) {
        self.encode_ulong(value.to_bits());
    }

    pub fn encode_bool(&mut self, value: bool) {
        self.encode_int(i32::from(value));
    }

    /// Fixed opaque: raw bytes plus zero padding to 4-byte alignment.
    pub fn encode_opaque(&mut self, bytes: &[u8]) {
        let pad = pad_for(bytes.len());
        self.ensure_writable(bytes.len() + pad);
        self.storage[self.write_pos..self.write_pos + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
        for _ in 0..pad {
            self.storage[self.write_pos] = 0;
            self.write_pos += 1;
        }
    }

    /// Append bytes that are already XDR-structured (no length prefix,
    /// no padding). Used when a security transform has produced the
    /// final on-wire form of a body.
    pub(crate) fn append_encoded(&mut self, bytes: &[u8]) {
        self.ensure_writable(bytes.len());
        self.storage[self.write_pos..self.write_pos + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
    }

    /// Variable-length opaque: length prefix, then bytes and padding.
    pub fn encode_dynamic_opaque(&mut self, bytes: &[u8]) {
        self.encode_uint(bytes.len() as u32);
        self.encode_opaque(bytes);
    }

    /// UTF-8 string, encoded as a dynamic opaque of its byte form.
    pub fn encode_string(&mut self, value: &str) {
        self.encode_dynamic_opaque(value.as_bytes());
    }

    // === primitive decoders ===

    impl_decode_be!(decode_int, i32, 4);
    impl_decode_be!(decode_uint, u32, 4);
    impl_decode_be!(decode_long, i64, 8);
    impl_decode_be!(decode_ulong, u64, 8);

    pub fn decode_float(&mut self) -> XdrResult<f32> {
        Ok(f32::from_bits(self.decode_uint()?))
    }

    pub fn decode_double(&mut self) -> XdrResult<f64> {
        Ok(f64::from_bits(self.decode_ulong()?))
    }

    pub fn decode_bool(&mut self) -> XdrResult<bool> {
        Ok(self.decode_int()? != 0)
    }

    /// Decode a non-negative length/count prefix.
    fn decode_count(&mut self) -> XdrResult<usize> {
        let value = self.decode_int()?;
        if value < 0 {
            return Err(XdrError::CorruptLength { value });
        }
        Ok(value as usize)
    }

    /// Fixed opaque of known length: consumes exactly `len + pad` bytes.
    pub fn decode_opaque(&mut self, len: usize) -> XdrResult<Vec<u8>> {
        let pad = pad_for(len);
        if self.remaining() < len + pad {
            return Err(XdrError::Truncated {
                offset: self.read_pos,
                needed: len + pad,
            });
        }
        let bytes = self.storage[self.read_pos..self.read_pos + len].to_vec();
        self.read_pos += len + pad;
        Ok(bytes)
    }

    /// Consume and return everything left in the readable window.
    pub fn decode_remaining(&mut self) -> Vec<u8> {
        let rest = self.storage[self.read_pos..self.limit].to_vec();
        self.read_pos = self.limit;
        rest
    }

    pub fn decode_dynamic_opaque(&mut self) -> XdrResult<Vec<u8>> {
        let len = self.decode_count()?;
        self.decode_opaque(len)
    }

    pub fn decode_string(&mut self) -> XdrResult<String> {
        let offset = self.read_pos;
        let bytes = self.decode_dynamic_opaque()?;
        String::from_utf8(bytes).map_err(|_| XdrError::InvalidUtf8 { offset })
    }

    // === vectors ===

    impl_vector!(
        encode_int_vector,
        encode_fixed_int_vector,
        decode_int_vector,
        decode_fixed_int_vector,
        encode_int,
        decode_int,
        i32
    );
    impl_vector!(
        encode_uint_vector,
        encode_fixed_uint_vector,
        decode_uint_vector,
        decode_fixed_uint_vector,
        encode_uint,
        decode_uint,
        u32
    );
    impl_vector!(
        encode_long_vector,
        encode_fixed_long_vector,
        decode_long_vector,
        decode_fixed_long_vector,
        encode_long,
        decode_long,
        i64
    );
    impl_vector!(
        encode_float_vector,
        encode_fixed_float_vector,
        decode_float_vector,
        decode_fixed_float_vector,
        encode_float,
        decode_float,
        f32
    );
    impl_vector!(
        encode_double_vector,
        encode_fixed_double_vector,
        decode_double_vector,
        decode_fixed_double_vector,
        encode_double,
        decode_double,
        f64
    );
    impl_vector!(
        encode_bool_vector,
        encode_fixed_bool_vector,
        decode_bool_vector,
        decode_fixed_bool_vector,
        encode_bool,
        decode_bool,
        bool
    );

    // === zero-copy external payload ===

    /// Attach shared bytes by reference. At most one external payload may
    /// be attached before it is consumed.
    pub fn encode_shallow_bytes(&mut self, bytes: Arc<[u8]>) -> XdrResult<()> {
        if self.external.is_some() {
            return Err(XdrError::PayloadAttached);
        }
        let pad = pad_for(bytes.len());
        self.external = Some(ExternalPayload {
            region: ExternalRegion::Bytes(bytes),
            pad,
        });
        Ok(())
    }

    /// Attach a window of a file-like source by reference.
    pub fn encode_file_chunk(
        &mut self,
        source: Arc<dyn ChunkSource>,
        offset: u64,
        len: usize,
    ) -> XdrResult<()> {
        if self.external.is_some() {
            return Err(XdrError::PayloadAttached);
        }
        let pad = pad_for(len);
        self.external = Some(ExternalPayload {
            region: ExternalRegion::Chunk {
                source,
                offset,
                len,
            },
            pad,
        });
        Ok(())
    }

    /// Copy the external payload into the contiguous buffer and clear the
    /// attachment so it cannot be written twice. This is the only place
    /// the external region is copied.
    pub fn materialize(&mut self) -> XdrResult<()> {
        let Some(payload) = self.external.take() else {
            return Ok(());
        };
        let total = payload.len() + payload.pad();
        self.ensure_writable(total);
        match &payload.region {
            ExternalRegion::Bytes(b) => {
                self.storage[self.write_pos..self.write_pos + b.len()].copy_from_slice(b);
            }
            ExternalRegion::Chunk {
                source,
                offset,
                len,
            } => {
                source.read_at(
                    *offset,
                    &mut self.storage[self.write_pos..self.write_pos + len],
                )?;
            }
        }
        let data_len = payload.len();
        for i in 0..payload.pad() {
            self.storage[self.write_pos + data_len + i] = 0;
        }
        self.write_pos += total;
        if !self.encoding {
            // Finished buffers keep their readable window in sync.
            self.limit = self.write_pos;
        }
        Ok(())
    }
}

impl Default for XdrBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(fill: impl FnOnce(&mut XdrBuffer)) -> XdrBuffer {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        fill(&mut buf);
        buf.end_encoding();
        buf
    }

    #[test]
    fn test_roundtrip_primitives() {
        let mut buf = encoded(|b| {
            b.encode_int(-42);
            b.encode_uint(0xDEAD_BEEF);
            b.encode_long(i64::MIN);
            b.encode_long(i64::MAX);
            b.encode_float(std::f32::consts::PI);
            b.encode_double(std::f64::consts::E);
            b.encode_bool(true);
            b.encode_bool(false);
        });

        buf.begin_decoding().expect("begin decode");
        assert_eq!(buf.decode_int().expect("int"), -42);
        assert_eq!(buf.decode_uint().expect("uint"), 0xDEAD_BEEF);
        assert_eq!(buf.decode_long().expect("long min"), i64::MIN);
        assert_eq!(buf.decode_long().expect("long max"), i64::MAX);
        assert_eq!(buf.decode_float().expect("float"), std::f32::consts::PI);
        assert_eq!(buf.decode_double().expect("double"), std::f64::consts::E);
        assert!(buf.decode_bool().expect("bool true"));
        assert!(!buf.decode_bool().expect("bool false"));
        assert_eq!(buf.remaining(), 0);
        buf.end_decoding();
    }

    #[test]
    fn test_big_endian_layout() {
        let buf = encoded(|b| b.encode_uint(0x0102_0304));
        assert_eq!(buf.as_written(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_opaque_padding_invariant() {
        // An int encoded right after an opaque of any length must land on
        // a 4-byte boundary from the opaque's start.
        for len in 0..=9 {
            let data: Vec<u8> = (0..len as u8).collect();
            let buf = encoded(|b| {
                b.encode_dynamic_opaque(&data);
                b.encode_int(7);
            });
            // 4 (length) + len + pad, then the int.
            let expected_int_offset = 4 + len + crate::xdr::pad_for(len);
            assert_eq!(buf.as_written().len(), expected_int_offset + 4, "len={}", len);
            assert_eq!(expected_int_offset % 4, 0, "len={}", len);
        }
    }

    #[test]
    fn test_opaque_roundtrip_consumes_padding() {
        let mut buf = encoded(|b| {
            b.encode_dynamic_opaque(b"abcde");
            b.encode_int(99);
        });
        buf.begin_decoding().expect("begin decode");
        assert_eq!(buf.decode_dynamic_opaque().expect("opaque"), b"abcde");
        assert_eq!(buf.decode_int().expect("trailing int"), 99);
    }

    #[test]
    fn test_zero_length_string_and_opaque() {
        let mut buf = encoded(|b| {
            b.encode_string("");
            b.encode_dynamic_opaque(b"");
        });
        buf.begin_decoding().expect("begin decode");
        assert_eq!(buf.decode_string().expect("empty string"), "");
        assert_eq!(buf.decode_dynamic_opaque().expect("empty opaque"), b"");
    }

    #[test]
    fn test_string_utf8_roundtrip() {
        let mut buf = encoded(|b| b.encode_string("héllo wörld"));
        buf.begin_decoding().expect("begin decode");
        assert_eq!(buf.decode_string().expect("string"), "héllo wörld");
    }

    #[test]
    fn test_decode_truncated() {
        let mut buf = XdrBuffer::from_bytes(vec![0x00, 0x01]);
        let err = buf.decode_int().unwrap_err();
        assert!(matches!(err, XdrError::Truncated { offset: 0, needed: 4 }));
    }

    #[test]
    fn test_decode_negative_length_is_corrupt() {
        let mut buf = encoded(|b| b.encode_int(-1));
        let err = buf.decode_dynamic_opaque().unwrap_err();
        assert!(matches!(err, XdrError::CorruptLength { value: -1 }));
    }

    #[test]
    fn test_fixed_vector_length_mismatch() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        let err = buf.encode_fixed_int_vector(&[1, 2, 3], 4).unwrap_err();
        assert!(matches!(err, XdrError::LengthMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_vector_roundtrip() {
        let ints = [i32::MIN, -1, 0, 1, i32::MAX];
        let longs = [i64::MIN, 0, i64::MAX];
        let mut buf = encoded(|b| {
            b.encode_int_vector(&ints);
            b.encode_long_vector(&longs);
            b.encode_fixed_double_vector(&[1.5, -2.5], 2).expect("fixed doubles");
        });
        buf.begin_decoding().expect("begin decode");
        assert_eq!(buf.decode_int_vector().expect("ints"), ints);
        assert_eq!(buf.decode_long_vector().expect("longs"), longs);
        assert_eq!(
            buf.decode_fixed_double_vector(2).expect("fixed doubles"),
            vec![1.5, -2.5]
        );
    }

    #[test]
    fn test_growth_preserves_content() {
        let mut buf = XdrBuffer::with_capacity(4);
        buf.begin_encoding().expect("begin encode");
        for i in 0..100u32 {
            buf.encode_uint(i);
        }
        buf.end_encoding();
        assert_eq!(buf.as_written().len(), 400);
        buf.begin_decoding().expect("begin decode");
        for i in 0..100u32 {
            assert_eq!(buf.decode_uint().expect("uint"), i);
        }
    }

    #[test]
    fn test_snapshot_while_in_use_fails() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        buf.encode_int(1);
        assert!(matches!(buf.snapshot(), Err(XdrError::InUse)));
        buf.end_encoding();
        assert_eq!(buf.snapshot().expect("snapshot"), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_double_begin_fails() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("first begin");
        assert!(matches!(buf.begin_encoding(), Err(XdrError::InUse)));
    }

    #[test]
    fn test_second_external_payload_rejected() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        let payload: Arc<[u8]> = Arc::from(&b"abc"[..]);
        buf.encode_shallow_bytes(Arc::clone(&payload)).expect("first attach");
        let err = buf.encode_shallow_bytes(payload).unwrap_err();
        assert!(matches!(err, XdrError::PayloadAttached));
    }

    #[test]
    fn test_materialize_copies_once_and_clears() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        buf.encode_uint(5);
        buf.encode_shallow_bytes(Arc::from(&b"hello"[..])).expect("attach");
        assert_eq!(buf.wire_len(), 4 + 5 + 3);

        buf.materialize().expect("materialize");
        assert!(buf.external().is_none());
        buf.end_encoding();

        // length prefix, bytes, then zero pad to alignment
        assert_eq!(buf.as_written(), b"\x00\x00\x00\x05hello\x00\x00\x00");

        // second materialize is a no-op
        let mut buf2 = buf;
        buf2.materialize().expect("no-op materialize");
        assert_eq!(buf2.as_written().len(), 12);
    }

    struct PatternSource;

    impl ChunkSource for PatternSource {
        fn read_at(&self, offset: u64, out: &mut [u8]) -> XdrResult<()> {
            for (i, b) in out.iter_mut().enumerate() {
                *b = ((offset as usize + i) % 251) as u8;
            }
            Ok(())
        }
    }

    #[test]
    fn test_file_chunk_materialize() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        buf.encode_file_chunk(Arc::new(PatternSource), 10, 6).expect("attach");
        buf.materialize().expect("materialize");
        buf.end_encoding();
        assert_eq!(buf.as_written(), &[10, 11, 12, 13, 14, 15, 0, 0]);
    }

    #[test]
    fn test_external_chunk_iteration_includes_pad() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        buf.encode_shallow_bytes(Arc::from(&b"abcde"[..])).expect("attach");
        let mut wire = Vec::new();
        buf.external()
            .expect("payload attached")
            .for_each_chunk(|chunk| {
                wire.extend_from_slice(chunk);
                Ok(())
            })
            .expect("chunks");
        assert_eq!(wire, b"abcde\x00\x00\x00");
    }
}
