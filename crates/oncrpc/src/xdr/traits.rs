// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Traits for wire-serializable values.
//!
//! Application argument and result types implement these; the engine
//! itself only ever sees "a value that can encode/decode itself". The
//! unit type `()` is the XDR void.

use super::{XdrBuffer, XdrResult};

/// A value that can write itself into an XDR buffer.
pub trait XdrEncode {
    fn encode_xdr(&self, buf: &mut XdrBuffer) -> XdrResult<()>;
}

/// A value that can read itself out of an XDR buffer.
pub trait XdrDecode: Sized {
    fn decode_xdr(buf: &mut XdrBuffer) -> XdrResult<Self>;
}

impl XdrEncode for () {
    fn encode_xdr(&self, _buf: &mut XdrBuffer) -> XdrResult<()> {
        Ok(())
    }
}

impl XdrDecode for () {
    fn decode_xdr(_buf: &mut XdrBuffer) -> XdrResult<Self> {
        Ok(())
    }
}

macro_rules! impl_xdr_primitive {
    ($type:ty, $enc:ident, $dec:ident) => {
        impl XdrEncode for $type {
            fn encode_xdr(&self, buf: &mut XdrBuffer) -> XdrResult<()> {
                buf.$enc(*self);
                Ok(())
            }
        }

        impl XdrDecode for $type {
            fn decode_xdr(buf: &mut XdrBuffer) -> XdrResult<Self> {
                buf.$dec()
            }
        }
    };
}

impl_xdr_primitive!(i32, encode_int, decode_int);
impl_xdr_primitive!(u32, encode_uint, decode_uint);
impl_xdr_primitive!(i64, encode_long, decode_long);
impl_xdr_primitive!(u64, encode_ulong, decode_ulong);
impl_xdr_primitive!(f32, encode_float, decode_float);
impl_xdr_primitive!(f64, encode_double, decode_double);
impl_xdr_primitive!(bool, encode_bool, decode_bool);

impl XdrEncode for String {
    fn encode_xdr(&self, buf: &mut XdrBuffer) -> XdrResult<()> {
        buf.encode_string(self);
        Ok(())
    }
}

impl XdrDecode for String {
    fn decode_xdr(buf: &mut XdrBuffer) -> XdrResult<Self> {
        buf.decode_string()
    }
}

impl XdrEncode for Vec<u8> {
    fn encode_xdr(&self, buf: &mut XdrBuffer) -> XdrResult<()> {
        buf.encode_dynamic_opaque(self);
        Ok(())
    }
}

impl XdrDecode for Vec<u8> {
    fn decode_xdr(buf: &mut XdrBuffer) -> XdrResult<Self> {
        buf.decode_dynamic_opaque()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_encodes_nothing() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin");
        ().encode_xdr(&mut buf).expect("encode void");
        buf.end_encoding();
        assert!(buf.as_written().is_empty());
    }

    #[test]
    fn test_primitive_roundtrip_via_traits() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin");
        42i32.encode_xdr(&mut buf).expect("int");
        "xdr".to_string().encode_xdr(&mut buf).expect("string");
        vec![1u8, 2, 3].encode_xdr(&mut buf).expect("opaque");
        buf.end_encoding();

        buf.begin_decoding().expect("begin");
        assert_eq!(i32::decode_xdr(&mut buf).expect("int"), 42);
        assert_eq!(String::decode_xdr(&mut buf).expect("string"), "xdr");
        assert_eq!(Vec::<u8>::decode_xdr(&mut buf).expect("opaque"), vec![1, 2, 3]);
    }
}
