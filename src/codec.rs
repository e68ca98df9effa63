//! Little-endian integer decoding and OSTA Compressed Unicode (dstring) decoding.
//!
//! Every on-disk structure is accessed through explicit byte-range slicing rather
//! than a pointer-cast overlay, so all of this module works on `&[u8]`.

use crate::error::{Error, Result};

pub fn u16le(buf: &[u8], off: usize) -> Result<u16> {
    let b = buf
        .get(off..off + 2)
        .ok_or(Error::BadFormat("truncated record"))?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub fn u32le(buf: &[u8], off: usize) -> Result<u32> {
    let b = buf
        .get(off..off + 4)
        .ok_or(Error::BadFormat("truncated record"))?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn u64le(buf: &[u8], off: usize) -> Result<u64> {
    let b = buf
        .get(off..off + 8)
        .ok_or(Error::BadFormat("truncated record"))?;
    Ok(u64::from_le_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ]))
}

/// Decode `sz` bytes of OSTA Compressed Unicode (identifier byte 8 or 16) to a `String`.
///
/// Unpaired surrogates in 16-bit input are replaced with U+FFFD, matching the
/// lossy behavior of a UTF-16 to UTF-8 converter.
pub fn read_string(raw: &[u8], sz: usize) -> Result<String> {
    if sz == 0 || raw.is_empty() {
        return Ok(String::new());
    }
    let sz = sz.min(raw.len());
    match raw[0] {
        8 => {
            let units: Vec<u16> = raw[1..sz].iter().map(|&b| b as u16).collect();
            Ok(char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect())
        }
        16 => {
            let body = &raw[1..sz];
            let mut units = Vec::with_capacity(body.len() / 2);
            let mut i = 0;
            while i + 1 < body.len() {
                units.push(((body[i] as u16) << 8) | (body[i + 1] as u16));
                i += 2;
            }
            Ok(char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect())
        }
        _ => Err(Error::BadFormat("unsupported character set")),
    }
}

/// Decode a fixed-size dstring field: `raw[sz-1]` is a length byte, clamped to
/// `sz-1` if it overruns the field (tolerant of malformed input, matching the
/// original driver's behavior).
pub fn read_dstring(raw: &[u8], sz: usize) -> Result<String> {
    if sz == 0 || raw.is_empty() || raw[0] == 0 {
        return Ok(String::new());
    }
    let sz = sz.min(raw.len());
    let len = raw[sz - 1] as usize;
    let len = len.min(sz - 1);
    read_string(raw, len)
}

/// Encode a string as an OSTA compressed Unicode dstring body (no length byte,
/// no compression-id trailing null). Used only by test fixtures; the crate has
/// no write path for real volumes.
pub fn encode_string(s: &str) -> Vec<u8> {
    let needs_16bit = s.chars().any(|c| c as u32 > 0xFF);
    let mut out = Vec::new();
    if needs_16bit {
        out.push(16u8);
        for c in s.chars() {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                out.push((*unit >> 8) as u8);
                out.push((*unit & 0xFF) as u8);
            }
        }
    } else {
        out.push(8u8);
        for c in s.chars() {
            out.push(c as u8);
        }
    }
    out
}

/// Encode a dstring into a fixed-size field: body followed by zero padding and
/// a trailing length byte. `field.len()` must be at least `body.len() + 1`.
pub fn encode_dstring(s: &str, field: &mut [u8]) {
    let body = encode_string(s);
    let cap = field.len() - 1;
    let n = body.len().min(cap);
    field[..n].copy_from_slice(&body[..n]);
    for b in &mut field[n..cap] {
        *b = 0;
    }
    field[field.len() - 1] = n as u8;
}
