//! Order-preserving encoding of key components.
//!
//! The archive's nine relations (see DESIGN.md) are stored as rows in an ordered
//! key-value engine rather than SQL tables, so every key must encode its tuple of
//! fields such that byte-lexicographic order matches the order a prefix scan needs
//! (e.g. "all State rows for docid D, newest version first" or "all ContainerItem rows
//! for container C"). Integers are encoded big-endian with the sign bit flipped so
//! negative and positive values still sort correctly; strings are escaped so an
//! embedded 0x00 byte can't be mistaken for the field terminator.

use crate::error::{CResult, Error};

pub fn encode_i64(v: i64, out: &mut Vec<u8>) {
    out.extend_from_slice(&((v as u64) ^ (1u64 << 63)).to_be_bytes());
}

pub fn decode_i64(input: &mut &[u8]) -> CResult<i64> {
    let bytes = take(input, 8)?;
    let u = u64::from_be_bytes(bytes.try_into().unwrap());
    Ok((u ^ (1u64 << 63)) as i64)
}

pub fn encode_i32(v: i32, out: &mut Vec<u8>) {
    out.extend_from_slice(&((v as u32) ^ (1u32 << 31)).to_be_bytes());
}

pub fn decode_i32(input: &mut &[u8]) -> CResult<i32> {
    let bytes = take(input, 4)?;
    let u = u32::from_be_bytes(bytes.try_into().unwrap());
    Ok((u ^ (1u32 << 31)) as i32)
}

/// Escapes `0x00` as `0x00 0xff` and terminates the field with `0x00 0x00`, the
/// standard memcomparable-string trick: it preserves lexicographic byte order across
/// field boundaries (a raw 0x00 terminator alone would break prefix comparisons for
/// strings that are themselves prefixes of one another).
pub fn encode_string(s: &str, out: &mut Vec<u8>) {
    for &b in s.as_bytes() {
        if b == 0x00 {
            out.push(0x00);
            out.push(0xff);
        } else {
            out.push(b);
        }
    }
    out.push(0x00);
    out.push(0x00);
}

pub fn decode_string(input: &mut &[u8]) -> CResult<String> {
    let mut bytes = Vec::new();
    loop {
        let b = take(input, 1)?[0];
        if b == 0x00 {
            let next = take(input, 1)?[0];
            match next {
                0x00 => break,
                0xff => bytes.push(0x00),
                _ => return Err(Error::Storage("malformed encoded string".into())),
            }
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8(bytes).map_err(|e| Error::Storage(format!("malformed encoded string: {e}")))
}

pub fn encode_fixed(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes);
}

pub fn decode_fixed<'a>(input: &mut &'a [u8], len: usize) -> CResult<&'a [u8]> {
    take(input, len)
}

fn take<'a>(input: &mut &'a [u8], len: usize) -> CResult<&'a [u8]> {
    if input.len() < len {
        return Err(Error::Storage("truncated encoded key".into()));
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i64_round_trips_and_sorts() {
        let values = [i64::MIN, -1, 0, 1, 42, i64::MAX];
        let mut encoded: Vec<Vec<u8>> = values
            .iter()
            .map(|v| {
                let mut out = Vec::new();
                encode_i64(*v, &mut out);
                out
            })
            .collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);

        for (v, enc) in values.iter().zip(encoded.iter_mut()) {
            let mut slice: &[u8] = enc.as_slice();
            assert_eq!(decode_i64(&mut slice).unwrap(), *v);
        }
    }

    #[test]
    fn string_round_trips_and_preserves_prefix_order() {
        for s in ["", "a", "ab", "a\0b", "container"] {
            let mut out = Vec::new();
            encode_string(s, &mut out);
            let mut slice: &[u8] = out.as_slice();
            assert_eq!(decode_string(&mut slice).unwrap(), s);
            assert!(slice.is_empty());
        }

        let mut a = Vec::new();
        encode_string("a", &mut a);
        let mut ab = Vec::new();
        encode_string("ab", &mut ab);
        assert!(a < ab);
    }
}
