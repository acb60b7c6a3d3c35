//! Value (de)serialization for rows stored under an encoded key. Unlike the teacher's
//! `BytesCodec` (which length-prefixes records so several can be concatenated in one
//! buffer), each row here is already its own engine entry, so no length prefix is
//! needed -- the value bytes are exactly one JSON document.

use crate::codec::Codec;
use crate::error::CResult;
use serde::{de::DeserializeOwned, Serialize};

#[derive(Clone, Copy, Default)]
pub struct ValueCodec;

impl ValueCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CResult<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Codec for ValueCodec {
    fn codec_name(&self) -> &'static str {
        "ValueCodec"
    }
}
