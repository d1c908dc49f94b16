//! Sync and cursor token codec.
//!
//! Both tokens are the base64-URL encoding of the ASCII string
//! `"<version>:<unix-nanoseconds>"`. Version `"2"` is current; `"1"`
//! tokens carried seconds and are rejected. The same codec serves both
//! token kinds; the strict-vs-inclusive comparison is decided by the
//! caller, not the encoding.

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;

const VERSION_TAG: &str = "2";

/// Encode a point in time as an opaque sync/cursor token.
pub fn encode(time: Timestamp) -> String {
    URL_SAFE.encode(format!("{}:{}", VERSION_TAG, time.unix_nanos()))
}

/// Decode a sync/cursor token back to its point in time.
pub fn decode(token: &str) -> Result<Timestamp> {
    let raw = URL_SAFE
        .decode(token)
        .map_err(|e| Error::InvalidToken(format!("sync token: {e}")))?;
    let raw = String::from_utf8(raw)
        .map_err(|_| Error::InvalidToken("sync token is not ASCII".into()))?;

    let (version, timestamp) = raw
        .split_once(':')
        .ok_or_else(|| Error::InvalidToken("sync token has no version tag".into()))?;

    if version != VERSION_TAG {
        return Err(Error::UnsupportedTokenVersion(version.to_string()));
    }

    let nanos: i64 = timestamp
        .parse()
        .map_err(|_| Error::InvalidToken("sync token timestamp is not a number".into()))?;
    Ok(Timestamp::from_unix_nanos(nanos))
}
