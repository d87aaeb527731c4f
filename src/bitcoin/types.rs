//! Header data model and digest byte-order handling.

use alloy::primitives::B256;
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use std::fmt;
use thiserror::Error;

/// Length of a serialized block header.
pub const HEADER_LEN: usize = 80;

/// Number of blocks between difficulty retargets.
pub const RETARGET_INTERVAL: u64 = 2016;

/// A 32-byte block digest in the registry's native (internal) byte order.
///
/// The node reports hashes reversed ("display" order). Conversions between
/// the two orders live on this type and nowhere else.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// The all-zero digest (genesis `prevhash`).
    pub const ZERO: Digest = Digest([0u8; 32]);

    /// Build a digest from internal-order bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Parse a display-order hex string as reported by the node.
    pub fn from_rpc_hex(hex_str: &str) -> SourceResult<Self> {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(trimmed)
            .map_err(|e| SourceError::Decode(format!("invalid digest hex '{}': {}", hex_str, e)))?;
        let mut digest = Self::from_slice(&bytes).ok_or_else(|| {
            SourceError::Decode(format!("expected 32 byte digest, got {} bytes", bytes.len()))
        })?;
        digest.0.reverse();
        Ok(digest)
    }

    /// Render in display order for node requests.
    pub fn to_rpc_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }

    /// Interpret a registry `bytes32` word.
    pub fn from_registry_word(word: B256) -> Self {
        Self(word.0)
    }

    /// The registry `bytes32` word for this digest.
    pub fn as_registry_word(&self) -> B256 {
        B256::from(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

/// Double SHA-256, returned in internal byte order.
pub fn sha256d(data: &[u8]) -> Digest {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Digest(out)
}

/// A source-chain block header with its position on the node's chain view.
///
/// Headers are immutable values; equality is full field equality, so a
/// different block at the same height compares unequal.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    /// The 80 serialized header bytes.
    pub raw: [u8; HEADER_LEN],
    /// `sha256d(raw)`, internal order.
    pub hash: Digest,
    /// Height reported by the node.
    pub height: u64,
    /// Merkle root, internal order.
    pub merkle_root: Digest,
    /// Hash of the parent header, internal order.
    pub prevhash: Digest,
}

impl Header {
    /// Build a header from its serialized bytes.
    ///
    /// Only the first 80 bytes are used; nodes may append a transaction count.
    pub fn from_raw(raw: &[u8], height: u64) -> SourceResult<Self> {
        if raw.len() < HEADER_LEN {
            return Err(SourceError::Decode(format!(
                "header must be {} bytes, got {}",
                HEADER_LEN,
                raw.len()
            )));
        }
        let mut bytes = [0u8; HEADER_LEN];
        bytes.copy_from_slice(&raw[..HEADER_LEN]);

        let hash = sha256d(&bytes);
        let prevhash = Digest::from_slice(&bytes[4..36]).unwrap_or_default();
        let merkle_root = Digest::from_slice(&bytes[36..68]).unwrap_or_default();

        Ok(Self {
            raw: bytes,
            hash,
            height,
            merkle_root,
            prevhash,
        })
    }

    /// Position of this header within its difficulty epoch.
    pub fn epoch_offset(&self) -> u64 {
        self.height % RETARGET_INTERVAL
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "height {} hash {}", self.height, self.hash)
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("height", &self.height)
            .field("hash", &self.hash)
            .field("prevhash", &self.prevhash)
            .finish()
    }
}

/// A transaction as returned by the node's REST interface.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceTransaction {
    pub hash: String,
    pub height: i64,
    pub block: Option<String>,
    pub confirmations: u64,
    pub hex: String,
}

impl Default for SourceTransaction {
    fn default() -> Self {
        Self {
            hash: String::new(),
            height: -1,
            block: None,
            confirmations: 0,
            hex: String::new(),
        }
    }
}

/// Errors talking to the source-chain node.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP transport failure (connect, timeout, body read).
    #[error("source RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with something that is not JSON.
    #[error("source RPC returned a non-JSON body (status {status}); is your bcoin api key correct?")]
    NotJson { status: u16 },

    /// A response could not be decoded into the expected shape.
    #[error("malformed source RPC response: {0}")]
    Decode(String),

    /// The node reported a hash that does not match the header bytes it served.
    #[error("header hash mismatch: node reported {reported}, bytes hash to {computed}")]
    HashMismatch { reported: Digest, computed: Digest },

    /// Unexpected HTTP status on a call that has no "absent" meaning.
    #[error("unexpected status {status} from {method}")]
    Status { method: &'static str, status: u16 },
}

/// Result type for source-chain operations.
pub type SourceResult<T> = Result<T, SourceError>;
