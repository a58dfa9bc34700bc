//! Record types stored in the catalog.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Lifecycle state of a repository as reported by the ledger.
///
/// Stored as its numeric code. `Other` is meant for codes that are neither
/// pending (0) nor active (1); `Other(0)` and `Other(1)` compare equal to
/// `Pending` and `Active` and are treated as them everywhere.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum RepositoryStatus {
    Pending,
    Active,
    Other(u32),
}

impl RepositoryStatus {
    /// The ledger status code.
    pub fn code(self) -> u32 {
        match self {
            RepositoryStatus::Pending => 0,
            RepositoryStatus::Active => 1,
            RepositoryStatus::Other(code) => code,
        }
    }

    /// The status its code decodes to: `Other(0)` becomes `Pending` and
    /// `Other(1)` becomes `Active`.
    pub fn canonical(self) -> Self {
        Self::from(self.code())
    }
}

impl PartialEq for RepositoryStatus {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for RepositoryStatus {}

impl std::hash::Hash for RepositoryStatus {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::hash::Hash::hash(&self.code(), state);
    }
}

impl From<u32> for RepositoryStatus {
    fn from(code: u32) -> Self {
        match code {
            0 => RepositoryStatus::Pending,
            1 => RepositoryStatus::Active,
            other => RepositoryStatus::Other(other),
        }
    }
}

impl From<RepositoryStatus> for u32 {
    fn from(status: RepositoryStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.canonical() {
            RepositoryStatus::Pending => write!(f, "pending"),
            RepositoryStatus::Active => write!(f, "active"),
            RepositoryStatus::Other(code) => write!(f, "status({})", code),
        }
    }
}

impl FromStr for RepositoryStatus {
    type Err = String;

    /// Accepts `pending`, `active` or a numeric status code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(RepositoryStatus::Pending),
            "active" => Ok(RepositoryStatus::Active),
            other => other
                .parse::<u32>()
                .map(RepositoryStatus::from)
                .map_err(|_| format!("unknown repository status: {}", s)),
        }
    }
}

/// Error parsing a [`Hash`] from its hex form.
#[derive(Debug, Error)]
pub enum HashParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("expected {expected} bytes, got {found}")]
    InvalidLength { expected: usize, found: usize },
}

/// A 32-byte content identifier.
///
/// [`Hash::EMPTY`] (all zeros) means "unset" and never names real content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; Hash::LEN]);

impl Hash {
    pub const LEN: usize = 32;

    /// The "unset" sentinel.
    pub const EMPTY: Hash = Hash([0; Hash::LEN]);

    pub const fn new(bytes: [u8; Hash::LEN]) -> Self {
        Self(bytes)
    }

    /// Build a hash from raw bytes, which must be exactly 32 long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashParseError> {
        let array: [u8; Hash::LEN] = bytes.try_into().map_err(|_| HashParseError::InvalidLength {
            expected: Hash::LEN,
            found: bytes.len(),
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; Hash::LEN] {
        &self.0
    }

    /// True for the "unset" sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Hash::EMPTY
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Hash::from_slice(&bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Metadata about one repository tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub status: RepositoryStatus,
    /// ledger transaction that allocated the name
    pub name_allocation_tx: Hash,
}

impl Repository {
    pub fn new(name: impl Into<String>, status: RepositoryStatus, name_allocation_tx: Hash) -> Self {
        Self {
            name: name.into(),
            status,
            name_allocation_tx,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RepositoryStatus::Pending
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] tx={}", self.name, self.status, self.name_allocation_tx)
    }
}
