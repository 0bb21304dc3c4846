use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Scheme prefix of every address minted by Quill or by the keyed store.
pub const ASSET_SCHEME: &str = "asset:";

/// Prefix that marks an address as a block reference inside the host document.
///
/// Previously authored documents carry this exact string; it must never change.
pub const BLOCK_REF_PREFIX: &str = "obsidian.blockref.";

/// Identifier of a block anchor (`^id`) inside a host document.
///
/// Anchors are made of ASCII letters, digits and `-`. Freshly minted anchors
/// are hyphenated UUID v4 strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnchorId(String);

impl AnchorId {
    /// Generate a fresh random anchor.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse an anchor id, rejecting characters a block anchor cannot hold.
    pub fn parse(id: &str) -> Result<Self, TypeError> {
        if id.is_empty() {
            return Err(TypeError::InvalidAnchor {
                id: id.to_string(),
                reason: "anchor id must not be empty".into(),
            });
        }
        if let Some(ch) = id.chars().find(|c| !is_anchor_char(*c)) {
            return Err(TypeError::InvalidAnchor {
                id: id.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns `true` for characters allowed inside a block anchor.
pub fn is_anchor_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

impl fmt::Debug for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnchorId({})", self.0)
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AnchorId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AnchorId> for String {
    fn from(id: AnchorId) -> Self {
        id.0
    }
}

/// Where the bytes behind an asset live.
///
/// The variant is decided once, from the string prefix, at the point an
/// address enters the system.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    /// A reference block embedded in the owning document.
    BlockRef(AnchorId),
    /// An entry in the keyed blob store. Holds the address body without the
    /// `asset:` scheme.
    Store(String),
}

impl Address {
    /// Parse the body of an `asset:` address (the part after the scheme).
    ///
    /// Bodies carrying the block-ref prefix must name a valid anchor; every
    /// other non-empty body is an opaque store key.
    pub fn from_body(body: &str) -> Result<Self, TypeError> {
        if body.is_empty() {
            return Err(TypeError::NotAnAddress(body.to_string()));
        }
        match body.strip_prefix(BLOCK_REF_PREFIX) {
            Some(anchor) => Ok(Self::BlockRef(AnchorId::parse(anchor)?)),
            None => Ok(Self::Store(body.to_string())),
        }
    }

    /// Parse a full wire address (`asset:...`).
    pub fn from_wire(src: &str) -> Result<Self, TypeError> {
        let body = src
            .strip_prefix(ASSET_SCHEME)
            .ok_or_else(|| TypeError::NotAnAddress(src.to_string()))?;
        Self::from_body(body)
    }

    /// The address body without the `asset:` scheme.
    pub fn body(&self) -> String {
        match self {
            Self::BlockRef(anchor) => format!("{BLOCK_REF_PREFIX}{anchor}"),
            Self::Store(key) => key.clone(),
        }
    }

    /// The full wire form, as persisted in documents and drawings.
    pub fn to_wire(&self) -> String {
        format!("{ASSET_SCHEME}{}", self.body())
    }

    /// Key under which the keyed blob store holds this address.
    ///
    /// External writers key the store by the full `asset:` source string.
    pub fn store_key(&self) -> String {
        self.to_wire()
    }

    pub fn is_block_ref(&self) -> bool {
        matches!(self, Self::BlockRef(_))
    }

    pub fn anchor(&self) -> Option<&AnchorId> {
        match self {
            Self::BlockRef(anchor) => Some(anchor),
            Self::Store(_) => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Classification of an asset's `src` property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetSrc {
    /// No source yet (pre-upload) or an `asset:` scheme with nothing after it.
    Empty,
    /// Externally hosted asset (e.g. a remote URL); passed through unchanged.
    External(String),
    /// An address managed by Quill.
    Tagged(Address),
    /// Tagged, but the body is not a usable address (e.g. a bad anchor).
    Malformed(String),
}

impl AssetSrc {
    pub fn parse(src: &str) -> Self {
        if src.is_empty() {
            return Self::Empty;
        }
        let Some(body) = src.strip_prefix(ASSET_SCHEME) else {
            return Self::External(src.to_string());
        };
        if body.is_empty() {
            return Self::Empty;
        }
        match Address::from_body(body) {
            Ok(address) => Self::Tagged(address),
            Err(_) => Self::Malformed(src.to_string()),
        }
    }
}
