//! Decentralized identifiers.
//!
//! Every identifier has the shape `did:<root>:<sub>:<address>`. The first
//! three segments name a method (namespace); the last segment is either an
//! account address or `.` for the method itself:
//!
//! - `did:bitxhub:appchain001:.` is a method (chain) identifier.
//! - `did:bitxhub:appchain001:0x12f4` is an account identifier under it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Scheme prefix shared by every identifier.
pub const DID_SCHEME: &str = "did";

/// Address segment that marks an identifier as a method.
pub const METHOD_ADDRESS: &str = ".";

/// The well-known root registry every registry defaults its parent to.
pub const RELAY_ROOT: &str = "did:bitxhub:relayroot:.";

/// Maximum accepted identifier length in bytes.
pub const MAX_DID_LEN: usize = 256;

/// A namespaced identifier string.
///
/// Construction through [`Did::new`] is unchecked so that records read from
/// storage or from a peer round-trip as-is; use [`Did::parse`] or
/// [`Did::is_valid_format`] at trust boundaries.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Wrap a string without validating it.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse and validate an identifier.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let did = Self::new(s);
        if did.is_valid_format() {
            Ok(did)
        } else {
            Err(CoreError::InvalidDid(s.to_string()))
        }
    }

    /// The well-known relay root method.
    pub fn relay_root() -> Self {
        Self::new(RELAY_ROOT)
    }

    /// Build the method identifier `did:<root>:<sub>:.`.
    pub fn method_of(root: &str, sub: &str) -> Self {
        Self(format!("{DID_SCHEME}:{root}:{sub}:{METHOD_ADDRESS}"))
    }

    /// Build an account identifier under a method.
    ///
    /// Returns `None` if `method` is not a well-formed method identifier.
    pub fn account_of(method: &Did, address: &str) -> Option<Self> {
        if !method.is_method_form() {
            return None;
        }
        let (root, sub) = (method.root_method()?, method.sub_method()?);
        Some(Self(format!("{DID_SCHEME}:{root}:{sub}:{address}")))
    }

    /// Get the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw string.
    pub fn into_string(self) -> String {
        self.0
    }

    fn segments(&self) -> Option<[&str; 4]> {
        let mut parts = self.0.split(':');
        let segs = [parts.next()?, parts.next()?, parts.next()?, parts.next()?];
        if parts.next().is_some() {
            return None;
        }
        Some(segs)
    }

    /// Check syntactic well-formedness.
    ///
    /// Four `:`-separated segments, scheme `did`, non-empty name segments of
    /// `[A-Za-z0-9_-]`, and an address of `[A-Za-z0-9._-]`.
    pub fn is_valid_format(&self) -> bool {
        if self.0.is_empty() || self.0.len() > MAX_DID_LEN {
            return false;
        }
        let Some([scheme, root, sub, address]) = self.segments() else {
            return false;
        };
        scheme == DID_SCHEME
            && is_name_segment(root)
            && is_name_segment(sub)
            && is_address_segment(address)
    }

    /// The root method segment (`bitxhub` in `did:bitxhub:app:.`).
    pub fn root_method(&self) -> Option<&str> {
        self.segments().map(|s| s[1])
    }

    /// The sub method segment (`app` in `did:bitxhub:app:.`).
    pub fn sub_method(&self) -> Option<&str> {
        self.segments().map(|s| s[2])
    }

    /// The address segment.
    ///
    /// Callers prove control of an identifier by invoking from this address.
    pub fn address(&self) -> Option<&str> {
        self.segments().map(|s| s[3])
    }

    /// The method this identifier lives under.
    pub fn method(&self) -> Option<Did> {
        let [_, root, sub, _] = self.segments()?;
        Some(Self::method_of(root, sub))
    }

    /// Whether this is a well-formed method identifier.
    pub fn is_method_form(&self) -> bool {
        self.is_valid_format() && self.address() == Some(METHOD_ADDRESS)
    }

    /// Whether this is a well-formed account identifier.
    pub fn is_account_form(&self) -> bool {
        self.is_valid_format() && self.address() != Some(METHOD_ADDRESS)
    }

    /// Whether this identifier lives under the given method.
    pub fn belongs_to(&self, method: &Did) -> bool {
        self.method().as_ref() == Some(method)
    }

    /// Whether `address` derives this identifier.
    pub fn is_controlled_by(&self, address: &str) -> bool {
        matches!(self.address(), Some(a) if a == address && a != METHOD_ADDRESS)
    }
}

fn is_name_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn is_address_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Did({})", self.0)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Did {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Did {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Did {
    fn from(s: String) -> Self {
        Self(s)
    }
}
