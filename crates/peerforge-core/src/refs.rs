//! Ref layout.
//!
//! Every identity owns a namespace with exactly this shape:
//!
//! ```text
//! <identity>/
//!   refs/
//!     heads/<branch>
//!     rad/id
//!     rad/sigrefs
//!     patches/<patchId>
//! ```
//!
//! Anything outside this layout is rejected at parse time.

use std::fmt;
use std::str::FromStr;

use crate::crypto::PeerId;
use crate::error::CoreError;
use crate::types::Oid;

const HEADS: &str = "refs/heads/";
const PATCHES: &str = "refs/patches/";
const RAD_ID: &str = "refs/rad/id";
const RAD_SIGREFS: &str = "refs/rad/sigrefs";

/// Maximum length of a branch name in bytes.
pub const MAX_BRANCH_LEN: usize = 255;

/// A validated branch name (the `<branch>` in `refs/heads/<branch>`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        check_component_path(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validate a slash-separated ref path the way the version-control engine does.
fn check_component_path(name: &str) -> Result<(), CoreError> {
    let bad = |why: &str| Err(CoreError::InvalidRefName(format!("{name:?}: {why}")));

    if name.is_empty() {
        return bad("empty");
    }
    if name.len() > MAX_BRANCH_LEN {
        return bad("too long");
    }
    if name.contains("..") || name.contains("@{") {
        return bad("forbidden sequence");
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
    {
        return bad("forbidden character");
    }
    for component in name.split('/') {
        if component.is_empty() {
            return bad("empty path component");
        }
        if component.starts_with('.') || component.ends_with(".lock") {
            return bad("invalid path component");
        }
    }
    if name.ends_with('.') {
        return bad("trailing dot");
    }
    Ok(())
}

/// Validate a single ref path component, e.g. a remote name.
pub fn check_component(name: &str) -> Result<(), CoreError> {
    if name.contains('/') {
        return Err(CoreError::InvalidRefName(format!(
            "{name:?}: must be a single component"
        )));
    }
    check_component_path(name)
}

impl fmt::Debug for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BranchName({})", self.0)
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BranchName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A ref inside one identity's namespace.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefName {
    /// `refs/heads/<branch>`
    Head(BranchName),
    /// `refs/rad/id`: the identity attestation document.
    RadId,
    /// `refs/rad/sigrefs`: the signed ref manifest itself.
    RadSigrefs,
    /// `refs/patches/<patchId>`: this identity's tip of a patch's history.
    Patch(Oid),
}

impl RefName {
    pub fn head(branch: &str) -> Result<Self, CoreError> {
        Ok(Self::Head(BranchName::new(branch)?))
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if let Some(branch) = s.strip_prefix(HEADS) {
            return Ok(Self::Head(BranchName::new(branch)?));
        }
        if let Some(id) = s.strip_prefix(PATCHES) {
            return Oid::from_hex(id)
                .map(Self::Patch)
                .map_err(|_| CoreError::InvalidRefName(format!("{s:?}: bad patch id")));
        }
        match s {
            RAD_ID => Ok(Self::RadId),
            RAD_SIGREFS => Ok(Self::RadSigrefs),
            _ => Err(CoreError::InvalidRefName(format!("{s:?}: outside ref layout"))),
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Self::RadId | Self::RadSigrefs)
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head(branch) => write!(f, "{HEADS}{branch}"),
            Self::RadId => f.write_str(RAD_ID),
            Self::RadSigrefs => f.write_str(RAD_SIGREFS),
            Self::Patch(id) => write!(f, "{PATCHES}{id}"),
        }
    }
}

impl fmt::Debug for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefName({self})")
    }
}

impl FromStr for RefName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A fully-qualified ref: `<identity>/refs/...`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespacedRef {
    pub identity: PeerId,
    pub name: RefName,
}

impl NamespacedRef {
    pub fn new(identity: PeerId, name: RefName) -> Self {
        Self { identity, name }
    }
}

impl fmt::Display for NamespacedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.identity, self.name)
    }
}

impl FromStr for NamespacedRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (identity, name) = s
            .split_once('/')
            .ok_or_else(|| CoreError::InvalidRefName(format!("{s:?}: missing namespace")))?;
        Ok(Self {
            identity: identity.parse()?,
            name: name.parse()?,
        })
    }
}
