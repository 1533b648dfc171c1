//! Patch and revision types.

use std::fmt;

use peerforge_core::{BranchName, Oid, PeerId};

/// Lifecycle state of a patch.
///
/// `Merged` and `Closed` are terminal: nothing moves a patch out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Proposed,
    Updated,
    Merged,
    Closed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Closed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Proposed => "proposed",
            Self::Updated => "updated",
            Self::Merged => "merged",
            Self::Closed => "closed",
        })
    }
}

/// One proposed update within a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Object id of the change that introduced this revision.
    pub id: Oid,
    pub base: Oid,
    pub head: Oid,
    pub author: PeerId,
    /// The change this revision builds on; `None` for the first revision.
    pub parent: Option<Oid>,
    pub timestamp: i64,
}

/// How a patch reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// `revision`'s head is contained in `into`'s target branch.
    Merged { revision: Oid, into: PeerId },
    Closed { by: PeerId, reason: String },
}

/// A patch as reconstructed from the stored namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Object id of the opening change.
    pub id: Oid,
    pub author: PeerId,
    pub target: BranchName,
    pub title: String,
    /// In causal order; concurrent revisions by ascending change id.
    pub revisions: Vec<Revision>,
    pub status: Status,
    pub resolution: Option<Resolution>,
    /// The last change in causal order. New changes build on it.
    pub tip: Oid,
}

impl Patch {
    /// The first revision, introduced by the opening change.
    pub fn root(&self) -> &Revision {
        &self.revisions[0]
    }

    /// The most recent revision in causal order.
    pub fn latest(&self) -> &Revision {
        &self.revisions[self.revisions.len() - 1]
    }

    pub fn revision(&self, id: &Oid) -> Option<&Revision> {
        self.revisions.iter().find(|r| r.id == *id)
    }

    /// Heads of every revision, in order.
    pub fn heads(&self) -> impl Iterator<Item = Oid> + '_ {
        self.revisions.iter().map(|r| r.head)
    }

    pub fn is_merged(&self) -> bool {
        self.status == Status::Merged
    }
}
