//! Signed change records.
//!
//! Patch history lives in the object graph as a chain of signed changes. The
//! first change opens the patch and its object id becomes the patch id; each
//! later change names the change it builds on as its parent.
//!
//! ## Wire format
//!
//! ```text
//! canonical_cbor(change) || signature (64 bytes)
//! ```
//!
//! | key | field     | present for          |
//! |-----|-----------|----------------------|
//! | 0   | parent    | revise, close        |
//! | 1   | author    | all                  |
//! | 2   | timestamp | all                  |
//! | 3   | kind      | all (0 open, 1 revise, 2 close) |
//! | 4   | target    | open                 |
//! | 5   | title     | open                 |
//! | 6   | base      | open, revise         |
//! | 7   | head      | open, revise         |
//! | 8   | reason    | close                |

use ciborium::value::Value;

use peerforge_core::canonical::{self, entry, Fields};
use peerforge_core::{BranchName, CoreError, Keypair, Oid, PeerId, Signature};

mod keys {
    pub const PARENT: u64 = 0;
    pub const AUTHOR: u64 = 1;
    pub const TIMESTAMP: u64 = 2;
    pub const KIND: u64 = 3;
    pub const TARGET: u64 = 4;
    pub const TITLE: u64 = 5;
    pub const BASE: u64 = 6;
    pub const HEAD: u64 = 7;
    pub const REASON: u64 = 8;
}

mod kind {
    pub const OPEN: u64 = 0;
    pub const REVISE: u64 = 1;
    pub const CLOSE: u64 = 2;
}

/// Maximum title length in bytes.
pub const MAX_TITLE_LEN: usize = 256;

/// Maximum close reason length in bytes.
pub const MAX_REASON_LEN: usize = 1024;

const SIGNATURE_LEN: usize = 64;

/// What a change does to its patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a patch against `target` with its first revision.
    Open {
        target: BranchName,
        title: String,
        base: Oid,
        head: Oid,
    },
    /// Add a revision.
    Revise { base: Oid, head: Oid },
    /// Close the patch without merging.
    Close { reason: String },
}

/// The unsigned content of a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// `None` only for the opening change.
    pub parent: Option<Oid>,
    pub author: PeerId,
    /// Author-claimed timestamp (Unix milliseconds). Untrusted.
    pub timestamp: i64,
    pub action: Action,
}

impl Change {
    pub fn open(
        author: PeerId,
        target: BranchName,
        title: impl Into<String>,
        base: Oid,
        head: Oid,
        timestamp: i64,
    ) -> Self {
        Self {
            parent: None,
            author,
            timestamp,
            action: Action::Open {
                target,
                title: title.into(),
                base,
                head,
            },
        }
    }

    pub fn revise(parent: Oid, author: PeerId, base: Oid, head: Oid, timestamp: i64) -> Self {
        Self {
            parent: Some(parent),
            author,
            timestamp,
            action: Action::Revise { base, head },
        }
    }

    pub fn close(parent: Oid, author: PeerId, reason: impl Into<String>, timestamp: i64) -> Self {
        Self {
            parent: Some(parent),
            author,
            timestamp,
            action: Action::Close {
                reason: reason.into(),
            },
        }
    }

    /// The `(base, head)` pair if this change introduces a revision.
    pub fn revision(&self) -> Option<(Oid, Oid)> {
        match &self.action {
            Action::Open { base, head, .. } | Action::Revise { base, head } => Some((*base, *head)),
            Action::Close { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let malformed = |why: &str| Err(CoreError::MalformedManifest(format!("change: {why}")));
        match (&self.action, self.parent) {
            (Action::Open { .. }, Some(_)) => malformed("open change cannot have a parent"),
            (Action::Revise { .. } | Action::Close { .. }, None) => {
                malformed("only the open change may omit its parent")
            }
            (Action::Open { title, .. }, _) if title.len() > MAX_TITLE_LEN => {
                malformed("title too long")
            }
            (Action::Close { reason }, _) if reason.len() > MAX_REASON_LEN => {
                malformed("reason too long")
            }
            _ => Ok(()),
        }
    }

    fn to_value(&self) -> Value {
        let mut entries = Vec::with_capacity(6);
        if let Some(parent) = &self.parent {
            entries.push(entry(keys::PARENT, canonical::bytes(&parent.0)));
        }
        entries.push(entry(keys::AUTHOR, canonical::bytes(&self.author.0)));
        entries.push(entry(keys::TIMESTAMP, canonical::int(self.timestamp)));

        match &self.action {
            Action::Open {
                target,
                title,
                base,
                head,
            } => {
                entries.push(entry(keys::KIND, canonical::uint(kind::OPEN)));
                entries.push(entry(keys::TARGET, canonical::text(target.as_str())));
                entries.push(entry(keys::TITLE, canonical::text(title)));
                entries.push(entry(keys::BASE, canonical::bytes(&base.0)));
                entries.push(entry(keys::HEAD, canonical::bytes(&head.0)));
            }
            Action::Revise { base, head } => {
                entries.push(entry(keys::KIND, canonical::uint(kind::REVISE)));
                entries.push(entry(keys::BASE, canonical::bytes(&base.0)));
                entries.push(entry(keys::HEAD, canonical::bytes(&head.0)));
            }
            Action::Close { reason } => {
                entries.push(entry(keys::KIND, canonical::uint(kind::CLOSE)));
                entries.push(entry(keys::REASON, canonical::text(reason)));
            }
        }
        Value::Map(entries)
    }

    fn from_value(value: &Value) -> Result<Self, CoreError> {
        let fields = Fields::new(value, "change")?;

        let action = match fields.uint(keys::KIND, "kind")? {
            kind::OPEN => Action::Open {
                target: BranchName::new(fields.text(keys::TARGET, "target")?)?,
                title: fields.text(keys::TITLE, "title")?.to_string(),
                base: Oid(fields.bytes(keys::BASE, "base")?),
                head: Oid(fields.bytes(keys::HEAD, "head")?),
            },
            kind::REVISE => Action::Revise {
                base: Oid(fields.bytes(keys::BASE, "base")?),
                head: Oid(fields.bytes(keys::HEAD, "head")?),
            },
            kind::CLOSE => Action::Close {
                reason: fields.text(keys::REASON, "reason")?.to_string(),
            },
            other => {
                return Err(CoreError::MalformedManifest(format!(
                    "change: unknown kind {other}"
                )))
            }
        };

        let change = Self {
            parent: fields.opt_bytes(keys::PARENT, "parent")?.map(Oid),
            author: PeerId(fields.bytes(keys::AUTHOR, "author")?),
            timestamp: fields.int(keys::TIMESTAMP, "timestamp")?,
            action,
        };
        change.validate()?;
        Ok(change)
    }

    /// The bytes covered by the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        self.validate()?;
        canonical::encode(&self.to_value())
    }

    /// Sign as the change's author.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedChange, CoreError> {
        if keypair.peer_id() != self.author {
            return Err(CoreError::InvalidIdentity(format!(
                "key {} cannot sign for {}",
                keypair.peer_id(),
                self.author
            )));
        }
        let signature = keypair.sign(&self.signing_bytes()?);
        Ok(SignedChange {
            change: self,
            signature,
        })
    }
}

/// A change together with its author's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChange {
    pub change: Change,
    pub signature: Signature,
}

impl SignedChange {
    pub fn verify(&self) -> Result<(), CoreError> {
        let message = self.change.signing_bytes()?;
        self.change.author.verify(&message, &self.signature)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = self.change.signing_bytes()?;
        buf.extend_from_slice(&self.signature.0);
        Ok(buf)
    }

    /// Decode wire bytes. Does not verify the signature.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() <= SIGNATURE_LEN {
            return Err(CoreError::MalformedManifest("change: too short".into()));
        }
        let (body, sig) = bytes.split_at(bytes.len() - SIGNATURE_LEN);
        let change = Change::from_value(&canonical::decode(body)?)?;

        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(sig);
        Ok(Self {
            change,
            signature: Signature(signature),
        })
    }

    /// The content-derived object id of this change.
    pub fn oid(&self) -> Result<Oid, CoreError> {
        Ok(Oid::digest(&self.encode()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> Oid {
        Oid::from_bytes([byte; 20])
    }

    fn open(keypair: &Keypair) -> SignedChange {
        Change::open(
            keypair.peer_id(),
            BranchName::new("main").unwrap(),
            "Add a README",
            oid(1),
            oid(2),
            1_700_000_000_000,
        )
        .sign(keypair)
        .unwrap()
    }

    #[test]
    fn test_sign_encode_decode() {
        let keypair = Keypair::from_seed(&[3; 32]);
        let signed = open(&keypair);
        let decoded = SignedChange::decode(&signed.encode().unwrap()).unwrap();

        assert_eq!(decoded, signed);
        decoded.verify().unwrap();
        assert_eq!(decoded.oid().unwrap(), signed.oid().unwrap());
        assert_eq!(decoded.change.revision(), Some((oid(1), oid(2))));
    }

    #[test]
    fn test_close_has_no_revision() {
        let keypair = Keypair::from_seed(&[3; 32]);
        let root = open(&keypair).oid().unwrap();
        let close = Change::close(root, keypair.peer_id(), "superseded", 0)
            .sign(&keypair)
            .unwrap();

        assert_eq!(close.change.revision(), None);
        let decoded = SignedChange::decode(&close.encode().unwrap()).unwrap();
        assert_eq!(decoded.change.parent, Some(root));
    }

    #[test]
    fn test_parent_rules() {
        let keypair = Keypair::from_seed(&[3; 32]);
        let mut orphan = Change::revise(oid(9), keypair.peer_id(), oid(1), oid(2), 0);
        orphan.parent = None;
        assert!(orphan.sign(&keypair).is_err());

        let mut rooted = open(&keypair).change;
        rooted.parent = Some(oid(9));
        assert!(rooted.sign(&keypair).is_err());
    }

    #[test]
    fn test_forged_author_fails() {
        let alice = Keypair::from_seed(&[1; 32]);
        let mallory = Keypair::from_seed(&[2; 32]);

        let mut signed = open(&alice);
        assert!(signed.clone().change.sign(&mallory).is_err());

        signed.change.author = mallory.peer_id();
        assert!(signed.verify().is_err());
    }

    #[test]
    fn test_oid_depends_on_content() {
        let keypair = Keypair::from_seed(&[3; 32]);
        let a = open(&keypair);
        let mut b = a.change.clone();
        b.timestamp += 1;
        assert_ne!(a.oid().unwrap(), b.sign(&keypair).unwrap().oid().unwrap());
    }
}
