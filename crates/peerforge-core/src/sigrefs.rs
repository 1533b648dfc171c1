//! Signed ref manifests ("sigrefs").
//!
//! A [`Manifest`] is a sequenced snapshot of every ref in one identity's
//! namespace. The owner signs its canonical encoding; the resulting
//! [`SignedManifest`] is what peers exchange.
//!
//! ## Wire format
//!
//! ```text
//! canonical_cbor(manifest) || signature (64 bytes)
//! ```
//!
//! The manifest map uses integer keys:
//!
//! | key | field    | type                          |
//! |-----|----------|-------------------------------|
//! | 0   | repo     | bytes(32)                     |
//! | 1   | identity | bytes(32)                     |
//! | 2   | sequence | uint                          |
//! | 3   | refs     | map(text ref name => bytes(20)) |
//!
//! `refs/rad/sigrefs` never appears in the ref set; its value is the
//! [`SignedManifest::sigrefs_oid`] of the encoded manifest.

use std::collections::BTreeMap;

use ciborium::value::Value;

use crate::canonical::{self, entry, Fields};
use crate::crypto::{Keypair, PeerId, Signature};
use crate::error::CoreError;
use crate::refs::{BranchName, RefName};
use crate::types::{Oid, RepoId};

mod keys {
    pub const REPO: u64 = 0;
    pub const IDENTITY: u64 = 1;
    pub const SEQUENCE: u64 = 2;
    pub const REFS: u64 = 3;
}

/// Length of the trailing signature in the wire format.
pub const SIGNATURE_LEN: usize = 64;

/// Upper bound on the number of refs a single manifest may carry.
pub const MAX_REFS: usize = 4096;

/// The unsigned content of a signed ref manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub repo: RepoId,
    pub identity: PeerId,
    /// Strictly increasing per identity.
    pub sequence: u64,
    pub refs: BTreeMap<RefName, Oid>,
}

impl Manifest {
    pub fn new(repo: RepoId, identity: PeerId, sequence: u64) -> Self {
        Self {
            repo,
            identity,
            sequence,
            refs: BTreeMap::new(),
        }
    }

    /// Builder-style ref insertion.
    pub fn with_ref(mut self, name: RefName, oid: Oid) -> Self {
        self.refs.insert(name, oid);
        self
    }

    /// Check the ref set against the namespace layout.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.refs.contains_key(&RefName::RadSigrefs) {
            return Err(CoreError::MalformedManifest(
                "refs/rad/sigrefs cannot be listed in its own manifest".into(),
            ));
        }
        if self.refs.len() > MAX_REFS {
            return Err(CoreError::MalformedManifest(format!(
                "{} refs exceeds the limit of {MAX_REFS}",
                self.refs.len()
            )));
        }
        Ok(())
    }

    fn to_value(&self) -> Value {
        let refs = self
            .refs
            .iter()
            .map(|(name, oid)| (canonical::text(&name.to_string()), canonical::bytes(&oid.0)))
            .collect();

        Value::Map(vec![
            entry(keys::REPO, canonical::bytes(&self.repo.0)),
            entry(keys::IDENTITY, canonical::bytes(&self.identity.0)),
            entry(keys::SEQUENCE, canonical::uint(self.sequence)),
            entry(keys::REFS, Value::Map(refs)),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, CoreError> {
        let fields = Fields::new(value, "manifest")?;

        let mut refs = BTreeMap::new();
        for (k, v) in fields.map(keys::REFS, "refs")? {
            let name = match k {
                Value::Text(s) => RefName::parse(s)
                    .map_err(|e| CoreError::MalformedManifest(e.to_string()))?,
                _ => return Err(CoreError::MalformedManifest("ref name must be text".into())),
            };
            let oid = match v {
                Value::Bytes(b) => Oid::try_from(b.as_slice())
                    .map_err(|e| CoreError::MalformedManifest(e.to_string()))?,
                _ => return Err(CoreError::MalformedManifest("ref target must be bytes".into())),
            };
            refs.insert(name, oid);
        }

        let manifest = Self {
            repo: RepoId(fields.bytes(keys::REPO, "repo")?),
            identity: PeerId(fields.bytes(keys::IDENTITY, "identity")?),
            sequence: fields.uint(keys::SEQUENCE, "sequence")?,
            refs,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// The bytes covered by the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        self.validate()?;
        canonical::encode(&self.to_value())
    }

    /// Sign with the namespace owner's key.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedManifest, CoreError> {
        if keypair.peer_id() != self.identity {
            return Err(CoreError::InvalidIdentity(format!(
                "key {} does not own namespace {}",
                keypair.peer_id(),
                self.identity
            )));
        }
        let signature = keypair.sign(&self.signing_bytes()?);
        Ok(SignedManifest {
            manifest: self,
            signature,
        })
    }

    pub fn head(&self, branch: &str) -> Option<Oid> {
        let name = RefName::head(branch).ok()?;
        self.refs.get(&name).copied()
    }

    /// Branch heads in name order.
    pub fn heads(&self) -> impl Iterator<Item = (&BranchName, Oid)> {
        self.refs.iter().filter_map(|(name, oid)| match name {
            RefName::Head(branch) => Some((branch, *oid)),
            _ => None,
        })
    }

    /// The identity attestation document (`refs/rad/id`).
    pub fn identity_doc(&self) -> Option<Oid> {
        self.refs.get(&RefName::RadId).copied()
    }

    /// `(patch id, tip change)` pairs.
    pub fn patches(&self) -> impl Iterator<Item = (Oid, Oid)> + '_ {
        self.refs.iter().filter_map(|(name, oid)| match name {
            RefName::Patch(id) => Some((*id, *oid)),
            _ => None,
        })
    }

    pub fn patch(&self, id: &Oid) -> Option<Oid> {
        self.refs.get(&RefName::Patch(*id)).copied()
    }
}

/// A manifest together with its owner's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedManifest {
    pub manifest: Manifest,
    pub signature: Signature,
}

impl SignedManifest {
    pub fn sequence(&self) -> u64 {
        self.manifest.sequence
    }

    pub fn identity(&self) -> &PeerId {
        &self.manifest.identity
    }

    pub fn refs(&self) -> &BTreeMap<RefName, Oid> {
        &self.manifest.refs
    }

    /// Verify the signature against the manifest's own identity.
    pub fn verify(&self) -> Result<(), CoreError> {
        let message = self.manifest.signing_bytes()?;
        self.manifest.identity.verify(&message, &self.signature)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = self.manifest.signing_bytes()?;
        buf.extend_from_slice(&self.signature.0);
        Ok(buf)
    }

    /// Decode wire bytes. Does not verify the signature.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() <= SIGNATURE_LEN {
            return Err(CoreError::MalformedManifest("too short".into()));
        }
        let (body, sig) = bytes.split_at(bytes.len() - SIGNATURE_LEN);
        let value = canonical::decode(body)?;
        let manifest = Manifest::from_value(&value)?;

        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(sig);

        Ok(Self {
            manifest,
            signature: Signature(signature),
        })
    }

    /// Object id of the encoded manifest, published as `refs/rad/sigrefs`.
    pub fn sigrefs_oid(&self) -> Result<Oid, CoreError> {
        Ok(Oid::digest(&self.encode()?))
    }
}
