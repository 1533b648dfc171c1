//! Reconstructing patches from stored namespaces.
//!
//! A patch has no stored state of its own. Every namespace may carry a
//! `refs/patches/<id>` ref pointing at the latest change it knows of; the
//! inspector walks those changes back to the opening change, orders them,
//! and replays them. Merge detection is recomputed on every inspection from
//! the current target branch heads, so fetching new refs can turn a patch
//! `Merged` without any change having been written to it.
//!
//! ## Replay rules
//!
//! - The opening change yields the first revision: `Proposed`.
//! - Each revise change appends a revision: `Updated`.
//! - A revision whose head the target branch contains makes it `Merged`.
//! - A close change from the patch author or a delegate makes it `Closed`,
//!   unless a revision it builds on is merged.
//! - Terminal states are settled causally. A change built on a close never
//!   reopens or merges the patch, and is only listed. Concurrent terminal
//!   events resolve by earliest timestamp, then replay order, so the sibling
//!   tie-break alone never decides between `Merged` and `Closed`.
//!
//! Changes are ordered topologically over their parents. Changes with the
//! same parent are ordered by ascending change id. Changes that fail their
//! signature check are ignored along with everything built on them.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, warn};

use peerforge_core::{Oid, PeerId};
use peerforge_store::Snapshot;

use crate::change::{Action, Change};
use crate::error::{PatchError, Result};
use crate::graph::ObjectGraph;
use crate::patch::{Patch, Resolution, Revision, Status};

/// Upper bound on the changes walked for one patch.
pub const MAX_CHANGES: usize = 10_000;

/// Every patch id referenced by any namespace in `snapshot`.
pub fn patch_ids(snapshot: &Snapshot) -> BTreeSet<Oid> {
    snapshot
        .iter()
        .flat_map(|(_, ns)| ns.patches().map(|(id, _)| id))
        .collect()
}

/// Reads patches out of a snapshot with the help of the object graph.
pub struct Inspector<'a, G: ObjectGraph + ?Sized> {
    graph: &'a G,
    delegates: &'a BTreeSet<PeerId>,
}

impl<'a, G: ObjectGraph + ?Sized> Inspector<'a, G> {
    /// `delegates` may close any patch, and their target branches count for
    /// merge detection alongside the patch author's.
    pub fn new(graph: &'a G, delegates: &'a BTreeSet<PeerId>) -> Self {
        Self { graph, delegates }
    }

    /// Reconstruct patch `id`.
    ///
    /// Returns `None` if no namespace references the patch, or if its opening
    /// change is not in the object graph yet.
    pub fn inspect(&self, snapshot: &Snapshot, id: &Oid) -> Result<Option<Patch>> {
        let tips: BTreeSet<Oid> = snapshot.iter().filter_map(|(_, ns)| ns.patch(id)).collect();
        if tips.is_empty() {
            return Ok(None);
        }

        let changes = self.collect(id, &tips)?;
        let Some(root) = changes.get(id) else {
            debug!(patch = %id.short(), "opening change not available");
            return Ok(None);
        };
        let Action::Open {
            target,
            title,
            base,
            head,
        } = &root.action
        else {
            return Err(PatchError::InvalidRoot(*id));
        };

        let mut patch = Patch {
            id: *id,
            author: root.author,
            target: target.clone(),
            title: title.clone(),
            revisions: vec![Revision {
                id: *id,
                base: *base,
                head: *head,
                author: root.author,
                parent: None,
                timestamp: root.timestamp,
            }],
            status: Status::Proposed,
            resolution: None,
            tip: *id,
        };
        let order = order(id, &changes);
        let mut closes = BTreeSet::new();
        for oid in order.iter().skip(1) {
            let change = &changes[oid];
            patch.tip = *oid;
            match &change.action {
                Action::Open { .. } => {
                    debug!(patch = %id.short(), change = %oid.short(), "ignoring nested open change");
                }
                Action::Revise { base, head } => {
                    patch.revisions.push(Revision {
                        id: *oid,
                        base: *base,
                        head: *head,
                        author: change.author,
                        parent: change.parent,
                        timestamp: change.timestamp,
                    });
                }
                Action::Close { .. } => {
                    if change.author == patch.author || self.delegates.contains(&change.author) {
                        closes.insert(*oid);
                    } else {
                        debug!(patch = %id.short(), by = %change.author.short(), "ignoring unauthorized close");
                    }
                }
            }
        }

        let tips = self.target_tips(snapshot, &patch);
        let mut merged = BTreeMap::new();
        for revision in &patch.revisions {
            if let Some(into) = self.merged_into(revision, &tips)? {
                merged.insert(revision.id, into);
            }
        }

        match settle(&order, &changes, &closes, &merged) {
            None => {
                if patch.revisions.len() > 1 {
                    patch.status = Status::Updated;
                }
            }
            Some(Terminal::Closed(oid)) => {
                let change = &changes[&oid];
                let reason = match &change.action {
                    Action::Close { reason } => reason.clone(),
                    _ => String::new(),
                };
                patch.status = Status::Closed;
                patch.resolution = Some(Resolution::Closed {
                    by: change.author,
                    reason,
                });
            }
            Some(Terminal::Merged(revision)) => {
                patch.status = Status::Merged;
                patch.resolution = merged.get(&revision).map(|into| Resolution::Merged {
                    revision,
                    into: *into,
                });
            }
        }
        Ok(Some(patch))
    }

    /// Every visible patch, by id. Patches that fail to reconstruct are
    /// logged and left out.
    pub fn list(&self, snapshot: &Snapshot) -> Vec<Patch> {
        patch_ids(snapshot)
            .iter()
            .filter_map(|id| match self.inspect(snapshot, id) {
                Ok(patch) => patch,
                Err(e) => {
                    warn!(patch = %id.short(), "skipping patch: {e}");
                    None
                }
            })
            .collect()
    }

    /// Walk from every tip back towards `root`, keeping verified changes.
    fn collect(&self, root: &Oid, tips: &BTreeSet<Oid>) -> Result<BTreeMap<Oid, Change>> {
        let mut changes = BTreeMap::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<Oid> = tips.iter().copied().collect();

        while let Some(oid) = stack.pop() {
            if !seen.insert(oid) {
                continue;
            }
            if seen.len() > MAX_CHANGES {
                return Err(PatchError::TooManyChanges {
                    id: *root,
                    limit: MAX_CHANGES,
                });
            }

            let Some(signed) = self.graph.change(&oid)? else {
                debug!(change = %oid.short(), "change not in object graph");
                continue;
            };
            if signed.oid().ok() != Some(oid) {
                warn!(change = %oid.short(), "object graph returned a different change");
                continue;
            }
            if let Err(e) = signed.verify() {
                warn!(change = %oid.short(), author = %signed.change.author.short(), "ignoring change: {e}");
                continue;
            }

            if oid != *root {
                if let Some(parent) = signed.change.parent {
                    stack.push(parent);
                }
            }
            changes.insert(oid, signed.change);
        }
        Ok(changes)
    }

    /// Heads of the target branch in the author's and every delegate's
    /// namespace.
    fn target_tips(&self, snapshot: &Snapshot, patch: &Patch) -> Vec<(PeerId, Oid)> {
        std::iter::once(&patch.author)
            .chain(self.delegates.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|peer| {
                snapshot
                    .get(peer)
                    .and_then(|ns| ns.head(patch.target.as_str()))
                    .map(|tip| (*peer, tip))
            })
            .collect()
    }

    /// The first target tip containing `revision`'s head.
    fn merged_into(&self, revision: &Revision, tips: &[(PeerId, Oid)]) -> Result<Option<PeerId>> {
        for (peer, tip) in tips {
            if self.graph.is_ancestor(&revision.head, tip)? {
                return Ok(Some(*peer));
            }
        }
        Ok(None)
    }
}

/// A terminal event found while settling a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Merged(Oid),
    Closed(Oid),
}

/// Decide the terminal state, if any.
///
/// A close or merge only counts if no honoured close precedes it
/// causally; a close with a merged revision among its ancestors yields to
/// that merge. Surviving events are concurrent with one another, and the
/// one with the earliest timestamp wins, then the earliest in replay
/// order. A merge resolves to the latest surviving merged revision.
fn settle(
    order: &[Oid],
    changes: &BTreeMap<Oid, Change>,
    closes: &BTreeSet<Oid>,
    merged: &BTreeMap<Oid, PeerId>,
) -> Option<Terminal> {
    let mut first: Option<(i64, usize, Terminal)> = None;
    let mut latest_merge = None;

    for (position, oid) in order.iter().enumerate() {
        let is_merge = merged.contains_key(oid);
        let is_close = closes.contains(oid);
        if !is_merge && !is_close {
            continue;
        }
        let earlier: Vec<Oid> = ancestors(changes, oid).collect();
        if earlier.iter().any(|a| closes.contains(a)) {
            continue;
        }
        let event = if is_merge {
            latest_merge = Some(*oid);
            Terminal::Merged(*oid)
        } else if earlier.iter().any(|a| merged.contains_key(a)) {
            continue;
        } else {
            Terminal::Closed(*oid)
        };

        let key = (changes[oid].timestamp, position);
        if first.as_ref().map_or(true, |(ts, pos, _)| key < (*ts, *pos)) {
            first = Some((key.0, key.1, event));
        }
    }

    match first? {
        (_, _, Terminal::Merged(_)) => latest_merge.map(Terminal::Merged),
        (_, _, closed) => Some(closed),
    }
}

/// Causal ancestors of `oid`, nearest first.
fn ancestors<'a>(changes: &'a BTreeMap<Oid, Change>, oid: &Oid) -> impl Iterator<Item = Oid> + 'a {
    let first = changes.get(oid).and_then(|c| c.parent);
    std::iter::successors(first, move |p| changes.get(p).and_then(|c| c.parent)).take(MAX_CHANGES)
}

/// Topological order from `root`, smallest change id first among siblings.
fn order(root: &Oid, changes: &BTreeMap<Oid, Change>) -> Vec<Oid> {
    let mut children: BTreeMap<Oid, Vec<Oid>> = BTreeMap::new();
    for (oid, change) in changes {
        if let Some(parent) = change.parent {
            if oid != root {
                children.entry(parent).or_default().push(*oid);
            }
        }
    }

    let mut ready = BTreeSet::from([*root]);
    let mut order = Vec::with_capacity(changes.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        if let Some(kids) = children.get(&next) {
            ready.extend(kids.iter().copied());
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::SignedChange;
    use crate::graph::MemoryGraph;
    use peerforge_core::{BranchName, Keypair, Manifest, RefName, RepoId};
    use peerforge_store::Namespace;
    use std::sync::Arc;

    fn oid(byte: u8) -> Oid {
        Oid::from_bytes([byte; 20])
    }

    fn repo() -> RepoId {
        RepoId::derive(b"inspect")
    }

    fn namespace(keypair: &Keypair, refs: &[(RefName, Oid)]) -> (PeerId, Arc<Namespace>) {
        let mut manifest = Manifest::new(repo(), keypair.peer_id(), 1);
        for (name, target) in refs {
            manifest = manifest.with_ref(name.clone(), *target);
        }
        let signed = manifest.sign(keypair).unwrap();
        (keypair.peer_id(), Arc::new(Namespace::new(signed, 0).unwrap()))
    }

    fn snapshot(namespaces: Vec<(PeerId, Arc<Namespace>)>) -> Snapshot {
        Snapshot::new(repo(), namespaces.into_iter().collect())
    }

    fn store(graph: &MemoryGraph, change: Change, keypair: &Keypair) -> Oid {
        graph.insert_change(change.sign(keypair).unwrap()).unwrap()
    }

    /// base(1) <- r1(2) <- r2(3) <- later(4)
    fn history() -> MemoryGraph {
        let graph = MemoryGraph::new();
        graph.add_commit(oid(1), &[]);
        graph.add_commit(oid(2), &[oid(1)]);
        graph.add_commit(oid(3), &[oid(2)]);
        graph.add_commit(oid(4), &[oid(3)]);
        graph
    }

    fn open(graph: &MemoryGraph, author: &Keypair) -> Oid {
        let change = Change::open(
            author.peer_id(),
            BranchName::new("main").unwrap(),
            "Improve docs",
            oid(1),
            oid(2),
            10,
        );
        store(graph, change, author)
    }

    fn main_at(tip: Oid) -> (RefName, Oid) {
        (RefName::head("main").unwrap(), tip)
    }

    #[test]
    fn test_proposed_then_updated() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let id = open(&graph, &alice);
        let none = BTreeSet::new();
        let inspector = Inspector::new(&graph, &none);

        let snap = snapshot(vec![namespace(&alice, &[main_at(oid(1)), (RefName::Patch(id), id)])]);
        let patch = inspector.inspect(&snap, &id).unwrap().unwrap();
        assert_eq!(patch.status, Status::Proposed);
        assert_eq!(patch.revisions.len(), 1);
        assert_eq!(patch.title, "Improve docs");
        assert_eq!(patch.root().head, oid(2));

        let r2 = store(&graph, Change::revise(id, alice.peer_id(), oid(1), oid(3), 20), &alice);
        let snap = snapshot(vec![namespace(&alice, &[main_at(oid(1)), (RefName::Patch(id), r2)])]);
        let patch = inspector.inspect(&snap, &id).unwrap().unwrap();
        assert_eq!(patch.status, Status::Updated);
        assert_eq!(patch.heads().collect::<Vec<_>>(), vec![oid(2), oid(3)]);
        assert_eq!(patch.latest().id, r2);
        assert_eq!(patch.latest().parent, Some(id));
        assert_eq!(patch.tip, r2);
    }

    #[test]
    fn test_merge_is_derived_from_target() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let id = open(&graph, &alice);
        let r2 = store(&graph, Change::revise(id, alice.peer_id(), oid(1), oid(3), 20), &alice);
        let none = BTreeSet::new();
        let inspector = Inspector::new(&graph, &none);

        let snap = snapshot(vec![namespace(&alice, &[main_at(oid(4)), (RefName::Patch(id), r2)])]);
        let patch = inspector.inspect(&snap, &id).unwrap().unwrap();
        assert_eq!(patch.status, Status::Merged);
        assert_eq!(
            patch.resolution,
            Some(Resolution::Merged {
                revision: r2,
                into: alice.peer_id()
            })
        );
    }

    #[test]
    fn test_delegate_target_counts() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let maintainer = Keypair::from_seed(&[2; 32]);
        let id = open(&graph, &alice);

        let snap = snapshot(vec![
            namespace(&alice, &[main_at(oid(1)), (RefName::Patch(id), id)]),
            namespace(&maintainer, &[main_at(oid(2))]),
        ]);

        let none = BTreeSet::new();
        let patch = Inspector::new(&graph, &none).inspect(&snap, &id).unwrap().unwrap();
        assert_eq!(patch.status, Status::Proposed);

        let delegates = BTreeSet::from([maintainer.peer_id()]);
        let patch = Inspector::new(&graph, &delegates)
            .inspect(&snap, &id)
            .unwrap()
            .unwrap();
        assert_eq!(patch.status, Status::Merged);
    }

    #[test]
    fn test_concurrent_revisions_order_by_change_id() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let id = open(&graph, &alice);
        let a = store(&graph, Change::revise(id, alice.peer_id(), oid(1), oid(3), 20), &alice);
        let b = store(&graph, Change::revise(id, bob.peer_id(), oid(1), oid(4), 20), &bob);

        let snap = snapshot(vec![
            namespace(&alice, &[(RefName::Patch(id), a)]),
            namespace(&bob, &[(RefName::Patch(id), b)]),
        ]);
        let none = BTreeSet::new();
        let patch = Inspector::new(&graph, &none).inspect(&snap, &id).unwrap().unwrap();

        let ids: Vec<Oid> = patch.revisions.iter().map(|r| r.id).collect();
        assert_eq!(ids[0], id);
        assert_eq!(&ids[1..], &[a.min(b), a.max(b)]);
    }

    #[test]
    fn test_close_authorization() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let stranger = Keypair::from_seed(&[3; 32]);
        let delegate = Keypair::from_seed(&[4; 32]);
        let id = open(&graph, &alice);

        let rogue = store(&graph, Change::close(id, stranger.peer_id(), "spam", 30), &stranger);
        let snap = snapshot(vec![
            namespace(&alice, &[(RefName::Patch(id), id)]),
            namespace(&stranger, &[(RefName::Patch(id), rogue)]),
        ]);
        let none = BTreeSet::new();
        let patch = Inspector::new(&graph, &none).inspect(&snap, &id).unwrap().unwrap();
        assert_eq!(patch.status, Status::Proposed);

        let closed = store(&graph, Change::close(id, delegate.peer_id(), "duplicate", 30), &delegate);
        let snap = snapshot(vec![
            namespace(&alice, &[(RefName::Patch(id), id)]),
            namespace(&delegate, &[(RefName::Patch(id), closed)]),
        ]);
        let delegates = BTreeSet::from([delegate.peer_id()]);
        let patch = Inspector::new(&graph, &delegates)
            .inspect(&snap, &id)
            .unwrap()
            .unwrap();
        assert_eq!(patch.status, Status::Closed);
        assert_eq!(
            patch.resolution,
            Some(Resolution::Closed {
                by: delegate.peer_id(),
                reason: "duplicate".into()
            })
        );
    }

    #[test]
    fn test_terminal_states_do_not_regress() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let none = BTreeSet::new();
        let inspector = Inspector::new(&graph, &none);

        // Closed, then a late revision built on the close whose head the
        // target already contains.
        graph.add_commit(oid(5), &[oid(1)]);
        let id = open(&graph, &alice);
        let close = store(&graph, Change::close(id, alice.peer_id(), "stale", 30), &alice);
        let late = store(&graph, Change::revise(close, bob.peer_id(), oid(1), oid(5), 40), &bob);
        let snap = snapshot(vec![
            namespace(&alice, &[main_at(oid(5)), (RefName::Patch(id), close)]),
            namespace(&bob, &[(RefName::Patch(id), late)]),
        ]);
        let patch = inspector.inspect(&snap, &id).unwrap().unwrap();
        assert_eq!(patch.status, Status::Closed);
        assert_eq!(patch.revisions.len(), 2);

        // Merged, then older-looking revisions injected by another peer.
        let other = store(
            &graph,
            Change::open(
                alice.peer_id(),
                BranchName::new("main").unwrap(),
                "Second",
                oid(1),
                oid(2),
                50,
            ),
            &alice,
        );
        let snap = snapshot(vec![namespace(
            &alice,
            &[main_at(oid(2)), (RefName::Patch(other), other)],
        )]);
        assert_eq!(
            inspector.inspect(&snap, &other).unwrap().unwrap().status,
            Status::Merged
        );

        let injected = store(&graph, Change::revise(other, bob.peer_id(), oid(3), oid(4), 1), &bob);
        let snap = snapshot(vec![
            namespace(&alice, &[main_at(oid(2)), (RefName::Patch(other), other)]),
            namespace(&bob, &[(RefName::Patch(other), injected)]),
        ]);
        let patch = inspector.inspect(&snap, &other).unwrap().unwrap();
        assert_eq!(patch.status, Status::Merged);
        assert_eq!(patch.revisions.len(), 2);
    }

    /// Two close changes by `author` on `parent`, one with an id below
    /// `other` and one above it.
    fn closes_around(graph: &MemoryGraph, parent: Oid, author: &Keypair, timestamp: i64, other: Oid) -> [Oid; 2] {
        let (mut below, mut above) = (None, None);
        for i in 0..256 {
            let change = Change::close(parent, author.peer_id(), format!("done {i}"), timestamp);
            let close = store(graph, change, author);
            if close < other {
                below.get_or_insert(close);
            } else {
                above.get_or_insert(close);
            }
            if let (Some(below), Some(above)) = (below, above) {
                return [below, above];
            }
        }
        panic!("no close ids found on both sides of {}", other.short());
    }

    #[test]
    fn test_close_holds_against_concurrent_merged_revision() {
        let graph = history();
        graph.add_commit(oid(5), &[oid(1)]);
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let none = BTreeSet::new();
        let inspector = Inspector::new(&graph, &none);

        let id = open(&graph, &alice);
        let late = store(&graph, Change::revise(id, bob.peer_id(), oid(1), oid(5), 40), &bob);

        for close in closes_around(&graph, id, &alice, 30, late) {
            let snap = snapshot(vec![
                namespace(&alice, &[main_at(oid(5)), (RefName::Patch(id), close)]),
                namespace(&bob, &[(RefName::Patch(id), late)]),
            ]);
            let patch = inspector.inspect(&snap, &id).unwrap().unwrap();
            assert_eq!(patch.status, Status::Closed, "close {}", close.short());
            assert_eq!(patch.revisions.len(), 2);
            assert!(matches!(
                patch.resolution,
                Some(Resolution::Closed { by, .. }) if by == alice.peer_id()
            ));
        }
    }

    #[test]
    fn test_merge_holds_against_concurrent_close() {
        let graph = history();
        graph.add_commit(oid(5), &[oid(1)]);
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let none = BTreeSet::new();
        let inspector = Inspector::new(&graph, &none);

        let id = open(&graph, &alice);
        let r2 = store(&graph, Change::revise(id, alice.peer_id(), oid(1), oid(5), 20), &alice);

        for close in closes_around(&graph, id, &alice, 30, r2) {
            // Bob carries alice's revision; alice's own ref moved to the close.
            let snap = snapshot(vec![
                namespace(&alice, &[main_at(oid(5)), (RefName::Patch(id), close)]),
                namespace(&bob, &[(RefName::Patch(id), r2)]),
            ]);
            let patch = inspector.inspect(&snap, &id).unwrap().unwrap();
            assert_eq!(patch.status, Status::Merged, "close {}", close.short());
            assert_eq!(
                patch.resolution,
                Some(Resolution::Merged {
                    revision: r2,
                    into: alice.peer_id()
                })
            );
        }
    }

    #[test]
    fn test_close_after_merged_revision_is_ignored() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let none = BTreeSet::new();
        let inspector = Inspector::new(&graph, &none);

        let id = open(&graph, &alice);
        let r2 = store(&graph, Change::revise(id, alice.peer_id(), oid(1), oid(3), 20), &alice);
        let close = store(&graph, Change::close(r2, alice.peer_id(), "oops", 5), &alice);
        let snap = snapshot(vec![namespace(
            &alice,
            &[main_at(oid(3)), (RefName::Patch(id), close)],
        )]);
        let patch = inspector.inspect(&snap, &id).unwrap().unwrap();
        assert_eq!(patch.status, Status::Merged);
        assert_eq!(patch.tip, close);
    }

    #[test]
    fn test_forged_changes_are_ignored() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let mallory = Keypair::from_seed(&[6; 32]);
        let id = open(&graph, &alice);

        let mut forged = Change::close(id, mallory.peer_id(), "gone", 30)
            .sign(&mallory)
            .unwrap();
        forged.change.author = alice.peer_id();
        let forged_id = graph.insert_change(forged).unwrap();

        let snap = snapshot(vec![
            namespace(&alice, &[(RefName::Patch(id), id)]),
            namespace(&mallory, &[(RefName::Patch(id), forged_id)]),
        ]);
        let none = BTreeSet::new();
        let patch = Inspector::new(&graph, &none).inspect(&snap, &id).unwrap().unwrap();
        assert_eq!(patch.status, Status::Proposed);
    }

    #[test]
    fn test_missing_and_invalid_roots() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let none = BTreeSet::new();
        let inspector = Inspector::new(&graph, &none);

        let unknown = oid(0xAB);
        let snap = snapshot(vec![namespace(&alice, &[(RefName::Patch(unknown), unknown)])]);
        assert!(inspector.inspect(&snap, &unknown).unwrap().is_none());
        assert!(inspector.inspect(&snap, &oid(0xCD)).unwrap().is_none());

        let revise = store(&graph, Change::revise(oid(9), alice.peer_id(), oid(1), oid(2), 0), &alice);
        let snap = snapshot(vec![namespace(&alice, &[(RefName::Patch(revise), revise)])]);
        assert!(matches!(
            inspector.inspect(&snap, &revise),
            Err(PatchError::InvalidRoot(_))
        ));
        assert!(inspector.list(&snap).is_empty());
    }

    #[test]
    fn test_list_and_ids() {
        let graph = history();
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let a = open(&graph, &alice);
        let b = open(&graph, &bob);

        let snap = snapshot(vec![
            namespace(&alice, &[(RefName::Patch(a), a), (RefName::Patch(b), b)]),
            namespace(&bob, &[(RefName::Patch(b), b)]),
        ]);
        assert_eq!(patch_ids(&snap), BTreeSet::from([a, b]));

        let none = BTreeSet::new();
        let patches = Inspector::new(&graph, &none).list(&snap);
        assert_eq!(patches.len(), 2);
        assert!(patches.windows(2).all(|w| w[0].id < w[1].id));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn concurrent_revisions_sorted(seeds in prop::collection::btree_set(10u8..200, 1..6)) {
                let graph = history();
                let alice = Keypair::from_seed(&[1; 32]);
                let id = open(&graph, &alice);

                let mut namespaces = vec![namespace(&alice, &[(RefName::Patch(id), id)])];
                let mut expected = Vec::new();
                for seed in seeds {
                    let peer = Keypair::from_seed(&[seed; 32]);
                    let change: SignedChange =
                        Change::revise(id, peer.peer_id(), oid(1), oid(3), i64::from(seed))
                            .sign(&peer)
                            .unwrap();
                    let rev = graph.insert_change(change).unwrap();
                    expected.push(rev);
                    namespaces.push(namespace(&peer, &[(RefName::Patch(id), rev)]));
                }
                expected.sort();

                let none = BTreeSet::new();
                let patch = Inspector::new(&graph, &none)
                    .inspect(&snapshot(namespaces), &id)
                    .unwrap()
                    .unwrap();
                let got: Vec<Oid> = patch.revisions[1..].iter().map(|r| r.id).collect();
                prop_assert_eq!(got, expected);
                prop_assert_eq!(patch.status, Status::Updated);
            }
        }
    }
}
