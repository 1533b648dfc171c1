//! Replicating namespaces between nodes over the in-memory transport.

use std::time::Duration;

use peerforge::store::{NamespaceStore, SqliteBackend};
use peerforge::sync::{AnnounceOutcome, FailReason, RefUpdate, SkipReason};
use peerforge::{Address, Error, Keypair, Node, NodeConfig, Outcome, RefName, Scope};
use peerforge_testkit::{oid, repo, TestNetwork};

fn seeded(seeds: &[&str]) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.announce.seeds = seeds.iter().map(|s| Address::from(*s)).collect();
    config
}

#[tokio::test]
async fn fetched_namespace_verifies_locally() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let alice = net.node("alice", 1).await;
    let bob = net.node("bob", 2).await;
    let repo = repo("heartwood");

    alice.init_namespace(&repo, oid("1d")).await?;
    alice.set_head(&repo, "master", oid("f2de534")).await?;

    bob.track(&alice.peer_id().to_hex(), Some("alice"), Scope::All)?;
    let report = bob.fetch(&repo, &Address::from("alice"), Scope::All).await?;
    assert!(matches!(
        report.outcome(&alice.peer_id()),
        Some(Outcome::Applied { sequence: 2, .. })
    ));
    let master = RefUpdate::Created {
        name: RefName::head("master")?,
        oid: oid("f2de534"),
    };
    assert!(report.updated().all(|(id, _)| *id == alice.peer_id()));
    assert!(report.updated().any(|(_, update)| *update == master));

    let ns = bob.store().get(&repo, &alice.peer_id()).await?;
    ns.signed().verify()?;
    assert_eq!(ns.sequence(), 2);
    assert_eq!(ns.head("master"), Some(oid("f2de534")));
    assert_eq!(ns.identity_doc(), Some(oid("1d")));

    // Nothing new: the second fetch reports the namespace as current.
    let report = bob.fetch(&repo, &Address::from("alice"), Scope::All).await?;
    assert!(matches!(
        report.outcome(&alice.peer_id()),
        Some(Outcome::Skipped(SkipReason::UpToDate { sequence: 2 }))
    ));
    Ok(())
}

#[tokio::test]
async fn announce_through_seed_reaches_third_peer() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let _seed = net.node("seed", 9).await;
    let alice = net.node_with_config("alice", 1, seeded(&["seed"])).await;
    let carol = net.node("carol", 3).await;
    let repo = repo("heartwood");

    alice.set_head(&repo, "master", oid("aa")).await?;
    let report = alice.announce(&repo).await?;
    assert_eq!(report.delivered_count(), 1);

    // Alice is offline; Carol still gets her namespace from the seed.
    net.network.set_reachable(&Address::from("alice"), false).await;
    carol.track(&alice.peer_id().to_hex(), None, Scope::Trusted)?;
    let report = carol.fetch(&repo, &Address::from("seed"), Scope::Trusted).await?;
    assert_eq!(report.applied_count(), 1);
    assert_eq!(
        carol.store().get(&repo, &alice.peer_id()).await?.head("master"),
        Some(oid("aa"))
    );

    // Announcing the same sequence again changes nothing on the seed.
    let report = alice.announce(&repo).await?;
    assert!(matches!(
        report.outcomes.get(&Address::from("seed")),
        Some(AnnounceOutcome::UpToDate { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn older_copy_never_replaces_newer() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let _seed = net.node("seed", 9).await;
    let alice = net.node_with_config("alice", 1, seeded(&["seed"])).await;
    let carol = net.node("carol", 3).await;
    let repo = repo("heartwood");

    alice.set_head(&repo, "master", oid("01")).await?;
    alice.announce(&repo).await?;
    alice.set_head(&repo, "master", oid("02")).await?;

    carol.track(&alice.peer_id().to_hex(), None, Scope::Trusted)?;
    carol.fetch(&repo, &Address::from("alice"), Scope::Trusted).await?;

    // The seed still serves sequence 1.
    let report = carol.fetch(&repo, &Address::from("seed"), Scope::Trusted).await?;
    assert!(matches!(
        report.outcome(&alice.peer_id()),
        Some(Outcome::Failed(FailReason::Stale {
            stored: 2,
            received: 1
        }))
    ));
    let ns = carol.store().get(&repo, &alice.peer_id()).await?;
    assert_eq!(ns.sequence(), 2);
    assert_eq!(ns.head("master"), Some(oid("02")));
    Ok(())
}

#[tokio::test]
async fn untracking_stops_fetching_but_keeps_data() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let alice = net.node("alice", 1).await;
    let bob = net.node("bob", 2).await;
    let repo = repo("heartwood");
    let from_alice = Address::from("alice");

    alice.set_head(&repo, "master", oid("01")).await?;
    let id = bob.track(&alice.peer_id().to_hex(), Some("alice"), Scope::Trusted)?;
    bob.fetch(&repo, &from_alice, Scope::Trusted).await?;

    assert!(bob.untrack(&id));
    assert!(bob.resolve("alice").is_err());
    alice.set_head(&repo, "master", oid("02")).await?;

    let report = bob.fetch(&repo, &from_alice, Scope::Trusted).await?;
    assert!(report.outcomes.is_empty());
    let ns = bob.store().get(&repo, &alice.peer_id()).await?;
    assert_eq!(ns.head("master"), Some(oid("01")));
    Ok(())
}

#[tokio::test]
async fn fetch_reports_changed_refs() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let alice = net.node("alice", 1).await;
    let bob = net.node("bob", 2).await;
    let repo = repo("heartwood");
    let from_alice = Address::from("alice");
    let (master, dev) = (RefName::head("master")?, RefName::head("dev")?);

    alice.set_head(&repo, "master", oid("01")).await?;
    alice.set_head(&repo, "dev", oid("d1")).await?;
    bob.track(&alice.peer_id().to_hex(), None, Scope::Trusted)?;
    bob.fetch(&repo, &from_alice, Scope::Trusted).await?;

    alice.set_head(&repo, "master", oid("02")).await?;
    alice.remove_ref(&repo, &dev).await?;
    alice.set_head(&repo, "fix", oid("f1")).await?;

    let report = bob.fetch(&repo, &from_alice, Scope::Trusted).await?;
    let Some(Outcome::Applied { updated, .. }) = report.outcome(&alice.peer_id()) else {
        anyhow::bail!("expected an applied outcome, got {:?}", report.outcome(&alice.peer_id()));
    };
    assert_eq!(
        updated,
        &vec![
            RefUpdate::Deleted {
                name: dev,
                old: oid("d1")
            },
            RefUpdate::Created {
                name: RefName::head("fix")?,
                oid: oid("f1")
            },
            RefUpdate::Updated {
                name: master,
                old: oid("01"),
                new: oid("02")
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn untracked_identity_is_not_refetched_under_all_scope() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let alice = net.node("alice", 1).await;
    let bob = net.node("bob", 2).await;
    let repo = repo("heartwood");
    let from_alice = Address::from("alice");

    alice.set_head(&repo, "master", oid("01")).await?;
    let id = bob.track(&alice.peer_id().to_hex(), None, Scope::All)?;
    bob.fetch(&repo, &from_alice, Scope::All).await?;

    assert!(bob.untrack(&id));
    alice.set_head(&repo, "master", oid("02")).await?;

    let report = bob.fetch(&repo, &from_alice, Scope::All).await?;
    assert!(report.outcome(&id).is_none());
    assert_eq!(bob.store().get(&repo, &id).await?.head("master"), Some(oid("01")));

    // Tracking again lifts the exclusion.
    bob.track(&id.to_hex(), None, Scope::Trusted)?;
    let report = bob.fetch(&repo, &from_alice, Scope::All).await?;
    assert!(matches!(report.outcome(&id), Some(Outcome::Applied { .. })));
    Ok(())
}

#[tokio::test]
async fn fetch_all_scope_skips_blocked_identities() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let _seed = net.node("seed", 9).await;
    let alice = net.node_with_config("alice", 1, seeded(&["seed"])).await;
    let mallory = net.node_with_config("mallory", 4, seeded(&["seed"])).await;
    let carol = net.node("carol", 3).await;
    let repo = repo("heartwood");

    for node in [&alice, &mallory] {
        node.set_head(&repo, "master", oid("01")).await?;
        node.announce(&repo).await?;
    }
    carol.track(&mallory.peer_id().to_hex(), None, Scope::None)?;

    let report = carol.fetch(&repo, &Address::from("seed"), Scope::All).await?;
    assert_eq!(report.applied_count(), 1);
    assert!(report.outcome(&alice.peer_id()).is_some());
    assert!(report.outcome(&mallory.peer_id()).is_none());
    assert!(carol.store().try_get(&repo, &mallory.peer_id()).await?.is_none());

    // A scope of None fetches nothing at all.
    let report = carol.fetch(&repo, &Address::from("seed"), Scope::None).await?;
    assert!(report.outcomes.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_peer_does_not_hold_up_the_rest() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let alice = net.node("alice", 1).await;
    let slow = net.node("slow", 5).await;

    let mut config = NodeConfig::default();
    config.sync.connect_timeout_ms = 1_000;
    config.sync.request_timeout_ms = 1_000;
    let bob = net.node_with_config("bob", 2, config).await;
    let repo = repo("heartwood");

    // Connecting and requesting each take this long, well inside the timeouts.
    let latency = Duration::from_millis(200);
    alice.set_head(&repo, "master", oid("01")).await?;
    slow.set_head(&repo, "master", oid("02")).await?;
    net.network.set_latency(&Address::from("slow"), latency).await;

    bob.track(&alice.peer_id().to_hex(), None, Scope::Trusted)?;
    bob.track(&slow.peer_id().to_hex(), None, Scope::Trusted)?;

    let peers = [Address::from("slow"), Address::from("alice")];
    let (results, early) = tokio::join!(bob.fetch_all(&repo, &peers, Scope::Trusted), async {
        tokio::time::sleep(latency / 2).await;
        let fast = bob.store().try_get(&repo, &alice.peer_id()).await?;
        let lagging = bob.store().try_get(&repo, &slow.peer_id()).await?;
        anyhow::Ok((fast.is_some(), lagging.is_some()))
    });
    // Alice's namespace landed while the slow peer was still connecting.
    assert_eq!(early?, (true, false));

    assert_eq!(results.len(), 2);
    for ((peer, result), node) in results.iter().zip([&slow, &alice]) {
        let report = result.as_ref().map_err(|e| anyhow::anyhow!("{peer}: {e}"))?;
        assert!(matches!(
            report.outcome(&node.peer_id()),
            Some(Outcome::Applied { sequence: 1, .. })
        ));
    }
    assert_eq!(results[0].0, Address::from("slow"));
    Ok(())
}

#[tokio::test]
async fn remote_bindings_follow_the_bound_namespace() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let alice = net.node("alice", 1).await;
    let carol = net.node("carol", 3).await;
    let bob = net.node("bob", 2).await;
    let repo = repo("heartwood");

    alice.set_head(&repo, "master", oid("a1")).await?;
    carol.set_head(&repo, "master", oid("c1")).await?;
    carol.set_head(&repo, "dev", oid("c2")).await?;

    for (node, name) in [(&alice, "alice"), (&carol, "carol")] {
        bob.track(&node.peer_id().to_hex(), None, Scope::Trusted)?;
        bob.fetch(&repo, &Address::from(name), Scope::Trusted).await?;
    }

    assert!(bob.bind("upstream", alice.peer_id())?);
    assert!(!bob.bind("upstream", alice.peer_id())?);
    let refs = bob.remote_refs(&repo, "upstream").await?;
    assert_eq!(refs.len(), 1);
    assert_eq!(refs.get("refs/remotes/upstream/master"), Some(&oid("a1")));
    assert_eq!(
        bob.fetch_refspec("upstream")?,
        format!("+{}/refs/heads/*:refs/remotes/upstream/*", alice.peer_id())
    );

    assert!(matches!(
        bob.bind("upstream", carol.peer_id()),
        Err(Error::NameConflict { .. })
    ));

    assert_eq!(bob.unbind("upstream"), Some(alice.peer_id()));
    assert!(matches!(
        bob.remote_refs(&repo, "upstream").await,
        Err(Error::UnknownRemote(_))
    ));

    bob.bind("upstream", carol.peer_id())?;
    let refs = bob.remote_refs(&repo, "upstream").await?;
    assert_eq!(
        refs.into_iter().collect::<Vec<_>>(),
        vec![
            ("refs/remotes/upstream/dev".to_string(), oid("c2")),
            ("refs/remotes/upstream/master".to_string(), oid("c1")),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn sqlite_node_keeps_fetched_namespaces() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("peerforge.db");
    let net = TestNetwork::new();
    let alice = net.node("alice", 1).await;
    let repo = repo("heartwood");
    alice.set_head(&repo, "master", oid("01")).await?;

    {
        let bob: Node<SqliteBackend> = Node::new(
            Keypair::from_seed(&[2; 32]),
            NamespaceStore::new(SqliteBackend::open(&path)?),
            net.network.transport(),
            net.graph.clone(),
            NodeConfig::default(),
        );
        bob.track(&alice.peer_id().to_hex(), None, Scope::Trusted)?;
        let report = bob.fetch(&repo, &Address::from("alice"), Scope::Trusted).await?;
        assert_eq!(report.applied_count(), 1);
    }

    let store = NamespaceStore::new(SqliteBackend::open(&path)?);
    let ns = store.get(&repo, &alice.peer_id()).await?;
    ns.signed().verify()?;
    assert_eq!(ns.head("master"), Some(oid("01")));
    Ok(())
}
