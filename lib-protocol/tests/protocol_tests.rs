//! End-to-end protocol tests over the in-process router
//!
//! Three peers share one bus: mitzi and atlas are tag_team participants,
//! victor holds a replica but is outside the participant set.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::Result;
use serde_json::json;

use lib_document::handler::builtin::{echo_chamber, tag_team};
use lib_document::{Document, Resource};
use lib_identity::{Identity, IdentityCache};
use lib_protocol::{Owner, Router, Transport};

const DOCNAME: &str = "testing";

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_identity(name: &str) -> Identity {
    Identity::new(format!("{name}@lackadaisy.com"), format!("local:{name}"))
}

fn handler_resource(content: String) -> Resource {
    Resource::with(
        "/handler.json",
        content,
        "The primary handler",
        "application/json",
    )
}

struct Net {
    router: Rc<Router>,
    mitzi: Rc<RefCell<Owner>>,
    atlas: Rc<RefCell<Owner>>,
    victor: Rc<RefCell<Owner>>,
}

/// Three owners on one router, each holding an identical tag_team replica.
fn tag_team_net() -> Result<Net> {
    init_tracing();
    let router = Router::new();

    let mitzi_id = test_identity("mitzi");
    let atlas_id = test_identity("atlas");
    let victor_id = test_identity("victor");

    let mut everyone = IdentityCache::new();
    for ident in [&mitzi_id, &atlas_id, &victor_id] {
        everyone.insert(ident.clone());
    }

    let mut owners = Vec::new();
    for ident in [&mitzi_id, &atlas_id, &victor_id] {
        let transport: Rc<dyn Transport> = router.clone();
        let mut owner = Owner::new(ident.clone(), transport)?;
        owner.identities_mut().sync_from(&everyone);

        let mut doc = Document::new(DOCNAME);
        doc.add_resource(
            handler_resource(tag_team(mitzi_id.name(), atlas_id.name())),
            false,
        )?;
        owner.own_document(doc)?;

        let handle = Rc::new(RefCell::new(owner));
        router.register(ident.location(), handle.clone());
        owners.push(handle);
    }

    let victor = owners.pop().expect("three owners");
    let atlas = owners.pop().expect("three owners");
    let mitzi = owners.pop().expect("three owners");
    Ok(Net {
        router,
        mitzi,
        atlas,
        victor,
    })
}

fn delta(value: &str) -> serde_json::Value {
    json!({"path": "/example", "property": "content", "value": value})
}

#[test]
fn test_owned_echo_chamber_bootstrap() -> Result<()> {
    let router = Router::new();
    let mitzi_id = test_identity("mitzi");
    let transport: Rc<dyn Transport> = router.clone();
    let mut owner = Owner::new(mitzi_id.clone(), transport)?;

    let mut doc = Document::new(DOCNAME);
    doc.add_resource(handler_resource(echo_chamber(mitzi_id.name())), false)?;
    owner.own_document(doc)?;

    let doc = owner.document(DOCNAME)?;
    assert_eq!(doc.version(), 0);
    assert!(doc.competing()?.is_empty());
    assert!(doc.can_write(None)?);
    Ok(())
}

#[test]
fn test_single_participant_write_completes_locally() -> Result<()> {
    let router = Router::new();
    let mitzi_id = test_identity("mitzi");
    let transport: Rc<dyn Transport> = router.clone();
    let mut owner = Owner::new(mitzi_id.clone(), transport)?;

    let mut doc = Document::new(DOCNAME);
    doc.add_resource(handler_resource(echo_chamber(mitzi_id.name())), false)?;
    owner.own_document(doc)?;

    owner.event(DOCNAME, json!({"x": "y"}))?;
    router.deliver_all();

    let doc = owner.document(DOCNAME)?;
    assert_eq!(doc.version(), 1);
    assert_eq!(doc.events()[0].content, json!({"x": "y"}));
    assert!(doc.competing()?.is_empty());
    Ok(())
}

#[test]
fn test_two_peer_coordinated_write() -> Result<()> {
    let net = tag_team_net()?;

    net.mitzi
        .borrow_mut()
        .event(DOCNAME, delta("Mitzi says hi"))?;
    net.router.deliver_all();

    for owner in [&net.mitzi, &net.atlas] {
        let owner = owner.borrow();
        let doc = owner.document(DOCNAME)?;
        assert_eq!(doc.version(), 1);
        assert_eq!(doc.get_resource("/example")?.content(), "Mitzi says hi");
        assert!(doc.competing()?.is_empty());
        // The applied record kept the full quorum signature set.
        assert!(doc.events()[0].signatures.len() >= 2);
    }
    Ok(())
}

#[test]
fn test_consecutive_writes_from_both_peers() -> Result<()> {
    let net = tag_team_net()?;

    net.mitzi.borrow_mut().event(DOCNAME, delta("one"))?;
    net.router.deliver_all();
    net.atlas.borrow_mut().event(DOCNAME, delta("two"))?;
    net.router.deliver_all();

    for owner in [&net.mitzi, &net.atlas] {
        let owner = owner.borrow();
        let doc = owner.document(DOCNAME)?;
        assert_eq!(doc.version(), 2);
        assert_eq!(doc.get_resource("/example")?.content(), "two");
    }
    Ok(())
}

#[test]
fn test_read_subscription_reaches_participants() -> Result<()> {
    let net = tag_team_net()?;

    let request = net.victor.borrow_mut().subscribe(DOCNAME)?;
    assert_eq!(request.author, "victor@lackadaisy.com");
    net.router.deliver_all();

    for owner in [&net.mitzi, &net.atlas] {
        let owner = owner.borrow();
        let doc = owner.document(DOCNAME)?;
        assert!(doc.subscribers().contains("victor@lackadaisy.com"));
        assert!(doc.competing()?.is_empty());
    }
    Ok(())
}

#[test]
fn test_subscriber_gets_version_notifications() -> Result<()> {
    let net = tag_team_net()?;

    net.victor.borrow_mut().subscribe(DOCNAME)?;
    net.router.deliver_all();

    // A later write pushes deje-doc-version at the subscriber; victor's
    // replica does not advance (subscription is not replication), but the
    // notification must not crash or stall the bus.
    net.mitzi.borrow_mut().event(DOCNAME, delta("hello"))?;
    let delivered = net.router.deliver_all();
    assert!(delivered > 0);

    assert_eq!(net.victor.borrow().document(DOCNAME)?.version(), 0);
    Ok(())
}

#[test]
fn test_version_query_round_trip() -> Result<()> {
    let net = tag_team_net()?;

    let calls: Rc<Cell<u32>> = Rc::new(Cell::new(0));
    let seen: Rc<Cell<Option<u64>>> = Rc::new(Cell::new(None));
    let (calls2, seen2) = (calls.clone(), seen.clone());

    net.victor.borrow_mut().get_version(DOCNAME, move |value| {
        calls2.set(calls2.get() + 1);
        seen2.set(value.as_u64());
    })?;
    net.router.deliver_all();

    // Both participants answer; the one-shot callback fires exactly once.
    assert_eq!(calls.get(), 1);
    assert_eq!(seen.get(), Some(0));
    Ok(())
}

#[test]
fn test_version_query_after_write() -> Result<()> {
    let net = tag_team_net()?;

    net.mitzi.borrow_mut().event(DOCNAME, delta("hi"))?;
    net.router.deliver_all();

    let seen: Rc<Cell<Option<u64>>> = Rc::new(Cell::new(None));
    let seen2 = seen.clone();
    net.victor
        .borrow_mut()
        .get_version(DOCNAME, move |value| seen2.set(value.as_u64()))?;
    net.router.deliver_all();

    assert_eq!(seen.get(), Some(1));
    Ok(())
}

#[test]
fn test_block_query_round_trip() -> Result<()> {
    let net = tag_team_net()?;

    net.mitzi.borrow_mut().event(DOCNAME, delta("hi"))?;
    net.router.deliver_all();

    let seen: Rc<RefCell<Option<serde_json::Value>>> = Rc::new(RefCell::new(None));
    let seen2 = seen.clone();
    net.victor
        .borrow_mut()
        .get_block(DOCNAME, 0, move |value| *seen2.borrow_mut() = Some(value))?;
    net.router.deliver_all();

    let block = seen.borrow().clone().expect("block response");
    assert_eq!(block["author"], "mitzi@lackadaisy.com");
    assert_eq!(block["version"], 0);
    assert_eq!(block["content"], delta("hi"));
    assert!(block["signatures"].as_object().map(|s| s.len() >= 2).unwrap_or(false));
    Ok(())
}

#[test]
fn test_catch_up_sync() -> Result<()> {
    let net = tag_team_net()?;

    net.mitzi.borrow_mut().event(DOCNAME, delta("one"))?;
    net.router.deliver_all();
    net.atlas.borrow_mut().event(DOCNAME, delta("two"))?;
    net.router.deliver_all();

    assert_eq!(net.victor.borrow().document(DOCNAME)?.version(), 0);

    net.victor.borrow_mut().sync(DOCNAME)?;
    net.router.deliver_all();

    let victor = net.victor.borrow();
    let doc = victor.document(DOCNAME)?;
    assert_eq!(doc.version(), 2);
    assert_eq!(doc.get_resource("/example")?.content(), "two");
    assert!(!victor.sync_in_progress(DOCNAME));
    Ok(())
}

#[test]
fn test_competing_proposals_block_on_double_signing() -> Result<()> {
    let net = tag_team_net()?;

    // Both participants propose against version 0 before any delivery.
    // Each refuses to sign the other's quorum while its own competes, so
    // neither write reaches the threshold and the bus stays healthy.
    net.mitzi.borrow_mut().event(DOCNAME, delta("mitzi wins"))?;
    net.atlas.borrow_mut().event(DOCNAME, delta("atlas wins"))?;
    net.router.deliver_all();

    for owner in [&net.mitzi, &net.atlas] {
        let owner = owner.borrow();
        let doc = owner.document(DOCNAME)?;
        assert_eq!(doc.version(), 0);
        // Both proposals sit registered and competing, each carrying only
        // its proposer's signature.
        assert_eq!(doc.competing()?.len(), 2);
    }
    Ok(())
}

#[test]
fn test_write_denied_without_permission_sends_nothing() -> Result<()> {
    let net = tag_team_net()?;

    let err = net
        .victor
        .borrow_mut()
        .event(DOCNAME, delta("sneaky"))
        .unwrap_err();
    assert!(err.to_string().contains("permission denied"));
    assert_eq!(net.router.pending(), 0);
    Ok(())
}

#[test]
fn test_malformed_message_gets_error_reply() -> Result<()> {
    let net = tag_team_net()?;

    // A raw non-object payload: the recipient answers with a deje-error,
    // which is itself delivered and logged without crashing anyone.
    net.router
        .send("local:victor", "local:mitzi", "\"Oompa loompa\"")?;
    let delivered = net.router.deliver_all();
    assert_eq!(delivered, 2);
    Ok(())
}

#[test]
fn test_unknown_message_type_gets_error_reply() -> Result<()> {
    let net = tag_team_net()?;

    net.router.send(
        "local:victor",
        "local:mitzi",
        &json!({"type": "deje-frobnicate", "docname": DOCNAME}).to_string(),
    )?;
    let delivered = net.router.deliver_all();
    assert_eq!(delivered, 2);
    Ok(())
}

#[test]
fn test_unknown_quorum_hash_is_dropped() -> Result<()> {
    let net = tag_team_net()?;

    net.router.send(
        "local:atlas",
        "local:mitzi",
        &json!({
            "type": "deje-lock-complete",
            "docname": DOCNAME,
            "signatures": {},
            "content-hash": "ffffffffffffffffffffffffffffffffffffffff",
        })
        .to_string(),
    )?;
    let delivered = net.router.deliver_all();
    assert_eq!(delivered, 1, "dropped without a reply");
    assert_eq!(net.mitzi.borrow().document(DOCNAME)?.version(), 0);
    Ok(())
}
