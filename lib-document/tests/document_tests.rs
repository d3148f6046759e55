//! Tests for document state, serialization, and the freeze laws

use anyhow::Result;
use serde_json::json;

use lib_document::handler::builtin::{echo_chamber, tag_team};
use lib_document::{Document, EventDisposition, Resource};
use lib_identity::{Identity, IdentityCache};

fn test_identity(name: &str) -> Identity {
    Identity::new(format!("{name}@lackadaisy.com"), format!("local:{name}"))
}

fn cache_of(idents: &[&Identity]) -> IdentityCache {
    let mut cache = IdentityCache::new();
    for ident in idents {
        cache.insert((*ident).clone());
    }
    cache
}

/// Document with an echo_chamber handler for the anonymous principal,
/// activated but unowned.
fn echo_document(name: &str) -> Document {
    let anonymous = Identity::new("anonymous", "local:anonymous");
    let mut doc = Document::new(name);
    doc.add_resource(
        Resource::with(
            "/handler.json",
            echo_chamber("anonymous"),
            "The primary handler",
            "application/json",
        ),
        false,
    )
    .unwrap();
    doc.activate(&cache_of(&[&anonymous])).unwrap();
    doc
}

#[test]
fn test_serialize_empty_document() -> Result<()> {
    let doc = Document::new("testing");
    let serial = doc.serialize()?;

    assert_eq!(
        serial["original"],
        json!({"hash": null, "resources": {}})
    );
    assert_eq!(serial["events"], json!([]));
    Ok(())
}

#[test]
fn test_original_untouched_until_freeze() -> Result<()> {
    let mut doc = Document::new("testing");
    doc.add_resource(Resource::with("/example", "example", "", "text/plain"), false)?;

    let serial = doc.serialize()?;
    assert_eq!(serial["original"]["resources"], json!({}));
    assert_eq!(serial["original"]["hash"], json!(null));

    doc.freeze()?;
    let serial = doc.serialize()?;
    assert!(serial["original"]["hash"].is_string());
    assert_eq!(
        serial["original"]["resources"]["/example"],
        json!({
            "path": "/example",
            "type": "text/plain",
            "content": "example",
            "comment": "",
        })
    );
    assert_eq!(doc.version(), 0);
    Ok(())
}

#[test]
fn test_deserialize_restores_state() -> Result<()> {
    let mut doc = Document::new("testing");
    doc.add_resource(Resource::with("/example", "example", "", "text/plain"), false)?;
    doc.freeze()?;

    let serial = doc.serialize()?;
    let newdoc = Document::deserialize("testing", &serial)?;

    assert_eq!(newdoc.version(), doc.version());
    assert_eq!(newdoc.resources(), doc.resources());
    assert_eq!(newdoc.initial(), doc.initial());
    Ok(())
}

#[test]
fn test_freeze_law() -> Result<()> {
    let mut doc = Document::new("testing");
    doc.add_resource(Resource::with("/example", "example", "", "text/plain"), false)?;
    doc.freeze()?;

    let first = doc.serialize()?;
    let mut roundtripped = Document::deserialize("testing", &first)?;
    roundtripped.freeze()?;
    assert_eq!(roundtripped.serialize()?, first);
    Ok(())
}

#[test]
fn test_save_and_load() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("example.dje");

    let mut doc = Document::new("testing");
    doc.add_resource(Resource::with("/example", "example", "", "text/plain"), false)?;
    doc.freeze()?;
    doc.save_to(&path)?;

    let newdoc = Document::load_from("testing", &path)?;
    assert_eq!(newdoc.serialize()?, doc.serialize()?);
    Ok(())
}

#[test]
fn test_unowned_event_enacts_immediately() -> Result<()> {
    let mut doc = echo_document("testing");

    let disposition = doc.event(json!({"x": "y"}))?;
    assert_eq!(disposition, EventDisposition::Enacted);
    assert_eq!(doc.version(), 1);
    assert_eq!(doc.events()[0].content, json!({"x": "y"}));
    assert_eq!(doc.events()[0].author, "anonymous");
    Ok(())
}

#[test]
fn test_fresh_document_bootstrap() -> Result<()> {
    let doc = echo_document("testing");

    assert_eq!(doc.version(), 0);
    assert!(doc.competing()?.is_empty());
    assert!(doc.can_write(None)?);
    assert!(doc.can_read(None)?);
    Ok(())
}

#[test]
fn test_event_requires_write_permission() -> Result<()> {
    let mitzi = test_identity("mitzi");
    let atlas = test_identity("atlas");
    let cache = cache_of(&[&mitzi, &atlas]);

    // tag_team only lets participants write; the local principal is
    // anonymous on an unowned document.
    let mut doc = Document::new("testing");
    doc.add_resource(
        Resource::with(
            "/handler.json",
            tag_team(mitzi.name(), atlas.name()),
            "The primary handler",
            "application/json",
        ),
        false,
    )?;
    doc.activate(&cache)?;

    let err = doc
        .event(json!({"path": "/example", "property": "content", "value": "hi"}))
        .unwrap_err();
    assert!(matches!(err, lib_document::DocumentError::PermissionDenied(_)));
    assert_eq!(doc.version(), 0);
    Ok(())
}

#[test]
fn test_delta_event_applies_to_resources() -> Result<()> {
    let mitzi = test_identity("mitzi");
    let atlas = test_identity("atlas");
    let cache = cache_of(&[&mitzi, &atlas]);

    let mut doc = Document::new("testing");
    doc.add_resource(
        Resource::with(
            "/handler.json",
            tag_team(mitzi.name(), atlas.name()),
            "The primary handler",
            "application/json",
        ),
        false,
    )?;
    doc.activate(&cache)?;

    use lib_document::{Action, Event};
    let event = Event::new(
        json!({"path": "/example", "property": "content", "value": "Mitzi says hi"}),
        mitzi.name(),
        doc.version(),
    );
    doc.enact_action(Action::Event(event))?;

    assert_eq!(doc.version(), 1);
    assert_eq!(doc.get_resource("/example")?.content(), "Mitzi says hi");
    Ok(())
}

#[test]
fn test_replay_rebuilds_resources() -> Result<()> {
    let mut doc = echo_document("testing");
    doc.freeze()?;
    doc.event(json!({"path": "/example", "property": "content", "value": "one"}))?;
    doc.event(json!({"path": "/example", "property": "comment", "value": "two"}))?;
    assert_eq!(doc.version(), 2);

    let serial = doc.serialize()?;
    let mut newdoc = Document::deserialize("testing", &serial)?;
    let anonymous = Identity::new("anonymous", "local:anonymous");
    newdoc.activate(&cache_of(&[&anonymous]))?;
    newdoc.replay()?;

    assert_eq!(newdoc.version(), doc.version());
    assert_eq!(newdoc.get_resource("/example")?.content(), "one");
    assert_eq!(newdoc.get_resource("/example")?.comment(), "two");
    Ok(())
}

#[test]
fn test_resource_rename_rekeys_map() -> Result<()> {
    let mut doc = echo_document("testing");
    doc.add_resource(Resource::with("/example.txt", "blerg", "", "text/plain"), true)?;

    doc.set_resource_property("/example.txt", "path", "/fridge/turtles.txt")?;
    assert!(doc.get_resource("/example.txt").is_err());
    assert_eq!(doc.get_resource("/fridge/turtles.txt")?.content(), "blerg");
    Ok(())
}

#[test]
fn test_del_resource() -> Result<()> {
    let mut doc = echo_document("testing");
    doc.add_resource(Resource::new("/example"), true)?;
    doc.del_resource("/example", true)?;
    assert!(doc.get_resource("/example").is_err());
    assert!(doc.del_resource("/example", true).is_err());
    Ok(())
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Freeze then serialize survives a deserialize/freeze/serialize
        /// round trip for arbitrary resource sets.
        #[test]
        fn freeze_serialize_roundtrip(
            entries in prop::collection::btree_map(
                "/[a-z]{1,8}",
                "[ -~]{0,32}",
                0..6,
            )
        ) {
            let mut doc = Document::new("prop");
            for (path, content) in &entries {
                doc.add_resource(
                    Resource::with(path, content.as_str(), "", "text/plain"),
                    false,
                ).unwrap();
            }
            doc.freeze().unwrap();
            let first = doc.serialize().unwrap();

            let mut back = Document::deserialize("prop", &first).unwrap();
            prop_assert_eq!(back.version(), doc.version());
            prop_assert_eq!(back.resources(), doc.resources());

            back.freeze().unwrap();
            prop_assert_eq!(back.serialize().unwrap(), first);
        }
    }
}
