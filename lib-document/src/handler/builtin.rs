//! Built-in JSON policy handler
//!
//! The stock handler reads its policy from the handler resource as a JSON
//! document and interprets events in the delta language: each event is
//! `{"path", "property", "value"}` and applying it sets one resource
//! property, creating the resource first if it does not exist.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::document::Document;
use crate::handler::{Handler, Thresholds};
use crate::resource::Resource;
use crate::{DocumentError, DocumentResult};
use lib_identity::{Identity, IdentityCache};

/// Access rule for a policy verb: the keyword `"anyone"`, the keyword
/// `"participants"`, or an explicit name list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AclRule {
    Keyword(String),
    Names(Vec<String>),
}

impl Default for AclRule {
    fn default() -> Self {
        AclRule::Keyword("anyone".to_string())
    }
}

fn default_write_rule() -> AclRule {
    AclRule::Keyword("participants".to_string())
}

/// Which contents count as valid events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLanguage {
    /// Only well-formed deltas are valid.
    #[default]
    Delta,
    /// Any content is valid; non-delta events apply as no-ops.
    Free,
}

/// Shape of the handler resource content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub participants: Vec<String>,
    pub thresholds: Thresholds,
    #[serde(default = "default_write_rule")]
    pub write: AclRule,
    #[serde(default)]
    pub read: AclRule,
    #[serde(default)]
    pub events: EventLanguage,
    #[serde(default)]
    pub protocols: Vec<String>,
}

/// One entry of the delta event language.
#[derive(Debug, Clone, Deserialize)]
pub struct Delta {
    pub path: String,
    pub property: String,
    pub value: String,
}

impl Delta {
    pub fn parse(content: &Value) -> DocumentResult<Delta> {
        let delta: Delta = serde_json::from_value(content.clone())?;
        if !delta.path.starts_with('/') {
            return Err(DocumentError::BadResourcePath(delta.path));
        }
        Ok(delta)
    }
}

/// The built-in policy handler.
#[derive(Debug, Clone)]
pub struct DeltaHandler {
    config: PolicyConfig,
    participants: Vec<Identity>,
}

impl DeltaHandler {
    /// Parse handler resource content, resolving participant names through
    /// the identity cache. Participant order follows the policy document.
    pub fn from_resource(content: &str, cache: &IdentityCache) -> DocumentResult<DeltaHandler> {
        let config: PolicyConfig = serde_json::from_str(content)
            .map_err(|e| DocumentError::HandlerPolicy(format!("policy parse: {e}")))?;
        Self::from_config(config, cache)
    }

    pub fn from_config(config: PolicyConfig, cache: &IdentityCache) -> DocumentResult<DeltaHandler> {
        for rule in [&config.write, &config.read] {
            if let AclRule::Keyword(word) = rule {
                if word != "anyone" && word != "participants" {
                    return Err(DocumentError::HandlerPolicy(format!(
                        "unknown access keyword {word:?}"
                    )));
                }
            }
        }
        let participants = config
            .participants
            .iter()
            .map(|name| cache.by_name(name).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DeltaHandler {
            config,
            participants,
        })
    }

    fn allowed(&self, rule: &AclRule, name: &str) -> bool {
        match rule {
            AclRule::Keyword(word) if word == "anyone" => true,
            AclRule::Keyword(_) => self.config.participants.iter().any(|p| p.as_str() == name),
            AclRule::Names(names) => names.iter().any(|n| n.as_str() == name),
        }
    }
}

impl Handler for DeltaHandler {
    fn event_test(&self, _doc: &Document, content: &Value, author: &str) -> bool {
        if !self.can_write(author) {
            return false;
        }
        match self.config.events {
            EventLanguage::Delta => Delta::parse(content).is_ok(),
            EventLanguage::Free => true,
        }
    }

    fn event_apply(
        &self,
        doc: &mut Document,
        content: &Value,
        _author: &str,
    ) -> DocumentResult<()> {
        let delta = match Delta::parse(content) {
            Ok(delta) => delta,
            Err(_) if self.config.events == EventLanguage::Free => {
                debug!("non-delta event recorded without resource changes");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if doc.get_resource(&delta.path).is_err() {
            doc.add_resource(Resource::new(&delta.path), true)?;
        }
        doc.set_resource_property(&delta.path, &delta.property, &delta.value)
    }

    fn on_resource_update(&self, path: &str, propname: &str, oldpath: &str) {
        if propname == "path" && oldpath != path {
            debug!("resource {} moved to {}", oldpath, path);
        } else {
            debug!("resource {} updated ({})", path, propname);
        }
    }

    fn quorum_participants(&self) -> Vec<Identity> {
        self.participants.clone()
    }

    fn quorum_thresholds(&self) -> Thresholds {
        self.config.thresholds
    }

    fn request_protocols(&self) -> Vec<String> {
        self.config.protocols.clone()
    }

    fn can_read(&self, name: &str) -> bool {
        self.allowed(&self.config.read, name)
    }

    fn can_write(&self, name: &str) -> bool {
        self.allowed(&self.config.write, name)
    }
}

/// Single-participant diagnostic policy: one voter, thresholds 1/1, anyone
/// may read or write, arbitrary event content accepted.
pub fn echo_chamber(owner: &str) -> String {
    serde_json::to_string_pretty(&PolicyConfig {
        participants: vec![owner.to_string()],
        thresholds: Thresholds { read: 1, write: 1 },
        write: AclRule::Keyword("anyone".to_string()),
        read: AclRule::Keyword("anyone".to_string()),
        events: EventLanguage::Free,
        protocols: Vec::new(),
    })
    .expect("policy config serializes")
}

/// Two-peer coordination policy: both participants must sign writes, one
/// signature grants reads, anyone may read, events are deltas.
pub fn tag_team(a: &str, b: &str) -> String {
    serde_json::to_string_pretty(&PolicyConfig {
        participants: vec![a.to_string(), b.to_string()],
        thresholds: Thresholds { read: 1, write: 2 },
        write: AclRule::Keyword("participants".to_string()),
        read: AclRule::Keyword("anyone".to_string()),
        events: EventLanguage::Delta,
        protocols: Vec::new(),
    })
    .expect("policy config serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache_with(names: &[&str]) -> IdentityCache {
        let mut cache = IdentityCache::new();
        for name in names {
            let location = format!("local:{name}");
            cache.insert(Identity::new(*name, location));
        }
        cache
    }

    #[test]
    fn test_policy_parses_and_resolves() {
        let cache = cache_with(&["mitzi@lackadaisy.com", "atlas@lackadaisy.com"]);
        let content = tag_team("mitzi@lackadaisy.com", "atlas@lackadaisy.com");
        let handler = DeltaHandler::from_resource(&content, &cache).unwrap();

        assert_eq!(handler.quorum_participants().len(), 2);
        assert_eq!(handler.quorum_thresholds(), Thresholds { read: 1, write: 2 });
        assert!(handler.can_write("mitzi@lackadaisy.com"));
        assert!(!handler.can_write("victor@lackadaisy.com"));
        assert!(handler.can_read("victor@lackadaisy.com"));
    }

    #[test]
    fn test_unresolved_participant_is_an_error() {
        let cache = cache_with(&["mitzi@lackadaisy.com"]);
        let content = tag_team("mitzi@lackadaisy.com", "atlas@lackadaisy.com");
        assert!(DeltaHandler::from_resource(&content, &cache).is_err());
    }

    #[test]
    fn test_unknown_acl_keyword_rejected() {
        let cache = cache_with(&["mitzi@lackadaisy.com"]);
        let config = PolicyConfig {
            participants: vec!["mitzi@lackadaisy.com".to_string()],
            thresholds: Thresholds { read: 1, write: 1 },
            write: AclRule::Keyword("somebody".to_string()),
            read: AclRule::default(),
            events: EventLanguage::default(),
            protocols: Vec::new(),
        };
        assert!(matches!(
            DeltaHandler::from_config(config, &cache),
            Err(DocumentError::HandlerPolicy(_))
        ));
    }

    #[test]
    fn test_delta_parse() {
        let delta = Delta::parse(&json!({
            "path": "/example",
            "property": "content",
            "value": "Mitzi says hi",
        }))
        .unwrap();
        assert_eq!(delta.path, "/example");
        assert_eq!(delta.property, "content");

        assert!(Delta::parse(&json!({"x": "y"})).is_err());
        assert!(Delta::parse(&json!({
            "path": "no-slash", "property": "content", "value": "v",
        }))
        .is_err());
    }
}
