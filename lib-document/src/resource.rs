//! Document resources
//!
//! A resource is a named blob inside a document: path, MIME type, content,
//! and a free-form comment. Mutations that should be visible to the owning
//! document's handler go through `Document::set_resource_property`; the
//! setters here only update fields.

use serde::{Deserialize, Serialize};

use crate::{DocumentError, DocumentResult};

pub const DEFAULT_MIME: &str = "application/x-octet-stream";

/// The four mutable resource properties.
pub const RESOURCE_PROPERTIES: [&str; 4] = ["path", "type", "content", "comment"];

/// A named blob owned by exactly one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    path: String,
    #[serde(rename = "type")]
    mime: String,
    content: String,
    comment: String,
}

impl Resource {
    /// An empty resource at `path` with the default MIME type.
    pub fn new(path: impl Into<String>) -> Self {
        Resource {
            path: path.into(),
            mime: DEFAULT_MIME.to_string(),
            content: String::new(),
            comment: String::new(),
        }
    }

    pub fn with(
        path: impl Into<String>,
        content: impl Into<String>,
        comment: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        Resource {
            path: path.into(),
            mime: mime.into(),
            content: content.into(),
            comment: comment.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Set one of the four known properties. Returns the previous path when
    /// the property was `path`, so the owning document can re-key its map.
    pub(crate) fn set_property(
        &mut self,
        propname: &str,
        value: &str,
    ) -> DocumentResult<Option<String>> {
        match propname {
            "path" => {
                let old = std::mem::replace(&mut self.path, value.to_string());
                Ok(Some(old))
            }
            "type" => {
                self.mime = value.to_string();
                Ok(None)
            }
            "content" => {
                self.content = value.to_string();
                Ok(None)
            }
            "comment" => {
                self.comment = value.to_string();
                Ok(None)
            }
            other => Err(DocumentError::UnknownProperty(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let res = Resource::new("/example.txt");
        assert_eq!(res.path(), "/example.txt");
        assert_eq!(res.mime(), DEFAULT_MIME);
        assert_eq!(res.content(), "");
        assert_eq!(res.comment(), "");
    }

    #[test]
    fn test_set_property_gates_names() {
        let mut res = Resource::new("/example.txt");
        res.set_property("content", "blerg").unwrap();
        assert_eq!(res.content(), "blerg");

        let old = res.set_property("path", "/fridge/turtles.txt").unwrap();
        assert_eq!(old.as_deref(), Some("/example.txt"));
        assert_eq!(res.path(), "/fridge/turtles.txt");

        assert!(matches!(
            res.set_property("owner", "nope"),
            Err(DocumentError::UnknownProperty(_))
        ));
    }

    #[test]
    fn test_serde_field_names() {
        let res = Resource::with("/a", "c", "m", "text/plain");
        let value = serde_json::to_value(&res).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "path": "/a",
                "type": "text/plain",
                "content": "c",
                "comment": "m",
            })
        );
    }
}
