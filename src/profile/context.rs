/// Session identity: which user and workspace a launch belongs to
use crate::profile::reader::ObjectReader;
use serde_json::{json, Value};

/// A (project, id) pair identifying a logical workspace
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SessionScope {
    project: String,
    id: String,
}

impl SessionScope {
    /// Build a scope from its parts. Pure; no validation is performed.
    pub fn from_project_id(project: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            id: id.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// User and scope of a session
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SessionContext {
    pub username: String,
    pub scope: SessionScope,
}

impl SessionContext {
    pub fn new(username: impl Into<String>, scope: SessionScope) -> Self {
        Self {
            username: username.into(),
            scope,
        }
    }

    /// Flattened wire form: `{username, project, id}`
    pub fn to_json(&self) -> Value {
        json!({
            "username": self.username,
            "project": self.scope.project(),
            "id": self.scope.id(),
        })
    }

    /// Rebuild a context from its wire form. Missing fields are recorded on
    /// the reader and left empty.
    pub(crate) fn read_json(reader: &mut ObjectReader<'_>) -> Self {
        let username = reader.string("username");
        let project = reader.string("project");
        let id = reader.string("id");
        Self::new(username, SessionScope::from_project_id(project, id))
    }
}
