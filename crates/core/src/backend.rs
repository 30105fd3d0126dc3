//! REST backend abstraction.
//!
//! The core never talks HTTP itself. Collection stores and mutation
//! controllers go through this trait; `volunteer-client` provides the
//! `reqwest` implementation and the `testing` module a scripted one.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use volunteer_common::{ClientResult, Session};

use crate::normalize::RawPage;

/// A listable entity collection on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    /// The social feed.
    Posts,
    /// Volunteering events.
    Events,
    /// Comments under one post.
    Comments {
        /// Owning post.
        post_id: String,
    },
}

impl Resource {
    /// Comments under `post_id`.
    #[must_use]
    pub fn comments(post_id: impl Into<String>) -> Self {
        Self::Comments {
            post_id: post_id.into(),
        }
    }

    /// Collection path relative to the API base, without a trailing slash.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Posts => "posts".to_string(),
            Self::Events => "events".to_string(),
            Self::Comments { post_id } => format!("posts/{post_id}/comments"),
        }
    }

    /// Path of a single entity in this collection.
    #[must_use]
    pub fn item_path(&self, id: &str) -> String {
        match self {
            Self::Comments { .. } => format!("comments/{id}"),
            _ => format!("{}/{id}", self.path()),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Server-side toggle endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleAction {
    /// Like / unlike.
    React,
    /// Register / unregister for an event.
    Register,
}

impl ToggleAction {
    /// Path segment appended to the entity path.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::React => "like",
            Self::Register => "register",
        }
    }
}

/// Abstract REST operations every backend must provide.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch one page of a collection.
    async fn list(
        &self,
        session: &Session,
        resource: &Resource,
        page: u32,
        limit: u32,
    ) -> ClientResult<RawPage>;

    /// Create an entity; returns the created entity payload.
    async fn create(&self, session: &Session, resource: &Resource, body: Value)
    -> ClientResult<Value>;

    /// Update an entity; returns the updated entity or the changed fields.
    async fn update(
        &self,
        session: &Session,
        resource: &Resource,
        id: &str,
        patch: Value,
    ) -> ClientResult<Value>;

    /// Delete an entity.
    async fn delete(&self, session: &Session, resource: &Resource, id: &str) -> ClientResult<()>;

    /// Flip a server-side toggle on an entity.
    async fn toggle(
        &self,
        session: &Session,
        resource: &Resource,
        id: &str,
        action: ToggleAction,
    ) -> ClientResult<()>;
}
