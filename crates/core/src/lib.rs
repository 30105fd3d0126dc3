//! Client-side data layer for the volunteer hub.
//!
//! - [`normalize`]: turns heterogeneous REST payloads into canonical entities
//! - [`action`]: async operation wrapper with observable loading/error state
//! - [`collection`]: paginated, id-unique entity lists with load-more
//! - [`optimistic`]: optimistic toggles with snapshot rollback, confirmed edit/delete
//! - [`comments`]: parent/children index over a flat comment list
//!
//! Network access goes through the [`Backend`] trait; every call receives an
//! explicit [`volunteer_common::Session`].

pub mod action;
pub mod backend;
pub mod collection;
pub mod comments;
pub mod model;
pub mod normalize;
pub mod optimistic;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use action::{ActionState, AsyncAction};
pub use backend::{Backend, Resource, ToggleAction};
pub use collection::{CollectionState, PaginatedCollection};
pub use comments::CommentTree;
pub use model::{
    AsEntity, Author, Comment, Counters, Entity, Event, Keyed, Media, MediaKind, Post, ViewerState,
};
pub use normalize::{EntityPatch, Normalize, NormalizeContext, RawPage, entity_body};
pub use optimistic::{
    MutationController, Placement, Reaction, Registration, Snapshot, Toggle, ToggleState,
};
