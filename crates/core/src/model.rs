//! Canonical entity model.
//!
//! Serialized field names are camelCase and each one is also accepted by the
//! normalizer, so a normalized entity can be serialized and normalized again
//! without change.

use serde::{Deserialize, Serialize};

/// Owning user of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    /// User id. Empty when the payload carried none.
    pub id: String,
    /// Name shown next to the entity.
    pub display_name: String,
    /// Absolute avatar URL.
    pub avatar_url: Option<String>,
}

/// Kind of a media attachment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image.
    #[default]
    Image,
    /// Video clip.
    Video,
}

/// Media attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Attachment kind.
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Absolute URL.
    pub url: String,
}

/// Engagement counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    /// Number of likes.
    pub like_count: u64,
    /// Number of comments.
    pub comment_count: u64,
}

/// State relative to the current viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerState {
    /// Whether the viewer liked the entity.
    pub liked: bool,
}

/// Fields shared by posts, comments and events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique identifier.
    pub id: String,
    /// Owning user.
    pub author: Author,
    /// Free text, possibly empty.
    pub content: String,
    /// Attachments in display order.
    pub media: Vec<Media>,
    /// Engagement counters.
    pub counters: Counters,
    /// Viewer-relative flags.
    pub viewer_state: ViewerState,
    /// ISO 8601 creation time, kept verbatim.
    pub created_at: String,
}

/// Feed post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Shared entity fields.
    #[serde(flatten)]
    pub entity: Entity,
}

/// Comment on a post; `parent_id` is `None` for root comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Shared entity fields.
    #[serde(flatten)]
    pub entity: Entity,
    /// Id of the comment this one replies to.
    pub parent_id: Option<String>,
}

/// Volunteering event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Shared entity fields. `content` holds the event description.
    #[serde(flatten)]
    pub entity: Entity,
    /// Event title.
    pub title: String,
    /// Venue or address.
    pub location: Option<String>,
    /// ISO 8601 start time.
    pub starts_at: Option<String>,
    /// ISO 8601 end time.
    pub ends_at: Option<String>,
    /// Maximum number of volunteers, if limited.
    pub capacity: Option<u64>,
    /// Number of registered volunteers.
    pub registration_count: u64,
    /// Whether the viewer is registered.
    pub registered: bool,
}

/// Anything stored in a collection by id.
pub trait Keyed {
    /// Stable identifier.
    fn key(&self) -> &str;
}

/// Access to the shared entity fields.
pub trait AsEntity {
    /// Shared fields.
    fn entity(&self) -> &Entity;
    /// Shared fields, mutably.
    fn entity_mut(&mut self) -> &mut Entity;
}

impl AsEntity for Entity {
    fn entity(&self) -> &Entity {
        self
    }

    fn entity_mut(&mut self) -> &mut Entity {
        self
    }
}

macro_rules! wraps_entity {
    ($($ty:ty),*) => {
        $(
            impl AsEntity for $ty {
                fn entity(&self) -> &Entity {
                    &self.entity
                }

                fn entity_mut(&mut self) -> &mut Entity {
                    &mut self.entity
                }
            }
        )*
    };
}

wraps_entity!(Post, Comment, Event);

impl<T: AsEntity> Keyed for T {
    fn key(&self) -> &str {
        &self.entity().id
    }
}

impl Comment {
    /// Whether this comment replies to nothing.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Event {
    /// Whether the event has no free spots left.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.registration_count >= capacity)
    }
}
