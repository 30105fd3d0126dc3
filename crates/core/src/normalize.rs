//! Entity normalizer.
//!
//! Backend payloads name the same logical field differently depending on the
//! endpoint (`id`/`postId`, `user`/`author`, `avatar`/`avatarUrl`, ...). Each
//! logical field has one ordered alias list here; the first alias holding a
//! usable value wins. Normalization never fails: a missing field takes its
//! default (empty string, 0, `false`, `None` or an empty list).

use serde_json::Value;
use url::Url;
use volunteer_common::{ClientResult, Config};

use crate::model::{Author, Comment, Counters, Entity, Event, Media, MediaKind, Post, ViewerState};

// === Alias tables ===
//
// Dotted entries address nested objects. Every canonical serialized name
// appears in its table so normalized output re-normalizes to itself.

const ID: &[&str] = &["id", "_id", "postId", "commentId", "eventId", "uuid"];
const AUTHOR_OBJECT: &[&str] = &["author", "user", "createdBy", "owner", "organizer", "postedBy"];
const AUTHOR_ID: &[&str] = &["id", "_id", "userId"];
const AUTHOR_NAME: &[&str] = &["displayName", "name", "fullName", "username"];
const AUTHOR_AVATAR: &[&str] = &["avatarUrl", "avatar", "profilePicture", "profileImage", "image"];
const FLAT_AUTHOR_ID: &[&str] = &["authorId", "userId", "user_id"];
const FLAT_AUTHOR_NAME: &[&str] = &["authorName", "userName", "username"];
const FLAT_AUTHOR_AVATAR: &[&str] = &["authorAvatar", "userAvatar", "avatarUrl", "avatar"];
const CONTENT: &[&str] = &["content", "text", "body", "description", "message"];
const MEDIA_LIST: &[&str] = &["media", "attachments", "images", "files"];
const MEDIA_SINGLE: &[(&str, MediaKind)] = &[
    ("imageUrl", MediaKind::Image),
    ("image", MediaKind::Image),
    ("videoUrl", MediaKind::Video),
    ("video", MediaKind::Video),
];
const MEDIA_URL: &[&str] = &["url", "src", "uri", "href", "path"];
const MEDIA_TYPE: &[&str] = &["type", "mediaType", "mimeType", "mime", "kind"];
const LIKE_COUNT: &[&str] = &[
    "counters.likeCount",
    "likeCount",
    "likesCount",
    "like_count",
    "likes_count",
    "reactionCount",
    "likes",
];
const COMMENT_COUNT: &[&str] = &[
    "counters.commentCount",
    "commentCount",
    "commentsCount",
    "comment_count",
    "comments_count",
    "replyCount",
    "comments",
];
const LIKED: &[&str] = &["viewerState.liked", "liked", "isLiked", "hasLiked", "likedByMe", "is_liked"];
const CREATED_AT: &[&str] = &["createdAt", "created_at", "timestamp", "postedAt", "date"];
const PARENT_ID: &[&str] = &["parentId", "parent_id", "parentCommentId", "replyTo", "parent.id", "parent"];

const EVENT_TITLE: &[&str] = &["title", "name"];
const EVENT_LOCATION: &[&str] = &["location", "venue", "address", "location.name", "location.address"];
const EVENT_STARTS_AT: &[&str] = &["startsAt", "startDate", "start_date", "startTime", "start"];
const EVENT_ENDS_AT: &[&str] = &["endsAt", "endDate", "end_date", "endTime", "end"];
const EVENT_CAPACITY: &[&str] = &["capacity", "maxVolunteers", "maxParticipants", "slots"];
const EVENT_REGISTRATIONS: &[&str] = &[
    "registrationCount",
    "registeredCount",
    "volunteerCount",
    "participantsCount",
    "registrations",
    "participants",
    "volunteers",
];
const EVENT_REGISTERED: &[&str] = &["registered", "isRegistered", "viewerState.registered", "joined", "isJoined"];

const PAGE_ITEMS: &[&str] = &["items", "data", "results", "posts", "comments", "events", "data.items"];
const PAGINATION_OBJECT: &[&str] = &["pagination", "meta", "pageInfo", "data.pagination"];
const CURRENT_PAGE: &[&str] = &["currentPage", "page", "current_page"];
const TOTAL_PAGES: &[&str] = &["totalPages", "pages", "lastPage", "total_pages"];
const HAS_MORE: &[&str] = &["hasMore", "hasNextPage", "has_more"];
const ENTITY_ENVELOPE: &[&str] = &["data", "post", "comment", "event", "item", "result"];

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mov", ".m4v", ".ogv", ".mkv"];

/// Settings the normalizer needs from outside the payload.
#[derive(Debug, Clone, Default)]
pub struct NormalizeContext {
    asset_base: Option<Url>,
}

impl NormalizeContext {
    /// Create a context resolving relative asset paths against `asset_base`.
    pub fn new(asset_base: Option<&str>) -> ClientResult<Self> {
        let asset_base = match asset_base.map(str::trim).filter(|base| !base.is_empty()) {
            Some(base) if base.ends_with('/') => Some(Url::parse(base)?),
            Some(base) => Some(Url::parse(&format!("{base}/"))?),
            None => None,
        };
        Ok(Self { asset_base })
    }

    /// Create a context from the `assets` configuration section.
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        Self::new(config.assets.base_url.as_deref())
    }

    /// Resolve an avatar or media reference to an absolute URL.
    ///
    /// Absolute URLs are returned unchanged; relative ones are joined with the
    /// asset base (and left as-is when no base is configured). Blank input
    /// yields `None`.
    #[must_use]
    pub fn resolve_url(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if Url::parse(raw).is_ok() {
            return Some(raw.to_string());
        }
        match &self.asset_base {
            Some(base) => Some(
                base.join(raw)
                    .map_or_else(|_| raw.to_string(), |url| url.to_string()),
            ),
            None => Some(raw.to_string()),
        }
    }
}

/// Conversion from a raw payload into a canonical entity.
pub trait Normalize: Sized {
    /// Build the canonical value. Never fails.
    fn normalize(raw: &Value, ctx: &NormalizeContext) -> Self;

    /// Overwrite only the fields `raw` actually carries.
    fn merge(&mut self, raw: &Value, ctx: &NormalizeContext);
}

// === Field lookup ===

fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = raw;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

fn first<'a>(raw: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| lookup(raw, alias))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(raw: &Value, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| lookup(raw, alias).and_then(scalar_string))
}

/// Like [`first_string`] but blank strings do not count as present.
fn first_identifier(raw: &Value, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        lookup(raw, alias)
            .and_then(scalar_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(|n| n.max(0) as u64),
        Value::Array(items) => Some(items.len() as u64),
        _ => None,
    }
}

fn first_count(raw: &Value, aliases: &[&str]) -> Option<u64> {
    aliases.iter().find_map(|alias| lookup(raw, alias).and_then(count))
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn first_bool(raw: &Value, aliases: &[&str]) -> Option<bool> {
    aliases.iter().find_map(|alias| lookup(raw, alias).and_then(flag))
}

// === Author and media ===

fn author(raw: &Value, ctx: &NormalizeContext) -> Option<Author> {
    match first(raw, AUTHOR_OBJECT) {
        Some(object @ Value::Object(_)) => Some(Author {
            id: first_identifier(object, AUTHOR_ID).unwrap_or_default(),
            display_name: first_string(object, AUTHOR_NAME).unwrap_or_default(),
            avatar_url: avatar(object, AUTHOR_AVATAR, ctx),
        }),
        Some(other) => Some(Author {
            id: scalar_string(other).unwrap_or_default(),
            ..flat_author(raw, ctx).unwrap_or_default()
        }),
        None => flat_author(raw, ctx),
    }
}

fn flat_author(raw: &Value, ctx: &NormalizeContext) -> Option<Author> {
    let id = first_identifier(raw, FLAT_AUTHOR_ID);
    let display_name = first_string(raw, FLAT_AUTHOR_NAME);
    let avatar_url = avatar(raw, FLAT_AUTHOR_AVATAR, ctx);
    if id.is_none() && display_name.is_none() && avatar_url.is_none() {
        return None;
    }
    Some(Author {
        id: id.unwrap_or_default(),
        display_name: display_name.unwrap_or_default(),
        avatar_url,
    })
}

fn avatar(raw: &Value, aliases: &[&str], ctx: &NormalizeContext) -> Option<String> {
    aliases.iter().find_map(|alias| {
        let value = lookup(raw, alias)?;
        let reference = match value {
            Value::Object(_) => first_string(value, MEDIA_URL)?,
            other => scalar_string(other)?,
        };
        ctx.resolve_url(&reference)
    })
}

fn infer_kind(url: &str) -> MediaKind {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

fn parse_kind(declared: &str) -> Option<MediaKind> {
    let declared = declared.trim().to_ascii_lowercase();
    if declared.starts_with("video") {
        Some(MediaKind::Video)
    } else if declared.starts_with("image") || declared == "photo" || declared == "gif" {
        Some(MediaKind::Image)
    } else {
        None
    }
}

fn media_item(value: &Value, hint: Option<MediaKind>, ctx: &NormalizeContext) -> Option<Media> {
    let (reference, declared) = match value {
        Value::Object(_) => (first_string(value, MEDIA_URL)?, first_string(value, MEDIA_TYPE)),
        other => (scalar_string(other)?, None),
    };
    let url = ctx.resolve_url(&reference)?;
    let kind = declared
        .as_deref()
        .and_then(parse_kind)
        .or(hint)
        .unwrap_or_else(|| infer_kind(&url));
    Some(Media { kind, url })
}

fn media(raw: &Value, ctx: &NormalizeContext) -> Option<Vec<Media>> {
    if let Some(list) = MEDIA_LIST
        .iter()
        .find_map(|alias| lookup(raw, alias).and_then(Value::as_array))
    {
        return Some(
            list.iter()
                .filter_map(|item| media_item(item, None, ctx))
                .collect(),
        );
    }

    let singles: Vec<Media> = MEDIA_SINGLE
        .iter()
        .filter_map(|(alias, kind)| {
            lookup(raw, alias).and_then(|value| media_item(value, Some(*kind), ctx))
        })
        .collect();
    (!singles.is_empty()).then_some(singles)
}

// === Entity patch ===

/// Fields found in a payload, without defaults applied.
///
/// Used both to build a full [`Entity`] and to merge a server response into
/// an existing one without touching fields the response left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityPatch {
    /// Identifier.
    pub id: Option<String>,
    /// Owning user.
    pub author: Option<Author>,
    /// Free text.
    pub content: Option<String>,
    /// Attachments.
    pub media: Option<Vec<Media>>,
    /// Like counter.
    pub like_count: Option<u64>,
    /// Comment counter.
    pub comment_count: Option<u64>,
    /// Viewer like flag.
    pub liked: Option<bool>,
    /// Creation time.
    pub created_at: Option<String>,
}

impl EntityPatch {
    /// Collect every known field present in `raw`.
    #[must_use]
    pub fn from_raw(raw: &Value, ctx: &NormalizeContext) -> Self {
        Self {
            id: first_identifier(raw, ID),
            author: author(raw, ctx),
            content: first_string(raw, CONTENT),
            media: media(raw, ctx),
            like_count: first_count(raw, LIKE_COUNT),
            comment_count: first_count(raw, COMMENT_COUNT),
            liked: first_bool(raw, LIKED),
            created_at: first_string(raw, CREATED_AT),
        }
    }

    /// Whether the payload carried no known field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the fields this patch carries. The id is never changed.
    pub fn apply(self, entity: &mut Entity) {
        if let Some(author) = self.author {
            entity.author = author;
        }
        if let Some(content) = self.content {
            entity.content = content;
        }
        if let Some(media) = self.media {
            entity.media = media;
        }
        if let Some(like_count) = self.like_count {
            entity.counters.like_count = like_count;
        }
        if let Some(comment_count) = self.comment_count {
            entity.counters.comment_count = comment_count;
        }
        if let Some(liked) = self.liked {
            entity.viewer_state.liked = liked;
        }
        if let Some(created_at) = self.created_at {
            entity.created_at = created_at;
        }
    }

    /// Build a full entity, defaulting every absent field.
    #[must_use]
    pub fn into_entity(self) -> Entity {
        Entity {
            id: self.id.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            media: self.media.unwrap_or_default(),
            counters: Counters {
                like_count: self.like_count.unwrap_or_default(),
                comment_count: self.comment_count.unwrap_or_default(),
            },
            viewer_state: ViewerState {
                liked: self.liked.unwrap_or_default(),
            },
            created_at: self.created_at.unwrap_or_default(),
        }
    }
}

impl Normalize for Entity {
    fn normalize(raw: &Value, ctx: &NormalizeContext) -> Self {
        EntityPatch::from_raw(raw, ctx).into_entity()
    }

    fn merge(&mut self, raw: &Value, ctx: &NormalizeContext) {
        EntityPatch::from_raw(raw, ctx).apply(self);
    }
}

impl Normalize for Post {
    fn normalize(raw: &Value, ctx: &NormalizeContext) -> Self {
        Self {
            entity: Entity::normalize(raw, ctx),
        }
    }

    fn merge(&mut self, raw: &Value, ctx: &NormalizeContext) {
        self.entity.merge(raw, ctx);
    }
}

impl Normalize for Comment {
    fn normalize(raw: &Value, ctx: &NormalizeContext) -> Self {
        Self {
            entity: Entity::normalize(raw, ctx),
            parent_id: first_identifier(raw, PARENT_ID),
        }
    }

    fn merge(&mut self, raw: &Value, ctx: &NormalizeContext) {
        self.entity.merge(raw, ctx);
        if let Some(parent_id) = first_identifier(raw, PARENT_ID) {
            self.parent_id = Some(parent_id);
        }
    }
}

impl Normalize for Event {
    fn normalize(raw: &Value, ctx: &NormalizeContext) -> Self {
        Self {
            entity: Entity::normalize(raw, ctx),
            title: first_string(raw, EVENT_TITLE).unwrap_or_default(),
            location: first_string(raw, EVENT_LOCATION),
            starts_at: first_string(raw, EVENT_STARTS_AT),
            ends_at: first_string(raw, EVENT_ENDS_AT),
            capacity: first_count(raw, EVENT_CAPACITY),
            registration_count: first_count(raw, EVENT_REGISTRATIONS).unwrap_or_default(),
            registered: first_bool(raw, EVENT_REGISTERED).unwrap_or_default(),
        }
    }

    fn merge(&mut self, raw: &Value, ctx: &NormalizeContext) {
        self.entity.merge(raw, ctx);
        if let Some(title) = first_string(raw, EVENT_TITLE) {
            self.title = title;
        }
        if let Some(location) = first_string(raw, EVENT_LOCATION) {
            self.location = Some(location);
        }
        if let Some(starts_at) = first_string(raw, EVENT_STARTS_AT) {
            self.starts_at = Some(starts_at);
        }
        if let Some(ends_at) = first_string(raw, EVENT_ENDS_AT) {
            self.ends_at = Some(ends_at);
        }
        if let Some(capacity) = first_count(raw, EVENT_CAPACITY) {
            self.capacity = Some(capacity);
        }
        if let Some(count) = first_count(raw, EVENT_REGISTRATIONS) {
            self.registration_count = count;
        }
        if let Some(registered) = first_bool(raw, EVENT_REGISTERED) {
            self.registered = registered;
        }
    }
}

// === Page envelope ===

/// One page of raw items plus whatever pagination metadata came with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    /// Raw entity payloads in server order.
    pub items: Vec<Value>,
    /// Page number reported by the server.
    pub current_page: Option<u32>,
    /// Total number of pages reported by the server.
    pub total_pages: Option<u32>,
    /// Explicit "more pages" flag reported by the server.
    pub has_more: Option<bool>,
}

fn page_number(raw: &Value, aliases: &[&str]) -> Option<u32> {
    first_count(raw, aliases).map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

impl RawPage {
    /// Build a page from items and `currentPage`/`totalPages` metadata.
    #[must_use]
    pub const fn new(items: Vec<Value>, current_page: u32, total_pages: u32) -> Self {
        Self {
            items,
            current_page: Some(current_page),
            total_pages: Some(total_pages),
            has_more: None,
        }
    }

    /// Extract items and pagination from a list response body.
    ///
    /// A bare array is treated as the item list. Anything unrecognizable
    /// yields an empty page rather than an error.
    #[must_use]
    pub fn from_value(body: &Value) -> Self {
        if let Value::Array(items) = body {
            return Self {
                items: items.clone(),
                ..Self::default()
            };
        }

        let items = PAGE_ITEMS
            .iter()
            .find_map(|alias| lookup(body, alias).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default();

        let meta = first(body, PAGINATION_OBJECT)
            .filter(|meta| meta.is_object())
            .unwrap_or(body);

        Self {
            items,
            current_page: page_number(meta, CURRENT_PAGE),
            total_pages: page_number(meta, TOTAL_PAGES),
            has_more: first_bool(meta, HAS_MORE),
        }
    }

    /// Whether another page follows the one fetched as `requested_page`.
    ///
    /// Without any pagination metadata the page is assumed to be the last.
    #[must_use]
    pub fn has_more(&self, requested_page: u32) -> bool {
        if let Some(has_more) = self.has_more {
            return has_more;
        }
        match self.total_pages {
            Some(total) => self.current_page.unwrap_or(requested_page) < total,
            None => false,
        }
    }

    /// Normalize every item on the page.
    #[must_use]
    pub fn normalize<T: Normalize>(&self, ctx: &NormalizeContext) -> Vec<T> {
        self.items.iter().map(|raw| T::normalize(raw, ctx)).collect()
    }
}

// === Entity envelope ===

/// Entity payload inside a single-entity response.
///
/// Create and update responses may wrap the entity together with status
/// fields (`{"success": true, "message": "...", "data": {...}}`). While the
/// current level carries no id, this descends into the first envelope key
/// holding an object. A bare entity is returned as-is.
#[must_use]
pub fn entity_body(body: &Value) -> &Value {
    let mut current = body;
    while first_identifier(current, ID).is_none() {
        let inner = ENTITY_ENVELOPE
            .iter()
            .find_map(|key| current.get(*key).filter(|value| value.is_object()));
        match inner {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}
