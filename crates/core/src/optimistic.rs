//! Optimistic mutation controller.
//!
//! Toggles (like, event registration) are applied to the collection before
//! the request is sent and restored from a before/after [`Snapshot`] if the
//! request fails. Create, edit and delete wait for the server: the collection
//! only changes once the backend confirms.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};
use volunteer_common::{ClientError, ClientResult};

use crate::action::{ActionState, AsyncAction};
use crate::backend::ToggleAction;
use crate::collection::PaginatedCollection;
use crate::model::{AsEntity, Event, Keyed};
use crate::normalize::{Normalize, entity_body};

/// A boolean viewer flag with its counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToggleState {
    /// Flag value, e.g. "liked".
    pub active: bool,
    /// Counter value, e.g. the like count.
    pub count: u64,
}

impl ToggleState {
    /// The state after one flip: the flag inverted and the counter moved by one.
    #[must_use]
    pub const fn flipped(self) -> Self {
        Self {
            active: !self.active,
            count: if self.active {
                self.count.saturating_sub(1)
            } else {
                self.count.saturating_add(1)
            },
        }
    }
}

/// Values before and after an optimistic change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot<S> {
    /// Value restored on failure.
    pub before: S,
    /// Value shown while the request is in flight.
    pub after: S,
}

/// Which flag/counter pair a toggle operates on.
pub trait Toggle<T>: Send + Sync {
    /// Backend endpoint to call.
    fn action(&self) -> ToggleAction;
    /// Read the current pair.
    fn read(&self, item: &T) -> ToggleState;
    /// Overwrite the pair.
    fn write(&self, item: &mut T, state: ToggleState);
}

/// Like toggle: `viewerState.liked` and `counters.likeCount`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reaction;

impl<T: AsEntity> Toggle<T> for Reaction {
    fn action(&self) -> ToggleAction {
        ToggleAction::React
    }

    fn read(&self, item: &T) -> ToggleState {
        let entity = item.entity();
        ToggleState {
            active: entity.viewer_state.liked,
            count: entity.counters.like_count,
        }
    }

    fn write(&self, item: &mut T, state: ToggleState) {
        let entity = item.entity_mut();
        entity.viewer_state.liked = state.active;
        entity.counters.like_count = state.count;
    }
}

/// Event registration toggle: `registered` and `registrationCount`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registration;

impl Toggle<Event> for Registration {
    fn action(&self) -> ToggleAction {
        ToggleAction::Register
    }

    fn read(&self, item: &Event) -> ToggleState {
        ToggleState {
            active: item.registered,
            count: item.registration_count,
        }
    }

    fn write(&self, item: &mut Event, state: ToggleState) {
        item.registered = state.active;
        item.registration_count = state.count;
    }
}

/// Where a created entity lands in the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    /// Newest first (feeds).
    #[default]
    Front,
    /// Oldest first (comment threads).
    Back,
}

/// Runs mutations against one collection.
pub struct MutationController<T> {
    collection: Arc<PaginatedCollection<T>>,
    action: AsyncAction,
}

impl<T> MutationController<T>
where
    T: Normalize + Keyed + Clone + Send,
{
    /// Create a controller mutating `collection`.
    #[must_use]
    pub fn new(collection: Arc<PaginatedCollection<T>>) -> Self {
        Self {
            collection,
            action: AsyncAction::new("mutation"),
        }
    }

    /// Collection being mutated.
    #[must_use]
    pub const fn collection(&self) -> &Arc<PaginatedCollection<T>> {
        &self.collection
    }

    /// Observable loading/error state of this controller's requests.
    #[must_use]
    pub const fn action(&self) -> &AsyncAction {
        &self.action
    }

    /// Current loading/error state.
    #[must_use]
    pub fn state(&self) -> ActionState {
        self.action.state()
    }

    fn not_found(&self, id: &str) -> ClientError {
        ClientError::NotFound(format!("{} {id}", self.collection.resource()))
    }

    /// Flip a flag optimistically.
    ///
    /// The new flag and counter are visible in the collection before the
    /// request is sent. If the request fails, the exact previous pair is
    /// written back and the failure returned.
    pub async fn toggle<G: Toggle<T>>(
        &self,
        id: &str,
        toggle: G,
    ) -> ClientResult<Snapshot<ToggleState>> {
        let collection = &self.collection;
        self.action
            .execute(async {
                collection.session().require()?;
                let snapshot = collection
                    .update(id, |item| {
                        let before = toggle.read(item);
                        let after = before.flipped();
                        toggle.write(item, after);
                        Snapshot { before, after }
                    })
                    .ok_or_else(|| self.not_found(id))?;
                debug!(
                    resource = %collection.resource(),
                    id,
                    active = snapshot.after.active,
                    count = snapshot.after.count,
                    "Applied optimistic toggle"
                );

                let result = collection
                    .backend()
                    .toggle(collection.session(), collection.resource(), id, toggle.action())
                    .await;

                if let Err(err) = result {
                    collection.update(id, |item| toggle.write(item, snapshot.before));
                    warn!(
                        resource = %collection.resource(),
                        id,
                        error = %err,
                        "Toggle failed, restored previous state"
                    );
                    return Err(err);
                }
                Ok(snapshot)
            })
            .await
    }

    /// Create an entity and insert the server's version into the collection.
    pub async fn create(&self, body: Value, placement: Placement) -> ClientResult<T> {
        let collection = &self.collection;
        self.action
            .execute(async {
                collection.session().require()?;
                let raw = collection
                    .backend()
                    .create(collection.session(), collection.resource(), body)
                    .await?;
                let item = T::normalize(entity_body(&raw), collection.context());
                let inserted = match placement {
                    Placement::Front => collection.prepend(item.clone()),
                    Placement::Back => collection.append(item.clone()),
                };
                if !inserted {
                    debug!(id = item.key(), "Created entity already present");
                }
                Ok(item)
            })
            .await
    }

    /// Send `patch` and merge the fields the server returns into the entity.
    ///
    /// Nothing changes locally until the server responds. Fields absent from
    /// the response keep their current values.
    pub async fn edit(&self, id: &str, patch: Value) -> ClientResult<T> {
        let collection = &self.collection;
        self.action
            .execute(async {
                collection.session().require()?;
                let response = collection
                    .backend()
                    .update(collection.session(), collection.resource(), id, patch)
                    .await?;
                let body = entity_body(&response);
                let ctx = collection.context();
                let merged = collection.update(id, |item| {
                    item.merge(body, ctx);
                    item.clone()
                });
                Ok(merged.unwrap_or_else(|| T::normalize(body, ctx)))
            })
            .await
    }

    /// Replace the text content of an entity.
    pub async fn edit_content(&self, id: &str, content: &str) -> ClientResult<T> {
        self.edit(id, json!({ "content": content })).await
    }

    /// Delete an entity, removing it locally only after the server confirms.
    ///
    /// Returns the removed entity, or `None` if it was not loaded.
    pub async fn delete(&self, id: &str) -> ClientResult<Option<T>> {
        let collection = &self.collection;
        self.action
            .execute(async {
                collection.session().require()?;
                collection
                    .backend()
                    .delete(collection.session(), collection.resource(), id)
                    .await?;
                let removed = collection.remove(id);
                debug!(
                    resource = %collection.resource(),
                    id,
                    loaded = removed.is_some(),
                    "Deleted entity"
                );
                Ok(removed)
            })
            .await
    }
}
