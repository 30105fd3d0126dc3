//! Paginated collection store.
//!
//! Holds one ordered, id-unique list of normalized entities for a screen
//! together with its page bookkeeping. A refresh replaces the list; loading
//! more appends the next page and drops entities already present, keeping the
//! earlier occurrence in place.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use volunteer_common::{ClientResult, Session};

use crate::backend::{Backend, Resource};
use crate::model::Keyed;
use crate::normalize::{Normalize, NormalizeContext};

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Snapshot of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionState<T> {
    /// Entities in fetch order, unique by id.
    pub items: Vec<T>,
    /// Last page successfully fetched (starts at 1).
    pub page: u32,
    /// Whether the backend reported further pages.
    pub has_more: bool,
    /// A fetch is in flight.
    pub loading: bool,
    /// Human-readable message of the last failed fetch.
    pub error: Option<String>,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            has_more: false,
            loading: false,
            error: None,
        }
    }
}

impl<T: Keyed> CollectionState<T> {
    fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.key() == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.key() == id)
    }

    fn replace_items(&mut self, fetched: Vec<T>) {
        self.items.clear();
        self.append_unique(fetched);
    }

    fn append_unique(&mut self, fetched: Vec<T>) -> usize {
        let mut seen: HashSet<String> = self.items.iter().map(|i| i.key().to_string()).collect();
        let before = self.items.len();
        for item in fetched {
            if seen.insert(item.key().to_string()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }
}

/// Paginated, id-unique entity list backed by a [`Backend`].
pub struct PaginatedCollection<T> {
    backend: Arc<dyn Backend>,
    session: Session,
    resource: Resource,
    ctx: NormalizeContext,
    page_size: u32,
    state: Mutex<CollectionState<T>>,
}

impl<T> PaginatedCollection<T>
where
    T: Normalize + Keyed + Clone + Send,
{
    /// Create an empty collection for `resource`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Session,
        resource: Resource,
        ctx: NormalizeContext,
    ) -> Self {
        Self {
            backend,
            session,
            resource,
            ctx,
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(CollectionState::default()),
        }
    }

    /// Set the number of entities requested per page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Backend this collection reads from.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Session passed to every call.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Backend collection.
    #[must_use]
    pub const fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Normalization settings.
    #[must_use]
    pub const fn context(&self) -> &NormalizeContext {
        &self.ctx
    }

    /// Copy of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> CollectionState<T> {
        self.state.lock().clone()
    }

    /// Copy of the items.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.state.lock().items.clone()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the collection holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Copy of the item with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<T> {
        let state = self.state.lock();
        state.position(id).map(|index| state.items[index].clone())
    }

    /// Whether further pages exist.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    /// Whether a fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Message of the last failed fetch.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// Fetch page 1 and replace the items with it.
    pub async fn refresh(&self) -> ClientResult<()> {
        self.fetch_page(1, true).await
    }

    /// Fetch `page`; with `replace` the items become exactly that page,
    /// otherwise the page is appended without duplicating ids.
    ///
    /// On failure the items are left untouched and `error` is set.
    pub async fn fetch_page(&self, page: u32, replace: bool) -> ClientResult<()> {
        {
            let mut state = self.state.lock();
            state.loading = true;
            state.error = None;
        }
        self.load(page.max(1), replace).await
    }

    /// Fetch the page after the current one.
    ///
    /// Returns `Ok(false)` without touching the backend while a fetch is in
    /// flight or when no further page exists.
    pub async fn load_more(&self) -> ClientResult<bool> {
        let next = {
            let mut state = self.state.lock();
            if state.loading || !state.has_more {
                return Ok(false);
            }
            state.loading = true;
            state.error = None;
            state.page + 1
        };
        self.load(next, false).await.map(|()| true)
    }

    async fn load(&self, page: u32, replace: bool) -> ClientResult<()> {
        debug!(resource = %self.resource, page, replace, "Fetching page");
        let result = self
            .backend
            .list(&self.session, &self.resource, page, self.page_size)
            .await;

        let mut state = self.state.lock();
        state.loading = false;
        match result {
            Ok(raw) => {
                let fetched: Vec<T> = raw.normalize(&self.ctx);
                let received = fetched.len();
                if replace {
                    state.replace_items(fetched);
                } else {
                    let added = state.append_unique(fetched);
                    if added < received {
                        debug!(
                            resource = %self.resource,
                            page,
                            dropped = received - added,
                            "Dropped entities already present"
                        );
                    }
                }
                state.page = page;
                state.has_more = raw.has_more(page);
                debug!(
                    resource = %self.resource,
                    page,
                    total = state.items.len(),
                    has_more = state.has_more,
                    "Page loaded"
                );
                Ok(())
            }
            Err(err) => {
                warn!(resource = %self.resource, page, error = %err, "Failed to fetch page");
                state.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    // === Local mutations ===

    /// Insert `item` at the front unless its id is already present.
    pub fn prepend(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.contains(item.key()) {
            return false;
        }
        state.items.insert(0, item);
        true
    }

    /// Insert `item` at the back unless its id is already present.
    pub fn append(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.contains(item.key()) {
            return false;
        }
        state.items.push(item);
        true
    }

    /// Mutate the item with `id` in place. Returns `None` for unknown ids.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut state = self.state.lock();
        let index = state.position(id)?;
        Some(f(&mut state.items[index]))
    }

    /// Remove and return the item with `id`.
    pub fn remove(&self, id: &str) -> Option<T> {
        let mut state = self.state.lock();
        let index = state.position(id)?;
        Some(state.items.remove(index))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::Post;
    use crate::testing::{MockBackend, MockOp};
    use serde_json::json;
    use volunteer_common::ClientError;

    fn collection(backend: &Arc<MockBackend>) -> PaginatedCollection<Post> {
        PaginatedCollection::new(
            backend.clone(),
            Session::anonymous(),
            Resource::Posts,
            NormalizeContext::default(),
        )
    }

    fn ids(collection: &PaginatedCollection<Post>) -> Vec<String> {
        collection
            .items()
            .iter()
            .map(|p| p.entity.id.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_first_page_then_load_more() {
        let backend = Arc::new(MockBackend::new());
        backend.set_page(&Resource::Posts, 1, 2, vec![json!({"postId": "a", "text": "one"})]);
        backend.set_page(&Resource::Posts, 2, 2, vec![json!({"postId": "b", "text": "two"})]);
        let posts = collection(&backend);

        posts.fetch_page(1, true).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts.has_more());

        assert!(posts.load_more().await.unwrap());
        assert_eq!(ids(&posts), vec!["a", "b"]);
        assert!(!posts.has_more());
        assert_eq!(posts.snapshot().page, 2);

        assert!(!posts.load_more().await.unwrap());
        assert_eq!(backend.calls_of(MockOp::List).len(), 2);
    }

    #[tokio::test]
    async fn test_three_pages_stay_unique() {
        let backend = Arc::new(MockBackend::new());
        backend.set_page(
            &Resource::Posts,
            1,
            3,
            vec![json!({"id": "1"}), json!({"id": "2"}), json!({"id": "2"})],
        );
        backend.set_page(
            &Resource::Posts,
            2,
            3,
            vec![json!({"id": "3", "text": "late copy"}), json!({"id": "1", "text": "dup"})],
        );
        backend.set_page(&Resource::Posts, 3, 3, vec![json!({"id": "4"}), json!({"id": "3"})]);
        let posts = collection(&backend);

        posts.refresh().await.unwrap();
        assert!(posts.load_more().await.unwrap());
        assert!(posts.load_more().await.unwrap());

        assert_eq!(ids(&posts), vec!["1", "2", "3", "4"]);
        assert!(!posts.has_more());
        // The earlier occurrence wins.
        assert_eq!(posts.get("1").unwrap().entity.content, "");
        assert_eq!(posts.get("3").unwrap().entity.content, "late copy");
    }

    #[tokio::test]
    async fn test_refresh_replaces_items() {
        let backend = Arc::new(MockBackend::new());
        backend.set_page(&Resource::Posts, 1, 2, vec![json!({"id": "a"})]);
        backend.set_page(&Resource::Posts, 2, 2, vec![json!({"id": "b"})]);
        let posts = collection(&backend);

        posts.refresh().await.unwrap();
        posts.load_more().await.unwrap();
        assert_eq!(posts.len(), 2);

        backend.set_page(&Resource::Posts, 1, 1, vec![json!({"id": "z"})]);
        posts.refresh().await.unwrap();
        assert_eq!(ids(&posts), vec!["z"]);
        assert_eq!(posts.snapshot().page, 1);
        assert!(!posts.has_more());
    }

    #[tokio::test]
    async fn test_failure_keeps_items() {
        let backend = Arc::new(MockBackend::new());
        backend.set_page(&Resource::Posts, 1, 2, vec![json!({"id": "a"})]);
        backend.set_page(&Resource::Posts, 2, 2, vec![json!({"id": "b"})]);
        let posts = collection(&backend);
        posts.refresh().await.unwrap();

        backend.fail_next(MockOp::List, ClientError::Transport("timeout".into()));
        let err = posts.load_more().await.unwrap_err();
        assert_eq!(err, ClientError::Transport("timeout".into()));

        let state = posts.snapshot();
        assert_eq!(ids(&posts), vec!["a"]);
        assert_eq!(state.page, 1);
        assert!(state.has_more);
        assert!(!state.loading);
        assert_eq!(
            state.error.as_deref(),
            Some("Could not reach the server. Check your connection.")
        );

        assert!(posts.load_more().await.unwrap());
        assert_eq!(ids(&posts), vec!["a", "b"]);
        assert!(posts.error().is_none());
    }

    #[tokio::test]
    async fn test_load_more_is_guarded_while_loading() {
        let backend = Arc::new(MockBackend::new());
        backend.set_page(&Resource::Posts, 1, 3, vec![json!({"id": "a"})]);
        backend.set_page(&Resource::Posts, 2, 3, vec![json!({"id": "b"})]);
        let posts = collection(&backend);
        posts.refresh().await.unwrap();

        backend.hold();
        let (first, second, ()) = futures::join!(posts.load_more(), posts.load_more(), async {
            backend.release();
        });

        assert!(first.unwrap());
        assert!(!second.unwrap());
        assert_eq!(backend.calls_of(MockOp::List).len(), 2);
        assert_eq!(ids(&posts), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_pagination_means_last_page() {
        let backend = Arc::new(MockBackend::new());
        let posts = collection(&backend);
        posts.refresh().await.unwrap();
        assert!(posts.is_empty());
        assert!(!posts.has_more());
        assert!(!posts.load_more().await.unwrap());
    }

    #[test]
    fn test_local_mutations() {
        let backend = Arc::new(MockBackend::new());
        let posts = collection(&backend);
        let post = |id: &str| Post::normalize(&json!({"id": id}), &NormalizeContext::default());

        assert!(posts.append(post("a")));
        assert!(posts.prepend(post("b")));
        assert!(!posts.prepend(post("a")));
        assert_eq!(ids(&posts), vec!["b", "a"]);

        let updated = posts.update("a", |p| {
            p.entity.content = "edited".into();
        });
        assert!(updated.is_some());
        assert_eq!(posts.get("a").unwrap().entity.content, "edited");
        assert!(posts.update("zzz", |_| ()).is_none());

        assert!(posts.remove("b").is_some());
        assert!(posts.remove("b").is_none());
        assert_eq!(ids(&posts), vec!["a"]);
    }
}
