//! Scripted in-memory backend for tests.
//!
//! Fixture payloads live in the tests that use this module; nothing here is
//! reachable from production code paths.

#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use tokio::sync::watch;
use volunteer_common::{ClientError, ClientResult, Session};

use crate::backend::{Backend, Resource, ToggleAction};
use crate::normalize::RawPage;

/// Backend operation kinds, for scripting failures and inspecting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `list`
    List,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `toggle`
    Toggle,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Operation.
    pub op: MockOp,
    /// Target collection.
    pub resource: Resource,
    /// Entity id for item operations.
    pub id: Option<String>,
    /// Page number for `list`.
    pub page: Option<u32>,
    /// Toggle endpoint for `toggle`.
    pub toggle: Option<ToggleAction>,
    /// Whether the call carried a credential.
    pub authenticated: bool,
}

/// In-memory [`Backend`] with scripted pages and failures.
pub struct MockBackend {
    pages: Mutex<HashMap<(Resource, u32), RawPage>>,
    failures: Mutex<HashMap<MockOp, VecDeque<ClientError>>>,
    update_responses: Mutex<VecDeque<Value>>,
    calls: Mutex<Vec<MockCall>>,
    held: watch::Sender<bool>,
    next_id: Mutex<u64>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create an empty backend; unknown pages come back empty.
    #[must_use]
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            pages: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            update_responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            held,
            next_id: Mutex::new(1),
        }
    }

    /// Serve `items` as page `page` of `total_pages` for `resource`.
    pub fn set_page(&self, resource: &Resource, page: u32, total_pages: u32, items: Vec<Value>) {
        self.pages
            .lock()
            .insert((resource.clone(), page), RawPage::new(items, page, total_pages));
    }

    /// Make the next `op` call fail with `err`.
    pub fn fail_next(&self, op: MockOp, err: ClientError) {
        self.failures.lock().entry(op).or_default().push_back(err);
    }

    /// Respond to the next `update` with `body` instead of echoing the patch.
    pub fn respond_to_update(&self, body: Value) {
        self.update_responses.lock().push_back(body);
    }

    /// Block every call until [`release`](Self::release).
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    /// Let held calls complete.
    pub fn release(&self) {
        self.held.send_replace(false);
    }

    /// Every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Calls of one kind.
    #[must_use]
    pub fn calls_of(&self, op: MockOp) -> Vec<MockCall> {
        self.calls.lock().iter().filter(|c| c.op == op).cloned().collect()
    }

    async fn gate(&self) {
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
    }

    fn record(
        &self,
        op: MockOp,
        session: &Session,
        resource: &Resource,
        id: Option<&str>,
        page: Option<u32>,
        toggle: Option<ToggleAction>,
    ) -> ClientResult<()> {
        self.calls.lock().push(MockCall {
            op,
            resource: resource.clone(),
            id: id.map(str::to_string),
            page,
            toggle,
            authenticated: session.is_authenticated(),
        });
        match self.failures.lock().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn list(
        &self,
        session: &Session,
        resource: &Resource,
        page: u32,
        _limit: u32,
    ) -> ClientResult<RawPage> {
        self.gate().await;
        self.record(MockOp::List, session, resource, None, Some(page), None)?;
        Ok(self
            .pages
            .lock()
            .get(&(resource.clone(), page))
            .cloned()
            .unwrap_or_else(|| RawPage::new(Vec::new(), page, page)))
    }

    async fn create(
        &self,
        session: &Session,
        resource: &Resource,
        body: Value,
    ) -> ClientResult<Value> {
        self.gate().await;
        self.record(MockOp::Create, session, resource, None, None, None)?;
        let id = {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        let mut created = json!({ "id": format!("mock-{id}") });
        if let (Value::Object(created), Value::Object(body)) = (&mut created, body) {
            created.extend(body);
        }
        Ok(created)
    }

    async fn update(
        &self,
        session: &Session,
        resource: &Resource,
        id: &str,
        patch: Value,
    ) -> ClientResult<Value> {
        self.gate().await;
        self.record(MockOp::Update, session, resource, Some(id), None, None)?;
        Ok(self.update_responses.lock().pop_front().unwrap_or(patch))
    }

    async fn delete(&self, session: &Session, resource: &Resource, id: &str) -> ClientResult<()> {
        self.gate().await;
        self.record(MockOp::Delete, session, resource, Some(id), None, None)
    }

    async fn toggle(
        &self,
        session: &Session,
        resource: &Resource,
        id: &str,
        action: ToggleAction,
    ) -> ClientResult<()> {
        self.gate().await;
        self.record(MockOp::Toggle, session, resource, Some(id), None, Some(action))
    }
}
