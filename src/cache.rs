use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use time::{Date, OffsetDateTime};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, warn};

use crate::client::{ApiClient, Envelope, RequestKey};
use crate::error::{Error, Result};
use crate::model::{
    Book, BookId, BookInfo, BookSelection, BorrowRecord, BorrowRequest, Genre, Receipt,
};
use crate::notify::{Notifier, Severity, Silent};
use crate::validate;

const INVALIDATION_BUS_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Book,
    FilteredBooks,
    SomeBooks,
    BorrowSummary,
}

/// Read operations against the catalog API. Each query knows its route,
/// its serialized parameters, and the tags its cached result carries.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    AllBooks,
    BookById(BookId),
    SomeBooks { limit: u32 },
    FilteredBooks(BookSelection),
    Genres,
    Authors,
    BorrowSummary,
}

impl Query {
    pub fn request_key(&self) -> RequestKey {
        match self {
            Self::AllBooks => RequestKey::bare("all-books", "/books"),
            Self::BookById(id) => RequestKey::bare("book", &format!("/books/{id}")),
            Self::SomeBooks { limit } => RequestKey::with_params(
                "sample",
                "/books",
                vec![("limit".to_owned(), limit.to_string())],
            ),
            Self::FilteredBooks(selection) => {
                RequestKey::with_params("listing", "/books", selection.params())
            }
            Self::Genres => RequestKey::bare("genres", "/books/genres"),
            Self::Authors => RequestKey::bare("authors", "/books/authors"),
            Self::BorrowSummary => RequestKey::bare("borrow-summary", "/borrow"),
        }
    }

    // Genres and authors feed the filter controls, so they refresh with
    // the filtered listings.
    pub fn provides(&self) -> &'static [Tag] {
        match self {
            Self::BookById(_) => &[Tag::Book],
            Self::SomeBooks { .. } => &[Tag::SomeBooks],
            Self::AllBooks | Self::FilteredBooks(_) | Self::Genres | Self::Authors => {
                &[Tag::FilteredBooks]
            }
            Self::BorrowSummary => &[Tag::BorrowSummary],
        }
    }
}

/// State-changing operations, with the tag sets they invalidate on
/// success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    CreateBook,
    UpdateBook,
    DeleteBook,
    BorrowBook,
}

impl Mutation {
    pub fn invalidates(&self) -> &'static [Tag] {
        match self {
            Self::CreateBook => &[Tag::FilteredBooks],
            Self::UpdateBook => &[Tag::Book],
            Self::DeleteBook => &[Tag::FilteredBooks, Tag::SomeBooks],
            Self::BorrowBook => &[Tag::BorrowSummary],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Loading,
    Success,
    Error,
}

struct Entry {
    phase: QueryPhase,
    tags: &'static [Tag],
    value: Option<JsonValue>,
}

#[derive(Clone, Debug)]
struct Invalidation {
    tags: &'static [Tag],
}

/// The catalog client: a keyed response cache over [`ApiClient`] plus
/// the invalidation dispatcher that keeps live subscriptions fresh.
/// Cheap to clone; clones share one store.
pub struct Catalog<N = Silent> {
    inner: Arc<CatalogInner<N>>,
}

struct CatalogInner<N> {
    client: ApiClient,
    notifier: N,
    store: RwLock<HashMap<RequestKey, Entry>>,
    invalidations: broadcast::Sender<Invalidation>,
}

impl<N> Clone for Catalog<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Catalog<Silent> {
    pub fn new(client: ApiClient) -> Self {
        Self::with_notifier(client, Silent)
    }
}

impl<N> Catalog<N>
where
    N: Notifier + 'static,
{
    pub fn with_notifier(client: ApiClient, notifier: N) -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_BUS_CAPACITY);
        Self {
            inner: Arc::new(CatalogInner {
                client,
                notifier,
                store: RwLock::new(HashMap::new()),
                invalidations,
            }),
        }
    }

    pub async fn all_books(&self) -> Result<Vec<Book>> {
        self.fetch(&Query::AllBooks).await
    }

    pub async fn book_by_id(&self, id: &BookId) -> Result<Book> {
        let BookId(raw) = id;
        if raw.trim().is_empty() {
            return Err(Error::NotFound("(empty identifier)".to_owned()));
        }
        match self.fetch(&Query::BookById(id.clone())).await {
            Err(Error::Api {
                status: StatusCode::NOT_FOUND,
                ..
            }) => Err(Error::NotFound(raw.clone())),
            outcome => outcome,
        }
    }

    pub async fn some_books(&self, limit: u32) -> Result<Vec<Book>> {
        self.fetch(&Query::SomeBooks { limit }).await
    }

    pub async fn filtered_books(&self, selection: &BookSelection) -> Result<Vec<Book>> {
        self.fetch(&Query::FilteredBooks(selection.clone())).await
    }

    pub async fn genres(&self) -> Result<Vec<Genre>> {
        self.fetch(&Query::Genres).await
    }

    pub async fn authors(&self) -> Result<Vec<String>> {
        self.fetch(&Query::Authors).await
    }

    pub async fn borrow_summary(&self) -> Result<Vec<BorrowRecord>> {
        self.fetch(&Query::BorrowSummary).await
    }

    pub async fn create_book(&self, info: &BookInfo) -> Result<Book> {
        let outcome = self.inner.client.submit(Method::POST, "/books", info).await;
        let envelope = self.settle_mutation(Mutation::CreateBook, outcome).await?;
        Ok(serde_json::from_value(envelope.data("/books")?)?)
    }

    pub async fn update_book(&self, id: &BookId, info: &BookInfo) -> Result<Book> {
        let path = format!("/books/{id}");
        let outcome = self.inner.client.submit(Method::PUT, &path, info).await;
        let envelope = self.settle_mutation(Mutation::UpdateBook, outcome).await?;
        Ok(serde_json::from_value(envelope.data(&path)?)?)
    }

    pub async fn delete_book(&self, id: &BookId) -> Result<Receipt> {
        let path = format!("/books/{id}");
        let outcome = self.inner.client.remove(&path).await;
        let envelope = self.settle_mutation(Mutation::DeleteBook, outcome).await?;
        Ok(Receipt {
            success: envelope.success,
            message: envelope.message_or("Book deleted successfully"),
        })
    }

    /// Validates client-side first; an invalid borrow never reaches the
    /// network. Returns the server's acknowledgement message.
    pub async fn borrow_book(&self, book: &Book, quantity: u32, due_date: Date) -> Result<String> {
        let today = OffsetDateTime::now_utc().date();
        let check = validate::check_borrow(quantity, book.info.copies, due_date, today);
        if !check.is_ok() {
            if let Some(message) = check.first() {
                self.inner.notifier.notify(Severity::Error, message);
            }
            return Err(Error::Validation(check));
        }

        let request = BorrowRequest {
            book: book.id.clone(),
            quantity,
            due_date,
        };
        let outcome = self
            .inner
            .client
            .submit(Method::POST, "/borrow", &request)
            .await;
        let envelope = self.settle_mutation(Mutation::BorrowBook, outcome).await?;
        Ok(envelope.message_or("Book borrowed successfully"))
    }

    pub fn watch_all_books(&self) -> LiveQuery<Vec<Book>> {
        self.mount(Query::AllBooks)
    }

    pub fn watch_book(&self, id: &BookId) -> LiveQuery<Book> {
        self.mount(Query::BookById(id.clone()))
    }

    pub fn watch_some_books(&self, limit: u32) -> LiveQuery<Vec<Book>> {
        self.mount(Query::SomeBooks { limit })
    }

    pub fn watch_filtered_books(&self, selection: &BookSelection) -> LiveQuery<Vec<Book>> {
        self.mount(Query::FilteredBooks(selection.clone()))
    }

    pub fn watch_genres(&self) -> LiveQuery<Vec<Genre>> {
        self.mount(Query::Genres)
    }

    pub fn watch_authors(&self) -> LiveQuery<Vec<String>> {
        self.mount(Query::Authors)
    }

    pub fn watch_borrow_summary(&self) -> LiveQuery<Vec<BorrowRecord>> {
        self.mount(Query::BorrowSummary)
    }

    pub async fn query_phase(&self, query: &Query) -> QueryPhase {
        let store = self.inner.store.read().await;
        store
            .get(&query.request_key())
            .map(|entry| entry.phase)
            .unwrap_or(QueryPhase::Idle)
    }

    async fn fetch<T>(&self, query: &Query) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.fetch_value(query).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn fetch_value(&self, query: &Query) -> Result<JsonValue> {
        let key = query.request_key();
        if let Some(value) = self.cached(&key).await {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }

        self.mark(&key, query.provides(), QueryPhase::Loading).await;
        match self.fetch_fresh(&key).await {
            Ok(value) => {
                let mut store = self.inner.store.write().await;
                store.insert(
                    key,
                    Entry {
                        phase: QueryPhase::Success,
                        tags: query.provides(),
                        value: Some(value.clone()),
                    },
                );
                Ok(value)
            }
            Err(error) => {
                self.mark(&key, query.provides(), QueryPhase::Error).await;
                warn!(key = %key, %error, "query failed");
                self.inner.notifier.notify(Severity::Error, &error.to_string());
                Err(error)
            }
        }
    }

    async fn fetch_fresh(&self, key: &RequestKey) -> Result<JsonValue> {
        let envelope = self.inner.client.fetch(key).await?;
        envelope.data(&key.path)
    }

    // Only a Success entry serves hits; an Error entry makes the next
    // call try the network again.
    async fn cached(&self, key: &RequestKey) -> Option<JsonValue> {
        let store = self.inner.store.read().await;
        let entry = store.get(key)?;
        match entry.phase {
            QueryPhase::Success => entry.value.clone(),
            _ => None,
        }
    }

    async fn mark(&self, key: &RequestKey, tags: &'static [Tag], phase: QueryPhase) {
        let mut store = self.inner.store.write().await;
        let entry = store.entry(key.clone()).or_insert(Entry {
            phase: QueryPhase::Idle,
            tags,
            value: None,
        });
        entry.phase = phase;
        if phase != QueryPhase::Success {
            entry.value = None;
        }
    }

    async fn settle_mutation(
        &self,
        mutation: Mutation,
        outcome: Result<Envelope>,
    ) -> Result<Envelope> {
        match outcome {
            Ok(envelope) => {
                self.invalidate(mutation.invalidates()).await;
                Ok(envelope)
            }
            Err(error) => {
                warn!(?mutation, %error, "mutation failed");
                self.inner.notifier.notify(Severity::Error, &error.to_string());
                Err(error)
            }
        }
    }

    // Evict before broadcasting so refetching subscribers miss the
    // cache and hit the network.
    async fn invalidate(&self, tags: &'static [Tag]) {
        {
            let mut store = self.inner.store.write().await;
            store.retain(|_, entry| !intersects(entry.tags, tags));
        }
        debug!(?tags, "invalidated");
        let _ = self.inner.invalidations.send(Invalidation { tags });
    }

    fn mount<T>(&self, query: Query) -> LiveQuery<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(QueryState::Loading);
        let mut invalidations = self.inner.invalidations.subscribe();
        let catalog = self.clone();
        tokio::spawn(async move {
            let state = catalog.query_state(&query).await;
            if tx.send(state).is_err() {
                return;
            }
            loop {
                tokio::select! {
                    received = invalidations.recv() => {
                        let refetch = match received {
                            Ok(invalidation) => intersects(invalidation.tags, query.provides()),
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, "invalidation stream lagged");
                                true
                            }
                            Err(RecvError::Closed) => break,
                        };
                        if !refetch {
                            continue;
                        }
                        if tx.send(QueryState::Loading).is_err() {
                            break;
                        }
                        let state = catalog.query_state(&query).await;
                        if tx.send(state).is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
        });
        LiveQuery { rx }
    }

    async fn query_state<T>(&self, query: &Query) -> QueryState<T>
    where
        T: DeserializeOwned,
    {
        match self.fetch(query).await {
            Ok(value) => QueryState::Success(value),
            Err(error) => QueryState::Error(error.to_string()),
        }
    }
}

fn intersects(provided: &[Tag], invalidated: &[Tag]) -> bool {
    provided.iter().any(|tag| invalidated.contains(tag))
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryState<T> {
    Loading,
    Success(T),
    Error(String),
}

/// A mounted query. Holds the latest [`QueryState`] and refetches
/// whenever one of its tags is invalidated; dropping it ends the
/// subscription.
pub struct LiveQuery<T> {
    rx: watch::Receiver<QueryState<T>>,
}

impl<T> LiveQuery<T>
where
    T: Clone,
{
    pub fn state(&self) -> QueryState<T> {
        self.rx.borrow().clone()
    }

    /// Next state change after the last one observed through this
    /// handle, or None once the catalog is gone.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Waits until the query settles out of `Loading`.
    pub async fn ready(&mut self) -> QueryState<T> {
        loop {
            let state = self.rx.borrow_and_update().clone();
            if !matches!(state, QueryState::Loading) {
                return state;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}
