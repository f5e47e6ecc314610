//! Token cache over a persistent field store
//!
//! [`TokenCache`] is the minimal per-field contract (read, watch, remove, plus
//! the atomic bulk save and whole-set snapshot). Aggregate operations such as
//! `get_tokens` are free functions in [`crate::helpers`] built only on this trait.
//!
//! [`StoredTokenCache`] serializes every read and write through one tokio
//! Mutex. Storage faults are logged and swallowed: a faulting read yields
//! `None`, a faulting write leaves the in-memory cells untouched.
//!
//! Whole-set reads never combine separate per-field calls: each one lock
//! acquisition sees the six fields as of one point between saves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::cell::ObservableCell;
use crate::error::Result;
use crate::field::{NumberField, TextField, TokenField, parse_number};
use crate::record::CredentialRecord;
use crate::store::{FieldStore, MemoryFieldStore};

/// Boxed future returned by [`TokenCache`] methods.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-field access to cached tokens.
///
/// None of these methods fail: storage faults degrade to "absent".
pub trait TokenCache: Send + Sync {
    /// Current value of a token field, hydrating from the store on first use.
    fn get_text(&self, field: TextField) -> CacheFuture<'_, Option<String>>;

    /// Current value of a numeric field. Malformed persisted text reads as `None`.
    fn get_number(&self, field: NumberField) -> CacheFuture<'_, Option<i64>>;

    /// Subscribe to a token field. The receiver starts at the current value.
    fn watch_text(&self, field: TextField) -> CacheFuture<'_, watch::Receiver<Option<String>>>;

    /// Subscribe to a numeric field. The receiver starts at the current value.
    fn watch_number(&self, field: NumberField)
    -> CacheFuture<'_, watch::Receiver<Option<i64>>>;

    /// Delete one field from the store and clear it in memory.
    fn remove(&self, field: TokenField) -> CacheFuture<'_, ()>;

    /// Persist a complete token set and publish it, as one critical section.
    ///
    /// Optional fields that are `None` are removed from the store.
    fn save_tokens<'a>(&'a self, tokens: &'a CredentialRecord) -> CacheFuture<'a, ()>;

    /// All six fields as one record, read in a single critical section.
    /// `None` when there is no access token.
    fn snapshot(&self) -> CacheFuture<'_, Option<CredentialRecord>>;

    /// Subscribe to the whole token set. A bulk save publishes once, after
    /// every field has been updated.
    fn watch_tokens(&self) -> CacheFuture<'_, watch::Receiver<Option<CredentialRecord>>>;
}

#[derive(Default)]
struct Cells {
    access_token: ObservableCell<String>,
    refresh_token: ObservableCell<String>,
    id_token: ObservableCell<String>,
    expires_in: ObservableCell<i64>,
    refresh_expires_in: ObservableCell<i64>,
    received_at: ObservableCell<i64>,
    /// The six fields combined, republished after each whole-set change.
    tokens: ObservableCell<CredentialRecord>,
}

impl Cells {
    fn text(&mut self, field: TextField) -> &mut ObservableCell<String> {
        match field {
            TextField::AccessToken => &mut self.access_token,
            TextField::RefreshToken => &mut self.refresh_token,
            TextField::IdToken => &mut self.id_token,
        }
    }

    fn number(&mut self, field: NumberField) -> &mut ObservableCell<i64> {
        match field {
            NumberField::ExpiresIn => &mut self.expires_in,
            NumberField::RefreshExpiresIn => &mut self.refresh_expires_in,
            NumberField::ReceivedAt => &mut self.received_at,
        }
    }

    fn clear(&mut self, field: TokenField) {
        match field {
            TokenField::AccessToken => self.access_token.set(None),
            TokenField::RefreshToken => self.refresh_token.set(None),
            TokenField::IdToken => self.id_token.set(None),
            TokenField::ExpiresIn => self.expires_in.set(None),
            TokenField::RefreshExpiresIn => self.refresh_expires_in.set(None),
            TokenField::ReceivedAt => self.received_at.set(None),
        }
        self.sync_tokens();
    }

    fn publish(&mut self, tokens: &CredentialRecord) {
        self.access_token.set(Some(tokens.access_token().to_string()));
        self.refresh_token.set(tokens.refresh_token().map(str::to_string));
        self.id_token.set(tokens.id_token().map(str::to_string));
        self.expires_in.set(tokens.expires_in());
        self.refresh_expires_in.set(tokens.refresh_expires_in());
        self.received_at.set(Some(tokens.received_at()));
        self.sync_tokens();
    }

    /// Record assembled from the in-memory values. Unloaded cells read as absent.
    fn record(&self) -> Option<CredentialRecord> {
        Some(CredentialRecord::from_fields(
            self.access_token.get()?,
            self.refresh_token.get(),
            self.id_token.get(),
            self.expires_in.get(),
            self.refresh_expires_in.get(),
            self.received_at.get(),
        ))
    }

    fn sync_tokens(&mut self) {
        let record = self.record();
        self.tokens.set_if_changed(record);
    }

    /// Hydrate every field that is not loaded yet, then return the combined record.
    async fn load_all(&mut self, store: &dyn FieldStore) -> Option<CredentialRecord> {
        for field in [TextField::AccessToken, TextField::RefreshToken, TextField::IdToken] {
            load(store, self.text(field), field.into(), parse_text).await;
        }
        for field in [
            NumberField::ExpiresIn,
            NumberField::RefreshExpiresIn,
            NumberField::ReceivedAt,
        ] {
            load(store, self.number(field), field.into(), parse_numeric).await;
        }
        self.sync_tokens();
        self.tokens.get()
    }
}

/// [`TokenCache`] backed by a [`FieldStore`].
pub struct StoredTokenCache {
    store: Arc<dyn FieldStore>,
    cells: Mutex<Cells>,
}

impl StoredTokenCache {
    pub fn new(store: Arc<dyn FieldStore>) -> Self {
        Self {
            store,
            cells: Mutex::new(Cells::default()),
        }
    }

    /// Cache over a fresh [`MemoryFieldStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryFieldStore::new()))
    }
}

/// Hydrate `cell` from the store if this is its first use, then return its value.
///
/// A store fault leaves the cell unloaded so the next read retries.
async fn load<T: Clone>(
    store: &dyn FieldStore,
    cell: &mut ObservableCell<T>,
    field: TokenField,
    parse: fn(String) -> Option<T>,
) -> Option<T> {
    if !cell.is_loaded() {
        match store.get(field.key()).await {
            Ok(raw) => {
                debug!(field = %field, present = raw.is_some(), "hydrated token field");
                cell.hydrate(raw.and_then(parse));
            }
            Err(e) => {
                warn!(field = %field, error = %e, "token store read failed, treating as absent");
                return None;
            }
        }
    }
    cell.get()
}

fn parse_text(raw: String) -> Option<String> {
    Some(raw)
}

fn parse_numeric(raw: String) -> Option<i64> {
    parse_number(&raw)
}

async fn put_or_remove(store: &dyn FieldStore, field: TokenField, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => store.put(field.key(), value).await,
        None => store.remove(field.key()).await,
    }
}

/// Write every field of `tokens` to the store, stopping at the first fault.
async fn persist(store: &dyn FieldStore, tokens: &CredentialRecord) -> Result<()> {
    store
        .put(TokenField::AccessToken.key(), tokens.access_token())
        .await?;
    put_or_remove(store, TokenField::RefreshToken, tokens.refresh_token()).await?;
    put_or_remove(store, TokenField::IdToken, tokens.id_token()).await?;
    put_or_remove(
        store,
        TokenField::ExpiresIn,
        tokens.expires_in().map(|v| v.to_string()).as_deref(),
    )
    .await?;
    put_or_remove(
        store,
        TokenField::RefreshExpiresIn,
        tokens.refresh_expires_in().map(|v| v.to_string()).as_deref(),
    )
    .await?;
    store
        .put(
            TokenField::ReceivedAt.key(),
            &tokens.received_at().to_string(),
        )
        .await
}

impl TokenCache for StoredTokenCache {
    fn get_text(&self, field: TextField) -> CacheFuture<'_, Option<String>> {
        Box::pin(async move {
            let mut cells = self.cells.lock().await;
            load(self.store.as_ref(), cells.text(field), field.into(), parse_text).await
        })
    }

    fn get_number(&self, field: NumberField) -> CacheFuture<'_, Option<i64>> {
        Box::pin(async move {
            let mut cells = self.cells.lock().await;
            load(self.store.as_ref(), cells.number(field), field.into(), parse_numeric).await
        })
    }

    fn watch_text(&self, field: TextField) -> CacheFuture<'_, watch::Receiver<Option<String>>> {
        Box::pin(async move {
            let mut cells = self.cells.lock().await;
            let cell = cells.text(field);
            load(self.store.as_ref(), &mut *cell, field.into(), parse_text).await;
            cell.subscribe()
        })
    }

    fn watch_number(
        &self,
        field: NumberField,
    ) -> CacheFuture<'_, watch::Receiver<Option<i64>>> {
        Box::pin(async move {
            let mut cells = self.cells.lock().await;
            let cell = cells.number(field);
            load(self.store.as_ref(), &mut *cell, field.into(), parse_numeric).await;
            cell.subscribe()
        })
    }

    fn remove(&self, field: TokenField) -> CacheFuture<'_, ()> {
        Box::pin(async move {
            let mut cells = self.cells.lock().await;
            match self.store.remove(field.key()).await {
                Ok(()) => cells.clear(field),
                Err(e) => warn!(field = %field, error = %e, "token store remove failed"),
            }
        })
    }

    fn save_tokens<'a>(&'a self, tokens: &'a CredentialRecord) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let mut cells = self.cells.lock().await;
            if let Err(e) = persist(self.store.as_ref(), tokens).await {
                warn!(error = %e, "failed to persist tokens, in-memory cache left unchanged");
                return;
            }
            cells.publish(tokens);
            debug!(
                has_refresh_token = tokens.refresh_token().is_some(),
                expires_in = ?tokens.expires_in(),
                "saved tokens"
            );
        })
    }

    fn snapshot(&self) -> CacheFuture<'_, Option<CredentialRecord>> {
        Box::pin(async move {
            let mut cells = self.cells.lock().await;
            cells.load_all(self.store.as_ref()).await
        })
    }

    fn watch_tokens(&self) -> CacheFuture<'_, watch::Receiver<Option<CredentialRecord>>> {
        Box::pin(async move {
            let mut cells = self.cells.lock().await;
            cells.load_all(self.store.as_ref()).await;
            cells.tokens.subscribe()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::StoreFuture;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Store that counts reads and can be switched into a failing mode.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryFieldStore,
        reads: AtomicUsize,
        failing: AtomicBool,
        fail_puts_after: Option<usize>,
        puts: AtomicUsize,
    }

    impl FlakyStore {
        fn fail(&self, on: bool) {
            self.failing.store(on, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("keychain locked".into()));
            }
            Ok(())
        }
    }

    impl FieldStore for FlakyStore {
        fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
            Box::pin(async move {
                self.reads.fetch_add(1, Ordering::SeqCst);
                self.check()?;
                self.inner.get(key).await
            })
        }

        fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
            Box::pin(async move {
                self.check()?;
                let n = self.puts.fetch_add(1, Ordering::SeqCst);
                if self.fail_puts_after.is_some_and(|limit| n >= limit) {
                    return Err(StoreError::Io("disk full".into()));
                }
                self.inner.put(key, value).await
            })
        }

        fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
            Box::pin(async move {
                self.check()?;
                self.inner.remove(key).await
            })
        }
    }

    /// Store whose reads of one key park until `gate` is notified.
    struct GatedStore {
        inner: MemoryFieldStore,
        gated_key: &'static str,
        entered: tokio::sync::Notify,
        gate: tokio::sync::Notify,
    }

    impl GatedStore {
        fn new(gated_key: &'static str) -> Self {
            Self {
                inner: MemoryFieldStore::new(),
                gated_key,
                entered: tokio::sync::Notify::new(),
                gate: tokio::sync::Notify::new(),
            }
        }
    }

    impl FieldStore for GatedStore {
        fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
            Box::pin(async move {
                if key == self.gated_key {
                    self.entered.notify_one();
                    self.gate.notified().await;
                }
                self.inner.get(key).await
            })
        }

        fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
            self.inner.put(key, value)
        }

        fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
            self.inner.remove(key)
        }
    }

    fn sample() -> CredentialRecord {
        CredentialRecord::from_fields(
            "A1".into(),
            Some("R1".into()),
            None,
            Some(3600),
            None,
            Some(1000),
        )
    }

    #[tokio::test]
    async fn hydrates_each_field_once() {
        let store = Arc::new(FlakyStore::default());
        store.inner.put("ACCESSTOKEN", "at_1").await.unwrap();
        let cache = StoredTokenCache::new(store.clone());

        for _ in 0..3 {
            assert_eq!(
                cache.get_text(TextField::AccessToken).await.as_deref(),
                Some("at_1")
            );
        }
        let _rx = cache.watch_text(TextField::AccessToken).await;
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);

        // Absent values are cached too
        assert_eq!(cache.get_text(TextField::IdToken).await, None);
        assert_eq!(cache.get_text(TextField::IdToken).await, None);
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_numbers_read_as_none() {
        let store = Arc::new(MemoryFieldStore::new());
        store.put("EXPIRESIN", "soon").await.unwrap();
        store.put("RECEIVEDAT", "1000").await.unwrap();
        let cache = StoredTokenCache::new(store);

        assert_eq!(cache.get_number(NumberField::ExpiresIn).await, None);
        assert_eq!(cache.get_number(NumberField::ReceivedAt).await, Some(1000));
    }

    #[tokio::test]
    async fn read_fault_is_swallowed_and_retried() {
        let store = Arc::new(FlakyStore::default());
        store.inner.put("ACCESSTOKEN", "at_1").await.unwrap();
        let cache = StoredTokenCache::new(store.clone());

        store.fail(true);
        assert_eq!(cache.get_text(TextField::AccessToken).await, None);

        store.fail(false);
        assert_eq!(
            cache.get_text(TextField::AccessToken).await.as_deref(),
            Some("at_1")
        );
    }

    #[tokio::test]
    async fn save_persists_and_publishes() {
        let store = Arc::new(MemoryFieldStore::new());
        store.put("IDTOKEN", "stale_id").await.unwrap();
        let cache = StoredTokenCache::new(store.clone());

        cache.save_tokens(&sample()).await;

        assert_eq!(store.get("ACCESSTOKEN").await.unwrap().as_deref(), Some("A1"));
        assert_eq!(store.get("REFRESHTOKEN").await.unwrap().as_deref(), Some("R1"));
        assert_eq!(store.get("IDTOKEN").await.unwrap(), None);
        assert_eq!(store.get("EXPIRESIN").await.unwrap().as_deref(), Some("3600"));
        assert_eq!(store.get("REFRESHTOKEN_EXPIRESIN").await.unwrap(), None);
        assert_eq!(store.get("RECEIVEDAT").await.unwrap().as_deref(), Some("1000"));

        assert_eq!(cache.get_text(TextField::IdToken).await, None);
        assert_eq!(cache.get_number(NumberField::ExpiresIn).await, Some(3600));
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_untouched() {
        let store = Arc::new(FlakyStore {
            fail_puts_after: Some(1),
            ..FlakyStore::default()
        });
        let cache = StoredTokenCache::new(store.clone());
        assert_eq!(cache.get_text(TextField::AccessToken).await, None);

        cache.save_tokens(&sample()).await;

        // The access token reached the store, but memory was not updated
        assert_eq!(cache.get_text(TextField::AccessToken).await, None);
        assert_eq!(cache.get_number(NumberField::ExpiresIn).await, None);
    }

    #[tokio::test]
    async fn remove_clears_store_and_memory() {
        let store = Arc::new(MemoryFieldStore::new());
        let cache = StoredTokenCache::new(store.clone());
        cache.save_tokens(&sample()).await;

        let mut rx = cache.watch_text(TextField::RefreshToken).await;
        assert_eq!(rx.borrow_and_update().as_deref(), Some("R1"));

        cache.remove(TokenField::RefreshToken).await;

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), None);
        assert_eq!(store.get("REFRESHTOKEN").await.unwrap(), None);
        assert_eq!(cache.get_text(TextField::RefreshToken).await, None);
    }

    #[tokio::test]
    async fn remove_fault_keeps_value() {
        let store = Arc::new(FlakyStore::default());
        let cache = StoredTokenCache::new(store.clone());
        cache.save_tokens(&sample()).await;

        store.fail(true);
        cache.remove(TokenField::AccessToken).await;
        store.fail(false);

        assert_eq!(
            cache.get_text(TextField::AccessToken).await.as_deref(),
            Some("A1")
        );
    }

    #[tokio::test]
    async fn watchers_see_writes_from_other_callers() {
        let cache = Arc::new(StoredTokenCache::in_memory());
        let mut rx = cache.watch_number(NumberField::ExpiresIn).await;
        assert_eq!(*rx.borrow_and_update(), None);

        let writer = cache.clone();
        tokio::spawn(async move { writer.save_tokens(&sample()).await })
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(3600));
    }

    #[tokio::test]
    async fn whole_set_read_is_not_interleaved_with_a_save() {
        let store = Arc::new(GatedStore::new("REFRESHTOKEN"));
        for (key, value) in [
            ("ACCESSTOKEN", "A1"),
            ("REFRESHTOKEN", "R1"),
            ("EXPIRESIN", "60"),
            ("RECEIVEDAT", "1000"),
        ] {
            store.inner.put(key, value).await.unwrap();
        }
        let cache = Arc::new(StoredTokenCache::new(store.clone()));

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { crate::helpers::get_tokens(cache.as_ref()).await })
        };
        // Reader is parked inside the store, part way through hydration
        store.entered.notified().await;

        let newer = CredentialRecord::from_fields(
            "A2".into(),
            Some("R2".into()),
            None,
            Some(7200),
            None,
            Some(5000),
        );
        let writer = {
            let cache = cache.clone();
            let newer = newer.clone();
            tokio::spawn(async move { cache.save_tokens(&newer).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        store.gate.notify_one();

        let seen = reader.await.unwrap().unwrap();
        writer.await.unwrap();

        let older = CredentialRecord::from_fields(
            "A1".into(),
            Some("R1".into()),
            None,
            Some(60),
            None,
            Some(1000),
        );
        assert_eq!(seen, older);
        assert_eq!(seen.access_expires_at(), Some(1060));
        assert_eq!(cache.snapshot().await, Some(newer));
    }

    #[tokio::test]
    async fn snapshot_after_read_fault_retries_missing_fields() {
        let store = Arc::new(FlakyStore::default());
        store.inner.put("ACCESSTOKEN", "at_1").await.unwrap();
        store.inner.put("RECEIVEDAT", "1000").await.unwrap();
        let cache = StoredTokenCache::new(store.clone());

        store.fail(true);
        assert_eq!(cache.snapshot().await, None);

        store.fail(false);
        let tokens = cache.snapshot().await.unwrap();
        assert_eq!(tokens.access_token(), "at_1");
        assert_eq!(tokens.received_at(), 1000);
    }
}
