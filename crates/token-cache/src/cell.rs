//! Lazily hydrated, observable value cell
//!
//! Holds `(loaded, value, subscribers)` for one cached field. The cell does no
//! I/O itself: its owner checks [`ObservableCell::is_loaded`], fetches from the
//! backing store, and calls [`ObservableCell::hydrate`], all under the owner's
//! lock. That keeps hydration at most once per cell per process lifetime.
//!
//! Subscribers are `tokio::sync::watch` receivers: a new receiver sees the
//! current value immediately and is woken for every later `set`.

use tokio::sync::watch;

#[derive(Debug)]
pub struct ObservableCell<T> {
    loaded: bool,
    tx: watch::Sender<Option<T>>,
}

impl<T> Default for ObservableCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObservableCell<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { loaded: false, tx }
    }

    /// Whether the value has been loaded from (or written through to) the store.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Fill the cell from the store. No-op once loaded, so a late hydration
    /// can never clobber a value written after the first load.
    pub fn hydrate(&mut self, value: Option<T>) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        self.tx.send_replace(value);
    }

    /// Replace the in-memory value and notify every subscriber.
    pub fn set(&mut self, value: Option<T>) {
        self.loaded = true;
        self.tx.send_replace(value);
    }

    /// Receiver that observes the current value and all later changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone> ObservableCell<T> {
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }
}

impl<T: PartialEq> ObservableCell<T> {
    /// Like [`ObservableCell::set`], but subscribers are only woken when the
    /// value actually differs.
    pub fn set_if_changed(&mut self, value: Option<T>) {
        self.loaded = true;
        self.tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}
