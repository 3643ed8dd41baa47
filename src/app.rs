//! Explicit application state.
//!
//! The browser original kept UI state in the location query string, session
//! storage, and DOM listeners. Here that state is one owned object passed
//! into components: an ordered parameter map with stable string keys, a
//! per-pane session store, and a subscription bus whose bookkeeping makes
//! listener leaks observable.

use std::collections::HashMap;

/// Stable parameter keys, shared with the CLI flags.
pub mod keys {
    pub const EQID: &str = "eqid";
    pub const AFTERSHOCKS_DIST: &str = "as-dist";
    pub const AFTERSHOCKS_MAG: &str = "as-mag";
    pub const HISTORICAL_DIST: &str = "hs-dist";
    pub const HISTORICAL_MAG: &str = "hs-mag";
    pub const PANE: &str = "pane";
    pub const SIDEBAR: &str = "sidebar";
}

/// Ordered string-keyed parameter map (the query-string counterpart).
///
/// Writes are last-writer-wins per key; insertion order is preserved so the
/// canonical serialization is stable and shareable.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    entries: Vec<(String, String)>,
}

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Typed getter; unparseable values read as absent.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.trim().parse().ok()
    }

    /// Set a parameter, replacing any existing value for the key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Serialize as a canonical query string ("eqid=us7000abcd&as-dist=20").
    #[must_use]
    pub fn canonical_query(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Per-pane/sidebar remembered choices, session lifetime only.
#[derive(Debug, Default)]
pub struct SessionStore {
    memory: HashMap<String, PaneMemory>,
}

#[derive(Debug, Default, Clone)]
struct PaneMemory {
    scroll: u64,
    selection: Option<String>,
}

impl SessionStore {
    pub fn remember_scroll(&mut self, pane_id: &str, offset: u64) {
        self.memory.entry(pane_id.to_string()).or_default().scroll = offset;
    }

    #[must_use]
    pub fn scroll(&self, pane_id: &str) -> u64 {
        self.memory.get(pane_id).map_or(0, |m| m.scroll)
    }

    pub fn remember_selection(&mut self, pane_id: &str, selection: &str) {
        self.memory.entry(pane_id.to_string()).or_default().selection = Some(selection.to_string());
    }

    #[must_use]
    pub fn selection(&self, pane_id: &str) -> Option<&str> {
        self.memory.get(pane_id)?.selection.as_deref()
    }

    pub fn clear(&mut self) {
        self.memory.clear();
    }
}

/// Topics components can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    PaneShown,
    SideBarShown,
    ParamsChanged,
    SelectionChanged,
}

/// Handle returned by `EventBus::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    owner: String,
    topic: Topic,
}

/// Subscription registry.
///
/// Every `subscribe` must be matched by an `unsubscribe`/`unsubscribe_all`;
/// `active_count` exposes the leak check.
#[derive(Debug, Default)]
pub struct EventBus {
    subs: Vec<Subscription>,
    next_id: u64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, owner: &str, topic: Topic) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subs.push(Subscription {
            id,
            owner: owner.to_string(),
            topic,
        });
        id
    }

    /// Remove one subscription. Returns false if the id was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subs.len();
        self.subs.retain(|s| s.id != id);
        self.subs.len() < before
    }

    /// Remove every subscription held by an owner; returns how many.
    pub fn unsubscribe_all(&mut self, owner: &str) -> usize {
        let before = self.subs.len();
        self.subs.retain(|s| s.owner != owner);
        before - self.subs.len()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.subs.len()
    }

    #[must_use]
    pub fn count_for(&self, owner: &str) -> usize {
        self.subs.iter().filter(|s| s.owner == owner).count()
    }

    /// Owners subscribed to a topic, in subscription order, deduplicated.
    #[must_use]
    pub fn emit(&self, topic: Topic) -> Vec<String> {
        let mut owners: Vec<String> = Vec::new();
        for sub in self.subs.iter().filter(|s| s.topic == topic) {
            if !owners.iter().any(|o| o == &sub.owner) {
                owners.push(sub.owner.clone());
            }
        }
        owners
    }
}

/// Application state bundle, created once per process and passed explicitly.
#[derive(Debug, Default)]
pub struct AppState {
    pub params: QueryParams,
    pub session: SessionStore,
    pub bus: EventBus,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset session-scoped state for a newly selected event id.
    ///
    /// Parameter overrides survive (they are user intent); remembered pane
    /// state belongs to the previous selection and is dropped.
    pub fn begin_selection(&mut self, eqid: &str) {
        self.params.set(keys::EQID, eqid);
        self.session.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_last_writer_wins() {
        let mut params = QueryParams::new();
        params.set(keys::AFTERSHOCKS_DIST, "20");
        params.set(keys::AFTERSHOCKS_DIST, "45");
        assert_eq!(params.get(keys::AFTERSHOCKS_DIST), Some("45"));
        assert_eq!(params.get_f64(keys::AFTERSHOCKS_DIST), Some(45.0));
    }

    #[test]
    fn test_params_canonical_order_is_stable() {
        let mut params = QueryParams::new();
        params.set(keys::EQID, "us7000abcd");
        params.set(keys::AFTERSHOCKS_DIST, "20");
        params.set(keys::EQID, "ci38457511");
        assert_eq!(params.canonical_query(), "eqid=ci38457511&as-dist=20");
    }

    #[test]
    fn test_session_store_roundtrip() {
        let mut store = SessionStore::default();
        store.remember_scroll("plots", 420);
        store.remember_selection("plots", "magtime");
        assert_eq!(store.scroll("plots"), 420);
        assert_eq!(store.selection("plots"), Some("magtime"));
        assert_eq!(store.scroll("map"), 0);
    }

    #[test]
    fn test_bus_symmetric_unsubscribe() {
        let mut bus = EventBus::new();
        let a = bus.subscribe("aftershocks", Topic::PaneShown);
        bus.subscribe("aftershocks", Topic::ParamsChanged);
        bus.subscribe("historical", Topic::PaneShown);
        assert_eq!(bus.active_count(), 3);

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        assert_eq!(bus.unsubscribe_all("aftershocks"), 1);
        assert_eq!(bus.active_count(), 1);
        assert_eq!(bus.count_for("historical"), 1);
    }

    #[test]
    fn test_emit_dedups_owners() {
        let mut bus = EventBus::new();
        bus.subscribe("aftershocks", Topic::PaneShown);
        bus.subscribe("aftershocks", Topic::PaneShown);
        bus.subscribe("historical", Topic::PaneShown);
        assert_eq!(bus.emit(Topic::PaneShown), vec!["aftershocks", "historical"]);
        assert!(bus.emit(Topic::SideBarShown).is_empty());
    }

    #[test]
    fn test_begin_selection_resets_session() {
        let mut state = AppState::new();
        state.params.set(keys::AFTERSHOCKS_DIST, "30");
        state.session.remember_scroll("map", 10);
        state.begin_selection("us7000abcd");
        assert_eq!(state.params.get(keys::EQID), Some("us7000abcd"));
        assert_eq!(state.params.get(keys::AFTERSHOCKS_DIST), Some("30"));
        assert_eq!(state.session.scroll("map"), 0);
    }
}
