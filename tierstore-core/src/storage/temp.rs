//! Temp tier: ephemeral session data on a partition that is excluded from
//! backups and wiped on every cold start.

use serde::{de::DeserializeOwned, Serialize};
use tierstore_db::EngineProvider;

use super::adapter::{StorageAdapter, TierStore};
use super::error::StorageResult;
use super::types::Tier;

const FORM_DRAFT_PREFIX: &str = "form_draft_";
const NAV_STATE_PREFIX: &str = "nav_state_";
const SEARCH_FILTERS_PREFIX: &str = "search_filters_";
const SESSION_PREFIX: &str = "session_";
const UI_STATE_PREFIX: &str = "ui_state_";
const KEY_GUEST_CART: &str = "guest_cart";

const NAMESPACES: [&str; 5] = [
    FORM_DRAFT_PREFIX,
    NAV_STATE_PREFIX,
    SEARCH_FILTERS_PREFIX,
    SESSION_PREFIX,
    UI_STATE_PREFIX,
];

/// Session-scoped scratch storage.
#[derive(Debug)]
pub struct TempStorage {
    adapter: StorageAdapter,
}

impl TierStore for TempStorage {
    fn adapter(&self) -> &StorageAdapter {
        &self.adapter
    }
}

impl TempStorage {
    pub(crate) fn open(engines: &dyn EngineProvider) -> StorageResult<Self> {
        Ok(Self {
            adapter: StorageAdapter::open(Tier::Temp, engines, None)?,
        })
    }

    /// Wipes the whole tier. Called once per cold start.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear fails.
    pub fn initialize(&self) -> StorageResult<()> {
        self.clear()?;
        log::debug!("temp storage wiped");
        Ok(())
    }

    fn put<T: Serialize + ?Sized>(&self, prefix: &str, id: &str, value: &T) -> StorageResult<()> {
        self.set(&format!("{prefix}{id}"), value)
    }

    fn fetch<T: DeserializeOwned>(&self, prefix: &str, id: &str) -> StorageResult<Option<T>> {
        self.get(&format!("{prefix}{id}"))
    }

    /// Saves an in-progress form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_form_draft<T: Serialize + ?Sized>(&self, form_id: &str, draft: &T) -> StorageResult<()> {
        self.put(FORM_DRAFT_PREFIX, form_id, draft)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails or the draft is corrupt.
    pub fn form_draft<T: DeserializeOwned>(&self, form_id: &str) -> StorageResult<Option<T>> {
        self.fetch(FORM_DRAFT_PREFIX, form_id)
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_form_draft(&self, form_id: &str) -> StorageResult<()> {
        self.delete(&format!("{FORM_DRAFT_PREFIX}{form_id}"))
    }

    /// Deletes every form draft and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn clear_form_drafts(&self) -> StorageResult<usize> {
        self.delete_prefix(FORM_DRAFT_PREFIX)
    }

    /// Saves navigation state for `screen`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_navigation_state<T: Serialize + ?Sized>(&self, screen: &str, state: &T) -> StorageResult<()> {
        self.put(NAV_STATE_PREFIX, screen, state)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails or the state is corrupt.
    pub fn navigation_state<T: DeserializeOwned>(&self, screen: &str) -> StorageResult<Option<T>> {
        self.fetch(NAV_STATE_PREFIX, screen)
    }

    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn clear_navigation_state(&self) -> StorageResult<usize> {
        self.delete_prefix(NAV_STATE_PREFIX)
    }

    /// Saves search filters for `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_search_filters<T: Serialize + ?Sized>(&self, scope: &str, filters: &T) -> StorageResult<()> {
        self.put(SEARCH_FILTERS_PREFIX, scope, filters)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails or the filters are corrupt.
    pub fn search_filters<T: DeserializeOwned>(&self, scope: &str) -> StorageResult<Option<T>> {
        self.fetch(SEARCH_FILTERS_PREFIX, scope)
    }

    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn clear_search_filters(&self) -> StorageResult<usize> {
        self.delete_prefix(SEARCH_FILTERS_PREFIX)
    }

    /// Saves the cart of a user who has not signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_guest_cart<T: Serialize + ?Sized>(&self, cart: &T) -> StorageResult<()> {
        self.set(KEY_GUEST_CART, cart)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails or the cart is corrupt.
    pub fn guest_cart<T: DeserializeOwned>(&self) -> StorageResult<Option<T>> {
        self.get(KEY_GUEST_CART)
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear_guest_cart(&self) -> StorageResult<()> {
        self.delete(KEY_GUEST_CART)
    }

    /// Saves arbitrary session data under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn set_session_data<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.put(SESSION_PREFIX, key, value)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails or the value is corrupt.
    pub fn session_data<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        self.fetch(SESSION_PREFIX, key)
    }

    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn clear_session_data(&self) -> StorageResult<usize> {
        self.delete_prefix(SESSION_PREFIX)
    }

    /// Saves UI state for `component`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn set_ui_state<T: Serialize + ?Sized>(&self, component: &str, state: &T) -> StorageResult<()> {
        self.put(UI_STATE_PREFIX, component, state)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails or the state is corrupt.
    pub fn ui_state<T: DeserializeOwned>(&self, component: &str) -> StorageResult<Option<T>> {
        self.fetch(UI_STATE_PREFIX, component)
    }

    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn clear_ui_state(&self) -> StorageResult<usize> {
        self.delete_prefix(UI_STATE_PREFIX)
    }

    /// Deletes every namespaced entry and the guest cart. Keys written outside
    /// the namespaces are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn clear_all_session(&self) -> StorageResult<usize> {
        self.adapter().delete_where(|key| {
            key == KEY_GUEST_CART || NAMESPACES.iter().any(|prefix| key.starts_with(prefix))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tierstore_db::MemoryEngineProvider;

    use super::*;

    fn temp() -> TempStorage {
        TempStorage::open(&MemoryEngineProvider::new()).expect("open")
    }

    #[test]
    fn test_initialize_wipes_tier() {
        let engines = MemoryEngineProvider::new();
        TempStorage::open(&engines)
            .expect("open")
            .set_session_data("step", &3)
            .expect("set");

        let temp = TempStorage::open(&engines).expect("reopen");
        assert_eq!(temp.len().expect("len"), 1);
        temp.initialize().expect("initialize");
        assert!(temp.is_empty().expect("empty"));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let temp = temp();
        let mut draft = BTreeMap::new();
        draft.insert("email", "a@b.c");
        temp.save_form_draft("signup", &draft).expect("draft");
        temp.save_form_draft("checkout", &draft).expect("draft");
        temp.save_navigation_state("home", &vec!["tab1"]).expect("nav");
        temp.save_search_filters("products", &["red"]).expect("filters");
        temp.set_ui_state("sidebar", &true).expect("ui");

        assert_eq!(
            temp.form_draft::<BTreeMap<String, String>>("signup")
                .expect("draft")
                .and_then(|draft| draft.get("email").cloned())
                .as_deref(),
            Some("a@b.c")
        );
        assert_eq!(temp.clear_form_drafts().expect("clear"), 2);
        assert_eq!(temp.form_draft::<BTreeMap<String, String>>("signup").expect("draft"), None);
        assert_eq!(
            temp.navigation_state::<Vec<String>>("home").expect("nav"),
            Some(vec!["tab1".to_string()])
        );
        assert_eq!(temp.ui_state::<bool>("sidebar").expect("ui"), Some(true));
    }

    #[test]
    fn test_guest_cart_round_trip() {
        let temp = temp();
        temp.save_guest_cart(&vec![("sku-1", 2)]).expect("cart");
        assert_eq!(
            temp.guest_cart::<Vec<(String, u32)>>().expect("cart"),
            Some(vec![("sku-1".to_string(), 2)])
        );
        temp.clear_guest_cart().expect("clear");
        assert_eq!(temp.guest_cart::<Vec<(String, u32)>>().expect("cart"), None);
    }

    #[test]
    fn test_clear_all_session_keeps_foreign_keys() {
        let temp = temp();
        temp.set_session_data("step", &1).expect("session");
        temp.save_guest_cart(&Vec::<u32>::new()).expect("cart");
        temp.save_search_filters("q", "shoes").expect("filters");
        temp.set("scratch", &0).expect("raw");

        assert_eq!(temp.clear_all_session().expect("clear"), 3);
        assert_eq!(temp.all_keys().expect("keys"), vec!["scratch"]);
    }
}
