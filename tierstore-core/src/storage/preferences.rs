//! Preferences tier: small durable settings, stored as bare JSON values.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tierstore_db::EngineProvider;

use super::adapter::{StorageAdapter, TierStore};
use super::error::StorageResult;
use super::types::Tier;

const KEY_THEME: &str = "theme";
const KEY_LANGUAGE: &str = "language";
const KEY_NOTIFICATIONS_ENABLED: &str = "notifications_enabled";
const KEY_ONBOARDING_COMPLETED: &str = "onboarding_completed";

const DEFAULT_LANGUAGE: &str = "en";

/// Colour scheme selected by the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    /// Light scheme.
    Light,
    /// Dark scheme.
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

/// Long-lived, unencrypted settings. Never expired or evicted.
#[derive(Debug)]
pub struct PreferencesStorage {
    adapter: StorageAdapter,
}

impl TierStore for PreferencesStorage {
    fn adapter(&self) -> &StorageAdapter {
        &self.adapter
    }
}

impl PreferencesStorage {
    pub(crate) fn open(engines: &dyn EngineProvider) -> StorageResult<Self> {
        Ok(Self {
            adapter: StorageAdapter::open(Tier::Preferences, engines, None)?,
        })
    }

    /// Selected theme, [`Theme::System`] when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored value is corrupt.
    pub fn theme(&self) -> StorageResult<Theme> {
        self.get_or(KEY_THEME, Theme::default())
    }

    /// Stores the selected theme.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_theme(&self, theme: Theme) -> StorageResult<()> {
        self.set(KEY_THEME, &theme)
    }

    /// UI language tag, `"en"` when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored value is corrupt.
    pub fn language(&self) -> StorageResult<String> {
        self.get_or(KEY_LANGUAGE, DEFAULT_LANGUAGE.to_string())
    }

    /// Stores the UI language tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_language(&self, language: &str) -> StorageResult<()> {
        self.set(KEY_LANGUAGE, language)
    }

    /// Whether notifications are enabled, `true` when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored value is corrupt.
    pub fn notifications_enabled(&self) -> StorageResult<bool> {
        self.get_or(KEY_NOTIFICATIONS_ENABLED, true)
    }

    /// Enables or disables notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_notifications_enabled(&self, enabled: bool) -> StorageResult<()> {
        self.set(KEY_NOTIFICATIONS_ENABLED, &enabled)
    }

    /// Whether onboarding was completed, `false` when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored value is corrupt.
    pub fn onboarding_completed(&self) -> StorageResult<bool> {
        self.get_or(KEY_ONBOARDING_COMPLETED, false)
    }

    /// Records whether onboarding was completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_onboarding_completed(&self, completed: bool) -> StorageResult<()> {
        self.set(KEY_ONBOARDING_COMPLETED, &completed)
    }
}
