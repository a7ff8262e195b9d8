//! Route registry: entry and privacy links, the resume trail, and the
//! mirrored cookie snapshot, all backed by a [`KeyValueStore`].
//!
//! Stored links are validated on read; a value that no longer parses as a
//! URL falls back to the built-in default instead of poisoning the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{info, warn};
use url::Url;

use crate::model::CookieSnapshot;
use crate::storage::KeyValueStore;

pub const DEFAULT_ENTRY_URL: &str = "https://app.example/play";
pub const DEFAULT_PRIVACY_URL: &str = "https://app.example/privacy";

const ENTRY_KEY: &str = "shell.entry.url";
const PRIVACY_KEY: &str = "shell.privacy.url";
const TRAIL_KEY: &str = "shell.trail.url";
const SNAPSHOT_KEY: &str = "shell.cookie.snapshot";

pub struct RouteStore {
    store: Arc<dyn KeyValueStore>,
    entry: Mutex<Url>,
    privacy: Mutex<Url>,
    /// Set the moment a trail write is attempted, successful or not.
    trail_written: AtomicBool,
}

impl RouteStore {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let entry = read_url(store.as_ref(), ENTRY_KEY).unwrap_or_else(default_entry);
        let privacy = read_url(store.as_ref(), PRIVACY_KEY).unwrap_or_else(default_privacy);
        Self {
            store,
            entry: Mutex::new(entry),
            privacy: Mutex::new(privacy),
            trail_written: AtomicBool::new(false),
        }
    }

    pub fn entry_url(&self) -> Url {
        self.entry.lock().unwrap().clone()
    }

    pub fn privacy_url(&self) -> Url {
        self.privacy.lock().unwrap().clone()
    }

    /// Replace the entry link. Returns false without touching anything when
    /// the candidate does not parse.
    pub fn update_entry(&self, link: &str) -> bool {
        let Ok(url) = Url::parse(link) else {
            return false;
        };
        *self.entry.lock().unwrap() = url;
        if let Err(e) = self.store.set(ENTRY_KEY, link) {
            warn!("entry link not persisted: {e:#}");
        }
        true
    }

    /// Replace the privacy link, same validation as [`update_entry`].
    ///
    /// [`update_entry`]: RouteStore::update_entry
    pub fn update_privacy(&self, link: &str) -> bool {
        let Ok(url) = Url::parse(link) else {
            return false;
        };
        *self.privacy.lock().unwrap() = url;
        if let Err(e) = self.store.set(PRIVACY_KEY, link) {
            warn!("privacy link not persisted: {e:#}");
        }
        true
    }

    /// The stored resume trail, if present and still a parseable URL.
    pub fn stored_trail(&self) -> Option<Url> {
        read_url(self.store.as_ref(), TRAIL_KEY)
    }

    /// Raw presence of a trail value. Deliberately not a parse check: once
    /// anything occupies the slot, the write-once guard holds.
    pub fn has_stored_trail(&self) -> bool {
        self.store.get(TRAIL_KEY).is_some()
    }

    /// Commit `url` as the resume trail if neither this process nor the
    /// store has committed one before. Returns whether the write happened.
    pub fn remember_trail(&self, url: &Url) -> bool {
        if self.trail_written.swap(true, Ordering::Relaxed) {
            return false;
        }
        if self.has_stored_trail() {
            return false;
        }
        match self.store.set(TRAIL_KEY, url.as_str()) {
            Ok(()) => {
                info!("resume trail stored: {url}");
                true
            }
            Err(e) => {
                warn!("resume trail not persisted: {e:#}");
                false
            }
        }
    }

    /// Drop the stored trail and re-arm the write-once guard.
    pub fn clear_trail(&self) -> Result<()> {
        self.store.remove(TRAIL_KEY).context("clearing resume trail")?;
        self.trail_written.store(false, Ordering::Relaxed);
        Ok(())
    }

    pub fn save_snapshot(&self, snapshot: &CookieSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot).context("encoding cookie snapshot")?;
        self.store.set(SNAPSHOT_KEY, &json)
    }

    pub fn load_snapshot(&self) -> Option<CookieSnapshot> {
        let raw = self.store.get(SNAPSHOT_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("ignoring undecodable cookie snapshot: {e}");
                None
            }
        }
    }
}

fn read_url(store: &dyn KeyValueStore, key: &str) -> Option<Url> {
    store.get(key).and_then(|raw| Url::parse(&raw).ok())
}

fn default_entry() -> Url {
    Url::parse(DEFAULT_ENTRY_URL).expect("built-in entry URL parses")
}

fn default_privacy() -> Url {
    Url::parse(DEFAULT_PRIVACY_URL).expect("built-in privacy URL parses")
}
