use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use url::Url;

use crate::policy::NavDecision;

fn default_resume() -> bool {
    true
}

/// Tunables for one coordinator session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Delay between a qualifying route commit and the trail write.
    #[serde(with = "humantime_serde")]
    pub trail_delay: Duration,
    /// Interval between cookie mirror ticks.
    #[serde(with = "humantime_serde")]
    pub mirror_interval: Duration,
    /// Start from the stored trail when one exists.
    #[serde(default = "default_resume")]
    pub resume: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trail_delay: Duration::from_secs(10),
            mirror_interval: Duration::from_secs(10),
            resume: true,
        }
    }
}

/// Lifecycle phase of the active route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutePhase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrientationMode {
    Flexible,
    LockedLandscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceOrientation {
    Portrait,
    LandscapeLeft,
    LandscapeRight,
}

impl OrientationMode {
    /// Device orientations permitted under this mode.
    pub fn mask(self) -> &'static [DeviceOrientation] {
        match self {
            OrientationMode::Flexible => &[
                DeviceOrientation::Portrait,
                DeviceOrientation::LandscapeLeft,
                DeviceOrientation::LandscapeRight,
            ],
            OrientationMode::LockedLandscape => &[
                DeviceOrientation::LandscapeLeft,
                DeviceOrientation::LandscapeRight,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// One cookie as reported by the rendering surface's store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Expiry as seconds since the Unix epoch; absent for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

/// Point-in-time cookie capture written by the mirror job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieSnapshot {
    pub captured_at: String,
    /// Lowercased host the capture was filtered against; empty keeps everything.
    pub host_filter: String,
    pub cookies: Vec<CookieRecord>,
}

/// Session-level happenings, published for whoever is driving the shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// First paint-worthy moment of the session. Sent at most once.
    Ready,
    NavStarted,
    NavLoaded { url: Option<Url> },
    NavFailed { url: Option<Url>, error: String },
    IntentDecided { url: Option<Url>, decision: NavDecision },
    TrailStored { url: Url },
    SnapshotStored { host: String, count: usize },
}

/// Commands accepted by a running coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Reload the current route in the main surface.
    Refresh,
    Shutdown,
}

pub fn rfc3339_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "now".into())
}
