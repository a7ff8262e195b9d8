//! Navigation intent policy.
//!
//! Every navigation a rendering surface wants to perform is reduced to a
//! [`NavIntent`] and classified by [`decide`]. The classification is pure;
//! carrying out a side effect (loading into the main surface, loading into
//! the requesting surface) is the coordinator's job.

use serde::{Deserialize, Serialize};
use url::Url;

/// Schemes a surface may follow. Everything else is dropped.
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https", "about"];

/// A navigation request as seen at the policy boundary.
#[derive(Debug, Clone)]
pub struct NavIntent {
    /// Target of the navigation. `None` when the request URL did not parse.
    pub url: Option<Url>,
    /// Whether the request names a frame to load into. Requests without one
    /// are `window.open`-style and never proceed as issued.
    pub has_target_frame: bool,
    /// Whether the requesting surface is a tracked secondary context. Stamped
    /// by the session layer; surfaces cannot know this about themselves.
    pub from_popup: bool,
}

impl NavIntent {
    /// Intent targeting a frame, as a surface reports an ordinary link follow.
    pub fn targeted(url: Option<Url>) -> Self {
        Self {
            url,
            has_target_frame: true,
            from_popup: false,
        }
    }

    /// Intent with no target frame.
    pub fn untargeted(url: Option<Url>) -> Self {
        Self {
            url,
            has_target_frame: false,
            from_popup: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavDecision {
    /// Drop the navigation entirely.
    Deny,
    /// Cancel here; the main surface loads the URL instead.
    RedirectToMain,
    /// Cancel here; the requesting surface loads the URL itself.
    OpenInPlace,
    Allow,
}

/// Classify a navigation intent.
///
/// Popup origin is checked before anything else, scheme included: a tracked
/// secondary context never navigates itself, its URL is either rerouted to
/// the main surface or dropped.
pub fn decide(intent: &NavIntent) -> NavDecision {
    if intent.from_popup {
        return match intent.url {
            Some(_) => NavDecision::RedirectToMain,
            None => NavDecision::Deny,
        };
    }
    let Some(url) = intent.url.as_ref() else {
        return NavDecision::Deny;
    };
    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return NavDecision::Deny;
    }
    if !intent.has_target_frame {
        return NavDecision::OpenInPlace;
    }
    NavDecision::Allow
}
