//! End-of-run summary for the driver binary.
//!
//! Accumulates session events into a serializable outcome and formats the
//! human-readable lines for text mode.

use serde::Serialize;
use url::Url;

use crate::model::{OrientationMode, RoutePhase, SessionEvent};
use crate::policy::NavDecision;
use crate::routes::RouteStore;

#[derive(Debug, Default, Clone, Serialize)]
pub struct DecisionTally {
    pub allowed: u64,
    pub denied: u64,
    pub redirected: u64,
    pub opened_in_place: u64,
}

impl DecisionTally {
    fn total(&self) -> u64 {
        self.allowed + self.denied + self.redirected + self.opened_in_place
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub host_filter: String,
    pub cookies: usize,
    pub captured_at: String,
}

/// Everything worth reporting once the session has ended.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub entry_url: Url,
    pub privacy_url: Url,
    pub ready: bool,
    pub navigations: u64,
    pub failures: u64,
    pub intents: DecisionTally,
    pub final_url: Option<Url>,
    pub final_phase: RoutePhase,
    pub orientation: OrientationMode,
    pub trail: Option<Url>,
    pub trail_stored_this_run: bool,
    pub snapshots_written: u64,
    pub snapshot: Option<SnapshotSummary>,
}

impl SessionOutcome {
    pub fn new(routes: &RouteStore) -> Self {
        Self {
            entry_url: routes.entry_url(),
            privacy_url: routes.privacy_url(),
            ready: false,
            navigations: 0,
            failures: 0,
            intents: DecisionTally::default(),
            final_url: None,
            final_phase: RoutePhase::Idle,
            orientation: OrientationMode::Flexible,
            trail: None,
            trail_stored_this_run: false,
            snapshots_written: 0,
            snapshot: None,
        }
    }

    pub fn absorb(&mut self, ev: &SessionEvent) {
        match ev {
            SessionEvent::Ready => self.ready = true,
            SessionEvent::NavStarted => {
                self.navigations += 1;
                self.final_phase = RoutePhase::Loading;
            }
            SessionEvent::NavLoaded { url } => {
                self.final_phase = RoutePhase::Loaded;
                self.final_url = url.clone();
            }
            SessionEvent::NavFailed { url, .. } => {
                self.failures += 1;
                self.final_phase = RoutePhase::Failed;
                self.final_url = url.clone();
            }
            SessionEvent::IntentDecided { decision, .. } => match decision {
                NavDecision::Allow => self.intents.allowed += 1,
                NavDecision::Deny => self.intents.denied += 1,
                NavDecision::RedirectToMain => self.intents.redirected += 1,
                NavDecision::OpenInPlace => self.intents.opened_in_place += 1,
            },
            SessionEvent::TrailStored { .. } => self.trail_stored_this_run = true,
            SessionEvent::SnapshotStored { .. } => self.snapshots_written += 1,
        }
    }

    /// Fill in the pieces that live outside the event stream.
    pub fn finalize(&mut self, routes: &RouteStore, mode: OrientationMode) {
        self.orientation = mode;
        self.trail = routes.stored_trail();
        self.snapshot = routes.load_snapshot().map(|s| SnapshotSummary {
            host_filter: s.host_filter,
            cookies: s.cookies.len(),
            captured_at: s.captured_at,
        });
    }
}

/// Format the outcome as the final stdout block for text mode.
pub fn build_session_report(outcome: &SessionOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("Entry route: {}", outcome.entry_url));
    match outcome.final_url.as_ref() {
        Some(u) => lines.push(format!("Final route: {u}")),
        None => lines.push("Final route: (none)".to_string()),
    }
    lines.push(format!("Final phase: {:?}", outcome.final_phase));
    let mask: Vec<String> = outcome
        .orientation
        .mask()
        .iter()
        .map(|o| format!("{o:?}"))
        .collect();
    lines.push(format!(
        "Orientation: {:?} (allowed: {})",
        outcome.orientation,
        mask.join(", ")
    ));
    lines.push(format!(
        "Intents: {} (allowed {}, denied {}, redirected {}, opened in place {})",
        outcome.intents.total(),
        outcome.intents.allowed,
        outcome.intents.denied,
        outcome.intents.redirected,
        outcome.intents.opened_in_place
    ));
    lines.push(format!(
        "Navigations: {} ({} failed)",
        outcome.navigations, outcome.failures
    ));
    match outcome.trail.as_ref() {
        Some(u) if outcome.trail_stored_this_run => {
            lines.push(format!("Resume trail: {u} (stored this run)"));
        }
        Some(u) => lines.push(format!("Resume trail: {u}")),
        None => lines.push("Resume trail: (none)".to_string()),
    }
    match outcome.snapshot.as_ref() {
        Some(s) => lines.push(format!(
            "Cookie snapshot: {} cookie(s) for {:?} at {}",
            s.cookies, s.host_filter, s.captured_at
        )),
        None => lines.push("Cookie snapshot: (none)".to_string()),
    }
    if !outcome.ready {
        lines.push("Surface never became ready".to_string());
    }
    lines
}
