//! Session coordinator.
//!
//! Owns route lifecycle, popup tracking, trail scheduling, and mirror job
//! control for one main surface. All of it runs in a single task; surface
//! callbacks, driver commands, and deferred completions are serialized
//! through one select loop, so the guards below need no locking.

use std::sync::{Arc, Weak};

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

use crate::model::{RoutePhase, SessionCommand, SessionConfig, SessionEvent};
use crate::orientation::OrientationCenter;
use crate::policy::{self, NavDecision, NavIntent};
use crate::routes::RouteStore;
use crate::session::mirror::MirrorJob;
use crate::surface::{RenderingSurface, SurfaceEvent, SurfaceId};

/// Completions that come back to the loop after a scheduled delay.
enum Deferred {
    TrailDue { url: Url },
}

/// The one secondary context being tracked, if any. Held weakly: the opener
/// owns the popup, and a dropped popup must not be kept alive by the shell.
struct PopupContext {
    id: SurfaceId,
    handle: Weak<dyn RenderingSurface>,
}

/// Everything a coordinator needs at construction.
pub struct SessionParams {
    pub config: SessionConfig,
    pub routes: Arc<RouteStore>,
    pub orientation: Arc<OrientationCenter>,
    pub surface: Arc<dyn RenderingSurface>,
    pub surface_id: SurfaceId,
    pub event_tx: UnboundedSender<SessionEvent>,
}

pub struct SessionCoordinator {
    config: SessionConfig,
    routes: Arc<RouteStore>,
    orientation: Arc<OrientationCenter>,
    main: Arc<dyn RenderingSurface>,
    main_id: SurfaceId,
    popup: Option<PopupContext>,
    /// Entry host captured at construction; the mirror stop/start decision
    /// compares against this for the whole session.
    base_host: Option<String>,
    phase: RoutePhase,
    ready_sent: bool,
    /// Set the moment a trail write is scheduled, not when it fires.
    trail_scheduled: bool,
    mirror: Option<MirrorJob>,
    event_tx: UnboundedSender<SessionEvent>,
    deferred_tx: UnboundedSender<Deferred>,
    deferred_rx: UnboundedReceiver<Deferred>,
}

impl SessionCoordinator {
    pub fn new(params: SessionParams) -> Self {
        let base_host = params
            .routes
            .entry_url()
            .host_str()
            .map(|h| h.to_ascii_lowercase());
        let (deferred_tx, deferred_rx) = mpsc::unbounded_channel();
        Self {
            config: params.config,
            routes: params.routes,
            orientation: params.orientation,
            main: params.surface,
            main_id: params.surface_id,
            popup: None,
            base_host,
            phase: RoutePhase::Idle,
            ready_sent: false,
            trail_scheduled: false,
            mirror: None,
            event_tx: params.event_tx,
            deferred_tx,
            deferred_rx,
        }
    }

    /// Drive the session until the surface channel closes or a shutdown
    /// command arrives. Consumes the coordinator; the mirror job is torn
    /// down on the way out.
    pub async fn run(
        mut self,
        mut surface_rx: UnboundedReceiver<SurfaceEvent>,
        mut cmd_rx: UnboundedReceiver<SessionCommand>,
    ) -> Result<()> {
        self.begin();
        loop {
            tokio::select! {
                ev = surface_rx.recv() => {
                    match ev {
                        Some(ev) => self.handle_surface_event(ev),
                        // All surfaces gone; nothing left to coordinate.
                        None => break,
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Refresh) => {
                            debug!("refresh requested");
                            self.main.reload();
                        }
                        Some(SessionCommand::Shutdown) | None => break,
                    }
                }
                Some(due) = self.deferred_rx.recv() => self.handle_deferred(due),
            }
        }
        self.stop_mirror();
        Ok(())
    }

    /// Startup sequence: publish the entry to the orientation center, then
    /// point the main surface at the stored trail when resuming, or at the
    /// entry route otherwise.
    fn begin(&mut self) {
        let entry = self.routes.entry_url();
        self.orientation.register_main_entry(entry.clone());
        let start = if self.config.resume {
            self.routes.stored_trail().unwrap_or(entry)
        } else {
            entry
        };
        info!("session starting at {start}");
        self.orientation.update_active_path(Some(start.clone()));
        self.main.load(&start);
    }

    fn handle_surface_event(&mut self, ev: SurfaceEvent) {
        match ev {
            SurfaceEvent::IntentRequested {
                surface,
                intent,
                verdict,
            } => {
                let allow = self.decide_intent(surface, intent);
                let _ = verdict.send(allow);
            }
            SurfaceEvent::PopupOpened { surface, handle } => {
                debug!("secondary context opened: {surface:?}");
                self.popup = Some(PopupContext {
                    id: surface,
                    handle: Arc::downgrade(&handle),
                });
            }
            SurfaceEvent::LoadStarted { surface } => self.handle_start(surface),
            SurfaceEvent::LoadFinished { surface } => self.handle_finish(surface),
            SurfaceEvent::LoadFailed { surface, error } => self.handle_failure(surface, error),
        }
    }

    fn decide_intent(&mut self, surface: SurfaceId, mut intent: NavIntent) -> bool {
        intent.from_popup = self.popup.as_ref().is_some_and(|p| p.id == surface);
        let decision = policy::decide(&intent);
        debug!("intent {:?} -> {decision:?}", intent.url.as_ref().map(Url::as_str));
        let allow = match decision {
            NavDecision::Allow => true,
            NavDecision::Deny => false,
            NavDecision::RedirectToMain => {
                if let Some(url) = intent.url.as_ref() {
                    self.main.load(url);
                }
                false
            }
            NavDecision::OpenInPlace => {
                if let Some(url) = intent.url.as_ref() {
                    if let Some(origin) = self.surface_handle(surface) {
                        origin.load(url);
                    }
                }
                false
            }
        };
        let _ = self.event_tx.send(SessionEvent::IntentDecided {
            url: intent.url,
            decision,
        });
        allow
    }

    fn handle_start(&mut self, surface: SurfaceId) {
        debug!("navigation started on {surface:?}");
        // Whatever was mirroring belongs to the outgoing route.
        self.stop_mirror();
        self.set_phase(RoutePhase::Loading);
        let _ = self.event_tx.send(SessionEvent::NavStarted);
    }

    fn handle_finish(&mut self, surface: SurfaceId) {
        self.emit_ready();
        let current = self.surface_handle(surface).and_then(|s| s.current_url());
        let Some(url) = current else {
            // Finished with no reported URL: clear the route and go quiet.
            self.orientation.update_active_path(None);
            self.stop_mirror();
            self.set_phase(RoutePhase::Loaded);
            let _ = self.event_tx.send(SessionEvent::NavLoaded { url: None });
            return;
        };
        self.orientation.update_active_path(Some(url.clone()));
        self.maybe_schedule_trail(&url);
        let host = url.host_str().map(|h| h.to_ascii_lowercase());
        let on_base = match (self.base_host.as_deref(), host.as_deref()) {
            (Some(base), Some(now)) => base == now,
            _ => false,
        };
        if on_base {
            self.stop_mirror();
        } else {
            self.start_mirror(&url, surface);
        }
        self.set_phase(RoutePhase::Loaded);
        let _ = self.event_tx.send(SessionEvent::NavLoaded { url: Some(url) });
    }

    fn handle_failure(&mut self, surface: SurfaceId, error: String) {
        self.emit_ready();
        warn!("navigation failed: {error}");
        let current = self.surface_handle(surface).and_then(|s| s.current_url());
        self.orientation.update_active_path(current.clone());
        self.stop_mirror();
        self.set_phase(RoutePhase::Failed);
        let _ = self.event_tx.send(SessionEvent::NavFailed {
            url: current,
            error,
        });
    }

    /// Fired on the first finished navigation, success or failure, and never
    /// again for this surface.
    fn emit_ready(&mut self) {
        if self.ready_sent {
            return;
        }
        self.ready_sent = true;
        let _ = self.event_tx.send(SessionEvent::Ready);
    }

    fn maybe_schedule_trail(&mut self, url: &Url) {
        if url.as_str() == self.routes.entry_url().as_str() {
            return;
        }
        if self.trail_scheduled || self.routes.has_stored_trail() {
            return;
        }
        // Claim the slot at schedule time so an overlapping later navigation
        // cannot schedule a second committing write.
        self.trail_scheduled = true;
        let delay = self.config.trail_delay;
        let tx = self.deferred_tx.clone();
        let url = url.clone();
        debug!("trail write scheduled for {url} in {delay:?}");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A closed channel means the session is gone; drop the write.
            let _ = tx.send(Deferred::TrailDue { url });
        });
    }

    fn handle_deferred(&mut self, due: Deferred) {
        match due {
            Deferred::TrailDue { url } => {
                if self.routes.remember_trail(&url) {
                    let _ = self.event_tx.send(SessionEvent::TrailStored { url });
                }
            }
        }
    }

    fn start_mirror(&mut self, url: &Url, surface: SurfaceId) {
        self.stop_mirror();
        let Some(origin) = self.surface_handle(surface) else {
            return;
        };
        let host = url
            .host_str()
            .map(|h| h.to_ascii_lowercase())
            .unwrap_or_default();
        self.mirror = Some(MirrorJob::start(
            host,
            self.config.mirror_interval,
            origin.cookies(),
            self.routes.clone(),
            self.event_tx.clone(),
        ));
    }

    fn set_phase(&mut self, next: RoutePhase) {
        debug!("route phase {:?} -> {next:?}", self.phase);
        self.phase = next;
    }

    fn stop_mirror(&mut self) {
        if let Some(job) = self.mirror.take() {
            job.stop();
        }
    }

    fn surface_handle(&self, id: SurfaceId) -> Option<Arc<dyn RenderingSurface>> {
        if id == self.main_id {
            return Some(self.main.clone());
        }
        match self.popup.as_ref() {
            Some(p) if p.id == id => p.handle.upgrade(),
            _ => None,
        }
    }
}
