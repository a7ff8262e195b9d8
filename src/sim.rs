//! Scripted in-process rendering surface.
//!
//! Stands in for a real embedded web view: navigations complete instantly,
//! cookies live in a plain vector, and every lifecycle step is reported
//! through the same [`SurfaceEvent`] channel a platform embedding would use.
//! The driver binary and the integration tests both run on it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use url::Url;

use crate::model::CookieRecord;
use crate::policy::NavIntent;
use crate::surface::{CookieStore, RenderingSurface, SurfaceEvent, SurfaceId};

/// Shared cookie jar. Popups share their opener's jar, like embedded views
/// sharing one process-wide store.
#[derive(Default)]
pub struct SimCookieJar {
    cookies: Mutex<Vec<CookieRecord>>,
}

impl SimCookieJar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, cookie: CookieRecord) {
        self.cookies.lock().unwrap().push(cookie);
    }
}

#[async_trait]
impl CookieStore for SimCookieJar {
    async fn list_all(&self) -> Vec<CookieRecord> {
        self.cookies.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct SimState {
    current: Option<Url>,
    loads: Vec<Url>,
}

pub struct SimSurface {
    id: SurfaceId,
    events: tokio::sync::mpsc::UnboundedSender<SurfaceEvent>,
    jar: Arc<SimCookieJar>,
    state: Mutex<SimState>,
}

impl SimSurface {
    pub fn new(events: tokio::sync::mpsc::UnboundedSender<SurfaceEvent>) -> Arc<Self> {
        Self::with_jar(events, SimCookieJar::new())
    }

    pub fn with_jar(
        events: tokio::sync::mpsc::UnboundedSender<SurfaceEvent>,
        jar: Arc<SimCookieJar>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SurfaceId::next(),
            events,
            jar,
            state: Mutex::new(SimState::default()),
        })
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn jar(&self) -> Arc<SimCookieJar> {
        self.jar.clone()
    }

    /// Every URL the shell asked this surface to load, in order. User-driven
    /// navigations do not appear here.
    pub fn load_history(&self) -> Vec<Url> {
        self.state.lock().unwrap().loads.clone()
    }

    /// A user-driven navigation targeting this surface's frame. Asks for a
    /// verdict and completes the load only when allowed. Returns the verdict.
    pub async fn navigate(&self, raw: &str) -> bool {
        let url = Url::parse(raw).ok();
        let allowed = self.request_verdict(NavIntent::targeted(url.clone())).await;
        if allowed {
            if let Some(url) = url {
                self.complete_load(url);
            }
        }
        allowed
    }

    /// A `window.open`-style navigation with no target frame. The surface
    /// never carries these out itself; the shell decides what happens.
    pub async fn navigate_untargeted(&self, raw: &str) -> bool {
        self.request_verdict(NavIntent::untargeted(Url::parse(raw).ok()))
            .await
    }

    /// Spawn a secondary context sharing this surface's jar, announce it,
    /// and fire its first navigation intent. Returns the popup so the caller
    /// keeps it alive for as long as a real opener would.
    pub async fn open_popup(&self, raw: &str) -> Arc<SimSurface> {
        let popup = SimSurface::with_jar(self.events.clone(), self.jar.clone());
        let _ = self.events.send(SurfaceEvent::PopupOpened {
            surface: popup.id,
            handle: popup.clone(),
        });
        let _ = popup.request_verdict(NavIntent::targeted(Url::parse(raw).ok())).await;
        popup
    }

    /// Report a failed navigation. `committed` moves the visible URL first,
    /// mimicking a failure after commit; `None` leaves it where it was.
    pub fn fail(&self, committed: Option<Url>, error: &str) {
        let _ = self.events.send(SurfaceEvent::LoadStarted { surface: self.id });
        if let Some(url) = committed {
            self.state.lock().unwrap().current = Some(url);
        }
        let _ = self.events.send(SurfaceEvent::LoadFailed {
            surface: self.id,
            error: error.to_string(),
        });
    }

    async fn request_verdict(&self, intent: NavIntent) -> bool {
        let (tx, rx) = oneshot::channel();
        let sent = self.events.send(SurfaceEvent::IntentRequested {
            surface: self.id,
            intent,
            verdict: tx,
        });
        if sent.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    fn complete_load(&self, url: Url) {
        let _ = self.events.send(SurfaceEvent::LoadStarted { surface: self.id });
        self.state.lock().unwrap().current = Some(url);
        let _ = self.events.send(SurfaceEvent::LoadFinished { surface: self.id });
    }
}

impl RenderingSurface for SimSurface {
    fn load(&self, url: &Url) {
        self.state.lock().unwrap().loads.push(url.clone());
        self.complete_load(url.clone());
    }

    fn reload(&self) {
        let current = self.state.lock().unwrap().current.clone();
        if let Some(url) = current {
            self.complete_load(url);
        }
    }

    fn current_url(&self) -> Option<Url> {
        self.state.lock().unwrap().current.clone()
    }

    fn cookies(&self) -> Arc<dyn CookieStore> {
        self.jar.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn load_records_history_and_reports_lifecycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let surface = SimSurface::new(tx);
        let url = Url::parse("https://example.test/a").unwrap();
        surface.load(&url);
        assert_eq!(surface.current_url(), Some(url.clone()));
        assert_eq!(surface.load_history(), vec![url]);
        assert!(matches!(rx.recv().await, Some(SurfaceEvent::LoadStarted { .. })));
        assert!(matches!(rx.recv().await, Some(SurfaceEvent::LoadFinished { .. })));
    }

    #[tokio::test]
    async fn reload_replays_current_url() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let surface = SimSurface::new(tx);
        surface.reload();
        assert!(rx.try_recv().is_err());
        let url = Url::parse("https://example.test/a").unwrap();
        surface.load(&url);
        surface.reload();
        let mut finishes = 0;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, SurfaceEvent::LoadFinished { .. }) {
                finishes += 1;
            }
        }
        assert_eq!(finishes, 2);
        assert_eq!(surface.current_url(), Some(url));
    }

    #[tokio::test]
    async fn denied_navigation_stays_put() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let surface = SimSurface::new(tx);
        let driver = surface.clone();
        let nav = tokio::spawn(async move { driver.navigate("https://example.test/x").await });
        // Answer the verdict by hand, standing in for the coordinator.
        match rx.recv().await {
            Some(SurfaceEvent::IntentRequested { verdict, .. }) => {
                let _ = verdict.send(false);
            }
            _ => panic!("expected an intent request"),
        }
        assert!(!nav.await.unwrap());
        assert_eq!(surface.current_url(), None);
    }

    #[tokio::test]
    async fn popup_shares_the_opener_jar() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let surface = SimSurface::new(tx);
        let opener = surface.clone();
        let popup_task =
            tokio::spawn(async move { opener.open_popup("https://partner.test/offer").await });
        assert!(matches!(rx.recv().await, Some(SurfaceEvent::PopupOpened { .. })));
        match rx.recv().await {
            Some(SurfaceEvent::IntentRequested { verdict, .. }) => {
                let _ = verdict.send(false);
            }
            _ => panic!("expected the popup's first intent"),
        }
        let popup = popup_task.await.unwrap();
        surface.jar().insert(CookieRecord {
            name: "shared".into(),
            value: "yes".into(),
            domain: ".partner.test".into(),
            path: "/".into(),
            secure: false,
            http_only: false,
            expires: None,
            same_site: None,
        });
        assert_eq!(popup.cookies().list_all().await.len(), 1);
        assert_ne!(popup.id(), surface.id());
    }
}
