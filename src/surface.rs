//! The seam between the shell and whatever renders web content.
//!
//! A platform embedding implements [`RenderingSurface`] and [`CookieStore`]
//! and reports callbacks as [`SurfaceEvent`]s; the coordinator consumes them
//! without knowing what is behind the trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use url::Url;

use crate::model::CookieRecord;
use crate::policy::NavIntent;

/// Identity of one surface instance. Popup detection compares these, never
/// URLs or pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SurfaceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// One embedded web view, or a stand-in for one.
pub trait RenderingSurface: Send + Sync {
    /// Begin loading `url`. Progress is reported back through events.
    fn load(&self, url: &Url);
    /// Reload whatever the surface currently shows.
    fn reload(&self);
    /// The URL the surface currently reports, if any.
    fn current_url(&self) -> Option<Url>;
    /// The cookie store this surface's content writes into.
    fn cookies(&self) -> Arc<dyn CookieStore>;
}

/// Read access to a surface's cookies. Listing is async because real
/// embeddings hand the jar over on a platform callback.
#[async_trait]
pub trait CookieStore: Send + Sync {
    async fn list_all(&self) -> Vec<CookieRecord>;
}

/// Callbacks surfaces feed into the coordinator.
pub enum SurfaceEvent {
    /// A navigation wants to proceed; answer `true` through `verdict` to let
    /// the surface carry it out.
    IntentRequested {
        surface: SurfaceId,
        intent: NavIntent,
        verdict: oneshot::Sender<bool>,
    },
    /// A secondary context came into existence (the `window.open` path).
    /// The coordinator tracks it weakly; it is owned by its opener.
    PopupOpened {
        surface: SurfaceId,
        handle: Arc<dyn RenderingSurface>,
    },
    LoadStarted {
        surface: SurfaceId,
    },
    LoadFinished {
        surface: SurfaceId,
    },
    LoadFailed {
        surface: SurfaceId,
        error: String,
    },
}
