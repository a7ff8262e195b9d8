//! Recurring cookie capture for off-host routes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::model::{rfc3339_now, CookieRecord, CookieSnapshot, SessionEvent};
use crate::routes::RouteStore;
use crate::surface::CookieStore;

/// One running mirror job. Constructing a replacement never reuses the old
/// task; callers stop the previous job first.
pub(super) struct MirrorJob {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl MirrorJob {
    pub(super) fn start(
        host: String,
        period: Duration,
        cookies: Arc<dyn CookieStore>,
        routes: Arc<RouteStore>,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        debug!("mirror job starting, host filter {host:?}, period {period:?}");
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let handle = tokio::spawn(async move {
            run_mirror(host, period, cookies, routes, event_tx, flag).await;
        });
        Self { cancel, handle }
    }

    pub(super) fn stop(self) {
        self.cancel.store(true, Ordering::Relaxed);
        // Dropping a JoinHandle does NOT cancel the task; abort it so a tick
        // mid-await does not linger past the job.
        self.handle.abort();
    }
}

async fn run_mirror(
    host: String,
    period: Duration,
    cookies: Arc<dyn CookieStore>,
    routes: Arc<RouteStore>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    cancel: Arc<AtomicBool>,
) {
    // Repeating-timer shape: the first capture lands one full period after
    // the job starts, not immediately.
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let all = cookies.list_all().await;
        // The listing may have raced a stop; a cancelled job must not write.
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let kept = filter_cookies(all, &host);
        let count = kept.len();
        let snapshot = CookieSnapshot {
            captured_at: rfc3339_now(),
            host_filter: host.clone(),
            cookies: kept,
        };
        match routes.save_snapshot(&snapshot) {
            Ok(()) => {
                let _ = event_tx.send(SessionEvent::SnapshotStored {
                    host: host.clone(),
                    count,
                });
            }
            Err(e) => warn!("cookie snapshot not persisted: {e:#}"),
        }
    }
}

/// Keep cookies whose domain contains `host` as a substring, matched on the
/// lowercased domain. An empty filter keeps everything. Substring matching
/// intentionally catches dot-prefixed and parent-domain cookies that an exact
/// host compare would miss.
pub(super) fn filter_cookies(all: Vec<CookieRecord>, host: &str) -> Vec<CookieRecord> {
    if host.is_empty() {
        return all;
    }
    all.into_iter()
        .filter(|c| c.domain.to_ascii_lowercase().contains(host))
        .collect()
}
