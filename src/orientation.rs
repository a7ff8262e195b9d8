//! Orientation policy derived from the route pair.
//!
//! The rule is a host comparison: while the active path sits on the same host
//! as the registered main entry, the shell locks to landscape; anywhere else
//! it stays flexible. One [`OrientationCenter`] is shared by everything that
//! moves routes, so the derived mode has a single owner.

use std::sync::{Arc, Mutex};

use log::debug;
use url::Url;

use crate::model::{DeviceOrientation, OrientationMode};

/// Receiver for recomputed modes. Applied on every recomputation, changed or
/// not; the platform side treats reapplication as a no-op.
pub trait OrientationSink: Send + Sync {
    fn apply(&self, mode: OrientationMode);
}

/// Sink that only logs. Used where no physical display exists to rotate.
pub struct LogSink;

impl OrientationSink for LogSink {
    fn apply(&self, mode: OrientationMode) {
        debug!("orientation mode applied: {:?}", mode);
    }
}

#[derive(Default)]
struct RoutePair {
    main_entry: Option<Url>,
    active_path: Option<Url>,
    mode: Option<OrientationMode>,
}

pub struct OrientationCenter {
    routes: Mutex<RoutePair>,
    sink: Arc<dyn OrientationSink>,
}

impl OrientationCenter {
    pub fn new(sink: Arc<dyn OrientationSink>) -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(RoutePair::default()),
            sink,
        })
    }

    /// Record the main surface's entry URL and recompute.
    pub fn register_main_entry(&self, url: Url) {
        let mut routes = self.routes.lock().unwrap();
        routes.main_entry = Some(url);
        self.refresh(&mut routes);
    }

    /// Record where the main surface currently is and recompute. `None` means
    /// the surface reports no URL at all.
    pub fn update_active_path(&self, url: Option<Url>) {
        let mut routes = self.routes.lock().unwrap();
        routes.active_path = url;
        self.refresh(&mut routes);
    }

    pub fn current_mode(&self) -> OrientationMode {
        self.routes
            .lock()
            .unwrap()
            .mode
            .unwrap_or(OrientationMode::Flexible)
    }

    pub fn current_mask(&self) -> &'static [DeviceOrientation] {
        self.current_mode().mask()
    }

    fn refresh(&self, routes: &mut RoutePair) {
        let mode = derive_mode(routes.main_entry.as_ref(), routes.active_path.as_ref());
        routes.mode = Some(mode);
        self.sink.apply(mode);
    }
}

/// `LockedLandscape` only when both URLs carry hosts and the hosts match,
/// case-insensitively. Any missing piece falls back to `Flexible`.
pub fn derive_mode(main_entry: Option<&Url>, active_path: Option<&Url>) -> OrientationMode {
    let (Some(entry), Some(active)) = (main_entry, active_path) else {
        return OrientationMode::Flexible;
    };
    match (entry.host_str(), active.host_str()) {
        (Some(e), Some(a)) if e.eq_ignore_ascii_case(a) => OrientationMode::LockedLandscape,
        _ => OrientationMode::Flexible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink(Mutex<Vec<OrientationMode>>);

    impl OrientationSink for RecordingSink {
        fn apply(&self, mode: OrientationMode) {
            self.0.lock().unwrap().push(mode);
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn same_host_locks_landscape() {
        let entry = url("https://example.test/play");
        let active = url("https://example.test/deep/page?x=1");
        assert_eq!(derive_mode(Some(&entry), Some(&active)), OrientationMode::LockedLandscape);
    }

    #[test]
    fn host_compare_ignores_case_and_path() {
        let entry = url("https://Example.TEST/play");
        let active = url("http://example.test/other");
        assert_eq!(derive_mode(Some(&entry), Some(&active)), OrientationMode::LockedLandscape);
    }

    #[test]
    fn different_host_is_flexible() {
        let entry = url("https://example.test/play");
        let active = url("https://partner.test/offer");
        assert_eq!(derive_mode(Some(&entry), Some(&active)), OrientationMode::Flexible);
    }

    #[test]
    fn missing_either_side_is_flexible() {
        let entry = url("https://example.test/play");
        assert_eq!(derive_mode(Some(&entry), None), OrientationMode::Flexible);
        assert_eq!(derive_mode(None, Some(&entry)), OrientationMode::Flexible);
        assert_eq!(derive_mode(None, None), OrientationMode::Flexible);
    }

    #[test]
    fn hostless_url_is_flexible() {
        let entry = url("https://example.test/play");
        let active = url("about:blank");
        assert_eq!(derive_mode(Some(&entry), Some(&active)), OrientationMode::Flexible);
    }

    #[test]
    fn center_pushes_every_recomputation() {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let center = OrientationCenter::new(sink.clone());
        center.register_main_entry(url("https://example.test/play"));
        center.update_active_path(Some(url("https://example.test/play")));
        center.update_active_path(Some(url("https://partner.test/offer")));
        center.update_active_path(None);
        let seen = sink.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                OrientationMode::Flexible,
                OrientationMode::LockedLandscape,
                OrientationMode::Flexible,
                OrientationMode::Flexible,
            ]
        );
        assert_eq!(center.current_mode(), OrientationMode::Flexible);
    }

    #[test]
    fn mode_before_any_input_is_flexible() {
        let center = OrientationCenter::new(Arc::new(LogSink));
        assert_eq!(center.current_mode(), OrientationMode::Flexible);
        assert_eq!(center.current_mask().len(), 3);
    }
}
