//! Navigation and session coordination for an embedded web surface.
//!
//! The crate keeps a wrapped web view on the rails its shell expects: a
//! navigation policy decides which intents proceed, a coordinator tracks the
//! route lifecycle and persists a one-shot resume trail, a recurring job
//! mirrors off-host cookies into the session store, and an orientation
//! policy derives the allowed device orientations from where the surface
//! currently is. Platform embeddings plug in through the traits in
//! [`surface`]; [`sim`] provides the scripted stand-in the driver binary and
//! the integration tests run on.

pub mod cli;
pub mod model;
pub mod orientation;
pub mod policy;
pub mod report;
pub mod routes;
pub mod session;
pub mod sim;
pub mod storage;
pub mod surface;

// Re-export commonly used types
pub use model::{
    CookieRecord, CookieSnapshot, DeviceOrientation, OrientationMode, RoutePhase, SameSite,
    SessionCommand, SessionConfig, SessionEvent,
};
pub use orientation::{OrientationCenter, OrientationSink};
pub use policy::{decide, NavDecision, NavIntent};
pub use routes::RouteStore;
pub use session::{SessionCoordinator, SessionParams};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use surface::{CookieStore, RenderingSurface, SurfaceEvent, SurfaceId};
