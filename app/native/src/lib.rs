//! Casement - a window and display state manager.
//!
//! This library holds the service core and the CLI around it. The core tracks
//! screens and the displays derived from them, a registry of windows, the
//! geometry and avoid areas computed for each window, and the lifecycle of
//! ability stages. Every mutation runs under per-display locks and publishes
//! its events to subscribers after the locks are released.
//!
//! Synchronous callers use [`WindowManager`] directly; asynchronous callers go
//! through a [`ServiceHandle`] returned by [`ServiceActor::spawn`].

// Core modules
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod modules;
pub mod schema;

pub use error::{WmError, WmResult};
pub use modules::wm::{
    Collaborators, DestroyMode, EventTarget, EventType, PendingOperation, ServiceActor,
    ServiceHandle, WindowManager, WmEvent,
};
