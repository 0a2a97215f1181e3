//! Window and display state management.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ ServiceActor (async, serialized)  ──►  WindowManager (sync)  │
//! │                                          │                   │
//! │   TopologyStore   WindowRegistry   LayoutEngine   Stages     │
//! │         └──────────────┴─────────────────┴──────────┘        │
//! │                          │ events                            │
//! │                   EventDispatcher ──► subscribers            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`state`] holds the plain data stores
//! - [`layout`] derives geometry, avoid areas and rotation
//! - [`stage`] tracks ability stages and their lifecycle
//! - [`dispatcher`] delivers events in registration order
//! - [`manager`] sequences every mutation and owns the locks
//! - [`actor`] gives async callers a serialized view of the manager

pub mod actor;
pub mod collaborators;
pub mod dispatcher;
pub mod layout;
pub mod manager;
pub mod pending;
pub mod stage;
pub mod state;

pub use actor::{ActorError, ServiceActor, ServiceHandle};
pub use collaborators::{
    CapabilityChecker, ContentLoader, NoopContentLoader, PixelBuffer, SnapshotProducer,
    SolidColorSnapshot, StaticCapabilities, capability,
};
pub use dispatcher::{EventDispatcher, EventHandler, EventTarget, EventType, SystemBarTint, WmEvent, handler};
pub use manager::{Collaborators, SystemUiOptions, WindowManager};
pub use pending::PendingOperation;
pub use stage::DestroyMode;
