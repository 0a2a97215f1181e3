//! Feature modules for Casement.
//!
//! - [`wm`] - window and display state manager

pub mod wm;
