#![allow(clippy::multiple_crate_versions)]

//! Casement - window and display state manager.
//!
//! The binary is a thin CLI over the library: it inspects the topology and
//! windows a configuration produces and can drive a scripted session through
//! the service actor.

fn main() {
    if let Err(err) = casement_lib::cli::run() {
        eprintln!("casement: {err}");
        std::process::exit(1);
    }
}
