//! End-to-end tests for the window manager through its public API.
//!
//! Each test builds a manager from configuration, the same way the CLI does.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use casement_lib::config::{CasementConfig, load_config_from_path};
use casement_lib::modules::wm::state::{
    AvoidAreaType, DisplayId, ExpandOption, Orientation, Rect, RemoteToken, Rotation, ScreenId,
    VirtualScreenOption, WindowSpec, WindowType,
};
use casement_lib::modules::wm::{ServiceActor, handler};
use casement_lib::{Collaborators, EventTarget, EventType, WindowManager, WmError, WmEvent};
use parking_lot::Mutex;

// ============================================================================
// Helpers
// ============================================================================

fn manager() -> Arc<WindowManager> {
    let config = CasementConfig::default();
    WindowManager::from_config(&config, Collaborators::in_process(config.capabilities.iter().cloned()))
        .unwrap()
}

fn virtual_screen(wm: &WindowManager, name: &str) -> (ScreenId, DisplayId) {
    let change = wm
        .create_virtual_screen(&VirtualScreenOption {
            name: name.to_string(),
            width: 800,
            height: 600,
            density: 1.0,
            surface: None,
        })
        .unwrap();
    change.added.unwrap()
}

fn record(wm: &WindowManager, target: EventTarget, event_type: EventType) -> Arc<Mutex<Vec<WmEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    wm.on(target, event_type, handler(move |event| sink.lock().push(event.clone())))
        .unwrap();
    seen
}

// ============================================================================
// Topology
// ============================================================================

#[test]
fn test_mirror_shares_main_geometry() {
    let wm = manager();
    let (screen, display) = virtual_screen(&wm, "projector");

    let group = wm.make_mirror(0, &[screen]).unwrap();
    let mirror = wm.display(display).unwrap();
    let main = wm.default_display().unwrap();
    assert_eq!((mirror.width, mirror.height), (main.width, main.height));
    assert_eq!(wm.mirror_group(group).unwrap().main, 0);

    assert!(matches!(wm.make_mirror(0, &[0]), Err(WmError::InvalidParam(_))));
}

#[test]
fn test_virtual_pair_expand_then_destroy() {
    let wm = manager();
    let removed = record(&wm, EventTarget::Display, EventType::Remove);

    let (left, _) = virtual_screen(&wm, "left");
    let (right, right_display) = virtual_screen(&wm, "right");
    let group = wm
        .make_expand(&[
            ExpandOption { screen_id: left, start_x: 0.0, start_y: 0.0 },
            ExpandOption { screen_id: right, start_x: 800.0, start_y: 0.0 },
        ])
        .unwrap();
    assert_eq!(wm.expand_bounds(group).unwrap(), Rect::new(0.0, 0.0, 1600.0, 600.0));

    wm.destroy_virtual_screen(right).unwrap();
    assert_eq!(
        removed.lock().as_slice(),
        &[WmEvent::DisplayRemoved { display_id: right_display }]
    );
    assert!(matches!(wm.screen(right), Err(WmError::InvalidScreen(_))));
    assert!(matches!(wm.destroy_virtual_screen(right), Err(WmError::InvalidScreen(_))));
}

#[test]
fn test_real_screen_cannot_be_destroyed_as_virtual() {
    let wm = manager();
    assert!(wm.destroy_virtual_screen(0).is_err());
    assert_eq!(wm.all_screens().len(), 1);
}

// ============================================================================
// Windows
// ============================================================================

#[test]
fn test_double_destroy_reports_invalid_window() {
    let wm = manager();
    let window = wm.create_window(WindowSpec::new("editor", WindowType::App, 0)).unwrap();

    wm.destroy_window(window.id).unwrap();
    assert!(matches!(wm.destroy_window(window.id), Err(WmError::InvalidWindow(_))));
    assert!(matches!(wm.window(window.id), Err(WmError::InvalidWindow(_))));
}

#[test]
fn test_avoid_area_is_idempotent() {
    let wm = manager();
    let window = wm.create_window(WindowSpec::new("editor", WindowType::App, 0)).unwrap();
    wm.show_window(window.id).unwrap();

    for area_type in AvoidAreaType::ALL {
        let first = wm.avoid_area(window.id, area_type).unwrap();
        let second = wm.avoid_area(window.id, area_type).unwrap();
        assert_eq!(first, second, "{area_type:?} changed between queries");
    }
}

#[test]
fn test_rotation_lock_defers_orientation() {
    let wm = manager();
    let window = wm.create_window(WindowSpec::new("video", WindowType::App, 0)).unwrap();
    wm.show_window(window.id).unwrap();

    wm.set_rotation_locked(true).unwrap();
    wm.set_preferred_orientation(window.id, Orientation::Landscape).unwrap();
    assert_eq!(wm.default_display().unwrap().rotation, Rotation::Deg0);

    wm.set_rotation_locked(false).unwrap();
    let display = wm.default_display().unwrap();
    assert_eq!(display.rotation, Rotation::Deg90);
    assert_eq!((display.width, display.height), (2340.0, 1080.0));
}

#[test]
fn test_dialog_death_callback_runs_once() {
    let wm = manager();
    let dialog = wm.create_window(WindowSpec::new("confirm", WindowType::Dialog, 0)).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    wm.bind_dialog_target(
        dialog.id,
        RemoteToken(42),
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    assert_eq!(wm.notify_remote_died(RemoteToken(42)).unwrap(), 1);
    assert_eq!(wm.notify_remote_died(RemoteToken(42)).unwrap(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn test_subscribers_run_in_registration_order() {
    let wm = manager();
    let order = Arc::new(Mutex::new(Vec::new()));

    let first_log = Arc::clone(&order);
    let first = handler(move |_| first_log.lock().push("first"));
    let second_log = Arc::clone(&order);
    let second = handler(move |_| second_log.lock().push("second"));

    wm.on(EventTarget::Display, EventType::Add, Arc::clone(&first)).unwrap();
    wm.on(EventTarget::Display, EventType::Add, second).unwrap();
    wm.on(EventTarget::Display, EventType::Add, first).unwrap();

    virtual_screen(&wm, "extra");
    assert_eq!(order.lock().as_slice(), &["first", "second"]);
}

#[test]
fn test_invalid_event_type_for_target() {
    let wm = manager();
    let result = wm.on(EventTarget::Display, EventType::WindowStageEvent, handler(|_| {}));
    assert!(matches!(result, Err(WmError::InvalidParam(_))));
}

// ============================================================================
// Actor
// ============================================================================

#[tokio::test]
async fn test_actor_and_manager_share_state() {
    let wm = manager();
    let handle = ServiceActor::spawn(Arc::clone(&wm));

    let window = handle.create_window(WindowSpec::new("remote", WindowType::App, 0)).await.unwrap();
    assert_eq!(wm.window(window.id).unwrap().name, "remote");
    assert_eq!(handle.get_default_display().await.unwrap(), wm.default_display().unwrap());

    handle.stop().await.unwrap();
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_jsonc_config_drives_topology() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{
            // A landscape tablet without system bars.
            "screens": [{{ "name": "Tablet", "width": 2560, "height": 1600, "refreshRate": 120, "density": 2.0 }}],
            "systemBars": {{ "enabled": false }},
            "gesture": {{ "enabled": false }},
            "rotationLocked": true
        }}"#
    )
    .unwrap();

    let (config, path) = load_config_from_path(file.path()).unwrap();
    assert_eq!(path, file.path());

    let wm = WindowManager::from_config(&config, Collaborators::in_process(["system_window"])).unwrap();
    let display = wm.default_display().unwrap();
    assert_eq!((display.width, display.height), (2560.0, 1600.0));
    assert!(wm.is_rotation_locked());
    assert!(wm.all_windows().is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "screens": [{{ "density": 9.0 }}] }}"#).unwrap();

    let result = load_config_from_path(file.path())
        .map_err(WmError::from)
        .and_then(|(config, _)| WindowManager::from_config(&config, Collaborators::in_process(["system_window"])));
    assert!(matches!(result, Err(WmError::Config(_))));
}
