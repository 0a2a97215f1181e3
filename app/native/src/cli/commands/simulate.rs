//! `casement simulate`: a scripted client session.
//!
//! The script talks to the service through [`ServiceHandle`] the way a client
//! process would, and subscribes one handler to every event it can observe.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use colored::Colorize;
use serde::Serialize;

use crate::error::WmResult;
use crate::modules::wm::state::{
    AvoidAreaType, ExpandOption, Orientation, Rect, RemoteToken, VirtualScreenOption, WindowSpec,
    WindowType,
};
use crate::modules::wm::{
    DestroyMode, EventHandler, EventTarget, EventType, ServiceActor, ServiceHandle, WindowManager,
    WmEvent, handler,
};

/// Remote peer the demo dialog is bound to.
const DIALOG_PEER: RemoteToken = RemoteToken(0xD1A1);

/// What the script observed, printed at the end.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ScriptSummary {
    pub expand_width: f64,
    pub rotated_size: (f64, f64),
    pub keyboard_inset: f64,
    pub dialog_callbacks: usize,
    pub windows_left: usize,
}

/// Run the script on a fresh current-thread runtime.
///
/// # Errors
///
/// Returns the first error raised by a scripted step.
pub fn run(wm: Arc<WindowManager>, json: bool) -> WmResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;

    let sink = handler(move |event| print_event(event, json));
    let summary = runtime.block_on(async {
        let handle = ServiceActor::spawn(Arc::clone(&wm));
        let result = script(&wm, &handle, &sink).await;
        if let Err(err) = handle.stop().await {
            tracing::debug!(%err, "service actor already stopped");
        }
        result
    })?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!();
        println!("{}", "Summary".bold());
        println!("  expand canvas width   {}", summary.expand_width);
        println!("  rotated display size  {}x{}", summary.rotated_size.0, summary.rotated_size.1);
        println!("  keyboard inset        {}", summary.keyboard_inset);
        println!("  dialog callbacks      {}", summary.dialog_callbacks);
        println!("  windows left          {}", summary.windows_left);
    }
    Ok(())
}

fn print_event(event: &WmEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(%err, event = event.name(), "failed to serialize event"),
        }
        return;
    }
    println!("  {} {} {}", "→".dimmed(), event.name().cyan(), describe(event).dimmed());
}

fn describe(event: &WmEvent) -> String {
    match event {
        WmEvent::DisplayAdded { display_id }
        | WmEvent::DisplayRemoved { display_id }
        | WmEvent::DisplayChanged { display_id } => format!("display {display_id}"),
        WmEvent::ScreenAdded { screen_id }
        | WmEvent::ScreenRemoved { screen_id }
        | WmEvent::ScreenChanged { screen_id } => format!("screen {screen_id}"),
        WmEvent::WindowSizeChanged { window_id, width, height } => {
            format!("window {window_id} {width}x{height}")
        }
        WmEvent::AvoidAreaChanged { window_id, area_type, .. } => {
            format!("window {window_id} {area_type:?}")
        }
        WmEvent::Screenshot { window_id } | WmEvent::DialogTargetTouched { window_id } => {
            format!("window {window_id}")
        }
        WmEvent::KeyboardHeightChanged { window_id, height } => {
            format!("window {window_id} height {height}")
        }
        WmEvent::SystemBarTintChanged { display_id, tints } => {
            format!("display {display_id}, {} bars", tints.len())
        }
        WmEvent::StageLifecycleChanged { lifecycle, .. } => format!("{lifecycle:?}"),
    }
}

fn step(title: &str) {
    tracing::debug!(step = title, "simulate");
    println!("{}", title.bold());
}

fn virtual_option(name: &str) -> VirtualScreenOption {
    VirtualScreenOption {
        name: name.to_string(),
        width: 800,
        height: 600,
        density: 1.0,
        surface: None,
    }
}

/// The scripted session. Every event goes to `sink`.
pub async fn script(
    wm: &Arc<WindowManager>,
    handle: &ServiceHandle,
    sink: &EventHandler,
) -> WmResult<ScriptSummary> {
    let mut summary = ScriptSummary::default();

    for (target, event_type) in [
        (EventTarget::Display, EventType::Add),
        (EventTarget::Display, EventType::Remove),
        (EventTarget::Display, EventType::Change),
        (EventTarget::Screen, EventType::Add),
        (EventTarget::Screen, EventType::Remove),
        (EventTarget::Global, EventType::SystemBarTintChange),
    ] {
        wm.on(target, event_type, Arc::clone(sink))?;
    }

    let display = handle.get_default_display().await?;

    step("Create and show a stage");
    let stage = handle.create_stage("demo.ability", "demo.main", display.id).await?;
    let main = wm.stage(stage)?.main_window;
    wm.on(EventTarget::Stage(stage), EventType::WindowStageEvent, Arc::clone(sink))?;
    for event_type in [
        EventType::WindowSizeChange,
        EventType::AvoidAreaChange,
        EventType::KeyboardHeightChange,
    ] {
        wm.on(EventTarget::Window(main), event_type, Arc::clone(sink))?;
    }
    handle.show_window(main).await?;

    step("Open a floating sub window");
    let sub = handle
        .create_window(WindowSpec {
            stage_id: Some(stage),
            ..WindowSpec::new("demo.sub", WindowType::App, display.id)
        })
        .await?;
    handle.set_window_frame(sub.id, Rect::new(100.0, 400.0, 600.0, 800.0)).await?;
    handle.show_window(sub.id).await?;

    step("Expand onto two virtual screens");
    let left = handle.create_virtual_screen(virtual_option("demo.left")).await?;
    let right = handle.create_virtual_screen(virtual_option("demo.right")).await?;
    let (Some((left, _)), Some((right, _))) = (left.added, right.added) else {
        return Err(crate::error::WmError::SystemAbnormally(
            "virtual screen creation reported no screen".to_string(),
        ));
    };
    let group = handle
        .make_expand(&[
            ExpandOption { screen_id: left, start_x: 0.0, start_y: 0.0 },
            ExpandOption { screen_id: right, start_x: 800.0, start_y: 0.0 },
        ])
        .await?;
    summary.expand_width = handle.get_expand_bounds(group).await?.width;

    step("Rotate to landscape under the rotation lock");
    handle.set_rotation_locked(true).await?;
    // The sub window is on top, so its preference drives the display.
    handle.set_preferred_orientation(sub.id, Orientation::Landscape).await?;
    handle.set_rotation_locked(false).await?;
    let rotated = handle.get_default_display().await?;
    summary.rotated_size = (rotated.width, rotated.height);
    handle.set_preferred_orientation(sub.id, Orientation::Portrait).await?;

    step("Raise and dismiss the keyboard");
    handle.report_keyboard_height(display.id, 900.0)?;
    let keyboard = handle.get_avoid_area(main, AvoidAreaType::Keyboard).await?;
    summary.keyboard_inset = keyboard.bottom.height;
    handle.report_keyboard_height(display.id, 0.0)?;

    step("Bind a dialog to a remote peer that dies");
    let dialog = handle.create_window(WindowSpec::new("demo.dialog", WindowType::Dialog, display.id)).await?;
    wm.on(EventTarget::Window(dialog.id), EventType::DialogTargetTouch, Arc::clone(sink))?;
    let callbacks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&callbacks);
    wm.bind_dialog_target(
        dialog.id,
        DIALOG_PEER,
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )?;
    wm.touch_dialog_target(DIALOG_PEER)?;
    handle.report_remote_died(DIALOG_PEER)?;
    handle.report_remote_died(DIALOG_PEER)?;
    handle.get_all_displays().await?;
    summary.dialog_callbacks = callbacks.load(Ordering::SeqCst);

    step("Tear down");
    handle.destroy_window(dialog.id).await?;
    handle.destroy_virtual_screen(right).await?;
    handle.destroy_virtual_screen(left).await?;
    handle.destroy_stage(stage, DestroyMode::Force).await?;
    summary.windows_left = wm.all_windows().len();

    Ok(summary)
}
