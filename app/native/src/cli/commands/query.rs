//! Read-only inspection commands.

use colored::Colorize;
use serde::Serialize;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use super::types::WindowSelector;
use crate::cli::output::{format_bool, format_rect, print_json};
use crate::error::WmResult;
use crate::modules::wm::WindowManager;
use crate::modules::wm::state::{
    AvoidArea, AvoidAreaType, Display, DisplayId, Screen, ScreenKind, Window, WindowLayoutMode,
};

#[derive(Serialize)]
struct TopologyOutput {
    screens: Vec<Screen>,
    displays: Vec<Display>,
    rotation_locked: bool,
}

#[derive(Tabled)]
struct ScreenRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Rotation")]
    rotation: String,
    #[tabled(rename = "Ratio")]
    ratio: String,
    #[tabled(rename = "Group")]
    group: String,
}

impl From<&Screen> for ScreenRow {
    fn from(screen: &Screen) -> Self {
        let mode = screen.mode().map_or_else(
            || "-".to_string(),
            |m| format!("{}x{} @{}Hz", m.width, m.height, m.refresh_rate),
        );
        let group = match (screen.mirror_group, screen.expand_group) {
            (Some(id), _) => format!("mirror {id}"),
            (None, Some(id)) => format!("expand {id}"),
            (None, None) => "-".to_string(),
        };
        Self {
            id: screen.id,
            name: screen.name.clone(),
            kind: match screen.kind {
                ScreenKind::Real => "real".to_string(),
                ScreenKind::Virtual => "virtual".to_string(),
            },
            mode,
            rotation: format!("{}°", screen.rotation.degrees()),
            ratio: format!("{:.2}", screen.virtual_pixel_ratio),
            group,
        }
    }
}

#[derive(Tabled)]
struct DisplayRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Screen")]
    screen: u64,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "DPI")]
    dpi: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Cutouts")]
    cutouts: usize,
    #[tabled(rename = "Alive")]
    alive: String,
}

impl From<&Display> for DisplayRow {
    fn from(display: &Display) -> Self {
        Self {
            id: display.id,
            screen: display.screen_id,
            size: format!("{}x{}", display.width, display.height),
            dpi: format!("{:.0}", display.density_dpi),
            state: format!("{:?}", display.state),
            cutouts: display.cutouts.len(),
            alive: format_bool(display.alive),
        }
    }
}

/// `casement topology`
pub fn topology(wm: &WindowManager, json: bool) -> WmResult<()> {
    let screens = wm.all_screens();
    let displays = wm.all_displays();

    if json {
        return print_json(&TopologyOutput {
            screens,
            displays,
            rotation_locked: wm.is_rotation_locked(),
        });
    }

    let screen_rows: Vec<ScreenRow> = screens.iter().map(ScreenRow::from).collect();
    let display_rows: Vec<DisplayRow> = displays.iter().map(DisplayRow::from).collect();

    println!("{}", format!("Screens ({})", screen_rows.len()).bold());
    let table = Table::new(screen_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()))
        .to_string();
    println!("{table}");

    println!("{}", format!("Displays ({})", display_rows.len()).bold());
    let table = Table::new(display_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..2)).with(Alignment::right()))
        .with(Modify::new(Columns::one(6)).with(Alignment::center()))
        .to_string();
    println!("{table}");

    let lock = if wm.is_rotation_locked() { "locked".yellow() } else { "unlocked".green() };
    println!("Rotation: {lock}");
    Ok(())
}

#[derive(Tabled)]
struct WindowRow {
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    window_type: String,
    #[tabled(rename = "Display")]
    display: u64,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Mode")]
    mode: &'static str,
    #[tabled(rename = "Frame")]
    frame: String,
    #[tabled(rename = "Focus")]
    focused: String,
}

impl From<&Window> for WindowRow {
    fn from(window: &Window) -> Self {
        Self {
            id: window.id,
            name: window.name.clone(),
            window_type: window.window_type.as_str().to_string(),
            display: window.display_id,
            state: format!("{:?}", window.lifecycle),
            mode: window.mode.as_str(),
            frame: format_rect(&window.frame),
            focused: format_bool(window.is_focused),
        }
    }
}

/// Windows sorted topmost first.
fn sorted_windows(wm: &WindowManager, display: Option<DisplayId>) -> Vec<Window> {
    let mut windows = display.map_or_else(|| wm.all_windows(), |id| wm.windows_on_display(id));
    windows.sort_by_key(|w| std::cmp::Reverse((w.window_type.layer(), w.z_seq, w.id)));
    windows
}

/// `casement windows`
pub fn windows(wm: &WindowManager, display: Option<DisplayId>, json: bool) -> WmResult<()> {
    if let Some(id) = display {
        wm.display(id)?;
    }
    let windows = sorted_windows(wm, display);

    if json {
        return print_json(&windows);
    }

    if windows.is_empty() {
        println!("{}", "No windows".dimmed());
        return Ok(());
    }

    let rows: Vec<WindowRow> = windows.iter().map(WindowRow::from).collect();
    println!("{}", format!("Windows ({})", rows.len()).bold());
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()))
        .with(Modify::new(Columns::one(3)).with(Alignment::right()))
        .with(Modify::new(Columns::one(7)).with(Alignment::center()))
        .to_string();
    println!("{table}");
    Ok(())
}

#[derive(Serialize)]
struct DumpOutput {
    #[serde(flatten)]
    topology: TopologyOutput,
    layout_mode: WindowLayoutMode,
    windows: Vec<Window>,
}

fn dump_output(wm: &WindowManager) -> DumpOutput {
    DumpOutput {
        topology: TopologyOutput {
            screens: wm.all_screens(),
            displays: wm.all_displays(),
            rotation_locked: wm.is_rotation_locked(),
        },
        layout_mode: wm.window_layout_mode(),
        windows: sorted_windows(wm, None),
    }
}

/// `casement dump`
pub fn dump(wm: &WindowManager, json: bool) -> WmResult<()> {
    if json {
        return print_json(&dump_output(wm));
    }

    topology(wm, false)?;
    let mode = match wm.window_layout_mode() {
        WindowLayoutMode::Cascade => "cascade",
        WindowLayoutMode::Tile => "tile",
    };
    println!("Layout: {}", mode.cyan());
    windows(wm, None, false)
}

/// Resolve a selector against the registry.
fn resolve(wm: &WindowManager, selector: &WindowSelector) -> WmResult<Window> {
    match selector {
        WindowSelector::Id(id) => wm.window(*id),
        WindowSelector::Name(name) => wm.find_window(name),
    }
}

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "Edge")]
    edge: &'static str,
    #[tabled(rename = "Rect")]
    rect: String,
}

fn edge_rows(area: &AvoidArea) -> Vec<EdgeRow> {
    [("top", &area.top), ("bottom", &area.bottom), ("left", &area.left), ("right", &area.right)]
        .into_iter()
        .map(|(edge, rect)| EdgeRow { edge, rect: format_rect(rect) })
        .collect()
}

/// `casement avoid-area`
pub fn avoid_area(
    wm: &WindowManager,
    area_type: AvoidAreaType,
    selector: &WindowSelector,
    json: bool,
) -> WmResult<()> {
    let window = resolve(wm, selector)?;
    let area = wm.avoid_area(window.id, area_type)?;

    if json {
        return print_json(&area);
    }

    println!(
        "{} {} ({}) {}",
        "Avoid area for".bold(),
        window.name.cyan(),
        window.id,
        format!("{area_type:?}").dimmed()
    );
    if area.is_empty() {
        println!("{}", "empty".dimmed());
        return Ok(());
    }
    let table = Table::new(edge_rows(&area)).with(Style::rounded()).to_string();
    println!("{table}");
    println!("Visible: {}", format_bool(area.visible));
    Ok(())
}
