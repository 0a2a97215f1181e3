//! The topology store: screens, displays and their mirror/expand groups.
//!
//! Screens and displays live in observable vectors so observers can follow
//! topology changes. Every successful mutation bumps a monotonic generation
//! and returns a [`TopologyChange`] describing what it touched.

use std::collections::{BTreeMap, HashMap};

use eyeball::Observable;
use eyeball_im::ObservableVector;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::types::{
    Display, DisplayId, DisplayState, GroupId, Rect, Rotation, Screen, ScreenId, ScreenKind,
    ScreenMode, ScreenOrientation, SurfaceId,
};
use crate::error::{WmError, WmResult};
use crate::modules::wm::pending::{Completer, PendingOperation};

/// Valid range for the virtual pixel ratio.
pub const PIXEL_RATIO_RANGE: std::ops::RangeInclusive<f64> = 0.5..=4.0;

/// DPI of a display with a virtual pixel ratio of 1.0.
const BASE_DENSITY_DPI: f64 = 160.0;

/// A set of screens rendering the content of one main screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MirrorGroup {
    pub id: GroupId,
    pub main: ScreenId,
    pub mirrors: SmallVec<[ScreenId; 4]>,
}

/// Placement of one screen inside an expand group.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandOption {
    pub screen_id: ScreenId,
    pub start_x: f64,
    pub start_y: f64,
}

/// A set of screens tiled into one logical canvas.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpandGroup {
    pub id: GroupId,
    pub members: SmallVec<[ExpandOption; 4]>,
}

/// Parameters of a client-created screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VirtualScreenOption {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub density: f64,
    pub surface: Option<SurfaceId>,
}

/// Description of a committed topology mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TopologyChange {
    /// Store generation after the mutation.
    pub generation: u64,

    /// Mirror or expand group created or modified, if any.
    pub group: Option<GroupId>,

    /// Displays whose properties or membership changed.
    pub displays: SmallVec<[DisplayId; 4]>,

    /// Screens whose properties or membership changed.
    pub screens: SmallVec<[ScreenId; 4]>,

    /// Screen and display that appeared.
    pub added: Option<(ScreenId, DisplayId)>,

    /// Screen and display that disappeared.
    pub removed: Option<(ScreenId, DisplayId)>,
}

struct PendingModeSwitch {
    mode_index: usize,
    completer: Completer<TopologyChange>,
}

/// The root container for screen and display state.
pub struct TopologyStore {
    /// All screens, real and virtual.
    pub screens: ObservableVector<Screen>,

    /// Displays backed by live screens.
    pub displays: ObservableVector<Display>,

    /// Global rotation lock.
    pub rotation_locked: Observable<bool>,

    mirror_groups: BTreeMap<GroupId, MirrorGroup>,
    expand_groups: BTreeMap<GroupId, ExpandGroup>,
    pending_modes: HashMap<ScreenId, PendingModeSwitch>,
    default_display: Option<DisplayId>,
    generation: u64,
    next_screen_id: ScreenId,
    next_display_id: DisplayId,
    next_group_id: GroupId,
}

impl Default for TopologyStore {
    fn default() -> Self { Self::new() }
}

impl TopologyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            screens: ObservableVector::new(),
            displays: ObservableVector::new(),
            rotation_locked: Observable::new(false),
            mirror_groups: BTreeMap::new(),
            expand_groups: BTreeMap::new(),
            pending_modes: HashMap::new(),
            default_display: None,
            generation: 0,
            next_screen_id: 0,
            next_display_id: 0,
            next_group_id: 1,
        }
    }

    /// Current generation; bumped by every committed mutation.
    #[must_use]
    pub const fn generation(&self) -> u64 { self.generation }

    // ========================================================================
    // Screen Operations
    // ========================================================================

    /// Get a screen by ID.
    #[must_use]
    pub fn get_screen(&self, id: ScreenId) -> Option<Screen> {
        self.screens.iter().find(|s| s.id == id).cloned()
    }

    /// Get a screen by ID or fail with `InvalidScreen`.
    ///
    /// # Errors
    ///
    /// Returns [`WmError::InvalidScreen`] when the screen is unknown.
    pub fn require_screen(&self, id: ScreenId) -> WmResult<Screen> {
        self.get_screen(id).ok_or_else(|| WmError::InvalidScreen(format!("screen {id}")))
    }

    /// All screens in enumeration order.
    #[must_use]
    pub fn all_screens(&self) -> Vec<Screen> { self.screens.iter().cloned().collect() }

    fn screen_index(&self, id: ScreenId) -> Option<usize> {
        self.screens.iter().position(|s| s.id == id)
    }

    /// Update a screen in place.
    pub fn update_screen<F>(&mut self, id: ScreenId, f: F) -> bool
    where F: FnOnce(&mut Screen) {
        if let Some(idx) = self.screen_index(id) {
            let mut screen = self.screens.remove(idx);
            f(&mut screen);
            self.screens.insert(idx, screen);
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Display Operations
    // ========================================================================

    /// Get a display by ID.
    #[must_use]
    pub fn get_display(&self, id: DisplayId) -> Option<Display> {
        self.displays.iter().find(|d| d.id == id).cloned()
    }

    /// Get a display by ID or fail with `InvalidScreen`.
    ///
    /// # Errors
    ///
    /// Returns [`WmError::InvalidScreen`] when the display is unknown.
    pub fn require_display(&self, id: DisplayId) -> WmResult<Display> {
        self.get_display(id).ok_or_else(|| WmError::InvalidScreen(format!("display {id}")))
    }

    /// The display backed by a screen.
    #[must_use]
    pub fn display_for_screen(&self, screen_id: ScreenId) -> Option<Display> {
        self.displays.iter().find(|d| d.screen_id == screen_id).cloned()
    }

    /// All displays in enumeration order.
    #[must_use]
    pub fn all_displays(&self) -> Vec<Display> { self.displays.iter().cloned().collect() }

    /// The default display, if any screen is connected.
    #[must_use]
    pub fn default_display(&self) -> Option<Display> {
        self.default_display.and_then(|id| self.get_display(id))
    }

    /// ID of the default display.
    #[must_use]
    pub const fn default_display_id(&self) -> Option<DisplayId> { self.default_display }

    fn display_index(&self, id: DisplayId) -> Option<usize> {
        self.displays.iter().position(|d| d.id == id)
    }

    /// Update a display in place.
    pub fn update_display<F>(&mut self, id: DisplayId, f: F) -> bool
    where F: FnOnce(&mut Display) {
        if let Some(idx) = self.display_index(id) {
            let mut display = self.displays.remove(idx);
            f(&mut display);
            self.displays.insert(idx, display);
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Screen lifecycle
    // ========================================================================

    /// Register a physical screen and its display.
    ///
    /// The first connected screen becomes the default display.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when the pixel ratio is not finite or outside `0.5..=4.0`.
    pub fn connect_screen(
        &mut self,
        name: &str,
        modes: SmallVec<[ScreenMode; 4]>,
        virtual_pixel_ratio: f64,
        cutouts: Vec<Rect>,
    ) -> WmResult<TopologyChange> {
        if !virtual_pixel_ratio.is_finite() || !PIXEL_RATIO_RANGE.contains(&virtual_pixel_ratio) {
            return Err(WmError::InvalidParam(format!(
                "screen '{name}' density {virtual_pixel_ratio} is outside {PIXEL_RATIO_RANGE:?}"
            )));
        }
        if let Some(cutout) = cutouts.iter().find(|c| !c.is_valid()) {
            return Err(WmError::InvalidParam(format!("screen '{name}' has an invalid cutout {cutout:?}")));
        }
        let screen = Screen {
            id: self.next_screen_id,
            name: name.to_string(),
            kind: ScreenKind::Real,
            modes,
            virtual_pixel_ratio,
            cutouts,
            ..Screen::default()
        };
        Ok(self.insert_screen(screen))
    }

    /// Remove a physical screen after device disconnect.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `InvalidParam` for virtual ones.
    pub fn disconnect_screen(&mut self, id: ScreenId) -> WmResult<TopologyChange> {
        let screen = self.require_screen(id)?;
        if screen.is_virtual() {
            return Err(WmError::InvalidParam(format!(
                "screen {id} is virtual; destroy it instead"
            )));
        }
        Ok(self.remove_screen(id))
    }

    /// Create a client-owned virtual screen.
    ///
    /// The refresh rate follows the default screen, density comes from the option.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for a zero size or an out-of-range density.
    pub fn create_virtual_screen(
        &mut self,
        option: &VirtualScreenOption,
    ) -> WmResult<TopologyChange> {
        if option.width == 0 || option.height == 0 {
            return Err(WmError::InvalidParam(format!(
                "virtual screen size {}x{} is empty",
                option.width, option.height
            )));
        }
        if !PIXEL_RATIO_RANGE.contains(&option.density) {
            return Err(WmError::InvalidParam(format!(
                "density {} is outside {PIXEL_RATIO_RANGE:?}",
                option.density
            )));
        }

        let refresh_rate = self.default_display().map_or(60, |d| d.refresh_rate);
        let screen = Screen {
            id: self.next_screen_id,
            name: option.name.clone(),
            kind: ScreenKind::Virtual,
            modes: smallvec::smallvec![ScreenMode::new(option.width, option.height, refresh_rate)],
            virtual_pixel_ratio: option.density,
            surface: option.surface,
            ..Screen::default()
        };
        Ok(self.insert_screen(screen))
    }

    /// Bind a virtual screen to an external surface.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `DeviceNotSupport` for real ones.
    pub fn set_virtual_screen_surface(
        &mut self,
        id: ScreenId,
        surface: SurfaceId,
    ) -> WmResult<TopologyChange> {
        let screen = self.require_screen(id)?;
        if !screen.is_virtual() {
            return Err(WmError::DeviceNotSupport(format!("screen {id} is not virtual")));
        }
        self.update_screen(id, |s| s.surface = Some(surface));
        Ok(self.commit(None, &[id]))
    }

    /// Destroy a client-owned virtual screen.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `DeviceNotSupport` for real ones.
    pub fn destroy_virtual_screen(&mut self, id: ScreenId) -> WmResult<TopologyChange> {
        let screen = self.require_screen(id)?;
        if !screen.is_virtual() {
            return Err(WmError::DeviceNotSupport(format!(
                "screen {id} is a physical screen"
            )));
        }
        Ok(self.remove_screen(id))
    }

    fn insert_screen(&mut self, screen: Screen) -> TopologyChange {
        let screen_id = screen.id;
        let display_id = self.next_display_id;
        self.next_screen_id += 1;
        self.next_display_id += 1;

        tracing::debug!(screen_id, display_id, name = %screen.name, "screen added");

        let display = Display {
            id: display_id,
            screen_id,
            name: screen.name.clone(),
            width: 0.0,
            height: 0.0,
            rotation: Rotation::Deg0,
            refresh_rate: 0,
            virtual_pixel_ratio: screen.virtual_pixel_ratio,
            density_dpi: 0.0,
            cutouts: Vec::new(),
            state: DisplayState::On,
            alive: true,
        };
        self.screens.push_back(screen);
        self.displays.push_back(display);
        if self.default_display.is_none() {
            self.default_display = Some(display_id);
        }

        // Derives geometry for the new display.
        let mut change = self.commit(None, &[]);
        change.displays.retain(|d| *d != display_id);
        change.screens.retain(|s| *s != screen_id);
        change.added = Some((screen_id, display_id));
        change
    }

    fn remove_screen(&mut self, id: ScreenId) -> TopologyChange {
        let mut touched: SmallVec<[ScreenId; 4]> = SmallVec::new();
        touched.extend(self.leave_mirror_group(id));
        touched.extend(self.leave_expand_group(id));

        if let Some(pending) = self.pending_modes.remove(&id) {
            pending
                .completer
                .complete(Err(WmError::DeviceNotSupport(format!("screen {id} was removed"))));
        }

        let display_id = self.display_for_screen(id).map(|d| d.id);
        if let Some(idx) = self.screen_index(id) {
            self.screens.remove(idx);
        }
        if let Some(display_id) = display_id {
            self.update_display(display_id, |d| d.alive = false);
            if let Some(idx) = self.display_index(display_id) {
                self.displays.remove(idx);
            }
            if self.default_display == Some(display_id) {
                self.default_display = self.displays.iter().next().map(|d| d.id);
            }
        }

        tracing::debug!(screen_id = id, ?display_id, "screen removed");

        touched.retain(|s| *s != id);
        let mut change = self.commit(None, &touched);
        change.removed = display_id.map(|d| (id, d));
        change
    }

    // ========================================================================
    // Mirror groups
    // ========================================================================

    /// Get a mirror group by ID.
    #[must_use]
    pub fn mirror_group(&self, id: GroupId) -> Option<MirrorGroup> {
        self.mirror_groups.get(&id).cloned()
    }

    fn mirror_group_led_by(&self, main: ScreenId) -> Option<&MirrorGroup> {
        self.mirror_groups.values().find(|g| g.main == main)
    }

    /// Whether the screen renders another screen's content.
    #[must_use]
    pub fn is_mirror_target(&self, id: ScreenId) -> bool {
        self.mirror_groups.values().any(|g| g.mirrors.contains(&id))
    }

    /// Mirror `mirrors` onto `main`.
    ///
    /// # Errors
    ///
    /// - `InvalidParam` when the list is empty, repeats a screen or names the main,
    ///   when the main is itself a mirror target, or when a mirror leads a group
    /// - `InvalidScreen` when any screen is unknown
    /// - `RepeatOperation` when the identical group already exists
    pub fn make_mirror(
        &mut self,
        main: ScreenId,
        mirrors: &[ScreenId],
    ) -> WmResult<TopologyChange> {
        if mirrors.is_empty() {
            return Err(WmError::InvalidParam("mirror list is empty".to_string()));
        }
        self.require_screen(main)?;
        for (idx, id) in mirrors.iter().enumerate() {
            self.require_screen(*id)?;
            if *id == main {
                return Err(WmError::InvalidParam(format!("screen {id} cannot mirror itself")));
            }
            if mirrors[..idx].contains(id) {
                return Err(WmError::InvalidParam(format!("screen {id} listed twice")));
            }
            if self.mirror_group_led_by(*id).is_some() {
                return Err(WmError::InvalidParam(format!(
                    "screen {id} is already a mirror main"
                )));
            }
        }
        if self.is_mirror_target(main) {
            return Err(WmError::InvalidParam(format!("screen {main} is a mirror target")));
        }

        if let Some(existing) = self.mirror_group_led_by(main) {
            let same = existing.mirrors.len() == mirrors.len()
                && mirrors.iter().all(|m| existing.mirrors.contains(m));
            if same {
                return Err(WmError::RepeatOperation(format!(
                    "mirror group {} already exists",
                    existing.id
                )));
            }
        }

        let mut touched: SmallVec<[ScreenId; 4]> = SmallVec::new();
        touched.push(main);

        let group_id = if let Some(existing) = self.mirror_group_led_by(main).cloned() {
            for released in existing.mirrors.iter().filter(|m| !mirrors.contains(m)) {
                self.update_screen(*released, |s| s.mirror_group = None);
                touched.push(*released);
            }
            existing.id
        } else {
            let id = self.next_group_id;
            self.next_group_id += 1;
            id
        };

        for id in mirrors {
            if self.get_screen(*id).and_then(|s| s.mirror_group) != Some(group_id) {
                touched.extend(self.leave_mirror_group(*id));
            }
            self.update_screen(*id, |s| s.mirror_group = Some(group_id));
            touched.push(*id);
        }
        self.update_screen(main, |s| s.mirror_group = Some(group_id));

        self.mirror_groups.insert(group_id, MirrorGroup {
            id: group_id,
            main,
            mirrors: mirrors.iter().copied().collect(),
        });

        tracing::debug!(group_id, main, ?mirrors, "mirror group updated");
        Ok(self.commit(Some(group_id), &touched))
    }

    /// Remove screens from mirroring. Naming a main dissolves its group.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for an empty list and `InvalidScreen` for unknown screens.
    pub fn stop_mirror(&mut self, screens: &[ScreenId]) -> WmResult<TopologyChange> {
        if screens.is_empty() {
            return Err(WmError::InvalidParam("screen list is empty".to_string()));
        }
        for id in screens {
            self.require_screen(*id)?;
        }

        let mut touched: SmallVec<[ScreenId; 4]> = SmallVec::new();
        for id in screens {
            touched.extend(self.leave_mirror_group(*id));
        }
        Ok(self.commit(None, &touched))
    }

    /// Detach a screen from its mirror group; returns every screen whose membership changed.
    fn leave_mirror_group(&mut self, id: ScreenId) -> SmallVec<[ScreenId; 4]> {
        let mut touched = SmallVec::new();
        let Some(group_id) = self.get_screen(id).and_then(|s| s.mirror_group) else {
            return touched;
        };
        let Some(mut group) = self.mirror_groups.remove(&group_id) else {
            return touched;
        };

        if group.main == id {
            for member in group.mirrors.iter().chain(std::iter::once(&group.main)) {
                self.update_screen(*member, |s| s.mirror_group = None);
                touched.push(*member);
            }
            tracing::debug!(group_id, "mirror group dissolved");
            return touched;
        }

        group.mirrors.retain(|m| *m != id);
        self.update_screen(id, |s| s.mirror_group = None);
        touched.push(id);
        if group.mirrors.is_empty() {
            self.update_screen(group.main, |s| s.mirror_group = None);
            touched.push(group.main);
        } else {
            self.mirror_groups.insert(group_id, group);
        }
        touched
    }

    /// The screen whose geometry a screen reports: its mirror main, or itself.
    fn geometry_source(&self, id: ScreenId) -> ScreenId {
        self.mirror_groups
            .values()
            .find(|g| g.mirrors.contains(&id))
            .map_or(id, |g| g.main)
    }

    // ========================================================================
    // Expand groups
    // ========================================================================

    /// Get an expand group by ID.
    #[must_use]
    pub fn expand_group(&self, id: GroupId) -> Option<ExpandGroup> {
        self.expand_groups.get(&id).cloned()
    }

    /// Tile screens into one logical canvas.
    ///
    /// # Errors
    ///
    /// - `InvalidParam` for an empty list, duplicate screens or overlapping placements
    /// - `InvalidScreen` when any screen is unknown
    /// - `RepeatOperation` when the identical group already exists
    pub fn make_expand(&mut self, options: &[ExpandOption]) -> WmResult<TopologyChange> {
        if options.is_empty() {
            return Err(WmError::InvalidParam("expand list is empty".to_string()));
        }

        let mut rects: SmallVec<[Rect; 4]> = SmallVec::new();
        for (idx, option) in options.iter().enumerate() {
            self.require_screen(option.screen_id)?;
            if options[..idx].iter().any(|o| o.screen_id == option.screen_id) {
                return Err(WmError::InvalidParam(format!(
                    "screen {} listed twice",
                    option.screen_id
                )));
            }
            let rect = self.expand_rect(option);
            if let Some(other) = rects.iter().position(|r| r.intersects(&rect)) {
                return Err(WmError::InvalidParam(format!(
                    "screen {} overlaps screen {}",
                    option.screen_id, options[other].screen_id
                )));
            }
            rects.push(rect);
        }

        let identical = self.expand_groups.values().any(|g| {
            g.members.len() == options.len() && options.iter().all(|o| g.members.contains(o))
        });
        if identical {
            return Err(WmError::RepeatOperation("expand group already exists".to_string()));
        }

        let mut touched: SmallVec<[ScreenId; 4]> = SmallVec::new();
        for option in options {
            touched.extend(self.leave_expand_group(option.screen_id));
        }

        let group_id = self.next_group_id;
        self.next_group_id += 1;
        for option in options {
            self.update_screen(option.screen_id, |s| {
                s.expand_group = Some(group_id);
                s.expand_origin = (option.start_x, option.start_y);
            });
            touched.push(option.screen_id);
        }
        self.expand_groups.insert(group_id, ExpandGroup {
            id: group_id,
            members: options.iter().copied().collect(),
        });

        tracing::debug!(group_id, members = options.len(), "expand group created");
        Ok(self.commit(Some(group_id), &touched))
    }

    /// Remove screens from their expand groups.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` for an empty list and `InvalidScreen` for unknown screens.
    pub fn stop_expand(&mut self, screens: &[ScreenId]) -> WmResult<TopologyChange> {
        if screens.is_empty() {
            return Err(WmError::InvalidParam("screen list is empty".to_string()));
        }
        for id in screens {
            self.require_screen(*id)?;
        }

        let mut touched: SmallVec<[ScreenId; 4]> = SmallVec::new();
        for id in screens {
            touched.extend(self.leave_expand_group(*id));
        }
        Ok(self.commit(None, &touched))
    }

    /// Union of the member rectangles of an expand group.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when the group does not exist.
    pub fn expand_bounds(&self, group_id: GroupId) -> WmResult<Rect> {
        let group = self
            .expand_groups
            .get(&group_id)
            .ok_or_else(|| WmError::InvalidParam(format!("expand group {group_id}")))?;
        Ok(group.members.iter().fold(Rect::zero(), |acc, m| acc.union(&self.expand_rect(m))))
    }

    fn expand_rect(&self, option: &ExpandOption) -> Rect {
        let (width, height) = self
            .get_screen(self.geometry_source(option.screen_id))
            .map_or((0.0, 0.0), |s| s.rotated_size());
        Rect::new(option.start_x, option.start_y, width, height)
    }

    fn leave_expand_group(&mut self, id: ScreenId) -> SmallVec<[ScreenId; 4]> {
        let mut touched = SmallVec::new();
        let Some(group_id) = self.get_screen(id).and_then(|s| s.expand_group) else {
            return touched;
        };
        let Some(mut group) = self.expand_groups.remove(&group_id) else {
            return touched;
        };

        group.members.retain(|m| m.screen_id != id);
        self.update_screen(id, |s| {
            s.expand_group = None;
            s.expand_origin = (0.0, 0.0);
        });
        touched.push(id);

        if group.members.len() < 2 {
            for member in &group.members {
                self.update_screen(member.screen_id, |s| {
                    s.expand_group = None;
                    s.expand_origin = (0.0, 0.0);
                });
                touched.push(member.screen_id);
            }
            tracing::debug!(group_id, "expand group dissolved");
        } else {
            self.expand_groups.insert(group_id, group);
        }
        touched
    }

    // ========================================================================
    // Screen properties
    // ========================================================================

    /// Queue a mode switch; it is committed by [`Self::flush_pending_modes`].
    ///
    /// Validation failures resolve the returned operation immediately.
    pub fn request_active_mode(
        &mut self,
        id: ScreenId,
        mode_index: usize,
    ) -> PendingOperation<TopologyChange> {
        match self.validate_mode_switch(id, mode_index) {
            Ok(()) => {
                let (completer, pending) = PendingOperation::channel();
                self.pending_modes.insert(id, PendingModeSwitch { mode_index, completer });
                tracing::debug!(screen_id = id, mode_index, "mode switch queued");
                pending
            }
            Err(err) => PendingOperation::ready(Err(err)),
        }
    }

    fn validate_mode_switch(&self, id: ScreenId, mode_index: usize) -> WmResult<()> {
        let screen = self.require_screen(id)?;
        if mode_index >= screen.modes.len() {
            return Err(WmError::InvalidParam(format!(
                "mode {mode_index} is not supported by screen {id}"
            )));
        }
        if self.is_mirror_target(id) {
            return Err(WmError::InvalidParam(format!(
                "screen {id} mirrors another screen; change the main instead"
            )));
        }
        if self.pending_modes.contains_key(&id) {
            return Err(WmError::StateAbnormally(format!(
                "screen {id} already has a mode switch in flight"
            )));
        }
        Ok(())
    }

    /// True when a mode switch is waiting to be committed.
    #[must_use]
    pub fn has_pending_modes(&self) -> bool { !self.pending_modes.is_empty() }

    /// Commit queued mode switches, completing their pending operations.
    pub fn flush_pending_modes(&mut self) -> Vec<TopologyChange> {
        let mut pending: Vec<_> = self.pending_modes.drain().collect();
        pending.sort_by_key(|(id, _)| *id);

        let mut changes = Vec::with_capacity(pending.len());
        for (id, switch) in pending {
            // A screen can join a mirror group while its switch is queued.
            if self.is_mirror_target(id) {
                switch.completer.complete(Err(WmError::InvalidParam(format!(
                    "screen {id} mirrors another screen; change the main instead"
                ))));
                continue;
            }
            if !self.update_screen(id, |s| s.active_mode = switch.mode_index) {
                switch
                    .completer
                    .complete(Err(WmError::DeviceNotSupport(format!("screen {id} was removed"))));
                continue;
            }
            tracing::debug!(screen_id = id, mode_index = switch.mode_index, "mode switch committed");
            let change = self.commit(None, &[id]);
            switch.completer.complete(Ok(change.clone()));
            changes.push(change);
        }
        changes
    }

    /// Complete every queued mode switch with `error` without applying it.
    pub fn fail_pending_modes(&mut self, error: &WmError) {
        for (id, switch) in self.pending_modes.drain() {
            tracing::debug!(screen_id = id, %error, "mode switch abandoned");
            switch.completer.complete(Err(error.clone()));
        }
    }

    /// Set the virtual pixel ratio of a screen.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `InvalidParam` outside `0.5..=4.0`.
    pub fn set_virtual_pixel_ratio(
        &mut self,
        id: ScreenId,
        ratio: f64,
    ) -> WmResult<TopologyChange> {
        self.require_screen(id)?;
        if !PIXEL_RATIO_RANGE.contains(&ratio) {
            return Err(WmError::InvalidParam(format!(
                "pixel ratio {ratio} is outside {PIXEL_RATIO_RANGE:?}"
            )));
        }
        self.update_screen(id, |s| s.virtual_pixel_ratio = ratio);
        Ok(self.commit(None, &[id]))
    }

    /// Request an orientation for a whole screen.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` for unknown screens and `InvalidParam` for mirror targets.
    pub fn set_screen_orientation(
        &mut self,
        id: ScreenId,
        orientation: ScreenOrientation,
    ) -> WmResult<TopologyChange> {
        let screen = self.require_screen(id)?;
        if self.is_mirror_target(id) {
            return Err(WmError::InvalidParam(format!(
                "screen {id} mirrors another screen"
            )));
        }
        let rotation = orientation.rotation_for(screen.is_portrait_panel());
        self.update_screen(id, |s| {
            s.orientation = orientation;
            s.rotation = rotation;
        });
        Ok(self.commit(None, &[id]))
    }

    /// Rotate a display; `None` when it already has that rotation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScreen` when the display is unknown.
    pub fn set_display_rotation(
        &mut self,
        display_id: DisplayId,
        rotation: Rotation,
    ) -> WmResult<Option<TopologyChange>> {
        let display = self.require_display(display_id)?;
        let source = self.geometry_source(display.screen_id);
        if self.get_screen(source).is_some_and(|s| s.rotation == rotation) {
            return Ok(None);
        }
        self.update_screen(source, |s| s.rotation = rotation);
        Ok(Some(self.commit(None, &[source])))
    }

    /// Whether the global rotation lock is engaged.
    #[must_use]
    pub fn is_rotation_locked(&self) -> bool { *Observable::get(&self.rotation_locked) }

    /// Engage or release the rotation lock; returns whether it changed.
    pub fn set_rotation_locked(&mut self, locked: bool) -> bool {
        if self.is_rotation_locked() == locked {
            return false;
        }
        Observable::set(&mut self.rotation_locked, locked);
        true
    }

    /// Move a display to a new power state.
    ///
    /// Returns `None` when the display is already in that state.
    ///
    /// # Errors
    ///
    /// - `InvalidScreen` when the display is unknown
    /// - `StateAbnormally` when the display is dead
    /// - `InvalidParam` when either side of the transition is `Unknown`
    pub fn set_display_state(
        &mut self,
        display_id: DisplayId,
        state: DisplayState,
    ) -> WmResult<Option<TopologyChange>> {
        let display = self.require_display(display_id)?;
        if !display.alive {
            return Err(WmError::StateAbnormally(format!("display {display_id} is gone")));
        }
        if display.state == state {
            return Ok(None);
        }
        if !display.state.can_transition_to(state) {
            return Err(WmError::InvalidParam(format!(
                "display {display_id} cannot move from {:?} to {state:?}",
                display.state
            )));
        }
        self.update_display(display_id, |d| d.state = state);
        let mut change = self.commit(None, &[]);
        if !change.displays.contains(&display_id) {
            change.displays.push(display_id);
        }
        Ok(Some(change))
    }

    // ========================================================================
    // Derivation
    // ========================================================================

    /// Re-derive every display, bump the generation and describe the change.
    fn commit(&mut self, group: Option<GroupId>, touched: &[ScreenId]) -> TopologyChange {
        self.generation += 1;

        let mut displays: SmallVec<[DisplayId; 4]> = SmallVec::new();
        let mut screens: SmallVec<[ScreenId; 4]> = SmallVec::new();
        for id in touched {
            if !screens.contains(id) && self.screen_index(*id).is_some() {
                screens.push(*id);
            }
        }

        let current: Vec<Display> = self.displays.iter().cloned().collect();
        for display in current {
            let derived = self.derive_display(&display);
            let membership = screens.contains(&display.screen_id);
            if derived != display {
                self.update_display(display.id, |d| *d = derived);
                if !screens.contains(&display.screen_id) {
                    screens.push(display.screen_id);
                }
            } else if !membership {
                continue;
            }
            displays.push(display.id);
        }

        TopologyChange {
            generation: self.generation,
            group,
            displays,
            screens,
            added: None,
            removed: None,
        }
    }

    fn derive_display(&self, display: &Display) -> Display {
        let mut derived = display.clone();
        let Some(own) = self.get_screen(display.screen_id) else {
            return derived;
        };
        let source = self.get_screen(self.geometry_source(own.id)).unwrap_or_else(|| own.clone());
        let Some(mode) = source.mode() else {
            return derived;
        };

        let (natural_w, natural_h) = (f64::from(mode.width), f64::from(mode.height));
        let (width, height) = source.rotated_size();
        derived.name.clone_from(&own.name);
        derived.width = width;
        derived.height = height;
        derived.rotation = source.rotation;
        derived.refresh_rate = mode.refresh_rate;
        derived.virtual_pixel_ratio = own.virtual_pixel_ratio;
        derived.density_dpi = own.virtual_pixel_ratio * BASE_DENSITY_DPI;
        derived.cutouts = source
            .cutouts
            .iter()
            .map(|c| source.rotation.rotate_rect(c, natural_w, natural_h))
            .collect();
        derived
    }
}

// ============================================================================
// Tests
// ============================================================================
