//! Window stages: one main window plus sub-windows per ability instance.
//!
//! Stage lifecycle is never set directly. It is derived from the main window:
//! showing it moves the stage to the foreground, focus makes it active, losing
//! focus while visible makes it inactive, hiding it sends it to the background.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::state::{StageId, StageLifecycle, Window, WindowId, WindowLifecycle, WindowStage};
use crate::error::{WmError, WmResult};

/// How a stage destroy treats a stage that is still visible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DestroyMode {
    /// Fail with `StateAbnormally` unless the stage is in the background.
    #[default]
    Normal,

    /// Move the stage to the background first.
    Force,
}

/// Windows to tear down and lifecycle steps produced by destroying a stage.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StageTeardown {
    pub steps: Vec<StageLifecycle>,

    /// Sub-windows in creation order, then the main window.
    pub windows: Vec<WindowId>,
}

/// Registry of window stages, ordered by creation.
#[derive(Debug, Default)]
pub struct StageController {
    stages: BTreeMap<StageId, WindowStage>,
}

const fn is_visible(lifecycle: StageLifecycle) -> bool {
    matches!(
        lifecycle,
        StageLifecycle::Foreground | StageLifecycle::Active | StageLifecycle::Inactive
    )
}

impl StageController {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Registers a stage around an existing main window.
    pub fn create(&mut self, ability_name: &str, main_window: WindowId) -> StageId {
        let id = Uuid::now_v7();
        self.stages.insert(id, WindowStage {
            id,
            ability_name: ability_name.to_string(),
            main_window,
            sub_windows: Vec::new(),
            lifecycle: StageLifecycle::Uninitialized,
        });
        tracing::debug!(stage_id = %id, ability_name, main_window, "window stage created");
        id
    }

    #[must_use]
    pub fn get(&self, id: StageId) -> Option<&WindowStage> { self.stages.get(&id) }

    /// # Errors
    ///
    /// Returns `InvalidParam` when no stage has the given id.
    pub fn require(&self, id: StageId) -> WmResult<&WindowStage> {
        self.get(id).ok_or_else(|| WmError::InvalidParam(format!("window stage {id} not found")))
    }

    pub fn all(&self) -> impl Iterator<Item = &WindowStage> { self.stages.values() }

    /// The stage whose main window is `window_id`.
    #[must_use]
    pub fn stage_of_main(&self, window_id: WindowId) -> Option<StageId> {
        self.stages.values().find(|s| s.main_window == window_id).map(|s| s.id)
    }

    /// Fails unless the stage exists and can still own new sub-windows.
    ///
    /// # Errors
    ///
    /// `InvalidParam` for an unknown stage, `StateAbnormally` for a destroyed one.
    pub fn check_accepts_sub_window(&self, id: StageId) -> WmResult<()> {
        let stage = self.require(id)?;
        if stage.lifecycle == StageLifecycle::Destroyed {
            return Err(WmError::StateAbnormally(format!("window stage {id} is destroyed")));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Same as [`Self::check_accepts_sub_window`].
    pub fn add_sub_window(&mut self, id: StageId, window_id: WindowId) -> WmResult<()> {
        self.check_accepts_sub_window(id)?;
        if let Some(stage) = self.stages.get_mut(&id) {
            stage.sub_windows.push(window_id);
        }
        Ok(())
    }

    /// Forgets a destroyed sub-window.
    pub fn remove_sub_window(&mut self, window_id: WindowId) {
        for stage in self.stages.values_mut() {
            stage.sub_windows.retain(|id| *id != window_id);
        }
    }

    // ========================================================================
    // Lifecycle derivation
    // ========================================================================

    /// Brings the stage in line with its main window and returns the steps taken.
    ///
    /// Skipped intermediate states are emitted too, so listeners always see
    /// `Foreground` before `Active` and `Inactive` before `Background`.
    pub fn sync(&mut self, id: StageId, main: &Window) -> Vec<StageLifecycle> {
        let Some(stage) = self.stages.get_mut(&id) else {
            return Vec::new();
        };
        let current = stage.lifecycle;
        if current == StageLifecycle::Destroyed {
            return Vec::new();
        }

        let mut steps = Vec::new();
        match main.lifecycle {
            WindowLifecycle::Created => {}
            WindowLifecycle::Shown => {
                if !is_visible(current) {
                    steps.push(StageLifecycle::Foreground);
                }
                match (main.is_focused, current) {
                    (true, StageLifecycle::Active) | (false, StageLifecycle::Inactive) => {}
                    (true, _) => steps.push(StageLifecycle::Active),
                    (false, StageLifecycle::Active) => steps.push(StageLifecycle::Inactive),
                    (false, _) => {}
                }
            }
            WindowLifecycle::Hidden => {
                if current == StageLifecycle::Active {
                    steps.push(StageLifecycle::Inactive);
                }
                if is_visible(current) {
                    steps.push(StageLifecycle::Background);
                }
            }
            WindowLifecycle::Destroyed => {
                steps = Self::teardown_steps(current);
            }
        }

        if let Some(last) = steps.last() {
            stage.lifecycle = *last;
            tracing::debug!(stage_id = %id, ?steps, "window stage lifecycle changed");
        }
        steps
    }

    fn teardown_steps(current: StageLifecycle) -> Vec<StageLifecycle> {
        let mut steps = Vec::new();
        if current == StageLifecycle::Active {
            steps.push(StageLifecycle::Inactive);
        }
        if is_visible(current) {
            steps.push(StageLifecycle::Background);
        }
        steps.push(StageLifecycle::Destroyed);
        steps
    }

    // ========================================================================
    // Destroy
    // ========================================================================

    /// Marks a stage destroyed and returns the windows the caller must tear down.
    ///
    /// # Errors
    ///
    /// `InvalidParam` for an unknown stage, `RepeatOperation` for a destroyed one,
    /// `StateAbnormally` for a visible stage under [`DestroyMode::Normal`].
    pub fn destroy(&mut self, id: StageId, mode: DestroyMode) -> WmResult<StageTeardown> {
        let stage = self.require(id)?;
        let current = stage.lifecycle;
        if current == StageLifecycle::Destroyed {
            return Err(WmError::RepeatOperation(format!("window stage {id} already destroyed")));
        }
        if is_visible(current) && mode == DestroyMode::Normal {
            return Err(WmError::StateAbnormally(format!(
                "window stage {id} is {current:?}; move it to the background first"
            )));
        }

        let mut windows = stage.sub_windows.clone();
        windows.push(stage.main_window);
        let steps = Self::teardown_steps(current);

        if let Some(stage) = self.stages.get_mut(&id) {
            stage.lifecycle = StageLifecycle::Destroyed;
            stage.sub_windows.clear();
        }
        tracing::debug!(stage_id = %id, ?mode, "window stage destroyed");
        Ok(StageTeardown { steps, windows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::wm::state::WindowType;

    fn main_window(lifecycle: WindowLifecycle, focused: bool) -> Window {
        let mut window = Window::new(1, "main", WindowType::App, 0);
        window.lifecycle = lifecycle;
        window.is_focused = focused;
        window
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_full_cycle() {
            let mut stages = StageController::new();
            let id = stages.create("EntryAbility", 1);

            assert_eq!(
                stages.sync(id, &main_window(WindowLifecycle::Shown, true)),
                vec![StageLifecycle::Foreground, StageLifecycle::Active]
            );
            assert_eq!(
                stages.sync(id, &main_window(WindowLifecycle::Shown, false)),
                vec![StageLifecycle::Inactive]
            );
            assert_eq!(
                stages.sync(id, &main_window(WindowLifecycle::Hidden, false)),
                vec![StageLifecycle::Background]
            );
            assert_eq!(
                stages.sync(id, &main_window(WindowLifecycle::Shown, false)),
                vec![StageLifecycle::Foreground]
            );
        }

        #[test]
        fn test_sync_without_change_is_silent() {
            let mut stages = StageController::new();
            let id = stages.create("EntryAbility", 1);
            stages.sync(id, &main_window(WindowLifecycle::Shown, true));
            assert!(stages.sync(id, &main_window(WindowLifecycle::Shown, true)).is_empty());
            assert!(
                StageController::new()
                    .sync(id, &main_window(WindowLifecycle::Created, false))
                    .is_empty()
            );
        }

        #[test]
        fn test_hiding_active_stage_passes_inactive() {
            let mut stages = StageController::new();
            let id = stages.create("EntryAbility", 1);
            stages.sync(id, &main_window(WindowLifecycle::Shown, true));
            assert_eq!(
                stages.sync(id, &main_window(WindowLifecycle::Hidden, false)),
                vec![StageLifecycle::Inactive, StageLifecycle::Background]
            );
        }

        #[test]
        fn test_main_window_destroy_forces_stage_down() {
            let mut stages = StageController::new();
            let id = stages.create("EntryAbility", 1);
            stages.sync(id, &main_window(WindowLifecycle::Shown, false));
            assert_eq!(
                stages.sync(id, &main_window(WindowLifecycle::Destroyed, false)),
                vec![StageLifecycle::Background, StageLifecycle::Destroyed]
            );
            assert!(matches!(
                stages.check_accepts_sub_window(id),
                Err(WmError::StateAbnormally(_))
            ));
        }
    }

    mod destroy_tests {
        use super::*;

        #[test]
        fn test_normal_destroy_of_foreground_stage_fails() {
            let mut stages = StageController::new();
            let id = stages.create("EntryAbility", 1);
            stages.sync(id, &main_window(WindowLifecycle::Shown, false));
            assert!(matches!(
                stages.destroy(id, DestroyMode::Normal),
                Err(WmError::StateAbnormally(_))
            ));
            assert_eq!(stages.require(id).unwrap().lifecycle, StageLifecycle::Foreground);
        }

        #[test]
        fn test_forced_destroy_emits_background_first() {
            let mut stages = StageController::new();
            let id = stages.create("EntryAbility", 1);
            stages.add_sub_window(id, 2).unwrap();
            stages.add_sub_window(id, 3).unwrap();
            stages.sync(id, &main_window(WindowLifecycle::Shown, false));

            let teardown = stages.destroy(id, DestroyMode::Force).unwrap();
            assert_eq!(teardown.steps, vec![StageLifecycle::Background, StageLifecycle::Destroyed]);
            assert_eq!(teardown.windows, vec![2, 3, 1]);
        }

        #[test]
        fn test_destroy_from_uninitialized() {
            let mut stages = StageController::new();
            let id = stages.create("EntryAbility", 1);
            let teardown = stages.destroy(id, DestroyMode::Normal).unwrap();
            assert_eq!(teardown.steps, vec![StageLifecycle::Destroyed]);
            assert!(matches!(
                stages.destroy(id, DestroyMode::Normal),
                Err(WmError::RepeatOperation(_))
            ));
        }

        #[test]
        fn test_unknown_stage() {
            let mut stages = StageController::new();
            assert!(matches!(
                stages.destroy(Uuid::now_v7(), DestroyMode::Force),
                Err(WmError::InvalidParam(_))
            ));
        }
    }
}
