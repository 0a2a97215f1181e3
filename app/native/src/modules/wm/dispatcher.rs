//! Event dispatcher with ordered per-(target, type) subscriber lists.
//!
//! Handlers are compared by `Arc` identity, so registering the same handler
//! twice is a no-op and `off` can remove exactly one. Delivery runs from a
//! snapshot of the lists taken once per batch, after the caller has released
//! every store lock. Subscribers registered after a mutation began do not see its
//! events: the mutation captures a [`DispatchTicket`] first.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::state::{
    AvoidArea, AvoidAreaType, DisplayId, ScreenId, StageId, StageLifecycle, WindowId,
};
use crate::error::{WmError, WmResult};
use crate::events;

/// What an event is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum EventTarget {
    Display,
    Screen,
    Global,
    Window(WindowId),
    Stage(StageId),
}

/// Event types that can be subscribed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Add,
    Remove,
    Change,
    WindowSizeChange,
    AvoidAreaChange,
    ScreenshotEvent,
    DialogTargetTouch,
    KeyboardHeightChange,
    SystemBarTintChange,
    WindowStageEvent,
}

impl EventType {
    /// Whether this event type exists for the target kind.
    #[must_use]
    pub const fn is_valid_for(self, target: &EventTarget) -> bool {
        match target {
            EventTarget::Display | EventTarget::Screen => {
                matches!(self, Self::Add | Self::Remove | Self::Change)
            }
            EventTarget::Global => matches!(self, Self::SystemBarTintChange),
            EventTarget::Window(_) => matches!(
                self,
                Self::WindowSizeChange
                    | Self::AvoidAreaChange
                    | Self::ScreenshotEvent
                    | Self::DialogTargetTouch
                    | Self::KeyboardHeightChange
            ),
            EventTarget::Stage(_) => matches!(self, Self::WindowStageEvent),
        }
    }

    /// Parses the client-facing event name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "change" => Some(Self::Change),
            "windowSizeChange" => Some(Self::WindowSizeChange),
            "avoidAreaChange" => Some(Self::AvoidAreaChange),
            "screenshotEvent" => Some(Self::ScreenshotEvent),
            "dialogTargetTouch" => Some(Self::DialogTargetTouch),
            "keyboardHeightChange" => Some(Self::KeyboardHeightChange),
            "systemBarTintChange" => Some(Self::SystemBarTintChange),
            "windowStageEvent" => Some(Self::WindowStageEvent),
            _ => None,
        }
    }
}

/// Tint of one system bar, reported with `systemBarTintChange`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SystemBarTint {
    pub window_id: WindowId,
    pub visible: bool,
    pub background_color: String,
}

/// An event with its payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum WmEvent {
    DisplayAdded { display_id: DisplayId },
    DisplayRemoved { display_id: DisplayId },
    DisplayChanged { display_id: DisplayId },
    ScreenAdded { screen_id: ScreenId },
    ScreenRemoved { screen_id: ScreenId },
    ScreenChanged { screen_id: ScreenId },
    WindowSizeChanged { window_id: WindowId, width: f64, height: f64 },
    AvoidAreaChanged { window_id: WindowId, area_type: AvoidAreaType, area: AvoidArea },
    Screenshot { window_id: WindowId },
    DialogTargetTouched { window_id: WindowId },
    KeyboardHeightChanged { window_id: WindowId, height: f64 },
    SystemBarTintChanged { display_id: DisplayId, tints: Vec<SystemBarTint> },
    StageLifecycleChanged { stage_id: StageId, lifecycle: StageLifecycle },
}

impl WmEvent {
    /// The target this event is delivered to.
    #[must_use]
    pub const fn target(&self) -> EventTarget {
        match self {
            Self::DisplayAdded { .. } | Self::DisplayRemoved { .. } | Self::DisplayChanged { .. } => {
                EventTarget::Display
            }
            Self::ScreenAdded { .. } | Self::ScreenRemoved { .. } | Self::ScreenChanged { .. } => {
                EventTarget::Screen
            }
            Self::WindowSizeChanged { window_id, .. }
            | Self::AvoidAreaChanged { window_id, .. }
            | Self::Screenshot { window_id }
            | Self::DialogTargetTouched { window_id }
            | Self::KeyboardHeightChanged { window_id, .. } => EventTarget::Window(*window_id),
            Self::SystemBarTintChanged { .. } => EventTarget::Global,
            Self::StageLifecycleChanged { stage_id, .. } => EventTarget::Stage(*stage_id),
        }
    }

    /// The subscribable type of this event.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::DisplayAdded { .. } | Self::ScreenAdded { .. } => EventType::Add,
            Self::DisplayRemoved { .. } | Self::ScreenRemoved { .. } => EventType::Remove,
            Self::DisplayChanged { .. } | Self::ScreenChanged { .. } => EventType::Change,
            Self::WindowSizeChanged { .. } => EventType::WindowSizeChange,
            Self::AvoidAreaChanged { .. } => EventType::AvoidAreaChange,
            Self::Screenshot { .. } => EventType::ScreenshotEvent,
            Self::DialogTargetTouched { .. } => EventType::DialogTargetTouch,
            Self::KeyboardHeightChanged { .. } => EventType::KeyboardHeightChange,
            Self::SystemBarTintChanged { .. } => EventType::SystemBarTintChange,
            Self::StageLifecycleChanged { .. } => EventType::WindowStageEvent,
        }
    }

    /// Stable event name for logs and CLI traces.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DisplayAdded { .. } => events::display::ADD,
            Self::DisplayRemoved { .. } => events::display::REMOVE,
            Self::DisplayChanged { .. } => events::display::CHANGE,
            Self::ScreenAdded { .. } => events::screen::ADD,
            Self::ScreenRemoved { .. } => events::screen::REMOVE,
            Self::ScreenChanged { .. } => events::screen::CHANGE,
            Self::WindowSizeChanged { .. } => events::window::SIZE_CHANGE,
            Self::AvoidAreaChanged { .. } => events::window::AVOID_AREA_CHANGE,
            Self::Screenshot { .. } => events::window::SCREENSHOT,
            Self::DialogTargetTouched { .. } => events::window::DIALOG_TARGET_TOUCH,
            Self::KeyboardHeightChanged { .. } => events::window::KEYBOARD_HEIGHT_CHANGE,
            Self::SystemBarTintChanged { .. } => events::global::SYSTEM_BAR_TINT_CHANGE,
            Self::StageLifecycleChanged { .. } => events::stage::LIFECYCLE,
        }
    }
}

/// A subscriber callback. Identity is the `Arc` allocation.
pub type EventHandler = Arc<dyn Fn(&WmEvent) + Send + Sync>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where F: Fn(&WmEvent) + Send + Sync + 'static {
    Arc::new(f)
}

fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Registration watermark captured when a mutation begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DispatchTicket(u64);

struct Subscriber {
    seq: u64,
    handler: EventHandler,
}

#[derive(Default)]
struct DispatcherInner {
    next_seq: u64,
    subscribers: HashMap<(EventTarget, EventType), Vec<Subscriber>>,
}

/// Ordered subscriber lists keyed by target and event type.
#[derive(Default)]
pub struct EventDispatcher {
    inner: Mutex<DispatcherInner>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register a handler. Registering the same handler again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when the event type does not exist for the target.
    pub fn on(
        &self,
        target: EventTarget,
        event_type: EventType,
        handler: EventHandler,
    ) -> WmResult<()> {
        if !event_type.is_valid_for(&target) {
            return Err(WmError::InvalidParam(format!(
                "{event_type:?} is not an event of {target:?}"
            )));
        }

        let mut inner = self.inner.lock();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let list = inner.subscribers.entry((target, event_type)).or_default();
        if list.iter().any(|s| same_handler(&s.handler, &handler)) {
            tracing::trace!(?target, ?event_type, "handler already registered");
            return Ok(());
        }
        list.push(Subscriber { seq, handler });
        Ok(())
    }

    /// Remove one handler, or every handler when `handler` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when the event type does not exist for the target.
    pub fn off(
        &self,
        target: EventTarget,
        event_type: EventType,
        handler: Option<&EventHandler>,
    ) -> WmResult<()> {
        if !event_type.is_valid_for(&target) {
            return Err(WmError::InvalidParam(format!(
                "{event_type:?} is not an event of {target:?}"
            )));
        }

        let mut inner = self.inner.lock();
        match handler {
            Some(handler) => {
                if let Some(list) = inner.subscribers.get_mut(&(target, event_type)) {
                    list.retain(|s| !same_handler(&s.handler, handler));
                }
            }
            None => {
                inner.subscribers.remove(&(target, event_type));
            }
        }
        Ok(())
    }

    /// Drop every subscription of a window or stage that no longer exists.
    pub fn clear_target(&self, target: EventTarget) {
        self.inner.lock().subscribers.retain(|(t, _), _| *t != target);
    }

    /// Whether anything listens for `(target, event_type)`.
    #[must_use]
    pub fn has_subscribers(&self, target: EventTarget, event_type: EventType) -> bool {
        self.inner.lock().subscribers.get(&(target, event_type)).is_some_and(|l| !l.is_empty())
    }

    /// Number of handlers registered for `(target, event_type)`.
    #[must_use]
    pub fn subscriber_count(&self, target: EventTarget, event_type: EventType) -> usize {
        self.inner.lock().subscribers.get(&(target, event_type)).map_or(0, Vec::len)
    }

    /// Capture the registration watermark before mutating state.
    #[must_use]
    pub fn ticket(&self) -> DispatchTicket { DispatchTicket(self.inner.lock().next_seq) }

    /// Deliver events in order to subscribers registered before `ticket`.
    ///
    /// The receivers of every event in the batch are fixed before the first
    /// handler runs, so `on`/`off` from a handler take effect with the next batch.
    /// Must be called without holding any store lock.
    pub fn dispatch(&self, ticket: DispatchTicket, events: &[WmEvent]) {
        if events.is_empty() {
            return;
        }

        let snapshot: Vec<Vec<EventHandler>> = {
            let inner = self.inner.lock();
            events
                .iter()
                .map(|event| {
                    inner
                        .subscribers
                        .get(&(event.target(), event.event_type()))
                        .map(|list| {
                            list.iter()
                                .filter(|s| s.seq <= ticket.0)
                                .map(|s| Arc::clone(&s.handler))
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        };

        for (event, handlers) in events.iter().zip(snapshot) {
            tracing::trace!(event = event.name(), subscribers = handlers.len(), "dispatching");
            for handler in handlers {
                handler(event);
            }
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventDispatcher")
            .field("lists", &inner.subscribers.len())
            .field("next_seq", &inner.next_seq)
            .finish()
    }
}
