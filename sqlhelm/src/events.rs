//! Named events with prioritized listeners

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

/// Priority given to listeners registered without one
pub const DEFAULT_PRIORITY: i32 = 100;

/// An event travelling through an [`EventDispatcher`].
///
/// The detail is borrowed mutably, so listeners may modify the record an
/// event is about.
pub struct Event<'a> {
    kind: String,
    detail: Option<&'a mut dyn Any>,
    stopped: bool,
}

impl<'a> Event<'a> {
    pub fn new(kind: impl Into<String>, detail: Option<&'a mut dyn Any>) -> Self {
        Self {
            kind: kind.into(),
            detail,
            stopped: false,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn has_detail(&self) -> bool {
        self.detail.is_some()
    }

    /// The detail, if it is a `T`
    pub fn detail<T: Any>(&self) -> Option<&T> {
        self.detail.as_deref().and_then(|d| d.downcast_ref())
    }

    pub fn detail_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.detail.as_deref_mut().and_then(|d| d.downcast_mut())
    }

    /// Skip every listener not called yet
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("has_detail", &self.detail.is_some())
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// A listener receives the event and the context the dispatcher was given.
///
/// Listeners are shared so a dispatch can run on a snapshot while new events
/// are fired and new listeners registered.
pub type Listener<C> = Rc<RefCell<dyn FnMut(&mut Event<'_>, &mut C)>>;

/// Listeners by event kind, then by priority.
///
/// Higher priorities run first. Listeners sharing a priority run in
/// registration order.
pub struct EventDispatcher<C: ?Sized> {
    listeners: BTreeMap<String, BTreeMap<i32, Vec<Listener<C>>>>,
}

impl<C: ?Sized> Default for EventDispatcher<C> {
    fn default() -> Self {
        Self {
            listeners: BTreeMap::new(),
        }
    }
}

impl<C: ?Sized + 'static> EventDispatcher<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&mut self, kind: &str, priority: i32, listener: F)
    where
        F: FnMut(&mut Event<'_>, &mut C) + 'static,
    {
        let listener: Listener<C> = Rc::new(RefCell::new(listener));
        self.listeners
            .entry(kind.to_string())
            .or_default()
            .entry(priority)
            .or_default()
            .push(listener);
    }

    pub fn has_listeners(&self, kind: &str) -> bool {
        self.listeners
            .get(kind)
            .is_some_and(|by_priority| by_priority.values().any(|l| !l.is_empty()))
    }

    /// The listeners of `kind` in calling order
    pub fn listeners(&self, kind: &str) -> Vec<Listener<C>> {
        self.listeners
            .get(kind)
            .map(|by_priority| by_priority.values().rev().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Call the listeners of the event's kind until one stops propagation
    pub fn dispatch(&self, event: &mut Event<'_>, context: &mut C) {
        notify(&self.listeners(event.kind()), event, context);
    }
}

/// Call `listeners` in order until one stops propagation.
///
/// An event already stopped reaches nobody. A listener still running further
/// up the stack is skipped.
pub fn notify<C: ?Sized>(listeners: &[Listener<C>], event: &mut Event<'_>, context: &mut C) {
    for listener in listeners {
        if event.is_propagation_stopped() {
            return;
        }
        let Ok(mut listener) = listener.try_borrow_mut() else {
            debug!("skipping a {} listener that is already running", event.kind());
            continue;
        };
        (&mut *listener)(event, context);
    }
}

impl<C: ?Sized> fmt::Debug for EventDispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.listeners
                    .iter()
                    .map(|(kind, by_priority)| (kind, by_priority.values().map(Vec::len).sum::<usize>())),
            )
            .finish()
    }
}
