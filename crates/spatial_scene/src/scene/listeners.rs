//! Observer interfaces attached to nodes
//!
//! Lifecycle and transform listeners are held weakly: registering one does not
//! keep it alive, and a dropped listener silently falls out of the set. Touch
//! and tap handlers are owned by the node they are installed on.

use std::rc::{Rc, Weak};

use crate::foundation::time::FrameTime;
use crate::input::{HitTestResult, PointerEvent};

use super::node::Node;

/// Activation and per-frame notifications for one node
pub trait LifecycleListener {
    /// The node became active
    fn on_activated(&self, node: &Node) {
        let _ = node;
    }

    /// Per-frame update of an active node
    fn on_updated(&self, node: &Node, frame_time: &FrameTime) {
        let _ = (node, frame_time);
    }

    /// The node became inactive
    fn on_deactivated(&self, node: &Node) {
        let _ = node;
    }
}

/// World transform change notification.
///
/// `originating` is the node whose mutation started the cascade; it is
/// `node` itself for direct mutations and an ancestor otherwise.
pub trait TransformChangedListener {
    /// Handle a change
    fn on_transform_changed(&self, node: &Node, originating: &Node);
}

impl<F> TransformChangedListener for F
where
    F: Fn(&Node, &Node),
{
    fn on_transform_changed(&self, node: &Node, originating: &Node) {
        self(node, originating)
    }
}

/// Touch handler installed on a node; return true to consume the event
pub trait OnTouchListener {
    /// Handle a routed pointer event
    fn on_touch(&self, node: &Node, hit: &HitTestResult, event: &PointerEvent) -> bool;
}

impl<F> OnTouchListener for F
where
    F: Fn(&Node, &HitTestResult, &PointerEvent) -> bool,
{
    fn on_touch(&self, node: &Node, hit: &HitTestResult, event: &PointerEvent) -> bool {
        self(node, hit, event)
    }
}

/// Tap handler installed on a node
pub trait OnTapListener {
    /// A press and release landed on the node
    fn on_tap(&self, node: &Node, hit: &HitTestResult, event: &PointerEvent);
}

impl<F> OnTapListener for F
where
    F: Fn(&Node, &HitTestResult, &PointerEvent),
{
    fn on_tap(&self, node: &Node, hit: &HitTestResult, event: &PointerEvent) {
        self(node, hit, event)
    }
}

/// Overridable per-node hooks.
///
/// A node carries at most one behavior; it is the extension point for
/// node kinds (anchors, tracked cameras, game logic) that need to run code at
/// the same points the built-in machinery does.
pub trait NodeBehavior {
    /// Called after attachments are attached, before lifecycle listeners
    fn on_activate(&self, node: &Node) {
        let _ = node;
    }

    /// Called after attachments are detached, before lifecycle listeners
    fn on_deactivate(&self, node: &Node) {
        let _ = node;
    }

    /// Per-frame update of an active node
    fn on_update(&self, node: &Node, frame_time: &FrameTime) {
        let _ = (node, frame_time);
    }

    /// Called before transform listeners when the world transform changed
    fn on_transform_change(&self, node: &Node, originating: &Node) {
        let _ = (node, originating);
    }

    /// Offered a touch event after the node's touch listener declined it
    fn on_touch_event(&self, node: &Node, hit: &HitTestResult, event: &PointerEvent) -> bool {
        let _ = (node, hit, event);
        false
    }
}

/// Set of weakly held listeners with identity-based dedup
pub(crate) struct ListenerSet<T: ?Sized> {
    entries: Vec<Weak<T>>,
}

impl<T: ?Sized> ListenerSet<T> {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register; returns false if already present
    pub(crate) fn add(&mut self, listener: Weak<T>) -> bool {
        self.prune();
        if self.entries.iter().any(|entry| Weak::ptr_eq(entry, &listener)) {
            return false;
        }
        self.entries.push(listener);
        true
    }

    pub(crate) fn remove(&mut self, listener: &Weak<T>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !Weak::ptr_eq(entry, listener));
        before != self.entries.len()
    }

    /// Live listeners, in registration order
    pub(crate) fn snapshot(&mut self) -> Vec<Rc<T>> {
        self.prune();
        self.entries.iter().filter_map(Weak::upgrade).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.strong_count() > 0).count()
    }

    fn prune(&mut self) {
        self.entries.retain(|entry| entry.strong_count() > 0);
    }
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
