//! Multi-pointer touch routing with capture and bubbling
//!
//! A gesture starts with [`PointerAction::Begin`] and ends with
//! [`PointerAction::End`] or [`PointerAction::Cancel`]. While it runs the
//! router keeps a list of touch targets: nodes that consumed the press of
//! one or more pointers and therefore receive every later event for them.
//!
//! A new pointer is offered to the hit node first and bubbles up the parent
//! chain until a node consumes it. If nothing consumes the first press, the
//! scene-level listener may claim the whole gesture, after which nodes see
//! nothing until the gesture ends.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::scene::Node;

use super::hit_test::HitTestResult;
use super::pointer_event::{PointerAction, PointerEvent, PointerIdBits};

/// Scene-wide fallback for gestures no node consumed; return true to claim the gesture
pub trait SceneTouchListener {
    /// Handle an event
    fn on_scene_touch(&self, hit: &HitTestResult, event: &PointerEvent) -> bool;
}

impl<F> SceneTouchListener for F
where
    F: Fn(&HitTestResult, &PointerEvent) -> bool,
{
    fn on_scene_touch(&self, hit: &HitTestResult, event: &PointerEvent) -> bool {
        self(hit, event)
    }
}

/// Observer that sees every event before routing; it can never consume
pub trait PeekTouchListener {
    /// Observe an event
    fn on_peek_touch(&self, hit: &HitTestResult, event: &PointerEvent);
}

impl<F> PeekTouchListener for F
where
    F: Fn(&HitTestResult, &PointerEvent),
{
    fn on_peek_touch(&self, hit: &HitTestResult, event: &PointerEvent) {
        self(hit, event)
    }
}

#[derive(Clone)]
struct TouchTarget {
    node: Node,
    pointer_ids: PointerIdBits,
}

/// Per-scene pointer ownership state
#[derive(Default)]
pub struct TouchRouter {
    /// Newest first
    targets: RefCell<Vec<TouchTarget>>,
    scene_listener: RefCell<Option<Rc<dyn SceneTouchListener>>>,
    handling_listener: RefCell<Option<Rc<dyn SceneTouchListener>>>,
    peek_listeners: RefCell<Vec<Rc<dyn PeekTouchListener>>>,
}

impl TouchRouter {
    /// Create a router with no gesture in progress
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one event.
    ///
    /// `hit` is the externally computed hit test for the event's position.
    pub fn on_touch_event(&self, hit: &HitTestResult, event: &PointerEvent) {
        let action = event.action();
        if action == PointerAction::Begin {
            self.reset();
        }

        let peek_listeners = self.peek_listeners.borrow().clone();
        for listener in peek_listeners {
            listener.on_peek_touch(hit, event);
        }

        if self.is_listener_handling() {
            self.try_dispatch_to_scene_listener(hit, event);
        } else {
            self.route_to_nodes(hit, event);
        }

        match action {
            PointerAction::Cancel | PointerAction::End => self.reset(),
            PointerAction::PointerUp => {
                self.remove_pointers(PointerIdBits::of(event.action_pointer_id()));
            }
            _ => {}
        }
    }

    fn route_to_nodes(&self, hit: &HitTestResult, event: &PointerEvent) {
        let mut dispatched_to_new_target = false;
        let mut dispatched_to_any = false;

        if matches!(event.action(), PointerAction::Begin | PointerAction::PointerDown) {
            let assigned = PointerIdBits::of(event.action_pointer_id());
            self.remove_pointers(assigned);

            let mut has_target = false;
            if let Some(hit_node) = hit.node() {
                if self.merge_into_existing_target(hit_node, assigned) {
                    has_target = true;
                } else {
                    if let Some(handler) = self.dispatch(hit, event, hit_node, assigned, true) {
                        trace!("'{}' took pointers {:?}", handler.name(), assigned);
                        self.targets.borrow_mut().insert(
                            0,
                            TouchTarget {
                                node: handler,
                                pointer_ids: assigned,
                            },
                        );
                        has_target = true;
                        dispatched_to_new_target = true;
                    }
                    dispatched_to_any = true;
                }
            }

            // A pointer that found no owner of its own joins the oldest target.
            if !has_target {
                if let Some(oldest) = self.targets.borrow_mut().last_mut() {
                    oldest.pointer_ids = oldest.pointer_ids | assigned;
                }
            }
        }

        let targets = self.targets.borrow().clone();
        if targets.is_empty() {
            if !dispatched_to_any {
                self.try_dispatch_to_scene_listener(hit, event);
            }
            return;
        }

        let skip = usize::from(dispatched_to_new_target);
        for target in targets.iter().skip(skip) {
            self.dispatch(hit, event, &target.node, target.pointer_ids, false);
        }
    }

    /// Offer `event` restricted to `desired` pointers to `node`, bubbling up if asked.
    ///
    /// Returns the node that consumed the event. When nobody does, the
    /// scene-level listener gets a chance.
    fn dispatch(
        &self,
        hit: &HitTestResult,
        event: &PointerEvent,
        node: &Node,
        desired: PointerIdBits,
        bubble: bool,
    ) -> Option<Node> {
        let event_bits = event.pointer_id_bits();
        let final_bits = event_bits & desired;
        if final_bits.is_empty() {
            return None;
        }

        let split;
        let final_event = if final_bits == event_bits {
            event
        } else {
            split = event.restricted_to(final_bits)?;
            &split
        };

        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if candidate.dispatch_touch_event(hit, final_event) {
                trace!("'{}' consumed {:?}", candidate.name(), final_event.action());
                return Some(candidate);
            }
            current = if bubble { candidate.parent() } else { None };
        }

        self.try_dispatch_to_scene_listener(hit, final_event);
        None
    }

    fn try_dispatch_to_scene_listener(&self, hit: &HitTestResult, event: &PointerEvent) -> bool {
        if event.action() == PointerAction::Begin {
            let listener = self.scene_listener.borrow().clone();
            if let Some(listener) = listener {
                if listener.on_scene_touch(hit, event) {
                    trace!("Scene listener claimed the gesture");
                    *self.handling_listener.borrow_mut() = Some(listener);
                    return true;
                }
            }
        } else {
            let handling = self.handling_listener.borrow().clone();
            if let Some(listener) = handling {
                listener.on_scene_touch(hit, event);
                return true;
            }
        }
        false
    }

    fn merge_into_existing_target(&self, node: &Node, pointers: PointerIdBits) -> bool {
        let mut targets = self.targets.borrow_mut();
        match targets.iter_mut().find(|target| &target.node == node) {
            Some(target) => {
                target.pointer_ids = target.pointer_ids | pointers;
                true
            }
            None => false,
        }
    }

    fn remove_pointers(&self, pointers: PointerIdBits) {
        let mut targets = self.targets.borrow_mut();
        for target in targets.iter_mut() {
            target.pointer_ids = target.pointer_ids.difference(pointers);
        }
        targets.retain(|target| !target.pointer_ids.is_empty());
    }

    /// Drop every touch target and release a claiming scene listener
    pub fn reset(&self) {
        self.targets.borrow_mut().clear();
        self.handling_listener.borrow_mut().take();
    }

    /// Pointers currently owned by `node`
    pub fn owned_pointers(&self, node: &Node) -> PointerIdBits {
        self.targets
            .borrow()
            .iter()
            .filter(|target| &target.node == node)
            .fold(PointerIdBits::EMPTY, |bits, target| bits | target.pointer_ids)
    }

    /// Number of touch targets of the running gesture
    pub fn target_count(&self) -> usize {
        self.targets.borrow().len()
    }

    /// Whether the scene-level listener claimed the running gesture
    pub fn is_listener_handling(&self) -> bool {
        self.handling_listener.borrow().is_some()
    }

    pub(crate) fn set_scene_listener(&self, listener: Option<Rc<dyn SceneTouchListener>>) {
        *self.scene_listener.borrow_mut() = listener;
    }

    pub(crate) fn add_peek_listener(&self, listener: Rc<dyn PeekTouchListener>) -> bool {
        let mut listeners = self.peek_listeners.borrow_mut();
        if listeners.iter().any(|existing| same_peek_listener(existing, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    pub(crate) fn remove_peek_listener(&self, listener: &Rc<dyn PeekTouchListener>) -> bool {
        let mut listeners = self.peek_listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|existing| !same_peek_listener(existing, listener));
        before != listeners.len()
    }
}

fn same_peek_listener(a: &Rc<dyn PeekTouchListener>, b: &Rc<dyn PeekTouchListener>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}
