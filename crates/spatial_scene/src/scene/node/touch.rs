//! Per-node touch handling and tap detection

use std::rc::Rc;

use log::trace;

use crate::input::{HitTestResult, PointerAction, PointerEvent};
use crate::scene::listeners::{OnTapListener, OnTouchListener};

use super::{Node, WeakNode};

/// Press recorded while waiting for the matching release
struct TapTracking {
    down_node: WeakNode,
    down_x: f32,
    down_y: f32,
}

#[derive(Default)]
pub(super) struct TouchHandlers {
    on_touch: Option<Rc<dyn OnTouchListener>>,
    on_tap: Option<Rc<dyn OnTapListener>>,
    tap: Option<TapTracking>,
}

impl Node {
    /// Install the node's touch listener, replacing any previous one
    pub fn set_on_touch_listener<L: OnTouchListener + 'static>(&self, listener: Rc<L>) {
        self.inner.touch.borrow_mut().on_touch = Some(listener);
    }

    /// Remove the node's touch listener
    pub fn clear_on_touch_listener(&self) {
        self.inner.touch.borrow_mut().on_touch = None;
    }

    /// Install the node's tap listener, replacing any previous one
    pub fn set_on_tap_listener<L: OnTapListener + 'static>(&self, listener: Rc<L>) {
        self.inner.touch.borrow_mut().on_tap = Some(listener);
    }

    /// Remove the node's tap listener
    pub fn clear_on_tap_listener(&self) {
        let mut touch = self.inner.touch.borrow_mut();
        touch.on_tap = None;
        touch.tap = None;
    }

    /// Offer `event` to this node; true if it was consumed.
    ///
    /// Inactive nodes never consume. The touch listener gets the first look,
    /// then the behavior, then built-in tap detection.
    pub(crate) fn dispatch_touch_event(&self, hit: &HitTestResult, event: &PointerEvent) -> bool {
        if !self.is_active() {
            return false;
        }

        let on_touch = self.inner.touch.borrow().on_touch.clone();
        if let Some(listener) = on_touch {
            if listener.on_touch(self, hit, event) {
                trace!("'{}' touch listener consumed {:?}", self.name(), event.action());
                return true;
            }
        }

        if let Some(behavior) = self.behavior() {
            if behavior.on_touch_event(self, hit, event) {
                return true;
            }
        }

        self.handle_tap(hit, event)
    }

    fn handle_tap(&self, hit: &HitTestResult, event: &PointerEvent) -> bool {
        let action = event.action();
        if action == PointerAction::Begin || !self.is_active() {
            self.inner.touch.borrow_mut().tap = None;
        }

        let on_tap = self.inner.touch.borrow().on_tap.clone();
        match action {
            PointerAction::Begin => {
                let (Some(_), Some(hit_node)) = (&on_tap, hit.node()) else {
                    return false;
                };
                self.inner.touch.borrow_mut().tap = Some(TapTracking {
                    down_node: hit_node.downgrade(),
                    down_x: event.x(),
                    down_y: event.y(),
                });
                true
            }
            PointerAction::Move | PointerAction::End => {
                let (is_hit_valid, touch_delta) = {
                    let touch = self.inner.touch.borrow();
                    let Some(tracking) = &touch.tap else {
                        return false;
                    };
                    let is_hit_valid = hit.node().is_some_and(|node| tracking.down_node.ptr_eq(node));
                    let touch_delta = (event.x() - tracking.down_x).hypot(event.y() - tracking.down_y);
                    (is_hit_valid, touch_delta)
                };

                let touch_slop = self.with_config(|config| config.touch_slop);
                if !(is_hit_valid || touch_delta < touch_slop) {
                    self.inner.touch.borrow_mut().tap = None;
                    return false;
                }

                if action == PointerAction::End {
                    self.inner.touch.borrow_mut().tap = None;
                    if let Some(listener) = on_tap {
                        trace!("Tap on '{}'", self.name());
                        listener.on_tap(self, hit, event);
                    }
                }
                true
            }
            _ => false,
        }
    }
}
