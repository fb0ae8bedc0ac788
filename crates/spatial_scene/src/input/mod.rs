//! Input routing
//!
//! Pointer events arrive with an externally computed hit test and are routed
//! into the node tree by the scene's [`TouchRouter`].

mod hit_test;
mod pointer_event;
mod touch_router;

pub use hit_test::HitTestResult;
pub use pointer_event::{
    Pointer, PointerAction, PointerEvent, PointerEventError, PointerId, PointerIdBits, MAX_POINTERS,
};
pub use touch_router::{PeekTouchListener, SceneTouchListener, TouchRouter};
