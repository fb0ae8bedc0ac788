//! Spatial scene graph
//!
//! A retained-mode tree of transform-bearing nodes rooted at a [`Scene`].
//!
//! ## Ownership
//!
//! ```text
//! Scene ──owns──▶ Node ──owns──▶ Node ...
//!   ▲               │  ▲            │
//!   └────weak───────┘  └───weak─────┘
//! ```
//!
//! Containers own their children; children refer to their parent and scene
//! weakly. World transforms are cached per node and recomputed lazily after a
//! local change anywhere on the parent chain. Activation (whether a node's
//! renderable, light and collider are live) is derived from the enabled flag,
//! scene membership and the parent's activation.

mod anchor;
mod attachments;
mod dirty;
mod error;
mod hierarchy;
mod listeners;
mod node;
mod scene_root;

#[cfg(test)]
mod tests;

pub use anchor::{AnchorBehavior, Pose, PoseSource};
pub use attachments::{
    CollisionShapeHandle, CollisionSystem, LightHandle, NoCollision, RayHit, RenderableHandle, Renderer,
};
pub use dirty::DirtyFlags;
pub use error::SceneError;
pub use hierarchy::{ChildList, ChildrenSnapshot, HierarchyContainer};
pub use listeners::{
    LifecycleListener, NodeBehavior, OnTapListener, OnTouchListener, TransformChangedListener,
};
pub use node::{Node, NodeId, ParentRef, TransformLock, WeakNode};
pub use scene_root::{CameraProjection, Scene, SceneUpdateListener};
