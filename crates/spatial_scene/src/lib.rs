//! # Spatial Scene
//!
//! A retained-mode spatial scene graph for interactive 3D/AR surfaces.
//!
//! ## Features
//!
//! - **Transform cache**: local TRS per node, world matrices recomputed lazily
//!   behind six dirty bits
//! - **Activation lifecycle**: renderables, lights and colliders follow scene
//!   membership and enabled state, attached exactly once per transition
//! - **Touch routing**: multi-pointer ownership with bubbling, event splitting
//!   and total cancellation
//! - **Anchors**: nodes that follow an external tracked pose
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spatial_scene::prelude::*;
//! use std::rc::Rc;
//!
//! struct NullRenderer;
//!
//! impl Renderer for NullRenderer {
//!     fn attach_renderable(&self, _handle: &RenderableHandle) {}
//!     fn detach_renderable(&self, _handle: &RenderableHandle) {}
//!     fn attach_light(&self, _handle: &LightHandle) {}
//!     fn detach_light(&self, _handle: &LightHandle) {}
//! }
//!
//! fn main() -> Result<(), SceneError> {
//!     let scene = Scene::new(SceneConfig::default(), Rc::new(NullRenderer), Rc::new(NoCollision));
//!
//!     let table = Node::with_name("table");
//!     scene.add_child(&table)?;
//!     let cup = Node::with_name("cup");
//!     cup.set_parent(&table)?;
//!     cup.set_local_position(Vec3::new(0.0, 0.8, 0.0))?;
//!
//!     table.set_world_position(Vec3::new(2.0, 0.0, -1.0))?;
//!     assert!((cup.world_position() - Vec3::new(2.0, 0.8, -1.0)).norm() < 1e-5);
//!
//!     let mut frame_time = FrameTime::new();
//!     frame_time.update(16_000_000);
//!     scene.dispatch_update(&frame_time);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod input;
pub mod scene;

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, SceneConfig},
        foundation::{
            math::{Mat4, Quat, Ray, Transform, Vec3},
            time::FrameTime,
        },
        input::{
            HitTestResult, PeekTouchListener, Pointer, PointerAction, PointerEvent, PointerEventError, PointerId,
            SceneTouchListener,
        },
        scene::{
            AnchorBehavior, CameraProjection, CollisionShapeHandle, CollisionSystem, HierarchyContainer,
            LifecycleListener, LightHandle, NoCollision, Node, NodeBehavior, OnTapListener, OnTouchListener,
            Pose, PoseSource, RayHit, RenderableHandle, Renderer, Scene, SceneError, SceneUpdateListener,
            TransformChangedListener, TransformLock, WeakNode,
        },
    };
}
