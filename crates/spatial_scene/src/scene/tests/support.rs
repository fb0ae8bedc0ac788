//! Recording collaborators shared by the scene tests

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::SceneConfig;
use crate::foundation::math::Ray;
use crate::scene::{
    CollisionShapeHandle, CollisionSystem, LightHandle, LifecycleListener, Node, RayHit, RenderableHandle,
    Renderer, Scene, WeakNode,
};

#[derive(Default)]
pub(super) struct RecordingRenderer {
    pub(super) events: RefCell<Vec<String>>,
}

impl RecordingRenderer {
    pub(super) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub(super) fn record(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl Renderer for RecordingRenderer {
    fn attach_renderable(&self, handle: &RenderableHandle) {
        self.record(format!("attach renderable {}", handle.id()));
    }

    fn detach_renderable(&self, handle: &RenderableHandle) {
        self.record(format!("detach renderable {}", handle.id()));
    }

    fn attach_light(&self, handle: &LightHandle) {
        self.record(format!("attach light {}", handle.id()));
    }

    fn detach_light(&self, handle: &LightHandle) {
        self.record(format!("detach light {}", handle.id()));
    }

    fn release_renderable(&self, handle: RenderableHandle) {
        self.record(format!("release renderable {}", handle.id()));
    }

    fn release_light(&self, handle: LightHandle) {
        self.record(format!("release light {}", handle.id()));
    }
}

/// Collision world whose raycasts return a scripted list of hits
#[derive(Default)]
pub(super) struct RecordingCollision {
    pub(super) events: RefCell<Vec<String>>,
    pub(super) hits: RefCell<Vec<RayHit>>,
    pub(super) rays: RefCell<Vec<Ray>>,
}

impl RecordingCollision {
    pub(super) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub(super) fn script_hit(&self, node: &Node, distance: f32) {
        self.hits.borrow_mut().push(RayHit {
            node: node.downgrade(),
            distance,
            point: node.world_position(),
        });
    }
}

impl CollisionSystem for RecordingCollision {
    fn attach_collider(&self, shape: &CollisionShapeHandle, node: WeakNode) {
        let name = node.upgrade().map(|node| node.name()).unwrap_or_default();
        self.events.borrow_mut().push(format!("attach collider {} for {name}", shape.id()));
    }

    fn detach_collider(&self, shape: &CollisionShapeHandle) {
        self.events.borrow_mut().push(format!("detach collider {}", shape.id()));
    }

    fn mark_shape_dirty(&self, shape: &CollisionShapeHandle) {
        self.events.borrow_mut().push(format!("dirty collider {}", shape.id()));
    }

    fn release_shape(&self, shape: CollisionShapeHandle) {
        self.events.borrow_mut().push(format!("release collider {}", shape.id()));
    }

    fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        self.rays.borrow_mut().push(*ray);
        self.hits.borrow().first().cloned()
    }

    fn raycast_all(&self, ray: &Ray) -> Vec<RayHit> {
        self.rays.borrow_mut().push(*ray);
        self.hits.borrow().clone()
    }
}

pub(super) struct Fixture {
    pub(super) scene: Scene,
    pub(super) renderer: Rc<RecordingRenderer>,
    pub(super) collision: Rc<RecordingCollision>,
}

pub(super) fn fixture() -> Fixture {
    let renderer = Rc::new(RecordingRenderer::default());
    let collision = Rc::new(RecordingCollision::default());
    let scene = Scene::new(SceneConfig::default(), renderer.clone(), collision.clone());
    Fixture {
        scene,
        renderer,
        collision,
    }
}

/// Lifecycle listener logging `+name`, `-name` and `~name` for activate, deactivate and update
#[derive(Default)]
pub(super) struct TransitionLog {
    pub(super) entries: RefCell<Vec<String>>,
}

impl TransitionLog {
    pub(super) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

impl LifecycleListener for TransitionLog {
    fn on_activated(&self, node: &Node) {
        self.entries.borrow_mut().push(format!("+{}", node.name()));
    }

    fn on_updated(&self, node: &Node, _frame_time: &crate::foundation::time::FrameTime) {
        self.entries.borrow_mut().push(format!("~{}", node.name()));
    }

    fn on_deactivated(&self, node: &Node) {
        self.entries.borrow_mut().push(format!("-{}", node.name()));
    }
}
