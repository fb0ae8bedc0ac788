//! Activation state machine, attachments and destruction

use std::rc::{Rc, Weak};

use log::{debug, error};

use crate::foundation::time::FrameTime;
use crate::scene::attachments::{
    Attachments, CollisionShapeHandle, CollisionSystem, LightHandle, RenderableHandle, Renderer,
};
use crate::scene::error::SceneError;
use crate::scene::listeners::LifecycleListener;

use super::Node;

impl Node {
    /// Whether the owner enabled this node
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    /// Enable or disable the node; activation of the subtree follows
    pub fn set_enabled(&self, enabled: bool) -> Result<(), SceneError> {
        self.ensure_alive()?;
        if self.inner.enabled.get() == enabled {
            return Ok(());
        }

        self.inner.enabled.set(enabled);
        self.update_active_status_recursively()
    }

    /// Enable or disable every direct child
    pub fn set_children_enabled(&self, enabled: bool) -> Result<(), SceneError> {
        for child in self.inner.children.to_vec() {
            child.set_enabled(enabled)?;
        }
        Ok(())
    }

    /// Whether the node is enabled, in a live scene, and under an active parent
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    fn should_be_active(&self) -> bool {
        if !self.inner.enabled.get() || self.inner.destroyed.get() || self.scene().is_none() {
            return false;
        }
        self.parent().map_or(true, |parent| parent.is_active())
    }

    /// Bring the subtree's activation in line with the structure, top-down
    pub(crate) fn update_active_status_recursively(&self) -> Result<(), SceneError> {
        let should_be_active = self.should_be_active();
        if should_be_active != self.is_active() {
            if should_be_active {
                self.activate()?;
            } else {
                self.deactivate()?;
            }
        }

        for child in self.inner.children.to_vec() {
            child.update_active_status_recursively()?;
        }
        Ok(())
    }

    fn activate(&self) -> Result<(), SceneError> {
        if self.is_active() {
            error!("Activate requested on already active node '{}'", self.name());
            return Err(SceneError::AlreadyActive { node: self.name() });
        }

        self.inner.active.set(true);
        if let Some(scene) = self.scene() {
            let (renderer, collision) = (scene.renderer(), scene.collision_system());
            self.with_attachments(|attachments| attachments.attach_all(renderer, collision, self));
        }

        if let Some(behavior) = self.behavior() {
            behavior.on_activate(self);
        }
        let listeners = self.inner.lifecycle_listeners.borrow_mut().snapshot();
        for listener in listeners {
            listener.on_activated(self);
        }

        debug!("Activated '{}'", self.name());
        Ok(())
    }

    fn deactivate(&self) -> Result<(), SceneError> {
        if !self.is_active() {
            error!("Deactivate requested on already inactive node '{}'", self.name());
            return Err(SceneError::AlreadyInactive { node: self.name() });
        }

        self.inner.active.set(false);
        self.with_attachments(Attachments::detach_all);

        if let Some(behavior) = self.behavior() {
            behavior.on_deactivate(self);
        }
        let listeners = self.inner.lifecycle_listeners.borrow_mut().snapshot();
        for listener in listeners {
            listener.on_deactivated(self);
        }

        debug!("Deactivated '{}'", self.name());
        Ok(())
    }

    /// Per-frame hook; does nothing on an inactive node
    pub(crate) fn dispatch_update(&self, frame_time: &FrameTime) {
        if !self.is_active() {
            return;
        }

        if let Some(behavior) = self.behavior() {
            behavior.on_update(self, frame_time);
        }
        let listeners = self.inner.lifecycle_listeners.borrow_mut().snapshot();
        for listener in listeners {
            listener.on_updated(self, frame_time);
        }
    }

    /// Register a lifecycle listener; returns false if it was already registered.
    ///
    /// The node only keeps a weak reference.
    pub fn add_lifecycle_listener<L>(&self, listener: &Rc<L>) -> bool
    where
        L: LifecycleListener + 'static,
    {
        let weak = Rc::downgrade(listener);
        self.inner.lifecycle_listeners.borrow_mut().add(weak)
    }

    /// Unregister a lifecycle listener
    pub fn remove_lifecycle_listener<L>(&self, listener: &Rc<L>) -> bool
    where
        L: LifecycleListener + 'static,
    {
        let weak = Rc::downgrade(listener) as Weak<dyn LifecycleListener>;
        self.inner.lifecycle_listeners.borrow_mut().remove(&weak)
    }

    /// Give the node a renderable, releasing the previous one.
    ///
    /// On an active node the new handle is attached immediately.
    pub fn set_renderable(&self, renderable: Option<RenderableHandle>) -> Result<(), SceneError> {
        self.ensure_alive()?;
        let release_to = self.scene_renderer();
        self.with_attachments(|attachments| attachments.replace_renderable(renderable, release_to));
        Ok(())
    }

    /// Give the node a light, releasing the previous one
    pub fn set_light(&self, light: Option<LightHandle>) -> Result<(), SceneError> {
        self.ensure_alive()?;
        let release_to = self.scene_renderer();
        self.with_attachments(|attachments| attachments.replace_light(light, release_to));
        Ok(())
    }

    /// Give the node a collision shape, releasing the previous one
    pub fn set_collision_shape(&self, shape: Option<CollisionShapeHandle>) -> Result<(), SceneError> {
        self.ensure_alive()?;
        let release_to = self.scene_collision();
        self.with_attachments(|attachments| attachments.replace_collider(shape, release_to, self));
        Ok(())
    }

    /// Identifier of the owned renderable
    pub fn renderable_id(&self) -> Option<u64> {
        self.inner.attachments.borrow().renderable_id()
    }

    /// Identifier of the owned light
    pub fn light_id(&self) -> Option<u64> {
        self.inner.attachments.borrow().light_id()
    }

    /// Identifier of the owned collision shape
    pub fn collision_shape_id(&self) -> Option<u64> {
        self.inner.attachments.borrow().collider_id()
    }

    /// Whether the owned handles are currently live in the scene's collaborators
    pub fn attachments_live(&self) -> bool {
        self.inner.attachments.borrow().is_attached()
    }

    /// Tear the node down.
    ///
    /// Disables the node, releases the attachment handles of the whole
    /// subtree (children first), then detaches it from its parent. Every
    /// later mutator on the node or its descendants returns
    /// [`SceneError::Destroyed`].
    pub fn destroy(&self) -> Result<(), SceneError> {
        self.ensure_alive()?;
        if self.is_parent_locked() {
            return Err(SceneError::ParentLocked { node: self.name() });
        }

        let renderer = self.scene_renderer();
        let collision = self.scene_collision();
        self.set_enabled(false)?;
        self.release_subtree(&renderer, &collision);
        self.reparent_unchecked(None)?;

        debug!("Destroyed '{}'", self.name());
        Ok(())
    }

    fn release_subtree(&self, renderer: &Option<Rc<dyn Renderer>>, collision: &Option<Rc<dyn CollisionSystem>>) {
        for child in self.inner.children.to_vec() {
            child.release_subtree(renderer, collision);
        }
        self.with_attachments(|attachments| attachments.release_all(renderer.clone(), collision.clone()));
        self.inner.destroyed.set(true);
    }

    fn scene_renderer(&self) -> Option<Rc<dyn Renderer>> {
        self.scene().map(|scene| scene.renderer())
    }

    fn scene_collision(&self) -> Option<Rc<dyn CollisionSystem>> {
        self.scene().map(|scene| scene.collision_system())
    }

    /// Run `f` with the attachments moved out of the node.
    ///
    /// Collaborator calls made by `f` may query the node freely; during the
    /// call the node reports no attachments.
    pub(super) fn with_attachments<R>(&self, f: impl FnOnce(&mut Attachments) -> R) -> R {
        let mut attachments = self.inner.attachments.take();
        let result = f(&mut attachments);
        *self.inner.attachments.borrow_mut() = attachments;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::scene::{HierarchyContainer, NoCollision, Scene};
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct CountingRenderer {
        attached: Cell<u32>,
        detached: Cell<u32>,
    }

    impl Renderer for CountingRenderer {
        fn attach_renderable(&self, _handle: &RenderableHandle) {
            self.attached.set(self.attached.get() + 1);
        }

        fn detach_renderable(&self, _handle: &RenderableHandle) {
            self.detached.set(self.detached.get() + 1);
        }

        fn attach_light(&self, _handle: &LightHandle) {}

        fn detach_light(&self, _handle: &LightHandle) {}
    }

    fn scene_with(renderer: &Rc<CountingRenderer>) -> Scene {
        Scene::new(SceneConfig::default(), renderer.clone(), Rc::new(NoCollision))
    }

    #[derive(Default)]
    struct Transitions {
        log: RefCell<Vec<String>>,
    }

    impl LifecycleListener for Transitions {
        fn on_activated(&self, node: &Node) {
            self.log.borrow_mut().push(format!("+{}", node.name()));
        }

        fn on_deactivated(&self, node: &Node) {
            self.log.borrow_mut().push(format!("-{}", node.name()));
        }
    }

    #[test]
    fn test_detached_node_never_activates() {
        let node = Node::new();
        let transitions = Rc::new(Transitions::default());
        node.add_lifecycle_listener(&transitions);

        node.set_enabled(false).unwrap();
        node.set_enabled(true).unwrap();

        assert!(!node.is_active());
        assert!(transitions.log.borrow().is_empty());
    }

    #[test]
    fn test_set_renderable_on_detached_node_just_stores() {
        let node = Node::new();

        node.set_renderable(Some(RenderableHandle::new(3))).unwrap();
        node.set_light(Some(LightHandle::new(4))).unwrap();

        assert_eq!(node.renderable_id(), Some(3));
        assert_eq!(node.light_id(), Some(4));
        assert!(!node.attachments_live());
    }

    #[test]
    fn test_destroyed_node_rejects_mutators() {
        let parent = Node::with_name("parent");
        let node = Node::with_name("doomed");
        let child = Node::with_name("child");
        node.set_parent(&parent).unwrap();
        child.set_parent(&node).unwrap();
        node.set_renderable(Some(RenderableHandle::new(1))).unwrap();

        node.destroy().unwrap();

        assert!(node.parent().is_none());
        assert!(node.is_destroyed());
        assert!(child.is_destroyed());
        assert_eq!(node.renderable_id(), None);
        assert_eq!(
            node.set_enabled(true),
            Err(SceneError::Destroyed { node: "doomed".into() })
        );
        assert!(child.set_parent(&parent).is_err());
        assert!(node.destroy().is_err());
    }

    #[test]
    fn test_repeated_transition_is_rejected() {
        let renderer = Rc::new(CountingRenderer::default());
        let scene = scene_with(&renderer);
        let node = Node::with_name("lamp");
        node.set_renderable(Some(RenderableHandle::new(1))).unwrap();
        scene.add_child(&node).unwrap();

        assert_eq!(node.activate(), Err(SceneError::AlreadyActive { node: "lamp".into() }));
        assert!(node.is_active());
        assert_eq!(renderer.attached.get(), 1);

        node.set_enabled(false).unwrap();
        assert_eq!(node.deactivate(), Err(SceneError::AlreadyInactive { node: "lamp".into() }));
        assert!(!node.is_active());
        assert_eq!(renderer.attached.get(), 1);
        assert_eq!(renderer.detached.get(), 1);
    }

    #[test]
    fn test_removed_lifecycle_listener_is_not_called() {
        let renderer = Rc::new(CountingRenderer::default());
        let scene = scene_with(&renderer);
        let node = Node::with_name("lamp");
        let transitions = Rc::new(Transitions::default());
        node.add_lifecycle_listener(&transitions);

        assert!(node.remove_lifecycle_listener(&transitions));
        assert!(!node.remove_lifecycle_listener(&transitions));
        scene.add_child(&node).unwrap();
        node.set_enabled(false).unwrap();

        assert!(transitions.log.borrow().is_empty());
    }
}
