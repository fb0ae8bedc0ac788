//! Scene graph node
//!
//! A [`Node`] is a cheap, clonable handle to shared node state. Parents own
//! their children; a child refers back to its parent and to its scene weakly,
//! so dropping the last handle to a detached subtree frees it.
//!
//! All interior state lives in separate cells that are only borrowed for the
//! duration of a field access. No borrow is ever held while user code
//! (listeners, behaviors, collaborators) runs, so callbacks are free to query
//! and mutate the graph.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};

use crate::config::SceneConfig;

use super::attachments::Attachments;
use super::dirty::DirtyFlags;
use super::error::SceneError;
use super::hierarchy::{ChildList, HierarchyContainer};
use super::listeners::{LifecycleListener, ListenerSet, NodeBehavior, TransformChangedListener};
use super::scene_root::{Scene, SceneInner};

mod lifecycle;
mod touch;
mod transform;

use touch::TouchHandlers;
use transform::TransformCache;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique node identifier, stable for the node's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a node's transform rejects direct mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformLock {
    /// Driven by an [`AnchorBehavior`](super::anchor::AnchorBehavior)
    Anchored,
    /// Driven by an external tracked pose (e.g. the device camera)
    TrackedPose,
}

/// Either kind of container a node can be parented under
#[derive(Debug, Clone, Copy)]
pub enum ParentRef<'a> {
    /// Another node
    Node(&'a Node),
    /// The scene root
    Scene(&'a Scene),
}

impl<'a> From<&'a Node> for ParentRef<'a> {
    fn from(node: &'a Node) -> Self {
        ParentRef::Node(node)
    }
}

impl<'a> From<&'a Scene> for ParentRef<'a> {
    fn from(scene: &'a Scene) -> Self {
        ParentRef::Scene(scene)
    }
}

impl ParentRef<'_> {
    fn child_list(&self) -> &ChildList {
        match self {
            ParentRef::Node(node) => &node.inner.children,
            ParentRef::Scene(scene) => scene.child_list(),
        }
    }

    fn scene_link(&self) -> Option<Weak<SceneInner>> {
        match self {
            ParentRef::Node(node) => node.inner.link.borrow().scene.clone(),
            ParentRef::Scene(scene) => Some(scene.downgrade_inner()),
        }
    }

    fn to_link(self) -> ParentLink {
        match self {
            ParentRef::Node(node) => ParentLink::Node(node.downgrade()),
            ParentRef::Scene(scene) => ParentLink::Scene(scene.downgrade_inner()),
        }
    }

    fn describe(&self) -> String {
        match self {
            ParentRef::Node(node) => node.name(),
            ParentRef::Scene(_) => "<scene>".to_string(),
        }
    }
}

#[derive(Clone, Default)]
enum ParentLink {
    #[default]
    None,
    Node(WeakNode),
    Scene(Weak<SceneInner>),
}

impl ParentLink {
    fn refers_to(&self, target: ParentRef<'_>) -> bool {
        match (self, target) {
            (ParentLink::Node(link), ParentRef::Node(node)) => link.ptr_eq(node),
            (ParentLink::Scene(link), ParentRef::Scene(scene)) => scene.is_same_inner(link),
            _ => false,
        }
    }

    fn remove_child(&self, child: &Node) {
        match self {
            ParentLink::Node(link) => {
                if let Some(parent) = link.upgrade() {
                    parent.inner.children.remove(child);
                }
            }
            ParentLink::Scene(link) => {
                if let Some(scene) = link.upgrade() {
                    scene.children.remove(child);
                }
            }
            ParentLink::None => {}
        }
    }
}

#[derive(Default)]
struct Link {
    parent: ParentLink,
    scene: Option<Weak<SceneInner>>,
}

struct NodeInner {
    id: NodeId,
    name: RefCell<String>,
    children: ChildList,
    link: RefCell<Link>,
    transform: RefCell<TransformCache>,
    enabled: Cell<bool>,
    active: Cell<bool>,
    destroyed: Cell<bool>,
    transform_lock: Cell<Option<TransformLock>>,
    parent_locked: Cell<bool>,
    dispatch_transform_events: Cell<bool>,
    attachments: RefCell<Attachments>,
    lifecycle_listeners: RefCell<ListenerSet<dyn LifecycleListener>>,
    transform_listeners: RefCell<ListenerSet<dyn TransformChangedListener>>,
    touch: RefCell<TouchHandlers>,
    behavior: RefCell<Option<Rc<dyn NodeBehavior>>>,
}

/// Handle to a node of the spatial hierarchy.
///
/// Cloning the handle does not clone the node; equality is identity.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

/// Non-owning node handle
#[derive(Clone, Default)]
pub struct WeakNode {
    inner: Weak<NodeInner>,
}

impl WeakNode {
    /// Strong handle if the node is still alive
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }

    /// Whether this refers to `node`
    pub fn ptr_eq(&self, node: &Node) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Rc::as_ptr(&node.inner))
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({node:?})"),
            None => f.write_str("WeakNode(<dropped>)"),
        }
    }
}

impl Node {
    /// Create a detached, enabled node named "Node"
    pub fn new() -> Self {
        Self::with_name("Node")
    }

    /// Create a detached, enabled node
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                id: NodeId::next(),
                name: RefCell::new(name.into()),
                children: ChildList::new(),
                link: RefCell::new(Link::default()),
                transform: RefCell::new(TransformCache::default()),
                enabled: Cell::new(true),
                active: Cell::new(false),
                destroyed: Cell::new(false),
                transform_lock: Cell::new(None),
                parent_locked: Cell::new(false),
                dispatch_transform_events: Cell::new(true),
                attachments: RefCell::new(Attachments::default()),
                lifecycle_listeners: RefCell::new(ListenerSet::new()),
                transform_listeners: RefCell::new(ListenerSet::new()),
                touch: RefCell::new(TouchHandlers::default()),
                behavior: RefCell::new(None),
            }),
        }
    }

    /// Unique identifier
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Node name
    pub fn name(&self) -> String {
        self.inner.name.borrow().clone()
    }

    /// Rename the node
    pub fn set_name(&self, name: impl Into<String>) {
        *self.inner.name.borrow_mut() = name.into();
    }

    /// Non-owning handle
    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Parent node; `None` when detached or directly under the scene root
    pub fn parent(&self) -> Option<Node> {
        match &self.inner.link.borrow().parent {
            ParentLink::Node(link) => link.upgrade(),
            _ => None,
        }
    }

    /// Scene this node belongs to, if any
    pub fn scene(&self) -> Option<Scene> {
        self.inner
            .link
            .borrow()
            .scene
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Scene::from_inner)
    }

    /// Whether the node has no node parent
    pub fn is_top_level(&self) -> bool {
        !matches!(self.inner.link.borrow().parent, ParentLink::Node(_))
    }

    /// Whether `ancestor` appears anywhere on this node's parent chain
    pub fn is_descendant_of<'a>(&self, ancestor: impl Into<ParentRef<'a>>) -> bool {
        let ancestor = ancestor.into();
        let mut link = self.inner.link.borrow().parent.clone();
        loop {
            if link.refers_to(ancestor) {
                return true;
            }
            link = match link {
                ParentLink::Node(weak) => match weak.upgrade() {
                    Some(parent) => parent.inner.link.borrow().parent.clone(),
                    None => return false,
                },
                _ => return false,
            };
        }
    }

    /// Move this node under `parent`, detaching it from its previous parent first.
    ///
    /// Setting the current parent again is a no-op. Rejects self-parenting,
    /// cycles, locked parents and destroyed nodes without changing anything.
    pub fn set_parent<'a>(&self, parent: impl Into<ParentRef<'a>>) -> Result<(), SceneError> {
        let parent = parent.into();
        self.ensure_alive()?;
        if self.inner.link.borrow().parent.refers_to(parent) {
            return Ok(());
        }
        self.ensure_parent_unlocked()?;

        if let ParentRef::Node(node) = parent {
            if node == self {
                warn!("Rejected self-parenting of '{}'", self.name());
                return Err(SceneError::SelfParenting { node: self.name() });
            }
            if node.is_descendant_of(self) {
                warn!("Rejected parenting '{}' under its descendant '{}'", self.name(), node.name());
                return Err(SceneError::CycleDetected {
                    child: self.name(),
                    parent: node.name(),
                });
            }
            node.ensure_alive()?;
        }

        self.reparent_unchecked(Some(parent))
    }

    /// Detach from the current parent
    pub fn clear_parent(&self) -> Result<(), SceneError> {
        self.ensure_alive()?;
        if matches!(self.inner.link.borrow().parent, ParentLink::None) {
            return Ok(());
        }
        self.ensure_parent_unlocked()?;
        self.reparent_unchecked(None)
    }

    /// Structural move without precondition checks.
    ///
    /// Transform events are suppressed while the structure is inconsistent;
    /// activation is evaluated once against the final structure, so a move
    /// inside one scene causes no activation transitions.
    fn reparent_unchecked(&self, parent: Option<ParentRef<'_>>) -> Result<(), SceneError> {
        let dispatch = self.inner.dispatch_transform_events.replace(false);

        let old_parent = std::mem::take(&mut self.inner.link.borrow_mut().parent);
        old_parent.remove_child(self);

        let scene = match parent {
            Some(parent) => {
                parent.child_list().push(self.clone());
                self.inner.link.borrow_mut().parent = parent.to_link();
                debug!("Attached '{}' under {}", self.name(), parent.describe());
                parent.scene_link()
            }
            None => {
                debug!("Detached '{}'", self.name());
                None
            }
        };
        self.set_scene_recursively(scene.as_ref());
        self.mark_transform_changed_recursively(DirtyFlags::LOCAL, self);

        self.inner.dispatch_transform_events.set(dispatch);

        self.update_active_status_recursively()?;
        self.mark_transform_changed_recursively(DirtyFlags::LOCAL, self);
        Ok(())
    }

    /// Detach after the owning scene went away; leaves the stale parent list alone
    pub(crate) fn detach_from_dropped_scene(&self) {
        if let Err(err) = self.reparent_unchecked(None) {
            warn!("Detaching '{}' from a dropped scene failed: {err}", self.name());
        }
    }

    fn set_scene_recursively(&self, scene: Option<&Weak<SceneInner>>) {
        self.inner.link.borrow_mut().scene = scene.cloned();
        for child in self.inner.children.to_vec() {
            child.set_scene_recursively(scene);
        }
    }

    /// Whether the node's parent is fixed
    pub fn is_parent_locked(&self) -> bool {
        self.inner.parent_locked.get()
    }

    pub(crate) fn lock_parent(&self) {
        self.inner.parent_locked.set(true);
    }

    fn ensure_parent_unlocked(&self) -> Result<(), SceneError> {
        if self.is_parent_locked() {
            warn!("Parent of '{}' is locked", self.name());
            return Err(SceneError::ParentLocked { node: self.name() });
        }
        Ok(())
    }

    /// Current transform lock, if any
    pub fn transform_lock(&self) -> Option<TransformLock> {
        self.inner.transform_lock.get()
    }

    /// Lock or unlock direct transform mutation
    pub fn set_transform_lock(&self, lock: Option<TransformLock>) {
        self.inner.transform_lock.set(lock);
    }

    /// Whether [`Node::destroy`] has run on this node or an ancestor
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub(crate) fn ensure_alive(&self) -> Result<(), SceneError> {
        if self.is_destroyed() {
            warn!("Operation on destroyed node '{}'", self.name());
            return Err(SceneError::Destroyed { node: self.name() });
        }
        Ok(())
    }

    /// Install the node's behavior, replacing any previous one
    pub fn set_behavior<B: NodeBehavior + 'static>(&self, behavior: Rc<B>) {
        *self.inner.behavior.borrow_mut() = Some(behavior);
    }

    /// Remove the node's behavior
    pub fn clear_behavior(&self) {
        self.inner.behavior.borrow_mut().take();
    }

    /// Installed behavior
    pub fn behavior(&self) -> Option<Rc<dyn NodeBehavior>> {
        self.inner.behavior.borrow().clone()
    }

    /// Run `f` against the owning scene's config, or the defaults when detached
    pub(crate) fn with_config<R>(&self, f: impl FnOnce(&SceneConfig) -> R) -> R {
        match self.scene() {
            Some(scene) => f(scene.config()),
            None => f(&SceneConfig::default()),
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyContainer for Node {
    fn child_list(&self) -> &ChildList {
        &self.inner.children
    }

    fn add_child(&self, child: &Node) -> Result<(), SceneError> {
        child.set_parent(self)
    }

    fn remove_child(&self, child: &Node) -> Result<(), SceneError> {
        if !self.inner.children.contains(child) {
            return Ok(());
        }
        child.clear_parent()
    }

    /// Visits this node first, then its subtree depth-first
    fn call_on_hierarchy(&self, visitor: &mut dyn FnMut(&Node)) {
        visitor(self);
        for child in self.inner.children.iter().iter() {
            child.call_on_hierarchy(visitor);
        }
    }

    /// Tests this node first, then its subtree depth-first
    fn find_in_hierarchy(&self, condition: &mut dyn FnMut(&Node) -> bool) -> Option<Node> {
        if condition(self) {
            return Some(self.clone());
        }
        for child in self.inner.children.iter().iter() {
            if let Some(found) = child.find_in_hierarchy(condition) {
                return Some(found);
            }
        }
        None
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Node");
        debug.field("id", &self.inner.id);
        if let Ok(name) = self.inner.name.try_borrow() {
            debug.field("name", &*name);
        }
        debug
            .field("enabled", &self.inner.enabled.get())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.name.try_borrow() {
            Ok(name) => write!(f, "{}({})", name, self.inner.id),
            Err(_) => write!(f, "Node({})", self.inner.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_is_detached_and_inactive() {
        let node = Node::new();

        assert_eq!(node.name(), "Node");
        assert!(node.parent().is_none());
        assert!(node.scene().is_none());
        assert!(node.is_enabled());
        assert!(!node.is_active());
        assert!(node.is_top_level());
    }

    #[test]
    fn test_self_parenting_rejected() {
        let node = Node::with_name("a");

        assert_eq!(
            node.set_parent(&node),
            Err(SceneError::SelfParenting { node: "a".into() })
        );
        assert!(node.parent().is_none());
    }

    #[test]
    fn test_cycle_rejected_without_change() {
        let a = Node::with_name("a");
        let b = Node::with_name("b");
        let c = Node::with_name("c");
        b.set_parent(&a).unwrap();
        c.set_parent(&b).unwrap();

        let result = a.set_parent(&c);

        assert!(matches!(result, Err(SceneError::CycleDetected { .. })));
        assert!(a.parent().is_none());
        assert_eq!(c.parent(), Some(b.clone()));
        assert_eq!(a.children(), vec![b]);
    }

    #[test]
    fn test_reparent_moves_between_child_lists() {
        let a = Node::with_name("a");
        let b = Node::with_name("b");
        let child = Node::with_name("child");

        a.add_child(&child).unwrap();
        b.add_child(&child).unwrap();

        assert_eq!(a.child_count(), 0);
        assert_eq!(b.children(), vec![child.clone()]);
        assert_eq!(child.parent(), Some(b));
    }

    #[test]
    fn test_set_same_parent_is_noop() {
        let a = Node::new();
        let child = Node::new();
        child.set_parent(&a).unwrap();
        child.set_parent(&a).unwrap();

        assert_eq!(a.child_count(), 1);
    }

    #[test]
    fn test_is_descendant_of() {
        let root = Node::new();
        let mid = Node::new();
        let leaf = Node::new();
        mid.set_parent(&root).unwrap();
        leaf.set_parent(&mid).unwrap();

        assert!(leaf.is_descendant_of(&root));
        assert!(leaf.is_descendant_of(&mid));
        assert!(!root.is_descendant_of(&leaf));
        assert!(!leaf.is_descendant_of(&leaf));
    }

    #[test]
    fn test_remove_child_ignores_strangers() {
        let a = Node::new();
        let b = Node::new();
        let stranger = Node::new();
        stranger.set_parent(&b).unwrap();

        a.remove_child(&stranger).unwrap();

        assert_eq!(stranger.parent(), Some(b));
    }

    #[test]
    fn test_find_by_name_includes_self_and_skips_empty() {
        let root = Node::with_name("root");
        let leaf = Node::with_name("leaf");
        leaf.set_parent(&root).unwrap();

        assert_eq!(root.find_by_name("root"), Some(root.clone()));
        assert_eq!(root.find_by_name("leaf"), Some(leaf));
        assert_eq!(root.find_by_name(""), None);
        assert_eq!(root.find_by_name("missing"), None);
    }

    #[test]
    fn test_call_on_hierarchy_is_depth_first_node_first() {
        let root = Node::with_name("root");
        let a = Node::with_name("a");
        let a1 = Node::with_name("a1");
        let b = Node::with_name("b");
        a.set_parent(&root).unwrap();
        a1.set_parent(&a).unwrap();
        b.set_parent(&root).unwrap();

        let mut visited = Vec::new();
        root.call_on_hierarchy(&mut |node| visited.push(node.name()));

        assert_eq!(visited, ["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_dropping_detached_parent_frees_child_link() {
        let child = Node::new();
        {
            let parent = Node::new();
            child.set_parent(&parent).unwrap();
        }
        assert!(child.parent().is_none());
    }
}
