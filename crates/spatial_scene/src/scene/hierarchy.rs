//! Ordered child container shared by the scene root and every node
//!
//! Children are owned strongly by their container; the back-reference from a
//! child to its parent is weak. Visitor walks ([`HierarchyContainer::call_on_hierarchy`],
//! [`HierarchyContainer::find_in_hierarchy`]) never walk the live `Vec`: they
//! walk an immutable snapshot that is rebuilt lazily after a structural change,
//! and only when no iteration over this container is in progress. A callback
//! that reparents or destroys a sibling mid-iteration therefore never
//! invalidates the walk, and nested walks of the same container all see the
//! same snapshot.
//!
//! Structural propagation (scene links, dirty bits, activation, release) runs
//! from inside such callbacks, so it copies the live list with
//! [`ChildList::to_vec`] instead and reaches children added mid-walk.

use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::Rc;

use super::error::SceneError;
use super::node::Node;

/// Ordered list of child nodes with reentrancy-safe iteration
pub struct ChildList {
    children: RefCell<Vec<Node>>,
    iterable: RefCell<Rc<[Node]>>,
    iterable_dirty: Cell<bool>,
    iterating: Cell<usize>,
}

impl ChildList {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            children: RefCell::new(Vec::new()),
            iterable: RefCell::new(Rc::from(Vec::new())),
            iterable_dirty: Cell::new(false),
            iterating: Cell::new(0),
        }
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    /// Whether there are no children
    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }

    /// Whether `node` is a direct child
    pub fn contains(&self, node: &Node) -> bool {
        self.children.borrow().iter().any(|child| child == node)
    }

    /// Copy of the live child list
    pub fn to_vec(&self) -> Vec<Node> {
        self.children.borrow().clone()
    }

    /// Snapshot for iteration.
    ///
    /// The snapshot stays valid (and unchanged) for as long as the returned
    /// guard lives, whatever the callbacks run during the walk do.
    pub fn iter(&self) -> ChildrenSnapshot<'_> {
        if self.iterable_dirty.get() && self.iterating.get() == 0 {
            let fresh: Rc<[Node]> = self.children.borrow().iter().cloned().collect();
            *self.iterable.borrow_mut() = fresh;
            self.iterable_dirty.set(false);
        }

        self.iterating.set(self.iterating.get() + 1);
        ChildrenSnapshot {
            owner: self,
            nodes: Rc::clone(&self.iterable.borrow()),
        }
    }

    pub(crate) fn push(&self, node: Node) {
        self.children.borrow_mut().push(node);
        self.iterable_dirty.set(true);
    }

    pub(crate) fn remove(&self, node: &Node) -> bool {
        let mut children = self.children.borrow_mut();
        match children.iter().position(|child| child == node) {
            Some(index) => {
                children.remove(index);
                self.iterable_dirty.set(true);
                true
            }
            None => false,
        }
    }
}

impl Default for ChildList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChildList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.children.borrow().iter()).finish()
    }
}

/// Iteration guard returned by [`ChildList::iter`]
pub struct ChildrenSnapshot<'a> {
    owner: &'a ChildList,
    nodes: Rc<[Node]>,
}

impl Deref for ChildrenSnapshot<'_> {
    type Target = [Node];

    fn deref(&self) -> &[Node] {
        &self.nodes
    }
}

impl Drop for ChildrenSnapshot<'_> {
    fn drop(&mut self) {
        let depth = self.owner.iterating.get();
        debug_assert!(depth > 0, "child iteration guard dropped twice");
        self.owner.iterating.set(depth.saturating_sub(1));
    }
}

/// Contract shared by every branch point of the graph (scene root and nodes)
pub trait HierarchyContainer {
    /// The container's children
    fn child_list(&self) -> &ChildList;

    /// Make `child` a child of this container, detaching it from its old parent first.
    ///
    /// Adding a node that is already a direct child is a no-op.
    fn add_child(&self, child: &Node) -> Result<(), SceneError>;

    /// Detach `child` if it is a direct child; otherwise nothing happens
    fn remove_child(&self, child: &Node) -> Result<(), SceneError>;

    /// Copy of the direct children, in insertion order
    fn children(&self) -> Vec<Node> {
        self.child_list().to_vec()
    }

    /// Number of direct children
    fn child_count(&self) -> usize {
        self.child_list().len()
    }

    /// Depth-first walk calling `visitor` on every node below this container
    fn call_on_hierarchy(&self, visitor: &mut dyn FnMut(&Node)) {
        for child in self.child_list().iter().iter() {
            child.call_on_hierarchy(visitor);
        }
    }

    /// Depth-first search for the first node satisfying `condition`
    fn find_in_hierarchy(&self, condition: &mut dyn FnMut(&Node) -> bool) -> Option<Node> {
        for child in self.child_list().iter().iter() {
            if let Some(found) = child.find_in_hierarchy(condition) {
                return Some(found);
            }
        }
        None
    }

    /// Depth-first search by name; an empty name never matches
    fn find_by_name(&self, name: &str) -> Option<Node> {
        if name.is_empty() {
            return None;
        }
        self.find_in_hierarchy(&mut |node| node.name() == name)
    }
}
