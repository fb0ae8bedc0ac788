//! Scene graph errors
//!
//! Every variant is a caller-side logic error: nothing here is transient and
//! nothing is retried. The node state is left unchanged whenever one of these
//! is returned.

use thiserror::Error;

use super::node::TransformLock;

/// Errors reported synchronously by scene graph mutators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A node was asked to become its own parent
    #[error("cannot make node '{node}' a child of itself")]
    SelfParenting {
        /// Node name
        node: String,
    },

    /// Reparenting would make a node its own ancestor
    #[error("cannot parent '{child}' under '{parent}': '{parent}' is one of its descendants")]
    CycleDetected {
        /// Node being reparented
        child: String,
        /// Requested parent
        parent: String,
    },

    /// Direct transform mutation on a node driven by an external pose
    #[error("transform of '{node}' is locked ({lock:?})")]
    TransformLocked {
        /// Node name
        node: String,
        /// Kind of lock
        lock: TransformLock,
    },

    /// The node's parent is fixed (scene camera)
    #[error("parent of '{node}' cannot be changed")]
    ParentLocked {
        /// Node name
        node: String,
    },

    /// Activation requested on an already active node
    #[error("cannot activate '{node}': already active")]
    AlreadyActive {
        /// Node name
        node: String,
    },

    /// Deactivation requested on an already inactive node
    #[error("cannot deactivate '{node}': already inactive")]
    AlreadyInactive {
        /// Node name
        node: String,
    },

    /// Operation on a destroyed node
    #[error("node '{node}' has been destroyed")]
    Destroyed {
        /// Node name
        node: String,
    },

    /// World scale cannot be solved because the parent chain is singular
    #[error("cannot solve world scale for '{node}': parent world matrix is singular")]
    SingularTransform {
        /// Node name
        node: String,
    },
}
