//! Nodes pinned to an externally tracked pose
//!
//! An [`AnchorBehavior`] makes its node follow a [`PoseSource`] every frame
//! and hides the node's children while the source is not tracking. The
//! node's transform is locked against direct mutation while a source is
//! bound.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, warn};

use crate::foundation::math::{utils, Quat, Vec3};
use crate::foundation::time::FrameTime;

use super::listeners::NodeBehavior;
use super::node::{Node, TransformLock};

const SLERP_EPSILON: f32 = 1e-6;

/// World-space pose reported by a tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// World position
    pub position: Vec3,
    /// World rotation
    pub rotation: Quat,
}

impl Pose {
    /// Create a pose
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

/// External tracker feeding an anchor
pub trait PoseSource {
    /// Whether the pose is currently valid
    fn is_tracking(&self) -> bool;

    /// Latest pose; only meaningful while tracking
    fn pose(&self) -> Pose;
}

/// Behavior that drives its node from a [`PoseSource`]
pub struct AnchorBehavior {
    source: RefCell<Option<Rc<dyn PoseSource>>>,
    smoothed: Cell<bool>,
    was_tracking: Cell<bool>,
}

impl AnchorBehavior {
    /// Install a new anchor behavior on `node` and bind it to `source`
    pub fn attach(node: &Node, source: Option<Rc<dyn PoseSource>>) -> Rc<Self> {
        let behavior = Rc::new(Self {
            source: RefCell::new(None),
            smoothed: Cell::new(true),
            was_tracking: Cell::new(false),
        });
        node.set_behavior(Rc::clone(&behavior));
        behavior.set_pose_source(node, source);
        behavior
    }

    /// Rebind to another source (or none).
    ///
    /// The node snaps to the new pose without smoothing and its children are
    /// enabled according to the new source's tracking state.
    pub fn set_pose_source(&self, node: &Node, source: Option<Rc<dyn PoseSource>>) {
        let bound = source.is_some();
        *self.source.borrow_mut() = source;
        node.set_transform_lock(bound.then_some(TransformLock::Anchored));

        self.update_tracked_pose(node, 0.0, true);

        let tracking = self.is_tracking();
        self.was_tracking.set(tracking);
        set_children_enabled(node, tracking);
    }

    /// Whether a bound source is tracking
    pub fn is_tracking(&self) -> bool {
        self.source
            .borrow()
            .as_ref()
            .is_some_and(|source| source.is_tracking())
    }

    /// Enable or disable pose smoothing (on by default)
    pub fn set_smoothed(&self, smoothed: bool) {
        self.smoothed.set(smoothed);
    }

    /// Whether pose smoothing is enabled
    pub fn is_smoothed(&self) -> bool {
        self.smoothed.get()
    }

    fn update_tracked_pose(&self, node: &Node, delta_seconds: f32, force_immediate: bool) {
        let source = self.source.borrow().clone();
        let Some(source) = source.filter(|source| source.is_tracking()) else {
            return;
        };
        let target = source.pose();

        let (position, rotation) = if self.smoothed.get() && !force_immediate {
            let rate = node.with_config(|config| config.anchor_smoothing_factor);
            let t = utils::clamp(delta_seconds * rate, 0.0, 1.0);
            let rotation = node
                .world_rotation()
                .try_slerp(&target.rotation, t, SLERP_EPSILON)
                .unwrap_or(target.rotation);
            (utils::lerp(&node.world_position(), &target.position, t), rotation)
        } else {
            (target.position, target.rotation)
        };

        if let Err(err) = node.apply_tracked_pose(position, rotation) {
            warn!("Anchor '{}' could not follow its pose: {err}", node.name());
        }
    }
}

fn set_children_enabled(node: &Node, enabled: bool) {
    debug!("Anchor '{}' tracking: {enabled}", node.name());
    if let Err(err) = node.set_children_enabled(enabled) {
        warn!("Anchor '{}' could not toggle its children: {err}", node.name());
    }
}

impl NodeBehavior for AnchorBehavior {
    fn on_update(&self, node: &Node, frame_time: &FrameTime) {
        self.update_tracked_pose(node, frame_time.delta_seconds(), false);

        let tracking = self.is_tracking();
        if tracking != self.was_tracking.get() {
            self.was_tracking.set(tracking);
            set_children_enabled(node, tracking);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::error::SceneError;
    use approx::assert_relative_eq;

    struct FixedPose {
        tracking: Cell<bool>,
        pose: Cell<Pose>,
    }

    impl PoseSource for FixedPose {
        fn is_tracking(&self) -> bool {
            self.tracking.get()
        }

        fn pose(&self) -> Pose {
            self.pose.get()
        }
    }

    fn source_at(position: Vec3, tracking: bool) -> Rc<FixedPose> {
        Rc::new(FixedPose {
            tracking: Cell::new(tracking),
            pose: Cell::new(Pose::new(position, Quat::identity())),
        })
    }

    fn frame(delta_nanos: u64) -> FrameTime {
        let mut frame_time = FrameTime::new();
        frame_time.update(1_000_000_000);
        frame_time.update(1_000_000_000 + delta_nanos);
        frame_time
    }

    #[test]
    fn test_binding_snaps_and_locks() {
        let node = Node::with_name("anchor");
        let source = source_at(Vec3::new(1.0, 2.0, 3.0), true);

        AnchorBehavior::attach(&node, Some(source));

        assert_eq!(node.world_position(), Vec3::new(1.0, 2.0, 3.0));
        assert!(matches!(
            node.set_local_position(Vec3::zeros()),
            Err(SceneError::TransformLocked { lock: TransformLock::Anchored, .. })
        ));
    }

    #[test]
    fn test_smoothing_moves_part_way() {
        let node = Node::new();
        let source = source_at(Vec3::zeros(), true);
        let anchor = AnchorBehavior::attach(&node, Some(source.clone()));
        source.pose.set(Pose::new(Vec3::new(10.0, 0.0, 0.0), Quat::identity()));

        // 12/s over 50ms gives a lerp factor of 0.6
        anchor.on_update(&node, &frame(50_000_000));

        assert_relative_eq!(node.world_position(), Vec3::new(6.0, 0.0, 0.0), epsilon = 1e-4);

        anchor.set_smoothed(false);
        anchor.on_update(&node, &frame(1_000_000));
        assert_relative_eq!(node.world_position(), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_children_follow_tracking_state() {
        let node = Node::new();
        let child = Node::new();
        child.set_parent(&node).unwrap();
        let source = source_at(Vec3::zeros(), false);
        let anchor = AnchorBehavior::attach(&node, Some(source.clone()));
        assert!(!child.is_enabled());

        source.tracking.set(true);
        anchor.on_update(&node, &frame(16_000_000));
        assert!(child.is_enabled());

        source.tracking.set(false);
        anchor.on_update(&node, &frame(16_000_000));
        assert!(!child.is_enabled());
    }

    #[test]
    fn test_unbinding_unlocks() {
        let node = Node::new();
        let anchor = AnchorBehavior::attach(&node, Some(source_at(Vec3::zeros(), true)));

        anchor.set_pose_source(&node, None);

        assert_eq!(node.transform_lock(), None);
        assert!(node.set_local_position(Vec3::new(1.0, 0.0, 0.0)).is_ok());
    }
}
