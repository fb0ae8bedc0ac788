//! Hit test results handed to touch handlers

use crate::foundation::math::Vec3;
use crate::scene::{Node, RayHit};

/// Outcome of a hit test: the node under a pointer, if any
#[derive(Debug, Clone, Default)]
pub struct HitTestResult {
    node: Option<Node>,
    distance: f32,
    point: Vec3,
}

impl HitTestResult {
    /// Nothing was hit
    pub fn empty() -> Self {
        Self::default()
    }

    /// `node` was hit at `point`, `distance` along the ray
    pub fn new(node: Node, distance: f32, point: Vec3) -> Self {
        Self {
            node: Some(node),
            distance,
            point,
        }
    }

    /// Result for a collision-system ray hit; empty if the node is gone
    pub fn from_ray_hit(hit: &RayHit) -> Self {
        match hit.node.upgrade() {
            Some(node) => Self::new(node, hit.distance, hit.point),
            None => Self::empty(),
        }
    }

    /// Hit node
    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    /// Distance along the ray
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// World-space hit point
    pub fn point(&self) -> Vec3 {
        self.point
    }
}
