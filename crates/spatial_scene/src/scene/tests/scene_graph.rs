//! Transform propagation, queries and hit testing through a full scene

use std::cell::RefCell;
use std::rc::Rc;

use super::support::{fixture, Fixture};
use crate::foundation::math::{decompose_translation, Mat4, Quat, Ray, Vec3};
use crate::input::{HitTestResult, PointerAction, PointerEvent, PointerId};
use crate::scene::{CameraProjection, HierarchyContainer, Node, SceneError};
use approx::assert_relative_eq;

#[cfg(test)]
mod tests {
    use super::*;

    /// Rays from the camera origin through `(x, y, -1)` in world space
    struct PinholeProjection;

    impl CameraProjection for PinholeProjection {
        fn screen_point_to_ray(&self, camera_world: &Mat4, x: f32, y: f32) -> Option<Ray> {
            Some(Ray::new(decompose_translation(camera_world), Vec3::new(x, y, -1.0)))
        }
    }

    fn pair() -> (Fixture, Node, Node) {
        let f = fixture();
        let a = Node::with_name("A");
        let b = Node::with_name("B");
        f.scene.add_child(&a).unwrap();
        b.set_parent(&a).unwrap();
        b.set_local_position(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        (f, a, b)
    }

    #[test]
    fn test_moving_parent_moves_child() {
        let (_f, a, b) = pair();
        assert_relative_eq!(b.world_position(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);

        a.set_world_position(Vec3::new(5.0, 0.0, 0.0)).unwrap();

        assert_relative_eq!(b.world_position(), Vec3::new(6.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(b.local_position(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_cached_world_matrix_refreshes_after_parent_rotation() {
        let (_f, a, b) = pair();
        a.set_local_position(Vec3::new(5.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(b.world_position(), Vec3::new(6.0, 0.0, 0.0), epsilon = 1e-5);

        a.set_local_rotation(Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2))
            .unwrap();

        assert_relative_eq!(b.world_position(), Vec3::new(5.0, 0.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(b.forward(), Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_point_round_trip_under_scaled_parent() {
        let (_f, a, b) = pair();
        a.set_local_position(Vec3::new(-2.0, 3.0, 0.5)).unwrap();
        a.set_local_rotation(Quat::from_axis_angle(&Vec3::x_axis(), 0.7)).unwrap();
        a.set_local_scale(Vec3::new(2.0, 2.0, 2.0)).unwrap();

        for point in [
            Vec3::zeros(),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-4.0, 0.25, 9.0),
        ] {
            let world = b.local_to_world_point(&point);
            assert_relative_eq!(b.world_to_local_point(&world), point, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_parent_move_notifies_child_listener() {
        let (_f, a, b) = pair();
        b.world_matrix();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let listener = Rc::new(move |node: &Node, originating: &Node| {
            sink.borrow_mut().push((node.name(), originating.name()));
        });
        b.add_transform_changed_listener(&listener);

        a.set_world_position(Vec3::new(0.0, 2.0, 0.0)).unwrap();

        assert_eq!(*seen.borrow(), [("B".to_string(), "A".to_string())]);
    }

    #[test]
    fn test_cycle_rejected_without_side_effects() {
        let (f, a, b) = pair();

        assert_eq!(
            a.set_parent(&b),
            Err(SceneError::CycleDetected {
                child: "A".into(),
                parent: "B".into()
            })
        );
        assert_eq!(b.parent(), Some(a.clone()));
        assert!(a.is_top_level());
        assert!(b.is_descendant_of(&f.scene));
    }

    #[test]
    fn test_queries_cover_camera_and_nodes() {
        let (f, _a, b) = pair();

        let mut names = Vec::new();
        f.scene.call_on_hierarchy(&mut |node| names.push(node.name()));

        assert_eq!(names, ["Camera", "A", "B"]);
        assert_eq!(f.scene.find_by_name("B"), Some(b));
        assert_eq!(f.scene.find_by_name(""), None);
        assert_eq!(f.scene.find_by_name("missing"), None);
    }

    #[test]
    fn test_hit_test_maps_collision_hits() {
        let (f, a, b) = pair();
        f.collision.script_hit(&b, 2.5);
        f.collision.script_hit(&a, 4.0);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));

        let nearest = f.scene.hit_test(&ray);
        assert_eq!(nearest.node(), Some(&b));
        assert_relative_eq!(nearest.distance(), 2.5);

        let names: Vec<String> = f
            .scene
            .hit_test_all(&ray)
            .iter()
            .filter_map(|hit| hit.node().map(Node::name))
            .collect();
        assert_eq!(names, ["B", "A"]);
    }

    #[test]
    fn test_hit_on_dropped_node_is_empty() {
        let f = fixture();
        let temporary = Node::with_name("temporary");
        f.collision.script_hit(&temporary, 1.0);
        drop(temporary);

        let hit = f
            .scene
            .hit_test(&Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0)));

        assert!(hit.node().is_none());
    }

    #[test]
    fn test_screen_hit_test_needs_projection() {
        let (f, _a, b) = pair();
        f.collision.script_hit(&b, 3.0);

        assert!(f.scene.hit_test_screen(0.0, 0.0).node().is_none());
        assert!(f.collision.rays.borrow().is_empty());

        f.scene.camera().set_local_position(Vec3::new(0.0, 1.6, 0.0)).unwrap();
        f.scene.set_camera_projection(Rc::new(PinholeProjection));
        let hit = f.scene.hit_test_screen(0.0, 0.0);

        assert_eq!(hit.node(), Some(&b));
        let rays = f.collision.rays.borrow();
        assert_relative_eq!(rays[0].origin, Vec3::new(0.0, 1.6, 0.0), epsilon = 1e-5);
        assert_relative_eq!(rays[0].direction, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_touch_event_routes_through_screen_hit() {
        let (f, _a, b) = pair();
        f.collision.script_hit(&b, 3.0);
        f.scene.set_camera_projection(Rc::new(PinholeProjection));
        let touched = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&touched);
        b.set_on_touch_listener(Rc::new(
            move |node: &Node, _hit: &HitTestResult, event: &PointerEvent| {
                sink.borrow_mut().push((node.name(), event.action()));
                true
            },
        ));

        f.scene
            .on_touch_event(&PointerEvent::single(PointerAction::Begin, 0, 0.0, 0.0, 0.0).unwrap());

        assert_eq!(*touched.borrow(), [("B".to_string(), PointerAction::Begin)]);
        assert!(f
            .scene
            .touch_router()
            .owned_pointers(&b)
            .contains(PointerId::new(0)));
    }
}
