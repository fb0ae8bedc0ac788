//! Scene graph demo
//!
//! Builds a small tabletop scene, follows a scripted tracked anchor for a few
//! frames and taps a button through the camera. Pass a `.toml` or `.ron`
//! config path as the first argument to override the defaults.

mod collision;

use std::cell::Cell;
use std::rc::Rc;

use log::{info, warn};
use spatial_scene::foundation::logging;
use spatial_scene::foundation::math::{decompose_translation, Mat4, Quat, Ray, Vec3};
use spatial_scene::prelude::*;

use collision::SphereWorld;

/// Demo failures
#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("input error: {0}")]
    Input(#[from] PointerEventError),
}

/// Renderer that only logs what it is asked to draw
struct LogRenderer;

impl Renderer for LogRenderer {
    fn attach_renderable(&self, handle: &RenderableHandle) {
        info!("Renderable {} now drawn", handle.id());
    }

    fn detach_renderable(&self, handle: &RenderableHandle) {
        info!("Renderable {} hidden", handle.id());
    }

    fn attach_light(&self, handle: &LightHandle) {
        info!("Light {} on", handle.id());
    }

    fn detach_light(&self, handle: &LightHandle) {
        info!("Light {} off", handle.id());
    }
}

/// Perspective projection for a fixed viewport
struct Pinhole {
    width: f32,
    height: f32,
    fov_y_radians: f32,
}

impl CameraProjection for Pinhole {
    fn screen_point_to_ray(&self, camera_world: &Mat4, x: f32, y: f32) -> Option<Ray> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let ndc_x = 2.0 * x / self.width - 1.0;
        let ndc_y = 1.0 - 2.0 * y / self.height;
        let half_height = (self.fov_y_radians * 0.5).tan();
        let aspect = self.width / self.height;
        let local = Vec3::new(ndc_x * half_height * aspect, ndc_y * half_height, -1.0);

        Some(Ray::new(
            decompose_translation(camera_world),
            camera_world.transform_vector(&local),
        ))
    }
}

/// Tracker stand-in that drifts the anchor along +X every frame
struct ScriptedTracker {
    frame: Cell<u32>,
}

impl ScriptedTracker {
    fn advance(&self) {
        self.frame.set(self.frame.get() + 1);
    }
}

impl PoseSource for ScriptedTracker {
    fn is_tracking(&self) -> bool {
        // Tracking is lost for frame 3
        self.frame.get() != 3
    }

    fn pose(&self) -> Pose {
        #[allow(clippy::cast_precision_loss)]
        let x = self.frame.get() as f32 * 0.05;
        Pose::new(Vec3::new(x, 0.0, -2.0), Quat::identity())
    }
}

fn load_config() -> Result<SceneConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => Ok(SceneConfig::load_from_file(&path)?),
        None => Ok(SceneConfig::default()),
    }
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    if !logging::init_with_filter(&config.log_filter) {
        warn!("Logger already installed");
    }
    config.validate()?;

    let collision = Rc::new(SphereWorld::default());
    let scene = Scene::new(config, Rc::new(LogRenderer), collision.clone());
    scene.set_camera_projection(Rc::new(Pinhole {
        width: 800.0,
        height: 600.0,
        fov_y_radians: 60f32.to_radians(),
    }));
    scene.camera().set_local_position(Vec3::new(0.0, 0.0, 0.5))?;

    let anchor = Node::with_name("anchor");
    let tracker = Rc::new(ScriptedTracker { frame: Cell::new(0) });
    let anchor_behavior = AnchorBehavior::attach(&anchor, Some(tracker.clone() as Rc<dyn PoseSource>));
    scene.add_child(&anchor)?;

    let table = Node::with_name("table");
    table.set_parent(&anchor)?;
    table.set_renderable(Some(RenderableHandle::new(1)))?;
    table.set_light(Some(LightHandle::new(2)))?;

    let button = Node::with_name("button");
    button.set_parent(&table)?;
    button.set_local_scale(Vec3::new(0.5, 0.5, 0.5))?;
    button.set_collision_shape(Some(collision.create_sphere(1.0)))?;

    let taps = Rc::new(Cell::new(0));
    let tap_counter = Rc::clone(&taps);
    button.set_on_tap_listener(Rc::new(
        move |node: &Node, hit: &HitTestResult, _event: &PointerEvent| {
            tap_counter.set(tap_counter.get() + 1);
            info!("Tapped '{}' at distance {:.2}", node.name(), hit.distance());
        },
    ));

    let mut frame_time = FrameTime::new();
    for frame in 1..=5u64 {
        tracker.advance();
        frame_time.update(frame * 16_000_000);
        scene.dispatch_update(&frame_time);
        info!(
            "Frame {frame}: tracking={} button at {:?} active={}",
            anchor_behavior.is_tracking(),
            button.world_position(),
            button.is_active()
        );
    }

    // Tap the center of the screen where the button sits
    scene.on_touch_event(&PointerEvent::single(PointerAction::Begin, 0, 400.0, 300.0, 0.0)?);
    scene.on_touch_event(&PointerEvent::single(PointerAction::End, 0, 402.0, 301.0, 0.1)?);
    info!("Taps: {}", taps.get());

    table.destroy()?;
    info!(
        "Table destroyed; {} collision shapes left, anchor has {} children",
        collision.shape_count(),
        anchor.child_count()
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Demo failed: {e}");
        std::process::exit(1);
    }
}
