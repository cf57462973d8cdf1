//! Endless backdrop: three plates side by side, drifting left and wrapping.

use glam::Vec3;
use waterglass_common::{Color, NodeId, Transform};

use crate::geometry::MeshKind;
use crate::scene::{Node, Scene, SceneError, Shading};

pub const PLATE_HEIGHT: f32 = 100.0;
pub const PLATE_WIDTH: f32 = PLATE_HEIGHT * 2.67;
pub const PLATE_DEPTH: f32 = -112.0;
/// Frame length the plate speed is expressed in.
const FRAME_MS: f32 = 1000.0 / 60.0;
const SHIFT_DURATION_MS: f32 = 1000.0;

/// Quadratic ease-in-out.
fn ease_in_out(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Shift {
    from: f32,
    to: f32,
    elapsed_ms: f32,
}

#[derive(Debug, Clone)]
pub struct ScrollingBackground {
    group: NodeId,
    plates: [NodeId; 3],
    /// Units per 60 Hz frame.
    pub speed: f32,
    shift: Option<Shift>,
}

impl ScrollingBackground {
    /// Add the group and its plates to `scene`.
    pub fn spawn(scene: &mut Scene, speed: f32, color: Color) -> Result<Self, SceneError> {
        let group = scene.spawn(Node::group("background", Transform::default()))?;
        let mut plates = [group; 3];
        for (i, plate) in plates.iter_mut().enumerate() {
            let x = (i as f32 - 1.0) * PLATE_WIDTH;
            *plate = scene.spawn(
                Node::mesh(
                    format!("background_plate_{i}"),
                    MeshKind::Plane {
                        width: PLATE_WIDTH,
                        height: PLATE_HEIGHT,
                    },
                    Transform::from_position(Vec3::new(x, 0.0, PLATE_DEPTH)),
                    color,
                )
                .with_shading(Shading::Unlit)
                .with_parent(group),
            )?;
        }
        Ok(Self {
            group,
            plates,
            speed,
            shift: None,
        })
    }

    pub fn group(&self) -> NodeId {
        self.group
    }

    pub fn plates(&self) -> [NodeId; 3] {
        self.plates
    }

    /// Plate x positions, in spawn order.
    pub fn plate_positions(&self, scene: &Scene) -> [f32; 3] {
        self.plates
            .map(|p| scene.get(p).map_or(0.0, |n| n.transform.position.x))
    }

    /// Ease the whole group to `x` over one second.
    pub fn shift_to(&mut self, scene: &Scene, x: f32) {
        let from = scene
            .get(self.group)
            .map_or(0.0, |n| n.transform.position.x);
        if from != x {
            self.shift = Some(Shift {
                from,
                to: x,
                elapsed_ms: 0.0,
            });
        }
    }

    /// Advance by `delta_ms` milliseconds of wall time.
    pub fn update(&mut self, scene: &mut Scene, delta_ms: f32) {
        let move_x = self.speed * delta_ms / FRAME_MS;

        let mut xs = self.plate_positions(scene);
        for x in &mut xs {
            *x -= move_x;
        }
        let rightmost = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        for x in &mut xs {
            if *x < -PLATE_WIDTH {
                *x = rightmost + PLATE_WIDTH;
            }
        }
        for (plate, x) in self.plates.iter().zip(xs) {
            if let Some(node) = scene.get_mut(*plate) {
                node.transform.position.x = x;
            }
        }

        if let Some(shift) = &mut self.shift {
            shift.elapsed_ms += delta_ms;
            let t = (shift.elapsed_ms / SHIFT_DURATION_MS).min(1.0);
            let x = shift.from + (shift.to - shift.from) * ease_in_out(t);
            if let Some(node) = scene.get_mut(self.group) {
                node.transform.position.x = x;
            }
            if t >= 1.0 {
                self.shift = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(speed: f32) -> (Scene, ScrollingBackground) {
        let mut scene = Scene::new();
        let bg = ScrollingBackground::spawn(&mut scene, speed, Color::WHITE).unwrap();
        (scene, bg)
    }

    #[test]
    fn plates_start_side_by_side() {
        let (scene, bg) = setup(0.025);
        assert_eq!(bg.plate_positions(&scene), [-PLATE_WIDTH, 0.0, PLATE_WIDTH]);
        assert_eq!(
            scene.get(bg.plates()[0]).unwrap().transform.position.z,
            PLATE_DEPTH
        );
    }

    #[test]
    fn plates_drift_by_speed_per_frame() {
        let (mut scene, mut bg) = setup(2.0);
        bg.update(&mut scene, FRAME_MS * 3.0);
        let xs = bg.plate_positions(&scene);
        assert!((xs[1] + 6.0).abs() < 1e-4);
        assert!((xs[2] - (PLATE_WIDTH - 6.0)).abs() < 1e-3);
    }

    #[test]
    fn plate_past_the_left_edge_wraps_to_the_rightmost() {
        let (mut scene, mut bg) = setup(1.0);
        bg.update(&mut scene, FRAME_MS);
        let xs = bg.plate_positions(&scene);
        // The first plate crossed -width and now trails the rightmost one.
        let rightmost = PLATE_WIDTH - 1.0;
        assert!((xs[0] - (rightmost + PLATE_WIDTH)).abs() < 1e-3);
        assert!((xs[1] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn shift_eases_the_group_to_its_target() {
        let (mut scene, mut bg) = setup(0.0);
        bg.shift_to(&scene, 30.0);
        bg.update(&mut scene, 500.0);
        let mid = scene.get(bg.group()).unwrap().transform.position.x;
        assert!((mid - 15.0).abs() < 1e-4);

        bg.update(&mut scene, 600.0);
        assert_eq!(scene.get(bg.group()).unwrap().transform.position.x, 30.0);
        assert_eq!(bg.plate_positions(&scene), [-PLATE_WIDTH, 0.0, PLATE_WIDTH]);
    }
}
