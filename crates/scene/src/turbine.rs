//! Wind turbine: a tower, a nacelle and a three-blade rotor spinning about X.

use std::f32::consts::{PI, TAU};

use glam::{Quat, Vec3};
use waterglass_common::{Color, NodeId, Transform};

use crate::geometry::MeshKind;
use crate::scene::{Node, Scene, SceneError};

pub const MIN_SPEED: f32 = 0.01;
pub const MAX_SPEED: f32 = 0.1;
/// Boosts from rest to full speed.
pub const STEPS_TO_MAX: f32 = 15.0;
pub const SPEED_STEP: f32 = (MAX_SPEED - MIN_SPEED) / STEPS_TO_MAX;
const DECAY_STEP: f32 = 0.001;
const BLADES: u32 = 3;
const SEGMENT: f32 = TAU / BLADES as f32;
const FRAME_MS: f32 = 16.67;
const PARK_EASE: f32 = 0.1;
const PARK_SNAP: f32 = 0.01;
/// Quiet time after the last boost before the speed starts to decay.
const IDLE_BEFORE_DECAY_MS: f32 = 1000.0;
const DECAY_INTERVAL_MS: f32 = 100.0;

/// Rotor angle state machine.
///
/// While spinning the angle decreases by `speed` per normalised frame. When
/// stopped the rotor eases to the nearest blade-aligned angle.
#[derive(Debug, Clone, PartialEq)]
pub struct TurbineSpin {
    angle: f32,
    speed: f32,
    spinning: bool,
    park_target: Option<f32>,
    last_segment: Option<i32>,
    idle_ms: f32,
}

impl Default for TurbineSpin {
    fn default() -> Self {
        Self {
            angle: 0.0,
            speed: MIN_SPEED,
            spinning: true,
            park_target: None,
            last_segment: None,
            idle_ms: 0.0,
        }
    }
}

impl TurbineSpin {
    /// Angle in [0, 2pi).
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    }

    /// One tap: speed up by a fifteenth of the range and restart the idle
    /// clock.
    pub fn boost(&mut self) {
        let next = self.speed + SPEED_STEP;
        // Fifteen f32 steps land a hair under the top; snap onto it.
        let next = if MAX_SPEED - next < SPEED_STEP * 1e-3 { MAX_SPEED } else { next };
        self.set_speed(next);
        self.idle_ms = 0.0;
    }

    /// One decay tick while nobody interacts.
    pub fn decay(&mut self) {
        self.set_speed(self.speed - DECAY_STEP);
    }

    pub fn set_spinning(&mut self, spinning: bool) {
        self.spinning = spinning;
        if spinning {
            self.park_target = None;
        }
    }

    /// Advance by `delta_ms`. Returns the blade segment when the rotor
    /// crosses into a new one.
    pub fn update(&mut self, delta_ms: f32) -> Option<i32> {
        self.apply_idle_decay(delta_ms);
        if self.spinning {
            let frames = delta_ms / FRAME_MS;
            self.angle = wrap(self.angle - self.speed * frames);
            let segment = -((self.angle / SEGMENT).floor() as i32);
            if self.last_segment != Some(segment) {
                self.last_segment = Some(segment);
                return Some(segment);
            }
            return None;
        }

        let target = *self
            .park_target
            .get_or_insert_with(|| wrap((self.angle / SEGMENT).round() * SEGMENT));
        let mut delta = target - self.angle;
        if delta > PI {
            delta -= TAU;
        } else if delta < -PI {
            delta += TAU;
        }
        if delta.abs() < PARK_SNAP {
            self.angle = target;
        } else {
            self.angle = wrap(self.angle + delta * PARK_EASE);
        }
        None
    }

    /// After a second without boosts, decay once per 100 ms elapsed.
    fn apply_idle_decay(&mut self, delta_ms: f32) {
        let before = self.idle_ms;
        self.idle_ms += delta_ms;
        let ticks = |t: f32| ((t - IDLE_BEFORE_DECAY_MS) / DECAY_INTERVAL_MS).floor().max(0.0);
        let due = (ticks(self.idle_ms) - ticks(before)) as u32;
        for _ in 0..due {
            self.decay();
        }
    }

    pub fn is_parked(&self) -> bool {
        !self.spinning && self.park_target == Some(self.angle)
    }
}

fn wrap(angle: f32) -> f32 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if a >= TAU { 0.0 } else { a }
}

/// Turbine nodes in a scene plus the spin driving the rotor.
#[derive(Debug, Clone)]
pub struct Turbine {
    pub root: NodeId,
    pub rotor: NodeId,
    pub blades: [NodeId; 3],
    pub spin: TurbineSpin,
}

impl Turbine {
    pub fn spawn(scene: &mut Scene, base: Vec3, yaw: f32) -> Result<Self, SceneError> {
        let body = Color::from_hex(0xbcbcbc);
        let root = scene.spawn(Node::group(
            "turbine",
            Transform {
                position: base,
                rotation: Quat::from_rotation_y(yaw),
                scale: Vec3::ONE,
            },
        ))?;
        scene.spawn(
            Node::mesh(
                "tower",
                MeshKind::Cube,
                Transform {
                    position: Vec3::new(0.0, 15.0, 0.0),
                    rotation: Quat::IDENTITY,
                    scale: Vec3::new(1.2, 30.0, 1.2),
                },
                body,
            )
            .with_parent(root),
        )?;
        scene.spawn(
            Node::mesh(
                "nacelle",
                MeshKind::Cube,
                Transform {
                    position: Vec3::new(-1.5, 30.5, 0.0),
                    rotation: Quat::IDENTITY,
                    scale: Vec3::new(5.0, 2.0, 2.0),
                },
                body,
            )
            .with_parent(root),
        )?;
        let rotor = scene.spawn(
            Node::group("rotor", Transform::from_position(Vec3::new(1.5, 30.5, 0.0)))
                .with_parent(root),
        )?;
        let mut blades = [rotor; 3];
        for (i, blade) in blades.iter_mut().enumerate() {
            let arm = scene.spawn(
                Node::group(
                    format!("blade_arm_{i}"),
                    Transform {
                        rotation: Quat::from_rotation_x(i as f32 * SEGMENT),
                        ..Transform::default()
                    },
                )
                .with_parent(rotor),
            )?;
            *blade = scene.spawn(
                Node::mesh(
                    format!("blade_{i}"),
                    MeshKind::Cube,
                    Transform {
                        position: Vec3::new(0.3, 9.0, 0.0),
                        rotation: Quat::IDENTITY,
                        scale: Vec3::new(0.4, 18.0, 1.2),
                    },
                    body,
                )
                .with_parent(arm),
            )?;
        }
        Ok(Self {
            root,
            rotor,
            blades,
            spin: TurbineSpin::default(),
        })
    }

    /// Advance the spin and pose the rotor node.
    pub fn update(&mut self, scene: &mut Scene, delta_ms: f32) -> Option<i32> {
        let crossed = self.spin.update(delta_ms);
        if let Some(rotor) = scene.get_mut(self.rotor) {
            rotor.transform.rotation = Quat::from_rotation_x(self.spin.angle());
        }
        if let Some(segment) = crossed {
            tracing::trace!(segment, speed = self.spin.speed(), "rotor entered segment");
        }
        crossed
    }
}
