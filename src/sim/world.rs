//! Rigid-body world backed by rapier2d
//!
//! Wraps the rapier sets and pipeline behind the handful of operations a
//! bubble session needs. Coordinates are page pixels with y pointing down.

use std::fmt;

use glam::Vec2;
use rapier2d::prelude::*;

/// Handle of a body in the world
pub type BodyId = RigidBodyHandle;

/// Collision shape of a card body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    Circle { radius: f32 },
    Box { half: Vec2 },
}

/// Material of a dynamic body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyOptions {
    pub restitution: f32,
    pub friction: f32,
    /// Fraction of velocity lost per 60 Hz frame
    pub air_friction: f32,
    /// Mass per square pixel
    pub density: f32,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            restitution: 0.0,
            friction: 0.1,
            air_friction: 0.01,
            density: 0.001,
        }
    }
}

/// Pose and motion of one body, copied out of the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub pos: Vec2,
    /// Rotation in radians
    pub angle: f32,
    pub vel: Vec2,
    pub mass: f32,
    pub is_static: bool,
}

/// Spring pulling a grabbed body toward the pointer
#[derive(Debug, Clone, Copy)]
struct Drag {
    body: BodyId,
    /// Grab point in the body's local frame
    anchor: Point<Real>,
    /// Pointer position
    target: Vec2,
}

pub struct World {
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    /// Gravity direction/strength, each component nominally in -1..1
    pub gravity: Vec2,
    /// Acceleration for a unit gravity vector (px/s²)
    pub gravity_accel: f32,
    pub drag_stiffness: f32,
    drag: Option<Drag>,
    steps: u64,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("bodies", &self.bodies.len())
            .field("gravity", &self.gravity)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl World {
    pub fn new(gravity_accel: f32, drag_stiffness: f32) -> Self {
        let mut params = IntegrationParameters::default();
        // Roughly one "meter" of tolerances per 100 px
        params.length_unit = 100.0;
        Self {
            pipeline: PhysicsPipeline::new(),
            params,
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            gravity: Vec2::ZERO,
            gravity_accel,
            drag_stiffness,
            drag: None,
            steps: 0,
        }
    }

    /// Add a dynamic body that never sleeps, so gravity changes always apply
    pub fn add_dynamic(&mut self, shape: BodyShape, pos: Vec2, options: BodyOptions) -> BodyId {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![pos.x, pos.y])
            .linear_damping(damping_from_air_friction(options.air_friction))
            .angular_damping(damping_from_air_friction(options.air_friction))
            .can_sleep(false)
            .ccd_enabled(true)
            .build();
        let handle = self.bodies.insert(body);

        let collider = match shape {
            BodyShape::Circle { radius } => ColliderBuilder::ball(radius),
            BodyShape::Box { half } => ColliderBuilder::cuboid(half.x, half.y),
        }
        .restitution(options.restitution)
        .restitution_combine_rule(CoefficientCombineRule::Max)
        .friction(options.friction)
        .density(options.density)
        .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Add a fixed box from its center and full size
    pub fn add_static_box(&mut self, center: Vec2, size: Vec2) -> BodyId {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y])
            .build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::cuboid(size.x * 0.5, size.y * 0.5)
            .restitution(0.0)
            .restitution_combine_rule(CoefficientCombineRule::Max)
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    pub fn body(&self, id: BodyId) -> Option<BodyState> {
        self.bodies.get(id).map(state_of)
    }

    pub fn bodies(&self) -> impl Iterator<Item = BodyState> + '_ {
        self.bodies.iter().map(|(_, body)| state_of(body))
    }

    pub fn static_count(&self) -> usize {
        self.bodies.iter().filter(|(_, b)| b.is_fixed()).count()
    }

    pub fn dynamic_count(&self) -> usize {
        self.bodies.iter().filter(|(_, b)| b.is_dynamic()).count()
    }

    /// Number of completed steps
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn set_angular_velocity(&mut self, id: BodyId, angular_vel: f32) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.set_angvel(angular_vel, true);
        }
    }

    /// Impulse through the center of mass
    pub fn apply_impulse(&mut self, id: BodyId, impulse: Vec2) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.apply_impulse(vector![impulse.x, impulse.y], true);
        }
    }

    // === Drag ===

    /// Grab the topmost dynamic body under `point`
    pub fn begin_drag(&mut self, point: Vec2) -> Option<BodyId> {
        let p = point![point.x, point.y];
        let (handle, body) = self
            .colliders
            .iter()
            .filter(|(_, c)| c.shape().contains_point(c.position(), &p))
            .filter_map(|(_, c)| c.parent())
            .filter_map(|h| self.bodies.get(h).map(|b| (h, b)))
            .filter(|(_, b)| b.is_dynamic())
            .last()?;
        self.drag = Some(Drag {
            body: handle,
            anchor: body.position().inverse_transform_point(&p),
            target: point,
        });
        Some(handle)
    }

    pub fn drag_to(&mut self, point: Vec2) {
        if let Some(drag) = self.drag.as_mut() {
            drag.target = point;
        }
    }

    pub fn end_drag(&mut self) -> Option<BodyId> {
        self.drag.take().map(|d| d.body)
    }

    // === Stepping ===

    /// Advance the world by one fixed timestep
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.params.dt = dt;
        self.apply_drag(dt);

        let g = self.gravity * self.gravity_accel;
        self.pipeline.step(
            &vector![g.x, g.y],
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            &(),
            &(),
        );
        self.steps += 1;
    }

    fn apply_drag(&mut self, dt: f32) {
        let Some(drag) = self.drag else {
            return;
        };
        let stiffness = self.drag_stiffness;
        let Some(body) = self.bodies.get_mut(drag.body) else {
            self.drag = None;
            return;
        };
        // Close a fraction of the gap each step; velocity carries over so
        // releasing throws the body.
        let grab = body.position().transform_point(&drag.anchor);
        let offset = vector![drag.target.x - grab.x, drag.target.y - grab.y];
        body.set_linvel(offset * (stiffness / dt), true);
        let angvel = body.angvel();
        body.set_angvel(angvel * (1.0 - stiffness), true);
    }
}

fn state_of(body: &RigidBody) -> BodyState {
    let pos = body.translation();
    let vel = body.linvel();
    BodyState {
        pos: Vec2::new(pos.x, pos.y),
        angle: body.rotation().angle(),
        vel: Vec2::new(vel.x, vel.y),
        mass: body.mass(),
        is_static: body.is_fixed(),
    }
}

/// Per-frame velocity loss (60 Hz) as a continuous damping coefficient
fn damping_from_air_friction(air_friction: f32) -> f32 {
    let keep = (1.0 - air_friction).clamp(1e-3, 1.0);
    -keep.ln() * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;

    fn ball_options() -> BodyOptions {
        BodyOptions {
            restitution: 0.8,
            friction: 0.01,
            air_friction: 0.01,
            ..Default::default()
        }
    }

    #[test]
    fn test_gravity_pulls_dynamic_bodies_only() {
        let mut world = World::new(1000.0, 0.2);
        let floor = world.add_static_box(Vec2::new(0.0, 500.0), Vec2::new(1000.0, 20.0));
        let ball = world.add_dynamic(BodyShape::Circle { radius: 10.0 }, Vec2::ZERO, ball_options());
        world.gravity = Vec2::new(0.0, 1.0);
        for _ in 0..10 {
            world.step(SIM_DT);
        }
        assert!(world.body(ball).unwrap().pos.y > 0.0);
        assert_eq!(world.body(floor).unwrap().pos, Vec2::new(0.0, 500.0));
        assert_eq!(world.step_count(), 10);
    }

    #[test]
    fn test_ball_stays_above_floor() {
        let mut world = World::new(1000.0, 0.2);
        world.add_static_box(Vec2::new(0.0, 150.0), Vec2::new(1000.0, 100.0));
        let options = BodyOptions {
            restitution: 0.0,
            ..ball_options()
        };
        let ball = world.add_dynamic(BodyShape::Circle { radius: 20.0 }, Vec2::ZERO, options);
        world.gravity = Vec2::new(0.0, 1.0);
        for _ in 0..600 {
            world.step(SIM_DT);
        }
        let ball = world.body(ball).unwrap();
        // Floor top at y=100, so center should rest near y=80
        assert!(ball.pos.y < 100.0, "ball fell through floor: {}", ball.pos.y);
        assert!(ball.pos.y > 60.0);
    }

    #[test]
    fn test_overlapping_balls_separate() {
        let mut world = World::new(1000.0, 0.2);
        let a = world.add_dynamic(BodyShape::Circle { radius: 10.0 }, Vec2::ZERO, ball_options());
        let b = world.add_dynamic(
            BodyShape::Circle { radius: 10.0 },
            Vec2::new(5.0, 0.0),
            ball_options(),
        );
        for _ in 0..60 {
            world.step(SIM_DT);
        }
        let dist = world.body(a).unwrap().pos.distance(world.body(b).unwrap().pos);
        assert!(dist > 15.0, "still overlapping: {}", dist);
    }

    #[test]
    fn test_air_friction_damps_motion() {
        let mut world = World::new(1000.0, 0.2);
        let ball = world.add_dynamic(BodyShape::Circle { radius: 10.0 }, Vec2::ZERO, ball_options());
        // Mass properties settle on the first step
        world.step(SIM_DT);
        let mass = world.body(ball).unwrap().mass;
        assert!(mass > 0.0);
        world.apply_impulse(ball, Vec2::new(500.0 * mass, 0.0));
        assert!((world.body(ball).unwrap().vel.x - 500.0).abs() < 1.0);
        for _ in 0..(120 * 5) {
            world.step(SIM_DT);
        }
        assert!(world.body(ball).unwrap().vel.length() < 500.0 * 0.1);
    }

    #[test]
    fn test_drag_pulls_body_toward_pointer() {
        let mut world = World::new(1000.0, 0.2);
        let ball = world.add_dynamic(BodyShape::Circle { radius: 10.0 }, Vec2::ZERO, ball_options());
        assert_eq!(world.begin_drag(Vec2::new(2.0, 0.0)), Some(ball));
        world.drag_to(Vec2::new(200.0, 0.0));
        for _ in 0..60 {
            world.step(SIM_DT);
        }
        assert!(world.body(ball).unwrap().pos.x > 150.0);
        assert_eq!(world.end_drag(), Some(ball));
        assert_eq!(world.end_drag(), None);
    }

    #[test]
    fn test_drag_ignores_static_and_empty_space() {
        let mut world = World::new(1000.0, 0.2);
        world.add_static_box(Vec2::new(300.0, 300.0), Vec2::splat(50.0));
        world.add_dynamic(BodyShape::Box { half: Vec2::splat(10.0) }, Vec2::ZERO, ball_options());
        assert_eq!(world.begin_drag(Vec2::new(300.0, 300.0)), None);
        assert_eq!(world.begin_drag(Vec2::new(-200.0, 0.0)), None);
    }

    #[test]
    fn test_counts() {
        let mut world = World::new(1000.0, 0.2);
        world.add_static_box(Vec2::ZERO, Vec2::splat(10.0));
        world.add_dynamic(BodyShape::Circle { radius: 5.0 }, Vec2::new(100.0, 0.0), ball_options());
        world.add_dynamic(BodyShape::Box { half: Vec2::splat(5.0) }, Vec2::new(200.0, 0.0), ball_options());
        assert_eq!((world.static_count(), world.dynamic_count()), (1, 2));
        assert_eq!(world.bodies().filter(|b| b.is_static).count(), 1);
    }

    #[test]
    fn test_air_friction_mapping() {
        assert_eq!(damping_from_air_friction(0.0), 0.0);
        assert!(damping_from_air_friction(0.01) > 0.5 && damping_from_air_friction(0.01) < 0.7);
        assert!(damping_from_air_friction(1.0).is_finite());
    }
}
