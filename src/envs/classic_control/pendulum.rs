use log::{debug, trace};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::core::{Env, EpisodePhase, GymError, Info, RenderFrame, RenderMode, Result, Step};
use crate::spaces::{BoxSpace, Discrete};
use crate::utils::rng::{rng_from_seed, RngStream};
use crate::utils::render2d::{Canvas, BLACK, GRAY, RED, ROD, WHITE};
use crate::viewer::{ViewerFactory, ViewerSlot};

/// Physical constants and episode budget for [`PendulumEnv`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendulumConfig {
    pub max_speed: f32,
    pub max_torque: f32,
    pub gravity: f32,
    pub mass: f32,
    pub length: f32,
    pub dt: f32,
    /// The episode ends once the step counter exceeds this value, so an
    /// uninterrupted episode lasts `max_episode_steps + 1` steps.
    pub max_episode_steps: u32,
    /// `reset` draws theta from `[-init_theta, init_theta]`.
    pub init_theta: f32,
    /// `reset` draws theta_dot from `[-init_theta_dot, init_theta_dot]`.
    pub init_theta_dot: f32,
}

impl Default for PendulumConfig {
    fn default() -> Self {
        Self {
            max_speed: 8.0,
            max_torque: 2.0,
            gravity: 10.0,
            mass: 1.0,
            length: 1.0,
            dt: 0.05,
            max_episode_steps: 100,
            init_theta: std::f32::consts::PI,
            init_theta_dot: 1.0,
        }
    }
}

impl PendulumConfig {
    /// Reject parameters that would panic in `reset` or make the dynamics meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [("dt", self.dt), ("mass", self.mass), ("length", self.length)];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(GymError::InvalidArgument(format!("pendulum {name} must be positive, got {value}")));
            }
        }
        let non_negative = [
            ("max_speed", self.max_speed),
            ("max_torque", self.max_torque),
            ("init_theta", self.init_theta),
            ("init_theta_dot", self.init_theta_dot),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(GymError::InvalidArgument(format!("pendulum {name} must be >= 0, got {value}")));
            }
        }
        if !self.gravity.is_finite() {
            return Err(GymError::InvalidArgument(format!("pendulum gravity must be finite, got {}", self.gravity)));
        }
        Ok(())
    }
}

pub const PENDULUM_SCREEN: u32 = 500;

/// Inverted pendulum swing-up.
///
/// State: angle `theta` (0 is upright) and angular velocity `theta_dot`.
/// Action: Discrete(2) -> torque in {-max_torque, +max_torque}.
/// Observation: `[cos(theta), sin(theta), theta_dot]`.
/// Reward: `-(theta_norm^2 + 0.1 * theta_dot^2 + 0.001 * torque^2)`, computed
/// from the state before the update.
pub struct PendulumEnv {
    theta: f32,
    theta_dot: f32,
    last_torque: f32,

    steps: u32,
    phase: EpisodePhase,

    rng: RngStream,
    config: PendulumConfig,
    action_space: Discrete,
    observation_space: BoxSpace<f32, 3>,
    viewer: ViewerSlot,
}

impl Default for PendulumEnv { fn default() -> Self { Self::new(42) } }

impl PendulumEnv {
    pub fn new(seed: u64) -> Self { Self::build(seed, PendulumConfig::default()) }

    /// Construct with custom parameters; fails with `InvalidArgument` on an unusable config.
    pub fn with_config(seed: u64, config: PendulumConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(seed, config))
    }

    fn build(seed: u64, config: PendulumConfig) -> Self {
        let high = [1.0, 1.0, config.max_speed];
        Self {
            theta: 0.0,
            theta_dot: 0.0,
            last_torque: 0.0,
            steps: 0,
            phase: EpisodePhase::Ready,
            rng: rng_from_seed(seed),
            observation_space: BoxSpace::new([-high[0], -high[1], -high[2]], high),
            action_space: Discrete::new(2),
            config,
            viewer: ViewerSlot::new(None, PENDULUM_SCREEN, PENDULUM_SCREEN, "Pendulum-v0"),
        }
    }

    /// Attach a viewer factory used by `RenderMode::Human`.
    pub fn with_viewer_factory(mut self, factory: ViewerFactory) -> Self {
        self.viewer.set_factory(factory);
        self
    }

    pub fn config(&self) -> &PendulumConfig { &self.config }

    pub fn observation_space(&self) -> &BoxSpace<f32, 3> { &self.observation_space }

    pub fn phase(&self) -> EpisodePhase { self.phase }

    /// Raw `(theta, theta_dot)` state.
    pub fn state(&self) -> (f32, f32) { (self.theta, self.theta_dot) }

    /// Overwrite the raw state of a running episode.
    pub fn set_state(&mut self, theta: f32, theta_dot: f32) {
        self.theta = theta;
        self.theta_dot = theta_dot;
    }

    fn obs(&self) -> [f32; 3] {
        [self.theta.cos(), self.theta.sin(), self.theta_dot]
    }

    /// Wrap an angle into `[-pi, pi)` however many turns it has accumulated.
    #[inline]
    pub fn angle_normalize(x: f32) -> f32 {
        let pi = std::f32::consts::PI;
        (x + pi).rem_euclid(2.0 * pi) - pi
    }

    fn torque(&self, action: u32) -> f32 {
        if action == 1 { self.config.max_torque } else { -self.config.max_torque }
    }

    /// Draw a pivot and a rod with a bob.
    pub fn render_pixels(&self) -> RenderFrame {
        let mut canvas = Canvas::new(PENDULUM_SCREEN, PENDULUM_SCREEN);
        canvas.clear(WHITE);
        let c = (PENDULUM_SCREEN / 2) as i32;
        let rod_len = (PENDULUM_SCREEN as f32 * 0.2) as i32;
        let bx = c + (self.theta.sin() * rod_len as f32) as i32;
        let by = c - (self.theta.cos() * rod_len as f32) as i32;

        canvas.draw_thick_line(c, c, bx, by, 20, ROD);
        canvas.fill_circle(c, c, 10, ROD);
        canvas.fill_circle(bx, by, 10, ROD);
        canvas.fill_circle(c, c, 5, BLACK);

        // torque direction indicator under the pivot
        let arrow = if self.last_torque >= 0.0 { 25 } else { -25 };
        canvas.draw_line(c, c + 40, c + arrow, c + 40, if self.last_torque == 0.0 { GRAY } else { RED });

        canvas.into_render_frame()
    }
}

impl Env for PendulumEnv {
    type Obs = [f32; 3];
    type Act = u32;

    fn action_space(&self) -> &Discrete { &self.action_space }

    fn seed(&mut self, seed: u64) {
        debug!("pendulum seeded with {}", seed);
        self.rng = rng_from_seed(seed);
        self.theta = 0.0;
        self.theta_dot = 0.0;
        self.last_torque = 0.0;
        self.steps = 0;
        self.phase = EpisodePhase::Ready;
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        let u_theta = Uniform::new_inclusive(-self.config.init_theta, self.config.init_theta);
        let u_vel = Uniform::new_inclusive(-self.config.init_theta_dot, self.config.init_theta_dot);
        self.theta = u_theta.sample(&mut self.rng);
        self.theta_dot = u_vel.sample(&mut self.rng);
        self.last_torque = 0.0;
        self.steps = 0;
        self.phase = EpisodePhase::Running;
        debug!("pendulum reset: theta={:.4} theta_dot={:.4}", self.theta, self.theta_dot);
        Ok(self.obs())
    }

    fn step(&mut self, action: Self::Act) -> Result<Step<Self::Obs>> {
        self.phase.ensure_running("Pendulum")?;
        self.action_space.check(action)?;

        let PendulumConfig { gravity: g, mass: m, length: l, dt, max_speed, .. } = self.config;
        let u = self.torque(action);
        self.last_torque = u;

        let theta_norm = Self::angle_normalize(self.theta);
        let cost = theta_norm * theta_norm + 0.1 * self.theta_dot * self.theta_dot + 0.001 * u * u;

        // theta_ddot = 3g/(2l) * sin(theta) + 3/(m l^2) * u
        let theta_ddot = (3.0 * g / (2.0 * l)) * self.theta.sin() + (3.0 / (m * l * l)) * u;
        self.theta_dot = (self.theta_dot + theta_ddot * dt).clamp(-max_speed, max_speed);
        self.theta += self.theta_dot * dt;

        self.steps += 1;
        let done = self.steps > self.config.max_episode_steps;
        self.phase = EpisodePhase::after_step(done);
        trace!("pendulum step {}: action={} reward={:.4}", self.steps, action, -cost);

        let info = Info::new().with("steps", self.steps);
        Ok(Step::new(self.obs(), -cost, done, info))
    }

    fn render(&self, mode: RenderMode) -> Result<RenderFrame> {
        let frame = self.render_pixels();
        if mode == RenderMode::Human {
            self.viewer.show(&frame)?;
        }
        Ok(frame)
    }

    fn close(&mut self) { self.viewer.close(); }
}
