use log::{debug, trace};
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::core::{Env, EpisodePhase, Info, RenderFrame, RenderMode, Result, Step};
use crate::spaces::{BoxSpace, Discrete};
use crate::utils::rng::{rng_from_seed, RngStream};
use crate::utils::render2d::{Canvas, BEIGE, BLACK, GRAY, MAUVE, WHITE};
use crate::viewer::{ViewerFactory, ViewerSlot};

/// Physics constants for [`CartPoleEnv`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    pub gravity: f32,
    pub masscart: f32,
    pub masspole: f32,
    /// Half the pole's length.
    pub length: f32,
    pub force_mag: f32,
    /// Seconds between state updates.
    pub tau: f32,
    pub theta_threshold_degrees: f32,
    pub x_threshold: f32,
    pub max_episode_steps: u32,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            masscart: 1.0,
            masspole: 0.1,
            length: 0.5,
            force_mag: 10.0,
            tau: 0.02,
            theta_threshold_degrees: 12.0,
            x_threshold: 2.4,
            max_episode_steps: 500,
        }
    }
}

const CART_POLE_WIDTH: u32 = 600;
const CART_POLE_HEIGHT: u32 = 400;

/// Classic cart-pole balancing task.
/// Observation: [x, x_dot, theta, theta_dot]
/// Action space: Discrete(2) {0: push left, 1: push right}
/// Reward: 1.0 per step until the pole falls, the cart leaves the track, or the budget runs out
pub struct CartPoleEnv {
    x: f32,
    x_dot: f32,
    theta: f32,
    theta_dot: f32,

    steps: u32,
    phase: EpisodePhase,

    rng: RngStream,
    config: CartPoleConfig,
    action_space: Discrete,
    observation_space: BoxSpace<f32, 4>,
    viewer: ViewerSlot,
}

impl Default for CartPoleEnv {
    fn default() -> Self { Self::new(1_234_567) }
}

impl CartPoleEnv {
    pub fn new(seed: u64) -> Self { Self::with_config(seed, CartPoleConfig::default()) }

    pub fn with_config(seed: u64, config: CartPoleConfig) -> Self {
        let theta_limit = config.theta_threshold_degrees.to_radians() * 2.0;
        let x_limit = config.x_threshold * 2.0;
        Self {
            x: 0.0,
            x_dot: 0.0,
            theta: 0.0,
            theta_dot: 0.0,
            steps: 0,
            phase: EpisodePhase::Ready,
            rng: rng_from_seed(seed),
            action_space: Discrete::new(2),
            observation_space: BoxSpace::new(
                [-x_limit, f32::MIN, -theta_limit, f32::MIN],
                [x_limit, f32::MAX, theta_limit, f32::MAX],
            ),
            config,
            viewer: ViewerSlot::new(None, CART_POLE_WIDTH, CART_POLE_HEIGHT, "CartPole-v1"),
        }
    }

    /// Attach a viewer factory used by `RenderMode::Human`.
    pub fn with_viewer_factory(mut self, factory: ViewerFactory) -> Self {
        self.viewer.set_factory(factory);
        self
    }

    pub fn observation_space(&self) -> &BoxSpace<f32, 4> { &self.observation_space }

    pub fn phase(&self) -> EpisodePhase { self.phase }

    /// Draw the track, the cart and the pole.
    pub fn render_pixels(&self) -> RenderFrame {
        let mut canvas = Canvas::new(CART_POLE_WIDTH, CART_POLE_HEIGHT);
        canvas.clear(WHITE);

        let w = canvas.width as i32;
        let h = canvas.height as i32;

        // world x in [-x_threshold, x_threshold] spans the canvas width
        let scale = (canvas.width as f32) / (2.0 * self.config.x_threshold);

        let track_y = (h as f32 * 0.75) as i32;
        canvas.draw_line(0, track_y, w - 1, track_y, GRAY);

        let cart_cx = (w as f32) * 0.5 + self.x * scale;
        let cart_w = 50;
        let cart_h = 30;
        let cart_x = (cart_cx as i32) - cart_w / 2;
        let cart_y = track_y - cart_h;
        canvas.fill_rect(cart_x, cart_y, cart_w, cart_h, BLACK);

        // theta is measured from vertical
        let pole_len_px = (2.0 * self.config.length * scale).max(1.0);
        let top_x = cart_cx as i32;
        let top_y = cart_y;
        let end_x = top_x + (self.theta.sin() * pole_len_px) as i32;
        let end_y = top_y - (self.theta.cos() * pole_len_px) as i32;
        canvas.draw_thick_line(top_x, top_y, end_x, end_y, 6, BEIGE);
        canvas.fill_circle(top_x, top_y, 5, MAUVE);

        canvas.into_render_frame()
    }

    fn terminated(&self) -> bool {
        let theta_threshold = self.config.theta_threshold_degrees.to_radians();
        self.x.abs() > self.config.x_threshold || self.theta.abs() > theta_threshold
    }

    fn obs(&self) -> [f32; 4] { [self.x, self.x_dot, self.theta, self.theta_dot] }
}

impl Env for CartPoleEnv {
    type Obs = [f32; 4];
    type Act = u32;

    fn action_space(&self) -> &Discrete { &self.action_space }

    fn seed(&mut self, seed: u64) {
        debug!("cart-pole seeded with {}", seed);
        self.rng = rng_from_seed(seed);
        self.x = 0.0;
        self.x_dot = 0.0;
        self.theta = 0.0;
        self.theta_dot = 0.0;
        self.steps = 0;
        self.phase = EpisodePhase::Ready;
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        let uni = Uniform::new_inclusive(-0.05f32, 0.05f32);
        self.x = uni.sample(&mut self.rng);
        self.x_dot = uni.sample(&mut self.rng);
        self.theta = uni.sample(&mut self.rng);
        self.theta_dot = uni.sample(&mut self.rng);
        self.steps = 0;
        self.phase = EpisodePhase::Running;
        debug!("cart-pole reset: {:?}", self.obs());
        Ok(self.obs())
    }

    fn step(&mut self, action: Self::Act) -> Result<Step<Self::Obs>> {
        self.phase.ensure_running("CartPole")?;
        self.action_space.check(action)?;

        let c = &self.config;
        let force = if action == 1 { c.force_mag } else { -c.force_mag };
        let total_mass = c.masscart + c.masspole;
        let polemass_length = c.masspole * c.length;
        let cos_theta = self.theta.cos();
        let sin_theta = self.theta.sin();

        let temp = (force + polemass_length * self.theta_dot.powi(2) * sin_theta) / total_mass;
        let theta_acc = (c.gravity * sin_theta - cos_theta * temp)
            / (c.length * (4.0 / 3.0 - c.masspole * cos_theta.powi(2) / total_mass));
        let x_acc = temp - polemass_length * theta_acc * cos_theta / total_mass;

        // Euler integration
        self.x += c.tau * self.x_dot;
        self.x_dot += c.tau * x_acc;
        self.theta += c.tau * self.theta_dot;
        self.theta_dot += c.tau * theta_acc;

        self.steps += 1;
        let done = self.terminated() || self.steps >= self.config.max_episode_steps;
        self.phase = EpisodePhase::after_step(done);
        trace!("cart-pole step {}: action={} done={}", self.steps, action, done);

        let info = Info::new().with("steps", self.steps);
        Ok(Step::new(self.obs(), 1.0, done, info))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GymError;
    use crate::spaces::Space;

    #[test]
    fn pushing_one_way_eventually_terminates() {
        let mut env = CartPoleEnv::new(0);
        env.reset().unwrap();
        let mut steps = 0;
        loop {
            let s = env.step(1).unwrap();
            assert_eq!(s.reward, 1.0);
            steps += 1;
            if s.done { break; }
        }
        assert!(steps < 500);
        assert!(matches!(env.step(1), Err(GymError::InvalidState(_))));
    }

    #[test]
    fn reset_noise_is_small_and_inside_observation_space() {
        let mut env = CartPoleEnv::new(9);
        let obs = env.reset().unwrap();
        assert!(obs.iter().all(|v| v.abs() <= 0.05));
        assert!(env.observation_space().contains(&obs));
    }

    #[test]
    fn rejects_out_of_range_action() {
        let mut env = CartPoleEnv::new(0);
        env.reset().unwrap();
        assert!(matches!(env.step(2), Err(GymError::InvalidArgument(_))));
    }

    #[test]
    fn rgb_array_render_has_canvas_size() {
        let env = CartPoleEnv::default();
        let frame = env.render(RenderMode::RgbArray).unwrap();
        assert_eq!(frame.dimensions(), Some((CART_POLE_WIDTH, CART_POLE_HEIGHT)));
    }
}
