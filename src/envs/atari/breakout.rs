//! Ball-and-paddle brick breaking on a fixed grid of blocks.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::core::{Env, EpisodePhase, GymError, Info, RenderFrame, RenderMode, Result, Step};
use crate::spaces::{BoxSpace, Discrete};
use crate::utils::render2d::{Canvas, Color, BLACK, BLUE, DARK_RED, GREEN, ORANGE, ORANGE_RED, RED, YELLOW};
use crate::viewer::{ViewerFactory, ViewerSlot};

pub const BLOCK_ROWS: usize = 6;

/// Geometry, speeds and colors for [`BreakoutEnv`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Y coordinate of the first block row.
    pub top_row_y: u32,
    /// Blocks per row.
    pub columns: u32,
    pub block_width: u32,
    pub block_height: u32,
    /// One color per block row, top to bottom.
    pub row_colors: [Color; BLOCK_ROWS],

    pub ball_width: u32,
    pub ball_height: u32,
    /// Pixels travelled per tick.
    pub ball_speed: f32,
    pub ball_start_x: f32,
    pub ball_start_y: f32,
    /// Degrees; 0 points up, 90 right, 180 down.
    pub ball_start_direction: f32,
    pub ball_color: Color,

    pub paddle_width: u32,
    pub paddle_height: u32,
    pub paddle_speed: i32,
    pub paddle_color: Color,

    /// After a bounce the direction keeps at least this many degrees away from 90 and 270.
    pub min_bounce_angle: f32,
    /// Optional step budget; `None` lets an episode run until the ball is lost or the wall is cleared.
    pub max_episode_steps: Option<u32>,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            screen_width: 400,
            screen_height: 600,
            top_row_y: 80,
            columns: 18,
            block_width: 23,
            block_height: 15,
            row_colors: [RED, ORANGE_RED, ORANGE, YELLOW, GREEN, BLUE],
            ball_width: 23,
            ball_height: 15,
            ball_speed: 10.0,
            ball_start_x: 0.0,
            ball_start_y: 180.0,
            ball_start_direction: 200.0,
            ball_color: DARK_RED,
            paddle_width: 75,
            paddle_height: 15,
            paddle_speed: 15,
            paddle_color: RED,
            min_bounce_angle: 15.0,
            max_episode_steps: Some(10_000),
        }
    }
}

impl BreakoutConfig {
    /// The paddle needs a one pixel margin on each side, and the ball must fit between the walls.
    pub fn validate(&self) -> Result<()> {
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(GymError::InvalidArgument(format!(
                "breakout screen must be non-empty, got {}x{}",
                self.screen_width, self.screen_height
            )));
        }
        if self.paddle_width == 0 || self.paddle_width + 2 > self.screen_width {
            return Err(GymError::InvalidArgument(format!(
                "paddle width {} does not fit a {} pixel wide screen",
                self.paddle_width, self.screen_width
            )));
        }
        if self.ball_width + 2 > self.screen_width {
            return Err(GymError::InvalidArgument(format!(
                "ball width {} does not fit a {} pixel wide screen",
                self.ball_width, self.screen_width
            )));
        }
        if !(self.ball_speed.is_finite() && self.ball_speed >= 0.0) {
            return Err(GymError::InvalidArgument(format!("ball speed must be >= 0, got {}", self.ball_speed)));
        }
        if !(0.0..90.0).contains(&self.min_bounce_angle) {
            return Err(GymError::InvalidArgument(format!(
                "min bounce angle must lie in [0, 90), got {}",
                self.min_bounce_angle
            )));
        }
        Ok(())
    }
}

/// Axis-aligned rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self { Self { x, y, width, height } }

    /// Strict overlap test; touching edges do not collide.
    pub fn collides_with(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn center_x(&self) -> f32 { self.x + self.width / 2.0 }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub color: Color,
    pub rect: Rect,
    pub destroyed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    /// Degrees in `[0, 360)`.
    pub direction: f32,
    width: f32,
    height: f32,
    speed: f32,
    min_bounce_angle: f32,
}

impl Ball {
    fn new(config: &BreakoutConfig) -> Self {
        let mut ball = Self {
            x: config.ball_start_x,
            y: config.ball_start_y,
            direction: 0.0,
            width: config.ball_width as f32,
            height: config.ball_height as f32,
            speed: config.ball_speed,
            min_bounce_angle: config.min_bounce_angle,
        };
        ball.direction = ball.guard_angle(config.ball_start_direction.rem_euclid(360.0));
        ball
    }

    pub fn rect(&self) -> Rect { Rect::new(self.x, self.y, self.width, self.height) }

    /// Keep a direction at least `min_bounce_angle` away from horizontal travel.
    fn guard_angle(&self, direction: f32) -> f32 {
        let margin = self.min_bounce_angle;
        let mut d = direction;
        for horizontal in [90.0f32, 270.0] {
            if (d - horizontal).abs() < margin {
                d = if d < horizontal { horizontal - margin } else { horizontal + margin };
            }
        }
        d.rem_euclid(360.0)
    }

    /// Reflect vertically; `diff` skews the result so the paddle can angle its returns.
    pub fn bounce(&mut self, diff: f32) {
        let d = (180.0 - self.direction - diff).rem_euclid(360.0);
        self.direction = self.guard_angle(d);
    }

    fn reflect_horizontally(&mut self) {
        self.direction = self.guard_angle((360.0 - self.direction).rem_euclid(360.0));
    }

    /// Move one tick, bouncing off the top and side walls.
    /// Returns true when the ball is below the bottom edge.
    fn update(&mut self, screen_width: f32, screen_height: f32) -> bool {
        let already_lost = self.y > screen_height;

        let radians = self.direction.to_radians();
        self.x += self.speed * radians.sin();
        self.y -= self.speed * radians.cos();

        if self.y <= 0.0 {
            self.bounce(0.0);
            self.y = 1.0;
        }
        if self.x <= 0.0 {
            self.reflect_horizontally();
            self.x = 1.0;
        }
        if self.x > screen_width - self.width {
            self.reflect_horizontally();
            self.x = screen_width - self.width - 1.0;
        }

        already_lost || self.y > screen_height
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Paddle {
    pub x: i32,
    y: i32,
    width: i32,
    height: i32,
    speed: i32,
    screen_width: i32,
}

impl Paddle {
    fn new(config: &BreakoutConfig) -> Self {
        let width = config.paddle_width as i32;
        Self {
            x: (config.screen_width as i32 - width) / 2,
            y: config.screen_height as i32 - config.paddle_height as i32,
            width,
            height: config.paddle_height as i32,
            speed: config.paddle_speed,
            screen_width: config.screen_width as i32,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x as f32, self.y as f32, self.width as f32, self.height as f32)
    }

    /// 0 holds, 1 moves left, 2 moves right.
    fn update(&mut self, action: u32) {
        match action {
            1 => {
                self.x -= self.speed;
                if self.x <= 0 {
                    self.x = 1;
                }
            }
            2 => {
                self.x += self.speed;
                let right = self.screen_width - self.width - 1;
                if self.x >= right {
                    self.x = right;
                }
            }
            _ => {}
        }
    }
}

/// Breakout with a low-dimensional observation.
///
/// Action: Discrete(3) {0: hold, 1: left, 2: right}.
/// Observation: `[paddle_x / width, ball_x / width, ball_y / height, direction / 360]`.
/// Reward: 1 for the tick that destroys a block, else 0. At most one block
/// breaks per tick, the first overlapping one in row-major order.
pub struct BreakoutEnv {
    config: BreakoutConfig,
    blocks: Vec<Block>,
    ball: Ball,
    paddle: Paddle,

    steps: u32,
    phase: EpisodePhase,

    action_space: Discrete,
    observation_space: BoxSpace<f32, 4>,
    viewer: ViewerSlot,
}

impl Default for BreakoutEnv { fn default() -> Self { Self::build(BreakoutConfig::default()) } }

impl BreakoutEnv {
    /// Construct with custom geometry; fails with `InvalidArgument` on an unusable config.
    pub fn new(config: BreakoutConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: BreakoutConfig) -> Self {
        // a lost ball may sit up to two ticks below the bottom edge
        let y_high = (config.screen_height as f32 + 2.0 * config.ball_speed) / config.screen_height as f32;
        let viewer = ViewerSlot::new(None, config.screen_width, config.screen_height, "breakout");
        Self {
            blocks: Self::build_blocks(&config),
            ball: Ball::new(&config),
            paddle: Paddle::new(&config),
            steps: 0,
            phase: EpisodePhase::Ready,
            action_space: Discrete::new(3),
            observation_space: BoxSpace::new([0.0; 4], [1.0, 1.0, y_high, 1.0]),
            viewer,
            config,
        }
    }

    /// Attach a viewer factory used by `RenderMode::Human`.
    pub fn with_viewer_factory(mut self, factory: ViewerFactory) -> Self {
        self.viewer.set_factory(factory);
        self
    }

    fn build_blocks(config: &BreakoutConfig) -> Vec<Block> {
        let (bw, bh) = (config.block_width as f32, config.block_height as f32);
        let mut blocks = Vec::with_capacity(BLOCK_ROWS * config.columns as usize);
        for (row, &color) in config.row_colors.iter().enumerate() {
            for column in 0..config.columns {
                let rect = Rect::new(column as f32 * bw, row as f32 * bh + config.top_row_y as f32, bw, bh);
                blocks.push(Block { color, rect, destroyed: false });
            }
        }
        blocks
    }

    fn rebuild(&mut self) {
        self.blocks = Self::build_blocks(&self.config);
        self.ball = Ball::new(&self.config);
        self.paddle = Paddle::new(&self.config);
        self.steps = 0;
    }

    pub fn config(&self) -> &BreakoutConfig { &self.config }
    pub fn observation_space(&self) -> &BoxSpace<f32, 4> { &self.observation_space }
    pub fn phase(&self) -> EpisodePhase { self.phase }
    pub fn blocks(&self) -> &[Block] { &self.blocks }
    pub fn ball(&self) -> &Ball { &self.ball }
    pub fn paddle(&self) -> &Paddle { &self.paddle }

    pub fn blocks_remaining(&self) -> usize { self.blocks.iter().filter(|b| !b.destroyed).count() }

    fn obs(&self) -> [f32; 4] {
        let w = self.config.screen_width as f32;
        let h = self.config.screen_height as f32;
        [
            self.paddle.x as f32 / w,
            self.ball.x / w,
            self.ball.y / h,
            self.ball.direction / 360.0,
        ]
    }

    /// Paddle–ball, then the first overlapping intact block. Returns the tick's reward.
    fn resolve_collisions(&mut self) -> f32 {
        let paddle = self.paddle.rect();
        if paddle.collides_with(&self.ball.rect()) {
            let diff = paddle.center_x() - self.ball.rect().center_x();
            self.ball.y = self.config.screen_height as f32 - paddle.height - self.ball.height - 1.0;
            self.ball.bounce(diff);
        }

        let ball = self.ball.rect();
        if let Some(block) = self.blocks.iter_mut().find(|b| !b.destroyed && b.rect.collides_with(&ball)) {
            block.destroyed = true;
            self.ball.bounce(0.0);
            return 1.0;
        }
        0.0
    }

    /// Draw blocks, ball and paddle on a black background.
    pub fn render_pixels(&self) -> RenderFrame {
        let mut canvas = Canvas::new(self.config.screen_width, self.config.screen_height);
        canvas.clear(BLACK);
        let mut fill = |r: Rect, color: Color| {
            canvas.fill_rect(r.x as i32, r.y as i32, r.width as i32, r.height as i32, color)
        };
        for block in self.blocks.iter().filter(|b| !b.destroyed) {
            fill(block.rect, block.color);
        }
        fill(self.ball.rect(), self.config.ball_color);
        fill(self.paddle.rect(), self.config.paddle_color);
        canvas.into_render_frame()
    }
}

impl Env for BreakoutEnv {
    type Obs = [f32; 4];
    type Act = u32;

    fn action_space(&self) -> &Discrete { &self.action_space }

    /// Breakout is deterministic; seeding only restores the initial layout.
    fn seed(&mut self, seed: u64) {
        debug!("breakout seeded with {}", seed);
        self.rebuild();
        self.phase = EpisodePhase::Ready;
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.rebuild();
        self.phase = EpisodePhase::Running;
        debug!("breakout reset with {} blocks", self.blocks.len());
        Ok(self.obs())
    }

    fn step(&mut self, action: Self::Act) -> Result<Step<Self::Obs>> {
        self.phase.ensure_running("Breakout")?;
        self.action_space.check(action)?;

        self.paddle.update(action);
        let lost = self
            .ball
            .update(self.config.screen_width as f32, self.config.screen_height as f32);
        let reward = self.resolve_collisions();

        self.steps += 1;
        let remaining = self.blocks_remaining();
        let out_of_time = self.config.max_episode_steps.is_some_and(|max| self.steps >= max);
        let done = lost || remaining == 0 || out_of_time;
        self.phase = EpisodePhase::after_step(done);
        trace!(
            "breakout step {}: action={} reward={} remaining={} lost={}",
            self.steps, action, reward, remaining, lost
        );

        let info = Info::new()
            .with("steps", self.steps)
            .with("blocks_remaining", remaining)
            .with("ball_lost", lost);
        Ok(Step::new(self.obs(), reward, done, info))
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
    use crate::core::InfoValue;
    use crate::spaces::Space;
    use crate::utils::render2d::Color;

    fn running() -> BreakoutEnv {
        let mut env = BreakoutEnv::default();
        env.reset().unwrap();
        env
    }

    #[test]
    fn reset_builds_full_grid() {
        let env = running();
        assert_eq!(env.blocks().len(), 6 * 18);
        assert_eq!(env.blocks_remaining(), 6 * 18);
        assert_eq!(env.blocks()[0].rect, Rect::new(0.0, 80.0, 23.0, 15.0));
        assert_eq!(env.blocks()[18].rect.y, 95.0);
        assert_eq!(env.blocks()[18].color, ORANGE_RED);
        assert_eq!(env.paddle().x, (400 - 75) / 2);
    }

    #[test]
    fn column_count_is_configurable() {
        let env = BreakoutEnv::new(BreakoutConfig { columns: 4, ..BreakoutConfig::default() }).unwrap();
        assert_eq!(env.blocks().len(), 24);
    }

    #[test]
    fn unusable_configs_are_rejected() {
        for config in [
            BreakoutConfig { paddle_width: 500, ..BreakoutConfig::default() },
            BreakoutConfig { paddle_width: 399, ..BreakoutConfig::default() },
            BreakoutConfig { screen_height: 0, ..BreakoutConfig::default() },
            BreakoutConfig { min_bounce_angle: 90.0, ..BreakoutConfig::default() },
        ] {
            assert!(matches!(BreakoutEnv::new(config), Err(GymError::InvalidArgument(_))));
        }
        let tight = BreakoutConfig { paddle_width: 398, ..BreakoutConfig::default() };
        let mut env = BreakoutEnv::new(tight).unwrap();
        env.reset().unwrap();
        env.step(1).unwrap();
        assert_eq!(env.paddle().x, 1);
    }

    #[test]
    fn first_tick_reflects_off_left_wall() {
        let mut env = running();
        let s = env.step(0).unwrap();
        assert_eq!(env.ball().x, 1.0);
        assert!((env.ball().direction - 160.0).abs() < 1e-3);
        assert_eq!(s.reward, 0.0);
        assert!(!s.done);
    }

    #[test]
    fn invalid_action_names_the_range() {
        let mut env = running();
        match env.step(3) {
            Err(GymError::InvalidArgument(msg)) => assert!(msg.contains("0 <= action < 3")),
            other => panic!("Expected InvalidArgument, got {:?}", other.map(|s| s.reward)),
        }
    }

    #[test]
    fn paddle_is_clamped_at_both_edges() {
        let mut env = running();
        for _ in 0..100 {
            env.paddle.update(1);
        }
        assert_eq!(env.paddle().x, 1);
        for _ in 0..100 {
            env.paddle.update(2);
        }
        assert_eq!(env.paddle().x, 400 - 75 - 1);
    }

    #[test]
    fn block_hit_rewards_and_destroys_exactly_one() {
        let mut env = running();
        // moving straight up into the bottom row, overlapping two blocks horizontally
        env.ball.x = 10.0;
        env.ball.y = 80.0 + 6.0 * 15.0 + 5.0;
        env.ball.direction = 0.0;
        let s = env.step(0).unwrap();
        assert_eq!(s.reward, 1.0);
        assert_eq!(env.blocks_remaining(), 6 * 18 - 1);
        // the first block in row-major order among the overlapping ones
        let destroyed: Vec<usize> = env.blocks().iter().enumerate().filter(|(_, b)| b.destroyed).map(|(i, _)| i).collect();
        assert_eq!(destroyed, vec![5 * 18]);
        assert!((env.ball().direction - 180.0).abs() < 1e-3);
        assert_eq!(s.info.get("blocks_remaining"), Some(&InfoValue::I64(6 * 18 - 1)));
    }

    #[test]
    fn clearing_the_last_block_ends_the_episode_that_tick() {
        let mut env = running();
        for b in env.blocks.iter_mut().skip(1) {
            b.destroyed = true;
        }
        env.ball.x = 5.0;
        env.ball.y = 80.0 + 20.0;
        env.ball.direction = 0.0;
        let s = env.step(0).unwrap();
        assert_eq!(s.reward, 1.0);
        assert!(s.done);
        assert_eq!(env.blocks_remaining(), 0);
        assert_eq!(env.phase(), EpisodePhase::Terminal);
    }

    #[test]
    fn ball_below_bottom_ends_the_episode_even_moving_up() {
        let mut env = running();
        env.ball.y = 601.0;
        env.ball.x = 5.0;
        env.ball.direction = 0.0;
        let s = env.step(0).unwrap();
        assert!(s.done);
        assert!(env.blocks_remaining() > 0);
        assert!(matches!(env.step(0), Err(GymError::InvalidState(_))));
    }

    #[test]
    fn paddle_returns_the_ball_upwards() {
        let mut env = running();
        let paddle_x = env.paddle().x as f32;
        env.ball.x = paddle_x + 40.0;
        env.ball.y = 600.0 - 15.0 - 15.0 - 5.0;
        env.ball.direction = 180.0;
        let s = env.step(0).unwrap();
        assert!(!s.done);
        assert_eq!(env.ball().y, 600.0 - 15.0 - 15.0 - 1.0);
        let d = env.ball().direction;
        assert!(d < 90.0 || d > 270.0, "ball should travel upwards, got {d}");
    }

    #[test]
    fn bounce_angle_guard_avoids_horizontal_travel() {
        let mut env = running();
        env.ball.direction = 180.0;
        env.ball.bounce(-88.0);
        let d = env.ball().direction;
        assert!((d - 90.0).abs() >= 15.0 - 1e-3 && (d - 270.0).abs() >= 15.0 - 1e-3, "got {d}");
        env.ball.direction = 180.0;
        env.ball.bounce(89.0);
        let d = env.ball().direction;
        assert!((d - 270.0).abs() >= 15.0 - 1e-3, "got {d}");
    }

    #[test]
    fn observation_is_normalized() {
        let mut env = running();
        for i in 0..200 {
            match env.step(i % 3) {
                Ok(s) => {
                    assert!(env.observation_space().contains(&s.observation), "{:?}", s.observation);
                    if s.done { break; }
                }
                Err(e) => panic!("{e}"),
            }
        }
    }

    #[test]
    fn rendering_uses_configured_colors() {
        let config = BreakoutConfig { row_colors: [Color(1, 2, 3, 255); 6], ..BreakoutConfig::default() };
        let mut env = BreakoutEnv::new(config).unwrap();
        env.reset().unwrap();
        match env.render(RenderMode::RgbArray).unwrap() {
            RenderFrame::Pixels { width, height, data } => {
                assert_eq!((width, height), (400, 600));
                let idx = ((81 * width + 200) * 4) as usize;
                assert_eq!(&data[idx..idx + 4], &[1, 2, 3, 255]);
            }
            other => panic!("Expected pixels, got {:?}", other),
        }
        assert!(matches!(env.render(RenderMode::Human), Err(GymError::MissingConfiguration(_))));
    }

    #[test]
    fn seed_restores_initial_layout() {
        let mut env = running();
        for _ in 0..20 {
            if env.step(2).unwrap().done { break; }
        }
        env.seed(0);
        assert_eq!(env.phase(), EpisodePhase::Ready);
        let fresh = BreakoutEnv::default();
        assert_eq!(env.ball(), fresh.ball());
        assert_eq!(env.paddle(), fresh.paddle());
        assert_eq!(env.blocks(), fresh.blocks());
    }
}
