pub mod atari;
pub mod classic_control;

pub use atari::{BreakoutConfig, BreakoutEnv};
pub use classic_control::{CartPoleConfig, CartPoleEnv, PendulumConfig, PendulumEnv};
