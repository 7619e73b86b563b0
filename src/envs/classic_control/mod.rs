pub mod cart_pole;
pub mod pendulum;

pub use cart_pole::{CartPoleConfig, CartPoleEnv};
pub use pendulum::{PendulumConfig, PendulumEnv};
