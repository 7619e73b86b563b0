pub mod breakout;

pub use breakout::{BreakoutConfig, BreakoutEnv};
