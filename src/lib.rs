pub mod core;
pub mod spaces;
pub mod utils;
pub mod viewer;
pub mod envs;
pub mod replay;
pub mod registry;

pub use crate::core::{Env, EpisodePhase, GymError, Info, InfoValue, RenderFrame, RenderMode, Result, Step};
pub use crate::spaces::{BoxSpace, Discrete, Space};
pub use crate::envs::{BreakoutConfig, BreakoutEnv, CartPoleConfig, CartPoleEnv, PendulumConfig, PendulumEnv};
pub use crate::viewer::{NullViewer, Viewer, ViewerFactory, ViewerSlot};
#[cfg(feature = "image")]
pub use crate::viewer::PngSequenceViewer;
pub use crate::replay::{Episode, Frame, FrameShape, ImageFrame, Observation, ReplayMemory, ReplayMemoryConfig, load_episodes};
pub use crate::registry::{BoxedEnv, EnvSpec, MakeArgs, make, make_with, register};
pub use crate::utils::{encode_png, save_png};
