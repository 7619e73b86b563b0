// Core traits and types shared by every environment.

use crate::spaces::Discrete;

/// A small ordered key-value map returned alongside each step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Info {
    entries: Vec<(String, InfoValue)>,
}

impl Info {
    /// Create an empty Info map.
    pub fn new() -> Self { Self { entries: Vec::new() } }

    /// Insert or replace a key with the given value.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: InfoValue) {
        let k = key.into();
        if let Some((_, v)) = self.entries.iter_mut().find(|(kk, _)| kk == &k) {
            *v = value;
        } else {
            self.entries.push((k, value));
        }
    }

    /// Builder-style insert.
    pub fn with<K: Into<String>, V: Into<InfoValue>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn len(&self) -> usize { self.entries.len() }
}

/// Value types allowed in an [`Info`] map.
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

impl From<bool> for InfoValue { fn from(v: bool) -> Self { InfoValue::Bool(v) } }
impl From<i64> for InfoValue { fn from(v: i64) -> Self { InfoValue::I64(v) } }
impl From<i32> for InfoValue { fn from(v: i32) -> Self { InfoValue::I64(v as i64) } }
impl From<u32> for InfoValue { fn from(v: u32) -> Self { InfoValue::I64(v as i64) } }
impl From<usize> for InfoValue { fn from(v: usize) -> Self { InfoValue::I64(v as i64) } }
impl From<f64> for InfoValue { fn from(v: f64) -> Self { InfoValue::F64(v) } }
impl From<f32> for InfoValue { fn from(v: f32) -> Self { InfoValue::F64(v as f64) } }
impl From<&str> for InfoValue { fn from(v: &str) -> Self { InfoValue::Str(v.to_string()) } }
impl From<String> for InfoValue { fn from(v: String) -> Self { InfoValue::Str(v) } }

/// A frame produced by `Env::render`.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderFrame {
    /// Textual representation of a frame (e.g., ASCII art or debug string).
    Text(String),
    /// Raw pixel buffer in row-major RGBA format.
    Pixels {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

impl RenderFrame {
    /// Frame dimensions; text frames have none.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            RenderFrame::Pixels { width, height, .. } => Some((*width, *height)),
            RenderFrame::Text(_) => None,
        }
    }
}

/// How `Env::render` should deliver the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Forward the frame to the environment's viewer (constructed on first use).
    #[default]
    Human,
    /// Only return the frame; the viewer is never touched.
    RgbArray,
}

/// A step result from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Step<Obs> {
    pub observation: Obs,
    pub reward: f32,
    pub done: bool,
    pub info: Info,
}

impl<Obs> Step<Obs> {
    pub fn new(observation: Obs, reward: f32, done: bool, info: Info) -> Self {
        Self { observation, reward, done, info }
    }

    /// Map the observation, keeping reward, done flag and info.
    pub fn map_observation<O2>(self, f: impl FnOnce(Obs) -> O2) -> Step<O2> {
        Step::new(f(self.observation), self.reward, self.done, self.info)
    }
}

/// Lifecycle of an environment instance between `seed`, `reset` and `step`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EpisodePhase {
    /// Constructed or re-seeded; `reset` has not been called yet.
    #[default]
    Ready,
    /// An episode is in progress.
    Running,
    /// The last step returned `done = true`.
    Terminal,
}

impl EpisodePhase {
    /// Fails unless an episode is in progress.
    pub fn ensure_running(self, env_name: &str) -> Result<()> {
        match self {
            EpisodePhase::Running => Ok(()),
            EpisodePhase::Ready => Err(GymError::InvalidState(format!(
                "{env_name}: step called before reset"
            ))),
            EpisodePhase::Terminal => Err(GymError::InvalidState(format!(
                "{env_name}: step called after the episode finished; call reset first"
            ))),
        }
    }

    /// Phase that follows a step with the given done flag.
    pub fn after_step(done: bool) -> Self {
        if done { EpisodePhase::Terminal } else { EpisodePhase::Running }
    }
}

/// Errors across the environment and replay APIs.
#[derive(thiserror::Error, Debug)]
pub enum GymError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),
    #[error("Operation not supported: {0}")]
    NotSupported(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for results using GymError.
pub type Result<T> = std::result::Result<T, GymError>;

/// Uniform contract implemented by every simulator.
///
/// Lifecycle: `seed` (or construction) leaves the environment `Ready`,
/// `reset` starts an episode, and `step` advances it until a step reports
/// `done`. `render` and `close` are valid in every phase and never change it.
pub trait Env {
    type Obs;
    type Act;

    /// The legal action domain.
    fn action_space(&self) -> &Discrete;

    /// Re-initialize RNG and simulation state deterministically from `seed`.
    /// Equivalent to constructing a fresh instance with that seed.
    fn seed(&mut self, seed: u64);

    /// Start a new episode and return its first observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Advance the simulation by one tick.
    fn step(&mut self, action: Self::Act) -> Result<Step<Self::Obs>>;

    /// Produce a frame of the current state without mutating it.
    fn render(&self, mode: RenderMode) -> Result<RenderFrame>;

    /// Release the viewer, if one was created. Safe to call repeatedly.
    fn close(&mut self) {}
}
