//! Frame-stacking replay memory.
//!
//! Raw per-tick frames enter a fixed-size window. Once the window holds
//! `stage_frames` frames, every further tick emits an [`Observation`] whose
//! `frame_stack` is a copy of the window. Ticks are grouped into
//! [`Episode`]s by [`ReplayMemory::end_episode`], and completed episodes can
//! be persisted as JSON, optionally keeping only the highest-reward ones.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{GymError, RenderFrame, Result};

/// Width x height of a frame. Parameter vectors are `len x 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    pub width: usize,
    pub height: usize,
}

impl FrameShape {
    pub fn new(width: usize, height: usize) -> Self { Self { width, height } }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A raw per-tick frame that can be stacked and persisted.
pub trait Frame: Clone + Serialize + DeserializeOwned {
    fn shape(&self) -> FrameShape;
}

impl Frame for Vec<f32> {
    fn shape(&self) -> FrameShape { FrameShape::new(self.len(), 1) }
}

/// RGBA image frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(GymError::ShapeMismatch {
                expected: format!("{expected} RGBA bytes ({width}x{height})"),
                actual: format!("{} bytes", data.len()),
            });
        }
        Ok(Self { width, height, data })
    }
}

impl Frame for ImageFrame {
    fn shape(&self) -> FrameShape { FrameShape::new(self.width as usize, self.height as usize) }
}

impl TryFrom<RenderFrame> for ImageFrame {
    type Error = GymError;

    fn try_from(frame: RenderFrame) -> Result<Self> {
        match frame {
            RenderFrame::Pixels { width, height, data } => ImageFrame::new(width, height, data),
            RenderFrame::Text(_) => Err(GymError::NotSupported("text frames cannot be memorized as images".into())),
        }
    }
}

/// One stacked training sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation<F> {
    id: u64,
    action_taken: u32,
    reward: f32,
    #[serde(rename = "images")]
    frame_stack: Vec<F>,
}

impl<F> Observation<F> {
    pub fn id(&self) -> u64 { self.id }
    pub fn action_taken(&self) -> u32 { self.action_taken }
    pub fn reward(&self) -> f32 { self.reward }
    pub fn frame_stack(&self) -> &[F] { &self.frame_stack }
}

/// Observations of one run from reset to a terminal step, in temporal order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Episode<F> {
    observations: Vec<Observation<F>>,
}

impl<F> Episode<F> {
    pub fn observations(&self) -> &[Observation<F>] { &self.observations }

    pub fn len(&self) -> usize { self.observations.len() }

    pub fn is_empty(&self) -> bool { self.observations.is_empty() }

    /// Sum of rewards. Fails on an episode without observations.
    pub fn total_reward(&self) -> Result<f32> {
        if self.observations.is_empty() {
            return Err(GymError::InvalidState("no observations set for this episode".into()));
        }
        Ok(self.reward_sum())
    }

    fn reward_sum(&self) -> f32 { self.observations.iter().map(|o| o.reward).sum() }
}

/// Construction parameters for a [`ReplayMemory`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayMemoryConfig {
    /// Frames per stacked observation.
    pub stage_frames: usize,
    pub width: usize,
    pub height: usize,
    /// Keep at most this many completed episodes, evicting the lowest reward first.
    pub episode_capacity: Option<usize>,
}

impl Default for ReplayMemoryConfig {
    fn default() -> Self {
        Self { stage_frames: 2, width: 400, height: 600, episode_capacity: None }
    }
}

/// Frame-stacking recorder for a single training loop.
pub struct ReplayMemory<F: Frame> {
    stage_frames: usize,
    shape: FrameShape,
    window: VecDeque<F>,
    current: Vec<Observation<F>>,
    next_id: u64,
    episodes: Vec<Episode<F>>,
    episode_capacity: Option<usize>,
}

impl<F: Frame> ReplayMemory<F> {
    pub fn new(stage_frames: usize, width: usize, height: usize) -> Result<Self> {
        if stage_frames == 0 {
            return Err(GymError::InvalidArgument("stage_frames must be at least 1".into()));
        }
        if width == 0 || height == 0 {
            return Err(GymError::InvalidArgument(format!(
                "frame dimensions must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self {
            stage_frames,
            shape: FrameShape::new(width, height),
            window: VecDeque::with_capacity(stage_frames + 1),
            current: Vec::new(),
            next_id: 0,
            episodes: Vec::new(),
            episode_capacity: None,
        })
    }

    pub fn from_config(config: &ReplayMemoryConfig) -> Result<Self> {
        let memory = Self::new(config.stage_frames, config.width, config.height)?;
        match config.episode_capacity {
            Some(cap) => memory.with_episode_capacity(cap),
            None => Ok(memory),
        }
    }

    /// Bound the number of completed episodes kept in memory.
    pub fn with_episode_capacity(mut self, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(GymError::InvalidArgument("episode capacity must be at least 1".into()));
        }
        self.episode_capacity = Some(capacity);
        Ok(self)
    }

    pub fn stage_frames(&self) -> usize { self.stage_frames }
    pub fn frame_shape(&self) -> FrameShape { self.shape }
    pub fn episodes(&self) -> &[Episode<F>] { &self.episodes }

    /// Observations recorded since the last `end_episode`.
    pub fn pending(&self) -> &[Observation<F>] { &self.current }

    /// Push one tick. Emits an observation once the window is full.
    pub fn memorize(&mut self, frame: F, action: u32, reward: f32) -> Result<()> {
        let actual = frame.shape();
        if actual != self.shape {
            return Err(GymError::ShapeMismatch {
                expected: self.shape.to_string(),
                actual: actual.to_string(),
            });
        }

        self.window.push_back(frame);
        if self.window.len() > self.stage_frames {
            self.window.pop_front();
        }
        if self.window.len() < self.stage_frames {
            return Ok(());
        }

        self.current.push(Observation {
            id: self.next_id,
            action_taken: action,
            reward,
            frame_stack: self.window.iter().cloned().collect(),
        });
        self.next_id += 1;
        Ok(())
    }

    /// The latest frame stack of the current episode, if any was emitted.
    pub fn current(&self) -> Option<&[F]> {
        self.current.last().map(|o| o.frame_stack())
    }

    /// Close the current episode and start the next with an empty window.
    pub fn end_episode(&mut self) {
        self.window.clear();
        self.next_id = 0;
        let observations = std::mem::take(&mut self.current);
        if observations.is_empty() {
            debug!("episode ended before the window filled; nothing recorded");
            return;
        }

        let episode = Episode { observations };
        debug!(
            "episode {} recorded: {} observations, total reward {}",
            self.episodes.len(),
            episode.len(),
            episode.reward_sum()
        );
        self.episodes.push(episode);
        self.evict_over_capacity();
    }

    fn evict_over_capacity(&mut self) {
        let Some(cap) = self.episode_capacity else { return };
        while self.episodes.len() > cap {
            let worst = self
                .episodes
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.reward_sum().total_cmp(&b.reward_sum()))
                .map(|(i, _)| i);
            match worst {
                Some(i) => {
                    let evicted = self.episodes.remove(i);
                    debug!("evicted episode with total reward {}", evicted.reward_sum());
                }
                None => break,
            }
        }
    }

    /// Episodes to persist: all in recording order, or the `max_items` best by total reward.
    fn select(&self, max_items: Option<usize>) -> Result<Vec<&Episode<F>>> {
        let Some(max_items) = max_items else {
            return Ok(self.episodes.iter().collect());
        };
        let mut ranked = self
            .episodes
            .iter()
            .map(|e| Ok((e.total_reward()?, e)))
            .collect::<Result<Vec<_>>>()?;
        // stable sort keeps recording order among equal rewards
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(ranked.into_iter().take(max_items).map(|(_, e)| e).collect())
    }

    pub fn save_to_writer<W: Write>(&self, writer: W, max_items: Option<usize>) -> Result<usize> {
        let selected = self.select(max_items)?;
        serde_json::to_writer(writer, &selected)?;
        Ok(selected.len())
    }

    /// Write episodes as JSON. Returns how many were written.
    pub fn save<P: AsRef<Path>>(&self, path: P, max_items: Option<usize>) -> Result<usize> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.save_to_writer(&mut writer, max_items)?;
        writer.flush()?;
        info!("saved {} of {} episodes to {}", written, self.episodes.len(), path.display());
        Ok(written)
    }
}

impl ReplayMemory<Vec<f32>> {
    /// Memory for flat parameter observations of length `len`.
    pub fn for_parameters(stage_frames: usize, len: usize) -> Result<Self> {
        Self::new(stage_frames, len, 1)
    }
}

/// Read episodes written by [`ReplayMemory::save`].
pub fn load_episodes<F: Frame, P: AsRef<Path>>(path: P) -> Result<Vec<Episode<F>>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let episodes: Vec<Episode<F>> = serde_json::from_reader(reader)?;
    info!("loaded {} episodes from {}", episodes.len(), path.display());
    Ok(episodes)
}
