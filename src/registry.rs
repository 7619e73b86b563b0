//! Registration and specs.
//! Construct environments by id behind one boxed interface with `Vec<f32>` observations.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::{Env, GymError, RenderFrame, RenderMode, Result, Step};
use crate::envs::{BreakoutEnv, CartPoleEnv, PendulumEnv};
use crate::spaces::Discrete;
use crate::viewer::ViewerFactory;

/// Environment specification metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvSpec {
    /// Unique identifier like "CartPole-v1".
    pub id: String,
    /// Longest possible episode, counted in `step` calls up to and including
    /// the one that returns `done` because the budget ran out.
    pub max_episode_steps: Option<u32>,
    /// Target reward threshold for a "solved" score, if defined.
    pub reward_threshold: Option<f32>,
    /// Whether environment has inherent nondeterminism beyond RNG seed.
    pub nondeterministic: bool,
}

impl EnvSpec {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            max_episode_steps: None,
            reward_threshold: None,
            nondeterministic: false,
        }
    }
}

/// Arguments handed to a factory by [`make`].
#[derive(Clone, Default)]
pub struct MakeArgs {
    pub seed: u64,
    pub viewer: Option<ViewerFactory>,
}

impl MakeArgs {
    pub fn seeded(seed: u64) -> Self { Self { seed, viewer: None } }

    pub fn with_viewer(mut self, viewer: ViewerFactory) -> Self {
        self.viewer = Some(viewer);
        self
    }
}

/// A type-erased environment with flat observations.
pub type BoxedEnv = Box<dyn Env<Obs = Vec<f32>, Act = u32> + Send + Sync>;

/// Adapts any env with array observations into a `Vec<f32>` one.
pub struct FlatObs<E>(pub E);

impl<E> Env for FlatObs<E>
where
    E: Env<Act = u32>,
    E::Obs: Into<Vec<f32>>,
{
    type Obs = Vec<f32>;
    type Act = u32;

    fn action_space(&self) -> &Discrete { self.0.action_space() }
    fn seed(&mut self, seed: u64) { self.0.seed(seed) }
    fn reset(&mut self) -> Result<Self::Obs> { self.0.reset().map(Into::into) }

    fn step(&mut self, action: Self::Act) -> Result<Step<Self::Obs>> {
        self.0.step(action).map(|s| s.map_observation(Into::into))
    }

    fn render(&self, mode: RenderMode) -> Result<RenderFrame> { self.0.render(mode) }
    fn close(&mut self) { self.0.close() }
}

/// Factory closure type for constructing environments.
pub type FactoryFn = Box<dyn Fn(MakeArgs) -> BoxedEnv + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    specs: HashMap<String, EnvSpec>,
    factories: HashMap<String, FactoryFn>,
}

struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    fn with_builtins() -> Self {
        let registry = Self { inner: RwLock::new(RegistryInner::default()) };
        let builtins: [(EnvSpec, FactoryFn); 3] = [
            (
                EnvSpec { max_episode_steps: Some(101), ..EnvSpec::new("Pendulum-v0") },
                factory_of(|args: MakeArgs| {
                    let env = PendulumEnv::new(args.seed);
                    match args.viewer {
                        Some(v) => env.with_viewer_factory(v),
                        None => env,
                    }
                }),
            ),
            (
                EnvSpec { max_episode_steps: Some(500), reward_threshold: Some(475.0), ..EnvSpec::new("CartPole-v1") },
                factory_of(|args: MakeArgs| {
                    let env = CartPoleEnv::new(args.seed);
                    match args.viewer {
                        Some(v) => env.with_viewer_factory(v),
                        None => env,
                    }
                }),
            ),
            (
                EnvSpec { max_episode_steps: Some(10_000), reward_threshold: Some(108.0), ..EnvSpec::new("Breakout-v0") },
                factory_of(|args: MakeArgs| {
                    let env = BreakoutEnv::default();
                    match args.viewer {
                        Some(v) => env.with_viewer_factory(v),
                        None => env,
                    }
                }),
            ),
        ];
        if let Ok(mut g) = registry.inner.write() {
            for (spec, factory) in builtins {
                g.factories.insert(spec.id.clone(), factory);
                g.specs.insert(spec.id.clone(), spec);
            }
        }
        registry
    }

    fn register(&self, spec: EnvSpec, factory: FactoryFn) -> Result<()> {
        let mut g = self.inner.write().map_err(|_| GymError::InvalidState("registry poisoned".into()))?;
        if g.specs.contains_key(&spec.id) {
            return Err(GymError::InvalidArgument(format!("Env id already registered: {}", spec.id)));
        }
        debug!("registering environment {}", spec.id);
        g.factories.insert(spec.id.clone(), factory);
        g.specs.insert(spec.id.clone(), spec);
        Ok(())
    }

    fn get_spec(&self, id: &str) -> Option<EnvSpec> {
        let g = self.inner.read().ok()?;
        g.specs.get(id).cloned()
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.inner.read() {
            Ok(g) => g.specs.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        ids.sort();
        ids
    }

    fn make(&self, id: &str, args: MakeArgs) -> Result<BoxedEnv> {
        let guard = self.inner.read().map_err(|_| GymError::InvalidState("registry poisoned".into()))?;
        match guard.factories.get(id) {
            Some(f) => Ok((f)(args)),
            None => Err(GymError::InvalidArgument(format!("Unknown environment id: {}", id))),
        }
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::with_builtins)
}

/// Register an environment spec and its factory globally.
pub fn register(spec: EnvSpec, factory: FactoryFn) -> Result<()> { registry().register(spec, factory) }

/// Fetch a registered EnvSpec by id.
pub fn get_spec(id: &str) -> Option<EnvSpec> { registry().get_spec(id) }

/// All registered ids, sorted.
pub fn registered_ids() -> Vec<String> { registry().ids() }

/// Construct an environment by id with default arguments.
pub fn make<S: AsRef<str>>(id: S) -> Result<BoxedEnv> { registry().make(id.as_ref(), MakeArgs::default()) }

/// Construct an environment by id with explicit seed and viewer.
pub fn make_with<S: AsRef<str>>(id: S, args: MakeArgs) -> Result<BoxedEnv> { registry().make(id.as_ref(), args) }

/// Adapt a constructor of a concrete Env into a factory function.
pub fn factory_of<E, F>(ctor: F) -> FactoryFn
where
    E: Env<Act = u32> + Send + Sync + 'static,
    E::Obs: Into<Vec<f32>>,
    F: Fn(MakeArgs) -> E + Send + Sync + 'static,
{
    Box::new(move |args: MakeArgs| Box::new(FlatObs(ctor(args))) as BoxedEnv)
}
