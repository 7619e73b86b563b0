use gym_replay::{
    load_episodes, BreakoutEnv, Env, Episode, ImageFrame, PendulumEnv, RenderMode, ReplayMemory,
};
use tempdir::TempDir;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Drive an environment with a fixed action pattern, feeding every observation into memory.
fn run_pendulum_episodes(memory: &mut ReplayMemory<Vec<f32>>, episodes: usize) {
    let mut env = PendulumEnv::new(17);
    for _ in 0..episodes {
        let mut obs = env.reset().unwrap();
        let mut t = 0u32;
        loop {
            let action = t % 2;
            let step = env.step(action).unwrap();
            memory.memorize(obs.to_vec(), action, step.reward).unwrap();
            obs = step.observation;
            t += 1;
            if step.done { break; }
        }
        memory.end_episode();
    }
}

#[test]
fn pendulum_episodes_round_trip_through_a_file() -> anyhow::Result<()> {
    init();
    let dir = TempDir::new("replay_roundtrip")?;
    let path = dir.path().join("episodes.json");

    let mut memory = ReplayMemory::<Vec<f32>>::for_parameters(2, 3)?;
    run_pendulum_episodes(&mut memory, 3);
    assert_eq!(memory.episodes().len(), 3);
    assert_eq!(memory.save(&path, None)?, 3);

    let loaded: Vec<Episode<Vec<f32>>> = load_episodes(&path)?;
    assert_eq!(loaded.as_slice(), memory.episodes());
    for episode in &loaded {
        for (i, obs) in episode.observations().iter().enumerate() {
            assert_eq!(obs.id(), i as u64);
            assert_eq!(obs.frame_stack().len(), 2);
        }
    }
    Ok(())
}

#[test]
fn saving_top_episodes_ranks_by_total_reward() -> anyhow::Result<()> {
    let dir = TempDir::new("replay_top")?;
    let path = dir.path().join("best.json");

    let mut memory = ReplayMemory::<Vec<f32>>::for_parameters(1, 1)?;
    for rewards in [[5.0f32, 0.0], [7.0, 3.0], [1.0, 2.0]] {
        for r in rewards {
            memory.memorize(vec![r], 0, r)?;
        }
        memory.end_episode();
    }
    assert_eq!(memory.save(&path, Some(2))?, 2);

    let loaded: Vec<Episode<Vec<f32>>> = load_episodes(&path)?;
    let totals: Vec<f32> = loaded.iter().map(|e| e.total_reward()).collect::<Result<_, _>>()?;
    assert_eq!(totals, vec![10.0, 5.0]);
    Ok(())
}

#[test]
fn rendered_breakout_frames_are_stacked() -> anyhow::Result<()> {
    let mut env = BreakoutEnv::default();
    let (w, h) = (env.config().screen_width, env.config().screen_height);
    let mut memory = ReplayMemory::<ImageFrame>::new(2, w as usize, h as usize)?;

    env.reset()?;
    for _ in 0..3 {
        let frame = ImageFrame::try_from(env.render(RenderMode::RgbArray)?)?;
        let step = env.step(0)?;
        memory.memorize(frame, 0, step.reward)?;
    }
    assert_eq!(memory.pending().len(), 2);
    let current = memory.current().expect("window is full");
    assert_eq!(current.len(), 2);
    assert_ne!(current[0], current[1]);
    Ok(())
}

#[test]
fn image_episodes_round_trip_through_a_file() -> anyhow::Result<()> {
    init();
    let dir = TempDir::new("replay_images")?;
    let path = dir.path().join("frames.json");

    let mut env = BreakoutEnv::default();
    let (w, h) = (env.config().screen_width, env.config().screen_height);
    let mut memory = ReplayMemory::<ImageFrame>::new(2, w as usize, h as usize)?;
    for _ in 0..2 {
        env.reset()?;
        for action in [2, 2, 1] {
            let frame = ImageFrame::try_from(env.render(RenderMode::RgbArray)?)?;
            let step = env.step(action)?;
            memory.memorize(frame, action, step.reward)?;
        }
        memory.end_episode();
    }
    assert_eq!(memory.save(&path, None)?, 2);

    let loaded: Vec<Episode<ImageFrame>> = load_episodes(&path)?;
    assert_eq!(loaded.as_slice(), memory.episodes());
    let first = &loaded[0].observations()[0];
    assert_eq!(first.action_taken(), 2);
    assert_eq!(first.frame_stack()[0].width, w);
    assert_eq!(first.frame_stack()[0].data.len(), (w * h * 4) as usize);
    Ok(())
}
