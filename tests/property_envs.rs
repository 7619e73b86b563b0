use gym_replay::{BreakoutEnv, Discrete, Env, PendulumEnv, Space};
use proptest::prelude::*;

proptest! {
    // Identically seeded pendulums replay identical trajectories bit for bit
    #[test]
    fn pendulum_is_deterministic(seed in any::<u64>(), actions in proptest::collection::vec(0u32..2, 1..150)) {
        let mut a = PendulumEnv::new(seed);
        let mut b = PendulumEnv::new(seed);
        prop_assert_eq!(a.reset().unwrap(), b.reset().unwrap());
        for &action in &actions {
            let sa = a.step(action).unwrap();
            let sb = b.step(action).unwrap();
            prop_assert_eq!(sa.observation.map(f32::to_bits), sb.observation.map(f32::to_bits));
            prop_assert_eq!(sa.reward.to_bits(), sb.reward.to_bits());
            prop_assert_eq!(sa.done, sb.done);
            if sa.done { break; }
        }
    }

    // Re-seeding a used instance matches a fresh one
    #[test]
    fn pendulum_seed_reinitializes(first in any::<u64>(), second in any::<u64>()) {
        let mut used = PendulumEnv::new(first);
        used.reset().unwrap();
        used.step(1).unwrap();
        used.seed(second);
        let mut fresh = PendulumEnv::new(second);
        prop_assert_eq!(used.reset().unwrap(), fresh.reset().unwrap());
        prop_assert_eq!(used.step(0).unwrap(), fresh.step(0).unwrap());
    }

    // The cost is a sum of squares, so the reward never exceeds zero
    #[test]
    fn pendulum_reward_is_non_positive(seed in any::<u64>(), actions in proptest::collection::vec(0u32..2, 1..200)) {
        let mut env = PendulumEnv::new(seed);
        env.reset().unwrap();
        for &action in &actions {
            let s = env.step(action).unwrap();
            prop_assert!(s.reward <= 0.0);
            prop_assert!(s.observation[2].abs() <= env.config().max_speed);
            if s.done { break; }
        }
    }

    // The paddle never leaves the screen whatever the inputs
    #[test]
    fn breakout_paddle_stays_on_screen(actions in proptest::collection::vec(0u32..3, 1..400)) {
        let mut env = BreakoutEnv::default();
        env.reset().unwrap();
        let max_x = (env.config().screen_width - env.config().paddle_width) as i32;
        for &action in &actions {
            let s = env.step(action).unwrap();
            prop_assert!(env.paddle().x >= 0 && env.paddle().x <= max_x);
            if s.done { break; }
        }
    }

    // Out-of-range actions are rejected, never clamped
    #[test]
    fn out_of_range_actions_fail(action in 3u32..1000) {
        let mut env = BreakoutEnv::default();
        env.reset().unwrap();
        let before = env.paddle().x;
        prop_assert!(env.step(action).is_err());
        prop_assert_eq!(env.paddle().x, before);
        prop_assert!(!Discrete::new(3).contains(&action));
    }
}

#[test]
fn breakout_rewards_sum_to_destroyed_blocks() {
    let mut env = BreakoutEnv::default();
    env.reset().unwrap();
    let total = env.blocks().len();
    let mut rewards = 0.0;
    for _ in 0..5_000 {
        // track the ball with the paddle
        let paddle_center = env.paddle().rect().center_x();
        let ball_center = env.ball().rect().center_x();
        let action = if ball_center < paddle_center - 5.0 { 1 } else if ball_center > paddle_center + 5.0 { 2 } else { 0 };
        let s = env.step(action).unwrap();
        rewards += s.reward;
        if s.done { break; }
    }
    let destroyed = total - env.blocks_remaining();
    assert_eq!(rewards as usize, destroyed);
}
