use gym_replay::{BreakoutEnv, Env, GymError, ImageFrame, RenderFrame, RenderMode, ReplayMemory, Result};
use minifb::{Key, Window, WindowOptions};
use rand::Rng;

fn rgba_to_u32(a: u8, r: u8, g: u8, b: u8) -> u32 {
    // Minifb expects ARGB on most platforms; construct accordingly.
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// Copy an RGBA frame into `window`.
fn present(window: &mut Window, buffer: &mut [u32], frame: &RenderFrame) -> Result<()> {
    if let RenderFrame::Pixels { width, height, data } = frame {
        // Convert RGBA bytes to ARGB u32s for minifb
        for (dst, px) in buffer.iter_mut().zip(data.chunks_exact(4)) {
            *dst = rgba_to_u32(px[3], px[0], px[1], px[2]);
        }
        window
            .update_with_buffer(buffer, *width as usize, *height as usize)
            .map_err(|e| GymError::NotSupported(format!("window update failed: {e}")))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut env = BreakoutEnv::default();
    let (w, h) = (env.config().screen_width as usize, env.config().screen_height as usize);
    let mut window = Window::new("gym-replay: breakout", w, h, WindowOptions::default())
        .map_err(|e| GymError::NotSupported(format!("unable to open window: {e}")))?;
    let mut buffer: Vec<u32> = vec![0; w * h];

    let mut memory = ReplayMemory::<ImageFrame>::new(2, w, h)?.with_episode_capacity(5)?;
    let mut rng = rand::thread_rng();

    'episodes: for _ in 0..5 {
        env.reset()?;
        loop {
            if !window.is_open() || window.is_key_down(Key::Escape) {
                break 'episodes;
            }
            let frame = env.render(RenderMode::RgbArray)?;
            present(&mut window, &mut buffer, &frame)?;

            let action = rng.gen_range(0..3);
            let step = env.step(action)?;
            memory.memorize(ImageFrame::try_from(frame)?, action, step.reward)?;
            if step.done {
                break;
            }
        }
        memory.end_episode();
    }
    memory.end_episode();
    env.close();

    let written = memory.save("breakout_episodes.json", Some(2))?;
    println!("saved {written} episodes");
    Ok(())
}
