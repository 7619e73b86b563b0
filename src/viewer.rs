//! Rendering sinks for environment frames.
//!
//! Environments never draw to a screen themselves. They hand finished
//! [`RenderFrame`]s to a [`Viewer`], which each environment builds lazily
//! through a [`ViewerSlot`] the first time a `Human` render is requested.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::core::{GymError, RenderFrame, Result};

/// A sink that displays (or otherwise consumes) rendered frames.
///
/// Dropping a viewer disposes of it.
pub trait Viewer: Send {
    fn render(&mut self, frame: &RenderFrame) -> Result<()>;

    fn close(&mut self) {}
}

/// Builds a viewer for a `(width, height, title)` window.
pub type ViewerFactory = Arc<dyn Fn(u32, u32, &str) -> Result<Box<dyn Viewer>> + Send + Sync>;

/// Discards every frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullViewer;

impl NullViewer {
    pub fn factory() -> ViewerFactory {
        Arc::new(|_: u32, _: u32, _: &str| -> Result<Box<dyn Viewer>> { Ok(Box::new(NullViewer)) })
    }
}

impl Viewer for NullViewer {
    fn render(&mut self, _frame: &RenderFrame) -> Result<()> { Ok(()) }
}

/// Writes each frame as `frame_000000.png`, `frame_000001.png`, ... into a directory.
#[cfg(feature = "image")]
pub struct PngSequenceViewer {
    dir: std::path::PathBuf,
    next: u64,
}

#[cfg(feature = "image")]
impl PngSequenceViewer {
    pub fn new<P: Into<std::path::PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, next: 0 })
    }

    /// A factory writing every viewer's frames into `dir`.
    pub fn factory<P: Into<std::path::PathBuf>>(dir: P) -> ViewerFactory {
        let dir = dir.into();
        Arc::new(move |_: u32, _: u32, _: &str| -> Result<Box<dyn Viewer>> {
            Ok(Box::new(PngSequenceViewer::new(dir.clone())?))
        })
    }

    /// Number of frames written so far.
    pub fn written(&self) -> u64 { self.next }
}

#[cfg(feature = "image")]
impl Viewer for PngSequenceViewer {
    fn render(&mut self, frame: &RenderFrame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.next));
        crate::utils::save_png(path, frame)?;
        self.next += 1;
        Ok(())
    }
}

/// Holds at most one viewer per environment instance.
///
/// Construction uses double-checked locking: the `constructed` flag is read
/// without the lock, and only when it is clear does the caller take the lock
/// and re-check before invoking the factory.
pub struct ViewerSlot {
    factory: Option<ViewerFactory>,
    constructed: AtomicBool,
    viewer: Mutex<Option<Box<dyn Viewer>>>,
    width: u32,
    height: u32,
    title: String,
}

impl ViewerSlot {
    pub fn new(factory: Option<ViewerFactory>, width: u32, height: u32, title: impl Into<String>) -> Self {
        Self {
            factory,
            constructed: AtomicBool::new(false),
            viewer: Mutex::new(None),
            width,
            height,
            title: title.into(),
        }
    }

    /// A slot that starts out holding `viewer` and has no factory to rebuild it after `close`.
    pub fn with_viewer(viewer: Box<dyn Viewer>, width: u32, height: u32, title: impl Into<String>) -> Self {
        Self {
            factory: None,
            constructed: AtomicBool::new(true),
            viewer: Mutex::new(Some(viewer)),
            width,
            height,
            title: title.into(),
        }
    }

    pub fn set_factory(&mut self, factory: ViewerFactory) { self.factory = Some(factory); }

    /// Whether a viewer currently exists.
    pub fn is_constructed(&self) -> bool { self.constructed.load(Ordering::Acquire) }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Box<dyn Viewer>>>> {
        self.viewer
            .lock()
            .map_err(|_| GymError::InvalidState(format!("{} viewer lock poisoned", self.title)))
    }

    /// Forward a frame to the viewer, constructing it on first use.
    pub fn show(&self, frame: &RenderFrame) -> Result<()> {
        if !self.constructed.load(Ordering::Acquire) {
            let mut guard = self.lock()?;
            if guard.is_none() {
                let factory = self.factory.as_ref().ok_or_else(|| {
                    GymError::MissingConfiguration(format!("no viewer factory has been set for {}", self.title))
                })?;
                debug!("constructing viewer {}x{} for {}", self.width, self.height, self.title);
                *guard = Some(factory(self.width, self.height, &self.title)?);
                self.constructed.store(true, Ordering::Release);
            }
            return match guard.as_mut() {
                Some(viewer) => viewer.render(frame),
                None => Ok(()),
            };
        }

        let mut guard = self.lock()?;
        match guard.as_mut() {
            Some(viewer) => viewer.render(frame),
            None => Err(GymError::InvalidState(format!("{} viewer vanished while rendering", self.title))),
        }
    }

    /// Close and drop the viewer. The next `show` rebuilds it through the factory.
    pub fn close(&mut self) {
        let slot = match self.viewer.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut viewer) = slot.take() {
            debug!("closing viewer for {}", self.title);
            viewer.close();
        }
        self.constructed.store(false, Ordering::Release);
    }
}

impl fmt::Debug for ViewerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerSlot")
            .field("title", &self.title)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_factory", &self.factory.is_some())
            .field("constructed", &self.is_constructed())
            .finish()
    }
}

impl Drop for ViewerSlot {
    fn drop(&mut self) { self.close(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct CountingViewer {
        frames: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl Viewer for CountingViewer {
        fn render(&mut self, _frame: &RenderFrame) -> Result<()> {
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&mut self) { self.closed.fetch_add(1, Ordering::SeqCst); }
    }

    fn counting_factory(built: Arc<AtomicUsize>, frames: Arc<AtomicUsize>, closed: Arc<AtomicUsize>) -> ViewerFactory {
        Arc::new(move |_: u32, _: u32, _: &str| -> Result<Box<dyn Viewer>> {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingViewer { frames: frames.clone(), closed: closed.clone() }))
        })
    }

    fn frame() -> RenderFrame { RenderFrame::Text("f".into()) }

    #[test]
    fn missing_factory_is_a_configuration_error() {
        let slot = ViewerSlot::new(None, 10, 10, "test");
        assert!(matches!(slot.show(&frame()), Err(GymError::MissingConfiguration(_))));
        assert!(!slot.is_constructed());
    }

    #[test]
    fn concurrent_renders_construct_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(ViewerSlot::new(
            Some(counting_factory(built.clone(), frames.clone(), closed.clone())),
            10,
            10,
            "test",
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = slot.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        slot.show(&frame()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(frames.load(Ordering::SeqCst), 80);
    }

    #[test]
    fn close_is_idempotent_and_allows_rebuild() {
        let built = Arc::new(AtomicUsize::new(0));
        let frames = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let mut slot = ViewerSlot::new(
            Some(counting_factory(built.clone(), frames.clone(), closed.clone())),
            10,
            10,
            "test",
        );

        slot.close();
        assert_eq!(closed.load(Ordering::SeqCst), 0);

        slot.show(&frame()).unwrap();
        slot.close();
        slot.close();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!slot.is_constructed());

        slot.show(&frame()).unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn prebuilt_viewer_is_used_without_factory() {
        let frames = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let mut slot = ViewerSlot::with_viewer(
            Box::new(CountingViewer { frames: frames.clone(), closed: closed.clone() }),
            10,
            10,
            "test",
        );
        slot.show(&frame()).unwrap();
        assert_eq!(frames.load(Ordering::SeqCst), 1);
        slot.close();
        assert!(matches!(slot.show(&frame()), Err(GymError::MissingConfiguration(_))));
    }
}
