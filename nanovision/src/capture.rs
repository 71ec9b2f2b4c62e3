//! The capture collaborator: where frames come from and where they are shown.
//!
//! A [`Backend`] opens [`FrameSource`]s and [`Display`]s. Both are scoped
//! resources, commands wrap them in [`SourceGuard`] and [`DisplayGuard`] so
//! they get released on every way out of a session, errors included.

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{Frame, Result};

/// Which source to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// A live device, `0` is the default camera.
    Device(i32),
    /// A video file (or, for the still image source, an image or a directory
    /// of images).
    File(PathBuf),
}

impl SourceSpec {
    /// The default camera unless a path was given.
    pub fn from_path(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::File(path),
            None => Self::Device(0),
        }
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(index) => write!(f, "device #{}", index),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Input observed by a display between two frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// The user asked to stop the session.
    Quit,
    Click { button: MouseButton, x: i32, y: i32 },
}

/// Where frames are read from.
pub trait FrameSource {
    fn is_opened(&self) -> bool;

    /// Ask the source for a capture size. Sources that can't honour it
    /// ignore the request.
    fn set_resolution(&mut self, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    /// Next frame, `None` once the stream is over or a read fails.
    fn read_frame(&mut self) -> Option<Frame>;

    fn release(&mut self);
}

/// Where frames are shown and input comes from.
pub trait Display {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()>;

    /// Wait up to `timeout_ms` for input.
    fn poll_input(&mut self, timeout_ms: u32) -> Result<Option<InputEvent>>;

    /// Start reporting pointer clicks on `window` through
    /// [`Display::poll_input`].
    fn track_clicks(&mut self, window: &str) -> Result<()>;

    /// Whether a user can ever send input. Sessions that only end on input
    /// don't wait on displays that answer `false`.
    fn interactive(&self) -> bool { true }

    fn close_all(&mut self);
}

/// Opens the capture collaborator's resources.
pub trait Backend {
    type Source: FrameSource;
    type Display: Display;

    /// Opens `spec`. Implementations may hand back a source that is not
    /// opened, callers check [`FrameSource::is_opened`].
    fn open(&mut self, spec: &SourceSpec) -> Result<Self::Source>;

    fn display(&mut self) -> Result<Self::Display>;
}

/// Cancels a running session from outside its read loop.
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self { Self::default() }

    pub fn stop(&self) { self.0.store(true, Ordering::SeqCst); }

    pub fn is_stopped(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// Releases the wrapped source when dropped.
#[derive(Debug)]
pub struct SourceGuard<S: FrameSource>(S);

impl<S: FrameSource> SourceGuard<S> {
    pub const fn new(source: S) -> Self { Self(source) }
}

impl<S: FrameSource> Deref for SourceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S { &self.0 }
}

impl<S: FrameSource> DerefMut for SourceGuard<S> {
    fn deref_mut(&mut self) -> &mut S { &mut self.0 }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        log::debug!("releasing video source");
        self.0.release();
    }
}

/// Closes every window of the wrapped display when dropped.
#[derive(Debug)]
pub struct DisplayGuard<D: Display>(D);

impl<D: Display> DisplayGuard<D> {
    pub const fn new(display: D) -> Self { Self(display) }
}

impl<D: Display> Deref for DisplayGuard<D> {
    type Target = D;

    fn deref(&self) -> &D { &self.0 }
}

impl<D: Display> DerefMut for DisplayGuard<D> {
    fn deref_mut(&mut self) -> &mut D { &mut self.0 }
}

impl<D: Display> Drop for DisplayGuard<D> {
    fn drop(&mut self) {
        log::debug!("closing windows");
        self.0.close_all();
    }
}
