use std::path::{Path, PathBuf};
use std::time::Instant;

use image::imageops::{self, FilterType};

use crate::{Error, Frame, Resolution, Result, Screen};

/// Frame rate recordings are written with unless told otherwise.
pub const DEFAULT_FPS: u32 = 20;

/// Writes a sequence of frames out as a playable video.
pub trait VideoSink {
    /// `frames` are all `width`x`height`.
    fn write_video(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        frames: &[Frame],
    ) -> Result<()>;
}

/// One capture session.
#[derive(Debug)]
pub struct Video {
    path: Option<PathBuf>,
    frames: Vec<Frame>,
    save_last_frame: bool,
    start_time: Option<Instant>,
    playing: bool,
    fps: u32,
}

impl Default for Video {
    fn default() -> Self { Self::new(None) }
}

impl Video {
    /// A session reading `path`, or the live stream when there is none.
    pub const fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            frames: Vec::new(),
            save_last_frame: false,
            start_time: None,
            playing: true,
            fps: DEFAULT_FPS,
        }
    }

    /// Set whether the last shown frame should be written out at the end.
    pub const fn set_save_last_frame(mut self, save_last_frame: bool) -> Self {
        self.save_last_frame = save_last_frame;
        self
    }

    /// Set the frame rate used by [`Video::save`].
    pub const fn set_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    pub const fn save_last_frame(&self) -> bool { self.save_last_frame }

    pub const fn fps(&self) -> u32 { self.fps }

    pub fn frames(&self) -> &[Frame] { &self.frames }

    /// The resolution code matching the captured frames, `Auto` until the
    /// first one arrives.
    pub fn resolution_code(&self) -> Resolution {
        self.frames
            .first()
            .map(|f| Resolution::nearest(f.width(), f.height()))
            .unwrap_or(Resolution::Auto)
    }

    /// Marks the start of the session. Calling it again restarts the clock.
    pub fn init_timer(&mut self) { self.start_time = Some(Instant::now()); }

    /// Seconds since [`Video::init_timer`], `0.0` if it was never called.
    pub fn current_timestamp(&self) -> f64 {
        self.start_time
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Appends a frame. Every frame must be as large as the first one.
    pub fn add_frame(&mut self, frame: Frame) -> Result<()> {
        if let Some(first) = self.frames.first() {
            if first.dimensions() != frame.dimensions() {
                return Err(Error::FrameShape {
                    width: first.width(),
                    height: first.height(),
                    got_width: frame.width(),
                    got_height: frame.height(),
                });
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    pub const fn is_playing(&self) -> bool { self.playing }

    /// Ends the session.
    pub fn stop(&mut self) { self.playing = false; }

    /// Writes every frame to `filepath` at the screen's size.
    pub fn save(
        &self,
        screen: &Screen,
        filepath: impl AsRef<Path>,
        sink: &mut impl VideoSink,
    ) -> Result<()> {
        let filepath = filepath.as_ref();
        if self.frames.is_empty() {
            return Err(Error::EmptyVideo);
        }
        if self.fps == 0 {
            return Err(Error::Configuration("fps must be positive".into()));
        }
        let (width, height) = (screen.width, screen.height);
        let resized: Vec<Frame>;
        let frames = if self.frames[0].dimensions() == (width, height) {
            &self.frames[..]
        } else {
            log::debug!(
                "resizing {} frames from {:?} to {}x{}",
                self.frames.len(),
                self.frames[0].dimensions(),
                width,
                height
            );
            resized = self
                .frames
                .iter()
                .map(|f| {
                    imageops::resize(f, width, height, FilterType::Triangle)
                })
                .collect();
            &resized[..]
        };
        log::info!(
            "saving {} frames ({}x{} @ {} fps) to {}",
            frames.len(),
            width,
            height,
            self.fps,
            filepath.display()
        );
        sink.write_video(filepath, width, height, self.fps, frames)
    }

    pub fn log_state(&self) {
        log::debug!(
            "video: path={:?} frames={} save_last_frame={} playing={} fps={}",
            self.path,
            self.frames.len(),
            self.save_last_frame,
            self.playing,
            self.fps
        );
    }
}
