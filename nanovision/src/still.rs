//! A capture backend that needs nothing but the `image` crate: still
//! pictures are played back as a stream and nothing is ever shown.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::capture::{Backend, Display, FrameSource, InputEvent, SourceSpec};
use crate::{Frame, Result};

/// Extensions [`StillSource`] accepts, for a single file or the entries of
/// a directory.
pub const STILL_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Plays a single image, or every image of a directory in file name order,
/// as if it was a video.
#[derive(Debug, Default)]
pub struct StillSource {
    ready: Option<Frame>,
    pending: VecDeque<PathBuf>,
    opened: bool,
}

impl StillSource {
    /// A source that is only opened when `path` holds at least one picture
    /// that decodes. Anything else, a video file included, leaves it closed.
    pub fn open(path: &Path) -> Result<Self> {
        let mut pending: VecDeque<PathBuf> = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_still_extension(p))
                .collect();
            files.sort();
            files.into()
        } else if path.is_file() && has_still_extension(path) {
            vec![path.to_path_buf()].into()
        } else {
            if path.exists() {
                log::warn!("{} is not a still picture", path.display());
            }
            VecDeque::new()
        };
        let ready = next_decodable(&mut pending);
        let opened = ready.is_some();
        if opened {
            log::debug!(
                "{} stills queued from {}",
                pending.len() + 1,
                path.display()
            );
        }
        Ok(Self {
            ready,
            pending,
            opened,
        })
    }
}

fn has_still_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| STILL_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

/// Pops paths until one decodes.
fn next_decodable(pending: &mut VecDeque<PathBuf>) -> Option<Frame> {
    while let Some(path) = pending.pop_front() {
        match image::open(&path) {
            Ok(img) => return Some(img.to_rgb8()),
            Err(e) => log::warn!("skipping {}: {}", path.display(), e),
        }
    }
    None
}

impl FrameSource for StillSource {
    fn is_opened(&self) -> bool { self.opened }

    fn read_frame(&mut self) -> Option<Frame> {
        if !self.opened {
            return None;
        }
        self.ready
            .take()
            .or_else(|| next_decodable(&mut self.pending))
    }

    fn release(&mut self) {
        self.ready = None;
        self.pending.clear();
        self.opened = false;
    }
}

/// A display without windows. It never sees a key press or a click, so
/// sessions shown on it end with the stream, a frame limit or a stop token.
#[derive(Copy, Clone, Debug, Default)]
pub struct HeadlessDisplay {
    shown: u64,
}

impl HeadlessDisplay {
    /// How many frames went through [`Display::show`].
    pub const fn shown(&self) -> u64 { self.shown }
}

impl Display for HeadlessDisplay {
    fn show(&mut self, _window: &str, _frame: &Frame) -> Result<()> {
        self.shown += 1;
        Ok(())
    }

    fn poll_input(&mut self, _timeout_ms: u32) -> Result<Option<InputEvent>> {
        Ok(None)
    }

    fn track_clicks(&mut self, window: &str) -> Result<()> {
        log::debug!(
            "no pointer on a headless display, `{}` gets no clicks",
            window
        );
        Ok(())
    }

    fn interactive(&self) -> bool { false }

    fn close_all(&mut self) {}
}

/// [`StillSource`]s on a [`HeadlessDisplay`]. Live devices are not
/// supported, opening one gives back a closed source.
#[derive(Copy, Clone, Debug, Default)]
pub struct StillBackend;

impl Backend for StillBackend {
    type Display = HeadlessDisplay;
    type Source = StillSource;

    fn open(&mut self, spec: &SourceSpec) -> Result<StillSource> {
        match spec {
            SourceSpec::File(path) => StillSource::open(path),
            SourceSpec::Device(index) => {
                log::warn!(
                    "camera #{} needs the `opencv` feature, nothing to read",
                    index
                );
                Ok(StillSource::default())
            },
        }
    }

    fn display(&mut self) -> Result<HeadlessDisplay> {
        Ok(HeadlessDisplay::default())
    }
}
