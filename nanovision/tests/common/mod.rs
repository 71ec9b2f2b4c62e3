#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use image::Rgb;
use nanovision::{
    Backend, Display, Error, Frame, FrameSource, InputEvent, Result,
    SourceSpec,
};

pub fn solid(width: u32, height: u32, shade: u8) -> Frame {
    Frame::from_pixel(width, height, Rgb([shade, shade, shade]))
}

/// What the fake collaborators saw, shared with the test.
#[derive(Debug, Default)]
pub struct Log {
    pub opened: Vec<SourceSpec>,
    pub requested: Vec<(u32, u32)>,
    pub reads: usize,
    pub released: usize,
    pub shown: Vec<(String, Frame)>,
    pub show_failures: usize,
    pub poll_failures: usize,
    pub tracked: Vec<String>,
    pub closed: usize,
}

#[derive(Debug)]
pub struct FakeSource {
    frames: VecDeque<Frame>,
    opened: bool,
    log: Rc<RefCell<Log>>,
}

impl FrameSource for FakeSource {
    fn is_opened(&self) -> bool { self.opened }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        self.log.borrow_mut().requested.push((width, height));
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        self.log.borrow_mut().reads += 1;
        self.frames.pop_front()
    }

    fn release(&mut self) { self.log.borrow_mut().released += 1; }
}

/// Which display calls fail.
#[derive(Copy, Clone, Debug, Default)]
pub struct Broken {
    pub show: bool,
    pub poll: bool,
}

/// Hands out a script of input events, one per poll, in order.
#[derive(Debug)]
pub struct ScriptedDisplay {
    script: VecDeque<Option<InputEvent>>,
    broken: Broken,
    log: Rc<RefCell<Log>>,
}

impl Display for ScriptedDisplay {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        if self.broken.show {
            self.log.borrow_mut().show_failures += 1;
            return Err(Error::Backend("window is gone".into()));
        }
        self.log
            .borrow_mut()
            .shown
            .push((window.to_string(), frame.clone()));
        Ok(())
    }

    fn poll_input(&mut self, _timeout_ms: u32) -> Result<Option<InputEvent>> {
        if self.broken.poll {
            self.log.borrow_mut().poll_failures += 1;
            return Err(Error::Backend("no event loop".into()));
        }
        Ok(self.script.pop_front().flatten())
    }

    fn track_clicks(&mut self, window: &str) -> Result<()> {
        self.log.borrow_mut().tracked.push(window.to_string());
        Ok(())
    }

    fn close_all(&mut self) { self.log.borrow_mut().closed += 1; }
}

/// A backend that plays `frames` and answers polls from `script`.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub frames: Vec<Frame>,
    pub script: Vec<Option<InputEvent>>,
    pub unavailable: bool,
    pub broken: Broken,
    pub log: Rc<RefCell<Log>>,
}

impl FakeBackend {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Quit on the `n`th poll.
    pub fn quit_after(mut self, n: usize) -> Self {
        self.script = vec![None; n.saturating_sub(1)];
        self.script.push(Some(InputEvent::Quit));
        self
    }

    /// Every `show` fails.
    pub fn broken_show(mut self) -> Self {
        self.broken.show = true;
        self
    }

    /// Every `poll_input` fails.
    pub fn broken_poll(mut self) -> Self {
        self.broken.poll = true;
        self
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

impl Backend for FakeBackend {
    type Display = ScriptedDisplay;
    type Source = FakeSource;

    fn open(&mut self, spec: &SourceSpec) -> Result<FakeSource> {
        self.log.borrow_mut().opened.push(spec.clone());
        Ok(FakeSource {
            frames: self.frames.drain(..).collect(),
            opened: !self.unavailable,
            log: Rc::clone(&self.log),
        })
    }

    fn display(&mut self) -> Result<ScriptedDisplay> {
        Ok(ScriptedDisplay {
            script: self.script.drain(..).collect(),
            broken: self.broken,
            log: Rc::clone(&self.log),
        })
    }
}

pub fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// `(frames, width, height, fps)` from the headers of an AVI file.
pub fn avi_info(bytes: &[u8]) -> (u32, u32, u32, u32) {
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"AVI ");
    assert_eq!(&bytes[24..28], b"avih");
    let us_per_frame = u32_at(bytes, 32);
    (
        u32_at(bytes, 48),
        u32_at(bytes, 64),
        u32_at(bytes, 68),
        1_000_000 / us_per_frame,
    )
}

/// Number of frame chunks listed in the AVI index.
pub fn avi_indexed_frames(bytes: &[u8]) -> usize {
    let at = bytes
        .windows(4)
        .rposition(|w| w == b"idx1")
        .expect("no index");
    u32_at(bytes, at + 4) as usize / 16
}
