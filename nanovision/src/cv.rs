//! Capture, windows and recording through OpenCV.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use opencv::core::{Mat, Scalar, Size, CV_8UC3};
use opencv::prelude::*;
use opencv::{highgui, videoio};

use crate::capture::{
    Backend, Display, FrameSource, InputEvent, MouseButton, SourceSpec,
};
use crate::video::VideoSink;
use crate::{Error, Frame, Result};

/// The key that ends a session.
pub const QUIT_KEY: char = 'q';

/// OpenCV frames are BGR, ours are RGB.
fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    if mat.typ() != CV_8UC3 {
        return Err(Error::Backend(format!(
            "expected an 8-bit 3 channel frame, got type {}",
            mat.typ()
        )));
    }
    let (width, height) = (mat.cols() as u32, mat.rows() as u32);
    let continuous;
    let mat = if mat.is_continuous() {
        mat
    } else {
        continuous = mat.try_clone()?;
        &continuous
    };
    let mut data = mat.data_bytes()?.to_vec();
    data.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
    Frame::from_raw(width, height, data)
        .ok_or_else(|| Error::Backend("frame buffer has the wrong size".into()))
}

fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;
    let bytes = mat.data_bytes_mut()?;
    let pixels = frame.as_raw().chunks_exact(3);
    for (dst, src) in bytes.chunks_exact_mut(3).zip(pixels) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
    Ok(mat)
}

pub struct OpenCvSource {
    capture: videoio::VideoCapture,
}

impl fmt::Debug for OpenCvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenCvSource")
            .field("opened", &self.is_opened())
            .finish()
    }
}

impl FrameSource for OpenCvSource {
    fn is_opened(&self) -> bool { self.capture.is_opened().unwrap_or(false) }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        self.capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width))?;
        self.capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height))?;
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        let mut mat = Mat::default();
        match self.capture.read(&mut mat) {
            Ok(true) if !mat.empty() => match mat_to_frame(&mat) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    log::warn!("unreadable frame: {}", e);
                    None
                },
            },
            Ok(_) => None,
            Err(e) => {
                log::debug!("read failed, treating as end of stream: {}", e);
                None
            },
        }
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            log::warn!("could not release the video source: {}", e);
        }
    }
}

/// highgui windows. Key presses and clicks are turned into
/// [`InputEvent`]s.
#[derive(Debug, Default)]
pub struct OpenCvDisplay {
    clicks: Arc<Mutex<VecDeque<InputEvent>>>,
}

impl Display for OpenCvDisplay {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        highgui::imshow(window, &frame_to_mat(frame)?)?;
        Ok(())
    }

    fn poll_input(&mut self, timeout_ms: u32) -> Result<Option<InputEvent>> {
        let key = highgui::wait_key(timeout_ms.max(1) as i32)?;
        if key >= 0 && (key & 0xFF) as u8 == QUIT_KEY as u8 {
            return Ok(Some(InputEvent::Quit));
        }
        let mut clicks = self
            .clicks
            .lock()
            .map_err(|_| Error::Backend("click queue poisoned".into()))?;
        Ok(clicks.pop_front())
    }

    fn track_clicks(&mut self, window: &str) -> Result<()> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)?;
        let clicks = Arc::clone(&self.clicks);
        highgui::set_mouse_callback(
            window,
            Some(Box::new(move |event, x, y, _flags| {
                let button = match event {
                    highgui::EVENT_LBUTTONDOWN => MouseButton::Left,
                    highgui::EVENT_RBUTTONDOWN => MouseButton::Right,
                    _ => return,
                };
                if let Ok(mut clicks) = clicks.lock() {
                    clicks.push_back(InputEvent::Click { button, x, y });
                }
            })),
        )?;
        Ok(())
    }

    fn close_all(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            log::warn!("could not close windows: {}", e);
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct OpenCvBackend;

impl Backend for OpenCvBackend {
    type Display = OpenCvDisplay;
    type Source = OpenCvSource;

    fn open(&mut self, spec: &SourceSpec) -> Result<OpenCvSource> {
        let capture = match spec {
            SourceSpec::Device(index) => {
                videoio::VideoCapture::new(*index, videoio::CAP_ANY)?
            },
            SourceSpec::File(path) => {
                let path =
                    path.canonicalize().unwrap_or_else(|_| path.clone());
                videoio::VideoCapture::from_file(
                    &path.to_string_lossy(),
                    videoio::CAP_ANY,
                )?
            },
        };
        Ok(OpenCvSource { capture })
    }

    fn display(&mut self) -> Result<OpenCvDisplay> {
        Ok(OpenCvDisplay::default())
    }
}

/// Records through `cv::VideoWriter`. The container follows the file
/// extension, the codec is `fourcc`.
#[derive(Copy, Clone, Debug)]
pub struct OpenCvWriter {
    fourcc: [char; 4],
}

impl Default for OpenCvWriter {
    fn default() -> Self { Self::new(['M', 'J', 'P', 'G']) }
}

impl OpenCvWriter {
    pub const fn new(fourcc: [char; 4]) -> Self { Self { fourcc } }
}

impl VideoSink for OpenCvWriter {
    fn write_video(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        frames: &[Frame],
    ) -> Result<()> {
        if frames.is_empty() {
            return Err(Error::EmptyVideo);
        }
        let [a, b, c, d] = self.fourcc;
        let mut writer = videoio::VideoWriter::new(
            &path.to_string_lossy(),
            videoio::VideoWriter::fourcc(a, b, c, d)?,
            f64::from(fps),
            Size::new(width as i32, height as i32),
            true,
        )?;
        if !writer.is_opened()? {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("cannot write video to {}", path.display()),
            )));
        }
        for frame in frames {
            writer.write(&frame_to_mat(frame)?)?;
        }
        writer.release()?;
        Ok(())
    }
}
