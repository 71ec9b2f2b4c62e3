#![deny(
    unsafe_code,
    missing_debug_implementations,
    missing_copy_implementations,
    elided_lifetimes_in_paths,
    rust_2018_idioms,
    clippy::fallible_impl_from,
    clippy::missing_const_for_fn
)]

//! Capture, annotate and record frames from a camera or video source, and
//! turn a directory of face photographs into a lookup file of encodings.
//!
//! Frame decoding, windows and face encoding are done by collaborators
//! behind the [`capture`] and [`faces`] traits. The pure Rust ones are
//! always available; OpenCV and TensorFlow backed ones live behind the
//! `opencv` and `tensorflow` features.

pub mod capture;
pub mod commands;
pub mod encodings;
#[cfg(feature = "opencv")]
pub mod cv;
mod error;
pub mod faces;
pub mod mjpeg;
pub mod overlay;
pub mod screen;
pub mod still;
#[cfg(feature = "tensorflow")]
pub mod tf;
pub mod util;
pub mod video;

pub use crate::capture::{
    Backend, Display, FrameSource, InputEvent, MouseButton, SourceSpec,
    StopToken,
};
pub use crate::encodings::FaceEncodings;
pub use crate::error::{Error, Result};
pub use crate::faces::{Encoding, FaceEncoder, FIRST_FACE};
pub use crate::overlay::Overlays;
pub use crate::screen::{Resolution, Screen};
pub use crate::video::{Video, VideoSink};

/// A single captured picture. Every frame is 8-bit RGB.
pub type Frame = image::RgbImage;
