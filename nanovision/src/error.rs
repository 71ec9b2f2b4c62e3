use std::path::PathBuf;

/// The Errors always happens :)
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The camera or video file could not be opened.
    #[error("Could not open video source {0}")]
    SourceUnavailable(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Font Error: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
    /// An unknown resolution code or an invalid option value.
    #[error("Configuration Error: {0}")]
    Configuration(String),
    /// A frame does not match the size of the frames already in the session.
    #[error(
        "Frame is {got_width}x{got_height}, session frames are \
         {width}x{height}"
    )]
    FrameShape {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
    #[error("No face found in {}", .0.display())]
    NoFaceDetected(PathBuf),
    #[error("Nothing to save, the video has no frames")]
    EmptyVideo,
    /// The recording does not fit in the container.
    #[error("Video is larger than the {limit} bytes the container allows")]
    VideoTooLarge { limit: u64 },
    /// The encodings file is not in a format we can read.
    #[error("Bad encodings file: {0}")]
    Format(String),
    /// A collaborator (display, encoder, ...) failed in its own terms.
    #[error("Backend Error: {0}")]
    Backend(String),
    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
    #[cfg(feature = "tensorflow")]
    #[error("Tensorflow Error: {0}")]
    TFError(#[from] tensorflow::Status),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
