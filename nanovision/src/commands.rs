//! The end-user operations. Each one is a single session going through
//! init, opening the source, a read loop and finalization.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::capture::{DisplayGuard, SourceGuard};
use crate::faces::{self, FaceEncoder};
use crate::overlay::{LEFT_CLICK_COLOR, RIGHT_CLICK_COLOR};
use crate::util::{generate_filename, image_filename, roi_filename};
use crate::{
    Backend, Display, Error, FaceEncodings, FrameSource, InputEvent,
    MouseButton, Overlays, Resolution, Result, Screen, SourceSpec, StopToken,
    Video, VideoSink,
};

pub const CAPTURE_WINDOW: &str = "Image to capture";
pub const ROI_WINDOW: &str = "ROI Coordinates";
pub const VIDEO_WINDOW: &str = "Current frame";
pub const PREVIEW_WINDOW: &str = "preview";
/// How long each loop iteration waits for input.
pub const POLL_MS: u32 = 1;
/// Display calls that may fail in a row before a session gives up on the
/// display. Fewer are logged and the frame goes on unseen.
pub const MAX_DISPLAY_FAILURES: u32 = 30;

/// Knobs every session shares.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    output_dir: PathBuf,
    resolution: Option<Resolution>,
    max_frames: Option<u64>,
    stop: StopToken,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            resolution: None,
            max_frames: None,
            stop: StopToken::new(),
        }
    }
}

impl SessionOptions {
    /// Set the directory derived output names are placed in.
    pub fn set_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the screen resolution instead of deriving it from the video.
    pub const fn set_resolution(mut self, code: Resolution) -> Self {
        self.resolution = Some(code);
        self
    }

    /// End the session, like a quit key would, after this many frames.
    pub const fn set_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn set_stop_token(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_token(&self) -> &StopToken { &self.stop }

    pub fn output_dir(&self) -> &Path { &self.output_dir }

    fn should_stop(&self, shown: u64) -> bool {
        self.stop.is_stopped()
            || self.max_frames.map_or(false, |max| shown >= max)
    }

    fn initialize(&self, path: Option<PathBuf>) -> (Video, Screen) {
        let video = Video::new(path);
        let mut screen = Screen::default();
        let code = self.resolution.unwrap_or_else(|| video.resolution_code());
        screen.set_resolution(code);
        video.log_state();
        screen.log_state();
        (video, screen)
    }
}

fn open_source<B: Backend>(
    backend: &mut B,
    video: &Video,
    screen: &Screen,
) -> Result<SourceGuard<B::Source>> {
    let spec = SourceSpec::from_path(video.path().map(Path::to_path_buf));
    if let SourceSpec::Device(_) = spec {
        log::info!("Reading from stream");
    }
    let mut source = SourceGuard::new(backend.open(&spec)?);
    if !source.is_opened() {
        log::error!("Could not open video source {}, e.g. /dev/video0", spec);
        return Err(Error::SourceUnavailable(spec.to_string()));
    }
    if let SourceSpec::Device(_) = spec {
        source.set_resolution(screen.width, screen.height)?;
    }
    Ok(source)
}

/// Failures in a row of one kind of display call.
#[derive(Copy, Clone, Debug)]
struct Failures {
    what: &'static str,
    in_a_row: u32,
}

impl Failures {
    const fn of(what: &'static str) -> Self { Self { what, in_a_row: 0 } }

    /// `Ok(None)` for a failure that is logged and skipped, the error once
    /// there were [`MAX_DISPLAY_FAILURES`] in a row.
    fn check<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => {
                self.in_a_row = 0;
                Ok(Some(value))
            },
            Err(e) if self.in_a_row + 1 >= MAX_DISPLAY_FAILURES => {
                log::error!(
                    "{} failed {} times in a row, giving up: {}",
                    self.what,
                    MAX_DISPLAY_FAILURES,
                    e
                );
                Err(e)
            },
            Err(e) => {
                self.in_a_row += 1;
                log::warn!("{} failed, skipping: {}", self.what, e);
                Ok(None)
            },
        }
    }
}

/// Shows a frame and polls for input, logging display failures.
#[derive(Copy, Clone, Debug)]
struct Screening {
    show: Failures,
    poll: Failures,
}

impl Screening {
    const fn new() -> Self {
        Self {
            show: Failures::of("showing a frame"),
            poll: Failures::of("polling for input"),
        }
    }

    fn frame<D: Display>(
        &mut self,
        display: &mut D,
        window: &str,
        frame: &crate::Frame,
    ) -> Result<Option<InputEvent>> {
        self.show.check(display.show(window, frame))?;
        Ok(self.poll.check(display.poll_input(POLL_MS))?.flatten())
    }
}

#[derive(Clone, Debug, Default)]
pub struct CaptureImageOptions {
    pub video_path: Option<PathBuf>,
    pub save_as: Option<PathBuf>,
    pub session: SessionOptions,
}

/// Shows the source until quit, then writes the frame on screen to
/// `save_as` or `outputImage-{w}x{h}.jpg`. Returns where it was written,
/// `None` when the stream ended first.
pub fn capture_image<B: Backend>(
    backend: &mut B,
    opts: &CaptureImageOptions,
) -> Result<Option<PathBuf>> {
    let (video, screen) = opts.session.initialize(opts.video_path.clone());
    let mut source = open_source(backend, &video, &screen)?;
    let mut display = DisplayGuard::new(backend.display()?);

    let mut screening = Screening::new();
    let mut shown = 0;
    while let Some(frame) = source.read_frame() {
        let input = screening.frame(&mut *display, CAPTURE_WINDOW, &frame)?;
        shown += 1;
        if input == Some(InputEvent::Quit) || opts.session.should_stop(shown) {
            let path = match &opts.save_as {
                Some(path) => path.clone(),
                None => opts
                    .session
                    .output_dir
                    .join(image_filename(frame.width(), frame.height())),
            };
            frame.save(&path)?;
            log::info!("image saved to {}", path.display());
            return Ok(Some(path));
        }
    }
    log::info!("end of stream after {} frames, nothing saved", shown);
    Ok(None)
}

#[derive(Clone, Debug, Default)]
pub struct ExtractRoiOptions {
    pub video_path: Option<PathBuf>,
    pub save_last_frame: bool,
    pub session: SessionOptions,
}

/// A point the user clicked on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RoiPoint {
    pub button: MouseButton,
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoiOutcome {
    pub points: Vec<RoiPoint>,
    pub saved: Option<PathBuf>,
}

/// Freezes the first frame of the source and annotates it with the
/// coordinates of every click until quit. A display that takes no input
/// shows the frame once, unless a frame limit asks for more.
pub fn extract_roi<B: Backend>(
    backend: &mut B,
    opts: &ExtractRoiOptions,
) -> Result<RoiOutcome> {
    let (video, screen) = opts.session.initialize(opts.video_path.clone());
    let mut video = video.set_save_last_frame(opts.save_last_frame);
    let mut frame = {
        let mut source = open_source(backend, &video, &screen)?;
        source.read_frame().ok_or_else(|| {
            Error::SourceUnavailable("the source gave no frame".into())
        })?
    };
    let mut display = DisplayGuard::new(backend.display()?);
    display.track_clicks(ROI_WINDOW)?;

    let overlays = Overlays::new()?;
    let once = !display.interactive() && opts.session.max_frames.is_none();
    let mut screening = Screening::new();
    let mut outcome = RoiOutcome::default();
    let mut shown = 0;
    while video.is_playing() {
        let input = screening.frame(&mut *display, ROI_WINDOW, &frame)?;
        shown += 1;
        match input {
            Some(InputEvent::Click { button, x, y }) => {
                log::info!("{:?} click at ({},{})", button, x, y);
                let color = match button {
                    MouseButton::Left => LEFT_CLICK_COLOR,
                    MouseButton::Right => RIGHT_CLICK_COLOR,
                };
                overlays.coordinates(&mut frame, x, y, color);
                outcome.points.push(RoiPoint { button, x, y });
            },
            Some(InputEvent::Quit) => video.stop(),
            None => {},
        }
        if once || opts.session.should_stop(shown) {
            video.stop();
        }
    }
    drop(display);

    if video.save_last_frame() {
        let path = opts
            .session
            .output_dir
            .join(roi_filename(screen.width, screen.height));
        frame.save(&path)?;
        log::info!("annotated frame saved to {}", path.display());
        outcome.saved = Some(path);
    }
    Ok(outcome)
}

#[derive(Clone, Debug)]
pub struct CaptureVideoOptions {
    /// Overlay the elapsed time on every recorded frame.
    pub elapsed_time: bool,
    pub file_prefix: Option<String>,
    pub fps: u32,
    pub session: SessionOptions,
}

impl Default for CaptureVideoOptions {
    fn default() -> Self {
        Self {
            elapsed_time: true,
            file_prefix: None,
            fps: crate::video::DEFAULT_FPS,
            session: SessionOptions::default(),
        }
    }
}

/// Records the live stream until quit or the end of the stream, then saves
/// it through `sink`. Returns the path of the recording. Display failures
/// don't lose the recording: the session stops and what was recorded so far
/// is saved.
pub fn capture_video<B: Backend>(
    backend: &mut B,
    sink: &mut impl VideoSink,
    opts: &CaptureVideoOptions,
) -> Result<PathBuf> {
    let (video, screen) = opts.session.initialize(None);
    let mut video = video.set_fps(opts.fps);
    let mut source = open_source(backend, &video, &screen)?;
    let mut display = DisplayGuard::new(backend.display()?);
    let overlays = Overlays::new()?;

    let started = SystemTime::now();
    video.init_timer();
    let mut screening = Screening::new();
    let mut shown = 0;
    while video.is_playing() {
        let mut frame = match source.read_frame() {
            Some(frame) => frame,
            None => {
                log::info!("end of stream");
                break;
            },
        };
        let frame_ts = video.current_timestamp();
        log::debug!("frame timestamp: {:.3}", frame_ts);
        if opts.elapsed_time {
            overlays.elapsed_time(&mut frame, frame_ts);
        }
        let screened = screening.frame(&mut *display, VIDEO_WINDOW, &frame);
        shown += 1;
        if let Err(e) = video.add_frame(frame) {
            log::warn!("dropping frame: {}", e);
        }
        match screened {
            Ok(input) => {
                if input == Some(InputEvent::Quit)
                    || opts.session.should_stop(shown)
                {
                    video.stop();
                }
            },
            Err(_) => {
                let recorded = video.frames().len();
                log::warn!("saving the {} frames recorded", recorded);
                video.stop();
            },
        }
    }
    video.stop();
    drop(display);
    drop(source);

    let filepath = opts.session.output_dir.join(generate_filename(
        opts.file_prefix.as_deref(),
        screen.width,
        screen.height,
        started,
    ));
    video.save(&screen, &filepath, sink)?;
    Ok(filepath)
}

#[derive(Clone, Debug)]
pub struct LearnFacesOptions {
    pub training_dir: PathBuf,
    pub save_as: PathBuf,
}

impl Default for LearnFacesOptions {
    fn default() -> Self {
        Self {
            training_dir: PathBuf::from("train"),
            save_as: PathBuf::from("faces_data.nvfe"),
        }
    }
}

/// Encodes the first face of every `.jpg`/`.jpeg` picture in the training
/// directory, named after the file, and writes them all to `save_as`.
/// Pictures that can't be read or show no face are skipped.
pub fn learn_faces(
    encoder: &mut impl FaceEncoder,
    opts: &LearnFacesOptions,
) -> Result<FaceEncodings> {
    let mut learned = FaceEncodings::new();
    let data_dir = &opts.training_dir;
    if data_dir.is_dir() {
        log::info!("Reading training data from: {}", data_dir.display());
        let mut files: Vec<PathBuf> = std::fs::read_dir(data_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        files.sort();
        let total = files.len();
        for (i, file) in files.into_iter().enumerate() {
            log::debug!(
                "Processing file {}/{}: {}",
                i + 1,
                total,
                file.display()
            );
            if !file.is_file() || !faces::is_training_image(&file) {
                log::debug!("{} is not a training picture", file.display());
                continue;
            }
            let name = match file.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => continue,
            };
            match faces::encode_first_face(encoder, &file) {
                Ok(encoding) => {
                    log::info!("Learned face of {}", name);
                    learned.push(name, encoding);
                },
                Err(e) => log::warn!("Skipping {}: {}", file.display(), e),
            }
        }
    } else {
        log::warn!(
            "{} is not a directory, no faces learned",
            data_dir.display()
        );
    }
    learned.save(&opts.save_as)?;
    log::info!(
        "{} face(s) written to {}",
        learned.len(),
        opts.save_as.display()
    );
    Ok(learned)
}

#[derive(Clone, Debug, Default)]
pub struct PreviewOptions {
    pub video_path: Option<PathBuf>,
    pub session: SessionOptions,
}

/// Shows the source with the elapsed time on top. On quit the frame on
/// screen goes to `outputImage-{w}x{h}.jpg`, sized after the screen.
pub fn preview<B: Backend>(
    backend: &mut B,
    opts: &PreviewOptions,
) -> Result<Option<PathBuf>> {
    let (mut video, screen) = opts.session.initialize(opts.video_path.clone());
    let mut source = open_source(backend, &video, &screen)?;
    let mut display = DisplayGuard::new(backend.display()?);
    let overlays = Overlays::new()?;

    video.init_timer();
    let mut screening = Screening::new();
    let mut shown = 0;
    while let Some(mut frame) = source.read_frame() {
        let frame_ts = video.current_timestamp();
        log::debug!("frame timestamp: {:.3}", frame_ts);
        overlays.elapsed_time(&mut frame, frame_ts);
        let input = screening.frame(&mut *display, PREVIEW_WINDOW, &frame)?;
        shown += 1;
        if input == Some(InputEvent::Quit) || opts.session.should_stop(shown) {
            let path = opts
                .session
                .output_dir
                .join(image_filename(screen.width, screen.height));
            frame.save(&path)?;
            log::info!("image saved to {}", path.display());
            return Ok(Some(path));
        }
    }
    video.stop();
    Ok(None)
}
