use std::path::PathBuf;

use anyhow::Context;
use argh::FromArgs;
use nanovision::commands::{
    self, CaptureImageOptions, CaptureVideoOptions, ExtractRoiOptions,
    LearnFacesOptions, PreviewOptions, SessionOptions,
};
use nanovision::Resolution;

/// Nanovision CLI Tool
/// Capture images, pick coordinates, record video and learn faces.
#[derive(FromArgs, PartialEq, Debug)]
struct Cli {
    /// screen resolution: auto, 480p, 720p or 1080p (derived from the
    /// source when left out)
    #[argh(option)]
    resolution: Option<String>,
    /// stop the session after this many frames, as if quit was pressed
    #[argh(option)]
    max_frames: Option<u64>,
    /// directory generated output names are placed in
    #[argh(option, default = "PathBuf::from(\".\")")]
    output_dir: PathBuf,
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum Command {
    CaptureImage(CaptureImage),
    ExtractRoi(ExtractRoi),
    CaptureVideo(CaptureVideo),
    LearnFaces(LearnFaces),
    Preview(Preview),
}

/// Capture an image from the given source.
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "capture-image")]
struct CaptureImage {
    /// video file to read instead of the camera
    #[argh(option)]
    video_path: Option<PathBuf>,
    /// where to write the image
    #[argh(option)]
    save_as: Option<PathBuf>,
}

/// Extract coordinates of region of interest (ROI).
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "extract-roi")]
struct ExtractRoi {
    /// video file to read instead of the camera
    #[argh(option)]
    video_path: Option<PathBuf>,
    /// write the annotated frame when done
    #[argh(switch)]
    save_last_frame: bool,
}

/// Capture video from stream.
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "capture-video")]
struct CaptureVideo {
    /// do not print the elapsed time on the frames
    #[argh(switch)]
    no_elapsed_time: bool,
    /// prefix of the recording's file name
    #[argh(option)]
    file_prefix: Option<String>,
    /// frame rate of the recording
    #[argh(option, default = "nanovision::video::DEFAULT_FPS")]
    fps: u32,
}

/// Learn the faces from images in the given directory.
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "learn-faces")]
struct LearnFaces {
    /// directory of .jpg/.jpeg pictures, one person each
    #[argh(option, default = "PathBuf::from(\"train\")")]
    training_dir: PathBuf,
    /// where to write the encodings
    #[argh(option, default = "PathBuf::from(\"faces_data.nvfe\")")]
    save_as: PathBuf,
    /// frozen MTCNN face detection graph
    #[argh(option, default = "PathBuf::from(\"models/mtcnn.pb\")")]
    detector_model: PathBuf,
    /// frozen face embedding graph
    #[argh(option, default = "PathBuf::from(\"models/facenet.pb\")")]
    encoder_model: PathBuf,
}

/// Preview the camera with the elapsed time on top.
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "preview")]
struct Preview {
    /// video file to read instead of the camera
    #[argh(option)]
    video_path: Option<PathBuf>,
}

#[cfg(feature = "opencv")]
fn backend() -> nanovision::cv::OpenCvBackend { nanovision::cv::OpenCvBackend }

#[cfg(not(feature = "opencv"))]
fn backend() -> nanovision::still::StillBackend {
    nanovision::still::StillBackend
}

#[cfg(feature = "opencv")]
fn video_sink() -> nanovision::cv::OpenCvWriter {
    nanovision::cv::OpenCvWriter::default()
}

#[cfg(not(feature = "opencv"))]
fn video_sink() -> nanovision::mjpeg::MjpegWriter {
    nanovision::mjpeg::MjpegWriter::default()
}

#[cfg(feature = "tensorflow")]
fn learn(cmd: &LearnFaces, opts: &LearnFacesOptions) -> anyhow::Result<()> {
    // Turn off tensorflow logging.
    std::env::set_var("TF_CPP_MIN_LOG_LEVEL", "3");
    let mut encoder = nanovision::tf::TensorflowEncoder::new(
        &cmd.detector_model,
        &cmd.encoder_model,
    )
    .context("loading the face models")?;
    let learned = commands::learn_faces(&mut encoder, opts)?;
    println!(
        "Learned {} face(s), saved to {}",
        learned.len(),
        opts.save_as.display()
    );
    Ok(())
}

#[cfg(not(feature = "tensorflow"))]
fn learn(cmd: &LearnFaces, _opts: &LearnFacesOptions) -> anyhow::Result<()> {
    anyhow::bail!(
        "learn-faces needs a face encoder, rebuild with `--features \
         tensorflow` (models: {}, {})",
        cmd.detector_model.display(),
        cmd.encoder_model.display()
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();
    let cli: Cli = argh::from_env();
    log::debug!("{:?}", cli);

    let mut session = SessionOptions::default().set_output_dir(&cli.output_dir);
    if let Some(code) = &cli.resolution {
        session = session.set_resolution(code.parse::<Resolution>()?);
    }
    if let Some(max_frames) = cli.max_frames {
        session = session.set_max_frames(max_frames);
    }

    let mut backend = backend();
    match &cli.command {
        Command::CaptureImage(cmd) => {
            let opts = CaptureImageOptions {
                video_path: cmd.video_path.clone(),
                save_as: cmd.save_as.clone(),
                session,
            };
            match commands::capture_image(&mut backend, &opts)
                .context("capture-image failed")?
            {
                Some(path) => println!("Saved {}", path.display()),
                None => println!("Stream ended, nothing saved"),
            }
        },
        Command::ExtractRoi(cmd) => {
            let opts = ExtractRoiOptions {
                video_path: cmd.video_path.clone(),
                save_last_frame: cmd.save_last_frame,
                session,
            };
            let outcome = commands::extract_roi(&mut backend, &opts)
                .context("extract-roi failed")?;
            for point in &outcome.points {
                println!("{:?} ({},{})", point.button, point.x, point.y);
            }
            if let Some(path) = outcome.saved {
                println!("Saved {}", path.display());
            }
        },
        Command::CaptureVideo(cmd) => {
            let opts = CaptureVideoOptions {
                elapsed_time: !cmd.no_elapsed_time,
                file_prefix: cmd.file_prefix.clone(),
                fps: cmd.fps,
                session,
            };
            let path =
                commands::capture_video(&mut backend, &mut video_sink(), &opts)
                    .context("capture-video failed")?;
            println!("Saved {}", path.display());
        },
        Command::LearnFaces(cmd) => {
            let opts = LearnFacesOptions {
                training_dir: cmd.training_dir.clone(),
                save_as: cmd.save_as.clone(),
            };
            learn(cmd, &opts).context("learn-faces failed")?;
        },
        Command::Preview(cmd) => {
            let opts = PreviewOptions {
                video_path: cmd.video_path.clone(),
                session,
            };
            if let Some(path) = commands::preview(&mut backend, &opts)
                .context("preview failed")?
            {
                println!("Saved {}", path.display());
            }
        },
    }
    Ok(())
}
