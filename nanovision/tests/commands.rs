mod common;

use std::path::Path;

use common::{avi_indexed_frames, avi_info, solid, FakeBackend};
use image::RgbImage;
use nanovision::commands::{
    self, CaptureImageOptions, CaptureVideoOptions, ExtractRoiOptions,
    LearnFacesOptions, PreviewOptions, RoiPoint, SessionOptions,
    MAX_DISPLAY_FAILURES,
};
use nanovision::mjpeg::MjpegWriter;
use nanovision::overlay::MARKER_COLOR;
use nanovision::{
    Encoding, Error, FaceEncoder, FaceEncodings, InputEvent, MouseButton,
    Resolution, SourceSpec, StopToken, FIRST_FACE,
};

fn frames(n: u8, width: u32, height: u32) -> Vec<RgbImage> {
    (0..n).map(|i| solid(width, height, i * 10)).collect()
}

fn session(dir: &Path) -> SessionOptions {
    SessionOptions::default().set_output_dir(dir)
}

#[test]
fn capture_video_stops_on_quit() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(10, 64, 48)).quit_after(5);
    let opts = CaptureVideoOptions {
        file_prefix: Some("test".into()),
        session: session(dir.path()),
        ..CaptureVideoOptions::default()
    };
    let path =
        commands::capture_video(&mut backend, &mut MjpegWriter::default(), &opts)
            .unwrap();

    assert!(path.starts_with(dir.path()));
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("test-640x480-"), "{}", name);
    assert!(name.ends_with(".avi"));

    let bytes = std::fs::read(&path).unwrap();
    let (frames, width, height, fps) = avi_info(&bytes);
    assert_eq!(frames, 5);
    assert_eq!((width, height), (640, 480));
    assert_eq!(fps, 20);
    assert_eq!(avi_indexed_frames(&bytes), 5);

    let log = backend.log.borrow();
    assert_eq!(log.opened, vec![SourceSpec::Device(0)]);
    assert_eq!(log.requested, vec![(640, 480)]);
    assert_eq!(log.shown.len(), 5);
    assert_eq!(log.released, 1);
    assert_eq!(log.closed, 1);
}

#[test]
fn capture_video_records_at_the_configured_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(3, 64, 48));
    let opts = CaptureVideoOptions {
        elapsed_time: false,
        fps: 10,
        session: session(dir.path()).set_resolution(Resolution::P720),
        ..CaptureVideoOptions::default()
    };
    let path =
        commands::capture_video(&mut backend, &mut MjpegWriter::default(), &opts)
            .unwrap();
    let (frames, width, height, fps) = avi_info(&std::fs::read(path).unwrap());
    // The stream ran dry before any quit.
    assert_eq!(frames, 3);
    assert_eq!((width, height), (1280, 720));
    assert_eq!(fps, 10);
}

#[test]
fn capture_video_overlays_elapsed_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(2, 320, 240));
    let opts = CaptureVideoOptions {
        session: session(dir.path()),
        ..CaptureVideoOptions::default()
    };
    commands::capture_video(&mut backend, &mut MjpegWriter::default(), &opts)
        .unwrap();
    let log = backend.log.borrow();
    let (_, shown) = &log.shown[0];
    // Green text on a black frame.
    assert!(shown.pixels().any(|p| p.0[1] > 128 && p.0[0] == 0));
}

#[test]
fn capture_video_stop_token() {
    let dir = tempfile::tempdir().unwrap();
    let stop = StopToken::new();
    stop.stop();
    let mut backend = FakeBackend::new(frames(10, 64, 48));
    let opts = CaptureVideoOptions {
        session: session(dir.path()).set_stop_token(stop),
        ..CaptureVideoOptions::default()
    };
    let path =
        commands::capture_video(&mut backend, &mut MjpegWriter::default(), &opts)
            .unwrap();
    let (frames, ..) = avi_info(&std::fs::read(path).unwrap());
    assert_eq!(frames, 1);
}

#[test]
fn capture_video_with_nothing_to_save() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(Vec::new());
    let opts = CaptureVideoOptions {
        session: session(dir.path()),
        ..CaptureVideoOptions::default()
    };
    let err =
        commands::capture_video(&mut backend, &mut MjpegWriter::default(), &opts)
            .unwrap_err();
    assert!(matches!(err, Error::EmptyVideo));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(backend.log.borrow().released, 1);
}

#[test]
fn capture_video_keeps_recording_without_a_window() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(5, 64, 48)).broken_show();
    let opts = CaptureVideoOptions {
        session: session(dir.path()),
        ..CaptureVideoOptions::default()
    };
    let path =
        commands::capture_video(&mut backend, &mut MjpegWriter::default(), &opts)
            .unwrap();
    let (frames, ..) = avi_info(&std::fs::read(path).unwrap());
    assert_eq!(frames, 5);

    let log = backend.log.borrow();
    assert_eq!(log.show_failures, 5);
    assert!(log.shown.is_empty());
    assert_eq!(log.released, 1);
    assert_eq!(log.closed, 1);
}

#[test]
fn capture_video_saves_what_it_has_when_the_display_dies() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend =
        FakeBackend::new(vec![solid(16, 12, 7); 100]).broken_poll();
    let opts = CaptureVideoOptions {
        session: session(dir.path()),
        ..CaptureVideoOptions::default()
    };
    let path =
        commands::capture_video(&mut backend, &mut MjpegWriter::default(), &opts)
            .unwrap();
    let bytes = std::fs::read(path).unwrap();
    let limit = MAX_DISPLAY_FAILURES as usize;
    assert_eq!(avi_info(&bytes).0 as usize, limit);
    assert_eq!(avi_indexed_frames(&bytes), limit);

    let log = backend.log.borrow();
    assert_eq!(log.poll_failures, limit);
    assert_eq!(log.reads, limit);
    assert_eq!(log.released, 1);
    assert_eq!(log.closed, 1);
}

#[test]
fn capture_image_gives_up_on_a_dead_display() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend =
        FakeBackend::new(vec![solid(16, 12, 7); 100]).broken_show();
    let opts = CaptureImageOptions {
        session: session(dir.path()),
        ..CaptureImageOptions::default()
    };
    let err = commands::capture_image(&mut backend, &opts).unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let log = backend.log.borrow();
    assert_eq!(log.show_failures, MAX_DISPLAY_FAILURES as usize);
    assert_eq!(log.released, 1);
    assert_eq!(log.closed, 1);
}

#[test]
fn capture_image_skips_a_failed_show() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend =
        FakeBackend::new(frames(5, 8, 8)).broken_show().quit_after(2);
    let opts = CaptureImageOptions {
        session: session(dir.path()),
        ..CaptureImageOptions::default()
    };
    let path = commands::capture_image(&mut backend, &opts)
        .unwrap()
        .unwrap();
    assert!(path.is_file());
    let log = backend.log.borrow();
    assert_eq!(log.show_failures, 2);
    assert_eq!(log.released, 1);
    assert_eq!(log.closed, 1);
}

#[test]
fn extract_roi_gives_up_on_a_dead_display() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(1, 20, 20)).broken_poll();
    let opts = ExtractRoiOptions {
        save_last_frame: true,
        session: session(dir.path()),
        ..ExtractRoiOptions::default()
    };
    let err = commands::extract_roi(&mut backend, &opts).unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let log = backend.log.borrow();
    assert_eq!(log.poll_failures, MAX_DISPLAY_FAILURES as usize);
    assert_eq!(log.shown.len(), MAX_DISPLAY_FAILURES as usize);
    assert_eq!(log.released, 1);
    assert_eq!(log.closed, 1);
}

#[test]
fn preview_gives_up_on_a_dead_display() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend =
        FakeBackend::new(vec![solid(16, 12, 7); 100]).broken_show();
    let opts = PreviewOptions {
        video_path: None,
        session: session(dir.path()),
    };
    assert!(commands::preview(&mut backend, &opts).is_err());
    let log = backend.log.borrow();
    assert_eq!(log.released, 1);
    assert_eq!(log.closed, 1);
}

#[test]
fn unavailable_source_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::unavailable();
    let opts = CaptureVideoOptions {
        session: session(dir.path()),
        ..CaptureVideoOptions::default()
    };
    let err =
        commands::capture_video(&mut backend, &mut MjpegWriter::default(), &opts)
            .unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable(_)));

    let mut backend = FakeBackend::unavailable();
    let opts = CaptureImageOptions {
        video_path: Some(dir.path().join("missing.avi")),
        save_as: Some(dir.path().join("out.jpg")),
        session: session(dir.path()),
    };
    let err = commands::capture_image(&mut backend, &opts).unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable(_)));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    // Released even though it never opened.
    assert_eq!(backend.log.borrow().released, 1);
}

#[test]
fn capture_image_saves_the_frame_on_quit() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(5, 32, 24)).quit_after(3);
    let opts = CaptureImageOptions {
        video_path: Some("clip.avi".into()),
        save_as: None,
        session: session(dir.path()),
    };
    let path = commands::capture_image(&mut backend, &opts)
        .unwrap()
        .unwrap();
    assert_eq!(path, dir.path().join("outputImage-32x24.jpg"));
    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (32, 24));
    // Third frame, shade 20, give or take the jpeg.
    let shade = saved.get_pixel(16, 12).0[0];
    assert!((15..=25).contains(&shade), "{}", shade);

    let log = backend.log.borrow();
    assert_eq!(log.opened, vec![SourceSpec::File("clip.avi".into())]);
    assert!(log.requested.is_empty());
    assert_eq!(log.released, 1);
    assert_eq!(log.closed, 1);
}

#[test]
fn capture_image_explicit_name() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("me.png");
    let mut backend = FakeBackend::new(frames(2, 8, 8)).quit_after(1);
    let opts = CaptureImageOptions {
        save_as: Some(target.clone()),
        session: session(dir.path()),
        ..CaptureImageOptions::default()
    };
    let path = commands::capture_image(&mut backend, &opts).unwrap();
    assert_eq!(path, Some(target.clone()));
    assert_eq!(image::open(&target).unwrap().to_rgb8(), solid(8, 8, 0));
}

#[test]
fn capture_image_end_of_stream() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(3, 8, 8));
    let opts = CaptureImageOptions {
        session: session(dir.path()),
        ..CaptureImageOptions::default()
    };
    assert_eq!(commands::capture_image(&mut backend, &opts).unwrap(), None);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn extract_roi_annotates_clicks() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(3, 200, 100));
    backend.script = vec![
        None,
        Some(InputEvent::Click {
            button: MouseButton::Left,
            x: 20,
            y: 30,
        }),
        Some(InputEvent::Click {
            button: MouseButton::Right,
            x: 150,
            y: 70,
        }),
        Some(InputEvent::Quit),
    ];
    let opts = ExtractRoiOptions {
        save_last_frame: true,
        session: session(dir.path()),
        ..ExtractRoiOptions::default()
    };
    let outcome = commands::extract_roi(&mut backend, &opts).unwrap();
    assert_eq!(outcome.points, vec![
        RoiPoint {
            button: MouseButton::Left,
            x: 20,
            y: 30
        },
        RoiPoint {
            button: MouseButton::Right,
            x: 150,
            y: 70
        },
    ]);
    assert_eq!(outcome.saved, Some(dir.path().join("outputROI-640x480.jpg")));

    let log = backend.log.borrow();
    // Only the first frame is read, and the source let go before the loop.
    assert_eq!(log.reads, 1);
    assert_eq!(log.released, 1);
    assert_eq!(log.tracked, vec![commands::ROI_WINDOW.to_string()]);
    assert_eq!(log.shown.len(), 4);
    let (_, last) = log.shown.last().unwrap();
    assert_eq!(*last.get_pixel(20, 30), MARKER_COLOR);
    assert_eq!(*last.get_pixel(150, 70), MARKER_COLOR);
    assert_eq!(last.dimensions(), (200, 100));
    assert_eq!(log.closed, 1);
}

#[test]
fn extract_roi_without_saving() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(1, 20, 20)).quit_after(2);
    let opts = ExtractRoiOptions {
        session: session(dir.path()),
        ..ExtractRoiOptions::default()
    };
    let outcome = commands::extract_roi(&mut backend, &opts).unwrap();
    assert!(outcome.points.is_empty());
    assert_eq!(outcome.saved, None);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn extract_roi_frame_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(1, 20, 20));
    let opts = ExtractRoiOptions {
        session: session(dir.path()).set_max_frames(7),
        ..ExtractRoiOptions::default()
    };
    commands::extract_roi(&mut backend, &opts).unwrap();
    assert_eq!(backend.log.borrow().shown.len(), 7);
}

#[test]
fn extract_roi_on_an_empty_source() {
    let mut backend = FakeBackend::new(Vec::new());
    let err =
        commands::extract_roi(&mut backend, &ExtractRoiOptions::default())
            .unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable(_)));
    assert_eq!(backend.log.borrow().released, 1);
}

#[test]
fn preview_saves_at_screen_size_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::new(frames(4, 64, 48));
    let opts = PreviewOptions {
        video_path: None,
        session: session(dir.path()).set_max_frames(2),
    };
    let path = commands::preview(&mut backend, &opts).unwrap().unwrap();
    assert_eq!(path, dir.path().join("outputImage-640x480.jpg"));
    assert!(path.is_file());
    assert_eq!(backend.log.borrow().requested, vec![(640, 480)]);
}

fn write_jpeg(path: &Path, shade: u8) {
    solid(16, 16, shade).save(path).unwrap();
}

/// One face per picture, encoded as its average shade.
fn shade_encoder(image: &RgbImage) -> nanovision::Result<Vec<Encoding>> {
    let sum: f64 = image.pixels().map(|p| f64::from(p.0[0])).sum();
    let mean = sum / f64::from(image.width() * image.height());
    Ok(vec![vec![mean, 1.0, -1.0]])
}

#[test]
fn learn_faces_reads_jpegs_only() {
    let dir = tempfile::tempdir().unwrap();
    let train = dir.path().join("train");
    std::fs::create_dir(&train).unwrap();
    write_jpeg(&train.join("alice.jpg"), 0);
    write_jpeg(&train.join("bob.jpeg"), 255);
    std::fs::write(train.join("readme.txt"), "not a face").unwrap();

    let opts = LearnFacesOptions {
        training_dir: train,
        save_as: dir.path().join("faces.nvfe"),
    };
    let mut encoder = shade_encoder;
    let learned = commands::learn_faces(&mut encoder, &opts).unwrap();
    assert_eq!(learned.names(), ["alice".to_string(), "bob".to_string()]);
    assert_eq!(learned.encodings().len(), 2);

    let loaded = FaceEncodings::load(&opts.save_as).unwrap();
    assert_eq!(loaded, learned);
    assert!(loaded.encodings()[0][0] < 5.0);
    assert!(loaded.encodings()[1][0] > 250.0);
}

#[test]
fn learn_faces_ignores_extension_case() {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg(&dir.path().join("DAVE.JPG"), 10);
    write_jpeg(&dir.path().join("eve.JpEg"), 20);
    solid(16, 16, 30).save(dir.path().join("FRANK.PNG")).unwrap();

    let opts = LearnFacesOptions {
        training_dir: dir.path().to_path_buf(),
        save_as: dir.path().join("faces.nvfe"),
    };
    let learned = commands::learn_faces(&mut shade_encoder, &opts).unwrap();
    assert_eq!(learned.names(), ["DAVE".to_string(), "eve".to_string()]);
}

/// Encodes single faces only, like a real model that skips the others.
#[derive(Debug, Default)]
struct OneAtATime {
    asked: Vec<usize>,
}

impl FaceEncoder for OneAtATime {
    fn encode_faces(
        &mut self,
        _image: &RgbImage,
    ) -> nanovision::Result<Vec<Encoding>> {
        panic!("every face of the picture was encoded");
    }

    fn encode_face(
        &mut self,
        image: &RgbImage,
        index: usize,
    ) -> nanovision::Result<Option<Encoding>> {
        self.asked.push(index);
        Ok(shade_encoder(image)?.into_iter().nth(index))
    }
}

#[test]
fn learn_faces_encodes_only_the_first_face() {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg(&dir.path().join("alice.jpg"), 0);
    write_jpeg(&dir.path().join("bob.jpg"), 255);
    let opts = LearnFacesOptions {
        training_dir: dir.path().to_path_buf(),
        save_as: dir.path().join("faces.nvfe"),
    };
    let mut encoder = OneAtATime::default();
    let learned = commands::learn_faces(&mut encoder, &opts).unwrap();
    assert_eq!(learned.len(), 2);
    assert_eq!(encoder.asked, vec![FIRST_FACE, FIRST_FACE]);
}

#[test]
fn first_face_of_many() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("group.jpg");
    write_jpeg(&path, 0);
    let mut encoder = |_: &RgbImage| -> nanovision::Result<Vec<Encoding>> {
        Ok(vec![vec![1.0], vec![2.0], vec![3.0]])
    };
    let encoding =
        nanovision::faces::encode_first_face(&mut encoder, &path).unwrap();
    assert_eq!(encoding, vec![1.0]);
}

#[test]
fn learn_faces_skips_faceless_pictures() {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg(&dir.path().join("carol.jpg"), 100);
    write_jpeg(&dir.path().join("cat.jpg"), 0);
    std::fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();

    let opts = LearnFacesOptions {
        training_dir: dir.path().to_path_buf(),
        save_as: dir.path().join("faces.out"),
    };
    let mut seen = 0;
    let mut encoder = |image: &RgbImage| -> nanovision::Result<Vec<Encoding>> {
        seen += 1;
        if image.get_pixel(0, 0).0[0] < 50 {
            Ok(Vec::new())
        } else {
            shade_encoder(image)
        }
    };
    let learned = commands::learn_faces(&mut encoder, &opts).unwrap();
    assert_eq!(seen, 2);
    assert_eq!(learned.names(), ["carol".to_string()]);
    assert_eq!(FaceEncodings::load(&opts.save_as).unwrap(), learned);
}

#[test]
fn learn_faces_without_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let opts = LearnFacesOptions {
        training_dir: dir.path().join("nope"),
        save_as: dir.path().join("faces.nvfe"),
    };
    let learned = commands::learn_faces(&mut shade_encoder, &opts).unwrap();
    assert!(learned.is_empty());
    assert!(FaceEncodings::load(&opts.save_as).unwrap().is_empty());
}

#[test]
fn no_face_is_a_named_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.jpg");
    write_jpeg(&path, 0);
    let mut encoder =
        |_: &RgbImage| -> nanovision::Result<Vec<Encoding>> { Ok(Vec::new()) };
    let err = nanovision::faces::encode_first_face(&mut encoder, &path)
        .unwrap_err();
    assert!(matches!(err, Error::NoFaceDetected(p) if p == path));
}
