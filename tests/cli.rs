use std::process::Command;

fn nanovision() -> Command { Command::new(env!("CARGO_BIN_EXE_nanovision")) }

#[test]
fn unopenable_source_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.jpg");
    let status = nanovision()
        .current_dir(dir.path())
        .args(&["capture-image", "--video-path"])
        .arg(dir.path().join("missing.avi"))
        .arg("--save-as")
        .arg(&out)
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!out.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[cfg(not(feature = "opencv"))]
#[test]
fn garbage_video_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.avi");
    std::fs::write(&clip, b"definitely not a video").unwrap();
    let status = nanovision()
        .current_dir(dir.path())
        .args(&["capture-image", "--video-path"])
        .arg(&clip)
        .status()
        .unwrap();
    assert!(!status.success());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn unknown_resolution_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let status = nanovision()
        .current_dir(dir.path())
        .args(&["--resolution", "4k", "capture-video"])
        .status()
        .unwrap();
    assert!(!status.success());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[cfg(not(feature = "opencv"))]
#[test]
fn captures_a_still_as_image() {
    let dir = tempfile::tempdir().unwrap();
    let still = dir.path().join("still.png");
    image::RgbImage::from_pixel(32, 24, image::Rgb([10, 20, 30]))
        .save(&still)
        .unwrap();
    let status = nanovision()
        .current_dir(dir.path())
        .args(&["--max-frames", "1", "capture-image", "--video-path"])
        .arg(&still)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(dir.path().join("outputImage-32x24.jpg").is_file());
}
