use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of recordings when none is given.
pub const DEFAULT_PREFIX: &str = "video";
pub const VIDEO_EXTENSION: &str = "avi";

/// `{prefix}-{width}x{height}-{unix seconds}.avi`
pub fn generate_filename(
    prefix: Option<&str>,
    width: u32,
    height: u32,
    timestamp: SystemTime,
) -> PathBuf {
    let prefix = prefix
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PREFIX);
    let secs = timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!(
        "{}-{}x{}-{}.{}",
        prefix, width, height, secs, VIDEO_EXTENSION
    ))
}

/// `outputImage-{width}x{height}.jpg`
pub fn image_filename(width: u32, height: u32) -> PathBuf {
    PathBuf::from(format!("outputImage-{}x{}.jpg", width, height))
}

/// `outputROI-{width}x{height}.jpg`
pub fn roi_filename(width: u32, height: u32) -> PathBuf {
    PathBuf::from(format!("outputROI-{}x{}.jpg", width, height))
}
