//! The face-encoding collaborator.

use std::path::Path;

use image::RgbImage;

use crate::{Error, Result};

/// A fixed-length vector describing one face.
pub type Encoding = Vec<f64>;

/// Which detected face of a training picture is learnt. Training pictures
/// are expected to show one person.
pub const FIRST_FACE: usize = 0;

/// Extensions of the pictures `learn-faces` trains on.
pub const TRAINING_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// Computes one encoding per face found in an image.
pub trait FaceEncoder {
    fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<Encoding>>;

    /// Encodes only the `index`th face found, `None` when there are fewer.
    /// Encoders that can skip the work for the other faces should.
    fn encode_face(
        &mut self,
        image: &RgbImage,
        index: usize,
    ) -> Result<Option<Encoding>> {
        Ok(self.encode_faces(image)?.into_iter().nth(index))
    }
}

impl<F> FaceEncoder for F
where
    F: FnMut(&RgbImage) -> Result<Vec<Encoding>>,
{
    fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<Encoding>> {
        self(image)
    }
}

/// Loads a picture as RGB, whatever its format.
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

/// Encodes the face [`FIRST_FACE`] of the picture at `path`.
pub fn encode_first_face(
    encoder: &mut impl FaceEncoder,
    path: &Path,
) -> Result<Encoding> {
    let image = load_image(path)?;
    encoder
        .encode_face(&image, FIRST_FACE)?
        .ok_or_else(|| Error::NoFaceDetected(path.to_path_buf()))
}

/// Whether `path` looks like a training picture, judged by its extension.
pub fn is_training_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            TRAINING_EXTENSIONS
                .iter()
                .any(|t| t.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}
