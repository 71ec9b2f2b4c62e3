//! Face encodings with TensorFlow: MTCNN finds the faces, a FaceNet style
//! graph turns each face crop into an embedding.
//!
//! MTCNN model: https://github.com/blaueck/tf-mtcnn
//! Embedding model: any frozen graph with an `input` (`[n, size, size, 3]`,
//! prewhitened), a `phase_train` bool and an `embeddings` output, e.g. the
//! ones from https://github.com/davidsandberg/facenet

use std::fmt;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GenericImageView, Pixel, RgbImage};
use num_traits::cast::NumCast;
use tensorflow::{
    FetchToken, Graph, ImportGraphDefOptions, Session, SessionOptions,
    SessionRunArgs, Tensor, TensorType,
};

use crate::faces::{Encoding, FaceEncoder};
use crate::{Error, Result};

/// Holds two points (x1, y1) and (x2, y2) that represent a `Bordered Box`
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct FaceLocationBox {
    /// The X-axis part of the first point
    pub x1: f32,
    /// The X-axis part of the second point
    pub x2: f32,
    /// The Y-axis part of the first point
    pub y1: f32,
    /// The Y-axis part of the second point
    pub y2: f32,
}

impl FaceLocationBox {
    /// Calculates the Width of the `Bordered Box`
    pub fn width(&self) -> u32 { (self.x2 - self.x1).max(0.0) as u32 }

    /// Calculates the Height of the `Bordered Box`
    pub fn height(&self) -> u32 { (self.y2 - self.y1).max(0.0) as u32 }

    /// `(x, y, width, height)` of the box, kept inside a `width`x`height`
    /// image.
    fn clamp_to(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x = (self.x1.max(0.0) as u32).min(width.saturating_sub(1));
        let y = (self.y1.max(0.0) as u32).min(height.saturating_sub(1));
        let w = self.width().min(width - x).max(1);
        let h = self.height().min(height - y).max(1);
        (x, y, w, h)
    }
}

/// A detected face and how likely it is a human one.
#[derive(Copy, Clone, Debug)]
pub struct Face {
    location: FaceLocationBox,
    prob: f32,
}

impl Face {
    /// Get the Location of that Face
    pub const fn location_box(&self) -> &FaceLocationBox { &self.location }

    /// How likely it is a Human Face
    pub const fn probability(&self) -> f32 { self.prob }
}

/// A frozen graph and the session that runs it, built once per model.
struct Model {
    graph: Graph,
    session: Session,
}

impl Model {
    fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut graph = Graph::new();
        graph.import_graph_def(&bytes, &ImportGraphDefOptions::new())?;
        let session = Session::new(&SessionOptions::new(), &graph)?;
        log::debug!("loaded model {}", path.display());
        Ok(Self { graph, session })
    }

    fn feed<'a>(
        &self,
        args: &mut SessionRunArgs<'a>,
        name: &str,
        tensor: &'a Tensor<impl TensorType>,
    ) -> Result<()> {
        let op = self.graph.operation_by_name_required(name)?;
        args.add_feed(&op, 0, tensor);
        Ok(())
    }

    fn fetch(
        &self,
        args: &mut SessionRunArgs<'_>,
        name: &str,
    ) -> Result<FetchToken> {
        let op = self.graph.operation_by_name_required(name)?;
        Ok(args.request_fetch(&op, 0))
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("operations", &self.graph.operation_iter().count())
            .finish()
    }
}

#[derive(Debug)]
pub struct TensorflowEncoder {
    detector: Model,
    embedder: Model,
    min_size: f32,
    factor: f32,
    thresholds: [f32; 3],
    input_size: u32,
}

impl TensorflowEncoder {
    /// Loads the MTCNN detector and the embedding graph from frozen
    /// `GraphDef` files.
    pub fn new(
        detector_model: impl AsRef<Path>,
        encoder_model: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self {
            detector: Model::load(detector_model.as_ref())?,
            embedder: Model::load(encoder_model.as_ref())?,
            min_size: 40.0,
            factor: 0.709,
            thresholds: [0.6, 0.7, 0.7],
            input_size: 160,
        })
    }

    /// Set the Current `factor` arg
    pub const fn set_factor(mut self, factor: f32) -> Self {
        self.factor = factor;
        self
    }

    /// Set the Current `min_size` arg
    pub const fn set_min_size(mut self, min_size: f32) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set the Current `thresholds` arg
    pub const fn set_thresholds(mut self, thresholds: [f32; 3]) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the side of the square crops fed to the embedding graph.
    pub const fn set_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    /// Detect Faces in an Image
    pub fn detect(&self, img: &impl GenericImageView) -> Result<Vec<Face>> {
        let model = &self.detector;
        let mut flattened: Vec<f32> =
            Vec::with_capacity((img.width() * img.height() * 3) as usize);
        for (_x, _y, pixel) in img.pixels() {
            let c = pixel.channels();
            // MTCNN wants BGR.
            for i in [2, 1, 0] {
                flattened.push(NumCast::from(c[i]).unwrap_or(0.0));
            }
        }
        let input = Tensor::new(&[img.height() as u64, img.width() as u64, 3])
            .with_values(&flattened)?;
        let min_size = Tensor::new(&[]).with_values(&[self.min_size])?;
        let thresholds = Tensor::new(&[3]).with_values(&self.thresholds)?;
        let factor = Tensor::new(&[]).with_values(&[self.factor])?;
        let mut args = SessionRunArgs::new();
        model.feed(&mut args, "min_size", &min_size)?;
        model.feed(&mut args, "thresholds", &thresholds)?;
        model.feed(&mut args, "factor", &factor)?;
        model.feed(&mut args, "input", &input)?;

        let bbox = model.fetch(&mut args, "box")?;
        let prob = model.fetch(&mut args, "prob")?;
        model.session.run(&mut args)?;
        let bbox_res: Tensor<f32> = args.fetch(bbox)?;
        let prob_res: Tensor<f32> = args.fetch(prob)?;

        let faces: Vec<_> = bbox_res
            .chunks_exact(4)
            .zip(prob_res.iter())
            .map(|(bbox, &prob)| Face {
                location: FaceLocationBox {
                    y1: bbox[0],
                    x1: bbox[1],
                    y2: bbox[2],
                    x2: bbox[3],
                },
                prob,
            })
            .collect();
        Ok(faces)
    }

    /// Embeds one face crop.
    fn embed(&self, img: &RgbImage, face: &Face) -> Result<Encoding> {
        let (x, y, w, h) = face.location.clamp_to(img.width(), img.height());
        let crop = imageops::crop_imm(img, x, y, w, h).to_image();
        let size = self.input_size;
        let crop = imageops::resize(&crop, size, size, FilterType::Triangle);
        let pixels = prewhiten(crop.as_raw());

        let model = &self.embedder;
        let input = Tensor::new(&[1, u64::from(size), u64::from(size), 3])
            .with_values(&pixels)?;
        let phase_train = Tensor::new(&[]).with_values(&[false])?;
        let mut args = SessionRunArgs::new();
        model.feed(&mut args, "input", &input)?;
        model.feed(&mut args, "phase_train", &phase_train)?;
        let embeddings = model.fetch(&mut args, "embeddings")?;
        model.session.run(&mut args)?;
        let embeddings: Tensor<f32> = args.fetch(embeddings)?;
        if embeddings.is_empty() {
            return Err(Error::Backend(
                "the embedding graph returned nothing".into(),
            ));
        }
        Ok(embeddings.iter().map(|&v| f64::from(v)).collect())
    }
}

/// Zero mean, unit variance, the way FaceNet was trained.
fn prewhiten(raw: &[u8]) -> Vec<f32> {
    let n = raw.len().max(1) as f32;
    let mean = raw.iter().map(|&v| f32::from(v)).sum::<f32>() / n;
    let var = raw
        .iter()
        .map(|&v| (f32::from(v) - mean).powi(2))
        .sum::<f32>()
        / n;
    let std = var.sqrt().max(1.0 / n.sqrt());
    raw.iter().map(|&v| (f32::from(v) - mean) / std).collect()
}

impl FaceEncoder for TensorflowEncoder {
    /// Every face, in the order the detector reports them.
    fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<Encoding>> {
        let faces = self.detect(image)?;
        faces.iter().map(|face| self.embed(image, face)).collect()
    }

    fn encode_face(
        &mut self,
        image: &RgbImage,
        index: usize,
    ) -> Result<Option<Encoding>> {
        let faces = self.detect(image)?;
        log::debug!("{} face(s) detected", faces.len());
        faces
            .get(index)
            .map(|face| self.embed(image, face))
            .transpose()
    }
}
