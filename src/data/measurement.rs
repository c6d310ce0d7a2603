//! A single detector exposure.

use super::image::Image;
use super::metadata::Metadata;
use crate::geometry::Size2d;

/// One image with the metadata recorded alongside it.
#[derive(Clone, Debug)]
pub struct Measurement {
    image: Image,
    metadata: Metadata,
}

impl Measurement {
    pub fn new(image: Image, metadata: Metadata) -> Self {
        Self { image, metadata }
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn image_size(&self) -> Size2d {
        self.image.size()
    }

    pub fn mid_tth(&self) -> f64 {
        self.metadata.mid_tth()
    }
}
