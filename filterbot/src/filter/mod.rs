//! Image filters: the single-image catalog and pairwise concatenation

mod segment;
mod stylize;
mod transform;

// Re-export public API
pub use segment::segment;
pub use stylize::{cartoonize, oil_painting};
pub use transform::{
    blur, concat, emboss, grayscale, invert, odd_kernel_size, rotate, salt_and_pepper, sharpen,
};

use std::str::FromStr;

use imageproc::image::RgbImage;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter};

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("no image data available")]
    EmptyImage,
    #[error("invalid direction `{0}`, please use `horizontal` or `vertical`")]
    InvalidDirection(String),
    #[error(
        "{direction} concatenation needs images of the same {}, got {first:?} and {second:?}",
        .direction.shared_dimension()
    )]
    SizeMismatch {
        direction: Direction,
        first: (u32, u32),
        second: (u32, u32),
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Axis along which two images are joined
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// side by side, heights must match
    #[default]
    Horizontal,
    /// stacked, widths must match
    Vertical,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Horizontal => "horizontal",
            Direction::Vertical => "vertical",
        }
    }

    fn shared_dimension(self) -> &'static str {
        match self {
            Direction::Horizontal => "height",
            Direction::Vertical => "width",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "horizontal" => Ok(Direction::Horizontal),
            "vertical" => Ok(Direction::Vertical),
            _ => Err(FilterError::InvalidDirection(s.to_string())),
        }
    }
}

/// Tunable parameters of the single-image filters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Gaussian kernel size, corrected to the nearest odd value >= 1
    pub blur_kernel: u32,
    /// Fraction of pixels replaced by salt or pepper, 0.0-1.0
    pub noise_amount: f64,
    pub segment_clusters: usize,
    /// Median filter size used by the oil painting effect
    pub oil_painting_size: u32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            blur_kernel: 16,
            noise_amount: 0.05,
            segment_clusters: 100,
            oil_painting_size: 7,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, EnumCount, EnumIter)]
pub enum Filter {
    Blur,
    Rotate,
    SaltAndPepper,
    Segment,
    Grayscale,
    Sharpen,
    Emboss,
    InvertColors,
    OilPainting,
    Cartoonize,
}

impl Filter {
    pub fn len() -> usize {
        Self::COUNT
    }

    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }

    /// The chat command selecting this filter
    pub fn command(&self) -> &'static str {
        match self {
            Filter::Blur => "blur",
            Filter::Rotate => "rotate",
            Filter::SaltAndPepper => "salt and pepper",
            Filter::Segment => "segment",
            Filter::Grayscale => "grayscale",
            Filter::Sharpen => "sharpen",
            Filter::Emboss => "emboss",
            Filter::InvertColors => "invert colors",
            Filter::OilPainting => "oil painting",
            Filter::Cartoonize => "cartoonize",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::Blur => "Blur",
            Filter::Rotate => "Rotate",
            Filter::SaltAndPepper => "Salt and Pepper",
            Filter::Segment => "Segment",
            Filter::Grayscale => "Grayscale",
            Filter::Sharpen => "Sharpen",
            Filter::Emboss => "Emboss",
            Filter::InvertColors => "Invert Colors",
            Filter::OilPainting => "Oil Painting",
            Filter::Cartoonize => "Cartoonize",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Filter::Blur => "Reduce noise and detail.",
            Filter::Rotate => "Turn the image upside down.",
            Filter::SaltAndPepper => "Add random bright and dark pixels.",
            Filter::Segment => "Divide the image based on color.",
            Filter::Grayscale => "Convert to grayscale.",
            Filter::Sharpen => "Enhance edges and details.",
            Filter::Emboss => "Create a raised effect.",
            Filter::InvertColors => "Invert the image colors.",
            Filter::OilPainting => "Apply an oil painting-like effect.",
            Filter::Cartoonize => "Create a cartoon-like version.",
        }
    }

    /// File name suffix for results of this filter, e.g. `_salt_and_pepper`
    pub fn suffix(&self) -> String {
        format!("_{}", self.command().replace(' ', "_"))
    }

    /// Match a chat message against the filter commands, ignoring case
    pub fn from_command(text: &str) -> Option<Self> {
        let normalized = text.trim().to_lowercase();
        Self::iter().find(|filter| filter.command() == normalized)
    }

    pub fn apply<R: Rng>(
        self,
        img: &RgbImage,
        params: &FilterParams,
        rng: &mut R,
    ) -> Result<RgbImage, FilterError> {
        log::debug!("Applying {} filter", self.command());
        match self {
            Filter::Blur => blur(img, params.blur_kernel),
            Filter::Rotate => rotate(img),
            Filter::SaltAndPepper => salt_and_pepper(img, params.noise_amount, rng),
            Filter::Segment => segment(img, params.segment_clusters, rng),
            Filter::Grayscale => grayscale(img),
            Filter::Sharpen => sharpen(img),
            Filter::Emboss => emboss(img),
            Filter::InvertColors => invert(img),
            Filter::OilPainting => oil_painting(img, params.oil_painting_size),
            Filter::Cartoonize => cartoonize(img),
        }
    }
}

#[derive(Debug)]
pub struct ParseError(String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("Unknown filter: ")?;
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

/// Also accepts `-` and `_` in place of spaces, e.g. `oil-painting`
impl FromStr for Filter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace(['-', '_'], " ");
        Self::from_command(&normalized).ok_or_else(|| ParseError(s.to_string()))
    }
}
