//! Image decoding

use imageproc::image::{load_from_memory, RgbImage};

use super::StorageError;

/// Decode image from memory
///
/// Everything is normalized to 8-bit RGB so the filters always see three channels.
pub fn decode(data: &[u8]) -> Result<RgbImage, StorageError> {
    let img = load_from_memory(data)?;
    Ok(img.to_rgb8())
}
