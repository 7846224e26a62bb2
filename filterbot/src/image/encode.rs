//! Image encoding: JPEG

use imageproc::image::codecs::jpeg::JpegEncoder;
use imageproc::image::RgbImage;

use super::StorageError;

/// Compress an image to JPEG format with the specified quality
pub fn compress_to_jpeg<W>(img: &RgbImage, writer: &mut W, quality: u8) -> Result<(), StorageError>
where
    W: std::io::Write,
{
    let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));

    encoder.encode_image(img).map_err(StorageError::Encode)?;

    Ok(())
}

pub(super) fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, StorageError> {
    let (width, height) = img.dimensions();
    let mut buffer = Vec::with_capacity((width * height) as usize);
    compress_to_jpeg(img, &mut buffer, quality)?;
    Ok(buffer)
}
