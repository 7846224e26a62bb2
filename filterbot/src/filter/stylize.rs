//! Mask-based stylization: oil painting and cartoon effects

use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::{box_filter, median_filter};
use imageproc::image::{imageops, GrayImage, Rgb, RgbImage};
use rayon::prelude::*;

use super::transform::{clamp_coord, ensure_not_empty, odd_kernel_size};
use super::FilterError;

const CARTOON_MEDIAN_SIZE: u32 = 7;
// 9x9 neighbourhood for the adaptive threshold
const ADAPTIVE_BLOCK_RADIUS: u32 = 4;
const ADAPTIVE_OFFSET: i16 = 9;
// 9 pixel diameter
const BILATERAL_RADIUS: i32 = 4;
const BILATERAL_SIGMA_COLOR: f32 = 300.0;
const BILATERAL_SIGMA_SPACE: f32 = 300.0;

/// Keep the original colours where the median-smoothed luma falls on the dark
/// side of the Otsu threshold, black elsewhere
pub fn oil_painting(img: &RgbImage, size: u32) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;

    let radius = odd_kernel_size(size) / 2;
    let gray = imageops::grayscale(img);
    let smoothed = median_filter(&gray, radius, radius);

    let level = otsu_level(&smoothed);
    log::trace!("Oil painting threshold: {level}");
    let mask = threshold(&smoothed, level, ThresholdType::BinaryInverted);

    Ok(apply_mask(img, &mask))
}

/// Bilateral-smoothed colours outlined by adaptive-threshold edges
pub fn cartoonize(img: &RgbImage) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;

    let radius = CARTOON_MEDIAN_SIZE / 2;
    let gray = imageops::grayscale(img);
    let smoothed = median_filter(&gray, radius, radius);
    let edges = adaptive_mean_threshold(&smoothed, ADAPTIVE_BLOCK_RADIUS, ADAPTIVE_OFFSET);

    let color = bilateral_filter(
        img,
        BILATERAL_RADIUS,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    );

    Ok(apply_mask(&color, &edges))
}

/// Copy pixels where the mask is set, black everywhere else
fn apply_mask(img: &RgbImage, mask: &GrayImage) -> RgbImage {
    let (width, height) = img.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] > 0 {
            *img.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// White where a pixel is brighter than its local mean minus `offset`
fn adaptive_mean_threshold(img: &GrayImage, block_radius: u32, offset: i16) -> GrayImage {
    let means = box_filter(img, block_radius, block_radius);

    let mut binary = img.clone();
    for (pixel, mean) in binary.pixels_mut().zip(means.pixels()) {
        pixel[0] = if i16::from(pixel[0]) > i16::from(mean[0]) - offset {
            255
        } else {
            0
        };
    }
    binary
}

/// Edge-preserving smoothing over a circular window.
///
/// Colour distance is the sum of absolute channel differences.
fn bilateral_filter(img: &RgbImage, radius: i32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let window: Vec<(i64, i64, f32)> = (-radius..=radius)
        .flat_map(|dy| (-radius..=radius).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= radius * radius)
        .map(|(dx, dy)| {
            let weight = ((dx * dx + dy * dy) as f32 * space_coeff).exp();
            (i64::from(dx), i64::from(dy), weight)
        })
        .collect();

    let mut smoothed = RgbImage::new(width, height);
    let row_len = width as usize * 3;

    smoothed
        .par_chunks_exact_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, dst) in row.chunks_exact_mut(3).enumerate() {
                let x = x as i64;
                let center = img.get_pixel(x as u32, y as u32);

                let mut sum = [0f32; 3];
                let mut weight_sum = 0f32;
                for &(dx, dy, space_weight) in &window {
                    let neighbour =
                        img.get_pixel(clamp_coord(x + dx, width), clamp_coord(y + dy, height));
                    let diff: f32 = neighbour
                        .0
                        .iter()
                        .zip(center.0.iter())
                        .map(|(&a, &b)| (f32::from(a) - f32::from(b)).abs())
                        .sum();
                    let weight = space_weight * (diff * diff * color_coeff).exp();

                    for (acc, &channel) in sum.iter_mut().zip(neighbour.0.iter()) {
                        *acc += weight * f32::from(channel);
                    }
                    weight_sum += weight;
                }

                for (out, acc) in dst.iter_mut().zip(sum) {
                    *out = (acc / weight_sum).round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    smoothed
}
