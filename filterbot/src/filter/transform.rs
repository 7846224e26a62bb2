//! Pixel-level transformations: blur, rotation, noise, convolution, colour ops, concatenation

use imageproc::filter::separable_filter_equal;
use imageproc::image::{imageops, Luma, Rgb, RgbImage};
use rand::Rng;

use super::{Direction, FilterError};

const SHARPEN_KERNEL: [[i32; 3]; 3] = [[-1, -1, -1], [-1, 9, -1], [-1, -1, -1]];
const EMBOSS_KERNEL: [[i32; 3]; 3] = [[0, -1, -1], [1, 0, -1], [1, 1, 0]];

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

pub(super) fn ensure_not_empty(img: &RgbImage) -> Result<(), FilterError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(FilterError::EmptyImage);
    }
    Ok(())
}

/// Clamp a possibly out-of-bounds coordinate to the image edge
#[inline]
pub(super) fn clamp_coord(value: i64, len: u32) -> u32 {
    value.clamp(0, i64::from(len) - 1) as u32
}

/// Mirror a coordinate at most one step outside the image, without repeating
/// the edge pixel (`-1 -> 1`, `len -> len - 2`)
#[inline]
fn reflect_coord(value: i64, len: u32) -> u32 {
    let last = i64::from(len) - 1;
    if last == 0 {
        return 0;
    }
    let reflected = if value < 0 {
        -value
    } else if value > last {
        2 * last - value
    } else {
        value
    };
    reflected.clamp(0, last) as u32
}

/// Nearest odd kernel size that is at least 1, rounding even sizes up
pub fn odd_kernel_size(size: u32) -> u32 {
    let size = size.max(1);
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Gaussian sigma for a kernel of the given (odd) size
fn kernel_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian with exactly `kernel_size` taps
fn gaussian_kernel(kernel_size: u32) -> Vec<f32> {
    let sigma = kernel_sigma(kernel_size);
    let radius = (kernel_size / 2) as f32;

    let mut kernel: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Gaussian blur over a `kernel_size` x `kernel_size` window.
///
/// Even sizes are rounded up to the next odd one.
pub fn blur(img: &RgbImage, kernel_size: u32) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;

    let kernel_size = odd_kernel_size(kernel_size);
    // a 1x1 kernel leaves every pixel untouched
    if kernel_size == 1 {
        return Ok(img.clone());
    }

    Ok(separable_filter_equal(img, &gaussian_kernel(kernel_size)))
}

/// Turn the image upside down
pub fn rotate(img: &RgbImage) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    Ok(imageops::rotate180(img))
}

/// Replace each pixel with black (probability `amount / 2`), white (`amount / 2`)
/// or leave it as is.
pub fn salt_and_pepper<R: Rng>(
    img: &RgbImage,
    amount: f64,
    rng: &mut R,
) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    if !(0.0..=1.0).contains(&amount) {
        return Err(FilterError::InvalidParameter(format!(
            "noise amount must be between 0 and 1, got {amount}"
        )));
    }

    let pepper = amount / 2.0;
    let mut noisy = img.clone();
    for pixel in noisy.pixels_mut() {
        let draw: f64 = rng.random();
        if draw < pepper {
            *pixel = BLACK;
        } else if draw < amount {
            *pixel = WHITE;
        }
    }

    Ok(noisy)
}

/// Join `first` and `second`, `first` ending up left of (or above) `second`
pub fn concat(
    first: &RgbImage,
    second: &RgbImage,
    direction: Direction,
) -> Result<RgbImage, FilterError> {
    ensure_not_empty(first)?;
    ensure_not_empty(second)?;

    let (first_width, first_height) = first.dimensions();
    let (second_width, second_height) = second.dimensions();

    let mismatch = || FilterError::SizeMismatch {
        direction,
        first: first.dimensions(),
        second: second.dimensions(),
    };

    let (width, height, x_offset, y_offset) = match direction {
        Direction::Horizontal => {
            if first_height != second_height {
                return Err(mismatch());
            }
            (first_width + second_width, first_height, first_width, 0)
        }
        Direction::Vertical => {
            if first_width != second_width {
                return Err(mismatch());
            }
            (first_width, first_height + second_height, 0, first_height)
        }
    };

    let mut joined = RgbImage::new(width, height);
    imageops::replace(&mut joined, first, 0, 0);
    imageops::replace(&mut joined, second, x_offset.into(), y_offset.into());

    Ok(joined)
}

/// Luma conversion, expanded back to three channels
pub fn grayscale(img: &RgbImage) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    let gray = imageops::grayscale(img);
    Ok(imageproc::map::map_colors(&gray, |Luma([l])| Rgb([l, l, l])))
}

pub fn sharpen(img: &RgbImage) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    Ok(convolve3x3(img, &SHARPEN_KERNEL))
}

pub fn emboss(img: &RgbImage) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    Ok(convolve3x3(img, &EMBOSS_KERNEL))
}

/// Bitwise complement of every channel
pub fn invert(img: &RgbImage) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    let mut inverted = img.clone();
    imageops::colorops::invert(&mut inverted);
    Ok(inverted)
}

/// Correlate each channel with a 3x3 integer kernel.
///
/// Borders are mirrored without repeating the edge pixel and results saturate
/// to 0-255.
fn convolve3x3(img: &RgbImage, kernel: &[[i32; 3]; 3]) -> RgbImage {
    let (width, height) = img.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let mut acc = [0i32; 3];
        for (ky, row) in kernel.iter().enumerate() {
            for (kx, &weight) in row.iter().enumerate() {
                if weight == 0 {
                    continue;
                }
                let sx = reflect_coord(i64::from(x) + kx as i64 - 1, width);
                let sy = reflect_coord(i64::from(y) + ky as i64 - 1, height);
                let pixel = img.get_pixel(sx, sy);
                for (sum, &channel) in acc.iter_mut().zip(pixel.0.iter()) {
                    *sum += weight * i32::from(channel);
                }
            }
        }
        Rgb(acc.map(|v| v.clamp(0, 255) as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x * y) % 256) as u8])
        })
    }

    #[test]
    fn kernel_size_is_odd_and_positive() {
        assert_eq!(odd_kernel_size(0), 1);
        assert_eq!(odd_kernel_size(1), 1);
        assert_eq!(odd_kernel_size(4), 5);
        assert_eq!(odd_kernel_size(16), 17);
        assert_eq!(odd_kernel_size(7), 7);
    }

    #[test]
    fn blur_with_unit_kernel_is_identity() {
        let img = gradient(10, 10);
        assert_eq!(blur(&img, 0).unwrap(), img);
        assert_eq!(blur(&img, 1).unwrap(), img);
    }

    #[test]
    fn blur_smooths_a_spike() {
        let mut img = RgbImage::from_pixel(9, 9, BLACK);
        img.put_pixel(4, 4, WHITE);

        let blurred = blur(&img, 5).unwrap();
        let center = blurred.get_pixel(4, 4)[0];
        assert!(center < 255);
        assert!(blurred.get_pixel(5, 4)[0] > 0);
    }

    #[test]
    fn gaussian_kernel_has_requested_width() {
        for size in [3, 5, 17] {
            let kernel = gaussian_kernel(size);
            assert_eq!(kernel.len(), size as usize);
            assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
            assert_eq!(kernel[0], kernel[size as usize - 1]);
            assert!(kernel[size as usize / 2] > kernel[0]);
        }
    }

    #[test]
    fn blur_stays_inside_its_window() {
        let mut img = RgbImage::from_pixel(9, 9, BLACK);
        img.put_pixel(4, 4, WHITE);

        let blurred = blur(&img, 3).unwrap();
        assert!(blurred.get_pixel(5, 4)[0] > 0);
        assert!(blurred.get_pixel(5, 5)[0] > 0);
        // two pixels away is outside a 3x3 window
        assert_eq!(blurred.get_pixel(6, 4)[0], 0);
        assert_eq!(blurred.get_pixel(4, 2)[0], 0);
    }

    #[test]
    fn rotate_twice_is_identity() {
        let img = gradient(13, 7);
        let once = rotate(&img).unwrap();
        assert_eq!(once.get_pixel(0, 0), img.get_pixel(12, 6));
        assert_eq!(rotate(&once).unwrap(), img);
    }

    #[test]
    fn invert_twice_is_identity() {
        let img = gradient(9, 5);
        let once = invert(&img).unwrap();
        assert_eq!(once.get_pixel(3, 2).0, img.get_pixel(3, 2).0.map(|c| !c));
        assert_eq!(invert(&once).unwrap(), img);
    }

    #[test]
    fn grayscale_keeps_three_equal_channels() {
        let img = gradient(6, 4);
        let gray = grayscale(&img).unwrap();
        assert_eq!(gray.dimensions(), img.dimensions());
        for pixel in gray.pixels() {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
    }

    #[test]
    fn salt_and_pepper_with_zero_amount_changes_nothing() {
        let img = gradient(16, 16);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(salt_and_pepper(&img, 0.0, &mut rng).unwrap(), img);
    }

    #[test]
    fn salt_and_pepper_with_full_amount_is_black_and_white() {
        let img = gradient(16, 16);
        let mut rng = StdRng::seed_from_u64(2);
        let noisy = salt_and_pepper(&img, 1.0, &mut rng).unwrap();

        assert!(noisy.pixels().all(|p| *p == BLACK || *p == WHITE));
        assert!(noisy.pixels().any(|p| *p == BLACK));
        assert!(noisy.pixels().any(|p| *p == WHITE));
    }

    #[test]
    fn salt_and_pepper_splits_noise_evenly() {
        let img = RgbImage::from_pixel(100, 100, Rgb([120, 60, 30]));
        let mut rng = StdRng::seed_from_u64(4);
        let noisy = salt_and_pepper(&img, 0.5, &mut rng).unwrap();

        let black = noisy.pixels().filter(|p| **p == BLACK).count();
        let white = noisy.pixels().filter(|p| **p == WHITE).count();
        let untouched = noisy.pixels().filter(|p| **p == Rgb([120, 60, 30])).count();

        assert_eq!(black + white + untouched, 10_000);
        // about a quarter each, half untouched
        assert!((2200..=2800).contains(&black), "{black}");
        assert!((2200..=2800).contains(&white), "{white}");
        assert!((4600..=5400).contains(&untouched), "{untouched}");
    }

    #[test]
    fn salt_and_pepper_rejects_out_of_range_amount() {
        let img = gradient(4, 4);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            salt_and_pepper(&img, 1.5, &mut rng),
            Err(FilterError::InvalidParameter(_))
        ));
        assert!(salt_and_pepper(&img, -0.1, &mut rng).is_err());
    }

    #[test]
    fn concat_horizontal_places_second_to_the_right() {
        let left = RgbImage::from_pixel(3, 4, BLACK);
        let right = RgbImage::from_pixel(5, 4, WHITE);

        let joined = concat(&left, &right, Direction::Horizontal).unwrap();
        assert_eq!(joined.dimensions(), (8, 4));
        assert_eq!(*joined.get_pixel(2, 3), BLACK);
        assert_eq!(*joined.get_pixel(3, 0), WHITE);
    }

    #[test]
    fn concat_vertical_places_second_below() {
        let top = RgbImage::from_pixel(4, 2, BLACK);
        let bottom = RgbImage::from_pixel(4, 3, WHITE);

        let joined = concat(&top, &bottom, Direction::Vertical).unwrap();
        assert_eq!(joined.dimensions(), (4, 5));
        assert_eq!(*joined.get_pixel(0, 1), BLACK);
        assert_eq!(*joined.get_pixel(0, 2), WHITE);
    }

    #[test]
    fn concat_rejects_mismatched_sizes() {
        let a = RgbImage::new(4, 4);
        let b = RgbImage::new(4, 5);

        assert!(matches!(
            concat(&a, &b, Direction::Horizontal),
            Err(FilterError::SizeMismatch { .. })
        ));
        // widths match, so stacking works
        assert!(concat(&a, &b, Direction::Vertical).is_ok());

        let c = RgbImage::new(6, 4);
        assert!(matches!(
            concat(&a, &c, Direction::Vertical),
            Err(FilterError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn concat_rejects_empty_input() {
        let a = RgbImage::new(4, 4);
        let empty = RgbImage::new(0, 4);
        assert!(matches!(
            concat(&a, &empty, Direction::Horizontal),
            Err(FilterError::EmptyImage)
        ));
    }

    #[test]
    fn sharpen_leaves_flat_regions_alone() {
        let flat = RgbImage::from_pixel(5, 5, Rgb([100, 50, 200]));
        assert_eq!(sharpen(&flat).unwrap(), flat);
    }

    #[test]
    fn sharpen_boosts_a_bright_spot() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([100, 100, 100]));
        img.put_pixel(2, 2, Rgb([120, 120, 120]));

        let sharpened = sharpen(&img).unwrap();
        // 9 * 120 - 8 * 100
        assert_eq!(sharpened.get_pixel(2, 2)[0], 255);
        // 9 * 100 - 7 * 100 - 120
        assert_eq!(sharpened.get_pixel(1, 1)[0], 80);
    }

    #[test]
    fn convolution_mirrors_the_border() {
        // columns of 60, 50, 0
        let img = RgbImage::from_fn(3, 3, |x, _| {
            let v = [60, 50, 0][x as usize];
            Rgb([v, v, v])
        });

        let sharpened = sharpen(&img).unwrap();
        // column -1 reads column 1: 9 * 60 - 3 * 50 - 2 * 60 - 3 * 50
        assert_eq!(sharpened.get_pixel(0, 1)[0], 120);
        // 9 * 50 - 3 * 60 - 2 * 50 - 3 * 0
        assert_eq!(sharpened.get_pixel(1, 1)[0], 170);
    }

    #[test]
    fn reflect_skips_the_edge_pixel() {
        assert_eq!(reflect_coord(-1, 5), 1);
        assert_eq!(reflect_coord(5, 5), 3);
        assert_eq!(reflect_coord(2, 5), 2);
        assert_eq!(reflect_coord(-1, 1), 0);
        assert_eq!(reflect_coord(2, 2), 0);
    }

    #[test]
    fn emboss_of_flat_image_is_black() {
        // the emboss kernel sums to zero
        let flat = RgbImage::from_pixel(4, 4, Rgb([90, 180, 30]));
        assert!(emboss(&flat).unwrap().pixels().all(|p| *p == BLACK));
    }
}
