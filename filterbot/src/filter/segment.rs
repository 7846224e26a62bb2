//! Colour segmentation through k-means quantization

use imageproc::image::RgbImage;
use rand::seq::index;
use rand::Rng;
use rayon::prelude::*;

use super::transform::ensure_not_empty;
use super::FilterError;

const MAX_ITERATIONS: usize = 100;
// Stop once no centre moves further than this
const EPSILON: f32 = 0.2;
// Centres are fitted on at most this many pixels, then every pixel is assigned
const MAX_SAMPLES: usize = 20_000;

type Color = [f32; 3];

/// Quantize the image to `clusters` colours and darken the result by half
pub fn segment<R: Rng>(
    img: &RgbImage,
    clusters: usize,
    rng: &mut R,
) -> Result<RgbImage, FilterError> {
    ensure_not_empty(img)?;
    if clusters == 0 {
        return Err(FilterError::InvalidParameter(
            "cluster count must be at least 1".to_string(),
        ));
    }

    let pixels: Vec<Color> = img.pixels().map(|p| p.0.map(f32::from)).collect();

    let sample_size = pixels.len().min(MAX_SAMPLES);
    let samples: Vec<Color> = index::sample(rng, pixels.len(), sample_size)
        .into_iter()
        .map(|i| pixels[i])
        .collect();

    let centers = kmeans(&samples, clusters.min(samples.len()), rng);
    log::debug!("Segmenting with {} colour centres", centers.len());

    let palette: Vec<[u8; 3]> = centers
        .iter()
        .map(|&center| center.map(|v| (v.round().clamp(0.0, 255.0) * 0.5).round() as u8))
        .collect();

    let mut segmented = RgbImage::new(img.width(), img.height());
    segmented
        .par_chunks_exact_mut(3)
        .zip(pixels.par_iter())
        .for_each(|(dst, pixel)| {
            dst.copy_from_slice(&palette[nearest(&centers, pixel)]);
        });

    Ok(segmented)
}

/// Lloyd's algorithm, seeded k-means++ style.
///
/// Returns fewer than `k` centres when the points hold fewer distinct colours.
fn kmeans<R: Rng>(points: &[Color], k: usize, rng: &mut R) -> Vec<Color> {
    let mut centers = seed_centers(points, k, rng);
    let k = centers.len();

    for iteration in 0..MAX_ITERATIONS {
        let labels: Vec<usize> = points
            .par_iter()
            .map(|point| nearest(&centers, point))
            .collect();

        let mut sums = vec![[0f32; 3]; k];
        let mut counts = vec![0usize; k];
        for (point, &label) in points.iter().zip(&labels) {
            for (sum, value) in sums[label].iter_mut().zip(point) {
                *sum += value;
            }
            counts[label] += 1;
        }

        let mut max_shift = 0f32;
        for ((center, &sum), &count) in centers.iter_mut().zip(&sums).zip(&counts) {
            // empty clusters keep their previous centre
            if count == 0 {
                continue;
            }
            let updated = sum.map(|s| s / count as f32);
            max_shift = max_shift.max(distance_sq(center, &updated));
            *center = updated;
        }

        if max_shift <= EPSILON * EPSILON {
            log::trace!("k-means converged after {} iterations", iteration + 1);
            break;
        }
    }

    centers
}

/// Pick each new centre with probability proportional to its squared distance
/// from the closest centre chosen so far
fn seed_centers<R: Rng>(points: &[Color], k: usize, rng: &mut R) -> Vec<Color> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.random_range(0..points.len())]);

    let mut distances: Vec<f32> = points
        .par_iter()
        .map(|point| distance_sq(point, &centers[0]))
        .collect();

    while centers.len() < k {
        let total: f32 = distances.iter().sum();
        if total <= 0.0 {
            break;
        }

        let mut target = rng.random::<f32>() * total;
        let mut chosen = None;
        for (i, &d) in distances.iter().enumerate() {
            if d <= 0.0 {
                continue;
            }
            chosen = Some(i);
            target -= d;
            if target <= 0.0 {
                break;
            }
        }
        let Some(chosen) = chosen else { break };

        let center = points[chosen];
        centers.push(center);
        distances
            .par_iter_mut()
            .zip(points.par_iter())
            .for_each(|(d, point)| *d = d.min(distance_sq(point, &center)));
    }

    centers
}

#[inline]
fn nearest(centers: &[Color], point: &Color) -> usize {
    centers
        .iter()
        .enumerate()
        .map(|(i, center)| (i, distance_sq(center, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[inline]
fn distance_sq(a: &Color, b: &Color) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::Rgb;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn two_colour_image_is_halved() {
        let img = RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgb([200, 100, 40])
            } else {
                Rgb([20, 240, 160])
            }
        });
        let mut rng = StdRng::seed_from_u64(11);

        let out = segment(&img, 2, &mut rng).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgb([100, 50, 20]));
        assert_eq!(*out.get_pixel(9, 9), Rgb([10, 120, 80]));
    }

    #[test]
    fn more_clusters_than_pixels_is_fine() {
        let img = RgbImage::from_fn(2, 2, |x, y| Rgb([(x * 100) as u8, (y * 100) as u8, 0]));
        let mut rng = StdRng::seed_from_u64(5);

        let out = segment(&img, 100, &mut rng).unwrap();
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(*out.get_pixel(1, 1), Rgb([50, 50, 0]));
    }

    #[test]
    fn zero_clusters_is_rejected() {
        let img = RgbImage::new(3, 3);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            segment(&img, 0, &mut rng),
            Err(FilterError::InvalidParameter(_))
        ));
    }

    #[test]
    fn nearest_picks_closest_centre() {
        let centers = [[0.0, 0.0, 0.0], [255.0, 255.0, 255.0]];
        assert_eq!(nearest(&centers, &[10.0, 5.0, 0.0]), 0);
        assert_eq!(nearest(&centers, &[200.0, 220.0, 250.0]), 1);
    }
}
