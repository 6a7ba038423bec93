//! Face alignment via 4-DOF similarity transform.
//!
//! Warps a face to the canonical 112×112 ArcFace crop using the five
//! InsightFace reference landmarks and a least-squares similarity fit.

use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// 2×3 similarity transform `[a, -b, tx, b, a, ty]`.
type Similarity = [f32; 6];

/// Least-squares similarity transform (scale, rotation, translation) taking
/// `src` landmarks onto `dst`.
///
/// Each correspondence contributes two rows to the normal equations:
/// `sx*a - sy*b + tx = dx` and `sy*a + sx*b + ty = dy`.
fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Similarity {
    let mut ata = [[0.0f32; 4]; 4];
    let mut atb = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        for (row, rhs) in [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)] {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j][k] += row[j] * row[k];
                }
                atb[j] += row[j] * rhs;
            }
        }
    }

    let [a, b, tx, ty] = solve_4x4(ata, atb);
    [a, -b, tx, b, a, ty]
}

/// Gaussian elimination with partial pivoting. A singular system yields the
/// identity transform.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(mut m: [[f32; 4]; 4], mut rhs: [f32; 4]) -> [f32; 4] {
    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0];
        }
        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..4 {
                m[row][j] -= factor * m[col][j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let tail: f32 = ((i + 1)..4).map(|j| m[i][j] * x[j]).sum();
        x[i] = (rhs[i] - tail) / m[i][i];
    }
    x
}

/// Inverse-map every output pixel through `transform` and sample the source
/// bilinearly. Pixels falling outside the source are black.
fn warp_affine(source: &RgbImage, transform: &Similarity, out_size: u32) -> RgbImage {
    let (a, b, tx, ty) = (transform[0], transform[3], transform[2], transform[5]);
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return RgbImage::new(out_size, out_size);
    }
    let (ia, ib) = (a / det, b / det);
    let (w, h) = (source.width() as i64, source.height() as i64);

    let sample = |x: i64, y: i64, c: usize| -> f32 {
        if x >= 0 && x < w && y >= 0 && y < h {
            source.get_pixel(x as u32, y as u32)[c] as f32
        } else {
            0.0
        }
    };

    RgbImage::from_fn(out_size, out_size, |ox, oy| {
        let dx = ox as f32 - tx;
        let dy = oy as f32 - ty;
        let sx = ia * dx + ib * dy;
        let sy = -ib * dx + ia * dy;

        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        Rgb(std::array::from_fn(|c| {
            let v = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                + sample(x0 + 1, y0, c) * fx * (1.0 - fy)
                + sample(x0, y0 + 1, c) * (1.0 - fx) * fy
                + sample(x0 + 1, y0 + 1, c) * fx * fy;
            v.round().clamp(0.0, 255.0) as u8
        }))
    })
}

/// Align a detected face to the canonical 112×112 crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let transform = estimate_similarity(landmarks, &REFERENCE_LANDMARKS_112);
    warp_affine(image, &transform, ALIGNED_SIZE)
}

/// Landmarks that treat the whole image as one centered face.
///
/// Used when detection is not enforced and the detector found nothing: the
/// reference template is scaled to the largest centered square.
pub fn whole_image_landmarks(width: u32, height: u32) -> [(f32, f32); 5] {
    let side = width.min(height) as f32;
    let scale = side / ALIGNED_SIZE as f32;
    let off_x = (width as f32 - side) / 2.0;
    let off_y = (height as f32 - side) / 2.0;
    REFERENCE_LANDMARKS_112.map(|(x, y)| (off_x + x * scale, off_y + y * scale))
}
