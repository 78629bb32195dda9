//! YUV frame difference metric.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Grounded in `original_source/src/zcamera.c`'s `frameCompare` (per-plane
//! absolute byte delta, chroma planes weighted ×4) and, for Rust error
//! modeling, on `tlc-core`'s typed per-stage error enums.

use crate::media::{Frame, PixelFormat};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CompareError {
    #[error("no previous frame to compare against")]
    NoPreviousFrame,
    #[error("pixel format mismatch: {prev:?} vs {curr:?}")]
    FormatMismatch { prev: PixelFormat, curr: PixelFormat },
    #[error("frame size mismatch: {prev_w}x{prev_h} vs {curr_w}x{curr_h}")]
    SizeMismatch { prev_w: u32, prev_h: u32, curr_w: u32, curr_h: u32 },
    #[error("unsupported pixel format: {0:?}")]
    UnsupportedFormat(PixelFormat),
    #[error("stride mismatch on plane {plane}: {prev} vs {curr}")]
    StrideMismatch { plane: usize, prev: usize, curr: usize },
}

/// Per-channel and aggregate delta between two keyframes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    pub y: f64,
    pub u: f64,
    pub v: f64,
}

impl Delta {
    pub fn aggregate(&self) -> f64 {
        self.y + self.u + self.v
    }
}

/// Stateless comparator: sums absolute per-pixel byte differences per plane,
/// normalized by `(W*H)/100.0`; chroma planes are additionally weighted ×4
/// to approximate their per-luma-pixel contribution.
pub struct KeyframeComparator;

impl KeyframeComparator {
    pub fn new() -> Self {
        KeyframeComparator
    }

    pub fn compare(&self, prev: Option<&Frame>, curr: &Frame) -> Result<Delta, CompareError> {
        let prev = prev.ok_or(CompareError::NoPreviousFrame)?;

        if !curr.format.is_planar_420() {
            return Err(CompareError::UnsupportedFormat(curr.format));
        }
        if prev.format != curr.format {
            return Err(CompareError::FormatMismatch { prev: prev.format, curr: curr.format });
        }
        if prev.width != curr.width || prev.height != curr.height {
            return Err(CompareError::SizeMismatch {
                prev_w: prev.width,
                prev_h: prev.height,
                curr_w: curr.width,
                curr_h: curr.height,
            });
        }
        if prev.planes.len() != 3 || curr.planes.len() != 3 {
            return Err(CompareError::SizeMismatch {
                prev_w: prev.width,
                prev_h: prev.height,
                curr_w: curr.width,
                curr_h: curr.height,
            });
        }

        let norm = (curr.width as f64 * curr.height as f64) / 100.0;
        let mut channel = [0.0f64; 3];
        for (plane_index, channel_value) in channel.iter_mut().enumerate() {
            let p = &prev.planes[plane_index];
            let c = &curr.planes[plane_index];
            if p.stride != c.stride {
                return Err(CompareError::StrideMismatch { plane: plane_index, prev: p.stride, curr: c.stride });
            }
            let sum: u64 = p
                .data
                .iter()
                .zip(c.data.iter())
                .map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs() as u64)
                .sum();
            let weight = if plane_index == 0 { 1.0 } else { 4.0 };
            *channel_value = (sum as f64 / norm) * weight;
        }

        Ok(Delta { y: channel[0], u: channel[1], v: channel[2] })
    }
}

impl Default for KeyframeComparator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::mock::solid_frame;

    #[test]
    fn missing_previous_frame_is_an_error() {
        let cmp = KeyframeComparator::new();
        let curr = solid_frame(100, 100, 0, 128, 128);
        assert_eq!(cmp.compare(None, &curr), Err(CompareError::NoPreviousFrame));
    }

    #[test]
    fn one_luma_byte_delta_of_ten_on_100x100_frame_yields_delta_y_of_one_tenth() {
        let cmp = KeyframeComparator::new();
        let prev = solid_frame(100, 100, 0, 128, 128);
        let mut curr = solid_frame(100, 100, 0, 128, 128);
        let mut luma = curr.planes[0].data.to_vec();
        luma[0] = 10;
        curr.planes[0].data = luma.into();

        let delta = cmp.compare(Some(&prev), &curr).unwrap();
        assert!((delta.y - 0.1).abs() < 1e-9);
        assert_eq!(delta.u, 0.0);
        assert_eq!(delta.v, 0.0);
        assert!((delta.aggregate() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn identical_frames_yield_zero_delta() {
        let cmp = KeyframeComparator::new();
        let prev = solid_frame(64, 48, 10, 20, 30);
        let curr = solid_frame(64, 48, 10, 20, 30);
        let delta = cmp.compare(Some(&prev), &curr).unwrap();
        assert_eq!(delta.aggregate(), 0.0);
    }

    #[test]
    fn size_mismatch_is_reported() {
        let cmp = KeyframeComparator::new();
        let prev = solid_frame(64, 48, 0, 0, 0);
        let curr = solid_frame(32, 24, 0, 0, 0);
        assert!(matches!(cmp.compare(Some(&prev), &curr), Err(CompareError::SizeMismatch { .. })));
    }

    #[test]
    fn unsupported_pixel_format_is_reported() {
        use crate::media::{Frame, Plane};
        let cmp = KeyframeComparator::new();
        let prev = solid_frame(4, 4, 0, 0, 0);
        let curr = Frame {
            format: crate::media::PixelFormat::Other,
            width: 4,
            height: 4,
            planes: vec![Plane { data: vec![0u8; 16].into(), stride: 4 }],
        };
        assert!(matches!(cmp.compare(Some(&prev), &curr), Err(CompareError::UnsupportedFormat(_))));
    }
}
