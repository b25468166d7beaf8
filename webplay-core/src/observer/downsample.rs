use super::{check_strides, strided_size, Observer};
use crate::env::RawObs;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Keeps the top-left pixel of every stride cell.
///
/// In grayscale mode the value of a pixel is the rounded mean of its channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownsampleObserver {
    /// Horizontal stride.
    pub stride_x: usize,
    /// Vertical stride.
    pub stride_y: usize,
    /// Width of the input images.
    pub in_width: usize,
    /// Height of the input images.
    pub in_height: usize,
    /// Keep the three color channels.
    pub color: bool,
}

impl DownsampleObserver {
    /// Grayscale observer with the same stride in both directions.
    pub fn new(stride: usize, in_width: usize, in_height: usize) -> Self {
        Self {
            stride_x: stride,
            stride_y: stride,
            in_width,
            in_height,
            color: false,
        }
    }
}

impl Observer for DownsampleObserver {
    fn obs_size(&self) -> (usize, usize, usize) {
        strided_size(
            self.in_width,
            self.in_height,
            self.stride_x,
            self.stride_y,
            self.color,
        )
    }

    fn obs_vec(&self, obs: &RawObs) -> Result<Vec<f32>> {
        check_strides(self.stride_x, self.stride_y, self.in_width, self.in_height)?;
        let buffer = obs.rgb_checked(self.in_width, self.in_height)?;
        let mut data = Vec::with_capacity(self.obs_len());
        for y in (0..self.in_height).step_by(self.stride_y) {
            for x in (0..self.in_width).step_by(self.stride_x) {
                let idx = (y * self.in_width + x) * 3;
                let px = &buffer[idx..idx + 3];
                if self.color {
                    data.extend(px.iter().map(|&c| c as f32));
                } else {
                    let sum: f32 = px.iter().map(|&c| c as f32).sum();
                    data.push((sum / 3.0).round());
                }
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::WebplayError;

    #[test]
    fn test_obs_size() {
        assert_eq!(DownsampleObserver::new(4, 64, 64).obs_size(), (16, 16, 1));
        assert_eq!(DownsampleObserver::new(4, 65, 63).obs_size(), (17, 16, 1));
        let mut o = DownsampleObserver::new(3, 10, 7);
        o.color = true;
        assert_eq!(o.obs_size(), (4, 3, 3));
    }

    #[test]
    fn test_zero_stride_is_an_error() {
        let mut o = DownsampleObserver::new(2, 8, 8);
        o.stride_y = 0;
        assert_eq!(o.obs_size(), (4, 0, 1));
        let err = o.obs_vec(&RawObs::filled(8, 8, [0, 0, 0])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WebplayError>(),
            Some(WebplayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_obs_len_matches_size() {
        for (stride, w, h) in [(1, 5, 5), (2, 5, 3), (4, 13, 9), (7, 6, 20)] {
            for color in [false, true] {
                let mut o = DownsampleObserver::new(stride, w, h);
                o.color = color;
                let obs = RawObs::filled(w, h, [10, 20, 30]);
                assert_eq!(o.obs_vec(&obs).unwrap().len(), o.obs_len());
            }
        }
    }

    #[test]
    fn test_picks_top_left_pixel() {
        // 2x2 image, stride 2: only pixel (0, 0) survives.
        let obs = RawObs {
            width: 2,
            height: 2,
            rgb: vec![1, 2, 4, 200, 200, 200, 200, 200, 200, 200, 200, 200],
        };
        let o = DownsampleObserver::new(2, 2, 2);
        assert_eq!(o.obs_vec(&obs).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_rejects_wrong_size() {
        let o = DownsampleObserver::new(2, 4, 4);
        assert!(o.obs_vec(&RawObs::filled(3, 4, [0, 0, 0])).is_err());
    }
}
