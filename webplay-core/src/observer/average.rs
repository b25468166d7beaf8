use super::{check_strides, strided_size, Observer};
use crate::env::RawObs;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Averages all pixels of every stride cell, including partial cells at the
/// right and bottom edges.
///
/// In grayscale mode the value of a cell is the mean of its three channel means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageObserver {
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

impl Observer for AverageObserver {
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
                let mut sums = [0f32; 3];
                let mut count = 0f32;
                for sy in y..(y + self.stride_y).min(self.in_height) {
                    for sx in x..(x + self.stride_x).min(self.in_width) {
                        let idx = (sy * self.in_width + sx) * 3;
                        count += 1.0;
                        for (s, &c) in sums.iter_mut().zip(&buffer[idx..idx + 3]) {
                            *s += c as f32;
                        }
                    }
                }
                if self.color {
                    data.extend(sums.iter().map(|s| (s / count).round()));
                } else {
                    let total: f32 = sums.iter().sum();
                    data.push((total / (count * 3.0)).round());
                }
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_cells() {
        // 3x1 image with stride 2: cells {0, 1} and {2}.
        let obs = RawObs {
            width: 3,
            height: 1,
            rgb: vec![0, 0, 0, 30, 60, 90, 9, 9, 9],
        };
        let mut o = AverageObserver {
            stride_x: 2,
            stride_y: 2,
            in_width: 3,
            in_height: 1,
            color: false,
        };
        assert_eq!(o.obs_size(), (2, 1, 1));
        assert_eq!(o.obs_vec(&obs).unwrap(), vec![30.0, 9.0]);

        o.color = true;
        assert_eq!(
            o.obs_vec(&obs).unwrap(),
            vec![15.0, 30.0, 45.0, 9.0, 9.0, 9.0]
        );
    }
}
