//! Conversion of raw screenshots to fixed-size observation tensors.
mod average;
mod downsample;
mod joiner;
use crate::{env::RawObs, error::WebplayError};
use anyhow::Result;
pub use average::AverageObserver;
pub use downsample::DownsampleObserver;
pub use joiner::FrameHistoryJoiner;
use serde::{Deserialize, Serialize};

/// Converts raw observations into tensors of a fixed size.
pub trait Observer {
    /// Output tensor size as `(width, height, depth)`.
    fn obs_size(&self) -> (usize, usize, usize);

    /// Length of the output tensor.
    fn obs_len(&self) -> usize {
        let (w, h, d) = self.obs_size();
        w * h * d
    }

    /// Encodes a raw observation. Values lie in `[0, 255]`.
    fn obs_vec(&self, obs: &RawObs) -> Result<Vec<f32>>;
}

/// Serializable choice of an [`Observer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObserverConfig {
    /// See [`DownsampleObserver`].
    Downsample(DownsampleObserver),
    /// See [`AverageObserver`].
    Average(AverageObserver),
}

impl ObserverConfig {
    /// Rejects zero strides and empty input images.
    pub fn check(&self) -> Result<(), WebplayError> {
        match self {
            Self::Downsample(o) => check_strides(o.stride_x, o.stride_y, o.in_width, o.in_height),
            Self::Average(o) => check_strides(o.stride_x, o.stride_y, o.in_width, o.in_height),
        }
    }

    /// Switches the observer to color output.
    pub fn colorize(&mut self) {
        match self {
            Self::Downsample(o) => o.color = true,
            Self::Average(o) => o.color = true,
        }
    }
}

impl Observer for ObserverConfig {
    fn obs_size(&self) -> (usize, usize, usize) {
        match self {
            Self::Downsample(o) => o.obs_size(),
            Self::Average(o) => o.obs_size(),
        }
    }

    fn obs_vec(&self, obs: &RawObs) -> Result<Vec<f32>> {
        match self {
            Self::Downsample(o) => o.obs_vec(obs),
            Self::Average(o) => o.obs_vec(obs),
        }
    }
}

pub(crate) fn check_strides(
    stride_x: usize,
    stride_y: usize,
    in_width: usize,
    in_height: usize,
) -> Result<(), WebplayError> {
    if stride_x == 0 || stride_y == 0 {
        return Err(WebplayError::InvalidConfig(format!(
            "observer stride must be positive, got {}x{}",
            stride_x, stride_y
        )));
    }
    if in_width == 0 || in_height == 0 {
        return Err(WebplayError::InvalidConfig(format!(
            "observer input must not be empty, got {}x{}",
            in_width, in_height
        )));
    }
    Ok(())
}

/// Output size for a strided image, counting partial tail cells. A zero
/// stride yields an empty size.
pub(crate) fn strided_size(
    in_width: usize,
    in_height: usize,
    stride_x: usize,
    stride_y: usize,
    color: bool,
) -> (usize, usize, usize) {
    let depth = if color { 3 } else { 1 };
    let cells = |len: usize, stride: usize| match stride {
        0 => 0,
        s => (len + s - 1) / s,
    };
    (cells(in_width, stride_x), cells(in_height, stride_y), depth)
}
