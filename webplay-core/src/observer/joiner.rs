use std::collections::VecDeque;

/// Sliding window over the last observation frames.
///
/// The joined tensor interleaves the frames element-wise: element `i` of every
/// frame, oldest first and the current frame last, precedes element `i + 1` of
/// any frame.
#[derive(Debug, Clone)]
pub struct FrameHistoryJoiner {
    history_size: usize,
    hist: VecDeque<Vec<f32>>,
}

impl FrameHistoryJoiner {
    /// Creates a joiner keeping `history_size` past frames.
    pub fn new(history_size: usize) -> Self {
        Self {
            history_size,
            hist: VecDeque::with_capacity(history_size),
        }
    }

    /// Number of past frames kept.
    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Length of a joined tensor for frames of length `frame_len`.
    pub fn joined_len(&self, frame_len: usize) -> usize {
        frame_len * (self.history_size + 1)
    }

    /// Fills the history with copies of the first frame of an episode.
    pub fn reset(&mut self, obs: &[f32]) {
        self.hist.clear();
        for _ in 0..self.history_size {
            self.hist.push_back(obs.to_vec());
        }
    }

    /// Joins the history with `obs`, then slides the window to include it.
    pub fn step(&mut self, obs: &[f32]) -> Vec<f32> {
        let n_frames = self.hist.len() + 1;
        let mut joined = Vec::with_capacity(obs.len() * n_frames);
        for i in 0..obs.len() {
            joined.extend(self.hist.iter().map(|frame| frame[i]));
            joined.push(obs[i]);
        }
        if self.history_size > 0 {
            self.hist.pop_front();
            self.hist.push_back(obs.to_vec());
        }
        joined
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reset_then_step_has_no_motion() {
        let frame = vec![1.0, 2.0, 3.0];
        for h in 0..4 {
            let mut joiner = FrameHistoryJoiner::new(h);
            joiner.reset(&frame);
            let joined = joiner.step(&frame);
            assert_eq!(joined.len(), joiner.joined_len(frame.len()));
            let expected = frame
                .iter()
                .flat_map(|&x| std::iter::repeat(x).take(h + 1))
                .collect::<Vec<_>>();
            assert_eq!(joined, expected);
        }
    }

    #[test]
    fn test_interleaves_and_slides() {
        let mut joiner = FrameHistoryJoiner::new(2);
        joiner.reset(&[0.0, 10.0]);
        assert_eq!(joiner.step(&[1.0, 11.0]), vec![0.0, 0.0, 1.0, 10.0, 10.0, 11.0]);
        assert_eq!(joiner.step(&[2.0, 12.0]), vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(joiner.step(&[3.0, 13.0]), vec![1.0, 2.0, 3.0, 11.0, 12.0, 13.0]);
    }
}
