use anyhow::{bail, Result};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use std::io::{Read, Write};

/// Append-only tape of observation frames, deflate-compressed as 8-bit values.
///
/// Frames hold pixel intensities in `[0, 255]`; values are rounded and clamped
/// to bytes. The tape must be sealed before it is read, and reading decodes
/// lazily one frame at a time.
pub struct ObsTape {
    frame_len: usize,
    len: usize,
    encoder: Option<DeflateEncoder<Vec<u8>>>,
    data: Vec<u8>,
}

impl std::fmt::Debug for ObsTape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObsTape")
            .field("frame_len", &self.frame_len)
            .field("len", &self.len)
            .field("sealed", &self.is_sealed())
            .field("compressed_len", &self.data.len())
            .finish()
    }
}

impl ObsTape {
    /// An empty tape for frames of length `frame_len`.
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            len: 0,
            encoder: Some(DeflateEncoder::new(Vec::new(), Compression::default())),
            data: vec![],
        }
    }

    /// Length of each frame.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tape has no frame.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` once the tape is sealed.
    pub fn is_sealed(&self) -> bool {
        self.encoder.is_none()
    }

    /// Size of the compressed data of a sealed tape.
    pub fn compressed_len(&self) -> usize {
        self.data.len()
    }

    /// Appends a frame.
    pub fn push(&mut self, frame: &[f32]) -> Result<()> {
        if frame.len() != self.frame_len {
            bail!(
                "frame length mismatch: expected {}, got {}",
                self.frame_len,
                frame.len()
            );
        }
        let encoder = match self.encoder.as_mut() {
            Some(encoder) => encoder,
            None => bail!("tape is sealed"),
        };
        let bytes = frame
            .iter()
            .map(|x| x.round().clamp(0.0, 255.0) as u8)
            .collect::<Vec<_>>();
        encoder.write_all(&bytes)?;
        self.len += 1;
        Ok(())
    }

    /// Finishes compression. Sealing twice is a no-op.
    pub fn seal(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            self.data = encoder.finish()?;
        }
        Ok(())
    }

    /// Reads the frames back in order.
    pub fn frames(&self) -> Result<TapeReader<'_>> {
        if !self.is_sealed() {
            bail!("tape must be sealed before reading");
        }
        Ok(TapeReader {
            decoder: DeflateDecoder::new(&self.data[..]),
            frame_len: self.frame_len,
            remaining: self.len,
        })
    }
}

/// Lazy reader over the frames of an [`ObsTape`].
pub struct TapeReader<'a> {
    decoder: DeflateDecoder<&'a [u8]>,
    frame_len: usize,
    remaining: usize,
}

impl<'a> Iterator for TapeReader<'a> {
    type Item = Result<Vec<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let mut buf = vec![0u8; self.frame_len];
        Some(
            self.decoder
                .read_exact(&mut buf)
                .map(|_| buf.iter().map(|&b| b as f32).collect())
                .map_err(Into::into),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frames_come_back_in_order() -> Result<()> {
        let mut tape = ObsTape::new(64);
        for i in 0..50 {
            tape.push(&vec![i as f32; 64])?;
        }
        assert!(tape.frames().is_err());
        tape.seal()?;
        assert!(tape.compressed_len() < 50 * 64);

        let frames = tape.frames()?.collect::<Result<Vec<_>>>()?;
        assert_eq!(frames.len(), 50);
        for (i, f) in frames.iter().enumerate() {
            assert_eq!(f, &vec![i as f32; 64]);
        }

        // Sealed tapes can be replayed.
        assert_eq!(tape.frames()?.count(), 50);
        Ok(())
    }

    #[test]
    fn test_sealed_tape_rejects_push() -> Result<()> {
        let mut tape = ObsTape::new(2);
        tape.push(&[300.0, -4.0])?;
        tape.seal()?;
        assert!(tape.push(&[0.0, 0.0]).is_err());
        let frame = tape.frames()?.next().unwrap()?;
        assert_eq!(frame, vec![255.0, 0.0]);
        Ok(())
    }
}
