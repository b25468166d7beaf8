//! Demonstrations recorded from played episodes.
//!
//! A [`RecordingFactory`] wraps the games it launches so that every episode
//! is written to its own `recording_*` file. Behavior cloning reads these
//! files back with [`read_sample_list`] and [`Recording::load`].
use crate::{
    env::{GameInfo, RawEnv, RawEnvFactory, RawObs},
    events::InputEvent,
};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Prefix of the file names of recordings.
pub const RECORDING_PREFIX: &str = "recording_";

/// A demonstration: the screenshot before each step and the input events of
/// the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Recording {
    /// Screenshot seen before each step.
    pub frames: Vec<RawObs>,

    /// Input events sent during each step.
    pub steps: Vec<Vec<InputEvent>>,
}

impl Recording {
    /// Appends a step.
    pub fn push(&mut self, frame: RawObs, events: Vec<InputEvent>) {
        self.frames.push(frame);
        self.steps.push(events);
    }

    /// Number of steps.
    pub fn num_steps(&self) -> usize {
        self.steps.len().min(self.frames.len())
    }

    /// Reads a recording.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open recording {:?}", path))?;
        Ok(bincode::deserialize_from(BufReader::new(file))?)
    }

    /// Writes the recording.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Paths of the recordings in `dir`, in name order.
pub fn read_sample_list(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut list = vec![];
    for entry in fs::read_dir(dir).context("read sample list")? {
        let entry = entry.context("read sample list")?;
        let is_recording = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with(RECORDING_PREFIX))
            .unwrap_or(false);
        if is_recording && entry.file_type()?.is_file() {
            list.push(entry.path());
        }
    }
    list.sort();
    Ok(list)
}

/// Names recording files uniquely across the environments of one run.
#[derive(Debug)]
struct Namer {
    dir: PathBuf,
    run: u128,
    count: AtomicUsize,
}

impl Namer {
    fn next(&self) -> PathBuf {
        let i = self.count.fetch_add(1, Ordering::SeqCst);
        self.dir
            .join(format!("{}{:x}_{:06}", RECORDING_PREFIX, self.run, i))
    }
}

/// Launches games of an inner factory and records their episodes into a
/// directory.
pub struct RecordingFactory<F> {
    inner: F,
    namer: Arc<Namer>,
}

impl<F: RawEnvFactory> RecordingFactory<F> {
    /// Wraps `inner`. The directory is created if needed.
    pub fn new(inner: F, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("create record dir {:?}", dir))?;
        let run = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Ok(Self {
            inner,
            namer: Arc::new(Namer {
                dir: dir.to_path_buf(),
                run,
                count: AtomicUsize::new(0),
            }),
        })
    }

    /// Number of recordings written so far.
    pub fn written(&self) -> usize {
        self.namer.count.load(Ordering::SeqCst)
    }
}

impl<F: RawEnvFactory> RawEnvFactory for RecordingFactory<F> {
    fn make(&self, game: &GameInfo) -> Result<Box<dyn RawEnv>> {
        let inner = self.inner.make(game)?;
        Ok(Box::new(RecordingEnv {
            inner,
            namer: self.namer.clone(),
            current: Recording::default(),
            last_frame: None,
        }))
    }
}

/// A game whose episodes are saved as [`Recording`]s.
///
/// An episode is written when the game ends, when it is reset, or when it is
/// closed. Steps taken without a preceding observation are not recorded.
struct RecordingEnv {
    inner: Box<dyn RawEnv>,
    namer: Arc<Namer>,
    current: Recording,
    last_frame: Option<RawObs>,
}

impl RecordingEnv {
    fn flush(&mut self) -> Result<()> {
        self.last_frame = None;
        if self.current.num_steps() == 0 {
            return Ok(());
        }
        let recording = std::mem::take(&mut self.current);
        let path = self.namer.next();
        recording.save(&path).context("save recording")?;
        debug!("recorded {} steps to {:?}", recording.num_steps(), path);
        Ok(())
    }
}

impl RawEnv for RecordingEnv {
    fn reset(&mut self) -> Result<()> {
        self.flush()?;
        self.inner.reset()
    }

    fn observe(&mut self) -> Result<RawObs> {
        let frame = self.inner.observe()?;
        self.last_frame = Some(frame.clone());
        Ok(frame)
    }

    fn step(&mut self, frame_time: Duration, events: &[InputEvent]) -> Result<(f32, bool)> {
        let frame = self.last_frame.take();
        let (reward, done) = self.inner.step(frame_time, events)?;
        if let Some(frame) = frame {
            self.current.push(frame, events.to_vec());
        }
        if done {
            self.flush()?;
        }
        Ok((reward, done))
    }

    fn close(&mut self) -> Result<()> {
        let flushed = self.flush();
        self.inner.close()?;
        flushed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        dummy::{DummyCatalog, DummyConfig, DummyFactory},
        env::{Env, EnvRegistry},
    };
    use tempdir::TempDir;
    use test_log::test;

    #[test]
    fn test_episodes_are_recorded() -> Result<()> {
        let dir = TempDir::new("recording")?;
        let inner = DummyFactory::new(DummyConfig::default().episode_len(4));
        let factory = RecordingFactory::new(inner.clone(), dir.path().join("demos"))?;
        let registry = EnvRegistry::standard(&DummyCatalog::new(16, 16));
        let spec = registry.get("DontCrash-v0")?;
        let mut env = spec.make_env(&factory, 600)?;

        for _ in 0..2 {
            env.reset()?;
            loop {
                if env.step(&[1.0])?.done {
                    break;
                }
            }
        }
        // The third episode is cut short by closing the game.
        env.reset()?;
        env.step(&[0.0])?;
        env.close()?;
        assert_eq!(inner.closed(), 1);

        let samples = read_sample_list(dir.path().join("demos"))?;
        assert_eq!(samples.len(), 3);
        assert_eq!(factory.written(), 3);
        let steps = samples
            .iter()
            .map(|p| Recording::load(p).map(|r| r.num_steps()))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(steps.iter().sum::<usize>(), 4 + 4 + 1);

        let first = Recording::load(&samples[0])?;
        assert_eq!(first.frames[0].width, 16);
        assert!(first.steps.iter().all(|events| !events.is_empty()));
        Ok(())
    }

    #[test]
    fn test_sample_list_skips_other_files() -> Result<()> {
        let dir = TempDir::new("recording")?;
        Recording::default().save(dir.path().join("recording_b"))?;
        Recording::default().save(dir.path().join("recording_a"))?;
        fs::write(dir.path().join("notes.txt"), b"not a recording")?;
        fs::create_dir(dir.path().join("recording_dir"))?;
        let list = read_sample_list(dir.path())?;
        assert_eq!(
            list,
            vec![dir.path().join("recording_a"), dir.path().join("recording_b")]
        );
        Ok(())
    }
}
