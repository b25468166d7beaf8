//! Background checkpointing.
use anyhow::{anyhow, Result};
use log::{debug, info};
use std::{
    sync::{Arc, Condvar, Mutex},
    thread::JoinHandle,
    time::Duration,
};

/// Saves a model from a background thread: once at start, then at a fixed
/// interval, and a last time when stopped.
///
/// The save closure is responsible for taking the lock that guards the model
/// against concurrent mutation, so no save ever writes a torn parameter set.
/// A failed save stops the thread; the error is reported by [`Saver::poll`]
/// or [`Saver::finish`].
pub struct Saver {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Saver {
    /// Spawns the saver thread.
    pub fn spawn<F>(interval: Duration, mut save: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || -> Result<()> {
                let (lock, cvar) = &*stop;
                loop {
                    save()?;
                    debug!("saved checkpoint");
                    let stopped = lock.lock().unwrap();
                    let (stopped, _) = cvar
                        .wait_timeout_while(stopped, interval, |stopped| !*stopped)
                        .unwrap();
                    if *stopped {
                        break;
                    }
                }
                save()
            })
        };
        Self {
            stop,
            handle: Some(handle),
        }
    }

    fn signal(&self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("saver thread panicked"))?,
            None => Ok(()),
        }
    }

    /// Returns the error of a save that already failed, if any.
    pub fn poll(&mut self) -> Result<()> {
        let finished = self
            .handle
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(false);
        if finished {
            self.join()?;
            return Err(anyhow!("saver stopped unexpectedly"));
        }
        Ok(())
    }

    /// Stops the thread after a last save and waits for it.
    pub fn finish(mut self) -> Result<()> {
        info!("Waiting for network to save...");
        self.signal();
        self.join()
    }
}

impl Drop for Saver {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.signal();
            let _ = self.join();
        }
    }
}
