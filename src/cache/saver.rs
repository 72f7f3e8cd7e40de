//! Debounced background snapshot writer.
//!
//! Save requests during a burst of rebuilds collapse into one write: the
//! thread blocks until a request arrives, then keeps draining requests
//! until the channel has been quiet for [`DEBOUNCE_MS`], and only then
//! serializes the snapshot.

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::CacheState;

const DEBOUNCE_MS: u64 = 100;

enum Msg {
    Save,
    Shutdown,
}

pub(crate) struct Saver {
    tx: Sender<Msg>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Saver {
    pub(crate) fn spawn(state: Arc<CacheState>) -> Self {
        let (tx, rx) = channel::unbounded();
        let handle = std::thread::Builder::new()
            .name("cache-saver".to_string())
            .spawn(move || {
                loop {
                    match rx.recv() {
                        Ok(Msg::Save) => {}
                        Ok(Msg::Shutdown) | Err(_) => break,
                    }
                    // trailing edge: wait out the burst
                    loop {
                        match rx.recv_timeout(Duration::from_millis(DEBOUNCE_MS)) {
                            Ok(Msg::Save) => continue,
                            Ok(Msg::Shutdown) => return,
                            Err(RecvTimeoutError::Timeout) => break,
                            Err(RecvTimeoutError::Disconnected) => return,
                        }
                    }
                    state.write_snapshot();
                }
            })
            .expect("failed to spawn cache-saver thread");

        Self {
            tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub(crate) fn schedule(&self) {
        let _ = self.tx.send(Msg::Save);
    }

    /// Stop the thread without a final write; the caller flushes
    /// synchronously afterwards.
    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}
