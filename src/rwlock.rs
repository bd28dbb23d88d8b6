//! Writer-preferring reader/writer lock.
//!
//! Admits any number of concurrent readers OR one exclusive writer; once a
//! writer is waiting, new readers must wait behind it (writer-preference,
//! prevents writer starvation under steady read load). Built from the
//! classic two-binary-semaphore, two-"lightswitch" construction in "The
//! Little Book of Semaphores" §4.2.6: `no_readers`/`no_writers` gate
//! entry, `read_switch`/`write_switch` track how many readers/writers are
//! currently inside so only the first-in/last-out touches the gate.
//!
//! This primitive never reports errors and is not reentrant.
//! Unlocks must pair with their locks; [`crate::engine::StorageEngine`]
//! is responsible for calling the matching unlock on every exit path.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

struct LightswitchState {
    count: u32,
    permit: Option<OwnedSemaphorePermit>,
}

/// Tracks how many tasks are "inside" one side of the lock; the first one
/// in acquires `gate`, the last one out releases it.
struct Lightswitch {
    state: Mutex<LightswitchState>,
}

impl Lightswitch {
    fn new() -> Self {
        Self { state: Mutex::new(LightswitchState { count: 0, permit: None }) }
    }

    async fn enter(&self, gate: &Arc<Semaphore>) {
        let mut state = self.state.lock().await;
        state.count += 1;
        if state.count == 1 {
            let permit =
                gate.clone().acquire_owned().await.expect("gate semaphore is never closed");
            state.permit = Some(permit);
        }
    }

    async fn exit(&self) {
        let mut state = self.state.lock().await;
        state.count -= 1;
        if state.count == 0 {
            state.permit = None;
        }
    }
}

/// A writer-preferring reader/writer mutex over no shared data of its own
/// — callers pair `read_lock`/`read_unlock` or `write_lock`/`write_unlock`
/// around their own critical section (here, a freshly opened
/// [`crate::file_controller::FileController`]).
#[derive(Debug)]
pub struct RwPreferWriter {
    no_readers: Arc<Semaphore>,
    no_writers: Arc<Semaphore>,
    read_switch: Lightswitch,
    write_switch: Lightswitch,
}

impl std::fmt::Debug for Lightswitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lightswitch").finish_non_exhaustive()
    }
}

impl Default for RwPreferWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl RwPreferWriter {
    pub fn new() -> Self {
        Self {
            no_readers: Arc::new(Semaphore::new(1)),
            no_writers: Arc::new(Semaphore::new(1)),
            read_switch: Lightswitch::new(),
            write_switch: Lightswitch::new(),
        }
    }

    /// Admit one more reader. Blocks only while a writer holds (or is
    /// about to hold) `no_readers`.
    pub async fn read_lock(&self) {
        let gate = self.no_readers.acquire().await.expect("no_readers semaphore is never closed");
        self.read_switch.enter(&self.no_writers).await;
        drop(gate);
    }

    /// Release a reader previously admitted by [`Self::read_lock`].
    pub async fn read_unlock(&self) {
        self.read_switch.exit().await;
    }

    /// Acquire exclusive access. Returns the permit representing the hold
    /// on `no_writers`; pass it back to [`Self::write_unlock`] to release.
    pub async fn write_lock(&self) -> OwnedSemaphorePermit {
        self.write_switch.enter(&self.no_readers).await;
        self.no_writers.clone().acquire_owned().await.expect("no_writers semaphore is never closed")
    }

    /// Release a writer previously admitted by [`Self::write_lock`].
    pub async fn write_unlock(&self, permit: OwnedSemaphorePermit) {
        drop(permit);
        self.write_switch.exit().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn writers_are_mutually_exclusive() {
        let lock = Arc::new(RwPreferWriter::new());
        let inside = Arc::new(AtomicI32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let inside = inside.clone();
            tasks.push(tokio::spawn(async move {
                let permit = lock.write_lock().await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                assert_eq!(now, 1, "more than one writer held the lock at once");
                tokio::time::sleep(Duration::from_millis(1)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                lock.write_unlock(permit).await;
            }));
        }
        for task in tasks {
            task.await.expect("writer task panicked");
        }
    }

    #[tokio::test]
    async fn readers_run_concurrently() {
        let lock = Arc::new(RwPreferWriter::new());
        let concurrent = Arc::new(AtomicI32::new(0));
        let peak = Arc::new(AtomicI32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let concurrent = concurrent.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                lock.read_lock().await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
                lock.read_unlock().await;
            }));
        }
        for task in tasks {
            task.await.expect("reader task panicked");
        }

        assert!(peak.load(Ordering::SeqCst) > 1, "readers never overlapped");
    }

    #[tokio::test]
    async fn writer_excludes_concurrent_readers() {
        let lock = Arc::new(RwPreferWriter::new());
        let writer_active = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let permit = lock.write_lock().await;
        writer_active.store(true, Ordering::SeqCst);

        let reader_lock = lock.clone();
        let reader_flag = writer_active.clone();
        let reader = tokio::spawn(async move {
            reader_lock.read_lock().await;
            assert!(!reader_flag.load(Ordering::SeqCst), "reader entered while writer held the lock");
            reader_lock.read_unlock().await;
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        writer_active.store(false, Ordering::SeqCst);
        lock.write_unlock(permit).await;

        reader.await.expect("reader task panicked");
    }
}
