use std::{
    borrow::Borrow,
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    runtime::{Handle, RuntimeFlavor},
    task::AbortHandle,
};

use crate::error::CaptureError;

pub type DeferredJob = Box<dyn FnOnce() + Send + 'static>;

/// A job that has been deferred but may not have run yet.
pub trait PendingTick: Send {
    /// Prevents the job from running if it has not started. Never fails.
    fn cancel(self: Box<Self>);
}

/// Runs jobs at the next tick boundary, after the current synchronous burst
/// of work has finished.
pub trait TickScheduler: Send + Sync + 'static {
    fn defer(&self, job: DeferredJob) -> Box<dyn PendingTick>;
}

/// Defers jobs by spawning them on a tokio runtime. On a current-thread
/// runtime the job runs once the writing task yields. A ticker built with
/// [`TokioTicker::new`] on a multi-thread runtime gives no such guarantee: an
/// idle worker may run the job while the writer is still mid-burst.
#[derive(Debug, Clone)]
pub struct TokioTicker {
    handle: Handle,
    delay: Duration,
}

impl TokioTicker {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            delay: Duration::ZERO,
        }
    }

    /// Ticker bound to the current-thread runtime the caller is running on.
    pub fn current() -> Result<Self, CaptureError> {
        let handle = Handle::try_current().map_err(|_| CaptureError::MissingScheduler)?;
        if handle.runtime_flavor() != RuntimeFlavor::CurrentThread {
            return Err(CaptureError::MultiThreadRuntime);
        }
        Ok(Self::new(handle))
    }

    /// A non-zero delay requires the runtime's time driver.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct TokioPending(AbortHandle);

impl PendingTick for TokioPending {
    fn cancel(self: Box<Self>) {
        self.0.abort();
    }
}

impl TickScheduler for TokioTicker {
    fn defer(&self, job: DeferredJob) -> Box<dyn PendingTick> {
        let delay = self.delay;
        let task = self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            job();
        });
        Box::new(TokioPending(task.abort_handle()))
    }
}

#[derive(Default)]
struct ManualQueue {
    next_id: u64,
    jobs: Vec<(u64, DeferredJob)>,
}

/// Ticker driven explicitly by the host: each [`ManualTicker::run_pending`]
/// call is one tick boundary.
#[derive(Clone, Default)]
pub struct ManualTicker {
    queue: Arc<Mutex<ManualQueue>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the jobs queued before this call. Jobs deferred while running
    /// wait for the next call.
    pub fn run_pending(&self) -> usize {
        let jobs = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut queue.jobs)
        };
        let count = jobs.len();
        for (_, job) in jobs {
            job();
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .len()
    }
}

struct ManualPending {
    id: u64,
    queue: Arc<Mutex<ManualQueue>>,
}

impl PendingTick for ManualPending {
    fn cancel(self: Box<Self>) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.jobs.retain(|(id, _)| *id != self.id);
    }
}

impl TickScheduler for ManualTicker {
    fn defer(&self, job: DeferredJob) -> Box<dyn PendingTick> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.next_id += 1;
        let id = queue.next_id;
        queue.jobs.push((id, job));
        Box::new(ManualPending {
            id,
            queue: Arc::clone(&self.queue),
        })
    }
}

struct Slot {
    generation: u64,
    pending: Box<dyn PendingTick>,
}

/// At most one deferred job per key; scheduling again cancels the previous
/// one. Jobs receive their generation and must [`Debouncer::claim`] it before
/// acting, so a job that slipped past cancellation does nothing.
pub struct Debouncer<K> {
    scheduler: Arc<dyn TickScheduler>,
    slots: HashMap<K, Slot>,
    next_generation: u64,
}

impl<K: Eq + Hash> Debouncer<K> {
    pub fn new(scheduler: Arc<dyn TickScheduler>) -> Self {
        Self {
            scheduler,
            slots: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn schedule<F>(&mut self, key: K, job: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(previous) = self.slots.remove(&key) {
            previous.pending.cancel();
        }
        let pending = self.scheduler.defer(Box::new(move || job(generation)));
        self.slots.insert(
            key,
            Slot {
                generation,
                pending,
            },
        );
        generation
    }

    /// Releases the slot for a fired job. `false` when the job was superseded.
    pub fn claim<Q>(&mut self, key: &Q, generation: u64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.slots.get(key) {
            Some(slot) if slot.generation == generation => {
                self.slots.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn cancel<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.slots.remove(key) {
            Some(slot) => {
                slot.pending.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, slot) in self.slots.drain() {
            slot.pending.cancel();
        }
    }

    pub fn is_pending<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn rescheduling_cancels_the_previous_job() {
        let ticker = ManualTicker::new();
        let mut debouncer: Debouncer<&'static str> = Debouncer::new(Arc::new(ticker.clone()));
        let fired = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            debouncer.schedule("t", move |generation| fired.lock().unwrap().push(generation));
        }
        assert_eq!(ticker.pending(), 1);

        assert_eq!(ticker.run_pending(), 1);
        assert_eq!(*fired.lock().unwrap(), vec![3]);
        assert!(debouncer.claim(&"t", 3));
        assert!(!debouncer.is_pending(&"t"));
    }

    #[test]
    fn keys_are_independent() {
        let ticker = ManualTicker::new();
        let mut debouncer = Debouncer::new(Arc::new(ticker.clone()));
        let count = Arc::new(AtomicUsize::new(0));
        for key in ["a", "b", "a"] {
            let count = Arc::clone(&count);
            debouncer.schedule(key, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(debouncer.len(), 2);
        ticker.run_pending();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stale_generation_cannot_claim() {
        let ticker = ManualTicker::new();
        let mut debouncer = Debouncer::new(Arc::new(ticker.clone()));
        let first = debouncer.schedule(1u32, |_| {});
        let second = debouncer.schedule(1u32, |_| {});
        assert!(!debouncer.claim(&1u32, first));
        assert!(debouncer.claim(&1u32, second));
        assert!(!debouncer.claim(&1u32, second));
    }

    #[test]
    fn jobs_deferred_while_running_wait_for_next_tick() {
        let ticker = ManualTicker::new();
        let inner = ticker.clone();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_inner = Arc::clone(&ran);
        let _pending = ticker.defer(Box::new(move || {
            let ran = Arc::clone(&ran_inner);
            // Dropping the handle leaves the job queued.
            drop(inner.defer(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })));
        }));

        assert_eq!(ticker.run_pending(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(ticker.run_pending(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_all_empties_the_queue() {
        let ticker = ManualTicker::new();
        let mut debouncer = Debouncer::new(Arc::new(ticker.clone()));
        debouncer.schedule("a", |_| {});
        debouncer.schedule("b", |_| {});
        debouncer.cancel_all();
        assert!(debouncer.is_empty());
        assert_eq!(ticker.pending(), 0);
    }

    #[tokio::test]
    async fn tokio_ticker_runs_after_the_burst() {
        let ticker = TokioTicker::current().expect("inside a runtime");
        let mut debouncer = Debouncer::new(Arc::new(ticker));
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let count = Arc::clone(&count);
            debouncer.schedule("t", move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tokio_ticker_refuses_multi_thread_runtime() {
        assert!(matches!(
            TokioTicker::current(),
            Err(CaptureError::MultiThreadRuntime)
        ));
    }

    #[test]
    fn tokio_ticker_needs_a_runtime() {
        assert!(matches!(
            TokioTicker::current(),
            Err(CaptureError::MissingScheduler)
        ));
    }
}
