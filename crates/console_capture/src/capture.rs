use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::{
    buffer::{BufferStore, WriteRecord},
    builder::ConsoleCaptureBuilder,
    clock::Clock,
    config::CaptureConfig,
    console::Console,
    emitter::Emitter,
    interceptor::StreamInterceptor,
    message::{Channel, UserConsoleLog},
    resolver::TaskResolver,
    schedule::{Debouncer, TickScheduler},
    stack::StackCapture,
    transport::ReportTransport,
};

struct CaptureState {
    buffers: BufferStore,
    flushes: Debouncer<String>,
}

pub(crate) struct Shared {
    pub(crate) config: CaptureConfig,
    pub(crate) resolver: TaskResolver,
    pub(crate) stack: Arc<dyn StackCapture>,
    pub(crate) clock: Arc<dyn Clock>,
    transport: Arc<dyn ReportTransport>,
    emitter: Emitter,
    state: Mutex<CaptureState>,
}

/// Console capture for one worker: owns the pending buffers and hands out the
/// output and error sinks that feed them.
#[derive(Clone)]
pub struct ConsoleCapture {
    shared: Arc<Shared>,
}

impl ConsoleCapture {
    pub fn builder(transport: impl ReportTransport) -> ConsoleCaptureBuilder {
        ConsoleCaptureBuilder::new(Arc::new(transport))
    }

    pub(crate) fn from_parts(parts: CaptureParts) -> Self {
        let CaptureParts {
            config,
            resolver,
            stack,
            clock,
            transport,
            scheduler,
        } = parts;
        let emitter = Emitter::new(config.print_console_trace);
        Self {
            shared: Arc::new(Shared {
                config,
                resolver,
                stack,
                clock,
                transport,
                emitter,
                state: Mutex::new(CaptureState {
                    buffers: BufferStore::new(),
                    flushes: Debouncer::new(scheduler),
                }),
            }),
        }
    }

    pub fn stdout(&self) -> StreamInterceptor {
        StreamInterceptor::new(Arc::clone(&self.shared), Channel::Output)
    }

    pub fn stderr(&self) -> StreamInterceptor {
        StreamInterceptor::new(Arc::clone(&self.shared), Channel::Error)
    }

    pub fn console(&self) -> Console {
        Console::new(self.stdout(), self.stderr())
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.shared.config
    }

    /// Task ids that currently have buffered output.
    pub fn pending_tasks(&self) -> Vec<String> {
        self.shared.lock().buffers.pending_tasks()
    }

    /// Flushes every task right away, cancelling their scheduled flushes.
    /// Meant for worker teardown.
    pub fn flush_all(&self) {
        let batches: Vec<(String, Vec<UserConsoleLog>)> = {
            let mut state = self.shared.lock();
            state.flushes.cancel_all();
            let CaptureState { buffers, .. } = &mut *state;
            buffers
                .pending_tasks()
                .into_iter()
                .map(|task_id| {
                    let messages = self
                        .shared
                        .emitter
                        .drain(buffers, &task_id, self.shared.clock.as_ref());
                    (task_id, messages)
                })
                .collect()
        };
        for (task_id, messages) in batches {
            self.shared.dispatch(&task_id, messages);
        }
    }
}

pub(crate) struct CaptureParts {
    pub(crate) config: CaptureConfig,
    pub(crate) resolver: TaskResolver,
    pub(crate) stack: Arc<dyn StackCapture>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) transport: Arc<dyn ReportTransport>,
    pub(crate) scheduler: Arc<dyn TickScheduler>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffers one write and (re)schedules the task's flush.
    pub(crate) fn record(
        self: &Arc<Self>,
        channel: Channel,
        task_id: String,
        record: WriteRecord,
        now_ms: u64,
    ) {
        let mut state = self.lock();
        state.buffers.append(&task_id, channel, record, now_ms);

        let weak = Arc::downgrade(self);
        let key = task_id.clone();
        let generation = state.flushes.schedule(task_id.clone(), move |generation| {
            if let Some(shared) = weak.upgrade() {
                shared.fire(&key, generation);
            }
        });
        trace!(
            task_id = %task_id,
            generation,
            channel = channel.as_str(),
            "scheduled console flush"
        );
    }

    fn fire(&self, task_id: &str, generation: u64) {
        let messages = {
            let mut state = self.lock();
            if !state.flushes.claim(task_id, generation) {
                return;
            }
            self.emitter
                .drain(&mut state.buffers, task_id, self.clock.as_ref())
        };
        self.dispatch(task_id, messages);
    }

    /// Sends outside the state lock so a transport that writes to the
    /// console cannot deadlock.
    fn dispatch(&self, task_id: &str, messages: Vec<UserConsoleLog>) {
        if messages.is_empty() {
            return;
        }
        debug!(task_id, messages = messages.len(), "flushed console buffers");
        for message in messages {
            if let Err(error) = self.transport.send(message) {
                warn!(?error, task_id, "dropping console report message");
            }
        }
    }
}
