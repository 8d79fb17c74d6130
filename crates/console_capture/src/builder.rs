use std::{path::PathBuf, sync::Arc};

use crate::{
    capture::{CaptureParts, ConsoleCapture},
    clock::{Clock, SystemClock},
    config::CaptureConfig,
    context::{ExecutionContext, NoContext},
    error::CaptureError,
    resolver::TaskResolver,
    schedule::{TickScheduler, TokioTicker},
    stack::{BacktraceCapture, StackCapture},
    transport::ReportTransport,
};

pub struct ConsoleCaptureBuilder {
    pub(crate) transport: Arc<dyn ReportTransport>,
    pub(crate) config: CaptureConfig,
    pub(crate) context: Option<Arc<dyn ExecutionContext>>,
    pub(crate) stack: Option<Arc<dyn StackCapture>>,
    pub(crate) clock: Option<Arc<dyn Clock>>,
    pub(crate) scheduler: Option<Arc<dyn TickScheduler>>,
}

impl ConsoleCaptureBuilder {
    pub(crate) fn new(transport: Arc<dyn ReportTransport>) -> Self {
        Self {
            transport,
            config: CaptureConfig::default(),
            context: None,
            stack: None,
            clock: None,
            scheduler: None,
        }
    }

    pub fn config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    pub fn print_console_trace(mut self, enabled: bool) -> Self {
        self.config.print_console_trace = enabled;
        self
    }

    pub fn context(mut self, context: Arc<dyn ExecutionContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn stack_capture(mut self, stack: Arc<dyn StackCapture>) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn TickScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Without an explicit scheduler the capture binds to the tokio runtime
    /// `build` is called from, which must be a current-thread runtime.
    pub fn build(self) -> Result<ConsoleCapture, CaptureError> {
        let scheduler: Arc<dyn TickScheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => {
                let ticker = TokioTicker::current()?;
                Arc::new(ticker.with_delay(self.config.flush_delay()))
            }
        };
        let stack = self
            .stack
            .unwrap_or_else(|| Arc::new(BacktraceCapture) as Arc<dyn StackCapture>);
        let context = self
            .context
            .unwrap_or_else(|| Arc::new(NoContext) as Arc<dyn ExecutionContext>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let resolver = TaskResolver::new(context, Arc::clone(&stack), self.config.root.clone());

        Ok(ConsoleCapture::from_parts(CaptureParts {
            config: self.config,
            resolver,
            stack,
            clock,
            transport: self.transport,
            scheduler,
        }))
    }
}
