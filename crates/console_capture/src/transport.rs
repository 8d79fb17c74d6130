use std::{
    io::Write,
    sync::{Mutex, PoisonError},
};

use tokio::sync::mpsc;

use crate::{error::TransportError, message::UserConsoleLog};

/// Receives report messages one at a time. Delivery is the transport's
/// business; a failed send is logged and the message dropped.
pub trait ReportTransport: Send + Sync + 'static {
    fn send(&self, log: UserConsoleLog) -> Result<(), TransportError>;
}

impl<F> ReportTransport for F
where
    F: Fn(UserConsoleLog) -> Result<(), TransportError> + Send + Sync + 'static,
{
    fn send(&self, log: UserConsoleLog) -> Result<(), TransportError> {
        self(log)
    }
}

/// Forwards messages into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<UserConsoleLog>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UserConsoleLog>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReportTransport for ChannelTransport {
    fn send(&self, log: UserConsoleLog) -> Result<(), TransportError> {
        self.tx.send(log).map_err(|_| TransportError::Closed)
    }
}

/// Writes each message as one JSON line.
#[derive(Debug)]
pub struct NdjsonTransport<W: Write> {
    writer: Mutex<W>,
}

impl<W: Write> NdjsonTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> ReportTransport for NdjsonTransport<W> {
    fn send(&self, log: UserConsoleLog) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(&log)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}
