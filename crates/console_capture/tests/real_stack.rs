use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use console_capture::{
    Channel, Console, ConsoleCapture, ManualTicker, NoContext, TransportError, UserConsoleLog,
};

const THIS_FILE: &str = "tests/real_stack.rs";

type Seen = Arc<Mutex<Vec<UserConsoleLog>>>;

fn harness(trace: bool) -> (ConsoleCapture, ManualTicker, Seen) {
    let ticker = ManualTicker::new();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let capture = ConsoleCapture::builder(move |log: UserConsoleLog| {
        sink.lock().unwrap().push(log);
        Ok::<(), TransportError>(())
    })
    .scheduler(Arc::new(ticker.clone()))
    .context(Arc::new(NoContext))
    .root(env!("CARGO_MANIFEST_DIR"))
    .print_console_trace(trace)
    .build()
    .unwrap();
    (capture, ticker, seen)
}

#[inline(never)]
fn hook(console: &Console) {
    console.log("from a hook");
}

#[inline(never)]
fn traced_hook(console: &Console) {
    console.warn("traced");
}

#[test]
fn console_calls_resolve_to_the_calling_file() {
    let (capture, ticker, seen) = harness(false);
    hook(&capture.console());
    ticker.run_pending();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].task_id, THIS_FILE);
}

#[test]
fn raw_sink_writes_resolve_to_the_calling_file() {
    let (capture, ticker, seen) = harness(false);
    writeln!(capture.stdout(), "n={}", 1).unwrap();
    capture.stdout().write_all(b"bytes").unwrap();
    capture.stderr().write_str("raw");
    ticker.run_pending();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|m| m.task_id == THIS_FILE));
    let out = seen.iter().find(|m| m.channel == Channel::Output).unwrap();
    assert_eq!(out.content, "n=1\nbytes");
}

#[test]
fn trace_mode_origin_starts_at_the_caller() {
    let (capture, ticker, seen) = harness(true);
    traced_hook(&capture.console());
    ticker.run_pending();

    let seen = seen.lock().unwrap();
    let origin = seen[0].origin.as_deref().unwrap();
    let first = origin.lines().next().unwrap();
    assert!(first.contains("real_stack::traced_hook"), "{origin}");
    assert!(first.contains(THIS_FILE), "{origin}");
}
