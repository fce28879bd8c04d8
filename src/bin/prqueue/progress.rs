use std::{
    future::Future,
    io::{self, IsTerminal},
    time::Duration,
};

use prqueue::QueueProgress;
use tokio_util::sync::CancellationToken;

const BRAILLE_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const FRAME_INTERVAL: Duration = Duration::from_millis(80);

/// Awaits `work` while animating a spinner with `message` on stderr.
///
/// The spinner only runs when stderr is a terminal; the line is cleared
/// once `work` completes.
pub async fn with_spinner<F, T>(message: impl Into<String>, work: F) -> T
where
    F: Future<Output = T>,
{
    if !io::stderr().is_terminal() {
        return work.await;
    }

    let message = message.into();
    let token = CancellationToken::new();
    let spinner = tokio::spawn(spin(message, token.clone()));

    let result = work.await;

    token.cancel();
    let _ = spinner.await;
    eprint!("\r\x1b[2K\r");

    result
}

async fn spin(message: String, token: CancellationToken) {
    let mut interval = tokio::time::interval(FRAME_INTERVAL);
    for frame in BRAILLE_FRAMES.iter().cycle() {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => eprint!("\r{frame} {message}"),
        }
    }
}

/// Prints a completed-step line on stderr.
pub fn status(message: impl AsRef<str>) {
    eprintln!("  {}", message.as_ref());
}

/// Reports queue pipeline steps on stderr.
pub struct Spinner;

impl QueueProgress for Spinner {
    fn step<T, Fut>(&self, message: String, work: Fut) -> impl Future<Output = T>
    where
        Fut: Future<Output = T>,
    {
        with_spinner(message, work)
    }

    fn status(&self, message: String) {
        status(message);
    }
}
