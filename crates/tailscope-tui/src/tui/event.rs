use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Terminal events
#[derive(Clone, Debug)]
pub enum Event {
    /// Periodic tick; drives redraws such as fading highlights
    Tick,
    /// Key press event
    Key(KeyEvent),
    /// Terminal resize
    Resize(u16, u16),
    /// Reading the terminal failed
    Error(String),
}

/// Reads terminal input on a background task and forwards it with periodic ticks
pub struct EventHandler {
    receiver: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
}

impl EventHandler {
    /// Create a new event handler with the given tick rate
    pub fn new(tick_rate: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(read_events(sender, cancel.clone(), tick_rate));

        Self { receiver, cancel }
    }

    /// Receive the next event
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Shutdown the event handler
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_events(
    sender: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
    tick_rate: Duration,
) {
    let mut reader = EventStream::new();
    let mut ticks = tokio::time::interval(tick_rate);

    loop {
        let crossterm_event = reader.next().fuse();

        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => Event::Tick,
            maybe_event = crossterm_event => match maybe_event {
                // Only presses; release events arrive on some platforms
                Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => Event::Key(key),
                Some(Ok(CrosstermEvent::Resize(w, h))) => Event::Resize(w, h),
                Some(Ok(_)) => continue,
                Some(Err(e)) => Event::Error(e.to_string()),
                None => break,
            },
        };

        if sender.send(event).is_err() {
            break;
        }
    }
}
