use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::controller::PollTicket;
use tailscope_client::{ApiError, ExpClient};
use tailscope_types::{FetchLogRequest, FetchLogResponse};

/// Anything that can answer a log fetch
pub trait LogSource: Send + Sync + 'static {
    fn fetch_log(
        &self,
        request: &FetchLogRequest,
    ) -> impl Future<Output = Result<FetchLogResponse, ApiError>> + Send;
}

impl LogSource for ExpClient {
    fn fetch_log(
        &self,
        request: &FetchLogRequest,
    ) -> impl Future<Output = Result<FetchLogResponse, ApiError>> + Send {
        ExpClient::fetch_log(self, request)
    }
}

/// A completed fetch, still tagged with the ticket that asked for it
#[derive(Debug)]
pub struct PollEvent {
    pub ticket: PollTicket,
    pub result: Result<FetchLogResponse, ApiError>,
}

/// Runs fetches in the background and reports results over a channel
pub struct LogPoller<S> {
    source: Arc<S>,
    tx: mpsc::UnboundedSender<PollEvent>,

    /// Cancels every fetch still in flight
    cancel: CancellationToken,
}

impl<S: LogSource> LogPoller<S> {
    pub fn new(source: Arc<S>, tx: mpsc::UnboundedSender<PollEvent>) -> Self {
        Self {
            source,
            tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Start the fetch described by `ticket`
    pub fn issue(&self, ticket: PollTicket) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        let request = ticket.request.clone();

        trace!("fetching '{}' from {:?}", request.path, request.logs_data);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = source.fetch_log(&request) => {
                    // Receiver gone means the app is shutting down
                    let _ = tx.send(PollEvent { ticket, result });
                }
            }
        });
    }

    /// Abandon in-flight fetches; later fetches are unaffected
    pub fn abandon(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl<S> Drop for LogPoller<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use std::time::Duration;
    use tailscope_types::ContinuationToken;

    struct FakeSource {
        delay: Duration,
    }

    impl LogSource for FakeSource {
        async fn fetch_log(&self, request: &FetchLogRequest) -> Result<FetchLogResponse, ApiError> {
            tokio::time::sleep(self.delay).await;
            Ok(FetchLogResponse {
                url: request.path.clone(),
                headers: vec!["message".into()],
                joint_log: vec![vec![serde_json::Value::from("hello")]],
                logs_data: ContinuationToken("next".into()),
                is_running: true,
            })
        }
    }

    fn ticket(path: &str) -> PollTicket {
        PollTicket {
            session: SessionId(1),
            path: path.to_string(),
            request: FetchLogRequest {
                path: path.to_string(),
                logs_data: None,
                wait_for_start: false,
                timeout: 10,
            },
        }
    }

    #[tokio::test]
    async fn test_result_delivered_with_ticket() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = LogPoller::new(Arc::new(FakeSource { delay: Duration::ZERO }), tx);

        poller.issue(ticket("exp/a"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.ticket.path, "exp/a");
        assert_eq!(event.result.unwrap().url, "exp/a");
    }

    #[tokio::test]
    async fn test_abandoned_fetch_reports_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = LogPoller::new(
            Arc::new(FakeSource {
                delay: Duration::from_secs(30),
            }),
            tx,
        );

        poller.issue(ticket("exp/a"));
        poller.abandon();

        let waited = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(waited.is_err());
    }
}
