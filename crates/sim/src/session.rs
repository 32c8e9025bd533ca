//! Session coordinator: runs a receiver and a sender against one port pair

use std::sync::Arc;
use std::time::Duration;
use indicatif::ProgressBar;
use log::{error, info, warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{sleep, timeout, timeout_at, Instant};

use serial_link::{LinkConfig, LinkError, PortOpener};

use crate::receiver::{ReceiverExit, ReceiverRun, ReceiverTask, SessionStats};
use crate::sender::{SenderSummary, SenderTask};
use crate::Samples;

/// How long tasks get to wind down after cancellation before they are aborted
pub const CANCEL_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Link failure: {0}")]
    Link(#[from] LinkError),

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error("Task still running {0:?} after cancellation, aborted")]
    Abandoned(Duration),
}

#[derive(Debug)]
pub struct SessionReport {
    /// Receiver counters; all zero when the receiver never ran
    pub stats: SessionStats,
    pub receiver: Result<ReceiverExit, SessionError>,
    pub sender: Result<SenderSummary, SessionError>,
    /// The overall session timeout fired and both tasks were told to stop
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl SessionReport {
    pub fn success_rate(&self) -> f64 {
        self.stats.success_rate()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} successful, {:.1}%",
            self.stats.successes,
            self.stats.attempts,
            self.success_rate() * 100.0
        )
    }
}

enum TaskOutput {
    Sender(Result<SenderSummary, LinkError>),
    Receiver(Result<ReceiverRun, LinkError>),
}

struct Collected {
    sender_id: Id,
    receiver_id: Id,
    sender: Option<Result<SenderSummary, SessionError>>,
    receiver: Option<Result<ReceiverRun, SessionError>>,
}

impl Collected {
    fn new(sender_id: Id, receiver_id: Id) -> Self {
        Self {
            sender_id,
            receiver_id,
            sender: None,
            receiver: None,
        }
    }

    fn record_failure(&mut self, e: JoinError) {
        let failure = if e.is_panic() {
            SessionError::TaskPanicked(e.to_string())
        } else {
            SessionError::Abandoned(CANCEL_GRACE)
        };
        if e.id() == self.sender_id {
            self.sender = Some(Err(failure));
        } else if e.id() == self.receiver_id {
            self.receiver = Some(Err(failure));
        }
    }
}

pub struct Session<O: PortOpener> {
    config: LinkConfig,
    opener: Arc<O>,
    progress: Option<ProgressBar>,
}

impl<O: PortOpener> Session<O> {
    pub fn new(config: LinkConfig, opener: Arc<O>) -> Self {
        Self {
            config,
            opener,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Starts the receiver, then the sender after the stagger, and waits for
    /// both. When the overall timeout fires first, both tasks are signalled to
    /// stop; any task still running after `CANCEL_GRACE` is aborted.
    pub async fn run(&self, payloads: Vec<Samples>) -> SessionReport {
        let started = Instant::now();
        let deadline = started + self.config.overall_session_timeout;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        info!(
            "Session starting: {} packets, {} -> {}",
            payloads.len(),
            self.config.sender_endpoint,
            self.config.receiver_endpoint
        );

        let receiver = ReceiverTask::new(&self.config);
        let opener = self.opener.clone();
        let rx = cancel_rx.clone();
        let receiver_id = tasks
            .spawn(async move { TaskOutput::Receiver(receiver.run(opener, rx).await) })
            .id();

        sleep(self.config.sender_stagger).await;

        let mut sender = SenderTask::new(&self.config, payloads);
        if let Some(progress) = &self.progress {
            sender = sender.with_progress(progress.clone());
        }
        let opener = self.opener.clone();
        let sender_id = tasks
            .spawn(async move { TaskOutput::Sender(sender.run(opener, cancel_rx).await) })
            .id();

        let mut collected = Collected::new(sender_id, receiver_id);
        let timed_out = timeout_at(deadline, collect(&mut tasks, &mut collected))
            .await
            .is_err();
        if timed_out {
            warn!(
                "Session timeout after {:?}, signalling tasks to stop",
                self.config.overall_session_timeout
            );
            let _ = cancel_tx.send(true);
            if timeout(CANCEL_GRACE, collect(&mut tasks, &mut collected))
                .await
                .is_err()
            {
                warn!("Tasks ignored cancellation for {:?}, aborting", CANCEL_GRACE);
                tasks.abort_all();
                collect(&mut tasks, &mut collected).await;
            }
        }

        let sender = collected
            .sender
            .unwrap_or(Err(SessionError::Abandoned(CANCEL_GRACE)));
        let receiver = collected
            .receiver
            .unwrap_or(Err(SessionError::Abandoned(CANCEL_GRACE)));

        if let Err(e) = &sender {
            error!("Sender task failed: {}", e);
        }
        let (stats, receiver) = match receiver {
            Ok(run) => (run.stats, Ok(run.exit)),
            Err(e) => {
                error!("Receiver task failed: {}", e);
                (SessionStats::default(), Err(e))
            }
        };

        let report = SessionReport {
            stats,
            receiver,
            sender,
            timed_out,
            elapsed: started.elapsed(),
        };
        info!("FINAL RESULTS: {}", report.summary());
        report
    }
}

/// Drains finished tasks into `collected`. Safe to abandon and call again:
/// results already joined stay recorded.
async fn collect(tasks: &mut JoinSet<TaskOutput>, collected: &mut Collected) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(TaskOutput::Sender(result)) => {
                collected.sender = Some(result.map_err(SessionError::from));
            }
            Ok(TaskOutput::Receiver(result)) => {
                collected.receiver = Some(result.map_err(SessionError::from));
            }
            Err(e) => collected.record_failure(e),
        }
    }
}
