use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::domain::{AssessmentId, CorrelatedMessage, ProcessEntry, RunReport};
use super::orchestrator::{AssessmentOrchestrator, Delivery, WorkflowError};

type Reply<T> = oneshot::Sender<Result<T, WorkflowError>>;

enum Command {
    Start(ProcessEntry, Reply<RunReport>),
    Deliver(CorrelatedMessage, Reply<Delivery>),
    Resume(AssessmentId, Reply<RunReport>),
    Report(AssessmentId, Reply<RunReport>),
    Shutdown,
}

/// Owns the orchestrator on a dedicated task and serves commands from a bounded queue.
pub struct AssessmentWorker;

impl AssessmentWorker {
    /// Spawns the worker task. Must be called from within a tokio runtime.
    pub fn start(orchestrator: Arc<AssessmentOrchestrator>, queue_capacity: usize) -> WorkerHandle {
        let (sender, mut receiver) = mpsc::channel(queue_capacity.max(1));
        let task = tokio::spawn(async move {
            info!("assessment worker started");
            while let Some(command) = receiver.recv().await {
                match command {
                    Command::Start(entry, reply) => {
                        let _ = reply.send(orchestrator.start(entry));
                    }
                    Command::Deliver(message, reply) => {
                        let _ = reply.send(orchestrator.deliver(message));
                    }
                    Command::Resume(assessment_id, reply) => {
                        let _ = reply.send(orchestrator.resume(assessment_id));
                    }
                    Command::Report(assessment_id, reply) => {
                        let _ = reply.send(orchestrator.report(assessment_id));
                    }
                    Command::Shutdown => {
                        debug!("assessment worker shutdown requested");
                        break;
                    }
                }
            }
            info!("assessment worker stopped");
        });

        WorkerHandle {
            client: WorkerClient { sender },
            task,
        }
    }
}

/// Cloneable sender side of the worker queue.
#[derive(Clone)]
pub struct WorkerClient {
    sender: mpsc::Sender<Command>,
}

impl WorkerClient {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, WorkflowError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| WorkflowError::WorkerUnavailable)?;
        response.await.map_err(|_| WorkflowError::WorkerUnavailable)?
    }

    pub async fn start(&self, entry: ProcessEntry) -> Result<RunReport, WorkflowError> {
        self.request(|reply| Command::Start(entry, reply)).await
    }

    pub async fn deliver(&self, message: CorrelatedMessage) -> Result<Delivery, WorkflowError> {
        self.request(|reply| Command::Deliver(message, reply)).await
    }

    pub async fn resume(&self, assessment_id: AssessmentId) -> Result<RunReport, WorkflowError> {
        self.request(|reply| Command::Resume(assessment_id, reply)).await
    }

    pub async fn report(&self, assessment_id: AssessmentId) -> Result<RunReport, WorkflowError> {
        self.request(|reply| Command::Report(assessment_id, reply)).await
    }
}

pub struct WorkerHandle {
    client: WorkerClient,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn client(&self) -> WorkerClient {
        self.client.clone()
    }

    /// Stops the worker after the commands already queued have been served.
    pub async fn shutdown(self) {
        if self.client.sender.send(Command::Shutdown).await.is_err() {
            debug!("assessment worker already stopped");
        }
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "assessment worker task failed");
        }
    }
}
