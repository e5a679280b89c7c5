use tokio::sync::{mpsc, oneshot};

use shopfloor_core::{AppError, AppResult};
use shopfloor_domain::AuditLogEntry;

use crate::audit_log::{AUDIT_ESCALATION_TARGET, AuditLog};
use crate::audit_ports::AuditEvent;

enum AuditCommand {
    Record {
        event: AuditEvent,
        ack: Option<oneshot::Sender<AppResult<AuditLogEntry>>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Single emission seam between services and the audit log.
///
/// Events are appended in submission order by one background task.
#[derive(Clone)]
pub struct AuditSink {
    sender: mpsc::UnboundedSender<AuditCommand>,
}

impl AuditSink {
    /// Starts the background writer on the current Tokio runtime.
    ///
    /// The writer stops once every sink clone has been dropped.
    #[must_use]
    pub fn spawn(log: AuditLog) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(log, receiver));
        Self { sender }
    }

    /// Queues an event without waiting for it to be stored.
    pub fn emit(&self, event: AuditEvent) {
        if let Err(error) = self.sender.send(AuditCommand::Record { event, ack: None }) {
            let AuditCommand::Record { event, .. } = error.0 else {
                return;
            };
            tracing::error!(
                target: AUDIT_ESCALATION_TARGET,
                actor = event.actor.subject.as_str(),
                action = event.action.as_str(),
                resource = event.resource.as_str(),
                "audit sink is closed, event dropped"
            );
        }
    }

    /// Queues an event and waits until the audit log accepted or rejected it.
    pub async fn emit_committed(&self, event: AuditEvent) -> AppResult<AuditLogEntry> {
        let (ack, acknowledged) = oneshot::channel();
        self.sender
            .send(AuditCommand::Record {
                event,
                ack: Some(ack),
            })
            .map_err(|_| AppError::Unavailable("audit sink is closed".to_owned()))?;

        acknowledged
            .await
            .map_err(|_| AppError::Unavailable("audit writer stopped before acknowledging".to_owned()))?
    }

    /// Waits until every event queued before this call has been processed.
    pub async fn flush(&self) -> AppResult<()> {
        let (done, drained) = oneshot::channel();
        self.sender
            .send(AuditCommand::Flush(done))
            .map_err(|_| AppError::Unavailable("audit sink is closed".to_owned()))?;

        drained
            .await
            .map_err(|_| AppError::Unavailable("audit writer stopped before draining".to_owned()))
    }
}

async fn run_writer(log: AuditLog, mut receiver: mpsc::UnboundedReceiver<AuditCommand>) {
    while let Some(command) = receiver.recv().await {
        match command {
            AuditCommand::Record { event, ack } => {
                let action = event.action;
                let result = log.append(event).await;
                match ack {
                    Some(ack) => {
                        let _ = ack.send(result);
                    }
                    None => {
                        if let Err(error) = result {
                            tracing::error!(
                                action = action.as_str(),
                                error = %error,
                                "failed to append queued audit event"
                            );
                        }
                    }
                }
            }
            AuditCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!("audit writer stopped");
}
