use forgebatch_engine::{JobListener, JobReport};
use tracing::{debug, warn};

use crate::queue::QueueSender;

/// Job listener putting a poison message on every queue once the job ends.
///
/// Registered on a master job, it ends the worker jobs reading those queues
/// whatever the master's outcome.
#[derive(Debug)]
pub struct PoisonRecordBroadcaster<P> {
    queues: Vec<QueueSender<P>>,
}

impl<P> PoisonRecordBroadcaster<P> {
    pub fn new(queues: impl IntoIterator<Item = QueueSender<P>>) -> Self {
        Self {
            queues: queues.into_iter().collect(),
        }
    }
}

impl<P: Send> JobListener for PoisonRecordBroadcaster<P> {
    fn after_job_end(&mut self, report: &mut JobReport) {
        for queue in &self.queues {
            match queue.put_poison() {
                Ok(()) => debug!(job = %report.job_name(), queue = %queue.name(), "poison sent"),
                Err(err) => warn!(job = %report.job_name(), error = %err, "unable to send poison"),
            }
        }
    }
}
