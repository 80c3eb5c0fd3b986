//! Implementation of the allocation workers

use std::sync::Arc;

use crossbeam::channel::Receiver;
use tracing::{debug, info};

use crate::allocator::Allocator;
use crate::job::Job;

/// A thread executing reservations and cancellations
pub struct Worker {
    allocator: Arc<Allocator>,
    jobs: Receiver<Job>,
}

impl Worker {
    /// Create a new [`Worker`] taking jobs from `jobs`
    pub fn new(allocator: Arc<Allocator>, jobs: Receiver<Job>) -> Self {
        Self { allocator, jobs }
    }

    /// main worker loop
    pub fn run(&self) {
        debug!("allocation worker started");
        // the loop also ends once the coordinator is dropped
        for job in self.jobs.iter() {
            match job {
                Job::Reserve {
                    event,
                    rank,
                    customer,
                    deadline,
                    reply,
                } => {
                    // no attempt starts past the deadline
                    let outcome = self.allocator.reserve(&event, rank, customer, deadline);
                    if let Err(rejected) = reply.send(outcome) {
                        info!(
                            event = event.id,
                            %customer,
                            outcome = ?rejected.into_inner(),
                            "caller gave up, discarding reservation outcome"
                        );
                    }
                }
                Job::Cancel {
                    event,
                    rank,
                    number,
                    customer,
                    deadline,
                    reply,
                } => {
                    let outcome = self.allocator.cancel(event, rank, number, customer, deadline);
                    if let Err(rejected) = reply.send(outcome) {
                        info!(
                            event,
                            %customer,
                            outcome = ?rejected.into_inner(),
                            "caller gave up, discarding cancellation outcome"
                        );
                    }
                }
                Job::Shutdown => break,
            }
        }
        debug!("allocation worker stopped");
    }
}
