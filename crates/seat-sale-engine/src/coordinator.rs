//! Implementation of the coordinator
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{after, bounded, never, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use seat_sale_core::{CustomerId, EventId, EventMeta, Rank, ReservationHandle, SeatError};
use tracing::{debug, warn};

use crate::allocator::Allocator;
use crate::job::Job;
use crate::worker::Worker;

/// Coordinator dispatching allocation jobs to a fixed pool of worker threads
///
/// Waiting for a job respects the caller's deadline. A job whose deadline
/// passes before a worker picks it up is dropped without touching the store;
/// a job already running completes, but its outcome is discarded.
pub struct Coordinator {
    jobs: Sender<Job>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create the [`Coordinator`] and start `num_workers` workers
    pub fn new(allocator: Arc<Allocator>, num_workers: usize) -> io::Result<Self> {
        let (jobs, receiver) = unbounded();
        let mut threads = Vec::with_capacity(num_workers.max(1));
        for i in 0..num_workers.max(1) {
            let worker = Worker::new(allocator.clone(), receiver.clone());
            let handle = thread::Builder::new()
                .name(format!("allocator_{i}"))
                .spawn(move || worker.run())?;
            threads.push(handle);
        }
        debug!(workers = threads.len(), "allocation workers started");

        Ok(Self {
            jobs,
            threads: Mutex::new(threads),
        })
    }

    /// Reserve a seat of `rank` at `event`, waiting at most until `deadline`
    pub fn reserve(
        &self,
        event: EventMeta,
        rank: Rank,
        customer: CustomerId,
        deadline: Option<Instant>,
    ) -> Result<ReservationHandle, SeatError> {
        let (reply, outcome) = bounded(1);
        self.submit(Job::Reserve {
            event,
            rank,
            customer,
            deadline,
            reply,
        })?;
        wait(outcome, deadline)
    }

    /// Cancel the reservation of seat `rank`-`number`, waiting at most until
    /// `deadline`
    pub fn cancel(
        &self,
        event: EventId,
        rank: Rank,
        number: u32,
        customer: CustomerId,
        deadline: Option<Instant>,
    ) -> Result<(), SeatError> {
        let (reply, outcome) = bounded(1);
        self.submit(Job::Cancel {
            event,
            rank,
            number,
            customer,
            deadline,
            reply,
        })?;
        wait(outcome, deadline)
    }

    fn submit(&self, job: Job) -> Result<(), SeatError> {
        self.jobs.send(job).map_err(|_| SeatError::ShuttingDown)
    }

    /// Stop all workers once they finished the jobs queued so far
    pub fn shutdown(&self) {
        let mut threads = self.threads.lock();
        for _ in threads.iter() {
            let _ = self.jobs.send(Job::Shutdown);
        }
        for thread in threads.drain(..) {
            let name = thread.thread().name().map(str::to_owned);
            if thread.join().is_err() {
                warn!(worker = ?name, "allocation worker panicked");
            }
        }
    }
}

fn wait<T>(
    outcome: Receiver<Result<T, SeatError>>,
    deadline: Option<Instant>,
) -> Result<T, SeatError> {
    let timeout = match deadline {
        Some(deadline) => after(deadline.saturating_duration_since(Instant::now())),
        None => never(),
    };
    select! {
        recv(outcome) -> msg => msg.unwrap_or(Err(SeatError::ShuttingDown)),
        recv(timeout) -> _ => {
            // the worker may have replied right at the deadline
            outcome.try_recv().unwrap_or(Err(SeatError::DeadlineExceeded))
        }
    }
}
