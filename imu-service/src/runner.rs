use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hal::{Clock, Transport};
use log::{info, warn};

use crate::error::ServiceError;
use crate::reader::OrientationReader;
use crate::service::{ImuService, PollOutcome};

enum LoopCommand {
    Stop,
}

/// Polls a service at a fixed period on a dedicated thread
pub struct PollingLoop<T: Transport, C: Clock> {
    reader: OrientationReader,
    to_worker_tx: Option<mpsc::Sender<LoopCommand>>,
    worker_thread: Option<JoinHandle<ImuService<T, C>>>,
}

impl<T, C> PollingLoop<T, C>
where
    T: Transport + Send + 'static,
    T::Handle: Send + 'static,
    C: Clock + Clone + Send + 'static,
{
    pub fn start(mut service: ImuService<T, C>, period: Duration) -> Self {
        let reader = service.reader();
        let (to_worker_tx, to_worker_rx) = mpsc::channel();
        let worker_thread = thread::spawn(move || {
            info!("Polling every {:?}", period);
            let mut last_outcome = PollOutcome::Updated;
            loop {
                let started = Instant::now();
                let outcome = service.poll();
                if outcome == PollOutcome::NotReady && last_outcome != PollOutcome::NotReady {
                    warn!("Polling a service that is not initialized");
                }
                last_outcome = outcome;

                let wait = period.saturating_sub(started.elapsed());
                match to_worker_rx.recv_timeout(wait) {
                    Ok(LoopCommand::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                        info!("Polling stopped");
                        return service;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }
            }
        });
        Self {
            reader,
            to_worker_tx: Some(to_worker_tx),
            worker_thread: Some(worker_thread),
        }
    }

    pub fn reader(&self) -> OrientationReader {
        self.reader.clone()
    }
}

impl<T: Transport, C: Clock> PollingLoop<T, C> {
    /// Stop polling and hand the service back
    pub fn stop(mut self) -> Result<ImuService<T, C>, ServiceError> {
        self.signal_stop();
        match self.worker_thread.take() {
            Some(handle) => handle.join().map_err(|_| ServiceError::WorkerPanicked),
            None => Err(ServiceError::WorkerPanicked),
        }
    }

    fn signal_stop(&mut self) {
        if let Some(tx) = self.to_worker_tx.take() {
            let _ = tx.send(LoopCommand::Stop);
        }
    }
}

impl<T: Transport, C: Clock> Drop for PollingLoop<T, C> {
    fn drop(&mut self) {
        self.signal_stop();
        if let Some(handle) = self.worker_thread.take() {
            let _ = handle.join();
        }
    }
}
