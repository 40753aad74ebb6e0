// src/runner.rs

use crate::cancellation_token::CancellationToken;
use crate::detection::DetectionState;
use crate::errors::RFIDError;
use crate::observers::{ObserverRegistry, Subscription};
use crate::scheduler::PollingScheduler;
use crate::uid::Uid;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use ufmt::uWrite;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollerStatus {
    Stopped,
    Running,
    /// The worker gave up on the reader and exited.
    Faulted(RFIDError),
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("cannot start the poller thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// The worker thread panicked and took the reader with it.
    #[error("the poller thread panicked")]
    WorkerPanicked,
}

/// Read side of a poller, cheap to clone and share between consumers.
#[derive(Clone)]
pub struct PollerHandle {
    observers: ObserverRegistry,
    status: Arc<Mutex<PollerStatus>>,
}

impl PollerHandle {
    fn new() -> Self {
        PollerHandle {
            observers: ObserverRegistry::new(),
            status: Arc::new(Mutex::new(PollerStatus::Stopped)),
        }
    }

    /// Registers a listener; it is called with the current value right away
    /// and then on every transition.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(Option<Uid>) + Send + 'static,
    {
        self.observers.subscribe(listener)
    }

    /// Detection state as of the last reported transition.
    pub fn snapshot(&self) -> DetectionState {
        self.observers.latest().into()
    }

    pub fn status(&self) -> PollerStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: PollerStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

struct Worker<SPI, CS, D, W> {
    token: CancellationToken,
    thread: JoinHandle<PollingScheduler<SPI, CS, D, W>>,
}

/// Runs a `PollingScheduler` on its own thread and fans its transitions out
/// to listeners.
pub struct Poller<SPI, CS, D, W> {
    scheduler: Option<PollingScheduler<SPI, CS, D, W>>,
    worker: Option<Worker<SPI, CS, D, W>>,
    handle: PollerHandle,
}

impl<SPI, CS, D, W> Poller<SPI, CS, D, W>
where
    SPI: SpiBus<u8> + Send + 'static,
    CS: OutputPin + Send + 'static,
    D: DelayNs + Send + 'static,
    W: uWrite + Send + 'static,
{
    pub fn new(scheduler: PollingScheduler<SPI, CS, D, W>) -> Self {
        Poller {
            scheduler: Some(scheduler),
            worker: None,
            handle: PollerHandle::new(),
        }
    }

    /// Starts polling. While the worker runs, further calls return the
    /// existing handle.
    pub fn start(&mut self) -> Result<PollerHandle, PollerError> {
        if self.is_running() {
            return Ok(self.handle.clone());
        }
        // A worker that exited on a fault is collected before restarting.
        self.join_worker()?;

        let mut scheduler = self.scheduler.take().ok_or(PollerError::WorkerPanicked)?;
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let handle = self.handle.clone();
        handle.set_status(PollerStatus::Running);

        let spawned = thread::Builder::new()
            .name("rc522-poller".into())
            .spawn(move || {
                poll_until_canceled(&mut scheduler, &worker_token, &handle);
                scheduler
            });

        match spawned {
            Ok(thread) => {
                self.worker = Some(Worker { token, thread });
                Ok(self.handle.clone())
            }
            Err(err) => {
                self.handle.set_status(PollerStatus::Stopped);
                Err(PollerError::Spawn(err))
            }
        }
    }

    pub fn handle(&self) -> PollerHandle {
        self.handle.clone()
    }
}

impl<SPI, CS, D, W> Poller<SPI, CS, D, W> {
    /// True while a worker is polling; a faulted worker no longer counts.
    pub fn is_running(&self) -> bool {
        let alive = self
            .worker
            .as_ref()
            .map_or(false, |worker| !worker.thread.is_finished());
        alive && self.handle.status() == PollerStatus::Running
    }

    /// Stops polling after the tick in progress, if any, has finished.
    /// Listeners stay registered.
    pub fn stop(&mut self) -> Result<(), PollerError> {
        self.join_worker()?;
        if self.handle.status() == PollerStatus::Running {
            self.handle.set_status(PollerStatus::Stopped);
        }
        Ok(())
    }

    fn join_worker(&mut self) -> Result<(), PollerError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.token.cancel();
        match worker.thread.join() {
            Ok(scheduler) => {
                self.scheduler = Some(scheduler);
                Ok(())
            }
            Err(_) => {
                self.handle.set_status(PollerStatus::Stopped);
                Err(PollerError::WorkerPanicked)
            }
        }
    }
}

impl<SPI, CS, D, W> Drop for Poller<SPI, CS, D, W> {
    fn drop(&mut self) {
        self.join_worker().ok();
    }
}

fn poll_until_canceled<SPI, CS, D, W>(
    scheduler: &mut PollingScheduler<SPI, CS, D, W>,
    token: &CancellationToken,
    handle: &PollerHandle,
) where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
    W: uWrite,
{
    if let Err(err) = scheduler.init() {
        handle.set_status(PollerStatus::Faulted(err));
        return;
    }

    let interval = Duration::from_millis(u64::from(scheduler.reader().config().delay_ms));
    while !token.is_canceled() {
        match scheduler.tick() {
            Ok(Some(event)) => handle.observers.publish(event.uid()),
            Ok(None) => {}
            Err(err) => {
                handle.set_status(PollerStatus::Faulted(err));
                return;
            }
        }
        token.sleep(interval);
    }
}
