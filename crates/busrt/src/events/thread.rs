// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scheduler running on a dedicated I/O thread.
//!
//! The scheduler holds non-`Send` callbacks, so it is built and set up on
//! the thread that runs it. Other threads only get a [`StopHandle`].

use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use super::error::EventError;
use super::scheduler::{Scheduler, StopHandle};
use crate::config::SchedulerConfig;
use crate::logging::targets;

/// Owns a thread running [`Scheduler::run`]. Stops and joins it on drop.
pub struct IoThread {
    name: String,
    stop: StopHandle,
    handle: Option<JoinHandle<()>>,
}

impl IoThread {
    /// Spawn `name`, build a scheduler from `config` on it, call `setup`, then run.
    ///
    /// Returns once setup has finished; a setup error is returned here and
    /// the thread exits without running.
    pub fn spawn<F>(name: &str, config: SchedulerConfig, setup: F) -> Result<Self, EventError>
    where
        F: FnOnce(&mut Scheduler) -> Result<(), EventError> + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<StopHandle, EventError>>();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut scheduler = match Scheduler::with_config(&config) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = setup(&mut scheduler) {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                if ready_tx.send(Ok(scheduler.stop_handle())).is_err() {
                    return;
                }
                log::debug!(target: targets::SYSTEM, "[{}] dispatch loop started", thread_name);
                scheduler.run();
                log::debug!(target: targets::SYSTEM, "[{}] dispatch loop exited", thread_name);
            })
            .map_err(EventError::Setup)?;

        let stop = match ready_rx.recv() {
            Ok(Ok(stop)) => stop,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(EventError::Setup(io::Error::other(
                    "I/O thread exited during setup",
                )));
            }
        };

        Ok(Self {
            name: name.to_string(),
            stop,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Whether the dispatch loop is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stop.stop();
        if handle.join().is_err() {
            log::error!(target: targets::SYSTEM, "[{}] I/O thread panicked", self.name);
        }
    }
}

impl Drop for IoThread {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
