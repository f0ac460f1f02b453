//! Single-owner executor.
//!
//! State of type `T` lives on exactly one thread; everything else sends it
//! `FnOnce(&mut T)` tasks which run in arrival order.

use anyhow::anyhow;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type Task<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

enum Message<T> {
    Run(Task<T>),
    Shutdown,
}

/// Cloneable posting side of an executor.
pub struct ExecutorHandle<T> {
    tx: Sender<Message<T>>,
}

impl<T> Clone for ExecutorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ExecutorHandle<T> {
    /// Queue `task`. Returns `false` once the executor has gone away.
    pub fn execute<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.tx.send(Message::Run(Box::new(task))).is_ok()
    }
}

/// Queue that has not been bound to a thread yet.
///
/// Tests drain it by hand with [`ExecutorQueue::run_pending`]; the service
/// hands it to [`ExecutorQueue::spawn`].
pub struct ExecutorQueue<T> {
    handle: ExecutorHandle<T>,
    rx: Receiver<Message<T>>,
}

impl<T> Default for ExecutorQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExecutorQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            handle: ExecutorHandle { tx },
            rx,
        }
    }

    pub fn handle(&self) -> ExecutorHandle<T> {
        self.handle.clone()
    }

    /// Run every queued task against `state`. Returns how many ran.
    pub fn run_pending(&self, state: &mut T) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(Message::Run(task)) => {
                    task(state);
                    ran += 1;
                }
                Ok(Message::Shutdown) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Block until one task arrives or `timeout` passes, then drain the rest.
    pub fn run_next(&self, state: &mut T, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(Message::Run(task)) => {
                task(state);
                1 + self.run_pending(state)
            }
            Ok(Message::Shutdown) | Err(_) => 0,
        }
    }
}

impl<T: Send + 'static> ExecutorQueue<T> {
    /// Move `state` onto a new named thread that serves this queue.
    pub fn spawn(self, name: &str, mut state: T) -> anyhow::Result<ShellExecutor<T>> {
        let rx = self.rx;
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for message in rx {
                    match message {
                        Message::Run(task) => task(&mut state),
                        Message::Shutdown => break,
                    }
                }
                state
            })
            .map_err(|err| anyhow!("failed to spawn executor thread {name}: {err}"))?;
        Ok(ShellExecutor {
            handle: self.handle,
            join: Some(join),
        })
    }
}

/// Executor thread owning a `T`.
pub struct ShellExecutor<T> {
    handle: ExecutorHandle<T>,
    join: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> ShellExecutor<T> {
    pub fn handle(&self) -> ExecutorHandle<T> {
        self.handle.clone()
    }

    pub fn execute<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.handle.execute(task)
    }

    /// Run `f` on the executor and wait for its result.
    ///
    /// Must not be called from a task already running on this executor.
    pub fn call<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let queued = self.handle.execute(move |state| {
            let _ = tx.send(f(state));
        });
        if !queued {
            return None;
        }
        rx.recv().ok()
    }

    /// Finish queued tasks, stop the thread and hand the state back.
    pub fn shutdown(mut self) -> Option<T> {
        self.stop()
    }

    fn stop(&mut self) -> Option<T> {
        let join = self.join.take()?;
        let _ = self.handle.tx.send(Message::Shutdown);
        match join.join() {
            Ok(state) => Some(state),
            Err(_) => {
                tracing::error!("executor thread panicked");
                None
            }
        }
    }
}

impl<T> Drop for ShellExecutor<T> {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.handle.tx.send(Message::Shutdown);
            let _ = join.join();
        }
    }
}
