// SPDX-FileCopyrightText: 2026 Zapgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded work queue with fixed concurrency, per-task timeout, and
//! retry-priority semantics.
//!
//! Tasks are taken from the head; a failed task sleeps
//! `retry_delay * attempts` and is pushed back to the **front**, so
//! retries preempt newer work. No other reordering happens.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use zapgate_core::GatewayError;

/// Queue tuning.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_queue_size: usize,
    pub max_concurrent: usize,
    pub task_timeout: Duration,
    /// Attempts per task before it counts as a permanent failure.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10_000,
            max_concurrent: 10,
            task_timeout: Duration::from_secs(60),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// The body a worker runs for each task.
#[async_trait]
pub trait JobHandler<T>: Send + Sync {
    async fn run(&self, job: &T) -> Result<(), GatewayError>;
}

struct Job<T> {
    id: u64,
    payload: T,
    attempts: u32,
}

/// Point-in-time queue statistics.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub queue_size: usize,
    pub processing: usize,
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub dropped: u64,
    pub avg_process_time_ms: f64,
    pub success_rate: f64,
}

struct QueueCore<T> {
    config: QueueConfig,
    deque: Mutex<VecDeque<Job<T>>>,
    notify: Notify,
    accepting: AtomicBool,
    processing: AtomicUsize,
    next_id: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
    total_process_micros: AtomicU64,
}

/// Bounded FIFO task queue with a fixed worker pool.
pub struct WorkQueue<T> {
    core: Arc<QueueCore<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            core: Arc::new(QueueCore {
                config,
                deque: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                accepting: AtomicBool::new(true),
                processing: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                retried: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                total_process_micros: AtomicU64::new(0),
            }),
        }
    }

    /// Queues a task, returning its opaque id, or [`GatewayError::QueueFull`]
    /// when the queue is at capacity or stopped.
    pub fn enqueue(&self, payload: T) -> Result<u64, GatewayError> {
        if !self.core.accepting.load(Ordering::SeqCst) {
            self.core.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(GatewayError::QueueFull);
        }
        let id = {
            let mut deque = self.core.deque.lock().expect("queue lock poisoned");
            if deque.len() >= self.core.config.max_queue_size {
                drop(deque);
                self.core.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(GatewayError::QueueFull);
            }
            let id = self.core.next_id.fetch_add(1, Ordering::Relaxed);
            deque.push_back(Job {
                id,
                payload,
                attempts: 0,
            });
            id
        };
        self.core.notify.notify_one();
        Ok(id)
    }

    /// Spawns `max_concurrent` workers that run until cancellation or
    /// [`stop`](Self::stop).
    pub fn start(&self, handler: Arc<dyn JobHandler<T>>, cancel: CancellationToken) {
        for worker in 0..self.core.config.max_concurrent {
            let core = self.core.clone();
            let handler = handler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                worker_loop(core, handler, cancel).await;
                debug!(worker, "queue worker exited");
            });
        }
    }

    /// Refuses new enqueues, lets in-flight tasks finish, and returns once
    /// `processing == 0`. Queued-but-unstarted tasks are abandoned.
    pub async fn stop(&self) {
        self.core.accepting.store(false, Ordering::SeqCst);
        self.core.notify.notify_waiters();
        while self.core.processing.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let queue_size = self.core.deque.lock().expect("queue lock poisoned").len();
        let processed = self.core.processed.load(Ordering::Relaxed);
        let failed = self.core.failed.load(Ordering::Relaxed);
        let total_micros = self.core.total_process_micros.load(Ordering::Relaxed);

        let avg_process_time_ms = if processed > 0 {
            (total_micros as f64 / processed as f64) / 1000.0
        } else {
            0.0
        };
        let attempts_total = processed + failed;
        let success_rate = if attempts_total > 0 {
            processed as f64 / attempts_total as f64
        } else {
            1.0
        };

        QueueSnapshot {
            queue_size,
            processing: self.core.processing.load(Ordering::SeqCst),
            processed,
            failed,
            retried: self.core.retried.load(Ordering::Relaxed),
            dropped: self.core.dropped.load(Ordering::Relaxed),
            avg_process_time_ms,
            success_rate,
        }
    }
}

async fn worker_loop<T: Send + 'static>(
    core: Arc<QueueCore<T>>,
    handler: Arc<dyn JobHandler<T>>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() || !core.accepting.load(Ordering::SeqCst) {
            return;
        }

        let job = {
            let mut deque = core.deque.lock().expect("queue lock poisoned");
            deque.pop_front()
        };
        let mut job = match job {
            Some(job) => job,
            None => {
                tokio::select! {
                    _ = core.notify.notified() => continue,
                    _ = cancel.cancelled() => return,
                }
            }
        };

        core.processing.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let outcome = timeout(core.config.task_timeout, handler.run(&job.payload)).await;
        let elapsed = started.elapsed();
        core.processing.fetch_sub(1, Ordering::SeqCst);

        let error = match outcome {
            Ok(Ok(())) => {
                core.processed.fetch_add(1, Ordering::Relaxed);
                core.total_process_micros
                    .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
                continue;
            }
            Ok(Err(e)) => e,
            Err(_elapsed) => GatewayError::Timeout {
                duration: core.config.task_timeout,
            },
        };

        job.attempts += 1;
        if job.attempts < core.config.retry_attempts
            && core.accepting.load(Ordering::SeqCst)
            && !cancel.is_cancelled()
        {
            warn!(
                task_id = job.id,
                attempts = job.attempts,
                error = %error,
                "task failed, retrying with priority"
            );
            core.retried.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(core.config.retry_delay * job.attempts).await;
            {
                let mut deque = core.deque.lock().expect("queue lock poisoned");
                deque.push_front(job);
            }
            core.notify.notify_one();
        } else {
            warn!(
                task_id = job.id,
                attempts = job.attempts,
                error = %error,
                "task permanently failed"
            );
            core.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
