//! 单槽后台执行器
//!
//! 一个工作线程,任务经通道串行执行;句柄只暴露可轮询的完成标志。
//! 句柄被丢弃即视为资源回收,无需手动释放。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Polled completion flag for one submitted job.
#[derive(Clone)]
pub struct TaskHandle {
    done: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Background executor with exactly one worker thread, so at most one job
/// runs at any moment and submissions execute in FIFO order.
pub struct InferenceExecutor {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl InferenceExecutor {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let worker = thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                job();
            }
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Queue a job on the worker thread and return its completion handle.
    ///
    /// A panicking job is contained here: the flag still flips so the
    /// scheduler never stalls on a dead slot.
    pub fn submit<F>(&self, job: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let wrapped: Job = Box::new(move || {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
                error!("background inference job panicked");
            }
            flag.store(true, Ordering::Release);
        });

        let sent = self
            .tx
            .as_ref()
            .map_or(false, |tx| tx.send(wrapped).is_ok());
        if !sent {
            error!("inference worker is gone; dropping job");
            done.store(true, Ordering::Release);
        }
        TaskHandle { done }
    }
}

impl Default for InferenceExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InferenceExecutor {
    fn drop(&mut self) {
        // closing the channel lets the worker drain and exit
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
