//! Background tokenization
//!
//! Documents hand the worker a rope snapshot plus a clone of their cache. The
//! worker returns the refreshed cache tagged with the version it was computed
//! against; the owner applies it only if the document has not changed since.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ropey::Rope;
use tracing::{debug, trace};

use super::SyntaxCache;
use crate::editor::DocumentId;

/// Work item sent to the tokenizer thread
pub struct TokenizeJob {
    pub document: DocumentId,
    pub version: u64,
    pub text: Rope,
    pub cache: SyntaxCache,
    /// Set when the document is closed
    pub cancel: Arc<AtomicBool>,
}

/// Refreshed cache for a document
pub struct TokenizeResult {
    pub document: DocumentId,
    pub version: u64,
    pub cache: SyntaxCache,
}

pub struct TokenizerWorker {
    jobs: Option<Sender<TokenizeJob>>,
    results: Receiver<TokenizeResult>,
    handle: Option<JoinHandle<()>>,
}

impl TokenizerWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<TokenizeJob>();
        let (result_tx, result_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("tokenizer".to_string())
            .spawn(move || run(job_rx, result_tx))?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    /// Queue a job. Returns false if the worker has stopped.
    pub fn submit(&self, job: TokenizeJob) -> bool {
        self.jobs.as_ref().is_some_and(|tx| tx.send(job).is_ok())
    }

    /// Drain finished jobs without blocking
    pub fn poll(&self) -> Vec<TokenizeResult> {
        self.results.try_iter().collect()
    }

    /// Wait up to `timeout` for the next finished job
    pub fn wait(&self, timeout: Duration) -> Option<TokenizeResult> {
        match self.results.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for TokenizerWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the thread loop
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(jobs: Receiver<TokenizeJob>, results: Sender<TokenizeResult>) {
    for mut job in jobs {
        if job.cancel.load(Ordering::Relaxed) {
            debug!(document = job.document, "tokenize job cancelled before start");
            continue;
        }

        let lines = job
            .cache
            .retokenize(&job.text, job.version, Some(&*job.cancel));
        if job.cancel.load(Ordering::Relaxed) {
            debug!(document = job.document, "tokenize job cancelled");
            continue;
        }
        trace!(document = job.document, version = job.version, lines, "tokenized");

        let result = TokenizeResult {
            document: job.document,
            version: job.version,
            cache: job.cache,
        };
        if results.send(result).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Language, StyleTag};
    use super::*;

    fn job(document: DocumentId, version: u64, text: &str, cancel: bool) -> TokenizeJob {
        let text = Rope::from_str(text);
        TokenizeJob {
            document,
            version,
            cache: SyntaxCache::new(Language::detect("main.rs"), text.len_lines()),
            text,
            cancel: Arc::new(AtomicBool::new(cancel)),
        }
    }

    #[test]
    fn test_worker_returns_versioned_cache() {
        let worker = TokenizerWorker::spawn().unwrap();
        assert!(worker.submit(job(7, 3, "fn main() {}\n// hi", false)));

        let result = worker.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(result.document, 7);
        assert_eq!(result.version, 3);
        assert_eq!(result.cache.version(), 3);
        assert!(!result.cache.is_dirty());
        assert_eq!(
            result.cache.line_spans(1).and_then(|s| s.first()).map(|s| s.style),
            Some(StyleTag::Comment)
        );
    }

    #[test]
    fn test_cancelled_job_produces_nothing() {
        let worker = TokenizerWorker::spawn().unwrap();
        worker.submit(job(1, 1, "let a = 1;", true));
        worker.submit(job(2, 1, "let b = 2;", false));

        let result = worker.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(result.document, 2);
        assert!(worker.poll().is_empty());
    }
}
