use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::classpath::ClasspathFilter;
use super::runner::{CancelToken, RhaiRunner, Runner};
use super::task::{ExecutionEvent, ExecutionFailure, ExecutionTask, Outcome, RunOutput, RunRequest};
use crate::config::Settings;
use crate::error::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Submitting,
    Running,
}

struct Job {
    request: RunRequest,
    cancel: CancelToken,
}

struct Completion {
    generation: u64,
    output: RunOutput,
}

struct ActiveRun {
    generation: u64,
    program: String,
    cancel: CancelToken,
    busy_deadline: Instant,
}

/// Serial execution of user programs on one background worker.
///
/// The pipeline is driven from the interactive context only: it submits jobs,
/// and it drains completions when the front end asks for them. The worker
/// never calls back into the caller.
pub struct Pipeline {
    filter: ClasspathFilter,
    busy_delay: Duration,
    jobs: Option<std_mpsc::Sender<Job>>,
    completions: mpsc::UnboundedReceiver<Completion>,
    worker: Option<JoinHandle<()>>,
    state: RunState,
    active: Option<ActiveRun>,
    next_generation: u64,
    busy: bool,
}

impl Pipeline {
    pub fn new<R: Runner>(
        filter: ClasspathFilter,
        busy_delay: Duration,
        runner: R,
    ) -> io::Result<Self> {
        let (jobs_tx, jobs_rx) = std_mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::unbounded_channel::<Completion>();

        let worker = thread::Builder::new()
            .name("tabula-exec".to_string())
            .spawn(move || worker_loop(runner, jobs_rx, done_tx))?;

        Ok(Self {
            filter,
            busy_delay,
            jobs: Some(jobs_tx),
            completions: done_rx,
            worker: Some(worker),
            state: RunState::Idle,
            active: None,
            next_generation: 0,
            busy: false,
        })
    }

    /// Rhai pipeline configured from user settings
    pub fn from_settings(settings: &Settings) -> io::Result<Self> {
        Self::new(
            ClasspathFilter::new(settings.runtime_root()),
            Duration::from_millis(settings.busy_delay_ms),
            RhaiRunner::new(settings.max_operations),
        )
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.generation)
    }

    pub fn active_program(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.program.as_str())
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// When the busy indicator should appear, if it has not already
    pub fn busy_deadline(&self) -> Option<Instant> {
        if self.busy {
            return None;
        }
        self.active.as_ref().map(|a| a.busy_deadline)
    }

    /// Returns true when this poll is the one that turned the indicator on
    pub fn poll_busy(&mut self, now: Instant) -> bool {
        match self.busy_deadline() {
            Some(deadline) if now >= deadline => {
                self.busy = true;
                true
            }
            _ => false,
        }
    }

    /// Queue `task` for the worker, returning its generation id
    pub fn submit(&mut self, task: ExecutionTask) -> Result<u64, SubmitError> {
        if self.state != RunState::Idle {
            return Err(SubmitError::AlreadyRunning);
        }
        self.state = RunState::Submitting;

        let classpath = self.filter.local(&task.classpath);
        let skipped = task.classpath.len() - classpath.len();
        if skipped > 0 {
            debug!("Excluded {} platform classpath entries", skipped);
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = CancelToken::new();
        let job = Job {
            request: RunRequest {
                generation,
                program: task.program.clone(),
                source: task.source.clone(),
                classpath,
            },
            cancel: cancel.clone(),
        };

        let sent = self.jobs.as_ref().map(|jobs| jobs.send(job).is_ok()).unwrap_or(false);
        if !sent {
            warn!("Execution worker is gone, dropping run of {}", task.program);
            self.state = RunState::Idle;
            return Err(SubmitError::WorkerGone);
        }

        info!("Running {} (generation {})", task.program, generation);
        self.active = Some(ActiveRun {
            generation,
            program: task.program,
            cancel,
            busy_deadline: Instant::now() + self.busy_delay,
        });
        self.busy = false;
        self.state = RunState::Running;
        Ok(generation)
    }

    /// Stop the active run. Returns the `Cancelled` event, or `None` when
    /// nothing is running.
    pub fn cancel(&mut self) -> Option<ExecutionEvent> {
        let active = self.active.take()?;
        active.cancel.cancel();
        self.finish();

        info!("Cancelled {} (generation {})", active.program, active.generation);
        Some(ExecutionEvent {
            generation: active.generation,
            program: active.program,
            outcome: Outcome::Cancelled,
            printed: Vec::new(),
        })
    }

    /// The next terminal event, if one is ready
    pub fn try_next_event(&mut self) -> Option<ExecutionEvent> {
        while let Ok(completion) = self.completions.try_recv() {
            if let Some(event) = self.accept(completion) {
                return Some(event);
            }
        }
        None
    }

    /// Wait for the next terminal event. Resolves to `None` once the worker
    /// has stopped.
    pub async fn next_event(&mut self) -> Option<ExecutionEvent> {
        loop {
            let completion = self.completions.recv().await?;
            if let Some(event) = self.accept(completion) {
                return Some(event);
            }
        }
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        self.jobs = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Execution worker panicked during shutdown");
            }
        }
    }

    fn accept(&mut self, completion: Completion) -> Option<ExecutionEvent> {
        let current = self.active_generation();
        if current != Some(completion.generation) {
            debug!(
                "Discarding stale completion for generation {} (active: {:?})",
                completion.generation, current
            );
            return None;
        }

        let active = self.active.take()?;
        self.finish();

        let outcome = match completion.output.result {
            Ok(value) => Outcome::Completed { value },
            Err(failure) => Outcome::Failed { failure },
        };
        Some(ExecutionEvent {
            generation: active.generation,
            program: active.program,
            outcome,
            printed: completion.output.printed,
        })
    }

    fn finish(&mut self) {
        self.busy = false;
        self.state = RunState::Idle;
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        // Closing the job channel ends the worker loop once its current run
        // returns; a runaway program is not joined here.
        self.jobs = None;
    }
}

fn worker_loop<R: Runner>(
    runner: R,
    jobs: std_mpsc::Receiver<Job>,
    completions: mpsc::UnboundedSender<Completion>,
) {
    while let Ok(job) = jobs.recv() {
        let generation = job.request.generation;
        if job.cancel.is_cancelled() {
            debug!("Skipping cancelled generation {}", generation);
            continue;
        }

        let output = panic::catch_unwind(AssertUnwindSafe(|| runner.run(&job.request, &job.cancel)))
            .unwrap_or_else(|payload| RunOutput {
                printed: Vec::new(),
                result: Err(ExecutionFailure::Panicked(panic_message(payload.as_ref()))),
            });

        if completions.send(Completion { generation, output }).is_err() {
            break;
        }
    }
    debug!("Execution worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(10);

    /// Blocks each run until the test releases it
    struct GatedRunner {
        gate: Mutex<std_mpsc::Receiver<()>>,
    }

    impl Runner for GatedRunner {
        fn run(&self, request: &RunRequest, _cancel: &CancelToken) -> RunOutput {
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv();
            }
            RunOutput {
                printed: Vec::new(),
                result: Ok(Some(request.program.clone())),
            }
        }
    }

    fn gated() -> (Pipeline, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        let runner = GatedRunner { gate: Mutex::new(rx) };
        let pipeline = pipeline_with(runner);
        (pipeline, tx)
    }

    /// Reports the classpath it was given
    struct EchoRunner;

    impl Runner for EchoRunner {
        fn run(&self, request: &RunRequest, _cancel: &CancelToken) -> RunOutput {
            RunOutput {
                printed: request.classpath.iter().map(|p| p.display().to_string()).collect(),
                result: Ok(None),
            }
        }
    }

    struct PanickingRunner;

    impl Runner for PanickingRunner {
        fn run(&self, _request: &RunRequest, _cancel: &CancelToken) -> RunOutput {
            panic!("runner exploded");
        }
    }

    fn pipeline_with<R: Runner>(runner: R) -> Pipeline {
        Pipeline::new(ClasspathFilter::default(), Duration::from_secs(2), runner).unwrap()
    }

    fn rhai_pipeline() -> Pipeline {
        pipeline_with(RhaiRunner::default())
    }

    #[tokio::test]
    async fn completed_run_reports_value_and_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.rhai");
        fs::write(&path, r#"print("hi"); 6 * 7"#).unwrap();

        let mut pipeline = rhai_pipeline();
        let generation = pipeline.submit(ExecutionTask::for_source(&path, &[])).unwrap();
        assert_eq!(pipeline.state(), RunState::Running);

        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert_eq!(event.generation, generation);
        assert_eq!(event.program, "hello");
        assert_eq!(
            event.outcome,
            Outcome::Completed {
                value: Some("42".to_string())
            }
        );
        assert_eq!(event.printed, vec!["hi".to_string()]);
        assert_eq!(pipeline.state(), RunState::Idle);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn submit_while_running_is_rejected() {
        let (mut pipeline, gate) = gated();
        let first = pipeline.submit(ExecutionTask::new("first", &[])).unwrap();

        assert_eq!(
            pipeline.submit(ExecutionTask::new("second", &[])),
            Err(SubmitError::AlreadyRunning)
        );
        assert_eq!(pipeline.active_generation(), Some(first));
        assert_eq!(pipeline.active_program(), Some("first"));

        gate.send(()).unwrap();
        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert_eq!(event.generation, first);
        assert_eq!(
            event.outcome,
            Outcome::Completed {
                value: Some("first".to_string())
            }
        );
    }

    #[tokio::test]
    async fn cancelled_runs_never_complete() {
        let (mut pipeline, gate) = gated();

        pipeline.submit(ExecutionTask::new("a", &[])).unwrap();
        let cancelled = pipeline.cancel().unwrap();
        assert_eq!(cancelled.outcome, Outcome::Cancelled);
        assert_eq!(cancelled.program, "a");
        assert_eq!(pipeline.state(), RunState::Idle);

        // Queued behind `a` and cancelled before the worker reaches it
        pipeline.submit(ExecutionTask::new("b", &[])).unwrap();
        pipeline.cancel().unwrap();

        let last = pipeline.submit(ExecutionTask::new("c", &[])).unwrap();
        gate.send(()).unwrap();
        gate.send(()).unwrap();

        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert_eq!(event.generation, last);
        assert_eq!(event.program, "c");
        assert_eq!(pipeline.try_next_event(), None);
    }

    #[tokio::test]
    async fn cancel_after_completion_has_no_effect() {
        let (mut pipeline, gate) = gated();
        pipeline.submit(ExecutionTask::new("done", &[])).unwrap();
        gate.send(()).unwrap();
        timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();

        assert_eq!(pipeline.cancel(), None);
        assert_eq!(pipeline.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn second_cancel_returns_nothing() {
        let (mut pipeline, _gate) = gated();
        pipeline.submit(ExecutionTask::new("once", &[])).unwrap();

        assert!(pipeline.cancel().is_some());
        assert_eq!(pipeline.cancel(), None);
    }

    #[tokio::test]
    async fn runtime_errors_are_failed_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boom.rhai");
        fs::write(&path, r#"throw "boom";"#).unwrap();

        let mut pipeline = rhai_pipeline();
        pipeline.submit(ExecutionTask::for_source(&path, &[])).unwrap();

        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert!(matches!(
            event.outcome,
            Outcome::Failed {
                failure: ExecutionFailure::Runtime(_)
            }
        ));
        assert_eq!(pipeline.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn unknown_program_is_a_resolution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = rhai_pipeline();
        pipeline
            .submit(ExecutionTask::new("missing", &[dir.path().to_path_buf()]))
            .unwrap();

        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert_eq!(
            event.outcome,
            Outcome::Failed {
                failure: ExecutionFailure::Resolution {
                    program: "missing".to_string()
                }
            }
        );
    }

    #[tokio::test]
    async fn busy_indicator_follows_deadline() {
        let (mut pipeline, gate) = gated();
        assert_eq!(pipeline.busy_deadline(), None);

        let before = Instant::now();
        pipeline.submit(ExecutionTask::new("slow", &[])).unwrap();
        let deadline = pipeline.busy_deadline().unwrap();
        assert!(deadline >= before + Duration::from_secs(2));

        assert!(!pipeline.poll_busy(deadline - Duration::from_millis(1)));
        assert!(!pipeline.is_busy());

        assert!(pipeline.poll_busy(deadline));
        assert!(pipeline.is_busy());
        assert_eq!(pipeline.busy_deadline(), None);
        assert!(!pipeline.poll_busy(deadline + Duration::from_secs(1)));

        gate.send(()).unwrap();
        timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn cancel_clears_busy_indicator() {
        let (mut pipeline, _gate) = gated();
        pipeline.submit(ExecutionTask::new("slow", &[])).unwrap();
        let deadline = pipeline.busy_deadline().unwrap();
        pipeline.poll_busy(deadline);

        pipeline.cancel();
        assert!(!pipeline.is_busy());
        assert_eq!(pipeline.busy_deadline(), None);
    }

    #[tokio::test]
    async fn platform_entries_never_reach_the_runner() {
        let filter = ClasspathFilter::new(Some(PathBuf::from("/opt/tabula/runtime")));
        let mut pipeline = Pipeline::new(filter, Duration::from_secs(2), EchoRunner).unwrap();

        let classpath = vec![
            PathBuf::from("/home/me/scripts"),
            PathBuf::from("/opt/tabula/runtime/lib"),
            PathBuf::from("/home/me/tabula-tools.zip"),
        ];
        pipeline.submit(ExecutionTask::new("main", &classpath)).unwrap();

        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert_eq!(event.printed, vec!["/home/me/scripts".to_string()]);
    }

    #[tokio::test]
    async fn runner_panic_is_reported_and_worker_survives() {
        let mut pipeline = pipeline_with(PanickingRunner);

        pipeline.submit(ExecutionTask::new("first", &[])).unwrap();
        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert_eq!(
            event.outcome,
            Outcome::Failed {
                failure: ExecutionFailure::Panicked("runner exploded".to_string())
            }
        );

        pipeline.submit(ExecutionTask::new("second", &[])).unwrap();
        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert_eq!(event.program, "second");
    }

    #[tokio::test]
    async fn runaway_program_can_be_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let spin = dir.path().join("spin.rhai");
        let quick = dir.path().join("quick.rhai");
        fs::write(&spin, "let x = 0; loop { x += 1; }").unwrap();
        fs::write(&quick, "1 + 1").unwrap();

        let mut pipeline = rhai_pipeline();
        pipeline.submit(ExecutionTask::for_source(&spin, &[])).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pipeline.cancel().is_some());

        let generation = pipeline.submit(ExecutionTask::for_source(&quick, &[])).unwrap();
        let event = timeout(WAIT, pipeline.next_event()).await.unwrap().unwrap();
        assert_eq!(event.generation, generation);
        assert_eq!(
            event.outcome,
            Outcome::Completed {
                value: Some("2".to_string())
            }
        );
    }

    #[tokio::test]
    async fn shutdown_joins_idle_worker() {
        let pipeline = rhai_pipeline();
        pipeline.shutdown();
    }
}
