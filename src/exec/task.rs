use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::error::SubmitError;
use crate::session::{Mode, Session};

/// A single run request, with the classpath as it was when it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTask {
    pub program: String,
    /// File to evaluate. `None` resolves `program` on the classpath.
    pub source: Option<PathBuf>,
    pub classpath: Vec<PathBuf>,
}

impl ExecutionTask {
    /// Task for a program named on the classpath, `util.strings` style
    pub fn new(program: impl Into<String>, classpath: &[PathBuf]) -> Self {
        Self {
            program: program.into(),
            source: None,
            classpath: classpath.to_vec(),
        }
    }

    /// Task that evaluates exactly `path`. The file's directory goes first on
    /// the classpath so its sibling modules can be imported.
    pub fn for_source(path: &Path, classpath: &[PathBuf]) -> Self {
        let program = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut snapshot = Vec::with_capacity(classpath.len() + 1);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            snapshot.push(dir.to_path_buf());
        }
        for entry in classpath {
            if !snapshot.contains(entry) {
                snapshot.push(entry.clone());
            }
        }

        Self {
            program,
            source: Some(path.to_path_buf()),
            classpath: snapshot,
        }
    }

    /// Task for a saved Program-mode session
    pub fn for_session(session: &Session, classpath: &[PathBuf]) -> Result<Self, SubmitError> {
        match session.mode() {
            Mode::Program => {}
            Mode::Template => return Err(SubmitError::Template),
            Mode::Class | Mode::Enhancement => return Err(SubmitError::NotRunnable(session.name())),
        }
        let path = session.path().ok_or_else(|| SubmitError::Unsaved(session.name()))?;
        Ok(Self::for_source(path, classpath))
    }
}

/// What crosses into the runner: the program and the filtered classpath
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub generation: u64,
    pub program: String,
    pub source: Option<PathBuf>,
    pub classpath: Vec<PathBuf>,
}

/// What comes back from the runner
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Lines the program printed, in order
    pub printed: Vec<String>,
    /// The program's value as text (`None` for unit), or why there is none
    pub result: Result<Option<String>, ExecutionFailure>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecutionFailure {
    #[error("Program {program} not found on the classpath")]
    Resolution { program: String },

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Compile error: {0}")]
    Compile(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Cannot convert result to text: {0}")]
    Coercion(String),

    #[error("Program was stopped")]
    Terminated,

    #[error("Runner panicked: {0}")]
    Panicked(String),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Completed { value: Option<String> },
    Failed { failure: ExecutionFailure },
    Cancelled,
}

/// A terminal state reported back to the interactive context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEvent {
    pub generation: u64,
    pub program: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub printed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_source_puts_program_dir_first() {
        let classpath = vec![PathBuf::from("/lib"), PathBuf::from("/work")];
        let task = ExecutionTask::for_source(Path::new("/work/hello.rhai"), &classpath);

        assert_eq!(task.program, "hello");
        assert_eq!(task.source, Some(PathBuf::from("/work/hello.rhai")));
        assert_eq!(
            task.classpath,
            vec![PathBuf::from("/work"), PathBuf::from("/lib")]
        );
    }

    #[test]
    fn session_tasks_carry_the_session_file() {
        use crate::session::Buffer;
        let notes = Session::with_file(0, PathBuf::from("/work/main.txt"), Buffer::new());

        let task = ExecutionTask::for_session(&notes, &[]).unwrap();
        assert_eq!(task.source, Some(PathBuf::from("/work/main.txt")));
        assert_eq!(ExecutionTask::new("main", &[]).source, None);
    }

    #[test]
    fn only_program_sessions_make_tasks() {
        use crate::session::Buffer;
        let program = Session::with_file(0, PathBuf::from("/work/main.rhai"), Buffer::new());
        let template = Session::with_file(1, PathBuf::from("/work/page.rht"), Buffer::new());
        let class = Session::with_file(2, PathBuf::from("/work/Point.rhc"), Buffer::new());

        assert_eq!(
            ExecutionTask::for_session(&program, &[]).unwrap().program,
            "main"
        );
        assert_eq!(
            ExecutionTask::for_session(&template, &[]),
            Err(SubmitError::Template)
        );
        assert_eq!(
            ExecutionTask::for_session(&class, &[]),
            Err(SubmitError::NotRunnable("Point.rhc".to_string()))
        );
        assert_eq!(
            ExecutionTask::for_session(&Session::untitled(3), &[]),
            Err(SubmitError::Unsaved("Untitled".to_string()))
        );
    }

    #[test]
    fn task_snapshot_is_independent_of_later_edits() {
        let mut classpath = vec![PathBuf::from("/lib")];
        let task = ExecutionTask::new("main", &classpath);
        classpath.push(PathBuf::from("/other"));

        assert_eq!(task.classpath, vec![PathBuf::from("/lib")]);
    }

    #[test]
    fn event_serializes_flat() {
        let event = ExecutionEvent {
            generation: 3,
            program: "hello".to_string(),
            outcome: Outcome::Completed {
                value: Some("42".to_string()),
            },
            printed: vec!["hi".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["value"], "42");
        assert_eq!(json["generation"], 3);
    }

    #[test]
    fn failure_serializes_with_kind() {
        let failure = ExecutionFailure::Runtime("boom".to_string());
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "runtime");
        assert_eq!(json["detail"], "boom");
    }
}
