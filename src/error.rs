use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionId;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No open session with id {0}")]
    UnknownSession(SessionId),

    #[error("No file chosen for {0}")]
    NoFileChosen(String),

    #[error("{} is not a source file name (.rhai, .rhc, .rht or .rhx)", .0.display())]
    NotSourceFile(PathBuf),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl SessionError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Project record {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("Invalid project name: {0:?}")]
    InvalidName(String),

    #[error("Project {0} already exists")]
    AlreadyExists(String),

    #[error("{0} has unsaved changes")]
    UnsavedChanges(String),

    #[error("Malformed project record at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    #[error("A program is already running")]
    AlreadyRunning,

    #[error("{0} cannot be run")]
    NotRunnable(String),

    #[error("templates cannot be run directly yet")]
    Template,

    #[error("{0} must be saved before it can run")]
    Unsaved(String),

    #[error("Execution worker has stopped")]
    WorkerGone,
}
