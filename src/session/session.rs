use std::path::{Path, PathBuf};

use super::{Buffer, Mode};

/// Unique identifier for a session
pub type SessionId = usize;

const UNTITLED: &str = "Untitled";

/// One open editable unit: a buffer, optionally bound to a file
pub struct Session {
    pub id: SessionId,
    pub buffer: Buffer,
    path: Option<PathBuf>,
    dirty: bool,
    mode: Mode,
}

impl Session {
    pub fn untitled(id: SessionId) -> Self {
        Self {
            id,
            buffer: Buffer::new(),
            path: None,
            dirty: false,
            mode: Mode::Program,
        }
    }

    pub fn with_file(id: SessionId, path: PathBuf, buffer: Buffer) -> Self {
        let mode = Mode::from_path(&path);
        Self {
            id,
            buffer,
            path: Some(path),
            dirty: false,
            mode,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_untitled(&self) -> bool {
        self.path.is_none()
    }

    /// Short name shown on the tab
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| UNTITLED.to_string())
    }

    pub fn title(&self) -> String {
        let shown = self
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| UNTITLED.to_string());
        format!("[{}] - tabula", shown)
    }

    // Only the session manager writes bindings and dirty state

    pub(super) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub(super) fn bind(&mut self, path: PathBuf) {
        self.mode = Mode::from_path(&path);
        self.path = Some(path);
    }
}
