use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::history::History;
use super::picker::{FilePicker, NoPicker};
use super::{Buffer, Mode, Session, SessionId};
use crate::config::DEFAULT_CAPACITY;
use crate::error::SessionError;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Something the front end should react to after a manager call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Selection moved; refresh the title bar and reparse
    SelectionChanged {
        id: SessionId,
        title: String,
        mode: Mode,
    },
    /// Content reached disk; dependent types should be refreshed
    Saved { id: SessionId, path: PathBuf },
    Closed { id: SessionId },
    /// The last session was closed: leave the application
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    Exit,
}

/// Owns the set of open sessions, their tab order and selection history
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    tabs: Vec<SessionId>,
    selected: Option<SessionId>,
    history: History,
    next_id: SessionId,
    capacity: usize,
    picker: Box<dyn FilePicker>,
    effects: Vec<Effect>,
}

impl SessionManager {
    pub fn new(capacity: usize) -> Self {
        Self::with_picker(capacity, Box::new(NoPicker))
    }

    pub fn with_picker(capacity: usize, picker: Box<dyn FilePicker>) -> Self {
        Self {
            sessions: HashMap::new(),
            tabs: Vec::new(),
            selected: None,
            history: History::new(),
            next_id: 0,
            capacity: capacity.max(1),
            picker,
            effects: Vec::new(),
        }
    }

    // Queries

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn selected(&self) -> Option<SessionId> {
        self.selected
    }

    pub fn selected_session(&self) -> Option<&Session> {
        self.selected.and_then(|id| self.sessions.get(&id))
    }

    /// Session ids in tab order
    pub fn tabs(&self) -> &[SessionId] {
        &self.tabs
    }

    /// Sessions in tab order
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.tabs.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn find(&self, path: &Path) -> Option<SessionId> {
        self.iter()
            .find(|s| s.path() == Some(path))
            .map(|s| s.id)
    }

    pub fn is_dirty(&self, id: SessionId) -> Result<bool> {
        Ok(self.get(id)?.is_dirty())
    }

    pub fn title(&self) -> String {
        self.selected_session()
            .map(|s| s.title())
            .unwrap_or_else(|| "tabula".to_string())
    }

    /// Recently selected sessions, newest first, without the selected one
    pub fn recent_views(&self) -> Vec<SessionId> {
        self.history
            .mru()
            .into_iter()
            .filter(|&id| Some(id) != self.selected)
            .collect()
    }

    pub fn can_go_backward(&self) -> bool {
        self.history.can_go_backward()
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // Opening and selecting

    /// Open `path` (or a new untitled session for `None`) and select it.
    /// An already open path is selected instead of opened twice.
    pub fn open(&mut self, path: Option<&Path>) -> Result<SessionId> {
        let path = path.map(absolute).transpose()?;

        if let Some(path) = &path {
            if let Some(id) = self.find(path) {
                self.select(id)?;
                return Ok(id);
            }
        }

        let buffer = match &path {
            Some(p) if p.exists() => {
                Buffer::from_file(p).map_err(|e| SessionError::read(p.as_path(), e))?
            }
            _ => Buffer::new(),
        };

        self.persist_selected()?;
        self.evict_if_full()?;

        let id = self.next_id;
        self.next_id += 1;

        let session = match path {
            Some(path) => Session::with_file(id, path, buffer),
            None => Session::untitled(id),
        };
        tracing::info!(id, name = %session.name(), "opened session");
        self.sessions.insert(id, session);
        self.tabs.push(id);
        self.activate(id, true);

        Ok(id)
    }

    /// Create `path` holding the stub for its mode, then open and select it.
    /// The name must carry a source extension and the file must not exist.
    pub fn create_source(&mut self, path: &Path) -> Result<SessionId> {
        let path = absolute(path)?;
        let mode = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Mode::for_source_extension)
            .ok_or_else(|| SessionError::NotSourceFile(path.clone()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => SessionError::AlreadyExists(path.clone()),
                _ => SessionError::write(path.as_path(), e),
            })?;
        if let Err(e) = file.write_all(mode.stub(&name).as_bytes()) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(SessionError::write(path, e));
        }
        tracing::info!(path = %path.display(), mode = mode.display(), "created source file");

        self.open(Some(&path))
    }

    /// Select `id`, saving the session being left if it is dirty and bound
    pub fn select(&mut self, id: SessionId) -> Result<()> {
        self.get(id)?;
        if self.selected == Some(id) {
            return Ok(());
        }
        self.persist_selected()?;
        self.activate(id, true);
        Ok(())
    }

    pub fn go_backward(&mut self) -> Result<Option<SessionId>> {
        let Some(target) = self.history.backward_target() else {
            return Ok(None);
        };
        self.persist_selected()?;
        self.history.go_backward();
        self.activate(target, false);
        Ok(Some(target))
    }

    pub fn go_forward(&mut self) -> Result<Option<SessionId>> {
        let Some(target) = self.history.forward_target() else {
            return Ok(None);
        };
        self.persist_selected()?;
        self.history.go_forward();
        self.activate(target, false);
        Ok(Some(target))
    }

    // Closing

    /// Close `id`. Closing the only open session means exiting.
    pub fn close(&mut self, id: SessionId) -> Result<CloseOutcome> {
        self.get(id)?;
        if self.sessions.len() == 1 {
            self.save_if_dirty(id)?;
            self.effects.push(Effect::Exit);
            return Ok(CloseOutcome::Exit);
        }
        self.close_session(id)?;
        Ok(CloseOutcome::Closed)
    }

    /// Close every session except the selected one
    pub fn close_others(&mut self) -> Result<()> {
        let others: Vec<SessionId> = self
            .tabs
            .iter()
            .copied()
            .filter(|&id| Some(id) != self.selected)
            .collect();
        for id in others {
            self.close_session(id)?;
        }
        Ok(())
    }

    /// Drop every session without saving
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.tabs.clear();
        self.history.clear();
        self.selected = None;
    }

    // Editing and saving

    pub fn mark_dirty(&mut self, id: SessionId, dirty: bool) -> Result<()> {
        self.get_mut(id)?.set_dirty(dirty);
        Ok(())
    }

    /// Append text to a session's buffer, as the editor widget would on typing
    pub fn append(&mut self, id: SessionId, text: &str) -> Result<()> {
        let session = self.get_mut(id)?;
        session.buffer.append(text);
        session.set_dirty(true);
        Ok(())
    }

    /// Write the session to its file. Untitled sessions ask the picker first.
    pub fn save(&mut self, id: SessionId) -> Result<PathBuf> {
        let session = self.get(id)?;
        let path = match session.path() {
            Some(path) => path.to_path_buf(),
            None => {
                let name = session.name();
                self.picker
                    .pick_save_path(&name)
                    .ok_or(SessionError::NoFileChosen(name))?
            }
        };
        self.write_session(id, &path)
    }

    /// Rebind the session to a picked file and save it there
    pub fn save_as(&mut self, id: SessionId) -> Result<PathBuf> {
        let name = self.get(id)?.name();
        let path = self
            .picker
            .pick_save_path(&name)
            .ok_or(SessionError::NoFileChosen(name))?;
        self.write_session(id, &path)
    }

    /// Rebind the session to `path` and save it there
    pub fn save_to(&mut self, id: SessionId, path: &Path) -> Result<PathBuf> {
        self.get(id)?;
        self.write_session(id, path)
    }

    pub fn save_if_dirty(&mut self, id: SessionId) -> Result<()> {
        if self.get(id)?.is_dirty() {
            self.save(id)?;
        }
        Ok(())
    }

    // Internals

    fn get(&self, id: SessionId) -> Result<&Session> {
        self.sessions
            .get(&id)
            .ok_or(SessionError::UnknownSession(id))
    }

    fn get_mut(&mut self, id: SessionId) -> Result<&mut Session> {
        self.sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))
    }

    fn activate(&mut self, id: SessionId, record: bool) {
        self.selected = Some(id);
        if record {
            self.history.record_selection(id);
        }
        if let Some(session) = self.sessions.get(&id) {
            self.effects.push(Effect::SelectionChanged {
                id,
                title: session.title(),
                mode: session.mode(),
            });
        }
    }

    /// Save the selected session before leaving it, if it has a file
    fn persist_selected(&mut self) -> Result<()> {
        let Some(id) = self.selected else {
            return Ok(());
        };
        let path = match self.sessions.get(&id) {
            Some(s) if s.is_dirty() => s.path().map(Path::to_path_buf),
            _ => None,
        };
        if let Some(path) = path {
            self.write_session(id, &path)?;
        }
        Ok(())
    }

    fn evict_if_full(&mut self) -> Result<()> {
        while self.sessions.len() >= self.capacity {
            let victim = self
                .history
                .least_recently_used(self.selected)
                .map(|e| e.id)
                .or_else(|| self.tabs.iter().copied().find(|&id| Some(id) != self.selected));
            let Some(victim) = victim else {
                break;
            };
            tracing::info!(id = victim, "evicting least recently used session");
            self.close_session(victim)?;
        }
        Ok(())
    }

    fn close_session(&mut self, id: SessionId) -> Result<()> {
        self.save_if_dirty(id)?;

        self.sessions.remove(&id);
        self.tabs.retain(|&t| t != id);
        self.history.remove(id);
        self.effects.push(Effect::Closed { id });
        tracing::info!(id, "closed session");

        if self.selected == Some(id) {
            self.selected = None;
            let next = self
                .history
                .mru()
                .first()
                .copied()
                .or_else(|| self.tabs.first().copied());
            if let Some(next) = next {
                self.activate(next, true);
            }
        }
        Ok(())
    }

    fn write_session(&mut self, id: SessionId, path: &Path) -> Result<PathBuf> {
        let path = absolute(path)?;
        if let Some(other) = self.find(&path) {
            if other != id {
                return Err(SessionError::write(
                    path,
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "file is open in another session",
                    ),
                ));
            }
        }

        let is_selected = self.selected == Some(id);
        let session = self.get_mut(id)?;
        session
            .buffer
            .write_to(&path)
            .map_err(|e| SessionError::write(path.as_path(), e))?;

        let rebound = session.path() != Some(path.as_path());
        if rebound {
            session.bind(path.clone());
        }
        session.set_dirty(false);
        let (title, mode) = (session.title(), session.mode());
        tracing::info!(id, path = %path.display(), "saved session");

        self.effects.push(Effect::Saved {
            id,
            path: path.clone(),
        });
        if rebound && is_selected {
            self.effects
                .push(Effect::SelectionChanged { id, title, mode });
        }
        Ok(path)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| SessionError::read(path, e))
}
