use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use super::command::{ClasspathCommand, Command, ProjectCommand};
use super::output::{Line, LineKind};
use crate::config::Settings;
use crate::error::SubmitError;
use crate::exec::{ExecutionEvent, ExecutionTask, Outcome, Pipeline};
use crate::project::ProjectStore;
use crate::session::{CloseOutcome, Effect, SessionId, SessionManager};

pub const DEFAULT_PROJECT: &str = "default";

/// Line-oriented front end over the session manager and the pipeline
pub struct Shell {
    settings: Settings,
    manager: SessionManager,
    pipeline: Pipeline,
    classpath: Vec<PathBuf>,
    projects: ProjectStore,
    project: Option<String>,
    lines: Vec<Line>,
    pub running: bool,
}

impl Shell {
    pub fn new(settings: Settings) -> io::Result<Self> {
        let pipeline = Pipeline::from_settings(&settings)?;
        Ok(Self {
            manager: SessionManager::new(settings.capacity),
            pipeline,
            classpath: settings.classpath.clone(),
            projects: ProjectStore::from_settings(&settings),
            project: None,
            lines: Vec::new(),
            running: true,
            settings,
        })
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Output produced since the last call
    pub fn drain_lines(&mut self) -> Vec<Line> {
        std::mem::take(&mut self.lines)
    }

    // Startup

    /// Open files named on the command line. No project is tracked, so
    /// quitting leaves every project record untouched.
    pub fn open_files(&mut self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = self.manager.open(Some(path)) {
                self.error(e);
            }
        }
        if self.manager.is_empty() {
            self.new_untitled();
        }
        self.flush_effects();
    }

    /// Switch to project `name`, creating it if needed
    pub fn open_project(&mut self, name: &str) {
        if !self.projects.exists(name) {
            if let Err(e) = self.projects.create(name) {
                self.error(e);
                return;
            }
        }
        self.switch_project(name);
    }

    // Commands

    pub fn execute(&mut self, input: &str) {
        match Command::parse(input) {
            Ok(Some(command)) => self.dispatch(command),
            Ok(None) => {}
            Err(message) => self.push(LineKind::Error, message),
        }
        self.flush_effects();
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::Open(path) => {
                if let Err(e) = self.manager.open(Some(&path)) {
                    self.error(e);
                }
            }
            Command::New => self.new_untitled(),
            Command::Create(path) => {
                if let Err(e) = self.manager.create_source(&path) {
                    self.error(e);
                }
            }
            Command::Close(index) => self.close(index),
            Command::Only => {
                if let Err(e) = self.manager.close_others() {
                    self.error(e);
                }
            }
            Command::Tab(index) => match self.tab_at(index) {
                Some(id) => {
                    if let Err(e) = self.manager.select(id) {
                        self.error(e);
                    }
                }
                None => self.push(LineKind::Error, format!("No tab {}", index)),
            },
            Command::Tabs => self.list_tabs(),
            Command::Back => match self.manager.go_backward() {
                Ok(Some(_)) => {}
                Ok(None) => self.push(LineKind::Info, "Already at oldest view"),
                Err(e) => self.error(e),
            },
            Command::Forward => match self.manager.go_forward() {
                Ok(Some(_)) => {}
                Ok(None) => self.push(LineKind::Info, "Already at newest view"),
                Err(e) => self.error(e),
            },
            Command::Recent => self.list_recent(),
            Command::Write => self.with_selected(|shell, id| shell.manager.save(id).map(drop)),
            Command::SaveAs(path) => {
                self.with_selected(|shell, id| shell.manager.save_to(id, &path).map(drop))
            }
            Command::Append(mut text) => {
                text.push('\n');
                self.with_selected(|shell, id| shell.manager.append(id, &text))
            }
            Command::Run => self.run(),
            Command::Stop => match self.pipeline.cancel() {
                Some(event) => self.on_event(event),
                None => self.push(LineKind::Info, "Nothing is running"),
            },
            Command::Classpath(command) => self.classpath_command(command),
            Command::Project(command) => self.project_command(command),
            Command::Settings => match serde_json::to_string_pretty(&self.settings) {
                Ok(json) => {
                    for line in json.lines() {
                        self.push(LineKind::Info, line);
                    }
                }
                Err(e) => self.error(e),
            },
            Command::Quit { force } => self.quit(force),
        }
    }

    fn new_untitled(&mut self) {
        if let Err(e) = self.manager.open(None) {
            self.error(e);
        }
    }

    fn close(&mut self, index: Option<usize>) {
        let id = match index {
            Some(index) => self.tab_at(index),
            None => self.manager.selected(),
        };
        let Some(id) = id else {
            self.push(LineKind::Error, "No such tab");
            return;
        };
        match self.manager.close(id) {
            // The manager queues `Effect::Exit`, handled in flush_effects
            Ok(CloseOutcome::Exit) | Ok(CloseOutcome::Closed) => {}
            Err(e) => self.error(e),
        }
    }

    fn tab_at(&self, index: usize) -> Option<SessionId> {
        self.manager.tabs().get(index.checked_sub(1)?).copied()
    }

    fn list_tabs(&mut self) {
        let selected = self.manager.selected();
        let rows: Vec<String> = self
            .manager
            .tabs()
            .iter()
            .enumerate()
            .filter_map(|(i, &id)| {
                let session = self.manager.session(id)?;
                let marker = if Some(id) == selected { '>' } else { ' ' };
                let dirty = if session.is_dirty() { " [+]" } else { "" };
                Some(format!(
                    "{} {:>2} {}{} ({})",
                    marker,
                    i + 1,
                    session.name(),
                    dirty,
                    session.mode().display()
                ))
            })
            .collect();
        for row in rows {
            self.push(LineKind::Info, row);
        }
    }

    fn list_recent(&mut self) {
        let names: Vec<String> = self
            .manager
            .recent_views()
            .into_iter()
            .filter_map(|id| self.manager.session(id).map(|s| s.name()))
            .collect();
        if names.is_empty() {
            self.push(LineKind::Info, "No recent views");
        }
        for name in names {
            self.push(LineKind::Info, name);
        }
    }

    fn with_selected<F, E>(&mut self, f: F)
    where
        F: FnOnce(&mut Self, SessionId) -> Result<(), E>,
        E: std::fmt::Display,
    {
        let Some(id) = self.manager.selected() else {
            self.push(LineKind::Error, "No open session");
            return;
        };
        if let Err(e) = f(self, id) {
            self.error(e);
        }
    }

    // Execution

    fn run(&mut self) {
        let Some(id) = self.manager.selected() else {
            self.push(LineKind::Error, "Nothing to run");
            return;
        };
        if self.pipeline.is_running() {
            self.error(SubmitError::AlreadyRunning);
            return;
        }
        if let Err(e) = self.manager.save_if_dirty(id) {
            self.error(e);
            return;
        }

        let task = match self.manager.session(id) {
            Some(session) => ExecutionTask::for_session(session, &self.classpath),
            None => return,
        };
        match task.and_then(|task| self.pipeline.submit(task)) {
            Ok(generation) => {
                let program = self.pipeline.active_program().unwrap_or_default().to_string();
                self.push(LineKind::Info, format!("Running {} (#{})", program, generation));
            }
            Err(e) => self.error(e),
        }
    }

    /// Wait for the pipeline's next terminal event
    pub async fn next_event(&mut self) -> Option<ExecutionEvent> {
        self.pipeline.next_event().await
    }

    pub fn busy_deadline(&self) -> Option<Instant> {
        self.pipeline.busy_deadline()
    }

    pub fn poll_busy(&mut self, now: Instant) {
        if self.pipeline.poll_busy(now) {
            let program = self.pipeline.active_program().unwrap_or_default().to_string();
            self.push(LineKind::Status, format!("{} is still running (:stop to cancel)", program));
        }
    }

    pub fn on_event(&mut self, event: ExecutionEvent) {
        for line in &event.printed {
            self.push(LineKind::Output, line.clone());
        }
        match event.outcome {
            Outcome::Completed { value: Some(value) } => self.push(LineKind::Value, value),
            Outcome::Completed { value: None } => {
                self.push(LineKind::Info, format!("{} finished", event.program))
            }
            Outcome::Failed { failure } => self.push(LineKind::Error, failure.to_string()),
            Outcome::Cancelled => self.push(LineKind::Info, format!("Stopped {}", event.program)),
        }
    }

    // Classpath and projects

    fn classpath_command(&mut self, command: ClasspathCommand) {
        match command {
            ClasspathCommand::List => {
                if self.classpath.is_empty() {
                    self.push(LineKind::Info, "Classpath is empty");
                }
                let rows: Vec<String> = self
                    .classpath
                    .iter()
                    .enumerate()
                    .map(|(i, p)| format!("{:>2} {}", i + 1, p.display()))
                    .collect();
                for row in rows {
                    self.push(LineKind::Info, row);
                }
            }
            ClasspathCommand::Add(path) => {
                let path = std::path::absolute(&path).unwrap_or(path);
                if self.classpath.contains(&path) {
                    let text = format!("{} is already on the classpath", path.display());
                    self.push(LineKind::Info, text);
                } else {
                    self.push(LineKind::Info, format!("Added {}", path.display()));
                    self.classpath.push(path);
                }
            }
            ClasspathCommand::Remove(index) => {
                if index == 0 || index > self.classpath.len() {
                    self.push(LineKind::Error, format!("No classpath entry {}", index));
                } else {
                    let removed = self.classpath.remove(index - 1);
                    self.push(LineKind::Info, format!("Removed {}", removed.display()));
                }
            }
            ClasspathCommand::Clear => {
                self.classpath.clear();
                self.push(LineKind::Info, "Classpath cleared");
            }
        }
    }

    fn project_command(&mut self, command: ProjectCommand) {
        match command {
            ProjectCommand::List => match self.projects.list() {
                Ok(names) => {
                    if names.is_empty() {
                        self.push(LineKind::Info, "No projects");
                    }
                    for name in names {
                        let current = self.project.as_deref() == Some(name.as_str());
                        let marker = if current { '>' } else { ' ' };
                        self.push(LineKind::Info, format!("{} {}", marker, name));
                    }
                }
                Err(e) => self.error(e),
            },
            ProjectCommand::Open(name) => {
                if self.save_all("Use :saveas PATH before switching projects")
                    && self.store_project()
                {
                    self.switch_project(&name);
                }
            }
            ProjectCommand::New(name) => {
                if !self.save_all("Use :saveas PATH before switching projects") {
                    return;
                }
                if let Err(e) = self.projects.create(&name) {
                    self.error(e);
                    return;
                }
                if self.store_project() {
                    self.switch_project(&name);
                }
            }
            ProjectCommand::Save => {
                if self.project.is_none() {
                    self.push(LineKind::Error, "No project is open");
                } else if self.store_project() {
                    self.push(LineKind::Info, "Project saved");
                }
            }
        }
    }

    /// Restore project `name` in place of the open sessions, which must
    /// already be saved
    fn switch_project(&mut self, name: &str) {
        match self.projects.restore(name, &mut self.manager, &mut self.classpath) {
            Ok(project) => {
                info!("Switched to project {}", name);
                // One title line for the whole restore
                self.manager.drain_effects();
                self.project = Some(name.to_string());
                self.push(
                    LineKind::Info,
                    format!("Project {}: {} open files", name, project.open.len()),
                );
                let title = self.manager.title();
                self.push(LineKind::Status, title);
            }
            Err(e) => {
                self.error(e);
                if self.manager.is_empty() {
                    self.new_untitled();
                }
            }
        }
    }

    /// Save every dirty session. On the first failure report it with `hint`
    /// and return false, leaving the remaining sessions untouched.
    fn save_all(&mut self, hint: &str) -> bool {
        for id in self.manager.tabs().to_vec() {
            if let Err(e) = self.manager.save_if_dirty(id) {
                self.error(e);
                self.push(LineKind::Info, hint);
                return false;
            }
        }
        true
    }

    /// Write the current project's record. False when that failed.
    fn store_project(&mut self) -> bool {
        let Some(name) = self.project.clone() else {
            return true;
        };
        match self.projects.store(&name, &self.manager, &self.classpath) {
            Ok(()) => true,
            Err(e) => {
                self.error(e);
                false
            }
        }
    }

    // Leaving

    fn quit(&mut self, force: bool) {
        if force || self.save_all("Use :saveas PATH, or :q! to discard changes") {
            self.finish();
        }
    }

    fn finish(&mut self) {
        if !self.store_project() {
            warn!("Project state was not stored");
        }
        if let Some(event) = self.pipeline.cancel() {
            self.on_event(event);
        }
        self.running = false;
    }

    fn flush_effects(&mut self) {
        for effect in self.manager.drain_effects() {
            match effect {
                Effect::SelectionChanged { title, .. } => self.push(LineKind::Status, title),
                Effect::Saved { path, .. } => {
                    self.push(LineKind::Info, format!("Written {}", display(&path)))
                }
                Effect::Closed { .. } => {}
                Effect::Exit => self.finish(),
            }
        }
    }

    fn push(&mut self, kind: LineKind, text: impl Into<String>) {
        self.lines.push(Line::new(kind, text));
    }

    fn error(&mut self, e: impl std::fmt::Display) {
        self.push(LineKind::Error, format!("Error: {}", e));
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
