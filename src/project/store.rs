use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::codec::{self, Project};
use super::record::Record;
use crate::config::Settings;
use crate::error::ProjectError;
use crate::session::{Mode, SessionManager};

pub const RECORD_FILE: &str = "project.properties";

const RECORD_HEADER: &str = "tabula project";

pub type Result<T> = std::result::Result<T, ProjectError>;

/// Named projects, one directory each under a common root
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.projects_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.trim().is_empty();
        if !valid {
            return Err(ProjectError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    pub fn record_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.project_dir(name)?.join(RECORD_FILE))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.record_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Create an empty project record
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        let path = self.record_path(name)?;
        if path.is_file() {
            return Err(ProjectError::AlreadyExists(name.to_string()));
        }
        fs::create_dir_all(self.project_dir(name)?)?;
        Record::new().store(&path, Some(RECORD_HEADER))?;
        info!("Created project {}", name);
        Ok(path)
    }

    /// Names of every project with a record, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(RECORD_FILE).is_file())
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<Project> {
        let path = self.record_path(name)?;
        if !path.is_file() {
            return Err(ProjectError::Missing(path));
        }
        Ok(codec::deserialize(&Record::load(&path)?))
    }

    pub fn save(&self, name: &str, project: &Project) -> Result<()> {
        fs::create_dir_all(self.project_dir(name)?)?;
        codec::serialize(project).store(&self.record_path(name)?, Some(RECORD_HEADER))
    }

    /// Record the manager's open files and the classpath under `name`
    pub fn store(
        &self,
        name: &str,
        manager: &SessionManager,
        classpath: &[PathBuf],
    ) -> Result<()> {
        let project = Project::capture(manager, classpath);
        self.save(name, &project)?;
        info!(
            "Stored project {} ({} open files, {} classpath entries)",
            name,
            project.open.len(),
            project.classpath.len()
        );
        Ok(())
    }

    /// Replace the manager's sessions with project `name`.
    ///
    /// The record must exist and no open session may be dirty. The classpath
    /// is replaced only when the record lists entries. Without an active file
    /// the project's untitled program is opened and selected.
    pub fn restore(
        &self,
        name: &str,
        manager: &mut SessionManager,
        classpath: &mut Vec<PathBuf>,
    ) -> Result<Project> {
        if let Some(dirty) = manager.iter().find(|s| s.is_dirty()) {
            return Err(ProjectError::UnsavedChanges(dirty.name()));
        }
        let project = self.load(name)?;

        manager.clear();
        if !project.classpath.is_empty() {
            *classpath = project.classpath.clone();
        }

        for path in &project.open {
            if let Err(e) = manager.open(Some(path)) {
                warn!("Could not reopen {}: {}", path.display(), e);
            }
        }

        match &project.active {
            Some(active) => manager.open(Some(active))?,
            None => manager.open(Some(&self.untitled_program(name)?))?,
        };

        info!("Restored project {}", name);
        Ok(project)
    }

    /// The project's scratch program, created on first use
    pub fn untitled_program(&self, name: &str) -> Result<PathBuf> {
        let dir = self.project_dir(name)?;
        let path = dir.join(format!("Untitled.{}", Mode::PROGRAM_EXTENSION));
        if !path.exists() {
            fs::create_dir_all(&dir)?;
            fs::write(&path, "")?;
        }
        Ok(path)
    }
}
