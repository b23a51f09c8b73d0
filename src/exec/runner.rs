//! The isolation boundary between the shell and user programs
//!
//! Each run gets a fresh Rhai engine whose only module resolvers are the
//! filtered classpath entries, so a program sees nothing of the shell's own
//! engine, settings or open sessions.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rhai::module_resolvers::{FileModuleResolver, ModuleResolversCollection};
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, Module, ModuleResolver, Position, Shared};

use super::task::{ExecutionFailure, RunOutput, RunRequest};
use crate::session::Mode;

/// Shared flag asking a task to stop
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs one program on the worker thread
pub trait Runner: Send + 'static {
    fn run(&self, request: &RunRequest, cancel: &CancelToken) -> RunOutput;
}

/// Runs Rhai programs resolved from the classpath
#[derive(Debug, Clone, Default)]
pub struct RhaiRunner {
    max_operations: u64,
}

impl RhaiRunner {
    /// `max_operations` of 0 lets programs run unbounded
    pub fn new(max_operations: u64) -> Self {
        Self { max_operations }
    }

    fn create_engine(&self, classpath: &[PathBuf], cancel: &CancelToken) -> Engine {
        let mut engine = Engine::new();

        if self.max_operations > 0 {
            engine.set_max_operations(self.max_operations);
        }

        engine.set_module_resolver(ClasspathResolver::new(classpath));

        // Best effort: only checked between operations
        let token = cancel.clone();
        engine.on_progress(move |_| token.is_cancelled().then_some(Dynamic::UNIT));

        engine
    }

    fn evaluate(
        &self,
        request: &RunRequest,
        cancel: &CancelToken,
        printed: &Arc<Mutex<Vec<String>>>,
    ) -> Result<Option<String>, ExecutionFailure> {
        let path = match &request.source {
            Some(source) => source.clone(),
            None => resolve(&request.program, &request.classpath).ok_or_else(|| {
                ExecutionFailure::Resolution {
                    program: request.program.clone(),
                }
            })?,
        };
        let source = fs::read_to_string(&path).map_err(|e| ExecutionFailure::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut engine = self.create_engine(&request.classpath, cancel);
        {
            let lines = Arc::clone(printed);
            engine.on_print(move |s| {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(s.to_string());
                }
            });
        }
        {
            let lines = Arc::clone(printed);
            engine.on_debug(move |s, _, pos| {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(format!("[{}] {}", pos, s));
                }
            });
        }

        let ast = engine
            .compile(&source)
            .map_err(|e| ExecutionFailure::Compile(e.to_string()))?;

        let value = engine
            .eval_ast::<Dynamic>(&ast)
            .map_err(|err| match *err {
                EvalAltResult::ErrorTerminated(..) => ExecutionFailure::Terminated,
                other => ExecutionFailure::Runtime(other.to_string()),
            })?;

        coerce(value)
    }
}

impl Runner for RhaiRunner {
    fn run(&self, request: &RunRequest, cancel: &CancelToken) -> RunOutput {
        let printed = Arc::new(Mutex::new(Vec::new()));
        let result = self.evaluate(request, cancel, &printed);
        let printed = printed.lock().map(|mut p| std::mem::take(&mut *p)).unwrap_or_default();

        RunOutput { printed, result }
    }
}

/// Module lookup confined to the classpath directories.
///
/// Import paths are relative to a classpath entry. Absolute paths and `..`
/// components are not found, so nothing outside the entries is loadable.
struct ClasspathResolver {
    entries: ModuleResolversCollection,
}

impl ClasspathResolver {
    fn new(classpath: &[PathBuf]) -> Self {
        let mut entries = ModuleResolversCollection::new();
        for entry in classpath.iter().filter(|e| e.is_dir()) {
            entries.push(FileModuleResolver::new_with_path(entry.clone()));
        }
        Self { entries }
    }
}

impl ModuleResolver for ClasspathResolver {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        let inside = Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !inside {
            return Err(EvalAltResult::ErrorModuleNotFound(path.to_string(), pos).into());
        }
        self.entries.resolve(engine, source, path, pos)
    }
}

/// Find `program` on the classpath. Dotted names map to subdirectories:
/// `util.strings` resolves to `util/strings.rhai`, falling back to a file
/// literally named `util.strings.rhai`.
pub fn resolve(program: &str, classpath: &[PathBuf]) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let nested: PathBuf = program
        .split('.')
        .collect::<PathBuf>()
        .with_extension(Mode::PROGRAM_EXTENSION);
    let literal = PathBuf::from(format!("{}.{}", program, Mode::PROGRAM_EXTENSION));

    classpath
        .iter()
        .filter(|entry| entry.is_dir())
        .flat_map(|entry| [entry.join(&nested), entry.join(&literal)])
        .find(|candidate| candidate.is_file())
}

/// Turn a program's value into display text
fn coerce(value: Dynamic) -> Result<Option<String>, ExecutionFailure> {
    if value.is_unit() {
        return Ok(None);
    }
    if value.is::<FnPtr>() {
        return Err(ExecutionFailure::Coercion(format!(
            "a value of type {} has no text form",
            value.type_name()
        )));
    }
    if value.is_string() {
        return value
            .into_string()
            .map(Some)
            .map_err(|t| ExecutionFailure::Coercion(t.to_string()));
    }
    Ok(Some(value.to_string()))
}
