//! tabula: the session and execution core of a small script editor shell

pub mod config;
pub mod error;
pub mod exec;
pub mod project;
pub mod scripting;
pub mod session;
pub mod shell;
