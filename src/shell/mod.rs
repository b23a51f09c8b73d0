//! Line-oriented command front end

mod command;
mod output;
mod shell;

pub use command::{ClasspathCommand, Command, ProjectCommand};
pub use output::{Line, LineKind, write_lines};
pub use shell::{DEFAULT_PROJECT, Shell};
