use std::path::PathBuf;

/// One line of shell input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(PathBuf),
    /// Open an untitled buffer
    New,
    /// Create a source file from its mode's stub
    Create(PathBuf),
    /// Close a tab by 1-based position, or the selected one
    Close(Option<usize>),
    Only,
    Tab(usize),
    Tabs,
    Back,
    Forward,
    Recent,
    Write,
    SaveAs(PathBuf),
    Append(String),
    Run,
    Stop,
    Classpath(ClasspathCommand),
    Project(ProjectCommand),
    Settings,
    Quit { force: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClasspathCommand {
    List,
    Add(PathBuf),
    Remove(usize),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectCommand {
    List,
    Open(String),
    New(String),
    Save,
}

impl Command {
    /// Parse a line. Lines that do not start with `:` are text to append to
    /// the selected buffer. Blank input parses to `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let Some(rest) = line.strip_prefix(':') else {
            if line.trim().is_empty() {
                return Ok(None);
            }
            return Ok(Some(Command::Append(line.to_string())));
        };

        let rest = rest.trim();
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "" => return Ok(None),
            "o" | "open" | "e" | "edit" => Command::Open(path_arg(name, arg)?),
            "new" | "enew" if arg.is_empty() => Command::New,
            "new" | "enew" => Command::Create(PathBuf::from(arg)),
            "close" | "bd" => Command::Close(optional_index(name, arg)?),
            "only" => Command::Only,
            "tab" | "b" => Command::Tab(index_arg(name, arg)?),
            "tabs" | "ls" => Command::Tabs,
            "back" => Command::Back,
            "fwd" | "forward" => Command::Forward,
            "recent" => Command::Recent,
            "w" | "write" => Command::Write,
            "saveas" | "sav" => Command::SaveAs(path_arg(name, arg)?),
            "append" | "a" => Command::Append(arg.to_string()),
            "run" | "r" => Command::Run,
            "stop" => Command::Stop,
            "cp" | "classpath" => Command::Classpath(ClasspathCommand::parse(arg)?),
            "project" | "p" => Command::Project(ProjectCommand::parse(arg)?),
            "settings" => Command::Settings,
            "q" | "quit" => Command::Quit { force: false },
            "q!" | "quit!" => Command::Quit { force: true },
            _ => return Err(format!("Unknown command: {}", name)),
        };
        Ok(Some(command))
    }
}

impl ClasspathCommand {
    fn parse(arg: &str) -> Result<Self, String> {
        let (sub, rest) = split(arg);
        match sub {
            "" | "ls" | "list" => Ok(Self::List),
            "add" => Ok(Self::Add(path_arg("cp add", rest)?)),
            "rm" | "remove" => Ok(Self::Remove(index_arg("cp rm", rest)?)),
            "clear" => Ok(Self::Clear),
            _ => Err(format!("Unknown classpath command: {}", sub)),
        }
    }
}

impl ProjectCommand {
    fn parse(arg: &str) -> Result<Self, String> {
        let (sub, rest) = split(arg);
        match sub {
            "" | "ls" | "list" => Ok(Self::List),
            "open" => Ok(Self::Open(name_arg("project open", rest)?)),
            "new" => Ok(Self::New(name_arg("project new", rest)?)),
            "save" => Ok(Self::Save),
            _ => Err(format!("Unknown project command: {}", sub)),
        }
    }
}

fn split(arg: &str) -> (&str, &str) {
    match arg.split_once(char::is_whitespace) {
        Some((sub, rest)) => (sub, rest.trim()),
        None => (arg, ""),
    }
}

fn path_arg(command: &str, arg: &str) -> Result<PathBuf, String> {
    if arg.is_empty() {
        return Err(format!(":{} needs a path", command));
    }
    Ok(PathBuf::from(arg))
}

fn name_arg(command: &str, arg: &str) -> Result<String, String> {
    if arg.is_empty() {
        return Err(format!(":{} needs a name", command));
    }
    Ok(arg.to_string())
}

fn index_arg(command: &str, arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!(":{} needs a tab number", command)),
    }
}

fn optional_index(command: &str, arg: &str) -> Result<Option<usize>, String> {
    if arg.is_empty() {
        return Ok(None);
    }
    index_arg(command, arg).map(Some)
}
