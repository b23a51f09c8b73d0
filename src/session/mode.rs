use std::path::Path;

/// What kind of source unit a session holds, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Program,
    Class,
    Template,
    Enhancement,
}

impl Mode {
    /// Extension of program files; also used for untitled sessions
    pub const PROGRAM_EXTENSION: &'static str = "rhai";

    /// Detect mode from file extension
    pub fn from_extension(ext: &str) -> Self {
        Self::for_source_extension(ext).unwrap_or_default()
    }

    /// Mode of a source file extension, `None` for anything else
    pub fn for_source_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rhai" => Some(Mode::Program),
            "rhc" => Some(Mode::Class),
            "rht" => Some(Mode::Template),
            "rhx" => Some(Mode::Enhancement),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or_default()
    }

    /// Starting content for a new file of this mode. `name` is the file stem.
    pub fn stub(&self, name: &str) -> String {
        match self {
            Mode::Program => String::new(),
            Mode::Class => format!("// Class {name}\n\nfn new() {{\n    #{{}}\n}}\n"),
            Mode::Template => format!(
                "// Template {name}, takes my_param\n\n\
                 The content of my param is: ${{my_param}}\n\n\
                 Render it from a class or program with {name}.render_to_string(\"wow\")\n"
            ),
            Mode::Enhancement => {
                format!("// Enhancement {name}\n\nfn describe() {{\n    this.to_string()\n}}\n")
            }
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Mode::Program => "PROGRAM",
            Mode::Class => "CLASS",
            Mode::Template => "TEMPLATE",
            Mode::Enhancement => "ENHANCEMENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_extensions_map_to_modes() {
        assert_eq!(Mode::from_extension("rhai"), Mode::Program);
        assert_eq!(Mode::from_extension("rhc"), Mode::Class);
        assert_eq!(Mode::from_extension("rht"), Mode::Template);
        assert_eq!(Mode::from_extension("RHX"), Mode::Enhancement);
    }

    #[test]
    fn only_reserved_extensions_are_source_files() {
        assert_eq!(Mode::for_source_extension("RHAI"), Some(Mode::Program));
        assert_eq!(Mode::for_source_extension("rht"), Some(Mode::Template));
        assert_eq!(Mode::for_source_extension("txt"), None);
    }

    #[test]
    fn stubs_name_the_unit() {
        assert_eq!(Mode::Program.stub("main"), "");
        assert!(Mode::Class.stub("Point").starts_with("// Class Point\n"));
        assert!(Mode::Template.stub("page").contains("page.render_to_string"));
        assert!(Mode::Template.stub("page").contains("${my_param}"));
        assert!(Mode::Enhancement.stub("Strings").contains("this.to_string()"));
    }

    #[test]
    fn other_extensions_default_to_program() {
        assert_eq!(Mode::from_extension("txt"), Mode::Program);
        assert_eq!(Mode::from_path(Path::new("/tmp/notes")), Mode::Program);
        assert_eq!(Mode::from_path(Path::new("/tmp/Point.rhc")), Mode::Class);
    }
}
