use std::io::{self, Write};

use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Title bar and selection changes
    Status,
    Info,
    /// Text a program printed
    Output,
    /// A program's result
    Value,
    Error,
}

impl LineKind {
    fn color(self) -> Color {
        match self {
            LineKind::Status => Color::Cyan,
            LineKind::Info => Color::DarkGrey,
            LineKind::Output => Color::Reset,
            LineKind::Value => Color::Green,
            LineKind::Error => Color::Red,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub text: String,
}

impl Line {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Write lines with their colors. `plain` skips escape sequences, for
/// output that is not a terminal.
pub fn write_lines(out: &mut impl Write, lines: &[Line], plain: bool) -> io::Result<()> {
    for line in lines {
        if plain {
            writeln!(out, "{}", line.text)?;
            continue;
        }
        queue!(out, SetForegroundColor(line.kind.color()))?;
        if line.kind == LineKind::Status {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        queue!(
            out,
            Print(&line.text),
            SetAttribute(Attribute::Reset),
            ResetColor,
            Print("\n")
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_has_no_escapes() {
        let mut out = Vec::new();
        let lines = vec![
            Line::new(LineKind::Info, "one"),
            Line::new(LineKind::Error, "two"),
        ];
        write_lines(&mut out, &lines, true).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn styled_output_wraps_text_in_colors() {
        let mut out = Vec::new();
        write_lines(&mut out, &[Line::new(LineKind::Value, "42")], false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("42"));
        assert!(text.contains('\u{1b}'));
    }
}
