//! XML output: a [`DocumentWriter`] that prints markup to any `io::Write`.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};

use graphstream::DocumentWriter;

use crate::escaping::{Context, write_escaped};
use crate::tracing_macros::trace;

/// Options for XML output.
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Whether to put nested elements on their own indented lines.
    pub pretty: bool,
    /// Indentation per level, used only when `pretty` is set.
    pub indent: Cow<'static, str>,
    /// Whether to start the document with `<?xml version="1.0" encoding="UTF-8"?>`.
    pub declaration: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: Cow::Borrowed("  "),
            declaration: false,
        }
    }
}

impl SerializeOptions {
    /// Compact output, no declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty-printing with the default indentation.
    pub const fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Set the indentation string. Implies `pretty`.
    pub fn indent(mut self, indent: impl Into<Cow<'static, str>>) -> Self {
        self.indent = indent.into();
        self.pretty = true;
        self
    }

    /// Emit or omit the XML declaration.
    pub const fn declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }
}

/// Failure while producing XML.
#[derive(Debug)]
pub enum XmlWriteError {
    /// The underlying writer failed.
    Io(io::Error),
    /// An attribute arrived after the start tag was closed by content.
    AttributeOutsideTag {
        /// Attribute name.
        name: String,
    },
    /// `end_element` named something other than the innermost open element.
    Unbalanced {
        /// The innermost open element, if any.
        open: Option<String>,
        /// The element that was closed.
        closed: String,
    },
    /// Non-whitespace text outside of any element.
    TextOutsideRoot,
    /// The document ended with elements still open.
    Unclosed {
        /// The innermost element left open.
        name: String,
    },
}

impl fmt::Display for XmlWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlWriteError::Io(e) => write!(f, "I/O error while writing XML: {e}"),
            XmlWriteError::AttributeOutsideTag { name } => {
                write!(f, "attribute `{name}` written after element content")
            }
            XmlWriteError::Unbalanced {
                open: Some(open),
                closed,
            } => write!(f, "closing </{closed}> while <{open}> is open"),
            XmlWriteError::Unbalanced { open: None, closed } => {
                write!(f, "closing </{closed}> with no open element")
            }
            XmlWriteError::TextOutsideRoot => write!(f, "text outside of the root element"),
            XmlWriteError::Unclosed { name } => write!(f, "document ended inside <{name}>"),
        }
    }
}

impl std::error::Error for XmlWriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XmlWriteError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for XmlWriteError {
    fn from(e: io::Error) -> Self {
        XmlWriteError::Io(e)
    }
}

/// What an open element has received so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Content {
    Nothing,
    Text,
    Elements,
}

/// Writes XML markup for the events a marshaller produces.
///
/// Elements with neither children nor text are written as `<name></name>`.
/// In pretty mode, elements whose content is only other elements get one
/// child per line; an element holding text stays on one line.
pub struct XmlWriter<W> {
    out: W,
    options: SerializeOptions,
    /// Open elements and what each has received so far.
    element_stack: Vec<(String, Content)>,
    /// True while the start tag of the innermost element is still open.
    collecting_attributes: bool,
    wrote_any: bool,
}

impl<W: Write> XmlWriter<W> {
    /// A compact writer.
    pub fn new(out: W) -> Self {
        Self::with_options(out, SerializeOptions::default())
    }

    /// A writer with explicit options.
    pub fn with_options(out: W, options: SerializeOptions) -> Self {
        Self {
            out,
            options,
            element_stack: Vec::new(),
            collecting_attributes: false,
            wrote_any: false,
        }
    }

    /// Gives back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Borrows the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn close_start_tag(&mut self) -> io::Result<()> {
        if self.collecting_attributes {
            self.out.write_all(b">")?;
            self.collecting_attributes = false;
        }
        Ok(())
    }

    fn write_indent(&mut self, depth: usize) -> io::Result<()> {
        if self.options.pretty {
            for _ in 0..depth {
                self.out.write_all(self.options.indent.as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_newline(&mut self) -> io::Result<()> {
        if self.options.pretty {
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl<W: Write> DocumentWriter for XmlWriter<W> {
    type Error = XmlWriteError;

    fn start_document(&mut self) -> Result<(), Self::Error> {
        if self.options.declaration {
            self.out
                .write_all(br#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
            self.wrote_any = true;
        }
        Ok(())
    }

    fn start_element(&mut self, name: &str) -> Result<(), Self::Error> {
        trace!(element = name, depth = self.element_stack.len(), "start_element");
        self.close_start_tag()?;

        let depth = self.element_stack.len();
        let mut break_line = self.wrote_any;
        if let Some((_, content)) = self.element_stack.last_mut() {
            // mixed content keeps its text layout untouched
            break_line = *content != Content::Text;
            if *content == Content::Nothing {
                *content = Content::Elements;
            }
        }
        if break_line {
            self.write_newline()?;
            self.write_indent(depth)?;
        }

        self.out.write_all(b"<")?;
        self.out.write_all(name.as_bytes())?;
        self.element_stack.push((name.to_string(), Content::Nothing));
        self.collecting_attributes = true;
        self.wrote_any = true;
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), Self::Error> {
        if !self.collecting_attributes {
            return Err(XmlWriteError::AttributeOutsideTag {
                name: name.to_string(),
            });
        }
        self.out.write_all(b" ")?;
        self.out.write_all(name.as_bytes())?;
        self.out.write_all(b"=\"")?;
        write_escaped(&mut self.out, value, Context::Attribute)?;
        self.out.write_all(b"\"")?;
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), Self::Error> {
        if self.element_stack.is_empty() {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(XmlWriteError::TextOutsideRoot);
        }
        if text.is_empty() {
            return Ok(());
        }
        self.close_start_tag()?;
        if let Some((_, content)) = self.element_stack.last_mut() {
            *content = Content::Text;
        }
        write_escaped(&mut self.out, text, Context::Text)?;
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), Self::Error> {
        let Some((open, content)) = self.element_stack.pop() else {
            return Err(XmlWriteError::Unbalanced {
                open: None,
                closed: name.to_string(),
            });
        };
        if open != name {
            return Err(XmlWriteError::Unbalanced {
                open: Some(open),
                closed: name.to_string(),
            });
        }

        if self.collecting_attributes {
            self.out.write_all(b">")?;
            self.collecting_attributes = false;
        } else if content == Content::Elements {
            self.write_newline()?;
            self.write_indent(self.element_stack.len())?;
        }
        self.out.write_all(b"</")?;
        self.out.write_all(name.as_bytes())?;
        self.out.write_all(b">")?;
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), Self::Error> {
        if let Some((name, _)) = self.element_stack.last() {
            return Err(XmlWriteError::Unclosed { name: name.clone() });
        }
        if self.wrote_any {
            self.write_newline()?;
        }
        self.out.flush()?;
        Ok(())
    }
}
