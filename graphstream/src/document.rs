//! The document boundary: events in, events out.
//!
//! Format crates implement [`DocumentParser`] for reading and
//! [`DocumentWriter`] for writing. [`EventBuffer`] implements both sides in
//! memory.

use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;

/// Events produced by a [`DocumentParser`].
///
/// For each element the stream looks like this, with all attributes carried
/// on the start event:
///
/// ```text
/// ElementStart { name: "order", attributes: [("id", "7")] }
///   Text("\n  ")
///   ElementStart { name: "total", attributes: [] }
///     Text("12.5")
///   ElementEnd { name: "total" }
/// ElementEnd { name: "order" }
/// ```
///
/// Parsers should merge adjacent character data into one `Text` event. The
/// engines trim text themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent<'a> {
    /// Start of an element.
    ElementStart {
        /// Element name, without namespace prefix.
        name: Cow<'a, str>,
        /// Attribute names and unescaped values, in document order.
        attributes: Vec<(Cow<'a, str>, Cow<'a, str>)>,
    },

    /// Character data, unescaped.
    Text(Cow<'a, str>),

    /// End of an element.
    ElementEnd {
        /// Element name, without namespace prefix.
        name: Cow<'a, str>,
    },
}

impl DocumentEvent<'_> {
    /// Detaches the event from the input it borrows.
    pub fn into_owned(self) -> DocumentEvent<'static> {
        match self {
            DocumentEvent::ElementStart { name, attributes } => DocumentEvent::ElementStart {
                name: Cow::Owned(name.into_owned()),
                attributes: attributes
                    .into_iter()
                    .map(|(k, v)| (Cow::Owned(k.into_owned()), Cow::Owned(v.into_owned())))
                    .collect(),
            },
            DocumentEvent::Text(text) => DocumentEvent::Text(Cow::Owned(text.into_owned())),
            DocumentEvent::ElementEnd { name } => DocumentEvent::ElementEnd {
                name: Cow::Owned(name.into_owned()),
            },
        }
    }

    /// A copy of the event borrowing from this one.
    pub fn borrowed(&self) -> DocumentEvent<'_> {
        match self {
            DocumentEvent::ElementStart { name, attributes } => DocumentEvent::ElementStart {
                name: Cow::Borrowed(&**name),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (Cow::Borrowed(&**k), Cow::Borrowed(&**v)))
                    .collect(),
            },
            DocumentEvent::Text(text) => DocumentEvent::Text(Cow::Borrowed(&**text)),
            DocumentEvent::ElementEnd { name } => DocumentEvent::ElementEnd {
                name: Cow::Borrowed(&**name),
            },
        }
    }
}

/// A source of [`DocumentEvent`]s.
pub trait DocumentParser<'de> {
    /// The error type for parsing failures.
    type Error;

    /// Gets the next event. Returns `Ok(None)` once the document is exhausted.
    fn next_event(&mut self) -> Result<Option<DocumentEvent<'de>>, Self::Error>;
}

/// A sink for document structure.
///
/// Calls arrive in document order: `start_document`, then for each element
/// `start_element`, its `attribute`s, its content, and `end_element`, and
/// finally `end_document`. Attributes always precede any content of their
/// element.
pub trait DocumentWriter {
    /// Format-specific error type.
    type Error;

    /// Begins the document.
    fn start_document(&mut self) -> Result<(), Self::Error>;

    /// Opens an element.
    fn start_element(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Adds an attribute to the element just opened.
    fn attribute(&mut self, name: &str, value: &str) -> Result<(), Self::Error>;

    /// Writes character data.
    fn characters(&mut self, text: &str) -> Result<(), Self::Error>;

    /// Closes the innermost open element, which is named `name`.
    fn end_element(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Ends the document.
    fn end_document(&mut self) -> Result<(), Self::Error>;
}

impl<W: DocumentWriter + ?Sized> DocumentWriter for &mut W {
    type Error = W::Error;

    fn start_document(&mut self) -> Result<(), Self::Error> {
        (**self).start_document()
    }

    fn start_element(&mut self, name: &str) -> Result<(), Self::Error> {
        (**self).start_element(name)
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), Self::Error> {
        (**self).attribute(name, value)
    }

    fn characters(&mut self, text: &str) -> Result<(), Self::Error> {
        (**self).characters(text)
    }

    fn end_element(&mut self, name: &str) -> Result<(), Self::Error> {
        (**self).end_element(name)
    }

    fn end_document(&mut self) -> Result<(), Self::Error> {
        (**self).end_document()
    }
}

/// Records written events in memory and replays them as a parser.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventBuffer {
    events: Vec<DocumentEvent<'static>>,
}

impl EventBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already-built events, for feeding hand-made documents to an
    /// unmarshaller.
    pub fn from_events(events: impl IntoIterator<Item = DocumentEvent<'static>>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// The recorded events.
    pub fn events(&self) -> &[DocumentEvent<'static>] {
        &self.events
    }

    /// A parser replaying the recorded events.
    pub fn parser(&self) -> EventReplay<'_> {
        EventReplay {
            events: self.events.iter(),
        }
    }
}

/// Writer error of an [`EventBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferError {
    attribute: String,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attribute `{}` written outside of a start tag", self.attribute)
    }
}

impl std::error::Error for BufferError {}

impl DocumentWriter for EventBuffer {
    type Error = BufferError;

    fn start_document(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn start_element(&mut self, name: &str) -> Result<(), Self::Error> {
        self.events.push(DocumentEvent::ElementStart {
            name: Cow::Owned(name.to_string()),
            attributes: Vec::new(),
        });
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), Self::Error> {
        match self.events.last_mut() {
            Some(DocumentEvent::ElementStart { attributes, .. }) => {
                attributes.push((Cow::Owned(name.to_string()), Cow::Owned(value.to_string())));
                Ok(())
            }
            _ => Err(BufferError {
                attribute: name.to_string(),
            }),
        }
    }

    fn characters(&mut self, text: &str) -> Result<(), Self::Error> {
        match self.events.last_mut() {
            Some(DocumentEvent::Text(existing)) => existing.to_mut().push_str(text),
            _ => self.events.push(DocumentEvent::Text(Cow::Owned(text.to_string()))),
        }
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), Self::Error> {
        self.events.push(DocumentEvent::ElementEnd {
            name: Cow::Owned(name.to_string()),
        });
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Parser over the events of an [`EventBuffer`].
#[derive(Debug, Clone)]
pub struct EventReplay<'a> {
    events: std::slice::Iter<'a, DocumentEvent<'static>>,
}

impl<'a> DocumentParser<'a> for EventReplay<'a> {
    type Error = Infallible;

    fn next_event(&mut self) -> Result<Option<DocumentEvent<'a>>, Self::Error> {
        Ok(self.events.next().map(DocumentEvent::borrowed))
    }
}
