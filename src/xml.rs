//! In-memory XML element tree built with quick-xml.
//!
//! The whole document is materialized up front; queries walk the tree by
//! `/`-separated tag paths relative to an element.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};

/// A single XML element with its attributes, leading text and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    fn new(tag: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            tag,
            attributes,
            text: None,
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attributes as `(name, value)` pairs in document order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Text appearing before the first child element, or `None` if there is none.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First element matching `path`, in document order.
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    /// All elements matching `path`, in document order.
    ///
    /// Segments are tag names; `*` matches any child. Every element matching an
    /// intermediate segment contributes its matches, so `a/*` returns the
    /// children of every `a`.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            current = current
                .into_iter()
                .flat_map(|element| {
                    element
                        .children
                        .iter()
                        .filter(move |child| segment == "*" || child.tag == segment)
                })
                .collect();
        }
        current
    }

    fn push_text(&mut self, text: &str) {
        // Text after a child element is that child's tail, not ours.
        if self.children.is_empty() {
            self.text.get_or_insert_with(String::new).push_str(text);
        }
    }
}

/// A fully parsed XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    root: Element,
}

impl XmlDocument {
    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self, XmlError> {
        let contents = std::fs::read_to_string(path).map_err(|e| XmlError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    /// Parse a document held in memory.
    pub fn parse(text: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| syntax_error(reader.buffer_position() as u64, e))?;
            let position = reader.buffer_position() as u64;

            match event {
                Event::Start(ref e) => stack.push(start_element(e, position)?),
                Event::Empty(ref e) => {
                    let element = start_element(e, position)?;
                    close_element(element, &mut stack, &mut root)?;
                }
                Event::End(ref e) => {
                    let element = stack.pop().ok_or_else(|| XmlError::Structure {
                        detail: format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        ),
                    })?;
                    close_element(element, &mut stack, &mut root)?;
                }
                Event::Text(ref e) => {
                    let text = e.unescape().map_err(|err| syntax_error(position, err))?;
                    append_text(&mut stack, &text)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    append_text(&mut stack, &text)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, DOCTYPE.
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Structure {
                detail: format!("unclosed element <{}> at end of input", open.tag),
            });
        }

        let root = root.ok_or_else(|| XmlError::Structure {
            detail: "document has no root element".to_string(),
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }
}

fn start_element(start: &BytesStart<'_>, position: u64) -> Result<Element, XmlError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax_error(position, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        // Namespace declarations are not attributes of the element.
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| syntax_error(position, e))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element::new(tag, attributes))
}

fn close_element(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if let Some(existing) = root {
        return Err(XmlError::Structure {
            detail: format!(
                "second root element <{}> after <{}>",
                element.tag, existing.tag
            ),
        });
    }
    *root = Some(element);
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(current) => {
            current.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::Structure {
            detail: "text outside of the root element".to_string(),
        }),
    }
}

fn syntax_error(position: u64, err: impl std::fmt::Display) -> XmlError {
    XmlError::Syntax {
        position,
        detail: err.to_string(),
    }
}

#[derive(Debug)]
pub enum XmlError {
    /// The file could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The XML reader rejected the input.
    Syntax { position: u64, detail: String },
    /// The input is not a single well-formed element tree.
    Structure { detail: String },
}

impl std::fmt::Display for XmlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XmlError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            XmlError::Syntax { position, detail } => {
                write!(f, "malformed XML at byte {position}: {detail}")
            }
            XmlError::Structure { detail } => write!(f, "malformed XML: {detail}"),
        }
    }
}

impl std::error::Error for XmlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XmlError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}
