//! Minimal XML element tree used by the basket file codecs.
//!
//! # Responsibility
//! - Parse an XML document into an owned `Element` tree.
//! - Serialize an `Element` tree with one-space indentation, an XML
//!   declaration and a `<!DOCTYPE root>` line.
//! - Save documents atomically (temp file + rename).
//!
//! # Invariants
//! - Whitespace-only text between elements is dropped; element text is trimmed.
//! - Attribute order is preserved on a parse/serialize cycle.

use super::XmlError;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::io::Write;
use std::path::Path;

/// One XML element with its attributes, children and text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Element holding only text, e.g. `<name>Work</name>`.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Builder variant of [`Element::set_attr`].
    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder variant of [`Element::push`].
    pub fn child_element(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attr_or(&self, key: &str, default: &str) -> String {
        self.get_attr(key).unwrap_or(default).to_string()
    }

    /// Boolean attribute read with [`true_or_false`].
    pub fn bool_attr(&self, key: &str, default: bool) -> bool {
        match self.get_attr(key) {
            Some(value) => true_or_false(value, default),
            None => default,
        }
    }

    /// Numeric attribute; missing or malformed values yield `None`.
    pub fn int_attr(&self, key: &str) -> Option<i64> {
        self.get_attr(key).and_then(|v| v.trim().parse().ok())
    }

    /// Direct children with the given tag name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// First direct child with the given tag name.
    pub fn first_child_named(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// First element matching a slash-separated path of child names.
    pub fn child(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self, |node, part| node.first_child_named(part))
    }

    /// Text of the element at `path`, or `default` when absent.
    pub fn child_text(&self, path: &str, default: &str) -> String {
        self.child(path)
            .map(|node| node.text.clone())
            .unwrap_or_else(|| default.to_string())
    }
}

/// Reads an XML boolean: `true|1|on|yes` and `false|0|off|no`.
/// Anything else returns `default`.
pub fn true_or_false(value: &str, default: bool) -> bool {
    match value.trim() {
        "true" | "1" | "on" | "yes" => true,
        "false" | "0" | "off" | "no" => false,
        _ => default,
    }
}

/// Serialized form of a boolean attribute.
pub fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Parses a whole document and returns its root element.
pub fn parse_document(source: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|err| XmlError::Malformed {
            position: reader.buffer_position() as u64,
            message: err.to_string(),
        })?;
        match event {
            Event::Start(start) => stack.push(start_element(&start)?),
            Event::Empty(start) => {
                let element = start_element(&start)?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack.pop().ok_or_else(|| XmlError::Malformed {
                    position: reader.buffer_position() as u64,
                    message: "unexpected closing tag".to_string(),
                })?;
                element.text = element.text.trim().to_string();
                close_element(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let value = text.unescape().map_err(|err| XmlError::Malformed {
                        position: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    top.text.push_str(&value);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed {
            position: reader.buffer_position() as u64,
            message: "unclosed element at end of document".to_string(),
        });
    }
    root.ok_or(XmlError::MissingRoot)
}

/// Reads and parses `path`, checking the root element name.
pub fn read_document(path: &Path, expected_root: &str) -> Result<Element, XmlError> {
    let source = fs::read_to_string(path).map_err(|err| XmlError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;
    let root = parse_document(&source)?;
    if root.name != expected_root {
        return Err(XmlError::UnexpectedRoot {
            expected: expected_root.to_string(),
            found: root.name,
        });
    }
    Ok(root)
}

/// Serializes `root` as a complete document.
pub fn write_document(root: &Element) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<!DOCTYPE ");
    out.push_str(&root.name);
    out.push_str(">\n");
    write_element(&mut out, root, 0);
    out
}

/// Writes `root` to `path` through a temp file in the same directory.
pub fn save_document(path: &Path, root: &Element) -> Result<(), XmlError> {
    let io_error = |err: std::io::Error| XmlError::Io {
        path: path.to_path_buf(),
        source: err,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    temp.write_all(write_document(root).as_bytes())
        .map_err(io_error)?;
    temp.flush().map_err(io_error)?;
    temp.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| XmlError::Malformed {
            position: 0,
            message: format!("attribute error: {err}"),
        })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_string();
        let value = attribute
            .unescape_value()
            .map_err(|err| XmlError::Malformed {
                position: 0,
                message: format!("attribute value error: {err}"),
            })?
            .to_string();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn close_element(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(XmlError::Malformed {
                position: 0,
                message: format!("second root element `{}`", element.name),
            })
        }
    }
    Ok(())
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let indent = " ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    if element.children.is_empty() && element.text.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push('>');
    out.push_str(&escape(element.text.as_str()));
    if !element.children.is_empty() {
        out.push('\n');
        for child in &element.children {
            write_element(out, child, depth + 1);
        }
        out.push_str(&indent);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push_str(">\n");
}
