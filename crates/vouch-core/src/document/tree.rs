//! Generic tree of named nodes built from XML events.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::ParseError;

/// A named element with attributes, text content and ordered children.
///
/// Lookups are defensive: a missing child or attribute yields `None` (or an
/// empty iterator), never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attribute value by exact name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first direct child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    /// Text of the first of `names` that is present and non-empty.
    pub fn first_text(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.child_text(name))
            .find(|text| !text.is_empty())
    }

    /// Every descendant (not including `self`) whose name is in `names`, in
    /// document order. Matching nodes are not searched further.
    pub fn descendants_named(&self, names: &[&str]) -> Vec<&Node> {
        let mut found = Vec::new();
        collect_named(&self.children, names, &mut found);
        found
    }
}

fn collect_named<'a>(nodes: &'a [Node], names: &[&str], found: &mut Vec<&'a Node>) {
    for node in nodes {
        if names.contains(&node.name.as_str()) {
            found.push(node);
        } else {
            collect_named(&node.children, names, found);
        }
    }
}

/// A parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Node,
}

impl Document {
    /// Descendants of the root (or the root itself) named in `names`.
    pub fn find_all(&self, names: &[&str]) -> Vec<&Node> {
        if names.contains(&self.root.name.as_str()) {
            return vec![&self.root];
        }
        self.root.descendants_named(names)
    }
}

/// Parse well-formed XML text into a [`Document`].
///
/// Input must already be sanitized; control characters are reported as
/// errors here rather than silently dropped.
pub fn parse(text: &str) -> Result<Document, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| ParseError::new(reader.error_position() as u64, e.to_string()))?;

        match event {
            Event::Start(start) => {
                let node = open_node(&start, position)?;
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = open_node(&start, position)?;
                attach(node, &mut stack, &mut root, position)?;
            }
            Event::End(end) => {
                let node = stack.pop().ok_or_else(|| {
                    ParseError::new(
                        position,
                        format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(end.name().as_ref())
                        ),
                    )
                })?;
                attach(node, &mut stack, &mut root, position)?;
            }
            Event::Text(content) => {
                let value = content
                    .unescape()
                    .map_err(|e| ParseError::new(position, e.to_string()))?;
                append_text(&mut stack, &value, position)?;
            }
            Event::CData(content) => {
                let bytes = content.into_inner();
                let value = String::from_utf8_lossy(&bytes);
                append_text(&mut stack, value.trim(), position)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::new(
            text.len() as u64,
            format!("unclosed element <{}>", open.name),
        ));
    }

    let root = root.ok_or_else(|| ParseError::new(0, "document has no root element"))?;
    debug!("Parsed document with root <{}>", root.name);
    Ok(Document { root })
}

fn open_node(start: &BytesStart<'_>, position: u64) -> Result<Node, ParseError> {
    let mut node = Node::new(String::from_utf8_lossy(start.name().as_ref()));

    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::new(position, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value: Cow<'_, str> = attr
            .unescape_value()
            .map_err(|e| ParseError::new(position, e.to_string()))?;
        node.attributes.push((key, value.into_owned()));
    }

    Ok(node)
}

fn attach(
    node: Node,
    stack: &mut [Node],
    root: &mut Option<Node>,
    position: u64,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(node);
            Ok(())
        }
        None => Err(ParseError::new(
            position,
            format!("second root element <{}>", node.name),
        )),
    }
}

fn append_text(stack: &mut [Node], value: &str, position: u64) -> Result<(), ParseError> {
    if value.is_empty() {
        return Ok(());
    }

    match stack.last_mut() {
        Some(node) => {
            if !node.text.is_empty() {
                node.text.push(' ');
            }
            node.text.push_str(value);
            Ok(())
        }
        None => Err(ParseError::new(position, "text outside the root element")),
    }
}
