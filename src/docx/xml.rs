//! Owned XML element tree built on `quick-xml` events.
//!
//! WordprocessingML parts are small enough (a few MB at most) that an owned
//! tree is the simplest faithful model: parsing keeps every node in order,
//! including whitespace text, comments and processing instructions, so an
//! untouched tree serialises back to equivalent XML. Text and attribute
//! values are stored unescaped and re-escaped on write.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// Errors raised while parsing or writing an XML part.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error(transparent)]
    Syntax(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("non UTF-8 name or content: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("document has no root element")]
    MissingRoot,

    #[error("unexpected closing tag </{0}>")]
    UnexpectedEnd(String),

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

/// A node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    /// Raw comment body.
    Comment(String),
    /// Raw processing-instruction body.
    ProcessingInstruction(String),
    /// Raw doctype body.
    DocType(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// An element with its qualified name (`w:p`), attributes in document
/// order, and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Prefix part of the qualified name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Child elements, skipping text and other node kinds.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|e| e.name == name)
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Visit this element and every descendant element, pre-order.
    pub fn visit(&self, f: &mut dyn FnMut(&Element)) {
        f(self);
        for child in self.elements() {
            child.visit(f);
        }
    }

    /// Mutable pre-order visit over this element and every descendant.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in self.children.iter_mut().filter_map(Node::as_element_mut) {
            child.visit_mut(f);
        }
    }
}

/// A parsed XML part: optional declaration, top-level misc nodes, and the
/// root element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub declaration: Option<BytesDecl<'static>>,
    pub prolog: Vec<Node>,
    pub root: Element,
    pub epilog: Vec<Node>,
}

impl XmlDocument {
    /// Wrap a root element with a standalone UTF-8 declaration.
    pub fn with_root(root: Element) -> Self {
        Self {
            declaration: Some(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))),
            prolog: vec![Node::Text("\n".to_string())],
            root,
            epilog: Vec::new(),
        }
    }

    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);

        let mut declaration = None;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let node = match reader.read_event()? {
                Event::Decl(d) => {
                    declaration = Some(d.into_owned());
                    continue;
                }
                Event::Start(e) => {
                    stack.push(element_from_start(&e)?);
                    continue;
                }
                Event::Empty(e) => Node::Element(element_from_start(&e)?),
                Event::End(e) => {
                    let el = stack.pop().ok_or_else(|| {
                        XmlError::UnexpectedEnd(String::from_utf8_lossy(e.name().as_ref()).into())
                    })?;
                    Node::Element(el)
                }
                Event::Text(t) => Node::Text(t.unescape()?.into_owned()),
                Event::CData(c) => Node::CData(std::str::from_utf8(&c)?.to_string()),
                Event::Comment(c) => Node::Comment(std::str::from_utf8(&c)?.to_string()),
                Event::PI(p) => Node::ProcessingInstruction(std::str::from_utf8(&p)?.to_string()),
                Event::DocType(d) => Node::DocType(std::str::from_utf8(&d)?.to_string()),
                Event::Eof => break,
            };

            match (stack.last_mut(), node) {
                (Some(parent), node) => parent.push(node),
                (None, Node::Element(el)) if root.is_none() => root = Some(el),
                (None, node) if root.is_none() => prolog.push(node),
                (None, node) => epilog.push(node),
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }

        Ok(Self {
            declaration,
            prolog,
            root: root.ok_or(XmlError::MissingRoot)?,
            epilog,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, XmlError> {
        let mut writer = Writer::new(Vec::new());
        if let Some(ref decl) = self.declaration {
            writer.write_event(Event::Decl(decl.clone()))?;
        }
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (k, v) in &el.attributes {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), XmlError> {
    match node {
        Node::Element(el) => return write_element(writer, el),
        Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        Node::CData(c) => writer.write_event(Event::CData(BytesCData::new(c.as_str())))?,
        Node::Comment(c) => writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str())))?,
        Node::ProcessingInstruction(p) => {
            writer.write_event(Event::PI(BytesText::from_escaped(p.as_str())))?
        }
        Node::DocType(d) => writer.write_event(Event::DocType(BytesText::from_escaped(d.as_str())))?,
    }
    Ok(())
}
