//! Lightweight markup tree
//!
//! Tokenizes XML-like markup into a tree of nodes and serializes trees back
//! to text in a few canonical layouts. This is deliberately not a full XML
//! processor: DTDs are skipped unprocessed, namespaces are plain attribute
//! names and only the predefined entities plus numeric references decode.

use crate::error::SyntaxError;

/// Node in the markup tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element
    Element(XmlElement),
    /// Decoded character data
    Text(String),
    /// Literal CDATA section
    CData(String),
    /// Comment body
    Comment(String),
}

/// Element with attributes and ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Tag name
    pub name: String,
    /// Attributes in source order, values decoded
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<Node>,
}

impl XmlElement {
    /// Creates an element without attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Appends an attribute
    pub fn push_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    /// Attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Appends a child element
    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(Node::Element(element));
    }

    /// Appends character data
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Child elements
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Mutable child elements
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    fn has_element_children(&self) -> bool {
        self.children
            .iter()
            .any(|n| matches!(n, Node::Element(_) | Node::Comment(_)))
    }
}

/// Serialization layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Indented, text written exactly as stored
    Verbatim,
    /// Indented, text trimmed at the edges
    Pretty,
    /// Indented with a blank line between top-level sections
    Sectioned,
    /// No whitespace between tags, text trimmed at the edges
    Compact,
}

/// Parsed document: prolog, root element and trailing misc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Declarations, processing instructions and comments before the root
    pub prolog: Vec<String>,
    /// Root element
    pub root: XmlElement,
    /// Comments and processing instructions after the root
    pub epilog: Vec<String>,
}

impl Document {
    /// Wraps a root element
    pub fn new(root: XmlElement) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// Parses raw markup
    pub fn parse(raw: &str) -> Result<Self, SyntaxError> {
        Tokenizer::new(raw).document()
    }

    /// Serializes the document
    pub fn serialize(&self, layout: Layout, indent: usize) -> String {
        let mut out = String::new();
        let separator = if layout == Layout::Compact { "" } else { "\n" };
        for misc in &self.prolog {
            out.push_str(misc);
            out.push_str(separator);
        }
        write_element(&mut out, &self.root, 0, layout, indent);
        for misc in &self.epilog {
            out.push_str(separator);
            out.push_str(misc);
        }
        out
    }
}

fn pad(out: &mut String, depth: usize, layout: Layout, indent: usize) {
    if layout != Layout::Compact {
        out.push_str(&" ".repeat(depth * indent));
    }
}

fn newline(out: &mut String, layout: Layout) {
    if layout != Layout::Compact {
        out.push('\n');
    }
}

fn shape_text(text: &str, layout: Layout) -> Option<&str> {
    match layout {
        Layout::Verbatim => (!text.trim().is_empty()).then_some(text),
        _ => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then_some(trimmed)
        }
    }
}

fn write_open_tag(out: &mut String, element: &XmlElement, self_closing: bool) {
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }
    out.push_str(if self_closing { "/>" } else { ">" });
}

fn write_inline(out: &mut String, node: &Node, layout: Layout) {
    match node {
        Node::Text(text) => {
            if let Some(text) = shape_text(text, layout) {
                out.push_str(&escape_text(text));
            }
        }
        Node::CData(data) => {
            out.push_str("<![CDATA[");
            out.push_str(data);
            out.push_str("]]>");
        }
        Node::Comment(body) => {
            out.push_str("<!--");
            out.push_str(body);
            out.push_str("-->");
        }
        Node::Element(_) => {}
    }
}

fn write_element(out: &mut String, element: &XmlElement, depth: usize, layout: Layout, indent: usize) {
    let visible: Vec<&Node> = element
        .children
        .iter()
        .filter(|n| match n {
            Node::Text(t) => !t.trim().is_empty(),
            _ => true,
        })
        .collect();

    pad(out, depth, layout, indent);

    if visible.is_empty() {
        write_open_tag(out, element, true);
        return;
    }

    write_open_tag(out, element, false);

    if !element.has_element_children() {
        for node in &visible {
            write_inline(out, node, layout);
        }
    } else {
        let mut first = true;
        for node in &visible {
            if layout == Layout::Sectioned && depth == 0 && !first {
                newline(out, layout);
            }
            first = false;
            newline(out, layout);
            match node {
                Node::Element(child) => write_element(out, child, depth + 1, layout, indent),
                other => {
                    pad(out, depth + 1, layout, indent);
                    write_inline(out, other, layout);
                }
            }
        }
        newline(out, layout);
        pad(out, depth, layout, indent);
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

/// Escapes character data for well-formedness
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes a double-quoted attribute value for well-formedness
pub fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Characters outside the XML 1.0 `Char` production
pub(crate) fn is_forbidden_char(c: char) -> bool {
    (c < ' ' && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{FFFE}' || c == '\u{FFFF}'
}

/// Character-level state machine producing a [`Document`]
struct Tokenizer {
    chars: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Tokenizer {
    fn new(raw: &str) -> Self {
        Self {
            chars: raw.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.line, self.column, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        let mut index = self.position;
        for expected in pattern.chars() {
            if self.chars.get(index) != Some(&expected) {
                return false;
            }
            index += 1;
        }
        true
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    fn expect(&mut self, pattern: &str) -> Result<(), SyntaxError> {
        if !self.starts_with(pattern) {
            return Err(self.error(format!("Expected '{}'", pattern)));
        }
        self.advance_by(pattern.chars().count());
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Consumes everything up to and including `terminator`, returning the body
    fn read_until(&mut self, terminator: &str, what: &str) -> Result<String, SyntaxError> {
        let mut body = String::new();
        while !self.starts_with(terminator) {
            match self.advance() {
                Some(c) if is_forbidden_char(c) => {
                    return Err(self.error(format!("Invalid character U+{:04X}", c as u32)))
                }
                Some(c) => body.push(c),
                None => return Err(self.error(format!("Unterminated {}", what))),
            }
        }
        self.advance_by(terminator.chars().count());
        Ok(body)
    }

    fn read_name(&mut self) -> Result<String, SyntaxError> {
        let mut name = String::new();
        match self.peek() {
            Some(c) if is_name_start(c) => {}
            Some(c) => return Err(self.error(format!("Invalid name start character '{}'", c))),
            None => return Err(self.error("Unexpected end of input, expected a name")),
        }
        while let Some(c) = self.peek() {
            if !is_name_char(c) {
                break;
            }
            name.push(c);
            self.advance();
        }
        Ok(name)
    }

    /// Skips declarations, processing instructions and comments outside the root
    fn misc(&mut self, allow_doctype: bool) -> Result<Vec<String>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                self.advance_by(2);
                let body = self.read_until("?>", "processing instruction")?;
                items.push(format!("<?{}?>", body));
            } else if self.starts_with("<!--") {
                self.advance_by(4);
                let body = self.read_until("-->", "comment")?;
                items.push(format!("<!--{}-->", body));
            } else if allow_doctype && self.starts_with("<!DOCTYPE") {
                self.advance_by(2);
                let body = self.read_until(">", "document type declaration")?;
                if body.contains('[') {
                    return Err(self.error("Internal DTD subsets are not supported"));
                }
                items.push(format!("<!{}>", body));
            } else {
                return Ok(items);
            }
        }
    }

    fn document(mut self) -> Result<Document, SyntaxError> {
        let prolog = self.misc(true)?;

        match self.peek() {
            None => return Err(self.error("Document has no root element")),
            Some('<') => {}
            Some(_) => return Err(self.error("Text outside the root element")),
        }

        let root = self.element()?;
        let epilog = self.misc(false)?;

        if self.peek().is_some() {
            if self.peek() == Some('<') {
                return Err(self.error("Multiple root elements"));
            }
            return Err(self.error("Text outside the root element"));
        }

        Ok(Document {
            prolog,
            root,
            epilog,
        })
    }

    /// Parses one element starting at `<`, iteratively to bound stack use
    fn element(&mut self) -> Result<XmlElement, SyntaxError> {
        let (root, closed) = self.start_tag()?;
        if closed {
            return Ok(root);
        }

        let mut stack = vec![root];
        loop {
            if self.peek().is_none() {
                let open = stack.last().map(|e| e.name.clone()).unwrap_or_default();
                return Err(self.error(format!("Unclosed element <{}>", open)));
            }

            if self.starts_with("</") {
                self.advance_by(2);
                let name = self.read_name()?;
                self.skip_whitespace();
                self.expect(">")?;
                let finished = stack
                    .pop()
                    .ok_or_else(|| self.error("Unexpected closing tag"))?;
                if finished.name != name {
                    return Err(self.error(format!(
                        "Mismatched closing tag </{}>, expected </{}>",
                        name, finished.name
                    )));
                }
                match stack.last_mut() {
                    Some(parent) => parent.push_element(finished),
                    None => return Ok(finished),
                }
            } else if self.starts_with("<!--") {
                self.advance_by(4);
                let body = self.read_until("-->", "comment")?;
                if let Some(current) = stack.last_mut() {
                    current.children.push(Node::Comment(body));
                }
            } else if self.starts_with("<![CDATA[") {
                self.advance_by(9);
                let body = self.read_until("]]>", "CDATA section")?;
                if let Some(current) = stack.last_mut() {
                    current.children.push(Node::CData(body));
                }
            } else if self.starts_with("<?") {
                self.advance_by(2);
                self.read_until("?>", "processing instruction")?;
            } else if self.starts_with("<!") {
                return Err(self.error("Markup declarations are not allowed inside elements"));
            } else if self.peek() == Some('<') {
                let (child, closed) = self.start_tag()?;
                if closed {
                    if let Some(current) = stack.last_mut() {
                        current.push_element(child);
                    }
                } else {
                    stack.push(child);
                }
            } else {
                let text = self.text()?;
                if let Some(current) = stack.last_mut() {
                    current.push_text(text);
                }
            }
        }
    }

    /// Parses `<name attr="v" ...>` or `<name .../>`; returns whether it self-closed
    fn start_tag(&mut self) -> Result<(XmlElement, bool), SyntaxError> {
        self.expect("<")?;
        let name = self.read_name()?;
        let mut element = XmlElement::new(name);

        loop {
            let had_space = self.peek().is_some_and(char::is_whitespace);
            self.skip_whitespace();
            match self.peek() {
                Some('>') => {
                    self.advance();
                    return Ok((element, false));
                }
                Some('/') => {
                    self.advance();
                    self.expect(">")?;
                    return Ok((element, true));
                }
                Some(_) if !had_space => {
                    return Err(self.error("Expected whitespace before attribute"));
                }
                Some(_) => {
                    let attr_name = self.read_name()?;
                    self.skip_whitespace();
                    self.expect("=")?;
                    self.skip_whitespace();
                    let value = self.attribute_value()?;
                    if element.attribute(&attr_name).is_some() {
                        return Err(self.error(format!("Duplicate attribute '{}'", attr_name)));
                    }
                    element.attributes.push((attr_name, value));
                }
                None => {
                    return Err(self.error(format!("Unterminated start tag <{}", element.name)))
                }
            }
        }
    }

    fn attribute_value(&mut self) -> Result<String, SyntaxError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("Attribute value must be quoted")),
        };
        self.advance();

        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated attribute value")),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(value);
                }
                Some('<') => return Err(self.error("'<' is not allowed in attribute values")),
                Some('&') => value.push(self.entity()?),
                Some(c) if is_forbidden_char(c) => {
                    return Err(self.error(format!("Invalid character U+{:04X}", c as u32)))
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn text(&mut self) -> Result<String, SyntaxError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            match c {
                '<' => break,
                '&' => text.push(self.entity()?),
                c if is_forbidden_char(c) => {
                    return Err(self.error(format!("Invalid character U+{:04X}", c as u32)))
                }
                c => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        Ok(text)
    }

    fn entity(&mut self) -> Result<char, SyntaxError> {
        self.expect("&")?;
        let mut body = String::new();
        loop {
            match self.advance() {
                Some(';') => break,
                Some(c) if c.is_alphanumeric() || c == '#' => body.push(c),
                _ => return Err(self.error("Bare '&' or unterminated entity reference")),
            }
        }

        let decoded = match body.as_str() {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            numeric if numeric.starts_with("#x") => u32::from_str_radix(&numeric[2..], 16)
                .ok()
                .and_then(char::from_u32),
            numeric if numeric.starts_with('#') => {
                numeric[1..].parse::<u32>().ok().and_then(char::from_u32)
            }
            _ => None,
        };

        match decoded {
            Some(c) if !is_forbidden_char(c) => Ok(c),
            _ => Err(self.error(format!("Unknown entity '&{};'", body))),
        }
    }
}
