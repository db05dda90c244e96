//! Conversion between document text and the generic tree
//!
//! Mapping conventions used by [`XmlCodec`]:
//! - an element holding only text becomes a [`Node::Scalar`] (trimmed)
//! - repeated sibling elements collapse into a [`Node::Array`]
//! - an element with attributes or child elements becomes a [`Node::Object`];
//!   its text lives under [`TEXT_KEY`]
//! - processing instructions become `?target` scalar entries on the root
//! - comments are dropped, namespace prefixes are kept verbatim

use super::{Node, ObjectNode, PI_PREFIX, TEXT_KEY};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Parses document text into a tree and serializes it back
pub trait TreeCodec {
    fn parse(&self, text: &str) -> Result<Node, ParseError>;
    fn serialize(&self, tree: &Node) -> String;
}

/// Malformed document text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Parse error{}: {message}", location(.position))]
pub struct ParseError {
    pub message: String,
    /// 1-based position of the error, when known
    pub position: Option<(u32, u32)>,
}

fn location(position: &Option<(u32, u32)>) -> String {
    match position {
        Some((line, column)) => format!(" at {}:{}", line, column),
        None => String::new(),
    }
}

impl From<roxmltree::Error> for ParseError {
    fn from(err: roxmltree::Error) -> Self {
        let pos = err.pos();
        Self {
            message: err.to_string(),
            position: Some((pos.row, pos.col)),
        }
    }
}

/// XML codec backed by `roxmltree`
#[derive(Debug, Clone)]
pub struct XmlCodec {
    indent: String,
}

impl Default for XmlCodec {
    fn default() -> Self {
        Self::new("  ")
    }
}

impl XmlCodec {
    pub fn new(indent: impl Into<String>) -> Self {
        Self {
            indent: indent.into(),
        }
    }
}

impl TreeCodec for XmlCodec {
    fn parse(&self, text: &str) -> Result<Node, ParseError> {
        if text.trim().is_empty() {
            return Ok(Node::empty_object());
        }

        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options)?;

        let mut root = ObjectNode::new();
        // roxmltree does not report the declaration as a node
        if let Some(declaration) = xml_declaration(text) {
            root.children
                .push(("?xml".to_string(), Node::Scalar(declaration)));
        }

        for child in doc.root().children() {
            if child.is_element() {
                append_child(&mut root, qualified_name(child), element_to_node(child));
            } else if let Some(pi) = child.pi() {
                root.insert(
                    format!("{}{}", PI_PREFIX, pi.target),
                    Node::Scalar(pi.value.unwrap_or_default().trim().to_string()),
                );
            }
        }

        Ok(Node::Object(root))
    }

    fn serialize(&self, tree: &Node) -> String {
        let mut out = String::new();
        match tree {
            Node::Object(root) => {
                for (key, child) in &root.children {
                    self.write_entry(&mut out, key, child, 0);
                }
            }
            other => self.write_entry(&mut out, "Root", other, 0),
        }
        out
    }
}

impl XmlCodec {
    fn write_indent(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str(&self.indent);
        }
    }

    fn write_entry(&self, out: &mut String, name: &str, node: &Node, depth: usize) {
        if let Some(target) = name.strip_prefix(PI_PREFIX) {
            let content = node.as_scalar().unwrap_or_default();
            self.write_indent(out, depth);
            if content.is_empty() {
                out.push_str(&format!("<?{}?>\n", target));
            } else {
                out.push_str(&format!("<?{} {}?>\n", target, content));
            }
            return;
        }

        match node {
            Node::Array(items) => {
                for item in items {
                    self.write_entry(out, name, item, depth);
                }
            }
            Node::Scalar(text) => {
                self.write_indent(out, depth);
                out.push_str(&format!("<{}>{}</{}>\n", name, escape(text), name));
            }
            Node::Object(obj) => self.write_element(out, name, obj, depth),
        }
    }

    fn write_element(&self, out: &mut String, name: &str, obj: &ObjectNode, depth: usize) {
        self.write_indent(out, depth);
        out.push('<');
        out.push_str(name);
        for (attr, value) in &obj.attributes {
            out.push_str(&format!(" {}=\"{}\"", attr, escape(value)));
        }
        out.push('>');

        let text = obj.text().unwrap_or_default();
        if obj.is_text_only() {
            out.push_str(&escape(text));
            out.push_str(&format!("</{}>\n", name));
            return;
        }

        out.push('\n');
        if !text.is_empty() {
            self.write_indent(out, depth + 1);
            out.push_str(&escape(text));
            out.push('\n');
        }
        for (key, child) in &obj.children {
            if key == TEXT_KEY {
                continue;
            }
            self.write_entry(out, key, child, depth + 1);
        }
        self.write_indent(out, depth);
        out.push_str(&format!("</{}>\n", name));
    }
}

/// Add a child, collapsing repeated names into an array
fn append_child(obj: &mut ObjectNode, name: String, node: Node) {
    match obj.get_mut(&name) {
        Some(Node::Array(items)) => items.push(node),
        Some(existing) => {
            let first = std::mem::replace(existing, Node::Array(Vec::new()));
            *existing = Node::Array(vec![first, node]);
        }
        None => obj.children.push((name, node)),
    }
}

fn element_to_node(element: roxmltree::Node) -> Node {
    let mut obj = ObjectNode::new();
    obj.attributes = declared_namespaces(element);
    for attr in element.attributes() {
        let name = match attr.namespace() {
            Some(uri) => match prefix_for(element, uri) {
                Some(prefix) => format!("{}:{}", prefix, attr.name()),
                None => attr.name().to_string(),
            },
            None => attr.name().to_string(),
        };
        obj.attributes.push((name, attr.value().to_string()));
    }

    let mut text = String::new();
    for child in element.children() {
        if child.is_element() {
            append_child(&mut obj, qualified_name(child), element_to_node(child));
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }

    let text = text.trim();
    if obj.children.is_empty() && obj.attributes.is_empty() {
        return Node::Scalar(text.to_string());
    }
    obj.set_text(text);
    Node::Object(obj)
}

fn qualified_name(element: roxmltree::Node) -> String {
    let tag = element.tag_name();
    match tag.namespace().and_then(|uri| prefix_for(element, uri)) {
        Some(prefix) => format!("{}:{}", prefix, tag.name()),
        None => tag.name().to_string(),
    }
}

fn prefix_for<'input>(element: roxmltree::Node<'_, 'input>, uri: &str) -> Option<&'input str> {
    if uri == XML_NAMESPACE {
        return Some("xml");
    }
    element.lookup_prefix(uri).filter(|prefix| !prefix.is_empty())
}

/// Namespace declarations made on this element rather than inherited
fn declared_namespaces(element: roxmltree::Node) -> Vec<(String, String)> {
    let inherited: Vec<(Option<String>, String)> = element
        .parent_element()
        .map(|parent| {
            parent
                .namespaces()
                .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
                .collect()
        })
        .unwrap_or_default();

    element
        .namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter(|ns| {
            !inherited
                .iter()
                .any(|(name, uri)| name.as_deref() == ns.name() && uri == ns.uri())
        })
        .map(|ns| {
            let attr = match ns.name() {
                Some(prefix) => format!("xmlns:{}", prefix),
                None => "xmlns".to_string(),
            };
            (attr, ns.uri().to_string())
        })
        .collect()
}

/// Content of a leading `<?xml ...?>` declaration
fn xml_declaration(text: &str) -> Option<String> {
    let rest = text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .strip_prefix("<?xml")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let end = rest.find("?>")?;
    Some(rest[..end].trim().to_string())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
