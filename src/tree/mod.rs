//! Generic document tree
//!
//! The parsed form of an XML-like document: scalars, ordered objects and
//! arrays of sibling elements. Tables are arrays whose first element is an
//! object, addressed by a [`Path`] of keys and indices from the root.

pub mod codec;

use std::fmt;

use serde::Serialize;

pub use codec::{ParseError, TreeCodec, XmlCodec};

/// Reserved key holding the text content of an element that also carries
/// attributes or child elements
pub const TEXT_KEY: &str = "#text";

/// Prefix of keys that hold processing instructions (`?xml`, `?mso-application`)
pub const PI_PREFIX: char = '?';

/// Keys that never count as columns or as table candidates
pub fn is_reserved_key(key: &str) -> bool {
    key == TEXT_KEY || key.starts_with(PI_PREFIX)
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Scalar(String),
    Object(ObjectNode),
    Array(Vec<Node>),
}

/// An element with ordered children and its attributes kept apart
///
/// Child order is the document order and survives every mutation made
/// through this type; renames happen in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectNode {
    pub children: Vec<(String, Node)>,
    pub attributes: Vec<(String, String)>,
}

impl ObjectNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an object from `(key, text)` pairs, all scalars
    pub fn from_scalars<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            children: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), Node::Scalar(v.into())))
                .collect(),
            attributes: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.children.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.children
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.children.iter().any(|(k, _)| k == key)
    }

    /// Replace the value under `key` in place, or append a new entry
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.children.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.children.iter().position(|(k, _)| k == key)?;
        Some(self.children.remove(index).1)
    }

    /// Rename a child key without moving it. Returns false if `old` is absent.
    pub fn rename_key(&mut self, old: &str, new: &str) -> bool {
        match self.children.iter_mut().find(|(k, _)| k == old) {
            Some(entry) => {
                entry.0 = new.to_string();
                true
            }
            None => false,
        }
    }

    /// Child keys in document order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(k, _)| k.as_str())
    }

    /// Child keys that can act as columns
    pub fn column_keys(&self) -> impl Iterator<Item = &str> {
        self.keys().filter(|k| !is_reserved_key(k))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text content stored under [`TEXT_KEY`]
    pub fn text(&self) -> Option<&str> {
        self.get(TEXT_KEY).and_then(Node::as_scalar)
    }

    /// Set the text content, dropping the entry when `text` is empty
    pub fn set_text(&mut self, text: &str) {
        if text.is_empty() {
            self.remove(TEXT_KEY);
        } else if let Some(slot) = self.get_mut(TEXT_KEY) {
            *slot = Node::Scalar(text.to_string());
        } else {
            self.children
                .insert(0, (TEXT_KEY.to_string(), Node::Scalar(text.to_string())));
        }
    }

    /// True when the object carries no child elements besides its text
    pub fn is_text_only(&self) -> bool {
        self.children.iter().all(|(k, _)| k == TEXT_KEY)
    }

    /// Reorder children so `order` comes first; keys not named keep their
    /// relative order after them
    pub fn reorder(&mut self, order: &[String]) {
        let mut remaining = std::mem::take(&mut self.children);
        let mut sorted = Vec::with_capacity(remaining.len());
        for key in order {
            if let Some(index) = remaining.iter().position(|(k, _)| k == key) {
                sorted.push(remaining.remove(index));
            }
        }
        // Reserved entries (text content) stay ahead of columns
        let (reserved, rest): (Vec<_>, Vec<_>) =
            remaining.into_iter().partition(|(k, _)| is_reserved_key(k));
        self.children = reserved;
        self.children.extend(sorted);
        self.children.extend(rest);
    }
}

impl Node {
    pub fn empty_object() -> Self {
        Node::Object(ObjectNode::new())
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectNode> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Follow `path` from this node
    pub fn resolve(&self, path: &Path) -> Option<&Node> {
        path.segments().iter().try_fold(self, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object()?.get(key),
            PathSegment::Index(index) => node.as_array()?.get(*index),
        })
    }

    pub fn resolve_mut(&mut self, path: &Path) -> Option<&mut Node> {
        let mut node = self;
        for segment in path.segments() {
            node = match segment {
                PathSegment::Key(key) => node.as_object_mut()?.get_mut(key)?,
                PathSegment::Index(index) => node.as_array_mut()?.get_mut(*index)?,
            };
        }
        Some(node)
    }

    /// Turn this node into an object, keeping a scalar's text as content
    pub fn make_object(&mut self) -> &mut ObjectNode {
        if !matches!(self, Node::Object(_)) {
            let mut obj = ObjectNode::new();
            if let Node::Scalar(text) = self {
                obj.set_text(text);
            }
            *self = Node::Object(obj);
        }
        match self {
            Node::Object(obj) => obj,
            _ => unreachable!("node was converted to an object above"),
        }
    }
}

fn is_document_element(key: &str, node: &Node) -> bool {
    !is_reserved_key(key) && !matches!(node, Node::Array(_))
}

/// Key of the document element: the first top-level element
pub fn document_element_key(tree: &Node) -> Option<&str> {
    tree.as_object()?
        .children
        .iter()
        .find(|(k, v)| is_document_element(k, v))
        .map(|(k, _)| k.as_str())
}

/// Find the document element of a parsed tree, creating `fallback` when the
/// document has none
///
/// The root of a parsed tree is an object whose non-reserved children are
/// top-level elements. A scalar document element is promoted to an object.
pub fn document_element_mut<'a>(tree: &'a mut Node, fallback: &str) -> &'a mut ObjectNode {
    let root = tree.make_object();
    let existing = root
        .children
        .iter()
        .position(|(k, v)| is_document_element(k, v));
    let index = match existing {
        Some(index) => index,
        None => {
            root.children
                .push((fallback.to_string(), Node::empty_object()));
            root.children.len() - 1
        }
    };
    root.children[index].1.make_object()
}

/// One step of a [`Path`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a node in the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Child path through an object key
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Key(key.into()));
        next
    }

    /// Child path through an array index
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Index(index));
        next
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// The final segment when it is a key
    pub fn last_key(&self) -> Option<&str> {
        match self.0.last()? {
            PathSegment::Key(key) => Some(key),
            PathSegment::Index(_) => None,
        }
    }

    /// Replace the final key segment
    pub fn with_last_key(&self, key: &str) -> Self {
        let mut next = self.clone();
        if let Some(PathSegment::Key(last)) = next.0.last_mut() {
            *last = key.to_string();
        }
        next
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => {
                    if !first {
                        f.write_str("/")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
            first = false;
        }
        Ok(())
    }
}

/// The content of one grid cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Scalar(String),
    /// Element carrying attributes or children; only the text is editable
    Mixed {
        text: String,
        attributes: Vec<(String, String)>,
    },
}

impl CellValue {
    pub fn from_node(node: &Node) -> Self {
        match node {
            Node::Scalar(text) => CellValue::Scalar(text.clone()),
            Node::Object(obj) => CellValue::Mixed {
                text: obj.text().unwrap_or_default().to_string(),
                attributes: obj.attributes.clone(),
            },
            Node::Array(_) => CellValue::Mixed {
                text: String::new(),
                attributes: Vec::new(),
            },
        }
    }

    pub fn text(&self) -> &str {
        match self {
            CellValue::Scalar(text) => text,
            CellValue::Mixed { text, .. } => text,
        }
    }
}

/// Write `text` into `key` of a row object
///
/// Mixed elements keep their attributes and only have their text replaced;
/// anything else becomes a scalar.
pub fn write_cell(row: &mut ObjectNode, key: &str, text: &str) {
    match row.get_mut(key) {
        Some(Node::Object(obj)) if obj.is_text_only() => obj.set_text(text),
        Some(slot) => *slot = Node::Scalar(text.to_string()),
        None => row.children.push((key.to_string(), Node::Scalar(text.to_string()))),
    }
}
