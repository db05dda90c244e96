//! Table discovery
//!
//! Walks a parsed tree and reports every array whose first element is an
//! object as a table. Documents written by office suites (spreadsheet XML)
//! are detected up front and reported as incompatible.

use serde::Serialize;

use crate::config::PlaceholderConfig;
use crate::tree::{
    document_element_key, document_element_mut, is_reserved_key, Node, ObjectNode, Path,
    PathSegment, PI_PREFIX,
};

/// A discovered table: rows are the array elements at `path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Last key of the path, or `Table` for a root-level array
    pub name: String,
    pub path: Path,
    pub row_count: usize,
    /// Union of the row objects' keys in first-seen order
    pub columns: Vec<String>,
}

impl Table {
    pub fn rows<'a>(&self, tree: &'a Node) -> Option<&'a [Node]> {
        tree.resolve(&self.path).and_then(Node::as_array)
    }

    pub fn rows_mut<'a>(&self, tree: &'a mut Node) -> Option<&'a mut Vec<Node>> {
        tree.resolve_mut(&self.path).and_then(Node::as_array_mut)
    }
}

/// Why a document cannot be edited as a grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incompatibility {
    /// The marker that matched, for display
    pub marker: String,
}

impl Incompatibility {
    pub fn message(&self) -> String {
        format!(
            "This looks like an office spreadsheet document ({}); open it in a spreadsheet application instead",
            self.marker
        )
    }
}

/// Result of scanning a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Tables(Vec<Table>),
    Incompatible(Incompatibility),
}

/// Find every table in `tree`, in depth-first document order
pub fn discover(tree: &Node) -> Discovery {
    if let Some(incompatibility) = detect_office_schema(tree) {
        tracing::info!("Document rejected: {}", incompatibility.marker);
        return Discovery::Incompatible(incompatibility);
    }

    let mut tables = Vec::new();
    walk(tree, &Path::root(), &mut tables);
    tracing::debug!("Discovered {} tables", tables.len());
    Discovery::Tables(tables)
}

fn walk(node: &Node, path: &Path, tables: &mut Vec<Table>) {
    match node {
        Node::Array(items) => {
            if matches!(items.first(), Some(Node::Object(_))) {
                let name = match path.last() {
                    Some(PathSegment::Key(key)) => key.clone(),
                    _ => "Table".to_string(),
                };
                tables.push(Table {
                    name,
                    path: path.clone(),
                    row_count: items.len(),
                    columns: detect_columns(items),
                });
            }
            for (index, item) in items.iter().enumerate() {
                if let Node::Object(obj) = item {
                    walk_object(obj, &path.index(index), tables);
                }
            }
        }
        Node::Object(obj) => walk_object(obj, path, tables),
        Node::Scalar(_) => {}
    }
}

fn walk_object(obj: &ObjectNode, path: &Path, tables: &mut Vec<Table>) {
    for (key, child) in &obj.children {
        if is_reserved_key(key) {
            continue;
        }
        walk(child, &path.key(key), tables);
    }
}

/// Union of row keys in first-seen order
pub fn detect_columns(rows: &[Node]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Node::Object(obj) = row {
            for key in obj.column_keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }
    }
    columns
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn detect_office_schema(tree: &Node) -> Option<Incompatibility> {
    let root = tree.as_object()?;
    for (key, child) in &root.children {
        if let Some(target) = key.strip_prefix(PI_PREFIX) {
            if target == "mso-application" {
                return Some(Incompatibility {
                    marker: "<?mso-application?> instruction".to_string(),
                });
            }
            continue;
        }

        let local = local_name(key);
        if local == "Workbook" || local == "Worksheet" {
            return Some(Incompatibility {
                marker: format!("<{}> element", key),
            });
        }

        if let Node::Object(element) = child {
            for (name, value) in &element.attributes {
                let office_namespace = name.starts_with("xmlns")
                    && value.starts_with("urn:schemas-microsoft-com:office");
                if office_namespace || name.to_ascii_lowercase().contains("mso") {
                    return Some(Incompatibility {
                        marker: format!("{} attribute", name),
                    });
                }
            }
        }
    }
    None
}

/// Pick `base1`, `base2`... not already in `taken`
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    (1..)
        .map(|i| format!("{}{}", base, i))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Insert an empty placeholder table under the document element
///
/// Returns the path of the new table.
pub fn insert_placeholder(tree: &mut Node, config: &PlaceholderConfig) -> Path {
    let root_key = document_element_key(tree)
        .unwrap_or(&config.root_element)
        .to_string();

    let element = document_element_mut(tree, &config.root_element);
    let name = unique_name(&config.sheet_base, |candidate| element.contains_key(candidate));

    let row = ObjectNode::from_scalars(
        (1..=config.cols.max(1)).map(|i| (format!("{}{}", config.column_base, i), "")),
    );
    let rows = vec![Node::Object(row); config.rows.max(1)];
    element.insert(name.clone(), Node::Array(rows));

    tracing::info!("Inserted placeholder table {}", name);
    Path::root().key(root_key).key(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{TreeCodec, XmlCodec};

    fn tables(xml: &str) -> Vec<Table> {
        let tree = XmlCodec::default().parse(xml).unwrap();
        match discover(&tree) {
            Discovery::Tables(tables) => tables,
            Discovery::Incompatible(i) => panic!("unexpected incompatibility: {:?}", i),
        }
    }

    #[test]
    fn test_discovers_repeated_rows() {
        let found = tables("<Items><Item><a>1</a><b>2</b></Item><Item><a>3</a><c>4</c></Item></Items>");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Item");
        assert_eq!(found[0].path.to_string(), "Items/Item");
        assert_eq!(found[0].row_count, 2);
        assert_eq!(found[0].columns, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_nested_tables_in_document_order() {
        let found = tables(
            "<R><Order><Line><q>1</q></Line><Line><q>2</q></Line></Order>\
             <Order><Line><q>3</q></Line><Line><q>4</q></Line></Order></R>",
        );
        let paths: Vec<String> = found.iter().map(|t| t.path.to_string()).collect();
        assert_eq!(paths, vec!["R/Order", "R/Order[0]/Line", "R/Order[1]/Line"]);
    }

    #[test]
    fn test_scalar_arrays_are_not_tables() {
        assert!(tables("<R><tag>a</tag><tag>b</tag></R>").is_empty());
    }

    #[test]
    fn test_single_row_is_not_a_table() {
        assert!(tables("<R><Item><a>1</a></Item></R>").is_empty());
    }

    #[test]
    fn test_office_markers_are_incompatible() {
        let codec = XmlCodec::default();
        for xml in [
            "<Workbook><Worksheet/></Workbook>",
            "<ss:Workbook xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\"/>",
            "<?mso-application progid=\"Excel.Sheet\"?><Data/>",
            "<Data xmlns:o=\"urn:schemas-microsoft-com:office:office\"><a>1</a></Data>",
        ] {
            let tree = codec.parse(xml).unwrap();
            assert!(
                matches!(discover(&tree), Discovery::Incompatible(_)),
                "expected incompatible: {}",
                xml
            );
        }
    }

    #[test]
    fn test_placeholder_under_document_element() {
        let mut tree = XmlCodec::default().parse("<Data><title>x</title></Data>").unwrap();
        let path = insert_placeholder(&mut tree, &PlaceholderConfig::default());
        assert_eq!(path.to_string(), "Data/Sheet1");

        let found = match discover(&tree) {
            Discovery::Tables(t) => t,
            _ => unreachable!(),
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].row_count, 5);
        assert_eq!(found[0].columns, vec!["col1", "col2", "col3", "col4", "col5"]);
    }

    #[test]
    fn test_placeholder_in_empty_document_creates_root() {
        let mut tree = Node::empty_object();
        let path = insert_placeholder(&mut tree, &PlaceholderConfig::default());
        assert_eq!(path.to_string(), "Root/Sheet1");
        assert!(tree.resolve(&path).and_then(Node::as_array).is_some());
    }

    #[test]
    fn test_unique_name_skips_taken() {
        let taken = ["NewColumn1", "NewColumn2"];
        assert_eq!(unique_name("NewColumn", |c| taken.contains(&c)), "NewColumn3");
    }
}
