//! Whole-table operations: the worksheet tabs of a document

use super::{validate_name, GridError};
use crate::discovery::Table;
use crate::tree::{
    document_element_key, document_element_mut, Node, ObjectNode, Path, PathSegment,
};

fn parent_object<'a>(
    tree: &'a mut Node,
    table: &Table,
) -> Result<(&'a mut ObjectNode, String), GridError> {
    let key = table
        .path
        .last_key()
        .ok_or_else(|| {
            GridError::StructuralConflict(format!("Table {} is not addressed by name", table.name))
        })?
        .to_string();
    let parent_path = table.path.parent().unwrap_or_default();
    let parent = tree
        .resolve_mut(&parent_path)
        .and_then(Node::as_object_mut)
        .ok_or_else(|| {
            GridError::StructuralConflict(format!("Table {} no longer exists", table.name))
        })?;
    Ok((parent, key))
}

/// Rename the element that holds a table's rows; returns the new path
pub fn rename_table(tree: &mut Node, table: &Table, new_name: &str) -> Result<Path, GridError> {
    validate_name(new_name)?;
    let (parent, old) = parent_object(tree, table)?;
    if old == new_name {
        return Ok(table.path.clone());
    }
    if parent.contains_key(new_name) {
        return Err(GridError::StructuralConflict(format!(
            "An element named {} already exists here",
            new_name
        )));
    }
    parent.rename_key(&old, new_name);
    Ok(table.path.with_last_key(new_name))
}

/// Remove a table, and its container when nothing else is left in it
///
/// The document element itself is never removed.
pub fn delete_table(tree: &mut Node, table: &Table) -> Result<(), GridError> {
    let (parent, key) = parent_object(tree, table)?;
    if parent.remove(&key).is_none() {
        return Err(GridError::StructuralConflict(format!(
            "Table {} no longer exists",
            table.name
        )));
    }
    let parent_empty = parent.children.is_empty();

    let Some(parent_path) = table.path.parent() else {
        return Ok(());
    };
    if !parent_empty || parent_path.segments().len() < 2 {
        return Ok(());
    }
    if let (Some(PathSegment::Key(container)), Some(grand_path)) =
        (parent_path.last(), parent_path.parent())
    {
        if let Some(grand) = tree.resolve_mut(&grand_path).and_then(Node::as_object_mut) {
            grand.remove(container);
            tracing::debug!("Removed empty container {}", container);
        }
    }
    Ok(())
}

/// Add a new container with two sample rows under the document element
///
/// Two rows keep the table visible after a round trip through the codec,
/// which only produces arrays for repeated elements.
pub fn add_table(
    tree: &mut Node,
    container: &str,
    row_name: &str,
    root_element: &str,
) -> Result<Path, GridError> {
    validate_name(container)?;
    validate_name(row_name)?;

    let root_key = document_element_key(tree)
        .unwrap_or(root_element)
        .to_string();
    let element = document_element_mut(tree, root_element);
    if element.contains_key(container) {
        return Err(GridError::StructuralConflict(format!(
            "A section named {} already exists",
            container
        )));
    }

    let row = Node::Object(ObjectNode::from_scalars([("Col1", "Data")]));
    let mut holder = ObjectNode::new();
    holder.insert(row_name, Node::Array(vec![row.clone(), row]));
    element.insert(container, Node::Object(holder));

    Ok(Path::root().key(root_key).key(container).key(row_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{discover, Discovery};
    use crate::tree::{TreeCodec, XmlCodec};

    fn load(xml: &str) -> (Node, Vec<Table>) {
        let tree = XmlCodec::default().parse(xml).unwrap();
        let tables = match discover(&tree) {
            Discovery::Tables(t) => t,
            Discovery::Incompatible(_) => unreachable!(),
        };
        (tree, tables)
    }

    const DOC: &str = "<Course><Concepts><Concept><n>a</n></Concept><Concept><n>b</n></Concept></Concepts>\
                       <Items><Item><n>1</n></Item><Item><n>2</n></Item></Items></Course>";

    #[test]
    fn test_rename_table_renames_row_element() {
        let (mut tree, tables) = load(DOC);
        let path = rename_table(&mut tree, &tables[0], "Idea").unwrap();
        assert_eq!(path.to_string(), "Course/Concepts/Idea");
        assert!(tree.resolve(&path).is_some());
    }

    #[test]
    fn test_rename_table_conflict() {
        let (mut tree, tables) = load(
            "<R><Item><n>1</n></Item><Item><n>2</n></Item><Other>x</Other></R>",
        );
        assert!(matches!(
            rename_table(&mut tree, &tables[0], "Other"),
            Err(GridError::StructuralConflict(_))
        ));
    }

    #[test]
    fn test_delete_table_removes_empty_container() {
        let (mut tree, tables) = load(DOC);
        delete_table(&mut tree, &tables[0]).unwrap();
        assert!(tree.resolve(&Path::root().key("Course").key("Concepts")).is_none());
        assert!(tree.resolve(&Path::root().key("Course").key("Items")).is_some());
    }

    #[test]
    fn test_delete_table_keeps_document_element() {
        let (mut tree, tables) = load("<R><Item><n>1</n></Item><Item><n>2</n></Item></R>");
        delete_table(&mut tree, &tables[0]).unwrap();
        assert!(tree.resolve(&Path::root().key("R")).is_some());
    }

    #[test]
    fn test_add_table_creates_two_rows() {
        let (mut tree, _) = load(DOC);
        let path = add_table(&mut tree, "Extra", "Row", "Root").unwrap();
        assert_eq!(path.to_string(), "Course/Extra/Row");
        assert_eq!(tree.resolve(&path).and_then(Node::as_array).map(|a| a.len()), Some(2));
        assert!(matches!(
            add_table(&mut tree, "Extra", "Row", "Root"),
            Err(GridError::StructuralConflict(_))
        ));
    }
}
