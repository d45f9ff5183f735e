//! `baskets.xml` tree index codec.
//!
//! # Responsibility
//! - Read and write the basket hierarchy with each basket's folder name,
//!   fold state, last-opened flag and embedded properties.
//!
//! # Invariants
//! - `folderName` is written with a trailing `/` and stored without it.
//! - `basket` elements without a folder name are skipped on read.

use super::basket_file::{properties_element, read_properties};
use super::document::{bool_text, parse_document, save_document, Element};
use super::XmlError;
use crate::model::basket::{BasketNode, BasketProperties, BasketTree};
use std::fs;
use std::path::Path;

/// Root element of the tree index.
pub const TREE_ROOT: &str = "basketTree";
/// Root element name written by early 0.6.0 releases.
const LEGACY_TREE_ROOT: &str = "basketsTree";

/// Strips the trailing slash(es) of a persisted folder name.
pub fn normalize_folder_name(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

/// Builds a [`BasketTree`] from a parsed root element.
pub fn parse_tree(root: &Element) -> Result<BasketTree, XmlError> {
    if root.name != TREE_ROOT && root.name != LEGACY_TREE_ROOT {
        return Err(XmlError::UnexpectedRoot {
            expected: TREE_ROOT.to_string(),
            found: root.name.clone(),
        });
    }
    Ok(BasketTree {
        roots: read_nodes(root),
    })
}

/// Builds the `basketTree` root element.
pub fn tree_element(tree: &BasketTree) -> Element {
    let mut root = Element::new(TREE_ROOT);
    for node in &tree.roots {
        root.push(node_element(node));
    }
    root
}

/// Builds one `basket` element with its subtree.
pub fn node_element(node: &BasketNode) -> Element {
    let mut element = Element::new("basket")
        .attr("folderName", format!("{}/", node.folder_name))
        .attr("folded", bool_text(node.folded));
    if node.last_opened {
        element.set_attr("lastOpened", "true");
    }
    element.push(properties_element(&node.properties));
    for child in &node.children {
        element.push(node_element(child));
    }
    element
}

/// Loads `baskets.xml`. A missing file is an empty tree.
pub fn load_tree_file(path: &Path) -> Result<BasketTree, XmlError> {
    if !path.exists() {
        return Ok(BasketTree::new());
    }
    let source = fs::read_to_string(path).map_err(|err| XmlError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;
    parse_tree(&parse_document(&source)?)
}

/// Saves `baskets.xml` atomically.
pub fn save_tree_file(path: &Path, tree: &BasketTree) -> Result<(), XmlError> {
    save_document(path, &tree_element(tree))
}

fn read_nodes(parent: &Element) -> Vec<BasketNode> {
    parent
        .children_named("basket")
        .filter_map(|element| {
            let folder_name = normalize_folder_name(&element.attr_or("folderName", ""));
            if folder_name.is_empty() {
                return None;
            }
            let defaults = BasketProperties::default();
            Some(BasketNode {
                folder_name,
                folded: element.bool_attr("folded", false),
                last_opened: element.bool_attr("lastOpened", false),
                properties: read_properties(element.child("properties"), &defaults),
                children: read_nodes(element),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_tree, tree_element};
    use crate::xml::document::{parse_document, write_document};

    #[test]
    fn nested_baskets_read_without_trailing_slash() {
        let root = parse_document(
            "<basketTree><basket folderName=\"basket1/\" folded=\"true\" lastOpened=\"true\">\
             <properties><name>One</name></properties>\
             <basket folderName=\"basket2/\"><properties><name>Two</name></properties></basket>\
             </basket><basket><properties/></basket></basketTree>",
        )
        .unwrap();
        let tree = parse_tree(&root).unwrap();

        assert_eq!(tree.roots.len(), 1);
        let first = &tree.roots[0];
        assert_eq!(first.folder_name, "basket1");
        assert!(first.folded);
        assert!(first.last_opened);
        assert_eq!(first.children[0].properties.name, "Two");
        assert!(!first.children[0].last_opened);
    }

    #[test]
    fn written_index_restores_slash_and_reads_back() {
        let root = parse_document(
            "<basketsTree><basket folderName=\"a/\"><properties><name>A</name></properties>\
             </basket></basketsTree>",
        )
        .unwrap();
        let tree = parse_tree(&root).unwrap();
        let text = write_document(&tree_element(&tree));

        assert!(text.contains("<!DOCTYPE basketTree>"));
        assert!(text.contains("folderName=\"a/\""));
        assert_eq!(parse_tree(&parse_document(&text).unwrap()).unwrap(), tree);
    }
}
