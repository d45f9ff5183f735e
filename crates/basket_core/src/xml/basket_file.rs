//! `.basket` descriptor codec.
//!
//! # Responsibility
//! - Read and write the `basket` document: `properties` plus the nested
//!   `notes` tree of `group` and `note` elements.
//! - Read and write the `properties` element shared with `baskets.xml`.
//!
//! # Invariants
//! - Legacy names are accepted on read (`items`, `item`, `backroundImage`,
//!   `backroundColor`) and never written.
//! - Free-layout coordinates are clamped to zero or more.
//! - Groups without any note are dropped on read, except root-level columns.

use super::document::{bool_text, read_document, save_document, Element};
use super::XmlError;
use crate::model::basket::{
    normalize_color, Appearance, Basket, BasketProperties, Disposition, EncryptionType,
    Protection, Shortcut, ShortcutAction,
};
use crate::model::note::{Note, NoteContent, NoteId, NoteKind, NoteTree, Placement, DEFAULT_NOTE_WIDTH};
use std::path::Path;

/// Root element name of a basket descriptor.
pub const BASKET_ROOT: &str = "basket";

/// Reads a `properties` element; absent values keep `defaults`.
pub fn read_properties(element: Option<&Element>, defaults: &BasketProperties) -> BasketProperties {
    let Some(element) = element else {
        return defaults.clone();
    };

    let appearance = element.child("appearance");
    let appearance_attr = |keys: &[&str]| -> Option<String> {
        let node = appearance?;
        keys.iter().find_map(|key| node.get_attr(key).map(str::to_string))
    };
    let background_image = appearance_attr(&["backgroundImage", "backroundImage"])
        .unwrap_or_else(|| defaults.appearance.background_image.clone());
    let background_color = match appearance_attr(&["backgroundColor", "backroundColor"]) {
        Some(value) => normalize_color(&value),
        None => defaults.appearance.background_color.clone(),
    };
    let text_color = match appearance_attr(&["textColor"]) {
        Some(value) => normalize_color(&value),
        None => defaults.appearance.text_color.clone(),
    };

    let disposition = match element.child("disposition") {
        Some(node) => {
            let free = node.bool_attr("free", defaults.disposition.is_free());
            let mind_map = node.bool_attr(
                "mindMap",
                defaults.disposition == Disposition::MindMap,
            );
            let columns = node
                .int_attr("columnCount")
                .and_then(|count| u32::try_from(count).ok())
                .unwrap_or_else(|| defaults.disposition.column_count());
            Disposition::from_flags(free, mind_map, columns)
        }
        None => defaults.disposition,
    };

    let shortcut = match element.child("shortcut") {
        Some(node) => Shortcut {
            combination: node.attr_or("combination", &defaults.shortcut.combination),
            action: node
                .get_attr("action")
                .and_then(ShortcutAction::parse)
                .unwrap_or(defaults.shortcut.action),
        },
        None => defaults.shortcut.clone(),
    };

    let protection = match element.child("protection") {
        Some(node) => Protection {
            encryption: EncryptionType::from_code(node.int_attr("type").unwrap_or(0)),
            key: node.attr_or("key", ""),
        },
        None => defaults.protection.clone(),
    };

    BasketProperties {
        name: element.child_text("name", &defaults.name),
        icon: element.child_text("icon", &defaults.icon),
        appearance: Appearance {
            background_color,
            background_image,
            text_color,
        },
        disposition,
        shortcut,
        protection,
    }
}

/// Builds the `properties` element.
pub fn properties_element(properties: &BasketProperties) -> Element {
    let appearance = &properties.appearance;
    let disposition = properties.disposition;
    Element::new("properties")
        .child_element(Element::with_text("name", properties.name.as_str()))
        .child_element(Element::with_text("icon", properties.icon.as_str()))
        .child_element(
            Element::new("appearance")
                .attr(
                    "backgroundColor",
                    appearance.background_color.clone().unwrap_or_default(),
                )
                .attr("backgroundImage", appearance.background_image.as_str())
                .attr(
                    "textColor",
                    appearance.text_color.clone().unwrap_or_default(),
                ),
        )
        .child_element(
            Element::new("disposition")
                .attr("columnCount", disposition.column_count().to_string())
                .attr("free", bool_text(disposition.is_free()))
                .attr("mindMap", bool_text(disposition == Disposition::MindMap)),
        )
        .child_element(
            Element::new("shortcut")
                .attr("action", properties.shortcut.action.as_str())
                .attr("combination", properties.shortcut.combination.as_str()),
        )
        .child_element(
            Element::new("protection")
                .attr("key", properties.protection.key.as_str())
                .attr("type", properties.protection.encryption.code().to_string()),
        )
}

/// Builds a [`Basket`] from a parsed `basket` root element.
pub fn parse_basket(root: &Element, defaults: &BasketProperties) -> Result<Basket, XmlError> {
    let properties = read_properties(root.child("properties"), defaults);
    let free = properties.disposition.is_free();
    let mut notes = NoteTree::new();
    if let Some(element) = root.child("notes").or_else(|| root.child("items")) {
        read_notes(element, &mut notes, None, free)?;
    }
    Ok(Basket { properties, notes })
}

/// Builds the `basket` root element for a basket.
pub fn basket_element(basket: &Basket) -> Element {
    let free = basket.properties.disposition.is_free();
    let mut notes = Element::new("notes");
    write_notes(&basket.notes, None, free, &mut notes);
    Element::new(BASKET_ROOT)
        .child_element(properties_element(&basket.properties))
        .child_element(notes)
}

/// Loads a `.basket` file.
pub fn load_basket_file(path: &Path, defaults: &BasketProperties) -> Result<Basket, XmlError> {
    let root = read_document(path, BASKET_ROOT)?;
    parse_basket(&root, defaults)
}

/// Saves a `.basket` file atomically.
pub fn save_basket_file(path: &Path, basket: &Basket) -> Result<(), XmlError> {
    save_document(path, &basket_element(basket))
}

fn has_notes(element: &Element) -> bool {
    element.children.iter().any(|child| match child.name.as_str() {
        "note" | "item" => true,
        "group" => has_notes(child),
        _ => false,
    })
}

fn read_placement(element: &Element, root_level: bool, free: bool) -> Placement {
    if !root_level {
        return Placement::default();
    }
    let coordinate = |key: &str| -> Option<i32> {
        free.then(|| {
            element
                .int_attr(key)
                .map(|value| value.clamp(0, i64::from(i32::MAX)) as i32)
                .unwrap_or(0)
        })
    };
    Placement {
        x: coordinate("x"),
        y: coordinate("y"),
        width: Some(
            element
                .int_attr("width")
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(DEFAULT_NOTE_WIDTH),
        ),
    }
}

fn read_content(element: &Element) -> Option<NoteContent> {
    let type_name = element.get_attr("type")?;
    let content = element.child("content");
    let value = content.map(|node| node.text.clone()).unwrap_or_default();
    let parsed = NoteContent::from_type_name(type_name, value)?;
    let attr = |key: &str| content.map(|node| node.attr_or(key, "")).unwrap_or_default();
    Some(match parsed {
        NoteContent::Link { url, .. } => {
            let title = attr("title");
            let icon = attr("icon");
            let auto_title = content
                .map(|node| node.bool_attr("autoTitle", title == url))
                .unwrap_or(true);
            let auto_icon = content
                .map(|node| node.bool_attr("autoIcon", icon.is_empty()))
                .unwrap_or(true);
            NoteContent::Link {
                url,
                title,
                icon,
                auto_title,
                auto_icon,
            }
        }
        NoteContent::CrossReference { url, .. } => NoteContent::CrossReference {
            url,
            title: attr("title"),
            icon: attr("icon"),
        },
        other => other,
    })
}

/// Appends the notes of `element` under `parent`. Returns the ids created at
/// that level. Nested groups are built by wrapping their notes once read.
fn read_notes(
    element: &Element,
    tree: &mut NoteTree,
    parent: Option<NoteId>,
    free: bool,
) -> Result<Vec<NoteId>, XmlError> {
    let root_level = parent.is_none();
    let mut created = Vec::new();
    for child in &element.children {
        match child.name.as_str() {
            "group" => {
                let is_column = root_level && !free;
                if !has_notes(child) && !is_column {
                    continue;
                }
                let folded = !is_column && child.bool_attr("folded", false);
                if root_level {
                    let id = tree.append_child(
                        None,
                        NoteKind::Group {
                            folded,
                            placement: read_placement(child, root_level, free),
                        },
                    )?;
                    read_notes(child, tree, Some(id), free)?;
                    created.push(id);
                } else {
                    let members = read_notes(child, tree, parent, free)?;
                    if members.is_empty() {
                        continue;
                    }
                    let id = tree.group(&members)?;
                    tree.set_folded(id, folded)?;
                    created.push(id);
                }
            }
            "note" | "item" => {
                let Some(content) = read_content(child) else {
                    log::warn!(
                        "event=basket_note_skip module=xml status=warn type={}",
                        child.attr_or("type", "")
                    );
                    continue;
                };
                let mut note = Note::new(content);
                note.added = child.attr_or("added", "");
                note.last_modification = child.attr_or("lastModification", "");
                note.states = child
                    .child_text("tags", "")
                    .split(';')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect();
                note.placement = read_placement(child, root_level, free);
                created.push(tree.append_child(parent, NoteKind::Content(note))?);
            }
            _ => {}
        }
    }
    Ok(created)
}

fn write_placement(element: &mut Element, placement: &Placement, root_level: bool, free: bool) {
    if !root_level {
        return;
    }
    if free {
        element.set_attr("x", placement.x.unwrap_or(0).max(0).to_string());
        element.set_attr("y", placement.y.unwrap_or(0).max(0).to_string());
    }
    element.set_attr(
        "width",
        placement.width.unwrap_or(DEFAULT_NOTE_WIDTH).to_string(),
    );
}

fn content_element(content: &NoteContent) -> Element {
    match content {
        NoteContent::Link {
            url,
            title,
            icon,
            auto_title,
            auto_icon,
        } => Element::with_text("content", url.as_str())
            .attr("title", title.as_str())
            .attr("icon", icon.as_str())
            .attr("autoIcon", bool_text(*auto_icon))
            .attr("autoTitle", bool_text(*auto_title)),
        NoteContent::CrossReference { url, title, icon } => {
            Element::with_text("content", url.as_str())
                .attr("title", title.as_str())
                .attr("icon", icon.as_str())
        }
        NoteContent::Color(value) => Element::with_text("content", value.as_str()),
        other => Element::with_text("content", other.file_name().unwrap_or_default()),
    }
}

fn write_notes(tree: &NoteTree, parent: Option<NoteId>, free: bool, out: &mut Element) {
    let root_level = parent.is_none();
    for id in tree.children(parent) {
        let Some(node) = tree.get(id) else {
            continue;
        };
        match node.kind() {
            NoteKind::Group { folded, placement } => {
                let mut element = Element::new("group");
                write_placement(&mut element, placement, root_level, free);
                if !(root_level && !free) {
                    element.set_attr("folded", bool_text(*folded));
                }
                write_notes(tree, Some(id), free, &mut element);
                out.push(element);
            }
            NoteKind::Content(note) => {
                let mut element = Element::new("note");
                write_placement(&mut element, &note.placement, root_level, free);
                element.set_attr("added", note.added.as_str());
                element.set_attr("lastModification", note.last_modification.as_str());
                element.set_attr("type", note.content.type_name());
                element.push(content_element(&note.content));
                if !note.states.is_empty() {
                    element.push(Element::with_text("tags", note.states.join(";")));
                }
                out.push(element);
            }
        }
    }
}
