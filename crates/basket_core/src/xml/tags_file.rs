//! `tags.xml` codec.
//!
//! # Responsibility
//! - Read and write tag definitions and their states.
//! - Carry the `nextStateUid` counter used to allocate fresh state ids.
//!
//! # Invariants
//! - Tags without any `state` element are skipped on read.
//! - Font size `-1` (or missing) means "basket default".

use super::document::{bool_text, parse_document, save_document, true_or_false, Element};
use super::XmlError;
use crate::model::basket::normalize_color;
use crate::model::tag::{State, Tag};
use std::fs;
use std::path::Path;

/// Root element of the tags file.
pub const TAGS_ROOT: &str = "basketTags";

/// Parsed content of a tags file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagsDocument {
    /// Next number used for `tag_state_<n>` ids.
    pub next_state_uid: u64,
    pub tags: Vec<Tag>,
}

/// Builds a [`TagsDocument`] from a parsed root element.
pub fn parse_tags(root: &Element) -> Result<TagsDocument, XmlError> {
    if root.name != TAGS_ROOT {
        return Err(XmlError::UnexpectedRoot {
            expected: TAGS_ROOT.to_string(),
            found: root.name.clone(),
        });
    }
    let next_state_uid = root
        .int_attr("nextStateUid")
        .and_then(|value| u64::try_from(value).ok())
        .unwrap_or(1);

    let mut tags = Vec::new();
    for element in root.children_named("tag") {
        let tag = Tag {
            name: element.child_text("name", ""),
            shortcut: element.child_text("shortcut", ""),
            inherited_by_siblings: true_or_false(&element.child_text("inherited", "false"), false),
            states: element.children_named("state").map(read_state).collect(),
        };
        if tag.states.is_empty() {
            log::warn!(
                "event=tag_skip module=xml status=warn reason=no_states name={}",
                tag.name
            );
            continue;
        }
        tags.push(tag);
    }
    Ok(TagsDocument {
        next_state_uid,
        tags,
    })
}

/// Builds the `basketTags` root element.
pub fn tags_element(document: &TagsDocument) -> Element {
    let mut root = Element::new(TAGS_ROOT).attr("nextStateUid", document.next_state_uid.to_string());
    for tag in &document.tags {
        let mut element = Element::new("tag")
            .child_element(Element::with_text("name", tag.name.as_str()))
            .child_element(Element::with_text("shortcut", tag.shortcut.as_str()))
            .child_element(Element::with_text(
                "inherited",
                bool_text(tag.inherited_by_siblings),
            ));
        for state in &tag.states {
            element.push(state_element(state));
        }
        root.push(element);
    }
    root
}

/// Loads `tags.xml`. A missing file is an empty document.
pub fn load_tags_file(path: &Path) -> Result<TagsDocument, XmlError> {
    if !path.exists() {
        return Ok(TagsDocument {
            next_state_uid: 1,
            tags: Vec::new(),
        });
    }
    let source = fs::read_to_string(path).map_err(|err| XmlError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;
    parse_tags(&parse_document(&source)?)
}

/// Saves `tags.xml` atomically.
pub fn save_tags_file(path: &Path, document: &TagsDocument) -> Result<(), XmlError> {
    save_document(path, &tags_element(document))
}

fn read_state(element: &Element) -> State {
    let text = element.child("text");
    let style = |key: &str| text.map(|node| node.bool_attr(key, false)).unwrap_or(false);
    let font = element.child("font");
    let equivalent = element.child("textEquivalent");

    State {
        id: element.attr_or("id", ""),
        name: element.child_text("name", ""),
        emblem: element.child_text("emblem", ""),
        bold: style("bold"),
        italic: style("italic"),
        underline: style("underline"),
        strike_out: style("strikeOut"),
        text_color: text
            .and_then(|node| node.get_attr("color"))
            .and_then(normalize_color),
        font_name: font.map(|node| node.attr_or("name", "")).unwrap_or_default(),
        font_size: font
            .and_then(|node| node.int_attr("size"))
            .and_then(|size| u32::try_from(size).ok())
            .filter(|size| *size > 0),
        background_color: normalize_color(&element.child_text("backgroundColor", "")),
        text_equivalent: equivalent
            .map(|node| node.attr_or("string", ""))
            .unwrap_or_default(),
        on_all_text_lines: equivalent
            .map(|node| node.bool_attr("onAllTextLines", false))
            .unwrap_or(false),
        allow_cross_references: true_or_false(
            &element.child_text("allowCrossReferences", "true"),
            true,
        ),
    }
}

fn state_element(state: &State) -> Element {
    let mut text = Element::new("text")
        .attr("bold", bool_text(state.bold))
        .attr("italic", bool_text(state.italic))
        .attr("underline", bool_text(state.underline))
        .attr("strikeOut", bool_text(state.strike_out));
    if let Some(color) = &state.text_color {
        text.set_attr("color", color.as_str());
    }
    let font_size = state
        .font_size
        .map(|size| size.to_string())
        .unwrap_or_else(|| "-1".to_string());

    let mut element = Element::new("state")
        .attr("id", state.id.as_str())
        .child_element(Element::with_text("name", state.name.as_str()))
        .child_element(Element::with_text("emblem", state.emblem.as_str()))
        .child_element(text)
        .child_element(
            Element::new("font")
                .attr("name", state.font_name.as_str())
                .attr("size", font_size),
        );
    if let Some(color) = &state.background_color {
        element.push(Element::with_text("backgroundColor", color.as_str()));
    }
    element.push(
        Element::new("textEquivalent")
            .attr("string", state.text_equivalent.as_str())
            .attr("onAllTextLines", bool_text(state.on_all_text_lines)),
    );
    element.push(Element::with_text(
        "allowCrossReferences",
        bool_text(state.allow_cross_references),
    ));
    element
}
