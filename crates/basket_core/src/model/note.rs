//! Note tree of one basket.
//!
//! # Responsibility
//! - Store notes and note groups in an arena addressed by `NoteId` handles.
//! - Provide the only editing primitives for the tree (insert, group,
//!   ungroup, remove) and the tag-state cascades over every note.
//!
//! # Invariants
//! - A content note never has children; a group never carries content.
//! - `NoteId` handles stay stable for the tree lifetime and are never reused.
//! - Root-level groups are columns and may be empty; a nested group that
//!   loses its last child is removed with it.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Width of columns and free-layout notes when none is recorded.
pub const DEFAULT_NOTE_WIDTH: u32 = 200;

/// Stable handle of one node inside a [`NoteTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(usize);

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content payload of a note.
///
/// File-backed kinds hold the name of a file stored next to the `.basket`
/// descriptor in the basket folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteContent {
    Text(String),
    Html(String),
    Image(String),
    Animation(String),
    Sound(String),
    File(String),
    Link {
        url: String,
        title: String,
        icon: String,
        auto_title: bool,
        auto_icon: bool,
    },
    CrossReference {
        url: String,
        title: String,
        icon: String,
    },
    Launcher(String),
    /// `#rrggbb` color value.
    Color(String),
    Unknown(String),
}

impl NoteContent {
    /// Value of the `type` attribute for this content kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Html(_) => "html",
            Self::Image(_) => "image",
            Self::Animation(_) => "animation",
            Self::Sound(_) => "sound",
            Self::File(_) => "file",
            Self::Link { .. } => "link",
            Self::CrossReference { .. } => "cross_reference",
            Self::Launcher(_) => "launcher",
            Self::Color(_) => "color",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Name of the backing file for file-backed kinds.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Self::Text(name)
            | Self::Html(name)
            | Self::Image(name)
            | Self::Animation(name)
            | Self::Sound(name)
            | Self::File(name)
            | Self::Launcher(name)
            | Self::Unknown(name) => Some(name.as_str()),
            Self::Link { .. } | Self::CrossReference { .. } | Self::Color(_) => None,
        }
    }

    /// Parses a `type` attribute value; unknown names yield `None`.
    pub fn from_type_name(type_name: &str, value: String) -> Option<Self> {
        let content = match type_name {
            "text" => Self::Text(value),
            "html" => Self::Html(value),
            "image" => Self::Image(value),
            "animation" => Self::Animation(value),
            "sound" => Self::Sound(value),
            "file" => Self::File(value),
            "link" => Self::Link {
                url: value,
                title: String::new(),
                icon: String::new(),
                auto_title: true,
                auto_icon: true,
            },
            "cross_reference" => Self::CrossReference {
                url: value,
                title: String::new(),
                icon: String::new(),
            },
            "launcher" => Self::Launcher(value),
            "color" => Self::Color(value),
            "unknown" => Self::Unknown(value),
            _ => return None,
        };
        Some(content)
    }
}

/// Position and width of a root-level node. Nested nodes leave it empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
}

/// One content note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub content: NoteContent,
    /// ISO-8601 creation timestamp, kept verbatim.
    pub added: String,
    /// ISO-8601 modification timestamp, kept verbatim.
    pub last_modification: String,
    /// Tag state ids in display order.
    pub states: Vec<String>,
    pub placement: Placement,
}

impl Note {
    pub fn new(content: NoteContent) -> Self {
        Self {
            content,
            added: String::new(),
            last_modification: String::new(),
            states: Vec::new(),
            placement: Placement::default(),
        }
    }

    pub fn has_state(&self, state_id: &str) -> bool {
        self.states.iter().any(|id| id == state_id)
    }
}

/// What a tree node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteKind {
    Group { folded: bool, placement: Placement },
    Content(Note),
}

impl NoteKind {
    pub fn group() -> Self {
        Self::Group {
            folded: false,
            placement: Placement::default(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Self::Content(note) => Some(note),
            Self::Group { .. } => None,
        }
    }
}

/// Arena slot with explicit tree links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteNode {
    kind: NoteKind,
    parent: Option<NoteId>,
    first_child: Option<NoteId>,
    prev: Option<NoteId>,
    next: Option<NoteId>,
    alive: bool,
}

impl NoteNode {
    pub fn kind(&self) -> &NoteKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NoteId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NoteId> {
        self.first_child
    }

    pub fn prev(&self) -> Option<NoteId> {
        self.prev
    }

    pub fn next(&self) -> Option<NoteId> {
        self.next
    }
}

/// Errors from note tree edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteTreeError {
    /// Handle does not address a live node.
    NotFound(NoteId),
    /// Children were requested under a content note.
    ContentCannotHaveChildren(NoteId),
    /// Node exists but is not a group.
    NotAGroup(NoteId),
    /// Node exists but is not a content note.
    NotANote(NoteId),
    /// `group` was called without nodes.
    EmptySelection,
    /// `group` was called with nodes that do not share one parent.
    NotSiblings,
    /// An empty group was inserted below the root level. Nested groups are
    /// created with [`NoteTree::group`].
    NestedEmptyGroup,
}

impl Display for NoteTreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::ContentCannotHaveChildren(id) => {
                write!(f, "content note cannot have children: {id}")
            }
            Self::NotAGroup(id) => write!(f, "note is not a group: {id}"),
            Self::NotANote(id) => write!(f, "node is not a content note: {id}"),
            Self::EmptySelection => write!(f, "no notes selected"),
            Self::NotSiblings => write!(f, "selected notes must be distinct siblings"),
            Self::NestedEmptyGroup => write!(f, "nested groups must wrap existing notes"),
        }
    }
}

impl Error for NoteTreeError {}

/// Ordered forest of notes and groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteTree {
    nodes: Vec<NoteNode>,
    first_root: Option<NoteId>,
}

impl NoteTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NoteId) -> Option<&NoteNode> {
        self.nodes.get(id.0).filter(|node| node.alive)
    }

    /// Mutable access to a content note. Groups are edited through
    /// [`NoteTree::set_folded`] and the structural operations.
    pub fn note_mut(&mut self, id: NoteId) -> Result<&mut Note, NoteTreeError> {
        self.ensure_alive(id)?;
        match &mut self.nodes[id.0].kind {
            NoteKind::Content(note) => Ok(note),
            NoteKind::Group { .. } => Err(NoteTreeError::NotANote(id)),
        }
    }

    pub fn set_folded(&mut self, id: NoteId, value: bool) -> Result<(), NoteTreeError> {
        self.ensure_alive(id)?;
        match &mut self.nodes[id.0].kind {
            NoteKind::Group { folded, .. } => {
                *folded = value;
                Ok(())
            }
            NoteKind::Content(_) => Err(NoteTreeError::NotAGroup(id)),
        }
    }

    /// Children of `parent` in order; `None` lists the root level.
    pub fn children(&self, parent: Option<NoteId>) -> Vec<NoteId> {
        let mut out = Vec::new();
        let mut cursor = self.first_child_of(parent);
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.nodes[id.0].next;
        }
        out
    }

    /// Appends a node as last child of `parent` (root level for `None`).
    pub fn append_child(
        &mut self,
        parent: Option<NoteId>,
        kind: NoteKind,
    ) -> Result<NoteId, NoteTreeError> {
        if let Some(parent) = parent {
            self.ensure_group(parent)?;
        }
        Self::ensure_placeable(parent, &kind)?;
        let last = self.children(parent).last().copied();
        let id = self.allocate(kind);
        self.link_after(parent, last, id);
        Ok(id)
    }

    /// Inserts a node right before `sibling`, under the same parent.
    pub fn insert_before(&mut self, sibling: NoteId, kind: NoteKind) -> Result<NoteId, NoteTreeError> {
        self.ensure_alive(sibling)?;
        let parent = self.nodes[sibling.0].parent;
        Self::ensure_placeable(parent, &kind)?;
        let prev = self.nodes[sibling.0].prev;
        let id = self.allocate(kind);
        self.link_after(parent, prev, id);
        Ok(id)
    }

    /// Inserts a node right after `sibling`, under the same parent.
    pub fn insert_after(&mut self, sibling: NoteId, kind: NoteKind) -> Result<NoteId, NoteTreeError> {
        self.ensure_alive(sibling)?;
        let parent = self.nodes[sibling.0].parent;
        Self::ensure_placeable(parent, &kind)?;
        let id = self.allocate(kind);
        self.link_after(parent, Some(sibling), id);
        Ok(id)
    }

    /// Wraps sibling nodes into a new group placed where the first of them
    /// (in sibling order) was. The group takes that node's placement.
    pub fn group(&mut self, ids: &[NoteId]) -> Result<NoteId, NoteTreeError> {
        let Some(&head) = ids.first() else {
            return Err(NoteTreeError::EmptySelection);
        };
        for &id in ids {
            self.ensure_alive(id)?;
        }
        let parent = self.nodes[head.0].parent;
        let selected: HashSet<NoteId> = ids.iter().copied().collect();
        if selected.len() != ids.len()
            || ids.iter().any(|id| self.nodes[id.0].parent != parent)
        {
            return Err(NoteTreeError::NotSiblings);
        }

        let ordered: Vec<NoteId> = self
            .children(parent)
            .into_iter()
            .filter(|id| selected.contains(id))
            .collect();
        let first = ordered[0];
        let placement = match &self.nodes[first.0].kind {
            NoteKind::Content(note) => note.placement,
            NoteKind::Group { placement, .. } => *placement,
        };
        let prev = self.nodes[first.0].prev;
        let group = self.allocate(NoteKind::Group {
            folded: false,
            placement,
        });
        self.link_after(parent, prev, group);

        let mut last = None;
        for id in ordered {
            self.unlink(id);
            self.link_after(Some(group), last, id);
            last = Some(id);
        }
        Ok(group)
    }

    /// Dissolves a group, splicing its children into the group's position.
    /// Returns the moved children in order.
    pub fn ungroup(&mut self, group: NoteId) -> Result<Vec<NoteId>, NoteTreeError> {
        match self.get(group) {
            None => return Err(NoteTreeError::NotFound(group)),
            Some(node) if !node.kind.is_group() => return Err(NoteTreeError::NotAGroup(group)),
            Some(_) => {}
        }
        let parent = self.nodes[group.0].parent;
        let children = self.children(Some(group));
        let mut prev = group;
        for &child in &children {
            self.unlink(child);
            self.link_after(parent, Some(prev), child);
            prev = child;
        }
        self.unlink(group);
        self.nodes[group.0].alive = false;
        Ok(children)
    }

    /// Removes a node with its subtree. Returns the number of nodes removed,
    /// including nested groups that became empty.
    pub fn remove(&mut self, id: NoteId) -> Result<usize, NoteTreeError> {
        self.ensure_alive(id)?;
        let doomed: Vec<NoteId> = std::iter::once(id).chain(self.descendants(id)).collect();
        let mut parent = self.nodes[id.0].parent;
        self.unlink(id);
        for &node in &doomed {
            self.nodes[node.0].alive = false;
        }
        let mut removed = doomed.len();

        while let Some(current) = parent {
            let node = &self.nodes[current.0];
            if node.first_child.is_some() || node.parent.is_none() {
                break;
            }
            parent = node.parent;
            self.unlink(current);
            self.nodes[current.0].alive = false;
            removed += 1;
        }
        Ok(removed)
    }

    /// Number of live content notes.
    pub fn count_notes(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.alive && !node.kind.is_group())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.first_root.is_none()
    }

    /// Pre-order walk over every live node, roots first.
    pub fn iter_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            cursor: self.first_root,
            stop_at: None,
        }
    }

    /// Removes `state_id` from every note. Returns the number of notes changed.
    pub fn remove_state(&mut self, state_id: &str) -> usize {
        let mut changed = 0;
        for node in self.nodes.iter_mut().filter(|node| node.alive) {
            if let NoteKind::Content(note) = &mut node.kind {
                let before = note.states.len();
                note.states.retain(|id| id != state_id);
                if note.states.len() != before {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Renames state ids on every note according to `renames` (old -> new).
    /// A note already carrying the new id keeps a single copy.
    pub fn rename_states(&mut self, renames: &HashMap<String, String>) -> usize {
        if renames.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for node in self.nodes.iter_mut().filter(|node| node.alive) {
            if let NoteKind::Content(note) = &mut node.kind {
                let mut touched = false;
                let mut renamed: Vec<String> = Vec::with_capacity(note.states.len());
                for id in note.states.drain(..) {
                    let target = match renames.get(&id) {
                        Some(new_id) => {
                            touched = true;
                            new_id.clone()
                        }
                        None => id,
                    };
                    if !renamed.contains(&target) {
                        renamed.push(target);
                    }
                }
                note.states = renamed;
                if touched {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Distinct state ids used by any note, in first-use order.
    pub fn used_states(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in self.iter_depth_first() {
            if let Some(note) = self.nodes[id.0].kind.as_note() {
                for state in &note.states {
                    if seen.insert(state.as_str()) {
                        out.push(state.clone());
                    }
                }
            }
        }
        out
    }

    fn descendants(&self, id: NoteId) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            cursor: self.nodes[id.0].first_child,
            stop_at: Some(id),
        }
    }

    fn ensure_alive(&self, id: NoteId) -> Result<(), NoteTreeError> {
        self.get(id).map(|_| ()).ok_or(NoteTreeError::NotFound(id))
    }

    fn ensure_group(&self, id: NoteId) -> Result<(), NoteTreeError> {
        match self.get(id) {
            None => Err(NoteTreeError::NotFound(id)),
            Some(node) if node.kind.is_group() => Ok(()),
            Some(_) => Err(NoteTreeError::ContentCannotHaveChildren(id)),
        }
    }

    /// Only root-level columns may be inserted as empty groups.
    fn ensure_placeable(parent: Option<NoteId>, kind: &NoteKind) -> Result<(), NoteTreeError> {
        if parent.is_some() && kind.is_group() {
            return Err(NoteTreeError::NestedEmptyGroup);
        }
        Ok(())
    }

    fn allocate(&mut self, kind: NoteKind) -> NoteId {
        let id = NoteId(self.nodes.len());
        self.nodes.push(NoteNode {
            kind,
            parent: None,
            first_child: None,
            prev: None,
            next: None,
            alive: true,
        });
        id
    }

    fn first_child_of(&self, parent: Option<NoteId>) -> Option<NoteId> {
        match parent {
            None => self.first_root,
            Some(parent) => self.nodes[parent.0].first_child,
        }
    }

    fn set_first_child(&mut self, parent: Option<NoteId>, child: Option<NoteId>) {
        match parent {
            None => self.first_root = child,
            Some(parent) => self.nodes[parent.0].first_child = child,
        }
    }

    /// Links a detached node under `parent` after `prev` (at the front for `None`).
    fn link_after(&mut self, parent: Option<NoteId>, prev: Option<NoteId>, id: NoteId) {
        let next = match prev {
            Some(prev) => self.nodes[prev.0].next,
            None => self.first_child_of(parent),
        };
        {
            let node = &mut self.nodes[id.0];
            node.parent = parent;
            node.prev = prev;
            node.next = next;
        }
        match prev {
            Some(prev) => self.nodes[prev.0].next = Some(id),
            None => self.set_first_child(parent, Some(id)),
        }
        if let Some(next) = next {
            self.nodes[next.0].prev = Some(id);
        }
    }

    fn unlink(&mut self, id: NoteId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id.0];
            (node.parent, node.prev, node.next)
        };
        match prev {
            Some(prev) => self.nodes[prev.0].next = next,
            None => self.set_first_child(parent, next),
        }
        if let Some(next) = next {
            self.nodes[next.0].prev = prev;
        }
        let node = &mut self.nodes[id.0];
        node.parent = None;
        node.prev = None;
        node.next = None;
    }
}

/// Pre-order iterator returned by [`NoteTree::iter_depth_first`].
pub struct DepthFirst<'a> {
    tree: &'a NoteTree,
    cursor: Option<NoteId>,
    stop_at: Option<NoteId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NoteId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        let nodes = &self.tree.nodes;
        self.cursor = match nodes[current.0].first_child {
            Some(child) => Some(child),
            None => {
                let mut climb = Some(current);
                let mut found = None;
                while let Some(id) = climb {
                    if Some(id) == self.stop_at {
                        break;
                    }
                    if let Some(next) = nodes[id.0].next {
                        found = Some(next);
                        break;
                    }
                    climb = nodes[id.0].parent;
                    if climb == self.stop_at {
                        break;
                    }
                }
                found
            }
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::{Note, NoteContent, NoteKind, NoteTree, NoteTreeError};
    use std::collections::HashMap;

    fn text(name: &str) -> NoteKind {
        NoteKind::Content(Note::new(NoteContent::Text(name.to_string())))
    }

    fn tagged(name: &str, states: &[&str]) -> NoteKind {
        let mut note = Note::new(NoteContent::Text(name.to_string()));
        note.states = states.iter().map(|s| s.to_string()).collect();
        NoteKind::Content(note)
    }

    fn names(tree: &NoteTree, ids: &[super::NoteId]) -> Vec<String> {
        ids.iter()
            .map(|id| match tree.get(*id).unwrap().kind() {
                NoteKind::Content(note) => note.content.file_name().unwrap().to_string(),
                NoteKind::Group { .. } => "group".to_string(),
            })
            .collect()
    }

    #[test]
    fn content_note_rejects_children() {
        let mut tree = NoteTree::new();
        let column = tree.append_child(None, NoteKind::group()).unwrap();
        let note = tree.append_child(Some(column), text("a")).unwrap();
        let err = tree.append_child(Some(note), text("b")).unwrap_err();
        assert_eq!(err, NoteTreeError::ContentCannotHaveChildren(note));
        assert_eq!(tree.set_folded(note, true), Err(NoteTreeError::NotAGroup(note)));
    }

    #[test]
    fn empty_groups_are_only_allowed_as_columns() {
        let mut tree = NoteTree::new();
        let column = tree.append_child(None, NoteKind::group()).unwrap();
        let note = tree.append_child(Some(column), text("a")).unwrap();

        assert_eq!(
            tree.append_child(Some(column), NoteKind::group()),
            Err(NoteTreeError::NestedEmptyGroup)
        );
        assert_eq!(
            tree.insert_before(note, NoteKind::group()),
            Err(NoteTreeError::NestedEmptyGroup)
        );
        assert_eq!(
            tree.insert_after(note, NoteKind::group()),
            Err(NoteTreeError::NestedEmptyGroup)
        );
        assert_eq!(tree.children(Some(column)), vec![note]);

        let second = tree.insert_after(column, NoteKind::group()).unwrap();
        assert_eq!(tree.children(None), vec![column, second]);
    }

    #[test]
    fn insert_before_and_after_keep_sibling_order() {
        let mut tree = NoteTree::new();
        let column = tree.append_child(None, NoteKind::group()).unwrap();
        let b = tree.append_child(Some(column), text("b")).unwrap();
        tree.insert_before(b, text("a")).unwrap();
        tree.insert_after(b, text("c")).unwrap();

        let children = tree.children(Some(column));
        assert_eq!(names(&tree, &children), vec!["a", "b", "c"]);
        assert_eq!(tree.get(children[0]).unwrap().prev(), None);
        assert_eq!(tree.get(children[2]).unwrap().next(), None);
    }

    #[test]
    fn group_wraps_siblings_at_first_position() {
        let mut tree = NoteTree::new();
        let column = tree.append_child(None, NoteKind::group()).unwrap();
        let a = tree.append_child(Some(column), text("a")).unwrap();
        let b = tree.append_child(Some(column), text("b")).unwrap();
        let c = tree.append_child(Some(column), text("c")).unwrap();

        let group = tree.group(&[c, a]).unwrap();
        let top = tree.children(Some(column));
        assert_eq!(top, vec![group, b]);
        assert_eq!(names(&tree, &tree.children(Some(group))), vec!["a", "c"]);
        assert_eq!(tree.count_notes(), 3);
    }

    #[test]
    fn group_rejects_non_siblings_and_empty_selection() {
        let mut tree = NoteTree::new();
        let left = tree.append_child(None, NoteKind::group()).unwrap();
        let right = tree.append_child(None, NoteKind::group()).unwrap();
        let a = tree.append_child(Some(left), text("a")).unwrap();
        let b = tree.append_child(Some(right), text("b")).unwrap();

        assert_eq!(tree.group(&[a, b]), Err(NoteTreeError::NotSiblings));
        assert_eq!(tree.group(&[a, a]), Err(NoteTreeError::NotSiblings));
        assert_eq!(tree.group(&[]), Err(NoteTreeError::EmptySelection));
    }

    #[test]
    fn ungroup_splices_children_into_place() {
        let mut tree = NoteTree::new();
        let column = tree.append_child(None, NoteKind::group()).unwrap();
        let first = tree.append_child(Some(column), text("first")).unwrap();
        let x = tree.append_child(Some(column), text("x")).unwrap();
        let y = tree.append_child(Some(column), text("y")).unwrap();
        tree.append_child(Some(column), text("last")).unwrap();
        let group = tree.group(&[x, y]).unwrap();

        let moved = tree.ungroup(group).unwrap();
        assert_eq!(moved.len(), 2);
        assert!(tree.get(group).is_none());
        assert_eq!(
            names(&tree, &tree.children(Some(column))),
            vec!["first", "x", "y", "last"]
        );
        assert_eq!(tree.ungroup(first), Err(NoteTreeError::NotAGroup(first)));
    }

    #[test]
    fn remove_drops_nested_group_that_becomes_empty() {
        let mut tree = NoteTree::new();
        let column = tree.append_child(None, NoteKind::group()).unwrap();
        let only = tree.append_child(Some(column), text("only")).unwrap();
        let group = tree.group(&[only]).unwrap();

        assert_eq!(tree.remove(only).unwrap(), 2);
        assert!(tree.get(group).is_none());
        assert!(tree.get(column).is_some());
        assert!(tree.children(Some(column)).is_empty());
        assert_eq!(tree.remove(only), Err(NoteTreeError::NotFound(only)));
    }

    #[test]
    fn depth_first_walks_preorder() {
        let mut tree = NoteTree::new();
        let column = tree.append_child(None, NoteKind::group()).unwrap();
        let a = tree.append_child(Some(column), text("a")).unwrap();
        let b = tree.append_child(Some(column), text("b")).unwrap();
        let group = tree.group(&[a]).unwrap();
        let second = tree.append_child(None, NoteKind::group()).unwrap();
        let c = tree.append_child(Some(second), text("c")).unwrap();

        let order: Vec<_> = tree.iter_depth_first().collect();
        assert_eq!(order, vec![column, group, a, b, second, c]);
    }

    #[test]
    fn state_cascades_update_every_note() {
        let mut tree = NoteTree::new();
        let column = tree.append_child(None, NoteKind::group()).unwrap();
        let a = tree
            .append_child(Some(column), tagged("a", &["s1", "s2"]))
            .unwrap();
        tree.append_child(Some(column), tagged("b", &["s2"])).unwrap();

        assert_eq!(tree.remove_state("s2"), 2);
        let mut renames = HashMap::new();
        renames.insert("s1".to_string(), "tag_state_9".to_string());
        assert_eq!(tree.rename_states(&renames), 1);
        assert_eq!(tree.note_mut(a).unwrap().states, vec!["tag_state_9"]);
        assert_eq!(tree.used_states(), vec!["tag_state_9"]);
    }
}
