//! Basket properties and the basket tree index model.
//!
//! # Responsibility
//! - Describe one basket's persisted properties (name, icon, appearance,
//!   disposition, shortcut, protection).
//! - Describe the hierarchy of baskets recorded in `baskets.xml`.
//!
//! # Invariants
//! - `folder_name` is the stable identity of a basket and is unique in a tree.
//! - Folder names are stored without the trailing `/` used on disk.

use crate::model::note::NoteTree;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

/// Icon name used when a basket has no custom icon.
pub const DEFAULT_BASKET_ICON: &str = "basket";

/// Normalizes a `#rrggbb` color string.
///
/// Returns `None` for empty or malformed input, which callers treat as
/// "use the application default color".
pub fn normalize_color(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if HEX_COLOR_RE.is_match(trimmed) {
        Some(trimmed.to_ascii_lowercase())
    } else {
        None
    }
}

/// Layout mode of a basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Notes arranged in this many columns.
    Columns(u32),
    /// Notes placed at free `x`/`y` positions.
    Free,
    /// Free layout drawn as a mind map.
    MindMap,
}

impl Disposition {
    /// Column count as written to the `columnCount` attribute.
    pub fn column_count(&self) -> u32 {
        match self {
            Self::Columns(count) => *count,
            Self::Free | Self::MindMap => 0,
        }
    }

    /// Whether notes carry free `x`/`y` coordinates.
    pub fn is_free(&self) -> bool {
        !matches!(self, Self::Columns(_))
    }

    /// Builds a disposition from the three persisted attributes.
    pub fn from_flags(free: bool, mind_map: bool, column_count: u32) -> Self {
        match (free, mind_map) {
            (true, true) => Self::MindMap,
            (true, false) => Self::Free,
            (false, _) => Self::Columns(column_count.max(1)),
        }
    }
}

/// What the basket keyboard shortcut does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutAction {
    Show,
    GlobalShow,
    GlobalSwitch,
}

impl ShortcutAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::GlobalShow => "globalShow",
            Self::GlobalSwitch => "globalSwitch",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "show" => Some(Self::Show),
            "globalShow" => Some(Self::GlobalShow),
            "globalSwitch" => Some(Self::GlobalSwitch),
            _ => None,
        }
    }
}

/// Keyboard shortcut attached to a basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    /// Key sequence such as `Ctrl+Alt+B`; empty when unset.
    pub combination: String,
    pub action: ShortcutAction,
}

impl Default for Shortcut {
    fn default() -> Self {
        Self {
            combination: String::new(),
            action: ShortcutAction::Show,
        }
    }
}

/// Encryption scheme recorded in the `protection` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionType {
    None,
    Password,
    PrivateKey,
}

impl EncryptionType {
    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Password => 1,
            Self::PrivateKey => 2,
        }
    }

    /// Unknown codes fall back to `None`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Password,
            2 => Self::PrivateKey,
            _ => Self::None,
        }
    }
}

/// Encryption metadata. Only metadata is carried; no crypto happens here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protection {
    pub encryption: EncryptionType,
    /// Key identifier for private-key encryption.
    pub key: String,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            encryption: EncryptionType::None,
            key: String::new(),
        }
    }
}

/// Colors and background image of a basket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    /// `#rrggbb`, `None` for the application default.
    pub background_color: Option<String>,
    /// Background image name as registered in the background cache.
    pub background_image: String,
    /// `#rrggbb`, `None` for the application default.
    pub text_color: Option<String>,
}

/// Persisted properties of one basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketProperties {
    pub name: String,
    pub icon: String,
    pub appearance: Appearance,
    pub disposition: Disposition,
    pub shortcut: Shortcut,
    pub protection: Protection,
}

impl Default for BasketProperties {
    fn default() -> Self {
        Self {
            name: String::new(),
            icon: DEFAULT_BASKET_ICON.to_string(),
            appearance: Appearance::default(),
            disposition: Disposition::Columns(1),
            shortcut: Shortcut::default(),
            protection: Protection::default(),
        }
    }
}

impl BasketProperties {
    /// Creates default properties with the given display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether the icon is a custom one (not the stock basket icon).
    pub fn has_custom_icon(&self) -> bool {
        !self.icon.is_empty() && self.icon != DEFAULT_BASKET_ICON
    }

    pub fn is_encrypted(&self) -> bool {
        self.protection.encryption != EncryptionType::None
    }
}

/// One loaded basket: its properties and its note tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Basket {
    pub properties: BasketProperties,
    pub notes: NoteTree,
}

impl Basket {
    pub fn new(properties: BasketProperties) -> Self {
        Self {
            properties,
            notes: NoteTree::new(),
        }
    }
}

/// Entry of the basket tree index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketNode {
    /// Folder under `baskets/`, without trailing slash.
    pub folder_name: String,
    /// Whether child baskets are collapsed in the tree view.
    pub folded: bool,
    /// Whether this basket was the one open last.
    pub last_opened: bool,
    /// Copy of the basket properties kept in the index.
    pub properties: BasketProperties,
    pub children: Vec<BasketNode>,
}

impl BasketNode {
    pub fn new(folder_name: impl Into<String>, properties: BasketProperties) -> Self {
        Self {
            folder_name: folder_name.into(),
            folded: false,
            last_opened: false,
            properties,
            children: Vec::new(),
        }
    }

    /// Depth-first list of this node's folder and every descendant's.
    pub fn folder_names(&self) -> Vec<String> {
        let mut names = vec![self.folder_name.clone()];
        for child in &self.children {
            names.extend(child.folder_names());
        }
        names
    }
}

/// The basket hierarchy recorded in `baskets.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketTree {
    pub roots: Vec<BasketNode>,
}

impl BasketTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds a node by folder name anywhere in the tree.
    pub fn find(&self, folder_name: &str) -> Option<&BasketNode> {
        fn walk<'a>(nodes: &'a [BasketNode], folder_name: &str) -> Option<&'a BasketNode> {
            for node in nodes {
                if node.folder_name == folder_name {
                    return Some(node);
                }
                if let Some(found) = walk(&node.children, folder_name) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.roots, folder_name)
    }

    /// Mutable variant of [`BasketTree::find`].
    pub fn find_mut(&mut self, folder_name: &str) -> Option<&mut BasketNode> {
        fn walk<'a>(
            nodes: &'a mut [BasketNode],
            folder_name: &str,
        ) -> Option<&'a mut BasketNode> {
            for node in nodes {
                if node.folder_name == folder_name {
                    return Some(node);
                }
                if let Some(found) = walk(&mut node.children, folder_name) {
                    return Some(found);
                }
            }
            None
        }
        walk(&mut self.roots, folder_name)
    }

    /// Folder name of the parent basket, `None` for root-level baskets.
    ///
    /// Returns `None` as well when `folder_name` is unknown; callers check
    /// existence first.
    pub fn parent_of(&self, folder_name: &str) -> Option<&str> {
        fn walk<'a>(parent: &'a BasketNode, folder_name: &str) -> Option<&'a str> {
            for child in &parent.children {
                if child.folder_name == folder_name {
                    return Some(parent.folder_name.as_str());
                }
                if let Some(found) = walk(child, folder_name) {
                    return Some(found);
                }
            }
            None
        }
        self.roots.iter().find_map(|root| walk(root, folder_name))
    }

    /// Detaches the node with `folder_name` and returns it with its subtree.
    pub fn detach(&mut self, folder_name: &str) -> Option<BasketNode> {
        fn walk(nodes: &mut Vec<BasketNode>, folder_name: &str) -> Option<BasketNode> {
            if let Some(index) = nodes.iter().position(|n| n.folder_name == folder_name) {
                return Some(nodes.remove(index));
            }
            nodes
                .iter_mut()
                .find_map(|node| walk(&mut node.children, folder_name))
        }
        walk(&mut self.roots, folder_name)
    }

    /// Inserts `node` under `parent` (root level for `None`) at `index`,
    /// clamped to the sibling count. Returns `false` if `parent` is unknown.
    pub fn attach(&mut self, parent: Option<&str>, node: BasketNode, index: Option<usize>) -> bool {
        let siblings = match parent {
            None => &mut self.roots,
            Some(folder) => match self.find_mut(folder) {
                Some(parent_node) => &mut parent_node.children,
                None => return false,
            },
        };
        let position = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(position, node);
        true
    }

    /// Every folder name in the tree, depth-first.
    pub fn folder_names(&self) -> Vec<String> {
        self.roots.iter().flat_map(BasketNode::folder_names).collect()
    }

    pub fn basket_count(&self) -> usize {
        self.folder_names().len()
    }
}
