//! Basket export and archive import service.
//!
//! # Responsibility
//! - Export a live basket (optionally with its child baskets) as a
//!   `.baskets` archive with the tags, emblems, icons and backgrounds it
//!   references.
//! - Import an archive into the store under fresh folder names, merging
//!   its tags into the registry.
//!
//! # Invariants
//! - Import touches the tree index and `tags.xml` only after every basket
//!   folder was moved and rewritten.
//! - A failed import removes every folder it reserved or moved and every
//!   emblem, icon or background file it copied; the context is unchanged.
//! - Export writes the destination through a temp file; the live store is
//!   read only.
//!
//! # See also
//! - `crate::archive::codec` for the container itself.

use crate::archive::codec::{
    extract_archive, preview_bytes, write_archive_file, ExtractOptions,
};
use crate::archive::payload::{entries_of_dir, pack_to_tempfile};
use crate::archive::{ArchiveError, IoErrorCode};
use crate::context::backgrounds::{BackgroundCache, CONFIG_SUFFIX};
use crate::context::tags::{MergedStates, TagError, TagRegistry};
use crate::context::AppContext;
use crate::model::basket::{BasketNode, BasketProperties, BasketTree};
use crate::model::tag::Tag;
use crate::repo::basket_repo::{BasketRepository, StoreError, TREE_FILE_NAME};
use crate::repo::files::{copy_dir_recursive, flatten_resource_name, move_dir, FOLDER_NAME_RE};
use crate::xml::tags_file::{load_tags_file, save_tags_file, TagsDocument};
use crate::xml::tree_index::{load_tree_file, save_tree_file};
use crate::xml::XmlError;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const TAG_EMBLEMS_DIR: &str = "tag-emblems";
const BASKET_ICONS_DIR: &str = "basket-icons";
const BACKGROUNDS_DIR: &str = "backgrounds";
const TAGS_FILE_NAME: &str = "tags.xml";

/// Errors from export/import operations.
#[derive(Debug)]
pub enum ArchiveServiceError {
    /// Container level failure, carries an [`IoErrorCode`].
    Archive(ArchiveError),
    Store(StoreError),
    Xml(XmlError),
    Tag(TagError),
    Io { path: PathBuf, source: io::Error },
    BasketNotFound(String),
    ParentNotFound(String),
    /// Archive payload holds no basket.
    EmptyArchive,
    /// Archive references a folder name that is not a single path segment.
    InvalidFolderName(String),
}

impl ArchiveServiceError {
    /// Archive taxonomy code for user-facing diagnostics.
    pub fn code(&self) -> IoErrorCode {
        match self {
            Self::Archive(err) => err.code(),
            Self::EmptyArchive | Self::InvalidFolderName(_) | Self::Xml(_) => {
                IoErrorCode::CorruptedBasketArchive
            }
            _ => IoErrorCode::FailedToOpenResource,
        }
    }

    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for ArchiveServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Xml(err) => write!(f, "{err}"),
            Self::Tag(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "io error at {}: {source}", path.display()),
            Self::BasketNotFound(folder) => write!(f, "basket not found: {folder}"),
            Self::ParentNotFound(folder) => write!(f, "parent basket not found: {folder}"),
            Self::EmptyArchive => write!(f, "archive contains no basket"),
            Self::InvalidFolderName(folder) => {
                write!(f, "archive holds an invalid basket folder name: {folder}")
            }
        }
    }
}

impl Error for ArchiveServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Archive(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Xml(err) => Some(err),
            Self::Tag(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ArchiveError> for ArchiveServiceError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value)
    }
}

impl From<StoreError> for ArchiveServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::BasketNotFound(folder) => Self::BasketNotFound(folder),
            other => Self::Store(other),
        }
    }
}

impl From<TagError> for ArchiveServiceError {
    fn from(value: TagError) -> Self {
        Self::Tag(value)
    }
}

impl From<XmlError> for ArchiveServiceError {
    fn from(value: XmlError) -> Self {
        Self::Xml(value)
    }
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// New folder names, depth-first in archive order.
    pub folders: Vec<String>,
    /// Imported state id -> local state id.
    pub merged_states: MergedStates,
    /// `PossiblyCompatibleBasketVersion` when the archive is newer.
    pub warning: Option<IoErrorCode>,
}

/// Archive use-case service over a basket repository.
pub struct ArchiveService<R: BasketRepository> {
    repo: R,
}

impl<R: BasketRepository> ArchiveService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Writes `folder` (and its child baskets when `with_children`) to a
    /// `.baskets` file at `destination`.
    pub fn export_basket(
        &self,
        ctx: &AppContext,
        folder: &str,
        with_children: bool,
        preview: Option<&Path>,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), ArchiveServiceError> {
        log::info!(
            "event=basket_export module=service status=start folder={folder} destination={}",
            destination.display()
        );
        let result = self.export_inner(ctx, folder, with_children, preview, destination, overwrite);
        match &result {
            Ok(()) => log::info!("event=basket_export module=service status=ok folder={folder}"),
            Err(err) => log::error!(
                "event=basket_export module=service status=error folder={folder} error_code={} error={err}",
                err.code().as_str()
            ),
        }
        result
    }

    fn export_inner(
        &self,
        ctx: &AppContext,
        folder: &str,
        with_children: bool,
        preview: Option<&Path>,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), ArchiveServiceError> {
        let tree = self.repo.load_tree()?;
        let mut node = tree
            .find(folder)
            .cloned()
            .ok_or_else(|| ArchiveServiceError::BasketNotFound(folder.to_string()))?;
        if !with_children {
            node.children.clear();
        }
        if !overwrite && destination.exists() {
            return Err(ArchiveError::DestinationExists(destination.to_path_buf()).into());
        }

        let scratch = tempfile::tempdir().map_err(|err| ArchiveServiceError::io("tempdir", err))?;
        let staging = scratch.path();
        let baskets_dir = staging.join("baskets");
        fs::create_dir_all(&baskets_dir).map_err(|err| ArchiveServiceError::io(&baskets_dir, err))?;

        let mut used_states = Vec::new();
        let mut icons = BTreeSet::new();
        let mut backgrounds = BTreeSet::new();
        let mut placeholder_color = None;
        for name in node.folder_names() {
            let basket = self.repo.load_basket(&name)?;
            let source = self.repo.basket_path(&name);
            let target = baskets_dir.join(&name);
            copy_dir_recursive(&source, &target).map_err(|err| ArchiveServiceError::io(&source, err))?;

            for state in basket.notes.used_states() {
                if !used_states.contains(&state) {
                    used_states.push(state);
                }
            }
            if basket.properties.has_custom_icon() {
                icons.insert(basket.properties.icon.clone());
            }
            let image = &basket.properties.appearance.background_image;
            if !image.is_empty() {
                backgrounds.insert(image.clone());
            }
            if placeholder_color.is_none() {
                placeholder_color = basket.properties.appearance.background_color.clone();
            }
        }

        save_tree_file(
            &baskets_dir.join(TREE_FILE_NAME),
            &BasketTree { roots: vec![node] },
        )?;

        let tags = ctx.tags.used_tags(&used_states);
        self.export_emblems(&tags, &staging.join(TAG_EMBLEMS_DIR))?;
        save_tags_file(
            &staging.join(TAGS_FILE_NAME),
            &TagsDocument {
                next_state_uid: ctx.tags.document().next_state_uid,
                tags,
            },
        )?;
        self.export_icons(&icons, &staging.join(BASKET_ICONS_DIR))?;
        export_backgrounds(ctx, &backgrounds, &staging.join(BACKGROUNDS_DIR))?;

        let entries = entries_of_dir(staging, &[]).map_err(|err| ArchiveServiceError::io(staging, err))?;
        let (payload, payload_len) =
            pack_to_tempfile(&entries).map_err(|err| ArchiveServiceError::io(staging, err))?;
        let preview = preview_bytes(preview, placeholder_color.as_deref())?;
        write_archive_file(destination, !overwrite, None, &preview, payload, payload_len)?;
        Ok(())
    }

    fn export_emblems(&self, tags: &[Tag], target: &Path) -> Result<(), ArchiveServiceError> {
        let local_dir = self.repo.tag_emblems_dir();
        for state in tags.iter().flat_map(|tag| tag.states.iter()) {
            if let Some(file) = resolve_resource(&state.emblem, &local_dir) {
                copy_flattened(&file, &state.emblem, target)?;
            }
        }
        Ok(())
    }

    fn export_icons(&self, icons: &BTreeSet<String>, target: &Path) -> Result<(), ArchiveServiceError> {
        let local_dir = self.repo.basket_icons_dir();
        for icon in icons {
            if let Some(file) = resolve_resource(icon, &local_dir) {
                copy_flattened(&file, icon, target)?;
            }
        }
        Ok(())
    }

    /// Imports an archive under `parent` (root level for `None`).
    pub fn import_archive(
        &self,
        ctx: &mut AppContext,
        path: &Path,
        parent: Option<&str>,
    ) -> Result<ImportReport, ArchiveServiceError> {
        log::info!(
            "event=archive_import module=service status=start path={}",
            path.display()
        );
        let result = self.import_inner(ctx, path, parent);
        match &result {
            Ok(report) => log::info!(
                "event=archive_import module=service status=ok baskets={} merged_states={}",
                report.folders.len(),
                report.merged_states.len()
            ),
            Err(err) => log::error!(
                "event=archive_import module=service status=error error_code={} error={err}",
                err.code().as_str()
            ),
        }
        result
    }

    fn import_inner(
        &self,
        ctx: &mut AppContext,
        path: &Path,
        parent: Option<&str>,
    ) -> Result<ImportReport, ArchiveServiceError> {
        let mut tree = self.repo.load_tree()?;
        if let Some(parent) = parent {
            if tree.find(parent).is_none() {
                return Err(ArchiveServiceError::ParentNotFound(parent.to_string()));
            }
        }

        let scratch = tempfile::tempdir().map_err(|err| ArchiveServiceError::io("tempdir", err))?;
        let extracted = scratch.path().join("content");
        let outcome = extract_archive(
            path,
            &extracted,
            ExtractOptions {
                protect_destination: false,
                keep_preview: false,
            },
        )?;

        let imported = load_tree_file(&extracted.join("baskets").join(TREE_FILE_NAME))?;
        if imported.roots.is_empty() {
            return Err(ArchiveServiceError::EmptyArchive);
        }
        for name in imported.folder_names() {
            if !FOLDER_NAME_RE.is_match(&name) {
                return Err(ArchiveServiceError::InvalidFolderName(name));
            }
        }

        let mut journal = ImportJournal::default();
        let mut registry = ctx.tags.clone();
        let mut backgrounds = ctx.backgrounds.clone();
        let mut tags_saved = false;
        let result = self
            .place(
                &extracted,
                imported.roots,
                &mut registry,
                &mut backgrounds,
                &mut journal,
            )
            .and_then(|(roots, merged_states)| {
                registry.save(&self.repo.tags_path())?;
                tags_saved = true;
                for node in roots {
                    tree.attach(parent, node, None);
                }
                self.repo.save_tree(&tree)?;
                Ok(merged_states)
            });

        match result {
            Ok(merged_states) => {
                ctx.tags = registry;
                ctx.backgrounds = backgrounds;
                Ok(ImportReport {
                    folders: journal.folders,
                    merged_states,
                    warning: outcome.warning,
                })
            }
            Err(err) => {
                self.rollback(&journal);
                if tags_saved {
                    if let Err(restore) = ctx.tags.save(&self.repo.tags_path()) {
                        log::warn!(
                            "event=archive_import_rollback module=service status=error file=tags.xml error={restore}"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Copies emblems, merges tags, adds backgrounds and moves every basket
    /// into the store. Returns the rewritten tree nodes and the state renames.
    fn place(
        &self,
        extracted: &Path,
        roots: Vec<BasketNode>,
        registry: &mut TagRegistry,
        backgrounds: &mut BackgroundCache,
        journal: &mut ImportJournal,
    ) -> Result<(Vec<BasketNode>, MergedStates), ArchiveServiceError> {
        let mut tags_document = load_tags_file(&extracted.join(TAGS_FILE_NAME))?;
        self.import_emblems(
            &mut tags_document.tags,
            &extracted.join(TAG_EMBLEMS_DIR),
            journal,
        )?;
        let merged_states = registry.merge(tags_document.tags);
        import_backgrounds(backgrounds, &extracted.join(BACKGROUNDS_DIR), journal)?;

        let mut placed = Vec::with_capacity(roots.len());
        for node in roots {
            placed.push(self.import_node(node, extracted, &merged_states, journal)?);
        }
        Ok((placed, merged_states))
    }

    /// Moves one extracted basket (and its children) into the store under a
    /// fresh folder name, rewriting state ids and the icon in its `.basket`.
    fn import_node(
        &self,
        mut node: BasketNode,
        extracted: &Path,
        merged_states: &MergedStates,
        journal: &mut ImportJournal,
    ) -> Result<BasketNode, ArchiveServiceError> {
        let new_folder = self.repo.new_folder_name()?;
        journal.folders.push(new_folder.clone());

        let source = extracted.join("baskets").join(&node.folder_name);
        let target = self.repo.basket_path(&new_folder);
        if !source.is_dir() {
            return Err(ArchiveServiceError::BasketNotFound(node.folder_name));
        }
        move_dir(&source, &target).map_err(|err| ArchiveServiceError::io(&source, err))?;

        let mut basket = self.repo.load_basket(&new_folder)?;
        basket.notes.rename_states(merged_states);
        let icons = extracted.join(BASKET_ICONS_DIR);
        self.import_icon(&mut basket.properties, &icons, journal)?;
        self.repo.save_basket(&new_folder, &basket)?;

        self.import_icon(&mut node.properties, &icons, journal)?;
        log::debug!(
            "event=basket_import module=service status=ok from={} to={new_folder}",
            node.folder_name
        );
        node.folder_name = new_folder;

        let children = std::mem::take(&mut node.children);
        for child in children {
            let child = self.import_node(child, extracted, merged_states, journal)?;
            node.children.push(child);
        }
        Ok(node)
    }

    /// Copies archived emblems that are missing locally into the store and
    /// points the imported states at the copies.
    fn import_emblems(
        &self,
        tags: &mut [Tag],
        archived: &Path,
        journal: &mut ImportJournal,
    ) -> Result<(), ArchiveServiceError> {
        let local_dir = self.repo.tag_emblems_dir();
        for state in tags.iter_mut().flat_map(|tag| tag.states.iter_mut()) {
            if let Some(copied) = import_resource(&state.emblem, archived, &local_dir, journal)? {
                state.emblem = copied;
            }
        }
        Ok(())
    }

    fn import_icon(
        &self,
        properties: &mut BasketProperties,
        archived: &Path,
        journal: &mut ImportJournal,
    ) -> Result<(), ArchiveServiceError> {
        if !properties.has_custom_icon() {
            return Ok(());
        }
        let local_dir = self.repo.basket_icons_dir();
        if let Some(copied) = import_resource(&properties.icon, archived, &local_dir, journal)? {
            properties.icon = copied;
        }
        Ok(())
    }

    fn rollback(&self, journal: &ImportJournal) {
        for folder in &journal.folders {
            if let Err(err) = self.repo.remove_basket_folder(folder) {
                log::warn!(
                    "event=archive_import_rollback module=service status=error folder={folder} error={err}"
                );
            }
        }
        for file in &journal.files {
            if let Err(err) = fs::remove_file(file) {
                log::warn!(
                    "event=archive_import_rollback module=service status=error file={} error={err}",
                    file.display()
                );
            }
        }
    }
}

/// Store entries written by an import in progress.
#[derive(Debug, Default)]
struct ImportJournal {
    folders: Vec<String>,
    files: Vec<PathBuf>,
}

/// Adds archived background images missing from `backgrounds`, recording
/// every file it creates.
fn import_backgrounds(
    backgrounds: &mut BackgroundCache,
    archived: &Path,
    journal: &mut ImportJournal,
) -> Result<(), ArchiveServiceError> {
    if !archived.is_dir() {
        return Ok(());
    }
    let mut images: Vec<PathBuf> = fs::read_dir(archived)
        .map_err(|err| ArchiveServiceError::io(archived, err))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("png"))
        .collect();
    images.sort();
    for image in images {
        let Some(name) = image.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if backgrounds.exists(name) {
            continue;
        }
        let dir = backgrounds.dir();
        let fresh: Vec<PathBuf> = [
            dir.join(name),
            dir.join(format!("{name}{CONFIG_SUFFIX}")),
            dir.join("previews").join(name),
        ]
        .into_iter()
        .filter(|path| !path.exists())
        .collect();
        let added = backgrounds.add_image(&image);
        journal.files.extend(fresh.into_iter().filter(|path| path.exists()));
        added.map_err(|err| ArchiveServiceError::io(&image, err))?;
    }
    Ok(())
}

/// Local file behind an emblem or icon reference: an existing absolute
/// path, or a file name inside `local_dir`.
fn resolve_resource(reference: &str, local_dir: &Path) -> Option<PathBuf> {
    if reference.is_empty() {
        return None;
    }
    let direct = Path::new(reference);
    if direct.is_absolute() && direct.is_file() {
        return Some(direct.to_path_buf());
    }
    let in_store = local_dir.join(reference);
    (!reference.contains(['/', '\\']) && in_store.is_file()).then_some(in_store)
}

fn copy_flattened(file: &Path, reference: &str, target_dir: &Path) -> Result<(), ArchiveServiceError> {
    fs::create_dir_all(target_dir).map_err(|err| ArchiveServiceError::io(target_dir, err))?;
    let target = target_dir.join(flatten_resource_name(reference));
    fs::copy(file, &target).map_err(|err| ArchiveServiceError::io(&target, err))?;
    Ok(())
}

/// Copies `archived/<flattened reference>` to `local_dir/<file name>` when
/// the reference does not resolve locally. Returns the new reference.
fn import_resource(
    reference: &str,
    archived: &Path,
    local_dir: &Path,
    journal: &mut ImportJournal,
) -> Result<Option<String>, ArchiveServiceError> {
    if reference.is_empty() || resolve_resource(reference, local_dir).is_some() {
        return Ok(None);
    }
    let source = archived.join(flatten_resource_name(reference));
    if !source.is_file() {
        return Ok(None);
    }
    let file_name = reference
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(reference);
    fs::create_dir_all(local_dir).map_err(|err| ArchiveServiceError::io(local_dir, err))?;
    let destination = local_dir.join(file_name);
    if !destination.exists() {
        fs::copy(&source, &destination).map_err(|err| ArchiveServiceError::io(&destination, err))?;
        journal.files.push(destination.clone());
    }
    Ok(Some(destination.to_string_lossy().into_owned()))
}

fn export_backgrounds(
    ctx: &AppContext,
    images: &BTreeSet<String>,
    target: &Path,
) -> Result<(), ArchiveServiceError> {
    for name in images {
        let Some(path) = ctx.backgrounds.path_for(name) else {
            continue;
        };
        fs::create_dir_all(target).map_err(|err| ArchiveServiceError::io(target, err))?;
        let image = target.join(name);
        fs::copy(&path, &image).map_err(|err| ArchiveServiceError::io(&image, err))?;

        if let Some(config) = ctx.backgrounds.config_path_for(name).filter(|p| p.is_file()) {
            let copy = target.join(format!("{name}.config"));
            fs::copy(&config, &copy).map_err(|err| ArchiveServiceError::io(&copy, err))?;
        }
        if let Some(preview) = ctx.backgrounds.preview_path_for(name).filter(|p| p.is_file()) {
            let previews = target.join("previews");
            fs::create_dir_all(&previews).map_err(|err| ArchiveServiceError::io(&previews, err))?;
            let copy = previews.join(name);
            fs::copy(&preview, &copy).map_err(|err| ArchiveServiceError::io(&copy, err))?;
        }
    }
    Ok(())
}
