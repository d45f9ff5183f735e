use basket_core::context::tags::TagRegistry;
use basket_core::model::basket::Disposition;
use basket_core::{
    AppContext, ArchiveService, ArchiveServiceError, BasketRepository, FsBasketRepository,
    IoErrorCode, Note, NoteContent, NoteKind, State, Tag, TreeService,
};
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::Path;

fn tag(name: &str, states: &[(&str, &str)]) -> Tag {
    let mut tag = Tag::new(name);
    for (id, label) in states {
        tag.states.push(State::new(*id, *label));
    }
    tag
}

fn write_png(path: &Path) {
    RgbaImage::from_pixel(3, 2, Rgba([200, 180, 120, 255]))
        .save(path)
        .unwrap();
}

fn tag_note(repo: &FsBasketRepository, folder: &str, states: &[&str]) {
    let mut basket = repo.load_basket(folder).unwrap();
    let column = basket.notes.append_child(None, NoteKind::group()).unwrap();
    let mut note = Note::new(NoteContent::Text("note1.html".to_string()));
    note.states = states.iter().map(|id| id.to_string()).collect();
    basket
        .notes
        .append_child(Some(column), NoteKind::Content(note))
        .unwrap();
    repo.save_basket(folder, &basket).unwrap();
}

/// Source store: `Trip` with child `Packing`, tagged, with a background and
/// an emblem file outside the store.
fn source_store(root: &Path, emblem: &Path) -> (FsBasketRepository, String) {
    let repo = FsBasketRepository::try_new(root).unwrap();
    let tree = TreeService::new(repo.clone());
    let trip = tree
        .create_basket(None, "Trip", Disposition::Columns(1))
        .unwrap();
    let packing = tree
        .create_basket(Some(&trip.folder_name), "Packing", Disposition::Free)
        .unwrap();

    let mut registry = TagRegistry::new();
    registry
        .add_tag(tag(
            "To Do",
            &[("todo_unchecked", "Unchecked"), ("todo_done", "Done")],
        ))
        .unwrap();
    let mut work = tag("Work", &[("work", "Work")]);
    work.states[0].emblem = emblem.to_string_lossy().into_owned();
    registry.add_tag(work).unwrap();
    registry.add_tag(tag("Unused", &[("unused", "Unused")])).unwrap();
    registry.save(&repo.tags_path()).unwrap();

    let backgrounds = repo.backgrounds_dir();
    fs::create_dir_all(&backgrounds).unwrap();
    write_png(&backgrounds.join("paper.png"));
    fs::write(
        backgrounds.join("paper.png.config"),
        "[BasKet Background Image Configuration]\ntiled=true\n",
    )
    .unwrap();

    tag_note(&repo, &trip.folder_name, &["todo_unchecked", "work"]);
    tag_note(&repo, &packing.folder_name, &["todo_done"]);
    let mut basket = repo.load_basket(&trip.folder_name).unwrap();
    basket.properties.appearance.background_image = "paper.png".to_string();
    repo.save_basket(&trip.folder_name, &basket).unwrap();

    (repo, trip.folder_name)
}

#[test]
fn export_then_import_merges_tags_and_resources() {
    let dir = tempfile::tempdir().unwrap();
    let emblem = dir.path().join("work-emblem.png");
    write_png(&emblem);
    let (source_repo, trip) = source_store(&dir.path().join("a"), &emblem);
    let source_ctx = AppContext::load(&source_repo).unwrap();
    let archive = dir.path().join("trip.baskets");

    ArchiveService::new(source_repo.clone())
        .export_basket(&source_ctx, &trip, true, None, &archive, false)
        .unwrap();
    fs::remove_file(&emblem).unwrap();

    // Target already knows "To Do" under other ids and uses the id "work".
    let target_repo = FsBasketRepository::try_new(dir.path().join("b")).unwrap();
    let mut local = TagRegistry::new();
    local
        .add_tag(tag(
            "To Do",
            &[("local_unchecked", "Unchecked"), ("local_done", "Done")],
        ))
        .unwrap();
    local.add_tag(tag("Errands", &[("work", "Errands")])).unwrap();
    local.save(&target_repo.tags_path()).unwrap();
    let mut ctx = AppContext::load(&target_repo).unwrap();

    let service = ArchiveService::new(target_repo.clone());
    let report = service.import_archive(&mut ctx, &archive, None).unwrap();

    assert_eq!(report.folders.len(), 2);
    assert_eq!(report.warning, None);
    assert_eq!(report.merged_states["todo_unchecked"], "local_unchecked");
    assert_eq!(report.merged_states["todo_done"], "local_done");
    let fresh_work = report.merged_states["work"].clone();
    assert!(fresh_work.starts_with("tag_state_"));

    let tree = target_repo.load_tree().unwrap();
    assert_eq!(tree.roots.len(), 1);
    let root = &tree.roots[0];
    assert_eq!(root.folder_name, report.folders[0]);
    assert_eq!(root.properties.name, "Trip");
    assert_eq!(root.children[0].properties.name, "Packing");
    assert_ne!(root.folder_name, trip);

    let imported = target_repo.load_basket(&report.folders[0]).unwrap();
    assert_eq!(
        imported.notes.used_states(),
        vec!["local_unchecked".to_string(), fresh_work.clone()]
    );
    let child = target_repo.load_basket(&report.folders[1]).unwrap();
    assert_eq!(child.notes.used_states(), vec!["local_done".to_string()]);
    assert_eq!(child.properties.disposition, Disposition::Free);

    let saved = TagRegistry::load(&target_repo.tags_path()).unwrap();
    assert_eq!(saved.tag_for_state(&fresh_work).unwrap().name, "Work");
    assert!(saved.tags().iter().all(|tag| tag.name != "Unused"));
    let emblem_ref = &saved.state_for_id(&fresh_work).unwrap().emblem;
    assert!(Path::new(emblem_ref).starts_with(target_repo.tag_emblems_dir()));
    assert!(Path::new(emblem_ref).is_file());
    assert_eq!(ctx.tags, saved);

    assert!(ctx.backgrounds.exists("paper.png"));
    assert!(ctx.backgrounds.tiled("paper.png"));
    assert!(target_repo.backgrounds_dir().join("paper.png").is_file());
}

#[test]
fn export_without_children_keeps_only_the_basket() {
    let dir = tempfile::tempdir().unwrap();
    let emblem = dir.path().join("emblem.png");
    write_png(&emblem);
    let (source_repo, trip) = source_store(&dir.path().join("a"), &emblem);
    let ctx = AppContext::load(&source_repo).unwrap();
    let archive = dir.path().join("trip.baskets");
    let service = ArchiveService::new(source_repo.clone());

    service
        .export_basket(&ctx, &trip, false, None, &archive, false)
        .unwrap();
    let err = service
        .export_basket(&ctx, &trip, false, None, &archive, false)
        .unwrap_err();
    assert_eq!(err.code(), IoErrorCode::DestinationExists);
    service
        .export_basket(&ctx, &trip, false, None, &archive, true)
        .unwrap();

    let target_repo = FsBasketRepository::try_new(dir.path().join("b")).unwrap();
    let mut target_ctx = AppContext::load(&target_repo).unwrap();
    let report = ArchiveService::new(target_repo.clone())
        .import_archive(&mut target_ctx, &archive, None)
        .unwrap();
    assert_eq!(report.folders.len(), 1);
    assert!(target_repo.load_tree().unwrap().roots[0].children.is_empty());
}

#[test]
fn import_under_parent_appends_child() {
    let dir = tempfile::tempdir().unwrap();
    let emblem = dir.path().join("emblem.png");
    write_png(&emblem);
    let (source_repo, trip) = source_store(&dir.path().join("a"), &emblem);
    let archive = dir.path().join("trip.baskets");
    ArchiveService::new(source_repo.clone())
        .export_basket(
            &AppContext::load(&source_repo).unwrap(),
            &trip,
            true,
            None,
            &archive,
            false,
        )
        .unwrap();

    let target_repo = FsBasketRepository::try_new(dir.path().join("b")).unwrap();
    let inbox = TreeService::new(target_repo.clone())
        .create_basket(None, "Inbox", Disposition::Columns(2))
        .unwrap();
    let mut ctx = AppContext::load(&target_repo).unwrap();
    let service = ArchiveService::new(target_repo.clone());

    let err = service
        .import_archive(&mut ctx, &archive, Some("missing"))
        .unwrap_err();
    assert!(matches!(err, ArchiveServiceError::ParentNotFound(_)));

    let report = service
        .import_archive(&mut ctx, &archive, Some(&inbox.folder_name))
        .unwrap();
    let tree = target_repo.load_tree().unwrap();
    assert_eq!(tree.roots.len(), 1);
    assert_eq!(tree.roots[0].children[0].folder_name, report.folders[0]);
}

#[test]
fn failed_import_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let target_repo = FsBasketRepository::try_new(dir.path().join("b")).unwrap();
    let mut ctx = AppContext::load(&target_repo).unwrap();
    let service = ArchiveService::new(target_repo.clone());

    // Tree lists a basket whose folder is missing from the payload.
    let staged = dir.path().join("staged");
    fs::create_dir_all(staged.join("baskets")).unwrap();
    fs::write(
        staged.join("baskets/baskets.xml"),
        "<basketTree><basket folderName=\"ghost/\"/></basketTree>",
    )
    .unwrap();
    let archive = dir.path().join("ghost.baskets");
    basket_core::create_archive_from_source(&staged, None, &archive, true).unwrap();

    let err = service.import_archive(&mut ctx, &archive, None).unwrap_err();
    assert!(matches!(err, ArchiveServiceError::BasketNotFound(_)));
    assert!(target_repo.load_tree().unwrap().roots.is_empty());
    let leftovers: Vec<_> = fs::read_dir(target_repo.root().join("baskets"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
    assert!(!target_repo.tags_path().exists());

    let corrupt = dir.path().join("corrupt.baskets");
    fs::write(&corrupt, b"BasKetNP:archive\nversion:0.6.1\narchive*:99\nxx").unwrap();
    let err = service.import_archive(&mut ctx, &corrupt, None).unwrap_err();
    assert_eq!(err.code(), IoErrorCode::CorruptedBasketArchive);
}

#[test]
fn failed_import_removes_copied_resources() {
    let dir = tempfile::tempdir().unwrap();
    let target_repo = FsBasketRepository::try_new(dir.path().join("b")).unwrap();
    let mut ctx = AppContext::load(&target_repo).unwrap();

    // Emblem and background are copied before the missing folder is noticed.
    let staged = dir.path().join("staged");
    fs::create_dir_all(staged.join("baskets")).unwrap();
    fs::create_dir_all(staged.join("tag-emblems")).unwrap();
    fs::create_dir_all(staged.join("backgrounds/previews")).unwrap();
    fs::write(
        staged.join("baskets/baskets.xml"),
        "<basketTree><basket folderName=\"ghost/\"/></basketTree>",
    )
    .unwrap();
    fs::write(
        staged.join("tags.xml"),
        "<basketTags nextStateUid=\"1\"><tag><name>Star</name>\
         <state id=\"star\"><name>Star</name><emblem>star.png</emblem></state>\
         </tag></basketTags>",
    )
    .unwrap();
    write_png(&staged.join("tag-emblems/star.png"));
    write_png(&staged.join("backgrounds/paper.png"));
    write_png(&staged.join("backgrounds/previews/paper.png"));
    fs::write(
        staged.join("backgrounds/paper.png.config"),
        "[BasKet Background Image Configuration]\ntiled=true\n",
    )
    .unwrap();
    let archive = dir.path().join("ghost.baskets");
    basket_core::create_archive_from_source(&staged, None, &archive, true).unwrap();

    let err = ArchiveService::new(target_repo.clone())
        .import_archive(&mut ctx, &archive, None)
        .unwrap_err();
    assert!(matches!(err, ArchiveServiceError::BasketNotFound(_)));

    assert!(!target_repo.tag_emblems_dir().join("star.png").exists());
    let backgrounds = target_repo.backgrounds_dir();
    assert!(!backgrounds.join("paper.png").exists());
    assert!(!backgrounds.join("paper.png.config").exists());
    assert!(!backgrounds.join("previews/paper.png").exists());
    assert!(!ctx.backgrounds.exists("paper.png"));
    assert!(ctx.tags.tags().is_empty());
}

