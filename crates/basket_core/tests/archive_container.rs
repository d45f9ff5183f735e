use basket_core::archive::header::{write_container, CompatLists};
use basket_core::archive::payload::{entries_of_dir, pack_to_tempfile};
use basket_core::{
    create_archive_from_source, extract_archive, inspect_archive, ArchiveError, Basket,
    BasketNode, BasketProperties, BasketRepository, BasketTree, Compatibility, ExtractOptions,
    FsBasketRepository, IoErrorCode, NoteContent, NoteKind, NoteTree,
};
use basket_core::model::note::Note;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Builds a store with one column basket holding a nested group.
fn sample_store(root: &Path) -> (String, Basket) {
    let repo = FsBasketRepository::try_new(root).unwrap();
    let folder = repo.new_folder_name().unwrap();

    let mut basket = Basket::new(BasketProperties::named("Projects"));
    let notes = &mut basket.notes;
    let column = notes.append_child(None, NoteKind::group()).unwrap();
    let mut todo = Note::new(NoteContent::Text("note1.html".to_string()));
    todo.states = vec!["todo_unchecked".to_string()];
    todo.added = "2024-03-01T10:00:00".to_string();
    notes.append_child(Some(column), NoteKind::Content(todo)).unwrap();
    let link = notes
        .append_child(
            Some(column),
            NoteKind::Content(Note::new(NoteContent::Link {
                url: "https://example.org".to_string(),
                title: "Example".to_string(),
                icon: String::new(),
                auto_title: false,
                auto_icon: true,
            })),
        )
        .unwrap();
    let color = notes
        .append_child(
            Some(column),
            NoteKind::Content(Note::new(NoteContent::Color("#336699".to_string()))),
        )
        .unwrap();
    notes.group(&[link, color]).unwrap();

    repo.save_basket(&folder, &basket).unwrap();
    fs::write(repo.basket_path(&folder).join("note1.html"), "<p>ship it</p>").unwrap();
    let mut tree = BasketTree::new();
    tree.roots
        .push(BasketNode::new(folder.clone(), basket.properties.clone()));
    repo.save_tree(&tree).unwrap();
    (folder, basket)
}

/// Depth-prefixed description of every node, in document order.
fn outline(tree: &NoteTree) -> Vec<String> {
    tree.iter_depth_first()
        .map(|id| {
            let node = tree.get(id).unwrap();
            let mut depth = 0;
            let mut cursor = node.parent();
            while let Some(parent) = cursor {
                depth += 1;
                cursor = tree.get(parent).unwrap().parent();
            }
            let label = match node.kind() {
                NoteKind::Group { .. } => "group".to_string(),
                NoteKind::Content(note) => {
                    format!("{:?} [{}]", note.content, note.states.join(";"))
                }
            };
            format!("{depth}:{label}")
        })
        .collect()
}

/// Gzip+tar payload holding one file, as raw bytes.
fn payload_bytes() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("baskets")).unwrap();
    fs::write(dir.path().join("baskets/baskets.xml"), "<basketTree/>").unwrap();
    let entries = entries_of_dir(dir.path(), &[]).unwrap();
    let (mut file, len) = pack_to_tempfile(&entries).unwrap();
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes.len() as u64, len);
    bytes
}

fn container(version: &str, compat: Option<&CompatLists>) -> Vec<u8> {
    let payload = payload_bytes();
    let mut out = Vec::new();
    write_container(
        &mut out,
        version,
        compat,
        b"PNG?",
        &mut payload.as_slice(),
        payload.len() as u64,
    )
    .unwrap();
    out
}

#[test]
fn weave_then_unweave_reproduces_the_note_tree() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("store");
    let (folder, original) = sample_store(&source);
    let archive = dir.path().join("store.baskets");

    create_archive_from_source(&source, None, &archive, true).unwrap();
    let out = dir.path().join("store_baskets");
    let outcome = extract_archive(&archive, &out, ExtractOptions::default()).unwrap();

    assert_eq!(outcome.warning, None);
    assert!(out.join("preview.png").is_file());
    let repo = FsBasketRepository::try_new(&out).unwrap();
    let restored = repo.load_basket(&folder).unwrap();
    assert_eq!(restored.properties.name, "Projects");
    assert_eq!(restored.notes.count_notes(), original.notes.count_notes());
    assert_eq!(outline(&restored.notes), outline(&original.notes));
    assert_eq!(
        fs::read_to_string(repo.basket_path(&folder).join("note1.html")).unwrap(),
        "<p>ship it</p>"
    );
    assert_eq!(repo.load_tree().unwrap().folder_names(), vec![folder]);
}

#[test]
fn woven_file_starts_with_the_magic_line() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("store");
    sample_store(&source);
    let archive = dir.path().join("out.baskets");
    create_archive_from_source(&source, None, &archive, true).unwrap();

    let bytes = fs::read(&archive).unwrap();
    assert!(bytes.starts_with(b"BasKetNP:archive\nversion:0.6.1\npreview*:"));
}

#[test]
fn wrong_first_line_is_not_an_archive() {
    let dir = tempfile::tempdir().unwrap();
    for (index, head) in [
        &b"BasKetNP:Archive\n"[..],
        b"basketnp:archive\n",
        b" BasKetNP:archive\n",
        b"BasKetNP:archive",
        b"",
    ]
    .iter()
    .enumerate()
    {
        let path = dir.path().join(format!("bad{index}.baskets"));
        let mut bytes = head.to_vec();
        bytes.extend_from_slice(b"version:0.6.1\narchive*:0\n");
        fs::write(&path, bytes).unwrap();

        let destination = dir.path().join(format!("out{index}"));
        let err = extract_archive(&path, &destination, ExtractOptions::default()).unwrap_err();
        assert_eq!(err.code(), IoErrorCode::NotABasketArchive, "case {index}");
        assert!(!destination.exists());
    }
}

#[test]
fn oversized_or_malformed_sizes_are_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let cases: [&[u8]; 4] = [
        b"BasKetNP:archive\nversion:0.6.1\npreview*:100\nshort",
        b"BasKetNP:archive\nversion:0.6.1\narchive*:9999\nabc",
        b"BasKetNP:archive\nversion:0.6.1\npreview*:-3\nabc",
        b"BasKetNP:archive\nversion:0.6.1\npreview*:12x\nabc",
    ];
    for (index, bytes) in cases.iter().enumerate() {
        let path = dir.path().join(format!("case{index}.baskets"));
        fs::write(&path, bytes).unwrap();
        let destination = dir.path().join(format!("out{index}"));

        let err = extract_archive(&path, &destination, ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::Corrupted { .. }), "case {index}: {err}");
        assert!(!destination.exists(), "case {index}");
    }
}

#[test]
fn missing_archive_block_is_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noarchive.baskets");
    fs::write(&path, b"BasKetNP:archive\nversion:0.6.1\npreview*:3\nabc").unwrap();

    let err = inspect_archive(&path).unwrap_err();
    assert_eq!(err.code(), IoErrorCode::CorruptedBasketArchive);
}

#[test]
fn existing_destination_needs_force() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("store");
    sample_store(&source);
    let archive = dir.path().join("out.baskets");
    fs::write(&archive, "old").unwrap();

    let err = create_archive_from_source(&source, None, &archive, true).unwrap_err();
    assert!(matches!(err, ArchiveError::DestinationExists(_)));
    assert_eq!(fs::read_to_string(&archive).unwrap(), "old");

    create_archive_from_source(&source, None, &archive, false).unwrap();
    assert!(inspect_archive(&archive).is_ok());

    let out = dir.path().join("extracted");
    fs::create_dir(&out).unwrap();
    let err = extract_archive(&archive, &out, ExtractOptions::default()).unwrap_err();
    assert_eq!(err.code(), IoErrorCode::DestinationExists);
    extract_archive(
        &archive,
        &out,
        ExtractOptions {
            protect_destination: false,
            keep_preview: true,
        },
    )
    .unwrap();
    assert!(out.join("baskets/baskets.xml").is_file());
}

#[test]
fn newer_incompatible_version_extracts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.baskets");
    let compat = CompatLists {
        read_compatible: vec!["2.0".to_string()],
        write_compatible: vec!["2.0".to_string()],
    };
    fs::write(&path, container("2.0", Some(&compat))).unwrap();
    let destination = dir.path().join("out");

    let err = extract_archive(&path, &destination, ExtractOptions::default()).unwrap_err();
    assert_eq!(err.code(), IoErrorCode::IncompatibleBasketVersion);
    assert!(!destination.exists());
    assert_eq!(
        inspect_archive(&path).unwrap().compatibility,
        Compatibility::Incompatible
    );
}

#[test]
fn read_compatible_only_version_extracts_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("newer.baskets");
    let compat = CompatLists {
        read_compatible: vec!["0.6.1".to_string(), "0.7.0".to_string()],
        write_compatible: vec!["0.7.0".to_string()],
    };
    fs::write(&path, container("0.7.0", Some(&compat))).unwrap();
    let destination = dir.path().join("out");

    let outcome = extract_archive(&path, &destination, ExtractOptions::default()).unwrap();
    assert_eq!(
        outcome.warning,
        Some(IoErrorCode::PossiblyCompatibleBasketVersion)
    );
    assert!(destination.join("baskets/baskets.xml").is_file());
}

#[test]
fn unknown_blocks_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let payload = payload_bytes();
    let mut bytes = b"BasKetNP:archive\nversion:0.6.1\nfuture*:5\nHELLO".to_vec();
    bytes.extend_from_slice(format!("archive*:{}\n", payload.len()).as_bytes());
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(b"trailing bytes are ignored");
    let path = dir.path().join("future-key.baskets");
    fs::write(&path, bytes).unwrap();

    let summary = inspect_archive(&path).unwrap();
    let keys: Vec<_> = summary.blocks.iter().map(|block| block.key.as_str()).collect();
    assert_eq!(keys, vec!["future", "archive"]);

    let destination = dir.path().join("out");
    let outcome = extract_archive(&path, &destination, ExtractOptions::default()).unwrap();
    assert_eq!(outcome.preview, None);
    assert!(destination.join("baskets/baskets.xml").is_file());
}
