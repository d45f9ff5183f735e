use basket_core::model::basket::Disposition;
use basket_core::{
    Basket, BasketRepository, BasketTree, FsBasketRepository, StoreError, StoreResult,
    TreeService, TreeServiceError,
};
use std::io;
use std::path::{Path, PathBuf};

/// Store whose tree index cannot be written.
struct ReadOnlyIndex(FsBasketRepository);

impl BasketRepository for ReadOnlyIndex {
    fn root(&self) -> &Path {
        self.0.root()
    }
    fn load_tree(&self) -> StoreResult<BasketTree> {
        self.0.load_tree()
    }
    fn save_tree(&self, _tree: &BasketTree) -> StoreResult<()> {
        Err(StoreError::Io {
            path: self.0.root().join("baskets/baskets.xml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read only"),
        })
    }
    fn load_basket(&self, folder: &str) -> StoreResult<Basket> {
        self.0.load_basket(folder)
    }
    fn save_basket(&self, folder: &str, basket: &Basket) -> StoreResult<()> {
        self.0.save_basket(folder, basket)
    }
    fn new_folder_name(&self) -> StoreResult<String> {
        self.0.new_folder_name()
    }
    fn remove_basket_folder(&self, folder: &str) -> StoreResult<()> {
        self.0.remove_basket_folder(folder)
    }
    fn basket_path(&self, folder: &str) -> PathBuf {
        self.0.basket_path(folder)
    }
}

fn setup() -> (tempfile::TempDir, TreeService<FsBasketRepository>) {
    let dir = tempfile::tempdir().unwrap();
    let repo = FsBasketRepository::try_new(dir.path()).unwrap();
    (dir, TreeService::new(repo))
}

#[test]
fn create_and_list_children_keeps_insertion_order() {
    let (_dir, service) = setup();

    let root = service
        .create_basket(None, "  Root  ", Disposition::Columns(3))
        .unwrap();
    let alpha = service
        .create_basket(Some(&root.folder_name), "Alpha", Disposition::Free)
        .unwrap();
    let beta = service
        .create_basket(Some(&root.folder_name), "Beta", Disposition::MindMap)
        .unwrap();

    let roots = service.list_children(None).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].properties.name, "Root");
    assert_eq!(roots[0].properties.disposition, Disposition::Columns(3));

    let children = service.list_children(Some(&root.folder_name)).unwrap();
    let names: Vec<_> = children.iter().map(|node| node.folder_name.clone()).collect();
    assert_eq!(names, vec![alpha.folder_name.clone(), beta.folder_name.clone()]);

    let basket = service.repo().load_basket(&beta.folder_name).unwrap();
    assert_eq!(basket.properties.disposition, Disposition::MindMap);
}

#[test]
fn create_rejects_blank_names_and_unknown_parents() {
    let (_dir, service) = setup();

    assert!(matches!(
        service.create_basket(None, "   ", Disposition::Columns(1)),
        Err(TreeServiceError::InvalidDisplayName)
    ));
    assert!(matches!(
        service.create_basket(Some("nowhere"), "Orphan", Disposition::Columns(1)),
        Err(TreeServiceError::ParentNotFound(_))
    ));
    assert!(service.list_children(None).unwrap().is_empty());
}

#[test]
fn rename_updates_descriptor_and_index() {
    let (_dir, service) = setup();
    let node = service
        .create_basket(None, "Draft", Disposition::Columns(1))
        .unwrap();

    service.rename_basket(&node.folder_name, "Final").unwrap();

    let found = service.find(&node.folder_name).unwrap().unwrap();
    assert_eq!(found.properties.name, "Final");
    let basket = service.repo().load_basket(&node.folder_name).unwrap();
    assert_eq!(basket.properties.name, "Final");
    assert!(matches!(
        service.rename_basket("missing", "x"),
        Err(TreeServiceError::BasketNotFound(_))
    ));
}

#[test]
fn move_rejects_cycles_and_reorders_siblings() {
    let (_dir, service) = setup();
    let a = service.create_basket(None, "A", Disposition::Columns(1)).unwrap();
    let b = service
        .create_basket(Some(&a.folder_name), "B", Disposition::Columns(1))
        .unwrap();
    let c = service.create_basket(None, "C", Disposition::Columns(1)).unwrap();

    let err = service
        .move_basket(&a.folder_name, Some(&b.folder_name), None)
        .unwrap_err();
    assert!(matches!(err, TreeServiceError::CycleDetected { .. }));
    let err = service
        .move_basket(&a.folder_name, Some(&a.folder_name), None)
        .unwrap_err();
    assert!(matches!(err, TreeServiceError::CycleDetected { .. }));

    service.move_basket(&c.folder_name, None, Some(0)).unwrap();
    let roots: Vec<_> = service
        .list_children(None)
        .unwrap()
        .into_iter()
        .map(|node| node.folder_name)
        .collect();
    assert_eq!(roots, vec![c.folder_name.clone(), a.folder_name.clone()]);

    service
        .move_basket(&b.folder_name, Some(&c.folder_name), None)
        .unwrap();
    assert!(service.list_children(Some(&a.folder_name)).unwrap().is_empty());
    assert_eq!(
        service.list_children(Some(&c.folder_name)).unwrap()[0].folder_name,
        b.folder_name
    );
}

#[test]
fn delete_removes_subtree_folders_and_entries() {
    let (_dir, service) = setup();
    let a = service.create_basket(None, "A", Disposition::Columns(1)).unwrap();
    let b = service
        .create_basket(Some(&a.folder_name), "B", Disposition::Columns(1))
        .unwrap();
    let keep = service.create_basket(None, "Keep", Disposition::Columns(1)).unwrap();

    let removed = service.delete_basket(&a.folder_name).unwrap();
    assert_eq!(removed, vec![a.folder_name.clone(), b.folder_name.clone()]);
    assert!(!service.repo().basket_path(&a.folder_name).exists());
    assert!(!service.repo().basket_path(&b.folder_name).exists());
    assert!(service.repo().basket_path(&keep.folder_name).is_dir());

    let tree = service.repo().load_tree().unwrap();
    assert_eq!(tree.folder_names(), vec![keep.folder_name]);
    assert!(matches!(
        service.delete_basket(&a.folder_name),
        Err(TreeServiceError::BasketNotFound(_))
    ));
}

#[test]
fn fold_state_is_persisted() {
    let (_dir, service) = setup();
    let a = service.create_basket(None, "A", Disposition::Columns(1)).unwrap();

    service.set_folded(&a.folder_name, true).unwrap();
    assert!(service.find(&a.folder_name).unwrap().unwrap().folded);
    service.set_folded(&a.folder_name, false).unwrap();
    assert!(!service.find(&a.folder_name).unwrap().unwrap().folded);
}

#[test]
fn failed_create_removes_the_reserved_folder() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FsBasketRepository::try_new(dir.path()).unwrap();
    let service = TreeService::new(ReadOnlyIndex(repo.clone()));

    let err = service
        .create_basket(None, "Doomed", Disposition::Columns(1))
        .unwrap_err();
    assert!(matches!(err, TreeServiceError::Store(StoreError::Io { .. })));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("baskets"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
    assert!(repo.load_tree().unwrap().roots.is_empty());
}
