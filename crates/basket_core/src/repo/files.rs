//! Filesystem helpers shared by the store and the archive services.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;

/// Basket folder names: one path segment, no traversal, no separators.
pub static FOLDER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._ -]*$").expect("valid folder name regex"));

/// Flattens a resource path into one file name (`/` becomes `_`).
pub fn flatten_resource_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Copies `src` into `dst` recursively, merging with existing content.
/// Returns the number of files copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<u32> {
    let mut count = 0u32;
    if !src.is_dir() {
        return Ok(0);
    }
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            count += copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
            count += 1;
        }
    }
    Ok(count)
}

/// Moves a directory, falling back to copy + delete across filesystems.
/// An existing empty `dst` is replaced.
pub fn move_dir(src: &Path, dst: &Path) -> io::Result<()> {
    if dst.is_dir() && fs::read_dir(dst)?.next().is_none() {
        fs::remove_dir(dst)?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_dir_recursive(src, dst)?;
            fs::remove_dir_all(src)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{copy_dir_recursive, flatten_resource_name, move_dir, FOLDER_NAME_RE};
    use std::fs;

    #[test]
    fn folder_name_pattern_rejects_traversal() {
        assert!(FOLDER_NAME_RE.is_match("basket3-1a2b3c4d"));
        assert!(FOLDER_NAME_RE.is_match("basket1"));
        assert!(!FOLDER_NAME_RE.is_match(".."));
        assert!(!FOLDER_NAME_RE.is_match("a/b"));
        assert!(!FOLDER_NAME_RE.is_match(""));
    }

    #[test]
    fn flatten_replaces_separators() {
        assert_eq!(flatten_resource_name("/home/me/emblem.png"), "_home_me_emblem.png");
        assert_eq!(flatten_resource_name("tag_checkbox"), "tag_checkbox");
    }

    #[test]
    fn copy_and_move_keep_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/a.txt"), "a").unwrap();
        fs::write(src.join("b.txt"), "b").unwrap();

        assert_eq!(copy_dir_recursive(&src, &dir.path().join("copy")).unwrap(), 2);
        let dst = dir.path().join("moved");
        fs::create_dir(&dst).unwrap();
        move_dir(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("nested/a.txt")).unwrap(), "a");
    }
}
