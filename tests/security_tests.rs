use nanoserve::path_resolve::{self, PathError};
use tempfile::TempDir;

#[test]
fn dot_dot_is_rejected_before_any_filesystem_access() {
    let dir = TempDir::new().unwrap();
    let result = path_resolve::resolve(dir.path(), "/../../etc/passwd");
    assert_eq!(result.unwrap_err(), PathError::Traversal);
}

#[test]
fn embedded_nul_byte_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = path_resolve::resolve(dir.path(), "/a.txt\0.png");
    assert_eq!(result.unwrap_err(), PathError::Traversal);
}

#[test]
fn dot_dot_hidden_inside_a_valid_looking_segment_is_still_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("css")).unwrap();
    let result = path_resolve::resolve(dir.path(), "/css/../../outside");
    assert_eq!(result.unwrap_err(), PathError::Traversal);
}

#[test]
fn symlink_escaping_the_root_is_rejected() {
    let root = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), b"nope").unwrap();

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), root.path().join("link.txt"))
            .unwrap();
        let result = path_resolve::resolve(root.path(), "/link.txt");
        assert_eq!(result.unwrap_err(), PathError::OutsideRoot);
    }
}

#[test]
fn ordinary_nested_path_resolves_inside_the_root() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("css")).unwrap();
    std::fs::write(dir.path().join("css/style.css"), b"body{}").unwrap();

    let resolved = path_resolve::resolve(dir.path(), "/css/style.css").unwrap();
    assert_eq!(resolved, dir.path().canonicalize().unwrap().join("css/style.css"));
}

#[test]
fn nonexistent_leaf_under_an_existing_directory_still_resolves() {
    let dir = TempDir::new().unwrap();
    let resolved = path_resolve::resolve(dir.path(), "/not-there-yet.html").unwrap();
    assert_eq!(
        resolved,
        dir.path().canonicalize().unwrap().join("not-there-yet.html")
    );
}
