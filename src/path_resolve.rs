use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// URI contains `..` or an embedded NUL byte.
    Traversal,
    /// Canonicalized result escapes the document root.
    OutsideRoot,
    /// Path could not be canonicalized at all (e.g. a missing parent).
    NotResolvable,
}

/// Maps a request URI path to a filesystem path under `root`, rejecting
/// traversal attempts the same way the original's `validate_and_resolve_path`
/// does: substring/NUL rejection up front, then canonicalize-with-fallback,
/// then a strict prefix-plus-boundary check against the canonical root.
pub fn resolve(root: &Path, uri_path: &str) -> Result<PathBuf, PathError> {
    if uri_path.contains("..") || uri_path.contains('\0') {
        return Err(PathError::Traversal);
    }

    let candidate = root.join(uri_path.trim_start_matches('/'));

    let canonical_root = root.canonicalize().map_err(|_| PathError::NotResolvable)?;

    let canonical = match candidate.canonicalize() {
        Ok(path) => path,
        Err(_) => {
            // Leaf doesn't exist yet (matches source behavior: canonicalize
            // the parent, then re-append the leaf).
            let parent = candidate.parent().ok_or(PathError::NotResolvable)?;
            let file_name = candidate.file_name().ok_or(PathError::NotResolvable)?;
            let canonical_parent = parent.canonicalize().map_err(|_| PathError::NotResolvable)?;
            if !is_within(&canonical_parent, &canonical_root) {
                return Err(PathError::OutsideRoot);
            }
            canonical_parent.join(file_name)
        }
    };

    if !is_within(&canonical, &canonical_root) {
        return Err(PathError::OutsideRoot);
    }

    Ok(canonical)
}

/// `candidate` is within `root` iff it equals `root` or starts with
/// `root` followed immediately by a path separator — the boundary check
/// that prevents `/srv/wwwfoo` from being accepted as inside `/srv/www`.
fn is_within(candidate: &Path, root: &Path) -> bool {
    if candidate == root {
        return true;
    }
    candidate.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/file.txt"), b"nested").unwrap();
        dir
    }

    #[test]
    fn resolves_existing_file_within_root() {
        let root = make_root();
        let resolved = resolve(root.path(), "/index.html").unwrap();
        assert_eq!(resolved, root.path().canonicalize().unwrap().join("index.html"));
    }

    #[test]
    fn resolves_nested_existing_file() {
        let root = make_root();
        let resolved = resolve(root.path(), "/sub/file.txt").unwrap();
        assert!(resolved.ends_with("sub/file.txt"));
    }

    #[test]
    fn rejects_dotdot_traversal() {
        let root = make_root();
        assert_eq!(
            resolve(root.path(), "/../etc/passwd"),
            Err(PathError::Traversal)
        );
    }

    #[test]
    fn rejects_embedded_nul() {
        let root = make_root();
        assert_eq!(
            resolve(root.path(), "/foo\0bar"),
            Err(PathError::Traversal)
        );
    }

    #[test]
    fn rejects_sibling_directory_with_shared_prefix() {
        let root = make_root();
        // a uri that can't lexically contain ".." but whose missing-leaf
        // fallback canonicalizes to a sibling of root sharing a string
        // prefix must still be rejected by the boundary check.
        let sibling_name = format!(
            "{}evil",
            root.path().file_name().unwrap().to_str().unwrap()
        );
        let sibling = root.path().parent().unwrap().join(&sibling_name);
        fs::create_dir_all(&sibling).unwrap();
        let uri = format!("/../{}/x.html", sibling_name);
        // this still contains ".." so it's rejected up front; kept as a
        // regression guard on the substring check itself.
        assert_eq!(resolve(root.path(), &uri), Err(PathError::Traversal));
    }
}
