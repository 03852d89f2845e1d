use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use crate::error::StoreError;

/// Maps caller-supplied identifiers to absolute locations inside the store
/// root.
///
/// The root is canonicalized once; identifiers are normalized lexically and
/// must land strictly below it. When part of the candidate already exists on
/// disk, its canonical form must also stay below the root, so a symlink
/// inside the store cannot be used to reach outside it.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// `root` must exist.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        Ok(Self {
            root: fs::canonicalize(root)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, identifier: &str) -> Result<PathBuf, StoreError> {
        let candidate = self.join_normalized(identifier)?;

        if candidate == self.root || !candidate.starts_with(&self.root) {
            return Err(StoreError::Security);
        }

        self.check_existing_ancestor(&candidate)?;
        Ok(candidate)
    }

    /// Root-relative POSIX form of an absolute path under the root.
    pub fn relative(&self, absolute: &Path) -> Option<String> {
        let rel = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    fn join_normalized(&self, identifier: &str) -> Result<PathBuf, StoreError> {
        let mut out = self.root.clone();
        let depth_floor = self.root.components().count();

        for component in Path::new(identifier).components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::ParentDir => {
                    if out.components().count() <= depth_floor {
                        return Err(StoreError::Security);
                    }
                    out.pop();
                }
                // Absolute identifiers are joined onto the root, not swapped in.
                Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            }
        }

        Ok(out)
    }

    fn check_existing_ancestor(&self, candidate: &Path) -> Result<(), StoreError> {
        let existing = candidate
            .ancestors()
            .find(|p| fs::symlink_metadata(p).is_ok())
            .unwrap_or(self.root.as_path());

        match fs::canonicalize(existing) {
            Ok(real) if real.starts_with(&self.root) => Ok(()),
            Ok(_) => Err(StoreError::Security),
            // Dangling symlink: nothing reachable behind it, let the caller
            // hit NotFound or an I/O error.
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> (tempfile::TempDir, PathResolver) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path()).unwrap();
        (dir, resolver)
    }

    #[test]
    fn accepts_paths_under_root() {
        let (_dir, r) = resolver();
        assert_eq!(r.resolve("deploy.sh").unwrap(), r.root().join("deploy.sh"));
        assert_eq!(
            r.resolve("ops/deploy.sh").unwrap(),
            r.root().join("ops").join("deploy.sh")
        );
        assert_eq!(
            r.resolve("ops/../tools/./x.py").unwrap(),
            r.root().join("tools").join("x.py")
        );
        assert_eq!(r.resolve("a/b/c/d.sh").unwrap(), r.root().join("a/b/c/d.sh"));
    }

    #[test]
    fn rejects_escapes() {
        let (_dir, r) = resolver();
        for id in ["../x", "../../etc/passwd", "ops/../../x", "a/b/../../../x"] {
            assert!(
                matches!(r.resolve(id), Err(StoreError::Security)),
                "{} should be rejected",
                id
            );
        }
    }

    #[test]
    fn rejects_root_itself() {
        let (_dir, r) = resolver();
        for id in ["", ".", "/", "ops/..", "./"] {
            assert!(r.resolve(id).is_err(), "{:?} should be rejected", id);
        }
    }

    #[test]
    fn absolute_identifiers_are_joined_onto_root() {
        let (_dir, r) = resolver();
        assert_eq!(
            r.resolve("/etc/passwd").unwrap(),
            r.root().join("etc").join("passwd")
        );
    }

    #[test]
    fn sibling_with_shared_prefix_is_not_inside() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("scripts");
        fs::create_dir(&root).unwrap();
        fs::create_dir(parent.path().join("scripts2")).unwrap();
        let r = PathResolver::new(&root).unwrap();

        assert!(r.resolve("../scripts2/x.sh").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_root_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "nope").unwrap();

        let (dir, r) = resolver();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(matches!(
            r.resolve("link/secret.txt"),
            Err(StoreError::Security)
        ));
        assert!(matches!(r.resolve("link/new.sh"), Err(StoreError::Security)));
    }

    #[test]
    fn relative_uses_forward_slashes() {
        let (_dir, r) = resolver();
        let abs = r.root().join("ops").join("deploy.sh");
        assert_eq!(r.relative(&abs).as_deref(), Some("ops/deploy.sh"));
        assert_eq!(r.relative(r.root()), None);
    }
}
