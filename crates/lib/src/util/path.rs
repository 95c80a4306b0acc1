//! Lexical path helpers.

use std::path::{Component, Path, PathBuf};

/// Normalize a path without touching the file system.
///
/// Removes `.` components and folds `..` into the preceding normal
/// component. Leading `..` of a relative path are kept, and `..` directly
/// under the root is dropped.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        let last = out.components().next_back();
        let at_normal = matches!(last, Some(Component::Normal(_)));
        let at_root = matches!(last, Some(Component::RootDir | Component::Prefix(_)));
        if at_normal {
          out.pop();
        } else if !at_root {
          out.push("..");
        }
      }
      other => out.push(other),
    }
  }
  out
}
