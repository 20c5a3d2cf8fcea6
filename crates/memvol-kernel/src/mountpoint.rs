//! Volume name → mountpoint resolution.

use std::path::{Component, Path, PathBuf};

/// Resolve the mountpoint for `name` under `root`.
///
/// The name is cleaned lexically before joining: `.` disappears, `..` only
/// pops components contributed by the name itself, and a leading `/` does
/// not replace `root`. The result therefore always lies at or below `root`,
/// and an empty name resolves to `root` itself.
pub fn mountpoint(root: &Path, name: &str) -> PathBuf {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => {
                relative.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    root.join(relative)
}
