//! Integration test: mount a volume through /dev/fuse and do real file I/O.
//!
//! Needs /dev/fuse and permission to mount with `allow_other` (root, or
//! `user_allow_other` in /etc/fuse.conf). Run with `--ignored`.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;

use memvol_kernel::MountRegistry;
use memvol_server::FuseSessionFactory;

fn file_io(mountpoint: PathBuf) {
    let file = mountpoint.join("hello.txt");
    fs::write(&file, b"hello world").unwrap();
    assert_eq!(fs::read(&file).unwrap(), b"hello world");

    fs::write(&file, b"updated").unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "updated");

    let sub = mountpoint.join("subdir");
    fs::create_dir(&sub).unwrap();
    fs::rename(&file, sub.join("moved.txt")).unwrap();
    assert!(!file.exists());
    assert_eq!(fs::read(sub.join("moved.txt")).unwrap(), b"updated");

    std::os::unix::fs::symlink("moved.txt", sub.join("link")).unwrap();
    assert_eq!(
        fs::read_link(sub.join("link")).unwrap(),
        PathBuf::from("moved.txt")
    );

    fs::set_permissions(sub.join("moved.txt"), fs::Permissions::from_mode(0o600)).unwrap();
    let meta = fs::metadata(sub.join("moved.txt")).unwrap();
    assert_eq!(meta.mode() & 0o777, 0o600);
    assert_eq!(meta.len(), 7);

    let mut names: Vec<_> = fs::read_dir(&sub)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, ["link", "moved.txt"]);

    // no hard links
    assert!(fs::hard_link(sub.join("moved.txt"), sub.join("hard")).is_err());

    assert!(fs::remove_dir(&sub).is_err());
    fs::remove_file(sub.join("link")).unwrap();
    fs::remove_file(sub.join("moved.txt")).unwrap();
    fs::remove_dir(&sub).unwrap();
    assert_eq!(fs::read_dir(&mountpoint).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "requires /dev/fuse and mount privileges"]
async fn test_fuse_volume_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(FuseSessionFactory::new(Handle::current()));
    let registry = MountRegistry::new(dir.path().join("volumes"), sessions);

    let mountpoint = registry.mount("scratch").await.unwrap();
    assert_eq!(registry.mount("scratch").await.unwrap(), mountpoint);

    let target = mountpoint.clone();
    tokio::task::spawn_blocking(move || file_io(target))
        .await
        .unwrap();

    // a second holder keeps the filesystem alive
    registry.unmount("scratch").await.unwrap();
    let extra = mountpoint.join("still-here");
    tokio::task::spawn_blocking(move || fs::write(extra, b"x"))
        .await
        .unwrap()
        .unwrap();

    registry.unmount("scratch").await.unwrap();
    assert_eq!(registry.ref_count("scratch").await, 0);

    // contents are gone with the session; the bare directory remains
    let check = mountpoint.clone();
    let leftover = tokio::task::spawn_blocking(move || fs::read_dir(check).unwrap().count())
        .await
        .unwrap();
    assert_eq!(leftover, 0);

    // a fresh mount starts empty
    registry.mount("scratch").await.unwrap();
    let check = mountpoint.clone();
    let fresh = tokio::task::spawn_blocking(move || fs::read_dir(check).unwrap().count())
        .await
        .unwrap();
    assert_eq!(fresh, 0);
    registry.shutdown().await;
}
