#![cfg(unix)]

use assert_fs::TempDir;
use assert_fs::prelude::*;
use sandgate_commons::{SandboxRoot, SandboxViolation};
use std::os::unix::fs::symlink;

fn sandbox() -> (TempDir, TempDir, SandboxRoot) {
    let inside = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let root = SandboxRoot::new(inside.path()).unwrap();
    (inside, outside, root)
}

#[test]
fn lexical_resolution_does_not_see_symlink_escapes() {
    let (inside, outside, root) = sandbox();
    outside.child("secret.txt").write_str("classified").unwrap();
    symlink(outside.path(), inside.path().join("portal")).unwrap();

    // Known gap: the lexical resolver accepts the path because its text stays
    // inside the root, even though the link leads out.
    let resolved = root.resolve("portal/secret.txt").unwrap();
    assert!(resolved.as_path().starts_with(root.path()));
}

#[test]
fn guard_rejects_reads_through_outbound_symlink() {
    let (inside, outside, root) = sandbox();
    outside.child("secret.txt").write_str("classified").unwrap();
    symlink(outside.path(), inside.path().join("portal")).unwrap();

    let err = root.resolve_guarded("portal/secret.txt").unwrap_err();
    assert!(matches!(err, SandboxViolation::SymlinkEscape { .. }));
}

#[test]
fn guard_rejects_new_files_below_outbound_symlink() {
    let (inside, outside, root) = sandbox();
    symlink(outside.path(), inside.path().join("portal")).unwrap();

    let err = root.resolve_guarded("portal/new/dir/file.txt").unwrap_err();
    assert!(err.is_escape());
}

#[test]
fn guard_rejects_dangling_link_pointing_out() {
    let (inside, outside, root) = sandbox();
    symlink(outside.path().join("not-yet"), inside.path().join("later")).unwrap();

    let err = root.resolve_guarded("later").unwrap_err();
    assert!(err.is_escape());
}

#[test]
fn guard_allows_internal_symlinks() {
    let (inside, _outside, root) = sandbox();
    inside.child("real/data.txt").write_str("ok").unwrap();
    symlink(inside.path().join("real"), inside.path().join("alias")).unwrap();

    let resolved = root.resolve_guarded("alias/data.txt").unwrap();
    assert!(resolved.as_path().ends_with("alias/data.txt"));
}

#[test]
fn guard_allows_paths_that_do_not_exist_yet() {
    let (_inside, _outside, root) = sandbox();
    let resolved = root.resolve_guarded("fresh/nested/file.txt").unwrap();
    assert!(resolved.as_path().ends_with("fresh/nested/file.txt"));
}
