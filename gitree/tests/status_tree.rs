//! Status trees built from a real repository.

use git_fixture::GitFixture;
use gitree::{build_tree, BuildRequest, Repo, StatusCode, Tree};

fn status(tree: &Tree, fixture: &GitFixture, rel: &str) -> Option<StatusCode> {
    tree.status_of(&fixture.path(rel))
}

fn build(fixture: &GitFixture, request: BuildRequest) -> Tree {
    let repo = Repo::with_cli(fixture.dir());
    smol::block_on(build_tree(&repo, &request)).unwrap()
}

#[test]
fn working_tree_rename_modify_untracked() {
    gitree_log::test();
    let fixture = GitFixture::with_commit(
        &[("a.txt", "a\n"), ("old.txt", "old\n"), ("src/lib.rs", "\n")],
        "initial",
    )
    .unwrap();
    fixture.write("a.txt", "changed\n").unwrap();
    fixture.git(&["mv", "old.txt", "new.txt"]).unwrap();
    fixture.write("notes/todo.md", "- [ ] x\n").unwrap();

    let tree = build(&fixture, BuildRequest::working(fixture.dir(), true));

    assert_eq!(status(&tree, &fixture, "a.txt"), Some(StatusCode::Modified));
    assert_eq!(status(&tree, &fixture, "new.txt"), Some(StatusCode::Renamed));
    assert_eq!(status(&tree, &fixture, "old.txt"), None);
    assert_eq!(
        status(&tree, &fixture, "notes/todo.md"),
        Some(StatusCode::Untracked)
    );
    assert_eq!(status(&tree, &fixture, "notes"), Some(StatusCode::Modified));
    assert_eq!(status(&tree, &fixture, "src/lib.rs"), None);
    assert_eq!(tree.root().status, StatusCode::Clean);
}

#[test]
fn against_older_ref_marks_committed_paths() {
    gitree_log::test();
    let fixture = GitFixture::with_commit(&[("a.txt", "a\n"), ("b.txt", "b\n")], "one").unwrap();
    let base = fixture.head().unwrap();
    fixture.write("b.txt", "b2\n").unwrap();
    fixture.commit_all("two").unwrap();
    fixture.write("a.txt", "a2\n").unwrap();

    let tree = build(&fixture, BuildRequest::against(fixture.dir(), true, &base));

    assert_eq!(status(&tree, &fixture, "b.txt"), Some(StatusCode::Committed));
    assert_eq!(status(&tree, &fixture, "a.txt"), Some(StatusCode::Modified));
}

#[test]
fn commit_pair_ignores_working_dirt() {
    gitree_log::test();
    let fixture = GitFixture::with_commit(&[("a.txt", "a\n")], "one").unwrap();
    let first = fixture.head().unwrap();
    fixture.write("dir/b.txt", "b\n").unwrap();
    let second = fixture.commit_all("two").unwrap();
    fixture.write("a.txt", "dirty\n").unwrap();

    let tree = build(
        &fixture,
        BuildRequest::commit(fixture.dir(), true, &second, Some(first.as_str())),
    );
    assert_eq!(status(&tree, &fixture, "dir/b.txt"), Some(StatusCode::Added));
    assert_eq!(status(&tree, &fixture, "a.txt"), None);

    let root = build(&fixture, BuildRequest::commit(fixture.dir(), true, &first, None));
    assert_eq!(status(&root, &fixture, "a.txt"), Some(StatusCode::Added));
    assert_eq!(root.changed_files().len(), 1);
}

#[test]
fn full_listing_includes_clean_files() {
    gitree_log::test();
    let fixture =
        GitFixture::with_commit(&[("keep.txt", "k\n"), ("src/main.rs", "\n")], "one").unwrap();
    fixture.write("src/main.rs", "fn main() {}\n").unwrap();

    let tree = build(&fixture, BuildRequest::working(fixture.dir(), false));

    assert_eq!(status(&tree, &fixture, "keep.txt"), Some(StatusCode::Clean));
    assert_eq!(status(&tree, &fixture, "src/main.rs"), Some(StatusCode::Modified));
    assert_eq!(status(&tree, &fixture, "src"), Some(StatusCode::Modified));
    assert!(tree.find(&fixture.path(".git")).is_none());
}

#[test]
fn subdirectory_root_only_shows_its_paths() {
    gitree_log::test();
    let fixture =
        GitFixture::with_commit(&[("top.txt", "t\n"), ("sub/inner.txt", "i\n")], "one").unwrap();
    fixture.write("top.txt", "t2\n").unwrap();
    fixture.write("sub/inner.txt", "i2\n").unwrap();

    let repo = Repo::with_cli(fixture.path("sub"));
    let tree = smol::block_on(build_tree(
        &repo,
        &BuildRequest::working(fixture.path("sub"), true),
    ))
    .unwrap();

    let changed: Vec<_> = tree.changed_files().into_iter().map(|(p, _)| p.to_path_buf()).collect();
    assert_eq!(changed, vec![fixture.path("sub/inner.txt")]);
}
