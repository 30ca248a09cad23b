//! Objects, trees and diffs through the agent.

mod common;

use ga_agent::{Agent, AgentError, CallOptions};
use ga_core::{
    DeltaStatus, DiffFormat, DiffOptions, GitObject, ObjectId, ObjectKind, PeelTarget, Rev,
    TreeEntry,
};

#[tokio::test]
async fn revision_resolves_specs_and_reports_the_reference() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let resolved = agent.revision("main").await.unwrap();
    assert_eq!(resolved.object.oid(), fx.c3);
    assert_eq!(resolved.reference.unwrap().name, "refs/heads/main");

    let parent = agent.revision("main~1").await.unwrap();
    assert_eq!(parent.object.oid(), fx.c2);

    let tag = agent.revision("v1.0").await.unwrap();
    assert_eq!(tag.object.kind(), ObjectKind::Tag);

    assert!(matches!(agent.revision("nope").await, Err(AgentError::NotFound(_))));
    assert!(matches!(agent.revision("  ").await, Err(AgentError::InvalidArgument(_))));
}

#[tokio::test]
async fn objects_come_back_in_their_owned_form() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let commit = agent.commit(fx.c2).await.unwrap();
    assert_eq!(commit.parents, vec![fx.c1]);
    assert_eq!(commit.summary(), "add guide");
    assert_eq!(commit.author.email, "ada@example.com");
    assert_eq!(commit.author.time.timestamp(), common::BASE_TIME + 60);

    match agent.object(fx.tag).await.unwrap() {
        GitObject::Tag(tag) => {
            assert_eq!(tag.name, "v1.0");
            assert_eq!(tag.target, fx.c2);
            assert_eq!(tag.target_kind, Some(ObjectKind::Commit));
        }
        other => panic!("expected a tag, got {other:?}"),
    }

    // A tree oid asked for as a commit is a shape mismatch.
    let err = agent.commit(commit.tree).await.unwrap_err();
    assert!(matches!(err, AgentError::UnexpectedReply { .. }), "{err:?}");

    let missing = ObjectId::from_hex("0123456789012345678901234567890123456789").unwrap();
    assert!(matches!(agent.object(missing).await, Err(AgentError::NotFound(_))));
}

#[tokio::test]
async fn peel_walks_tag_commit_tree() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let target = PeelTarget::Reference("refs/tags/v1.0".into());
    let commit = agent
        .peel(target.clone(), Some(ObjectKind::Commit))
        .await
        .unwrap();
    assert_eq!(commit.oid(), fx.c2);

    let tree = agent.peel(target.clone(), Some(ObjectKind::Tree)).await.unwrap();
    assert_eq!(tree.kind(), ObjectKind::Tree);

    let itself = agent.peel(target, None).await.unwrap();
    assert_eq!(itself.oid(), fx.tag);

    let err = agent
        .peel(PeelTarget::Object(fx.c1), Some(ObjectKind::Tag))
        .await
        .unwrap_err();
    assert_eq!(err, AgentError::invalid("cannot peel commit to tag"));
}

#[tokio::test]
async fn branch_reference_never_peels_to_a_tag() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    for name in ["main", "refs/heads/main"] {
        let err = agent
            .peel(PeelTarget::Reference(name.into()), Some(ObjectKind::Tag))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidArgument(_)), "{name}: {err:?}");
    }
    // The branch itself is untouched.
    assert_eq!(agent.branch("main").await.unwrap().oid, fx.c3);
}

#[tokio::test]
async fn tree_entries_list_one_directory() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let root: Vec<TreeEntry> = agent
        .tree_entries(fx.c3, "", CallOptions::new())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let names: Vec<_> = root.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["README.md", "docs", "src"]);
    assert_eq!(root[0].kind, Some(ObjectKind::Blob));
    assert_eq!(root[1].kind, Some(ObjectKind::Tree));

    let src: Vec<TreeEntry> = agent
        .tree_entries("main", "/src/", CallOptions::new())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(src.len(), 1);
    assert_eq!(src[0].path, "src/lib.rs");

    let err = agent
        .tree_entries(fx.c3, "README.md", CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::InvalidArgument(_)));
    let err = agent
        .tree_entries(fx.c3, "nope", CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::NotFound(_)));
}

#[tokio::test]
async fn tree_entry_by_path_and_blob_content() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let entry = agent.tree_entry_by_path(fx.c3, "README.md").await.unwrap();
    assert_eq!(entry.path, "README.md");
    assert_eq!(entry.mode, 0o100644);
    assert_eq!(agent.blob_content(entry.oid).await.unwrap(), b"hello\nworld\n");

    let nested = agent
        .tree_entry_by_path(fx.c3, "docs/guide.md")
        .await
        .unwrap();
    assert_eq!(nested.name, "guide.md");
    assert_eq!(nested.path, "docs/guide.md");

    let blob = agent
        .peel(PeelTarget::TreeEntry(nested), Some(ObjectKind::Blob))
        .await
        .unwrap();
    assert_eq!(blob.kind(), ObjectKind::Blob);

    let err = agent.tree_entry_by_path(fx.c3, "").await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidArgument(_)));
}

#[tokio::test]
async fn diff_between_commits() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let diff = agent
        .diff(Some(Rev::Oid(fx.c2)), fx.c3, DiffOptions::default())
        .await
        .unwrap();
    assert_eq!(diff.deltas.len(), 1);
    let delta = &diff.deltas[0];
    assert_eq!(delta.status, DeltaStatus::Modified);
    assert_eq!(delta.path(), Some("README.md"));
    let added: Vec<_> = delta.hunks[0]
        .lines
        .iter()
        .filter(|l| l.origin == '+')
        .map(|l| l.content.as_str())
        .collect();
    assert_eq!(added, ["world\n"]);

    let stats = agent
        .diff_stats(Some(Rev::Oid(fx.c1)), fx.c2, DiffOptions::default())
        .await
        .unwrap();
    assert_eq!(stats.files_changed, 2);
    assert_eq!(stats.insertions, 2);
    assert_eq!(stats.deletions, 0);

    let from_empty = agent.diff(None, fx.c1, DiffOptions::default()).await.unwrap();
    assert_eq!(from_empty.deltas.len(), 2);
    assert!(from_empty
        .deltas
        .iter()
        .all(|d| d.status == DeltaStatus::Added));
}

#[tokio::test]
async fn diff_pathspec_and_text_formats() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let only_docs = DiffOptions {
        pathspec: vec!["docs".into()],
        ..DiffOptions::default()
    };
    let diff = agent
        .diff(Some(Rev::Oid(fx.c1)), fx.c2, only_docs)
        .await
        .unwrap();
    assert_eq!(diff.deltas.len(), 1);
    assert_eq!(diff.deltas[0].path(), Some("docs/guide.md"));

    let names = agent
        .diff_format(
            Some(Rev::Oid(fx.c1)),
            fx.c2,
            DiffOptions::default(),
            DiffFormat::NameOnly,
        )
        .await
        .unwrap();
    assert!(names.contains("docs/guide.md"));
    assert!(names.contains("src/lib.rs"));

    let patch = agent
        .diff_format(
            Some(Rev::Oid(fx.c2)),
            fx.c3,
            DiffOptions::default(),
            DiffFormat::Patch,
        )
        .await
        .unwrap();
    assert!(patch.contains("+world"));
    assert!(patch.contains("README.md"));
}
