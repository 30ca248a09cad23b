//! Writes: object database, indexes, commits, packs and worktrees.

mod common;

use ga_agent::{Agent, AgentError};
use ga_core::{CommitSpec, IndexEntry, ObjectKind, SignatureSpec};

fn spec(tree: ga_core::ObjectId, parents: Vec<ga_core::ObjectId>) -> CommitSpec {
    let who = SignatureSpec::new("Grace", "grace@example.com");
    CommitSpec {
        update_ref: None,
        author: who.clone(),
        committer: who,
        message: "from the agent".into(),
        tree,
        parents,
    }
}

#[tokio::test]
async fn odb_write_then_read_back() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let oid = agent
        .odb_write(ObjectKind::Blob, b"payload\n".as_slice())
        .await
        .unwrap();
    assert_eq!(agent.blob_content(oid).await.unwrap(), b"payload\n");
    // Writing the same content again yields the same id.
    let again = agent
        .odb_write(ObjectKind::Blob, b"payload\n".to_vec())
        .await
        .unwrap();
    assert_eq!(oid, again);
}

#[tokio::test]
async fn in_memory_index_builds_a_commit() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let index = agent.index_new().await.unwrap();
    agent.index_read_tree(index, fx.c3).await.unwrap();
    assert_eq!(agent.index_entries(index).await.unwrap().len(), 3);

    let blob = agent
        .odb_write(ObjectKind::Blob, b"new file\n".as_slice())
        .await
        .unwrap();
    agent
        .index_add(index, IndexEntry::file("notes/new.txt", blob, 9))
        .await
        .unwrap();
    agent.index_remove(index, "README.md").await.unwrap();
    let err = agent.index_remove(index, "README.md").await.unwrap_err();
    assert!(matches!(err, AgentError::NotFound(_)));

    let paths: Vec<String> = agent
        .index_entries(index)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(paths, ["docs/guide.md", "notes/new.txt", "src/lib.rs"]);

    let tree = agent.index_write_tree(index).await.unwrap();
    let mut commit = spec(tree, vec![fx.c3]);
    commit.update_ref = Some("refs/heads/main".into());
    let oid = agent.commit_create(commit).await.unwrap();

    assert_eq!(agent.head().await.unwrap().oid, oid);
    let entry = agent.tree_entry_by_path("main", "notes/new.txt").await.unwrap();
    assert_eq!(entry.oid, blob);

    // In-memory indexes have nowhere to be written.
    let err = agent.index_write(index).await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidArgument(_)));

    agent.index_release(index).await.unwrap();
    let err = agent.index_entries(index).await.unwrap_err();
    assert!(matches!(err, AgentError::NotFound(_)));
}

#[tokio::test]
async fn repository_index_can_be_written() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let index = agent.index_open().await.unwrap();
    assert_eq!(agent.index_entries(index).await.unwrap().len(), 3);
    agent.index_remove(index, "docs/guide.md").await.unwrap();
    agent.index_write(index).await.unwrap();
    agent.index_release(index).await.unwrap();

    let on_disk = fx.open().index().unwrap();
    assert_eq!(on_disk.len(), 2);
}

#[tokio::test]
async fn commit_create_validates_its_spec() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();
    let tree = agent.commit(fx.c1).await.unwrap().tree;

    let mut empty_message = spec(tree, vec![]);
    empty_message.message = "  ".into();
    assert!(matches!(
        agent.commit_create(empty_message).await,
        Err(AgentError::InvalidArgument(_))
    ));

    let mut bad_ref = spec(tree, vec![]);
    bad_ref.update_ref = Some("main".into());
    assert!(matches!(
        agent.commit_create(bad_ref).await,
        Err(AgentError::InvalidArgument(_))
    ));

    // Without update_ref the commit is dangling and no branch moves.
    let orphan = agent.commit_create(spec(tree, vec![])).await.unwrap();
    assert!(agent.commit(orphan).await.unwrap().parents.is_empty());
    assert_eq!(agent.head().await.unwrap().oid, fx.c3);
}

#[tokio::test]
async fn pack_create_emits_a_pack_stream() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let pack = agent.pack_create(vec![fx.c1]).await.unwrap();
    assert!(pack.starts_with(b"PACK"));

    let missing = ga_core::ObjectId::from_hex("0123456789012345678901234567890123456789").unwrap();
    assert!(matches!(
        agent.pack_create(vec![missing]).await,
        Err(AgentError::NotFound(_))
    ));
}

#[tokio::test]
async fn worktrees_can_be_added_and_pruned() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = scratch.path().join("wt-feature");

    let wt = agent
        .worktree_add("wt-feature", &path, Some("refs/heads/feature"))
        .await
        .unwrap();
    assert_eq!(wt.name, "wt-feature");
    assert!(path.join("feature.txt").exists());

    agent.worktree_prune("wt-feature").await.unwrap();
    assert!(fx.open().find_worktree("wt-feature").is_err());

    assert!(matches!(
        agent.worktree_add(" ", scratch.path().join("x"), None).await,
        Err(AgentError::InvalidArgument(_))
    ));
}
