//! References through the agent: lookup, enumeration, create and delete.

mod common;

use ga_agent::{Agent, AgentError, CallOptions, ChunkSize};
use ga_core::{GitObject, ObjectKind, RefKind, Reference, Targeted};

fn names(mut refs: Vec<Reference>) -> Vec<String> {
    refs.sort_by(|a, b| a.name.cmp(&b.name));
    refs.into_iter().map(|r| r.name).collect()
}

#[tokio::test]
async fn head_follows_the_symbolic_reference() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let head = agent.head().await.unwrap();
    assert_eq!(head.name, "refs/heads/main");
    assert_eq!(head.shorthand, "main");
    assert_eq!(head.prefix, "refs/heads/");
    assert_eq!(head.kind, Some(RefKind::Branch));
    assert_eq!(head.oid, fx.c3);
}

#[tokio::test]
async fn head_of_empty_repository_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    git2::Repository::init(dir.path()).unwrap();
    let agent = Agent::start(dir.path()).await.unwrap();

    assert!(agent.is_empty().await.unwrap());
    assert!(matches!(agent.head().await, Err(AgentError::NotFound(_))));
}

#[tokio::test]
async fn branch_and_tag_lookups_use_their_roots() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    assert_eq!(agent.branch("feature").await.unwrap().oid, fx.c4);
    let tag = agent.tag("v1.0").await.unwrap();
    assert_eq!(tag.kind, Some(RefKind::Tag));
    // An annotated tag reference points at the tag object.
    assert_eq!(tag.oid, fx.tag);

    assert!(matches!(agent.branch("v1.0").await, Err(AgentError::NotFound(_))));
    assert!(matches!(agent.reference("").await, Err(AgentError::InvalidArgument(_))));
}

#[tokio::test]
async fn short_names_are_disambiguated() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    assert_eq!(agent.reference("main").await.unwrap().name, "refs/heads/main");
    assert_eq!(agent.reference("light").await.unwrap().name, "refs/tags/light");
    assert_eq!(agent.reference("refs/heads/feature").await.unwrap().oid, fx.c4);
}

#[tokio::test]
async fn enumerations_list_every_reference() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let branches = agent.branches(CallOptions::new()).await.unwrap();
    assert_eq!(
        names(branches.try_collect().await.unwrap()),
        ["refs/heads/feature", "refs/heads/main"]
    );

    let tags = agent.tags(CallOptions::new()).await.unwrap();
    assert_eq!(
        names(tags.try_collect().await.unwrap()),
        ["refs/tags/light", "refs/tags/v1.0"]
    );

    let all = agent.references(None, CallOptions::new()).await.unwrap();
    assert_eq!(all.try_collect().await.unwrap().len(), 4);

    let globbed = agent
        .references(Some("refs/tags/v*"), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(names(globbed.try_collect().await.unwrap()), ["refs/tags/v1.0"]);
}

#[tokio::test]
async fn with_commit_peels_annotated_tags() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let opts = CallOptions::new().with(ObjectKind::Commit);
    let tagged: Targeted<Reference> = agent
        .call_as(ga_core::Operation::Tag { name: "v1.0".into() }, opts)
        .await
        .unwrap();
    assert_eq!(tagged.item.oid, fx.c2);
    match tagged.target {
        GitObject::Commit(commit) => assert_eq!(commit.message, "add guide"),
        other => panic!("expected a commit, got {other:?}"),
    }

    let opts = CallOptions::new()
        .with(ObjectKind::Commit)
        .chunk_size(ChunkSize::new(1).unwrap());
    let stream = agent
        .stream::<Targeted<Reference>>(ga_core::Operation::Tags, opts)
        .await
        .unwrap();
    let peeled = stream.try_collect().await.unwrap();
    assert_eq!(peeled.len(), 2);
    assert!(peeled.iter().all(|t| t.target.kind() == ObjectKind::Commit));
}

#[tokio::test]
async fn references_can_be_created_and_deleted() {
    let fx = common::fixture();
    let agent = Agent::start(fx.path()).await.unwrap();

    let created = agent
        .reference_create("refs/heads/topic", fx.c1, false, "create topic")
        .await
        .unwrap();
    assert_eq!(created.shorthand, "topic");
    assert_eq!(agent.branch("topic").await.unwrap().oid, fx.c1);

    // An existing reference without force is rejected.
    let err = agent
        .reference_create("refs/heads/topic", fx.c2, false, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::InvalidArgument(_)), "{err:?}");
    agent
        .reference_create("refs/heads/topic", fx.c2, true, "move topic")
        .await
        .unwrap();
    assert_eq!(agent.branch("topic").await.unwrap().oid, fx.c2);

    agent.reference_delete("refs/heads/topic").await.unwrap();
    assert!(matches!(agent.branch("topic").await, Err(AgentError::NotFound(_))));

    let err = agent.reference_delete("topic").await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidArgument(_)));
}
