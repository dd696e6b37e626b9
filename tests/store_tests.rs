#![cfg(feature = "inmem-store")]

use agora::models::*;
use agora::store::inmem::MemStore;
use agora::store::StoreError;
// Bring trait method namespaces into scope so calls on MemStore resolve.
use agora::store::{
    AnswerStore, CommentStore, KeywordStore, PostStore, QuestionStore, SubscriptionStore,
    UserStore,
};
use agora::votes::{VoteKind, VoteTarget};
use serial_test::serial;

/// Helper that returns a fresh, empty store for every test run.
fn store() -> MemStore {
    // isolate state: do **not** persist to the default file path
    std::env::set_var("AGORA_DATA_DIR", tempfile::tempdir().unwrap().path());
    MemStore::new()
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.into(),
        credential_hash: "digest".into(),
        firstname: "Ada".into(),
        lastname: "Lovelace".into(),
        activity: None,
    }
}

#[tokio::test]
#[serial]
async fn user_crud_and_email_conflict() {
    let s = store();

    let u = s.create_user(new_user("ada@example.com")).await.unwrap();
    assert_eq!(u.email, "ada@example.com");
    assert!(u.liked_posts.is_empty());

    // lookup round trips
    let fetched = s.get_user(u.id).await.unwrap();
    assert_eq!(fetched.id, u.id);
    let by_email = s.find_user_by_email("ada@example.com").await.unwrap();
    assert_eq!(by_email.unwrap().id, u.id);
    assert!(s.find_user_by_email("nobody@example.com").await.unwrap().is_none());

    // duplicate email → conflict
    let err = s.create_user(new_user("ada@example.com")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict));
}

#[tokio::test]
#[serial]
async fn keyword_resolution_reuses_substring_matches() {
    let s = store();

    let first = s.resolve_keyword("Rust").await.unwrap();
    assert_eq!(first.body, "Rust");

    // exact re-resolve and substring both land on the existing row
    let again = s.resolve_keyword("Rust").await.unwrap();
    assert_eq!(again.id, first.id);
    let sub = s.resolve_keyword("Rus").await.unwrap();
    assert_eq!(sub.id, first.id);

    // capitalization on create
    let go = s.resolve_keyword("go").await.unwrap();
    assert_eq!(go.body, "Go");
    assert_ne!(go.id, first.id);

    // "golang" is not a substring of "Go", so it gets its own row
    let golang = s.resolve_keyword("golang").await.unwrap();
    assert_eq!(golang.body, "Golang");
    assert_ne!(golang.id, go.id);

    // listing is id-ascending and honors take
    let all = s.list_keywords(None).await.unwrap();
    assert_eq!(
        all.iter().map(|k| k.body.as_str()).collect::<Vec<_>>(),
        vec!["Rust", "Go", "Golang"]
    );
    let limited = s.list_keywords(Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
#[serial]
async fn answers_rank_by_rating_then_id() {
    let s = store();
    let user = s.create_user(new_user("q@example.com")).await.unwrap();
    let question = s
        .create_question(NewQuestionRecord {
            title: "Borrowing".into(),
            body: "Why does this not compile?".into(),
            author_id: user.id,
            keyword_ids: vec![],
            file_ids: vec![],
        })
        .await
        .unwrap();

    let mut answer_ids = Vec::new();
    for body in ["first", "second", "third"] {
        let a = s
            .create_answer(NewAnswerRecord {
                body: body.into(),
                author_id: user.id,
                question_id: question.id,
                reply_on: None,
                file_ids: vec![],
            })
            .await
            .unwrap();
        answer_ids.push(a.id);
    }

    // upvote the second answer so it outranks the others
    s.toggle_vote(user.id, VoteTarget::Answer(answer_ids[1]), VoteKind::Like)
        .await
        .unwrap();

    let ranked = s.answers_for_question(question.id).await.unwrap();
    let ids: Vec<_> = ranked.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![answer_ids[1], answer_ids[0], answer_ids[2]]);
}

#[tokio::test]
#[serial]
async fn question_listing_filters_and_paginates() {
    let s = store();
    let user = s.create_user(new_user("list@example.com")).await.unwrap();
    let rust = s.resolve_keyword("Rust").await.unwrap();
    let go = s.resolve_keyword("Go").await.unwrap();

    for i in 0..7 {
        let keyword_ids = if i % 2 == 0 { vec![rust.id] } else { vec![go.id] };
        s.create_question(NewQuestionRecord {
            title: format!("question {i}"),
            body: "body".into(),
            author_id: user.id,
            keyword_ids,
            file_ids: vec![],
        })
        .await
        .unwrap();
    }

    // no filters: everything
    let all = s.list_questions(&QuestionFilter::default()).await.unwrap();
    assert_eq!(all.len(), 7);

    // keyword OR filter
    let rust_only = s
        .list_questions(&QuestionFilter {
            keyword_ids: vec![rust.id],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rust_only.len(), 4);
    let either = s
        .list_questions(&QuestionFilter {
            keyword_ids: vec![rust.id, go.id],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(either.len(), 7);

    // skip + take window
    let page = s
        .list_questions(&QuestionFilter {
            skip: Some(5),
            take: Some(5),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);

    // case-insensitive search over title and body
    let hits = s
        .list_questions(&QuestionFilter {
            search: Some("QUESTION 3".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "question 3");
}

#[tokio::test]
#[serial]
async fn subscription_edges_are_set_like() {
    let s = store();
    let a = s.create_user(new_user("a@example.com")).await.unwrap();
    let b = s.create_user(new_user("b@example.com")).await.unwrap();

    assert!(s.add_subscription(a.id, b.id).await.unwrap());
    // re-adding the same edge reports it already existed
    assert!(!s.add_subscription(a.id, b.id).await.unwrap());

    assert_eq!(s.subscription_ids(a.id).await.unwrap(), vec![b.id]);
    assert_eq!(s.subscriber_ids(b.id).await.unwrap(), vec![a.id]);
    // direction matters
    assert!(s.subscription_ids(b.id).await.unwrap().is_empty());

    assert!(s.remove_subscription(a.id, b.id).await.unwrap());
    assert!(!s.remove_subscription(a.id, b.id).await.unwrap());
    assert!(s.subscription_ids(a.id).await.unwrap().is_empty());

    // edges to unknown users are rejected
    let err = s.add_subscription(a.id, 9999).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
#[serial]
async fn post_delete_cascades_comments_and_reply_detach() {
    let s = store();
    let user = s.create_user(new_user("c@example.com")).await.unwrap();
    let post = s
        .create_post(NewPostRecord {
            title: "T".into(),
            body: "B".into(),
            lang: "en".into(),
            author_id: user.id,
            keyword_ids: vec![],
            file_ids: vec![],
        })
        .await
        .unwrap();
    let parent = s
        .create_comment(NewCommentRecord {
            body: "parent".into(),
            author_id: user.id,
            post_id: post.id,
            reply_on: None,
            file_ids: vec![],
        })
        .await
        .unwrap();
    let child = s
        .create_comment(NewCommentRecord {
            body: "child".into(),
            author_id: user.id,
            post_id: post.id,
            reply_on: Some(parent.id),
            file_ids: vec![],
        })
        .await
        .unwrap();

    // removing the parent detaches the reply instead of orphaning it
    s.delete_comment(parent.id).await.unwrap();
    let detached = s.get_comment(child.id).await.unwrap();
    assert_eq!(detached.reply_on, None);

    // deleting the post removes the remaining comment with it
    s.delete_post(post.id).await.unwrap();
    assert!(matches!(
        s.get_comment(child.id).await.unwrap_err(),
        StoreError::NotFound
    ));
    assert!(matches!(
        s.get_post(post.id).await.unwrap_err(),
        StoreError::NotFound
    ));
}

#[tokio::test]
#[serial]
async fn answer_delete_detaches_replies() {
    let s = store();
    let user = s.create_user(new_user("thread@example.com")).await.unwrap();
    let question = s
        .create_question(NewQuestionRecord {
            title: "Lifetimes".into(),
            body: "How long does this borrow live?".into(),
            author_id: user.id,
            keyword_ids: vec![],
            file_ids: vec![],
        })
        .await
        .unwrap();

    let parent = s
        .create_answer(NewAnswerRecord {
            body: "until the scope ends".into(),
            author_id: user.id,
            question_id: question.id,
            reply_on: None,
            file_ids: vec![],
        })
        .await
        .unwrap();
    let reply = s
        .create_answer(NewAnswerRecord {
            body: "unless it is reborrowed".into(),
            author_id: user.id,
            question_id: question.id,
            reply_on: Some(parent.id),
            file_ids: vec![],
        })
        .await
        .unwrap();

    s.delete_answer(parent.id).await.unwrap();

    let remaining = s.answers_for_question(question.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, reply.id);
    assert_eq!(remaining[0].reply_on, None);
}
