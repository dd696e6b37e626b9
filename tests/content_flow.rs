#![cfg(feature = "inmem-store")]

use std::sync::Arc;

use agora::attachments::AttachmentManager;
use agora::blob::FsBlobStore;
use agora::error::ServiceError;
use agora::models::*;
use agora::posts::{PostQuery, PostService};
use agora::questions::{QuestionQuery, QuestionService, QUESTION_PAGE_SIZE};
use agora::store::inmem::MemStore;
use agora::store::FileStore;
use agora::users::UserService;
use agora::votes::{VoteLedger, VoteTarget};
use serial_test::serial;
use tempfile::TempDir;

struct Fixture {
    store: Arc<MemStore>,
    posts: PostService,
    questions: QuestionService,
    users: UserService,
    attachments: AttachmentManager,
    ledger: VoteLedger,
    // keeps the blob root alive for the duration of the test
    upload_dir: TempDir,
}

fn fixture() -> Fixture {
    std::env::set_var("AGORA_DATA_DIR", tempfile::tempdir().unwrap().path());
    let upload_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemStore::new());
    let blobs = Arc::new(FsBlobStore::with_root(upload_dir.path()));
    Fixture {
        posts: PostService::new(store.clone(), blobs.clone()),
        questions: QuestionService::new(store.clone(), blobs.clone()),
        users: UserService::new(store.clone(), blobs.clone()),
        attachments: AttachmentManager::new(store.clone(), blobs),
        ledger: VoteLedger::new(store.clone()),
        store,
        upload_dir,
    }
}

impl Fixture {
    async fn user(&self, email: &str) -> User {
        self.users
            .create(NewUser {
                email: email.into(),
                credential_hash: "digest".into(),
                firstname: "Alan".into(),
                lastname: "Turing".into(),
                activity: Some("computing".into()),
            })
            .await
            .unwrap()
    }

    fn write_blob(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.upload_dir.path().join(name), bytes).unwrap();
    }

    fn blob_exists(&self, name: &str) -> bool {
        self.upload_dir.path().join(name).exists()
    }
}

fn link(name: &str) -> String {
    format!("http://localhost:8080/file/{name}")
}

#[tokio::test]
#[serial]
async fn post_create_resolves_keywords_and_attachments() {
    let f = fixture();
    let author = f.user("p1@example.com").await;
    f.write_blob("pic.png", b"png-bytes");

    let view = f
        .posts
        .create(
            NewPost {
                title: "Ownership explained".into(),
                body: "Moves and borrows.".into(),
                lang: "en".into(),
                keywords: vec!["Rust".into(), "Teaching".into()],
                images: vec![link("pic.png")],
            },
            author.id,
        )
        .await
        .unwrap();

    assert_eq!(view.author.firstname, "Alan");
    let bodies: Vec<_> = view.keywords.iter().map(|k| k.body.as_str()).collect();
    assert_eq!(bodies, vec!["Rust", "Teaching"]);
    assert_eq!(view.files.len(), 1);
    assert_eq!(view.files[0].link, link("pic.png"));
    assert!(view.comments.is_empty());
    assert_eq!(view.rating, 0);
}

#[tokio::test]
#[serial]
async fn keyword_update_is_a_full_replace() {
    let f = fixture();
    let author = f.user("p2@example.com").await;

    let created = f
        .posts
        .create(
            NewPost {
                title: "T".into(),
                body: "B".into(),
                lang: "en".into(),
                keywords: vec!["Rust".into(), "Async".into()],
                images: vec![],
            },
            author.id,
        )
        .await
        .unwrap();
    assert_eq!(created.keywords.len(), 2);

    let updated = f
        .posts
        .update(
            created.id,
            PostUpdate {
                keywords: Some(vec!["Testing".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let bodies: Vec<_> = updated.keywords.iter().map(|k| k.body.as_str()).collect();
    assert_eq!(bodies, vec!["Testing"]);
}

#[tokio::test]
#[serial]
async fn post_delete_purges_explicit_and_inline_files() {
    let f = fixture();
    let author = f.user("p3@example.com").await;
    f.write_blob("a.png", b"a");
    f.write_blob("b.png", b"b");

    let inline = link("b.png");
    // the inline image appears twice; the second pass must tolerate the
    // record already being gone
    let body = format!(r#"<p>hi</p><img alt="x" src="{inline}"><img src="{inline}">"#);
    f.attachments.create(inline.clone()).await.unwrap();

    let view = f
        .posts
        .create(
            NewPost {
                title: "T".into(),
                body,
                lang: "en".into(),
                keywords: vec![],
                images: vec![link("a.png")],
            },
            author.id,
        )
        .await
        .unwrap();

    f.posts.delete(view.id).await.unwrap();

    assert!(!f.blob_exists("a.png"));
    assert!(!f.blob_exists("b.png"));
    assert!(f
        .store
        .find_file_by_link(&link("a.png"))
        .await
        .unwrap()
        .is_none());
    assert!(f.store.find_file_by_link(&inline).await.unwrap().is_none());
    assert!(matches!(
        f.posts.get(view.id).await.unwrap_err(),
        ServiceError::NotFound
    ));
}

#[tokio::test]
#[serial]
async fn comment_threads_expand_the_reply_parent() {
    let f = fixture();
    let author = f.user("p4@example.com").await;
    let post = f
        .posts
        .create(
            NewPost {
                title: "T".into(),
                body: "B".into(),
                lang: "en".into(),
                keywords: vec![],
                images: vec![],
            },
            author.id,
        )
        .await
        .unwrap();

    let parent = f
        .posts
        .create_comment(
            NewComment {
                body: "first!".into(),
                post_id: post.id,
                reply_on: None,
            },
            author.id,
        )
        .await
        .unwrap();
    let reply = f
        .posts
        .create_comment(
            NewComment {
                body: "answering".into(),
                post_id: post.id,
                reply_on: Some(parent.id),
            },
            author.id,
        )
        .await
        .unwrap();

    let parent_ref = reply.reply_on.expect("reply carries its parent");
    assert_eq!(parent_ref.id, parent.id);
    assert_eq!(parent_ref.body, "first!");

    let view = f.posts.get(post.id).await.unwrap();
    assert_eq!(view.comments.len(), 2);
    assert_eq!(view.comments[0].id, parent.id);
}

#[tokio::test]
#[serial]
async fn question_listing_is_a_page_of_five() {
    let f = fixture();
    let author = f.user("q1@example.com").await;

    for i in 0..(QUESTION_PAGE_SIZE + 2) {
        f.questions
            .create(
                NewQuestion {
                    title: format!("question {i}"),
                    body: "body".into(),
                    keywords: vec![],
                    images: vec![],
                },
                author.id,
            )
            .await
            .unwrap();
    }

    let page = f.questions.list(QuestionQuery::default()).await.unwrap();
    assert_eq!(page.len(), QUESTION_PAGE_SIZE);

    let second = f
        .questions
        .list(QuestionQuery {
            skip: Some(QUESTION_PAGE_SIZE),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second.len(), 2);

    assert_eq!(f.questions.count().await.unwrap(), QUESTION_PAGE_SIZE + 2);
}

#[tokio::test]
#[serial]
async fn question_view_ranks_answers_and_lists_savers() {
    let f = fixture();
    let author = f.user("q2@example.com").await;
    let fan = f.user("fan@example.com").await;

    let question = f
        .questions
        .create(
            NewQuestion {
                title: "Lifetimes".into(),
                body: "how?".into(),
                keywords: vec!["Rust".into()],
                images: vec![],
            },
            author.id,
        )
        .await
        .unwrap();

    let first = f
        .questions
        .create_answer(
            NewAnswer {
                body: "read the book".into(),
                question_id: question.id,
                reply_on: None,
                images: vec![],
            },
            author.id,
        )
        .await
        .unwrap();
    let second = f
        .questions
        .create_answer(
            NewAnswer {
                body: "elision rules".into(),
                question_id: question.id,
                reply_on: None,
                images: vec![],
            },
            author.id,
        )
        .await
        .unwrap();

    f.ledger
        .toggle_like(fan.id, VoteTarget::Answer(second.id))
        .await
        .unwrap();
    f.questions
        .add_to_favorites(fan.id, question.id)
        .await
        .unwrap();
    // favoriting twice is a no-op, not an error
    f.questions
        .add_to_favorites(fan.id, question.id)
        .await
        .unwrap();

    let view = f.questions.get(question.id).await.unwrap();
    let ids: Vec<_> = view.answers.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(view.saved_by, vec![fan.id]);
}

#[tokio::test]
#[serial]
async fn question_search_and_keyword_filter() {
    let f = fixture();
    let author = f.user("q3@example.com").await;

    f.questions
        .create(
            NewQuestion {
                title: "Pinning futures".into(),
                body: "why pin".into(),
                keywords: vec!["Async".into()],
                images: vec![],
            },
            author.id,
        )
        .await
        .unwrap();
    f.questions
        .create(
            NewQuestion {
                title: "Trait objects".into(),
                body: "dyn sizing".into(),
                keywords: vec!["Types".into()],
                images: vec![],
            },
            author.id,
        )
        .await
        .unwrap();

    let hits = f.questions.search("PINNING").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Pinning futures");

    let keywords = f.questions.list_keywords(None).await.unwrap();
    let async_kw = keywords.iter().find(|k| k.body == "Async").unwrap();
    let filtered = f
        .questions
        .list(QuestionQuery {
            keyword_ids: vec![async_kw.id],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].title, "Pinning futures");
}

#[tokio::test]
#[serial]
async fn subscriptions_and_full_view_assembly() {
    let f = fixture();
    let alice = f.user("alice@example.com").await;
    let bob = f.user("bob@example.com").await;

    let err = f.users.subscribe(alice.id, alice.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    f.users.subscribe(alice.id, bob.id).await.unwrap();
    // idempotent
    f.users.subscribe(alice.id, bob.id).await.unwrap();

    let post = f
        .posts
        .create(
            NewPost {
                title: "Bob writes".into(),
                body: "content".into(),
                lang: "en".into(),
                keywords: vec![],
                images: vec![],
            },
            bob.id,
        )
        .await
        .unwrap();
    f.posts.add_to_favorites(alice.id, post.id).await.unwrap();

    let view = f.users.get_full(alice.id).await.unwrap();
    assert_eq!(view.subscriptions.len(), 1);
    assert_eq!(view.subscriptions[0].id, bob.id);
    assert!(view.subscribers.is_empty());
    assert_eq!(view.saved_posts.len(), 1);
    assert_eq!(view.saved_posts[0].id, post.id);

    // the credential hash never appears in the wire shape
    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("credential_hash").is_none());
    assert_eq!(json["email"], "alice@example.com");

    let summary = f.users.get_public_summary(bob.id).await.unwrap();
    assert_eq!(summary.subscribers, 1);
    assert_eq!(summary.subscriptions, 0);
}

#[tokio::test]
#[serial]
async fn avatar_replacement_cleans_up_the_previous_one() {
    let f = fixture();
    let user = f.user("ava@example.com").await;
    f.users
        .create_profile(NewProfile {
            user_id: user.id,
            bio: Some("hello".into()),
            location: None,
            website: None,
            birthdate: None,
            gender: None,
            phone: None,
        })
        .await
        .unwrap();

    f.write_blob("old.png", b"old");
    f.write_blob("new.png", b"new");

    let old_rec = f.attachments.create(link("old.png")).await.unwrap();
    let old = f.users.set_avatar(user.id, old_rec).await.unwrap();
    let new_rec = f.attachments.create(link("new.png")).await.unwrap();
    let new = f.users.set_avatar(user.id, new_rec).await.unwrap();
    assert_ne!(old.id, new.id);

    // the replaced avatar's record and blob are both gone
    assert!(!f.blob_exists("old.png"));
    assert!(f.blob_exists("new.png"));
    assert!(f
        .store
        .find_file_by_link(&link("old.png"))
        .await
        .unwrap()
        .is_none());

    let profile = f.users.get_profile(user.id).await.unwrap();
    assert_eq!(profile.avatar_id, Some(new.id));
    let summary = f.users.get_public_summary(user.id).await.unwrap();
    assert_eq!(summary.avatar.unwrap().link, link("new.png"));
}
