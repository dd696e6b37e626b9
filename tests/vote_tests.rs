#![cfg(feature = "inmem-store")]

use std::collections::BTreeSet;
use std::sync::Arc;

use agora::error::ServiceError;
use agora::models::*;
use agora::store::inmem::MemStore;
use agora::store::{AnswerStore, PostStore, QuestionStore, UserStore};
use agora::votes::{apply_toggle, LedgerSets, SaveTarget, VoteKind, VoteLedger, VoteTarget};
use serial_test::serial;

fn store() -> MemStore {
    std::env::set_var("AGORA_DATA_DIR", tempfile::tempdir().unwrap().path());
    MemStore::new()
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.into(),
        credential_hash: "digest".into(),
        firstname: "Grace".into(),
        lastname: "Hopper".into(),
        activity: None,
    }
}

// ---- pure transition table ------------------------------------------------

#[test]
fn toggle_like_round_trip() {
    let mut liked = BTreeSet::new();
    let sets = LedgerSets {
        liked: &mut liked,
        disliked: None,
    };
    assert_eq!(apply_toggle(sets, 7, VoteKind::Like), Some((1, true)));
    assert!(liked.contains(&7));

    let sets = LedgerSets {
        liked: &mut liked,
        disliked: None,
    };
    assert_eq!(apply_toggle(sets, 7, VoteKind::Like), Some((-1, false)));
    assert!(liked.is_empty());
}

#[test]
fn switching_sides_swings_by_two() {
    let mut liked = BTreeSet::new();
    let mut disliked = BTreeSet::new();
    disliked.insert(7);

    // disliked -> liked undoes the dislike and adds the like
    let sets = LedgerSets {
        liked: &mut liked,
        disliked: Some(&mut disliked),
    };
    assert_eq!(apply_toggle(sets, 7, VoteKind::Like), Some((2, true)));
    assert!(liked.contains(&7));
    assert!(disliked.is_empty());

    // and the mirror: liked -> disliked
    let sets = LedgerSets {
        liked: &mut liked,
        disliked: Some(&mut disliked),
    };
    assert_eq!(apply_toggle(sets, 7, VoteKind::Dislike), Some((-2, true)));
    assert!(liked.is_empty());
    assert!(disliked.contains(&7));
}

#[test]
fn dislike_without_opposing_set_is_rejected() {
    let mut liked = BTreeSet::new();
    let sets = LedgerSets {
        liked: &mut liked,
        disliked: None,
    };
    assert_eq!(apply_toggle(sets, 7, VoteKind::Dislike), None);
}

// ---- ledger against the store --------------------------------------------

#[tokio::test]
#[serial]
async fn post_like_toggles_and_nets_zero() {
    let s = Arc::new(store());
    let user = s.create_user(new_user("v@example.com")).await.unwrap();
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

    let ledger = VoteLedger::new(s.clone());
    let first = ledger
        .toggle_like(user.id, VoteTarget::Post(post.id))
        .await
        .unwrap();
    assert_eq!((first.rating, first.delta, first.engaged), (1, 1, true));

    let second = ledger
        .toggle_like(user.id, VoteTarget::Post(post.id))
        .await
        .unwrap();
    assert_eq!((second.rating, second.delta, second.engaged), (0, -1, false));

    // state matches the outcome
    assert_eq!(s.get_post(post.id).await.unwrap().rating, 0);
    assert!(s.get_user(user.id).await.unwrap().liked_posts.is_empty());
}

#[tokio::test]
#[serial]
async fn answer_dislike_then_like_swings_rating() {
    let s = Arc::new(store());
    let user = s.create_user(new_user("w@example.com")).await.unwrap();
    let question = s
        .create_question(NewQuestionRecord {
            title: "Q".into(),
            body: "B".into(),
            author_id: user.id,
            keyword_ids: vec![],
            file_ids: vec![],
        })
        .await
        .unwrap();
    let answer = s
        .create_answer(NewAnswerRecord {
            body: "A".into(),
            author_id: user.id,
            question_id: question.id,
            reply_on: None,
            file_ids: vec![],
        })
        .await
        .unwrap();

    let ledger = VoteLedger::new(s.clone());
    let down = ledger
        .toggle_dislike(user.id, VoteTarget::Answer(answer.id))
        .await
        .unwrap();
    assert_eq!((down.rating, down.delta), (-1, -1));

    let up = ledger
        .toggle_like(user.id, VoteTarget::Answer(answer.id))
        .await
        .unwrap();
    assert_eq!((up.rating, up.delta, up.engaged), (1, 2, true));

    let u = s.get_user(user.id).await.unwrap();
    assert!(u.liked_answers.contains(&answer.id));
    assert!(u.disliked_answers.is_empty());
}

#[tokio::test]
#[serial]
async fn dislike_is_only_supported_for_answers() {
    let s = Arc::new(store());
    let user = s.create_user(new_user("x@example.com")).await.unwrap();
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

    let ledger = VoteLedger::new(s.clone());
    let err = ledger
        .toggle_dislike(user.id, VoteTarget::Post(post.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    // nothing changed
    assert_eq!(s.get_post(post.id).await.unwrap().rating, 0);
}

#[tokio::test]
#[serial]
async fn save_toggle_flips_membership() {
    let s = Arc::new(store());
    let user = s.create_user(new_user("y@example.com")).await.unwrap();
    let question = s
        .create_question(NewQuestionRecord {
            title: "Q".into(),
            body: "B".into(),
            author_id: user.id,
            keyword_ids: vec![],
            file_ids: vec![],
        })
        .await
        .unwrap();

    let ledger = VoteLedger::new(s.clone());
    assert!(ledger
        .toggle_save(user.id, SaveTarget::Question(question.id))
        .await
        .unwrap());
    assert!(s
        .get_user(user.id)
        .await
        .unwrap()
        .saved_questions
        .contains(&question.id));
    assert!(!ledger
        .toggle_save(user.id, SaveTarget::Question(question.id))
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
async fn vote_on_missing_target_is_not_found() {
    let s = Arc::new(store());
    let user = s.create_user(new_user("z@example.com")).await.unwrap();

    let ledger = VoteLedger::new(s.clone());
    let err = ledger
        .toggle_like(user.id, VoteTarget::Post(4242))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));
}
