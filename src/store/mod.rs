//! Store abstraction consumed by the services. Backends must apply each
//! compound operation (vote toggle, keyword find-or-create) atomically;
//! the bundled in-memory backend does so under a single write lock.

use async_trait::async_trait;

use crate::models::*;
use crate::votes::{SaveTarget, VoteKind, VoteOutcome, VoteTarget};

#[cfg(feature = "inmem-store")]
pub mod inmem;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("store failure: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: Id) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Applies the interaction-set change and the rating adjustment as one
    /// unit. `NotFound` when either the user or the target is missing.
    async fn toggle_vote(
        &self,
        user_id: Id,
        target: VoteTarget,
        kind: VoteKind,
    ) -> StoreResult<VoteOutcome>;
    async fn toggle_save(&self, user_id: Id, target: SaveTarget) -> StoreResult<bool>;
    /// Connect/disconnect with set semantics: connecting a connected id and
    /// disconnecting an absent one are both no-op successes.
    async fn set_saved(&self, user_id: Id, target: SaveTarget, saved: bool) -> StoreResult<()>;
    /// Ids of users who saved the given question, ascending.
    async fn users_who_saved_question(&self, question_id: Id) -> StoreResult<Vec<Id>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_profile(&self, new: NewProfile) -> StoreResult<Profile>;
    async fn get_profile_by_user(&self, user_id: Id) -> StoreResult<Profile>;
    async fn update_profile(&self, user_id: Id, patch: ProfileUpdate) -> StoreResult<Profile>;
    /// Returns the previous avatar file id, if any.
    async fn set_profile_avatar(&self, user_id: Id, file_id: Id) -> StoreResult<Option<Id>>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, new: NewPostRecord) -> StoreResult<Post>;
    async fn get_post(&self, id: Id) -> StoreResult<Post>;
    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>>;
    async fn posts_saved_by(&self, user_id: Id) -> StoreResult<Vec<Post>>;
    async fn update_post(&self, id: Id, patch: PostPatch) -> StoreResult<Post>;
    /// Full replace of the keyword link set.
    async fn set_post_keywords(&self, id: Id, keyword_ids: Vec<Id>) -> StoreResult<()>;
    async fn add_post_files(&self, id: Id, file_ids: &[Id]) -> StoreResult<()>;
    async fn increment_post_views(&self, id: Id) -> StoreResult<()>;
    /// Removes the post and its comments (eager child cascade).
    async fn delete_post(&self, id: Id) -> StoreResult<Post>;
    async fn count_posts_by_author(&self, author_id: Id) -> StoreResult<usize>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn create_comment(&self, new: NewCommentRecord) -> StoreResult<Comment>;
    async fn get_comment(&self, id: Id) -> StoreResult<Comment>;
    /// Ascending by creation time.
    async fn comments_for_post(&self, post_id: Id) -> StoreResult<Vec<Comment>>;
    async fn comments_by_author(&self, author_id: Id) -> StoreResult<Vec<Comment>>;
    async fn update_comment(&self, id: Id, body: String) -> StoreResult<Comment>;
    async fn delete_comment(&self, id: Id) -> StoreResult<Comment>;
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn create_question(&self, new: NewQuestionRecord) -> StoreResult<Question>;
    async fn get_question(&self, id: Id) -> StoreResult<Question>;
    async fn list_questions(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>>;
    async fn questions_saved_by(&self, user_id: Id) -> StoreResult<Vec<Question>>;
    async fn update_question(&self, id: Id, patch: QuestionPatch) -> StoreResult<Question>;
    async fn set_question_keywords(&self, id: Id, keyword_ids: Vec<Id>) -> StoreResult<()>;
    async fn add_question_files(&self, id: Id, file_ids: &[Id]) -> StoreResult<()>;
    async fn increment_question_views(&self, id: Id) -> StoreResult<()>;
    /// Removes the question and its answers (eager child cascade).
    async fn delete_question(&self, id: Id) -> StoreResult<Question>;
    async fn count_questions(&self) -> StoreResult<usize>;
}

#[async_trait]
pub trait AnswerStore: Send + Sync {
    async fn create_answer(&self, new: NewAnswerRecord) -> StoreResult<Answer>;
    async fn get_answer(&self, id: Id) -> StoreResult<Answer>;
    /// Rating descending, id ascending on ties.
    async fn answers_for_question(&self, question_id: Id) -> StoreResult<Vec<Answer>>;
    async fn update_answer(&self, id: Id, body: String) -> StoreResult<Answer>;
    async fn delete_answer(&self, id: Id) -> StoreResult<Answer>;
}

#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Find-or-create under the registry's matching rule (first stored body
    /// containing `raw` as a case-sensitive substring wins), applied
    /// atomically so concurrent resolutions of a new tag cannot duplicate.
    async fn resolve_keyword(&self, raw: &str) -> StoreResult<Keyword>;
    async fn get_keyword(&self, id: Id) -> StoreResult<Keyword>;
    async fn list_keywords(&self, take: Option<usize>) -> StoreResult<Vec<Keyword>>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn create_file(&self, link: String) -> StoreResult<FileRecord>;
    async fn get_file(&self, id: Id) -> StoreResult<FileRecord>;
    async fn find_file_by_link(&self, link: &str) -> StoreResult<Option<FileRecord>>;
    async fn delete_file(&self, id: Id) -> StoreResult<FileRecord>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Inserts the directed edge; `false` when it already existed.
    async fn add_subscription(&self, subscriber_id: Id, subscribed_to_id: Id) -> StoreResult<bool>;
    /// Removes the edge; `false` when it was absent.
    async fn remove_subscription(
        &self,
        subscriber_id: Id,
        subscribed_to_id: Id,
    ) -> StoreResult<bool>;
    async fn subscription_ids(&self, user_id: Id) -> StoreResult<Vec<Id>>;
    async fn subscriber_ids(&self, user_id: Id) -> StoreResult<Vec<Id>>;
}

pub trait Store:
    UserStore
    + ProfileStore
    + PostStore
    + CommentStore
    + QuestionStore
    + AnswerStore
    + KeywordStore
    + FileStore
    + SubscriptionStore
{
}

impl<T> Store for T where
    T: UserStore
        + ProfileStore
        + PostStore
        + CommentStore
        + QuestionStore
        + AnswerStore
        + KeywordStore
        + FileStore
        + SubscriptionStore
{
}
