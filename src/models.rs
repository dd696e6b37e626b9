use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

// ---------------------------------------------------------------------------
// Stored entities. These are the store's rows; the API only ever sees the
// view types further down, which is what keeps `credential_hash` in-process.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub credential_hash: String,
    pub firstname: String,
    pub lastname: String,
    pub activity: Option<String>,
    pub registered: DateTime<Utc>,
    // per-user interaction sets; liked/disliked for one target are kept
    // mutually exclusive by the vote ledger
    pub liked_posts: BTreeSet<Id>,
    pub liked_comments: BTreeSet<Id>,
    pub liked_questions: BTreeSet<Id>,
    pub liked_answers: BTreeSet<Id>,
    pub disliked_answers: BTreeSet<Id>,
    pub saved_posts: BTreeSet<Id>,
    pub saved_questions: BTreeSet<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub credential_hash: String,
    pub firstname: String,
    pub lastname: String,
    pub activity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Id,
    pub user_id: Id,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub avatar_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewProfile {
    pub user_id: Id,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub body: String,
    pub lang: String,
    pub rating: i64,
    pub views: i64,
    pub author_id: Id,
    pub keyword_ids: Vec<Id>,
    pub file_ids: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPostRecord {
    pub title: String,
    pub body: String,
    pub lang: String,
    pub author_id: Id,
    pub keyword_ids: Vec<Id>,
    pub file_ids: Vec<Id>,
}

#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Id,
    pub title: String,
    pub body: String,
    pub rating: i64,
    pub views: i64,
    pub author_id: Id,
    pub keyword_ids: Vec<Id>,
    pub file_ids: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestionRecord {
    pub title: String,
    pub body: String,
    pub author_id: Id,
    pub keyword_ids: Vec<Id>,
    pub file_ids: Vec<Id>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Id,
    pub body: String,
    pub author_id: Id,
    pub post_id: Id,
    pub reply_on: Option<Id>,
    pub rating: i64,
    pub file_ids: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCommentRecord {
    pub body: String,
    pub author_id: Id,
    pub post_id: Id,
    pub reply_on: Option<Id>,
    pub file_ids: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: Id,
    pub body: String,
    pub author_id: Id,
    pub question_id: Id,
    pub reply_on: Option<Id>,
    pub rating: i64,
    pub file_ids: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnswerRecord {
    pub body: String,
    pub author_id: Id,
    pub question_id: Id,
    pub reply_on: Option<Id>,
    pub file_ids: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Keyword {
    pub id: Id,
    /// Display form: first letter capitalized at creation time.
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileRecord {
    pub id: Id,
    pub link: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// List filters
// ---------------------------------------------------------------------------

/// Descending order field for content listings; rating is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderField {
    #[default]
    Rating,
    Views,
    Created,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub lang: Option<String>,
    pub author_id: Option<Id>,
    /// Case-insensitive substring over title and body.
    pub search: Option<String>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    pub order: OrderField,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub author_id: Option<Id>,
    /// OR-matched keyword ids; empty means "no keyword filter".
    pub keyword_ids: Vec<Id>,
    pub search: Option<String>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    pub order: OrderField,
}

// ---------------------------------------------------------------------------
// Read views. Assembled by the services; the restricted author subset never
// carries the email or credential hash.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorInfo {
    pub id: Id,
    pub firstname: String,
    pub lastname: String,
    pub activity: Option<String>,
}

impl From<&User> for AuthorInfo {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            firstname: u.firstname.clone(),
            lastname: u.lastname.clone(),
            activity: u.activity.clone(),
        }
    }
}

/// Other-user projection used by subscription listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRef {
    pub id: Id,
    pub firstname: String,
    pub lastname: String,
    pub registered: DateTime<Utc>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentRef {
    pub id: Id,
    pub body: String,
    pub author: AuthorInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentView {
    pub id: Id,
    pub body: String,
    pub rating: i64,
    pub post_id: Id,
    pub author: AuthorInfo,
    pub reply_on: Option<CommentRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerView {
    pub id: Id,
    pub body: String,
    pub rating: i64,
    pub question_id: Id,
    pub reply_on: Option<Id>,
    pub author: AuthorInfo,
    pub files: Vec<FileRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostView {
    pub id: Id,
    pub title: String,
    pub body: String,
    pub lang: String,
    pub rating: i64,
    pub views: i64,
    pub author: AuthorInfo,
    pub keywords: Vec<Keyword>,
    pub files: Vec<FileRecord>,
    pub comments: Vec<CommentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionView {
    pub id: Id,
    pub title: String,
    pub body: String,
    pub rating: i64,
    pub views: i64,
    pub author: AuthorInfo,
    pub keywords: Vec<Keyword>,
    pub files: Vec<FileRecord>,
    /// Ordered rating descending, id ascending.
    pub answers: Vec<AnswerView>,
    /// Bare ids of users who saved this question.
    pub saved_by: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileView {
    pub id: Id,
    pub user_id: Id,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<FileRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserFullView {
    pub id: Id,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub activity: Option<String>,
    pub registered: DateTime<Utc>,
    pub profile: Option<ProfileView>,
    pub posts: Vec<PostView>,
    pub saved_posts: Vec<PostView>,
    pub saved_questions: Vec<QuestionView>,
    pub subscriptions: Vec<UserRef>,
    pub subscribers: Vec<UserRef>,
    pub liked_posts: Vec<Id>,
    pub liked_comments: Vec<Id>,
    pub liked_questions: Vec<Id>,
    pub liked_answers: Vec<Id>,
    pub disliked_answers: Vec<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Id,
    pub firstname: String,
    pub lastname: String,
    pub registered: DateTime<Utc>,
    pub avatar: Option<FileRecord>,
    pub subscriptions: usize,
    pub subscribers: usize,
}

// ---------------------------------------------------------------------------
// Service-level inputs (what the HTTP layer hands to the services)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub lang: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Links of already-uploaded images to attach.
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub lang: Option<String>,
    /// When present, replaces the keyword set wholesale.
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewQuestion {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct QuestionUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewComment {
    pub body: String,
    pub post_id: Id,
    pub reply_on: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewAnswer {
    pub body: String,
    pub question_id: Id,
    pub reply_on: Option<Id>,
    #[serde(default)]
    pub images: Vec<String>,
}
