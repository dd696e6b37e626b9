use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{StoreError, StoreResult};
use crate::keywords;
use crate::models::*;
use crate::votes::{self, LedgerSets, SaveTarget, VoteKind, VoteOutcome, VoteTarget};

const SNAPSHOT_PATH: &str = "data/state.json";

#[derive(Default, Serialize, Deserialize)]
struct State {
    users: HashMap<Id, User>,
    profiles: HashMap<Id, Profile>,
    posts: HashMap<Id, Post>,
    comments: HashMap<Id, Comment>,
    questions: HashMap<Id, Question>,
    answers: HashMap<Id, Answer>,
    keywords: HashMap<Id, Keyword>,
    files: HashMap<Id, FileRecord>,
    // directed (subscriber, subscribed_to) edges
    subscriptions: BTreeSet<(Id, Id)>,
    next_id: Id,
}

#[derive(Clone)]
pub struct MemStore {
    state: Arc<RwLock<State>>,
    snapshot_path: Arc<PathBuf>,
}

impl MemStore {
    fn data_dir() -> PathBuf {
        std::env::var("AGORA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"))
    }

    fn snapshot_path() -> PathBuf {
        if std::env::var("AGORA_DATA_DIR").is_ok() {
            let mut p = Self::data_dir();
            p.push("state.json");
            p
        } else {
            PathBuf::from(SNAPSHOT_PATH)
        }
    }

    fn load_state_from(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                Ok(s) => {
                    info!(path = %path.display(), "loaded store snapshot");
                    s
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "snapshot unreadable, starting empty");
                    State::default()
                }
            },
            Err(_) => State::default(),
        }
    }

    fn persist(&self) {
        let path = self.snapshot_path.clone();
        if let Ok(bytes) = serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            if let Err(e) = std::fs::write(&*path, bytes) {
                warn!(path = %path.display(), error = %e, "failed to write store snapshot");
            }
        }
    }

    pub fn new() -> Self {
        let snapshot_path = Self::snapshot_path();
        let state = Self::load_state_from(&snapshot_path);
        Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path: Arc::new(snapshot_path),
        }
    }

    fn next_id(state: &mut State) -> Id {
        state.next_id += 1;
        state.next_id
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts content descending by the chosen field, id ascending on ties.
fn order_posts(v: &mut [Post], order: OrderField) {
    v.sort_by(|a, b| {
        let primary = match order {
            OrderField::Rating => b.rating.cmp(&a.rating),
            OrderField::Views => b.views.cmp(&a.views),
            OrderField::Created => b.created_at.cmp(&a.created_at),
        };
        primary.then(a.id.cmp(&b.id))
    });
}

fn order_questions(v: &mut [Question], order: OrderField) {
    v.sort_by(|a, b| {
        let primary = match order {
            OrderField::Rating => b.rating.cmp(&a.rating),
            OrderField::Views => b.views.cmp(&a.views),
            OrderField::Created => b.created_at.cmp(&a.created_at),
        };
        primary.then(a.id.cmp(&b.id))
    });
}

fn matches_search(title: &str, body: &str, search: &str) -> bool {
    let needle = search.to_lowercase();
    title.to_lowercase().contains(&needle) || body.to_lowercase().contains(&needle)
}

fn paginate<T>(v: Vec<T>, skip: Option<usize>, take: Option<usize>) -> Vec<T> {
    let iter = v.into_iter().skip(skip.unwrap_or(0));
    match take {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}

#[async_trait]
impl super::UserStore for MemStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut s = self.state.write().unwrap();
        if s.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict);
        }
        let id = Self::next_id(&mut s);
        let user = User {
            id,
            email: new.email,
            credential_hash: new.credential_hash,
            firstname: new.firstname,
            lastname: new.lastname,
            activity: new.activity,
            registered: Utc::now(),
            liked_posts: BTreeSet::new(),
            liked_comments: BTreeSet::new(),
            liked_questions: BTreeSet::new(),
            liked_answers: BTreeSet::new(),
            disliked_answers: BTreeSet::new(),
            saved_posts: BTreeSet::new(),
            saved_questions: BTreeSet::new(),
        };
        s.users.insert(id, user.clone());
        drop(s);
        self.persist();
        Ok(user)
    }

    async fn get_user(&self, id: Id) -> StoreResult<User> {
        let s = self.state.read().unwrap();
        s.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let s = self.state.read().unwrap();
        Ok(s.users.values().find(|u| u.email == email).cloned())
    }

    async fn toggle_vote(
        &self,
        user_id: Id,
        target: VoteTarget,
        kind: VoteKind,
    ) -> StoreResult<VoteOutcome> {
        // one write guard spans both the set change and the rating change
        let mut s = self.state.write().unwrap();
        let exists = match target {
            VoteTarget::Post(id) => s.posts.contains_key(&id),
            VoteTarget::Comment(id) => s.comments.contains_key(&id),
            VoteTarget::Question(id) => s.questions.contains_key(&id),
            VoteTarget::Answer(id) => s.answers.contains_key(&id),
        };
        if !exists {
            return Err(StoreError::NotFound);
        }

        let (delta, engaged) = {
            let user = s.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
            let sets = match target {
                VoteTarget::Post(_) => LedgerSets {
                    liked: &mut user.liked_posts,
                    disliked: None,
                },
                VoteTarget::Comment(_) => LedgerSets {
                    liked: &mut user.liked_comments,
                    disliked: None,
                },
                VoteTarget::Question(_) => LedgerSets {
                    liked: &mut user.liked_questions,
                    disliked: None,
                },
                VoteTarget::Answer(_) => LedgerSets {
                    liked: &mut user.liked_answers,
                    disliked: Some(&mut user.disliked_answers),
                },
            };
            votes::apply_toggle(sets, target.id(), kind).ok_or_else(|| {
                StoreError::Internal(format!("no dislike set for {}s", target.kind_name()))
            })?
        };

        let rating = match target {
            VoteTarget::Post(id) => {
                let p = s.posts.get_mut(&id).ok_or(StoreError::NotFound)?;
                p.rating += delta;
                p.rating
            }
            VoteTarget::Comment(id) => {
                let c = s.comments.get_mut(&id).ok_or(StoreError::NotFound)?;
                c.rating += delta;
                c.rating
            }
            VoteTarget::Question(id) => {
                let q = s.questions.get_mut(&id).ok_or(StoreError::NotFound)?;
                q.rating += delta;
                q.rating
            }
            VoteTarget::Answer(id) => {
                let a = s.answers.get_mut(&id).ok_or(StoreError::NotFound)?;
                a.rating += delta;
                a.rating
            }
        };
        drop(s);
        self.persist();
        Ok(VoteOutcome {
            rating,
            delta,
            engaged,
        })
    }

    async fn toggle_save(&self, user_id: Id, target: SaveTarget) -> StoreResult<bool> {
        let mut s = self.state.write().unwrap();
        let exists = match target {
            SaveTarget::Post(id) => s.posts.contains_key(&id),
            SaveTarget::Question(id) => s.questions.contains_key(&id),
        };
        if !exists {
            return Err(StoreError::NotFound);
        }
        let user = s.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        let saved = match target {
            SaveTarget::Post(id) => {
                if user.saved_posts.remove(&id) {
                    false
                } else {
                    user.saved_posts.insert(id);
                    true
                }
            }
            SaveTarget::Question(id) => {
                if user.saved_questions.remove(&id) {
                    false
                } else {
                    user.saved_questions.insert(id);
                    true
                }
            }
        };
        drop(s);
        self.persist();
        Ok(saved)
    }

    async fn set_saved(&self, user_id: Id, target: SaveTarget, saved: bool) -> StoreResult<()> {
        let mut s = self.state.write().unwrap();
        if saved {
            // connecting requires the target to exist; disconnect never does
            let exists = match target {
                SaveTarget::Post(id) => s.posts.contains_key(&id),
                SaveTarget::Question(id) => s.questions.contains_key(&id),
            };
            if !exists {
                return Err(StoreError::NotFound);
            }
        }
        let user = s.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        match target {
            SaveTarget::Post(id) => {
                if saved {
                    user.saved_posts.insert(id);
                } else {
                    user.saved_posts.remove(&id);
                }
            }
            SaveTarget::Question(id) => {
                if saved {
                    user.saved_questions.insert(id);
                } else {
                    user.saved_questions.remove(&id);
                }
            }
        }
        drop(s);
        self.persist();
        Ok(())
    }

    async fn users_who_saved_question(&self, question_id: Id) -> StoreResult<Vec<Id>> {
        let s = self.state.read().unwrap();
        let mut ids: Vec<Id> = s
            .users
            .values()
            .filter(|u| u.saved_questions.contains(&question_id))
            .map(|u| u.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[async_trait]
impl super::ProfileStore for MemStore {
    async fn create_profile(&self, new: NewProfile) -> StoreResult<Profile> {
        let mut s = self.state.write().unwrap();
        if !s.users.contains_key(&new.user_id) {
            return Err(StoreError::NotFound);
        }
        if s.profiles.values().any(|p| p.user_id == new.user_id) {
            return Err(StoreError::Conflict);
        }
        let id = Self::next_id(&mut s);
        let profile = Profile {
            id,
            user_id: new.user_id,
            bio: new.bio,
            location: new.location,
            website: new.website,
            birthdate: new.birthdate,
            gender: new.gender,
            phone: new.phone,
            avatar_id: None,
        };
        s.profiles.insert(id, profile.clone());
        drop(s);
        self.persist();
        Ok(profile)
    }

    async fn get_profile_by_user(&self, user_id: Id) -> StoreResult<Profile> {
        let s = self.state.read().unwrap();
        s.profiles
            .values()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_profile(&self, user_id: Id, patch: ProfileUpdate) -> StoreResult<Profile> {
        let mut s = self.state.write().unwrap();
        let profile = s
            .profiles
            .values_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(bio) = patch.bio {
            profile.bio = Some(bio);
        }
        if let Some(location) = patch.location {
            profile.location = Some(location);
        }
        if let Some(website) = patch.website {
            profile.website = Some(website);
        }
        if let Some(birthdate) = patch.birthdate {
            profile.birthdate = Some(birthdate);
        }
        if let Some(gender) = patch.gender {
            profile.gender = Some(gender);
        }
        if let Some(phone) = patch.phone {
            profile.phone = Some(phone);
        }
        let updated = profile.clone();
        drop(s);
        self.persist();
        Ok(updated)
    }

    async fn set_profile_avatar(&self, user_id: Id, file_id: Id) -> StoreResult<Option<Id>> {
        let mut s = self.state.write().unwrap();
        if !s.files.contains_key(&file_id) {
            return Err(StoreError::NotFound);
        }
        let profile = s
            .profiles
            .values_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        let previous = profile.avatar_id.replace(file_id);
        drop(s);
        self.persist();
        Ok(previous)
    }
}

#[async_trait]
impl super::PostStore for MemStore {
    async fn create_post(&self, new: NewPostRecord) -> StoreResult<Post> {
        let mut s = self.state.write().unwrap();
        if !s.users.contains_key(&new.author_id) {
            return Err(StoreError::NotFound);
        }
        let now = Utc::now();
        let id = Self::next_id(&mut s);
        let post = Post {
            id,
            title: new.title,
            body: new.body,
            lang: new.lang,
            rating: 0,
            views: 0,
            author_id: new.author_id,
            keyword_ids: new.keyword_ids,
            file_ids: new.file_ids,
            created_at: now,
            updated_at: now,
        };
        s.posts.insert(id, post.clone());
        drop(s);
        self.persist();
        Ok(post)
    }

    async fn get_post(&self, id: Id) -> StoreResult<Post> {
        let s = self.state.read().unwrap();
        s.posts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>> {
        let s = self.state.read().unwrap();
        let mut v: Vec<Post> = s
            .posts
            .values()
            .filter(|p| filter.lang.as_deref().map_or(true, |l| p.lang == l))
            .filter(|p| filter.author_id.map_or(true, |a| p.author_id == a))
            .filter(|p| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |q| matches_search(&p.title, &p.body, q))
            })
            .cloned()
            .collect();
        order_posts(&mut v, filter.order);
        Ok(paginate(v, filter.skip, filter.take))
    }

    async fn posts_saved_by(&self, user_id: Id) -> StoreResult<Vec<Post>> {
        let s = self.state.read().unwrap();
        let user = s.users.get(&user_id).ok_or(StoreError::NotFound)?;
        // dangling ids (content deleted after being saved) are skipped
        Ok(user
            .saved_posts
            .iter()
            .filter_map(|id| s.posts.get(id).cloned())
            .collect())
    }

    async fn update_post(&self, id: Id, patch: PostPatch) -> StoreResult<Post> {
        let mut s = self.state.write().unwrap();
        let post = s.posts.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(title) = patch.title {
            post.title = title;
        }
        if let Some(body) = patch.body {
            post.body = body;
        }
        if let Some(lang) = patch.lang {
            post.lang = lang;
        }
        post.updated_at = Utc::now();
        let updated = post.clone();
        drop(s);
        self.persist();
        Ok(updated)
    }

    async fn set_post_keywords(&self, id: Id, keyword_ids: Vec<Id>) -> StoreResult<()> {
        let mut s = self.state.write().unwrap();
        let post = s.posts.get_mut(&id).ok_or(StoreError::NotFound)?;
        post.keyword_ids = keyword_ids;
        drop(s);
        self.persist();
        Ok(())
    }

    async fn add_post_files(&self, id: Id, file_ids: &[Id]) -> StoreResult<()> {
        let mut s = self.state.write().unwrap();
        let post = s.posts.get_mut(&id).ok_or(StoreError::NotFound)?;
        post.file_ids.extend_from_slice(file_ids);
        drop(s);
        self.persist();
        Ok(())
    }

    async fn increment_post_views(&self, id: Id) -> StoreResult<()> {
        let mut s = self.state.write().unwrap();
        let post = s.posts.get_mut(&id).ok_or(StoreError::NotFound)?;
        post.views += 1;
        drop(s);
        self.persist();
        Ok(())
    }

    async fn delete_post(&self, id: Id) -> StoreResult<Post> {
        let mut s = self.state.write().unwrap();
        let post = s.posts.remove(&id).ok_or(StoreError::NotFound)?;
        s.comments.retain(|_, c| c.post_id != id);
        drop(s);
        self.persist();
        Ok(post)
    }

    async fn count_posts_by_author(&self, author_id: Id) -> StoreResult<usize> {
        let s = self.state.read().unwrap();
        Ok(s.posts.values().filter(|p| p.author_id == author_id).count())
    }
}

#[async_trait]
impl super::CommentStore for MemStore {
    async fn create_comment(&self, new: NewCommentRecord) -> StoreResult<Comment> {
        let mut s = self.state.write().unwrap();
        if !s.posts.contains_key(&new.post_id) || !s.users.contains_key(&new.author_id) {
            return Err(StoreError::NotFound);
        }
        if let Some(parent) = new.reply_on {
            if !s.comments.contains_key(&parent) {
                return Err(StoreError::NotFound);
            }
        }
        let now = Utc::now();
        let id = Self::next_id(&mut s);
        let comment = Comment {
            id,
            body: new.body,
            author_id: new.author_id,
            post_id: new.post_id,
            reply_on: new.reply_on,
            rating: 0,
            file_ids: new.file_ids,
            created_at: now,
            updated_at: now,
        };
        s.comments.insert(id, comment.clone());
        drop(s);
        self.persist();
        Ok(comment)
    }

    async fn get_comment(&self, id: Id) -> StoreResult<Comment> {
        let s = self.state.read().unwrap();
        s.comments.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn comments_for_post(&self, post_id: Id) -> StoreResult<Vec<Comment>> {
        let s = self.state.read().unwrap();
        let mut v: Vec<Comment> = s
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(v)
    }

    async fn comments_by_author(&self, author_id: Id) -> StoreResult<Vec<Comment>> {
        let s = self.state.read().unwrap();
        let mut v: Vec<Comment> = s
            .comments
            .values()
            .filter(|c| c.author_id == author_id)
            .cloned()
            .collect();
        v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(v)
    }

    async fn update_comment(&self, id: Id, body: String) -> StoreResult<Comment> {
        let mut s = self.state.write().unwrap();
        let comment = s.comments.get_mut(&id).ok_or(StoreError::NotFound)?;
        comment.body = body;
        comment.updated_at = Utc::now();
        let updated = comment.clone();
        drop(s);
        self.persist();
        Ok(updated)
    }

    async fn delete_comment(&self, id: Id) -> StoreResult<Comment> {
        let mut s = self.state.write().unwrap();
        let comment = s.comments.remove(&id).ok_or(StoreError::NotFound)?;
        // detach replies pointing at the removed comment
        for c in s.comments.values_mut() {
            if c.reply_on == Some(id) {
                c.reply_on = None;
            }
        }
        drop(s);
        self.persist();
        Ok(comment)
    }
}

#[async_trait]
impl super::QuestionStore for MemStore {
    async fn create_question(&self, new: NewQuestionRecord) -> StoreResult<Question> {
        let mut s = self.state.write().unwrap();
        if !s.users.contains_key(&new.author_id) {
            return Err(StoreError::NotFound);
        }
        let now = Utc::now();
        let id = Self::next_id(&mut s);
        let question = Question {
            id,
            title: new.title,
            body: new.body,
            rating: 0,
            views: 0,
            author_id: new.author_id,
            keyword_ids: new.keyword_ids,
            file_ids: new.file_ids,
            created_at: now,
            updated_at: now,
        };
        s.questions.insert(id, question.clone());
        drop(s);
        self.persist();
        Ok(question)
    }

    async fn get_question(&self, id: Id) -> StoreResult<Question> {
        let s = self.state.read().unwrap();
        s.questions.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> StoreResult<Vec<Question>> {
        let s = self.state.read().unwrap();
        let mut v: Vec<Question> = s
            .questions
            .values()
            .filter(|q| filter.author_id.map_or(true, |a| q.author_id == a))
            .filter(|q| {
                filter.keyword_ids.is_empty()
                    || q.keyword_ids.iter().any(|k| filter.keyword_ids.contains(k))
            })
            .filter(|q| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |needle| matches_search(&q.title, &q.body, needle))
            })
            .cloned()
            .collect();
        order_questions(&mut v, filter.order);
        Ok(paginate(v, filter.skip, filter.take))
    }

    async fn questions_saved_by(&self, user_id: Id) -> StoreResult<Vec<Question>> {
        let s = self.state.read().unwrap();
        let user = s.users.get(&user_id).ok_or(StoreError::NotFound)?;
        Ok(user
            .saved_questions
            .iter()
            .filter_map(|id| s.questions.get(id).cloned())
            .collect())
    }

    async fn update_question(&self, id: Id, patch: QuestionPatch) -> StoreResult<Question> {
        let mut s = self.state.write().unwrap();
        let question = s.questions.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(title) = patch.title {
            question.title = title;
        }
        if let Some(body) = patch.body {
            question.body = body;
        }
        question.updated_at = Utc::now();
        let updated = question.clone();
        drop(s);
        self.persist();
        Ok(updated)
    }

    async fn set_question_keywords(&self, id: Id, keyword_ids: Vec<Id>) -> StoreResult<()> {
        let mut s = self.state.write().unwrap();
        let question = s.questions.get_mut(&id).ok_or(StoreError::NotFound)?;
        question.keyword_ids = keyword_ids;
        drop(s);
        self.persist();
        Ok(())
    }

    async fn add_question_files(&self, id: Id, file_ids: &[Id]) -> StoreResult<()> {
        let mut s = self.state.write().unwrap();
        let question = s.questions.get_mut(&id).ok_or(StoreError::NotFound)?;
        question.file_ids.extend_from_slice(file_ids);
        drop(s);
        self.persist();
        Ok(())
    }

    async fn increment_question_views(&self, id: Id) -> StoreResult<()> {
        let mut s = self.state.write().unwrap();
        let question = s.questions.get_mut(&id).ok_or(StoreError::NotFound)?;
        question.views += 1;
        drop(s);
        self.persist();
        Ok(())
    }

    async fn delete_question(&self, id: Id) -> StoreResult<Question> {
        let mut s = self.state.write().unwrap();
        let question = s.questions.remove(&id).ok_or(StoreError::NotFound)?;
        s.answers.retain(|_, a| a.question_id != id);
        drop(s);
        self.persist();
        Ok(question)
    }

    async fn count_questions(&self) -> StoreResult<usize> {
        let s = self.state.read().unwrap();
        Ok(s.questions.len())
    }
}

#[async_trait]
impl super::AnswerStore for MemStore {
    async fn create_answer(&self, new: NewAnswerRecord) -> StoreResult<Answer> {
        let mut s = self.state.write().unwrap();
        if !s.questions.contains_key(&new.question_id) || !s.users.contains_key(&new.author_id) {
            return Err(StoreError::NotFound);
        }
        let now = Utc::now();
        let id = Self::next_id(&mut s);
        let answer = Answer {
            id,
            body: new.body,
            author_id: new.author_id,
            question_id: new.question_id,
            reply_on: new.reply_on,
            rating: 0,
            file_ids: new.file_ids,
            created_at: now,
            updated_at: now,
        };
        s.answers.insert(id, answer.clone());
        drop(s);
        self.persist();
        Ok(answer)
    }

    async fn get_answer(&self, id: Id) -> StoreResult<Answer> {
        let s = self.state.read().unwrap();
        s.answers.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn answers_for_question(&self, question_id: Id) -> StoreResult<Vec<Answer>> {
        let s = self.state.read().unwrap();
        let mut v: Vec<Answer> = s
            .answers
            .values()
            .filter(|a| a.question_id == question_id)
            .cloned()
            .collect();
        // rating descending, id ascending as the deterministic tie-break
        v.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.id.cmp(&b.id)));
        Ok(v)
    }

    async fn update_answer(&self, id: Id, body: String) -> StoreResult<Answer> {
        let mut s = self.state.write().unwrap();
        let answer = s.answers.get_mut(&id).ok_or(StoreError::NotFound)?;
        answer.body = body;
        answer.updated_at = Utc::now();
        let updated = answer.clone();
        drop(s);
        self.persist();
        Ok(updated)
    }

    async fn delete_answer(&self, id: Id) -> StoreResult<Answer> {
        let mut s = self.state.write().unwrap();
        let answer = s.answers.remove(&id).ok_or(StoreError::NotFound)?;
        // detach replies pointing at the removed answer
        for a in s.answers.values_mut() {
            if a.reply_on == Some(id) {
                a.reply_on = None;
            }
        }
        drop(s);
        self.persist();
        Ok(answer)
    }
}

#[async_trait]
impl super::KeywordStore for MemStore {
    async fn resolve_keyword(&self, raw: &str) -> StoreResult<Keyword> {
        // find-or-create under one guard closes the duplicate-creation race
        let mut s = self.state.write().unwrap();
        let mut existing: Vec<&Keyword> = s.keywords.values().collect();
        existing.sort_by_key(|k| k.id);
        if let Some(hit) = existing.into_iter().find(|k| keywords::matches(&k.body, raw)) {
            return Ok(hit.clone());
        }
        let id = Self::next_id(&mut s);
        let keyword = Keyword {
            id,
            body: keywords::display_form(raw),
        };
        s.keywords.insert(id, keyword.clone());
        drop(s);
        self.persist();
        Ok(keyword)
    }

    async fn get_keyword(&self, id: Id) -> StoreResult<Keyword> {
        let s = self.state.read().unwrap();
        s.keywords.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_keywords(&self, take: Option<usize>) -> StoreResult<Vec<Keyword>> {
        let s = self.state.read().unwrap();
        let mut v: Vec<Keyword> = s.keywords.values().cloned().collect();
        v.sort_by_key(|k| k.id);
        if let Some(n) = take {
            v.truncate(n);
        }
        Ok(v)
    }
}

#[async_trait]
impl super::FileStore for MemStore {
    async fn create_file(&self, link: String) -> StoreResult<FileRecord> {
        let mut s = self.state.write().unwrap();
        let id = Self::next_id(&mut s);
        let file = FileRecord {
            id,
            link,
            created_at: Utc::now(),
        };
        s.files.insert(id, file.clone());
        drop(s);
        self.persist();
        Ok(file)
    }

    async fn get_file(&self, id: Id) -> StoreResult<FileRecord> {
        let s = self.state.read().unwrap();
        s.files.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_file_by_link(&self, link: &str) -> StoreResult<Option<FileRecord>> {
        let s = self.state.read().unwrap();
        let mut hits: Vec<&FileRecord> = s.files.values().filter(|f| f.link == link).collect();
        hits.sort_by_key(|f| f.id);
        Ok(hits.first().map(|f| (*f).clone()))
    }

    async fn delete_file(&self, id: Id) -> StoreResult<FileRecord> {
        let mut s = self.state.write().unwrap();
        let file = s.files.remove(&id).ok_or(StoreError::NotFound)?;
        drop(s);
        self.persist();
        Ok(file)
    }
}

#[async_trait]
impl super::SubscriptionStore for MemStore {
    async fn add_subscription(&self, subscriber_id: Id, subscribed_to_id: Id) -> StoreResult<bool> {
        let mut s = self.state.write().unwrap();
        if !s.users.contains_key(&subscriber_id) || !s.users.contains_key(&subscribed_to_id) {
            return Err(StoreError::NotFound);
        }
        let inserted = s.subscriptions.insert((subscriber_id, subscribed_to_id));
        drop(s);
        self.persist();
        Ok(inserted)
    }

    async fn remove_subscription(
        &self,
        subscriber_id: Id,
        subscribed_to_id: Id,
    ) -> StoreResult<bool> {
        let mut s = self.state.write().unwrap();
        let removed = s.subscriptions.remove(&(subscriber_id, subscribed_to_id));
        drop(s);
        self.persist();
        Ok(removed)
    }

    async fn subscription_ids(&self, user_id: Id) -> StoreResult<Vec<Id>> {
        let s = self.state.read().unwrap();
        Ok(s.subscriptions
            .iter()
            .filter(|(from, _)| *from == user_id)
            .map(|(_, to)| *to)
            .collect())
    }

    async fn subscriber_ids(&self, user_id: Id) -> StoreResult<Vec<Id>> {
        let s = self.state.read().unwrap();
        Ok(s.subscriptions
            .iter()
            .filter(|(_, to)| *to == user_id)
            .map(|(from, _)| *from)
            .collect())
    }
}
