//! Subscription graph and user aggregate views.

use std::sync::Arc;

use tracing::warn;

use crate::attachments::AttachmentManager;
use crate::blob::BlobStore;
use crate::error::{ServiceError, ServiceResult};
use crate::models::*;
use crate::posts::build_post_view;
use crate::questions::build_question_view;
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    attachments: AttachmentManager,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            attachments: AttachmentManager::new(store.clone(), blobs),
            store,
        }
    }

    pub async fn create(&self, new: NewUser) -> ServiceResult<User> {
        Ok(self.store.create_user(new).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(self.store.find_user_by_email(email).await?)
    }

    // ---- subscription graph --------------------------------------------

    pub async fn subscribe(&self, subscriber_id: Id, target_id: Id) -> ServiceResult<()> {
        if subscriber_id == target_id {
            return Err(ServiceError::Validation(
                "cannot subscribe to yourself".into(),
            ));
        }
        // idempotent: re-subscribing is a no-op success
        self.store.add_subscription(subscriber_id, target_id).await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, subscriber_id: Id, target_id: Id) -> ServiceResult<()> {
        self.store
            .remove_subscription(subscriber_id, target_id)
            .await?;
        Ok(())
    }

    async fn user_ref(&self, user_id: Id) -> ServiceResult<UserRef> {
        let user = self.store.get_user(user_id).await?;
        let profile = match self.store.get_profile_by_user(user_id).await {
            Ok(p) => Some(p),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(UserRef {
            id: user.id,
            firstname: user.firstname,
            lastname: user.lastname,
            registered: user.registered,
            profile,
        })
    }

    pub async fn list_subscriptions(&self, user_id: Id) -> ServiceResult<Vec<UserRef>> {
        self.store.get_user(user_id).await?;
        let mut refs = Vec::new();
        for id in self.store.subscription_ids(user_id).await? {
            refs.push(self.user_ref(id).await?);
        }
        Ok(refs)
    }

    pub async fn list_subscribers(&self, user_id: Id) -> ServiceResult<Vec<UserRef>> {
        self.store.get_user(user_id).await?;
        let mut refs = Vec::new();
        for id in self.store.subscriber_ids(user_id).await? {
            refs.push(self.user_ref(id).await?);
        }
        Ok(refs)
    }

    // ---- aggregate views ------------------------------------------------

    async fn profile_view(&self, user_id: Id) -> ServiceResult<Option<ProfileView>> {
        let profile = match self.store.get_profile_by_user(user_id).await {
            Ok(p) => p,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let avatar = match profile.avatar_id {
            Some(file_id) => Some(self.store.get_file(file_id).await?),
            None => None,
        };
        Ok(Some(ProfileView {
            id: profile.id,
            user_id: profile.user_id,
            bio: profile.bio,
            location: profile.location,
            website: profile.website,
            birthdate: profile.birthdate,
            gender: profile.gender,
            phone: profile.phone,
            avatar,
        }))
    }

    /// Full assembled profile view; the credential hash never leaves the
    /// store layer.
    pub async fn get_full(&self, user_id: Id) -> ServiceResult<UserFullView> {
        let user = self.store.get_user(user_id).await?;
        let profile = self.profile_view(user_id).await?;

        let own_filter = PostFilter {
            author_id: Some(user_id),
            ..Default::default()
        };
        let mut posts = Vec::new();
        for post in self.store.list_posts(&own_filter).await? {
            posts.push(build_post_view(self.store.as_ref(), post).await?);
        }
        let mut saved_posts = Vec::new();
        for post in self.store.posts_saved_by(user_id).await? {
            saved_posts.push(build_post_view(self.store.as_ref(), post).await?);
        }
        let mut saved_questions = Vec::new();
        for question in self.store.questions_saved_by(user_id).await? {
            saved_questions.push(build_question_view(self.store.as_ref(), question).await?);
        }
        let subscriptions = self.list_subscriptions(user_id).await?;
        let subscribers = self.list_subscribers(user_id).await?;

        Ok(UserFullView {
            id: user.id,
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
            activity: user.activity,
            registered: user.registered,
            profile,
            posts,
            saved_posts,
            saved_questions,
            subscriptions,
            subscribers,
            liked_posts: user.liked_posts.into_iter().collect(),
            liked_comments: user.liked_comments.into_iter().collect(),
            liked_questions: user.liked_questions.into_iter().collect(),
            liked_answers: user.liked_answers.into_iter().collect(),
            disliked_answers: user.disliked_answers.into_iter().collect(),
        })
    }

    /// Minimal projection for display in other users' contexts.
    pub async fn get_public_summary(&self, user_id: Id) -> ServiceResult<UserSummary> {
        let user = self.store.get_user(user_id).await?;
        let avatar = match self.profile_view(user_id).await? {
            Some(p) => p.avatar,
            None => None,
        };
        Ok(UserSummary {
            id: user.id,
            firstname: user.firstname,
            lastname: user.lastname,
            registered: user.registered,
            avatar,
            subscriptions: self.store.subscription_ids(user_id).await?.len(),
            subscribers: self.store.subscriber_ids(user_id).await?.len(),
        })
    }

    // ---- profile --------------------------------------------------------

    pub async fn create_profile(&self, new: NewProfile) -> ServiceResult<Profile> {
        Ok(self.store.create_profile(new).await?)
    }

    pub async fn get_profile(&self, user_id: Id) -> ServiceResult<Profile> {
        Ok(self.store.get_profile_by_user(user_id).await?)
    }

    pub async fn update_profile(&self, user_id: Id, patch: ProfileUpdate) -> ServiceResult<Profile> {
        Ok(self.store.update_profile(user_id, patch).await?)
    }

    /// Attaches an already-stored avatar record and detaches the previous
    /// one; a detached avatar is orphaned, so its record and blob are
    /// deleted best-effort.
    pub async fn set_avatar(&self, user_id: Id, file: FileRecord) -> ServiceResult<FileRecord> {
        let previous = match self.store.set_profile_avatar(user_id, file.id).await {
            Ok(prev) => prev,
            Err(e) => {
                // do not leave an orphaned record behind
                if let Err(cleanup) = self.attachments.delete_by_id(file.id).await {
                    warn!(file_id = file.id, error = %cleanup, "failed to clean up avatar record");
                }
                return Err(e.into());
            }
        };
        if let Some(old_id) = previous {
            if let Err(e) = self.attachments.delete_by_id(old_id).await {
                warn!(file_id = old_id, error = %e, "failed to delete replaced avatar");
            }
        }
        Ok(file)
    }
}
