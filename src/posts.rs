//! Post aggregate service: post CRUD, threaded comments, favorites.

use std::sync::Arc;

use crate::attachments::AttachmentManager;
use crate::blob::BlobStore;
use crate::error::ServiceResult;
use crate::keywords::KeywordRegistry;
use crate::models::*;
use crate::store::Store;
use crate::votes::SaveTarget;

/// Query shape accepted by `list`.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub lang: Option<String>,
    pub author_id: Option<Id>,
    /// When set, returns the user's saved posts instead of a filtered scan.
    pub saved_by: Option<Id>,
    pub search: Option<String>,
    pub skip: Option<usize>,
    pub order: Option<OrderField>,
}

pub(crate) async fn build_comment_view(
    store: &dyn Store,
    comment: Comment,
) -> ServiceResult<CommentView> {
    let author = store.get_user(comment.author_id).await?;
    let reply_on = match comment.reply_on {
        Some(parent_id) => {
            let parent = store.get_comment(parent_id).await?;
            let parent_author = store.get_user(parent.author_id).await?;
            Some(CommentRef {
                id: parent.id,
                body: parent.body,
                author: AuthorInfo::from(&parent_author),
            })
        }
        None => None,
    };
    Ok(CommentView {
        id: comment.id,
        body: comment.body,
        rating: comment.rating,
        post_id: comment.post_id,
        author: AuthorInfo::from(&author),
        reply_on,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
    })
}

/// The fixed join shape of a post read: author subset, keywords, files and
/// the comment thread with reply parents expanded one level.
pub(crate) async fn build_post_view(store: &dyn Store, post: Post) -> ServiceResult<PostView> {
    let author = store.get_user(post.author_id).await?;
    let mut keywords = Vec::with_capacity(post.keyword_ids.len());
    for id in &post.keyword_ids {
        keywords.push(store.get_keyword(*id).await?);
    }
    let mut files = Vec::with_capacity(post.file_ids.len());
    for id in &post.file_ids {
        files.push(store.get_file(*id).await?);
    }
    let mut comments = Vec::new();
    for comment in store.comments_for_post(post.id).await? {
        comments.push(build_comment_view(store, comment).await?);
    }
    Ok(PostView {
        id: post.id,
        title: post.title,
        body: post.body,
        lang: post.lang,
        rating: post.rating,
        views: post.views,
        author: AuthorInfo::from(&author),
        keywords,
        files,
        comments,
        created_at: post.created_at,
        updated_at: post.updated_at,
    })
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn Store>,
    keywords: KeywordRegistry,
    attachments: AttachmentManager,
}

impl PostService {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            keywords: KeywordRegistry::new(store.clone()),
            attachments: AttachmentManager::new(store.clone(), blobs),
            store,
        }
    }

    pub async fn create(&self, input: NewPost, author_id: Id) -> ServiceResult<PostView> {
        let keyword_ids = self.keywords.resolve_all(&input.keywords).await?;
        let file_ids = self.attachments.create_all(input.images).await?;
        let post = self
            .store
            .create_post(NewPostRecord {
                title: input.title,
                body: input.body,
                lang: input.lang,
                author_id,
                keyword_ids,
                file_ids,
            })
            .await?;
        // return the freshly re-read aggregate
        self.get(post.id).await
    }

    pub async fn get(&self, id: Id) -> ServiceResult<PostView> {
        let post = self.store.get_post(id).await?;
        build_post_view(self.store.as_ref(), post).await
    }

    pub async fn list(&self, query: PostQuery) -> ServiceResult<Vec<PostView>> {
        let posts = match query.saved_by {
            Some(user_id) => self.store.posts_saved_by(user_id).await?,
            None => {
                let filter = PostFilter {
                    lang: query.lang,
                    author_id: query.author_id,
                    search: query.search,
                    skip: query.skip,
                    take: None,
                    order: query.order.unwrap_or_default(),
                };
                self.store.list_posts(&filter).await?
            }
        };
        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            views.push(build_post_view(self.store.as_ref(), post).await?);
        }
        Ok(views)
    }

    pub async fn update(&self, id: Id, patch: PostUpdate) -> ServiceResult<PostView> {
        self.store.get_post(id).await?;
        if let Some(words) = &patch.keywords {
            // full replace: drop every existing link, then re-resolve
            self.store.set_post_keywords(id, Vec::new()).await?;
            let keyword_ids = self.keywords.resolve_all(words).await?;
            self.store.set_post_keywords(id, keyword_ids).await?;
        }
        if !patch.images.is_empty() {
            // new uploads extend the file set, they never replace it
            let file_ids = self.attachments.create_all(patch.images.clone()).await?;
            self.store.add_post_files(id, &file_ids).await?;
        }
        self.store
            .update_post(
                id,
                PostPatch {
                    title: patch.title,
                    body: patch.body,
                    lang: patch.lang,
                },
            )
            .await?;
        self.get(id).await
    }

    pub async fn increment_views(&self, id: Id) -> ServiceResult<()> {
        Ok(self.store.increment_post_views(id).await?)
    }

    /// Deletes the post, its explicitly attached files, every inline `<img>`
    /// reference in its body, and (cascade) its comments with their files.
    pub async fn delete(&self, id: Id) -> ServiceResult<Post> {
        let post = self.store.get_post(id).await?;
        for comment in self.store.comments_for_post(id).await? {
            self.attachments
                .purge_content_files(&comment.file_ids, None)
                .await;
        }
        self.attachments
            .purge_content_files(&post.file_ids, Some(&post.body))
            .await;
        Ok(self.store.delete_post(id).await?)
    }

    pub async fn count_by_author(&self, author_id: Id) -> ServiceResult<usize> {
        Ok(self.store.count_posts_by_author(author_id).await?)
    }

    pub async fn add_to_favorites(&self, user_id: Id, post_id: Id) -> ServiceResult<()> {
        Ok(self
            .store
            .set_saved(user_id, SaveTarget::Post(post_id), true)
            .await?)
    }

    pub async fn remove_from_favorites(&self, user_id: Id, post_id: Id) -> ServiceResult<()> {
        Ok(self
            .store
            .set_saved(user_id, SaveTarget::Post(post_id), false)
            .await?)
    }

    // ---- comments -------------------------------------------------------

    pub async fn create_comment(
        &self,
        input: NewComment,
        author_id: Id,
    ) -> ServiceResult<CommentView> {
        let comment = self
            .store
            .create_comment(NewCommentRecord {
                body: input.body,
                author_id,
                post_id: input.post_id,
                reply_on: input.reply_on,
                file_ids: Vec::new(),
            })
            .await?;
        build_comment_view(self.store.as_ref(), comment).await
    }

    pub async fn user_comments(&self, user_id: Id) -> ServiceResult<Vec<CommentView>> {
        let comments = self.store.comments_by_author(user_id).await?;
        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            views.push(build_comment_view(self.store.as_ref(), comment).await?);
        }
        Ok(views)
    }

    pub async fn update_comment(&self, id: Id, body: String) -> ServiceResult<CommentView> {
        let comment = self.store.update_comment(id, body).await?;
        build_comment_view(self.store.as_ref(), comment).await
    }

    pub async fn delete_comment(&self, id: Id) -> ServiceResult<Comment> {
        let comment = self.store.get_comment(id).await?;
        self.attachments
            .purge_content_files(&comment.file_ids, None)
            .await;
        Ok(self.store.delete_comment(id).await?)
    }
}
