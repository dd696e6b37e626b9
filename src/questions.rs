//! Question aggregate service: question CRUD, ranked answers, favorites.

use std::sync::Arc;

use crate::attachments::AttachmentManager;
use crate::blob::BlobStore;
use crate::error::ServiceResult;
use crate::keywords::KeywordRegistry;
use crate::models::*;
use crate::store::Store;
use crate::votes::SaveTarget;

/// Fixed page size for question listings.
pub const QUESTION_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub author_id: Option<Id>,
    /// OR-matched; empty means no keyword filter.
    pub keyword_ids: Vec<Id>,
    pub search: Option<String>,
    pub skip: Option<usize>,
    pub order: Option<OrderField>,
}

pub(crate) async fn build_answer_view(store: &dyn Store, answer: Answer) -> ServiceResult<AnswerView> {
    let author = store.get_user(answer.author_id).await?;
    let mut files = Vec::with_capacity(answer.file_ids.len());
    for id in &answer.file_ids {
        files.push(store.get_file(*id).await?);
    }
    Ok(AnswerView {
        id: answer.id,
        body: answer.body,
        rating: answer.rating,
        question_id: answer.question_id,
        reply_on: answer.reply_on,
        author: AuthorInfo::from(&author),
        files,
        created_at: answer.created_at,
        updated_at: answer.updated_at,
    })
}

/// Fixed join shape of a question read: author subset, keywords, files,
/// answers ordered rating descending / id ascending, saved-by as bare ids.
pub(crate) async fn build_question_view(
    store: &dyn Store,
    question: Question,
) -> ServiceResult<QuestionView> {
    let author = store.get_user(question.author_id).await?;
    let mut keywords = Vec::with_capacity(question.keyword_ids.len());
    for id in &question.keyword_ids {
        keywords.push(store.get_keyword(*id).await?);
    }
    let mut files = Vec::with_capacity(question.file_ids.len());
    for id in &question.file_ids {
        files.push(store.get_file(*id).await?);
    }
    let mut answers = Vec::new();
    for answer in store.answers_for_question(question.id).await? {
        answers.push(build_answer_view(store, answer).await?);
    }
    let saved_by = store.users_who_saved_question(question.id).await?;
    Ok(QuestionView {
        id: question.id,
        title: question.title,
        body: question.body,
        rating: question.rating,
        views: question.views,
        author: AuthorInfo::from(&author),
        keywords,
        files,
        answers,
        saved_by,
        created_at: question.created_at,
        updated_at: question.updated_at,
    })
}

#[derive(Clone)]
pub struct QuestionService {
    store: Arc<dyn Store>,
    keywords: KeywordRegistry,
    attachments: AttachmentManager,
}

impl QuestionService {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            keywords: KeywordRegistry::new(store.clone()),
            attachments: AttachmentManager::new(store.clone(), blobs),
            store,
        }
    }

    pub async fn create(&self, input: NewQuestion, author_id: Id) -> ServiceResult<QuestionView> {
        let keyword_ids = self.keywords.resolve_all(&input.keywords).await?;
        let file_ids = self.attachments.create_all(input.images).await?;
        let question = self
            .store
            .create_question(NewQuestionRecord {
                title: input.title,
                body: input.body,
                author_id,
                keyword_ids,
                file_ids,
            })
            .await?;
        self.get(question.id).await
    }

    pub async fn get(&self, id: Id) -> ServiceResult<QuestionView> {
        let question = self.store.get_question(id).await?;
        build_question_view(self.store.as_ref(), question).await
    }

    pub async fn list(&self, query: QuestionQuery) -> ServiceResult<Vec<QuestionView>> {
        let filter = QuestionFilter {
            author_id: query.author_id,
            keyword_ids: query.keyword_ids,
            search: query.search,
            skip: query.skip,
            take: Some(QUESTION_PAGE_SIZE),
            order: query.order.unwrap_or_default(),
        };
        let questions = self.store.list_questions(&filter).await?;
        let mut views = Vec::with_capacity(questions.len());
        for question in questions {
            views.push(build_question_view(self.store.as_ref(), question).await?);
        }
        Ok(views)
    }

    pub async fn search(&self, text: &str) -> ServiceResult<Vec<QuestionView>> {
        self.list(QuestionQuery {
            search: Some(text.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn update(&self, id: Id, patch: QuestionUpdate) -> ServiceResult<QuestionView> {
        self.store.get_question(id).await?;
        if let Some(words) = &patch.keywords {
            self.store.set_question_keywords(id, Vec::new()).await?;
            let keyword_ids = self.keywords.resolve_all(words).await?;
            self.store.set_question_keywords(id, keyword_ids).await?;
        }
        if !patch.images.is_empty() {
            let file_ids = self.attachments.create_all(patch.images.clone()).await?;
            self.store.add_question_files(id, &file_ids).await?;
        }
        self.store
            .update_question(
                id,
                QuestionPatch {
                    title: patch.title,
                    body: patch.body,
                },
            )
            .await?;
        self.get(id).await
    }

    pub async fn increment_views(&self, id: Id) -> ServiceResult<()> {
        Ok(self.store.increment_question_views(id).await?)
    }

    /// Deletes the question, its files, and (cascade) its answers together
    /// with their files. File deletions are best-effort.
    pub async fn delete(&self, id: Id) -> ServiceResult<Question> {
        let question = self.store.get_question(id).await?;
        for answer in self.store.answers_for_question(id).await? {
            self.attachments
                .purge_content_files(&answer.file_ids, None)
                .await;
        }
        self.attachments
            .purge_content_files(&question.file_ids, None)
            .await;
        Ok(self.store.delete_question(id).await?)
    }

    pub async fn count(&self) -> ServiceResult<usize> {
        Ok(self.store.count_questions().await?)
    }

    pub async fn list_keywords(&self, take: Option<usize>) -> ServiceResult<Vec<Keyword>> {
        self.keywords.list(take).await
    }

    pub async fn add_to_favorites(&self, user_id: Id, question_id: Id) -> ServiceResult<()> {
        Ok(self
            .store
            .set_saved(user_id, SaveTarget::Question(question_id), true)
            .await?)
    }

    pub async fn remove_from_favorites(&self, user_id: Id, question_id: Id) -> ServiceResult<()> {
        Ok(self
            .store
            .set_saved(user_id, SaveTarget::Question(question_id), false)
            .await?)
    }

    // ---- answers --------------------------------------------------------

    pub async fn create_answer(&self, input: NewAnswer, author_id: Id) -> ServiceResult<AnswerView> {
        let file_ids = self.attachments.create_all(input.images).await?;
        let answer = self
            .store
            .create_answer(NewAnswerRecord {
                body: input.body,
                author_id,
                question_id: input.question_id,
                reply_on: input.reply_on,
                file_ids,
            })
            .await?;
        build_answer_view(self.store.as_ref(), answer).await
    }

    pub async fn update_answer(&self, id: Id, body: String) -> ServiceResult<AnswerView> {
        let answer = self.store.update_answer(id, body).await?;
        build_answer_view(self.store.as_ref(), answer).await
    }

    pub async fn delete_answer(&self, id: Id) -> ServiceResult<Answer> {
        let answer = self.store.get_answer(id).await?;
        self.attachments
            .purge_content_files(&answer.file_ids, None)
            .await;
        Ok(self.store.delete_answer(id).await?)
    }
}
