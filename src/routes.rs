use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::attachments::AttachmentManager;
use crate::auth::{create_jwt, credential_digest, Auth};
use crate::blob::{BlobError, BlobStore};
use crate::error::ApiError;
use crate::models::*;
use crate::posts::{PostQuery, PostService};
use crate::questions::{QuestionQuery, QuestionService};
use crate::store::Store;
use crate::users::UserService;
use crate::votes::{VoteLedger, VoteOutcome, VoteTarget};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/auth/register").route(web::post().to(register)))
            .service(web::resource("/auth/login").route(web::post().to(login)))
            .service(
                web::resource("/articles")
                    .route(web::get().to(list_posts))
                    .route(web::post().to(create_post)),
            )
            .service(
                web::resource("/articles/make-viewed/{id}").route(web::get().to(post_viewed)),
            )
            .service(
                web::resource("/articles/favorites/{id}")
                    .route(web::post().to(save_post))
                    .route(web::delete().to(unsave_post)),
            )
            .service(web::resource("/articles/like/{id}").route(web::post().to(like_post)))
            .service(
                web::resource("/articles-length/{user_id}").route(web::get().to(post_count)),
            )
            .service(
                web::resource("/articles/{id}")
                    .route(web::get().to(get_post))
                    .route(web::put().to(update_post))
                    .route(web::delete().to(delete_post)),
            )
            .service(web::resource("/comments").route(web::post().to(create_comment)))
            .service(web::resource("/comments/like/{id}").route(web::post().to(like_comment)))
            .service(
                web::resource("/comments/{id}")
                    .route(web::get().to(user_comments))
                    .route(web::put().to(update_comment))
                    .route(web::delete().to(delete_comment)),
            )
            .service(
                web::resource("/questions")
                    .route(web::get().to(list_questions))
                    .route(web::post().to(create_question)),
            )
            .service(
                web::resource("/questions-search/{text}").route(web::get().to(search_questions)),
            )
            .service(web::resource("/questions-length").route(web::get().to(question_count)))
            .service(
                web::resource("/questions/make-viewed/{id}")
                    .route(web::get().to(question_viewed)),
            )
            .service(
                web::resource("/questions/favorites/{id}")
                    .route(web::post().to(save_question))
                    .route(web::delete().to(unsave_question)),
            )
            .service(web::resource("/questions/like/{id}").route(web::post().to(like_question)))
            .service(
                web::resource("/questions/{id}")
                    .route(web::get().to(get_question))
                    .route(web::put().to(update_question))
                    .route(web::delete().to(delete_question)),
            )
            .service(web::resource("/keywords").route(web::get().to(list_keywords)))
            .service(web::resource("/answers").route(web::post().to(create_answer)))
            .service(web::resource("/answers/up/{id}").route(web::post().to(answer_up)))
            .service(web::resource("/answers/down/{id}").route(web::post().to(answer_down)))
            .service(
                web::resource("/answers/{id}")
                    .route(web::put().to(update_answer))
                    .route(web::delete().to(delete_answer)),
            )
            .service(
                web::resource("/users/{id}/subscribe")
                    .route(web::post().to(subscribe))
                    .route(web::delete().to(unsubscribe)),
            )
            .service(
                web::resource("/users/{id}/subscriptions")
                    .route(web::get().to(list_subscriptions)),
            )
            .service(
                web::resource("/users/{id}/subscribers").route(web::get().to(list_subscribers)),
            )
            .service(web::resource("/users/{id}/summary").route(web::get().to(user_summary)))
            .service(web::resource("/users/{id}").route(web::get().to(user_full)))
            .service(
                web::resource("/profile")
                    .route(web::post().to(create_profile))
                    .route(web::put().to(update_profile)),
            )
            .service(web::resource("/profile/avatar").route(web::post().to(upload_avatar)))
            .service(web::resource("/profile/{user_id}").route(web::get().to(get_profile)))
            .service(web::resource("/files").route(web::post().to(upload_file))),
    );
    // public fetch route without the /api/v1 prefix so stored links resolve
    cfg.route("/file/{name}", web::get().to(serve_file));
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub posts: PostService,
    pub questions: QuestionService,
    pub users: UserService,
    pub votes: VoteLedger,
    pub attachments: AttachmentManager,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            posts: PostService::new(store.clone(), blobs.clone()),
            questions: QuestionService::new(store.clone(), blobs.clone()),
            users: UserService::new(store.clone(), blobs.clone()),
            votes: VoteLedger::new(store.clone()),
            attachments: AttachmentManager::new(store.clone(), blobs.clone()),
            store,
            blobs,
        }
    }
}

fn public_host() -> String {
    std::env::var("AGORA_HOST").unwrap_or_else(|_| "http://localhost:8080".into())
}

// ---------------------------------------------------------------------------
// auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub activity: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    if data.users.find_by_email(&req.email).await?.is_some() {
        return Err(ApiError::Conflict);
    }
    let user = data
        .users
        .create(NewUser {
            email: req.email,
            credential_hash: credential_digest(&req.password),
            firstname: req.firstname,
            lastname: req.lastname,
            activity: req.activity,
        })
        .await?;
    let token = create_jwt(user.id, &user.email).map_err(|_| ApiError::Internal)?;
    let summary = data.users.get_public_summary(user.id).await?;
    Ok(HttpResponse::Created().json(AuthResponse {
        token,
        user: summary,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    let user = data
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if user.credential_hash != credential_digest(&req.password) {
        return Err(ApiError::Unauthorized);
    }
    let token = create_jwt(user.id, &user.email).map_err(|_| ApiError::Internal)?;
    let summary = data.users.get_public_summary(user.id).await?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user: summary,
    }))
}

// ---------------------------------------------------------------------------
// posts ("articles")
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PostListParams {
    pub lang: Option<String>,
    pub skip: Option<usize>,
    pub order: Option<OrderField>,
    pub user_id: Option<Id>,
    pub saved: Option<bool>,
    pub search: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/articles",
    request_body = NewPost,
    responses((status = 201, description = "Post created", body = PostView))
)]
pub async fn create_post(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewPost>,
) -> Result<HttpResponse, ApiError> {
    let view = data.posts.create(payload.into_inner(), auth.actor_id()).await?;
    Ok(HttpResponse::Created().json(view))
}

#[utoipa::path(
    get,
    path = "/api/v1/articles",
    responses((status = 200, description = "List posts", body = [PostView]))
)]
pub async fn list_posts(
    data: web::Data<AppState>,
    params: web::Query<PostListParams>,
) -> Result<HttpResponse, ApiError> {
    let p = params.into_inner();
    let saved_by = match (p.saved, p.user_id) {
        (Some(true), Some(user_id)) => Some(user_id),
        _ => None,
    };
    let query = PostQuery {
        lang: p.lang,
        author_id: if saved_by.is_some() { None } else { p.user_id },
        saved_by,
        search: p.search,
        skip: p.skip,
        order: p.order,
    };
    let views = data.posts.list(query).await?;
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    get,
    path = "/api/v1/articles/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post", body = PostView),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let view = data.posts.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn post_viewed(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.posts.increment_views(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({})))
}

#[utoipa::path(
    put,
    path = "/api/v1/articles/{id}",
    request_body = PostUpdate,
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post updated", body = PostView),
        (status = 404, description = "Post not found")
    )
)]
pub async fn update_post(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<PostUpdate>,
) -> Result<HttpResponse, ApiError> {
    let view = data
        .posts
        .update(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    delete,
    path = "/api/v1/articles/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.posts.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn save_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.posts
        .add_to_favorites(auth.actor_id(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

pub async fn unsave_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.posts
        .remove_from_favorites(auth.actor_id(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

#[utoipa::path(
    post,
    path = "/api/v1/articles/like/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Like toggled", body = VoteOutcome),
        (status = 404, description = "Post not found")
    )
)]
pub async fn like_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let outcome = data
        .votes
        .toggle_like(auth.actor_id(), VoteTarget::Post(path.into_inner()))
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn post_count(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let count = data.posts.count_by_author(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(count))
}

// ---------------------------------------------------------------------------
// comments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentBody {
    pub body: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/comments",
    request_body = NewComment,
    responses(
        (status = 201, description = "Comment created", body = CommentView),
        (status = 404, description = "Post not found")
    )
)]
pub async fn create_comment(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    let view = data
        .posts
        .create_comment(payload.into_inner(), auth.actor_id())
        .await?;
    Ok(HttpResponse::Created().json(view))
}

pub async fn user_comments(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let views = data.posts.user_comments(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(views))
}

pub async fn update_comment(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CommentBody>,
) -> Result<HttpResponse, ApiError> {
    let view = data
        .posts
        .update_comment(path.into_inner(), payload.into_inner().body)
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn delete_comment(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.posts.delete_comment(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn like_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let outcome = data
        .votes
        .toggle_like(auth.actor_id(), VoteTarget::Comment(path.into_inner()))
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

// ---------------------------------------------------------------------------
// questions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub skip: Option<usize>,
    pub order: Option<OrderField>,
    pub user_id: Option<Id>,
    /// Comma-separated keyword ids, OR-matched.
    pub keywords: Option<String>,
    pub search: Option<String>,
}

fn parse_keyword_ids(raw: Option<&str>) -> Result<Vec<Id>, ApiError> {
    match raw {
        None => Ok(Vec::new()),
        Some(s) => s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                part.trim()
                    .parse::<Id>()
                    .map_err(|_| ApiError::BadRequest(format!("bad keyword id: {part}")))
            })
            .collect(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/questions",
    request_body = NewQuestion,
    responses((status = 201, description = "Question created", body = QuestionView))
)]
pub async fn create_question(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewQuestion>,
) -> Result<HttpResponse, ApiError> {
    let view = data
        .questions
        .create(payload.into_inner(), auth.actor_id())
        .await?;
    Ok(HttpResponse::Created().json(view))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions",
    responses((status = 200, description = "List questions (page of 5)", body = [QuestionView]))
)]
pub async fn list_questions(
    data: web::Data<AppState>,
    params: web::Query<QuestionListParams>,
) -> Result<HttpResponse, ApiError> {
    let p = params.into_inner();
    let query = QuestionQuery {
        author_id: p.user_id,
        keyword_ids: parse_keyword_ids(p.keywords.as_deref())?,
        search: p.search,
        skip: p.skip,
        order: p.order,
    };
    let views = data.questions.list(query).await?;
    Ok(HttpResponse::Ok().json(views))
}

pub async fn search_questions(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let views = data.questions.search(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}",
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question", body = QuestionView),
        (status = 404, description = "Question not found")
    )
)]
pub async fn get_question(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let view = data.questions.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn question_viewed(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.questions.increment_views(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({})))
}

#[utoipa::path(
    put,
    path = "/api/v1/questions/{id}",
    request_body = QuestionUpdate,
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question updated", body = QuestionView),
        (status = 404, description = "Question not found")
    )
)]
pub async fn update_question(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<QuestionUpdate>,
) -> Result<HttpResponse, ApiError> {
    let view = data
        .questions
        .update(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    delete,
    path = "/api/v1/questions/{id}",
    params(("id" = Id, Path, description = "Question id")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 404, description = "Question not found")
    )
)]
pub async fn delete_question(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.questions.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn save_question(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.questions
        .add_to_favorites(auth.actor_id(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

pub async fn unsave_question(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.questions
        .remove_from_favorites(auth.actor_id(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

pub async fn like_question(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let outcome = data
        .votes
        .toggle_like(auth.actor_id(), VoteTarget::Question(path.into_inner()))
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn question_count(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let count = data.questions.count().await?;
    Ok(HttpResponse::Ok().json(count))
}

#[derive(Debug, Deserialize)]
pub struct KeywordParams {
    pub take: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/v1/keywords",
    responses((status = 200, description = "List keywords", body = [Keyword]))
)]
pub async fn list_keywords(
    data: web::Data<AppState>,
    params: web::Query<KeywordParams>,
) -> Result<HttpResponse, ApiError> {
    let keywords = data.questions.list_keywords(params.take).await?;
    Ok(HttpResponse::Ok().json(keywords))
}

// ---------------------------------------------------------------------------
// answers
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/answers",
    request_body = NewAnswer,
    responses(
        (status = 201, description = "Answer created", body = AnswerView),
        (status = 404, description = "Question not found")
    )
)]
pub async fn create_answer(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewAnswer>,
) -> Result<HttpResponse, ApiError> {
    let view = data
        .questions
        .create_answer(payload.into_inner(), auth.actor_id())
        .await?;
    Ok(HttpResponse::Created().json(view))
}

pub async fn update_answer(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CommentBody>,
) -> Result<HttpResponse, ApiError> {
    let view = data
        .questions
        .update_answer(path.into_inner(), payload.into_inner().body)
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn delete_answer(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.questions.delete_answer(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/answers/up/{id}",
    params(("id" = Id, Path, description = "Answer id")),
    responses(
        (status = 200, description = "Upvote toggled", body = VoteOutcome),
        (status = 404, description = "Answer not found")
    )
)]
pub async fn answer_up(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let outcome = data
        .votes
        .toggle_like(auth.actor_id(), VoteTarget::Answer(path.into_inner()))
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/v1/answers/down/{id}",
    params(("id" = Id, Path, description = "Answer id")),
    responses(
        (status = 200, description = "Downvote toggled", body = VoteOutcome),
        (status = 404, description = "Answer not found")
    )
)]
pub async fn answer_down(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let outcome = data
        .votes
        .toggle_dislike(auth.actor_id(), VoteTarget::Answer(path.into_inner()))
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

// ---------------------------------------------------------------------------
// users & subscriptions
// ---------------------------------------------------------------------------

pub async fn subscribe(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.users
        .subscribe(auth.actor_id(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

pub async fn unsubscribe(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.users
        .unsubscribe(auth.actor_id(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

pub async fn list_subscriptions(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let refs = data.users.list_subscriptions(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(refs))
}

pub async fn list_subscribers(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let refs = data.users.list_subscribers(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(refs))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "Full user view", body = UserFullView),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_full(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let view = data.users.get_full(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/summary",
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "Public summary", body = UserSummary),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_summary(
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let summary = data.users.get_public_summary(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

// ---------------------------------------------------------------------------
// profile
// ---------------------------------------------------------------------------

pub async fn create_profile(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, ApiError> {
    let p = payload.into_inner();
    let profile = data
        .users
        .create_profile(NewProfile {
            user_id: auth.actor_id(),
            bio: p.bio,
            location: p.location,
            website: p.website,
            birthdate: p.birthdate,
            gender: p.gender,
            phone: p.phone,
        })
        .await?;
    Ok(HttpResponse::Created().json(profile))
}

pub async fn get_profile(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let profile = data.users.get_profile(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn update_profile(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, ApiError> {
    let profile = data
        .users
        .update_profile(auth.actor_id(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

// ---------------------------------------------------------------------------
// file upload / serving
// ---------------------------------------------------------------------------

const UPLOAD_SIZE_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

const ALLOWED_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Reads the first file field from a multipart payload, stores the blob
/// under "{stem}.{millis}.{ext}" and returns the created metadata record.
async fn store_upload(
    data: &AppState,
    mut payload: Multipart,
) -> Result<Option<FileRecord>, ApiError> {
    while let Some(field) = payload.try_next().await.map_err(|e| {
        tracing::error!(error = %e, "multipart error");
        ApiError::Internal
    })? {
        if field.content_disposition().get_filename().is_none() {
            continue;
        }
        let original = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload")
            .to_string();
        let mut field_stream = field;
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field_stream.try_next().await.map_err(|e| {
            tracing::error!(error = %e, "stream read error");
            ApiError::Internal
        })? {
            if bytes.len() + chunk.len() > UPLOAD_SIZE_LIMIT {
                return Err(ApiError::BadRequest("payload too large".into()));
            }
            bytes.extend_from_slice(&chunk);
        }
        let mime = infer::get(&bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        if !ALLOWED_MIME.contains(&mime.as_str()) {
            return Err(ApiError::BadRequest("only image files are allowed".into()));
        }
        let (stem, ext) = match original.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), ext.to_string()),
            None => (original.clone(), "bin".to_string()),
        };
        let stem: String = stem
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let name = format!("{}.{}.{}", stem, Utc::now().timestamp_millis(), ext);
        if let Err(e) = data.blobs.save(&name, &bytes).await {
            tracing::error!(error = %e, "blob save failed");
            return Err(ApiError::Internal);
        }
        let link = format!("{}/file/{}", public_host(), name);
        let record = data.attachments.create(link).await?;
        return Ok(Some(record));
    }
    Ok(None)
}

#[utoipa::path(
    post,
    path = "/api/v1/files",
    responses(
        (status = 201, description = "File stored", body = FileRecord),
        (status = 400, description = "No file or wrong format")
    )
)]
pub async fn upload_file(
    _auth: Auth,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    match store_upload(&data, payload).await? {
        Some(record) => Ok(HttpResponse::Created().json(record)),
        None => Err(ApiError::BadRequest("no file provided".into())),
    }
}

pub async fn upload_avatar(
    auth: Auth,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let record = match store_upload(&data, payload).await? {
        Some(record) => record,
        None => return Err(ApiError::BadRequest("no file provided".into())),
    };
    let file = data.users.set_avatar(auth.actor_id(), record).await?;
    Ok(HttpResponse::Created().json(file))
}

pub async fn serve_file(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    match data.blobs.load(&name).await {
        Ok(bytes) => {
            let mime = infer::get(&bytes)
                .map(|t| t.mime_type().to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            Ok(HttpResponse::Ok()
                .insert_header(("Content-Type", mime))
                .body(bytes))
        }
        Err(BlobError::NotFound) => Err(ApiError::NotFound),
        Err(e) => {
            tracing::error!(error = %e, "blob load failed");
            Err(ApiError::Internal)
        }
    }
}
