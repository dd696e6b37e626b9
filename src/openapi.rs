use crate::models::{
    AnswerView, CommentView, FileRecord, Keyword, NewAnswer, NewComment, NewPost, NewQuestion,
    PostUpdate, PostView, QuestionUpdate, QuestionView, UserFullView, UserSummary,
};
use crate::votes::VoteOutcome;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::register,
        crate::routes::login,
        crate::routes::create_post,
        crate::routes::list_posts,
        crate::routes::get_post,
        crate::routes::update_post,
        crate::routes::delete_post,
        crate::routes::like_post,
        crate::routes::create_comment,
        crate::routes::create_question,
        crate::routes::list_questions,
        crate::routes::get_question,
        crate::routes::update_question,
        crate::routes::delete_question,
        crate::routes::list_keywords,
        crate::routes::create_answer,
        crate::routes::answer_up,
        crate::routes::answer_down,
        crate::routes::user_full,
        crate::routes::user_summary,
        crate::routes::upload_file,
    ),
    components(schemas(
        PostView, NewPost, PostUpdate, CommentView, NewComment,
        QuestionView, NewQuestion, QuestionUpdate, AnswerView, NewAnswer,
        Keyword, FileRecord, VoteOutcome, UserFullView, UserSummary,
        crate::routes::RegisterRequest, crate::routes::LoginRequest,
        crate::routes::AuthResponse, crate::routes::CommentBody
    )),
    tags(
        (name = "posts", description = "Post and comment operations"),
        (name = "questions", description = "Question and answer operations"),
        (name = "users", description = "User, profile and subscription operations"),
    )
)]
pub struct ApiDoc;
