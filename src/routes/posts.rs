use crate::helper::workflow_helpers;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::routes::{error_response, run_blocking};
use crate::workflow::PostStatus;
use crate::DbPool;
use actix_web::{web, HttpResponse, Responder};
use redb::Database;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct CreatePostRequest {
    title: String,
    content: String,
    status: Option<String>,
}

#[derive(Deserialize)]
struct UpdatePostRequest {
    title: String,
    content: String,
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

/// Body of a successful transition: the status the post is now in.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionResult {
    pub status: PostStatus,
}

pub fn config_posts(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/posts")
            .route("", web::post().to(create_post))
            .route("", web::get().to(list_posts))
            .route("/{post_id}", web::get().to(get_post))
            .route("/{post_id}", web::put().to(update_post))
            .route("/{post_id}/actions", web::get().to(get_actions))
            .route("/{post_id}/history", web::get().to(get_history))
            .route("/{post_id}/{action}", web::post().to(run_action)),
    );
}

async fn create_post(
    user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    body: web::Json<CreatePostRequest>,
) -> impl Responder {
    let body = body.into_inner();
    let result = run_blocking(move || {
        let actor = workflow_helpers::load_actor(&pool, &user.username)?;
        let requested = workflow_helpers::parse_status(body.status.as_deref())?;
        workflow_helpers::create_post(&db, &actor, &body.title, &body.content, requested)
    })
    .await;

    match result {
        Ok(view) => {
            HttpResponse::Created().json(ApiResponse::ok_with_message("Post created.", view))
        }
        Err(e) => error_response("Creating post", e),
    }
}

async fn list_posts(
    user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let query = query.into_inner();
    let (limit, offset) = workflow_helpers::page_window(query.page, query.limit);
    let result = run_blocking(move || {
        let actor = workflow_helpers::load_actor(&pool, &user.username)?;
        let status = workflow_helpers::parse_status(query.status.as_deref())?;
        workflow_helpers::list_posts(&db, &actor, status, limit, offset)
    })
    .await;

    match result {
        Ok(posts) => HttpResponse::Ok().json(ApiResponse::ok(posts)),
        Err(e) => error_response("Listing posts", e),
    }
}

async fn get_post(
    user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    post_id: web::Path<String>,
) -> impl Responder {
    let post_id = post_id.into_inner();
    let result = run_blocking(move || {
        let actor = workflow_helpers::load_actor(&pool, &user.username)?;
        workflow_helpers::get_post_view(&db, &actor, &post_id)
    })
    .await;

    match result {
        Ok(view) => HttpResponse::Ok().json(ApiResponse::ok(view)),
        Err(e) => error_response("Reading post", e),
    }
}

async fn update_post(
    user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    post_id: web::Path<String>,
    body: web::Json<UpdatePostRequest>,
) -> impl Responder {
    let post_id = post_id.into_inner();
    let body = body.into_inner();
    let result = run_blocking(move || {
        let actor = workflow_helpers::load_actor(&pool, &user.username)?;
        workflow_helpers::update_post(&db, &actor, &post_id, &body.title, &body.content)
    })
    .await;

    match result {
        Ok(metadata) => {
            HttpResponse::Ok().json(ApiResponse::ok_with_message("Post updated.", metadata))
        }
        Err(e) => error_response("Updating post", e),
    }
}

async fn get_actions(
    user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    post_id: web::Path<String>,
) -> impl Responder {
    let post_id = post_id.into_inner();
    let result = run_blocking(move || {
        let actor = workflow_helpers::load_actor(&pool, &user.username)?;
        workflow_helpers::get_available_actions(&db, &actor, &post_id)
    })
    .await;

    match result {
        Ok(actions) => HttpResponse::Ok().json(ApiResponse::ok(actions)),
        Err(e) => error_response("Listing actions", e),
    }
}

async fn get_history(
    user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    post_id: web::Path<String>,
) -> impl Responder {
    let post_id = post_id.into_inner();
    let result = run_blocking(move || {
        let actor = workflow_helpers::load_actor(&pool, &user.username)?;
        workflow_helpers::history(&db, &actor, &post_id)
    })
    .await;

    match result {
        Ok(entries) => HttpResponse::Ok().json(ApiResponse::ok(entries)),
        Err(e) => error_response("Reading history", e),
    }
}

async fn run_action(
    user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (post_id, action) = path.into_inner();
    let action = match workflow_helpers::parse_action(&action) {
        Ok(action) => action,
        Err(e) => return error_response("Parsing action", e),
    };

    let result = run_blocking(move || {
        let actor = workflow_helpers::load_actor(&pool, &user.username)?;
        workflow_helpers::perform_transition(&db, &actor, &post_id, action)
    })
    .await;

    match result {
        Ok(entry) => HttpResponse::Ok().json(ApiResponse::ok_with_message(
            action.success_message(),
            TransitionResult { status: entry.to },
        )),
        Err(e) => error_response("Running workflow action", e),
    }
}
