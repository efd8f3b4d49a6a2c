use crate::helper::public_helpers;
use crate::models::db_operations::posts_db_operations::DbError;
use crate::models::ApiResponse;
use actix_web::{web, HttpResponse, Responder};
use redb::Database;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ApiQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/is_server_active", web::get().to(is_server_active))
            .route("/public/posts", web::get().to(get_latest_posts))
            .route("/public/posts/{id}", web::get().to(get_post_by_id)),
    );
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

async fn get_post_by_id(id: web::Path<String>, db: web::Data<Database>) -> impl Responder {
    let id = id.into_inner();
    let lookup = web::block(move || public_helpers::fetch_published_post(&db, &id)).await;
    match lookup {
        Ok(Ok(Some(post))) => HttpResponse::Ok().json(ApiResponse::ok(post)),
        // A malformed id can't name a published post either.
        Ok(Ok(None)) | Ok(Err(DbError::Uuid(_))) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::failure("Post not found"))
        }
        Ok(Err(e)) => {
            log::error!("Failed to fetch published post: {}", e);
            HttpResponse::InternalServerError().finish()
        }
        Err(e) => {
            log::error!("Blocking task failed while fetching post: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn get_latest_posts(db: web::Data<Database>, query: web::Query<ApiQuery>) -> impl Responder {
    let limit = query.limit.unwrap_or(10).min(100);
    let offset = query.offset.unwrap_or(0);

    let posts =
        web::block(move || public_helpers::fetch_latest_published_posts(&db, limit, offset)).await;
    match posts {
        Ok(Ok(posts)) => HttpResponse::Ok().json(ApiResponse::ok(posts)),
        Ok(Err(e)) => {
            log::error!("Failed to fetch latest posts: {}", e);
            HttpResponse::InternalServerError().finish()
        }
        Err(e) => {
            log::error!("Blocking task failed while listing posts: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
