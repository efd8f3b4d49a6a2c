use crate::helper::public_helpers;
use crate::helper::workflow_helpers;
use crate::middleware::{AuthenticatedUser, SESSION_USERNAME_KEY};
use crate::models::ApiResponse;
use crate::routes::{error_response, run_blocking};
use crate::DbPool;
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// What the front end needs to know about the signed-in user.
#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub roles: Vec<String>,
    pub level: u8,
    pub can_see_approval_actions: bool,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/login", web::post().to(handle_login))
            .route("/logout", web::post().to(handle_logout))
            .route("/me", web::get().to(current_user)),
    );
}

async fn handle_login(
    session: Session,
    pool: web::Data<DbPool>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    let LoginRequest { username, password } = body.into_inner();
    let username = username.trim().to_string();

    let verified = {
        let username = username.clone();
        web::block(move || public_helpers::verify_user_credentials(&pool, &username, &password))
            .await
    };

    match verified {
        Ok(Some(user)) => {
            session.renew();
            if let Err(e) = session.insert(SESSION_USERNAME_KEY, &user.username) {
                log::error!("Failed to write session for '{}': {}", user.username, e);
                return HttpResponse::InternalServerError()
                    .json(ApiResponse::<()>::failure("Could not start a session."));
            }
            log::info!("User '{}' logged in", user.username);
            HttpResponse::Ok().json(ApiResponse::ok_with_message("Logged in.", user))
        }
        Ok(None) => {
            log::warn!("Failed login attempt for '{}'", username);
            HttpResponse::Unauthorized()
                .json(ApiResponse::<()>::failure("Invalid username or password."))
        }
        Err(e) => {
            log::error!("Login check failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::failure("Internal server error."))
        }
    }
}

async fn handle_logout(session: Session, user: AuthenticatedUser) -> impl Responder {
    session.purge();
    log::info!("User '{}' logged out", user.username);
    HttpResponse::Ok().json(ApiResponse::<()> {
        success: true,
        message: Some("Logged out.".to_string()),
        data: None,
        error: None,
    })
}

async fn current_user(user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    let result = run_blocking(move || workflow_helpers::load_actor(&pool, &user.username)).await;
    match result {
        Ok(actor) => HttpResponse::Ok().json(ApiResponse::ok(CurrentUser {
            id: actor.id,
            level: actor.effective_level(),
            can_see_approval_actions: actor.can_see_approval_actions(),
            roles: actor.roles.names(),
            username: actor.username,
        })),
        Err(e) => error_response("Loading current user", e),
    }
}
