use std::sync::Arc;

use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, ResponseError, Result};

use crate::config::Config;
use crate::display::{grid_to_csv_string, GridView};
use crate::error::{PlacementError, ScheduleError};
use crate::form::{
    BulkDeleteRequest, ClearRequest, GenerateAllRequest, GenerateRequest, GridQuery, LoginRequest,
    ManualAddRequest, MoveRequest,
};
use crate::service::ScheduleService;

const SESSION_USER: &str = "admin_user";

pub struct AppState {
    pub service: Arc<ScheduleService>,
    pub admin_username: String,
    pub admin_password: String,
}

impl ResponseError for ScheduleError {
    fn status_code(&self) -> StatusCode {
        match self {
            ScheduleError::Validation(_) => StatusCode::BAD_REQUEST,
            ScheduleError::NotFound(_) => StatusCode::NOT_FOUND,
            ScheduleError::Placement { source, .. } if source.is_conflict() => StatusCode::CONFLICT,
            ScheduleError::Placement { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ScheduleError::Generator(_) => StatusCode::BAD_GATEWAY,
            ScheduleError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Storage details stay in the server log
        let message = match self {
            ScheduleError::Persistence(e) => {
                log::error!("Storage failure: {}", e);
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = serde_json::json!({
            "success": false,
            "code": self.code(),
            "message": message,
        });
        if let ScheduleError::Placement {
            key,
            source: PlacementError::SlotConflict { conflicting, day, period },
        } = self
        {
            body["details"] = serde_json::json!({
                "conflicting_slot": conflicting,
                "day": day,
                "period": period,
                "grid": key,
            });
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

fn unauthorized(message: &str) -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "success": false,
        "code": "unauthorized",
        "message": message,
    }))
}

/// Username of the logged-in admin, or the 401 response to send back
fn require_admin(session: &Session) -> Result<String, HttpResponse> {
    match session.get::<String>(SESSION_USER) {
        Ok(Some(username)) => Ok(username),
        Ok(None) => Err(unauthorized("Login required")),
        Err(e) => {
            log::warn!("Unreadable session: {}", e);
            Err(unauthorized("Login required"))
        }
    }
}

// Admin login endpoint
async fn login(
    req: web::Json<LoginRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if req.username == state.admin_username && req.password == state.admin_password {
        session.renew();
        session.insert(SESSION_USER, &req.username)?;
        log::info!("Admin {} logged in", req.username);
        Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "username": req.username})))
    } else {
        log::warn!("Failed login attempt for {}", req.username);
        Ok(unauthorized("Invalid username or password"))
    }
}

async fn logout(session: Session) -> Result<HttpResponse> {
    session.purge();
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

async fn view_grid(query: web::Query<GridQuery>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let key = query.grid_key().map_err(ScheduleError::Validation)?;
    let grid = state.service.view(&query.term, &key).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "grid": GridView::from_grid(&grid),
    })))
}

async fn export_grid(query: web::Query<GridQuery>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let key = query.grid_key().map_err(ScheduleError::Validation)?;
    let grid = state.service.view(&query.term, &key).await?;
    let csv = grid_to_csv_string(&grid).map_err(|e| {
        log::error!("Failed to render grid CSV: {}", e);
        actix_web::error::ErrorInternalServerError("Failed to render CSV")
    })?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(("Content-Disposition", "attachment; filename=\"schedule.csv\""))
        .body(csv))
}

async fn manual_add(
    req: web::Json<ManualAddRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = match require_admin(&session) {
        Ok(actor) => actor,
        Err(resp) => return Ok(resp),
    };
    let slot = state.service.manual_add(req.into_inner(), &actor).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "slot": slot})))
}

async fn move_slot(
    req: web::Json<MoveRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = match require_admin(&session) {
        Ok(actor) => actor,
        Err(resp) => return Ok(resp),
    };
    let slot = state.service.move_slot(req.into_inner(), &actor).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "slot": slot})))
}

async fn bulk_delete(
    req: web::Json<BulkDeleteRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = match require_admin(&session) {
        Ok(actor) => actor,
        Err(resp) => return Ok(resp),
    };
    let report = state.service.bulk_delete(req.into_inner(), &actor).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "succeeded": report.succeeded,
        "not_found": report.not_found,
        "not_found_ids": report.not_found_ids,
        "failed": report.failed,
        "failures": report.failures,
    })))
}

async fn clear(
    req: web::Json<ClearRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = match require_admin(&session) {
        Ok(actor) => actor,
        Err(resp) => return Ok(resp),
    };
    let scope = req.scope().map_err(ScheduleError::Validation)?;
    let report = state.service.clear(scope, &actor).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "succeeded": report.succeeded,
        "failed": report.failed,
        "failures": report.failures,
    })))
}

async fn generate(
    req: web::Json<GenerateRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = match require_admin(&session) {
        Ok(actor) => actor,
        Err(resp) => return Ok(resp),
    };
    let outcome = state.service.generate_for_class(req.into_inner(), &actor).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "result": outcome})))
}

async fn generate_all(
    req: web::Json<GenerateAllRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = match require_admin(&session) {
        Ok(actor) => actor,
        Err(resp) => return Ok(resp),
    };
    let report = state.service.generate_all(&req.term, &actor).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "result": report})))
}

/// Registers every API route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/login", web::post().to(login))
        .route("/api/logout", web::post().to(logout))
        .route("/api/schedule", web::get().to(view_grid))
        .route("/api/schedule/export", web::get().to(export_grid))
        .route("/api/schedule/manual-add", web::post().to(manual_add))
        .route("/api/schedule/move", web::post().to(move_slot))
        .route("/api/schedule/bulk-delete", web::delete().to(bulk_delete))
        .route("/api/schedule/clear", web::delete().to(clear))
        .route("/api/schedule/generate", web::post().to(generate))
        .route("/api/schedule/generate-all", web::post().to(generate_all));
}

/// Cookie-backed admin session
pub fn session_middleware(key: Key, secure: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_secure(secure)
        .build()
}

pub async fn start_server(config: &Config, service: Arc<ScheduleService>) -> std::io::Result<()> {
    let key = match &config.session_key {
        Some(bytes) => Key::try_from(bytes.as_slice())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?,
        None => {
            log::warn!("SESSION_KEY not set, admin sessions end when the server restarts");
            Key::generate()
        }
    };
    let secure = config.secure_cookies;

    let app_state = web::Data::new(AppState {
        service,
        admin_username: config.admin_username.clone(),
        admin_password: config.admin_password.clone(),
    });

    log::info!("Listening on {}:{}", config.bind_addr, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(session_middleware(key.clone(), secure))
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
