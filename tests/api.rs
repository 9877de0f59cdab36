use std::sync::Arc;

use actix_web::cookie::{Cookie, Key};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use timetable_grid::audit::LogAuditSink;
use timetable_grid::catalog::{Catalog, Subject};
use timetable_grid::generator::UnconfiguredGenerator;
use timetable_grid::store::MemoryStore;
use timetable_grid::web::{configure, session_middleware, AppState};
use timetable_grid::ScheduleService;

fn state() -> web::Data<AppState> {
    let catalog = Arc::new(
        Catalog::new()
            .with_subject(Subject {
                id: "S1".to_string(),
                code: "MATH101".to_string(),
                name: "Mathematics".to_string(),
                theory_hours: 1,
                practice_hours: 1,
                default_teacher_id: None,
                default_room_id: None,
            })
            .with_class_level("1/1", "Science"),
    );
    let service = ScheduleService::new(
        Arc::new(MemoryStore::new()),
        catalog.clone(),
        catalog,
        Arc::new(UnconfiguredGenerator),
        Arc::new(LogAuditSink),
    );
    web::Data::new(AppState {
        service: Arc::new(service),
        admin_username: "admin".to_string(),
        admin_password: "secret".to_string(),
    })
}

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(state())
                .wrap(session_middleware(Key::generate(), false))
                .configure(configure),
        )
        .await
    };
}

fn manual_add_body(start: u8) -> Value {
    json!({
        "term": "1/2569",
        "day": "monday",
        "subject_id": "S1",
        "class_level": "1/1",
        "start_period": start
    })
}

#[actix_web::test]
async fn mutations_require_login() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/schedule/manual-add")
        .set_json(manual_add_body(2))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({"username": "admin", "password": "wrong"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn logged_in_admin_can_place_and_view() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({"username": "admin", "password": "secret"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie: Cookie<'static> = resp
        .response()
        .cookies()
        .next()
        .map(|c| c.into_owned())
        .expect("session cookie");

    let req = test::TestRequest::post()
        .uri("/api/schedule/manual-add")
        .cookie(cookie.clone())
        .set_json(manual_add_body(2))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["slot"]["duration"], 2);

    let req = test::TestRequest::post()
        .uri("/api/schedule/manual-add")
        .cookie(cookie.clone())
        .set_json(manual_add_body(3))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "placement_conflict");
    assert_eq!(body["details"]["period"], 3);

    let req = test::TestRequest::post()
        .uri("/api/schedule/manual-add")
        .cookie(cookie.clone())
        .set_json(manual_add_body(5))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::get()
        .uri("/api/schedule?term=1/2569&class_level=1/1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let monday = &body["grid"]["days"][0]["cells"];
    assert_eq!(monday[2]["kind"], "slot");
    assert_eq!(monday[3]["kind"], "continuation");
    assert_eq!(monday[5]["kind"], "lunch");

    let req = test::TestRequest::get()
        .uri("/api/schedule/export?term=1/2569&class_level=1/1")
        .to_request();
    let csv = test::call_and_read_body(&app, req).await;
    let csv = String::from_utf8(csv.to_vec()).unwrap();
    assert!(csv.contains("Monday,-,MATH101 Mathematics,,-,LUNCH"));
}

#[actix_web::test]
async fn error_statuses_follow_the_taxonomy() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({"username": "admin", "password": "secret"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let cookie = resp.response().cookies().next().map(|c| c.into_owned()).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/schedule/move")
        .cookie(cookie.clone())
        .set_json(json!({"id": 77, "newDay": "friday", "newStart": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/schedule/manual-add")
        .cookie(cookie.clone())
        .set_json(manual_add_body(2))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["slot"]["id"].clone();

    let req = test::TestRequest::post()
        .uri("/api/schedule/move")
        .cookie(cookie.clone())
        .set_json(json!({"id": id, "newDay": "monday", "newStart": 4}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "overlaps_lunch");

    let req = test::TestRequest::post()
        .uri("/api/schedule/generate")
        .cookie(cookie.clone())
        .set_json(json!({"term": "1/2569", "department": "Science", "classLevel": "1/1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let req = test::TestRequest::delete()
        .uri("/api/schedule/clear")
        .cookie(cookie.clone())
        .set_json(json!({"term": "1/2569", "mode": "teacher"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::delete()
        .uri("/api/schedule/bulk-delete")
        .cookie(cookie)
        .set_json(json!({"ids": [77, 78]}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["succeeded"], 0);
    assert_eq!(body["not_found"], 2);
    assert_eq!(body["failed"], 0);
}
