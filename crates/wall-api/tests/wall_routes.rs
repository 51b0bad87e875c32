use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use uuid::Uuid;
use wall_api::identity::{USER_ID_HEADER, USER_ROLE_HEADER};
use wall_api::{configure_routes, AppState, HeaderIdentity};
use wall_core::directory::InMemoryUserDirectory;
use wall_core::{LogDispatcher, UserProfile, WallService, WallSettings};
use wall_db_sqlite::SqliteMessageRepo;

async fn state(directory: InMemoryUserDirectory) -> web::Data<AppState> {
    let repo = SqliteMessageRepo::with_lock_timeout("sqlite::memory:", Duration::from_millis(200))
        .await
        .unwrap();
    let service = WallService::new(Arc::new(repo), Arc::new(LogDispatcher), WallSettings::default());
    web::Data::new(AppState {
        service,
        directory: Arc::new(directory),
        identity: Box::new(HeaderIdentity),
    })
}

fn as_user(req: test::TestRequest, user: Uuid, role: &str) -> test::TestRequest {
    req.insert_header((USER_ID_HEADER, user.to_string()))
        .insert_header((USER_ROLE_HEADER, role.to_string()))
}

macro_rules! send {
    ($app:expr, $req:expr $(,)?) => {{
        let res = test::call_service($app, $req.to_request()).await;
        let status = res.status();
        let body = test::read_body(res).await;
        let value: Value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
        (status, value)
    }};
}

fn post(path: &str, content: &str) -> test::TestRequest {
    test::TestRequest::post().uri(path).set_json(json!({ "content": content }))
}

#[actix_web::test]
async fn test_thread_round_trip_with_hidden_reply() {
    let alice = Uuid::now_v7();
    let bob = Uuid::now_v7();
    let admin = Uuid::now_v7();
    let directory = InMemoryUserDirectory::new();
    directory.upsert(UserProfile { id: alice, username: "alice".into(), avatar: None });
    let app = test::init_service(App::new().app_data(state(directory).await).configure(configure_routes)).await;

    let (status, root) = send!(&app, as_user(post("/wall", "  hello wall  "), alice, "user"));
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(root["content"], "hello wall");
    assert_eq!(root["kind"], "full");
    let root_id = root["id"].as_str().unwrap().to_string();

    let (status, reply) = send!(
        &app,
        as_user(post(&format!("/wall/messages/{root_id}/replies"), "hi alice"), bob, "user"),
    );
    assert_eq!(status, StatusCode::CREATED);
    let reply_id = reply["id"].as_str().unwrap().to_string();

    let (status, _) = send!(
        &app,
        as_user(test::TestRequest::post().uri(&format!("/wall/messages/{reply_id}/hide")), admin, "admin"),
    );
    assert_eq!(status, StatusCode::OK);

    // Asking for the reply returns the whole thread from its root.
    let (status, anon) = send!(&app, test::TestRequest::get().uri(&format!("/wall/messages/{reply_id}")));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anon["thread"]["message"]["id"], root_id.as_str());
    assert_eq!(anon["thread"]["message"]["permissions"]["can_reply"], false);
    let stub = &anon["thread"]["children"][0]["message"];
    assert_eq!(stub["kind"], "stub");
    assert!(stub.get("content").is_none());
    assert_eq!(anon["authors"][alice.to_string()]["username"], "alice");

    let (_, own) = send!(
        &app,
        as_user(test::TestRequest::get().uri(&format!("/wall/messages/{reply_id}")), bob, "user"),
    );
    let mine = &own["thread"]["children"][0]["message"];
    assert_eq!(mine["kind"], "full");
    assert_eq!(mine["content"], "hi alice");
    assert_eq!(mine["hidden"], true);
}

#[actix_web::test]
async fn test_error_statuses() {
    let alice = Uuid::now_v7();
    let bob = Uuid::now_v7();
    let app = test::init_service(
        App::new()
            .app_data(state(InMemoryUserDirectory::new()).await)
            .configure(configure_routes),
    )
    .await;

    let (status, _) = send!(&app, post("/wall", "anonymous"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send!(&app, as_user(post("/wall", "   "), alice, "user"));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send!(&app, test::TestRequest::get().uri(&format!("/wall/messages/{}", Uuid::now_v7())));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "the message does not exist or has been deleted");

    let (_, root) = send!(&app, as_user(post("/wall", "mine"), alice, "user"));
    let root_id = root["id"].as_str().unwrap().to_string();

    let edit = test::TestRequest::put()
        .uri(&format!("/wall/messages/{root_id}"))
        .set_json(json!({ "content": "not yours" }));
    let (status, _) = send!(&app, as_user(edit, bob, "user"));
    assert_eq!(status, StatusCode::FORBIDDEN);

    let hide = test::TestRequest::post().uri(&format!("/wall/messages/{root_id}/hide"));
    let (status, _) = send!(&app, as_user(hide, alice, "moderator"));
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send!(&app, test::TestRequest::get().uri(&format!("/wall?page={}", i64::MAX)));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send!(
        &app,
        test::TestRequest::get().uri(&format!("/wall/users/{alice}/messages?page={}", i64::MAX)),
    );
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let garbage = test::TestRequest::get().uri("/wall").insert_header((USER_ID_HEADER, "not-a-uuid"));
    let (status, _) = send!(&app, garbage);
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_delete_removes_replies() {
    let alice = Uuid::now_v7();
    let bob = Uuid::now_v7();
    let app = test::init_service(
        App::new()
            .app_data(state(InMemoryUserDirectory::new()).await)
            .configure(configure_routes),
    )
    .await;

    let (_, root) = send!(&app, as_user(post("/wall", "root"), alice, "user"));
    let root_id = root["id"].as_str().unwrap().to_string();
    let (_, reply) = send!(
        &app,
        as_user(post(&format!("/wall/messages/{root_id}/replies"), "reply"), bob, "user"),
    );
    let reply_id = reply["id"].as_str().unwrap().to_string();
    send!(&app, as_user(post(&format!("/wall/messages/{reply_id}/replies"), "nested"), alice, "user"));

    let (status, body) = send!(
        &app,
        as_user(test::TestRequest::delete().uri(&format!("/wall/messages/{reply_id}")), bob, "user"),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);

    let (_, thread) = send!(&app, test::TestRequest::get().uri(&format!("/wall/messages/{root_id}")));
    assert_eq!(thread["thread"]["children"].as_array().unwrap().len(), 0);

    let (status, _) = send!(&app, test::TestRequest::get().uri(&format!("/wall/messages/{reply_id}")));
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_wall_page_and_lists() {
    let alice = Uuid::now_v7();
    let app = test::init_service(
        App::new()
            .app_data(state(InMemoryUserDirectory::new()).await)
            .configure(configure_routes),
    )
    .await;

    for n in 0..3 {
        let (status, _) = send!(&app, as_user(post("/wall", &format!("thread {n}")), alice, "user"));
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send!(&app, test::TestRequest::get().uri("/wall?page=1"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_threads"], 3);
    assert_eq!(page["page_count"], 1);
    assert_eq!(page["threads"].as_array().unwrap().len(), 3);

    let (_, latest) = send!(&app, test::TestRequest::get().uri("/wall/latest"));
    assert_eq!(latest["messages"].as_array().unwrap().len(), 3);

    let (_, mine) = send!(&app, test::TestRequest::get().uri(&format!("/wall/users/{alice}/messages")));
    assert_eq!(mine["messages"].as_array().unwrap().len(), 3);

    let (_, nobody) = send!(&app, test::TestRequest::get().uri(&format!("/wall/users/{}/messages", Uuid::now_v7())));
    assert!(nobody["messages"].as_array().unwrap().is_empty());
}
