// src/routes.rs

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, graded_test, leaderboard, question, score, student, submission, test},
    state::AppState,
    utils::jwt::{auth_middleware, student_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Nests the sub-routers under `/api`.
/// * Guards: `auth_middleware` for any token, plus `teacher_middleware` or
///   `student_middleware` where the role matters.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let require_token = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/user", get(auth::get_user))
                .layer(require_token()),
        );

    let test_routes = Router::new()
        .route("/getTest/{id}", get(test::get_test))
        .route("/upcoming", get(test::upcoming))
        .route("/allTests", get(test::all_tests))
        .route("/{id}", get(test::get_test))
        .merge(
            Router::new()
                .route("/createTest", post(test::create_test))
                .layer(middleware::from_fn(teacher_middleware))
                .layer(require_token()),
        )
        .merge(
            Router::new()
                .route("/{id}/submit", post(submission::submit_test))
                .layer(middleware::from_fn(student_middleware))
                .layer(require_token()),
        );

    let question_routes = Router::new()
        .route("/addQuestion", post(question::add_question))
        .route("/getQuestions/{test_id}", get(question::get_questions))
        .route("/updateQuestion/{id}", put(question::update_question))
        .route("/deleteQuestion/{id}", delete(question::delete_question))
        // Auth first, then the role check
        .layer(middleware::from_fn(teacher_middleware))
        .layer(require_token());

    let score_routes = Router::new()
        .route("/getScoresByStudent/{id}", get(score::scores_by_student))
        .route("/getScoresByTest/{id}", get(score::scores_by_test))
        .merge(
            Router::new()
                .route("/addScores", post(score::add_scores))
                .layer(middleware::from_fn(teacher_middleware)),
        )
        .layer(require_token());

    let student_routes = Router::new()
        .route("/branch/{name}", get(student::students_by_branch))
        .route(
            "/branch/{name}/semester/{semester}",
            get(student::students_by_branch_and_semester),
        )
        .route("/{id}/performance", get(student::student_performance))
        .merge(
            Router::new()
                .route("/{id}/submit", post(submission::submit_test))
                .layer(middleware::from_fn(student_middleware)),
        )
        .layer(require_token());

    let graded_test_routes = Router::new()
        .route("/{student_id}", get(graded_test::graded_tests))
        .route(
            "/test-results/{student_id}/{test_id}",
            get(graded_test::test_result),
        )
        .route(
            "/status/{student_id}/{test_id}",
            get(graded_test::grading_status),
        )
        .merge(
            Router::new()
                .route(
                    "/regrade/{student_id}/{test_id}",
                    post(graded_test::regrade),
                )
                .layer(middleware::from_fn(teacher_middleware)),
        )
        .layer(require_token());

    Router::new()
        .route("/", get(|| async { "Welcome to the AutoAssess API" }))
        .route("/api/leaderboard", get(leaderboard::get_leaderboard))
        .nest("/api/auth", auth_routes)
        .nest("/api/test", test_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/scores", score_routes)
        .nest("/api/students", student_routes)
        .nest("/api/graded-tests", graded_test_routes)
        // Global middleware; the first layer listed sees the request first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
