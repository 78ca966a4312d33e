// tests/submission_tests.rs

mod common;

use common::{error_message, spawn_app};
use serde_json::{Value, json};

#[tokio::test]
async fn fewer_answers_are_recorded_with_gaps() {
    // Arrange
    let app = spawn_app().await;
    let teacher = app.teacher().await;
    let student = app.student().await;
    let test_id = app.create_test(&teacher, "Filtering", &[1.0, 1.0, 1.0]).await;

    // Act
    let response = app
        .post(
            &format!("/api/test/{}/submit", test_id),
            Some(&student.token),
            &json!({ "answers": ["SELECT * FROM emp WHERE salary > 100"] }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Test submitted successfully");
    assert_eq!(body["gradingStatus"], "pending");

    let performance: Vec<Value> = app
        .get(
            &format!("/api/students/{}/performance", student.id),
            Some(&student.token),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(performance.len(), 1);

    let entry = &performance[0];
    assert_eq!(entry["testId"].as_i64(), Some(test_id));
    assert_eq!(entry["testName"], "Filtering");
    assert!(entry["totalScore"].is_null());

    let answers = entry["submittedAnswers"].as_array().unwrap();
    assert_eq!(answers.len(), 3);
    assert_eq!(answers[0]["submittedAnswer"], "SELECT * FROM emp WHERE salary > 100");
    assert_eq!(answers[0]["questionText"], "Question 1");
    assert_eq!(answers[0]["correctAnswer"], "SELECT 1");
    assert!(answers[1]["submittedAnswer"].is_null());
    assert!(answers[2]["submittedAnswer"].is_null());

    // The grading job waits for a worker
    let status: Value = app
        .get(
            &format!("/api/graded-tests/status/{}/{}", student.id, test_id),
            Some(&student.token),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "pending");
    assert_eq!(status["attempts"].as_i64(), Some(0));
}

#[tokio::test]
async fn second_submission_conflicts() {
    let app = spawn_app().await;
    let teacher = app.teacher().await;
    let student = app.student().await;
    let test_id = app.create_test(&teacher, "Once", &[1.0]).await;

    let first = app
        .post(
            &format!("/api/students/{}/submit", test_id),
            Some(&student.token),
            &json!({ "answers": ["SELECT 1"] }),
        )
        .await;
    assert_eq!(first.status().as_u16(), 200);

    let second = app
        .post(
            &format!("/api/test/{}/submit", test_id),
            Some(&student.token),
            &json!({ "answers": ["SELECT 2"] }),
        )
        .await;
    assert_eq!(second.status().as_u16(), 409);
    assert_eq!(error_message(second).await, "Test already submitted");

    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM performances")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(entries, 1);
}

#[tokio::test]
async fn submitting_for_someone_else_is_forbidden() {
    let app = spawn_app().await;
    let teacher = app.teacher().await;
    let student = app.student().await;
    let other = app.student().await;
    let test_id = app.create_test(&teacher, "Mine", &[1.0]).await;

    let response = app
        .post(
            &format!("/api/test/{}/submit", test_id),
            Some(&student.token),
            &json!({ "studentId": other.id, "answers": [] }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn submitting_to_a_missing_test_is_404() {
    let app = spawn_app().await;
    let student = app.student().await;

    let response = app
        .post("/api/test/777/submit", Some(&student.token), &json!({ "answers": [] }))
        .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn students_only_read_their_own_performance() {
    let app = spawn_app().await;
    let teacher = app.teacher().await;
    let student = app.student().await;
    let other = app.student().await;

    let path = format!("/api/students/{}/performance", student.id);

    let response = app.get(&path, Some(&other.token)).await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app.get(&path, Some(&teacher.token)).await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app.get(&path, None).await;
    assert_eq!(response.status().as_u16(), 401);

    let response = app.get("/api/students/999/performance", Some(&teacher.token)).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn students_are_listed_by_branch_and_semester() {
    let app = spawn_app().await;
    let teacher = app.teacher().await;
    app.register("student", "Zed", "Adams").await;
    app.register("student", "Amy", "Baker").await;

    let by_branch: Vec<Value> = app
        .get("/api/students/branch/CSE", Some(&teacher.token))
        .await
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = by_branch
        .iter()
        .map(|s| s["lastName"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Adams", "Baker"]);
    assert!(by_branch.iter().all(|s| s.get("password").is_none()));

    let by_semester: Vec<Value> = app
        .get("/api/students/branch/CSE/semester/5", Some(&teacher.token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(by_semester.len(), 2);

    let none: Vec<Value> = app
        .get("/api/students/branch/CSE/semester/1", Some(&teacher.token))
        .await
        .json()
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn leaderboard_ranks_latest_scores() {
    // Arrange
    let app = spawn_app().await;
    let teacher = app.teacher().await;
    let carol = app.register("student", "Carol", "Doe").await;
    let bob = app.register("student", "Bob", "Doe").await;
    let alice = app.register("student", "Alice", "Doe").await;
    app.register("student", "Idle", "Doe").await;
    let test_id = app.create_test(&teacher, "Final", &[50.0, 50.0]).await;

    let response = app
        .post(
            "/api/scores/addScores",
            Some(&teacher.token),
            &json!({
                "scores": [
                    { "studentId": carol.id, "testId": test_id, "totalScore": 50 },
                    { "studentId": bob.id, "testId": test_id, "totalScore": 90 },
                    { "studentId": alice.id, "testId": test_id, "totalScore": 90 }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    // Act
    let response = app.get("/api/leaderboard", None).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let board: Vec<Value> = response.json().await.unwrap();
    let ranked: Vec<(&str, f64)> = board
        .iter()
        .map(|e| (e["name"].as_str().unwrap(), e["score"].as_f64().unwrap()))
        .collect();
    assert_eq!(
        ranked,
        [("Alice Doe", 90.0), ("Bob Doe", 90.0), ("Carol Doe", 50.0)]
    );
    assert!(board.iter().all(|e| e["testName"] == "Final"));
}
