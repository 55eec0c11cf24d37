//! Integration tests for the HTTP API.
//!
//! Each test spins up an Axum server on a random port backed by an
//! in-memory database, fake Google services, and a stub LLM, then drives
//! it over HTTP with reqwest.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::redirect::Policy;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use inbox_hub::accounts::{GmailAccount, LinkedAccount};
use inbox_hub::ai::GeneratorConfig;
use inbox_hub::api::{self, AppDeps, AppState, StaticTokenAuthenticator};
use inbox_hub::error::LlmError;
use inbox_hub::google::GmailMessage;
use inbox_hub::google::fake::{self, FakeContacts, FakeGmail, FakeOAuth};
use inbox_hub::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use inbox_hub::store::{Database, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";

// ── Fakes ───────────────────────────────────────────────────────────────

/// Answers each AI feature by recognizing its prompt.
struct StubLlm {
    categories: String,
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let content = if request.prompt.contains("Classify each") {
            self.categories.clone()
        } else if request.prompt.contains("Create one task") {
            r#"{"title": "Prepare Q3 report", "priority": "High", "tags": ["work"],
                "related_links": ["https://docs.test/q3", "not a link"]}"#
                .to_string()
        } else {
            "Dear team,\n\nI would like to schedule a short meeting next week to review our \
             progress on the quarterly goals and agree on the next steps for the project. \
             Please share your availability and any topics you want to cover.\n\nBest regards,\n[YOUR NAME]"
                .to_string()
        };
        Ok(CompletionResponse { content })
    }
}

fn gmail_message(id: &str, from: &str, subject: &str, labels: &[&str], date_ms: i64) -> GmailMessage {
    fake::with_attachment(
        fake::message(id, from, subject, labels, date_ms),
        "q3 \"final\".pdf",
        "application/pdf",
        "att-1",
    )
}

// ── Harness ─────────────────────────────────────────────────────────────

struct TestServer {
    base: String,
    db: Arc<LibSqlBackend>,
    gmail: Arc<FakeGmail>,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    fn post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    fn patch(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(token)
    }

    fn delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    async fn link_account(&self, user_id: &str, email: &str) -> GmailAccount {
        self.db
            .upsert_gmail_account(&LinkedAccount {
                user_id: user_id.into(),
                email: email.into(),
                access_token: "access-seeded".into(),
                refresh_token: Some("refresh-seeded".into()),
                token_expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
                name: None,
                picture: None,
            })
            .await
            .unwrap()
    }

    async fn create_category(&self, name: &str) -> Value {
        let resp = self
            .post("/api/category", ALICE)
            .json(&json!({"name": name, "color": "bg-blue-500"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        resp.json::<Value>().await.unwrap()["category"].clone()
    }
}

/// Start an Axum server on a random port.
async fn start_server(category_reply: &str) -> TestServer {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let gmail = Arc::new(FakeGmail::with_messages(vec![
        gmail_message("m1", "Carol <carol@work.test>", "Q3 report", &["INBOX", "UNREAD"], 1_700_000_200_000),
        gmail_message("m2", "Shop <deals@shop.test>", "Weekend sale", &["INBOX", "CATEGORY_PROMOTIONS"], 1_700_000_100_000),
    ]));
    gmail.add_attachment("att-1", b"%PDF-1.4 fake");

    let state = AppState::new(AppDeps {
        db: db.clone(),
        gmail: gmail.clone(),
        contacts: Arc::new(FakeContacts::default()),
        oauth: Arc::new(FakeOAuth {
            email: "alice@gmail.test".into(),
        }),
        auth: Arc::new(StaticTokenAuthenticator::new(HashMap::from([
            (ALICE.to_string(), "alice".to_string()),
            (BOB.to_string(), "bob".to_string()),
        ]))),
        llm: Arc::new(StubLlm {
            categories: category_reply.to_string(),
        }),
        base_url: "http://dashboard.test/".into(),
        sync_batch: 50,
        generator: GeneratorConfig {
            retry_delay: Duration::from_millis(1),
            ..Default::default()
        },
    });
    let app = api::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        db,
        gmail,
        client: reqwest::Client::builder().redirect(Policy::none()).build().unwrap(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_and_session_auth() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server("[]").await;

        let resp = server.client.get(server.url("/health")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.json::<Value>().await.unwrap()["status"], "ok");

        let resp = server.client.get(server.url("/api/task")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.json::<Value>().await.unwrap()["error"].is_string());

        let resp = server.get("/api/task", "nope").send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = server
            .client
            .get(server.url("/api/task"))
            .header("cookie", format!("token={ALICE}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.json::<Value>().await.unwrap(), json!([]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn oauth_flow_links_account() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server("[]").await;

        let resp = server.get("/api/auth/google", ALICE).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers()["location"].to_str().unwrap().to_string();
        let state = location.split("state=").nth(1).unwrap().to_string();

        let resp = server
            .client
            .get(server.url("/api/auth/google/callback"))
            .query(&[("code", "abc")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let callback = |state: String| {
            server
                .client
                .get(server.url("/api/auth/google/callback"))
                .query(&[("code", "abc".to_string()), ("state", state)])
                .send()
        };
        let resp = callback(state.clone()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()["location"], "http://dashboard.test/dashboard");

        // State is single use.
        let resp = callback(state).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = server
            .get("/api/mail/accounts", ALICE)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["error"].is_null());
        let accounts = body["data"].as_array().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0]["email"], "alice@gmail.test");
        assert_eq!(accounts[0]["is_primary"], true);
        assert!(accounts[0].get("access_token").is_none());

        let stored = server.db.list_gmail_accounts("alice").await.unwrap();
        assert_eq!(stored[0].access_token, "access-abc");

        let bob: Value = server
            .get("/api/mail/accounts", BOB)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(bob["data"], json!([]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn sync_categorizes_and_lists_mail() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(r#"["work", "Uncategorized"]"#).await;
        let account = server.link_account("alice", "alice@gmail.test").await;
        let work = server.create_category("Work").await;

        let resp = server
            .get(&format!("/api/mail/{}/inbox", account.id), BOB)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let resp = server.get("/api/mail/not-a-uuid/inbox", ALICE).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let report: Value = server
            .get(&format!("/api/mail/{}/inbox", account.id), ALICE)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["fetched"], 2);
        assert_eq!(report["stored"], 2);
        assert_eq!(report["failed"], 0);
        let mails = report["mails"].as_array().unwrap();
        assert_eq!(mails[0]["message_id"], "m1");
        assert_eq!(mails[0]["category_id"], work["id"]);
        assert!(mails[1]["category_id"].is_null());
        assert_eq!(mails[1]["gmail_category"], "promotions");

        let all: Value = server
            .get("/api/mail/inbox/all", ALICE)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let all = all.as_array().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["sender_email"], "carol@work.test");
        assert_eq!(all[0]["is_categorized"], true);
        assert_eq!(all[0]["attachments"][0]["attachment_id"], "att-1");

        let account_mail: Value = server
            .get(&format!("/api/mail/{}/inbox/all", account.id), ALICE)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(account_mail.as_array().unwrap().len(), 2);

        let detail: Value = server
            .get(&format!("/api/mail/{}/inbox/m1", account.id), ALICE)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(detail["subject"], "Q3 report");
        assert_eq!(detail["user_category_id"], work["id"]);
        assert!(detail["body"].as_str().unwrap().contains("https://docs.test/m1"));

        let resp = server
            .get(&format!("/api/mail/{}/inbox/missing", account.id), ALICE)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn mail_actions_read_category_task_attachment() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server("[]").await;
        let account = server.link_account("alice", "alice@gmail.test").await;
        let base = format!("/api/mail/{}/inbox", account.id);
        server.get(&base, ALICE).send().await.unwrap();

        // Read state goes to Gmail and the mirror.
        let resp = server.patch(&format!("{base}/m1/read"), ALICE).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            server.gmail.modified.lock().unwrap().as_slice(),
            [("m1".to_string(), vec!["UNREAD".to_string()])]
        );
        let m1 = server.db.get_mail("alice", "m1").await.unwrap().unwrap();
        assert!(!m1.is_unread);
        assert!(!m1.label_ids.contains(&"UNREAD".to_string()));

        // Manual filing.
        let work = server.create_category("Work").await;
        let resp = server
            .patch(&format!("{base}/m1/category"), ALICE)
            .json(&json!({"new_category": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp: Value = server
            .patch(&format!("{base}/m1/category"), ALICE)
            .json(&json!({"new_category": work["id"]}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["updated_mail"]["user_category_id"], work["id"]);
        assert_eq!(resp["updated_mail"]["is_categorized"], true);

        let resp: Value = server
            .patch(&format!("{base}/m1/category"), ALICE)
            .json(&json!({"new_category": "unknown"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(resp["updated_mail"]["user_category_id"].is_null());
        assert_eq!(resp["updated_mail"]["is_categorized"], false);

        // Task extraction.
        let resp = server.post(&format!("{base}/m1/task"), ALICE).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["task"]["title"], "Prepare Q3 report");
        assert_eq!(body["task"]["priority"], "High");
        assert_eq!(body["task"]["status"], "To Do");
        assert_eq!(body["task"]["related_links"], json!(["https://docs.test/q3"]));
        assert_eq!(body["task"]["source_message_id"], "m1");

        let resp = server.post(&format!("{base}/nope/task"), ALICE).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Attachment download.
        let resp = server
            .get(&format!("{base}/m1/attachment/att-1"), ALICE)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/pdf");
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"q3 final.pdf\""
        );
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"%PDF-1.4 fake");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn send_and_generate() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server("[]").await;
        let account = server.link_account("alice", "alice@gmail.test").await;
        let path = format!("/api/mail/{}/send", account.id);

        let form = reqwest::multipart::Form::new()
            .text("to", "bob@example.com, ")
            .text("cc", "")
            .text("bcc", "")
            .text("subject", "Quarterly numbers")
            .text("message", "See attached.")
            .part(
                "attachments",
                reqwest::multipart::Part::bytes(b"a,b\n1,2\n".to_vec())
                    .file_name("numbers.csv")
                    .mime_str("text/csv")
                    .unwrap(),
            );
        let resp = server.post(&path, ALICE).multipart(form).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.json::<Value>().await.unwrap()["message"], "Mail sent successfully");

        let raw = server.gmail.sent.lock().unwrap()[0].clone();
        let message = String::from_utf8(URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap();
        assert!(message.contains("From: alice@gmail.test"));
        assert!(message.contains("To: bob@example.com"));
        assert!(message.contains("Subject: Quarterly numbers"));
        assert!(message.contains("numbers.csv"));

        let empty = reqwest::multipart::Form::new().text("to", " ").text("message", "hi");
        let resp = server.post(&path, ALICE).multipart(empty).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let other = reqwest::multipart::Form::new().text("to", "x@example.com");
        let resp = server.post(&path, BOB).multipart(other).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(server.gmail.sent.lock().unwrap().len(), 1);

        let resp = server
            .post("/api/mail/generate", ALICE)
            .json(&json!({"subject": ""}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = server
            .post("/api/mail/generate", ALICE)
            .json(&json!({"subject": "Project sync"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let text = body["data"].as_str().unwrap();
        assert!(text.split_whitespace().count() >= 30);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn category_crud() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server("[]").await;
        let work = server.create_category("Work").await;
        let id = work["id"].as_str().unwrap().to_string();
        assert_eq!(work["color"], "bg-blue-500");

        let resp = server
            .post("/api/category", ALICE)
            .json(&json!({"name": "Work", "color": "bg-red-500"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = server
            .post("/api/category", ALICE)
            .json(&json!({"name": "Personal"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = server
            .get(&format!("/api/category/{id}"), BOB)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: Value = server
            .patch(&format!("/api/category/{id}"), ALICE)
            .json(&json!({"name": "Office", "color": "bg-green-500"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["category"]["name"], "Office");
        assert_eq!(body["category"]["color"], "bg-green-500");

        let list: Value = server
            .get("/api/category", ALICE)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list["data"].as_array().unwrap().len(), 1);

        let resp = server
            .delete(&format!("/api/category/{id}"), ALICE)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = server
            .get(&format!("/api/category/{id}"), ALICE)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn task_crud() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server("[]").await;

        let resp = server
            .post("/api/task", ALICE)
            .json(&json!({"description": "no title"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = server
            .post("/api/task", ALICE)
            .json(&json!({"title": "Bad link", "related_links": ["ftp://files.test"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.json::<Value>().await.unwrap()["error"],
            "All the related links must be valid URLs"
        );

        let resp = server
            .post("/api/task", ALICE)
            .json(&json!({"title": "Write notes", "due_date": "2025-03-01", "tags": ["docs"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let task: Value = resp.json().await.unwrap();
        let id = task["id"].as_str().unwrap().to_string();
        assert_eq!(task["status"], "To Do");
        assert_eq!(task["priority"], "Medium");

        let updated: Value = server
            .patch(&format!("/api/task/{id}"), ALICE)
            .json(&json!({"status": "In Progress", "due_date": ""}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(updated["status"], "In Progress");
        assert!(updated["due_date"].is_null());
        assert_eq!(updated["title"], "Write notes");

        let resp = server
            .patch(&format!("/api/task/{id}"), BOB)
            .json(&json!({"status": "Done"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let list: Value = server.get("/api/task", ALICE).send().await.unwrap().json().await.unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);

        let resp = server.delete(&format!("/api/task/{id}"), ALICE).send().await.unwrap();
        assert_eq!(resp.json::<Value>().await.unwrap(), json!({"success": true}));
        let resp = server.delete(&format!("/api/task/{id}"), ALICE).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}
