use email_delivery::{DigestSender, OutgoingEmail, SendGridSender};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn digest_email() -> OutgoingEmail {
    OutgoingEmail::from_markdown(
        "tracker@example.org",
        vec!["board@example.org".to_string()],
        "Daily Digest - 2026-03-02",
        "# Daily Digest\n- **hr1-119** Flood Resilience Act",
    )
}

#[tokio::test]
async fn accepted_message_is_a_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("authorization", "Bearer sg-test-key"))
        .and(body_partial_json(json!({
            "personalizations": [{ "to": [{ "email": "board@example.org" }] }],
            "from": { "email": "tracker@example.org" },
            "subject": "Daily Digest - 2026-03-02",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let sender = SendGridSender::new("sg-test-key").with_base_url(server.uri());
    let result = sender.send(&digest_email()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status_code, Some(202));
    assert_eq!(sender.provider(), "sendgrid");
}

#[tokio::test]
async fn rejected_message_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"errors\":[]}"))
        .mount(&server)
        .await;

    let sender = SendGridSender::new("wrong").with_base_url(server.uri());
    let result = sender.send(&digest_email()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.status_code, Some(401));
    assert_eq!(result.message, "SendGrid returned status 401");
}

#[tokio::test]
async fn html_alternative_is_sent_alongside_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let email = digest_email();
    assert!(email.html.contains("<strong>hr1-119</strong>"));

    let sender = SendGridSender::new("key").with_base_url(server.uri());
    assert!(sender.send(&email).await.unwrap().success);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["content"].as_array().unwrap().len(), 2);
    assert_eq!(body["content"][0]["type"], "text/plain");
    assert_eq!(body["content"][0]["value"], "# Daily Digest\n- **hr1-119** Flood Resilience Act");
    assert_eq!(body["content"][1]["type"], "text/html");
}
