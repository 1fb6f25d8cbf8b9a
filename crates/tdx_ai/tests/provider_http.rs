use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tdx_ai::embeddings::openai_embed::OpenAiEmbedder;
use tdx_ai::embeddings::Embedder;
use tdx_ai::llm::openai_chat::OpenAiChat;
use tdx_ai::llm::Llm;
use tdx_ai::provider::ProviderClient;
use tdx_core::error::ErrorKind;

/// What the server saw: request line, `Authorization` header, decoded body.
struct Captured {
    request_line: String,
    authorization: Option<String>,
    body: serde_json::Value,
}

/// Serve exactly one HTTP request on loopback with a canned response.
fn one_shot_server(status: u16, body: &'static str) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else {
            return;
        };
        let Ok(read_half) = stream.try_clone() else {
            return;
        };
        let mut reader = BufReader::new(read_half);
        let mut writer = stream;

        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }
        let mut content_length = 0usize;
        let mut authorization = None;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).unwrap_or(0) == 0 || header == "\r\n" {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                let value = value.trim().to_string();
                match name.to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.parse().unwrap_or(0),
                    "authorization" => authorization = Some(value),
                    _ => {}
                }
            }
        }
        let mut raw = vec![0u8; content_length];
        if reader.read_exact(&mut raw).is_err() {
            return;
        }
        let body_json = serde_json::from_slice(&raw).unwrap_or(serde_json::Value::Null);

        let response = format!(
            "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = writer.write_all(response.as_bytes());
        let _ = writer.flush();
        let _ = tx.send(Captured {
            request_line: request_line.trim_end().to_string(),
            authorization,
            body: body_json,
        });
    });

    (format!("http://127.0.0.1:{port}/v1"), rx)
}

fn client(base_url: &str) -> ProviderClient {
    ProviderClient::new(base_url, "sk-test", Duration::from_secs(5)).expect("client")
}

fn received(rx: &mpsc::Receiver<Captured>) -> Captured {
    rx.recv_timeout(Duration::from_secs(5)).expect("request seen")
}

#[test]
fn embeddings_request_and_response_shape() {
    let (url, rx) = one_shot_server(
        200,
        r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2,0.3]}],"model":"text-embedding-3-small"}"#,
    );
    let embedder = OpenAiEmbedder::new(client(&url));

    let v = embedder
        .embed("text-embedding-3-small", "hello")
        .expect("embed");
    assert_eq!(v, vec![0.1f32, 0.2, 0.3]);

    let seen = received(&rx);
    assert_eq!(seen.request_line, "POST /v1/embeddings HTTP/1.1");
    assert_eq!(seen.authorization.as_deref(), Some("Bearer sk-test"));
    assert_eq!(
        seen.body,
        json!({"model": "text-embedding-3-small", "input": "hello"})
    );
}

#[test]
fn chat_request_and_response_shape() {
    let (url, rx) = one_shot_server(
        200,
        r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"Values rise daily."},"finish_reason":"stop"}]}"#,
    );
    let chat = OpenAiChat::new(client(&url), 0.2, 256);

    let answer = chat.generate("gpt-test", "Query: why?").expect("generate");
    assert_eq!(answer, "Values rise daily.");

    let seen = received(&rx);
    assert_eq!(seen.request_line, "POST /v1/chat/completions HTTP/1.1");
    assert_eq!(
        seen.body,
        json!({
            "model": "gpt-test",
            "messages": [{"role": "user", "content": "Query: why?"}],
            "temperature": 0.2,
            "max_tokens": 256
        })
    );
}

#[test]
fn rejected_key_is_authentication_error() {
    let (url, _rx) = one_shot_server(401, r#"{"error":{"message":"Incorrect API key provided"}}"#);
    let err = OpenAiEmbedder::new(client(&url))
        .embed("m", "hello")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(err.code, "AI_EMBEDDINGS_FAILED");
    assert!(err.details.unwrap_or_default().contains("status=401"));
}

#[test]
fn server_errors_are_retryable_provider_errors() {
    let (url, _rx) = one_shot_server(503, r#"{"error":{"message":"overloaded"}}"#);
    let err = OpenAiChat::new(client(&url), 0.0, 16)
        .generate("m", "p")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Provider);
    assert!(err.retryable);
}

#[test]
fn bad_request_is_query_error() {
    let (url, _rx) = one_shot_server(400, r#"{"error":{"message":"unknown model"}}"#);
    let err = OpenAiEmbedder::new(client(&url))
        .embed("no-such-model", "hello")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Query);
}

#[test]
fn empty_embedding_list_is_provider_error() {
    let (url, _rx) = one_shot_server(200, r#"{"data":[]}"#);
    let err = OpenAiEmbedder::new(client(&url))
        .embed("m", "hello")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Provider);
}

#[test]
fn empty_choice_list_is_provider_error() {
    let (url, _rx) = one_shot_server(200, r#"{"choices":[]}"#);
    let err = OpenAiChat::new(client(&url), 0.0, 16)
        .generate("m", "p")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Provider);
    assert_eq!(err.code, "AI_COMPLETION_FAILED");
}

#[test]
fn undecodable_body_is_provider_error() {
    let (url, _rx) = one_shot_server(200, "<html>gateway</html>");
    let err = OpenAiEmbedder::new(client(&url))
        .embed("m", "hello")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Provider);
}

#[test]
fn health_check_lists_models() {
    let (url, rx) = one_shot_server(200, r#"{"object":"list","data":[]}"#);
    client(&url).health_check().expect("healthy");

    let seen = received(&rx);
    assert_eq!(seen.request_line, "GET /v1/models HTTP/1.1");
    assert_eq!(seen.authorization.as_deref(), Some("Bearer sk-test"));
}

#[test]
fn health_check_reports_rejected_key() {
    let (url, _rx) = one_shot_server(403, r#"{"error":{"message":"forbidden"}}"#);
    let err = client(&url).health_check().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(err.code, "AI_PROVIDER_UNHEALTHY");
}

#[test]
fn nothing_listening_is_connection_error() {
    let port = {
        let l = TcpListener::bind("127.0.0.1:0").expect("bind");
        l.local_addr().expect("addr").port()
    };
    let err = client(&format!("http://127.0.0.1:{port}/v1"))
        .health_check()
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Connection);
    assert!(err.retryable);
}
