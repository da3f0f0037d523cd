mod common;

use std::io::Write;
use std::thread;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use futures_lite::future;
use http_facade::{helpers, Call, Failure, HttpClient, Options, Payload};
use miniserde::json::{self, Number, Object, Value};

use common::{json_response, response, serve};

#[test]
fn get_appends_query_and_decodes_json() {
    let server = serve(|_| json_response(r#"{"items":[1,2,3],"next":null}"#));

    let envelope = helpers::get(&server.base, "/items", Call::new().param("page", "2").param("q", "a b")).unwrap();
    let request = server.next_request();

    assert_eq!(request.request_line(), "GET /items?page=2&q=a%20b HTTP/1.1");
    assert!(request.body.is_empty());
    assert_eq!(envelope.code, 200);
    match envelope.body.as_json() {
        Some(Value::Object(fields)) => assert!(matches!(fields.get("items"), Some(Value::Array(a)) if a.len() == 3)),
        other => panic!("expected an object, got {other:?}"),
    }
    assert_eq!(envelope.response_headers.get("content-type"), Some("application/json"));
    assert_eq!(envelope.info.http_code, 200);
    assert!(envelope.info.header_size > 0);
}

#[test]
fn get_never_sends_a_body() {
    let server = serve(|_| response("200 OK", &[], b"ok"));
    helpers::request(&server.base, "/", Call::new().data("ignored")).unwrap();
    let request = server.next_request();
    assert!(request.body.is_empty());
    assert_eq!(request.header("content-length"), None);
}

#[test]
fn post_json_payload_reaches_server_intact() {
    let server = serve(|request| response("200 OK", &[], &request.body));

    let mut order = Object::new();
    order.insert("sku".into(), Value::String("A-1".into()));
    order.insert("qty".into(), Value::Number(Number::U64(4)));
    let payload = Value::Object(order);

    let call = Call::new()
        .header("Content-Type", "application/json")
        .data(payload.clone());
    let envelope = helpers::post(&server.base, "/orders", call).unwrap();
    let request = server.next_request();

    assert_eq!(request.request_line(), "POST /orders HTTP/1.1");
    let received: Value = json::from_str(std::str::from_utf8(&request.body).unwrap()).unwrap();
    assert_eq!(json::to_string(&received), json::to_string(&payload));
    // Echoed back, so the envelope carries the decoded structure too
    assert_eq!(json::to_string(envelope.body.as_json().unwrap()), json::to_string(&payload));
    assert!(envelope.request_headers.contains(&"Content-Type: application/json".to_string()));
}

#[test]
fn structured_payload_without_content_type_is_form_encoded() {
    let server = serve(|_| response("200 OK", &[], b""));

    let mut form = Object::new();
    form.insert("user".into(), Value::String("zoë".into()));
    form.insert("remember".into(), Value::Bool(true));
    helpers::put(&server.base, "/session", Call::new().data(Value::Object(form))).unwrap();

    let request = server.next_request();
    assert_eq!(request.header("content-type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(request.body, b"remember=1&user=zo%C3%AB");
}

#[test]
fn empty_structured_payload_is_not_attached() {
    let server = serve(|_| response("200 OK", &[], b""));

    helpers::post(&server.base, "/noop", Call::new().data(Value::Object(Object::new()))).unwrap();
    let request = server.next_request();
    assert_eq!(request.header("content-type"), None);
    assert_eq!(request.header("content-length"), Some("0"));
    assert!(request.body.is_empty());
}

#[test]
fn see_other_redirect_drops_body_headers() {
    let server = serve(|request| match request.path() {
        "/orders" => response("303 See Other", &[("Location", "/orders/42")], b""),
        _ => response("200 OK", &[], b"order 42"),
    });

    let call = Call::new()
        .header("Content-Type", "text/plain")
        .header("Content-Length", "7")
        .data("payload")
        .options(Options::new().follow_redirects(true))
        .raw();
    let envelope = helpers::post(&server.base, "/orders", call).unwrap();

    let first = server.next_request();
    assert_eq!(first.request_line(), "POST /orders HTTP/1.1");
    assert_eq!(first.body, b"payload");

    let second = server.next_request();
    assert_eq!(second.request_line(), "GET /orders/42 HTTP/1.1");
    assert_eq!(second.header("content-type"), None);
    assert_eq!(second.header("content-length"), None);
    assert!(second.body.is_empty());
    assert_eq!(envelope.body.text(), Some("order 42"));
}

#[test]
fn delete_and_custom_methods_carry_bodies() {
    let server = serve(|_| response("200 OK", &[], b""));

    helpers::delete(&server.base, "/items/9", Call::new().data("reason=dup")).unwrap();
    let request = server.next_request();
    assert_eq!(request.request_line(), "DELETE /items/9 HTTP/1.1");
    assert_eq!(request.body, b"reason=dup");

    helpers::other("patch", &server.base, "/items/9", Call::new().data(r#"{"qty":1}"#)).unwrap();
    let request = server.next_request();
    assert_eq!(request.request_line(), "PATCH /items/9 HTTP/1.1");
    assert_eq!(request.body, br#"{"qty":1}"#);
}

#[test]
fn non_200_is_a_status_failure_with_raw_body() {
    let server = serve(|_| response("500 Internal Server Error", &[], br#"{"error":"boom"}"#));

    let failure = helpers::get(&server.base, "/", Call::new()).unwrap_err();
    assert_eq!(failure.status(), Some(500));
    match failure {
        Failure::Status { body, response_headers, info, .. } => {
            assert_eq!(body.text(), Some(r#"{"error":"boom"}"#));
            assert_eq!(response_headers.status_line(), "HTTP/1.1 500 Internal Server Error");
            assert_eq!(info.http_code, 500);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn created_is_not_success() {
    let server = serve(|_| response("201 Created", &[], b""));
    let failure = helpers::post(&server.base, "/", Call::new()).unwrap_err();
    assert_eq!(failure.status(), Some(201));
}

#[test]
fn invalid_json_body_is_returned_as_text() {
    let server = serve(|_| response("200 OK", &[("Content-Type", "application/json")], b"{broken"));
    let envelope = helpers::get(&server.base, "/", Call::new()).unwrap();
    assert_eq!(envelope.body.text(), Some("{broken"));
}

#[test]
fn gzip_responses_are_inflated() {
    let server = serve(|_| {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"compressed":true}"#).unwrap();
        response("200 OK", &[("Content-Encoding", "gzip")], &encoder.finish().unwrap())
    });

    let envelope = helpers::get(&server.base, "/", Call::new()).unwrap();
    assert!(matches!(envelope.body.as_json(), Some(Value::Object(o)) if matches!(o.get("compressed"), Some(Value::Bool(true)))));
}

#[test]
fn chunked_responses_are_reassembled() {
    let server = serve(|_| {
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n6\r\nhello \r\n5\r\nworld\r\n0\r\n\r\n".to_vec()
    });
    let envelope = helpers::get(&server.base, "/", Call::new().raw()).unwrap();
    assert_eq!(envelope.body.text(), Some("hello world"));
    assert_eq!(envelope.info.size_download, 11);
}

#[test]
fn unreachable_host_is_a_transport_failure() {
    let failure = helpers::get("http://127.0.0.1:1", "/", Call::new()).unwrap_err();
    assert!(failure.is_transport());
    assert_eq!(failure.status(), None);
}

#[test]
fn malformed_url_is_an_invalid_request() {
    let failure = helpers::get("http://bad host", "/x", Call::new()).unwrap_err();
    assert!(matches!(failure, Failure::InvalidRequest(_)));
}

#[test]
fn unencodable_payload_is_an_encoding_failure() {
    let call = Call::new()
        .header("Content-Type", "application/x-www-form-urlencoded")
        .data(Payload::Structured(Value::Bool(true)));
    let failure = helpers::post("http://127.0.0.1:1", "/", call).unwrap_err();
    assert!(matches!(failure, Failure::Encoding(_)));
}

#[test]
fn timeout_bounds_the_exchange() {
    let server = serve(|_| {
        thread::sleep(Duration::from_secs(2));
        response("200 OK", &[], b"late")
    });

    let call = Call::new().options(Options::new().timeout(Duration::from_millis(200)));
    let failure = helpers::get(&server.base, "/slow", call).unwrap_err();
    assert!(failure.is_transport());
    assert!(failure.to_string().contains("timed out"));
}

#[test]
fn exists_reads_the_status_line() {
    let server = serve(|request| match request.path() {
        "/missing" => response("404 Not Found", &[], b""),
        "/broken" => response("500 Internal Server Error", &[], b""),
        _ => response("200 OK", &[], b""),
    });

    assert!(helpers::exists(&server.base, "/present"));
    assert_eq!(server.next_request().request_line(), "HEAD /present HTTP/1.1");
    assert!(!helpers::exists(&server.base, "/missing"));
    assert!(helpers::exists(&server.base, "/broken"));
    assert!(!helpers::exists("http://127.0.0.1:1", "/"));
}

#[test]
fn proxy_helper_parses_descriptors() {
    assert_eq!(helpers::proxy("http://proxy.local:8080").map(|p| p.address), Some("proxy.local:8080".to_string()));
    assert!(helpers::proxy("ftp://x:21").is_none());
}

#[test]
fn async_client_returns_the_plain_response() {
    let server = serve(|_| response("404 Not Found", &[("X-Reason", "gone")], b"nothing here"));

    let request = http::Request::builder()
        .uri(format!("{}/thing", server.base))
        .header("Accept", "text/plain")
        .body(Vec::new())
        .unwrap();
    let response = future::block_on(HttpClient::request(&request, &Options::new())).unwrap();

    assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get("x-reason").unwrap(), "gone");
    assert_eq!(response.body(), b"nothing here");
    assert_eq!(server.next_request().header("accept"), Some("text/plain"));
}
