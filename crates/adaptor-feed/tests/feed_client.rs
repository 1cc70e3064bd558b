//! FeedClient against a mock appliance

use adaptor_feed::{FeedClient, FeedClientConfig, FeedFile, FeedTransport, FeedType, TransmitError};
use flate2::read::GzDecoder;
use std::io::Read;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn feed(xml: &str) -> FeedFile {
    FeedFile {
        datasource: "mysource".to_string(),
        feed_type: FeedType::MetadataAndUrl,
        xml: xml.to_string(),
        item_count: 1,
    }
}

fn client(server: &MockServer) -> FeedClient {
    FeedClient::new(FeedClientConfig::new(format!("{}/xmlfeed", server.uri()))).unwrap()
}

async fn mount_reply(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path("/xmlfeed"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_success_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xmlfeed"))
        .and(header("content-type", "multipart/form-data; boundary=<<"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).send_feed(&feed("<gsafeed/>")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.contains("name=\"datasource\"\r\nContent-Type: text/plain\r\n\r\nmysource\r\n"));
    assert!(body.contains("name=\"feedtype\"\r\nContent-Type: text/plain\r\n\r\nmetadata-and-url\r\n"));
    assert!(body.contains("name=\"data\"\r\nContent-Type: text/xml\r\n\r\n<gsafeed/>\r\n"));
    assert!(body.ends_with("--<<--\r\n"));
    assert!(requests[0].headers.get("content-encoding").is_none());
}

#[tokio::test]
async fn test_reply_whitespace_is_ignored() {
    let server = MockServer::start().await;
    mount_reply(&server, 200, "Success\n").await;

    assert!(client(&server).send_feed(&feed("<gsafeed/>")).await.is_ok());
}

#[tokio::test]
async fn test_other_reply_is_rejection() {
    let server = MockServer::start().await;
    mount_reply(&server, 200, "Error - Unauthorized Request").await;

    let err = client(&server).send_feed(&feed("<gsafeed/>")).await.unwrap_err();
    match err {
        TransmitError::Rejected(reply) => assert_eq!(reply, "Error - Unauthorized Request"),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_ok_status_is_read_failure() {
    let server = MockServer::start().await;
    mount_reply(&server, 500, "Success").await;

    let err = client(&server).send_feed(&feed("<gsafeed/>")).await.unwrap_err();
    assert!(matches!(err, TransmitError::FailedReadingReply(_)));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client =
        FeedClient::new(FeedClientConfig::new(format!("http://127.0.0.1:{}/xmlfeed", port))).unwrap();

    let err = client.send_feed(&feed("<gsafeed/>")).await.unwrap_err();
    assert!(matches!(err, TransmitError::FailedToConnect(_)), "{:?}", err);
}

#[tokio::test]
async fn test_slow_reply_times_out_as_read_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Success")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = FeedClientConfig::new(format!("{}/xmlfeed", server.uri()))
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(200));
    let err = FeedClient::new(config)
        .unwrap()
        .send_feed(&feed("<gsafeed/>"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransmitError::FailedReadingReply(_)), "{:?}", err);
}

/// Accept one connection, read the request through the closing multipart
/// delimiter, then answer with `reply` (or nothing) and hang up.
async fn raw_appliance(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        while !request.ends_with(b"--<<--\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let _ = socket.write_all(reply).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{}/xmlfeed", addr)
}

#[tokio::test]
async fn test_garbage_reply_after_full_request_is_read_failure() {
    let url = raw_appliance(b"GARBAGE NOT HTTP\r\n\r\n").await;
    let client = FeedClient::new(FeedClientConfig::new(url)).unwrap();

    let err = client.send_feed(&feed("<gsafeed/>")).await.unwrap_err();
    assert!(matches!(err, TransmitError::FailedReadingReply(_)), "{:?}", err);
}

#[tokio::test]
async fn test_close_without_reply_is_read_failure() {
    let url = raw_appliance(b"").await;
    let client = FeedClient::new(FeedClientConfig::new(url)).unwrap();

    let err = client.send_feed(&feed("<gsafeed/>")).await.unwrap_err();
    assert!(matches!(err, TransmitError::FailedReadingReply(_)), "{:?}", err);
}

#[tokio::test]
async fn test_compressed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xmlfeed"))
        .and(header("content-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
        .expect(1)
        .mount(&server)
        .await;

    let config = FeedClientConfig::new(format!("{}/xmlfeed", server.uri())).with_compression(0, 1024 * 1024);
    let xml = format!("<gsafeed>{}</gsafeed>", "<record/>".repeat(200));
    FeedClient::new(config).unwrap().send_feed(&feed(&xml)).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let mut body = String::new();
    GzDecoder::new(&requests[0].body[..])
        .read_to_string(&mut body)
        .unwrap();
    assert!(body.contains(&xml));
    assert!(body.starts_with("--<<\r\n"));
}

#[tokio::test]
async fn test_body_above_window_is_not_compressed() {
    let server = MockServer::start().await;
    mount_reply(&server, 200, "Success").await;

    let config = FeedClientConfig::new(format!("{}/xmlfeed", server.uri())).with_compression(0, 16);
    FeedClient::new(config)
        .unwrap()
        .send_feed(&feed("<gsafeed/>"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("content-encoding").is_none());
    assert!(String::from_utf8_lossy(&requests[0].body).contains("<gsafeed/>"));
}
