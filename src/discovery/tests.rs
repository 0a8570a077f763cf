//! Tests for the discovery fallback chain against mock HTTP servers.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::{AddressResolver, DiscoveryConfig, DiscoveryResolver, status_url};

const FALLBACK: &str = "tcp://fallback:6362";

/// Reply served for every request to a mock server.
#[derive(Clone)]
struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Read the request line and headers, returning the request path.
fn read_request_path(stream: &mut TcpStream) -> String {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .expect("read request line");
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).expect("read header");
        if read == 0 || line.trim().is_empty() {
            break;
        }
    }
    request_line
        .split(' ')
        .nth(1)
        .unwrap_or_default()
        .to_string()
}

/// Spawn a server answering every request with `reply` and reporting the
/// requested paths.
fn spawn_server(listener: TcpListener, reply: Reply) -> (SocketAddr, mpsc::Receiver<String>) {
    let addr = listener.local_addr().expect("listener has address");
    let (path_tx, path_rx) = mpsc::channel();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let path = read_request_path(&mut stream);
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.status,
                status_text(reply.status),
                reply.body.len(),
                reply.body
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
            if path_tx.send(path).is_err() {
                break;
            }
        }
    });
    (addr, path_rx)
}

/// Address of a port nothing listens on.
fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    listener.local_addr().expect("listener has address")
}

#[fixture]
fn tcp_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

fn resolver(directory: String, default_status: String) -> DiscoveryResolver {
    DiscoveryResolver::new(
        DiscoveryConfig::default()
            .with_directory_url(directory)
            .with_default_status_url(default_status)
            .with_default_address(FALLBACK)
            .with_timeout(Duration::from_secs(2)),
    )
}

fn directory_body(instances: &[(&str, u16)]) -> String {
    let instances: Vec<String> = instances
        .iter()
        .map(|(host, port)| format!(r#"{{"HostIP":"{host}","WebPort":{port}}}"#))
        .collect();
    format!(
        r#"{{"data":{{"instance":[{}]}},"ok":true}}"#,
        instances.join(",")
    )
}

#[rstest]
fn falls_back_to_default_when_everything_fails() {
    let dead = closed_port();
    let resolver = resolver(
        format!("http://{dead}/v1/instances"),
        format!("http://{dead}/docker-instance"),
    );
    assert_eq!(resolver.resolve("svc"), FALLBACK);
}

#[rstest]
fn returns_successful_host_verbatim(tcp_listener: TcpListener) {
    let (status_addr, status_paths) = spawn_server(
        tcp_listener,
        Reply::ok(r#"{"status":"success","host":"tcp://h:1"}"#),
    );
    let directory_listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind directory");
    let (directory_addr, _) = spawn_server(
        directory_listener,
        Reply::ok(directory_body(&[("127.0.0.1", status_addr.port())])),
    );
    let resolver = resolver(
        format!("http://{directory_addr}/v1/instances"),
        format!("http://{}/docker-instance", closed_port()),
    );

    assert_eq!(resolver.resolve("svc-1"), "tcp://h:1");
    let path = status_paths
        .recv_timeout(Duration::from_secs(2))
        .expect("status queried");
    assert_eq!(path, "/docker-instance?service_id=svc-1");
}

#[rstest]
fn uses_default_status_url_when_directory_fails(tcp_listener: TcpListener) {
    let (status_addr, status_paths) = spawn_server(
        tcp_listener,
        Reply::ok(r#"{"status":"success","host":"tcp://default-status:7"}"#),
    );
    let resolver = resolver(
        format!("http://{}/v1/instances", closed_port()),
        format!("http://{status_addr}/docker-instance"),
    );

    assert_eq!(resolver.resolve("svc"), "tcp://default-status:7");
    let path = status_paths
        .recv_timeout(Duration::from_secs(2))
        .expect("default status queried");
    assert_eq!(path, "/docker-instance?service_id=svc");
}

#[rstest]
#[case::empty_list(Reply::ok(r#"{"data":{"instance":[]},"ok":true}"#))]
#[case::unusable_instances(Reply::ok(directory_body(&[("", 8080), ("10.0.0.1", 0)])))]
#[case::not_ok(Reply::ok(r#"{"data":{"instance":[{"HostIP":"10.0.0.1","WebPort":1}]},"ok":false}"#))]
#[case::malformed(Reply::ok("not json"))]
#[case::server_error(Reply { status: 500, body: "{}".into() })]
fn unusable_directory_falls_back_to_default_status_url(
    tcp_listener: TcpListener,
    #[case] directory_reply: Reply,
) {
    let (directory_addr, _) = spawn_server(tcp_listener, directory_reply);
    let resolver = resolver(
        format!("http://{directory_addr}/v1/instances"),
        "http://status.invalid/docker-instance".into(),
    );
    assert_eq!(
        resolver.candidates("svc"),
        vec!["http://status.invalid/docker-instance?service_id=svc".to_string()]
    );
}

#[rstest]
fn skips_failed_candidates_until_success(tcp_listener: TcpListener) {
    let (failing_addr, _) =
        spawn_server(tcp_listener, Reply::ok(r#"{"status":"failure"}"#));
    let malformed_listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind malformed");
    let (malformed_addr, _) = spawn_server(malformed_listener, Reply::ok("{"));
    let success_listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind success");
    let (success_addr, _) = spawn_server(
        success_listener,
        Reply::ok(r#"{"status":"success","host":"tcp://third:9"}"#),
    );
    let directory_listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind directory");
    let (directory_addr, _) = spawn_server(
        directory_listener,
        Reply::ok(directory_body(&[
            ("127.0.0.1", closed_port().port()),
            ("127.0.0.1", failing_addr.port()),
            ("127.0.0.1", malformed_addr.port()),
            ("127.0.0.1", success_addr.port()),
        ])),
    );
    let resolver = resolver(
        format!("http://{directory_addr}/v1/instances"),
        "http://status.invalid/docker-instance".into(),
    );
    assert_eq!(resolver.resolve("svc"), "tcp://third:9");
}

#[rstest]
fn success_without_host_is_not_usable(tcp_listener: TcpListener) {
    let (status_addr, _) = spawn_server(tcp_listener, Reply::ok(r#"{"status":"success"}"#));
    let resolver = resolver(
        format!("http://{}/v1/instances", closed_port()),
        format!("http://{status_addr}/docker-instance"),
    );
    assert_eq!(resolver.resolve("svc"), FALLBACK);
}

#[rstest]
#[case("http://h/docker-instance", "svc", "http://h/docker-instance?service_id=svc")]
#[case("http://h/docker-instance?x=1", "svc", "http://h/docker-instance?x=1&service_id=svc")]
#[case("http://h/d", "a b&c", "http://h/d?service_id=a%20b%26c")]
fn builds_status_urls(#[case] base: &str, #[case] service: &str, #[case] expected: &str) {
    assert_eq!(status_url(base, service), expected);
}
