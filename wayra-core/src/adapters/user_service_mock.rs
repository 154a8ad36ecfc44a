//! Mock Wayra user service for testing
//!
//! A tiny HTTP/1.1 server on a random local port that answers the same two
//! endpoints as the real service:
//! - POST /create with a JSON body `{username, password}`
//! - GET /find?username=..&password=..

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Behaviour switches for the mock service
#[derive(Debug, Clone)]
pub struct MockUserServiceConfig {
    /// Status code answered by POST /create
    pub create_status: u16,
    /// Answer 401 to GET /find
    pub reject_credentials: bool,
    pub encryption_key: String,
}

impl Default for MockUserServiceConfig {
    fn default() -> Self {
        Self {
            create_status: 201,
            reject_credentials: false,
            encryption_key: "cw_0x689RpI-jtRR7oE8h_eQsKImvJapLeSbXpwF4e4=".to_string(),
        }
    }
}

pub struct MockUserService {
    port: u16,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockUserService {
    /// Start the mock service on a random available port
    pub fn start(config: MockUserServiceConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        thread::spawn(move || handle_connection(stream, &cfg));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockUserService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read one request: headers, then as much body as Content-Length announces
fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
    stream.set_nonblocking(false).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;

    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];
    loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);

        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let head = text[..header_end].to_string();
            let content_length = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                let body = String::from_utf8_lossy(&data[header_end + 4..]).to_string();
                return Some((head, body));
            }
        }
    }
    None
}

fn handle_connection(mut stream: TcpStream, config: &MockUserServiceConfig) {
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };

    let first_line = head.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", r#"{"error": "Invalid request"}"#);
        return;
    }

    let method = parts[0];
    let (path, query) = parts[1].split_once('?').unwrap_or((parts[1], ""));

    match (method, path) {
        ("POST", "/create") => {
            let request: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
            let username = request["username"].as_str().unwrap_or_default();
            let password = request["password"].as_str().unwrap_or_default();
            let json = user_record(username, password, config);
            send_response(&mut stream, config.create_status, "Created", &json);
        }
        ("GET", "/find") => {
            if config.reject_credentials {
                send_response(
                    &mut stream,
                    401,
                    "Unauthorized",
                    r#"{"error": "invalid credentials"}"#,
                );
                return;
            }
            let username = query_param(query, "username").unwrap_or_default();
            let password = query_param(query, "password").unwrap_or_default();
            let json = user_record(&username, &password, config);
            send_response(&mut stream, 200, "OK", &json);
        }
        _ => {
            send_response(&mut stream, 404, "Not Found", r#"{"error": "Endpoint not found"}"#);
        }
    }
}

fn user_record(username: &str, password: &str, config: &MockUserServiceConfig) -> String {
    serde_json::json!({
        "username": username,
        "password": password,
        "dbname": "Wayra",
        "dbuser": "postgres",
        "db_password": "postgres",
        "encryption_key": config.encryption_key,
    })
    .to_string()
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| decode_component(value))
}

/// Decode `application/x-www-form-urlencoded` text
fn decode_component(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(b) => {
                        out.push(b);
                        i += 2;
                    }
                    Err(_) => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
