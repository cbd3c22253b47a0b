//! Scripted HTTP responder for wire tests: one canned response per
//! expected connection, raw requests captured for inspection.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

pub struct ScriptedServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    handle: Option<thread::JoinHandle<Vec<Vec<u8>>>>,
}

impl ScriptedServer {
    pub fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_thread = hits.clone();

        let handle = thread::spawn(move || {
            let mut captured = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                hits_in_thread.fetch_add(1, Ordering::SeqCst);
                captured.push(read_request(&mut stream));
                let response = format!(
                    "HTTP/1.1 {status} {}\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{body}",
                    reason_phrase(status),
                    body.len(),
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
            captured
        });

        ScriptedServer {
            url,
            hits,
            handle: Some(handle),
        }
    }

    /// Connections accepted so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Waits for the script to complete and returns the raw requests.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.handle.take().unwrap().join().unwrap()
    }
}

/// Reads headers plus a Content-Length-delimited body. Requests
/// without a body terminate at the blank line.
fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            return buf;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            let body_start = pos + 4;
            let headers = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);

            while buf.len() < body_start + content_length {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return buf;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
