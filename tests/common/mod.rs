#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread;

/// A request as the test server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub head: String,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.head
            .lines()
            .skip(1)
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.eq_ignore_ascii_case(name).then(|| value.trim())
            })
            .collect()
    }

    pub fn path(&self) -> &str {
        self.request_line().split_whitespace().nth(1).unwrap_or_default()
    }
}

pub struct TestServer {
    pub base: String,
    pub requests: Receiver<Recorded>,
}

impl TestServer {
    pub fn next_request(&self) -> Recorded {
        self.requests.recv().expect("server saw a request")
    }
}

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serves every connection with `handler`, one request per connection.
pub fn serve<F>(handler: F) -> TestServer
where
    F: Fn(&Recorded) -> Vec<u8> + Send + 'static,
{
    serve_with(|_| {}, handler)
}

/// Like [`serve`], but runs `preamble` on each raw stream first (proxy handshakes).
pub fn serve_with<P, F>(preamble: P, handler: F) -> TestServer
where
    P: Fn(&mut TcpStream) + Send + 'static,
    F: Fn(&Recorded) -> Vec<u8> + Send + 'static,
{
    init();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            preamble(&mut stream);
            let request = read_request(&mut stream);
            let response = handler(&request);
            let _ = stream.write_all(&response);
            let _ = stream.flush();
            if tx.send(request).is_err() {
                break;
            }
        }
    });

    TestServer { base, requests: rx }
}

fn read_request(stream: &mut TcpStream) -> Recorded {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut head = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let end = line == "\r\n";
        head.push_str(&line);
        if end {
            break;
        }
    }

    let recorded = Recorded { head, body: Vec::new() };
    let len = recorded
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; len];
    let _ = reader.read_exact(&mut body);
    Recorded { body, ..recorded }
}

/// A complete response with a Content-Length header.
pub fn response(status_line: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status_line}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

pub fn json_response(body: &str) -> Vec<u8> {
    response("200 OK", &[("Content-Type", "application/json")], body.as_bytes())
}
