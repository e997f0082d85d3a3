//! In-process fake servers for the integration tests.

#![allow(dead_code)]

use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use kvwire_common::read_request;

/// Fake server that records every request as `ID arg1 arg2`.
pub struct FakeServer {
    pub addr: SocketAddr,
    received: Receiver<String>,
}

impl FakeServer {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Requests seen so far, in arrival order.
    pub fn received(&self) -> Vec<String> {
        self.received.try_iter().collect()
    }
}

/// Spawns a server accepting `connections` clients in sequence.
///
/// `respond` gets the request parts (id first) and returns raw reply bytes;
/// an empty reply makes the server drop the connection instead.
pub fn spawn_server(connections: usize, respond: fn(&[Bytes]) -> Vec<u8>) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for _ in 0..connections {
            let (mut stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut line = Vec::new();
            while let Ok((id, args)) = read_request(&mut reader, &mut line) {
                let mut parts = vec![id];
                parts.extend(args);
                let text: Vec<String> = parts
                    .iter()
                    .map(|part| String::from_utf8_lossy(part).into_owned())
                    .collect();
                let _ = tx.send(text.join(" "));

                let reply = respond(&parts);
                if reply.is_empty() {
                    break;
                }
                if stream.write_all(&reply).and_then(|_| stream.flush()).is_err() {
                    break;
                }
            }
        }
    });

    FakeServer { addr, received: rx }
}

pub fn ok(_: &[Bytes]) -> Vec<u8> {
    b"+OK\r\n".to_vec()
}

pub fn bulk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

pub fn integer(value: i64) -> Vec<u8> {
    format!(":{value}\r\n").into_bytes()
}

pub fn error(message: &str) -> Vec<u8> {
    format!("-{message}\r\n").into_bytes()
}
