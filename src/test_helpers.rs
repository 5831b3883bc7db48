//! Stub server and wire helpers for tests

use std::collections::BTreeMap;

use tokio::io::{duplex, DuplexStream};
use tokio::task::JoinHandle;

use crate::protocol::constants::HEADER_SIZE;
use crate::protocol::{Command, Header, TransportError};
use crate::utils::io::{recv_exact, send_exact};

const ENOENT: u32 = 2;

/// Encoded header bytes, for scripting mock streams
pub fn encoded(command: Command, byte_count: u32, filename: &str) -> Vec<u8> {
    let mut header = Header::with_filename(command, filename);
    header.byte_count = byte_count;
    header.encode().unwrap().to_vec()
}

/// Run an in-memory server that keeps files verbatim.
///
/// Serves until the client side is dropped or shut down, then yields the
/// files it holds.
pub fn spawn_stub_server(
    files: BTreeMap<String, Vec<u8>>,
) -> (DuplexStream, JoinHandle<BTreeMap<String, Vec<u8>>>) {
    let (client, server) = duplex(4096);
    let handle = tokio::spawn(serve(server, files));
    (client, handle)
}

async fn serve(
    mut stream: DuplexStream,
    mut files: BTreeMap<String, Vec<u8>>,
) -> BTreeMap<String, Vec<u8>> {
    loop {
        let buf = match recv_exact(&mut stream, HEADER_SIZE).await {
            Ok(buf) => buf,
            Err(TransportError::PrematureEof { received: 0, .. }) => return files,
            Err(e) => panic!("stub server: {e}"),
        };
        let request = Header::decode(&buf).unwrap();

        let (reply, payload) = match request.command {
            Command::Ls => {
                let listing: String = files.keys().map(|name| format!("{name}\n")).collect();
                (Header::new(Command::Lsout), listing.into_bytes())
            }
            Command::Put => {
                let body = recv_exact(&mut stream, request.byte_count as usize)
                    .await
                    .unwrap();
                let _ = files.insert(request.filename, body);
                (Header::new(Command::Ack), Vec::new())
            }
            Command::Get => match files.get(&request.filename) {
                Some(body) => (Header::with_filename(Command::File, &request.filename), body.clone()),
                None => (nak(ENOENT), Vec::new()),
            },
            Command::Rm => match files.remove(&request.filename) {
                Some(_) => (Header::new(Command::Ack), Vec::new()),
                None => (nak(ENOENT), Vec::new()),
            },
            _ => (Header::new(Command::Error), Vec::new()),
        };

        let mut reply = reply;
        if reply.command != Command::Nak {
            reply.byte_count = payload.len() as u32;
        }
        send_exact(&mut stream, &reply.encode().unwrap()).await.unwrap();
        send_exact(&mut stream, &payload).await.unwrap();
    }
}

fn nak(code: u32) -> Header {
    let mut header = Header::new(Command::Nak);
    header.byte_count = code;
    header
}
