// Copyright 2024 The Rampart Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Blocking network transports for the server.
//!
//! One thread runs the UDP receive/respond loop for each bound address,
//! one thread accepts TCP connections, and each accepted connection is
//! handled on a thread of its own (with the two-octet length framing of
//! [RFC 1035 § 4.2.2]). The [`Server`](crate::server::Server) core is
//! shared immutably between all of them; it never blocks, so all
//! timeouts live here.
//!
//! [RFC 1035 § 4.2.2]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.2.2

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::message::MAX_MESSAGE_SIZE;
use crate::server::{ReceivedInfo, Server, Transport, XfrSink};

/// The receive buffer size for UDP queries. Queries are small; replies
/// are bounded separately by the EDNS payload negotiation.
const UDP_BUFFER_SIZE: usize = 512;

/// How long a TCP client may take to deliver a complete message before
/// the connection is dropped.
const READ_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Binds UDP and TCP sockets on `addr` and spawns the serving threads.
/// The threads run for the life of the process.
pub fn spawn(server: &Arc<Server>, addr: SocketAddr) -> io::Result<()> {
    let udp_socket = UdpSocket::bind(addr)?;
    let tcp_listener = TcpListener::bind(addr)?;
    info!("listening on {} (UDP and TCP)", addr);

    let udp_server = server.clone();
    thread::Builder::new()
        .name(format!("udp {}", addr))
        .spawn(move || log_io_errors(serve_udp(&udp_server, &udp_socket)))?;

    let tcp_server = server.clone();
    thread::Builder::new()
        .name(format!("tcp {}", addr))
        .spawn(move || log_io_errors(serve_tcp(&tcp_server, &tcp_listener)))?;

    Ok(())
}

/// The UDP receive/respond loop. Send failures are logged and do not
/// end the loop; only receive failures do.
fn serve_udp(server: &Arc<Server>, socket: &UdpSocket) -> io::Result<()> {
    let mut received_buf = [0u8; UDP_BUFFER_SIZE];
    loop {
        let (received_len, src) = match socket.recv_from(&mut received_buf) {
            Ok(result) => result,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let info = ReceivedInfo::new(src.ip(), Transport::Udp);
        if let Some(response) = server.handle_message(&received_buf[..received_len], info, None) {
            if let Err(e) = socket.send_to(&response, src) {
                debug!("failed to send UDP response to {}: {}", src, e);
            }
        }
    }
}

/// The TCP accept loop; each connection gets a thread of its own.
fn serve_tcp(server: &Arc<Server>, listener: &TcpListener) -> io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept() {
            Ok(result) => result,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let server = server.clone();
        let spawned = thread::Builder::new()
            .name(format!("tcp client {}", peer))
            .spawn(move || log_io_errors(handle_tcp_connection(&server, stream, peer)));
        if let Err(e) = spawned {
            error!("failed to spawn TCP connection thread: {}", e);
        }
    }
}

/// Serves one TCP connection until the client closes it (or errs, or
/// stalls past the read timeout).
fn handle_tcp_connection(
    server: &Arc<Server>,
    mut stream: TcpStream,
    peer: SocketAddr,
) -> io::Result<()> {
    stream.set_read_timeout(Some(READ_MESSAGE_TIMEOUT))?;
    let info = ReceivedInfo::new(peer.ip(), Transport::Tcp);
    let mut received_buf = vec![0u8; MAX_MESSAGE_SIZE];

    loop {
        let mut length = [0u8; 2];
        match stream.read_exact(&mut length) {
            Ok(()) => (),
            // EOF or a stalled client simply ends the connection.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(()),
            Err(e) => return Err(e),
        }
        let received_len = u16::from_be_bytes(length) as usize;
        stream.read_exact(&mut received_buf[..received_len])?;

        let response = {
            let mut sink = TcpSink {
                stream: &mut stream,
            };
            server.handle_message(&received_buf[..received_len], info, Some(&mut sink))
        };
        match response {
            Some(response) => {
                stream.write_all(&(response.len() as u16).to_be_bytes())?;
                stream.write_all(&response)?;
            }
            // Nothing to send: either the message was dropped or an
            // AXFR was already streamed. Either way, the exchange is
            // over.
            None => return Ok(()),
        }
    }
}

/// Frames AXFR stream messages onto a TCP connection.
struct TcpSink<'a> {
    stream: &'a mut TcpStream,
}

impl XfrSink for TcpSink<'_> {
    fn send_message(&mut self, octets: &[u8]) -> io::Result<()> {
        self.stream
            .write_all(&(octets.len() as u16).to_be_bytes())?;
        self.stream.write_all(octets)
    }
}

/// Logs errors if a serving task exits with an I/O error.
fn log_io_errors<T>(result: io::Result<T>) {
    if let Err(e) = result {
        let current_thread = thread::current();
        let thread_name = current_thread.name().unwrap_or("anonymous thread");
        error!("I/O error in thread {}: {}", thread_name, e);
    }
}
