use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::http::parser::{parse_http_request, ParseError};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::server::router::Router;

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    buffer: Vec<u8>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, router: Arc<Router>) -> Self {
        Self {
            stream,
            peer,
            router,
            buffer: Vec::with_capacity(4096),
            state: ConnectionState::Reading,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match &mut self.state {
                ConnectionState::Reading => match self.read_request().await {
                    Ok(Some(req)) => {
                        self.state = ConnectionState::Processing(req);
                    }
                    Ok(None) => {
                        self.state = ConnectionState::Closed;
                    }
                    Err(e) => {
                        // The request cannot be framed, so answer and hang up.
                        let response = Self::error_response(&e);
                        tracing::warn!(
                            peer = %self.peer,
                            error = %e,
                            "Rejecting malformed request"
                        );
                        let writer = ResponseWriter::new(&response, false);
                        self.state = ConnectionState::Writing(writer, false);
                    }
                },

                ConnectionState::Processing(req) => {
                    let keep_alive = req.keep_alive();
                    let span = tracing::info_span!(
                        "http.request",
                        http.method = %req.method,
                        http.url = %req.path,
                        http.host = req.header("Host").unwrap_or_default(),
                        http.user_agent = req.header("User-Agent").unwrap_or_default(),
                        http.status_code = tracing::field::Empty,
                        peer = %self.peer,
                    );
                    let response = span.in_scope(|| self.router.handle(req, self.peer));
                    span.record("http.status_code", response.status.as_u16());

                    let writer = ResponseWriter::new(&response, keep_alive);
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if *keep_alive {
                        self.state = ConnectionState::Reading;
                    } else {
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn read_request(&mut self) -> Result<Option<Request>, ParseError> {
        loop {
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    self.buffer.drain(..consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {}

                Err(e) => return Err(e),
            }

            let mut temp = [0u8; 8192];
            let n = match self.stream.read(&mut temp).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = %e, "Read failed");
                    return Ok(None);
                }
            };

            if n == 0 {
                // Client closed connection
                return Ok(None);
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
    }

    fn error_response(error: &ParseError) -> Response {
        if error.is_body_error() {
            Response::internal_error("Failed to read request body")
        } else {
            Response::text(StatusCode::BadRequest, &format!("400 Bad Request: {error}"))
        }
    }
}
