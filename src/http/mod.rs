//! HTTP/1.1 plumbing for the inbound side.
//!
//! Webhook senders talk plain HTTP/1.1 to this process, so the server is a
//! small hand-written one rather than a framework.
//!
//! - **`connection`**: per-connection request/response state machine
//! - **`parser`**: frames requests out of the read buffer (Content-Length and chunked bodies)
//! - **`request`**: request representation and the method allow-list
//! - **`response`**: response representation with builder
//! - **`writer`**: serializes responses onto the socket
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received          (malformed → error response, close)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Router produces the response
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
