//! `skynet-protocol` — wire-level frame shapes shared between
//! `skynet-gateway`'s WebSocket surface and any client. `session_ws` holds
//! the concrete frame bodies exchanged on the per-session chat socket.

pub mod session_ws;
