//! WebSocket Collaboration Protocol
//!
//! Connects editors to rooms and relays their edits in real time.
//!
//! ## Architecture
//!
//! - **Handler**: Handles WebSocket upgrade and the reader/writer tasks
//! - **Connection**: Per-connection state machine and message dispatch
//! - **BroadcastRouter**: Fans events out to the other members of a room
//! - **Messages**: Defines client and server message formats
//!
//! ## Usage
//!
//! Clients connect to `/` (or `/ws`), join a room, then exchange edits:
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:3001');
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'join', data: {roomId: 'abc123', username: 'Alice'}}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'code-change') editor.setValue(msg.data.code);
//! };
//! ```

mod broadcast;
mod connection;
mod handler;
mod messages;

pub use broadcast::{BroadcastRouter, DeliveryReport};
pub use connection::{Connection, ConnectionState};
pub use handler::websocket_handler;
pub use messages::{ClientMessage, ServerMessage};
