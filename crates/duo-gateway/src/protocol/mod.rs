//! Wire protocol for the WebSocket gateway

mod messages;

pub use messages::{
    AckStatus, ClientFrame, ConnectParams, RoomRef, SendMessageData, ServerFrame,
};
