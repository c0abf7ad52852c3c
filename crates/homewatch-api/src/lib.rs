// homewatch-api: wire types and transport for the homewatch relay (HTTP + WebSocket)

pub mod client;
pub mod error;
pub mod event;
pub mod realtime;
pub mod transport;
pub mod websocket;

pub use client::{EventsClient, HealthStatus, Pong};
pub use error::Error;
pub use event::{Event, EventAck, IngestResponse, RawNotification};
pub use realtime::{
    AlertNotice, ButtonPressed, CameraStatus, Channel, EventDetails, MotionDetected,
    RealtimeMessage,
};
pub use transport::TransportConfig;
pub use websocket::{LinkEvent, ReconnectConfig, WebSocketHandle};
