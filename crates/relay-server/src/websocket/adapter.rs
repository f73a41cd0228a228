//! Adapts axum's split [`WebSocket`] halves to the relay's frame traits.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use relay_core::{Frame, FrameReader, FrameWriter, TransportError};

/// Receive half of an upgraded WebSocket.
pub struct WsReader(SplitStream<WebSocket>);

/// Send half of an upgraded WebSocket.
pub struct WsWriter(SplitSink<WebSocket, Message>);

/// Split an upgraded socket into relay reader and writer halves.
pub fn split(socket: WebSocket) -> (WsReader, WsWriter) {
    let (sink, stream) = socket.split();
    (WsReader(stream), WsWriter(sink))
}

/// Classify an incoming WebSocket message.
pub fn frame_from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data.to_vec()),
        Message::Ping(data) => Frame::Ping(data.to_vec()),
        Message::Pong(data) => Frame::Pong(data.to_vec()),
        Message::Close(_) => Frame::Close,
    }
}

/// Encode an outgoing frame as a WebSocket message.
pub fn message_from_frame(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close => Message::Close(None),
    }
}

#[async_trait]
impl FrameReader for WsReader {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        match self.0.next().await {
            Some(Ok(message)) => Ok(frame_from_message(message)),
            Some(Err(e)) => Err(TransportError::io(e)),
            None => Err(TransportError::Closed),
        }
    }
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.0
            .send(message_from_frame(frame))
            .await
            .map_err(TransportError::io)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0.close().await.map_err(TransportError::io)
    }
}
