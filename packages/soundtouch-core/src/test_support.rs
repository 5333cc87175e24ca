//! Test doubles shared by the connection and simulator tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::Level;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::logging::LogSink;
use crate::runtime::Clock;

/// Sink that stores every message.
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, line)| line.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: Level, message: fmt::Arguments<'_>) {
        self.lines.lock().push((level, message.to_string()));
    }
}

/// Clock that records requested delays and returns immediately.
#[derive(Default)]
pub struct FakeClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Clock whose delays never finish.
pub struct StalledClock;

#[async_trait]
impl Clock for StalledClock {
    async fn sleep(&self, _duration: Duration) {
        std::future::pending::<()>().await;
    }
}

/// Server-side socket accepted by [`ws_listener`].
pub type ServerSocket = WebSocketStream<TcpStream>;

/// Binds a loopback WebSocket listener.
///
/// Returns the port and a channel yielding every accepted socket.
pub async fn ws_listener() -> (u16, mpsc::UnboundedReceiver<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
                if tx.send(ws).is_err() {
                    break;
                }
            }
        }
    });

    (port, rx)
}

/// Returns a loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Waits for the next text message on a server socket, skipping control frames.
pub async fn next_text(socket: &mut ServerSocket) -> Option<String> {
    while let Some(Ok(message)) = socket.next().await {
        if let Message::Text(text) = message {
            return Some(text.as_str().to_string());
        }
    }
    None
}

/// Polls `condition` until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
