// SPDX-License-Identifier: AGPL-3.0-or-later

//! A raw, unframed TCP session: the application payload is the wire
//! payload, with no header or correlation layered on top.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::warn;

use crate::endpoint::Endpoint;

#[derive(Debug)]
pub struct NetworkSession {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl NetworkSession {
    pub async fn connect(endpoint: &Endpoint) -> Option<Self> {
        let addr = endpoint.first_address()?;
        let stream = match TcpStream::connect(addr).await {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to connect network session to {addr}: {e}");
                return None;
            },
        };
        let (r, w) = stream.into_split();
        Some(Self {
            reader: Mutex::new(Some(r)),
            writer: Mutex::new(Some(w)),
        })
    }

    /// Sends `data` and reads the response to EOF (the source reads a
    /// buffered stream to completion; callers that need partial reads
    /// should use a framed session instead).
    pub async fn request(&self, data: &[u8]) -> Option<Vec<u8>> {
        {
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut()?;
            if let Err(e) = writer.write_all(data).await {
                warn!("network session write failed: {e}");
                return None;
            }
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut()?;
        let mut out = Vec::new();
        match reader.read_to_end(&mut out).await {
            Ok(_) => Some(out),
            Err(e) => {
                warn!("network session read failed: {e}");
                None
            },
        }
    }

    pub async fn close(&self) {
        if let Some(mut w) = self.writer.lock().await.take() {
            let _ = w.shutdown().await;
        }
        self.reader.lock().await.take();
    }
}
