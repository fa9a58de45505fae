//! Newline-delimited JSON over TCP.
//!
//! Each line a client writes is one [`Envelope`]; each line the service writes back is one
//! [`WireReply`]. Blocking operations simply hold the reply line until the region
//! releases the caller. Lines longer than [`MAX_LINE`] bytes are refused.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::envelope::{Envelope, WireReply};
use super::service::RegionService;
use crate::framework::{FrameworkError, RegionPort, SharedRegion};
use crate::model::{Caller, ProtocolError};

/// Longest line either side accepts, newline excluded.
pub const MAX_LINE: usize = 64 * 1024;

enum Frame {
    Line,
    TooLong,
    Closed,
}

/// Reads one line into `buf` without its newline, never buffering more than
/// `MAX_LINE + 1` bytes.
async fn read_frame<B>(reader: &mut B, buf: &mut Vec<u8>) -> io::Result<Frame>
where
    B: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = reader
        .take(MAX_LINE as u64 + 1)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(Frame::Closed);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.len() > MAX_LINE {
        return Ok(Frame::TooLong);
    }
    Ok(Frame::Line)
}

async fn write_frame<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut out = serde_json::to_vec(value).map_err(io::Error::other)?;
    out.push(b'\n');
    writer.write_all(&out).await
}

/// Accepts connections forever, one task per connection.
pub async fn serve<R>(listener: TcpListener, service: Arc<RegionService<R>>) -> io::Result<()>
where
    R: SharedRegion,
    R::Op: DeserializeOwned,
    R::Reply: Serialize + Sync,
{
    let region = short_name::<R>();
    info!(region, addr = %listener.local_addr()?, "Listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(region, %peer, "Connection accepted");
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, service).await {
                warn!(region, %peer, error = %e, "Connection failed");
            }
        });
    }
}

async fn handle_connection<R>(stream: TcpStream, service: Arc<RegionService<R>>) -> io::Result<()>
where
    R: SharedRegion,
    R::Op: DeserializeOwned,
    R::Reply: Serialize + Sync,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        let reply = match read_frame(&mut reader, &mut line).await? {
            Frame::Closed => return Ok(()),
            Frame::TooLong => {
                warn!(limit = MAX_LINE, "Request line too long, closing connection");
                let refused = WireReply::<R::Reply>::Rejected(ProtocolError::Malformed(format!(
                    "request line longer than {MAX_LINE} bytes"
                )));
                return write_frame(&mut writer, &refused).await;
            }
            Frame::Line => match serde_json::from_slice::<Envelope<R::Op>>(&line) {
                Ok(envelope) => service.handle(envelope).await,
                Err(e) => WireReply::Rejected(ProtocolError::Malformed(e.to_string())),
            },
        };
        write_frame(&mut writer, &reply).await?;
    }
}

/// A [`RegionPort`] that reaches a region service over TCP, one connection per call.
pub struct TcpPort<R> {
    addr: SocketAddr,
    _region: PhantomData<fn() -> R>,
}

impl<R> TcpPort<R> {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            _region: PhantomData,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl<R> Clone for TcpPort<R> {
    fn clone(&self) -> Self {
        Self::new(self.addr)
    }
}

fn transport(e: impl std::fmt::Display) -> FrameworkError {
    FrameworkError::Transport(e.to_string())
}

#[async_trait]
impl<R> RegionPort<R> for TcpPort<R>
where
    R: SharedRegion,
    R::Op: Serialize + Sync,
    R::Reply: DeserializeOwned,
{
    async fn call(&self, caller: Caller, op: R::Op) -> Result<R::Reply, FrameworkError> {
        let stream = TcpStream::connect(self.addr).await.map_err(transport)?;
        let (reader, mut writer) = stream.into_split();

        write_frame(&mut writer, &Envelope::new(caller, op))
            .await
            .map_err(transport)?;

        let mut reply = Vec::new();
        match read_frame(&mut BufReader::new(reader), &mut reply)
            .await
            .map_err(transport)?
        {
            Frame::Line => {}
            Frame::TooLong => {
                return Err(FrameworkError::Transport(format!(
                    "reply from {} longer than {MAX_LINE} bytes",
                    self.addr
                )));
            }
            Frame::Closed => {
                return Err(FrameworkError::Transport(format!(
                    "{} closed the connection",
                    self.addr
                )));
            }
        }
        serde_json::from_slice::<WireReply<R::Reply>>(&reply)
            .map_err(transport)?
            .into_result()
    }
}

fn short_name<R>() -> &'static str {
    std::any::type_name::<R>()
        .rsplit("::")
        .next()
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventConfig;
    use crate::framework::mock::MockPort;
    use crate::paddock::{Paddock, PaddockReply};

    async fn listen(mock: &MockPort<Paddock>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = Arc::new(RegionService::new(
            EventConfig::default().bounds(),
            Arc::new(mock.clone()),
        ));
        tokio::spawn(serve(listener, service));
        addr
    }

    #[tokio::test]
    async fn test_call_round_trips_over_tcp() {
        let mock = MockPort::<Paddock>::new();
        mock.expect("go_check_horses")
            .return_ok(PaddockReply::HorsesReady);
        let port = TcpPort::<Paddock>::new(listen(&mock).await);

        let reply = port
            .call(
                Caller::spectator(2),
                crate::paddock::PaddockOp::GoCheckHorses {
                    spectator: 2,
                    race: 1,
                },
            )
            .await
            .unwrap();

        assert_eq!(reply, PaddockReply::HorsesReady);
        assert_eq!(mock.calls(), vec![(Caller::spectator(2), "go_check_horses")]);
    }

    #[tokio::test]
    async fn test_malformed_line_is_rejected() {
        let mock = MockPort::<Paddock>::new();
        let addr = listen(&mock).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"caller\": 12}\n").await.unwrap();
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();

        let reply: WireReply<PaddockReply> = serde_json::from_str(&line).unwrap();
        assert!(matches!(
            reply,
            WireReply::Rejected(ProtocolError::Malformed(_))
        ));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_line_is_refused_and_closed() {
        let mock = MockPort::<Paddock>::new();
        let addr = listen(&mock).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        // One byte over the limit and no newline in sight.
        writer.write_all(&vec![b'x'; MAX_LINE + 1]).await.unwrap();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();

        let reply: WireReply<PaddockReply> = serde_json::from_str(&line).unwrap();
        match reply {
            WireReply::Rejected(ProtocolError::Malformed(reason)) => {
                assert!(reason.contains("longer than"), "{reason}")
            }
            other => panic!("unexpected reply {other:?}"),
        }
        line.clear();
        assert_eq!(reader.read_line(&mut line).await.unwrap(), 0);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_line_at_the_limit_is_still_read() {
        let mock = MockPort::<Paddock>::new();
        let addr = listen(&mock).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut request = vec![b' '; MAX_LINE - 2];
        request.extend_from_slice(b"{}\n");
        writer.write_all(&request).await.unwrap();
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();

        let reply: WireReply<PaddockReply> = serde_json::from_str(&line).unwrap();
        match reply {
            WireReply::Rejected(ProtocolError::Malformed(reason)) => {
                assert!(!reason.contains("longer than"), "{reason}")
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
