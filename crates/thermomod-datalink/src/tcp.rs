use crate::{DataLink, DataLinkError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use thermomod_core::encoding::{Reader, Writer};
use thermomod_core::frame::tcp::{self as mbap, MAX_PDU_LEN, MBAP_HEADER_LEN, MbapHeader};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::{debug, trace};

const MAX_FRAME_LEN: usize = MBAP_HEADER_LEN + MAX_PDU_LEN;

/// Modbus TCP client connection. Exchanges are serialized on one socket.
#[derive(Debug)]
pub struct ModbusTcpTransport {
    stream: Mutex<TcpStream>,
    transaction_id: AtomicU16,
}

impl ModbusTcpTransport {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, DataLinkError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream))
    }

    /// Like [`connect`](Self::connect), failing with
    /// [`DataLinkError::Timeout`] once `limit` has elapsed.
    pub async fn connect_timeout<A: ToSocketAddrs>(
        addr: A,
        limit: Duration,
    ) -> Result<Self, DataLinkError> {
        match tokio::time::timeout(limit, Self::connect(addr)).await {
            Ok(result) => result,
            Err(_) => Err(DataLinkError::Timeout),
        }
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: Mutex::new(stream),
            transaction_id: AtomicU16::new(1),
        }
    }
}

async fn fill(stream: &mut TcpStream, buf: &mut [u8]) -> Result<(), DataLinkError> {
    stream.read_exact(buf).await.map(drop).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            DataLinkError::ConnectionClosed
        } else {
            DataLinkError::Io(err)
        }
    })
}

/// Receive one frame. The whole announced PDU is consumed even when it is
/// rejected, so the socket stays aligned on frame boundaries.
async fn receive(
    stream: &mut TcpStream,
    response_pdu: &mut [u8],
) -> Result<(MbapHeader, usize), DataLinkError> {
    let mut head = [0u8; MBAP_HEADER_LEN];
    fill(stream, &mut head).await?;
    let header = MbapHeader::decode(&mut Reader::new(&head))?;
    let pdu_len = header.pdu_len();

    if pdu_len <= MAX_PDU_LEN && pdu_len <= response_pdu.len() {
        fill(stream, &mut response_pdu[..pdu_len]).await?;
    } else {
        let mut scratch = [0u8; 64];
        let mut left = pdu_len;
        while left > 0 {
            let take = left.min(scratch.len());
            fill(stream, &mut scratch[..take]).await?;
            left -= take;
        }
    }
    Ok((header, pdu_len))
}

/// Whether `got` was issued before `expected`, allowing for wraparound.
/// Such a frame answers an earlier exchange that was abandoned, usually
/// on a response timeout.
fn is_stale(got: u16, expected: u16) -> bool {
    (1..0x8000).contains(&expected.wrapping_sub(got))
}

fn verify(
    header: &MbapHeader,
    pdu_len: usize,
    transaction_id: u16,
    unit_id: u8,
    capacity: usize,
) -> Result<(), DataLinkError> {
    if header.transaction_id != transaction_id {
        Err(DataLinkError::MismatchedTransactionId {
            expected: transaction_id,
            got: header.transaction_id,
        })
    } else if header.unit_id != unit_id {
        Err(DataLinkError::InvalidResponse("unit id mismatch"))
    } else if pdu_len > MAX_PDU_LEN {
        Err(DataLinkError::InvalidResponse("response pdu too large"))
    } else if pdu_len > capacity {
        Err(DataLinkError::ResponseBufferTooSmall {
            needed: pdu_len,
            available: capacity,
        })
    } else {
        Ok(())
    }
}

#[async_trait]
impl DataLink for ModbusTcpTransport {
    async fn exchange(
        &self,
        unit_id: u8,
        request_pdu: &[u8],
        response_pdu: &mut [u8],
    ) -> Result<usize, DataLinkError> {
        if request_pdu.is_empty() {
            return Err(DataLinkError::InvalidResponse("empty request pdu"));
        }

        let transaction_id = self.transaction_id.fetch_add(1, Ordering::Relaxed);
        let mut frame = [0u8; MAX_FRAME_LEN];
        let mut writer = Writer::new(&mut frame);
        mbap::encode_frame(&mut writer, transaction_id, unit_id, request_pdu)?;

        let mut stream = self.stream.lock().await;
        trace!(transaction_id, unit_id, len = request_pdu.len(), "tx");
        stream.write_all(writer.as_written()).await?;

        let (header, pdu_len) = loop {
            let (header, pdu_len) = receive(&mut stream, response_pdu).await?;
            if !is_stale(header.transaction_id, transaction_id) {
                break (header, pdu_len);
            }
            debug!(
                expected = transaction_id,
                got = header.transaction_id,
                "discarding late response"
            );
        };
        verify(&header, pdu_len, transaction_id, unit_id, response_pdu.len())?;
        trace!(transaction_id, unit_id, len = pdu_len, "rx");
        Ok(pdu_len)
    }

    async fn close(&self) -> Result<(), DataLinkError> {
        let mut stream = self.stream.lock().await;
        debug!(peer = ?stream.peer_addr().ok(), "closing modbus tcp connection");
        match stream.shutdown().await {
            Err(err) if err.kind() != ErrorKind::NotConnected => Err(DataLinkError::Io(err)),
            _ => Ok(()),
        }
    }
}
