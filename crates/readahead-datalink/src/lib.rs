//! Async Modbus transport layer.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use readahead_core::encoding::{Reader, Writer};
use readahead_core::frame::tcp::{self, MbapHeader};
use readahead_core::pdu::MAX_PDU_LEN;
use readahead_core::{DecodeError, EncodeError};
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, Error)]
pub enum DataLinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),
    #[error("transaction id mismatch: expected {expected}, got {got}")]
    MismatchedTransactionId { expected: u16, got: u16 },
    #[error("unit id mismatch: expected {expected}, got {got}")]
    MismatchedUnitId { expected: u8, got: u8 },
    #[error("response buffer too small (needed {needed}, available {available})")]
    ResponseBufferTooSmall { needed: usize, available: usize },
}

impl DataLinkError {
    /// Whether a fresh attempt over the same link can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed)
    }
}

#[async_trait]
pub trait DataLink: Send + Sync {
    /// Send a request PDU to a unit and write the response PDU into `response_pdu`.
    ///
    /// Returns the number of response bytes written to `response_pdu`.
    async fn exchange(
        &self,
        unit_id: u8,
        request_pdu: &[u8],
        response_pdu: &mut [u8],
    ) -> Result<usize, DataLinkError>;
}

#[derive(Debug)]
pub struct ModbusTcpTransport {
    stream: Mutex<TcpStream>,
    next_transaction_id: AtomicU16,
}

impl ModbusTcpTransport {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, DataLinkError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: Mutex::new(stream),
            next_transaction_id: AtomicU16::new(1),
        }
    }

    fn next_tid(&self) -> u16 {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }
}

async fn read_frame_part(stream: &mut TcpStream, buf: &mut [u8]) -> Result<(), DataLinkError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(DataLinkError::ConnectionClosed)
        }
        Err(err) => Err(DataLinkError::Io(err)),
    }
}

async fn discard(stream: &mut TcpStream, mut len: usize) -> Result<(), DataLinkError> {
    let mut scratch = [0u8; 64];
    while len > 0 {
        let chunk = len.min(scratch.len());
        read_frame_part(stream, &mut scratch[..chunk]).await?;
        len -= chunk;
    }
    Ok(())
}

/// Whether `got` was issued before `expected`, by u16 serial number order.
/// Such a frame answers an exchange that was abandoned after its request went
/// out, typically on a response timeout.
fn is_stale(got: u16, expected: u16) -> bool {
    matches!(expected.wrapping_sub(got), 1..=0x7FFF)
}

/// Reasons to refuse a response frame once its header is known. The PDU is
/// drained before any of these is reported so the next exchange starts on a
/// frame boundary.
fn header_error(
    header: &MbapHeader,
    transaction_id: u16,
    unit_id: u8,
    available: usize,
) -> Option<DataLinkError> {
    if header.transaction_id != transaction_id {
        return Some(DataLinkError::MismatchedTransactionId {
            expected: transaction_id,
            got: header.transaction_id,
        });
    }
    if header.unit_id != unit_id {
        return Some(DataLinkError::MismatchedUnitId {
            expected: unit_id,
            got: header.unit_id,
        });
    }
    let pdu_len = header.pdu_len();
    if pdu_len > MAX_PDU_LEN {
        return Some(DataLinkError::InvalidResponse("response pdu too large"));
    }
    if pdu_len > available {
        return Some(DataLinkError::ResponseBufferTooSmall {
            needed: pdu_len,
            available,
        });
    }
    None
}

#[async_trait]
impl DataLink for ModbusTcpTransport {
    async fn exchange(
        &self,
        unit_id: u8,
        request_pdu: &[u8],
        response_pdu: &mut [u8],
    ) -> Result<usize, DataLinkError> {
        let transaction_id = self.next_tid();
        let mut frame = [0u8; tcp::MAX_FRAME_LEN];
        let mut writer = Writer::new(&mut frame);
        tcp::encode_frame(&mut writer, transaction_id, unit_id, request_pdu)?;

        let mut stream = self.stream.lock().await;
        trace!(
            transaction_id,
            unit_id,
            pdu_len = request_pdu.len(),
            "sending modbus tcp request"
        );
        stream.write_all(writer.as_written()).await?;

        let mut mbap = [0u8; tcp::MBAP_HEADER_LEN];
        let header = loop {
            read_frame_part(&mut stream, &mut mbap).await?;
            let header = MbapHeader::decode(&mut Reader::new(&mbap))?;
            if !is_stale(header.transaction_id, transaction_id) {
                break header;
            }
            trace!(
                transaction_id,
                stale = header.transaction_id,
                "skipping late modbus tcp response"
            );
            discard(&mut stream, header.pdu_len()).await?;
        };
        let pdu_len = header.pdu_len();

        if let Some(err) = header_error(&header, transaction_id, unit_id, response_pdu.len()) {
            discard(&mut stream, pdu_len).await?;
            return Err(err);
        }

        read_frame_part(&mut stream, &mut response_pdu[..pdu_len]).await?;
        trace!(
            transaction_id,
            unit_id,
            pdu_len,
            "received modbus tcp response"
        );
        Ok(pdu_len)
    }
}
