//! Modbus read client for the read-ahead cache.
//!
//! [`ModbusClient`] issues the four read requests over any [`DataLink`] and
//! returns the result as unit bytes (two per coil, input or register), the
//! shape [`readahead_cache::UnitSource`] expects. [`SyncModbusTcpClient`]
//! wraps it for blocking callers and hands out per-unit sources.

#![forbid(unsafe_code)]

pub mod sync;

pub use sync::{SyncClientError, SyncModbusTcpClient, UnitClient};

use readahead_core::encoding::{Reader, Writer};
use readahead_core::pdu::{ExceptionResponse, MAX_PDU_LEN, ReadRequest, Response};
use readahead_core::{DecodeError, EncodeError, ReadFunction, UNIT_LEN};
use readahead_datalink::{DataLink, DataLinkError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    pub response_timeout: Duration,
    /// Extra attempts after a transport error or timeout.
    pub retry_count: u8,
    /// Minimum spacing between consecutive requests.
    pub throttle_delay: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            retry_count: 3,
            throttle_delay: None,
        }
    }
}

impl ClientConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u8) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_throttle_delay(mut self, throttle_delay: Option<Duration>) -> Self {
        self.throttle_delay = throttle_delay;
        self
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("datalink error: {0}")]
    DataLink(#[from] DataLinkError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("request timed out")]
    Timeout,
    #[error("modbus exception: {0}")]
    Exception(ExceptionResponse),
    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),
}

impl ClientError {
    /// Transport failures and timeouts may clear up on another attempt;
    /// anything the server actually answered will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DataLink(err) => err.is_transient(),
            Self::Timeout => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Counter {
    Request,
    Success,
    Retry,
    Timeout,
    Transport,
    Exception,
    Decode,
}

#[cfg(feature = "metrics")]
#[derive(Debug, Default)]
struct ClientMetrics {
    counters: [AtomicU64; 7],
}

#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientMetricsSnapshot {
    pub requests_total: u64,
    pub successful_responses: u64,
    pub retries_total: u64,
    pub timeouts_total: u64,
    pub transport_errors_total: u64,
    pub exceptions_total: u64,
    pub decode_errors_total: u64,
}

#[cfg(feature = "metrics")]
impl ClientMetrics {
    fn bump(&self, counter: Counter) {
        self.counters[counter as usize].fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> ClientMetricsSnapshot {
        ClientMetricsSnapshot {
            requests_total: self.get(Counter::Request),
            successful_responses: self.get(Counter::Success),
            retries_total: self.get(Counter::Retry),
            timeouts_total: self.get(Counter::Timeout),
            transport_errors_total: self.get(Counter::Transport),
            exceptions_total: self.get(Counter::Exception),
            decode_errors_total: self.get(Counter::Decode),
        }
    }
}

/// Async client for the four Modbus read functions.
///
/// Requests go out one at a time per [`DataLink`]; failed attempts are
/// retried up to `retry_count` times when [`ClientError::is_retryable`].
pub struct ModbusClient<D: DataLink> {
    datalink: D,
    config: ClientConfig,
    last_request_at: Mutex<Option<Instant>>,
    correlation_ids: AtomicU64,
    #[cfg(feature = "metrics")]
    metrics: ClientMetrics,
}

impl<D: DataLink> ModbusClient<D> {
    pub fn new(datalink: D) -> Self {
        Self::with_config(datalink, ClientConfig::default())
    }

    pub fn with_config(datalink: D, config: ClientConfig) -> Self {
        Self {
            datalink,
            config,
            last_request_at: Mutex::new(None),
            correlation_ids: AtomicU64::new(1),
            #[cfg(feature = "metrics")]
            metrics: ClientMetrics::default(),
        }
    }

    pub fn config(&self) -> ClientConfig {
        self.config
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> ClientMetricsSnapshot {
        self.metrics.snapshot()
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn count(&self, counter: Counter) {
        #[cfg(feature = "metrics")]
        self.metrics.bump(counter);
    }

    /// Waits until `throttle_delay` has passed since the previous request.
    async fn throttle(&self) {
        let Some(delay) = self.config.throttle_delay else {
            return;
        };
        let mut last = self.last_request_at.lock().await;
        if let Some(wait) = last.and_then(|previous| delay.checked_sub(previous.elapsed())) {
            sleep(wait).await;
        }
        *last = Some(Instant::now());
    }

    async fn exchange_with_retry(
        &self,
        correlation_id: u64,
        unit_id: u8,
        request_pdu: &[u8],
        response_buf: &mut [u8],
    ) -> Result<usize, ClientError> {
        self.throttle().await;
        self.count(Counter::Request);

        let attempts = u32::from(self.config.retry_count) + 1;
        let mut attempt = 1;
        loop {
            let exchange = self.datalink.exchange(unit_id, request_pdu, response_buf);
            let err = match timeout(self.config.response_timeout, exchange).await {
                Ok(Ok(len)) => {
                    debug!(correlation_id, unit_id, attempt, len, "modbus read answered");
                    self.count(Counter::Success);
                    return Ok(len);
                }
                Ok(Err(err)) => {
                    self.count(Counter::Transport);
                    ClientError::DataLink(err)
                }
                Err(_) => {
                    self.count(Counter::Timeout);
                    ClientError::Timeout
                }
            };

            if attempt >= attempts || !err.is_retryable() {
                return Err(err);
            }
            warn!(correlation_id, unit_id, attempt, error = %err, "retrying modbus read");
            self.count(Counter::Retry);
            attempt += 1;
        }
    }

    /// Reads `quantity` units of `function` starting at `start` and returns
    /// them as `quantity * 2` bytes. Registers keep their wire order; coils
    /// and discrete inputs become `0x0000` or `0x0001` per unit.
    pub async fn read_units(
        &self,
        unit_id: u8,
        function: ReadFunction,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        let correlation_id = self.correlation_ids.fetch_add(1, Ordering::Relaxed);
        let request = ReadRequest::new(function, start, quantity);
        let mut req_buf = [0u8; ReadRequest::LEN];
        let mut writer = Writer::new(&mut req_buf);
        request.encode(&mut writer)?;

        debug!(
            correlation_id,
            unit_id,
            function = function.as_u8(),
            start,
            quantity,
            "dispatching modbus read"
        );

        let mut response_buf = [0u8; MAX_PDU_LEN];
        let response_len = self
            .exchange_with_retry(correlation_id, unit_id, writer.as_written(), &mut response_buf)
            .await?;

        let mut reader = Reader::new(&response_buf[..response_len]);
        let response = match Response::decode(&mut reader) {
            Ok(resp) => resp,
            Err(err) => {
                self.count(Counter::Decode);
                return Err(ClientError::Decode(err));
            }
        };
        if !reader.is_empty() {
            self.count(Counter::Decode);
            return Err(ClientError::InvalidResponse("trailing bytes in response"));
        }

        let data = match response {
            Response::Exception(ex) => {
                self.count(Counter::Exception);
                return Err(ClientError::Exception(ex));
            }
            Response::Read(data) if data.function == function => data,
            Response::Read(_) => {
                return Err(ClientError::InvalidResponse("unexpected function response"));
            }
        };
        if !data.covers(quantity) {
            return Err(ClientError::InvalidResponse(
                "payload shorter than requested",
            ));
        }

        let mut units = vec![0u8; usize::from(quantity) * UNIT_LEN];
        data.write_units(quantity, &mut Writer::new(&mut units))?;
        Ok(units)
    }

    pub async fn read_coils(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        self.read_units(unit_id, ReadFunction::ReadCoils, start, quantity)
            .await
    }

    pub async fn read_discrete_inputs(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        self.read_units(unit_id, ReadFunction::ReadDiscreteInputs, start, quantity)
            .await
    }

    pub async fn read_holding_registers(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        self.read_units(unit_id, ReadFunction::ReadHoldingRegisters, start, quantity)
            .await
    }

    pub async fn read_input_registers(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, ClientError> {
        self.read_units(unit_id, ReadFunction::ReadInputRegisters, start, quantity)
            .await
    }
}
