use crate::{ClientConfig, ClientError, ModbusClient};
use readahead_cache::{ReadAhead, UnitSource};
use readahead_core::ReadFunction;
use readahead_datalink::{DataLinkError, ModbusTcpTransport};
use thiserror::Error;
use tokio::runtime::Runtime;

#[derive(Debug, Error)]
pub enum SyncClientError {
    #[error("runtime init error: {0}")]
    RuntimeInit(std::io::Error),
    #[error("datalink error: {0}")]
    DataLink(#[from] DataLinkError),
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

/// Blocking Modbus TCP client that drives its own tokio runtime.
pub struct SyncModbusTcpClient {
    runtime: Runtime,
    client: ModbusClient<ModbusTcpTransport>,
}

impl SyncModbusTcpClient {
    pub fn connect(addr: &str) -> Result<Self, SyncClientError> {
        Self::connect_with_config(addr, ClientConfig::default())
    }

    pub fn connect_with_config(addr: &str, config: ClientConfig) -> Result<Self, SyncClientError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(SyncClientError::RuntimeInit)?;
        let link = runtime.block_on(ModbusTcpTransport::connect(addr))?;
        let client = ModbusClient::with_config(link, config);
        Ok(Self { runtime, client })
    }

    pub fn config(&self) -> ClientConfig {
        self.client.config()
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> crate::ClientMetricsSnapshot {
        self.client.metrics_snapshot()
    }

    pub fn read_units(
        &self,
        unit_id: u8,
        function: ReadFunction,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, SyncClientError> {
        self.runtime
            .block_on(self.client.read_units(unit_id, function, start, quantity))
            .map_err(SyncClientError::Client)
    }

    pub fn read_coils(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, SyncClientError> {
        self.read_units(unit_id, ReadFunction::ReadCoils, start, quantity)
    }

    pub fn read_discrete_inputs(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, SyncClientError> {
        self.read_units(unit_id, ReadFunction::ReadDiscreteInputs, start, quantity)
    }

    pub fn read_holding_registers(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, SyncClientError> {
        self.read_units(unit_id, ReadFunction::ReadHoldingRegisters, start, quantity)
    }

    pub fn read_input_registers(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, SyncClientError> {
        self.read_units(unit_id, ReadFunction::ReadInputRegisters, start, quantity)
    }

    /// A [`UnitSource`] that reads from one unit through this client.
    pub fn unit(&self, unit_id: u8) -> UnitClient<'_> {
        UnitClient {
            client: self,
            unit_id,
        }
    }

    /// A read-ahead cache in front of one unit.
    pub fn readahead(&self, unit_id: u8, readahead_size: u16) -> ReadAhead<UnitClient<'_>> {
        ReadAhead::new(self.unit(unit_id), readahead_size)
    }
}

/// One unit of a [`SyncModbusTcpClient`], seen as a [`UnitSource`].
///
/// Reads longer than a single request may carry (2000 bits or 125 registers)
/// are split into consecutive requests and joined.
#[derive(Clone, Copy)]
pub struct UnitClient<'a> {
    client: &'a SyncModbusTcpClient,
    unit_id: u8,
}

impl UnitClient<'_> {
    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn fetch(
        &self,
        function: ReadFunction,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, SyncClientError> {
        let mut units = Vec::with_capacity(usize::from(quantity) * readahead_core::UNIT_LEN);
        for (start, count) in chunks(address, quantity, function.max_quantity()) {
            let part = self.client.read_units(self.unit_id, function, start, count)?;
            units.extend_from_slice(&part);
        }
        Ok(units)
    }
}

/// Splits `quantity` units at `address` into runs of at most `max` units.
fn chunks(address: u16, quantity: u16, max: u16) -> impl Iterator<Item = (u16, u16)> {
    let end = u32::from(address) + u32::from(quantity);
    let step = u32::from(max.max(1));
    (u32::from(address)..end)
        .step_by(step as usize)
        .map(move |start| (start as u16, (end - start).min(step) as u16))
}

impl UnitSource for UnitClient<'_> {
    type Error = SyncClientError;

    fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<u8>, Self::Error> {
        self.fetch(ReadFunction::ReadCoils, address, quantity)
    }

    fn read_discrete_inputs(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        self.fetch(ReadFunction::ReadDiscreteInputs, address, quantity)
    }

    fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        self.fetch(ReadFunction::ReadHoldingRegisters, address, quantity)
    }

    fn read_input_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        self.fetch(ReadFunction::ReadInputRegisters, address, quantity)
    }
}
