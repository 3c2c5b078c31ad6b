use clap::{Args, ValueEnum};
use readahead_cache::{ReadAhead, ReadAheadError, ReadFunction, UnitSource};
use readahead_client::{ClientConfig, SyncClientError, SyncModbusTcpClient};
use std::time::Duration;

#[derive(Debug, Clone, Args)]
pub struct TcpConnectionArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = 502)]
    pub port: u16,
    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub timeout: u64,
    #[arg(long, default_value_t = 1)]
    pub retries: u8,
    #[arg(long, default_value_t = 1)]
    pub unit_id: u8,
}

#[derive(Debug, Clone, Args)]
pub struct CacheArgs {
    #[arg(long, value_enum, default_value_t = FunctionArg::Holding)]
    pub function: FunctionArg,
    /// Units fetched on every cache miss.
    #[arg(long, default_value_t = 64)]
    pub readahead: u16,
    /// Ranges to read, as `ADDR` or `ADDR:QTY`.
    #[arg(required = true, value_parser = parse_range)]
    pub ranges: Vec<ReadRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FunctionArg {
    Coils,
    Discrete,
    Holding,
    Input,
}

impl From<FunctionArg> for ReadFunction {
    fn from(value: FunctionArg) -> Self {
        match value {
            FunctionArg::Coils => Self::ReadCoils,
            FunctionArg::Discrete => Self::ReadDiscreteInputs,
            FunctionArg::Holding => Self::ReadHoldingRegisters,
            FunctionArg::Input => Self::ReadInputRegisters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRange {
    pub address: u16,
    pub quantity: u16,
}

pub fn parse_range(input: &str) -> Result<ReadRange, String> {
    let input = input.trim();
    let (address, quantity) = match input.split_once(':') {
        Some((address, quantity)) => (address, Some(quantity)),
        None => (input, None),
    };
    let address = parse_u16(address).ok_or_else(|| format!("invalid address: {input}"))?;
    let quantity = match quantity {
        Some(quantity) => parse_u16(quantity).ok_or_else(|| format!("invalid quantity: {input}"))?,
        None => 1,
    };
    if quantity == 0 {
        return Err(format!("quantity must be at least 1: {input}"));
    }
    if u32::from(address) + u32::from(quantity) > 1 << 16 {
        return Err(format!("range passes address 65535: {input}"));
    }
    Ok(ReadRange { address, quantity })
}

/// Decimal or `0x`-prefixed hexadecimal.
fn parse_u16(input: &str) -> Option<u16> {
    let input = input.trim();
    match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => input.parse().ok(),
    }
}

pub fn build_client(args: &TcpConnectionArgs) -> Result<SyncModbusTcpClient, SyncClientError> {
    let addr = format!("{}:{}", args.host, args.port);
    let config = ClientConfig::default()
        .with_response_timeout(Duration::from_millis(args.timeout))
        .with_retry_count(args.retries);
    SyncModbusTcpClient::connect_with_config(&addr, config)
}

/// Reads every range once through `cache` and formats one line per unit.
pub fn render_ranges<S: UnitSource>(
    cache: &mut ReadAhead<S>,
    function: ReadFunction,
    ranges: &[ReadRange],
) -> Result<Vec<String>, ReadAheadError<S::Error>> {
    let mut lines = Vec::new();
    for range in ranges {
        let bytes = cache.read(function, range.address, range.quantity)?;
        for (offset, unit) in bytes.chunks_exact(2).enumerate() {
            let value = u16::from_be_bytes([unit[0], unit[1]]);
            let address = u32::from(range.address) + offset as u32;
            lines.push(if function.is_bit_access() {
                format!("addr={address} value={}", value != 0)
            } else {
                format!("addr={address} value={value} (0x{value:04X})")
            });
        }
    }
    Ok(lines)
}

pub fn print_ranges<S: UnitSource>(
    cache: &mut ReadAhead<S>,
    function: ReadFunction,
    ranges: &[ReadRange],
) -> Result<(), ReadAheadError<S::Error>> {
    for line in render_ranges(cache, function, ranges)? {
        println!("{line}");
    }
    Ok(())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
