use crate::config::ReadAheadConfig;
use crate::error::ReadAheadError;
use crate::source::UnitSource;
use crate::window::Window;
use crate::ADDRESS_SPACE;
use readahead_core::{ReadFunction, UNIT_LEN};
use std::collections::HashMap;
use tracing::{debug, trace};

#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadAheadMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub fetch_errors: u64,
    pub windows: usize,
}

#[cfg(feature = "metrics")]
impl ReadAheadMetricsSnapshot {
    /// Counts accumulated since `earlier`. `windows` stays the current total.
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            hits: self.hits.saturating_sub(earlier.hits),
            misses: self.misses.saturating_sub(earlier.misses),
            fetch_errors: self.fetch_errors.saturating_sub(earlier.fetch_errors),
            windows: self.windows,
        }
    }
}

#[cfg(feature = "metrics")]
#[derive(Debug, Default)]
struct ReadAheadMetrics {
    hits: u64,
    misses: u64,
    fetch_errors: u64,
}

/// Serves reads out of previously fetched windows, fetching an enlarged
/// window from the source on a miss.
///
/// Windows accumulate per function code in fetch order and are searched in
/// that order; the first window containing the whole request wins. Nothing is
/// evicted or merged. Use [`ReadAhead::clear`] to drop everything.
///
/// The coordinator is single-threaded: wrap it in a mutex to share it.
pub struct ReadAhead<S: UnitSource> {
    source: S,
    config: ReadAheadConfig,
    windows: HashMap<ReadFunction, Vec<Window>>,
    #[cfg(feature = "metrics")]
    metrics: ReadAheadMetrics,
}

impl<S: UnitSource> ReadAhead<S> {
    pub fn new(source: S, readahead_size: u16) -> Self {
        Self::with_config(
            source,
            ReadAheadConfig::default().with_readahead_size(readahead_size),
        )
    }

    pub fn with_config(source: S, config: ReadAheadConfig) -> Self {
        Self {
            source,
            config,
            windows: HashMap::new(),
            #[cfg(feature = "metrics")]
            metrics: ReadAheadMetrics::default(),
        }
    }

    pub fn config(&self) -> ReadAheadConfig {
        self.config
    }

    pub fn readahead_size(&self) -> u16 {
        self.config.readahead_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Windows cached for `function`, in fetch order.
    pub fn windows(&self, function: ReadFunction) -> &[Window] {
        self.windows.get(&function).map_or(&[], Vec::as_slice)
    }

    /// First cached window that holds all of `address..address + quantity`.
    pub fn find_window(
        &self,
        function: ReadFunction,
        address: u16,
        quantity: u16,
    ) -> Option<&Window> {
        self.windows(function)
            .iter()
            .find(|window| window.contains(address, quantity))
    }

    /// Drops every cached window of every function code.
    pub fn clear(&mut self) {
        let dropped: usize = self.windows.values().map(Vec::len).sum();
        self.windows.clear();
        debug!(dropped, "read-ahead cache cleared");
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> ReadAheadMetricsSnapshot {
        ReadAheadMetricsSnapshot {
            hits: self.metrics.hits,
            misses: self.metrics.misses,
            fetch_errors: self.metrics.fetch_errors,
            windows: self.windows.values().map(Vec::len).sum(),
        }
    }

    pub fn read_coils(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<&[u8], ReadAheadError<S::Error>> {
        self.read(ReadFunction::ReadCoils, address, quantity)
    }

    pub fn read_discrete_inputs(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<&[u8], ReadAheadError<S::Error>> {
        self.read(ReadFunction::ReadDiscreteInputs, address, quantity)
    }

    pub fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<&[u8], ReadAheadError<S::Error>> {
        self.read(ReadFunction::ReadHoldingRegisters, address, quantity)
    }

    pub fn read_input_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<&[u8], ReadAheadError<S::Error>> {
        self.read(ReadFunction::ReadInputRegisters, address, quantity)
    }

    /// Like [`ReadAhead::read`], for a raw function code byte. Codes other
    /// than the four read functions fail with `UnsupportedFunction`.
    pub fn read_code(
        &mut self,
        code: u8,
        address: u16,
        quantity: u16,
    ) -> Result<&[u8], ReadAheadError<S::Error>> {
        let function =
            ReadFunction::from_u8(code).map_err(|_| ReadAheadError::UnsupportedFunction(code))?;
        self.read(function, address, quantity)
    }

    /// Returns `quantity * 2` bytes for the units at `address`, from a cached
    /// window when one holds the whole range, otherwise from a new fetch of at
    /// least `readahead_size` units.
    ///
    /// A failed read leaves the cache untouched.
    pub fn read(
        &mut self,
        function: ReadFunction,
        address: u16,
        quantity: u16,
    ) -> Result<&[u8], ReadAheadError<S::Error>> {
        if quantity == 0 || u32::from(address) + u32::from(quantity) > ADDRESS_SPACE {
            return Err(ReadAheadError::InvalidRange { address, quantity });
        }

        let hit = self
            .windows(function)
            .iter()
            .position(|window| window.contains(address, quantity));
        if let Some(index) = hit {
            trace!(
                function = function.as_u8(),
                address, quantity, index, "read-ahead hit"
            );
            #[cfg(feature = "metrics")]
            {
                self.metrics.hits += 1;
            }
            return Ok(self.windows[&function][index].read(address, quantity)?);
        }

        #[cfg(feature = "metrics")]
        {
            self.metrics.misses += 1;
        }
        let window = self.fetch_window(function, address, quantity)?;
        let windows = self.windows.entry(function).or_default();
        windows.push(window);
        let window = &windows[windows.len() - 1];
        Ok(window.read(address, quantity)?)
    }

    /// Units to fetch for a miss at `address`: at least `readahead_size` and
    /// at least `quantity`, but never past the last address.
    fn fetch_size(&self, address: u16, quantity: u16) -> u16 {
        let wanted = self.config.readahead_size.max(quantity);
        let room = ADDRESS_SPACE - u32::from(address);
        // `room` >= 1, so the result fits back into u16
        u32::from(wanted).min(room) as u16
    }

    fn fetch_window(
        &mut self,
        function: ReadFunction,
        address: u16,
        quantity: u16,
    ) -> Result<Window, ReadAheadError<S::Error>> {
        let read_size = self.fetch_size(address, quantity);
        debug!(
            function = function.as_u8(),
            address, quantity, read_size, "read-ahead miss, fetching window"
        );

        let fetched = match function {
            ReadFunction::ReadCoils => self.source.read_coils(address, read_size),
            ReadFunction::ReadDiscreteInputs => {
                self.source.read_discrete_inputs(address, read_size)
            }
            ReadFunction::ReadHoldingRegisters => {
                self.source.read_holding_registers(address, read_size)
            }
            ReadFunction::ReadInputRegisters => {
                self.source.read_input_registers(address, read_size)
            }
        };
        let payload = match fetched {
            Ok(payload) => payload,
            Err(err) => {
                #[cfg(feature = "metrics")]
                {
                    self.metrics.fetch_errors += 1;
                }
                return Err(ReadAheadError::Source(err));
            }
        };

        let expected = usize::from(read_size) * UNIT_LEN;
        if payload.len() != expected {
            #[cfg(feature = "metrics")]
            {
                self.metrics.fetch_errors += 1;
            }
            return Err(ReadAheadError::LengthMismatch {
                expected,
                actual: payload.len(),
            });
        }

        Ok(Window::new(address, read_size, payload)?)
    }
}
