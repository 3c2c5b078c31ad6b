use crate::source::UnitSource;
use readahead_core::{ReadFunction, UNIT_LEN};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
    #[error("illegal data address: {quantity} units at {address}")]
    IllegalDataAddress { address: u16, quantity: u16 },
}

/// A [`UnitSource`] backed by four in-memory banks.
///
/// Every fetch is counted per function code, which makes it handy for
/// checking how many round trips a read pattern costs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemorySource {
    coils: Vec<bool>,
    discrete_inputs: Vec<bool>,
    holding_registers: Vec<u16>,
    input_registers: Vec<u16>,
    fetches: [usize; 4],
}

impl InMemorySource {
    pub fn new(
        coil_count: usize,
        discrete_input_count: usize,
        holding_register_count: usize,
        input_register_count: usize,
    ) -> Self {
        Self {
            coils: vec![false; coil_count],
            discrete_inputs: vec![false; discrete_input_count],
            holding_registers: vec![0; holding_register_count],
            input_registers: vec![0; input_register_count],
            fetches: [0; 4],
        }
    }

    /// A source with every address of all four banks present.
    pub fn full() -> Self {
        let size = crate::ADDRESS_SPACE as usize;
        Self::new(size, size, size, size)
    }

    pub fn set_coil(&mut self, address: u16, value: bool) -> Result<(), SimulatorError> {
        set(&mut self.coils, address, value)
    }

    pub fn set_discrete_input(&mut self, address: u16, value: bool) -> Result<(), SimulatorError> {
        set(&mut self.discrete_inputs, address, value)
    }

    pub fn set_holding_register(&mut self, address: u16, value: u16) -> Result<(), SimulatorError> {
        set(&mut self.holding_registers, address, value)
    }

    pub fn set_input_register(&mut self, address: u16, value: u16) -> Result<(), SimulatorError> {
        set(&mut self.input_registers, address, value)
    }

    /// Sets every holding register to `f(address)`.
    pub fn fill_holding_registers(&mut self, mut f: impl FnMut(u16) -> u16) {
        for (address, slot) in (0..=u16::MAX).zip(self.holding_registers.iter_mut()) {
            *slot = f(address);
        }
    }

    /// Sets every input register to `f(address)`.
    pub fn fill_input_registers(&mut self, mut f: impl FnMut(u16) -> u16) {
        for (address, slot) in (0..=u16::MAX).zip(self.input_registers.iter_mut()) {
            *slot = f(address);
        }
    }

    pub fn coil(&self, address: u16) -> Option<bool> {
        self.coils.get(usize::from(address)).copied()
    }

    pub fn holding_register(&self, address: u16) -> Option<u16> {
        self.holding_registers.get(usize::from(address)).copied()
    }

    /// Fetches served so far for `function`, failed ones included.
    pub fn fetch_count(&self, function: ReadFunction) -> usize {
        self.fetches[slot(function)]
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.iter().sum()
    }

    pub fn reset_fetch_counts(&mut self) {
        self.fetches = [0; 4];
    }

    fn record(&mut self, function: ReadFunction) {
        self.fetches[slot(function)] += 1;
    }
}

impl UnitSource for InMemorySource {
    type Error = SimulatorError;

    fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<u8>, Self::Error> {
        self.record(ReadFunction::ReadCoils);
        read_bits(&self.coils, address, quantity)
    }

    fn read_discrete_inputs(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        self.record(ReadFunction::ReadDiscreteInputs);
        read_bits(&self.discrete_inputs, address, quantity)
    }

    fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        self.record(ReadFunction::ReadHoldingRegisters);
        read_words(&self.holding_registers, address, quantity)
    }

    fn read_input_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        self.record(ReadFunction::ReadInputRegisters);
        read_words(&self.input_registers, address, quantity)
    }
}

fn slot(function: ReadFunction) -> usize {
    usize::from(function.as_u8() - 1)
}

fn set<T>(bank: &mut [T], address: u16, value: T) -> Result<(), SimulatorError> {
    let slot = bank
        .get_mut(usize::from(address))
        .ok_or(SimulatorError::IllegalDataAddress {
            address,
            quantity: 1,
        })?;
    *slot = value;
    Ok(())
}

fn checked_range<T>(bank: &[T], address: u16, quantity: u16) -> Result<&[T], SimulatorError> {
    let start = usize::from(address);
    let end = start + usize::from(quantity);
    if quantity == 0 || end > bank.len() {
        return Err(SimulatorError::IllegalDataAddress { address, quantity });
    }
    Ok(&bank[start..end])
}

fn read_bits(bank: &[bool], address: u16, quantity: u16) -> Result<Vec<u8>, SimulatorError> {
    let range = checked_range(bank, address, quantity)?;
    let mut out = Vec::with_capacity(range.len() * UNIT_LEN);
    for &bit in range {
        out.extend_from_slice(&u16::from(bit).to_be_bytes());
    }
    Ok(out)
}

fn read_words(bank: &[u16], address: u16, quantity: u16) -> Result<Vec<u8>, SimulatorError> {
    let range = checked_range(bank, address, quantity)?;
    let mut out = Vec::with_capacity(range.len() * UNIT_LEN);
    for &word in range {
        out.extend_from_slice(&word.to_be_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{InMemorySource, SimulatorError};
    use crate::source::UnitSource;
    use readahead_core::ReadFunction;

    #[test]
    fn registers_come_back_big_endian() {
        let mut source = InMemorySource::new(0, 0, 8, 8);
        source.set_holding_register(2, 0x1234).unwrap();
        source.set_input_register(3, 0xBEEF).unwrap();

        assert_eq!(
            source.read_holding_registers(1, 2).unwrap(),
            vec![0x00, 0x00, 0x12, 0x34]
        );
        assert_eq!(source.read_input_registers(3, 1).unwrap(), vec![0xBE, 0xEF]);
    }

    #[test]
    fn bits_expand_to_one_word_each() {
        let mut source = InMemorySource::new(4, 4, 0, 0);
        source.set_coil(1, true).unwrap();
        source.set_discrete_input(0, true).unwrap();

        assert_eq!(
            source.read_coils(0, 3).unwrap(),
            vec![0x00, 0x00, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(source.read_discrete_inputs(0, 1).unwrap(), vec![0x00, 0x01]);
    }

    #[test]
    fn out_of_bank_reads_fail_and_still_count() {
        let mut source = InMemorySource::new(0, 0, 10, 0);
        assert_eq!(
            source.read_holding_registers(8, 4),
            Err(SimulatorError::IllegalDataAddress {
                address: 8,
                quantity: 4
            })
        );
        assert!(source.read_input_registers(0, 1).is_err());
        assert!(source.set_holding_register(10, 1).is_err());
        assert_eq!(source.fetch_count(ReadFunction::ReadHoldingRegisters), 1);
        assert_eq!(source.fetch_count(ReadFunction::ReadInputRegisters), 1);
        assert_eq!(source.total_fetches(), 2);

        source.reset_fetch_counts();
        assert_eq!(source.total_fetches(), 0);
    }

    #[test]
    fn full_source_reaches_the_last_address() {
        let mut source = InMemorySource::full();
        source.fill_holding_registers(|address| address);
        assert_eq!(source.holding_register(0xFFFF), Some(0xFFFF));
        assert_eq!(
            source.read_holding_registers(0xFFFE, 2).unwrap(),
            vec![0xFF, 0xFE, 0xFF, 0xFF]
        );
    }
}
