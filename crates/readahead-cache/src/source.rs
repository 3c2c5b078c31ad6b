/// The four read operations a [`ReadAhead`](crate::ReadAhead) needs from the
/// client underneath it.
///
/// Every successful call returns exactly `quantity * 2` bytes: register words
/// big-endian as on the wire, coils and discrete inputs as one word per bit
/// holding `0` or `1`. Transport concerns (framing, timeouts, retries) stay
/// behind this trait.
pub trait UnitSource {
    type Error: std::error::Error + 'static;

    fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<u8>, Self::Error>;

    fn read_discrete_inputs(&mut self, address: u16, quantity: u16)
    -> Result<Vec<u8>, Self::Error>;

    fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error>;

    fn read_input_registers(&mut self, address: u16, quantity: u16)
    -> Result<Vec<u8>, Self::Error>;
}

impl<S: UnitSource + ?Sized> UnitSource for &mut S {
    type Error = S::Error;

    fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<u8>, Self::Error> {
        (**self).read_coils(address, quantity)
    }

    fn read_discrete_inputs(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        (**self).read_discrete_inputs(address, quantity)
    }

    fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        (**self).read_holding_registers(address, quantity)
    }

    fn read_input_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        (**self).read_input_registers(address, quantity)
    }
}

impl<S: UnitSource + ?Sized> UnitSource for Box<S> {
    type Error = S::Error;

    fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<u8>, Self::Error> {
        (**self).read_coils(address, quantity)
    }

    fn read_discrete_inputs(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        (**self).read_discrete_inputs(address, quantity)
    }

    fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        (**self).read_holding_registers(address, quantity)
    }

    fn read_input_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u8>, Self::Error> {
        (**self).read_input_registers(address, quantity)
    }
}
