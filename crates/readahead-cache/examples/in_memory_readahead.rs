use readahead_cache::{InMemorySource, ReadAhead, ReadFunction};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut source = InMemorySource::new(64, 64, 512, 512);
    source.fill_holding_registers(|address| address * 10);

    let mut cache = ReadAhead::new(source, 64);
    for address in [0u16, 3, 17, 63, 64, 100] {
        let bytes = cache.read_holding_registers(address, 1)?;
        let value = u16::from_be_bytes([bytes[0], bytes[1]]);
        println!("hr[{address}] = {value}");
    }

    println!(
        "fetches: {}",
        cache.source().fetch_count(ReadFunction::ReadHoldingRegisters)
    );
    Ok(())
}
