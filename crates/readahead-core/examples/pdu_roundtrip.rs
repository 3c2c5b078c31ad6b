use readahead_core::ReadFunction;
use readahead_core::encoding::{Reader, Writer};
use readahead_core::pdu::{ReadRequest, Response};

fn main() {
    let request = ReadRequest::new(ReadFunction::ReadHoldingRegisters, 0x006B, 2);
    let mut request_buf = [0u8; ReadRequest::LEN];
    let mut w = Writer::new(&mut request_buf);
    if let Err(err) = request.encode(&mut w) {
        eprintln!("encode failed: {err}");
        return;
    }
    println!("request pdu: {:02X?}", w.as_written());

    let response_bytes = [0x03, 0x04, 0x00, 0x2A, 0x00, 0x64];
    match Response::decode(&mut Reader::new(&response_bytes)) {
        Ok(Response::Read(resp)) => {
            for idx in 0..resp.unit_count() {
                println!("register[{idx}] = {}", resp.register(idx).unwrap_or_default());
            }
        }
        Ok(Response::Exception(ex)) => println!("exception: {ex}"),
        Err(err) => eprintln!("decode failed: {err}"),
    }
}
