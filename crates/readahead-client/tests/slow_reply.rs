use readahead_client::{ClientConfig, ModbusClient};
use readahead_core::encoding::{Reader, Writer};
use readahead_core::frame::tcp::{self, MbapHeader};
use readahead_core::pdu::ReadRequest;
use readahead_datalink::ModbusTcpTransport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::sleep;

/// Answers each holding register read with its start address; the first
/// answer is held back for `first_delay`.
async fn serve(listener: TcpListener, requests: usize, first_delay: Duration) {
    let (mut socket, _) = listener.accept().await.unwrap();
    for n in 0..requests {
        let mut mbap = [0u8; tcp::MBAP_HEADER_LEN];
        socket.read_exact(&mut mbap).await.unwrap();
        let header = MbapHeader::decode(&mut Reader::new(&mbap)).unwrap();
        let mut pdu = vec![0u8; header.pdu_len()];
        socket.read_exact(&mut pdu).await.unwrap();
        let request = ReadRequest::decode(&mut Reader::new(&pdu)).unwrap();

        if n == 0 {
            sleep(first_delay).await;
        }
        let [hi, lo] = request.start_address.to_be_bytes();
        let mut frame = [0u8; 11];
        tcp::encode_frame(
            &mut Writer::new(&mut frame),
            header.transaction_id,
            header.unit_id,
            &[0x03, 0x02, hi, lo],
        )
        .unwrap();
        socket.write_all(&frame).await.unwrap();
    }
}

#[tokio::test]
async fn reads_keep_working_after_a_timed_out_attempt() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // the timed-out attempt, its retry, then three more reads
    let server = tokio::spawn(serve(listener, 5, Duration::from_millis(300)));

    let transport = ModbusTcpTransport::connect(addr).await.unwrap();
    let config = ClientConfig::default()
        .with_response_timeout(Duration::from_millis(200))
        .with_retry_count(1);
    let client = ModbusClient::with_config(transport, config);

    assert_eq!(
        client.read_holding_registers(1, 7, 1).await.unwrap(),
        vec![0x00, 0x07]
    );
    for start in [10u16, 20, 30] {
        let [hi, lo] = start.to_be_bytes();
        assert_eq!(
            client.read_holding_registers(1, start, 1).await.unwrap(),
            vec![hi, lo]
        );
    }
    server.await.unwrap();
}
