use readahead_cache::{InMemorySource, ReadFunction, UnitSource};
use readahead_client::{ClientConfig, ClientError, SyncClientError, SyncModbusTcpClient};
use readahead_core::encoding::{Reader, Writer};
use readahead_core::frame::tcp::{self, MbapHeader};
use readahead_core::pdu::{ExceptionCode, ExceptionResponse, ReadRequest, ReadResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Answers read requests from an in-memory bank until told to stop.
struct Fixture {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Fixture {
    fn start(source: InMemorySource) -> Self {
        let (addr_tx, addr_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime should build");

            runtime.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("server should bind");
                addr_tx
                    .send(listener.local_addr().expect("local addr should be available"))
                    .expect("address should be sent");

                let task = tokio::spawn(async move {
                    let (socket, _) = listener.accept().await.expect("client should connect");
                    serve(socket, source, counter).await;
                });
                let _ = shutdown_rx.await;
                task.abort();
                let _ = task.await;
            });
        });

        let addr = addr_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("server address should arrive");
        Self {
            addr,
            requests,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    fn connect(&self) -> SyncModbusTcpClient {
        let config = ClientConfig::default().with_response_timeout(Duration::from_secs(2));
        SyncModbusTcpClient::connect_with_config(&self.addr.to_string(), config)
            .expect("sync client should connect")
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn serve(mut socket: TcpStream, mut source: InMemorySource, counter: Arc<AtomicUsize>) {
    loop {
        let mut mbap = [0u8; tcp::MBAP_HEADER_LEN];
        if socket.read_exact(&mut mbap).await.is_err() {
            return;
        }
        let header = MbapHeader::decode(&mut Reader::new(&mbap)).expect("valid header");
        let mut pdu = vec![0u8; header.pdu_len()];
        socket.read_exact(&mut pdu).await.expect("request pdu");
        counter.fetch_add(1, Ordering::SeqCst);

        let request = ReadRequest::decode(&mut Reader::new(&pdu)).expect("read request");
        let response = answer(&mut source, &request);

        let mut frame = vec![0u8; tcp::MAX_FRAME_LEN];
        let mut w = Writer::new(&mut frame);
        tcp::encode_frame(&mut w, header.transaction_id, header.unit_id, &response)
            .expect("response frame");
        socket.write_all(w.as_written()).await.expect("response written");
    }
}

fn answer(source: &mut InMemorySource, request: &ReadRequest) -> Vec<u8> {
    let (address, quantity) = (request.start_address, request.quantity);
    let units = match request.function {
        ReadFunction::ReadCoils => source.read_coils(address, quantity),
        ReadFunction::ReadDiscreteInputs => source.read_discrete_inputs(address, quantity),
        ReadFunction::ReadHoldingRegisters => source.read_holding_registers(address, quantity),
        ReadFunction::ReadInputRegisters => source.read_input_registers(address, quantity),
    };

    let mut out = vec![0u8; 256];
    let mut w = Writer::new(&mut out);
    match units {
        Ok(units) => {
            let data = if request.function.is_bit_access() {
                let mut packed = vec![0u8; units.len().div_ceil(16)];
                for (i, unit) in units.chunks(2).enumerate() {
                    if unit[1] != 0 {
                        packed[i / 8] |= 1 << (i % 8);
                    }
                }
                packed
            } else {
                units
            };
            ReadResponse {
                function: request.function,
                data: &data,
            }
            .encode(&mut w)
            .expect("read response");
        }
        Err(_) => ExceptionResponse {
            function_code: request.function.as_u8(),
            exception_code: ExceptionCode::IllegalDataAddress,
        }
        .encode(&mut w)
        .expect("exception response"),
    }
    w.as_written().to_vec()
}

#[test]
fn cached_reads_share_one_request() {
    let mut source = InMemorySource::new(0, 0, 512, 0);
    source.fill_holding_registers(|address| address * 3);
    let fixture = Fixture::start(source);
    let client = fixture.connect();

    let mut cache = client.readahead(1, 64);
    assert_eq!(
        cache.read_holding_registers(100, 1).expect("first read"),
        &[0x01, 0x2C]
    );
    assert_eq!(
        cache.read_holding_registers(150, 2).expect("cached read"),
        &[0x01, 0xC2, 0x01, 0xC5]
    );
    assert_eq!(fixture.request_count(), 1);

    cache.read_holding_registers(163, 2).expect("straddling read");
    assert_eq!(fixture.request_count(), 2);

    cache.clear();
    cache.read_holding_registers(100, 1).expect("read after clear");
    assert_eq!(fixture.request_count(), 3);
}

#[test]
fn coils_arrive_as_words() {
    let mut source = InMemorySource::new(64, 0, 0, 0);
    source.set_coil(3, true).expect("coil set");
    let fixture = Fixture::start(source);
    let client = fixture.connect();

    let mut cache = client.readahead(1, 16);
    assert_eq!(
        cache.read_coils(2, 2).expect("coil read"),
        &[0x00, 0x00, 0x00, 0x01]
    );
    assert_eq!(cache.windows(ReadFunction::ReadCoils)[0].len(), 16);
}

#[test]
fn oversized_windows_are_split_into_protocol_sized_requests() {
    let mut source = InMemorySource::new(0, 0, 0, 1024);
    source.fill_input_registers(|address| address);
    let fixture = Fixture::start(source);
    let client = fixture.connect();

    let mut cache = client.readahead(1, 300);
    let bytes = cache.read_input_registers(0, 1).expect("read at window start");
    assert_eq!(bytes, &[0x00, 0x00]);
    // 300 units take three requests
    assert_eq!(fixture.request_count(), 3);

    let bytes = cache.read_input_registers(299, 1).expect("read at window end");
    assert_eq!(bytes, &[0x01, 0x2B]);
    cache.read_input_registers(250, 50).expect("hit");
    assert_eq!(fixture.request_count(), 3);
    assert_eq!(cache.windows(ReadFunction::ReadInputRegisters).len(), 1);
}

#[test]
fn exception_reaches_the_cache_caller_and_nothing_is_cached() {
    let fixture = Fixture::start(InMemorySource::new(0, 0, 80, 0));
    let client = fixture.connect();

    let mut cache = client.readahead(1, 64);
    let err = cache
        .read_holding_registers(40, 1)
        .expect_err("window runs past the bank");
    match err.into_source_error() {
        Some(SyncClientError::Client(ClientError::Exception(ex))) => {
            assert_eq!(ex.exception_code, ExceptionCode::IllegalDataAddress);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(cache.windows(ReadFunction::ReadHoldingRegisters).is_empty());
}
