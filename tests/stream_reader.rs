//! Stream-level tests: reading a header off a live connection and handing
//! the rest of the stream to the application.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ppv2::config::Config;
use ppv2::proxy::{
    encode_tcp_v4, ByteSource, Family, ProxiedStream, ProxyError, ReadMode, ReaderOptions,
    StreamHeaderReader, StreamSource, MAX_HEADER_SIZE, PROXY_V2_SIGNATURE,
};
use pretty_assertions::assert_eq;
use test_case::test_case;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Wraps a source and records every pause/resume
struct Counting<S> {
    inner: S,
    pauses: usize,
    resumes: usize,
}

impl<S> Counting<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            pauses: 0,
            resumes: 0,
        }
    }
}

#[async_trait]
impl<S: ByteSource> ByteSource for Counting<S> {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        self.inner.next_chunk().await
    }

    fn pause(&mut self) {
        self.pauses += 1;
        self.inner.pause();
    }

    fn resume(&mut self) {
        self.resumes += 1;
        self.inner.resume();
    }

    fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }
}

fn tcp4_wire() -> Vec<u8> {
    encode_tcp_v4(
        "10.0.32.84:16".parse().unwrap(),
        "192.168.64.91:18".parse().unwrap(),
    )
    .to_vec()
}

#[tokio::test]
async fn header_then_application_stream() {
    let mut first = tcp4_wire();
    first.extend_from_slice(b"PING ");
    let mock = tokio_test::io::Builder::new()
        .read(&first)
        .read(b"PONG")
        .build();

    let mut source = StreamSource::new(mock);
    let mut reader = StreamHeaderReader::new(ReaderOptions::default());
    let proxied = reader.read_header(&mut source).await.unwrap();

    let address = proxied.address.unwrap();
    assert_eq!(address.remote_address.to_string(), "10.0.32.84");
    assert_eq!(address.local_address.to_string(), "192.168.64.91");
    assert_eq!((address.remote_port, address.local_port), (16, 18));

    let mut app = ProxiedStream::new(proxied.remainder, source);
    let mut rest = Vec::new();
    app.read_to_end(&mut rest).await.unwrap();
    assert_eq!(rest, b"PING PONG");
}

#[test_case(vec![0, 1, 2, 3]; "too short")]
#[test_case((0..40).collect(); "wrong magic")]
#[test_case(tcp4_wire(); "decoded")]
#[tokio::test]
async fn one_pause_one_resume_on_every_branch(chunk: Vec<u8>) {
    let mock = tokio_test::io::Builder::new().read(&chunk).build();
    let mut source = Counting::new(StreamSource::new(mock));
    let mut reader = StreamHeaderReader::new(ReaderOptions::default());

    let _ = reader.read_header(&mut source).await;

    assert_eq!((source.pauses, source.resumes), (1, 1));
    assert!(!source.is_paused());
}

#[tokio::test]
async fn split_header_needs_accumulate_mode() {
    let wire = tcp4_wire();

    let mock = tokio_test::io::Builder::new()
        .read(&wire[..7])
        .read(&wire[7..])
        .build();
    let mut source = StreamSource::new(mock);
    let mut reader = StreamHeaderReader::new(ReaderOptions::default());
    let err = reader.read_header(&mut source).await.unwrap_err();
    assert_eq!(err.chunk().map(|c| c.len()), Some(7));
    // drain the second read so the mock is satisfied
    assert_eq!(source.next_chunk().await.unwrap().unwrap().len(), wire.len() - 7);

    let mock = tokio_test::io::Builder::new()
        .read(&wire[..7])
        .read(&wire[7..])
        .build();
    let mut source = StreamSource::new(mock);
    let mut reader = StreamHeaderReader::new(ReaderOptions {
        mode: ReadMode::Accumulate {
            max_header_size: MAX_HEADER_SIZE,
        },
        ..Default::default()
    });
    let proxied = reader.read_header(&mut source).await.unwrap();
    assert_eq!(proxied.header.family, Family::TcpV4);
    assert!(proxied.remainder.is_empty());
}

#[tokio::test]
async fn wrong_magic_can_fall_back_to_raw_stream() {
    let request = b"GET / HTTP/1.1\r\nHost: example\r\n\r\n";
    let mock = tokio_test::io::Builder::new().read(request).build();
    let mut source = StreamSource::new(mock);
    let mut reader = StreamHeaderReader::new(ReaderOptions::default());

    let err = reader.read_header(&mut source).await.unwrap_err();
    assert!(matches!(err, ProxyError::WrongMagic { .. }));

    let mut app = ProxiedStream::new(err.into_chunk().unwrap(), source);
    let mut rest = Vec::new();
    app.read_to_end(&mut rest).await.unwrap();
    assert_eq!(rest, request);
}

#[test]
fn encoded_header_is_accepted_by_ppp() {
    let wire = tcp4_wire();
    let header = ppp::v2::Header::try_from(&wire[..]).unwrap();

    match header.addresses {
        ppp::v2::Addresses::IPv4(addrs) => {
            assert_eq!(addrs.source_address.to_string(), "10.0.32.84");
            assert_eq!(addrs.source_port, 16);
            assert_eq!(addrs.destination_address.to_string(), "192.168.64.91");
            assert_eq!(addrs.destination_port, 18);
        }
        other => panic!("unexpected addresses: {:?}", other),
    }
}

#[test]
fn signature_matches_ppp() {
    assert_eq!(&PROXY_V2_SIGNATURE[..], b"\r\n\r\n\0\r\nQUIT\n");
}

async fn echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = sock.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    addr
}

async fn relay(config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(ppv2::relay::serve(listener, Arc::new(config)));
    addr
}

#[tokio::test]
async fn relay_strips_header_and_forwards_payload() {
    let mut config = Config::default();
    config.server.upstream = Some(echo_server().await);
    let relay_addr = relay(config).await;

    let mut client = tokio::net::TcpStream::connect(relay_addr).await.unwrap();
    let mut wire = tcp4_wire();
    wire.extend_from_slice(b"hello");
    client.write_all(&wire).await.unwrap();

    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello");

    client.write_all(b" again").await.unwrap();
    let mut buf = [0u8; 6];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b" again");
}

#[tokio::test]
async fn relay_closes_connection_without_header() {
    let mut config = Config::default();
    config.server.upstream = Some(echo_server().await);
    let relay_addr = relay(config).await;

    let mut client = tokio::net::TcpStream::connect(relay_addr).await.unwrap();
    client.write_all(b"this is not a proxy header").await.unwrap();

    let mut buf = Vec::new();
    let n = client.read_to_end(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn relay_passes_raw_stream_when_disabled() {
    let mut config = Config::default();
    config.server.upstream = Some(echo_server().await);
    config.proxy_protocol.enabled = false;
    let relay_addr = relay(config).await;

    let mut client = tokio::net::TcpStream::connect(relay_addr).await.unwrap();
    client.write_all(b"raw").await.unwrap();

    let mut buf = [0u8; 3];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"raw");
}
