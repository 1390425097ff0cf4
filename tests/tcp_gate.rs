//! Raw TCP gate behaviour over real sockets.

mod common;

use std::collections::HashSet;
use std::net::SocketAddr;

use actor_gate::protocol::frame::{self, MAX_PAYLOAD_LEN};
use actor_gate::{Error, GateConfig, GateEvent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::{assert_no_event, eventually, gate, next_event, session};

async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.expect("header");
    let mut payload = vec![0u8; frame::decode_header(header)];
    stream.read_exact(&mut payload).await.expect("payload");
    payload
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.expect("connect")
}

#[tokio::test]
async fn test_hello_world_round_trip() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;

    let mut client = connect(addr).await;
    client.write_all(&[0x00, 0x05, b'h', b'e', b'l', b'l', b'o']).await?;

    let event = next_event(&mut events).await;
    assert_eq!(
        event,
        GateEvent::OnMessage {
            session: session(1),
            payload: b"hello".to_vec(),
        }
    );

    gate.write(session(1), b"world").await?;

    let mut reply = [0u8; 7];
    client.read_exact(&mut reply).await?;
    assert_eq!(reply, [0x00, 0x05, b'w', b'o', b'r', b'l', b'd']);

    gate.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_frames_split_and_coalesced() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;
    let mut client = connect(addr).await;

    // Two frames and the header of a third in one segment
    let mut bytes = frame::encode(b"one")?;
    bytes.extend(frame::encode(b"")?);
    bytes.extend([0x00, 0x03]);
    client.write_all(&bytes).await?;

    let payload = |event: GateEvent| match event {
        GateEvent::OnMessage { payload, .. } => payload,
        other => panic!("unexpected event: {other:?}"),
    };
    assert_eq!(payload(next_event(&mut events).await), b"one");
    assert_eq!(payload(next_event(&mut events).await), b"");

    client.write_all(b"tw").await?;
    tokio::time::sleep(common::QUIET).await;
    client.write_all(b"o").await?;
    assert_eq!(payload(next_event(&mut events).await), b"two");

    gate.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_largest_frame_both_ways() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;
    let mut client = connect(addr).await;

    let big: Vec<u8> = (0..MAX_PAYLOAD_LEN).map(|i| (i % 251) as u8).collect();
    client.write_all(&frame::encode(&big)?).await?;

    match next_event(&mut events).await {
        GateEvent::OnMessage { payload, .. } => assert_eq!(payload, big),
        other => panic!("unexpected event: {other:?}"),
    }

    gate.write(session(1), &big).await?;
    assert_eq!(read_frame(&mut client).await, big);

    gate.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_write_order_is_preserved() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;
    let mut client = connect(addr).await;
    client.write_all(&frame::encode(b"hi")?).await?;
    next_event(&mut events).await;

    for i in 0..50u32 {
        gate.write(session(1), i.to_string().as_bytes()).await?;
    }
    for i in 0..50u32 {
        assert_eq!(read_frame(&mut client).await, i.to_string().into_bytes());
    }

    gate.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_never_interleave() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;
    let mut client = connect(addr).await;
    client.write_all(&frame::encode(b"hi")?).await?;
    next_event(&mut events).await;

    let writers: Vec<_> = (0..8u8)
        .map(|task| {
            let gate = gate.clone();
            tokio::spawn(async move {
                for n in 0..20u8 {
                    // Larger than the write buffer so frames spill mid-write
                    let payload = vec![task; 5000 + usize::from(n)];
                    gate.write(session(1), &payload).await.expect("write");
                }
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for _ in 0..(8 * 20) {
        let payload = read_frame(&mut client).await;
        let task = payload[0];
        assert!(payload.iter().all(|&b| b == task), "interleaved frame");
        assert!(seen.insert((task, payload.len())));
    }

    for writer in writers {
        writer.await?;
    }
    gate.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_client_disconnect_kicks_session() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;

    let mut client = connect(addr).await;
    client.write_all(&frame::encode(b"bye")?).await?;
    next_event(&mut events).await;
    assert!(gate.contains(session(1)));
    assert_eq!(gate.live_clients(), 1);

    drop(client);
    eventually(|| gate.session_count() == 0).await;
    assert_eq!(gate.live_clients(), 0);
    assert_no_event(&mut events).await;

    // Buffers went back to the pool
    eventually(|| gate.idle_buffers() == (1, 1)).await;

    // Late writes to the gone session are absorbed
    gate.write(session(1), b"late").await?;

    // The next client reuses the pooled buffers under a new id
    let mut next = connect(addr).await;
    next.write_all(&frame::encode(b"again")?).await?;
    assert_eq!(next_event(&mut events).await.session(), session(2));
    assert_eq!(gate.idle_buffers(), (0, 0));

    gate.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_kick_closes_client() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;

    let mut client = connect(addr).await;
    client.write_all(&frame::encode(b"x")?).await?;
    next_event(&mut events).await;

    gate.kick(session(1)).await;
    assert!(!gate.contains(session(1)));

    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(common::WAIT, client.read(&mut buf)).await?;
    assert!(matches!(read, Ok(0) | Err(_)), "client sees the close");

    // Kicking again, or kicking an id never allocated, is silent
    gate.kick(session(1)).await;
    gate.kick(session(999)).await;
    assert_no_event(&mut events).await;

    gate.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_kick_releases_stalled_writer() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;

    // The client never reads, so the socket send buffer fills up
    let mut client = connect(addr).await;
    client.write_all(&frame::encode(b"x")?).await?;
    next_event(&mut events).await;

    let writer = tokio::spawn({
        let gate = gate.clone();
        async move {
            let big = vec![7u8; MAX_PAYLOAD_LEN];
            for _ in 0..2048 {
                gate.write(session(1), &big).await?;
            }
            Ok::<_, Error>(())
        }
    });

    tokio::time::sleep(common::QUIET * 3).await;
    assert!(!writer.is_finished(), "writer should be blocked on the socket");

    tokio::time::timeout(common::WAIT, gate.kick(session(1))).await?;
    assert!(!gate.contains(session(1)));

    let result = tokio::time::timeout(common::WAIT, writer).await??;
    assert!(matches!(result, Err(Error::ConnectionClosed)));

    // The stalled writer gave its buffer back
    eventually(|| gate.idle_buffers() == (1, 1)).await;

    drop(client);
    gate.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_admission_refusal_stops_accepting() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate
        .open(GateConfig::new("127.0.0.1:0").with_max_clients(1))
        .await?;

    let mut first = connect(addr).await;
    first.write_all(&frame::encode(b"1")?).await?;
    assert_eq!(next_event(&mut events).await.session(), session(1));

    // Over the cap: accepted by the kernel, then closed by the gate
    let mut second = connect(addr).await;
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(common::WAIT, second.read(&mut buf)).await?;
    assert!(matches!(read, Ok(0) | Err(_)));

    // Room frees up, but the accept loop is gone for good
    drop(first);
    eventually(|| gate.live_clients() == 0).await;

    if let Ok(mut third) = TcpStream::connect(addr).await {
        let _ = third.write_all(&frame::encode(b"3")?).await;
    }
    assert_no_event(&mut events).await;
    assert_eq!(gate.session_count(), 0);

    gate.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_unlimited_clients() -> anyhow::Result<()> {
    let (gate, mut events) = gate();
    let addr = gate.open(GateConfig::new("127.0.0.1:0")).await?;

    let mut clients = Vec::new();
    for _ in 0..10 {
        let mut client = connect(addr).await;
        client.write_all(&frame::encode(b"hi")?).await?;
        clients.push(client);
    }

    let mut sessions = HashSet::new();
    for _ in 0..10 {
        sessions.insert(next_event(&mut events).await.session());
    }
    assert_eq!(sessions.len(), 10);
    assert_eq!(gate.live_clients(), 10);

    assert_eq!(gate.shutdown().await, 10);
    assert_eq!(gate.session_count(), 0);
    Ok(())
}
