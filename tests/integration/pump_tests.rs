//! Integration tests for receiver and sender pumps over in-memory streams.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use camelot_bridge::pump::receiver::run_receiver;
use camelot_bridge::pump::sender::run_sender;
use camelot_bridge::pump::{Pump, PumpExit};
use camelot_bridge::queue::RelayQueue;
use camelot_bridge::AppError;

const LIMIT: Duration = Duration::from_secs(5);

/// Lines arrive in the queue in stream order, then EOF ends the pump.
#[tokio::test]
async fn receiver_forwards_lines_in_order() {
    let (mut peer, source) = tokio::io::duplex(64);
    let (tx, mut rx) = RelayQueue::bounded("inbound", 8);
    let cancel = CancellationToken::new();

    peer.write_all(b"A\nB\r\nC\n").await.expect("write");
    drop(peer);

    let exit = tokio::time::timeout(
        LIMIT,
        run_receiver(Pump::PlatformReceiver, source, &tx, &cancel, &cancel),
    )
    .await
    .expect("receiver must finish")
    .expect("receiver must not fail");

    assert_eq!(exit, PumpExit::EndOfStream);
    assert_eq!(rx.try_dequeue().as_deref(), Some("A"));
    assert_eq!(rx.try_dequeue().as_deref(), Some("B"));
    assert_eq!(rx.try_dequeue().as_deref(), Some("C"));
    assert_eq!(rx.try_dequeue(), None);
}

/// A receiver idle on an open stream stops promptly when cancelled.
#[tokio::test]
async fn receiver_stops_on_cancel() {
    let (_peer, source) = tokio::io::duplex(64);
    let (tx, _rx) = RelayQueue::bounded("inbound", 8);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let exit = tokio::time::timeout(
        LIMIT,
        run_receiver(Pump::CamelotReceiver, source, &tx, &cancel, &cancel),
    )
    .await
    .expect("receiver must observe cancellation")
    .expect("receiver must not fail");

    assert_eq!(exit, PumpExit::Cancelled);
}

/// A receiver blocked on a full queue still observes relay shutdown.
#[tokio::test]
async fn receiver_blocked_on_full_queue_stops_on_shutdown() {
    let (mut peer, source) = tokio::io::duplex(64);
    let (tx, _rx) = RelayQueue::bounded("inbound", 1);
    let cancel = CancellationToken::new();
    peer.write_all(b"one\ntwo\n").await.expect("write");

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let exit = tokio::time::timeout(
        LIMIT,
        run_receiver(Pump::PlatformReceiver, source, &tx, &cancel, &cancel),
    )
    .await
    .expect("receiver must observe cancellation")
    .expect("receiver must not fail");

    assert_eq!(exit, PumpExit::Cancelled);
    assert_eq!(tx.len(), 1);
}

/// A receiver whose consumer is gone reports `QueueClosed`.
#[tokio::test]
async fn receiver_reports_closed_queue() {
    let (mut peer, source) = tokio::io::duplex(64);
    let (tx, rx) = RelayQueue::bounded("inbound", 8);
    drop(rx);
    let cancel = CancellationToken::new();
    peer.write_all(b"orphan\n").await.expect("write");

    let exit = tokio::time::timeout(
        LIMIT,
        run_receiver(Pump::PlatformReceiver, source, &tx, &cancel, &cancel),
    )
    .await
    .expect("receiver must finish")
    .expect("receiver must not fail");

    assert_eq!(exit, PumpExit::QueueClosed);
}

/// Ending a generation while the queue is full still delivers the line in
/// hand and every buffered line once space frees up.
#[tokio::test]
async fn receiver_delivers_read_lines_after_generation_cancel() {
    let (mut child_stdout, source) = tokio::io::duplex(64);
    let (tx, mut rx) = RelayQueue::bounded("outbound", 1);
    tx.enqueue("old".into()).await.expect("enqueue");
    child_stdout.write_all(b"x\ny\n").await.expect("write");

    let shutdown = CancellationToken::new();
    let generation = shutdown.child_token();
    let receiver = {
        let generation = generation.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            run_receiver(Pump::CamelotReceiver, source, &tx, &generation, &shutdown).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    generation.cancel();

    for expected in ["old", "x", "y"] {
        let line = tokio::time::timeout(LIMIT, rx.dequeue())
            .await
            .expect("line must arrive");
        assert_eq!(line.as_deref(), Some(expected));
    }

    let exit = tokio::time::timeout(LIMIT, receiver)
        .await
        .expect("receiver must finish")
        .expect("task must not panic")
        .expect("receiver must not fail");
    assert_eq!(exit, PumpExit::Cancelled);
    assert!(!shutdown.is_cancelled());
    drop(child_stdout);
}

/// Relay shutdown interrupts an enqueue that is waiting for space.
#[tokio::test]
async fn receiver_drops_pending_line_on_shutdown() {
    let (mut peer, source) = tokio::io::duplex(64);
    let (tx, mut rx) = RelayQueue::bounded("inbound", 1);
    tx.enqueue("old".into()).await.expect("enqueue");
    peer.write_all(b"late\n").await.expect("write");

    let shutdown = CancellationToken::new();
    let generation = shutdown.child_token();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let exit = tokio::time::timeout(
        LIMIT,
        run_receiver(Pump::PlatformReceiver, source, &tx, &generation, &shutdown),
    )
    .await
    .expect("receiver must observe shutdown")
    .expect("receiver must not fail");

    assert_eq!(exit, PumpExit::Cancelled);
    assert_eq!(rx.try_dequeue().as_deref(), Some("old"));
    assert_eq!(rx.try_dequeue(), None);
}

/// The sender writes each message with exactly one trailing `\n`.
#[tokio::test]
async fn sender_writes_newline_terminated_lines() {
    let (mut peer, sink) = tokio::io::duplex(64);
    let (tx, mut rx) = RelayQueue::bounded("outbound", 8);
    let cancel = CancellationToken::new();
    tx.enqueue("ack1".into()).await.expect("enqueue");
    tx.enqueue("ack2".into()).await.expect("enqueue");
    drop(tx);

    let exit = tokio::time::timeout(
        LIMIT,
        run_sender(Pump::PlatformSender, sink, &mut rx, &cancel),
    )
    .await
    .expect("sender must finish")
    .expect("sender must not fail");

    assert_eq!(exit, PumpExit::QueueClosed);
    let mut written = String::new();
    peer.read_to_string(&mut written).await.expect("read");
    assert_eq!(written, "ack1\nack2\n");
}

/// A failed write keeps the message for the next generation.
#[tokio::test]
async fn sender_holds_back_message_on_broken_pipe() {
    let (peer, sink) = tokio::io::duplex(64);
    drop(peer);
    let (tx, mut rx) = RelayQueue::bounded("inbound", 8);
    let cancel = CancellationToken::new();
    tx.enqueue("A".into()).await.expect("enqueue");
    tx.enqueue("B".into()).await.expect("enqueue");

    let err = tokio::time::timeout(
        LIMIT,
        run_sender(Pump::CamelotSender, sink, &mut rx, &cancel),
    )
    .await
    .expect("sender must finish")
    .expect_err("writing to a closed pipe must fail");

    assert!(matches!(err, AppError::Camelot(ref msg) if msg.starts_with("write failed")));
    assert!(rx.has_held());
    assert_eq!(rx.dequeue().await.as_deref(), Some("A"));
    assert_eq!(rx.dequeue().await.as_deref(), Some("B"));
}

/// A sender waiting on an empty queue stops when cancelled.
#[tokio::test]
async fn sender_stops_on_cancel() {
    let (_peer, sink) = tokio::io::duplex(64);
    let (_tx, mut rx) = RelayQueue::bounded("outbound", 8);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let exit = tokio::time::timeout(
        LIMIT,
        run_sender(Pump::PlatformSender, sink, &mut rx, &cancel),
    )
    .await
    .expect("sender must observe cancellation")
    .expect("sender must not fail");

    assert_eq!(exit, PumpExit::Cancelled);
}

/// A sender stuck on a peer that never reads blocks only itself; the pump
/// for the other direction keeps relaying.
#[tokio::test]
async fn blocked_sender_does_not_stall_other_direction() {
    let (_stalled_peer, stalled_sink) = tokio::io::duplex(4);
    let (stuck_tx, mut stuck_rx) = RelayQueue::bounded("inbound", 8);
    stuck_tx
        .enqueue("a line far longer than four bytes".into())
        .await
        .expect("enqueue");

    let (mut platform, camelot_stdout) = tokio::io::duplex(64);
    let (out_tx, mut out_rx) = RelayQueue::bounded("outbound", 8);
    let cancel = CancellationToken::new();

    let stuck = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            run_sender(Pump::CamelotSender, stalled_sink, &mut stuck_rx, &cancel).await
        })
    };

    platform.write_all(b"ack1\n").await.expect("write");
    drop(platform);
    let exit = tokio::time::timeout(
        LIMIT,
        run_receiver(
            Pump::CamelotReceiver,
            camelot_stdout,
            &out_tx,
            &cancel,
            &cancel,
        ),
    )
    .await
    .expect("receiver must not be blocked by the stalled sender")
    .expect("receiver must not fail");

    assert_eq!(exit, PumpExit::EndOfStream);
    assert_eq!(out_rx.try_dequeue().as_deref(), Some("ack1"));
    assert!(!stuck.is_finished());

    cancel.cancel();
    let stuck_exit = tokio::time::timeout(LIMIT, stuck)
        .await
        .expect("stalled sender must observe cancellation")
        .expect("task must not panic")
        .expect("sender must not fail");
    assert_eq!(stuck_exit, PumpExit::Cancelled);
}
