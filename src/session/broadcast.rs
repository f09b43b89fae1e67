//! Broadcast engine
//!
//! The body of an active publisher session. One round:
//!
//! 1. Read a frame from the publisher. The wait for a frame to start is
//!    bounded so the loop can poll `terminate`/`preempt` between frames;
//!    a frame already underway is read to completion.
//! 2. Snapshot the subscriber registry.
//! 3. Fan the frame out concurrently, bounded by a worker pool.
//! 4. Remove every subscriber whose write failed.
//! 5. Report the post-removal subscriber count back to the publisher.
//!
//! Rounds are strictly sequential: frame N+1 is not read until frame N's
//! fan-out and status reply are done. A failed subscriber never affects
//! the rest of the round or the publisher beyond the updated count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::Error;
use crate::protocol::frame::{encode, read_frame_or_idle, write_frame, FrameRead};
use crate::registry::SubscriberRegistry;
use crate::server::config::RelayConfig;
use crate::session::slot::PublisherGuard;

/// Why a broadcast loop ended
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// Publisher closed its stream at a frame boundary
    EndOfStream,
    /// A newer publisher signalled this session to yield
    Preempted,
    /// Process-wide shutdown
    Terminated,
    /// Status reply could not be written; publisher connection is dead
    PublisherGone,
    /// Malformed frame or transport error on the publisher connection
    Protocol(Error),
}

/// Run broadcast rounds until the session ends
///
/// The caller owns the publisher connection halves and the slot guard;
/// both are dropped (closing the connection, freeing the slot) when this
/// returns.
pub(crate) async fn run_broadcast_loop<R, W>(
    reader: &mut R,
    writer: &mut W,
    guard: &PublisherGuard,
    registry: &SubscriberRegistry,
    config: &RelayConfig,
    terminate: &AtomicBool,
) -> SessionEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session_id = guard.session_id();

    loop {
        if terminate.load(Ordering::Acquire) {
            return SessionEnd::Terminated;
        }
        if guard.preempted() {
            return SessionEnd::Preempted;
        }

        let payload =
            match read_frame_or_idle(reader, config.max_frame_size, config.poll_interval).await {
                // Poll tick: no frame started yet, re-check the flags above
                Ok(FrameRead::Idle) => continue,
                Ok(FrameRead::EndOfStream) => return SessionEnd::EndOfStream,
                Ok(FrameRead::Frame(payload)) => payload,
                Err(e) => return SessionEnd::Protocol(e),
            };

        tracing::trace!(
            session_id = session_id,
            bytes = payload.len(),
            "Frame received"
        );

        let dropped = fan_out(&payload, registry, config.fanout_concurrency).await;
        for id in dropped {
            registry.remove(id).await;
        }

        let status = status_message(registry.count().await);
        if let Err(e) = write_frame(writer, status.as_bytes()).await {
            tracing::debug!(
                session_id = session_id,
                error = %e,
                "Status reply failed, publisher gone"
            );
            return SessionEnd::PublisherGone;
        }
    }
}

/// Deliver one payload to every subscriber in the current snapshot
///
/// Writes run concurrently, capped at `max_concurrent` outstanding at a
/// time. All writes complete (or fail) before this returns. Returns the
/// session ids of subscribers whose write failed; the caller removes them.
async fn fan_out(
    payload: &Bytes,
    registry: &SubscriberRegistry,
    max_concurrent: usize,
) -> Vec<u64> {
    let snapshot = registry.snapshot().await;
    if snapshot.is_empty() {
        return Vec::new();
    }

    // Encode once; every write shares the same reference-counted buffer.
    let encoded = encode(payload);
    let permits = Arc::new(Semaphore::new(max_concurrent));
    let mut writes = JoinSet::new();

    for subscriber in snapshot {
        let encoded = encoded.clone();
        let permits = Arc::clone(&permits);

        writes.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();

            match subscriber.send(&encoded).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(
                        session_id = subscriber.id(),
                        peer = %subscriber.peer_addr(),
                        error = %e,
                        "Subscriber write failed"
                    );
                    Some(subscriber.id())
                }
            }
        });
    }

    let mut dropped = Vec::new();
    while let Some(result) = writes.join_next().await {
        if let Ok(Some(id)) = result {
            dropped.push(id);
        }
    }

    dropped
}

/// Status frame payload sent back to the publisher after each round
pub(crate) fn status_message(count: usize) -> String {
    format!("Connected subscribers: {}", count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use crate::protocol::frame;
    use crate::registry::Subscriber;
    use crate::session::slot::PublisherSlot;

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6070)
    }

    fn test_config() -> RelayConfig {
        RelayConfig::default().poll_interval(Duration::from_millis(20))
    }

    async fn add_subscriber(registry: &SubscriberRegistry, id: u64) -> DuplexStream {
        let (near, far) = tokio::io::duplex(4096);
        registry
            .add(Arc::new(Subscriber::new(
                id,
                test_addr(),
                format!("viewer-{}", id),
                Box::new(near),
                None,
            )))
            .await;
        far
    }

    #[test]
    fn test_status_message() {
        assert_eq!(status_message(0), "Connected subscribers: 0");
        assert_eq!(status_message(2), "Connected subscribers: 2");
    }

    #[tokio::test]
    async fn test_fan_out_delivers_to_all() {
        let registry = SubscriberRegistry::new();
        let mut far_a = add_subscriber(&registry, 1).await;
        let mut far_b = add_subscriber(&registry, 2).await;

        let dropped = fan_out(&Bytes::from_static(b"hello"), &registry, 64).await;
        assert!(dropped.is_empty());

        let expected = frame::encode(b"hello");
        for far in [&mut far_a, &mut far_b] {
            let mut buf = vec![0u8; expected.len()];
            far.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf[..], &expected[..]);
        }
    }

    #[tokio::test]
    async fn test_fan_out_isolates_failures() {
        let registry = SubscriberRegistry::new();
        let mut far_healthy = add_subscriber(&registry, 1).await;
        let far_dead = add_subscriber(&registry, 2).await;
        drop(far_dead);

        let dropped = fan_out(&Bytes::from_static(b"hello"), &registry, 64).await;
        assert_eq!(dropped, vec![2]);

        // The healthy subscriber still got the frame
        let expected = frame::encode(b"hello");
        let mut buf = vec![0u8; expected.len()];
        far_healthy.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_fan_out_bounded_concurrency() {
        let registry = SubscriberRegistry::new();
        let mut fars = Vec::new();
        for id in 0..16 {
            fars.push(add_subscriber(&registry, id).await);
        }

        // A pool narrower than the subscriber count still completes
        let dropped = fan_out(&Bytes::from_static(b"x"), &registry, 2).await;
        assert!(dropped.is_empty());

        let expected = frame::encode(b"x");
        for far in &mut fars {
            let mut buf = vec![0u8; expected.len()];
            far.read_exact(&mut buf).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_loop_round_and_end_of_stream() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot = Arc::new(PublisherSlot::new());
        let guard = slot.acquire(1).unwrap();
        let terminate = Arc::new(AtomicBool::new(false));

        let mut far_sub = add_subscriber(&registry, 10).await;

        let (server_side, mut publisher_side) = tokio::io::duplex(4096);
        let config = test_config();
        let registry_task = Arc::clone(&registry);
        let terminate_task = Arc::clone(&terminate);

        let engine = tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(server_side);
            run_broadcast_loop(
                &mut reader,
                &mut writer,
                &guard,
                &registry_task,
                &config,
                &terminate_task,
            )
            .await
        });

        // One full round: frame out, status back
        publisher_side
            .write_all(&frame::encode(b"hi"))
            .await
            .unwrap();

        let status = frame::read_frame(&mut publisher_side, 1024)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&status[..], b"Connected subscribers: 1");

        let expected = frame::encode(b"hi");
        let mut buf = vec![0u8; expected.len()];
        far_sub.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], &expected[..]);

        // Publisher hangs up cleanly
        drop(publisher_side);
        let end = engine.await.unwrap();
        assert!(matches!(end, SessionEnd::EndOfStream));
    }

    #[tokio::test]
    async fn test_slow_frame_spans_poll_ticks() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot = Arc::new(PublisherSlot::new());
        let guard = slot.acquire(1).unwrap();
        let terminate = Arc::new(AtomicBool::new(false));

        let mut far_sub = add_subscriber(&registry, 10).await;

        let (server_side, mut publisher_side) = tokio::io::duplex(4096);
        let config = test_config();
        let registry_task = Arc::clone(&registry);
        let terminate_task = Arc::clone(&terminate);

        let engine = tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(server_side);
            run_broadcast_loop(
                &mut reader,
                &mut writer,
                &guard,
                &registry_task,
                &config,
                &terminate_task,
            )
            .await
        });

        // Half a header, then a pause longer than several poll intervals.
        // The started frame must survive the ticks intact.
        publisher_side.write_all(&[0, 0]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        publisher_side
            .write_all(&[0, 2, b'h', b'i'])
            .await
            .unwrap();

        let status = frame::read_frame(&mut publisher_side, 1024)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&status[..], b"Connected subscribers: 1");

        let expected = frame::encode(b"hi");
        let mut buf = vec![0u8; expected.len()];
        far_sub.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], &expected[..]);

        drop(publisher_side);
        let end = engine.await.unwrap();
        assert!(matches!(end, SessionEnd::EndOfStream));
    }

    #[tokio::test]
    async fn test_loop_observes_preemption() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot = Arc::new(PublisherSlot::new());
        let guard = slot.acquire(1).unwrap();
        let terminate = Arc::new(AtomicBool::new(false));

        let (server_side, _publisher_side) = tokio::io::duplex(4096);
        let config = test_config();
        let registry_task = Arc::clone(&registry);
        let terminate_task = Arc::clone(&terminate);

        let engine = tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(server_side);
            run_broadcast_loop(
                &mut reader,
                &mut writer,
                &guard,
                &registry_task,
                &config,
                &terminate_task,
            )
            .await
        });

        // A newcomer signals preemption; the loop notices at its next poll
        slot.acquire(2).unwrap_err();

        let end = engine.await.unwrap();
        assert!(matches!(end, SessionEnd::Preempted));
    }

    #[tokio::test]
    async fn test_loop_observes_terminate() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot = Arc::new(PublisherSlot::new());
        let guard = slot.acquire(1).unwrap();
        let terminate = Arc::new(AtomicBool::new(false));

        let (server_side, _publisher_side) = tokio::io::duplex(4096);
        let config = test_config();
        let registry_task = Arc::clone(&registry);
        let terminate_task = Arc::clone(&terminate);

        let engine = tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(server_side);
            run_broadcast_loop(
                &mut reader,
                &mut writer,
                &guard,
                &registry_task,
                &config,
                &terminate_task,
            )
            .await
        });

        terminate.store(true, Ordering::Release);

        let end = engine.await.unwrap();
        assert!(matches!(end, SessionEnd::Terminated));
    }

    #[tokio::test]
    async fn test_loop_ends_on_malformed_frame() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot = Arc::new(PublisherSlot::new());
        let guard = slot.acquire(1).unwrap();
        let terminate = Arc::new(AtomicBool::new(false));

        let (server_side, mut publisher_side) = tokio::io::duplex(4096);
        let config = test_config();
        let registry_task = Arc::clone(&registry);
        let terminate_task = Arc::clone(&terminate);

        let engine = tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(server_side);
            run_broadcast_loop(
                &mut reader,
                &mut writer,
                &guard,
                &registry_task,
                &config,
                &terminate_task,
            )
            .await
        });

        // Header promises 100 bytes, then the stream closes
        publisher_side.write_all(&[0, 0, 0, 100, 1, 2]).await.unwrap();
        drop(publisher_side);

        let end = engine.await.unwrap();
        assert!(matches!(end, SessionEnd::Protocol(_)));
    }
}
