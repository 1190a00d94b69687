//! Outbound half of a GMP connection.
//!
//! A single task owns the writer, so packet bytes and talk bytes never
//! interleave. While a packet is "current" it is rewritten after a random
//! delay until the session reports it acknowledged.
//!
//! Write failures are only logged: a dead line is detected by the
//! receiving side, which sees end-of-input.
use crate::protocol::packet::{format_bits, PACKET_LEN};
use crate::CHANNEL_SIZE;
use anyhow::Result;
use async_std::channel::{bounded, Receiver, Sender};
use async_std::future::timeout;
use async_std::task;
use async_std::task::JoinHandle;
use futures::{AsyncWrite, AsyncWriteExt, StreamExt};
use log::{trace, warn};
use rand::distributions::{Distribution, Uniform};
use rand::thread_rng;
use std::time::{Duration, Instant};

/// instructions sent from the session to the transmitter task
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outbound {
    /// write a packet; unless `once`, keep resending it until `StopSend`
    Packet {
        bytes: [u8; PACKET_LEN],
        once: bool,
    },
    /// rewrite the current packet right now
    Resend,
    /// the current packet got acknowledged
    StopSend,
    Talk(String),
}

/// Handle to the transmitter task.
///
/// Dropping the last handle stops the task, which then closes the writer.
#[derive(Clone)]
pub(crate) struct Transmitter {
    sender: Sender<Outbound>,
}

impl Transmitter {
    pub(crate) async fn send(&self, outbound: Outbound) -> Result<()> {
        Ok(self.sender.send(outbound).await?)
    }
}

/// lower and upper bound of the resend delay
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResendInterval {
    pub(crate) min: Duration,
    pub(crate) max: Duration,
}

impl ResendInterval {
    fn sample(&self) -> Duration {
        let range = Uniform::new_inclusive(self.min.as_millis() as u64, self.max.as_millis() as u64);
        Duration::from_millis(range.sample(&mut thread_rng()))
    }

    /// when a packet written now is due for its next resend
    fn deadline(&self) -> Instant {
        Instant::now() + self.sample()
    }
}

/// Start the transmitter task on `writer`.
pub(crate) fn start_transmitter<W>(writer: W, interval: ResendInterval) -> (Transmitter, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sender, receiver) = bounded(CHANNEL_SIZE);
    let handle = task::spawn(send_outbound(writer, receiver, interval));
    (Transmitter { sender }, handle)
}

async fn send_outbound<W>(mut writer: W, mut receiver: Receiver<Outbound>, interval: ResendInterval)
where
    W: AsyncWrite + Unpin,
{
    // packet awaiting acknowledgement and when to rewrite it next
    let mut current: Option<([u8; PACKET_LEN], Instant)> = None;
    loop {
        let next = match current {
            Some((packet, deadline)) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match timeout(remaining, receiver.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        trace!("resend timer expired");
                        write_packet(&mut writer, &packet).await;
                        current = Some((packet, interval.deadline()));
                        continue;
                    }
                }
            }
            None => receiver.next().await,
        };
        match next {
            // session ended
            None => break,
            Some(Outbound::Packet { bytes, once }) => {
                if !once {
                    current = Some((bytes, interval.deadline()));
                }
                write_packet(&mut writer, &bytes).await;
            }
            Some(Outbound::Resend) => {
                if let Some((packet, deadline)) = current.as_mut() {
                    write_packet(&mut writer, packet).await;
                    *deadline = interval.deadline();
                }
            }
            Some(Outbound::StopSend) => current = None,
            Some(Outbound::Talk(text)) => write_talk(&mut writer, &text).await,
        }
    }
    // let the peer see end-of-input once the reader is gone too
    let _ = writer.close().await;
    drop(writer);
    trace!("transmitter stopped");
}

async fn write_packet<W: AsyncWrite + Unpin>(writer: &mut W, packet: &[u8; PACKET_LEN]) {
    trace!("send {}", format_bits(packet));
    if let Err(e) = write_flush(writer, packet).await {
        warn!("failed to write packet: {}", e);
    }
}

async fn write_talk<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) {
    let bytes = sanitize_talk(text);
    trace!("send {}", format_bits(&bytes));
    if let Err(e) = write_flush(writer, &bytes).await {
        warn!("failed to write talk: {}", e);
    }
}

#[inline]
async fn write_flush<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Talk is 7-bit text; anything outside 4..=126 becomes `?` so it cannot
/// be mistaken for a packet byte.
pub fn sanitize_talk(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code > 3 && code < 127 {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_transmitter {
    use super::*;
    use async_std::channel::unbounded;
    use futures::executor::block_on;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// writer that forwards every chunk into a channel
    pub(crate) struct ChannelWriter(pub(crate) Sender<Vec<u8>>);

    impl AsyncWrite for ChannelWriter {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            match self.0.try_send(buf.to_vec()) {
                Ok(_) => Poll::Ready(Ok(buf.len())),
                Err(_) => Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe))),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.0.close();
            Poll::Ready(Ok(()))
        }
    }

    fn short_interval() -> ResendInterval {
        ResendInterval {
            min: Duration::from_millis(40),
            max: Duration::from_millis(60),
        }
    }

    const PACKET: [u8; 4] = [0x01, 0xa5, 0xd0, 0x80];

    #[test]
    fn test_sanitize_talk() {
        assert_eq!(sanitize_talk("Hello, Go!"), b"Hello, Go!".to_vec());
        assert_eq!(sanitize_talk("a\u{3}b\u{7f}c"), b"a?b?c".to_vec());
        assert_eq!(sanitize_talk("\u{4}~"), vec![4, b'~']);
        assert_eq!(sanitize_talk("né"), b"n?".to_vec());
        assert_eq!(sanitize_talk("\n"), b"\n".to_vec());
    }

    #[test]
    fn test_resend_until_stopped() {
        let (s, mut written) = unbounded();
        let (transmitter, handle) = start_transmitter(ChannelWriter(s), short_interval());
        block_on(async move {
            let start = Instant::now();
            transmitter
                .send(Outbound::Packet { bytes: PACKET, once: false })
                .await
                .unwrap();
            // first write, then two resends
            for _ in 0..3 {
                assert_eq!(written.next().await.unwrap(), PACKET.to_vec());
            }
            assert!(start.elapsed() >= Duration::from_millis(80));
            transmitter.send(Outbound::StopSend).await.unwrap();
            task::sleep(Duration::from_millis(150)).await;
            // possibly one resend raced with StopSend, never more
            let mut extra = 0;
            while written.try_recv().is_ok() {
                extra += 1;
            }
            assert!(extra <= 1);
            drop(transmitter);
            handle.await;
            // writer closed on shutdown
            assert!(written.next().await.is_none());
        });
    }

    #[test]
    fn test_once_and_talk_not_repeated() {
        let (s, mut written) = unbounded();
        let (transmitter, handle) = start_transmitter(ChannelWriter(s), short_interval());
        block_on(async move {
            transmitter
                .send(Outbound::Packet { bytes: PACKET, once: true })
                .await
                .unwrap();
            transmitter.send(Outbound::Talk("hi\u{1}".to_string())).await.unwrap();
            transmitter.send(Outbound::Resend).await.unwrap();
            drop(transmitter);
            handle.await;
            let mut all = Vec::new();
            while let Some(chunk) = written.next().await {
                all.extend(chunk);
            }
            assert_eq!(all, vec![0x01, 0xa5, 0xd0, 0x80, b'h', b'i', b'?']);
        });
    }

    #[test]
    fn test_talk_does_not_postpone_resend() {
        let (s, mut written) = unbounded();
        let interval = ResendInterval {
            min: Duration::from_millis(100),
            max: Duration::from_millis(150),
        };
        let (transmitter, handle) = start_transmitter(ChannelWriter(s), interval);
        block_on(async move {
            transmitter
                .send(Outbound::Packet { bytes: PACKET, once: false })
                .await
                .unwrap();
            // talk arrives more often than the resend interval
            for _ in 0..20 {
                task::sleep(Duration::from_millis(50)).await;
                transmitter.send(Outbound::Talk("x".to_string())).await.unwrap();
            }
            drop(transmitter);
            handle.await;
            let mut packets = 0;
            while let Some(chunk) = written.next().await {
                if chunk == PACKET.to_vec() {
                    packets += 1;
                }
            }
            // resent roughly every 125ms for a second
            assert!(packets >= 5, "only {} packet writes", packets);
        });
    }

    #[test]
    fn test_forced_resend() {
        let (s, mut written) = unbounded();
        let interval = ResendInterval {
            min: Duration::from_secs(20),
            max: Duration::from_secs(30),
        };
        let (transmitter, _handle) = start_transmitter(ChannelWriter(s), interval);
        block_on(async move {
            transmitter
                .send(Outbound::Packet { bytes: PACKET, once: false })
                .await
                .unwrap();
            transmitter.send(Outbound::Resend).await.unwrap();
            assert_eq!(written.next().await.unwrap(), PACKET.to_vec());
            assert_eq!(written.next().await.unwrap(), PACKET.to_vec());
        });
    }
}
