use crate::CHANNEL_SIZE;
use async_std::channel::{bounded, Receiver};
use async_std::task;
use futures::channel::oneshot;
use futures::{select, AsyncRead, AsyncReadExt, FutureExt};
use log::{info, trace, warn};

const READ_BUFFER_SIZE: usize = 16;

/// Dropping it stops the receiver task, which then releases the reader.
pub(crate) type ReceiverStopper = oneshot::Sender<()>;

/// Spawn a task reading raw bytes from `reader`.
///
/// The returned channel closes on end-of-input or read error. The task
/// also stops, even in the middle of a blocked read, once the stopper
/// is dropped or the receiving side is gone. The reader is dropped when
/// the task stops.
pub(crate) fn retrieve_bytes<R>(reader: R) -> (Receiver<Vec<u8>>, ReceiverStopper)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (sender, receiver) = bounded(CHANNEL_SIZE);
    let (stopper, mut stopped) = oneshot::channel::<()>();
    task::spawn(async move {
        let mut reader = reader;
        loop {
            let chunk = select! {
                chunk = read_chunk(&mut reader).fuse() => chunk,
                _ = stopped => None,
            };
            match chunk {
                Some(bytes) => {
                    if sender.send(bytes).await.is_err() {
                        break;
                    }
                }
                None => break,
            }
        }
        // release the transport before the session sees the channel close
        drop(reader);
        drop(sender);
        trace!("receiver stopped");
    });
    (receiver, stopper)
}

/// `None` if no more data to read
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R) -> Option<Vec<u8>> {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    match reader.read(&mut buffer).await {
        Ok(0) => {
            info!("input stream was closed");
            None
        }
        Ok(n) => Some(buffer[..n].to_vec()),
        Err(e) => {
            warn!("read error: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod test_receiver {
    use super::*;
    use futures::executor::block_on;
    use futures::io::Cursor;
    use futures::StreamExt;
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    /// reader that never yields a byte
    struct Silent(Arc<()>);

    impl AsyncRead for Silent {
        fn poll_read(self: Pin<&mut Self>, _: &mut Context<'_>, _: &mut [u8]) -> Poll<io::Result<usize>> {
            Poll::Pending
        }
    }

    #[test]
    fn test_reads_until_end() {
        let input: Vec<u8> = (0..40).collect();
        let (chunks, _stopper) = retrieve_bytes(Cursor::new(input.clone()));
        let received = block_on(chunks.concat());
        assert_eq!(received, input);
    }

    #[test]
    fn test_stop_releases_blocked_reader() {
        let alive = Arc::new(());
        let (chunks, stopper) = retrieve_bytes(Silent(alive.clone()));
        block_on(async {
            drop(stopper);
            assert!(chunks.recv().await.is_err());
        });
        assert_eq!(Arc::strong_count(&alive), 1);
    }
}
