//! Async wrapper for Adapters implementing the [`CanAdapter`] trait.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::can::CanAdapter;
use crate::can::Frame;
use crate::error::Error;
use crate::Result;
use crate::Stream;
use async_stream::stream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, warn};

const CAN_TX_BUFFER_SIZE: usize = 128;
const CAN_RX_BUFFER_SIZE: usize = 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How long [`AsyncCanAdapter::close`] waits for the background thread before detaching it.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(1);

type SendCallback = oneshot::Sender<Result<()>>;

fn process<T: CanAdapter>(
    mut adapter: T,
    mut shutdown_receiver: oneshot::Receiver<()>,
    rx_sender: broadcast::Sender<Frame>,
    mut tx_receiver: mpsc::Receiver<(Frame, SendCallback)>,
) {
    let opened = Instant::now();
    let mut pending: VecDeque<(Frame, SendCallback)> = VecDeque::new();

    while let Err(oneshot::error::TryRecvError::Empty) = shutdown_receiver.try_recv() {
        match adapter.recv() {
            Ok(frames) => {
                for frame in frames {
                    let frame = frame.with_timestamp(opened.elapsed());
                    debug! {"RX {:?}", frame};

                    // No subscribers is fine, the frame is simply dropped
                    let _ = rx_sender.send(frame);
                }
            }
            Err(Error::Disconnected) => {
                error!("Adapter disconnected, stopping");
                break;
            }
            Err(e) => {
                warn!("{}", Error::TransportReceive(e.to_string()));
            }
        }

        while let Ok(item) = tx_receiver.try_recv() {
            pending.push_back(item);
        }

        if !pending.is_empty() {
            let mut buffer: VecDeque<Frame> = pending.iter().map(|(frame, _)| frame.clone()).collect();
            let queued = buffer.len();
            let result = adapter.send(&mut buffer);
            let written = queued - buffer.len();

            for (frame, callback) in pending.drain(..written) {
                debug! {"TX {:?}", frame};
                let _ = callback.send(Ok(()));
            }

            match result {
                Ok(()) => {}
                Err(Error::Disconnected) => {
                    error!("Adapter disconnected while sending, stopping");
                    break;
                }
                Err(e) => {
                    // The frame at the head of the queue failed, report it to its sender. No retry.
                    if let Some((_, callback)) = pending.pop_front() {
                        let _ = callback.send(Err(e));
                    }
                }
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    for (_, callback) in pending.drain(..) {
        let _ = callback.send(Err(Error::Disconnected));
    }

    adapter.close();
    debug!("Adapter closed");
}

struct Worker {
    handle: std::thread::JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
    finished: std::sync::mpsc::Receiver<()>,
}

/// Async wrapper around a [`CanAdapter`]. Starts a background thread to handle sending and receiving frames. Uses tokio channels to communicate with the background thread.
///
/// All sends go through a single queue to the background thread, so they are serialized even when issued from concurrent tasks.
pub struct AsyncCanAdapter {
    worker: Mutex<Option<Worker>>,
    recv_receiver: broadcast::Receiver<Frame>,
    send_sender: mpsc::Sender<(Frame, SendCallback)>,
    grace: Duration,
}

impl AsyncCanAdapter {
    pub fn new<T: CanAdapter + Send + 'static>(adapter: T) -> Self {
        Self::with_grace(adapter, DEFAULT_CLOSE_GRACE)
    }

    /// Like [`AsyncCanAdapter::new`], with a custom grace period for [`AsyncCanAdapter::close`].
    pub fn with_grace<T: CanAdapter + Send + 'static>(adapter: T, grace: Duration) -> Self {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let (send_sender, send_receiver) = mpsc::channel(CAN_TX_BUFFER_SIZE);
        let (recv_sender, recv_receiver) = broadcast::channel(CAN_RX_BUFFER_SIZE);
        let (finished_sender, finished_receiver) = std::sync::mpsc::channel();

        let handle = std::thread::spawn(move || {
            process(adapter, shutdown_receiver, recv_sender, send_receiver);
            let _ = finished_sender.send(());
        });

        AsyncCanAdapter {
            worker: Mutex::new(Some(Worker {
                handle,
                shutdown: shutdown_sender,
                finished: finished_receiver,
            })),
            recv_receiver,
            send_sender,
            grace,
        }
    }

    /// Send a single frame. The Future will resolve once the frame has been handed over to the adapter for sending. This does not mean the message is sent out on the CAN bus yet, as this could be pending arbitration.
    pub async fn send(&self, frame: &Frame) -> Result<()> {
        // Create oneshot channel to signal the completion of the send operation
        let (callback_sender, callback_receiver) = oneshot::channel();
        self.send_sender
            .send((frame.clone(), callback_sender))
            .await
            .map_err(|_| Error::Disconnected)?;

        callback_receiver.await.map_err(|_| Error::Disconnected)?
    }

    /// Receive all frames. The stream ends when the adapter is closed or disconnected.
    pub fn recv(&self) -> impl Stream<Item = Frame> + Unpin {
        self.recv_filter(|_| true)
    }

    /// Receive frames that match a filter. Useful in combination with stream adapters.
    pub fn recv_filter(&self, filter: impl Fn(&Frame) -> bool) -> impl Stream<Item = Frame> + Unpin {
        let mut rx = self.recv_receiver.resubscribe();

        Box::pin(stream! {
            loop { match rx.recv().await {
                    Ok(frame) => {
                        if filter(&frame) {
                            yield frame
                        } else {
                            continue
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("{}", Error::TransportReceive(format!("subscriber lagged, {} frames dropped", n)));
                        continue
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Whether the background thread has stopped, either through [`AsyncCanAdapter::close`] or because the adapter disconnected.
    pub fn is_closed(&self) -> bool {
        match self.worker.lock() {
            Ok(worker) => worker.as_ref().map_or(true, |w| w.handle.is_finished()),
            Err(poisoned) => poisoned.get_ref().as_ref().map_or(true, |w| w.handle.is_finished()),
        }
    }

    /// Stop the background thread and release the adapter. Waits at most the grace period for the thread, after that it is detached.
    /// Returns `true` for the call that performed the shutdown; later calls are no-ops and return `false`.
    pub fn close(&self) -> bool {
        let worker = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(worker) = worker else {
            return false;
        };

        // Send shutdown signal to background thread. Fails if it already stopped on its own.
        let _ = worker.shutdown.send(());

        match worker.finished.recv_timeout(self.grace) {
            Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    error!("Adapter thread panicked");
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                warn!("Adapter thread did not stop within {:?}, detaching", self.grace);
            }
        }

        true
    }
}

impl Drop for AsyncCanAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
