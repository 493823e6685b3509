use crate::device::HapticDevice;
use crate::types::{Pose, PoseSample};
use crate::{EndoscopeError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::time::{Duration, Instant};

/// Handle to a polling worker that owns a device.
///
/// The worker polls at a fixed period (position first, then the rotation of the
/// same read) and publishes each pose on a bounded channel, dropping samples
/// the consumer does not keep up with. A poll error is delivered once and ends
/// the worker; there is no reconnect.
///
/// Stopping is observed between polls only. If the serial link stalls, the
/// worker stays blocked in its read until bytes arrive or the transport's
/// stall timeout fires.
pub struct PoseStream<D> {
    receiver: Receiver<Result<PoseSample>>,
    stop: Option<Sender<()>>,
    thread: Option<std::thread::JoinHandle<D>>,
}

impl<D: HapticDevice + Send + 'static> PoseStream<D> {
    /// Open `device` if needed and start polling it every `period`.
    pub fn start(mut device: D, period: Duration) -> Result<PoseStream<D>> {
        device.open()?;

        let (sender, receiver) = crossbeam_channel::bounded(64);
        let (stop, stop_rx) = crossbeam_channel::bounded(1);

        let thread = std::thread::Builder::new()
            .name("endoscope-poll".into())
            .spawn(move || poll_loop(device, period, sender, stop_rx))?;

        Ok(PoseStream {
            receiver,
            stop: Some(stop),
            thread: Some(thread),
        })
    }
}

impl<D> PoseStream<D> {
    /// Receive the next pose (blocks until available).
    pub fn recv(&self) -> Result<PoseSample> {
        self.receiver
            .recv()
            .map_err(|_| EndoscopeError::StreamStopped)?
    }

    /// Try to receive a pose without blocking.
    pub fn try_recv(&self) -> Option<Result<PoseSample>> {
        self.receiver.try_recv().ok()
    }

    /// Receive a pose with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<PoseSample> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => EndoscopeError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => EndoscopeError::StreamStopped,
        })?
    }

    /// Check if the worker is still polling.
    pub fn is_active(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the worker and take the device back, still open.
    ///
    /// Returns `None` if the worker panicked.
    pub fn stop(mut self) -> Option<D> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<D> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        self.thread.take().and_then(|thread| thread.join().ok())
    }
}

impl<D> Drop for PoseStream<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop<D: HapticDevice>(
    mut device: D,
    period: Duration,
    sender: Sender<Result<PoseSample>>,
    stop: Receiver<()>,
) -> D {
    let epoch = Instant::now();
    let mut sequence = 0u64;

    log::info!("Pose poller started ({:?} period)", period);

    loop {
        let tick = Instant::now();

        let polled = match device.get_position() {
            Ok(position) => device
                .get_rotation()
                .map(|rotation| Pose { rotation, position }),
            Err(e) => Err(e),
        };

        match polled {
            Ok(pose) => {
                let sample = PoseSample {
                    pose,
                    sequence,
                    host_timestamp_s: epoch.elapsed().as_secs_f64(),
                };
                sequence += 1;
                if let Err(e) = sender.try_send(Ok(sample)) {
                    match e {
                        crossbeam_channel::TrySendError::Full(_) => {
                            log::trace!("Pose channel full, dropping sample");
                        }
                        crossbeam_channel::TrySendError::Disconnected(_) => {
                            log::info!("Pose channel disconnected, stopping poller");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                log::warn!("Pose poll failed: {}", e);
                crossbeam_channel::select! {
                    send(sender, Err(e)) -> _ => {}
                    recv(stop) -> _ => {}
                }
                break;
            }
        }

        match stop.recv_timeout(period.saturating_sub(tick.elapsed())) {
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            _ => {
                log::info!("Pose poller stopping");
                break;
            }
        }
    }

    device
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UsartDevice;
    use crate::mock::MockTransport;
    use crate::types::RawSample;
    use crate::ErrorKind;

    #[test]
    fn test_stream_delivers_then_reports_lost_link() {
        let mut link = MockTransport::new();
        for _ in 0..3 {
            link.push_frame(RawSample::new(15.0, 0.0, 0.0));
        }
        let stream = PoseStream::start(UsartDevice::new(link), Duration::from_millis(1)).unwrap();

        for expected in 0..3 {
            let sample = stream.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(sample.sequence, expected);
        }
        let err = stream.recv_timeout(Duration::from_secs(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(matches!(
            stream.recv_timeout(Duration::from_secs(2)),
            Err(EndoscopeError::StreamStopped)
        ));

        let device = stream.stop().unwrap();
        assert!(!device.is_open());
        assert_eq!(device.orientation().x, 3.0);
    }

    #[test]
    fn test_stop_returns_open_device() {
        let mut link = MockTransport::new();
        for _ in 0..10_000 {
            link.push_frame(RawSample::new(0.0, 0.0, 0.0));
        }
        let stream = PoseStream::start(UsartDevice::new(link), Duration::from_millis(5)).unwrap();
        stream.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(stream.is_active());

        let mut device = stream.stop().unwrap();
        assert!(device.is_open());
        device.close().unwrap();
    }

    #[test]
    fn test_start_fails_when_port_unavailable() {
        let result = PoseStream::start(
            UsartDevice::new(MockTransport::unavailable()),
            Duration::from_millis(1),
        );
        assert!(result.is_err());
    }
}
