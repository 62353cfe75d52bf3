//! The device control loop: sample, decide, dispatch.
//!
//! One cycle per poll tick, strictly sequential. A slow sensor, camera or
//! sink delays the next tick rather than overlapping it. Failures are
//! logged and counted; they never undo a decision the detector already
//! made, because the decision (not the delivery) is authoritative.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use binbin_core::{BinEvent, BinId, DeviceConfig, EventKind};
use binbin_detector::{FillDepositDetector, Sample};

use crate::traits::{Camera, DistanceSensor, EventSink};

type Clock = Box<dyn FnMut() -> DateTime<Utc> + Send>;

/// Running counters for the lifetime of the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub samples: u64,
    pub sensor_failures: u64,
    pub camera_failures: u64,
    pub events_emitted: u64,
    pub dispatch_failures: u64,
}

/// Outcome of a single cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// `None` when the sensor failed and nothing was decided.
    pub distance_cm: Option<f64>,
    /// Kinds emitted, in dispatch order.
    pub emitted: Vec<EventKind>,
    pub delivered: usize,
    pub failed: usize,
}

pub struct ControlLoop {
    bin_id: BinId,
    poll_interval: Duration,
    detector: FillDepositDetector,
    sensor: Box<dyn DistanceSensor>,
    camera: Box<dyn Camera>,
    sink: Box<dyn EventSink>,
    clock: Clock,
    stats: LoopStats,
}

impl ControlLoop {
    pub fn new(
        config: &DeviceConfig,
        sensor: Box<dyn DistanceSensor>,
        camera: Box<dyn Camera>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        Self {
            bin_id: config.bin_id.clone(),
            poll_interval: config.poll_interval,
            detector: FillDepositDetector::new(config.detector()),
            sensor,
            camera,
            sink,
            clock: Box::new(Utc::now),
            stats: LoopStats::default(),
        }
    }

    /// Replace the wall clock used to timestamp samples.
    pub fn with_clock(mut self, clock: impl FnMut() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn detector(&self) -> &FillDepositDetector {
        &self.detector
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Tick every `poll_interval` until `shutdown` resolves.
    ///
    /// Ticks land on multiples of the interval from the start; a cycle that
    /// overruns skips the missed ticks instead of bursting to catch up.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> LoopStats {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            bin_id = %self.bin_id,
            sensor = self.sensor.name(),
            camera = self.camera.name(),
            sink = self.sink.channel_name(),
            poll_interval = ?self.poll_interval,
            "control loop started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        let stats = &self.stats;
        info!(
            ticks = stats.ticks,
            samples = stats.samples,
            sensor_failures = stats.sensor_failures,
            camera_failures = stats.camera_failures,
            events_emitted = stats.events_emitted,
            dispatch_failures = stats.dispatch_failures,
            "control loop stopped"
        );
        self.stats.clone()
    }

    /// Run one sample → decide → dispatch cycle.
    pub async fn tick(&mut self) -> TickReport {
        self.stats.ticks += 1;
        let mut report = TickReport::default();

        let distance_cm = match self.sensor.read_distance().await {
            Ok(d) => d,
            Err(e) => {
                // Detector state is untouched; try again next tick.
                self.stats.sensor_failures += 1;
                warn!(sensor = self.sensor.name(), error = %e, "distance read failed");
                return report;
            }
        };
        let sample = Sample::new(distance_cm, (self.clock)());
        self.stats.samples += 1;
        report.distance_cm = Some(distance_cm);

        for detection in self.detector.observe(sample) {
            let mut event = detection.into_event(&self.bin_id);

            match detection.kind {
                EventKind::FillLevel => debug!(distance_cm, "fill level"),
                EventKind::BinFull => info!(distance_cm, "bin full"),
                EventKind::Deposit => {
                    info!(distance_cm, "deposit confirmed, capturing image");
                    match self.camera.capture_image().await {
                        Ok(image) => event = event.with_image(image),
                        Err(e) => {
                            self.stats.camera_failures += 1;
                            warn!(
                                camera = self.camera.name(),
                                error = %e,
                                "image capture failed, sending deposit without image"
                            );
                        }
                    }
                }
            }

            report.emitted.push(detection.kind);
            self.stats.events_emitted += 1;

            if self.dispatch(&event).await {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        report
    }

    /// Best-effort, at-most-once delivery.
    async fn dispatch(&mut self, event: &BinEvent) -> bool {
        let start = std::time::Instant::now();
        let result = self.sink.send(event).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                debug!(
                    channel = self.sink.channel_name(),
                    event_type = %event.event_type,
                    duration_ms,
                    "event delivered"
                );
                true
            }
            Err(e) => {
                self.stats.dispatch_failures += 1;
                warn!(
                    channel = self.sink.channel_name(),
                    event_type = %event.event_type,
                    error = %e,
                    duration_ms,
                    "event delivery failed"
                );
                false
            }
        }
    }
}
