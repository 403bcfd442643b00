//! Session worker: owns the buffer, the load controller, the track selector
//! and the timeline, and schedules segment fetches one at a time.

use std::{sync::Arc, time::Duration};

use lyre_abr::{BandwidthMeter, TrackSelector};
use lyre_core::{Manifest, Representation, Segment, SegmentPosition, SegmentTimeline};
use lyre_events::{EventBus, LoadEvent, PlaybackState, SessionEvent};
use lyre_net::{DataSource, NetError};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    buffer::BufferState,
    config::SessionConfig,
    error::{PlayError, PlayResult},
    load_control::{LoadControl, LoadState},
    snapshot::SessionStatus,
};

/// Where to move playback to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SeekTarget {
    Global(Duration),
    /// Clamped to the window.
    Window { window: usize, position: Duration },
    /// Offset from the start of `window`, free to run into later windows.
    Resume { window: usize, position: Duration },
}

impl SeekTarget {
    pub(crate) fn window(self) -> Option<usize> {
        match self {
            Self::Global(_) => None,
            Self::Window { window, .. } | Self::Resume { window, .. } => Some(window),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    SetPlayWhenReady(bool),
    Seek(SeekTarget),
    UpdateManifest {
        window: usize,
        manifest: Manifest,
        reply: oneshot::Sender<PlayResult<()>>,
    },
}

pub(crate) struct WorkerInit {
    pub timeline: SegmentTimeline,
    pub config: SessionConfig,
    pub source: Arc<dyn DataSource>,
    pub meter: BandwidthMeter,
    pub bus: EventBus,
    pub status_tx: watch::Sender<SessionStatus>,
    pub cancel: CancellationToken,
    pub cmd_rx: mpsc::UnboundedReceiver<Command>,
    pub play_when_ready: bool,
    pub start_at: Option<SeekTarget>,
}

struct InFlight {
    epoch: u64,
    cancel: CancellationToken,
}

struct FetchDone {
    epoch: u64,
    pos: SegmentPosition,
    representation: String,
    result: Result<(u64, Duration), NetError>,
}

impl From<LoadState> for PlaybackState {
    fn from(state: LoadState) -> Self {
        match state {
            LoadState::Empty => Self::Empty,
            LoadState::Loading => Self::Loading,
            LoadState::Buffered => Self::Buffered,
            LoadState::Stalled => Self::Stalled,
        }
    }
}

pub(crate) struct Worker {
    timeline: SegmentTimeline,
    buffer: BufferState,
    load: LoadControl,
    selector: TrackSelector,
    meter: BandwidthMeter,
    source: Arc<dyn DataSource>,
    bus: EventBus,
    status_tx: watch::Sender<SessionStatus>,
    cancel: CancellationToken,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    done_tx: mpsc::UnboundedSender<FetchDone>,
    done_rx: mpsc::UnboundedReceiver<FetchDone>,
    tick_interval: Duration,
    last_tick: Instant,
    play_when_ready: bool,
    state: PlaybackState,
    /// Next slot to fetch; `None` once the rest of the timeline is buffered.
    next_load: Option<SegmentPosition>,
    /// Representation of the most recently scheduled segment.
    current: Option<Representation>,
    in_flight: Option<InFlight>,
    /// Bumped on every seek; completions of older epochs are stale.
    epoch: u64,
}

impl Worker {
    pub(crate) fn spawn(init: WorkerInit) -> tokio::task::JoinHandle<()> {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let next_load = init.timeline.locate(Duration::ZERO);
        let worker = Self {
            buffer: BufferState::default(),
            load: LoadControl::new(init.config.load.clone()),
            selector: TrackSelector::new(init.config.abr.clone()),
            meter: init.meter,
            source: init.source,
            bus: init.bus,
            status_tx: init.status_tx,
            cancel: init.cancel,
            cmd_rx: init.cmd_rx,
            done_tx,
            done_rx,
            tick_interval: init.config.tick_interval,
            last_tick: Instant::now(),
            play_when_ready: init.play_when_ready,
            state: PlaybackState::Idle,
            next_load,
            current: None,
            in_flight: None,
            epoch: 0,
            timeline: init.timeline,
        };
        tokio::spawn(worker.run(init.start_at))
    }

    async fn run(mut self, start_at: Option<SeekTarget>) {
        self.publish_timeline();
        self.set_state(PlaybackState::Empty);
        if self.play_when_ready {
            self.bus.publish(SessionEvent::PlayWhenReadyChanged {
                play_when_ready: true,
            });
        }
        if let Some(target) = start_at {
            self.seek(target);
        }
        if !self.state.is_terminal() {
            if let Some(state) = self.load.start() {
                self.set_state(state.into());
            }
        }

        let cancel = self.cancel.clone();
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.last_tick = Instant::now();

        loop {
            self.schedule();
            self.publish_status();

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(done) = self.done_rx.recv() => self.on_fetch_done(done),
                _ = ticker.tick() => self.on_tick(),
            }
        }

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
        }
        // Last event of the session.
        self.bus.publish(SessionEvent::Released);
        debug!("session worker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SetPlayWhenReady(play_when_ready) => {
                if self.play_when_ready == play_when_ready {
                    return;
                }
                self.play_when_ready = play_when_ready;
                info!(
                    state = %self.state,
                    play_when_ready,
                    "play_when_ready changed"
                );
                self.bus
                    .publish(SessionEvent::PlayWhenReadyChanged { play_when_ready });
            }
            Command::Seek(target) => self.seek(target),
            Command::UpdateManifest {
                window,
                manifest,
                reply,
            } => {
                let result = self
                    .timeline
                    .replace_manifest(window, manifest)
                    .map_err(PlayError::from);
                match &result {
                    Ok(()) => self.bus.publish(SessionEvent::TracksChanged {
                        window,
                        representations: self.timeline.representations(window).to_vec(),
                    }),
                    Err(err) => warn!(window, %err, "manifest update rejected"),
                }
                let _ = reply.send(result);
            }
        }
    }

    fn seek(&mut self, target: SeekTarget) {
        if self.state == PlaybackState::Failed {
            debug!(?target, "seek ignored after failure");
            return;
        }
        let position = match target {
            SeekTarget::Global(position) => position,
            SeekTarget::Window { window, position } => {
                match self.timeline.global_position(window, position) {
                    Ok(position) => position,
                    Err(err) => {
                        warn!(%err, "seek target rejected");
                        return;
                    }
                }
            }
            SeekTarget::Resume { window, position } => match self.timeline.window(window) {
                Some(w) => w.offset + position,
                None => {
                    warn!(window, "resume window out of range");
                    return;
                }
            },
        }
        .min(self.timeline.duration());

        if let Some(in_flight) = &self.in_flight {
            in_flight.cancel.cancel();
        }
        self.epoch += 1;
        self.buffer.flush(position);
        self.selector.reset();
        self.next_load = self.timeline.locate(position);
        let window = self.timeline.window_at(position);
        debug!(
            position_ms = position.as_millis(),
            window,
            epoch = self.epoch,
            "seek"
        );
        self.bus
            .publish(SessionEvent::PositionDiscontinuity { position, window });

        if self.next_load.is_none() {
            self.set_state(PlaybackState::Ended);
            return;
        }
        // Ending before loading ever started leaves the controller Empty.
        if self.load.state() == LoadState::Empty {
            self.load.start();
        }
        self.load.reset();
        self.set_state(self.load.state().into());
    }

    fn on_tick(&mut self) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        if self.state.is_terminal() || self.state == PlaybackState::Empty {
            return;
        }
        if self.play_when_ready {
            self.buffer.consume(elapsed);
        }
        if self.next_load.is_none() && self.buffer.position() >= self.timeline.duration() {
            self.set_state(PlaybackState::Ended);
            return;
        }
        self.update_load();
    }

    fn update_load(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let complete = self.next_load.is_none();
        if let Some(state) = self
            .load
            .update(self.buffer.buffered(), self.play_when_ready, complete)
        {
            self.set_state(state.into());
        }
    }

    fn schedule(&mut self) {
        if self.state.is_terminal() || self.in_flight.is_some() || !self.load.wants_data() {
            return;
        }
        let Some(pos) = self.next_load else {
            return;
        };

        let estimate = self.meter.estimate();
        let candidates = self.timeline.representations(pos.window);
        let Some(decision) = self
            .selector
            .select(candidates, estimate, self.current.as_ref())
        else {
            warn!(window = pos.window, "window declares no representations");
            return;
        };

        if decision.changed {
            let from = self.current.as_ref().map(|r| r.id.clone());
            debug!(
                from = ?from,
                to = %decision.representation.id,
                reason = ?decision.reason,
                estimate,
                "representation switch"
            );
            self.bus.publish(LoadEvent::RepresentationSwitched {
                from,
                to: decision.representation.id.clone(),
                reason: decision.reason,
            });
        }

        let Some(segment) = self
            .timeline
            .segment(pos, &decision.representation.id)
            .cloned()
        else {
            warn!(
                window = pos.window,
                index = pos.index,
                representation = %decision.representation.id,
                "segment missing from manifest"
            );
            return;
        };
        self.current = Some(decision.representation);
        self.start_fetch(pos, segment);
    }

    fn start_fetch(&mut self, pos: SegmentPosition, segment: Segment) {
        let epoch = self.epoch;
        let cancel = self.cancel.child_token();
        let token = cancel.clone();
        let source = Arc::clone(&self.source);
        let done_tx = self.done_tx.clone();

        trace!(uri = %segment.uri, epoch, "segment fetch start");
        self.bus.publish(LoadEvent::SegmentStart {
            window: pos.window,
            segment_index: pos.index,
            representation: segment.representation_id.clone(),
        });

        tokio::spawn(async move {
            let started = Instant::now();
            let result = tokio::select! {
                biased;
                () = token.cancelled() => Err(NetError::Cancelled),
                result = source.fetch(&segment) => {
                    result.map(|bytes| (bytes.len() as u64, started.elapsed()))
                }
            };
            let _ = done_tx.send(FetchDone {
                epoch,
                pos,
                representation: segment.representation_id,
                result,
            });
        });
        self.in_flight = Some(InFlight { epoch, cancel });
    }

    fn on_fetch_done(&mut self, done: FetchDone) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.epoch == done.epoch)
        {
            self.in_flight = None;
        }
        if done.epoch != self.epoch {
            trace!(
                epoch = done.epoch,
                current = self.epoch,
                "discarding superseded segment"
            );
            self.bus.publish(LoadEvent::SegmentDiscarded {
                window: done.pos.window,
                segment_index: done.pos.index,
            });
            return;
        }

        match done.result {
            Ok((bytes, elapsed)) => {
                let Some((_, end)) = self.timeline.bounds(done.pos) else {
                    return;
                };
                self.buffer.append(end);
                self.next_load = self.timeline.next(done.pos);
                self.bus.publish(LoadEvent::SegmentComplete {
                    window: done.pos.window,
                    segment_index: done.pos.index,
                    representation: done.representation,
                    bytes,
                    elapsed,
                });
                if let Some(state) = self.load.on_segment_loaded() {
                    self.set_state(state.into());
                }
                self.update_load();
            }
            Err(NetError::Cancelled) => {}
            Err(error) => {
                warn!(
                    window = done.pos.window,
                    index = done.pos.index,
                    %error,
                    "segment fetch failed"
                );
                self.bus.publish(SessionEvent::Error {
                    error: error.to_string(),
                    recoverable: false,
                });
                self.set_state(PlaybackState::Failed);
            }
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if state == self.state {
            return;
        }
        let was_loading = is_loading(self.state);
        self.state = state;
        if self.cancel.is_cancelled() {
            return;
        }
        info!(
            "changed state to {state} play_when_ready={}",
            self.play_when_ready
        );
        self.bus.publish(SessionEvent::StateChanged {
            state,
            buffered: self.buffer.buffered(),
            representation: self.current.as_ref().map(|r| r.id.clone()),
            play_when_ready: self.play_when_ready,
        });
        if was_loading != is_loading(state) {
            self.bus.publish(LoadEvent::LoadingChanged {
                is_loading: is_loading(state),
            });
        }
        self.publish_status();
    }

    fn publish_timeline(&self) {
        self.bus.publish(SessionEvent::TimelineChanged {
            windows: self.timeline.window_count(),
            duration: self.timeline.duration(),
        });
        for (window, w) in self.timeline.windows().iter().enumerate() {
            self.bus.publish(SessionEvent::TracksChanged {
                window,
                representations: w.manifest.representations().to_vec(),
            });
        }
    }

    fn publish_status(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let position = self.buffer.position();
        let window = self.timeline.window_at(position);
        let offset = self
            .timeline
            .window(window)
            .map_or(Duration::ZERO, |w| w.offset);
        let status = SessionStatus {
            state: self.state,
            play_when_ready: self.play_when_ready,
            position,
            window,
            window_position: position.saturating_sub(offset),
            buffered: self.buffer.buffered(),
            representation: self.current.as_ref().map(|r| r.id.clone()),
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}

fn is_loading(state: PlaybackState) -> bool {
    matches!(state, PlaybackState::Loading | PlaybackState::Stalled)
}
