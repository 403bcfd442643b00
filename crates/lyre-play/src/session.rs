use std::{mem, time::Duration};

use lyre_abr::BandwidthMeter;
use lyre_core::{Manifest, SegmentTimeline};
use lyre_events::{Event, EventBus, PlaybackState, SessionEvent};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::SessionConfig,
    context::PlaybackContext,
    error::{PlayError, PlayResult},
    manifest::MediaSource,
    snapshot::{PlaybackSnapshot, SessionStatus},
    worker::{Command, SeekTarget, Worker, WorkerInit},
};

/// One playback of a [`MediaSource`].
///
/// Public methods never block: commands go to a worker task spawned by
/// [`prepare`](Self::prepare). State is observable through
/// [`status`](Self::status), [`watch`](Self::watch) and the ordered event
/// stream of [`subscribe`](Self::subscribe).
///
/// Dropping the session releases it.
pub struct PlaybackSession {
    ctx: PlaybackContext,
    config: SessionConfig,
    bus: EventBus,
    status_tx: watch::Sender<SessionStatus>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    phase: Phase,
    /// Requests made before the worker exists.
    pending: Pending,
}

#[derive(Default)]
enum Phase {
    #[default]
    Idle,
    Preparing,
    Running(Running),
    Released,
}

struct Running {
    cmd_tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    windows: usize,
}

impl Running {
    fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("session worker already stopped");
        }
    }
}

#[derive(Default)]
struct Pending {
    play_when_ready: bool,
    start_at: Option<SeekTarget>,
}

impl Pending {
    fn snapshot(&self) -> PlaybackSnapshot {
        let (window, position) = match self.start_at {
            Some(
                SeekTarget::Window { window, position } | SeekTarget::Resume { window, position },
            ) => (window, position),
            // Window 0 starts at zero, and resuming runs on past its end.
            Some(SeekTarget::Global(position)) => (0, position),
            None => (0, Duration::ZERO),
        };
        PlaybackSnapshot {
            window,
            position,
            play_when_ready: self.play_when_ready,
        }
    }
}

impl PlaybackSession {
    pub fn new(ctx: PlaybackContext, config: SessionConfig) -> PlayResult<Self> {
        config.validate()?;
        let bus = ctx
            .bus
            .clone()
            .unwrap_or_else(|| EventBus::new(config.events_capacity));
        let (status_tx, _) = watch::channel(SessionStatus::default());
        Ok(Self {
            ctx,
            config,
            bus,
            status_tx,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Resume from a snapshot taken by [`release`](Self::release) of an
    /// earlier session. Must be called before [`prepare`](Self::prepare).
    pub fn restore(&self, snapshot: &PlaybackSnapshot) -> PlayResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.phase {
            Phase::Idle => {}
            Phase::Released => return Err(PlayError::Released),
            Phase::Preparing | Phase::Running(_) => return Err(PlayError::AlreadyPrepared),
        }
        inner.pending = Pending {
            play_when_ready: snapshot.play_when_ready,
            start_at: Some(SeekTarget::Resume {
                window: snapshot.window,
                position: snapshot.position,
            }),
        };
        self.status_tx
            .send_modify(|s| s.play_when_ready = snapshot.play_when_ready);
        debug!(?snapshot, "snapshot restored");
        Ok(())
    }

    /// Load the manifests of `source`, build the timeline and start loading.
    ///
    /// On failure the session stays idle and may be prepared again.
    pub async fn prepare(&self, source: impl Into<MediaSource>) -> PlayResult<()> {
        let source = source.into();
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match inner.phase {
                Phase::Idle => inner.phase = Phase::Preparing,
                Phase::Released => return Err(PlayError::Released),
                Phase::Preparing | Phase::Running(_) => return Err(PlayError::AlreadyPrepared),
            }
        }
        // Back to Idle on failure or when this future is dropped mid-load.
        let mut preparing = PreparingGuard {
            inner: &self.inner,
            done: false,
        };

        let timeline = self.build_timeline(&source).await;

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if matches!(inner.phase, Phase::Released) {
            return Err(PlayError::Released);
        }
        let timeline = timeline?;

        let windows = timeline.window_count();
        let mut start_at = inner.pending.start_at.take();
        if let Some(window) = start_at.and_then(SeekTarget::window) {
            if window >= windows {
                warn!(window, windows, "restored window out of range, starting over");
                start_at = None;
            }
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        Worker::spawn(WorkerInit {
            timeline,
            config: self.config.clone(),
            source: self.ctx.fetch_source(&self.bus, &self.config),
            meter: self.ctx.meter.clone(),
            bus: self.bus.clone(),
            status_tx: self.status_tx.clone(),
            cancel: cancel.clone(),
            cmd_rx,
            play_when_ready: inner.pending.play_when_ready,
            start_at,
        });
        inner.phase = Phase::Running(Running {
            cmd_tx,
            cancel,
            windows,
        });
        preparing.done = true;
        info!(windows, "session prepared");
        Ok(())
    }

    async fn build_timeline(&self, source: &MediaSource) -> PlayResult<SegmentTimeline> {
        let mut manifests = Vec::with_capacity(source.uris().len());
        for uri in source.uris() {
            let manifest = self
                .ctx
                .manifests
                .load(uri)
                .await
                .inspect_err(|err| warn!(%uri, %err, "manifest rejected"))?;
            manifests.push((uri.clone(), manifest));
        }
        SegmentTimeline::new(manifests).map_err(|err| {
            warn!(%err, "media source rejected");
            err.into()
        })
    }

    pub fn play(&self) -> PlayResult<()> {
        self.set_play_when_ready(true)
    }

    pub fn pause(&self) -> PlayResult<()> {
        self.set_play_when_ready(false)
    }

    pub fn set_play_when_ready(&self, play_when_ready: bool) -> PlayResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &inner.phase {
            Phase::Released => return Err(PlayError::Released),
            Phase::Running(running) => {
                running.send(Command::SetPlayWhenReady(play_when_ready));
            }
            Phase::Idle | Phase::Preparing => {
                inner.pending.play_when_ready = play_when_ready;
                self.status_tx
                    .send_modify(|s| s.play_when_ready = play_when_ready);
            }
        }
        Ok(())
    }

    /// Move playback to a global `position`. Positions at or past the end end
    /// playback.
    pub fn seek(&self, position: Duration) -> PlayResult<()> {
        self.seek_to(SeekTarget::Global(position))
    }

    /// Move playback to `position` inside `window`.
    pub fn seek_to_window(&self, window: usize, position: Duration) -> PlayResult<()> {
        self.seek_to(SeekTarget::Window { window, position })
    }

    fn seek_to(&self, target: SeekTarget) -> PlayResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match &inner.phase {
            Phase::Released => return Err(PlayError::Released),
            Phase::Running(running) => {
                if let SeekTarget::Window { window, .. } = target {
                    if window >= running.windows {
                        return Err(PlayError::WindowOutOfRange {
                            window,
                            windows: running.windows,
                        });
                    }
                }
                running.send(Command::Seek(target));
            }
            Phase::Idle | Phase::Preparing => inner.pending.start_at = Some(target),
        }
        Ok(())
    }

    /// Replace the representation set of `window`, e.g. after one was
    /// withdrawn. The segment layout must stay the same.
    pub async fn update_manifest(&self, window: usize, manifest: Manifest) -> PlayResult<()> {
        let reply = {
            let inner = self.inner.lock();
            let running = match &inner.phase {
                Phase::Running(running) => running,
                Phase::Released => return Err(PlayError::Released),
                Phase::Idle | Phase::Preparing => return Err(PlayError::NotPrepared),
            };
            if window >= running.windows {
                return Err(PlayError::WindowOutOfRange {
                    window,
                    windows: running.windows,
                });
            }
            let (reply_tx, reply_rx) = oneshot::channel();
            running
                .cmd_tx
                .send(Command::UpdateManifest {
                    window,
                    manifest,
                    reply: reply_tx,
                })
                .map_err(|_| PlayError::Released)?;
            reply_rx
        };
        reply.await.map_err(|_| PlayError::Released)?
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status_tx.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.status_tx.borrow().state
    }

    /// Receiver that observes every status change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Ordered stream of all future session and load events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    #[must_use]
    pub fn meter(&self) -> &BandwidthMeter {
        &self.ctx.meter
    }

    /// Stop the session and return what is needed to resume it later.
    ///
    /// Cancels the worker and any fetch in progress. Only the first call has
    /// an effect; later calls return `None`. `Released` is the last event of
    /// the session: a running worker publishes it once it has stopped.
    pub fn release(&self) -> Option<PlaybackSnapshot> {
        let mut inner = self.inner.lock();
        let (snapshot, worker) = match mem::replace(&mut inner.phase, Phase::Released) {
            Phase::Released => return None,
            Phase::Running(running) => {
                running.cancel.cancel();
                (self.status_tx.borrow().snapshot(), true)
            }
            Phase::Idle | Phase::Preparing => (inner.pending.snapshot(), false),
        };
        drop(inner);

        self.status_tx
            .send_modify(|s| s.state = PlaybackState::Idle);
        if !worker {
            self.bus.publish(SessionEvent::Released);
        }
        info!(
            window = snapshot.window,
            position_ms = snapshot.position.as_millis(),
            play_when_ready = snapshot.play_when_ready,
            "session released"
        );
        Some(snapshot)
    }
}

struct PreparingGuard<'a> {
    inner: &'a Mutex<Inner>,
    done: bool,
}

impl Drop for PreparingGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut inner = self.inner.lock();
        if matches!(inner.phase, Phase::Preparing) {
            inner.phase = Phase::Idle;
            debug!("prepare abandoned, session idle");
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
