//! Playback supervision loop
//!
//! The forever loop of the appliance: make sure the link is up, draw a
//! track, play it, decide what the outcome means, repeat. Nothing that
//! happens inside one iteration is allowed to stop the loop; the only exit
//! is the process-wide shutdown token.
//!
//! **[BSP-SUP-010]** Supervision state machine
//! **[BSP-SUP-020]** Retry policy after recoverable failures

use crate::link::LinkMonitor;
use crate::player::{PlaybackOutcome, PlaybackSession};
use crate::selector::{Track, TrackSelector};
use bluespin_common::Config;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Supervision timing and retry policy, extracted from [`Config`]
#[derive(Debug, Clone)]
pub struct SupervisorPolicy {
    /// Pause after a recoverable playback failure
    pub retry_pause: Duration,
    /// Pause after an unexpected error before re-checking the link
    pub error_cooldown: Duration,
    /// Replay the identical track after a recoverable failure instead of
    /// drawing a fresh one
    pub retry_same_track: bool,
}

impl SupervisorPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_pause: Duration::from_secs(config.supervisor.retry_pause_secs),
            error_cooldown: Duration::from_secs(config.supervisor.error_cooldown_secs),
            retry_same_track: config.supervisor.retry_same_track,
        }
    }
}

/// What the loop does next
enum Step {
    /// Check the link, repairing it if down
    EnsureLink,
    /// Draw the next track
    Select,
    /// Play this track
    Play(Track),
}

/// Ties link monitoring, selection, and playback into the forever loop
pub struct Supervisor {
    policy: SupervisorPolicy,
    selector: TrackSelector,
    link: LinkMonitor,
    session: PlaybackSession,
}

impl Supervisor {
    pub fn new(
        policy: SupervisorPolicy,
        selector: TrackSelector,
        link: LinkMonitor,
        session: PlaybackSession,
    ) -> Self {
        Self {
            policy,
            selector,
            link,
            session,
        }
    }

    /// Run until `shutdown` fires
    ///
    /// **[BSP-SUP-010]** Success moves straight to the next draw; a
    /// recoverable failure pauses briefly and then retries per policy; an
    /// unexpected error (selection included) cools down and re-checks the
    /// link before trying again. A playback attempt in progress is never
    /// interrupted; shutdown is honored between steps and during pauses.
    pub async fn run(&self, shutdown: &CancellationToken) {
        info!("Supervisor started");

        let mut step = Step::EnsureLink;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            step = match step {
                Step::EnsureLink => {
                    if !self.link.is_connected().await {
                        info!("Audio link down; repairing before playback");
                        self.link.reconnect().await;
                    }
                    Step::Select
                }

                Step::Select => match self.selector.pick_random().await {
                    Ok(track) => Step::Play(track),
                    Err(e) => {
                        error!(error = %e, "Track selection failed");
                        if !self.pause(self.policy.error_cooldown, shutdown).await {
                            break;
                        }
                        Step::EnsureLink
                    }
                },

                Step::Play(track) => match self.session.run(&track).await {
                    PlaybackOutcome::Success => Step::Select,

                    PlaybackOutcome::FailureRecoverable(cause) => {
                        warn!(
                            track = %track.title,
                            cause = %cause.as_deref().unwrap_or("unknown"),
                            "Playback failed; will retry"
                        );
                        if !self.pause(self.policy.retry_pause, shutdown).await {
                            break;
                        }
                        // **[BSP-SUP-020]** Same track or a fresh draw,
                        // per configuration
                        if self.policy.retry_same_track {
                            Step::Play(track)
                        } else {
                            Step::Select
                        }
                    }

                    PlaybackOutcome::FailureFatal(cause) => {
                        error!(
                            track = %track.title,
                            cause = %cause.as_deref().unwrap_or("unknown"),
                            "Playback failed fatally"
                        );
                        if !self.pause(self.policy.error_cooldown, shutdown).await {
                            break;
                        }
                        Step::EnsureLink
                    }
                },
            };
        }

        info!("Supervisor stopped");
    }

    /// Sleep for `duration` unless shutdown fires first; returns false on
    /// shutdown
    async fn pause(&self, duration: Duration, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
