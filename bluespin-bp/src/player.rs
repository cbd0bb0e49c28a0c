//! Player process lifecycle
//!
//! One [`PlaybackSession::run`] call is one invocation of the external
//! player (mpv by default): build the argument list, start the link
//! watchdog, spawn the player with captured output, scan its stderr for
//! signs that the audio device went away, and fold the exit status into a
//! [`PlaybackOutcome`]. The session never returns an error; every failure
//! mode becomes an outcome the supervisor can act on.
//!
//! **[BSP-PLY-010]** Session lifecycle and watchdog ordering
//! **[BSP-PLY-020]** Diagnostic-stream device-loss detection
//! **[BSP-PLY-030]** Player invocation flags

use crate::link::LinkMonitor;
use crate::selector::Track;
use bluespin_common::config::PlaybackConfig;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, trace, warn};

/// Stderr fragments that mean the audio device dropped out from under the
/// player. The first is ALSA's complaint when the bluealsa PCM vanishes;
/// the second is mpv's own audio-output failure line.
const DEVICE_LOST_MARKERS: &[&str] = &["PCM not found", "Could not open/initialize audio device"];

/// How one playback attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Player exited cleanly; the track played to completion
    Success,
    /// Attempt failed but another attempt is worthwhile
    FailureRecoverable(Option<String>),
    /// Attempt failed in a way retrying cannot fix
    ///
    /// Present for supervisors that want to escalate; nothing in the
    /// session itself produces it today.
    FailureFatal(Option<String>),
}

/// Player argument list for one track
///
/// **[BSP-PLY-030]** Audio-only output to the configured device, full
/// caching and gapless settings so brief network stalls stay inaudible,
/// quiet terminal behavior with warnings kept on stderr for the
/// device-loss scan.
pub fn build_player_args(playback: &PlaybackConfig, stream_url: &str) -> Vec<String> {
    vec![
        stream_url.to_string(),
        "--no-video".to_string(),
        format!("--audio-device={}", playback.audio_device),
        format!("--volume={}", playback.volume),
        "--cache=yes".to_string(),
        format!("--cache-secs={}", playback.cache_secs),
        "--gapless-audio=yes".to_string(),
        format!("--demuxer-readahead-secs={}", playback.readahead_secs),
        format!("--audio-buffer={}", playback.audio_buffer_secs),
        "--audio-stream-silence=yes".to_string(),
        "--msg-level=all=warn".to_string(),
        "--no-terminal".to_string(),
    ]
}

/// The ALSA listing entry to expect for a given player audio device,
/// e.g. `alsa/bluealsa` -> `bluealsa`
fn sink_needle(audio_device: &str) -> &str {
    audio_device.rsplit('/').next().unwrap_or(audio_device)
}

/// Runs single playback attempts against one player configuration
pub struct PlaybackSession {
    playback: PlaybackConfig,
    link: LinkMonitor,
}

impl PlaybackSession {
    pub fn new(playback: PlaybackConfig, link: LinkMonitor) -> Self {
        Self { playback, link }
    }

    /// Play one track to completion or failure
    ///
    /// **[BSP-PLY-010]** The link watchdog is started strictly before the
    /// player and stopped (cancelled and joined) strictly before the
    /// outcome is returned, so no watchdog outlives its session.
    pub async fn run(&self, track: &Track) -> PlaybackOutcome {
        let needle = sink_needle(&self.playback.audio_device);
        if !self.link.sink_available(needle).await {
            warn!(
                sink = %needle,
                "Audio sink not present in device listing; playing anyway"
            );
        }

        let watchdog = self.link.spawn_watch();
        let outcome = self.drive_player(track).await;
        watchdog.stop().await;

        outcome
    }

    async fn drive_player(&self, track: &Track) -> PlaybackOutcome {
        let args = build_player_args(&self.playback, &track.stream_url);

        info!(
            title = %track.title,
            player = %self.playback.player_bin,
            "Starting playback"
        );

        let mut child = match Command::new(&self.playback.player_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!(
                    player = %self.playback.player_bin,
                    error = %e,
                    "Failed to launch player"
                );
                return PlaybackOutcome::FailureRecoverable(Some(format!(
                    "player launch failed: {e}"
                )));
            }
        };

        // Drain stdout concurrently so a chatty player cannot fill the pipe
        // while we sit on stderr
        let stdout_task = child.stdout.take().map(|stdout| {
            tokio::spawn(async move {
                let mut segments = BufReader::new(stdout).split(b'\n');
                while let Ok(Some(segment)) = segments.next_segment().await {
                    trace!("player stdout: {}", String::from_utf8_lossy(&segment));
                }
            })
        });

        let read_failure = match child.stderr.take() {
            Some(stderr) => self.scan_diagnostics(stderr).await,
            None => None,
        };

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Failed waiting for player exit");
                return PlaybackOutcome::FailureRecoverable(Some(format!(
                    "player wait failed: {e}"
                )));
            }
        };

        if let Some(task) = stdout_task {
            if let Err(e) = task.await {
                debug!(error = %e, "Player stdout reader task failed");
            }
        }

        if !status.success() {
            warn!(title = %track.title, status = %status, "Player exited abnormally");
            return PlaybackOutcome::FailureRecoverable(Some(format!(
                "player exited with {status}"
            )));
        }

        // A clean exit after the diagnostic stream died is not a clean run:
        // the device-loss scan was blind for part of it
        if let Some(cause) = read_failure {
            warn!(title = %track.title, cause = %cause, "Player exited cleanly after diagnostic loss");
            return PlaybackOutcome::FailureRecoverable(Some(cause));
        }

        info!(title = %track.title, "Playback finished");
        PlaybackOutcome::Success
    }

    /// Scan the player's diagnostic stream to EOF
    ///
    /// **[BSP-PLY-020]** A device-loss line triggers an out-of-band link
    /// repair while the player keeps running; with luck the stream resumes
    /// into the re-established route. Diagnostics are read as raw byte
    /// lines and decoded lossily, since ALSA and player output carry no
    /// UTF-8 guarantee. Returns the cause if the stream itself fails
    /// before EOF.
    async fn scan_diagnostics<R>(&self, stream: R) -> Option<String>
    where
        R: AsyncRead + Unpin,
    {
        let mut segments = BufReader::new(stream).split(b'\n');
        loop {
            match segments.next_segment().await {
                Ok(Some(segment)) => {
                    let text = String::from_utf8_lossy(&segment);
                    let line = text.trim_end();
                    warn!(line = %line, "Player diagnostic");
                    if DEVICE_LOST_MARKERS.iter().any(|m| line.contains(m)) {
                        warn!("Audio device lost during playback; repairing link");
                        self.link.reconnect().await;
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    error!(error = %e, "Player stderr read failed");
                    return Some(format!("stderr read failed: {e}"));
                }
            }
        }
    }
}
