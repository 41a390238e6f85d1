//! Integration tests for the session engine.
//!
//! These tests drive `SessionRegistry` end-to-end over `MockPlatform`:
//! the real capture, audio and input use cases run on their own threads
//! against in-memory devices.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rcs_core::{
    AudioChunk, AudioConfig, AudioSettingsUpdate, AudioTarget, ChannelConfig, ChannelKind,
    EngineError, EngineEvent, VideoSettingsUpdate,
};
use rcs_host::application::input_injector::RawInput;
use rcs_host::application::session_registry::{EngineSettings, SessionRegistry};
use rcs_host::infrastructure::platform::mock::{ClipboardOp, MockClipboard, MockPlatform};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

// ── Helpers ───────────────────────────────────────────────────────────────────

fn engine(platform: &Arc<MockPlatform>) -> SessionRegistry {
    SessionRegistry::new(platform.services(), EngineSettings::default())
        .expect("default settings must be valid")
}

/// Polls `condition` until it holds or [`WAIT`] elapses.
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn next_event(events: &mut mpsc::Receiver<EngineEvent>) -> Option<EngineEvent> {
    let mut event = None;
    wait_until(|| {
        event = events.try_recv().ok();
        event.is_some()
    });
    event
}

fn next_chunk(audio: &mut mpsc::Receiver<AudioChunk>) -> Option<AudioChunk> {
    let mut chunk = None;
    wait_until(|| {
        chunk = audio.try_recv().ok();
        chunk.is_some()
    });
    chunk
}

fn channel_active(registry: &SessionRegistry, kind: ChannelKind) -> bool {
    registry
        .channels()
        .into_iter()
        .find(|c| c.kind == kind)
        .is_some_and(|c| c.is_active())
}

// ── Registry ──────────────────────────────────────────────────────────────────

#[test]
fn test_new_registry_reports_four_idle_channels_with_stable_ids() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    // Act
    let first = registry.channels();
    let second = registry.channels();

    // Assert
    assert_eq!(first.len(), 4);
    assert!(first.iter().all(|c| !c.is_active()));
    assert!(first.iter().all(|c| c.owning_session.is_none()));
    let ids: Vec<_> = first.iter().map(|c| c.id).collect();
    let again: Vec<_> = second.iter().map(|c| c.id).collect();
    assert_eq!(ids, again, "channel ids must not change between snapshots");
}

#[test]
fn test_invalid_audio_settings_are_rejected_at_construction() {
    let platform = Arc::new(MockPlatform::new());
    let mut settings = EngineSettings::default();
    settings.audio.server.sample_rate = 1;

    let result = SessionRegistry::new(platform.services(), settings);

    assert!(matches!(result, Err(EngineError::PreconditionViolation(_))));
}

#[test]
fn test_audio_and_event_receivers_are_handed_out_once() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    let first = registry.outputs();
    let second = registry.outputs();

    assert!(first.audio.is_some() && first.events.is_some());
    assert!(second.audio.is_none() && second.events.is_none());
}

// ── Video ─────────────────────────────────────────────────────────────────────

#[test]
fn test_video_start_publishes_jpeg_frames_for_owning_session() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let outputs = registry.outputs();

    // Act
    registry.video_start("operator-1").expect("start must succeed");

    // Assert
    assert!(
        wait_until(|| outputs
            .frames
            .borrow()
            .as_ref()
            .is_some_and(|f| f.sequence >= 2)),
        "frames must keep arriving"
    );
    let frame = outputs.frames.borrow().clone().expect("frame present");
    assert_eq!(frame.session_id, "operator-1");
    assert_eq!(frame.active_window_title, "Mock Window");
    assert_eq!(&frame.image[..2], &[0xFF, 0xD8], "JPEG SOI marker");
    assert!(channel_active(&registry, ChannelKind::Video));
    assert!(wait_until(|| outputs.cursor.borrow().is_some()));

    registry.video_stop();
    assert!(!channel_active(&registry, ChannelKind::Video));
    assert_eq!(platform.devices.open_captures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_frame_watch_wakes_async_receiver() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let mut frames = registry.outputs().frames;

    registry.video_start("op").unwrap();
    tokio::time::timeout(WAIT, frames.changed())
        .await
        .expect("a frame must arrive in time")
        .expect("frame sender must be alive");

    assert!(frames.borrow_and_update().is_some());
    registry.video_stop();
}

#[test]
fn test_first_frame_reports_bounded_fps_and_carries_image() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let outputs = registry.outputs();

    // Act
    registry.video_start("op").unwrap();

    // Assert
    assert!(wait_until(|| outputs.frames.borrow().is_some()));
    let first = outputs.frames.borrow().clone().unwrap();
    registry.video_stop();
    assert!((1..=60).contains(&first.fps), "fps was {}", first.fps);
    assert!(!first.image.is_empty());
}

#[test]
fn test_slow_consumer_sees_only_the_newest_frame() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let frames = registry.outputs().frames;
    registry.video_start("op").unwrap();
    assert!(wait_until(|| frames.borrow().is_some()));
    let before = frames.borrow().as_ref().map(|f| f.sequence).unwrap();

    // Act
    thread::sleep(Duration::from_millis(200));
    let after = frames.borrow().as_ref().map(|f| f.sequence).unwrap();

    // Assert
    registry.video_stop();
    assert!(
        after > before + 1,
        "frames {before} -> {after}: intermediate frames must be overwritten"
    );
}

#[test]
fn test_stop_on_idle_channels_is_a_no_op() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    // Act
    registry.video_stop();
    let audio = registry.audio_stop("audio-mic");

    // Assert
    assert!(audio.is_ok());
    assert!(registry.channels().iter().all(|c| !c.is_active()));
    assert!(platform.capture_opens.lock().unwrap().is_empty());
    assert!(platform.input_opens.lock().unwrap().is_empty());
}

#[test]
fn test_video_start_for_same_session_is_a_no_op() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    registry.video_start("op").unwrap();
    registry.video_start("op").unwrap();

    assert_eq!(platform.capture_opens.lock().unwrap().len(), 1);
}

#[test]
fn test_second_session_takes_video_over_without_double_open() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    registry.video_start("first").unwrap();

    // Act
    registry.video_start("second").unwrap();

    // Assert
    let video = registry
        .channels()
        .into_iter()
        .find(|c| c.kind == ChannelKind::Video)
        .unwrap();
    assert_eq!(video.owning_session.as_deref(), Some("second"));
    assert_eq!(platform.capture_opens.lock().unwrap().len(), 2);
    assert_eq!(platform.devices.peak_captures.load(Ordering::SeqCst), 1);
}

#[test]
fn test_capture_open_failure_leaves_video_idle() {
    let platform = Arc::new(MockPlatform {
        fail_capture_open: true,
        ..MockPlatform::default()
    });
    let registry = engine(&platform);

    let result = registry.video_start("op");

    assert!(matches!(result, Err(EngineError::DeviceUnavailable(_))));
    assert!(!channel_active(&registry, ChannelKind::Video));
}

#[test]
fn test_screenshot_stops_stream_and_returns_png() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let mut events = registry.outputs().events.unwrap();
    registry.video_start("op").unwrap();

    // Act
    let png = registry.screenshot().expect("screenshot must succeed");

    // Assert
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    assert!(!channel_active(&registry, ChannelKind::Video));
    assert_eq!(platform.devices.peak_captures.load(Ordering::SeqCst), 1);
    assert!(matches!(
        next_event(&mut events),
        Some(EngineEvent::ChannelStopped {
            kind: ChannelKind::Video,
            ..
        })
    ));
    let snapshot = registry.video_settings();
    assert_eq!(snapshot.native_width, Some(64));
    assert_eq!(snapshot.native_height, Some(48));
}

#[test]
fn test_fps_change_reopens_running_capture_device() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    registry.video_start("op").unwrap();

    let config = registry.video_update_settings(&VideoSettingsUpdate {
        target_fps: Some(10),
        ..VideoSettingsUpdate::default()
    });

    assert_eq!(config.target_fps, 10);
    assert!(wait_until(|| platform.capture_opens.lock().unwrap().len() == 2));
    assert_eq!(*platform.capture_opens.lock().unwrap(), vec![60, 10]);
    assert_eq!(platform.devices.peak_captures.load(Ordering::SeqCst), 1);
}

#[test]
fn test_first_frame_after_fps_reopen_is_discarded() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let frames = registry.outputs().frames;
    registry.video_start("op").unwrap();
    assert!(wait_until(|| frames.borrow().as_ref().is_some_and(|f| f.sequence >= 3)));

    // Act
    registry.video_update_settings(&VideoSettingsUpdate {
        target_fps: Some(30),
        ..VideoSettingsUpdate::default()
    });
    assert!(wait_until(|| platform.capture_opens.lock().unwrap().len() == 2));
    let at_reopen = frames.borrow().as_ref().map(|f| f.sequence).unwrap();
    assert!(wait_until(|| frames
        .borrow()
        .as_ref()
        .is_some_and(|f| f.sequence >= at_reopen + 3)));
    registry.video_stop();

    // Assert
    let published = frames.borrow().as_ref().map(|f| f.sequence).unwrap();
    let served = platform.devices.frames_served.load(Ordering::SeqCst) as u64;
    assert_eq!(published, served - 1, "exactly one grabbed frame is dropped");
}

#[test]
fn test_quality_update_clamps_and_does_not_reopen() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    registry.video_start("op").unwrap();

    let config = registry.video_update_settings(&VideoSettingsUpdate {
        quality: Some(500),
        resolution_percent: Some(-3),
        ..VideoSettingsUpdate::default()
    });
    thread::sleep(Duration::from_millis(50));

    assert_eq!(config.quality, 100);
    assert_eq!(config.resolution_percent, 1);
    assert_eq!(platform.capture_opens.lock().unwrap().len(), 1);
}

#[test]
fn test_failing_frame_grab_stops_video_and_emits_event() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let mut events = registry.outputs().events.unwrap();
    registry.video_start("op").unwrap();

    // Act
    platform.devices.fail_reads.store(true, Ordering::SeqCst);

    // Assert
    match next_event(&mut events) {
        Some(EngineEvent::ChannelStopped { kind, reason }) => {
            assert_eq!(kind, ChannelKind::Video);
            assert!(reason.contains("frame grab failed"), "reason: {reason}");
        }
        other => panic!("expected ChannelStopped, got {other:?}"),
    }
    assert!(wait_until(|| !registry.video_settings().active));
}

// ── Audio ─────────────────────────────────────────────────────────────────────

#[test]
fn test_mic_capture_delivers_server_sized_chunks() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let mut audio = registry.outputs().audio.unwrap();

    registry.audio_start("audio-mic").unwrap();

    let chunk = next_chunk(&mut audio).expect("a chunk must arrive");
    assert_eq!(chunk.channel, ChannelKind::AudioMic);
    assert_eq!(chunk.data.len(), AudioConfig::server_default().chunk_bytes());
    assert_eq!(platform.input_opens.lock().unwrap()[0].0, None);
}

#[test]
fn test_system_audio_skips_broken_loopback_candidates() {
    // Arrange
    let platform = Arc::new(MockPlatform {
        input_devices: vec![
            "Microphone (Mock)".to_string(),
            "Stereo Mix (Broken)".to_string(),
            "Monitor of Built-in Audio".to_string(),
        ],
        broken_devices: vec!["Stereo Mix (Broken)".to_string()],
        ..MockPlatform::default()
    });
    let registry = engine(&platform);
    let mut audio = registry.outputs().audio.unwrap();

    // Act
    registry.audio_start("server_system").unwrap();

    // Assert
    let opens = platform.input_opens.lock().unwrap().clone();
    assert!(!opens.is_empty());
    assert!(opens
        .iter()
        .all(|(device, _)| device.as_deref() == Some("Monitor of Built-in Audio")));
    let chunk = next_chunk(&mut audio).expect("a chunk must arrive");
    assert_eq!(chunk.channel, ChannelKind::AudioSystem);
}

#[test]
fn test_system_audio_without_loopback_device_fails() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    let result = registry.audio_start("audio-system");

    assert!(matches!(result, Err(EngineError::DeviceUnavailable(_))));
    assert!(!channel_active(&registry, ChannelKind::AudioSystem));
}

#[test]
fn test_playback_writes_pushed_audio_at_client_rate() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    registry.audio_start("audio-playback").unwrap();

    // Act
    let accepted = registry
        .audio_push_inbound("audio-playback", vec![1, 2, 3, 4])
        .unwrap();

    // Assert
    assert!(accepted);
    assert!(wait_until(|| platform
        .played
        .lock()
        .unwrap()
        .contains(&vec![1, 2, 3, 4])));
    assert_eq!(
        platform.output_opens.lock().unwrap()[0],
        AudioConfig::client_default()
    );
}

#[test]
fn test_push_while_playback_idle_is_dropped() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    let accepted = registry.audio_push_inbound("client_playback", vec![0; 8]);

    assert!(!accepted.unwrap());
    assert!(platform.played.lock().unwrap().is_empty());
}

#[test]
fn test_push_into_capture_channel_is_rejected() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    let result = registry.audio_push_inbound("audio-mic", vec![0; 8]);

    assert!(matches!(result, Err(EngineError::PreconditionViolation(_))));
}

#[test]
fn test_audio_settings_update_applies_to_next_start() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    // Act
    let updated = registry
        .audio_update_settings(
            AudioTarget::Client,
            &AudioSettingsUpdate {
                sample_rate: Some(16_000),
                chunk_size: None,
            },
        )
        .unwrap();
    let rejected = registry.audio_update_settings(
        AudioTarget::Client,
        &AudioSettingsUpdate {
            sample_rate: Some(44_100),
            chunk_size: Some(1),
        },
    );
    registry.audio_start("audio-playback").unwrap();

    // Assert
    assert_eq!(updated.sample_rate, 16_000);
    assert!(matches!(rejected, Err(EngineError::PreconditionViolation(_))));
    let opened = platform.output_opens.lock().unwrap()[0];
    assert_eq!(opened.sample_rate, 16_000);
    assert_eq!(opened.chunk_size, 512);
    let playback = registry
        .channels()
        .into_iter()
        .find(|c| c.kind == ChannelKind::AudioPlayback)
        .unwrap();
    assert_eq!(playback.config, ChannelConfig::Audio(opened));
}

#[test]
fn test_failing_audio_read_stops_channel_and_emits_event() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    let mut events = registry.outputs().events.unwrap();
    registry.audio_start("audio-mic").unwrap();

    platform.devices.fail_reads.store(true, Ordering::SeqCst);

    assert!(matches!(
        next_event(&mut events),
        Some(EngineEvent::ChannelStopped {
            kind: ChannelKind::AudioMic,
            ..
        })
    ));
    assert!(wait_until(|| !channel_active(&registry, ChannelKind::AudioMic)));
}

#[test]
fn test_disconnect_releases_every_device() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);
    registry.video_start("op").unwrap();
    registry.audio_start("audio-mic").unwrap();
    registry.audio_start("audio-playback").unwrap();

    // Act
    registry.disconnect();

    // Assert
    assert_eq!(platform.devices.open_captures.load(Ordering::SeqCst), 0);
    assert_eq!(platform.devices.open_audio.load(Ordering::SeqCst), 0);
    assert!(registry.channels().iter().all(|c| !c.is_active()));
}

// ── Input ─────────────────────────────────────────────────────────────────────

#[test]
fn test_pointer_move_updates_reported_cursor() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    registry.input_move(300, 200).unwrap();

    assert_eq!(registry.cursor_position().unwrap(), (300, 200));
}

#[test]
fn test_shortcut_releases_keys_in_reverse_order() {
    // Arrange
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    // Act
    registry.input_shortcut(&["ctrl", "shift"], "s").unwrap();

    // Assert
    let keys: Vec<_> = platform
        .injected()
        .into_iter()
        .filter_map(|e| match e {
            RawInput::Key { code, down } => Some((code, down)),
            _ => None,
        })
        .collect();
    assert_eq!(keys.len(), 6);
    let (downs, ups) = keys.split_at(3);
    assert!(downs.iter().all(|(_, down)| *down));
    assert!(ups.iter().all(|(_, down)| !*down));
    let pressed: Vec<_> = downs.iter().map(|(code, _)| *code).collect();
    let mut released: Vec<_> = ups.iter().map(|(code, _)| *code).collect();
    released.reverse();
    assert_eq!(pressed, released);
}

#[test]
fn test_injection_failure_surfaces_as_transient_io() {
    let platform = Arc::new(MockPlatform {
        fail_input: true,
        ..MockPlatform::default()
    });
    let registry = engine(&platform);

    let result = registry.input_move(1, 1);

    assert!(matches!(result, Err(EngineError::TransientIo(_))));
}

#[test]
fn test_paste_restores_previous_clipboard_text() {
    // Arrange
    let platform = Arc::new(MockPlatform {
        clipboard: Arc::new(MockClipboard::with_text("keep me")),
        ..MockPlatform::default()
    });
    let registry = engine(&platform);

    // Act
    registry.input_paste("hello world").unwrap();

    // Assert
    assert_eq!(
        platform.clipboard.text.lock().unwrap().as_deref(),
        Some("keep me")
    );
    assert_eq!(
        *platform.clipboard.ops.lock().unwrap(),
        vec![
            ClipboardOp::Get,
            ClipboardOp::Set("hello world".to_string()),
            ClipboardOp::Set("keep me".to_string()),
        ]
    );
    assert!(!platform.injected().is_empty(), "ctrl+v must be injected");
}

#[test]
fn test_paste_with_unreadable_clipboard_touches_nothing() {
    // Arrange
    let platform = Arc::new(MockPlatform {
        clipboard: Arc::new(MockClipboard {
            should_fail: true,
            ..MockClipboard::with_text("user data")
        }),
        ..MockPlatform::default()
    });
    let registry = engine(&platform);

    // Act
    let result = registry.input_paste("payload");

    // Assert
    assert!(matches!(result, Err(EngineError::TransientIo(_))));
    assert_eq!(*platform.clipboard.ops.lock().unwrap(), vec![ClipboardOp::Get]);
    assert_eq!(
        platform.clipboard.text.lock().unwrap().as_deref(),
        Some("user data")
    );
    assert!(platform.injected().is_empty());
}

#[test]
fn test_enter_text_pastes_multi_character_text() {
    let platform = Arc::new(MockPlatform::new());
    let registry = engine(&platform);

    registry.input_enter("abc").unwrap();

    let ops = platform.clipboard.ops.lock().unwrap().clone();
    assert!(ops.contains(&ClipboardOp::Set("abc".to_string())));
    assert_eq!(ops.last(), Some(&ClipboardOp::Clear));
}
