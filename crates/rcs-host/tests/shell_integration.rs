//! Integration tests for pseudo-terminal shell sessions.
//!
//! These spawn a real `/bin/sh` through the session registry, so they only
//! run on Unix hosts.

#![cfg(unix)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rcs_core::{EngineError, EngineEvent};
use rcs_host::application::session_registry::{EngineSettings, SessionRegistry};
use rcs_host::application::shell_sessions::ShellSettings;
use rcs_host::infrastructure::platform::mock::MockPlatform;

const WAIT: Duration = Duration::from_secs(10);

fn engine() -> SessionRegistry {
    let settings = EngineSettings {
        shell: ShellSettings {
            program: Some("/bin/sh".to_string()),
            ..ShellSettings::default()
        },
        ..EngineSettings::default()
    };
    SessionRegistry::new(Arc::new(MockPlatform::new()).services(), settings)
        .expect("default settings must be valid")
}

/// Polls the shell until its accumulated output contains `needle`.
fn read_until(registry: &SessionRegistry, id: &str, needle: &str) -> String {
    let deadline = Instant::now() + WAIT;
    let mut seen = String::new();
    while Instant::now() < deadline {
        if let Some(bytes) = registry.shell_poll(id).expect("session must exist") {
            seen.push_str(&String::from_utf8_lossy(&bytes));
            if seen.contains(needle) {
                break;
            }
        }
        thread::sleep(Duration::from_millis(20));
    }
    seen
}

#[test]
fn test_shell_echoes_command_output() {
    // Arrange
    let registry = engine();
    let id = registry.shell_create(80, 24).expect("shell must spawn");

    // Act
    registry.shell_write(&id, b"echo rcs-$((40 + 2))\n").unwrap();

    // Assert
    let output = read_until(&registry, &id, "rcs-42");
    assert!(output.contains("rcs-42"), "output was: {output:?}");

    registry.shell_cleanup(&id);
    assert!(registry.shell_ids().is_empty());
}

#[test]
fn test_resize_is_accepted_for_live_session() {
    let registry = engine();
    let id = registry.shell_create(80, 24).unwrap();

    registry.shell_resize(&id, 132, 40).unwrap();
    registry.shell_write(&id, b"stty size\n").unwrap();

    let output = read_until(&registry, &id, "40 132");
    assert!(output.contains("40 132"), "output was: {output:?}");
}

#[test]
fn test_exit_removes_session_and_emits_shell_closed() {
    // Arrange
    let registry = engine();
    let mut events = registry.outputs().events.unwrap();
    let id = registry.shell_create(80, 24).unwrap();

    // Act
    registry.shell_write(&id, b"exit\n").unwrap();

    // Assert
    let deadline = Instant::now() + WAIT;
    let mut closed = None;
    while closed.is_none() && Instant::now() < deadline {
        closed = events.try_recv().ok();
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(
        closed,
        Some(EngineEvent::ShellClosed {
            session_id: id.clone()
        })
    );
    assert!(matches!(
        registry.shell_poll(&id),
        Err(EngineError::InvalidSession(_))
    ));
}

#[test]
fn test_explicit_cleanup_does_not_emit_shell_closed() {
    let registry = engine();
    let mut events = registry.outputs().events.unwrap();
    let id = registry.shell_create(80, 24).unwrap();

    registry.shell_cleanup(&id);
    thread::sleep(Duration::from_millis(200));

    assert!(events.try_recv().is_err());
    assert!(matches!(
        registry.shell_write(&id, b"ls\n"),
        Err(EngineError::InvalidSession(_))
    ));
}

#[test]
fn test_sessions_are_independent() {
    let registry = engine();
    let a = registry.shell_create(80, 24).unwrap();
    let b = registry.shell_create(100, 30).unwrap();

    registry.shell_write(&a, b"echo only-in-a\n").unwrap();
    let output_a = read_until(&registry, &a, "only-in-a");
    thread::sleep(Duration::from_millis(100));
    let output_b = registry
        .shell_poll(&b)
        .unwrap()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();

    assert!(output_a.contains("only-in-a"));
    assert!(!output_b.contains("only-in-a"));
    let mut ids = vec![a, b];
    ids.sort();
    assert_eq!(registry.shell_ids(), ids);

    registry.disconnect();
    assert!(registry.shell_ids().is_empty());
}
