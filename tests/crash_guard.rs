//! The crash guard is process-wide, so these checks live in their own test binary
//! and run sequentially inside a single test.

use std::sync::{Arc, Mutex};

use app_factory::guard::{clear_crash_guard, is_installed};
use app_factory::{create_app, AppOptions, CrashPolicy, Environment};

#[tokio::test]
async fn crash_guard_lifecycle() {
    let factory = create_app(|app, _config, _environment| async move { anyhow::Ok(app) });

    // Test environment: nothing is installed and a panic does not end the process.
    factory
        .build(AppOptions::default(), Environment::Test)
        .await
        .unwrap();
    assert!(!is_installed());
    assert!(std::panic::catch_unwind(|| panic!("simulated failure")).is_err());

    // Any other environment installs the guard; a custom policy observes panics.
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let recorder = seen.clone();
    let factory = factory.with_crash_policy(CrashPolicy::custom(move |message| {
        recorder.lock().unwrap().push(message.to_string());
    }));
    factory
        .build(AppOptions::default(), Environment::Production)
        .await
        .unwrap();
    assert!(is_installed());

    assert!(std::panic::catch_unwind(|| panic!("task exploded")).is_err());
    let messages = seen.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("task exploded"));

    // A panicking spawned task reaches the guard too.
    let handle = tokio::spawn(async { panic!("spawned failure") });
    assert!(handle.await.is_err());
    assert!(seen.lock().unwrap().iter().any(|m| m.starts_with("spawned failure")));

    clear_crash_guard();
    assert!(!is_installed());
}
