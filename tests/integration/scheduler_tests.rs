use super::*;
use antique_watchdog::scheduler::{Period, Poll};
use antique_watchdog::Scheduler;
use chrono::{NaiveDate, NaiveDateTime};
use std::time::Duration;

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    // 2026-10-19 is a Monday
    NaiveDate::from_ymd_opt(2026, 10, day)
        .unwrap()
        .and_hms_opt(hour, minute, 5)
        .unwrap()
}

fn scheduler_for(root: &std::path::Path, config: Arc<ConfigStore>, mailer: Arc<RecordingMailer>) -> Scheduler {
    let task = build_task(root, Arc::clone(&config), mailer);
    Scheduler::new(config, task, Duration::from_millis(20))
}

#[tokio::test]
async fn test_firing_mails_matching_records() {
    let dir = tempfile::tempdir().unwrap();
    write_workspace(dir.path(), EGAN_QUERIES);
    let mailer = Arc::new(RecordingMailer::default());
    let config = Arc::new(ConfigStore::in_memory(valid_settings()));
    let mut scheduler = scheduler_for(dir.path(), config, mailer.clone());

    assert_eq!(scheduler.poll(at(19, 14, 29)), Poll::Waiting);
    assert_eq!(scheduler.poll(at(19, 14, 30)), Poll::Fired);
    assert_eq!(scheduler.poll(at(19, 14, 30)), Poll::Waiting);

    assert!(wait_for(|| mailer.deliveries().len() == 1, 2000).await);
    assert_eq!(mailer.deliveries()[0], vec![book("Diaspora", "Greg Egan")]);
}

#[tokio::test]
async fn test_rescheduling_takes_effect_on_next_poll() {
    let dir = tempfile::tempdir().unwrap();
    write_workspace(dir.path(), EGAN_QUERIES);
    let config = Arc::new(ConfigStore::open(dir.path().join("settings.toml")).unwrap());
    config
        .set_keys(&[
            ("login", "watchdog@example.com"),
            ("password", "secret"),
            ("recipient", "reader@example.com"),
            ("server", "smtp.example.com"),
            ("port", "465"),
            ("time", "08:00"),
            ("period", "daily"),
        ])
        .unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let mut scheduler = scheduler_for(dir.path(), Arc::clone(&config), mailer.clone());
    assert!(scheduler.is_enabled());

    assert_eq!(scheduler.poll(at(19, 7, 0)), Poll::Waiting);
    assert_eq!(scheduler.trigger().map(|t| t.period), Some(Period::Daily));

    config
        .set_keys(&[("time", "07:15"), ("period", "weekly"), ("weekday", "tuesday")])
        .unwrap();

    // Monday: wrong day
    assert_eq!(scheduler.poll(at(19, 7, 15)), Poll::Waiting);
    assert_eq!(scheduler.trigger().map(|t| t.period), Some(Period::Weekly));
    assert_eq!(scheduler.poll(at(20, 7, 15)), Poll::Fired);

    assert!(wait_for(|| mailer.deliveries().len() == 1, 2000).await);
}

#[tokio::test]
async fn test_invalid_reschedule_disables_until_enabled_again() {
    let dir = tempfile::tempdir().unwrap();
    write_workspace(dir.path(), EGAN_QUERIES);
    let mailer = Arc::new(RecordingMailer::default());
    let config = Arc::new(ConfigStore::in_memory(valid_settings()));
    let mut scheduler = scheduler_for(dir.path(), Arc::clone(&config), mailer.clone());
    let handle = scheduler.handle();

    config.set_key("time", "25:00").unwrap();
    assert_eq!(scheduler.poll(at(19, 14, 30)), Poll::Invalid);
    assert!(!handle.is_enabled());
    assert!(handle.enable().is_err());
    assert_eq!(scheduler.poll(at(19, 14, 30)), Poll::Disabled);

    config.set_key("time", "14:31").unwrap();
    handle.enable().unwrap();
    assert_eq!(scheduler.poll(at(19, 14, 31)), Poll::Fired);

    assert!(wait_for(|| mailer.deliveries().len() == 1, 2000).await);
}

#[tokio::test]
async fn test_run_loop_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    write_workspace(dir.path(), EGAN_QUERIES);
    let mailer = Arc::new(RecordingMailer::default());
    let config = Arc::new(ConfigStore::in_memory(valid_settings()));
    let scheduler = scheduler_for(dir.path(), config, mailer);

    let finished = tokio::time::timeout(
        Duration::from_secs(2),
        scheduler.run(tokio::time::sleep(Duration::from_millis(60))),
    )
    .await;
    assert!(finished.is_ok());
}

fn write_valid_settings(path: &std::path::Path, time: &str) {
    ConfigStore::open(path)
        .unwrap()
        .set_keys(&[
            ("login", "watchdog@example.com"),
            ("password", "secret"),
            ("recipient", "reader@example.com"),
            ("server", "smtp.example.com"),
            ("port", "465"),
            ("time", time),
            ("period", "daily"),
        ])
        .unwrap();
}

#[tokio::test]
async fn test_edits_from_another_process_reach_running_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    write_workspace(dir.path(), EGAN_QUERIES);
    let settings = dir.path().join("settings.toml");
    write_valid_settings(&settings, "08:00");

    let running = Arc::new(ConfigStore::open(&settings).unwrap());
    let mailer = Arc::new(RecordingMailer::default());
    let mut scheduler = scheduler_for(dir.path(), running, mailer.clone());
    assert_eq!(scheduler.poll(at(19, 7, 0)), Poll::Waiting);

    // what `aw config set time 09:15` does from its own process
    ConfigStore::open(&settings).unwrap().set_key("time", "09:15").unwrap();

    assert_eq!(scheduler.poll(at(19, 9, 15)), Poll::Fired);
    let trigger = scheduler.trigger().unwrap();
    assert_eq!((trigger.hour, trigger.minute), (9, 15));
    assert_eq!(scheduler.poll(at(20, 8, 0)), Poll::Waiting);

    assert!(wait_for(|| mailer.deliveries().len() == 1, 2000).await);
}

#[tokio::test]
async fn test_scheduler_recovers_once_settings_file_is_fixed() {
    let dir = tempfile::tempdir().unwrap();
    write_workspace(dir.path(), EGAN_QUERIES);
    let settings = dir.path().join("settings.toml");
    write_valid_settings(&settings, "08:00");

    let mailer = Arc::new(RecordingMailer::default());
    let mut scheduler = scheduler_for(
        dir.path(),
        Arc::new(ConfigStore::open(&settings).unwrap()),
        mailer.clone(),
    );

    let editor = ConfigStore::open(&settings).unwrap();
    editor.set_key("time", "8 am").unwrap();
    assert_eq!(scheduler.poll(at(19, 7, 0)), Poll::Invalid);
    assert_eq!(scheduler.poll(at(19, 7, 1)), Poll::Disabled);

    editor.set_key("time", "07:30").unwrap();
    assert_eq!(scheduler.poll(at(19, 7, 30)), Poll::Fired);
    assert!(scheduler.is_enabled());

    assert!(wait_for(|| mailer.deliveries().len() == 1, 2000).await);
}

#[tokio::test]
async fn test_invalid_settings_at_startup_enable_after_edit() {
    let dir = tempfile::tempdir().unwrap();
    write_workspace(dir.path(), EGAN_QUERIES);
    let settings = dir.path().join("settings.toml");

    let mailer = Arc::new(RecordingMailer::default());
    let mut scheduler = scheduler_for(
        dir.path(),
        Arc::new(ConfigStore::open(&settings).unwrap()),
        mailer.clone(),
    );
    assert!(!scheduler.is_enabled());
    assert_eq!(scheduler.poll(at(19, 6, 0)), Poll::Disabled);

    write_valid_settings(&settings, "06:01");
    assert_eq!(scheduler.poll(at(19, 6, 1)), Poll::Fired);

    assert!(wait_for(|| mailer.deliveries().len() == 1, 2000).await);
}
