/*!
 * Scheduler Configuration Tests
 * File loading and manager construction from config
 */

use pretty_assertions::assert_eq;
use reverie_scheduler::{
    DedicatedThreadConfig, DedicatedThreadType, ProcessManager, SchedulerConfig, SchedulerError,
};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "worker_threads": 3,
            "pool_queue_capacity": 64,
            "fixed_update_interval_secs": 0.02,
            "dedicated_threads": [
                {{ "thread": "animation", "min_update_interval_secs": 0.005 }},
                {{ "thread": "audio" }}
            ]
        }}"#
    )
    .unwrap();

    let config = SchedulerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.worker_threads, Some(3));
    assert_eq!(config.pool_queue_capacity, 64);
    assert_eq!(config.reserved(), 3);
    assert_eq!(
        config.dedicated_threads,
        vec![
            DedicatedThreadConfig::new(DedicatedThreadType::Animation).with_min_update_interval(0.005),
            DedicatedThreadConfig::new(DedicatedThreadType::Audio),
        ]
    );
}

#[test]
fn test_missing_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = SchedulerConfig::from_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(SchedulerError::Configuration(_))));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let result = SchedulerConfig::from_json_str(r#"{ "pool_queue_capacity": 0 }"#);
    assert!(matches!(result, Err(SchedulerError::Configuration(_))));

    let result = SchedulerConfig::from_json_str(r#"{ "worker_threads": 0 }"#);
    assert!(matches!(result, Err(SchedulerError::Configuration(_))));
}

#[test]
fn test_manager_from_config_spawns_dedicated_threads() {
    let config = SchedulerConfig::new()
        .with_worker_threads(2)
        .with_dedicated_thread(DedicatedThreadConfig::new(DedicatedThreadType::Audio));
    let manager = ProcessManager::new(config).unwrap();

    for thread in DedicatedThreadType::ALL {
        let dedicated = manager.dedicated_thread(thread).unwrap();
        assert!(dedicated.is_running());
    }
}

#[test]
fn test_manager_rejects_invalid_config() {
    let config = SchedulerConfig::new().with_fixed_update_interval(f64::NAN);
    assert!(matches!(
        ProcessManager::new(config),
        Err(SchedulerError::Configuration(_))
    ));
}
