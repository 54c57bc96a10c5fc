use std::io::Write;

use super::*;

#[test]
fn empty_document_uses_defaults() {
	assert_eq!(SchedulerConfig::from_toml("").unwrap(), SchedulerConfig::default());
}

#[test]
fn parses_every_field() {
	let config = SchedulerConfig::from_toml(
		r#"
cycle_policy = "fail"
event_buffer = 8
task_class = "background"
"#,
	)
	.unwrap();
	assert_eq!(config.cycle_policy, CyclePolicy::Fail);
	assert_eq!(config.event_buffer, 8);
	assert_eq!(config.task_class, TaskClass::Background);
}

#[test]
fn unknown_keys_are_rejected() {
	let err = SchedulerConfig::from_toml("retries = 3").unwrap_err();
	assert!(matches!(err, ConfigError::Toml(_)), "{err}");
}

#[test]
fn zero_event_buffer_is_invalid() {
	let err = SchedulerConfig::from_toml("event_buffer = 0").unwrap_err();
	assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}

#[test]
fn load_reads_file_and_reports_missing_path() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	writeln!(file, "cycle_policy = \"report\"\nevent_buffer = 4").unwrap();
	let config = SchedulerConfig::load(file.path()).unwrap();
	assert_eq!(config.event_buffer, 4);

	let missing = file.path().with_extension("missing");
	match SchedulerConfig::load(&missing).unwrap_err() {
		ConfigError::Io { path, .. } => assert_eq!(path, missing),
		other => panic!("unexpected error: {other}"),
	}
}
