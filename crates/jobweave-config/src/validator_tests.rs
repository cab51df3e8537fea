    use super::*;
    use crate::loader::ConfigLoader;

    fn load(content: &str) -> Config {
        ConfigLoader::load_str(content).unwrap()
    }

    const ONE_TIMER: &str = r#"
        [[timers]]
        name = "heartbeat"
        schedule = { every_ms = 1000 }
    "#;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "timers"));
    }

    #[test]
    fn test_validate_one_timer() {
        let result = ConfigValidator::validate(&load(ONE_TIMER)).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_zero_threads() {
        let mut config = load(ONE_TIMER);
        config.scheduling.executor_threads = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "scheduling.executor_threads"));
    }

    #[test]
    fn test_validate_low_lock_timeout_warning() {
        let mut config = load(ONE_TIMER);
        config.scheduling.lock_timeout_ms = 5;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.path == "scheduling.lock_timeout_ms"));
    }

    #[test]
    fn test_validate_unknown_level_warning() {
        let mut config = load(ONE_TIMER);
        config.logging.level = "chatty".into();
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "logging.level"));

        config.logging.level = "jobweave_scheduling=debug".into();
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_duplicate_names() {
        let config = load(
            r#"
            [[timers]]
            name = "same"
            schedule = "now"

            [[timers]]
            name = "same"
            schedule = { every_ms = 10 }
            "#,
        );
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "timers[1].name");
    }

    #[test]
    fn test_validate_invalid_cron() {
        let config = load(
            r#"
            [[timers]]
            name = "broken"
            schedule = { cron = "every tuesday" }
            "#,
        );
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].path, "timers[0].schedule");
        assert!(result.errors[0].message.contains("cron"));
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = load(
            r#"
            [[timers]]
            name = "spin"
            schedule = { every_ms = 0 }
            "#,
        );
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.errors[0].path, "timers[0].schedule");
    }

    #[test]
    fn test_validate_zero_retry_attempts() {
        let config = load(
            r#"
            [[timers]]
            name = "flaky"
            schedule = "now"
            retry = { every_ms = 100, attempts = 0 }
            "#,
        );
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_validate_bad_time_zone() {
        let config = load(
            r#"
            [[timers]]
            name = "abroad"
            schedule = "now"
            time_zone = "Atlantis"
            "#,
        );
        let result = ConfigValidator::validate(&config).unwrap();
        assert_eq!(result.errors[0].path, "timers[0].time_zone");
    }

    #[test]
    fn test_validate_retry_with_halt_warning() {
        let config = load(
            r#"
            [[timers]]
            name = "strict"
            schedule = { every_ms = 1000 }
            halt_on_failure = true
            retry = { every_ms = 10, attempts = 2 }
            "#,
        );
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.path == "timers[0].halt_on_failure"));
    }

    #[test]
    fn test_into_error() {
        let mut config = load(ONE_TIMER);
        config.scheduling.executor_threads = 0;
        let err = ConfigValidator::validate(&config)
            .unwrap()
            .into_error()
            .unwrap();
        assert!(err.to_string().contains("executor_threads"));

        let ok = ConfigValidator::validate(&load(ONE_TIMER)).unwrap();
        assert!(ok.into_error().is_none());
    }

    #[test]
    fn test_validation_result_default() {
        let result = ValidationResult::default();
        assert!(result.is_valid());
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }
