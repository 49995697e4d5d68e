//! Server configuration store, end to end.

#[cfg(test)]
mod tests {
    use rustio_core::config::{ConfigStore, FileLogger};
    use rustio_core::{CONFIG_VERSION, Credential};

    #[test]
    fn test_should_bootstrap_and_reload_configuration() {
        let dir = tempfile::tempdir().unwrap();

        // First run synthesizes defaults and persists them.
        let store = ConfigStore::init(dir.path()).unwrap();
        assert_eq!(store.version(), CONFIG_VERSION);
        assert_eq!(store.region(), "us-east-1");
        let generated = store.credential();
        assert!(generated.is_well_formed());
        assert!(store.certs_path().is_dir());

        // Mutate, save, reload.
        store.set_region("eu-central-1");
        store.set_credential(Credential {
            access_key: "AKIAFIXEDFIXEDFIXED0".to_owned(),
            secret_key: "fixed-secret".to_owned(),
        });
        store.set_file_logger(FileLogger {
            enable: true,
            filename: "server.log".to_owned(),
            level: "debug".to_owned(),
        });
        store.save().unwrap();
        drop(store);

        let reloaded = ConfigStore::init(dir.path()).unwrap();
        assert_eq!(reloaded.region(), "eu-central-1");
        assert_eq!(reloaded.credential().access_key, "AKIAFIXEDFIXEDFIXED0");
        assert!(reloaded.file_logger().enable);
        assert_eq!(reloaded.file_logger().filename, "server.log");
    }

    #[test]
    fn test_should_write_documented_json_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::init(dir.path()).unwrap();

        let raw = std::fs::read_to_string(store.config_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        for pointer in [
            "/version",
            "/credential/accessKey",
            "/credential/secretKey",
            "/region",
            "/logger/file",
            "/logger/console",
            "/logger/syslog",
        ] {
            assert!(
                value.pointer(pointer).is_some(),
                "missing config field {pointer}"
            );
        }
    }

    #[test]
    fn test_should_share_one_process_wide_instance() {
        let dir = tempfile::tempdir().unwrap();

        let first = rustio_core::init_config(dir.path()).unwrap();
        // A second init (even with a different path) returns the same store.
        let other_dir = tempfile::tempdir().unwrap();
        let second = rustio_core::init_config(other_dir.path()).unwrap();

        assert!(std::ptr::eq(first, second));
        assert!(rustio_core::server_config().is_some());
    }
}
