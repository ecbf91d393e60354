pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        /// Browser origin allowed to call the API cross-site.
        #[serde(default = "default_allowed_origin")]
        pub allowed_origin: String,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            Self::load(config::Config::builder().add_source(config::Environment::default()))
        }

        fn load(
            builder: config::ConfigBuilder<config::builder::DefaultState>,
        ) -> anyhow::Result<Self> {
            let settings = builder.build()?;
            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_allowed_origin() -> String {
        "http://localhost:3000".to_string()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn can_apply_defaults_when_only_db_url_is_set() {
            let builder = config::Config::builder()
                .set_override("db_url", "sqlite::memory:")
                .unwrap();

            let config = Config::load(builder).unwrap();

            assert_eq!(config.db_url, "sqlite::memory:");
            assert_eq!(config.port, 8080);
            assert_eq!(config.allowed_origin, "http://localhost:3000");
        }

        #[test]
        fn can_override_port_and_origin() {
            let builder = config::Config::builder()
                .set_override("db_url", "postgres://localhost/todos")
                .unwrap()
                .set_override("port", 9090_i64)
                .unwrap()
                .set_override("allowed_origin", "https://todos.example.com")
                .unwrap();

            let config = Config::load(builder).unwrap();

            assert_eq!(config.port, 9090);
            assert_eq!(config.allowed_origin, "https://todos.example.com");
        }

        #[test]
        fn can_reject_missing_db_url() {
            assert!(Config::load(config::Config::builder()).is_err());
        }
    }
}
pub mod entities;
pub mod todo;
pub mod web;
