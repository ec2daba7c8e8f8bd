pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Config {
        pub db_url: String,
        #[serde(default = "default_port")]
        pub port: u16,
        /// Secret used to sign and verify bearer tokens.
        pub jwt_secret: String,
        /// How many unread change notifications a subscriber may fall behind.
        #[serde(default = "default_notification_capacity")]
        pub notification_capacity: usize,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = config::Config::builder()
                .add_source(config::Environment::default())
                .build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_notification_capacity() -> usize {
        256
    }

}

pub mod auth;
pub mod entities;
pub mod notify;
pub mod participant;
pub mod store;
pub mod task;
pub mod user;
pub mod web;
