use huddle_push::VapidConfig;

/// Server configuration, read once at startup from the environment
/// (a `.env` file is honored when present).
///
/// | Variable                    | Default       |
/// |-----------------------------|---------------|
/// | `HUDDLE_HOST`               | `0.0.0.0`     |
/// | `HUDDLE_PORT`               | `3000`        |
/// | `HUDDLE_DB_PATH`            | `huddle.db`   |
/// | `HUDDLE_JWT_SECRET`         | dev secret    |
/// | `HUDDLE_ONLINE_WINDOW_SECS` | `60`          |
/// | `HUDDLE_VAPID_PUBLIC_KEY`   | unset         |
/// | `HUDDLE_VAPID_PRIVATE_KEY`  | unset         |
/// | `HUDDLE_VAPID_CONTACT`      | unset         |
///
/// Push dispatch stays disabled unless all three VAPID variables are set.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub online_window_secs: i64,
    pub vapid: Option<VapidConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("HUDDLE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("HUDDLE_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;
        let db_path = std::env::var("HUDDLE_DB_PATH").unwrap_or_else(|_| "huddle.db".into());
        let jwt_secret =
            std::env::var("HUDDLE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
        let online_window_secs: i64 = std::env::var("HUDDLE_ONLINE_WINDOW_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()?;

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            online_window_secs,
            vapid: VapidConfig::from_env(),
        })
    }
}
