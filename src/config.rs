use clap::Parser;

/// Interactive timeline of database query and session activity.
#[derive(Parser, Debug, Clone)]
#[command(name = "querylane")]
#[command(about = "Zoomable timeline of events served by a query-statistics backend")]
pub struct Config {
    /// Events endpoint; `info` and `flush` are resolved relative to it
    #[arg(long, env = "QUERYLANE_API", default_value = "http://127.0.0.1:5000/api/default/")]
    pub api_base: String,

    /// Connection registry endpoint
    #[arg(
        long,
        env = "QUERYLANE_CONNECTIONS",
        default_value = "http://127.0.0.1:5000/api/connections"
    )]
    pub connections_base: String,

    /// Seconds shown when no location is given
    #[arg(long, default_value_t = 600.0)]
    pub default_window: f64,

    /// Initial view as `<from>/<to>[/<id>]` in epoch seconds
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["querylane"]).unwrap();
        assert_eq!(config.default_window, 600.0);
        assert!(config.location.is_none());
    }

    #[test]
    fn location_is_positional() {
        let config =
            Config::try_parse_from(["querylane", "--default-window", "900", "1000/1100/42"])
                .unwrap();
        assert_eq!(config.default_window, 900.0);
        assert_eq!(config.location.as_deref(), Some("1000/1100/42"));
    }
}
