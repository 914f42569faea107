use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the verbosity flags, in `EnvFilter` syntax.
pub const LOG_ENV: &str = "CGIDX_LOG";

/// Filter directive for `-v` repetitions: warn, info, debug, trace.
pub fn directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "cgidx=warn",
        1 => "cgidx=info",
        2 => "cgidx=debug",
        _ => "cgidx=trace",
    }
}

/// Installs the stderr subscriber. Only the binary calls this.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(directive(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(directive(0), "cgidx=warn");
        assert_eq!(directive(2), "cgidx=debug");
        assert_eq!(directive(9), "cgidx=trace");
    }
}
