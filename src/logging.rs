use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber for the crate's `tracing` events.
///
/// `DOCMAN_LOG` takes precedence over the flags. Calling this again once a
/// global subscriber is set does nothing.
pub fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCMAN_LOG") {
        EnvFilter::new(env)
    } else {
        EnvFilter::new(default_level(verbose, quiet))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn default_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
