use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` selects the level, `warn` by
/// default; events go to stderr so they never mix with rewritten output.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = atty::is(atty::Stream::Stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}
