// Logging setup

use tracing::Level;

/// Maximum log level for the given CLI flags
pub fn level_for(verbose: bool, quiet: bool) -> Level {
    if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

/// Install the stderr subscriber.
///
/// A second call keeps the first subscriber.
pub fn init_logging(verbose: bool, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level_for(verbose, quiet))
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
