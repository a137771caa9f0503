//! Miscellaneous statics and utilities used throughout hyperfiled.

/// A string representation of this crate's version. In debug builds, this
/// is in the form of `[full semver crate version]+debug`. In release
/// builds this gets shortened to `MAJOR.MINOR`.
pub const VERSION: &str = if cfg!(debug_assertions) {
	concat!(env!("CARGO_PKG_VERSION"), "+debug")
} else {
	concat!(
		env!("CARGO_PKG_VERSION_MAJOR"),
		".",
		env!("CARGO_PKG_VERSION_MINOR")
	)
};

/// The name of the HTTP server implemented by this crate. Used in e.g. the
/// `Server` HTTP response header.
pub const SERVER_NAME: &str = if cfg!(debug_assertions) {
	concat!("hyperfiled/", env!("CARGO_PKG_VERSION"), "+debug")
} else {
	concat!(
		"hyperfiled/",
		env!("CARGO_PKG_VERSION_MAJOR"),
		".",
		env!("CARGO_PKG_VERSION_MINOR")
	)
};

/// Help string for the server CLI.
pub const SERVER_HELP: &str = r#"hyperfiled server

USAGE:
    server -c WORKERS [OPTIONS]

EXAMPLE:
    server -c 4 --port 8080 --root ./resources

FLAGS:
 -h --help                Print this and exit

OPTIONS:
 -c --workers N           Number of worker tasks (required, N >= 1)
    --port PORT           Listen port (default 8080)
    --root PATH            Document root (default ./resources)
    --handler PATH        Handler module artifact path (default ./http.so)
    --store PATH          Keyed store path (default ./requests_db)
    --config PATH         TOML configuration file, overlaid before CLI flags
    --log-level LEVEL     One of trace, debug, info, warn, error (default info)
    --send-server BOOL    Whether to send the Server response header (default true)

Configuration is layered: built-in defaults, then the optional --config
file, then command-line flags, each overwriting the previous.
"#;
