/*!
 * Error types for Deal Maker
 */

use deal_maker_engine::EngineError;
use deal_maker_node_interface::NodeError;
use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, DealerError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Startup and environment failures
///
/// Everything in here ends the process. Per-round problems (listing failures,
/// undecodable asks, failed deals) are handled inside the deal engine and never
/// reach this type.
#[derive(Debug)]
pub enum DealerError {
    /// Node binary could not be located
    BinaryNotFound { searched: Vec<PathBuf> },

    /// Working directory exists but has content
    WorkdirNotEmpty(PathBuf),

    /// Unknown network name or bad configuration value
    Config(String),

    /// Devnet environment could not be set up
    Environment(String),

    /// Node process failed to initialize or start
    Bootstrap(NodeError),

    /// Faucet or funding message failed
    Funding(String),

    /// Deal engine refused to start (policy, protocol parameters)
    Engine(EngineError),

    /// I/O error
    Io(io::Error),
}

impl DealerError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }

    /// Operator hint printed ahead of the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            DealerError::BinaryNotFound { .. } => Some("please install or build `go-filecoin`;"),
            DealerError::WorkdirNotEmpty(_) => Some("fail when checking workdir;"),
            DealerError::Bootstrap(_) => Some("failed to bootstrap node;"),
            DealerError::Funding(_) => Some("failed to fund wallet;"),
            DealerError::Engine(_) => Some("failed to start deal loop;"),
            _ => None,
        }
    }
}

impl fmt::Display for DealerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DealerError::BinaryNotFound { searched } => {
                write!(f, "no binary provided or found")?;
                if !searched.is_empty() {
                    let paths: Vec<String> =
                        searched.iter().map(|p| p.display().to_string()).collect();
                    write!(f, " (searched: {})", paths.join(", "))?;
                }
                Ok(())
            }
            DealerError::WorkdirNotEmpty(path) => {
                write!(f, "workdir is not empty: {}", path.display())
            }
            DealerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            DealerError::Environment(msg) => write!(f, "Environment error: {}", msg),
            DealerError::Bootstrap(err) => write!(f, "Node bootstrap failed: {}", err),
            DealerError::Funding(msg) => write!(f, "Funding failed: {}", msg),
            DealerError::Engine(err) => write!(f, "{}", err),
            DealerError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for DealerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DealerError::Bootstrap(err) => Some(err),
            DealerError::Engine(err) => Some(err),
            DealerError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for DealerError {
    fn from(err: io::Error) -> Self {
        DealerError::Io(err)
    }
}

impl From<EngineError> for DealerError {
    fn from(err: EngineError) -> Self {
        DealerError::Engine(err)
    }
}

impl From<toml::de::Error> for DealerError {
    fn from(err: toml::de::Error) -> Self {
        DealerError::Config(format!("TOML parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_startup_error_exits_nonzero() {
        let errors = vec![
            DealerError::BinaryNotFound { searched: vec![] },
            DealerError::WorkdirNotEmpty(PathBuf::from("/tmp/x")),
            DealerError::Config("bad".into()),
            DealerError::Environment("bad".into()),
            DealerError::Funding("bad".into()),
            DealerError::Engine(EngineError::NoSupportedSector),
        ];

        for err in errors {
            assert_eq!(err.exit_code(), EXIT_FAILURE);
        }
    }

    #[test]
    fn test_messages() {
        let err = DealerError::WorkdirNotEmpty(PathBuf::from("/data/work"));
        assert_eq!(err.to_string(), "workdir is not empty: /data/work");
        assert_eq!(err.hint(), Some("fail when checking workdir;"));

        let err = DealerError::BinaryNotFound {
            searched: vec![PathBuf::from("/go/bin/go-filecoin")],
        };
        assert!(err.to_string().contains("/go/bin/go-filecoin"));
        assert_eq!(err.hint(), Some("please install or build `go-filecoin`;"));
    }

    #[test]
    fn test_io_conversion_keeps_source() {
        use std::error::Error;

        let err: DealerError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, DealerError::Io(_)));
        assert!(err.source().is_some());
    }
}
