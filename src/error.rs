use std::{io, path::PathBuf};

/**
An error produced by the sink.

Construction fails only on an invalid filename pattern. Write-path errors
carry the path they concern and the underlying I/O cause; a failed write
additionally carries the outcome of its single recovery attempt so the
original cause is never lost.
*/
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /**
    The filename pattern is not a valid strftime template, or the glob
    derived from it is malformed.
    */
    #[error("invalid filename pattern: {0}")]
    Pattern(String),

    /**
    A parent directory for a new log file could not be created.
    */
    #[error("cannot create directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /**
    A log file could not be opened for writing.
    */
    #[error("cannot open log file {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /**
    The active file could not be stat'ed, for a reason other than it
    missing.
    */
    #[error("cannot stat log file {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /**
    A write to the active file failed.

    If the recovery attempt that follows a failed write also failed, its
    error is attached as [`Error::recovery`]; the source always remains
    the original write failure.
    */
    #[error("cannot write to log file")]
    Write {
        #[source]
        source: io::Error,
        recovery: Option<Box<Error>>,
    },

    /**
    The symlink to the active file could not be refreshed.
    */
    #[error("cannot update symlink {}", path.display())]
    Symlink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /**
    The error of the recovery attempt that followed a failed write, if
    the recovery itself failed.
    */
    pub fn recovery(&self) -> Option<&Error> {
        match self {
            Error::Write { recovery, .. } => recovery.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::error::Error as _;

    #[test]
    fn write_error_preserves_the_original_cause() {
        let err = Error::Write {
            source: io::Error::other("no space left on device"),
            recovery: Some(Box::new(Error::Open {
                path: PathBuf::from("dir/app.log"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            })),
        };

        let source = err.source().expect("write errors carry their cause");
        assert!(source.to_string().contains("no space left"));

        let recovery = err.recovery().expect("the failed recovery is attached");
        assert!(matches!(recovery, Error::Open { .. }));
    }
}
