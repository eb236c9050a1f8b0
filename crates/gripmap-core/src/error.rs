//! Error types for the gripmap workspace.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Insufficient data: need {required} samples, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error(
        "Degenerate fit: touch feature energy {energy:.3e} is below the noise floor; \
         check the touch log or widen the baseline window"
    )]
    DegenerateFit { energy: f64 },

    #[error("Channel {channel}: cannot reshape {len} values into {rows}x{cols}")]
    ChannelShapeMismatch {
        channel: String,
        rows: usize,
        cols: usize,
        len: usize,
    },

    #[error("Channel id {channel:?} does not resolve to any hand region")]
    UnresolvedRegion { channel: String },

    #[error("Duplicate channel id: {channel}")]
    DuplicateChannel { channel: String },

    #[error("Column {column} is out of range for a table {width} columns wide")]
    ColumnOutOfRange { column: usize, width: usize },

    #[error("No numeric rows in {path}")]
    EmptyTable { path: String },

    #[error("Table error: {0}")]
    Table(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_capitalized() {
        let errors = [
            Error::InsufficientData {
                required: 5,
                available: 3,
            },
            Error::DegenerateFit { energy: 1e-15 },
            Error::ChannelShapeMismatch {
                channel: "palm_touch".into(),
                rows: 8,
                cols: 14,
                len: 7,
            },
            Error::UnresolvedRegion {
                channel: "wrist_touch".into(),
            },
            Error::DuplicateChannel {
                channel: "palm_touch".into(),
            },
            Error::ColumnOutOfRange {
                column: 9,
                width: 3,
            },
            Error::EmptyTable {
                path: "force.csv".into(),
            },
            Error::Table("truncated record".into()),
            Error::Session("missing shape row".into()),
            Error::Config("empty layout".into()),
            Error::Serialization("bad json".into()),
        ];
        for error in errors {
            let message = error.to_string();
            assert!(
                message.chars().next().is_some_and(|c| c.is_uppercase()),
                "message not capitalized: {message}"
            );
        }
    }

    #[test]
    fn test_calibration_messages_carry_diagnostics() {
        let insufficient = Error::InsufficientData {
            required: 5,
            available: 3,
        };
        assert_eq!(
            insufficient.to_string(),
            "Insufficient data: need 5 samples, have 3"
        );

        let degenerate = Error::DegenerateFit { energy: 1e-15 };
        assert!(degenerate.to_string().starts_with("Degenerate fit:"));
        assert!(degenerate.to_string().contains("1.000e-15"));
    }
}
