//! Closed table of error kinds reported to the host.
//!
//! Codes are part of the wire contract. A code is never renumbered or reused
//! for a different meaning; new kinds only get new codes.

/// Error kinds understood by the host, rooted at [`ErrorKind::UnknownError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownError,
    AuthenticationRequired,
    BackendNotAvailable,
    BackendTimeout,
    BackendError,
    TooManyRequests,
    InvalidCredentials,
    NetworkError,
    LoggedInElsewhere,
    ProtocolError,
    TemporaryBlocked,
    Banned,
    AccessDenied,
    ParentalControlBlock,
    DeviceBlocked,
    RegionBlocked,
    FailedParsingManifest,
    TooManyMessagesSent,
    IncoherentLastMessage,
    MessageNotFound,
    ImportInProgress,
}

impl ErrorKind {
    /// Every kind in the table, ordered by code
    pub const ALL: [ErrorKind; 21] = [
        ErrorKind::UnknownError,
        ErrorKind::AuthenticationRequired,
        ErrorKind::BackendNotAvailable,
        ErrorKind::BackendTimeout,
        ErrorKind::BackendError,
        ErrorKind::TooManyRequests,
        ErrorKind::InvalidCredentials,
        ErrorKind::NetworkError,
        ErrorKind::LoggedInElsewhere,
        ErrorKind::ProtocolError,
        ErrorKind::TemporaryBlocked,
        ErrorKind::Banned,
        ErrorKind::AccessDenied,
        ErrorKind::ParentalControlBlock,
        ErrorKind::DeviceBlocked,
        ErrorKind::RegionBlocked,
        ErrorKind::FailedParsingManifest,
        ErrorKind::TooManyMessagesSent,
        ErrorKind::IncoherentLastMessage,
        ErrorKind::MessageNotFound,
        ErrorKind::ImportInProgress,
    ];

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::UnknownError => 0,
            ErrorKind::AuthenticationRequired => 1,
            ErrorKind::BackendNotAvailable => 2,
            ErrorKind::BackendTimeout => 3,
            ErrorKind::BackendError => 4,
            ErrorKind::TooManyRequests => 5,
            ErrorKind::InvalidCredentials => 100,
            ErrorKind::NetworkError => 101,
            ErrorKind::LoggedInElsewhere => 102,
            ErrorKind::ProtocolError => 103,
            ErrorKind::TemporaryBlocked => 104,
            ErrorKind::Banned => 105,
            ErrorKind::AccessDenied => 106,
            ErrorKind::ParentalControlBlock => 107,
            ErrorKind::DeviceBlocked => 108,
            ErrorKind::RegionBlocked => 109,
            ErrorKind::FailedParsingManifest => 200,
            ErrorKind::TooManyMessagesSent => 300,
            ErrorKind::IncoherentLastMessage => 400,
            ErrorKind::MessageNotFound => 500,
            ErrorKind::ImportInProgress => 600,
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            ErrorKind::UnknownError => "Unknown error",
            ErrorKind::AuthenticationRequired => "Authentication required",
            ErrorKind::BackendNotAvailable => "Backend not available",
            ErrorKind::BackendTimeout => "Backend timed out",
            ErrorKind::BackendError => "Backend error",
            ErrorKind::TooManyRequests => "Too many requests. Try again later",
            ErrorKind::InvalidCredentials => "Invalid credentials",
            ErrorKind::NetworkError => "Network error",
            ErrorKind::LoggedInElsewhere => "Logged in elsewhere",
            ErrorKind::ProtocolError => "Protocol error",
            ErrorKind::TemporaryBlocked => "Temporary blocked",
            ErrorKind::Banned => "Banned",
            ErrorKind::AccessDenied => "Access denied",
            ErrorKind::ParentalControlBlock => "Parental control block",
            ErrorKind::DeviceBlocked => "Device blocked",
            ErrorKind::RegionBlocked => "Region blocked",
            ErrorKind::FailedParsingManifest => "Failed parsing manifest",
            ErrorKind::TooManyMessagesSent => "Too many messages sent",
            ErrorKind::IncoherentLastMessage => "Different last message id on backend",
            ErrorKind::MessageNotFound => "Message not found",
            ErrorKind::ImportInProgress => "Import already in progress",
        }
    }

    /// Look up a kind by its wire code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ErrorKind {}
