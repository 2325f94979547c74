//! FTP protocol constants

/// Default control port
pub const DEFAULT_PORT: u16 = 21;

/// Default command / keep-alive timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u32 = 300;

/// Default listing page size
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Line terminator for commands and replies
pub const CRLF: &[u8] = b"\r\n";

/// Reply codes (RFC 959, RFC 3659)
pub mod codes {
    /// Data connection already open; transfer starting
    pub const DATA_CONNECTION_ALREADY_OPEN: u16 = 125;

    /// File status okay; about to open data connection
    pub const FILE_STATUS_OK: u16 = 150;

    /// Command okay
    pub const COMMAND_OK: u16 = 200;

    /// System status, or system help reply
    pub const SYSTEM_STATUS: u16 = 211;

    /// Directory status
    pub const DIRECTORY_STATUS: u16 = 212;

    /// File status (SIZE, MDTM)
    pub const FILE_STATUS: u16 = 213;

    /// Service ready for new user
    pub const SERVICE_READY: u16 = 220;

    /// Service closing control connection
    pub const SERVICE_CLOSING: u16 = 221;

    /// Closing data connection; requested file action successful
    pub const CLOSING_DATA_CONNECTION: u16 = 226;

    /// Entering passive mode
    pub const ENTERING_PASSIVE_MODE: u16 = 227;

    /// User logged in, proceed
    pub const USER_LOGGED_IN: u16 = 230;

    /// Requested file action okay, completed
    pub const FILE_ACTION_OK: u16 = 250;

    /// "PATHNAME" created
    pub const PATHNAME_CREATED: u16 = 257;

    /// User name okay, need password
    pub const NEED_PASSWORD: u16 = 331;

    /// Need account for login
    pub const NEED_ACCOUNT: u16 = 332;

    /// Requested file action pending further information
    pub const FILE_ACTION_PENDING: u16 = 350;

    /// Service not available, closing control connection
    pub const SERVICE_NOT_AVAILABLE: u16 = 421;

    /// Requested action not taken; file unavailable
    pub const FILE_UNAVAILABLE: u16 = 550;
}

/// Feature names advertised in `FEAT` replies
pub mod features {
    /// Machine listing of a single entry
    pub const MLST: &str = "MLST";

    /// Modification time query
    pub const MDTM: &str = "MDTM";

    /// File size query
    pub const SIZE: &str = "SIZE";
}
