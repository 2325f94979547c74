//! Protocol message types

use super::constants::codes;
use std::fmt;

/// Command sent on the control connection (client → server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// USER
    User(String),
    /// PASS
    Pass(String),
    /// QUIT
    Quit,
    /// NOOP
    Noop,
    /// TYPE I / TYPE A
    Type(TransferType),
    /// FEAT
    Feat,
    /// CWD
    Cwd(String),
    /// CDUP
    Cdup,
    /// PWD
    Pwd,
    /// PASV
    Pasv,
    /// LIST with optional path
    List(Option<String>),
    /// MLSD with optional path
    Mlsd(Option<String>),
    /// MLST with optional path
    Mlst(Option<String>),
    /// RETR
    Retr(String),
    /// STOR
    Stor(String),
    /// MKD
    Mkd(String),
    /// RMD
    Rmd(String),
    /// DELE
    Dele(String),
    /// RNFR
    Rnfr(String),
    /// RNTO
    Rnto(String),
    /// STAT with optional path
    Stat(Option<String>),
    /// SIZE
    Size(String),
    /// MDTM
    Mdtm(String),
}

impl Command {
    /// Command verb
    pub fn verb(&self) -> &'static str {
        match self {
            Self::User(_) => "USER",
            Self::Pass(_) => "PASS",
            Self::Quit => "QUIT",
            Self::Noop => "NOOP",
            Self::Type(_) => "TYPE",
            Self::Feat => "FEAT",
            Self::Cwd(_) => "CWD",
            Self::Cdup => "CDUP",
            Self::Pwd => "PWD",
            Self::Pasv => "PASV",
            Self::List(_) => "LIST",
            Self::Mlsd(_) => "MLSD",
            Self::Mlst(_) => "MLST",
            Self::Retr(_) => "RETR",
            Self::Stor(_) => "STOR",
            Self::Mkd(_) => "MKD",
            Self::Rmd(_) => "RMD",
            Self::Dele(_) => "DELE",
            Self::Rnfr(_) => "RNFR",
            Self::Rnto(_) => "RNTO",
            Self::Stat(_) => "STAT",
            Self::Size(_) => "SIZE",
            Self::Mdtm(_) => "MDTM",
        }
    }

    /// Command argument, if any
    pub fn argument(&self) -> Option<&str> {
        match self {
            Self::User(arg)
            | Self::Pass(arg)
            | Self::Cwd(arg)
            | Self::Retr(arg)
            | Self::Stor(arg)
            | Self::Mkd(arg)
            | Self::Rmd(arg)
            | Self::Dele(arg)
            | Self::Rnfr(arg)
            | Self::Rnto(arg)
            | Self::Size(arg)
            | Self::Mdtm(arg) => Some(arg.as_str()),
            Self::List(arg) | Self::Mlsd(arg) | Self::Mlst(arg) | Self::Stat(arg) => {
                arg.as_deref()
            }
            Self::Type(TransferType::Binary) => Some("I"),
            Self::Type(TransferType::Ascii) => Some("A"),
            Self::Quit | Self::Noop | Self::Feat | Self::Cdup | Self::Pwd | Self::Pasv => None,
        }
    }
}

impl fmt::Display for Command {
    /// Log-safe rendering: the PASS argument is masked
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.argument()) {
            (Self::Pass(_), _) => write!(f, "PASS ****"),
            (_, Some(arg)) => write!(f, "{} {}", self.verb(), arg),
            (_, None) => write!(f, "{}", self.verb()),
        }
    }
}

/// Representation type for data transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    /// TYPE I
    Binary,
    /// TYPE A
    Ascii,
}

/// Reply received on the control connection (server → client)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    /// Three digit reply code (0 before any reply was read)
    pub code: u16,
    /// Reply text lines, including the code prefixes
    pub lines: Vec<String>,
}

impl Reply {
    /// Create a reply
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Single line reply, mostly useful in tests
    pub fn single(code: u16, text: &str) -> Self {
        Self {
            code,
            lines: vec![format!("{} {}", code, text)],
        }
    }

    /// 1xx
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 2xx
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx
    pub fn is_positive_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// 4xx
    pub fn is_transient_negative(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// 5xx
    pub fn is_permanent_negative(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// Server is closing the control connection
    pub fn is_service_not_available(&self) -> bool {
        self.code == codes::SERVICE_NOT_AVAILABLE
    }

    /// Text of the reply with the code prefix of the first and last lines
    /// removed
    pub fn text(&self) -> String {
        let prefix_len = 4;
        let last = self.lines.len().saturating_sub(1);
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                if (i == 0 || i == last) && line.len() >= prefix_len {
                    line.get(prefix_len..).unwrap_or("")
                } else {
                    line.as_str()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Raw reply as received, lines joined with CRLF
    pub fn reply_string(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join(" | "))
    }
}
