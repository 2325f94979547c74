//! Directory listing parsing
//!
//! Three formats are understood:
//! * Unix `ls -l` style `LIST` output (most servers)
//! * DOS / IIS style `LIST` output
//! * RFC 3659 `MLSD` / `MLST` fact lines

use serde::Serialize;

/// Kind of a remote directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Anything the listing format could not classify
    Unknown,
}

/// Remote directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFile {
    /// Entry name as reported by the server (may contain separators)
    pub name: String,
    /// Entry kind
    pub kind: FileKind,
    /// Size in bytes (0 when unknown)
    pub size: u64,
    /// Modification time as reported by the server
    pub modified: Option<String>,
    /// Target of a symbolic link
    pub link_target: Option<String>,
    /// Permission string (`rwxr-xr-x`, or the MLSx `perm` fact)
    pub permissions: Option<String>,
    /// Listing line this entry was parsed from
    pub raw: String,
}

impl RemoteFile {
    /// Entry is a directory
    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Entry is a regular file
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Entry is a symbolic link
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    /// `.` or `..`
    pub fn is_pseudo_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Parse raw `LIST` output into entries, skipping `total` lines and lines no
/// parser recognizes
pub fn parse_list(text: &str) -> Vec<RemoteFile> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with("total "))
        .filter_map(parse_list_line)
        .collect()
}

/// Parse raw `MLSD` output into entries
pub fn parse_mlsd(text: &str) -> Vec<RemoteFile> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_mlsx_line)
        .collect()
}

/// Parse one `LIST` line in either Unix or DOS format
pub fn parse_list_line(line: &str) -> Option<RemoteFile> {
    parse_unix_line(line).or_else(|| parse_dos_line(line))
}

/// Split on whitespace, remembering where each token starts
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push((s, &line[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &line[s..]));
    }
    out
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn is_month(token: &str) -> bool {
    token.len() == 3 && MONTHS.contains(&token.to_ascii_lowercase().as_str())
}

fn parse_unix_line(line: &str) -> Option<RemoteFile> {
    let toks = tokens(line);
    let mode = toks.first()?.1;
    let permissions = mode.get(1..10).filter(|p| p.is_ascii())?;
    let kind = match mode.as_bytes()[0] {
        b'-' => FileKind::File,
        b'd' => FileKind::Directory,
        b'l' => FileKind::Symlink,
        b'b' | b'c' | b'p' | b's' => FileKind::Unknown,
        _ => return None,
    };

    // Owner and group columns vary between servers; anchor on the month of
    // the date, which is always preceded by the size.
    let month_idx = (3..toks.len()).find(|&i| is_month(toks[i].1))?;
    if toks.len() < month_idx + 4 {
        return None;
    }
    let size = toks[month_idx - 1].1.parse::<u64>().ok()?;
    let modified = format!(
        "{} {} {}",
        toks[month_idx].1,
        toks[month_idx + 1].1,
        toks[month_idx + 2].1
    );
    let name_start = toks[month_idx + 3].0;
    let full_name = &line[name_start..];

    let (name, link_target) = match (kind, full_name.split_once(" -> ")) {
        (FileKind::Symlink, Some((name, target))) => (name.to_string(), Some(target.to_string())),
        _ => (full_name.to_string(), None),
    };

    Some(RemoteFile {
        name,
        kind,
        size,
        modified: Some(modified),
        link_target,
        permissions: Some(permissions.to_string()),
        raw: line.to_string(),
    })
}

fn parse_dos_line(line: &str) -> Option<RemoteFile> {
    let toks = tokens(line);
    if toks.len() < 4 {
        return None;
    }
    let (date, time) = (toks[0].1, toks[1].1);
    if date.len() < 8 || date.as_bytes()[2] != b'-' || !time.contains(':') {
        return None;
    }

    let (kind, size) = if toks[2].1.eq_ignore_ascii_case("<DIR>") {
        (FileKind::Directory, 0)
    } else {
        (FileKind::File, toks[2].1.parse::<u64>().ok()?)
    };

    Some(RemoteFile {
        name: line[toks[3].0..].to_string(),
        kind,
        size,
        modified: Some(format!("{} {}", date, time)),
        link_target: None,
        permissions: None,
        raw: line.to_string(),
    })
}

/// Parse one `MLSD` / `MLST` fact line (`fact=value;fact=value; name`)
///
/// `cdir` and `pdir` entries are reported as `.` and `..`.
pub fn parse_mlsx_line(line: &str) -> Option<RemoteFile> {
    let line_trimmed = line.trim_start();
    let (facts, name) = line_trimmed.split_once(' ')?;
    if name.is_empty() {
        return None;
    }

    let mut file = RemoteFile {
        name: name.to_string(),
        kind: FileKind::Unknown,
        size: 0,
        modified: None,
        link_target: None,
        permissions: None,
        raw: line.to_string(),
    };

    for fact in facts.split(';').filter(|f| !f.is_empty()) {
        let Some((key, value)) = fact.split_once('=') else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "type" => {
                let lower = value.to_ascii_lowercase();
                file.kind = match lower.as_str() {
                    "file" => FileKind::File,
                    "dir" => FileKind::Directory,
                    "cdir" => {
                        file.name = ".".into();
                        FileKind::Directory
                    }
                    "pdir" => {
                        file.name = "..".into();
                        FileKind::Directory
                    }
                    v if v.starts_with("os.unix=slink") || v.starts_with("os.unix=symlink") => {
                        if let Some((_, target)) = value.split_once(':') {
                            file.link_target = Some(target.to_string());
                        }
                        FileKind::Symlink
                    }
                    _ => FileKind::Unknown,
                };
            }
            "size" | "sizd" => file.size = value.parse().unwrap_or(0),
            "modify" => file.modified = Some(value.to_string()),
            "perm" => file.permissions = Some(value.to_string()),
            _ => {}
        }
    }

    Some(file)
}
