//! In-memory transport for unit tests
//!
//! `MockTransport` behaves like a small FTP server backed by a directory tree
//! held in memory. Tests keep a handle to the shared [`MockServer`] to seed
//! files, inject faults, and inspect the commands that were issued.

use super::{Timeouts, Transport, TransportError, TransportResult};
use crate::protocol::listing::{parse_list_line, parse_mlsx_line};
use crate::protocol::{RemoteFile, Reply};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Fault injected into the next call of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Control connection drops
    Closed,
    /// Generic I/O failure, connection survives
    Io,
    /// Data stream copy fails
    Copy,
}

impl Fault {
    fn into_error(self) -> TransportError {
        match self {
            Fault::Closed => TransportError::ConnectionClosed,
            Fault::Io => TransportError::Io(io::Error::new(io::ErrorKind::Other, "injected")),
            Fault::Copy => TransportError::CopyStream {
                source: io::Error::new(io::ErrorKind::Other, "injected"),
            },
        }
    }
}

/// Server side state shared between a test and its transport
#[derive(Debug)]
pub(crate) struct MockServer {
    pub calls: Vec<&'static str>,
    pub faults: HashMap<&'static str, Fault>,
    pub connect_code: u16,
    pub accept_login: bool,
    pub dot_entries: bool,
    pub features: Vec<String>,
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    pub links: BTreeMap<String, String>,
    pub cwd: String,
    pub connected: bool,
    pub timeouts: Option<Timeouts>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            faults: HashMap::new(),
            connect_code: 220,
            accept_login: true,
            dot_entries: false,
            features: Vec::new(),
            dirs: BTreeSet::from(["/".to_string()]),
            files: BTreeMap::new(),
            links: BTreeMap::new(),
            cwd: "/".into(),
            connected: false,
            timeouts: None,
        }
    }
}

impl MockServer {
    pub fn add_dir(&mut self, path: &str) {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
    }

    pub fn add_file(&mut self, path: &str, contents: &[u8]) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_dir(parent);
        }
        self.files.insert(path.to_string(), contents.to_vec());
    }

    pub fn fail_next(&mut self, op: &'static str, fault: Fault) {
        self.faults.insert(op, fault);
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.iter().filter(|c| **c == op).count()
    }

    fn absolute(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else if path.is_empty() {
            self.cwd.clone()
        } else {
            format!("{}/{}", self.cwd.trim_end_matches('/'), path)
        };

        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                p => parts.push(p),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn parent_exists(&self, abs: &str) -> bool {
        match abs.rsplit_once('/') {
            Some(("", _)) => true,
            Some((parent, _)) => self.dirs.contains(parent),
            None => false,
        }
    }

    fn children(&self, dir: &str) -> Vec<(String, bool)> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };
        let direct = |p: &String| {
            p.strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                .map(str::to_string)
        };
        let mut out: Vec<(String, bool)> = self
            .dirs
            .iter()
            .filter_map(|d| direct(d).map(|n| (n, true)))
            .collect();
        out.extend(self.files.keys().filter_map(|f| direct(f).map(|n| (n, false))));
        out
    }
}

fn unix_line(name: &str, is_dir: bool, size: usize) -> RemoteFile {
    let mode = if is_dir { "drwxr-xr-x" } else { "-rw-r--r--" };
    let line = format!("{} 1 ftp ftp {} Jan 15 12:30 {}", mode, size, name);
    parse_list_line(&line).expect("mock listing line")
}

fn mlsx_line(name: &str, is_dir: bool, size: usize) -> RemoteFile {
    let kind = if is_dir { "dir" } else { "file" };
    let line = format!("type={};size={};modify=20240115123045; {}", kind, size, name);
    parse_mlsx_line(&line).expect("mock mlsx line")
}

/// Transport whose server lives in memory
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    server: Arc<Mutex<MockServer>>,
    last_reply: Reply,
}

impl MockTransport {
    pub fn new() -> (Self, Arc<Mutex<MockServer>>) {
        let server = Arc::new(Mutex::new(MockServer::default()));
        (
            Self {
                server: Arc::clone(&server),
                last_reply: Reply::default(),
            },
            server,
        )
    }

    /// Record the call, apply an injected fault, then run `f` against the
    /// server state
    fn call<R>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut MockServer) -> (u16, &'static str, R),
    ) -> TransportResult<R> {
        let mut server = self.server.lock();
        server.calls.push(op);
        if let Some(fault) = server.faults.remove(op) {
            if fault == Fault::Closed {
                server.connected = false;
                self.last_reply = Reply::single(421, "Service not available");
            }
            return Err(fault.into_error());
        }
        if !server.connected && op != "connect" {
            return Err(TransportError::ConnectionClosed);
        }
        let (code, text, result) = f(&mut server);
        self.last_reply = Reply::single(code, text);
        Ok(result)
    }

    fn flag(ok: bool, yes: u16, no: u16) -> (u16, &'static str, bool) {
        if ok {
            (yes, "OK", true)
        } else {
            (no, "Failed", false)
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, _host: &str, _port: u16) -> TransportResult<Reply> {
        self.call("connect", |s| {
            s.connected = true;
            s.cwd = "/".into();
            (s.connect_code, "Greeting", ())
        })?;
        Ok(self.last_reply.clone())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        let mut server = self.server.lock();
        server.calls.push("disconnect");
        server.connected = false;
        if let Some(fault) = server.faults.remove("disconnect") {
            return Err(fault.into_error());
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.server.lock().connected
    }

    fn last_reply(&self) -> &Reply {
        &self.last_reply
    }

    fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.server.lock().timeouts = Some(timeouts);
    }

    async fn login(&mut self, _user: &str, _password: &str) -> TransportResult<bool> {
        self.call("login", |s| Self::flag(s.accept_login, 230, 530))
    }

    async fn logout(&mut self) -> TransportResult<bool> {
        self.call("logout", |_| (221, "Goodbye", true))
    }

    async fn noop(&mut self) -> TransportResult<bool> {
        self.call("noop", |_| (200, "NOOP ok", true))
    }

    async fn set_binary_mode(&mut self) -> TransportResult<bool> {
        self.call("binary", |_| (200, "Type set to I", true))
    }

    async fn features(&mut self) -> TransportResult<Vec<String>> {
        self.call("features", |s| (211, "End", s.features.clone()))
    }

    async fn change_working_directory(&mut self, path: &str) -> TransportResult<bool> {
        self.call("cwd", |s| {
            let abs = s.absolute(path);
            let ok = s.dirs.contains(&abs);
            if ok {
                s.cwd = abs;
            }
            Self::flag(ok, 250, 550)
        })
    }

    async fn change_to_parent_directory(&mut self) -> TransportResult<bool> {
        self.call("cdup", |s| {
            s.cwd = s.absolute("..");
            (250, "OK", true)
        })
    }

    async fn print_working_directory(&mut self) -> TransportResult<Option<String>> {
        self.call("pwd", |s| (257, "is current directory", Some(s.cwd.clone())))
    }

    async fn list(&mut self, path: &str) -> TransportResult<Vec<RemoteFile>> {
        self.call("list", |s| {
            let abs = s.absolute(path);
            let mut out = Vec::new();
            if s.links.contains_key(&abs) {
                // Some servers list nothing for a symbolic link
            } else if s.dirs.contains(&abs) {
                if s.dot_entries {
                    out.push(unix_line(".", true, 0));
                    out.push(unix_line("..", true, 0));
                }
                for (name, is_dir) in s.children(&abs) {
                    let size = s.files.get(&format!("{}/{}", abs.trim_end_matches('/'), name));
                    out.push(unix_line(&name, is_dir, size.map_or(0, Vec::len)));
                }
                for (link, _) in s.links.iter() {
                    if let Some((parent, name)) = link.rsplit_once('/') {
                        let parent = if parent.is_empty() { "/" } else { parent };
                        if parent == abs {
                            let line = format!("lrwxrwxrwx 1 ftp ftp 4 Jan 15 12:30 {} -> x", name);
                            out.extend(parse_list_line(&line));
                        }
                    }
                }
            } else if let Some(contents) = s.files.get(&abs) {
                out.push(unix_line(path, false, contents.len()));
            }
            (226, "Transfer complete", out)
        })
    }

    async fn machine_list_directory(&mut self, path: &str) -> TransportResult<Vec<RemoteFile>> {
        self.call("mlsd", |s| {
            let abs = s.absolute(path);
            if !s.dirs.contains(&abs) {
                return (550, "No such directory", Vec::new());
            }
            let mut out = vec![parse_mlsx_line(&format!("type=cdir; {}", abs)).expect("cdir")];
            for (name, is_dir) in s.children(&abs) {
                let size = s.files.get(&format!("{}/{}", abs.trim_end_matches('/'), name));
                out.push(mlsx_line(&name, is_dir, size.map_or(0, Vec::len)));
            }
            (226, "Transfer complete", out)
        })
    }

    async fn machine_list_file(&mut self, path: &str) -> TransportResult<Option<RemoteFile>> {
        self.call("mlst", |s| {
            let abs = s.absolute(path);
            if s.dirs.contains(&abs) {
                (250, "End", Some(mlsx_line(&abs, true, 0)))
            } else if let Some(contents) = s.files.get(&abs) {
                (250, "End", Some(mlsx_line(&abs, false, contents.len())))
            } else {
                (550, "No such file", None)
            }
        })
    }

    async fn make_directory(&mut self, path: &str) -> TransportResult<bool> {
        self.call("mkd", |s| {
            let abs = s.absolute(path);
            let ok = !s.dirs.contains(&abs) && !s.files.contains_key(&abs) && s.parent_exists(&abs);
            if ok {
                s.dirs.insert(abs);
            }
            Self::flag(ok, 257, 550)
        })
    }

    async fn remove_directory(&mut self, path: &str) -> TransportResult<bool> {
        self.call("rmd", |s| {
            let abs = s.absolute(path);
            let ok = abs != "/" && s.dirs.contains(&abs) && s.children(&abs).is_empty();
            if ok {
                s.dirs.remove(&abs);
            }
            Self::flag(ok, 250, 550)
        })
    }

    async fn delete_file(&mut self, path: &str) -> TransportResult<bool> {
        self.call("dele", |s| {
            let abs = s.absolute(path);
            let ok = s.files.remove(&abs).is_some();
            Self::flag(ok, 250, 550)
        })
    }

    async fn rename(&mut self, from: &str, to: &str) -> TransportResult<bool> {
        self.call("rename", |s| {
            let (from, to) = (s.absolute(from), s.absolute(to));
            let ok = match s.files.remove(&from) {
                Some(contents) => {
                    s.files.insert(to, contents);
                    true
                }
                None => false,
            };
            Self::flag(ok, 250, 550)
        })
    }

    async fn status(&mut self, path: Option<&str>) -> TransportResult<Option<String>> {
        self.call("stat", |s| match path {
            None => (211, "status", Some("mock server status".to_string())),
            Some(p) => {
                let abs = s.absolute(p);
                if s.files.contains_key(&abs) || s.dirs.contains(&abs) {
                    (213, "status", Some(format!("status of {}", abs)))
                } else {
                    (550, "No such file", None)
                }
            }
        })
    }

    async fn size(&mut self, path: &str) -> TransportResult<Option<u64>> {
        self.call("size", |s| {
            let abs = s.absolute(path);
            match s.files.get(&abs) {
                Some(c) => (213, "size", Some(c.len() as u64)),
                None => (550, "No such file", None),
            }
        })
    }

    async fn modification_time(&mut self, path: &str) -> TransportResult<Option<String>> {
        self.call("mdtm", |s| {
            let abs = s.absolute(path);
            if s.files.contains_key(&abs) {
                (213, "20240115123045", Some("20240115123045".to_string()))
            } else {
                (550, "No such file", None)
            }
        })
    }

    async fn store(
        &mut self,
        remote: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> TransportResult<bool> {
        self.call("store", |_| (150, "Opening", ()))?;
        let mut contents = Vec::new();
        source
            .read_to_end(&mut contents)
            .await
            .map_err(|source| TransportError::CopyStream { source })?;
        self.call("store_complete", |s| {
            let abs = s.absolute(remote);
            let ok = s.parent_exists(&abs) && !s.dirs.contains(&abs);
            if ok {
                s.files.insert(abs, contents);
            }
            Self::flag(ok, 226, 553)
        })
    }

    async fn retrieve(
        &mut self,
        remote: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> TransportResult<bool> {
        let contents = self.call("retrieve", |s| {
            let abs = s.absolute(remote);
            match s.files.get(&abs) {
                Some(c) => (150, "Opening", Some(c.clone())),
                None => (550, "No such file", None),
            }
        })?;
        let Some(contents) = contents else {
            return Ok(false);
        };
        sink.write_all(&contents)
            .await
            .map_err(|source| TransportError::CopyStream { source })?;
        sink.flush()
            .await
            .map_err(|source| TransportError::CopyStream { source })?;
        self.call("retrieve_complete", |_| (226, "Transfer complete", true))
    }
}
