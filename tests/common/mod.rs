//! Loopback FTP server for integration tests
//!
//! Speaks just enough RFC 959 / RFC 3659 to exercise `FtpClient`: login,
//! directory navigation, passive-mode LIST / MLSD / RETR / STOR, and the
//! metadata queries. Every received command line is logged.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

pub const USER: &str = "bob";
pub const PASSWORD: &str = "secret";

/// Install a test subscriber once; `RUST_LOG` controls the output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub greeting: String,
    pub features: Vec<&'static str>,
    /// Answer this verb with 421 and hang up
    pub close_on: Option<&'static str>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            greeting: "220 loopback ready".into(),
            features: vec!["SIZE", "MDTM"],
            close_on: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub log: Vec<String>,
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ServerState {
    pub fn count(&self, verb: &str) -> usize {
        self.log
            .iter()
            .filter(|line| line.split(' ').next() == Some(verb))
            .count()
    }
}

pub struct FakeServer {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub async fn start(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let state = Arc::new(Mutex::new(ServerState::default()));
        state.lock().dirs.insert("/".into());

        let shared = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&shared);
                let config = config.clone();
                tokio::spawn(async move {
                    let _ = Session::new(config, state).run(stream).await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().dirs.insert(path.into());
    }

    pub fn add_file(&self, path: &str, contents: &[u8]) {
        self.state.lock().files.insert(path.into(), contents.to_vec());
    }

    pub fn count(&self, verb: &str) -> usize {
        self.state.lock().count(verb)
    }
}

struct Session {
    config: ServerConfig,
    state: Arc<Mutex<ServerState>>,
    cwd: String,
    user: Option<String>,
    passive: Option<TcpListener>,
    rename_from: Option<String>,
}

impl Session {
    fn new(config: ServerConfig, state: Arc<Mutex<ServerState>>) -> Self {
        Self {
            config,
            state,
            cwd: "/".into(),
            user: None,
            passive: None,
            rename_from: None,
        }
    }

    fn absolute(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else if path.is_empty() {
            self.cwd.clone()
        } else if self.cwd == "/" {
            format!("/{}", path)
        } else {
            format!("{}/{}", self.cwd, path)
        };
        let trimmed = joined.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".into()
        } else {
            trimmed.to_string()
        }
    }

    async fn run(mut self, stream: TcpStream) -> std::io::Result<()> {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        reply(&mut write, &format!("{}\r\n", self.config.greeting)).await?;
        if !self.config.greeting.starts_with('2') {
            return Ok(());
        }

        while let Some(line) = lines.next_line().await? {
            self.state.lock().log.push(line.clone());
            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
                None => (line.to_ascii_uppercase(), String::new()),
            };

            if self.config.close_on == Some(verb.as_str()) {
                reply(&mut write, "421 Service not available, closing\r\n").await?;
                return Ok(());
            }

            match verb.as_str() {
                "USER" => {
                    self.user = Some(arg);
                    reply(&mut write, "331 Password required\r\n").await?;
                }
                "PASS" => {
                    if self.user.as_deref() == Some(USER) && arg == PASSWORD {
                        reply(&mut write, "230 Logged in\r\n").await?;
                    } else {
                        reply(&mut write, "530 Login incorrect\r\n").await?;
                    }
                }
                "TYPE" => reply(&mut write, "200 Type set\r\n").await?,
                "NOOP" => reply(&mut write, "200 OK\r\n").await?,
                "FEAT" => {
                    let mut text = String::from("211-Features:\r\n");
                    for feature in &self.config.features {
                        text.push_str(&format!(" {}\r\n", feature));
                    }
                    text.push_str("211 End\r\n");
                    reply(&mut write, &text).await?;
                }
                "PWD" => {
                    reply(&mut write, &format!("257 \"{}\" is current directory\r\n", self.cwd))
                        .await?
                }
                "CWD" => {
                    let target = self.absolute(&arg);
                    if self.state.lock().dirs.contains(&target) {
                        self.cwd = target;
                        reply(&mut write, "250 Directory changed\r\n").await?;
                    } else {
                        reply(&mut write, "550 No such directory\r\n").await?;
                    }
                }
                "MKD" => {
                    let target = self.absolute(&arg);
                    let created = self.state.lock().dirs.insert(target.clone());
                    if created {
                        reply(&mut write, &format!("257 \"{}\" created\r\n", target)).await?;
                    } else {
                        reply(&mut write, "550 Already exists\r\n").await?;
                    }
                }
                "DELE" => {
                    let target = self.absolute(&arg);
                    if self.state.lock().files.remove(&target).is_some() {
                        reply(&mut write, "250 Deleted\r\n").await?;
                    } else {
                        reply(&mut write, "550 No such file\r\n").await?;
                    }
                }
                "RNFR" => {
                    self.rename_from = Some(self.absolute(&arg));
                    reply(&mut write, "350 Ready for destination\r\n").await?;
                }
                "RNTO" => {
                    let to = self.absolute(&arg);
                    let moved = match self.rename_from.take() {
                        Some(from) => {
                            let mut state = self.state.lock();
                            match state.files.remove(&from) {
                                Some(contents) => {
                                    state.files.insert(to, contents);
                                    true
                                }
                                None => false,
                            }
                        }
                        None => false,
                    };
                    let text = if moved { "250 Renamed\r\n" } else { "550 Rename failed\r\n" };
                    reply(&mut write, text).await?;
                }
                "SIZE" => {
                    let size = self.state.lock().files.get(&self.absolute(&arg)).map(Vec::len);
                    match size {
                        Some(size) => reply(&mut write, &format!("213 {}\r\n", size)).await?,
                        None => reply(&mut write, "550 No such file\r\n").await?,
                    }
                }
                "MDTM" => {
                    if self.state.lock().files.contains_key(&self.absolute(&arg)) {
                        reply(&mut write, "213 20240115123045\r\n").await?;
                    } else {
                        reply(&mut write, "550 No such file\r\n").await?;
                    }
                }
                "STAT" => reply(&mut write, "211-Status\r\n loopback\r\n211 End\r\n").await?,
                "MLST" => {
                    let target = self.absolute(&arg);
                    match self.fact_line(&target, &target) {
                        Some(facts) => {
                            let text = format!("250-Listing {}\r\n {}\r\n250 End\r\n", target, facts);
                            reply(&mut write, &text).await?;
                        }
                        None => reply(&mut write, "550 No such file\r\n").await?,
                    }
                }
                "PASV" => {
                    let listener = TcpListener::bind("127.0.0.1:0").await?;
                    let port = listener.local_addr()?.port();
                    self.passive = Some(listener);
                    let text = format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                        port >> 8,
                        port & 0xff
                    );
                    reply(&mut write, &text).await?;
                }
                "LIST" | "MLSD" => {
                    let target = self.absolute(&arg);
                    let listing = if verb == "LIST" {
                        self.unix_listing(&target, &arg)
                    } else {
                        self.mlsd_listing(&target)
                    };
                    match listing {
                        Some(text) => self.send_data(&mut write, text.as_bytes()).await?,
                        None => {
                            self.passive = None;
                            reply(&mut write, "550 No such file or directory\r\n").await?;
                        }
                    }
                }
                "RETR" => {
                    let contents = self.state.lock().files.get(&self.absolute(&arg)).cloned();
                    match contents {
                        Some(contents) => self.send_data(&mut write, &contents).await?,
                        None => {
                            self.passive = None;
                            reply(&mut write, "550 No such file\r\n").await?;
                        }
                    }
                }
                "STOR" => {
                    let target = self.absolute(&arg);
                    let Some(listener) = self.passive.take() else {
                        reply(&mut write, "425 Use PASV first\r\n").await?;
                        continue;
                    };
                    reply(&mut write, "150 Ready to receive\r\n").await?;
                    let (mut data, _) = listener.accept().await?;
                    let mut contents = Vec::new();
                    data.read_to_end(&mut contents).await?;
                    self.state.lock().files.insert(target, contents);
                    reply(&mut write, "226 Transfer complete\r\n").await?;
                }
                "QUIT" => {
                    reply(&mut write, "221 Goodbye\r\n").await?;
                    return Ok(());
                }
                _ => reply(&mut write, "502 Command not implemented\r\n").await?,
            }
        }
        Ok(())
    }

    async fn send_data(&mut self, write: &mut OwnedWriteHalf, payload: &[u8]) -> std::io::Result<()> {
        let Some(listener) = self.passive.take() else {
            return reply(write, "425 Use PASV first\r\n").await;
        };
        reply(write, "150 Opening data connection\r\n").await?;
        let (mut data, _) = listener.accept().await?;
        data.write_all(payload).await?;
        data.shutdown().await?;
        drop(data);
        reply(write, "226 Transfer complete\r\n").await
    }

    fn children(&self, dir: &str) -> Vec<(String, Option<usize>)> {
        let state = self.state.lock();
        let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir) };
        let direct = |path: &String| {
            path.strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                .map(str::to_string)
        };
        let mut out: Vec<(String, Option<usize>)> =
            state.dirs.iter().filter_map(|d| direct(d).map(|n| (n, None))).collect();
        out.extend(
            state
                .files
                .iter()
                .filter_map(|(f, c)| direct(f).map(|n| (n, Some(c.len())))),
        );
        out
    }

    fn unix_listing(&self, target: &str, arg: &str) -> Option<String> {
        let line = |name: &str, size: Option<usize>| match size {
            None => format!("drwxr-xr-x 2 ftp ftp 0 Jan 15 12:30 {}\r\n", name),
            Some(size) => format!("-rw-r--r-- 1 ftp ftp {} Jan 15 12:30 {}\r\n", size, name),
        };

        let state = self.state.lock();
        if let Some(contents) = state.files.get(target) {
            return Some(line(arg, Some(contents.len())));
        }
        if !state.dirs.contains(target) {
            return None;
        }
        drop(state);

        let mut text = String::from("total 0\r\n");
        text.push_str(&line(".", None));
        text.push_str(&line("..", None));
        for (name, size) in self.children(target) {
            text.push_str(&line(&name, size));
        }
        Some(text)
    }

    fn mlsd_listing(&self, target: &str) -> Option<String> {
        if !self.state.lock().dirs.contains(target) {
            return None;
        }
        let mut text = format!("type=cdir;modify=20240115123045; {}\r\n", target);
        for (name, _) in self.children(target) {
            let path = if target == "/" {
                format!("/{}", name)
            } else {
                format!("{}/{}", target, name)
            };
            if let Some(facts) = self.fact_line(&path, &name) {
                text.push_str(&facts);
                text.push_str("\r\n");
            }
        }
        Some(text)
    }

    fn fact_line(&self, path: &str, name: &str) -> Option<String> {
        let state = self.state.lock();
        if state.dirs.contains(path) {
            Some(format!("type=dir;modify=20240115123045; {}", name))
        } else {
            state.files.get(path).map(|contents| {
                format!("type=file;size={};modify=20240115123045; {}", contents.len(), name)
            })
        }
    }
}

async fn reply(write: &mut OwnedWriteHalf, text: &str) -> std::io::Result<()> {
    write.write_all(text.as_bytes()).await
}
