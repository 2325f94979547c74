//! tokio TCP implementation of [`Transport`]

use super::control::ControlChannel;
use super::{Timeouts, Transport, TransportError, TransportResult};
use crate::protocol::constants::codes;
use crate::protocol::decode::{parse_features, parse_pasv, parse_pwd, parse_size};
use crate::protocol::listing::{parse_list, parse_mlsd, parse_mlsx_line};
use crate::protocol::{Command, RemoteFile, Reply, TransferType};
use async_trait::async_trait;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// FTP client over TCP using passive-mode data connections
#[derive(Debug)]
pub struct FtpClient {
    control: Option<ControlChannel<TcpStream>>,
    peer: Option<IpAddr>,
    timeouts: Timeouts,
    last_reply: Reply,
    features: Option<Vec<String>>,
}

impl Default for FtpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpClient {
    /// Create an unconnected client with default timeouts
    pub fn new() -> Self {
        Self {
            control: None,
            peer: None,
            timeouts: Timeouts::default(),
            last_reply: Reply::default(),
            features: None,
        }
    }

    /// Currently applied timeouts
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    async fn read_reply(&mut self, timeout: Duration) -> TransportResult<Reply> {
        let control = self
            .control
            .as_mut()
            .ok_or(TransportError::ConnectionClosed)?;

        let result = match tokio::time::timeout(timeout, control.read_reply()).await {
            Ok(result) => result,
            Err(_) => return Err(TransportError::Timeout("reply")),
        };

        match result {
            Ok(reply) => {
                tracing::debug!(code = reply.code, "reply: {}", reply);
                self.last_reply = reply.clone();
                if reply.is_service_not_available() {
                    tracing::debug!("server closed the session with 421");
                    self.control = None;
                    return Err(TransportError::ConnectionClosed);
                }
                Ok(reply)
            }
            Err(TransportError::ConnectionClosed) => {
                self.control = None;
                Err(TransportError::ConnectionClosed)
            }
            Err(e) => Err(e),
        }
    }

    async fn execute_with_timeout(
        &mut self,
        cmd: &Command,
        timeout: Duration,
    ) -> TransportResult<Reply> {
        let control = self
            .control
            .as_mut()
            .ok_or(TransportError::ConnectionClosed)?;

        tracing::debug!(command = %cmd, "sending command");
        crate::metrics::counters::command_sent(cmd.verb());

        if let Err(e) = control.send(cmd).await {
            if matches!(e, TransportError::ConnectionClosed) {
                self.control = None;
            }
            return Err(e);
        }
        self.read_reply(timeout).await
    }

    async fn execute(&mut self, cmd: &Command) -> TransportResult<Reply> {
        self.execute_with_timeout(cmd, self.timeouts.command).await
    }

    async fn execute_ok(&mut self, cmd: &Command) -> TransportResult<bool> {
        Ok(self.execute(cmd).await?.is_positive_completion())
    }

    /// PASV, connect the data socket, then issue `cmd`
    ///
    /// Returns `None` when the server refuses either step. The data socket is
    /// connected before `cmd` is sent because some servers only answer with
    /// 150 once the connection has been accepted.
    async fn open_data_connection(&mut self, cmd: Command) -> TransportResult<Option<TcpStream>> {
        let reply = self.execute(&Command::Pasv).await?;
        if reply.code != codes::ENTERING_PASSIVE_MODE {
            return Ok(None);
        }
        let addr = parse_pasv(&reply).ok_or_else(|| TransportError::MalformedReply(reply.to_string()))?;

        // Servers behind NAT often advertise an unroutable address
        let ip = match (IpAddr::V4(*addr.ip()), self.peer) {
            (ip, Some(peer)) if ip.is_unspecified() || (is_private(&ip) && !is_private(&peer)) => peer,
            (ip, _) => ip,
        };

        let data = with_timeout(
            self.timeouts.data,
            "data connection",
            TcpStream::connect(SocketAddr::new(ip, addr.port())),
        )
        .await?;

        let reply = self.execute(&cmd).await?;
        if !reply.is_preliminary() {
            return Ok(None);
        }
        Ok(Some(data))
    }

    async fn read_greeting(&mut self) -> TransportResult<Reply> {
        // 120 means "ready in n minutes"; the real greeting follows
        let mut reply = self.read_reply(self.timeouts.command).await?;
        while reply.is_preliminary() {
            reply = self.read_reply(self.timeouts.command).await?;
        }
        Ok(reply)
    }

    /// Read the reply that closes a data transfer
    async fn complete_transfer(&mut self) -> TransportResult<bool> {
        Ok(self.read_reply(self.timeouts.data).await?.is_positive_completion())
    }

    async fn read_listing(&mut self, cmd: Command) -> TransportResult<Option<String>> {
        let Some(mut data) = self.open_data_connection(cmd).await? else {
            return Ok(None);
        };

        let mut buf = Vec::new();
        with_timeout(self.timeouts.data, "listing", data.read_to_end(&mut buf)).await?;
        drop(data);

        if !self.complete_transfer().await? {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

async fn with_timeout<T, F>(duration: Duration, what: &'static str, fut: F) -> TransportResult<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(TransportError::Timeout(what)),
    }
}

fn optional_path(path: &str) -> Option<String> {
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

#[async_trait]
impl Transport for FtpClient {
    async fn connect(&mut self, host: &str, port: u16) -> TransportResult<Reply> {
        if let Some(mut old) = self.control.take() {
            let _ = old.shutdown().await;
        }
        self.features = None;

        let stream = with_timeout(
            self.timeouts.command,
            "connect",
            TcpStream::connect((host, port)),
        )
        .await?;
        stream.set_nodelay(true)?;
        self.peer = stream.peer_addr().ok().map(|addr| addr.ip());
        self.control = Some(ControlChannel::new(stream));

        match self.read_greeting().await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if let Some(mut control) = self.control.take() {
                    let _ = control.shutdown().await;
                }
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.features = None;
        if let Some(mut control) = self.control.take() {
            control.shutdown().await?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.control.is_some()
    }

    fn last_reply(&self) -> &Reply {
        &self.last_reply
    }

    fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    async fn login(&mut self, user: &str, password: &str) -> TransportResult<bool> {
        let reply = self.execute(&Command::User(user.to_string())).await?;
        if reply.is_positive_completion() {
            return Ok(true);
        }
        if reply.code != codes::NEED_PASSWORD {
            return Ok(false);
        }
        self.execute_ok(&Command::Pass(password.to_string())).await
    }

    async fn logout(&mut self) -> TransportResult<bool> {
        self.execute_ok(&Command::Quit).await
    }

    async fn noop(&mut self) -> TransportResult<bool> {
        let timeout = self.timeouts.keep_alive_reply;
        Ok(self
            .execute_with_timeout(&Command::Noop, timeout)
            .await?
            .is_positive_completion())
    }

    async fn set_binary_mode(&mut self) -> TransportResult<bool> {
        self.execute_ok(&Command::Type(TransferType::Binary)).await
    }

    async fn features(&mut self) -> TransportResult<Vec<String>> {
        if let Some(features) = &self.features {
            return Ok(features.clone());
        }
        let reply = self.execute(&Command::Feat).await?;
        let features = parse_features(&reply);
        self.features = Some(features.clone());
        Ok(features)
    }

    async fn change_working_directory(&mut self, path: &str) -> TransportResult<bool> {
        self.execute_ok(&Command::Cwd(path.to_string())).await
    }

    async fn change_to_parent_directory(&mut self) -> TransportResult<bool> {
        self.execute_ok(&Command::Cdup).await
    }

    async fn print_working_directory(&mut self) -> TransportResult<Option<String>> {
        let reply = self.execute(&Command::Pwd).await?;
        Ok(parse_pwd(&reply))
    }

    async fn list(&mut self, path: &str) -> TransportResult<Vec<RemoteFile>> {
        let text = self.read_listing(Command::List(optional_path(path))).await?;
        Ok(text.map(|t| parse_list(&t)).unwrap_or_default())
    }

    async fn machine_list_directory(&mut self, path: &str) -> TransportResult<Vec<RemoteFile>> {
        let text = self.read_listing(Command::Mlsd(optional_path(path))).await?;
        Ok(text.map(|t| parse_mlsd(&t)).unwrap_or_default())
    }

    async fn machine_list_file(&mut self, path: &str) -> TransportResult<Option<RemoteFile>> {
        let reply = self.execute(&Command::Mlst(optional_path(path))).await?;
        if !reply.is_positive_completion() || reply.lines.len() < 3 {
            return Ok(None);
        }
        // 250-Listing path / <facts> / 250 End
        Ok(reply.lines[1..reply.lines.len() - 1]
            .iter()
            .find_map(|line| parse_mlsx_line(line)))
    }

    async fn make_directory(&mut self, path: &str) -> TransportResult<bool> {
        self.execute_ok(&Command::Mkd(path.to_string())).await
    }

    async fn remove_directory(&mut self, path: &str) -> TransportResult<bool> {
        self.execute_ok(&Command::Rmd(path.to_string())).await
    }

    async fn delete_file(&mut self, path: &str) -> TransportResult<bool> {
        self.execute_ok(&Command::Dele(path.to_string())).await
    }

    async fn rename(&mut self, from: &str, to: &str) -> TransportResult<bool> {
        let reply = self.execute(&Command::Rnfr(from.to_string())).await?;
        if reply.code != codes::FILE_ACTION_PENDING {
            return Ok(false);
        }
        self.execute_ok(&Command::Rnto(to.to_string())).await
    }

    async fn status(&mut self, path: Option<&str>) -> TransportResult<Option<String>> {
        let reply = self.execute(&Command::Stat(path.map(str::to_string))).await?;
        if !reply.is_positive_completion() {
            return Ok(None);
        }
        Ok(Some(reply.text()))
    }

    async fn size(&mut self, path: &str) -> TransportResult<Option<u64>> {
        let reply = self.execute(&Command::Size(path.to_string())).await?;
        Ok(parse_size(&reply))
    }

    async fn modification_time(&mut self, path: &str) -> TransportResult<Option<String>> {
        let reply = self.execute(&Command::Mdtm(path.to_string())).await?;
        if reply.code != codes::FILE_STATUS {
            return Ok(None);
        }
        Ok(Some(reply.text().trim().to_string()))
    }

    async fn store(
        &mut self,
        remote: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> TransportResult<bool> {
        let Some(mut data) = self
            .open_data_connection(Command::Stor(remote.to_string()))
            .await?
        else {
            return Ok(false);
        };

        let started = Instant::now();
        let bytes = tokio::io::copy(&mut *source, &mut data)
            .await
            .map_err(|source| TransportError::CopyStream { source })?;
        data.shutdown()
            .await
            .map_err(|source| TransportError::CopyStream { source })?;
        drop(data);

        crate::metrics::histograms::transfer_bytes("upload", bytes);
        crate::metrics::histograms::transfer_duration("upload", started.elapsed().as_millis() as u64);
        self.complete_transfer().await
    }

    async fn retrieve(
        &mut self,
        remote: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> TransportResult<bool> {
        let Some(mut data) = self
            .open_data_connection(Command::Retr(remote.to_string()))
            .await?
        else {
            return Ok(false);
        };

        let started = Instant::now();
        let bytes = tokio::io::copy(&mut data, &mut *sink)
            .await
            .map_err(|source| TransportError::CopyStream { source })?;
        sink.flush()
            .await
            .map_err(|source| TransportError::CopyStream { source })?;
        drop(data);

        crate::metrics::histograms::transfer_bytes("download", bytes);
        crate::metrics::histograms::transfer_duration("download", started.elapsed().as_millis() as u64);
        self.complete_transfer().await
    }
}
