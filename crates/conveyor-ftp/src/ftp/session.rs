//! The FTP protocol driver: one control-connection session per upload
//! attempt.
//!
//! Lifecycle: connect → (AUTH TLS upgrade) → (PBSZ/PROT) → login →
//! configure → per-file transfers → close. The session is created at
//! attempt start and consumed by [`FtpSession::close`] at attempt end;
//! there is no "sometimes connected" state to guard.

use std::time::{Duration, Instant};

use conveyor_core::{TaskContext, UploadFile};
use log::{debug, info, warn};
use tokio::io::AsyncReadExt;
use tokio::time::timeout;

use crate::ftp::connection;
use crate::ftp::data::{self, DataStream};
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::paths;
use crate::ftp::protocol::FtpCodec;
use crate::ftp::tls;
use crate::ftp::types::{
    CopyStatus, DataChannelMode, FtpResponse, FtpSecurityMode, FtpTransferConfig,
    PROPERTY_PERMISSIONS, PROPERTY_REMOTE_PATH,
};

/// Streaming copy chunk for the data channel (64 KiB).
const DEFAULT_CHUNK: usize = 65_536;

/// Grace period for draining keepalive replies that queued up behind
/// the transfer completion reply.
const NOOP_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// A connected FTP session.
pub struct FtpSession {
    codec: FtpCodec,
    host: String,
    port: u16,
    security: FtpSecurityMode,
    data_channel_mode: DataChannelMode,
    accept_invalid_certs: bool,
    socket_timeout: Duration,
    /// Half the socket timeout: NOOPs go out at this interval during a
    /// long store so the idle control socket cannot time out.
    keepalive_interval: Duration,
    base_working_dir: String,
    alive: bool,
}

impl FtpSession {
    /// Establish a session: connect, secure, authenticate, configure,
    /// and capture the base working directory.
    pub async fn connect(config: &FtpTransferConfig) -> FtpResult<Self> {
        if config.host.is_empty() {
            return Err(FtpError::invalid_config("host must not be empty"));
        }

        let socket_timeout = Duration::from_secs(config.socket_timeout_sec);
        let (mut codec, banner) = connection::connect(config).await?;
        debug!(
            "connected to {}:{}: {}",
            config.host,
            config.port,
            banner.text()
        );

        if config.security == FtpSecurityMode::Explicit {
            let resp = exchange_on(&mut codec, socket_timeout, "AUTH TLS").await?;
            if !resp.is_success() {
                return Err(
                    FtpError::tls_failed(format!("AUTH TLS rejected: {}", resp.text()))
                        .with_code(resp.code),
                );
            }
            codec = tls::upgrade_to_tls(codec, &config.host, config.accept_invalid_certs).await?;
        }

        if config.security != FtpSecurityMode::None {
            // RFC 4217: protection level before any data transfer.
            expect_completion_on(&mut codec, socket_timeout, "PBSZ 0").await?;
            expect_completion_on(&mut codec, socket_timeout, "PROT P").await?;
        }

        let mut session = Self {
            codec,
            host: config.host.clone(),
            port: config.port,
            security: config.security,
            data_channel_mode: config.data_channel_mode,
            accept_invalid_certs: config.accept_invalid_certs,
            socket_timeout,
            keepalive_interval: socket_timeout / 2,
            base_working_dir: String::new(),
            alive: true,
        };

        session.login(config).await?;
        session.configure(config).await?;

        session.base_working_dir = session.pwd().await?;
        debug!(
            "FTP default working directory is {}",
            session.base_working_dir
        );
        Ok(session)
    }

    /// Login only when both username and password are configured;
    /// anonymous and pre-authenticated servers skip it.
    async fn login(&mut self, config: &FtpTransferConfig) -> FtpResult<()> {
        let (user, pass) = match (&config.username, &config.password) {
            (Some(u), Some(p)) => (u.clone(), p.clone()),
            _ => {
                info!("skipping login, username or password not provided");
                return Ok(());
            }
        };

        let resp = self.command(&format!("USER {}", user)).await?;
        if resp.is_intermediate() {
            let resp = self.command(&format!("PASS {}", pass)).await?;
            if !resp.is_completion() {
                return Err(
                    FtpError::auth_failed(format!("login failed: {}", resp.text()))
                        .with_code(resp.code),
                );
            }
        } else if !resp.is_completion() {
            return Err(
                FtpError::auth_failed(format!("USER rejected: {}", resp.text()))
                    .with_code(resp.code),
            );
        }
        debug!("logged in as {}", user);
        Ok(())
    }

    /// Binary type, optional compressed mode.
    async fn configure(&mut self, config: &FtpTransferConfig) -> FtpResult<()> {
        self.expect_completion("TYPE I").await?;
        if config.compressed_transfer {
            self.expect_completion("MODE C").await?;
        }
        debug!(
            "socket timeout {}s, control keepalive every {}s",
            self.socket_timeout.as_secs(),
            self.keepalive_interval.as_secs()
        );
        Ok(())
    }

    pub fn base_working_dir(&self) -> &str {
        &self.base_working_dir
    }

    async fn pwd(&mut self) -> FtpResult<String> {
        let resp = self.expect_completion("PWD").await?;
        parse_pwd(&resp.text())
    }

    // ─── Per-file transfer ───────────────────────────────────────

    /// Upload one file: resolve its remote directory and name, create
    /// missing directories, store the bytes with per-chunk progress,
    /// apply permissions (best effort) and restore the working
    /// directory.
    pub async fn transfer_file(
        &mut self,
        file: &UploadFile,
        created_dir_permissions: Option<&str>,
        ctx: &mut TaskContext,
    ) -> FtpResult<CopyStatus> {
        let remote_path = file
            .property(PROPERTY_REMOTE_PATH)
            .ok_or_else(|| {
                FtpError::invalid_config(format!(
                    "file {} has no {} property",
                    file.name(),
                    PROPERTY_REMOTE_PATH
                ))
            })?
            .to_string();
        debug!("starting FTP upload of {} to {}", file.name(), remote_path);

        // Navigate from the captured base, not from wherever the
        // previous file left the working directory.
        let base = self.base_working_dir.clone();
        let resp = self.command(&format!("CWD {}", base)).await?;
        if !resp.is_success() {
            return Err(FtpError::remote_directory(
                base,
                format!("cannot enter base working directory: {}", resp.text()),
            )
            .with_code(resp.code));
        }

        let relative = remote_path
            .strip_prefix(&base)
            .unwrap_or(&remote_path)
            .to_string();
        self.make_directories(&relative, created_dir_permissions)
            .await?;

        let remote_name = paths::remote_file_name(&remote_path, file.name()).to_string();
        let status = self.store(&remote_name, file, ctx).await?;

        if status == CopyStatus::Completed {
            if let Some(perms) = file.property(PROPERTY_PERMISSIONS) {
                let perms = perms.to_string();
                self.apply_permissions(&remote_name, &perms).await;
            }
            self.restore_working_dir().await;
        }
        Ok(status)
    }

    /// Walk the directory chain: enter each segment, creating it (with
    /// optional permissions) when entering fails. Failure to create is
    /// fatal — the remote destination is unreachable.
    async fn make_directories(
        &mut self,
        dir_path: &str,
        permissions: Option<&str>,
    ) -> FtpResult<()> {
        for segment in paths::directory_segments(dir_path) {
            let cwd = self.command(&format!("CWD {}", segment)).await?;
            if cwd.is_success() {
                continue;
            }

            let mkd = self.command(&format!("MKD {}", segment)).await?;
            if !mkd.is_success() {
                return Err(FtpError::remote_directory(
                    segment,
                    format!("unable to create remote directory: {}", mkd.text()),
                )
                .with_code(mkd.code));
            }
            debug!("created remote directory {}", segment);

            if let Some(perms) = permissions {
                self.apply_permissions(segment, perms).await;
            }

            let reenter = self.command(&format!("CWD {}", segment)).await?;
            if !reenter.is_success() {
                return Err(FtpError::remote_directory(
                    segment,
                    format!("unable to enter created directory: {}", reenter.text()),
                )
                .with_code(reenter.code));
            }
        }
        Ok(())
    }

    /// STOR the file's bytes through a fresh data channel, advancing
    /// the task's byte counter per chunk. Cancellation observed in the
    /// copy loop abandons the connection — FTP has no finer-grained
    /// mid-stream cancellation primitive.
    async fn store(
        &mut self,
        remote_name: &str,
        file: &UploadFile,
        ctx: &mut TaskContext,
    ) -> FtpResult<CopyStatus> {
        let mut data = self.open_data_channel().await?;

        let resp = self.command(&format!("STOR {}", remote_name)).await?;
        if !resp.is_preliminary() && !resp.is_success() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }

        let mut reader = file.source().open().await?;
        let mut buf = vec![0u8; DEFAULT_CHUNK];
        let mut pending_noops: u32 = 0;
        let mut last_noop = Instant::now();

        loop {
            if !ctx.should_continue() {
                info!(
                    "cancellation requested, aborting transfer of {}",
                    remote_name
                );
                self.alive = false;
                return Ok(CopyStatus::Aborted);
            }

            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            timeout(self.socket_timeout, data.write_all(&buf[..n]))
                .await
                .map_err(|_| FtpError::timeout("data write timed out"))??;
            ctx.advance(n as u64);

            if !self.keepalive_interval.is_zero() && last_noop.elapsed() >= self.keepalive_interval
            {
                // Keep the idle control socket warm; replies are
                // reconciled together with the completion reply.
                self.codec.send_command("NOOP").await?;
                pending_noops += 1;
                last_noop = Instant::now();
            }
        }

        timeout(self.socket_timeout, data.finish())
            .await
            .map_err(|_| FtpError::timeout("data shutdown timed out"))??;
        drop(data);

        let done = self.collect_completion(pending_noops).await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }
        Ok(CopyStatus::Completed)
    }

    /// Read the transfer completion reply, filtering out the `200`
    /// replies to keepalive NOOPs sent during the transfer (servers
    /// may deliver them before or after the completion reply).
    async fn collect_completion(&mut self, pending_noops: u32) -> FtpResult<FtpResponse> {
        let mut remaining = pending_noops;
        let completion = loop {
            let resp = self.read_reply().await?;
            if resp.code == 200 && remaining > 0 {
                remaining -= 1;
                continue;
            }
            break resp;
        };

        while remaining > 0 {
            match timeout(NOOP_DRAIN_TIMEOUT, self.codec.read_response()).await {
                Ok(reply) => {
                    reply?;
                    remaining -= 1;
                }
                Err(_) => break,
            }
        }
        Ok(completion)
    }

    /// Best-effort `SITE CHMOD`. A refusal or I/O error is logged and
    /// never fails the transfer.
    async fn apply_permissions(&mut self, remote_name: &str, permissions: &str) {
        if permissions.is_empty() {
            return;
        }
        match self
            .command(&format!("SITE CHMOD {} {}", permissions, remote_name))
            .await
        {
            Ok(resp) if resp.is_success() => {
                debug!("permissions for {} set to {}", remote_name, permissions);
            }
            Ok(resp) => {
                warn!(
                    "cannot set permissions for {} to {}: {}. Check whether the FTP user may change permissions",
                    remote_name,
                    permissions,
                    resp.text()
                );
            }
            Err(e) => {
                warn!(
                    "cannot set permissions for {} to {}: {}",
                    remote_name, permissions, e
                );
            }
        }
    }

    /// Go back to the base working directory after a file. Failure is
    /// logged only: the next file re-derives its path from the base
    /// anyway.
    async fn restore_working_dir(&mut self) {
        let base = self.base_working_dir.clone();
        match self.command(&format!("CWD {}", base)).await {
            Ok(resp) if resp.is_success() => {}
            Ok(resp) => info!(
                "cannot change working directory back to {}: {}",
                base,
                resp.text()
            ),
            Err(e) => info!("cannot change working directory back to {}: {}", base, e),
        }
    }

    // ─── Data channel ────────────────────────────────────────────

    async fn open_data_channel(&mut self) -> FtpResult<DataStream> {
        let tcp = match self.data_channel_mode {
            DataChannelMode::Passive => {
                let resp = self.expect_completion("PASV").await?;
                let addr = data::parse_pasv_response(&resp.text())?;
                data::connect_data(&addr.to_string(), self.socket_timeout).await?
            }
            DataChannelMode::ExtendedPassive => {
                let resp = self.expect_completion("EPSV").await?;
                let port = data::parse_epsv_response(&resp.text())?;
                data::connect_data(&format!("{}:{}", self.host, port), self.socket_timeout).await?
            }
        };

        // PROT P: the data channel is TLS-wrapped whenever the control
        // channel is secured.
        if self.security != FtpSecurityMode::None {
            let tls = tls::wrap_data_stream(tcp, &self.host, self.accept_invalid_certs).await?;
            Ok(DataStream::Tls(tls))
        } else {
            Ok(DataStream::Plain(tcp))
        }
    }

    // ─── Teardown ────────────────────────────────────────────────

    /// Best-effort logout and disconnect. Errors here are logged and
    /// swallowed so they never mask the transfer's real outcome.
    pub async fn close(mut self) {
        if !self.alive {
            debug!(
                "session to {}:{} was aborted, dropping connection",
                self.host, self.port
            );
            return;
        }
        debug!(
            "logout and disconnect from FTP server {}:{}",
            self.host, self.port
        );
        if let Err(e) = self.command("QUIT").await {
            info!(
                "error while closing FTP connection to {}:{}: {}",
                self.host, self.port, e
            );
        }
    }

    // ─── Control-channel helpers ─────────────────────────────────

    async fn command(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        exchange_on(&mut self.codec, self.socket_timeout, cmd).await
    }

    async fn expect_completion(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        expect_completion_on(&mut self.codec, self.socket_timeout, cmd).await
    }

    async fn read_reply(&mut self) -> FtpResult<FtpResponse> {
        read_reply_on(&mut self.codec, self.socket_timeout).await
    }
}

// ─── Free helpers (also used before the session exists) ──────────────

async fn exchange_on(codec: &mut FtpCodec, limit: Duration, cmd: &str) -> FtpResult<FtpResponse> {
    codec.send_command(cmd).await?;
    read_reply_on(codec, limit).await
}

async fn read_reply_on(codec: &mut FtpCodec, limit: Duration) -> FtpResult<FtpResponse> {
    timeout(limit, codec.read_response())
        .await
        .map_err(|_| FtpError::timeout("no reply from server within the socket timeout"))?
}

async fn expect_completion_on(
    codec: &mut FtpCodec,
    limit: Duration,
    cmd: &str,
) -> FtpResult<FtpResponse> {
    let resp = exchange_on(codec, limit, cmd).await?;
    if !resp.is_completion() {
        return Err(FtpError::from_reply(resp.code, &resp.text()));
    }
    Ok(resp)
}

/// Parse `257 "/some/path"` into the path string.
fn parse_pwd(text: &str) -> FtpResult<String> {
    if let Some(start) = text.find('"') {
        if let Some(end) = text[start + 1..].find('"') {
            return Ok(text[start + 1..start + 1 + end].to_string());
        }
    }
    Err(FtpError::protocol_error(format!(
        "cannot parse PWD reply: {}",
        text
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_pwd_replies() {
        assert_eq!(parse_pwd("257 \"/\" is current directory").unwrap(), "/");
        assert_eq!(parse_pwd("257 \"/home/user\"").unwrap(), "/home/user");
        assert!(parse_pwd("257 no quotes here").is_err());
    }
}
