//! SSH adapter (russh).
//!
//! Implements the `hwb-core` RemoteExecutor: one fresh session per command,
//! password authentication, stdout/stderr captured until the channel closes.

use std::sync::Arc;

use async_trait::async_trait;
use russh::{
    client,
    keys::ssh_key::{HashAlg, PublicKey},
    ChannelMsg, Disconnect,
};
use tokio::time::timeout;
use tracing::{debug, warn};

use hwb_core::{config::SshConfig, errors::ExecError, ports::RemoteExecutor};

const STDERR_EXT: u32 = 1;

#[derive(Clone)]
pub struct SshExecutor {
    cfg: SshConfig,
}

impl SshExecutor {
    pub fn new(cfg: SshConfig) -> Self {
        Self { cfg }
    }

    async fn connect(&self) -> Result<client::Handle<AcceptAnyHostKey>, ExecError> {
        // The whole call is bounded in `execute`, so no inactivity timeout here.
        let config = Arc::new(client::Config::default());

        let mut session = client::connect(
            config,
            (self.cfg.host.as_str(), self.cfg.port),
            AcceptAnyHostKey,
        )
        .await
        .map_err(|e| ExecError::Connect(e.to_string()))?;

        let auth = session
            .authenticate_password(self.cfg.user.clone(), self.cfg.password.clone())
            .await
            .map_err(|e| ExecError::Connect(e.to_string()))?;
        if !auth.success() {
            close(&session).await;
            return Err(ExecError::Auth);
        }

        Ok(session)
    }

    async fn run(&self, command: &str) -> Result<String, ExecError> {
        let session = self.connect().await?;
        let result = exec_on(&session, command).await;
        close(&session).await;

        let (stdout, stderr) = result?;
        collect_output(&stdout, &stderr)
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, command: &str) -> Result<String, ExecError> {
        debug!(host = %self.cfg.host, port = self.cfg.port, "opening ssh session");
        match timeout(self.cfg.timeout, self.run(command)).await {
            Ok(res) => res,
            Err(_) => {
                // Dropping the session future tears down the connection.
                warn!(host = %self.cfg.host, "ssh command timed out");
                Err(ExecError::Timeout(self.cfg.timeout))
            }
        }
    }
}

/// Accepts every host key, logging its fingerprint.
pub struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting ssh host key"
        );
        Ok(true)
    }
}

async fn exec_on(
    session: &client::Handle<AcceptAnyHostKey>,
    command: &str,
) -> Result<(Vec<u8>, Vec<u8>), ExecError> {
    let mut channel = session
        .channel_open_session()
        .await
        .map_err(|e| ExecError::Channel(e.to_string()))?;
    channel
        .exec(true, command)
        .await
        .map_err(|e| ExecError::Channel(e.to_string()))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    // `wait` yields `None` once the server closes the channel.
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_EXT => {
                stderr.extend_from_slice(data)
            }
            ChannelMsg::ExitStatus { exit_status } => {
                debug!(exit_status, "remote command exited");
            }
            _ => {}
        }
    }

    Ok((stdout, stderr))
}

async fn close(session: &client::Handle<AcceptAnyHostKey>) {
    if let Err(e) = session
        .disconnect(Disconnect::ByApplication, "", "English")
        .await
    {
        debug!("ssh disconnect failed: {e}");
    }
}

/// Non-empty stderr wins over stdout.
fn collect_output(stdout: &[u8], stderr: &[u8]) -> Result<String, ExecError> {
    if !stderr.is_empty() {
        return Err(ExecError::Stderr(
            String::from_utf8_lossy(stderr).into_owned(),
        ));
    }
    Ok(String::from_utf8_lossy(stdout).into_owned())
}
