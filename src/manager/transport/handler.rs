//! russh client handler.
//!
//! `SshClientHandler` accepts every server host key, like
//! `StrictHostKeyChecking=no` in OpenSSH.

use russh::{client, keys};

pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}
