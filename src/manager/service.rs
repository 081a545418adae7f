//! `SshManager`: the entry point callers hold.
//!
//! Every operation resolves a verified session through the
//! [`ConnectionCache`] and then forwards one call to it. Nothing here keeps a
//! session between calls.

use std::path::Path;
use std::sync::Arc;

use russh::keys::PrivateKey;
use tracing::info;

use crate::manager::async_command::RunningCommand;
use crate::manager::cache::ConnectionCache;
use crate::manager::config::ManagerSettings;
use crate::manager::credentials::{CredentialContext, Credentials};
use crate::manager::error::Result;
use crate::manager::executor::{ExecOptions, check_output};
use crate::manager::storage::SessionHandle;
use crate::manager::transfer;
use crate::manager::transport::{Connector, OpenMode, RemoteFile, RusshConnector};
use crate::manager::types::{ExecutionResult, HostKey, RawOutput};

/// Connection-pooling façade over remote command execution and file transfer.
///
/// Construct one per process, call [`initialize`](Self::initialize) once, then
/// share it (for example behind an `Arc`) with every caller.
pub struct SshManager {
    cache: ConnectionCache,
}

impl SshManager {
    pub fn new(connector: Arc<dyn Connector>, settings: ManagerSettings) -> Self {
        Self {
            cache: ConnectionCache::new(connector, settings),
        }
    }

    /// Manager backed by real SSH connections.
    pub fn russh(settings: ManagerSettings) -> Self {
        Self::new(Arc::new(RusshConnector::new(settings.clone())), settings)
    }

    /// Record the admin address and credentials. Fails if called twice.
    pub fn initialize(&self, admin_ip: impl Into<String>, credentials: Credentials) -> Result<()> {
        let context = CredentialContext::new(admin_ip, credentials);
        let admin_ip = context.admin_ip.clone();
        self.cache.initialize(context)?;
        info!("SSH manager initialized, admin node {}", admin_ip);
        Ok(())
    }

    pub fn cache(&self) -> &ConnectionCache {
        &self.cache
    }

    pub async fn get_connection(&self, address: &str, port: u16) -> Result<SessionHandle> {
        self.cache.get_connection(address, port).await
    }

    /// Replace the cached session with one using explicit credentials.
    pub async fn update_connection(
        &self,
        address: &str,
        port: u16,
        login: &str,
        password: Option<&str>,
        keys: Option<Vec<Arc<PrivateKey>>>,
    ) -> Result<()> {
        self.cache
            .update_connection(address, port, login, password, keys)
            .await
    }

    pub async fn close_all(&self) {
        self.cache.close_all().await
    }

    pub async fn connection_keys(&self) -> Vec<HostKey> {
        self.cache.connection_keys().await
    }

    /// Run `command` and return its raw output, whatever the exit code.
    pub async fn execute(&self, address: &str, command: &str, port: u16) -> Result<RawOutput> {
        let session = self.get_connection(address, port).await?;
        session.execute(command).await
    }

    /// Run `command`, enforce the expected exit codes and decode stdout.
    ///
    /// # Errors
    ///
    /// - [`UnexpectedExitCode`](crate::manager::Error::UnexpectedExitCode) when
    ///   the exit code is not expected and `raise_on_mismatch` is set.
    /// - [`Json`](crate::manager::Error::Json) or
    ///   [`Yaml`](crate::manager::Error::Yaml) when decoding fails, regardless
    ///   of `raise_on_mismatch`.
    pub async fn execute_checked(
        &self,
        address: &str,
        command: &str,
        port: u16,
        options: &ExecOptions,
    ) -> Result<ExecutionResult> {
        let raw = self.execute(address, command, port).await?;
        check_output(address, command, raw, options)
    }

    /// [`execute_checked`](Self::execute_checked) with default options.
    pub async fn check_call(
        &self,
        address: &str,
        command: &str,
        port: u16,
    ) -> Result<ExecutionResult> {
        self.execute_checked(address, command, port, &ExecOptions::default())
            .await
    }

    /// Start `command` without waiting for it.
    pub async fn execute_async(
        &self,
        address: &str,
        command: &str,
        port: u16,
    ) -> Result<RunningCommand> {
        let session = self.get_connection(address, port).await?;
        session.execute_async(command).await
    }

    pub async fn open_on_remote(
        &self,
        address: &str,
        path: &str,
        mode: OpenMode,
        port: u16,
    ) -> Result<Box<dyn RemoteFile>> {
        let session = self.get_connection(address, port).await?;
        session.open(path, mode).await
    }

    pub async fn upload_to_remote(
        &self,
        address: &str,
        source: &Path,
        target: &str,
        port: u16,
    ) -> Result<()> {
        let session = self.get_connection(address, port).await?;
        session.upload(source, target).await
    }

    pub async fn download_from_remote(
        &self,
        address: &str,
        source: &str,
        destination: &Path,
        port: u16,
    ) -> Result<()> {
        let session = self.get_connection(address, port).await?;
        session.download(source, destination).await
    }

    pub async fn exists_on_remote(&self, address: &str, path: &str, port: u16) -> Result<bool> {
        let session = self.get_connection(address, port).await?;
        session.exists(path).await
    }

    pub async fn isdir_on_remote(&self, address: &str, path: &str, port: u16) -> Result<bool> {
        let session = self.get_connection(address, port).await?;
        session.is_dir(path).await
    }

    pub async fn isfile_on_remote(&self, address: &str, path: &str, port: u16) -> Result<bool> {
        let session = self.get_connection(address, port).await?;
        session.is_file(path).await
    }

    pub async fn mkdir_on_remote(&self, address: &str, path: &str, port: u16) -> Result<()> {
        let session = self.get_connection(address, port).await?;
        session.mkdir(path).await
    }

    pub async fn rm_rf_on_remote(&self, address: &str, path: &str, port: u16) -> Result<()> {
        let session = self.get_connection(address, port).await?;
        session.rm_rf(path).await
    }

    /// Upload the files under `source` whose local path matches `pattern`.
    /// Returns how many files were uploaded.
    pub async fn conditional_upload(
        &self,
        address: &str,
        source: &str,
        target: &str,
        port: u16,
        pattern: &str,
        clean_target: bool,
    ) -> Result<usize> {
        let session = self.get_connection(address, port).await?;
        transfer::conditional_upload(session.as_ref(), source, target, pattern, clean_target).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::manager::error::Error;
    use crate::manager::testing::{ADMIN_IP, FakeConnector, FakeWorld, fast_settings, test_credentials};

    fn manager(world: &Arc<FakeWorld>) -> SshManager {
        let manager = SshManager::new(Arc::new(FakeConnector::new(world.clone())), fast_settings());
        manager.initialize(ADMIN_IP, test_credentials()).unwrap();
        manager
    }

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    mod lifecycle {
        use super::*;

        #[tokio::test]
        async fn test_calls_before_initialize_fail() {
            let world = FakeWorld::new();
            let manager = SshManager::new(Arc::new(FakeConnector::new(world.clone())), fast_settings());

            let err = manager.execute(ADMIN_IP, "uptime", 22).await.unwrap_err();

            assert!(matches!(err, Error::NotInitialized));
            assert!(world.connects().is_empty());
        }

        #[test]
        fn test_initialize_twice_fails_loudly() {
            let world = FakeWorld::new();
            let manager = manager(&world);

            let err = manager.initialize("10.0.0.9", test_credentials()).unwrap_err();

            assert!(matches!(err, Error::AlreadyInitialized));
            assert_eq!(manager.cache().context().unwrap().admin_ip, ADMIN_IP);
        }

        #[test]
        fn test_russh_manager_starts_uninitialized() {
            let manager = SshManager::russh(ManagerSettings::default());
            assert!(manager.cache().context().is_err());
        }
    }

    mod execution {
        use super::*;

        #[tokio::test]
        async fn test_execute_returns_raw_output() {
            let world = FakeWorld::new();
            world.respond("hostname", RawOutput::new(0, lines(&["admin\n"]), vec![]));
            let manager = manager(&world);

            let raw = manager.execute(ADMIN_IP, "hostname", 22).await.unwrap();

            assert_eq!(raw.stdout, vec!["admin\n"]);
            assert_eq!(world.executed(), vec![(HostKey::new(ADMIN_IP, 22), "hostname".to_string())]);
        }

        #[tokio::test]
        async fn test_checked_success_derives_text() {
            let world = FakeWorld::new();
            world.respond(
                "ls /etc",
                RawOutput::new(0, lines(&["hosts\n", "passwd\n"]), lines(&[" note \n"])),
            );
            let manager = manager(&world);

            let result = manager.check_call(ADMIN_IP, "ls /etc", 22).await.unwrap();

            assert_eq!(result.stdout_str, "hosts\npasswd");
            assert_eq!(result.stdout_len, 2);
            assert_eq!(result.stderr_str, "note");
            assert_eq!(result.stderr_len, 1);
        }

        #[tokio::test]
        async fn test_checked_mismatch_raises() {
            let world = FakeWorld::new();
            world.respond("false", RawOutput::new(1, vec![], vec![]));
            let manager = manager(&world);

            let err = manager
                .execute_checked(ADMIN_IP, "false", 22, &ExecOptions::default())
                .await
                .unwrap_err();

            let rendered = err.to_string();
            assert!(rendered.contains("'false'"));
            assert!(rendered.contains("exit code 1"));
        }

        #[tokio::test]
        async fn test_checked_mismatch_without_raise() {
            let world = FakeWorld::new();
            world.respond("false", RawOutput::new(1, vec![], vec![]));
            let manager = manager(&world);

            let result = manager
                .execute_checked(
                    ADMIN_IP,
                    "false",
                    22,
                    &ExecOptions::default().with_raise_on_mismatch(false),
                )
                .await
                .unwrap();

            assert_eq!(result.exit_code, 1);
        }

        #[tokio::test]
        async fn test_conflicting_flags_make_no_remote_call() {
            let world = FakeWorld::new();
            let manager = manager(&world);

            let result = async {
                let options = ExecOptions::from_flags(true, true)?;
                manager.execute_checked(ADMIN_IP, "echo {}", 22, &options).await
            }
            .await;

            assert!(matches!(result, Err(Error::InvalidArgument(_))));
            assert!(world.connects().is_empty());
            assert!(world.executed().is_empty());
        }

        #[tokio::test]
        async fn test_json_stdout_is_decoded() {
            let world = FakeWorld::new();
            world.respond("echo", RawOutput::new(0, lines(&["{\"a\":1}\n"]), vec![]));
            let manager = manager(&world);

            let result = manager
                .execute_checked(ADMIN_IP, "echo", 22, &ExecOptions::from_flags(true, false).unwrap())
                .await
                .unwrap();

            assert_eq!(
                result.decoded.unwrap().as_json(),
                Some(&serde_json::json!({"a": 1}))
            );
        }

        #[tokio::test]
        async fn test_execute_async_returns_live_handle() {
            let world = FakeWorld::new();
            world.respond("sleep 1; echo done", RawOutput::new(0, lines(&["done\n"]), vec![]));
            let manager = manager(&world);

            let mut running = manager
                .execute_async(ADMIN_IP, "sleep 1; echo done", 22)
                .await
                .unwrap();
            let output = running.wait().await.unwrap();

            assert_eq!(running.command, "sleep 1; echo done");
            assert_eq!(output.stdout, vec!["done\n"]);
        }
    }

    mod delegation {
        use super::*;

        #[tokio::test]
        async fn test_path_queries() {
            let world = FakeWorld::new();
            world.put_dir("/etc");
            world.put_file("/etc/hosts", "127.0.0.1 localhost\n");
            let manager = manager(&world);

            assert!(manager.exists_on_remote(ADMIN_IP, "/etc/hosts", 22).await.unwrap());
            assert!(manager.isfile_on_remote(ADMIN_IP, "/etc/hosts", 22).await.unwrap());
            assert!(!manager.isdir_on_remote(ADMIN_IP, "/etc/hosts", 22).await.unwrap());
            assert!(manager.isdir_on_remote(ADMIN_IP, "/etc", 22).await.unwrap());
            assert!(!manager.exists_on_remote(ADMIN_IP, "/nope", 22).await.unwrap());
        }

        #[tokio::test]
        async fn test_mkdir_and_rm_rf() {
            let world = FakeWorld::new();
            let manager = manager(&world);

            manager.mkdir_on_remote(ADMIN_IP, "/var/tmp/x/y", 22).await.unwrap();
            assert!(world.has_dir("/var/tmp/x/y"));

            manager.rm_rf_on_remote(ADMIN_IP, "/var/tmp/x", 22).await.unwrap();
            assert!(!world.has_dir("/var/tmp/x"));
            assert!(!world.has_dir("/var/tmp/x/y"));
        }

        #[tokio::test]
        async fn test_open_reads_remote_file() {
            let world = FakeWorld::new();
            world.put_file("/etc/fuel/version.yaml", "release: 9.0\n");
            let manager = manager(&world);

            let mut file = manager
                .open_on_remote(ADMIN_IP, "/etc/fuel/version.yaml", OpenMode::Read, 22)
                .await
                .unwrap();
            let mut text = String::new();
            file.read_to_string(&mut text).await.unwrap();

            assert_eq!(text, "release: 9.0\n");
        }

        #[tokio::test]
        async fn test_upload_then_download() {
            let world = FakeWorld::new();
            let manager = manager(&world);
            let dir = tempfile::tempdir().unwrap();
            let local = dir.path().join("config.yaml");
            std::fs::write(&local, "debug: true\n").unwrap();

            manager
                .upload_to_remote(ADMIN_IP, &local, "/tmp/config.yaml", 22)
                .await
                .unwrap();
            let copy = dir.path().join("copy.yaml");
            manager
                .download_from_remote(ADMIN_IP, "/tmp/config.yaml", &copy, 22)
                .await
                .unwrap();

            assert_eq!(std::fs::read_to_string(copy).unwrap(), "debug: true\n");
        }

        #[tokio::test]
        async fn test_conditional_upload_through_cache() {
            let world = FakeWorld::new();
            let manager = manager(&world);
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("a.txt"), "a").unwrap();
            std::fs::write(dir.path().join("b.log"), "b").unwrap();

            let count = manager
                .conditional_upload(
                    ADMIN_IP,
                    &dir.path().to_string_lossy(),
                    "/tmp/drop",
                    22,
                    r".*\.txt$",
                    false,
                )
                .await
                .unwrap();

            assert_eq!(count, 1);
            assert!(world.file("/tmp/drop/a.txt").is_some());
        }
    }

    mod connections {
        use super::*;

        #[tokio::test]
        async fn test_update_then_close_all() {
            let world = FakeWorld::new();
            let manager = manager(&world);
            manager.execute(ADMIN_IP, "true", 22).await.unwrap();

            manager
                .update_connection(ADMIN_IP, 22, "root", Some("r00tme"), None)
                .await
                .unwrap();
            manager.close_all().await;

            assert_eq!(world.sessions().len(), 2);
            assert!(world.sessions().iter().all(|s| s.is_closed()));
            assert_eq!(manager.connection_keys().await, vec![HostKey::new(ADMIN_IP, 22)]);
        }
    }
}
