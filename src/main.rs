#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use ssh_manager::manager::{Credentials, ExecOptions, ManagerSettings, SshManager};
use tracing::{error, info};

const ADMIN_IP_ENV_VAR: &str = "SSH_ADMIN_IP";
const PORT_ENV_VAR: &str = "SSH_PORT";

fn usage() -> String {
    format!(
        "usage: ssh-manager <host> <command...>\n\n\
         Runs <command> on <host> and prints the checked result as JSON.\n\
         {} must name the admin node; credentials come from SSH_ADMIN_LOGIN, \
         SSH_ADMIN_PASSWORD, SSH_SLAVE_LOGIN and SSH_SLAVE_PASSWORD.",
        ADMIN_IP_ENV_VAR
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().ok_or_else(usage)?;
    let command = args.collect::<Vec<_>>().join(" ");
    if command.is_empty() {
        return Err(usage().into());
    }

    let admin_ip = std::env::var(ADMIN_IP_ENV_VAR)
        .map_err(|_| format!("{} is not set\n\n{}", ADMIN_IP_ENV_VAR, usage()))?;
    let port: u16 = std::env::var(PORT_ENV_VAR)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(22);

    let manager = SshManager::russh(ManagerSettings::from_env());
    manager.initialize(admin_ip, Credentials::from_env())?;

    info!("Running '{}' on {}:{}", command, host, port);
    let outcome = manager
        .execute_checked(&host, &command, port, &ExecOptions::default())
        .await;
    manager.close_all().await;

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}
