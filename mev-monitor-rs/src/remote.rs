use crate::error::Error;
use std::{net::TcpListener, process::Stdio, time::Duration};
use tokio::process::{Child, Command};

/// Default remote port forwarded for the database connection.
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Scoped SSH local port-forward. The tunnel lives exactly as long as this
/// guard: the child is killed when the guard drops, on every exit path.
pub struct SshForward {
    child: Child,
    local_port: u16,
}

impl SshForward {
    /// Forward a fresh local port to `remote_port` on `host` (an ssh
    /// destination, e.g. `user@db.example.com`).
    pub async fn open(host: &str, remote_port: u16) -> Result<Self, Error> {
        let local_port = free_port()?;
        let mut child = Command::new("ssh")
            .arg("-N")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("ExitOnForwardFailure=yes")
            .arg("-L")
            .arg(format!("{local_port}:127.0.0.1:{remote_port}"))
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| Error::Forward(format!("spawning ssh to `{host}`: {err}")))?;

        // give the tunnel a moment to establish and catch immediate failures
        tokio::time::sleep(Duration::from_millis(500)).await;
        if let Some(status) = child
            .try_wait()
            .map_err(|err| Error::Forward(format!("polling ssh: {err}")))?
        {
            return Err(Error::Forward(format!("ssh to `{host}` exited early: {status}")));
        }
        tracing::info!(host, local_port, remote_port, "ssh forward established");
        Ok(Self { child, local_port })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub async fn close(mut self) -> Result<(), Error> {
        self.child
            .kill()
            .await
            .map_err(|err| Error::Forward(format!("stopping ssh: {err}")))
    }
}

fn free_port() -> Result<u16, Error> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|err| Error::Forward(format!("allocating local port: {err}")))?;
    let port = listener
        .local_addr()
        .map_err(|err| Error::Forward(format!("reading local port: {err}")))?
        .port();
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_distinct_free_ports() {
        let a = free_port().unwrap();
        let b = free_port().unwrap();
        assert!(a > 0);
        assert!(b > 0);
    }

    #[tokio::test]
    async fn failed_forward_surfaces_an_error() {
        // an unresolvable host makes ssh exit immediately
        let result = SshForward::open("nobody@localhost.invalid", DEFAULT_DB_PORT).await;
        assert!(result.is_err());
    }
}
