//! App server management
//!
//! Spawns the trainer's static server as a subprocess and health-checks it
//! before any test traffic flows. The interception proxy points its
//! upstream here. Use a non-reloading server: the proxy fails the run if
//! the app ever asks for a hot-reload script.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to a running app server process
pub struct ServerHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl ServerHandle {
    /// Spawn the server and wait until it responds.
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let port = config.port.unwrap_or_else(find_free_port);
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("spawning app server on port {}", port);

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .env("TRAINER_SERVE_PORT", port.to_string())
            .env("TRAINER_SERVE_HOST", "127.0.0.1")
            .env("TRAINER_SERVE_DIR", &config.serve_dir);

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!(
                "Failed to spawn {}: {}",
                config.command.display(),
                e
            ))
        })?;

        let handle = ServerHandle {
            child,
            base_url: base_url.clone(),
            port,
        };

        handle
            .wait_for_healthy(&config.health_path, config.startup_timeout)
            .await?;

        info!("app server is healthy at {}", base_url);
        Ok(handle)
    }

    async fn wait_for_healthy(&self, health_path: &str, timeout: Duration) -> E2eResult<()> {
        let health_url = format!("{}{}", self.base_url, health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!("health check returned {}", resp.status()),
                Err(e) => {
                    if attempts == 1 {
                        info!("waiting for app server to start...");
                    }
                    // Connection refused is expected while it boots
                    if !e.is_connect() {
                        warn!("health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server: graceful SIGTERM, then kill.
    pub fn stop(&mut self) -> E2eResult<()> {
        info!("stopping app server (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning the app server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server launcher; defaults to the repo's non-reloading serve script
    pub command: PathBuf,
    pub args: Vec<String>,
    /// Directory with the built app assets
    pub serve_dir: PathBuf,
    /// Port to listen on (None = find a free one)
    pub port: Option<u16>,
    /// Path polled until it answers 2xx
    pub health_path: String,
    pub startup_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("scripts/run-local.sh"),
            args: Vec::new(),
            serve_dir: PathBuf::from("build/public"),
            port: None,
            health_path: "/".to_string(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Find a free port to use
fn find_free_port() -> u16 {
    use std::net::TcpListener;

    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}
