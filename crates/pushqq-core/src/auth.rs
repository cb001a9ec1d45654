//! Login orchestration: cached-session resume, the interactive QR flow, and
//! the (disabled by default) password flow.
//!
//! The protocol client sits behind [`LoginClient`]; this module only owns the
//! ordering and retry shape of the flows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::{config::Config, store::SessionStore, Error, Result};

/// Outcome of one QR status poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QrStatus {
    /// Not scanned or not confirmed yet; poll again after the interval.
    Pending,
    /// Scanned and confirmed; the challenge can be exchanged for a session.
    Confirmed,
    Expired,
    Canceled,
}

/// Where the password flow stands after one protocol exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PasswordStage {
    Success,
    /// Operator must solve a captcha and feed back the ticket/random string.
    CaptchaNeeded { verify_url: String },
    /// Operator must complete device verification at the given URL.
    DeviceVerifyNeeded { verify_url: String },
    /// Anything the flow does not handle. Logged, not escalated.
    Unknown { message: String },
}

/// Port for the login half of the protocol client.
#[async_trait]
pub trait LoginClient: Send + Sync {
    /// Resume with a previously persisted credential. Errors are recoverable;
    /// the caller falls through to an interactive flow.
    async fn resume(&self, credential: &[u8]) -> Result<()>;

    /// Request a fresh login challenge; returns the PNG image to scan.
    async fn fetch_qrcode(&self) -> Result<Vec<u8>>;
    async fn poll_qrcode(&self) -> Result<QrStatus>;
    /// Exchange the confirmed challenge for an authenticated session.
    async fn confirm_qrcode(&self) -> Result<()>;

    async fn password_login(&self) -> Result<PasswordStage>;
    async fn submit_captcha(&self, ticket: &str, rand_str: &str) -> Result<PasswordStage>;
    /// Re-attempt login after the operator finished device verification.
    async fn verify_device(&self, verify_url: &str) -> Result<PasswordStage>;

    /// Serialize the current session token for persistence.
    async fn credential(&self) -> Result<Vec<u8>>;
}

/// Side channel for interactive login input (captcha tickets and the like).
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, question: &str) -> Result<String>;
}

/// Reads answers from the attached terminal.
pub struct StdinPrompter;

#[async_trait]
impl Prompter for StdinPrompter {
    async fn prompt(&self, question: &str) -> Result<String> {
        use tokio::io::{AsyncBufReadExt, BufReader};

        eprintln!("{question}");
        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(line.trim().to_string())
    }
}

/// Resolves a valid session before the HTTP listener starts.
///
/// Order: cached resume, then (if enabled) password, then QR. Exactly one
/// method succeeds before `login` returns; QR expiry/rejection is fatal for
/// the whole startup.
pub struct Authenticator {
    client: Arc<dyn LoginClient>,
    store: SessionStore,
    prompter: Arc<dyn Prompter>,
    qrcode_file: PathBuf,
    poll_interval: Duration,
    password_login: bool,
}

impl Authenticator {
    pub fn new(
        client: Arc<dyn LoginClient>,
        store: SessionStore,
        prompter: Arc<dyn Prompter>,
        cfg: &Config,
    ) -> Self {
        Self {
            client,
            store,
            prompter,
            qrcode_file: cfg.qrcode_file.clone(),
            poll_interval: cfg.poll_interval,
            password_login: cfg.password_login,
        }
    }

    pub async fn login(&self) -> Result<()> {
        if let Some(credential) = self.store.load() {
            match self.client.resume(&credential).await {
                Ok(()) => {
                    info!("resumed previous session");
                    return Ok(());
                }
                Err(e) => warn!("session resume failed, need interactive login: {e}"),
            }
        }

        if self.password_login {
            match self.password_flow().await {
                Ok(()) => return Ok(()),
                Err(e) => warn!("password login failed, falling back to qrcode: {e}"),
            }
        }

        self.qrcode_flow().await
    }

    async fn qrcode_flow(&self) -> Result<()> {
        info!("login with qrcode");
        let png = self.client.fetch_qrcode().await?;

        if let Some(parent) = self.qrcode_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.qrcode_file, &png)?;
        info!(
            "qrcode saved, scan it to log in: {}",
            self.qrcode_file.display()
        );

        loop {
            match self.client.poll_qrcode().await? {
                QrStatus::Pending => tokio::time::sleep(self.poll_interval).await,
                QrStatus::Confirmed => break,
                QrStatus::Expired => return Err(Error::Auth("qrcode expired".to_string())),
                QrStatus::Canceled => return Err(Error::Auth("qrcode canceled".to_string())),
            }
        }

        self.client.confirm_qrcode().await
    }

    async fn password_flow(&self) -> Result<()> {
        info!("login with password");
        let mut stage = self.client.password_login().await?;
        loop {
            match stage {
                PasswordStage::Success => return Ok(()),
                PasswordStage::CaptchaNeeded { verify_url } => {
                    warn!("captcha verification required: {verify_url}");
                    let ticket = self.prompter.prompt("ticket?").await?;
                    let rand_str = self.prompter.prompt("rand_str?").await?;
                    stage = self.client.submit_captcha(&ticket, &rand_str).await?;
                }
                PasswordStage::DeviceVerifyNeeded { verify_url } => {
                    warn!("device verification required, open: {verify_url}");
                    let _ = self
                        .prompter
                        .prompt("press enter once verification is done")
                        .await?;
                    stage = self.client.verify_device(&verify_url).await?;
                }
                PasswordStage::Unknown { message } => {
                    error!("unhandled login response: {message}");
                    return Err(Error::Auth(format!("unhandled login response: {message}")));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedClient {
        resume_ok: bool,
        qr_script: Mutex<VecDeque<QrStatus>>,
        password_script: Mutex<VecDeque<PasswordStage>>,
        resumes: AtomicUsize,
        fetches: AtomicUsize,
        polls: AtomicUsize,
        confirms: AtomicUsize,
        captchas: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedClient {
        fn with_qr(script: Vec<QrStatus>) -> Self {
            Self {
                qr_script: Mutex::new(script.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl LoginClient for ScriptedClient {
        async fn resume(&self, _credential: &[u8]) -> Result<()> {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            if self.resume_ok {
                Ok(())
            } else {
                Err(Error::Auth("token expired".to_string()))
            }
        }

        async fn fetch_qrcode(&self) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(b"png".to_vec())
        }

        async fn poll_qrcode(&self) -> Result<QrStatus> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.qr_script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Auth("poll script exhausted".to_string()))
        }

        async fn confirm_qrcode(&self) -> Result<()> {
            self.confirms.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn password_login(&self) -> Result<PasswordStage> {
            self.next_password_stage()
        }

        async fn submit_captcha(&self, ticket: &str, rand_str: &str) -> Result<PasswordStage> {
            self.captchas
                .lock()
                .unwrap()
                .push((ticket.to_string(), rand_str.to_string()));
            self.next_password_stage()
        }

        async fn verify_device(&self, _verify_url: &str) -> Result<PasswordStage> {
            self.next_password_stage()
        }

        async fn credential(&self) -> Result<Vec<u8>> {
            Ok(b"token".to_vec())
        }
    }

    impl ScriptedClient {
        fn next_password_stage(&self) -> Result<PasswordStage> {
            self.password_script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Auth("password script exhausted".to_string()))
        }
    }

    struct CannedPrompter(Mutex<VecDeque<String>>);

    #[async_trait]
    impl Prompter for CannedPrompter {
        async fn prompt(&self, _question: &str) -> Result<String> {
            Ok(self.0.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn authenticator(
        client: Arc<ScriptedClient>,
        dir: &tempfile::TempDir,
        password_login: bool,
    ) -> Authenticator {
        Authenticator {
            client,
            store: SessionStore::new(dir.path().join("sig.bin")),
            prompter: Arc::new(CannedPrompter(Mutex::new(VecDeque::new()))),
            qrcode_file: dir.path().join("qrcode.png"),
            poll_interval: Duration::from_secs(3),
            password_login,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn qr_poll_sleeps_between_pending_results() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient::with_qr(vec![
            QrStatus::Pending,
            QrStatus::Pending,
            QrStatus::Confirmed,
        ]));
        let auth = authenticator(client.clone(), &dir, false);

        let started = tokio::time::Instant::now();
        auth.login().await.unwrap();

        // One fixed-interval sleep per pending result, none after success.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        assert_eq!(client.polls.load(Ordering::SeqCst), 3);
        assert_eq!(client.confirms.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("qrcode.png").exists());
    }

    #[tokio::test]
    async fn resume_success_skips_interactive_login() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient {
            resume_ok: true,
            ..ScriptedClient::default()
        });
        let auth = authenticator(client.clone(), &dir, false);
        auth.store.save(b"stored-token").unwrap();

        auth.login().await.unwrap();

        assert_eq!(client.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(client.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resume_failure_falls_through_to_qrcode() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient::with_qr(vec![QrStatus::Confirmed]));
        let auth = authenticator(client.clone(), &dir, false);
        auth.store.save(b"stale-token").unwrap();

        auth.login().await.unwrap();

        assert_eq!(client.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(client.confirms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn qr_expiry_aborts_startup() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient::with_qr(vec![
            QrStatus::Pending,
            QrStatus::Expired,
        ]));
        let auth = authenticator(client.clone(), &dir, false);

        let err = auth.login().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(client.confirms.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn password_captcha_round_trips_operator_input() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient {
            password_script: Mutex::new(
                vec![
                    PasswordStage::CaptchaNeeded {
                        verify_url: "https://verify".to_string(),
                    },
                    PasswordStage::Success,
                ]
                .into(),
            ),
            ..ScriptedClient::default()
        });
        let mut auth = authenticator(client.clone(), &dir, true);
        auth.prompter = Arc::new(CannedPrompter(Mutex::new(
            vec!["the-ticket".to_string(), "the-rand".to_string()].into(),
        )));

        auth.login().await.unwrap();

        assert_eq!(
            client.captchas.lock().unwrap().as_slice(),
            &[("the-ticket".to_string(), "the-rand".to_string())]
        );
        // Password succeeded, QR never started.
        assert_eq!(client.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unhandled_password_response_falls_back_to_qrcode() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(ScriptedClient {
            password_script: Mutex::new(
                vec![PasswordStage::Unknown {
                    message: "account frozen".to_string(),
                }]
                .into(),
            ),
            qr_script: Mutex::new(vec![QrStatus::Confirmed].into()),
            ..ScriptedClient::default()
        });
        let auth = authenticator(client.clone(), &dir, true);

        auth.login().await.unwrap();
        assert_eq!(client.confirms.load(Ordering::SeqCst), 1);
    }
}
