//! ricq adapter.
//!
//! Implements the core `Gateway` and `LoginClient` ports over the external QQ
//! protocol client. All ricq types stay inside this crate; the rest of the
//! workspace only sees the ports.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ricq::device::Device;
use ricq::ext::common::after_login;
use ricq::handler::{Handler, QEvent};
use ricq::msg::elem::Text;
use ricq::msg::MessageChain;
use ricq::version::{get_version, Protocol};
use ricq::{Client, LoginResponse, QRCodeConfirmed, QRCodeImageFetch, QRCodeState, RQError};

use pushqq_core::auth::{LoginClient, PasswordStage, QrStatus};
use pushqq_core::config::Config;
use pushqq_core::dump::DumpSink;
use pushqq_core::gateway::{Gateway, GatewayEvent, MessageReceipt, ObserverRegistry};
use pushqq_core::{Error, Result};

/// Forwards every protocol event into a channel; the dispatch task translates
/// them once the gateway exists.
struct ChannelHandler(mpsc::UnboundedSender<QEvent>);

#[async_trait]
impl Handler for ChannelHandler {
    async fn handle(&self, event: QEvent) {
        let _ = self.0.send(event);
    }
}

/// The QQ client plus the bits of login state ricq hands back between calls.
pub struct RicqGateway {
    client: Arc<Client>,
    network: Mutex<Option<JoinHandle<()>>>,
    qr_sig: Mutex<Option<Bytes>>,
    qr_confirmation: Mutex<Option<QRCodeConfirmed>>,
    uin: Option<i64>,
    password: Option<String>,
    dumps: DumpSink,
}

impl RicqGateway {
    /// Build the client, open the transport and start the network task.
    ///
    /// The returned receiver carries raw protocol events; hand it to
    /// [`RicqGateway::spawn_dispatch`] after observers are registered.
    pub async fn connect(cfg: &Config) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<QEvent>)> {
        let device = load_or_create_device(&cfg.device_file)?;

        let (tx, rx) = mpsc::unbounded_channel();
        // AndroidWatch is the only protocol the server still hands QR logins to.
        let client = Arc::new(Client::new(
            device,
            get_version(Protocol::AndroidWatch),
            ChannelHandler(tx),
        ));

        let stream = TcpStream::connect(&client.get_address_list().await[..]).await?;
        let net_client = client.clone();
        let network = tokio::spawn(async move {
            net_client.start(stream).await;
        });
        // Let the network task register itself before any login call.
        tokio::task::yield_now().await;

        info!("connected to qq server");
        Ok((
            Arc::new(Self {
                client,
                network: Mutex::new(Some(network)),
                qr_sig: Mutex::new(None),
                qr_confirmation: Mutex::new(None),
                uin: cfg.uin,
                password: cfg.password.clone(),
                dumps: DumpSink::new(cfg.dump_dir.clone()),
            }),
            rx,
        ))
    }

    /// Drain protocol events and fan them out to the registered observers.
    pub fn spawn_dispatch(
        self: &Arc<Self>,
        registry: ObserverRegistry,
        mut events: mpsc::UnboundedReceiver<QEvent>,
    ) -> JoinHandle<()> {
        let gateway = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Some(event) = translate(event) {
                    registry.dispatch(gateway.as_ref(), &event).await;
                }
            }
        })
    }

    /// Stop the network task. Called once on shutdown, after the session has
    /// been persisted.
    pub async fn shutdown(&self) {
        if let Some(network) = self.network.lock().await.take() {
            network.abort();
        }
    }

    async fn finish_login(&self, response: LoginResponse) -> Result<()> {
        match response {
            LoginResponse::Success(_) => {
                after_login(&self.client).await;
                Ok(())
            }
            other => {
                let detail = format!("{other:?}");
                let _ = self.dumps.dump(detail.as_bytes(), "login rejected");
                Err(Error::Auth(format!("login rejected: {detail}")))
            }
        }
    }

    async fn map_password_response(&self, response: LoginResponse) -> Result<PasswordStage> {
        Ok(match response {
            LoginResponse::Success(_) => {
                after_login(&self.client).await;
                PasswordStage::Success
            }
            LoginResponse::NeedCaptcha(c) => PasswordStage::CaptchaNeeded {
                verify_url: c.verify_url.unwrap_or_default(),
            },
            LoginResponse::DeviceLocked(l) => PasswordStage::DeviceVerifyNeeded {
                verify_url: l.verify_url.unwrap_or_default(),
            },
            other => PasswordStage::Unknown {
                message: format!("{other:?}"),
            },
        })
    }

    fn password_credentials(&self) -> Result<(i64, String)> {
        match (self.uin, self.password.clone()) {
            (Some(uin), Some(password)) => Ok((uin, password)),
            _ => Err(Error::Config(
                "password login requires PUSHQQ_UIN and PUSHQQ_PASSWORD".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Gateway for RicqGateway {
    async fn send_private(&self, uin: u64, text: &str) -> Result<MessageReceipt> {
        let chain = MessageChain::new(Text::new(text.to_string()));
        let receipt = self
            .client
            .send_friend_message(uin as i64, chain)
            .await
            .map_err(map_rq)?;
        Ok(MessageReceipt { time: receipt.time })
    }

    async fn send_group(&self, uin: u64, text: &str) -> Result<MessageReceipt> {
        let chain = MessageChain::new(Text::new(text.to_string()));
        let receipt = self
            .client
            .send_group_message(uin as i64, chain)
            .await
            .map_err(map_rq)?;
        Ok(MessageReceipt { time: receipt.time })
    }
}

#[async_trait]
impl LoginClient for RicqGateway {
    async fn resume(&self, credential: &[u8]) -> Result<()> {
        let token = serde_json::from_slice(credential)
            .map_err(|e| Error::Auth(format!("stored credential unreadable: {e}")))?;
        let response = self.client.token_login(token).await.map_err(map_rq)?;
        self.finish_login(response).await
    }

    async fn fetch_qrcode(&self) -> Result<Vec<u8>> {
        match self.client.fetch_qrcode().await.map_err(map_rq)? {
            QRCodeState::ImageFetch(QRCodeImageFetch { image_data, sig, .. }) => {
                *self.qr_sig.lock().await = Some(sig);
                Ok(image_data.to_vec())
            }
            other => Err(Error::Auth(format!(
                "unexpected qrcode fetch state: {other:?}"
            ))),
        }
    }

    async fn poll_qrcode(&self) -> Result<QrStatus> {
        let sig = self
            .qr_sig
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::Auth("no qrcode challenge in flight".to_string()))?;

        Ok(match self.client.query_qrcode_result(&sig).await.map_err(map_rq)? {
            QRCodeState::WaitingForScan | QRCodeState::WaitingForConfirm => QrStatus::Pending,
            QRCodeState::Confirmed(confirmation) => {
                *self.qr_confirmation.lock().await = Some(confirmation);
                QrStatus::Confirmed
            }
            QRCodeState::Timeout => QrStatus::Expired,
            QRCodeState::Canceled => QrStatus::Canceled,
            // A second image would restart the challenge; treat it as still pending.
            QRCodeState::ImageFetch(_) => QrStatus::Pending,
        })
    }

    async fn confirm_qrcode(&self) -> Result<()> {
        let confirmation = self
            .qr_confirmation
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Auth("qrcode challenge not confirmed yet".to_string()))?;
        let response = self
            .client
            .qrcode_login(
                &confirmation.tmp_pwd,
                &confirmation.tmp_no_pic_sig,
                &confirmation.tgt_qr,
            )
            .await
            .map_err(map_rq)?;
        self.finish_login(response).await
    }

    async fn password_login(&self) -> Result<PasswordStage> {
        let (uin, password) = self.password_credentials()?;
        let response = self
            .client
            .password_login(uin, &password)
            .await
            .map_err(map_rq)?;
        self.map_password_response(response).await
    }

    async fn submit_captcha(&self, ticket: &str, _rand_str: &str) -> Result<PasswordStage> {
        // ricq only consumes the ticket; the random string is kept in the port
        // for parity with clients that want both.
        let response = self.client.submit_ticket(ticket).await.map_err(map_rq)?;
        self.map_password_response(response).await
    }

    async fn verify_device(&self, _verify_url: &str) -> Result<PasswordStage> {
        // The operator has finished web verification; a plain retry is the
        // protocol's way to pick it up.
        self.password_login().await
    }

    async fn credential(&self) -> Result<Vec<u8>> {
        let token = self.client.gen_token().await;
        Ok(serde_json::to_vec(&token)?)
    }
}

fn translate(event: QEvent) -> Option<GatewayEvent> {
    match event {
        QEvent::FriendMessage(e) => Some(GatewayEvent::PrivateMessage {
            sender: e.inner.from_uin as u64,
            text: e.inner.elements.to_string(),
        }),
        QEvent::GroupMessage(e) => Some(GatewayEvent::GroupMessage {
            group: e.inner.group_code as u64,
            sender: e.inner.from_uin as u64,
            text: e.inner.elements.to_string(),
        }),
        QEvent::KickedOffline(_) => Some(GatewayEvent::Disconnected {
            reason: "kicked offline by server".to_string(),
        }),
        QEvent::MSFOffline(_) => Some(GatewayEvent::Disconnected {
            reason: "msf offline".to_string(),
        }),
        _ => {
            debug!("ignoring protocol event");
            None
        }
    }
}

fn map_rq(e: RQError) -> Error {
    Error::Gateway(e.to_string())
}

fn load_or_create_device(path: &Path) -> Result<Device> {
    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("device file {} unreadable: {e}", path.display()))),
        Err(_) => {
            let device = Device::random();
            if let Err(e) = std::fs::write(path, serde_json::to_string_pretty(&device)?) {
                warn!("device identity not persisted to {}: {e}", path.display());
            }
            Ok(device)
        }
    }
}
