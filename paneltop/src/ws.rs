//! WebSocket transport to the daemon: connect (optional custom CA and Origin),
//! authenticate, publish decoded events on the bus, write outbound requests,
//! and reconnect after a delay when the socket drops.

use std::{fs::File, io::BufReader, sync::Arc, time::Duration};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    Connector, MaybeTlsStream, WebSocketStream,
};

use crate::events::EventBus;
use crate::session::{Transport, TransportError};
use crate::types::{OutboundRequest, ServerEvent};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Default)]
pub struct ConnectConfig {
    pub url: String,
    pub token: Option<String>,
    pub tls_ca: Option<String>,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Connecting,
    /// Socket open and authenticated.
    Connected,
    /// Socket lost; a reconnect is scheduled.
    Disconnected,
    /// The daemon rejected our token. No further attempts are made.
    Rejected,
}

enum End {
    Closed,
    Rejected,
    Shutdown,
}

fn tls_config(ca_path: &str) -> anyhow::Result<rustls::ClientConfig> {
    let file = File::open(ca_path).with_context(|| format!("opening CA file {ca_path}"))?;
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
        roots.add(cert?)?;
    }
    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

// Connect to the daemon and return the WS stream
pub async fn connect(cfg: &ConnectConfig) -> anyhow::Result<WsStream> {
    let mut req = cfg.url.as_str().into_client_request()?;
    if let Some(origin) = &cfg.origin {
        req.headers_mut()
            .insert("Origin", HeaderValue::from_str(origin)?);
    }
    let connector = match &cfg.tls_ca {
        Some(ca) => Some(Connector::Rustls(Arc::new(tls_config(ca)?))),
        None => None,
    };
    let (ws, _) = connect_async_tls_with_config(req, None, false, connector).await?;
    Ok(ws)
}

/// Handle to the background connection task. Dropping it stops the task.
pub struct WsHandle {
    requests: mpsc::UnboundedSender<OutboundRequest>,
    link: watch::Receiver<LinkState>,
    task: JoinHandle<()>,
}

impl WsHandle {
    pub fn link(&self) -> LinkState {
        *self.link.borrow()
    }
}

impl Transport for WsHandle {
    fn send(&self, req: OutboundRequest) -> Result<(), TransportError> {
        if self.link() != LinkState::Connected {
            return Err(TransportError::Disconnected);
        }
        tracing::debug!(event = req.event_name(), "queue request");
        self.requests.send(req).map_err(|_| TransportError::Closed)
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn spawn_connection(cfg: ConnectConfig, bus: EventBus) -> WsHandle {
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (link_tx, link_rx) = watch::channel(LinkState::Connecting);
    let task = tokio::spawn(run(cfg, bus, req_rx, link_tx));
    WsHandle {
        requests: req_tx,
        link: link_rx,
        task,
    }
}

async fn run(
    cfg: ConnectConfig,
    bus: EventBus,
    mut requests: mpsc::UnboundedReceiver<OutboundRequest>,
    link: watch::Sender<LinkState>,
) {
    loop {
        link.send_replace(LinkState::Connecting);
        tracing::info!(url = %cfg.url, "connecting");
        match connect(&cfg).await {
            Ok(ws) => match drive(ws, &cfg, &bus, &mut requests, &link).await {
                Ok(End::Closed) => tracing::info!("socket closed by daemon"),
                Ok(End::Rejected) => {
                    tracing::error!("daemon rejected the token; not reconnecting");
                    link.send_replace(LinkState::Rejected);
                    return;
                }
                Ok(End::Shutdown) => return,
                Err(e) => tracing::warn!(error = %e, "socket error"),
            },
            Err(e) => tracing::warn!(error = %e, "connect failed"),
        }
        link.send_replace(LinkState::Disconnected);
        // Requests queued before the drop are stale
        while requests.try_recv().is_ok() {}
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = link.closed() => return,
        }
    }
}

async fn drive(
    ws: WsStream,
    cfg: &ConnectConfig,
    bus: &EventBus,
    requests: &mut mpsc::UnboundedReceiver<OutboundRequest>,
    link: &watch::Sender<LinkState>,
) -> anyhow::Result<End> {
    let (mut sink, mut stream) = ws.split();

    match &cfg.token {
        Some(token) => {
            let auth = OutboundRequest::Auth(token.clone()).encode();
            sink.send(Message::Text(auth)).await?;
        }
        None => {
            link.send_replace(LinkState::Connected);
        }
    }

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(end) = dispatch(&text, bus, link) {
                        return Ok(end);
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(End::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            req = requests.recv() => match req {
                Some(req) => sink.send(Message::Text(req.encode())).await?,
                None => return Ok(End::Shutdown),
            },
        }
    }
}

fn dispatch(text: &str, bus: &EventBus, link: &watch::Sender<LinkState>) -> Option<End> {
    let ev = match ServerEvent::decode(text) {
        Ok(Some(ev)) => ev,
        Ok(None) => return None,
        Err(e) => {
            tracing::debug!(error = %e, "discarding malformed frame");
            return None;
        }
    };
    match &ev {
        ServerEvent::AuthSuccess => {
            tracing::info!("authenticated");
            link.send_replace(LinkState::Connected);
        }
        ServerEvent::TokenExpiring => {
            tracing::warn!("socket token is about to expire");
        }
        ServerEvent::TokenExpired | ServerEvent::JwtError(_) => {
            bus.publish(ev);
            return Some(End::Rejected);
        }
        _ => {}
    }
    bus.publish(ev);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, PowerStatus};

    #[test]
    fn dispatch_publishes_decoded_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&[EventKind::Status]);
        let (tx, _rx) = watch::channel(LinkState::Connecting);
        assert!(dispatch(r#"{"event":"status","args":["running"]}"#, &bus, &tx).is_none());
        assert_eq!(sub.drain(), vec![ServerEvent::Status(PowerStatus::Running)]);
    }

    #[test]
    fn dispatch_drops_garbage() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&[EventKind::Stats]);
        let (tx, _rx) = watch::channel(LinkState::Connecting);
        assert!(dispatch("{not valid", &bus, &tx).is_none());
        assert!(dispatch(r#"{"event":"stats","args":["{not valid"]}"#, &bus, &tx).is_none());
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn auth_success_marks_connected_and_expiry_rejects() {
        let bus = EventBus::new();
        let (tx, rx) = watch::channel(LinkState::Connecting);
        dispatch(r#"{"event":"auth success"}"#, &bus, &tx);
        assert_eq!(*rx.borrow(), LinkState::Connected);
        assert!(matches!(
            dispatch(r#"{"event":"token expired","args":[]}"#, &bus, &tx),
            Some(End::Rejected)
        ));
    }

    #[tokio::test]
    async fn handle_refuses_sends_until_connected() {
        let bus = EventBus::new();
        // Port 9 (discard) on localhost will refuse; the task keeps retrying in the background
        let handle = spawn_connection(
            ConnectConfig {
                url: "ws://127.0.0.1:9/ws".into(),
                ..Default::default()
            },
            bus,
        );
        assert!(matches!(
            handle.send(OutboundRequest::SendStats),
            Err(TransportError::Disconnected)
        ));
    }
}
