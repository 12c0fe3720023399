use url::Url;

use crate::{client::GatewayClient, tunnel::Tunnel};

/// One control channel to a gateway: the SSH tunnel plus an HTTP client
/// bound to the tunnel's forwarded daemon port.
pub struct GatewayConnection {
    ip_address: String,
    tunnel: Box<dyn Tunnel>,
    http: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("ip_address", &self.ip_address)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GatewayConnection {
    pub(crate) fn new(ip_address: &str, tunnel: Box<dyn Tunnel>) -> Self {
        let base_url = Url::parse(&format!("http://{}/", tunnel.local_addr()))
            .expect("forwarded tunnel address is a valid URL");
        Self {
            ip_address: ip_address.to_string(),
            tunnel,
            http: reqwest::Client::new(),
            base_url,
        }
    }

    #[must_use]
    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    #[must_use]
    pub fn tunnel(&self) -> &dyn Tunnel {
        self.tunnel.as_ref()
    }

    /// Scoped protocol handle speaking to the daemon through the tunnel.
    #[must_use]
    pub fn client(&self) -> GatewayClient<'_> {
        GatewayClient::new(&self.http, &self.base_url)
    }

    /// Release the tunnel. Idempotent; handles already cloned out of the
    /// pool stay valid and fail with transport errors on use.
    pub async fn close(&self) {
        self.tunnel.close().await;
    }
}
