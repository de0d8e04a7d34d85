use defmt::{debug, warn};
use embassy_futures::select::{select, Either};
use embassy_net::{tcp::TcpSocket, IpEndpoint};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use heapless::String;

use crate::error::SensorError;
use crate::homeseer::{build_update_request, parse_status_code};
use crate::report::UpdateSink;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One-request-per-connection HTTP client for the HomeSeer JSON API.
pub struct HttpClient<'a> {
    socket: TcpSocket<'a>,
    endpoint: IpEndpoint,
    host: String<24>,
}

impl<'a> HttpClient<'a> {
    pub fn new<T>(socket: TcpSocket<'a>, endpoint: T, host: String<24>) -> Self
    where
        T: Into<IpEndpoint>,
    {
        Self {
            socket,
            endpoint: endpoint.into(),
            host,
        }
    }

    /// Sends one request and returns the response status code. The
    /// connection is torn down afterwards either way.
    async fn exchange(&mut self, request: &[u8]) -> Result<u16, SensorError> {
        self.socket
            .connect(self.endpoint)
            .await
            .map_err(|_| SensorError::Network)?;
        let result = self.exchange_on_open_socket(request).await;
        // Tear the connection down hard so the socket is reusable next cycle.
        self.socket.abort();
        let _ = self.socket.flush().await;
        result
    }

    async fn exchange_on_open_socket(&mut self, request: &[u8]) -> Result<u16, SensorError> {
        self.socket
            .write_all(request)
            .await
            .map_err(|_| SensorError::Network)?;
        self.socket.flush().await.map_err(|_| SensorError::Network)?;

        // Read until the status line is complete; the rest of the body is
        // only interesting when debugging by hand.
        let mut buf = [0u8; 128];
        let mut filled = 0;
        loop {
            let read_fut = self.socket.read(&mut buf[filled..]);
            let timeout_fut = Timer::after(RESPONSE_TIMEOUT);
            match select(read_fut, timeout_fut).await {
                Either::First(Ok(0)) => {
                    debug!("Server closed before a full status line");
                    return Err(SensorError::Network);
                }
                Either::First(Ok(n)) => {
                    filled += n;
                    if let Some(status) = parse_status_code(&buf[..filled]) {
                        return Ok(status);
                    }
                    if filled == buf.len() {
                        debug!("No status line in the first {} bytes", filled);
                        return Err(SensorError::Network);
                    }
                }
                Either::First(Err(_)) => return Err(SensorError::Network),
                Either::Second(_) => {
                    debug!("Timeout waiting for response");
                    return Err(SensorError::Timeout);
                }
            }
        }
    }
}

impl UpdateSink for HttpClient<'_> {
    async fn send_update(&mut self, device_ref: u32, value: &str) -> Result<(), SensorError> {
        let request = build_update_request(self.host.as_str(), device_ref, value)?;
        let status = self.exchange(request.as_bytes()).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            warn!("Server returned status {} for ref {}", status, device_ref);
            Err(SensorError::Status(status))
        }
    }
}
