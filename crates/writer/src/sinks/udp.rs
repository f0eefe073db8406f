//! UdpSink - UDP fire-and-forget streaming

use contracts::{ContractError, Entry, EntrySink, UdpFormat, UdpWriterOptions};
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument};

/// Sink that sends one datagram per entry
pub struct UdpSink {
    name: String,
    options: UdpWriterOptions,
    socket: Option<UdpSocket>,
}

impl UdpSink {
    /// Create a new UdpSink connected to `options.address`
    #[instrument(name = "udp_sink_new", skip(name, options), fields(target = %options.address))]
    pub async fn new(name: impl Into<String>, options: UdpWriterOptions) -> std::io::Result<Self> {
        let name = name.into();
        // Bind to any available port
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&options.address).await?;

        debug!(
            sink = %name,
            target = %options.address,
            format = ?options.format,
            "UdpSink connected"
        );

        Ok(Self {
            name,
            options,
            socket: Some(socket),
        })
    }

    fn serialize_entry(&self, entry: &Entry) -> Result<Vec<u8>, String> {
        match self.options.format {
            UdpFormat::Text => Ok(entry.to_text().into_bytes()),
            UdpFormat::Json => serde_json::to_vec(entry).map_err(|e| format!("json error: {e}")),
            UdpFormat::Bincode => {
                bincode::serialize(entry).map_err(|e| format!("bincode error: {e}"))
            }
        }
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, entry: &Entry) -> Result<Vec<u8>, ContractError> {
        let data = self
            .serialize_entry(entry)
            .map_err(|e| ContractError::sink_write(&self.name, e))?;

        if data.len() > self.options.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "packet too large: {} > {} bytes",
                    data.len(),
                    self.options.max_packet_size
                ),
            ));
        }

        Ok(data)
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8]) {
        match socket.send(data).await {
            Ok(sent) => {
                debug!(sink = %self.name, bytes = sent, "sent");
            }
            Err(e) => {
                // Log but don't fail - UDP is best-effort
                error!(sink = %self.name, error = %e, "UDP send failed");
            }
        }
    }
}

impl EntrySink for UdpSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, entry: &Entry) -> Result<(), ContractError> {
        let socket = self.socket()?;
        let data = self.prepare_payload(entry)?;
        self.transmit(socket, &data).await;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // UDP doesn't buffer
        Ok(())
    }

    #[instrument(name = "udp_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "UdpSink closed");
        Ok(())
    }
}
