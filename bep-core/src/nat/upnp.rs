use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader as XmlReader;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::{BepError, Result};
use crate::nat::mapping::Protocol;
use crate::nat::provider::{Gateway, GatewayControl, MappingRequest, NatProvider};

/// `OnlyPermanentLeasesSupported`: a gateway returning this UPnP error code
/// for an `AddPortMapping` call is retried once with `leaseDuration = 0`.
pub const UPNP_ERROR_ONLY_PERMANENT_LEASES: u32 = 725;

const SSDP_IPV4_ADDR: &str = "239.255.255.250:1900";
const SSDP_IPV6_ADDR: &str = "[FF05::C]:1900";
const WAN_IP_CONNECTION: &str = "urn:schemas-upnp-org:service:WANIPConnection:";
const WAN_PPP_CONNECTION: &str = "urn:schemas-upnp-org:service:WANPPPConnection:";

/// UPnP Internet Gateway Device discovery and control, both IGDv1 and
/// IGDv2 (the two schemas are handled identically: discover any
/// `WANIPConnection`/`WANPPPConnection` service at any version).
pub struct UpnpProvider {
    client: reqwest::Client,
    use_ipv6: bool,
}

impl UpnpProvider {
    pub fn new(use_ipv6: bool) -> Self {
        Self { client: reqwest::Client::new(), use_ipv6 }
    }

    fn ssdp_target(&self) -> &'static str {
        if self.use_ipv6 {
            SSDP_IPV6_ADDR
        } else {
            SSDP_IPV4_ADDR
        }
    }

    async fn send_search(&self, socket: &UdpSocket) -> Result<()> {
        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {host}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 2\r\n\
             ST: urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\n\r\n",
            host = self.ssdp_target()
        );
        socket
            .send_to(request.as_bytes(), self.ssdp_target())
            .await
            .map_err(BepError::Io)?;
        Ok(())
    }

    async fn collect_replies(&self, socket: &UdpSocket, deadline: Duration) -> Vec<String> {
        let mut locations = Vec::new();
        let mut buf = [0u8; 2048];
        let end = tokio::time::Instant::now() + deadline;
        loop {
            let remaining = end.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, socket.recv_from(&mut buf)).await {
                Ok(Ok((n, _src))) => {
                    let text = String::from_utf8_lossy(&buf[..n]);
                    if let Some(location) = parse_location_header(&text) {
                        locations.push(location);
                    }
                }
                _ => break,
            }
        }
        locations
    }

    async fn fetch_control_url(&self, description_url: &str) -> Result<Option<(String, String)>> {
        let body = self
            .client
            .get(description_url)
            .send()
            .await
            .map_err(|e| BepError::Transport(e.to_string()))?
            .text()
            .await
            .map_err(|e| BepError::Transport(e.to_string()))?;
        Ok(find_wan_connection_service(&body))
    }
}

#[async_trait]
impl NatProvider for UpnpProvider {
    fn name(&self) -> &'static str {
        if self.use_ipv6 {
            "upnp-ipv6"
        } else {
            "upnp-igd"
        }
    }

    async fn discover(&self, deadline: Duration) -> Result<Vec<Gateway>> {
        let bind_addr: SocketAddr = if self.use_ipv6 { "[::]:0".parse() } else { "0.0.0.0:0".parse() }
            .map_err(|e: std::net::AddrParseError| BepError::Transport(e.to_string()))?;
        let socket = UdpSocket::bind(bind_addr).await.map_err(BepError::Io)?;
        self.send_search(&socket).await?;
        let locations = self.collect_replies(&socket, deadline).await;

        let mut gateways = Vec::new();
        for (idx, location) in locations.into_iter().enumerate() {
            if let Some((control_url, service_type)) = self.fetch_control_url(&location).await? {
                let local_ip = socket.local_addr().map(|a| a.ip()).unwrap_or(IpAddr::from([0, 0, 0, 0]));
                gateways.push(Gateway {
                    id: format!("upnp-{idx}"),
                    local_ip,
                    control: GatewayControl::Upnp { control_url, service_type },
                });
            }
        }
        Ok(gateways)
    }

    async fn add_mapping(&self, gateway: &Gateway, request: &MappingRequest) -> Result<SocketAddr> {
        let (control_url, service_type) = match &gateway.control {
            GatewayControl::Upnp { control_url, service_type } => (control_url, service_type),
            _ => return Err(BepError::Protocol("not a UPnP gateway".into())),
        };

        let result = soap_add_port_mapping(&self.client, control_url, service_type, request).await;
        match result {
            Err(SoapError::UpnpFault(code)) if code == UPNP_ERROR_ONLY_PERMANENT_LEASES => {
                let mut retry = request.clone();
                retry.lease_seconds = 0;
                soap_add_port_mapping(&self.client, control_url, service_type, &retry)
                    .await
                    .map_err(|e| BepError::Temporary(e.to_string()))
            }
            Err(e) => Err(BepError::Temporary(e.to_string())),
            Ok(addr) => Ok(addr),
        }
    }
}

fn parse_location_header(response: &str) -> Option<String> {
    response
        .lines()
        .find(|line| line.to_ascii_uppercase().starts_with("LOCATION:"))
        .map(|line| line.splitn(2, ':').nth(1).unwrap_or("").trim().to_string())
}

/// Walks a UPnP device description XML for the first
/// `WANIPConnection`/`WANPPPConnection` service (any version) and returns
/// its `(controlURL, serviceType)`.
fn find_wan_connection_service(xml: &str) -> Option<(String, String)> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text = true;

    let mut buf = Vec::new();
    let mut current_tag = String::new();
    let mut service_type: Option<String> = None;
    let mut control_url: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
            }
            Ok(Event::Text(t)) => {
                let text = t.decode().unwrap_or_default().to_string();
                match current_tag.as_str() {
                    "serviceType" => {
                        if text.starts_with(WAN_IP_CONNECTION) || text.starts_with(WAN_PPP_CONNECTION) {
                            service_type = Some(text);
                        } else {
                            service_type = None;
                        }
                    }
                    "controlURL" if service_type.is_some() => {
                        control_url = Some(text);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                if control_url.is_some() && service_type.is_some() {
                    return Some((control_url.unwrap(), service_type.unwrap()));
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

#[derive(Debug)]
enum SoapError {
    UpnpFault(u32),
    Other(String),
}

impl std::fmt::Display for SoapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoapError::UpnpFault(code) => write!(f, "UPnP fault {code}"),
            SoapError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

async fn soap_add_port_mapping(
    client: &reqwest::Client,
    control_url: &str,
    service_type: &str,
    request: &MappingRequest,
) -> std::result::Result<SocketAddr, SoapError> {
    let proto = match request.protocol {
        Protocol::Tcp => "TCP",
        Protocol::Udp => "UDP",
    };
    let body = format!(
        r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
<s:Body><u:AddPortMapping xmlns:u="{service_type}">
<NewRemoteHost></NewRemoteHost>
<NewExternalPort>{ext_port}</NewExternalPort>
<NewProtocol>{proto}</NewProtocol>
<NewInternalPort>{int_port}</NewInternalPort>
<NewInternalClient>{int_ip}</NewInternalClient>
<NewEnabled>1</NewEnabled>
<NewPortMappingDescription>bep-node</NewPortMappingDescription>
<NewLeaseDuration>{lease}</NewLeaseDuration>
</u:AddPortMapping></s:Body></s:Envelope>"#,
        ext_port = request.external_port,
        int_port = request.internal_port,
        int_ip = request.internal_ip,
        lease = request.lease_seconds,
    );

    let response = client
        .post(control_url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", format!("\"{service_type}#AddPortMapping\""))
        .body(body)
        .send()
        .await
        .map_err(|e| SoapError::Other(e.to_string()))?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        if let Some(code) = parse_upnp_fault_code(&text) {
            return Err(SoapError::UpnpFault(code));
        }
        return Err(SoapError::Other(format!("HTTP {status}")));
    }

    Ok(SocketAddr::new(request.internal_ip, request.external_port))
}

fn parse_upnp_fault_code(xml: &str) -> Option<u32> {
    let marker = "<errorCode>";
    let start = xml.find(marker)? + marker.len();
    let end = xml[start..].find('<')? + start;
    xml[start..end].trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_location_header_case_insensitively() {
        let response = "HTTP/1.1 200 OK\r\nlocation: http://192.168.1.1:1900/desc.xml\r\n\r\n";
        assert_eq!(
            parse_location_header(response),
            Some("http://192.168.1.1:1900/desc.xml".to_string())
        );
    }

    #[test]
    fn missing_location_header_returns_none() {
        assert_eq!(parse_location_header("HTTP/1.1 200 OK\r\n\r\n"), None);
    }

    #[test]
    fn finds_wan_ip_connection_control_url() {
        let xml = r#"
        <root>
          <device>
            <serviceList>
              <service>
                <serviceType>urn:schemas-upnp-org:service:WANIPConnection:1</serviceType>
                <controlURL>/ctl/IPConn</controlURL>
              </service>
            </serviceList>
          </device>
        </root>"#;
        let found = find_wan_connection_service(xml).unwrap();
        assert_eq!(found.0, "/ctl/IPConn");
        assert!(found.1.starts_with(WAN_IP_CONNECTION));
    }

    #[test]
    fn ignores_unrelated_services() {
        let xml = r#"
        <root>
          <service>
            <serviceType>urn:schemas-upnp-org:service:Layer3Forwarding:1</serviceType>
            <controlURL>/ctl/L3F</controlURL>
          </service>
        </root>"#;
        assert_eq!(find_wan_connection_service(xml), None);
    }

    #[test]
    fn parses_upnp_fault_code() {
        let xml = "<s:Fault><errorCode>725</errorCode><errorDescription>OnlyPermanentLeasesSupported</errorDescription></s:Fault>";
        assert_eq!(parse_upnp_fault_code(xml), Some(725));
    }
}
