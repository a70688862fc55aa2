use std::net::{IpAddr, UdpSocket};

// Best guess at the address other machines on the LAN can reach us on.
// Connecting a UDP socket only picks a route, no packet is sent.
pub fn lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        None
    } else {
        Some(ip)
    }
}
