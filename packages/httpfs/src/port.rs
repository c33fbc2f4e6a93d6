use std::io;
use std::net::TcpListener;

/// Ask the kernel for a free local TCP port.
///
/// The listener is closed before returning, so the port is only likely,
/// not guaranteed, to still be free when the backend binds it.
pub fn unused_port() -> io::Result<u16> {
    let listener = TcpListener::bind("localhost:0")?;
    Ok(listener.local_addr()?.port())
}
