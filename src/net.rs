//! External listener glue (SPEC_FULL §3: "a complete repo still needs
//! *something* that binds/listens/accepts and hands descriptors to the
//! admission path"). Deliberately thin — every decision beyond socket
//! options belongs to [`crate::pool`].

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use socket2::{Domain, Socket, Type};

/// Bind an IPv4 TCP listener with `SO_REUSEADDR` set and the given backlog
/// (spec §6: "backlog small (5-32)").
pub fn bind(port: u16, backlog: u32) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;
    socket.set_nonblocking(false)?;
    Ok(socket.into())
}

/// Apply the per-client socket options spec §6 requires before handoff to
/// the admission path: `SO_RCVTIMEO` and `SO_SNDTIMEO`.
pub fn configure_accepted(stream: &TcpStream, timeout: Duration) -> std::io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    Ok(())
}
