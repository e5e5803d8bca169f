use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::AppError;
use crate::site::SiteParams;
use crate::transfer::sftp_like::{Ssh2Adapter, SftpLike};

fn create_tcp_connection(addr: &str) -> Result<TcpStream, AppError> {
    let mut addrs = addr
        .to_socket_addrs()
        .map_err(|e| AppError::ConnectionError(format!("cannot resolve {}: {}", addr, e)))?;
    let sock = addrs
        .next()
        .ok_or_else(|| AppError::ConnectionError(format!("no address resolved for {}", addr)))?;
    let tcp = TcpStream::connect_timeout(&sock, Duration::from_secs(10))
        .map_err(|e| AppError::ConnectionError(format!("tcp connect to {} failed: {}", addr, e)))?;
    let _ = tcp.set_read_timeout(Some(Duration::from_secs(30)));
    let _ = tcp.set_write_timeout(Some(Duration::from_secs(30)));
    Ok(tcp)
}

/// Opens a fresh SSH session + SFTP channel against `params`, authenticating
/// with the site's password and, when a hostkey was pinned, requiring it to
/// match before authentication proceeds. One connection per Job —
/// no pooling, no reuse across jobs, by deliberate design.
pub fn connect_sftp(params: &SiteParams) -> Result<Box<dyn SftpLike>, AppError> {
    let addr = format!("{}:{}", params.host, params.port);
    let tcp = create_tcp_connection(&addr)?;

    let mut session = ssh2::Session::new()
        .map_err(|e| AppError::ConnectionError(format!("session create failed: {}", e)))?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| AppError::ConnectionError(format!("handshake with {} failed: {}", addr, e)))?;

    if let Some(expected) = &params.hostkey {
        let (actual_key, _kind) = session
            .host_key()
            .ok_or_else(|| AppError::ConnectionError(format!("no host key presented by {}", addr)))?;
        if actual_key != expected.as_slice() {
            return Err(AppError::ConnectionError(format!(
                "host key mismatch for {}: pinned key does not match presented key",
                addr
            )));
        }
    }

    session
        .userauth_password(&params.username, &params.password)
        .map_err(|e| AppError::ConnectionError(format!("authentication to {} failed: {}", addr, e)))?;
    if !session.authenticated() {
        return Err(AppError::ConnectionError(format!("authentication to {} failed", addr)));
    }

    let sftp = session
        .sftp()
        .map_err(|e| AppError::ConnectionError(format!("sftp channel to {} failed: {}", addr, e)))?;
    Ok(Box::new(Ssh2Adapter(sftp)))
}
