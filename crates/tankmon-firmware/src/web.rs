//! HTTP workers serving the telemetry endpoint on both interfaces

use embassy_net::Stack;
use embassy_net::tcp::{Error as TcpError, TcpSocket};
use embassy_time::{Duration, Timer};
use log::{debug, info, warn};
use tankmon_core::http::{MAX_REQUEST_SIZE, head_complete};
use tankmon_core::telemetry::{TelemetryService, TelemetryState};

pub const HTTP_PORT: u16 = 80;
/// One worker per network stack.
pub const HTTP_WORKER_COUNT: usize = 2;

#[embassy_executor::task(pool_size = HTTP_WORKER_COUNT)]
pub async fn http_worker(stack: Stack<'static>, state: &'static TelemetryState, name: &'static str) {
    let mut rx_buf = [0u8; MAX_REQUEST_SIZE];
    let mut tx_buf = [0u8; 512];
    let service = TelemetryService::new(state);

    info!("HTTP worker {} starting (port={})", name, HTTP_PORT);

    loop {
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(Duration::from_secs(10)));

        match socket.accept(HTTP_PORT).await {
            Ok(()) => {
                if let Err(e) = serve(&mut socket, &service).await {
                    warn!("HTTP worker {} connection error: {:?}", name, e);
                }
            }
            Err(e) => {
                warn!("HTTP worker {} accept error: {:?}", name, e);
                Timer::after(Duration::from_millis(200)).await;
            }
        }

        socket.close();
        let _ = socket.flush().await;
        socket.abort();
    }
}

async fn serve(socket: &mut TcpSocket<'_>, service: &TelemetryService<'_>) -> Result<(), TcpError> {
    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0;

    // Read until the end of the headers or a full buffer.
    while total < buf.len() {
        let n = socket.read(&mut buf[total..]).await?;
        if n == 0 {
            if total == 0 {
                return Ok(());
            }
            break;
        }
        total += n;
        if head_complete(&buf[..total]) {
            break;
        }
    }

    let response = service.handle(&buf[..total]);
    debug!("HTTP {} ({} bytes)", response.status.line(), response.body.len());

    write_all(socket, response.head().as_bytes()).await?;
    write_all(socket, response.body.as_bytes()).await?;
    socket.flush().await
}

async fn write_all(socket: &mut TcpSocket<'_>, mut bytes: &[u8]) -> Result<(), TcpError> {
    while !bytes.is_empty() {
        let n = socket.write(bytes).await?;
        if n == 0 {
            return Err(TcpError::ConnectionReset);
        }
        bytes = &bytes[n..];
    }
    Ok(())
}
