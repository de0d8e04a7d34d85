//! HomeSeer JSON API plumbing.
//!
//! The hardware-free parts live here: value formatting, request construction
//! and status-line parsing. The socket side is in [`http_client`].

use core::fmt::Write;

use heapless::String;

use crate::error::SensorError;

#[cfg(feature = "esp32")]
pub mod http_client;

pub const UPDATE_PATH: &str = "/JSON";
pub const CONTROL_REQUEST: &str = "controldevicebyvalue";

/// Maximum encoded request size.
pub const MAX_REQUEST_LEN: usize = 192;

/// Formats a reading the way the server display expects it: two digits after
/// the decimal point.
pub fn format_value(celsius: f32) -> Result<String<16>, SensorError> {
    let mut value = String::new();
    write!(value, "{celsius:.2}").map_err(|_| SensorError::BufferOverflow)?;
    Ok(value)
}

/// Builds the update request for one device: a GET with exactly one `ref`
/// and one `value` query parameter.
pub fn build_update_request(
    host: &str,
    device_ref: u32,
    value: &str,
) -> Result<String<MAX_REQUEST_LEN>, SensorError> {
    let mut request = String::new();
    write!(
        request,
        "GET {UPDATE_PATH}?request={CONTROL_REQUEST}&ref={device_ref}&value={value} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Connection: close\r\n\
         \r\n"
    )
    .map_err(|_| SensorError::BufferOverflow)?;
    Ok(request)
}

/// Extracts the status code from an HTTP response, if the status line is
/// complete.
pub fn parse_status_code(response: &[u8]) -> Option<u16> {
    let line_end = response.windows(2).position(|w| w == b"\r\n")?;
    let line = core::str::from_utf8(&response[..line_end]).ok()?;
    let mut parts = line.split(' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}
