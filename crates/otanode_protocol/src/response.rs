//! Response framing.
//!
//! Responses always declare their length and close the connection; the
//! device never keeps a connection alive.

use crate::error::HttpError;
use std::io::{self, Write};

/// Canonical reason phrase for the statuses the device emits.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

/// Content type for a static resource, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext);
    match extension {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Writes a status line and headers, ending with the blank line.
pub fn write_response_head<W: Write>(
    writer: &mut W,
    status: u16,
    content_type: &str,
    content_length: u64,
) -> io::Result<()> {
    write!(
        writer,
        "HTTP/1.1 {status} {}\r\ncontent-type: {content_type}\r\ncontent-length: {content_length}\r\nconnection: close\r\n\r\n",
        reason_phrase(status)
    )
}

/// Writes a complete response with an in-memory body.
pub fn write_response<W: Write>(
    writer: &mut W,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> io::Result<()> {
    write_response_head(writer, status, content_type, body.len() as u64)?;
    writer.write_all(body)?;
    writer.flush()
}

/// Writes an error response carrying the explanation as plain text.
pub fn write_error<W: Write>(writer: &mut W, error: &HttpError) -> io::Result<()> {
    write_response(writer, error.status, "text/plain", error.explanation.as_bytes())
}
