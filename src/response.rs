//! The fixed HTTP response payload.
//!
//! The connection handler treats the assembled response as an opaque
//! blob and writes it verbatim; nothing here is parsed or negotiated.

use bytes::Bytes;

/// Fixed header block: 200 OK, HTML content, connection closed after the
/// response. Line endings are LF on purpose, matching the payload this
/// server has always sent.
const HEADER_BLOCK: &str = "HTTP/1.1 200 OK\nContent-Type: text/html\nConnection: close\n\n";

/// Default HTML body.
pub const DEFAULT_BODY: &str = "<!DOCTYPE HTML>\n\
                                <HTML>\n\
                                <BODY>\n\
                                <b> Hello world! </b>\n\
                                </BODY>\n\
                                </HTML>";

/// Assemble the complete response from the fixed header block and a body.
pub fn build(body: &str) -> Bytes {
    let mut payload = String::with_capacity(HEADER_BLOCK.len() + body.len());
    payload.push_str(HEADER_BLOCK);
    payload.push_str(body);
    Bytes::from(payload)
}
