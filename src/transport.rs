//! Transport seam between the connection and the outside world.
//!
//! The connection never touches sockets, headers or compression itself.
//! A [`Transport`] resolves an endpoint to a decompressed byte stream and
//! translates the conditional-fetch and live-mode negotiation into plain
//! values: the request carries an optional if-modified-since instant and
//! a request-live flag, the response reports whether the source honored
//! live mode and what its last-modified instant is. How those become
//! headers (RFC 1123 dates, the live-mode capability header) is the
//! implementation's concern.

use crate::error::Result;
use std::fs::File;
use std::io::Read;
use std::time::SystemTime;

/// One fetch attempt.
#[derive(Debug)]
pub struct FetchRequest<'a> {
    /// Endpoint from the feed address: a URL, host:port pair or local
    /// file path, interpreted by the transport.
    pub endpoint: &'a str,

    /// Ask the source to hold the response open and push updates.
    pub request_live: bool,

    /// Ask the source to short-circuit with [`FetchResponse::NotModified`]
    /// if nothing changed since this instant.
    pub if_modified_since: Option<SystemTime>,
}

/// Outcome of one fetch attempt.
pub enum FetchResponse {
    /// The source reports no change since `if_modified_since`.
    NotModified,

    /// Response body, already decompressed.
    Stream {
        /// Whether the source confirmed live-update support.
        live: bool,
        /// Last-modified instant reported by the source, if any.
        last_modified: Option<SystemTime>,
        /// Decompressed body.
        body: Box<dyn Read + Send>,
    },
}

/// Resolves endpoints to byte streams.
///
/// Implementations own all wire concerns: connection opening, status
/// verification, header encoding and decompression (gzip/zip sniffing by
/// magic bytes). Non-success statuses surface as errors.
pub trait Transport: Send {
    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<FetchResponse>;
}

/// Transport reading the endpoint as a local file path.
///
/// The file's mtime doubles as the last-modified instant, so repeated
/// polls of an untouched file short-circuit the same way a conditional
/// HTTP fetch would. A file is a static snapshot; live mode is never
/// confirmed.
#[derive(Debug, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<FetchResponse> {
        let file = File::open(request.endpoint)?;
        let modified = file.metadata()?.modified().ok();

        if let (Some(since), Some(modified)) = (request.if_modified_since, modified) {
            if modified <= since {
                return Ok(FetchResponse::NotModified);
            }
        }

        Ok(FetchResponse::Stream {
            live: false,
            last_modified: modified,
            body: Box::new(file),
        })
    }
}
