//! OTA request handling for one connection.
//!
//! Each connection carries exactly one request. The head is parsed with a
//! bounded buffer, the path selects an endpoint, and every failure is turned
//! into a response at [`OtaHandler::handle_connection`] so the serving loop
//! never sees it.
//!
//! | path | methods | purpose |
//! |---|---|---|
//! | `/ota-listing` | GET | `name hash` lines for every OTA-visible file |
//! | `/ota/<name>` | GET, PUT, DELETE | read, authenticated write, authenticated delete |
//! | `/config` | GET | the rendered configuration file |
//! | `/reboot` | any | acknowledge, then reset |
//! | anything else | GET | static files from the web root |

use crate::config::NodeConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::files::{copy_exact, hash_file, sync_directory, PartialFile};
use otanode_protocol::{
    begin_put_digest, content_type_for, delete_digest, is_ota_filename, is_static_segment,
    ota_target, write_error, write_response, write_response_head, Credentials, FileListing,
    HttpError, KeyedDigest, NameRejection, RequestHead, RequestHeadParser, SharedSecret,
};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";

/// What the serving loop should do after a connection was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Keep accepting connections.
    Continue,
    /// A reboot was acknowledged; reset the device.
    Reboot,
}

/// Serves OTA requests against a device root directory.
pub struct OtaHandler {
    root: PathBuf,
    config: NodeConfig,
    secret: SharedSecret,
    parser: RequestHeadParser,
}

impl OtaHandler {
    /// Creates a handler for `root` with an already loaded secret.
    pub fn new(
        root: impl Into<PathBuf>,
        config: NodeConfig,
        secret: SharedSecret,
    ) -> DeviceResult<Self> {
        config.validate()?;
        let parser = RequestHeadParser::new(config.chunk_size);
        Ok(Self {
            root: root.into(),
            config,
            secret,
            parser,
        })
    }

    /// Creates a handler, reading the secret from the configured secret file.
    pub fn open(root: impl Into<PathBuf>, config: NodeConfig) -> DeviceResult<Self> {
        let root = root.into();
        let path = root.join(&config.secret_file);
        let secret_error = |reason: String| DeviceError::Secret {
            path: path.display().to_string(),
            reason,
        };
        let contents = fs::read(&path).map_err(|e| secret_error(e.to_string()))?;
        let secret =
            SharedSecret::from_file_contents(&contents).map_err(|e| secret_error(e.to_string()))?;
        Self::new(root, config, secret)
    }

    /// Returns the device root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Handles one connection from request head to response.
    ///
    /// Never fails: rejected requests get their status, internal failures
    /// are logged and answered with 500 when no response bytes were sent yet.
    pub fn handle_connection<S: Read + Write>(&self, stream: &mut S) -> ConnectionOutcome {
        let mut conn = Connection::new(stream);
        let error = match self.serve(&mut conn) {
            Ok(outcome) => return outcome,
            Err(e) => e,
        };

        let response = match error {
            DeviceError::Http(e) => {
                warn!(status = e.status, explanation = %e.explanation, "request rejected");
                e
            }
            e => {
                error!(error = %e, "request failed");
                HttpError::new(500, "internal error")
            }
        };
        if conn.written == 0 {
            if let Err(e) = write_error(&mut conn, &response) {
                debug!(error = %e, "could not deliver error response");
            }
        }
        ConnectionOutcome::Continue
    }

    fn serve<S: Read + Write>(
        &self,
        conn: &mut Connection<'_, S>,
    ) -> DeviceResult<ConnectionOutcome> {
        let head = self.parser.parse(conn)?;
        let body_start = conn.read;
        let result = self.dispatch(&head, conn);
        if result.is_err() {
            // The peer is still sending; closing now would reset the
            // connection before it reads the error.
            self.discard_body(&head, conn, body_start);
        }
        result
    }

    fn dispatch<S: Read + Write>(
        &self,
        head: &RequestHead,
        conn: &mut Connection<'_, S>,
    ) -> DeviceResult<ConnectionOutcome> {
        let path = &head.path;
        let first = path.first().map(Vec::as_slice).unwrap_or_default();

        match first {
            b"ota-listing" if path.len() == 1 => {
                require_method(head, &["GET"])?;
                self.list(conn)
            }
            b"ota" => self.ota(head, conn),
            b"config" if path.len() == 1 => {
                require_method(head, &["GET"])?;
                let config_file = self.root.join(&self.config.config_file);
                self.send_file(conn, &config_file, content_type_for(&self.config.config_file))
            }
            b"reboot" if path.len() == 1 => {
                info!("reboot requested");
                write_response(conn, 200, TEXT_PLAIN, b"rebooting")?;
                Ok(ConnectionOutcome::Reboot)
            }
            _ => self.static_file(head, conn),
        }
    }

    /// Reads and drops whatever part of the declared body is still unread.
    fn discard_body<S: Read>(
        &self,
        head: &RequestHead,
        conn: &mut Connection<'_, S>,
        body_start: u64,
    ) {
        let on_wire = head
            .content_length
            .saturating_sub(head.leftover.len() as u64);
        let mut remaining = on_wire.saturating_sub(conn.read - body_start);
        if remaining == 0 {
            return;
        }

        let mut buf = vec![0u8; self.config.chunk_size];
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            match conn.read(&mut buf[..want]) {
                Ok(0) => break,
                Ok(n) => remaining -= n as u64,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, "could not drain request body");
                    break;
                }
            }
        }
        debug!(unread = remaining, "discarded rejected request body");
    }

    fn list<W: Write>(&self, conn: &mut W) -> DeviceResult<ConnectionOutcome> {
        let mut buf = vec![0u8; self.config.chunk_size];
        let mut listing = FileListing::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !is_ota_filename(&name) || self.config.is_protected(&name) {
                continue;
            }
            let hash = hash_file(&entry.path(), &mut buf)?;
            listing.insert(name, hash);
        }
        debug!(files = listing.len(), "listing");
        write_response(conn, 200, TEXT_PLAIN, listing.to_body().as_bytes())?;
        Ok(ConnectionOutcome::Continue)
    }

    fn ota<S: Read + Write>(
        &self,
        head: &RequestHead,
        conn: &mut S,
    ) -> DeviceResult<ConnectionOutcome> {
        let name = match ota_target(&head.path[1..]) {
            Ok(name) => name,
            Err(NameRejection::InvalidCharacters) => {
                return Err(HttpError::bad_request("invalid filename").into())
            }
            Err(NameRejection::Nested) => {
                return Err(HttpError::not_found("ota is single-directory only").into())
            }
        };
        if self.config.is_protected(name) {
            return Err(HttpError::forbidden("file is not accessible over ota").into());
        }
        let target = self.root.join(name);

        match head.method.as_str() {
            "GET" => self.send_file(conn, &target, OCTET_STREAM),
            "PUT" => self.put(head, name, &target, conn),
            "DELETE" => self.delete(head, name, &target, conn),
            _ => Err(HttpError::method_not_allowed("ota supports GET, PUT and DELETE").into()),
        }
    }

    fn put<S: Read + Write>(
        &self,
        head: &RequestHead,
        name: &str,
        target: &Path,
        conn: &mut S,
    ) -> DeviceResult<ConnectionOutcome> {
        if !head.has_header("content-length") {
            return Err(HttpError::new(411, "content-length required").into());
        }
        let credentials = Credentials::from_query(&head.query_params())?;
        if target.is_dir() {
            return Err(HttpError::forbidden("target is a directory").into());
        }

        let mut digest = begin_put_digest(&self.secret, name, credentials.noop);
        let mut partial = if credentials.noop {
            None
        } else {
            Some(PartialFile::create(&self.root, name)?)
        };
        self.receive_body(head, conn, &mut digest, partial.as_mut())?;

        if !digest.verify(credentials.token.as_bytes()) {
            return Err(HttpError::bad_request("invalid sparkle").into());
        }
        match partial {
            Some(partial) => {
                partial.commit(target)?;
                info!(file = name, bytes = head.content_length, "file written");
            }
            None => info!(file = name, "noop write authenticated"),
        }
        write_response(conn, 200, TEXT_PLAIN, b"ok")?;
        Ok(ConnectionOutcome::Continue)
    }

    /// Streams exactly `content_length` body bytes into the digest and sink.
    fn receive_body<R: Read>(
        &self,
        head: &RequestHead,
        conn: &mut R,
        digest: &mut KeyedDigest,
        mut sink: Option<&mut PartialFile>,
    ) -> DeviceResult<()> {
        let mut remaining = head.content_length;
        let prefix = (head.leftover.len() as u64).min(remaining) as usize;
        let mut feed = |chunk: &[u8]| -> io::Result<()> {
            digest.update(chunk);
            match sink.as_deref_mut() {
                Some(file) => file.write_all(chunk),
                None => Ok(()),
            }
        };

        feed(&head.leftover[..prefix])?;
        remaining -= prefix as u64;

        let mut buf = vec![0u8; self.config.chunk_size];
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = match conn.read(&mut buf[..want]) {
                Ok(0) => return Err(HttpError::bad_request("request body truncated").into()),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            feed(&buf[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }

    fn delete<W: Write>(
        &self,
        head: &RequestHead,
        name: &str,
        target: &Path,
        conn: &mut W,
    ) -> DeviceResult<ConnectionOutcome> {
        let credentials = Credentials::from_query(&head.query_params())?;
        let digest = delete_digest(&self.secret, name, credentials.noop);
        if !digest.verify(credentials.token.as_bytes()) {
            return Err(HttpError::bad_request("invalid sparkle").into());
        }

        let metadata = match fs::metadata(target) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(HttpError::not_found("file not found").into())
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.is_dir() {
            return Err(HttpError::forbidden("target is a directory").into());
        }

        if credentials.noop {
            info!(file = name, "noop delete authenticated");
        } else {
            fs::remove_file(target)?;
            sync_directory(&self.root)?;
            info!(file = name, "file deleted");
        }
        write_response(conn, 200, TEXT_PLAIN, b"ok")?;
        Ok(ConnectionOutcome::Continue)
    }

    fn static_file<W: Write>(
        &self,
        head: &RequestHead,
        conn: &mut W,
    ) -> DeviceResult<ConnectionOutcome> {
        match head.method.as_str() {
            "GET" => {}
            "PUT" | "DELETE" => {
                return Err(HttpError::method_not_allowed("static files are read-only").into())
            }
            _ => return Err(HttpError::new(501, "method not implemented").into()),
        }

        let mut path = self.root.join(&self.config.web_root);
        let name = if head.path.len() == 1 && head.path[0].is_empty() {
            path.push(&self.config.index);
            self.config.index.clone()
        } else {
            let mut last = String::new();
            for segment in &head.path {
                if !is_static_segment(segment) {
                    return Err(HttpError::not_found("no such resource").into());
                }
                last = String::from_utf8_lossy(segment).into_owned();
                path.push(&last);
            }
            last
        };
        self.send_file(conn, &path, content_type_for(&name))
    }

    /// Streams a regular file in chunks, or answers 404.
    fn send_file<W: Write>(
        &self,
        conn: &mut W,
        path: &Path,
        content_type: &str,
    ) -> DeviceResult<ConnectionOutcome> {
        let not_found = || DeviceError::from(HttpError::not_found("file not found"));
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        let mut buf = vec![0u8; self.config.chunk_size];
        write_response_head(conn, 200, content_type, metadata.len())?;
        copy_exact(&mut file, conn, metadata.len(), &mut buf)?;
        conn.flush()?;
        Ok(ConnectionOutcome::Continue)
    }
}

fn require_method(head: &RequestHead, allowed: &[&str]) -> Result<(), HttpError> {
    if allowed.contains(&head.method.as_str()) {
        Ok(())
    } else {
        Err(HttpError::method_not_allowed(format!(
            "allowed: {}",
            allowed.join(", ")
        )))
    }
}

/// A borrowed stream that remembers how many response bytes went out.
struct Connection<'a, S> {
    inner: &'a mut S,
    read: u64,
    written: u64,
}

impl<'a, S> Connection<'a, S> {
    fn new(inner: &'a mut S) -> Self {
        Self {
            inner,
            read: 0,
            written: 0,
        }
    }
}

impl<S: Read> Read for Connection<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        Ok(n)
    }
}

impl<S: Write> Write for Connection<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
