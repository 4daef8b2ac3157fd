//! Response emitters built on `set_response` and `connect`.

use std::fs::Metadata;
use std::path::Path;
use std::pin::pin;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, Stream, StreamExt, TryStreamExt};
use http::header::{LAST_MODIFIED, LOCATION};
use http::{HeaderValue, StatusCode};
use micro_transport::protocol::body::ResponseBody;
use micro_transport::protocol::{HttpError, SendError};
use mime::Mime;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::Controller;
use crate::error::ControllerError;
use crate::status;

// chunks buffered between a streaming adapter and the connection
const STREAM_BUFFER: usize = 4;

impl Controller {
    /// Answers `200 OK` with an in-memory payload of the given media type.
    pub fn write_output(&mut self, content_type: &Mime, bytes: impl Into<Bytes>) -> Result<(), ControllerError> {
        let bytes = bytes.into();
        self.set_response(StatusCode::OK, status::description(StatusCode::OK), Some(bytes.len() as u64), Some(content_type))?;
        self.connect(Some(ResponseBody::once(bytes)))
    }

    pub fn write_text(&mut self, text: impl Into<String>) -> Result<(), ControllerError> {
        self.write_output(&mime::TEXT_PLAIN_UTF_8, text.into())
    }

    /// Answers `200 OK` with the chunks of `chunks`, produced lazily.
    ///
    /// `length` of `None` sends the chunks with chunked framing; a known length
    /// must equal the sum of the chunk sizes, or the connection is failed.
    pub fn iterate_output<I>(&mut self, content_type: Option<&Mime>, length: Option<u64>, chunks: I) -> Result<(), ControllerError>
    where
        I: IntoIterator<Item = Bytes> + Send + 'static,
        I::IntoIter: Send,
    {
        self.stream_output(content_type, length, futures::stream::iter(chunks))
    }

    /// Answers `200 OK` with the chunks of `chunks`.
    ///
    /// The stream is driven by a single-shot adapter dispatched into the
    /// controller's scope. Terminating the scope fails the body, which ends the
    /// connection rather than leave a truncated response looking complete.
    pub fn stream_output<S>(&mut self, content_type: Option<&Mime>, length: Option<u64>, chunks: S) -> Result<(), ControllerError>
    where
        S: Stream<Item = Bytes> + Send + 'static,
    {
        self.set_response(StatusCode::OK, status::description(StatusCode::OK), length, content_type)?;

        let (mut sender, receiver) = mpsc::channel::<Result<Bytes, HttpError>>(STREAM_BUFFER);
        self.connect(Some(ResponseBody::from_stream(receiver)))?;

        let channel_id = self.channel_id;
        let cancelled = self.scope.cancelled();
        self.dispatch(async move {
            let mut chunks = pin!(chunks);
            let mut cancelled = pin!(cancelled);
            loop {
                tokio::select! {
                    _ = &mut cancelled => {
                        debug!(%channel_id, "response stream interrupted by termination");
                        let _ = sender.try_send(Err(SendError::invalid_body("response stream interrupted").into()));
                        return;
                    }
                    next = chunks.next() => {
                        let Some(bytes) = next else { return };
                        if sender.send(Ok(bytes)).await.is_err() {
                            debug!(%channel_id, "response receiver dropped, stopping stream");
                            return;
                        }
                    }
                }
            }
        });
        Ok(())
    }

    /// Answers `200 OK` with the contents of the file at `path`.
    ///
    /// `Last-Modified` is taken from the stored modification time.
    pub async fn read_file_into_output(&mut self, path: impl AsRef<Path>, content_type: Option<&Mime>) -> Result<(), ControllerError> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        let metadata = file.metadata().await?;

        self.add_last_modified(&metadata);
        self.set_response(StatusCode::OK, status::description(StatusCode::OK), Some(metadata.len()), content_type)?;

        let chunks = ReaderStream::new(file).map_err(|e| HttpError::from(SendError::io(e)));
        self.connect(Some(ResponseBody::from_stream(chunks)))
    }

    /// Answers with the headers [`read_file_into_output`](Self::read_file_into_output)
    /// would send, without the body.
    pub async fn send_file_head(&mut self, path: impl AsRef<Path>, content_type: Option<&Mime>) -> Result<(), ControllerError> {
        let metadata = tokio::fs::metadata(path.as_ref()).await?;

        self.add_last_modified(&metadata);
        self.set_response(StatusCode::OK, status::description(StatusCode::OK), Some(metadata.len()), content_type)?;
        self.connect(None)
    }

    /// Redirects to `location` with `302 Found`, discarding the request body.
    pub fn redirect(&mut self, location: &str) -> Result<(), ControllerError> {
        let location = HeaderValue::from_str(location)?;
        self.add_header(LOCATION, location);
        self.set_response(StatusCode::FOUND, "Found", Some(0), None)?;
        self.connect(None)?;
        self.accept(None)
    }

    fn add_last_modified(&mut self, metadata: &Metadata) {
        let Ok(modified) = metadata.modified() else { return };
        let date = httpdate::fmt_http_date(modified);
        if let Ok(value) = HeaderValue::from_str(&date) {
            self.headers.insert(LAST_MODIFIED, value);
        }
    }
}
