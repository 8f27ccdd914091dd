//! Minimal `multipart/form-data` encoder for signed storage uploads.
//!
//! The encoded body is kept as [`Bytes`] so a retried upload can resubmit the
//! identical payload without re-reading the file.

use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use rand::distr::Alphanumeric;

const BOUNDARY_LEN: usize = 24;

#[derive(Debug, Clone)]
enum PartBody {
    Text(String),
    File {
        filename: String,
        content_type: mime::Mime,
        data: Bytes,
    },
}

#[derive(Debug, Clone)]
struct Part {
    name: String,
    body: PartBody,
}

/// An in-memory multipart form.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Create an empty form with a random boundary.
    #[must_use]
    pub fn new() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(BOUNDARY_LEN)
            .map(char::from)
            .collect();
        Self {
            boundary: format!("mapi-{suffix}"),
            parts: Vec::new(),
        }
    }

    /// Append a plain text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            body: PartBody::Text(value.into()),
        });
        self
    }

    /// Append a file field.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: mime::Mime,
        data: Bytes,
    ) -> Self {
        self.parts.push(Part {
            name: name.into(),
            body: PartBody::File {
                filename: filename.into(),
                content_type,
                data,
            },
        });
        self
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode all parts into a single body.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for part in &self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");
            match &part.body {
                PartBody::Text(value) => {
                    put_disposition(&mut buf, &part.name, None);
                    buf.put_slice(b"\r\n");
                    buf.put_slice(value.as_bytes());
                }
                PartBody::File {
                    filename,
                    content_type,
                    data,
                } => {
                    put_disposition(&mut buf, &part.name, Some(filename));
                    buf.put_slice(b"Content-Type: ");
                    buf.put_slice(content_type.as_ref().as_bytes());
                    buf.put_slice(b"\r\n\r\n");
                    buf.put_slice(data);
                }
            }
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");
        buf.freeze()
    }
}

fn put_disposition(buf: &mut BytesMut, name: &str, filename: Option<&str>) {
    buf.put_slice(b"Content-Disposition: form-data; name=\"");
    buf.put_slice(escape_quoted(name).as_bytes());
    buf.put_slice(b"\"");
    if let Some(filename) = filename {
        buf.put_slice(b"; filename=\"");
        buf.put_slice(escape_quoted(filename).as_bytes());
        buf.put_slice(b"\"");
    }
    buf.put_slice(b"\r\n");
}

// Quoted-string parameters cannot carry raw quotes or line breaks.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
