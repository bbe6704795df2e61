//! multipart/form-data synthesis for re-uploading downloaded files

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;

const BOUNDARY_PREFIX: &str = "------------------------toolgate";

/// Random bytes in a boundary (hex encoded, so twice as many characters)
const BOUNDARY_RANDOM_BYTES: usize = 24;

/// Boundary from random bytes, never derived from the content
pub fn generate_boundary() -> String {
    let mut bytes = [0u8; BOUNDARY_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", BOUNDARY_PREFIX, hex::encode(bytes))
}

/// Finished body plus the boundary it was written with
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    body: Bytes,
}

impl MultipartBody {
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the Content-Type header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }
}

pub struct MultipartBuilder {
    boundary: String,
    buf: BytesMut,
}

impl Default for MultipartBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buf: BytesMut::new(),
        }
    }

    /// Plain form field
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part();
        self.put(&format!(
            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
            name
        ));
        self.put(value);
        self.put("\r\n");
        self
    }

    /// File part
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.open_part();
        self.put(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            name,
            filename.replace('"', "%22")
        ));
        self.put(&format!("Content-Type: {}\r\n\r\n", content_type));
        self.buf.put_slice(data);
        self.put("\r\n");
        self
    }

    pub fn finish(mut self) -> MultipartBody {
        let closing = format!("--{}--\r\n", self.boundary);
        self.put(&closing);
        MultipartBody {
            boundary: self.boundary,
            body: self.buf.freeze(),
        }
    }

    fn open_part(&mut self) {
        let delimiter = format!("--{}\r\n", self.boundary);
        self.put(&delimiter);
    }

    fn put(&mut self, s: &str) {
        self.buf.put_slice(s.as_bytes());
    }
}
