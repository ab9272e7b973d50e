//! Assembly of single-file `multipart/form-data` bodies.
//!
//! The filesystem-write RPC takes a buffered multipart envelope with
//! exactly one `file` part. Incoming `files/write` bodies are re-encoded
//! into that shape (all incoming parts concatenated), and the uid spawn
//! hook composes one from scratch for its timestamp file.

use bytes::Bytes;
use uuid::Uuid;

/// A finished multipart body plus the content type announcing its
/// boundary.
#[derive(Debug, Clone)]
pub struct EncodedForm {
    pub content_type: String,
    pub body: Bytes,
}

/// Incrementally writes one `file` form part.
#[derive(Debug)]
pub struct FormFileWriter {
    boundary: String,
    buf: Vec<u8>,
}

impl FormFileWriter {
    /// Starts a form with a single part named `file` carrying `file_name`.
    pub fn new(file_name: &str) -> Self {
        let boundary = Uuid::new_v4().simple().to_string();
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        buf.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        Self { boundary, buf }
    }

    /// Appends file content.
    pub fn write(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Closes the form and returns the envelope.
    pub fn finish(mut self) -> EncodedForm {
        let content_type = format!("multipart/form-data; boundary={}", self.boundary);
        self.buf
            .extend_from_slice(format!("\r\n--{}--\r\n", self.boundary).as_bytes());
        EncodedForm {
            content_type,
            body: Bytes::from(self.buf),
        }
    }
}

/// One-shot encoding of a small in-memory file.
pub fn encode_file(file_name: &str, content: &[u8]) -> EncodedForm {
    let mut writer = FormFileWriter::new(file_name);
    writer.write(content);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_one_file_part() {
        let form = encode_file("time.txt", b"1700000000");
        let body = String::from_utf8(form.body.to_vec()).unwrap();

        let boundary = form
            .content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();

        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("name=\"file\"; filename=\"time.txt\""));
        assert!(body.contains("1700000000"));
        assert!(body.ends_with(&format!("\r\n--{boundary}--\r\n")));
    }

    #[test]
    fn chunked_writes_concatenate() {
        let mut writer = FormFileWriter::new("upload");
        writer.write(b"hello ");
        writer.write(b"world");
        let form = writer.finish();

        let body = String::from_utf8(form.body.to_vec()).unwrap();
        assert!(body.contains("hello world"));
    }

    #[test]
    fn boundaries_are_unique_per_form() {
        let a = encode_file("a", b"x");
        let b = encode_file("a", b"x");
        assert_ne!(a.content_type, b.content_type);
    }
}
