use tokio::io::{AsyncRead, AsyncReadExt};

use store_api::StoreError;

/// Максимальная длина строки по умолчанию (1 MiB).
pub const DEFAULT_MAX_LINE: usize = 1 << 20;

const READ_CHUNK: usize = 8192;

/// Буфер чтения одного соединения.
///
/// Remembers how far the pending bytes were already searched for `\n`, so
/// a long line arriving in many chunks is scanned once.
#[derive(Debug, Default)]
pub struct FrameBuf {
    pending: Vec<u8>,
    scanned: usize,
}

impl FrameBuf {
    pub fn new() -> Self {
        Self { pending: Vec::with_capacity(READ_CHUNK), scanned: 0 }
    }

    /// Сколько байт ждут конца строки.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }
}

/// Newline-delimited framing with a line length cap.
#[derive(Debug, Clone, Copy)]
pub struct LinesFraming {
    max_line: usize,
}

impl Default for LinesFraming {
    fn default() -> Self {
        Self { max_line: DEFAULT_MAX_LINE }
    }
}

impl LinesFraming {
    /// `max_line = 0` отключает ограничение.
    pub fn new(max_line: usize) -> Self {
        Self { max_line }
    }

    fn too_long(&self, len: usize) -> Option<StoreError> {
        (self.max_line > 0 && len > self.max_line)
            .then(|| StoreError::protocol(format!("frame of {len} bytes exceeds max_line {}", self.max_line)))
    }

    /// Вынуть из буфера следующую полную строку (без `\n` и `\r`).
    pub fn next_frame(&self, buf: &mut FrameBuf) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(offset) = buf.pending[buf.scanned..].iter().position(|&b| b == b'\n') else {
            buf.scanned = buf.pending.len();
            return match self.too_long(buf.scanned) {
                Some(e) => Err(e),
                None => Ok(None),
            };
        };

        let end = buf.scanned + offset;
        let mut line: Vec<u8> = buf.pending.drain(..=end).collect();
        buf.scanned = 0;
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        match self.too_long(line.len()) {
            Some(e) => Err(e),
            None => Ok(Some(line)),
        }
    }

    pub fn encode(&self, data: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(data);
        out.push(b'\n');
    }

    /// Прочитать следующую строку из потока. `Ok(None)` = EOF на границе строки.
    pub async fn read_frame<R: AsyncRead + Unpin>(
        &self,
        reader: &mut R,
        buf: &mut FrameBuf,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.next_frame(buf)? {
                return Ok(Some(line));
            }
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                if buf.pending() == 0 {
                    return Ok(None);
                }
                return Err(StoreError::io(format!("connection closed mid-frame ({} bytes buffered)", buf.pending())));
            }
            buf.push(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fed(bytes: &[u8]) -> FrameBuf {
        let mut buf = FrameBuf::new();
        buf.push(bytes);
        buf
    }

    #[test]
    fn frames_drop_newline_and_cr() {
        let f = LinesFraming::default();
        let mut buf = fed(b"abc\r\nrest");
        assert_eq!(f.next_frame(&mut buf).unwrap(), Some(b"abc".to_vec()));
        assert_eq!(f.next_frame(&mut buf).unwrap(), None);
        assert_eq!(buf.pending(), 4);
    }

    #[test]
    fn scan_resumes_where_it_stopped() {
        let f = LinesFraming::default();
        let mut buf = fed(b"par");
        assert_eq!(f.next_frame(&mut buf).unwrap(), None);
        assert_eq!(buf.scanned, 3);
        buf.push(b"tial\nnext\n");
        assert_eq!(f.next_frame(&mut buf).unwrap(), Some(b"partial".to_vec()));
        assert_eq!(buf.scanned, 0);
        assert_eq!(f.next_frame(&mut buf).unwrap(), Some(b"next".to_vec()));
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn max_line_applies_with_and_without_newline() {
        let f = LinesFraming::new(4);
        assert!(f.next_frame(&mut fed(b"12345")).is_err());
        assert!(f.next_frame(&mut fed(b"12345\n")).is_err());
        assert_eq!(f.next_frame(&mut fed(b"1234\n")).unwrap(), Some(b"1234".to_vec()));
        assert_eq!(LinesFraming::new(0).next_frame(&mut fed(&[b'x'; 64])).unwrap(), None);
    }

    #[tokio::test]
    async fn read_frame_handles_split_input() {
        let f = LinesFraming::default();
        let data: &[u8] = b"first\nsecond\n";
        let mut reader = data;
        let mut buf = FrameBuf::new();
        assert_eq!(f.read_frame(&mut reader, &mut buf).await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(f.read_frame(&mut reader, &mut buf).await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(f.read_frame(&mut reader, &mut buf).await.unwrap(), None);
    }

    #[tokio::test]
    async fn long_line_over_many_reads_is_assembled() {
        let f = LinesFraming::default();
        let mut data = vec![b'a'; READ_CHUNK * 5 + 17];
        data.push(b'\n');
        let mut reader: &[u8] = &data;
        let mut buf = FrameBuf::new();
        let line = f.read_frame(&mut reader, &mut buf).await.unwrap().unwrap();
        assert_eq!(line.len(), READ_CHUNK * 5 + 17);
    }

    #[tokio::test]
    async fn read_frame_reports_truncated_frame() {
        let f = LinesFraming::default();
        let mut reader: &[u8] = b"dangling";
        let mut buf = FrameBuf::new();
        assert!(f.read_frame(&mut reader, &mut buf).await.is_err());
    }
}
