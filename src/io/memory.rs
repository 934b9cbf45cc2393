use super::ReadAt;
use anyhow::Result;
use async_trait::async_trait;

/// Reader over an archive already held in memory.
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_reads_at_the_tail() {
        let reader = MemoryReader::new(b"PK\x03\x04abcd".to_vec());
        let mut buf = [0u8; 6];
        assert_eq!(reader.read_at(4, &mut buf).await.unwrap(), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(reader.read_at(100, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_exact_at_reports_truncation() {
        let reader = MemoryReader::new(vec![0u8; 10]);
        let mut buf = [0u8; 8];
        reader.read_exact_at(2, &mut buf).await.unwrap();
        let err = reader.read_exact_at(4, &mut buf).await.unwrap_err();
        assert!(err.to_string().contains("Unexpected end of data"));
    }
}
