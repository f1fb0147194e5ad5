use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Writes fragments into a partial file at their final offsets, then
/// promotes it to the target path once every range has landed.
pub struct Assembler {
    partial_path: PathBuf,
    file: tokio::sync::Mutex<File>,
}

impl Assembler {
    pub async fn create(partial_path: &Path, total_size: Option<u64>) -> anyhow::Result<Self> {
        if let Some(parent) = partial_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(partial_path)
            .await
            .with_context(|| format!("open {}", partial_path.display()))?;

        let assembler = Self {
            partial_path: partial_path.to_path_buf(),
            file: tokio::sync::Mutex::new(file),
        };

        if let Some(size) = total_size {
            // sparse pre-allocation; some filesystems reject it
            let f = assembler.file.lock().await;
            f.set_len(size).await.ok();
        }

        Ok(assembler)
    }

    pub async fn write_at(&self, offset: u64, data: &[u8]) -> anyhow::Result<()> {
        let mut f = self.file.lock().await;
        f.seek(std::io::SeekFrom::Start(offset)).await?;
        f.write_all(data).await?;
        Ok(())
    }

    /// Flush buffered writes and move the partial file over the target.
    pub async fn finalize(&self, target: &Path) -> anyhow::Result<()> {
        {
            let mut f = self.file.lock().await;
            f.flush().await?;
        }
        if tokio::fs::metadata(target).await.is_ok() {
            tokio::fs::remove_file(target).await.ok();
        }
        tokio::fs::rename(&self.partial_path, target)
            .await
            .with_context(|| {
                format!("rename {} -> {}", self.partial_path.display(), target.display())
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_land_at_their_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("file.partial");
        let target = dir.path().join("file.bin");

        let assembler = Assembler::create(&partial, Some(10)).await.unwrap();
        assembler.write_at(5, b"world").await.unwrap();
        assembler.write_at(0, b"hello").await.unwrap();
        assembler.finalize(&target).await.unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"helloworld");
        assert!(tokio::fs::metadata(&partial).await.is_err());
    }

    #[tokio::test]
    async fn finalize_replaces_an_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("file.partial");
        let target = dir.path().join("file.bin");
        tokio::fs::write(&target, b"stale").await.unwrap();

        let assembler = Assembler::create(&partial, None).await.unwrap();
        assembler.write_at(0, b"fresh").await.unwrap();
        assembler.finalize(&target).await.unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"fresh");
    }
}
