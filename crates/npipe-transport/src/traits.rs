use crate::error::Result;
use crate::timeout::Timeout;

/// Byte-stream operations a connected pipe end provides to higher layers.
///
/// Message framing is written against this trait so it does not depend on
/// the concrete handle type.
pub trait PipeIo {
    /// Fill `buf` completely within `timeout`.
    fn read_exact(&self, buf: &mut [u8], timeout: Timeout) -> Result<()>;

    /// Write all of `buf`.
    fn write(&self, buf: &[u8]) -> Result<()>;
}

impl<T: PipeIo + ?Sized> PipeIo for &T {
    fn read_exact(&self, buf: &mut [u8], timeout: Timeout) -> Result<()> {
        (**self).read_exact(buf, timeout)
    }

    fn write(&self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }
}

impl<T: PipeIo + ?Sized> PipeIo for std::sync::Arc<T> {
    fn read_exact(&self, buf: &mut [u8], timeout: Timeout) -> Result<()> {
        (**self).read_exact(buf, timeout)
    }

    fn write(&self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }
}

#[cfg(unix)]
impl PipeIo for crate::handle::PipeHandle {
    fn read_exact(&self, buf: &mut [u8], timeout: Timeout) -> Result<()> {
        crate::handle::PipeHandle::read_exact(self, buf, timeout)
    }

    fn write(&self, buf: &[u8]) -> Result<()> {
        crate::handle::PipeHandle::write(self, buf)
    }
}
