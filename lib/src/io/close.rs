use std::{
    io,
    ops::{Deref, DerefMut},
};

/// A resource holding something (a file handle, a socket, ...) that should be released once it's
/// no longer needed.
pub trait Close {
    /// Releases the resources held by `self`.
    ///
    /// Closing an already closed resource has no effect. An implementation that fails to close
    /// should still consider itself closed and report the failure.
    ///
    /// The default does nothing, for types that hold nothing to release.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: Close + ?Sized> Close for Box<C> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<C: Close + ?Sized> Close for &mut C {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Closes the wrapped resource when dropped.
///
/// Call [`Closing::close`] to observe the result of closing. A failure while closing on drop is
/// only logged.
pub struct Closing<C: Close> {
    inner: C,
}

impl<C: Close> Closing<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Closes the resource now and returns the result.
    pub fn close(mut self) -> io::Result<()> {
        // Dropping `self` afterwards closes again which is a no-op for a closed resource.
        self.inner.close()
    }
}

impl<C: Close> Deref for Closing<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<C: Close> DerefMut for Closing<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<C: Close> Drop for Closing<C> {
    fn drop(&mut self) {
        if let Err(error) = self.inner.close() {
            tracing::warn!(?error, "failed to close resource");
        }
    }
}
