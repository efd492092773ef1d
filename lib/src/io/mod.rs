//! Closeable resources and pull-based byte sources.

mod close;
mod slice;
mod source;

pub use self::{
    close::{Close, Closing},
    slice::SliceSource,
    source::{ByteSource, MAX_SKIP_BUFFER_SIZE},
};
