//! Library surface of the `docload` binary: the logging setup and the
//! filesystem target, both reusable from integration tests.

pub mod fs_target;
pub mod logging;
