use std::io::Read;

/// A cryptographically secure source of random bytes.
/// Every read fills the entire buffer it is given.
pub trait Random: Read + Send {
    /// Release any resources held by the generator. Safe to call more than once.
    fn close(&mut self);
}
