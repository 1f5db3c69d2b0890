pub mod mock_receiver;
#[cfg(test)]
/// Unit tests for the mock receiver.
mod tests;

pub use mock_receiver::{MockReceiver, MockReceiverConfig};
