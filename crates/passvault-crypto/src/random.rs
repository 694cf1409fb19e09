use passvault_core::{Error, Result};
use rand::{rngs::OsRng, RngCore};
use tracing::debug;

pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        debug!(error = %e, "random generation failed");
        Error::Crypto
    })
}
