/// Produces the test payloads sent by the harness.
pub struct DataGenerator;

impl DataGenerator {
    /// Generate `byte_count / 2` ascending 16-bit samples, little-endian.
    ///
    /// An odd trailing byte is dropped. Samples wrap at `i16::MAX`, the
    /// pattern only has to be reproducible on both sides.
    pub fn generate(byte_count: usize) -> Vec<u8> {
        let count = byte_count / 2;
        let mut bytes = Vec::with_capacity(count * 2);
        for i in 0..count {
            bytes.extend_from_slice(&(i as i16).to_le_bytes());
        }
        bytes
    }
}
