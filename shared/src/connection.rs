/// Byte buffers for one end of an ordered, reliable stream.
///
/// The transport appends whatever arrives to `recv_buffer` and writes out
/// whatever has been queued in `send_buffer`. Decoders remove bytes from the
/// front of `recv_buffer` only once a whole message is present.
#[derive(Debug, Default, Clone)]
pub struct Connection {
    pub send_buffer: Vec<u8>,
    pub recv_buffer: Vec<u8>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes read from the transport.
    pub fn receive(&mut self, bytes: &[u8]) {
        self.recv_buffer.extend_from_slice(bytes);
    }

    /// Takes every queued outgoing byte, leaving the send buffer empty.
    pub fn take_outgoing(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.send_buffer)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.send_buffer.is_empty()
    }
}
