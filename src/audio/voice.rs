use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

/// One playing instance of a buffer. Voices are one-shot: they run to the
/// end of the buffer and then go idle.
#[derive(Clone, Debug)]
pub struct Voice {
    buffer: Arc<SampleBuffer>,
    pos: usize,
    gain: f32,
}

impl Voice {
    pub fn new(buffer: Arc<SampleBuffer>, gain: f32) -> Self {
        Self { buffer, pos: 0, gain }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.buffer.data.len()
    }

    /// Mix this voice into `out`. Returns false once the voice has finished.
    pub fn render_into(&mut self, out: &mut [StereoFrame]) -> bool {
        let data = &self.buffer.data;
        let remaining = data.len().saturating_sub(self.pos);
        let n = remaining.min(out.len());
        for (frame, sample) in out[..n].iter_mut().zip(&data[self.pos..self.pos + n]) {
            frame.mix(sample.scaled(self.gain));
        }
        self.pos += n;
        !self.is_done()
    }
}
