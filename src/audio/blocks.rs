//! Fixed-size block adaptation
//!
//! Hosts are free to call stream callbacks with any buffer length. The relay
//! works in whole codec blocks, so capture input is accumulated until a block
//! is complete and playback output is served out of whole decoded blocks.
//! Both adapters preallocate their storage once.

/// Re-chunks captured samples into exact blocks
pub struct CaptureBlocker {
    block: Vec<f32>,
    filled: usize,
}

impl CaptureBlocker {
    pub fn new(block_len: usize) -> Self {
        Self {
            block: vec![0.0; block_len],
            filled: 0,
        }
    }

    /// Feed host samples, calling `on_block` for every block completed
    pub fn push(&mut self, mut data: &[f32], mut on_block: impl FnMut(&[f32])) {
        while !data.is_empty() {
            let take = (self.block.len() - self.filled).min(data.len());
            self.block[self.filled..self.filled + take].copy_from_slice(&data[..take]);
            self.filled += take;
            data = &data[take..];

            if self.filled == self.block.len() {
                on_block(&self.block);
                self.filled = 0;
            }
        }
    }

    /// Samples waiting for the current block to complete
    pub fn pending(&self) -> usize {
        self.filled
    }
}

/// Serves arbitrary-length output requests from whole blocks
pub struct PlaybackBlocker {
    block: Vec<f32>,
    read: usize,
}

impl PlaybackBlocker {
    pub fn new(block_len: usize) -> Self {
        Self {
            block: vec![0.0; block_len],
            read: block_len,
        }
    }

    /// Fill `out`, calling `next_block` whenever a fresh block is needed
    pub fn fill(&mut self, out: &mut [f32], mut next_block: impl FnMut(&mut [f32])) {
        let mut written = 0;
        while written < out.len() {
            if self.read == self.block.len() {
                next_block(&mut self.block);
                self.read = 0;
            }

            let take = (self.block.len() - self.read).min(out.len() - written);
            out[written..written + take].copy_from_slice(&self.block[self.read..self.read + take]);
            self.read += take;
            written += take;
        }
    }
}
