//! Small helpers shared by the digest and protocol modules

/// Block accumulator for Merkle-Damgard hashes.
///
/// Holds at most `N - 1` unprocessed bytes between calls; every full block is
/// handed to the compression closure as soon as it is complete.
#[derive(Clone)]
pub(crate) struct BlockBuffer<const N: usize> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> BlockBuffer<N> {
    pub(crate) const fn new() -> Self {
        Self {
            data: [0; N],
            len: 0,
        }
    }

    /// Absorb `input`, compressing every completed block.
    pub(crate) fn feed(&mut self, mut input: &[u8], mut compress: impl FnMut(&[u8; N])) {
        if self.len > 0 {
            let take = (N - self.len).min(input.len());
            self.data[self.len..self.len + take].copy_from_slice(&input[..take]);
            self.len += take;
            input = &input[take..];
            if self.len < N {
                return;
            }
            compress(&self.data);
            self.len = 0;
        }

        while let Some((block, rest)) = input.split_first_chunk::<N>() {
            compress(block);
            input = rest;
        }

        self.data[..input.len()].copy_from_slice(input);
        self.len = input.len();
    }

    /// Apply the standard `1` bit, zero fill and trailing length field, then
    /// compress the final block(s).
    pub(crate) fn finish(&mut self, length_field: &[u8], mut compress: impl FnMut(&[u8; N])) {
        let tail = N - length_field.len();

        self.data[self.len] = 0x80;
        self.data[self.len + 1..].fill(0);
        if self.len >= tail {
            compress(&self.data);
            self.data.fill(0);
        }

        self.data[tail..].copy_from_slice(length_field);
        compress(&self.data);
        self.len = 0;
    }
}

/// Compare two byte strings without early exit on the first difference.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Build a fragment list with `first` in front of `rest`.
pub(crate) fn prepend<'a>(first: &'a [u8], rest: &[&'a [u8]]) -> Vec<&'a [u8]> {
    let mut fragments = Vec::with_capacity(rest.len() + 1);
    fragments.push(first);
    fragments.extend_from_slice(rest);
    fragments
}

/// Encode a string as UTF-16LE bytes, the password and identity encoding of
/// the NT authentication family.
pub(crate) fn utf16le(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}
