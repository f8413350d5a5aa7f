//! Length-prefixed frame reassembly.
//!
//! The controller sends a stream of frames whose first byte is the number of
//! bytes that follow it. The transport delivers that stream in chunks whose
//! boundaries have nothing to do with frame boundaries, so the assembler
//! buffers bytes until the declared length has arrived.

use core::fmt;

use crate::report::REPORT_ID_OFFSET;

/// Default reassembly buffer capacity in bytes.
///
/// The largest report a Zeemote JS1 sends is well below this.
pub const MAX_FRAME_LEN: usize = 48;

/// Reassembler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssemblerState {
    /// No bytes of the next frame have arrived yet.
    AwaitingLength,
    /// Part of a frame is buffered.
    Accumulating {
        /// Total frame length including the length prefix.
        expected_len: usize,
        /// Bytes buffered so far.
        buffered: usize,
    },
}

/// Framing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// The length prefix declares a frame that does not fit the buffer.
    TooLarge {
        /// Declared frame length including the prefix.
        declared: usize,
        /// Buffer capacity.
        capacity: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooLarge { declared, capacity } => write!(
                f,
                "declared frame length {declared} exceeds buffer capacity {capacity}"
            ),
        }
    }
}

/// A complete frame, length prefix included.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame<const B: usize> {
    bytes: [u8; B],
    len: usize,
}

impl<const B: usize> Frame<B> {
    fn copy_from(src: &[u8]) -> Self {
        let mut bytes = [0u8; B];
        bytes[..src.len()].copy_from_slice(src);
        Self {
            bytes,
            len: src.len(),
        }
    }

    /// Raw frame bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Frame length in bytes (always at least 1).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Frames always carry their length prefix, so this is always `false`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Report id byte, if the frame is long enough to carry one.
    #[inline]
    #[must_use]
    pub fn report_id(&self) -> Option<u8> {
        self.as_bytes().get(REPORT_ID_OFFSET).copied()
    }
}

impl<const B: usize> AsRef<[u8]> for Frame<B> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<const B: usize> fmt::Debug for Frame<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Frame").field(&self.as_bytes()).finish()
    }
}

/// Outcome of a single [`FrameAssembler::push`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Step<const B: usize> {
    /// Bytes taken from the input.
    pub consumed: usize,
    /// The frame completed by those bytes, if any.
    pub frame: Option<Frame<B>>,
}

/// Reassembles length-prefixed frames from arbitrarily split chunks.
///
/// `B` is the buffer capacity; a frame declaring more than `B` bytes is
/// rejected with [`FrameError::TooLarge`].
pub struct FrameAssembler<const B: usize = MAX_FRAME_LEN> {
    buffer: [u8; B],
    fill: usize,
    /// Zero while the length prefix has not arrived.
    expected_len: usize,
}

impl<const B: usize> FrameAssembler<B> {
    /// Create an empty assembler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; B],
            fill: 0,
            expected_len: 0,
        }
    }

    /// Drop any partially buffered frame.
    pub fn reset(&mut self) {
        self.fill = 0;
        self.expected_len = 0;
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AssemblerState {
        if self.fill == 0 {
            AssemblerState::AwaitingLength
        } else {
            AssemblerState::Accumulating {
                expected_len: self.expected_len,
                buffered: self.fill,
            }
        }
    }

    /// Bytes buffered toward the in-flight frame.
    #[inline]
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.fill
    }

    /// Declared length of the in-flight frame, or 0 if not yet known.
    #[inline]
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// Buffer capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        B
    }

    /// Take bytes from `bytes` until one frame completes or the input runs out.
    ///
    /// Stops right after a completed frame so the caller can act on it before
    /// handing over the rest. On error the assembler is reset and the caller
    /// is expected to discard the remaining input.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Step<B>, FrameError> {
        let Some(&first) = bytes.first() else {
            return Ok(Step {
                consumed: 0,
                frame: None,
            });
        };

        if self.fill == 0 {
            let declared = first as usize + 1;
            if declared > B {
                self.reset();
                return Err(FrameError::TooLarge {
                    declared,
                    capacity: B,
                });
            }
            self.expected_len = declared;
        }

        let take = bytes.len().min(self.expected_len - self.fill);
        self.buffer[self.fill..self.fill + take].copy_from_slice(&bytes[..take]);
        self.fill += take;

        let frame = if self.fill == self.expected_len {
            let frame = Frame::copy_from(&self.buffer[..self.fill]);
            self.reset();
            Some(frame)
        } else {
            None
        };

        Ok(Step {
            consumed: take,
            frame,
        })
    }

    /// Iterate over every frame completed by `chunk`.
    ///
    /// Bytes are only consumed while the iterator is driven. Iteration ends
    /// after the first error; the bytes after it are discarded.
    pub fn feed<'a>(&'a mut self, chunk: &'a [u8]) -> Frames<'a, B> {
        Frames {
            assembler: self,
            rest: chunk,
        }
    }
}

impl<const B: usize> Default for FrameAssembler<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`FrameAssembler::feed`].
#[must_use = "bytes are only consumed while the iterator is driven"]
pub struct Frames<'a, const B: usize> {
    assembler: &'a mut FrameAssembler<B>,
    rest: &'a [u8],
}

impl<const B: usize> Iterator for Frames<'_, B> {
    type Item = Result<Frame<B>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            match self.assembler.push(self.rest) {
                Ok(step) => {
                    self.rest = &self.rest[step.consumed..];
                    if let Some(frame) = step.frame {
                        return Some(Ok(frame));
                    }
                }
                Err(e) => {
                    self.rest = &[];
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
