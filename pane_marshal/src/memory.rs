use crate::*;
use std::mem::*;

/// Size of the window used when scanning for a string terminator.
const SCAN_CHUNK: usize = 256;

/// Byte-addressable storage that belongs to a module. The storage may be
/// grown or moved by the module between calls, so implementations only
/// expose copying reads.
pub trait GuestMemory {
    /// The current size of the memory in bytes.
    fn len(&self) -> usize;

    /// Whether the memory is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `buffer.len()` bytes starting at `offset` into `buffer`.
    fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), BridgeError>;
}

impl GuestMemory for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), BridgeError> {
        let source = offset.checked_add(buffer.len())
            .and_then(|end| self.get(offset..end))
            .ok_or(BridgeError::OutOfBounds { offset, size: buffer.len(), len: <[u8]>::len(self) })?;
        buffer.copy_from_slice(source);
        Ok(())
    }
}

impl GuestMemory for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), BridgeError> {
        GuestMemory::read(self.as_slice(), offset, buffer)
    }
}

impl<M: GuestMemory + ?Sized> GuestMemory for &M {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), BridgeError> {
        (**self).read(offset, buffer)
    }
}

/// A fixed-width value that can be stored in linear memory.
/// Linear memory is always little-endian.
pub trait WasmPrimitive: Copy {
    /// The width of the value in bytes.
    const SIZE: usize;

    /// Decodes the value from exactly `SIZE` bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_wasm_primitive {
    ($($ty: ty),*) => {
        $(
            impl WasmPrimitive for $ty {
                const SIZE: usize = size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0; size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_wasm_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Interprets ranges of a module's linear memory as strings and arrays.
/// Every read copies the data out, so results stay valid after the
/// module resumes and possibly grows its memory.
pub struct MemoryView<M: GuestMemory> {
    memory: M
}

impl<M: GuestMemory> MemoryView<M> {
    /// Creates a view over the given memory.
    pub fn new(memory: M) -> Self {
        Self {
            memory
        }
    }

    /// The size of the underlying memory in bytes.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Whether the underlying memory is empty.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Reads the NUL-terminated UTF-8 string that begins at `offset`.
    /// The scan stops at the end of memory; a missing terminator is
    /// reported as an out-of-bounds access.
    pub fn read_cstring(&self, offset: usize) -> Result<String, BridgeError> {
        let len = self.memory.len();
        if offset >= len {
            return Err(BridgeError::InvalidOffset { offset, len });
        }

        let mut bytes = Vec::new();
        let mut chunk = [0; SCAN_CHUNK];
        let mut position = offset;
        loop {
            if position >= len {
                return Err(BridgeError::OutOfBounds { offset, size: len - offset + 1, len });
            }

            let window = &mut chunk[..SCAN_CHUNK.min(len - position)];
            self.memory.read(position, window)?;
            match window.iter().position(|&x| x == 0) {
                Some(end) => {
                    bytes.extend_from_slice(&window[..end]);
                    break;
                },
                None => {
                    bytes.extend_from_slice(window);
                    position += window.len();
                }
            }
        }

        String::from_utf8(bytes).map_err(|source| BridgeError::MalformedText { offset, source: source.utf8_error() })
    }

    /// Copies `len` raw bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>, BridgeError> {
        self.check_range(offset, len)?;
        let mut result = vec![0; len];
        self.memory.read(offset, &mut result)?;
        Ok(result)
    }

    /// Reads `count` consecutive values of type `T` starting at `offset`.
    pub fn read_array<T: WasmPrimitive>(&self, offset: usize, count: usize) -> Result<Vec<T>, BridgeError> {
        let size = count.checked_mul(T::SIZE)
            .ok_or(BridgeError::OutOfBounds { offset, size: usize::MAX, len: self.memory.len() })?;
        let bytes = self.read_bytes(offset, size)?;
        Ok(bytes.chunks_exact(T::SIZE).map(T::from_le_slice).collect())
    }

    /// Ensures that `size` bytes at `offset` lie within memory.
    fn check_range(&self, offset: usize, size: usize) -> Result<(), BridgeError> {
        let len = self.memory.len();
        match offset.checked_add(size) {
            Some(end) if end <= len => Ok(()),
            _ => Err(BridgeError::OutOfBounds { offset, size, len })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(offset: usize, bytes: &[u8], len: usize) -> Vec<u8> {
        let mut memory = vec![0xAA; len];
        memory[offset..offset + bytes.len()].copy_from_slice(bytes);
        memory
    }

    #[test]
    fn reads_terminated_string() {
        let memory = memory_with(16, "a_position\0".as_bytes(), 64);
        let view = MemoryView::new(&memory);
        assert_eq!(view.read_cstring(16).unwrap(), "a_position");
    }

    #[test]
    fn reads_multibyte_string_across_scan_chunks() {
        let text = "Grüße, 世界! ".repeat(40);
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        let memory = memory_with(3, &bytes, bytes.len() + 10);
        let view = MemoryView::new(&memory);
        assert_eq!(view.read_cstring(3).unwrap(), text);
    }

    #[test]
    fn empty_string_is_valid() {
        let memory = vec![0u8; 4];
        assert_eq!(MemoryView::new(&memory).read_cstring(2).unwrap(), "");
    }

    #[test]
    fn string_offset_past_end_is_invalid() {
        let memory = vec![0u8; 8];
        let view = MemoryView::new(&memory);
        assert!(matches!(view.read_cstring(8), Err(BridgeError::InvalidOffset { offset: 8, len: 8 })));
    }

    #[test]
    fn missing_terminator_is_out_of_bounds() {
        let memory = vec![b'x'; 1000];
        let view = MemoryView::new(&memory);
        assert!(matches!(view.read_cstring(10), Err(BridgeError::OutOfBounds { offset: 10, .. })));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let memory = memory_with(0, &[b'o', 0xFF, b'k', 0], 8);
        let view = MemoryView::new(&memory);
        assert!(matches!(view.read_cstring(0), Err(BridgeError::MalformedText { offset: 0, .. })));
    }

    #[test]
    fn reads_little_endian_arrays() {
        let mut bytes = Vec::new();
        for value in [0u32, 8, 0xDEADBEEF] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let memory = memory_with(4, &bytes, 32);
        let view = MemoryView::new(&memory);
        assert_eq!(view.read_array::<u32>(4, 3).unwrap(), vec![0, 8, 0xDEADBEEF]);
    }

    #[test]
    fn reads_floats() {
        let mut bytes = Vec::new();
        for value in [-0.75f32, 0.5, 1.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let view = MemoryView::new(&bytes);
        assert_eq!(view.read_array::<f32>(0, 3).unwrap(), vec![-0.75, 0.5, 1.0]);
    }

    #[test]
    fn array_bounds_are_enforced() {
        let memory = vec![0u8; 32];
        let view = MemoryView::new(&memory);
        assert_eq!(view.read_array::<u32>(24, 2).unwrap().len(), 2);
        assert!(matches!(view.read_array::<u32>(28, 2), Err(BridgeError::OutOfBounds { offset: 28, size: 8, len: 32 })));
        assert!(view.read_array::<u64>(0, usize::MAX).is_err());
        assert!(view.read_array::<u8>(32, 0).unwrap().is_empty());
        assert!(view.read_array::<u8>(33, 0).is_err());
    }

    #[test]
    fn bytes_are_copied_verbatim() {
        let memory = memory_with(5, &[1, 2, 3, 4, 5], 16);
        let view = MemoryView::new(&memory);
        assert_eq!(view.read_bytes(5, 5).unwrap(), vec![1, 2, 3, 4, 5]);
    }
}
