//! Bindings for Rust modules that draw through the pane bridge. The module
//! holds typed integer handles; every object lives on the host.
//!
//! The bridge functions only exist when compiling for `wasm32`. The handle
//! types and the [`InputLayoutBuilder`] are available everywhere.

use std::ffi::*;

pub use pane_marshal::{BufferTarget, Handle, PrimitiveType, ShaderStage};

/// Raw bridge imports.
#[cfg(target_arch = "wasm32")]
pub mod sys;

/// Declares strongly-typed wrappers around [`Handle`].
macro_rules! handle_types {
    ($($(#[$meta: meta])* $name: ident),*) => {
        $(
            $(#[$meta])*
            #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
            #[repr(transparent)]
            pub struct $name(Handle);

            impl $name {
                /// Reinterprets the given integer as a handle of this kind.
                pub const fn from_raw(raw: u32) -> Self {
                    Self(Handle::from_raw(raw))
                }

                /// The integer the host issued.
                pub const fn raw(self) -> u32 {
                    self.0.raw()
                }

                /// Whether this is the reserved, absent handle.
                pub const fn is_null(self) -> bool {
                    self.0.is_null()
                }
            }

            impl From<$name> for Handle {
                fn from(value: $name) -> Self {
                    value.0
                }
            }
        )*
    };
}

handle_types!(
    /// The drawing context.
    GraphicsHandle,
    /// A compiled shader. Refers to a failed sentinel if compilation failed.
    ShaderHandle,
    /// A linked program. Refers to a failed sentinel if linking failed.
    ProgramHandle,
    /// A buffer object.
    BufferHandle,
    /// A resolved input layout.
    InputLayoutHandle,
    /// A uniform variable of a program.
    UniformLocationHandle
);

/// Describes how interleaved `f32` vertex attributes are laid out. The
/// builder owns the attribute names and the parallel arrays that the host
/// reads when the layout is created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputLayoutBuilder {
    /// The attribute names.
    names: Vec<CString>,
    /// Byte offset of each attribute within a vertex.
    offsets: Vec<u32>,
    /// Number of components of each attribute.
    formats: Vec<u32>,
    /// Distance in bytes between consecutive vertices.
    stride: u32
}

impl InputLayoutBuilder {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute of `components` floats directly after the
    /// previous one, growing the stride to match.
    pub fn with_attribute(mut self, name: &CStr, components: u32) -> Self {
        self.names.push(name.to_owned());
        self.offsets.push(self.stride);
        self.formats.push(components);
        self.stride += components * std::mem::size_of::<f32>() as u32;
        self
    }

    /// Overrides the distance between vertices, for vertices that carry
    /// data the layout does not describe.
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// The number of attributes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The distance in bytes between vertices.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// The attribute names.
    pub fn names(&self) -> impl Iterator<Item = &CStr> {
        self.names.iter().map(CString::as_c_str)
    }

    /// Byte offset of each attribute.
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Component count of each attribute.
    pub fn formats(&self) -> &[u32] {
        &self.formats
    }
}

/// The typed bridge calls.
#[cfg(target_arch = "wasm32")]
mod calls {
    use super::*;

    impl GraphicsHandle {
        /// Creates the drawing context. Only the first call succeeds; later
        /// calls return the null handle.
        pub fn create() -> Self {
            unsafe { Self::from_raw(sys::platform_create_graphics()) }
        }

        /// Compiles shader source. Compilation errors are logged by the host.
        pub fn create_shader(self, stage: ShaderStage, source: &CStr) -> ShaderHandle {
            unsafe { ShaderHandle::from_raw(sys::platform_create_shader(self.raw(), stage.code(), source.as_ptr().cast())) }
        }

        /// Links a vertex and fragment shader.
        pub fn create_program(self, vertex: ShaderHandle, fragment: ShaderHandle) -> ProgramHandle {
            unsafe { ProgramHandle::from_raw(sys::platform_create_program(self.raw(), vertex.raw(), fragment.raw())) }
        }

        /// Allocates a buffer.
        pub fn create_buffer(self) -> BufferHandle {
            unsafe { BufferHandle::from_raw(sys::platform_create_buffer(self.raw())) }
        }

        /// Frees a buffer. The handle must not be used afterwards.
        pub fn delete_buffer(self, buffer: BufferHandle) {
            unsafe { sys::platform_delete_buffer(self.raw(), buffer.raw()) }
        }

        /// Binds a buffer to a target.
        pub fn bind_buffer(self, buffer: BufferHandle, target: BufferTarget) {
            unsafe { sys::platform_bind_buffer(self.raw(), buffer.raw(), target.code()) }
        }

        /// Uploads bytes to the buffer bound to the target.
        pub fn set_buffer_data(self, buffer: BufferHandle, data: &[u8], target: BufferTarget) {
            unsafe { sys::platform_set_buffer_data(self.raw(), buffer.raw(), data.as_ptr(), data.len() as u32, target.code()) }
        }

        /// Resolves a layout against a program.
        pub fn create_input_layout(self, program: ProgramHandle, layout: &InputLayoutBuilder) -> InputLayoutHandle {
            let names = layout.names().map(|x| x.as_ptr() as u32).collect::<Vec<_>>();
            unsafe {
                InputLayoutHandle::from_raw(sys::platform_create_input_layout(self.raw(), program.raw(),
                    names.as_ptr(), layout.offsets().as_ptr(), layout.formats().as_ptr(), layout.stride(), layout.len() as u32))
            }
        }

        /// Activates every attribute of a layout.
        pub fn use_input_layout(self, layout: InputLayoutHandle) {
            unsafe { sys::platform_use_input_layout(self.raw(), layout.raw()) }
        }

        /// Sets the output rectangle.
        pub fn set_viewport(self, width: u32, height: u32) {
            unsafe { sys::platform_set_viewport(self.raw(), width, height) }
        }

        /// Clears the render targets.
        pub fn clear_color(self, [r, g, b, a]: [f32; 4]) {
            unsafe { sys::platform_clear_color(self.raw(), r, g, b, a) }
        }

        /// Makes a program current.
        pub fn use_program(self, program: ProgramHandle) {
            unsafe { sys::platform_use_program(self.raw(), program.raw()) }
        }

        /// Looks up a uniform. A missing uniform still yields a handle, and
        /// setting it does nothing.
        pub fn get_uniform_location(self, program: ProgramHandle, name: &CStr) -> UniformLocationHandle {
            unsafe { UniformLocationHandle::from_raw(sys::platform_get_uniform_location(self.raw(), program.raw(), name.as_ptr().cast())) }
        }

        /// Sets a scalar uniform.
        pub fn set_uniform_float(self, location: UniformLocationHandle, value: f32) {
            unsafe { sys::platform_set_uniform_float(self.raw(), location.raw(), value) }
        }

        /// Sets a vector or matrix uniform from 1, 2, 3, 4, 9 or 16 floats.
        pub fn set_uniform_floats(self, location: UniformLocationHandle, values: &[f32]) {
            unsafe { sys::platform_set_uniform_floats(self.raw(), location.raw(), values.as_ptr(), values.len() as u32) }
        }

        /// Draws vertices from the active layout.
        pub fn draw_arrays(self, primitive: PrimitiveType, first: u32, count: u32) {
            unsafe { sys::platform_draw_arrays(self.raw(), primitive.code(), first, count) }
        }
    }

    /// Writes a number to the host log.
    pub fn log_integer(value: u32) {
        unsafe { sys::platform_log_integer(value) }
    }

    /// Reports an unrecoverable error to the host, which stops the module.
    pub fn throw_error(message: &CStr) -> ! {
        unsafe { sys::platform_throw_error(message.as_ptr().cast()) }
        core::arch::wasm32::unreachable()
    }
}

#[cfg(target_arch = "wasm32")]
pub use calls::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_packs_attributes() {
        let layout = InputLayoutBuilder::new()
            .with_attribute(c"a_position", 2)
            .with_attribute(c"a_color", 3);

        assert_eq!(layout.len(), 2);
        assert_eq!(layout.stride(), 20);
        assert_eq!(layout.offsets(), &[0, 8]);
        assert_eq!(layout.formats(), &[2, 3]);
        assert_eq!(layout.names().collect::<Vec<_>>(), [c"a_position", c"a_color"]);
    }

    #[test]
    fn stride_can_be_widened() {
        let layout = InputLayoutBuilder::new()
            .with_attribute(c"a_position", 3)
            .with_stride(32);
        assert_eq!(layout.stride(), 32);
        assert_eq!(layout.offsets(), &[0]);
    }

    #[test]
    fn handles_keep_their_value() {
        let buffer = BufferHandle::from_raw(0x0000_002a);
        assert_eq!(buffer.raw(), 0x0000_002a);
        assert_eq!(Handle::from(buffer), Handle::from_raw(0x0000_002a));
        assert!(ProgramHandle::default().is_null());
    }
}
