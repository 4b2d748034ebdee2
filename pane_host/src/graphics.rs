use pane_marshal::*;

/// The object-based graphics API that modules drive through the bridge.
/// The bridge resolves every handle before calling into the API, so
/// implementations only ever see live host objects.
///
/// Binding state (bound buffers, current program, active input layout) is
/// owned by the implementation; the bridge neither tracks nor reorders it.
pub trait GraphicsApi: 'static + Sized {
    /// A compiled shader stage.
    type Shader;
    /// A linked program.
    type Program;
    /// A buffer object.
    type Buffer;
    /// A resolved uniform variable within a program.
    type UniformLocation;

    /// Prepares the drawing context. Called once, the first time a module
    /// asks for graphics.
    fn create_context(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    /// Compiles shader source, returning the info log on failure.
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String>;

    /// Links a vertex and fragment shader, returning the info log on failure.
    fn create_program(&mut self, vertex: &Self::Shader, fragment: &Self::Shader) -> Result<Self::Program, String>;

    /// Looks up the location of a vertex attribute.
    fn attribute_location(&self, program: &Self::Program, name: &str) -> Option<u32>;

    /// Looks up a uniform variable. `None` is the "no such uniform" result.
    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::UniformLocation>;

    /// Allocates a new buffer object.
    fn create_buffer(&mut self) -> Result<Self::Buffer, BridgeError>;

    /// Frees a buffer object.
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    /// Makes the buffer current for the given target.
    fn bind_buffer(&mut self, target: BufferTarget, buffer: &Self::Buffer);

    /// Replaces the contents of the buffer bound to the given target.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);

    /// Points and enables every located attribute of the layout.
    fn set_input_layout(&mut self, layout: &InputLayout);

    /// Sets the output rectangle.
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Clears all render targets to the given color.
    fn clear(&mut self, color: [f32; 4]);

    /// Makes the program current for subsequent draws.
    fn use_program(&mut self, program: &Self::Program);

    /// Sets a uniform of the current program.
    fn set_uniform(&mut self, location: &Self::UniformLocation, value: UniformValue);

    /// Draws `count` vertices starting at `first`.
    fn draw_arrays(&mut self, primitive: PrimitiveType, first: u32, count: u32);
}

/// An attribute description as supplied by a module, before its name is
/// resolved against a program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputElement {
    pub name: String,
    pub offset: u32,
    pub components: u32
}

/// An attribute binding of an input layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    /// The attribute's name in the shader.
    pub name: String,
    /// The resolved location, or `None` if the program has no such attribute
    /// and the bridge was configured to accept that.
    pub location: Option<u32>,
    /// Byte offset of the attribute within a vertex.
    pub offset: u32,
    /// Number of `f32` components.
    pub components: u32
}

/// A per-program description of how vertex attributes are laid out in a buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputLayout {
    /// The program the attribute names were resolved against.
    pub program: Handle,
    /// Distance in bytes between consecutive vertices.
    pub stride: u32,
    /// The attribute bindings, in declaration order.
    pub attributes: Vec<VertexAttribute>
}

/// A value that can be assigned to a uniform variable.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16])
}

impl UniformValue {
    /// Interprets a run of floats as a uniform value of matching width.
    pub fn from_slice(values: &[f32]) -> Result<Self, BridgeError> {
        let invalid = || BridgeError::invalid_argument(format!("A uniform cannot hold {} floats", values.len()));
        Ok(match values.len() {
            1 => Self::Float(values[0]),
            2 => Self::Vec2(values.try_into().map_err(|_| invalid())?),
            3 => Self::Vec3(values.try_into().map_err(|_| invalid())?),
            4 => Self::Vec4(values.try_into().map_err(|_| invalid())?),
            9 => Self::Mat3(values.try_into().map_err(|_| invalid())?),
            16 => Self::Mat4(values.try_into().map_err(|_| invalid())?),
            _ => return Err(invalid())
        })
    }

    /// The components of this value.
    pub fn as_slice(&self) -> &[f32] {
        match self {
            Self::Float(x) => std::slice::from_ref(x),
            Self::Vec2(x) => x,
            Self::Vec3(x) => x,
            Self::Vec4(x) => x,
            Self::Mat3(x) => x,
            Self::Mat4(x) => x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_widths() {
        assert_eq!(UniformValue::from_slice(&[0.5]).unwrap(), UniformValue::Float(0.5));
        assert_eq!(UniformValue::from_slice(&[1.0, 2.0, 3.0]).unwrap().as_slice(), &[1.0, 2.0, 3.0]);
        assert!(matches!(UniformValue::from_slice(&[0.0; 16]).unwrap(), UniformValue::Mat4(_)));
        assert!(matches!(UniformValue::from_slice(&[]), Err(BridgeError::InvalidArgument(_))));
        assert!(UniformValue::from_slice(&[0.0; 5]).is_err());
    }
}
