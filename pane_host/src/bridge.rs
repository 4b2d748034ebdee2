use crate::*;

/// A host object addressable by a module through a handle.
pub enum HostObject<G: GraphicsApi> {
    /// The drawing context.
    Graphics,
    /// A shader, or `None` if compilation failed.
    Shader(Option<G::Shader>),
    /// A program, or `None` if linking failed.
    Program(Option<G::Program>),
    /// A buffer object.
    Buffer(G::Buffer),
    /// A resolved input layout.
    InputLayout(InputLayout),
    /// A uniform location, or `None` if the program had no such uniform.
    UniformLocation(Option<G::UniformLocation>)
}

impl<G: GraphicsApi> HostObject<G> {
    /// A human-readable name for the kind of this object.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Graphics => "graphics context",
            Self::Shader(_) => "shader",
            Self::Program(_) => "program",
            Self::Buffer(_) => "buffer",
            Self::InputLayout(_) => "input layout",
            Self::UniformLocation(_) => "uniform location"
        }
    }
}

impl<G: GraphicsApi> std::fmt::Debug for HostObject<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// A decoded call from a module, with every string and array already
/// copied out of linear memory.
#[derive(Clone, Debug, PartialEq)]
pub enum BridgeCall {
    CreateGraphics,
    CreateShader { graphics: Handle, stage: ShaderStage, source: String },
    CreateProgram { graphics: Handle, vertex: Handle, fragment: Handle },
    CreateBuffer { graphics: Handle },
    DeleteBuffer { graphics: Handle, buffer: Handle },
    BindBuffer { graphics: Handle, buffer: Handle, target: BufferTarget },
    SetBufferData { graphics: Handle, buffer: Handle, target: BufferTarget, data: Vec<u8> },
    CreateInputLayout { graphics: Handle, program: Handle, elements: Vec<InputElement>, stride: u32 },
    UseInputLayout { graphics: Handle, layout: Handle },
    SetViewport { graphics: Handle, width: u32, height: u32 },
    ClearColor { graphics: Handle, color: [f32; 4] },
    UseProgram { graphics: Handle, program: Handle },
    GetUniformLocation { graphics: Handle, program: Handle, name: String },
    SetUniform { graphics: Handle, location: Handle, value: UniformValue },
    DrawArrays { graphics: Handle, primitive: PrimitiveType, first: u32, count: u32 },
    LogInteger(u32),
    ThrowError(String)
}

/// Owns the reference table and the graphics API, and services the calls
/// a module makes. Every call resolves its handles, performs at most one
/// host operation, and wraps any new host object in a fresh handle.
pub struct BridgeContext<G: GraphicsApi> {
    api: G,
    table: ReferenceTable<HostObject<G>>,
    graphics: Option<Handle>,
    attribute_policy: AttributePolicy
}

impl<G: GraphicsApi> BridgeContext<G> {
    /// Creates a bridge around the given graphics API.
    pub fn new(api: G, config: &BridgeConfig) -> Self {
        Self {
            api,
            table: ReferenceTable::new(),
            graphics: None,
            attribute_policy: config.attribute_policy
        }
    }

    /// The wrapped graphics API.
    pub fn api(&self) -> &G {
        &self.api
    }

    /// Mutably gets the wrapped graphics API.
    pub fn api_mut(&mut self) -> &mut G {
        &mut self.api
    }

    /// The table of live host objects.
    pub fn table(&self) -> &ReferenceTable<HostObject<G>> {
        &self.table
    }

    /// Services a decoded call, returning the handle it produced, if any.
    pub fn dispatch(&mut self, call: BridgeCall) -> Result<Option<Handle>, BridgeError> {
        log::trace!("Servicing {call:?}");

        match call {
            BridgeCall::CreateGraphics => self.create_graphics().map(Some),
            BridgeCall::CreateShader { graphics, stage, source } => self.create_shader(graphics, stage, &source).map(Some),
            BridgeCall::CreateProgram { graphics, vertex, fragment } => self.create_program(graphics, vertex, fragment).map(Some),
            BridgeCall::CreateBuffer { graphics } => self.create_buffer(graphics).map(Some),
            BridgeCall::DeleteBuffer { graphics, buffer } => self.delete_buffer(graphics, buffer).map(|_| None),
            BridgeCall::BindBuffer { graphics, buffer, target } => self.bind_buffer(graphics, buffer, target).map(|_| None),
            BridgeCall::SetBufferData { graphics, buffer, target, data } => self.set_buffer_data(graphics, buffer, target, &data).map(|_| None),
            BridgeCall::CreateInputLayout { graphics, program, elements, stride } => self.create_input_layout(graphics, program, &elements, stride).map(Some),
            BridgeCall::UseInputLayout { graphics, layout } => self.use_input_layout(graphics, layout).map(|_| None),
            BridgeCall::SetViewport { graphics, width, height } => self.set_viewport(graphics, width, height).map(|_| None),
            BridgeCall::ClearColor { graphics, color } => self.clear_color(graphics, color).map(|_| None),
            BridgeCall::UseProgram { graphics, program } => self.use_program(graphics, program).map(|_| None),
            BridgeCall::GetUniformLocation { graphics, program, name } => self.get_uniform_location(graphics, program, &name).map(Some),
            BridgeCall::SetUniform { graphics, location, value } => self.set_uniform(graphics, location, value).map(|_| None),
            BridgeCall::DrawArrays { graphics, primitive, first, count } => self.draw_arrays(graphics, primitive, first, count).map(|_| None),
            BridgeCall::LogInteger(value) => {
                self.log_number(value);
                Ok(None)
            },
            BridgeCall::ThrowError(message) => Err(self.throw_error(message))
        }
    }

    /// Creates the drawing context the first time it is requested. Later
    /// requests do nothing and return the null handle.
    pub fn create_graphics(&mut self) -> Result<Handle, BridgeError> {
        if self.graphics.is_some() {
            log::debug!("Graphics context already exists");
            return Ok(Handle::NULL);
        }

        self.api.create_context()?;
        let handle = self.table.insert(HostObject::Graphics)?;
        self.graphics = Some(handle);
        Ok(handle)
    }

    /// Compiles a shader. A compile failure is logged and yields a handle
    /// to a failed shader rather than an error.
    pub fn create_shader(&mut self, graphics: Handle, stage: ShaderStage, source: &str) -> Result<Handle, BridgeError> {
        self.check_graphics(graphics)?;

        let shader = match self.api.create_shader(stage, source) {
            Ok(shader) => Some(shader),
            Err(info_log) => {
                log::warn!("{}", BridgeError::CompileFailed(info_log));
                None
            }
        };

        self.table.insert(HostObject::Shader(shader))
    }

    /// Links two shaders into a program. A link failure, including one
    /// caused by a failed shader, is logged and yields a handle to a
    /// failed program rather than an error.
    pub fn create_program(&mut self, graphics: Handle, vertex: Handle, fragment: Handle) -> Result<Handle, BridgeError> {
        self.check_graphics(graphics)?;

        let vertex_shader = shader(&self.table, vertex)?;
        let fragment_shader = shader(&self.table, fragment)?;
        let linked = match (vertex_shader, fragment_shader) {
            (Some(vertex_shader), Some(fragment_shader)) => self.api.create_program(vertex_shader, fragment_shader),
            (None, _) => Err(format!("Vertex shader {vertex} did not compile")),
            (_, None) => Err(format!("Fragment shader {fragment} did not compile"))
        };

        let program = match linked {
            Ok(program) => Some(program),
            Err(info_log) => {
                log::warn!("{}", BridgeError::LinkFailed(info_log));
                None
            }
        };

        self.table.insert(HostObject::Program(program))
    }

    /// Allocates a buffer object.
    pub fn create_buffer(&mut self, graphics: Handle) -> Result<Handle, BridgeError> {
        self.check_graphics(graphics)?;
        let buffer = self.api.create_buffer()?;
        self.table.insert(HostObject::Buffer(buffer))
    }

    /// Frees a buffer object and retires its handle.
    pub fn delete_buffer(&mut self, graphics: Handle, buffer: Handle) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        self::buffer(&self.table, buffer)?;

        if let HostObject::Buffer(object) = self.table.remove(buffer)? {
            self.api.delete_buffer(object);
        }

        log::debug!("Retired buffer {buffer}");
        Ok(())
    }

    /// Binds a buffer to the given target.
    pub fn bind_buffer(&mut self, graphics: Handle, buffer: Handle, target: BufferTarget) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        let object = self::buffer(&self.table, buffer)?;
        self.api.bind_buffer(target, object);
        Ok(())
    }

    /// Uploads bytes to the buffer bound at the given target. The buffer
    /// handle must be live; the upload itself follows the host's binding.
    pub fn set_buffer_data(&mut self, graphics: Handle, buffer: Handle, target: BufferTarget, data: &[u8]) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        self::buffer(&self.table, buffer)?;
        self.api.buffer_data(target, data);
        Ok(())
    }

    /// Resolves attribute names against a program and stores the result
    /// as an input layout.
    pub fn create_input_layout(&mut self, graphics: Handle, program: Handle, elements: &[InputElement], stride: u32) -> Result<Handle, BridgeError> {
        self.check_graphics(graphics)?;
        let object = self::program(&self.table, program)?;

        let mut attributes = Vec::with_capacity(elements.len());
        for element in elements {
            let location = self.api.attribute_location(object, &element.name);
            if location.is_none() {
                match self.attribute_policy {
                    AttributePolicy::Strict => return Err(BridgeError::AttributeNotFound { name: element.name.clone(), program }),
                    AttributePolicy::Permissive => log::warn!("Attribute '{}' does not exist in program {program}; it will be ignored", element.name)
                }
            }

            attributes.push(VertexAttribute {
                name: element.name.clone(),
                location,
                offset: element.offset,
                components: element.components
            });
        }

        self.table.insert(HostObject::InputLayout(InputLayout { program, stride, attributes }))
    }

    /// Activates every attribute binding of an input layout.
    pub fn use_input_layout(&mut self, graphics: Handle, layout: Handle) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        let object = input_layout(&self.table, layout)?;
        self.api.set_input_layout(object);
        Ok(())
    }

    /// Sets the output rectangle, anchored at the origin.
    pub fn set_viewport(&mut self, graphics: Handle, width: u32, height: u32) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        self.api.viewport(0, 0, width, height);
        Ok(())
    }

    /// Clears all render targets.
    pub fn clear_color(&mut self, graphics: Handle, color: [f32; 4]) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        self.api.clear(color);
        Ok(())
    }

    /// Makes a program current.
    pub fn use_program(&mut self, graphics: Handle, program: Handle) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        let object = self::program(&self.table, program)?;
        self.api.use_program(object);
        Ok(())
    }

    /// Resolves a uniform name. A name the program does not have still
    /// yields a fresh handle, which makes later assignments no-ops.
    pub fn get_uniform_location(&mut self, graphics: Handle, program: Handle, name: &str) -> Result<Handle, BridgeError> {
        self.check_graphics(graphics)?;
        let object = self::program(&self.table, program)?;

        let location = self.api.uniform_location(object, name);
        if location.is_none() {
            log::debug!("Program {program} has no uniform '{name}'");
        }

        self.table.insert(HostObject::UniformLocation(location))
    }

    /// Assigns a value through a uniform location.
    pub fn set_uniform(&mut self, graphics: Handle, location: Handle, value: UniformValue) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        match uniform_location(&self.table, location)? {
            Some(object) => self.api.set_uniform(object, value),
            None => log::debug!("Ignoring assignment through absent uniform {location}")
        }
        Ok(())
    }

    /// Issues a draw call with the current bindings.
    pub fn draw_arrays(&mut self, graphics: Handle, primitive: PrimitiveType, first: u32, count: u32) -> Result<(), BridgeError> {
        self.check_graphics(graphics)?;
        self.api.draw_arrays(primitive, first, count);
        Ok(())
    }

    /// Writes a number from the module to the log.
    pub fn log_number(&self, value: u32) {
        log::info!("Module logged {value}");
    }

    /// Turns a message from the module into a fatal error.
    pub fn throw_error(&self, message: String) -> BridgeError {
        BridgeError::Fatal(message)
    }

    /// Ensures that the handle refers to the drawing context.
    fn check_graphics(&self, graphics: Handle) -> Result<(), BridgeError> {
        match self.table.resolve(graphics)? {
            HostObject::Graphics => Ok(()),
            other => Err(mismatch(graphics, "graphics context", other))
        }
    }
}

fn mismatch<G: GraphicsApi>(handle: Handle, expected: &'static str, found: &HostObject<G>) -> BridgeError {
    BridgeError::KindMismatch { handle, expected, found: found.kind() }
}

/// Resolves a shader handle, which may refer to a failed shader.
fn shader<G: GraphicsApi>(table: &ReferenceTable<HostObject<G>>, handle: Handle) -> Result<Option<&G::Shader>, BridgeError> {
    match table.resolve(handle)? {
        HostObject::Shader(shader) => Ok(shader.as_ref()),
        other => Err(mismatch(handle, "shader", other))
    }
}

fn program<G: GraphicsApi>(table: &ReferenceTable<HostObject<G>>, handle: Handle) -> Result<&G::Program, BridgeError> {
    match table.resolve(handle)? {
        HostObject::Program(Some(program)) => Ok(program),
        HostObject::Program(None) => Err(BridgeError::UnusableObject(handle)),
        other => Err(mismatch(handle, "program", other))
    }
}

fn buffer<G: GraphicsApi>(table: &ReferenceTable<HostObject<G>>, handle: Handle) -> Result<&G::Buffer, BridgeError> {
    match table.resolve(handle)? {
        HostObject::Buffer(buffer) => Ok(buffer),
        other => Err(mismatch(handle, "buffer", other))
    }
}

fn input_layout<G: GraphicsApi>(table: &ReferenceTable<HostObject<G>>, handle: Handle) -> Result<&InputLayout, BridgeError> {
    match table.resolve(handle)? {
        HostObject::InputLayout(layout) => Ok(layout),
        other => Err(mismatch(handle, "input layout", other))
    }
}

/// Resolves a uniform location handle, which may refer to an absent uniform.
fn uniform_location<G: GraphicsApi>(table: &ReferenceTable<HostObject<G>>, handle: Handle) -> Result<Option<&G::UniformLocation>, BridgeError> {
    match table.resolve(handle)? {
        HostObject::UniformLocation(location) => Ok(location.as_ref()),
        other => Err(mismatch(handle, "uniform location", other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX_SOURCE: &str = "#version 300 es
        layout (location = 0) in vec2 a_position;
        layout (location = 1) in vec3 a_color;
        uniform float u_scale;
        out vec4 color;
        void main()
        {
            gl_Position = vec4(a_position * u_scale, 0.0, 1.0);
            color = vec4(a_color, 1.0);
        }";

    const FRAGMENT_SOURCE: &str = "#version 300 es
        precision highp float;
        in vec4 color;
        out vec4 out_color;
        void main()
        {
            out_color = color;
        }";

    struct Fixture {
        bridge: BridgeContext<HeadlessGraphics>,
        graphics: Handle,
        program: Handle
    }

    fn fixture(config: &BridgeConfig) -> Fixture {
        let mut bridge = BridgeContext::new(HeadlessGraphics::new(), config);
        let graphics = bridge.create_graphics().unwrap();
        let vertex = bridge.create_shader(graphics, ShaderStage::Vertex, VERTEX_SOURCE).unwrap();
        let fragment = bridge.create_shader(graphics, ShaderStage::Fragment, FRAGMENT_SOURCE).unwrap();
        let program = bridge.create_program(graphics, vertex, fragment).unwrap();

        Fixture {
            bridge,
            graphics,
            program
        }
    }

    fn elements(names: &[&str], offsets: &[u32], formats: &[u32]) -> Vec<InputElement> {
        names.iter().zip(offsets).zip(formats)
            .map(|((name, offset), components)| InputElement { name: name.to_string(), offset: *offset, components: *components })
            .collect()
    }

    fn vertex_bytes(vertices: &[[f32; 5]]) -> Vec<u8> {
        vertices.iter().flatten().flat_map(|x| x.to_le_bytes()).collect()
    }

    #[test]
    fn graphics_is_created_once() {
        let mut bridge = BridgeContext::new(HeadlessGraphics::new(), &BridgeConfig::default());
        let graphics = bridge.create_graphics().unwrap();
        assert!(!graphics.is_null());
        assert_eq!(bridge.create_graphics().unwrap(), Handle::NULL);
        assert_eq!(bridge.table().len(), 1);
    }

    #[test]
    fn calls_require_the_graphics_handle() {
        let Fixture { mut bridge, program, .. } = fixture(&BridgeConfig::default());
        assert!(matches!(bridge.create_buffer(Handle::NULL), Err(BridgeError::InvalidHandle(Handle::NULL))));
        assert!(matches!(bridge.set_viewport(program, 1, 1), Err(BridgeError::KindMismatch { expected: "graphics context", found: "program", .. })));
    }

    #[test]
    fn input_layout_resolves_program_locations() {
        let Fixture { mut bridge, graphics, program } = fixture(&BridgeConfig::default());
        let layout = bridge.create_input_layout(graphics, program, &elements(&["a_position", "a_color"], &[0, 8], &[2, 3]), 20).unwrap();

        let HostObject::InputLayout(layout) = bridge.table().resolve(layout).unwrap() else { panic!("expected an input layout") };
        assert_eq!(layout.program, program);
        assert_eq!(layout.stride, 20);
        assert_eq!(layout.attributes, vec![
            VertexAttribute { name: "a_position".to_string(), location: Some(0), offset: 0, components: 2 },
            VertexAttribute { name: "a_color".to_string(), location: Some(1), offset: 8, components: 3 }
        ]);
    }

    #[test]
    fn unknown_attribute_follows_policy() {
        let Fixture { mut bridge, graphics, program } = fixture(&BridgeConfig::default());
        let missing = elements(&["a_position", "a_normal"], &[0, 8], &[2, 3]);
        assert!(matches!(
            bridge.create_input_layout(graphics, program, &missing, 20),
            Err(BridgeError::AttributeNotFound { name, .. }) if name == "a_normal"
        ));

        let Fixture { mut bridge, graphics, program } = fixture(&BridgeConfig::default().with_attribute_policy(AttributePolicy::Permissive));
        let layout = bridge.create_input_layout(graphics, program, &missing, 20).unwrap();
        let HostObject::InputLayout(layout) = bridge.table().resolve(layout).unwrap() else { panic!("expected an input layout") };
        assert_eq!(layout.attributes[1].location, None);
    }

    #[test]
    fn failed_shader_yields_unusable_program() {
        let Fixture { mut bridge, graphics, .. } = fixture(&BridgeConfig::default());
        let broken = bridge.create_shader(graphics, ShaderStage::Vertex, "void oops(").unwrap();
        let fragment = bridge.create_shader(graphics, ShaderStage::Fragment, FRAGMENT_SOURCE).unwrap();
        assert!(matches!(bridge.table().resolve(broken).unwrap(), HostObject::Shader(None)));

        let program = bridge.create_program(graphics, broken, fragment).unwrap();
        assert!(!program.is_null());
        assert!(matches!(bridge.use_program(graphics, program), Err(BridgeError::UnusableObject(x)) if x == program));
    }

    #[test]
    fn deleted_buffer_handles_are_stale() {
        let Fixture { mut bridge, graphics, .. } = fixture(&BridgeConfig::default());
        let buffer = bridge.create_buffer(graphics).unwrap();
        bridge.delete_buffer(graphics, buffer).unwrap();

        assert!(matches!(bridge.bind_buffer(graphics, buffer, BufferTarget::Array), Err(BridgeError::InvalidHandle(_))));
        assert!(matches!(bridge.delete_buffer(graphics, buffer), Err(BridgeError::InvalidHandle(_))));
        assert_ne!(bridge.create_buffer(graphics).unwrap(), buffer);
    }

    #[test]
    fn only_buffers_can_be_deleted() {
        let Fixture { mut bridge, graphics, program } = fixture(&BridgeConfig::default());
        assert!(matches!(bridge.delete_buffer(graphics, program), Err(BridgeError::KindMismatch { .. })));
        assert!(bridge.table().contains(program));
    }

    #[test]
    fn absent_uniforms_are_inert() {
        let Fixture { mut bridge, graphics, program } = fixture(&BridgeConfig::default());
        bridge.use_program(graphics, program).unwrap();

        let scale = bridge.get_uniform_location(graphics, program, "u_scale").unwrap();
        let missing = bridge.get_uniform_location(graphics, program, "u_missing").unwrap();
        assert_ne!(scale, missing);

        bridge.set_uniform(graphics, scale, UniformValue::Float(0.5)).unwrap();
        bridge.set_uniform(graphics, missing, UniformValue::Float(2.0)).unwrap();
        assert_eq!(bridge.api().uniform(program_id(&bridge, program), "u_scale"), Some(UniformValue::Float(0.5)));
    }

    fn program_id(bridge: &BridgeContext<HeadlessGraphics>, program: Handle) -> u32 {
        let HostObject::Program(Some(program)) = bridge.table().resolve(program).unwrap() else { panic!("expected a program") };
        program.id()
    }

    #[test]
    fn triangle_scenario_draws_without_errors() {
        let Fixture { mut bridge, graphics, program } = fixture(&BridgeConfig::default());
        let buffer = bridge.create_buffer(graphics).unwrap();
        bridge.bind_buffer(graphics, buffer, BufferTarget::Array).unwrap();

        let data = vertex_bytes(&[
            [-0.00, 0.75, 1.0, 0.0, 0.0],
            [0.75, -0.50, 0.0, 1.0, 0.0],
            [-0.75, -0.50, 0.0, 0.0, 1.0]
        ]);
        assert_eq!(data.len(), 60);
        bridge.set_buffer_data(graphics, buffer, BufferTarget::Array, &data).unwrap();

        let layout = bridge.create_input_layout(graphics, program, &elements(&["a_position", "a_color"], &[0, 8], &[2, 3]), 20).unwrap();
        bridge.use_input_layout(graphics, layout).unwrap();
        bridge.set_viewport(graphics, 800, 600).unwrap();
        bridge.clear_color(graphics, [0.392, 0.584, 0.929, 1.0]).unwrap();
        bridge.use_program(graphics, program).unwrap();
        bridge.draw_arrays(graphics, PrimitiveType::Triangles, 0, 3).unwrap();

        let api = bridge.api();
        assert!(api.errors().is_empty(), "{:?}", api.errors());
        assert_eq!(api.draw_count(), 1);
        let draw = api.last_draw().unwrap();
        assert_eq!(draw.primitive, PrimitiveType::Triangles);
        assert_eq!(draw.vertices[1], vec![0.75, -0.50, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn dispatch_reports_produced_handles() {
        let mut bridge = BridgeContext::new(HeadlessGraphics::new(), &BridgeConfig::default());
        let graphics = bridge.dispatch(BridgeCall::CreateGraphics).unwrap().unwrap();
        assert!(bridge.dispatch(BridgeCall::CreateBuffer { graphics }).unwrap().is_some());
        assert_eq!(bridge.dispatch(BridgeCall::LogInteger(7)).unwrap(), None);
        assert!(matches!(bridge.dispatch(BridgeCall::ThrowError("boom".to_string())), Err(BridgeError::Fatal(message)) if message == "boom"));
    }
}
