use crate::*;
use fxhash::*;
use std::collections::*;

/// The number of attribute locations a program may use.
const MAX_VERTEX_ATTRIBS: u32 = 16;
/// The default number of commands, draw calls and errors that are remembered.
const DEFAULT_HISTORY: usize = 1024;
/// Qualifiers that do not affect how a declaration is linked.
const IGNORED_QUALIFIERS: &[&str] = &["flat", "smooth", "centroid", "highp", "mediump", "lowp"];

/// A global `in`, `out` or `uniform` variable found in shader source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub ty: String,
    pub location: Option<u32>
}

/// A shader compiled by [`HeadlessGraphics`].
#[derive(Clone, Debug)]
pub struct HeadlessShader {
    id: u32,
    stage: ShaderStage,
    inputs: Vec<Declaration>,
    outputs: Vec<Declaration>,
    uniforms: Vec<Declaration>
}

impl HeadlessShader {
    /// The unique ID of this shader.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The stage this shader was compiled for.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The `in` variables of this shader.
    pub fn inputs(&self) -> &[Declaration] {
        &self.inputs
    }

    /// The `out` variables of this shader.
    pub fn outputs(&self) -> &[Declaration] {
        &self.outputs
    }
}

/// A program linked by [`HeadlessGraphics`].
#[derive(Clone, Debug)]
pub struct HeadlessProgram {
    id: u32,
    attributes: FxHashMap<String, u32>,
    uniforms: FxHashMap<String, u32>
}

impl HeadlessProgram {
    /// The unique ID of this program.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The location assigned to each vertex attribute.
    pub fn attributes(&self) -> &FxHashMap<String, u32> {
        &self.attributes
    }
}

/// A buffer allocated by [`HeadlessGraphics`].
#[derive(Debug)]
pub struct HeadlessBuffer {
    id: u32
}

impl HeadlessBuffer {
    /// The unique ID of this buffer.
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// A uniform resolved by [`HeadlessGraphics`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadlessUniformLocation {
    program: u32,
    location: u32,
    name: String
}

/// The output rectangle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32
}

/// A state-changing operation observed by [`HeadlessGraphics`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateContext,
    DeleteBuffer(u32),
    BindBuffer { target: BufferTarget, buffer: u32 },
    BufferData { target: BufferTarget, len: usize },
    SetInputLayout { attributes: usize },
    Viewport(Viewport),
    Clear([f32; 4]),
    UseProgram(u32),
    SetUniform { program: u32, location: u32, value: UniformValue },
    DrawArrays { primitive: PrimitiveType, first: u32, count: u32 }
}

/// A draw call that passed validation, with the vertices it read.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    /// The program that was current.
    pub program: u32,
    /// How the vertices were assembled.
    pub primitive: PrimitiveType,
    /// The first vertex drawn.
    pub first: u32,
    /// The number of vertices drawn.
    pub count: u32,
    /// For every vertex, the components of each located attribute in layout order.
    /// Empty when the layout has no located attributes.
    pub vertices: Vec<Vec<f32>>
}

/// The input layout captured together with the array buffer that was
/// bound when it was applied.
#[derive(Clone, Debug)]
struct ActiveLayout {
    layout: InputLayout,
    buffer: u32
}

/// A graphics API that runs entirely in memory. It compiles and links a
/// GLSL-like subset well enough to assign attribute and uniform locations,
/// keeps WebGL-style binding state, and records what was drawn. Misuse is
/// reported the way a GPU driver does: as a queryable error list rather
/// than a failure of the call.
#[derive(Debug)]
pub struct HeadlessGraphics {
    context_created: bool,
    next_id: u32,
    buffers: FxHashMap<u32, Vec<u8>>,
    bindings: FxHashMap<BufferTarget, u32>,
    program: Option<HeadlessProgram>,
    layout: Option<ActiveLayout>,
    viewport: Viewport,
    clear_color: [f32; 4],
    uniforms: FxHashMap<(u32, String), UniformValue>,
    commands: VecDeque<Command>,
    draws: VecDeque<DrawCall>,
    draw_count: u64,
    errors: VecDeque<String>,
    error_count: u64,
    history: usize
}

impl HeadlessGraphics {
    /// Creates a new headless API with nothing bound.
    pub fn new() -> Self {
        Self {
            context_created: false,
            next_id: 1,
            buffers: FxHashMap::default(),
            bindings: FxHashMap::default(),
            program: None,
            layout: None,
            viewport: Viewport::default(),
            clear_color: [0.0; 4],
            uniforms: FxHashMap::default(),
            commands: VecDeque::new(),
            draws: VecDeque::new(),
            draw_count: 0,
            errors: VecDeque::new(),
            error_count: 0,
            history: DEFAULT_HISTORY
        }
    }

    /// Limits how many commands, draw calls and errors are remembered.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }

    /// Whether the context has been created.
    pub fn is_context_created(&self) -> bool {
        self.context_created
    }

    /// The most recent commands, oldest first.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// The most recent draw calls, oldest first.
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.draws.iter()
    }

    /// The latest draw call.
    pub fn last_draw(&self) -> Option<&DrawCall> {
        self.draws.back()
    }

    /// The total number of successful draw calls.
    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    /// The most recent errors raised by invalid operations, oldest first.
    pub fn errors(&self) -> &VecDeque<String> {
        &self.errors
    }

    /// The total number of invalid operations, including forgotten ones.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Removes and returns the remembered errors.
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors).into()
    }

    /// The contents of a live buffer.
    pub fn buffer_contents(&self, buffer: u32) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// The buffer bound to a target.
    pub fn bound_buffer(&self, target: BufferTarget) -> Option<u32> {
        self.bindings.get(&target).copied()
    }

    /// The ID of the current program.
    pub fn current_program(&self) -> Option<u32> {
        self.program.as_ref().map(HeadlessProgram::id)
    }

    /// The current output rectangle.
    pub fn current_viewport(&self) -> Viewport {
        self.viewport
    }

    /// The color of the latest clear.
    pub fn current_clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// The value last assigned to a uniform of a program.
    pub fn uniform(&self, program: u32, name: &str) -> Option<UniformValue> {
        self.uniforms.get(&(program, name.to_string())).copied()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: Command) {
        push_bounded(&mut self.commands, command, self.history);
    }

    /// Records an invalid operation. Like `glGetError`, only the most
    /// recent ones are kept.
    fn error(&mut self, message: String) {
        log::debug!("Headless graphics error: {message}");
        self.error_count += 1;
        push_bounded(&mut self.errors, message, self.history);
    }

    /// Validates the current bindings and reads the vertices for a draw.
    fn assemble(&self, primitive: PrimitiveType, first: u32, count: u32) -> Result<DrawCall, String> {
        let program = self.program.as_ref().ok_or("INVALID_OPERATION: drawArrays: no program in use")?;
        let active = self.layout.as_ref().ok_or("INVALID_OPERATION: drawArrays: no input layout is active")?;
        let data = self.buffers.get(&active.buffer).ok_or("INVALID_OPERATION: drawArrays: the vertex buffer was deleted")?;

        let attributes = active.layout.attributes.iter()
            .filter_map(|attribute| attribute.location.map(|location| (location, attribute)))
            .collect::<Vec<_>>();

        let mut vertices = Vec::new();
        if let Some(last) = count.checked_sub(1) {
            let last = first.checked_add(last).ok_or("INVALID_VALUE: drawArrays: vertex range overflows")?;
            for &(location, attribute) in &attributes {
                let (start, size) = Self::attribute_range(&active.layout, attribute, last);
                if start.saturating_add(size) > data.len() {
                    return Err(format!("INVALID_OPERATION: drawArrays: attempt to access out of range vertices in attribute {location}"));
                }
            }

            // Every vertex now lies inside the buffer, which bounds the allocation.
            if !attributes.is_empty() {
                vertices.reserve_exact(count as usize);
                for vertex in first..=last {
                    let mut values = Vec::new();
                    for &(_, attribute) in &attributes {
                        let (start, size) = Self::attribute_range(&active.layout, attribute, vertex);
                        values.extend(data[start..start + size].chunks_exact(4).map(bytemuck::pod_read_unaligned::<f32>));
                    }
                    vertices.push(values);
                }
            }
        }

        Ok(DrawCall {
            program: program.id,
            primitive,
            first,
            count,
            vertices
        })
    }

    /// The byte range an attribute occupies for the given vertex.
    fn attribute_range(layout: &InputLayout, attribute: &VertexAttribute, vertex: u32) -> (usize, usize) {
        let size = attribute.components as usize * std::mem::size_of::<f32>();
        let stride = if layout.stride == 0 { size } else { layout.stride as usize };
        ((vertex as usize).saturating_mul(stride).saturating_add(attribute.offset as usize), size)
    }
}

impl Default for HeadlessGraphics {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsApi for HeadlessGraphics {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type Buffer = HeadlessBuffer;
    type UniformLocation = HeadlessUniformLocation;

    fn create_context(&mut self) -> Result<(), BridgeError> {
        self.context_created = true;
        self.record(Command::CreateContext);
        Ok(())
    }

    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String> {
        let parsed = parse_shader(source)?;
        Ok(HeadlessShader {
            id: self.allocate_id(),
            stage,
            inputs: parsed.inputs,
            outputs: parsed.outputs,
            uniforms: parsed.uniforms
        })
    }

    fn create_program(&mut self, vertex: &Self::Shader, fragment: &Self::Shader) -> Result<Self::Program, String> {
        if vertex.stage != ShaderStage::Vertex {
            return Err(format!("ERROR: shader {} is not a vertex shader", vertex.id));
        }
        if fragment.stage != ShaderStage::Fragment {
            return Err(format!("ERROR: shader {} is not a fragment shader", fragment.id));
        }

        for input in &fragment.inputs {
            if !vertex.outputs.iter().any(|output| output.name == input.name && output.ty == input.ty) {
                return Err(format!("ERROR: fragment input '{}' is not written by the vertex shader", input.name));
            }
        }

        let mut attributes = FxHashMap::default();
        let mut used = BTreeMap::new();
        for input in &vertex.inputs {
            if let Some(location) = input.location {
                if location >= MAX_VERTEX_ATTRIBS {
                    return Err(format!("ERROR: attribute '{}' location {location} exceeds MAX_VERTEX_ATTRIBS", input.name));
                }
                if let Some(other) = used.insert(location, &input.name) {
                    return Err(format!("ERROR: attributes '{other}' and '{}' share location {location}", input.name));
                }
                attributes.insert(input.name.clone(), location);
            }
        }

        for input in vertex.inputs.iter().filter(|x| x.location.is_none()) {
            let location = (0..MAX_VERTEX_ATTRIBS).find(|x| !used.contains_key(x))
                .ok_or_else(|| format!("ERROR: too many attributes; '{}' does not fit", input.name))?;
            used.insert(location, &input.name);
            attributes.insert(input.name.clone(), location);
        }

        let mut uniforms = FxHashMap::default();
        for uniform in vertex.uniforms.iter().chain(&fragment.uniforms) {
            let next = uniforms.len() as u32;
            uniforms.entry(uniform.name.clone()).or_insert(next);
        }

        Ok(HeadlessProgram {
            id: self.allocate_id(),
            attributes,
            uniforms
        })
    }

    fn attribute_location(&self, program: &Self::Program, name: &str) -> Option<u32> {
        program.attributes.get(name).copied()
    }

    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::UniformLocation> {
        program.uniforms.get(name).map(|&location| HeadlessUniformLocation {
            program: program.id,
            location,
            name: name.to_string()
        })
    }

    fn create_buffer(&mut self) -> Result<Self::Buffer, BridgeError> {
        let id = self.allocate_id();
        self.buffers.insert(id, Vec::new());
        Ok(HeadlessBuffer { id })
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        self.record(Command::DeleteBuffer(buffer.id));
        self.buffers.remove(&buffer.id);
        self.bindings.retain(|_, bound| *bound != buffer.id);
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: &Self::Buffer) {
        self.record(Command::BindBuffer { target, buffer: buffer.id });
        self.bindings.insert(target, buffer.id);
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        self.record(Command::BufferData { target, len: data.len() });
        match self.bindings.get(&target) {
            Some(buffer) => {
                self.buffers.insert(*buffer, data.to_vec());
            },
            None => self.error(format!("INVALID_OPERATION: bufferData: no buffer is bound to {target:?}"))
        }
    }

    fn set_input_layout(&mut self, layout: &InputLayout) {
        self.record(Command::SetInputLayout { attributes: layout.attributes.len() });
        match self.bindings.get(&BufferTarget::Array) {
            Some(&buffer) => self.layout = Some(ActiveLayout { layout: layout.clone(), buffer }),
            None => self.error("INVALID_OPERATION: vertexAttribPointer: no ARRAY_BUFFER is bound".to_string())
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Viewport { x, y, width, height };
        self.record(Command::Viewport(self.viewport));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.clear_color = color;
        self.record(Command::Clear(color));
    }

    fn use_program(&mut self, program: &Self::Program) {
        self.record(Command::UseProgram(program.id));
        self.program = Some(program.clone());
    }

    fn set_uniform(&mut self, location: &Self::UniformLocation, value: UniformValue) {
        self.record(Command::SetUniform { program: location.program, location: location.location, value });
        if self.current_program() == Some(location.program) {
            self.uniforms.insert((location.program, location.name.clone()), value);
        }
        else {
            self.error(format!("INVALID_OPERATION: uniform: location {} does not belong to the current program", location.location));
        }
    }

    fn draw_arrays(&mut self, primitive: PrimitiveType, first: u32, count: u32) {
        self.record(Command::DrawArrays { primitive, first, count });
        match self.assemble(primitive, first, count) {
            Ok(draw) => {
                push_bounded(&mut self.draws, draw, self.history);
                self.draw_count += 1;
            },
            Err(message) => self.error(message)
        }
    }
}

fn push_bounded<T>(ring: &mut VecDeque<T>, value: T, limit: usize) {
    if ring.len() >= limit {
        ring.pop_front();
    }
    ring.push_back(value);
}

struct ParsedShader {
    inputs: Vec<Declaration>,
    outputs: Vec<Declaration>,
    uniforms: Vec<Declaration>
}

enum Storage {
    In,
    Out,
    Uniform
}

/// Checks the structure of shader source and collects its global
/// variables. Errors are formatted like a driver info log.
fn parse_shader(source: &str) -> Result<ParsedShader, String> {
    let mut parsed = ParsedShader {
        inputs: Vec::new(),
        outputs: Vec::new(),
        uniforms: Vec::new()
    };

    let mut depth = 0usize;
    let mut has_main = false;
    for (number, raw_line) in source.lines().enumerate() {
        let line = raw_line.split("//").next().unwrap_or_default().trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if depth == 0 {
            let mut words = line.split(|c: char| c.is_whitespace() || c == '(').filter(|x| !x.is_empty());
            has_main |= words.next() == Some("void") && words.next() == Some("main");

            match parse_declaration(line).map_err(|error| format!("ERROR: 0:{}: {error}", number + 1))? {
                Some((Storage::In, declaration)) => parsed.inputs.push(declaration),
                Some((Storage::Out, declaration)) => parsed.outputs.push(declaration),
                Some((Storage::Uniform, declaration)) => parsed.uniforms.push(declaration),
                None => {}
            }
        }

        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.checked_sub(1).ok_or_else(|| format!("ERROR: 0:{}: unexpected '}}'", number + 1))?,
                _ => {}
            }
        }
    }

    if depth != 0 {
        Err("ERROR: unexpected end of source, unbalanced braces".to_string())
    }
    else if !has_main {
        Err("ERROR: missing main function".to_string())
    }
    else {
        Ok(parsed)
    }
}

/// Parses a global `in`, `out` or `uniform` declaration. Other statements
/// are ignored.
fn parse_declaration(line: &str) -> Result<Option<(Storage, Declaration)>, String> {
    let Some(mut statement) = line.strip_suffix(';') else { return Ok(None) };

    let mut location = None;
    if let Some(rest) = statement.strip_prefix("layout") {
        let inner = rest.trim_start().strip_prefix('(').ok_or("expected '(' after layout")?;
        let close = inner.find(')').ok_or("unterminated layout qualifier")?;
        for part in inner[..close].split(',') {
            let mut pair = part.split('=');
            if pair.next().map(str::trim) == Some("location") {
                let value = pair.next().ok_or("location requires a value")?.trim();
                location = Some(value.parse::<u32>().map_err(|_| format!("invalid location '{value}'"))?);
            }
        }
        statement = inner[close + 1..].trim_start();
    }

    let mut tokens = statement.split_whitespace().filter(|x| !IGNORED_QUALIFIERS.contains(x));
    let storage = match tokens.next() {
        Some("in") => Storage::In,
        Some("out") => Storage::Out,
        Some("uniform") => Storage::Uniform,
        _ => return Ok(None)
    };

    let ty = tokens.next().ok_or("expected a type")?;
    let name = tokens.next().ok_or("expected a name")?;
    if let Some(extra) = tokens.next() {
        return Err(format!("unexpected '{extra}'"));
    }

    let name = name.split('[').next().unwrap_or_default();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("invalid name '{name}'"));
    }

    Ok(Some((storage, Declaration {
        name: name.to_string(),
        ty: ty.to_string(),
        location
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX_SOURCE: &str = "#version 300 es
        layout (location = 1) in vec3 a_color;
        in vec2 a_position; // implicitly placed
        uniform mat4 u_transform;
        out vec4 color;
        void main()
        {
            gl_Position = u_transform * vec4(a_position, 0.0, 1.0);
            color = vec4(a_color, 1.0);
        }";

    const FRAGMENT_SOURCE: &str = "#version 300 es
        precision highp float;
        in vec4 color;
        uniform float u_alpha;
        out vec4 out_color;
        void main() {
            out_color = vec4(color.rgb, u_alpha);
        }";

    fn link(api: &mut HeadlessGraphics) -> HeadlessProgram {
        let vertex = api.create_shader(ShaderStage::Vertex, VERTEX_SOURCE).unwrap();
        let fragment = api.create_shader(ShaderStage::Fragment, FRAGMENT_SOURCE).unwrap();
        api.create_program(&vertex, &fragment).unwrap()
    }

    #[test]
    fn collects_declarations() {
        let mut api = HeadlessGraphics::new();
        let shader = api.create_shader(ShaderStage::Vertex, VERTEX_SOURCE).unwrap();
        assert_eq!(shader.inputs(), &[
            Declaration { name: "a_color".to_string(), ty: "vec3".to_string(), location: Some(1) },
            Declaration { name: "a_position".to_string(), ty: "vec2".to_string(), location: None }
        ]);
        assert_eq!(shader.outputs().len(), 1);
    }

    #[test]
    fn rejects_malformed_source() {
        let mut api = HeadlessGraphics::new();
        assert!(api.create_shader(ShaderStage::Vertex, "void main() {").unwrap_err().contains("unbalanced"));
        assert!(api.create_shader(ShaderStage::Vertex, "void other() {}").unwrap_err().contains("main"));
        assert!(api.create_shader(ShaderStage::Vertex, "}").is_err());
        assert!(api.create_shader(ShaderStage::Vertex, "layout (location = x) in vec2 a;\nvoid main() {}").unwrap_err().starts_with("ERROR: 0:1:"));
    }

    #[test]
    fn assigns_free_locations_to_implicit_attributes() {
        let mut api = HeadlessGraphics::new();
        let program = link(&mut api);
        assert_eq!(api.attribute_location(&program, "a_color"), Some(1));
        assert_eq!(api.attribute_location(&program, "a_position"), Some(0));
        assert_eq!(api.attribute_location(&program, "a_missing"), None);
    }

    #[test]
    fn merges_uniforms_of_both_stages() {
        let mut api = HeadlessGraphics::new();
        let program = link(&mut api);
        assert!(api.uniform_location(&program, "u_transform").is_some());
        assert!(api.uniform_location(&program, "u_alpha").is_some());
        assert!(api.uniform_location(&program, "u_missing").is_none());
    }

    #[test]
    fn link_checks_stages_and_varyings() {
        let mut api = HeadlessGraphics::new();
        let vertex = api.create_shader(ShaderStage::Vertex, VERTEX_SOURCE).unwrap();
        let fragment = api.create_shader(ShaderStage::Fragment, FRAGMENT_SOURCE).unwrap();
        assert!(api.create_program(&fragment, &vertex).is_err());

        let lonely = api.create_shader(ShaderStage::Fragment, "in vec4 tint;\nout vec4 c;\nvoid main() { c = tint; }").unwrap();
        assert!(api.create_program(&vertex, &lonely).unwrap_err().contains("tint"));

        let clash = api.create_shader(ShaderStage::Vertex, "layout(location=0) in vec2 a;\nlayout(location=0) in vec2 b;\nvoid main() {}").unwrap();
        assert!(api.create_program(&clash, &fragment).is_err());
    }

    #[test]
    fn buffer_data_requires_binding() {
        let mut api = HeadlessGraphics::new();
        api.buffer_data(BufferTarget::Array, &[1, 2, 3]);
        assert_eq!(api.errors().len(), 1);

        let buffer = api.create_buffer().unwrap();
        api.bind_buffer(BufferTarget::Array, &buffer);
        api.buffer_data(BufferTarget::Array, &[1, 2, 3]);
        assert_eq!(api.buffer_contents(buffer.id()), Some(&[1u8, 2, 3][..]));

        let id = buffer.id();
        api.delete_buffer(buffer);
        assert_eq!(api.bound_buffer(BufferTarget::Array), None);
        assert_eq!(api.buffer_contents(id), None);
    }

    #[test]
    fn draw_reads_interleaved_vertices() {
        let mut api = HeadlessGraphics::new();
        let program = link(&mut api);
        let buffer = api.create_buffer().unwrap();
        api.bind_buffer(BufferTarget::Array, &buffer);

        let data = [0.0f32, 1.0, 0.1, 0.2, 0.3, 2.0, 3.0, 0.4, 0.5, 0.6].iter().flat_map(|x| x.to_le_bytes()).collect::<Vec<_>>();
        api.buffer_data(BufferTarget::Array, &data);
        api.set_input_layout(&InputLayout {
            program: Handle::from_raw(1),
            stride: 20,
            attributes: vec![
                VertexAttribute { name: "a_position".to_string(), location: Some(0), offset: 0, components: 2 },
                VertexAttribute { name: "a_normal".to_string(), location: None, offset: 8, components: 3 },
                VertexAttribute { name: "a_color".to_string(), location: Some(1), offset: 8, components: 3 }
            ]
        });
        api.use_program(&program);
        api.draw_arrays(PrimitiveType::Lines, 0, 2);

        assert!(api.errors().is_empty(), "{:?}", api.errors());
        let draw = api.last_draw().unwrap();
        assert_eq!(draw.vertices, vec![vec![0.0, 1.0, 0.1, 0.2, 0.3], vec![2.0, 3.0, 0.4, 0.5, 0.6]]);

        api.draw_arrays(PrimitiveType::Lines, 1, 2);
        assert!(api.errors()[0].contains("out of range"));
        assert_eq!(api.draw_count(), 1);
    }

    #[test]
    fn draw_without_program_is_an_error() {
        let mut api = HeadlessGraphics::new();
        api.draw_arrays(PrimitiveType::Triangles, 0, 3);
        assert_eq!(api.take_errors().len(), 1);
        assert!(api.errors().is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let mut api = HeadlessGraphics::new().with_history(4);
        for _ in 0..10 {
            api.clear([0.0; 4]);
        }
        assert_eq!(api.commands().count(), 4);
    }

    #[test]
    fn error_log_is_bounded() {
        let mut api = HeadlessGraphics::new().with_history(4);
        for first in 0..1000 {
            api.draw_arrays(PrimitiveType::Triangles, first, 3);
        }

        assert_eq!(api.errors().len(), 4);
        assert_eq!(api.error_count(), 1000);
        assert_eq!(api.commands().count(), 4);
        assert_eq!(api.take_errors().len(), 4);
        assert_eq!(api.error_count(), 1000);
    }

    /// Binds `program`, an 8-byte array buffer and the given layout.
    fn bind_small_buffer(api: &mut HeadlessGraphics, program: &HeadlessProgram, attributes: Vec<VertexAttribute>) {
        let buffer = api.create_buffer().unwrap();
        api.bind_buffer(BufferTarget::Array, &buffer);
        api.buffer_data(BufferTarget::Array, &[0; 8]);
        api.set_input_layout(&InputLayout { program: Handle::from_raw(1), stride: 8, attributes });
        api.use_program(program);
    }

    #[test]
    fn huge_vertex_counts_are_rejected() {
        let mut api = HeadlessGraphics::new();
        let program = link(&mut api);
        bind_small_buffer(&mut api, &program, vec![
            VertexAttribute { name: "a_position".to_string(), location: Some(0), offset: 0, components: 2 }
        ]);

        api.draw_arrays(PrimitiveType::Triangles, 0, u32::MAX);
        assert_eq!(api.errors().len(), 1);
        assert!(api.errors()[0].starts_with("INVALID_OPERATION"), "{:?}", api.errors());
        assert_eq!(api.draw_count(), 0);
        assert!(api.last_draw().is_none());

        api.draw_arrays(PrimitiveType::Triangles, u32::MAX, 2);
        assert_eq!(api.errors().len(), 2);
        assert_eq!(api.draw_count(), 0);
    }

    #[test]
    fn draws_without_located_attributes_read_no_vertices() {
        let mut api = HeadlessGraphics::new();
        let program = link(&mut api);
        bind_small_buffer(&mut api, &program, vec![
            VertexAttribute { name: "a_missing".to_string(), location: None, offset: 0, components: 2 }
        ]);

        api.draw_arrays(PrimitiveType::Points, 0, u32::MAX);
        assert!(api.errors().is_empty(), "{:?}", api.errors());
        let draw = api.last_draw().unwrap();
        assert_eq!(draw.count, u32::MAX);
        assert!(draw.vertices.is_empty());

        bind_small_buffer(&mut api, &program, Vec::new());
        api.draw_arrays(PrimitiveType::Points, 7, 1_000_000);
        assert_eq!(api.draw_count(), 2);
        assert!(api.last_draw().unwrap().vertices.is_empty());
    }
}
