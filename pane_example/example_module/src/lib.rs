//! A module that clears the surface and draws two rectangles every frame.
//! Build it with `cargo build -p example_module --target wasm32-unknown-unknown`.

#[cfg(target_arch = "wasm32")]
mod module {
    use pane::*;
    use std::cell::*;
    use std::ffi::*;

    /// Position (2 floats) followed by color (3 floats).
    const FLOATS_PER_VERTEX: usize = 5;
    /// The capacity of the per-frame vertex buffer.
    const MAX_DRAW_FLOATS: usize = 512;

    const VERTEX_SHADER: &CStr = c"#version 300 es

layout (location = 0) in vec2 a_position;
layout (location = 1) in vec3 a_color;

out vec4 color;

void main()
{
    gl_Position = vec4(a_position, 0.0, 1.0);
    color = vec4(a_color, 1.0);
}
";

    const FRAGMENT_SHADER: &CStr = c"#version 300 es

precision highp float;

in vec4 color;

out vec4 out_color;

void main()
{
    out_color = color;
}
";

    struct State {
        graphics: GraphicsHandle,
        program: ProgramHandle,
        buffer: BufferHandle,
        vertices: Vec<f32>
    }

    impl State {
        /// Queues two triangles covering the rectangle.
        fn draw_rectangle(&mut self, x: f32, y: f32, width: f32, height: f32, [r, g, b]: [f32; 3]) {
            if self.vertices.len() + 6 * FLOATS_PER_VERTEX > MAX_DRAW_FLOATS {
                throw_error(c"Draw buffer overflow");
            }

            let (x1, x2, y1, y2) = (x, x + width, y, y + height);
            for (x, y) in [(x1, y1), (x2, y1), (x1, y2), (x1, y2), (x2, y1), (x2, y2)] {
                self.vertices.extend_from_slice(&[x, y, r, g, b]);
            }
        }

        /// Uploads the queued vertices and draws them.
        fn flush(&mut self) {
            self.graphics.set_buffer_data(self.buffer, bytemuck::cast_slice(&self.vertices), BufferTarget::Array);
            self.graphics.use_program(self.program);
            self.graphics.draw_arrays(PrimitiveType::Triangles, 0, (self.vertices.len() / FLOATS_PER_VERTEX) as u32);
            self.vertices.clear();
        }
    }

    thread_local! {
        static STATE: RefCell<Option<State>> = const { RefCell::new(None) };
    }

    #[no_mangle]
    pub extern "C" fn init(width: u32, height: u32) {
        let graphics = GraphicsHandle::create();
        let vertex_shader = graphics.create_shader(ShaderStage::Vertex, VERTEX_SHADER);
        let fragment_shader = graphics.create_shader(ShaderStage::Fragment, FRAGMENT_SHADER);
        let program = graphics.create_program(vertex_shader, fragment_shader);

        let buffer = graphics.create_buffer();
        graphics.bind_buffer(buffer, BufferTarget::Array);

        let layout = graphics.create_input_layout(program, &InputLayoutBuilder::new()
            .with_attribute(c"a_position", 2)
            .with_attribute(c"a_color", 3));
        graphics.use_input_layout(layout);

        graphics.set_viewport(width, height);
        graphics.clear_color([0.392, 0.584, 0.929, 1.0]);

        for value in [width, height, graphics.raw(), vertex_shader.raw(), fragment_shader.raw(), program.raw(), buffer.raw(), layout.raw()] {
            log_integer(value);
        }

        STATE.with_borrow_mut(|state| *state = Some(State {
            graphics,
            program,
            buffer,
            vertices: Vec::with_capacity(MAX_DRAW_FLOATS)
        }));
    }

    #[no_mangle]
    pub extern "C" fn render() {
        STATE.with_borrow_mut(|state| {
            let Some(state) = state else { throw_error(c"render was called before init") };

            state.graphics.clear_color([0.7, 0.584, 0.7, 1.0]);
            state.draw_rectangle(-0.25, -0.25, 0.5, 0.5, [1.0, 0.0, 0.0]);
            state.draw_rectangle(0.0, 0.0, 0.01, 0.01, [1.0, 1.0, 1.0]);
            state.flush();
        });
    }
}
