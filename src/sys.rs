//! Raw bridge imports. Handles, enum codes, offsets and lengths are all
//! passed as 32-bit integers; strings are NUL-terminated.

#[link(wasm_import_module = "env")]
extern "C" {
    pub fn platform_create_graphics() -> u32;
    pub fn platform_create_shader(graphics: u32, stage: u32, source: *const u8) -> u32;
    pub fn platform_create_program(graphics: u32, vertex: u32, fragment: u32) -> u32;
    pub fn platform_create_buffer(graphics: u32) -> u32;
    pub fn platform_delete_buffer(graphics: u32, buffer: u32);
    pub fn platform_bind_buffer(graphics: u32, buffer: u32, target: u32);
    pub fn platform_set_buffer_data(graphics: u32, buffer: u32, data: *const u8, len: u32, target: u32);
    pub fn platform_create_input_layout(graphics: u32, program: u32, names: *const u32, offsets: *const u32, formats: *const u32, stride: u32, count: u32) -> u32;
    pub fn platform_use_input_layout(graphics: u32, layout: u32);
    pub fn platform_set_viewport(graphics: u32, width: u32, height: u32);
    pub fn platform_clear_color(graphics: u32, r: f32, g: f32, b: f32, a: f32);
    pub fn platform_use_program(graphics: u32, program: u32);
    pub fn platform_get_uniform_location(graphics: u32, program: u32, name: *const u8) -> u32;
    pub fn platform_set_uniform_float(graphics: u32, location: u32, value: f32);
    pub fn platform_set_uniform_floats(graphics: u32, location: u32, values: *const f32, count: u32);
    pub fn platform_draw_arrays(graphics: u32, primitive: u32, first: u32, count: u32);
    pub fn platform_log_integer(value: u32);
    pub fn platform_throw_error(message: *const u8);
}
