use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use glow::HasContext;

use stl_viewer_lib::render::{
    FrameDescription, MeshData, MeshHandle, RenderBackend, ResourceError, SurfaceSize,
};

// ── GPU mesh handles ─────────────────────────────────────────

struct GpuMesh {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ibo: glow::Buffer,
    index_count: i32,
}

// ── Renderer state shared with the paint callback ────────────

/// GPU objects plus the most recent frame description. Uploads happen in
/// `update`; drawing happens inside egui's paint callback.
#[derive(Default)]
pub struct GlRenderer {
    program: Option<glow::Program>,
    meshes: HashMap<MeshHandle, GpuMesh>,
    next_handle: u64,
    frame: Option<FrameDescription>,
}

impl GlRenderer {
    /// Draw the stored frame into `viewport` ([x, y, width, height] in
    /// pixels from the bottom-left), scissored to `clip`.
    pub fn paint(&self, gl: &glow::Context, viewport: [i32; 4], clip: [i32; 4]) {
        let (Some(program), Some(frame)) = (self.program, self.frame) else {
            return;
        };

        unsafe {
            gl.viewport(viewport[0], viewport[1], viewport[2], viewport[3]);
            gl.scissor(clip[0], clip[1], clip[2], clip[3]);
            gl.enable(glow::SCISSOR_TEST);

            gl.clear_color(frame.background[0], frame.background[1], frame.background[2], 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

            if let Some(mesh) = frame.mesh.and_then(|handle| self.meshes.get(&handle)) {
                gl.enable(glow::DEPTH_TEST);
                gl.depth_func(glow::LESS);

                gl.use_program(Some(program));
                set_uniform_mat4(gl, program, "u_model", &frame.model);
                set_uniform_mat4(gl, program, "u_view_proj", &(frame.projection * frame.view));
                set_uniform_vec3(gl, program, "u_eye", frame.eye.to_array());
                set_uniform_vec3(gl, program, "u_light_dir", frame.lighting.light_direction.to_array());
                set_uniform_vec3(gl, program, "u_light_color", frame.lighting.light_color);
                set_uniform_vec3(gl, program, "u_ambient", frame.lighting.ambient);
                set_uniform_vec3(gl, program, "u_specular", frame.material.specular);
                set_uniform_f32(gl, program, "u_shininess", frame.material.shininess);

                draw_mesh(gl, mesh);

                gl.disable(glow::DEPTH_TEST);
                gl.use_program(None);
            }

            gl.disable(glow::SCISSOR_TEST);
        }
    }
}

// ── RenderBackend implementation ─────────────────────────────

/// glow implementation of [`RenderBackend`]. Must only be used while the
/// eframe GL context is current (inside `update` or `on_exit`).
pub struct GlBackend {
    gl: Arc<glow::Context>,
    renderer: Arc<Mutex<GlRenderer>>,
}

impl GlBackend {
    /// Returns the backend and the renderer handle the paint callback draws with.
    pub fn new(gl: Arc<glow::Context>) -> (Self, Arc<Mutex<GlRenderer>>) {
        let renderer = Arc::new(Mutex::new(GlRenderer::default()));
        let backend = Self {
            gl,
            renderer: Arc::clone(&renderer),
        };
        (backend, renderer)
    }

    fn renderer(&self) -> Result<MutexGuard<'_, GlRenderer>, ResourceError> {
        self.renderer.lock().map_err(|_| ResourceError::Poisoned)
    }
}

impl RenderBackend for GlBackend {
    fn attach(&mut self) -> Result<(), ResourceError> {
        let program = compile_program(&self.gl, MESH_VERT, MESH_FRAG)?;
        let mut r = self.renderer()?;
        if let Some(old) = r.program.replace(program) {
            unsafe { self.gl.delete_program(old) };
        }
        tracing::info!("GL renderer attached");
        Ok(())
    }

    fn upload_mesh(&mut self, data: &MeshData) -> Result<MeshHandle, ResourceError> {
        let mut r = self.renderer()?;
        if r.program.is_none() {
            return Err(ResourceError::Detached);
        }
        let gpu = upload_mesh(&self.gl, data)?;
        r.next_handle += 1;
        let handle = MeshHandle(r.next_handle);
        r.meshes.insert(handle, gpu);
        tracing::debug!(
            "Uploaded mesh {handle:?}: {} vertices, {} indices",
            data.vertex_count(),
            data.indices.len()
        );
        Ok(handle)
    }

    fn release_mesh(&mut self, handle: MeshHandle) -> Result<(), ResourceError> {
        let mut r = self.renderer()?;
        let mesh = r
            .meshes
            .remove(&handle)
            .ok_or(ResourceError::UnknownMesh(handle))?;
        delete_mesh(&self.gl, mesh);
        Ok(())
    }

    fn resize(&mut self, size: SurfaceSize) {
        // The paint callback reads the viewport from egui each frame.
        tracing::trace!("GL surface now {}x{}", size.width, size.height);
    }

    fn render(&mut self, frame: &FrameDescription) {
        match self.renderer() {
            Ok(mut r) => r.frame = Some(*frame),
            Err(e) => tracing::error!("Dropping frame: {e}"),
        }
    }

    fn detach(&mut self) -> Result<(), ResourceError> {
        let mut r = self.renderer()?;
        let leftover = r.meshes.len();
        for (_, mesh) in r.meshes.drain() {
            delete_mesh(&self.gl, mesh);
        }
        if let Some(program) = r.program.take() {
            unsafe { self.gl.delete_program(program) };
        }
        r.frame = None;
        tracing::info!("GL renderer detached ({leftover} meshes still resident were freed)");
        Ok(())
    }
}

// ── GPU upload ───────────────────────────────────────────────

fn upload_mesh(gl: &glow::Context, data: &MeshData) -> Result<GpuMesh, ResourceError> {
    unsafe {
        let vao = gl.create_vertex_array().map_err(ResourceError::Allocation)?;
        let vbo = match gl.create_buffer() {
            Ok(vbo) => vbo,
            Err(e) => {
                gl.delete_vertex_array(vao);
                return Err(ResourceError::Allocation(e));
            }
        };
        let ibo = match gl.create_buffer() {
            Ok(ibo) => ibo,
            Err(e) => {
                gl.delete_buffer(vbo);
                gl.delete_vertex_array(vao);
                return Err(ResourceError::Allocation(e));
            }
        };

        gl.bind_vertex_array(Some(vao));

        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(&data.vertices),
            glow::STATIC_DRAW,
        );

        let stride = 9 * 4; // 9 floats * 4 bytes
        // position: location 0
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
        // normal: location 1
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 3 * 4);
        // color: location 2
        gl.enable_vertex_attrib_array(2);
        gl.vertex_attrib_pointer_f32(2, 3, glow::FLOAT, false, stride, 6 * 4);

        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
        gl.buffer_data_u8_slice(
            glow::ELEMENT_ARRAY_BUFFER,
            bytemuck::cast_slice(&data.indices),
            glow::STATIC_DRAW,
        );

        gl.bind_vertex_array(None);

        let mesh = GpuMesh {
            vao,
            vbo,
            ibo,
            index_count: data.indices.len() as i32,
        };

        if gl.get_error() == glow::OUT_OF_MEMORY {
            delete_mesh(gl, mesh);
            return Err(ResourceError::Allocation(format!(
                "out of memory uploading {} vertices",
                data.vertex_count()
            )));
        }

        Ok(mesh)
    }
}

fn delete_mesh(gl: &glow::Context, mesh: GpuMesh) {
    unsafe {
        gl.delete_vertex_array(mesh.vao);
        gl.delete_buffer(mesh.vbo);
        gl.delete_buffer(mesh.ibo);
    }
}

// ── Draw calls ───────────────────────────────────────────────

unsafe fn draw_mesh(gl: &glow::Context, mesh: &GpuMesh) {
    gl.bind_vertex_array(Some(mesh.vao));
    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(mesh.ibo));
    gl.draw_elements(glow::TRIANGLES, mesh.index_count, glow::UNSIGNED_INT, 0);
    gl.bind_vertex_array(None);
}

// ── Shader compilation ───────────────────────────────────────

fn compile_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> Result<glow::Program, ResourceError> {
    unsafe {
        let vert = compile_shader(gl, glow::VERTEX_SHADER, vert_src)?;
        let frag = match compile_shader(gl, glow::FRAGMENT_SHADER, frag_src) {
            Ok(frag) => frag,
            Err(e) => {
                gl.delete_shader(vert);
                return Err(e);
            }
        };

        let program = match gl.create_program() {
            Ok(program) => program,
            Err(e) => {
                gl.delete_shader(vert);
                gl.delete_shader(frag);
                return Err(ResourceError::Allocation(e));
            }
        };
        gl.attach_shader(program, vert);
        gl.attach_shader(program, frag);
        gl.link_program(program);
        let linked = gl.get_program_link_status(program);
        gl.delete_shader(vert);
        gl.delete_shader(frag);

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            tracing::error!("Program link error: {log}");
            return Err(ResourceError::Shader(log));
        }
        Ok(program)
    }
}

unsafe fn compile_shader(
    gl: &glow::Context,
    kind: u32,
    src: &str,
) -> Result<glow::Shader, ResourceError> {
    let shader = gl.create_shader(kind).map_err(ResourceError::Allocation)?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        tracing::error!("Shader compile error: {log}");
        return Err(ResourceError::Shader(log));
    }
    Ok(shader)
}

// ── Uniform setters ──────────────────────────────────────────

fn set_uniform_mat4(gl: &glow::Context, program: glow::Program, name: &str, mat: &glam::Mat4) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &mat.to_cols_array());
    }
}

fn set_uniform_vec3(gl: &glow::Context, program: glow::Program, name: &str, v: [f32; 3]) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_3_f32(loc.as_ref(), v[0], v[1], v[2]);
    }
}

fn set_uniform_f32(gl: &glow::Context, program: glow::Program, name: &str, v: f32) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_1_f32(loc.as_ref(), v);
    }
}

// ── Shaders ──────────────────────────────────────────────────

const MESH_VERT: &str = r#"#version 330 core
uniform mat4 u_model;
uniform mat4 u_view_proj;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec3 a_color;

out vec3 v_world;
out vec3 v_normal;
out vec3 v_color;

void main() {
    vec4 world = u_model * vec4(a_position, 1.0);
    v_world = world.xyz;
    // model is a pure rotation
    v_normal = mat3(u_model) * a_normal;
    v_color = a_color;
    gl_Position = u_view_proj * world;
}
"#;

const MESH_FRAG: &str = r#"#version 330 core
uniform vec3 u_eye;
uniform vec3 u_light_dir;
uniform vec3 u_light_color;
uniform vec3 u_ambient;
uniform vec3 u_specular;
uniform float u_shininess;

in vec3 v_world;
in vec3 v_normal;
in vec3 v_color;

out vec4 frag_color;

void main() {
    vec3 n = normalize(v_normal);
    if (!gl_FrontFacing) {
        n = -n;
    }
    vec3 l = normalize(u_light_dir);
    vec3 v = normalize(u_eye - v_world);
    vec3 h = normalize(l + v);

    float diffuse = max(dot(n, l), 0.0);
    float specular = diffuse > 0.0 ? pow(max(dot(n, h), 0.0), u_shininess) : 0.0;

    vec3 rgb = v_color * (u_ambient + u_light_color * diffuse)
             + u_specular * u_light_color * specular;
    frag_color = vec4(rgb, 1.0);
}
"#;
