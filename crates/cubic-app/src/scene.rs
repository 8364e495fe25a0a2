// SPDX-License-Identifier: CEPL-1.0
//! The built-in demo scene: a unit cube, optionally repeated on a grid.

use cubic_math::glam::{Mat4, Vec3};
use cubic_math::Camera;

/// Interleaved position, normal, uv.
type Vertex = [f32; 8];

// (normal, u, v) per face, with u x v == normal so the quads wind CCW from outside.
const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
];

pub const CUBE_INDICES: [u32; 36] = {
    let mut idx = [0u32; 36];
    let mut face = 0;
    while face < 6 {
        let base = face as u32 * 4;
        let quad = [0, 1, 2, 0, 2, 3];
        let mut i = 0;
        while i < 6 {
            idx[face * 6 + i] = base + quad[i];
            i += 1;
        }
        face += 1;
    }
    idx
};

fn cube_vertices() -> Vec<Vertex> {
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    let mut verts = Vec::with_capacity(24);
    for (n, u, v) in FACES {
        let (n, u, v) = (Vec3::from(n), Vec3::from(u), Vec3::from(v));
        for (su, sv) in corners {
            let p = (n + u * su + v * sv) * 0.5;
            verts.push([p.x, p.y, p.z, n.x, n.y, n.z, (su + 1.0) * 0.5, (1.0 - sv) * 0.5]);
        }
    }
    verts
}

/// Cube vertex data in the engine's 32-byte layout.
pub fn cube_vertex_bytes() -> Vec<u8> {
    bytemuck::cast_slice(&cube_vertices()).to_vec()
}

/// `count` translations on a square grid centered at the origin.
pub fn instance_grid(count: u32, spacing: f32) -> Vec<Mat4> {
    if count == 0 {
        return Vec::new();
    }
    let cols = (count as f32).sqrt().ceil() as u32;
    let rows = count.div_ceil(cols);
    let half_w = (cols - 1) as f32 * spacing * 0.5;
    let half_d = (rows - 1) as f32 * spacing * 0.5;
    (0..count)
        .map(|i| {
            let (c, r) = (i % cols, i / cols);
            Mat4::from_translation(Vec3::new(
                c as f32 * spacing - half_w,
                0.0,
                r as f32 * spacing - half_d,
            ))
        })
        .collect()
}

/// Camera far enough back to frame `count` instances (or one cube).
pub fn demo_camera(count: u32, spacing: f32) -> Camera {
    let span = ((count.max(1) as f32).sqrt().ceil() * spacing).max(2.0);
    Camera {
        position: Vec3::new(0.0, span * 0.6, span * 1.5),
        far: span * 10.0,
        ..Camera::default()
    }
}
