//! STL triangle-soup decoding and encoding (binary and ASCII variants).

use std::fmt::Write as _;

use glam::Vec3;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::types::{Triangle, TriangleMesh};

/// Free-form header preceding the triangle count in binary files.
pub const HEADER_LEN: usize = 80;
/// Header plus the little-endian u32 triangle count.
pub const PREAMBLE_LEN: usize = HEADER_LEN + 4;
/// Normal (12) + three corners (36) + attribute byte count (2).
pub const RECORD_LEN: usize = 50;

/// Which STL variant a byte buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StlFormat {
    Binary,
    Ascii,
}

impl StlFormat {
    /// Guess the variant from content.
    ///
    /// A buffer whose length matches its own header count exactly is binary
    /// even when the header text happens to start with `solid`.
    pub fn detect(data: &[u8]) -> Self {
        if data.len() >= PREAMBLE_LEN {
            let declared = read_u32(data, HEADER_LEN) as usize;
            let expected = declared
                .checked_mul(RECORD_LEN)
                .and_then(|n| n.checked_add(PREAMBLE_LEN));
            if expected == Some(data.len()) {
                return StlFormat::Binary;
            }
        }

        let start = data
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(data.len());
        let rest = &data[start..];
        let keyword_ends = rest.len() == 5 || rest.get(5).is_some_and(|b| b.is_ascii_whitespace());
        if rest.starts_with(b"solid") && keyword_ends {
            StlFormat::Ascii
        } else {
            StlFormat::Binary
        }
    }
}

/// Raw bytes of a mesh source together with their declared variant.
#[derive(Debug, Clone)]
pub struct RawMeshBytes {
    pub data: Vec<u8>,
    pub format: StlFormat,
}

impl RawMeshBytes {
    pub fn new(data: Vec<u8>, format: StlFormat) -> Self {
        Self { data, format }
    }

    /// Declare the variant by inspecting the content.
    pub fn detect(data: Vec<u8>) -> Self {
        let format = StlFormat::detect(&data);
        Self { data, format }
    }

    /// Declare the format from a source name (path, URL or file name).
    ///
    /// Names ending in `.stl` (any case) or carrying no extension at all are
    /// accepted and the variant is detected from content. Anything else is an
    /// unsupported format.
    pub fn from_named(name: &str, data: Vec<u8>) -> Result<Self, DecodeError> {
        match extension_of(name) {
            None => Ok(Self::detect(data)),
            Some(ext) if ext.eq_ignore_ascii_case("stl") => Ok(Self::detect(data)),
            Some(ext) => Err(DecodeError::UnsupportedFormat {
                extension: Some(ext.to_string()),
            }),
        }
    }
}

/// Extension of the last path segment of a path or URL, ignoring any query
/// string or fragment.
fn extension_of(name: &str) -> Option<&str> {
    let without_suffix = name.split(['?', '#']).next().unwrap_or(name);
    let segment = without_suffix
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(without_suffix);
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Decode a triangle soup. Nothing outside the returned value is touched, so
/// a failure leaves every caller-visible state as it was.
pub fn decode(raw: &RawMeshBytes) -> Result<TriangleMesh, DecodeError> {
    let mut mesh = match raw.format {
        StlFormat::Binary => decode_binary(&raw.data)?,
        StlFormat::Ascii => decode_ascii(&raw.data)?,
    };

    let repaired = mesh.repair_normals();
    if repaired > 0 {
        warn!("Recomputed {repaired} unusable facet normals from winding order");
    }

    debug!(
        "Decoded {:?} STL: {} triangles from {} bytes",
        raw.format,
        mesh.triangle_count(),
        raw.data.len()
    );
    Ok(mesh)
}

// ── Binary ───────────────────────────────────────────────────

/// Decode the binary variant.
///
/// The record count is derived from the buffer length; the header count is
/// advisory. A header announcing triangles with not even one full record
/// behind it is truncated.
fn decode_binary(data: &[u8]) -> Result<TriangleMesh, DecodeError> {
    if data.len() < PREAMBLE_LEN {
        return Err(DecodeError::Truncated {
            details: format!(
                "expected at least {PREAMBLE_LEN} bytes of header, got {}",
                data.len()
            ),
        });
    }

    let declared = read_u32(data, HEADER_LEN) as usize;
    let body = data.len() - PREAMBLE_LEN;
    let available = body / RECORD_LEN;
    let trailing = body % RECORD_LEN;

    if available == 0 && declared > 0 {
        return Err(DecodeError::Truncated {
            details: format!(
                "header announces {declared} triangles but only {body} bytes of records follow"
            ),
        });
    }
    if declared != available {
        warn!(
            "Binary STL header announces {declared} triangles, buffer holds {available}; using {available}"
        );
    }
    if trailing != 0 {
        warn!("Ignoring {trailing} trailing bytes after the last complete triangle record");
    }

    let mut mesh = TriangleMesh::with_capacity(available);
    for record in 0..available {
        let offset = PREAMBLE_LEN + record * RECORD_LEN;
        let normal = read_vec3(data, offset);
        let vertices = [
            read_vec3(data, offset + 12),
            read_vec3(data, offset + 24),
            read_vec3(data, offset + 36),
        ];
        if !vertices.iter().all(|v| v.is_finite()) {
            return Err(DecodeError::Malformed {
                details: format!("triangle record {record} has a non-finite vertex"),
            });
        }
        mesh.triangles.push(Triangle::new(normal, vertices));
    }

    Ok(mesh)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_vec3(data: &[u8], offset: usize) -> Vec3 {
    Vec3::new(
        read_f32(data, offset),
        read_f32(data, offset + 4),
        read_f32(data, offset + 8),
    )
}

// ── ASCII ────────────────────────────────────────────────────

/// Non-blank lines of ASCII input, split into whitespace-separated tokens.
struct Statements<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Statements<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
        }
    }

    /// Next statement as (1-based line number, tokens).
    fn next_statement(&mut self) -> Option<(usize, Vec<&'a str>)> {
        for (index, line) in self.lines.by_ref() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if !tokens.is_empty() {
                return Some((index + 1, tokens));
            }
        }
        None
    }

    /// Next statement, treating end of input as truncation.
    fn require(&mut self, context: &str) -> Result<(usize, Vec<&'a str>), DecodeError> {
        self.next_statement().ok_or_else(|| DecodeError::Truncated {
            details: format!("input ended {context}"),
        })
    }

    /// Next statement must consist of exactly `keywords`.
    fn expect_keywords(&mut self, keywords: &[&str], context: &str) -> Result<(), DecodeError> {
        let (line, tokens) = self.require(context)?;
        if tokens != keywords {
            return Err(malformed(
                line,
                format!("expected `{}`, found `{}`", keywords.join(" "), tokens.join(" ")),
            ));
        }
        Ok(())
    }
}

fn malformed(line: usize, details: String) -> DecodeError {
    DecodeError::Malformed {
        details: format!("line {line}: {details}"),
    }
}

/// Decode the ASCII variant: one or more `solid … endsolid` blocks of facets.
fn decode_ascii(data: &[u8]) -> Result<TriangleMesh, DecodeError> {
    let text = std::str::from_utf8(data).map_err(|e| DecodeError::Malformed {
        details: format!("ASCII STL is not valid UTF-8 after byte {}", e.valid_up_to()),
    })?;

    let mut statements = Statements::new(text);
    let mut mesh = TriangleMesh::default();
    let mut solids = 0usize;

    while let Some((line, tokens)) = statements.next_statement() {
        if tokens[0] != "solid" {
            return Err(malformed(line, format!("expected `solid`, found `{}`", tokens[0])));
        }
        solids += 1;
        let context = format!("inside solid started at line {line}");

        loop {
            let (line, tokens) = statements.require(&context)?;
            match tokens[0] {
                "endsolid" => break,
                "facet" => {
                    let normal = parse_facet(line, &tokens)?;
                    statements.expect_keywords(&["outer", "loop"], &context)?;
                    let mut vertices = [Vec3::ZERO; 3];
                    for vertex in &mut vertices {
                        let (line, tokens) = statements.require(&context)?;
                        *vertex = parse_vertex(line, &tokens)?;
                    }
                    statements.expect_keywords(&["endloop"], &context)?;
                    statements.expect_keywords(&["endfacet"], &context)?;
                    mesh.triangles.push(Triangle::new(normal, vertices));
                }
                other => {
                    return Err(malformed(
                        line,
                        format!("expected `facet` or `endsolid`, found `{other}`"),
                    ));
                }
            }
        }
    }

    if solids == 0 {
        return Err(DecodeError::Truncated {
            details: "ASCII STL contains no `solid` statement".to_string(),
        });
    }

    Ok(mesh)
}

fn parse_facet(line: usize, tokens: &[&str]) -> Result<Vec3, DecodeError> {
    match tokens {
        ["facet", "normal", x, y, z] => {
            // Normals may be non-finite; they get recomputed afterwards.
            Ok(Vec3::new(
                parse_number(line, x)?,
                parse_number(line, y)?,
                parse_number(line, z)?,
            ))
        }
        _ => Err(malformed(
            line,
            format!("expected `facet normal x y z`, found `{}`", tokens.join(" ")),
        )),
    }
}

fn parse_vertex(line: usize, tokens: &[&str]) -> Result<Vec3, DecodeError> {
    match tokens {
        ["vertex", x, y, z] => {
            let v = Vec3::new(
                parse_number(line, x)?,
                parse_number(line, y)?,
                parse_number(line, z)?,
            );
            if !v.is_finite() {
                return Err(malformed(line, "vertex coordinate is not finite".to_string()));
            }
            Ok(v)
        }
        _ => Err(malformed(
            line,
            format!("expected `vertex x y z`, found `{}`", tokens.join(" ")),
        )),
    }
}

fn parse_number(line: usize, token: &str) -> Result<f32, DecodeError> {
    token
        .parse::<f32>()
        .map_err(|_| malformed(line, format!("non-numeric coordinate `{token}`")))
}

// ── Encoding ─────────────────────────────────────────────────

/// Encode as binary STL. `header` is truncated or zero-padded to 80 bytes.
pub fn encode_binary(mesh: &TriangleMesh, header: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREAMBLE_LEN + mesh.triangle_count() * RECORD_LEN);

    let mut header_bytes = [0u8; HEADER_LEN];
    let len = header.len().min(HEADER_LEN);
    header_bytes[..len].copy_from_slice(&header.as_bytes()[..len]);
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&(mesh.triangle_count() as u32).to_le_bytes());

    for triangle in &mesh.triangles {
        push_vec3(&mut out, triangle.normal);
        for v in triangle.vertices {
            push_vec3(&mut out, v);
        }
        out.extend_from_slice(&[0, 0]);
    }

    out
}

fn push_vec3(out: &mut Vec<u8>, v: Vec3) {
    out.extend_from_slice(&v.x.to_le_bytes());
    out.extend_from_slice(&v.y.to_le_bytes());
    out.extend_from_slice(&v.z.to_le_bytes());
}

/// Encode as ASCII STL with a single named solid.
pub fn encode_ascii(mesh: &TriangleMesh, name: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "solid {name}");
    for t in &mesh.triangles {
        let n = t.normal;
        let _ = writeln!(out, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z);
        let _ = writeln!(out, "    outer loop");
        for v in t.vertices {
            let _ = writeln!(out, "      vertex {:e} {:e} {:e}", v.x, v.y, v.z);
        }
        let _ = writeln!(out, "    endloop");
        let _ = writeln!(out, "  endfacet");
    }
    let _ = writeln!(out, "endsolid {name}");
    out
}
