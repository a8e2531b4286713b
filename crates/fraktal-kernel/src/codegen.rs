//! WGSL generation for a linked kernel.
//!
//! Module layout, top to bottom:
//!
//! | Section | Contents |
//! |---------|----------|
//! | uniforms | `FraktalUniforms`: grid, per-target and per-array info, value params |
//! | bindings | uniform block, output storage (read_write), array storage (read) |
//! | privates | `globalIdx`, value param mirrors, outputs, array ids |
//! | helpers | `loadArray1D`, `loadArray2D`, `arraySize`, accumulation |
//! | fragments | user bodies, verbatim, in link order |
//! | entry points | bounds check, `main()`, additive store into each target |
//!
//! Value parameters are mirrored into module-scope privates at the start of
//! every invocation so fragment bodies use them as plain globals.

use crate::compiler::{Fragment, OutputDecl};
use crate::program::{ENTRY_1D, ENTRY_2D, ParamBinding, ParamSlot, UNIFORM_BINDING, WORKGROUP_1D, WORKGROUP_2D};

// ── Source map ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Segment {
    first_line: usize,
    lines: usize,
    origin: Option<String>,
}

/// Maps lines of the generated module back to fragment lines.
#[derive(Debug, Default)]
pub(crate) struct SourceMap {
    segments: Vec<Segment>,
}

impl SourceMap {
    /// `(origin, line)` for a 1-based line of the combined module.
    pub(crate) fn locate(&self, line: usize) -> (String, usize) {
        self.segments
            .iter()
            .find(|s| line >= s.first_line && line < s.first_line + s.lines)
            .map(|s| match &s.origin {
                Some(origin) => (origin.clone(), line - s.first_line + 1),
                None => ("<generated>".to_owned(), line),
            })
            .unwrap_or_else(|| ("<generated>".to_owned(), line))
    }
}

// ── Emitter ───────────────────────────────────────────────────────────────

struct Emitter {
    out: String,
    next_line: usize,
    map: SourceMap,
}

impl Emitter {
    fn new() -> Self {
        Self { out: String::new(), next_line: 1, map: SourceMap::default() }
    }

    fn push(&mut self, text: &str, origin: Option<&str>) {
        let mut text = text.to_owned();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        let lines = text.matches('\n').count();
        self.map.segments.push(Segment {
            first_line: self.next_line,
            lines,
            origin: origin.map(str::to_owned),
        });
        self.next_line += lines;
        self.out.push_str(&text);
    }
}

/// Small line builder for generated sections.
#[derive(Default)]
struct Lines(String);

impl Lines {
    fn line(&mut self, s: impl AsRef<str>) {
        self.0.push_str(s.as_ref());
        self.0.push('\n');
    }
}

// ── Generation ────────────────────────────────────────────────────────────

pub(crate) fn generate(fragments: &[Fragment], params: &[ParamSlot], outputs: &[OutputDecl]) -> (String, SourceMap) {
    let arrays: Vec<(&str, u32, u32)> = params
        .iter()
        .filter_map(|p| match p.binding {
            ParamBinding::Array { slot, info_offset, .. } => Some((p.name.as_str(), slot, info_offset)),
            ParamBinding::Value { .. } => None,
        })
        .collect();
    let values: Vec<&ParamSlot> = params
        .iter()
        .filter(|p| matches!(p.binding, ParamBinding::Value { .. }))
        .collect();

    let mut e = Emitter::new();
    e.push(&declarations(&arrays, &values, outputs), None);
    e.push(&helpers(&arrays), None);
    for f in fragments {
        e.push(f.body(), Some(&f.origin));
    }
    e.push(&entry_points(&values, outputs), None);
    (e.out, e.map)
}

fn declarations(arrays: &[(&str, u32, u32)], values: &[&ParamSlot], outputs: &[OutputDecl]) -> String {
    let mut s = Lines::default();

    s.line("struct FraktalUniforms {");
    s.line("    fraktal_grid: vec4<i32>,");
    for i in 0..outputs.len() {
        s.line(format!("    fraktal_target_info_{i}: vec4<i32>,"));
    }
    for (_, slot, _) in arrays {
        s.line(format!("    fraktal_array_info_{slot}: vec4<i32>,"));
    }
    for p in values {
        if let ParamBinding::Value { ty, .. } = p.binding {
            s.line(format!("    {}: {},", p.name, ty.wgsl()));
        }
    }
    s.line("}");
    s.line("");

    s.line(format!(
        "@group(0) @binding({UNIFORM_BINDING}) var<uniform> fraktal_uniforms: FraktalUniforms;"
    ));
    for i in 0..outputs.len() {
        s.line(format!(
            "@group(0) @binding({}) var<storage, read_write> fraktal_target_{i}: array<f32>;",
            1 + i
        ));
    }
    for (_, slot, _) in arrays {
        s.line(format!(
            "@group(0) @binding({}) var<storage, read> fraktal_array_{slot}: array<f32>;",
            1 + outputs.len() + *slot as usize
        ));
    }
    s.line("");

    s.line("var<private> globalIdx: vec2<i32>;");
    for p in values {
        if let ParamBinding::Value { ty, .. } = p.binding {
            s.line(format!("var<private> {}: {};", p.name, ty.wgsl()));
        }
    }
    for o in outputs {
        s.line(format!("var<private> {}: {};", o.name, o.ty.wgsl()));
    }
    for (name, slot, _) in arrays {
        s.line(format!("const {name}: i32 = {slot};"));
    }
    s.0
}

fn helpers(arrays: &[(&str, u32, u32)]) -> String {
    let mut s = Lines::default();

    s.line("fn fraktal_fetch(id: i32, index: i32) -> vec4<f32> {");
    s.line("    var v = vec4<f32>(0.0, 0.0, 0.0, 1.0);");
    if !arrays.is_empty() {
        s.line("    switch id {");
        for (_, slot, _) in arrays {
            s.line(format!("        case {slot}: {{"));
            s.line(format!("            let info = fraktal_uniforms.fraktal_array_info_{slot};"));
            s.line("            if info.z > 0 {");
            s.line("                let base = u32(clamp(index, 0, info.x * max(info.y, 1) - 1) * info.z);");
            s.line(format!("                v.x = fraktal_array_{slot}[base];"));
            s.line("                if info.z > 1 {");
            s.line(format!("                    v.y = fraktal_array_{slot}[base + 1u];"));
            s.line("                }");
            s.line("                if info.z > 3 {");
            s.line(format!("                    v.z = fraktal_array_{slot}[base + 2u];"));
            s.line(format!("                    v.w = fraktal_array_{slot}[base + 3u];"));
            s.line("                }");
            s.line("            }");
            s.line("        }");
        }
        s.line("        default: {}");
        s.line("    }");
    }
    s.line("    return v;");
    s.line("}");
    s.line("");

    s.line("fn arraySize(id: i32) -> vec2<i32> {");
    if !arrays.is_empty() {
        s.line("    switch id {");
        for (_, slot, _) in arrays {
            s.line(format!(
                "        case {slot}: {{ return fraktal_uniforms.fraktal_array_info_{slot}.xy; }}"
            ));
        }
        s.line("        default: {}");
        s.line("    }");
    }
    s.line("    return vec2<i32>(0, 0);");
    s.line("}");
    s.line("");

    s.line("fn loadArray1D(id: i32, i: i32) -> vec4<f32> {");
    s.line("    return fraktal_fetch(id, i);");
    s.line("}");
    s.line("");
    s.line("fn loadArray2D(id: i32, p: vec2<i32>) -> vec4<f32> {");
    s.line("    let size = arraySize(id);");
    s.line("    let q = clamp(p, vec2<i32>(0, 0), max(size - vec2<i32>(1, 1), vec2<i32>(0, 0)));");
    s.line("    return fraktal_fetch(id, q.y * size.x + q.x);");
    s.line("}");
    s.line("");

    s.line("fn fraktal_accumulate(current: f32, value: f32, quantize: i32) -> f32 {");
    s.line("    let sum = current + value;");
    s.line("    if quantize != 0 {");
    s.line("        return round(clamp(sum, 0.0, 1.0) * 255.0) / 255.0;");
    s.line("    }");
    s.line("    return sum;");
    s.line("}");
    s.0
}

fn entry_points(values: &[&ParamSlot], outputs: &[OutputDecl]) -> String {
    let mut s = Lines::default();

    s.line("fn fraktal_invoke(fraktal_id: vec2<u32>) {");
    s.line("    let fraktal_size = fraktal_uniforms.fraktal_grid;");
    s.line("    if i32(fraktal_id.x) >= fraktal_size.x || i32(fraktal_id.y) >= fraktal_size.y {");
    s.line("        return;");
    s.line("    }");
    s.line("    globalIdx = vec2<i32>(fraktal_id);");
    for p in values {
        s.line(format!("    {0} = fraktal_uniforms.{0};", p.name));
    }
    s.line("    main();");
    s.line("    let fraktal_index = fraktal_id.y * u32(fraktal_size.x) + fraktal_id.x;");
    for (i, o) in outputs.iter().enumerate() {
        let target = format!("fraktal_target_{i}");
        let info = format!("fraktal_info_{i}");
        let value = format!("fraktal_value_{i}");
        let base = format!("fraktal_base_{i}");
        s.line(format!("    let {info} = fraktal_uniforms.fraktal_target_info_{i};"));
        s.line(format!("    let {value} = {};", o.ty.widen_to_vec4(&o.name)));
        s.line(format!("    let {base} = fraktal_index * u32({info}.x);"));
        s.line(format!(
            "    {target}[{base}] = fraktal_accumulate({target}[{base}], {value}.x, {info}.y);"
        ));
        s.line(format!("    if {info}.x > 1 {{"));
        s.line(format!(
            "        {target}[{base} + 1u] = fraktal_accumulate({target}[{base} + 1u], {value}.y, {info}.y);"
        ));
        s.line("    }");
        s.line(format!("    if {info}.x > 3 {{"));
        s.line(format!(
            "        {target}[{base} + 2u] = fraktal_accumulate({target}[{base} + 2u], {value}.z, {info}.y);"
        ));
        s.line(format!(
            "        {target}[{base} + 3u] = fraktal_accumulate({target}[{base} + 3u], {value}.w, {info}.y);"
        ));
        s.line("    }");
    }
    s.line("}");
    s.line("");

    s.line(format!("@compute @workgroup_size({WORKGROUP_1D})"));
    s.line(format!("fn {ENTRY_1D}(@builtin(global_invocation_id) fraktal_gid: vec3<u32>) {{"));
    s.line("    fraktal_invoke(fraktal_gid.xy);");
    s.line("}");
    s.line("");
    s.line(format!("@compute @workgroup_size({WORKGROUP_2D}, {WORKGROUP_2D})"));
    s.line(format!("fn {ENTRY_2D}(@builtin(global_invocation_id) fraktal_gid: vec3<u32>) {{"));
    s.line("    fraktal_invoke(fraktal_gid.xy);");
    s.line("}");
    s.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_map_locates_fragment_lines() {
        let mut e = Emitter::new();
        e.push("a\nb\n", None);
        e.push("x\ny\nz", Some("model.f"));
        e.push("c\n", None);
        assert_eq!(e.map.locate(1), ("<generated>".to_owned(), 1));
        assert_eq!(e.map.locate(3), ("model.f".to_owned(), 1));
        assert_eq!(e.map.locate(5), ("model.f".to_owned(), 3));
        assert_eq!(e.map.locate(6), ("<generated>".to_owned(), 6));
    }
}
