//! Compiler and linker for the **fraktal kernel language**.
//!
//! A kernel fragment is WGSL text with `#param` / `#out` directive lines and,
//! in exactly one fragment of a link, a `fn main()` that runs once per grid
//! cell. The linker wraps the fragments in a generated compute module and
//! validates it with naga, so nothing here needs a GPU.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`compiler`] | `compile`, `Fragment`, `ParamDecl`, `OutputDecl` |
//! | [`error`] | `CompileError`, `LinkError` |
//! | [`linker`] | `LinkState`, `link` |
//! | [`program`] | `Program`, parameter table, binding constants |
//! | [`scanner`] | directive and identifier scanning |
//! | [`types`] | `ValueType`, `ParamKind`, `ArrayKind` |
//!
//! # Language
//!
//! ```text
//! #param(float, gain)                 // value parameter
//! #param(array2D, vec4, image)        // array parameter, sampled with loadArray2D
//! #out(vec4, color)                   // one output target per #out, in order
//!
//! fn main() {
//!     color = loadArray2D(image, globalIdx) * gain;
//! }
//! ```
//!
//! Outputs are **added** into their targets; `globalIdx` is the cell being
//! computed (`.y == 0` on a 1D grid).
//!
//! # Quick start
//!
//! ```rust
//! use fraktal_kernel::LinkState;
//!
//! let mut link = LinkState::new();
//! link.add_source("#param(float, c)\n#out(float, y)\nfn main() { y = c; }", Some("const.f"))
//!     .unwrap();
//! let program = link.link().unwrap();
//! assert_eq!(program.param_offset("c"), 0);
//! assert_eq!(program.param_offset("nope"), -1);
//! ```

mod codegen;
pub mod compiler;
pub mod error;
pub mod linker;
pub mod program;
pub mod scanner;
pub mod types;

pub use compiler::{Fragment, OutputDecl, ParamDecl, compile};
pub use error::{CompileError, LinkError};
pub use linker::{LinkState, link};
pub use program::{ParamBinding, ParamSlot, Program};
pub use types::{ArrayKind, ParamKind, ValueType};

#[cfg(test)]
mod link_tests {
    use super::*;

    fn ok(sources: &[&str]) -> Program {
        let mut link = LinkState::new();
        for src in sources {
            link.add_source(src, None).unwrap();
        }
        link.link().unwrap_or_else(|e| panic!("{e}"))
    }

    fn err(sources: &[&str]) -> LinkError {
        let mut link = LinkState::new();
        for src in sources {
            link.add_source(src, None).unwrap();
        }
        link.link().unwrap_err()
    }

    #[test] fn index_kernel_1d() {
        ok(&["#out(float, y)\nfn main() { y = f32(globalIdx.x); }"]);
    }
    #[test] fn index_kernel_2d() {
        ok(&["#out(vec2, uv)\nfn main() { uv = vec2<f32>(globalIdx); }"]);
    }
    #[test] fn every_value_type() {
        ok(&["#param(float, a)\n#param(vec2, b)\n#param(vec3, c)\n#param(vec4, d)\n\
              #param(int, e)\n#param(ivec2, f)\n#param(ivec3, g)\n#param(ivec4, h)\n#param(mat4, m)\n\
              #out(vec4, y)\n\
              fn main() {\n\
                  let s = a + b.x + c.y + d.z + f32(e + f.x + g.y + h.z);\n\
                  y = m * vec4<f32>(s);\n\
              }"]);
    }
    #[test] fn vec3_output() {
        ok(&["#out(vec3, n)\nfn main() { n = normalize(vec3<f32>(1.0, 2.0, 3.0)); }"]);
    }
    #[test] fn helper_functions_and_comments() {
        ok(&["// header\n#out(float, y) // trailing\n/* block\n   comment */\n\
              fn twice(x: f32) -> f32 { return 2.0 * x; }\n\
              fn main() { y = twice(1.5); }"]);
    }
    #[test] fn array_size_query() {
        ok(&["#param(array2D, float, img)\n#out(float, y)\n\
              fn main() { let s = arraySize(img); y = f32(s.x * s.y); }"]);
    }
    #[test] fn model_and_render_fragments() {
        ok(&[
            "#param(vec3, center)\nfn model(p: vec3<f32>) -> f32 { return length(p - center) - 1.0; }",
            "#param(mat4, view)\n#out(vec4, color)\n\
             fn main() {\n    let ro = (view * vec4<f32>(0.0, 0.0, 0.0, 1.0)).xyz;\n    color = vec4<f32>(model(ro));\n}",
        ]);
    }
    #[test] fn type_error_is_rejected() {
        assert!(matches!(err(&["#out(float, y)\nfn main() { y = vec2<f32>(1.0); }"]), LinkError::Backend { .. }));
    }
    #[test] fn writing_a_param_is_allowed() {
        // Params are private mirrors, so a kernel may use them as scratch.
        ok(&["#param(float, k)\n#out(float, y)\nfn main() { k = k * 2.0; y = k; }"]);
    }
}
