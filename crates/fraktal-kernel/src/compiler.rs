//! Fragment compilation: directives to declarations.
//!
//! A fragment is WGSL text plus `#param` / `#out` directive lines. The
//! compiler checks every directive, records the declarations and the
//! identifiers the body references, and keeps the blanked body for the
//! linker.

use std::collections::HashSet;

use crate::error::CompileError;
use crate::scanner::{Directive, Scanner};
use crate::types::{ParamKind, ValueType};

/// Identifiers the generated wrapper defines itself.
const RESERVED: &[&str] = &["globalIdx", "main", "loadArray1D", "loadArray2D", "arraySize"];

/// A `#param` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub kind: ParamKind,
    pub line: usize,
}

/// An `#out` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    pub name: String,
    pub ty: ValueType,
    pub line: usize,
}

/// One compiled source fragment.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub origin: String,
    pub params: Vec<ParamDecl>,
    pub outputs: Vec<OutputDecl>,
    pub(crate) body: String,
    pub(crate) identifiers: HashSet<String>,
    pub(crate) main_defs: usize,
}

impl Fragment {
    /// Whether the body mentions `name` as an identifier.
    pub fn references(&self, name: &str) -> bool {
        self.identifiers.contains(name)
    }

    pub fn defines_main(&self) -> bool {
        self.main_defs > 0
    }

    /// The source text with directives blanked out.
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Compiles one fragment. `origin` names the fragment in diagnostics.
pub fn compile(source: &str, origin: &str) -> Result<Fragment, CompileError> {
    let scan = Scanner::new(source, origin).scan()?;
    if scan.main_defs.len() > 1 {
        let (line, col) = scan.main_defs[1];
        return Err(CompileError::new(origin, line, col, "`fn main` defined twice"));
    }

    let mut fragment = Fragment {
        origin: origin.to_owned(),
        params: Vec::new(),
        outputs: Vec::new(),
        body: scan.body,
        identifiers: scan.identifiers,
        main_defs: scan.main_defs.len(),
    };
    let mut declared = HashSet::new();

    for d in &scan.directives {
        let err = |msg: String| CompileError::new(origin, d.line, d.col, msg);
        match d.name.as_str() {
            "param" => {
                let (kind, name) = param_directive(d).map_err(err)?;
                check_name(name, &mut declared).map_err(err)?;
                fragment.params.push(ParamDecl { name: name.to_owned(), kind, line: d.line });
            }
            "out" => {
                let [ty, name] = d.args.as_slice() else {
                    return Err(err(format!(
                        "`#out` takes (type, name), got {} argument(s)",
                        d.args.len()
                    )));
                };
                let ty = ValueType::parse(ty)
                    .filter(|t| t.is_output())
                    .ok_or_else(|| err(format!("output type must be float, vec2, vec3 or vec4, got `{ty}`")))?;
                check_name(name, &mut declared).map_err(err)?;
                fragment.outputs.push(OutputDecl { name: name.clone(), ty, line: d.line });
            }
            other => return Err(err(format!("unknown directive `#{other}`"))),
        }
    }

    log::trace!(
        "compiled {}: {} param(s), {} output(s)",
        origin,
        fragment.params.len(),
        fragment.outputs.len()
    );
    Ok(fragment)
}

fn param_directive(d: &Directive) -> Result<(ParamKind, &str), String> {
    match d.args.as_slice() {
        [ty, name] => {
            let ty = ValueType::parse(ty).ok_or_else(|| format!("unsupported type `{ty}`"))?;
            Ok((ParamKind::Value(ty), name.as_str()))
        }
        [kind, ty, name] => Ok((ParamKind::parse(kind, ty)?, name.as_str())),
        args => Err(format!(
            "`#param` takes (type, name) or (kind, type, name), got {} argument(s)",
            args.len()
        )),
    }
}

fn check_name(name: &str, declared: &mut HashSet<String>) -> Result<(), String> {
    if !is_identifier(name) {
        return Err(format!("`{name}` is not a valid identifier"));
    }
    if RESERVED.contains(&name) || name.starts_with("fraktal_") {
        return Err(format!("`{name}` is reserved"));
    }
    if !declared.insert(name.to_owned()) {
        return Err(format!("`{name}` declared twice"));
    }
    Ok(())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && s != "_"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArrayKind;

    fn ok(src: &str) -> Fragment {
        compile(src, "frag").unwrap()
    }

    fn err(src: &str) -> CompileError {
        compile(src, "frag").unwrap_err()
    }

    #[test]
    fn value_and_array_params() {
        let f = ok("#param(float, x)\n#param(array2D, vec4, img)\n#param(value, ivec2, n)\nfn main() {}");
        assert_eq!(f.params.len(), 3);
        assert_eq!(f.params[0].kind, ParamKind::Value(ValueType::Float));
        assert_eq!(f.params[1].kind, ParamKind::Array { kind: ArrayKind::Array2D, channels: 4 });
        assert_eq!(f.params[2].kind, ParamKind::Value(ValueType::IVec2));
        assert!(f.defines_main());
    }

    #[test]
    fn outputs_in_declaration_order() {
        let f = ok("#out(vec3, normal)\n#out(float, depth)\n");
        let names: Vec<_> = f.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["normal", "depth"]);
        assert!(!f.defines_main());
    }

    #[test]
    fn unknown_directive_reports_origin_and_position() {
        let e = err("fn main() {}\n  #uniform(float, x)\n");
        assert_eq!(e.to_string(), "frag:2:3: unknown directive `#uniform`");
    }

    #[test]
    fn malformed_declarations() {
        assert!(err("#param(x)").message.contains("argument"));
        assert!(err("#param(double, x)").message.contains("unsupported type"));
        assert!(err("#out(mat4, m)").message.contains("output type"));
        assert!(err("#out(int, i)").message.contains("output type"));
        assert!(err("#param(float, 2x)").message.contains("identifier"));
    }

    #[test]
    fn reserved_and_duplicate_names() {
        assert!(err("#param(float, globalIdx)").message.contains("reserved"));
        assert!(err("#param(float, fraktal_grid)").message.contains("reserved"));
        assert!(err("#param(float, a)\n#out(float, a)").message.contains("twice"));
    }

    #[test]
    fn two_mains_in_one_fragment() {
        let e = err("fn main() {}\nfn main() {}");
        assert_eq!(e.line, 2);
    }

    #[test]
    fn records_references() {
        let f = ok("#param(float, used)\n#param(float, unused)\nfn main() { let a = used; }");
        assert!(f.references("used"));
        assert!(!f.references("unused"));
    }
}
