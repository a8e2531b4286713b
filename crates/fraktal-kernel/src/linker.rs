use std::collections::HashMap;
use std::error::Error as _;
use std::path::Path;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::codegen::{self, SourceMap};
use crate::compiler::{self, Fragment, OutputDecl, ParamDecl};
use crate::error::{CompileError, LinkError};
use crate::program::{MAX_STORAGE_BINDINGS, ParamBinding, ParamSlot, Program, UniformLayout};
use crate::types::ParamKind;

// ── LinkState ─────────────────────────────────────────────────────────────

/// Collects compiled fragments until they are linked.
///
/// Fragment text is copied on add. A fragment that fails to compile marks
/// the state as failed; the next [`LinkState::link`] then fails and clears
/// the mark.
#[derive(Debug, Default)]
pub struct LinkState {
    fragments: Vec<Fragment>,
    failed: bool,
    added: usize,
}

impl LinkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `source` and queues it. `name` is used in diagnostics;
    /// unnamed fragments are reported as `<fragment N>`.
    pub fn add_source(&mut self, source: &str, name: Option<&str>) -> Result<(), CompileError> {
        self.added += 1;
        let origin = match name {
            Some(name) => name.to_owned(),
            None => format!("<fragment {}>", self.added),
        };
        match compiler::compile(source, &origin) {
            Ok(fragment) => {
                self.fragments.push(fragment);
                Ok(())
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Reads and queues a fragment file; its path is the origin.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), CompileError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(source) => self.add_source(&source, Some(&origin)),
            Err(e) => {
                self.added += 1;
                self.failed = true;
                Err(CompileError::new(&origin, 1, 1, format!("cannot read file: {e}")))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Links the queued fragments, consuming them. The state itself stays
    /// usable for another round of adds.
    pub fn link(&mut self) -> Result<Program, LinkError> {
        let fragments = std::mem::take(&mut self.fragments);
        if std::mem::take(&mut self.failed) {
            return Err(LinkError::FragmentFailed);
        }
        link(&fragments)
    }
}

// ── link ──────────────────────────────────────────────────────────────────

/// Links fragments, in order, into one validated program.
pub fn link(fragments: &[Fragment]) -> Result<Program, LinkError> {
    if fragments.is_empty() {
        return Err(LinkError::Empty);
    }
    check_names(fragments)?;
    check_main(fragments)?;

    let used = |name: &str| fragments.iter().any(|f| f.references(name));
    let declared: Vec<&ParamDecl> = fragments.iter().flat_map(|f| &f.params).collect();
    let params: Vec<&ParamDecl> = declared.iter().copied().filter(|p| used(&p.name)).collect();
    for p in declared.iter().filter(|p| !used(&p.name)) {
        log::debug!("parameter `{}` is never referenced and gets no offset", p.name);
    }
    let outputs: Vec<OutputDecl> = fragments.iter().flat_map(|f| f.outputs.iter().cloned()).collect();

    let array_count = params.iter().filter(|p| matches!(p.kind, ParamKind::Array { .. })).count();
    let storage = outputs.len() + array_count;
    if storage > MAX_STORAGE_BINDINGS {
        return Err(LinkError::TooManyBindings { count: storage, max: MAX_STORAGE_BINDINGS });
    }

    // Member order: grid, target infos, array infos, value params.
    let mut layout = UniformLayout::default();
    layout.push(16, 16);
    let target_info_offsets: Vec<u32> = outputs.iter().map(|_| layout.push(16, 16)).collect();
    let array_info_offsets: Vec<u32> = (0..array_count).map(|_| layout.push(16, 16)).collect();

    let mut next_slot = 0u32;
    let slots: Vec<ParamSlot> = params
        .iter()
        .map(|p| {
            let binding = match p.kind {
                ParamKind::Array { kind, channels } => {
                    let slot = next_slot;
                    next_slot += 1;
                    ParamBinding::Array {
                        kind,
                        channels,
                        slot,
                        info_offset: array_info_offsets[slot as usize],
                    }
                }
                ParamKind::Value(ty) => ParamBinding::Value { ty, offset: layout.push(ty.size(), ty.align()) },
            };
            ParamSlot { name: p.name.clone(), binding }
        })
        .collect();

    let (source, map) = codegen::generate(fragments, &slots, &outputs);
    validate(&source, &map)?;

    log::debug!(
        "linked {} fragment(s): {} param(s), {} output(s), {} array(s)",
        fragments.len(),
        slots.len(),
        outputs.len(),
        array_count
    );
    Ok(Program {
        source,
        params: slots,
        outputs,
        array_count,
        target_info_offsets,
        uniform_size: layout.finish(),
    })
}

fn check_names(fragments: &[Fragment]) -> Result<(), LinkError> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for f in fragments {
        let names = f
            .params
            .iter()
            .map(|p| p.name.as_str())
            .chain(f.outputs.iter().map(|o| o.name.as_str()));
        for name in names {
            if let Some(first) = owners.insert(name, &f.origin) {
                return Err(LinkError::DuplicateName {
                    name: name.to_owned(),
                    first: first.to_owned(),
                    second: f.origin.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_main(fragments: &[Fragment]) -> Result<(), LinkError> {
    let mains: Vec<&Fragment> = fragments.iter().filter(|f| f.defines_main()).collect();
    match mains.as_slice() {
        [] => Err(LinkError::MissingMain),
        [_] => Ok(()),
        [a, b, ..] => Err(LinkError::DuplicateMain { first: a.origin.clone(), second: b.origin.clone() }),
    }
}

// ── Validation ────────────────────────────────────────────────────────────

fn validate(source: &str, map: &SourceMap) -> Result<(), LinkError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        let location = e.location(source).map(|l| (l.line_number, l.line_position));
        backend_error(map, location, e.message().to_owned())
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| {
            let location = e.location(source).map(|l| (l.line_number, l.line_position));
            let mut message = e.as_inner().to_string();
            let mut source_err = e.as_inner().source();
            while let Some(inner) = source_err {
                message.push_str(": ");
                message.push_str(&inner.to_string());
                source_err = inner.source();
            }
            backend_error(map, location, message)
        })?;
    Ok(())
}

fn backend_error(map: &SourceMap, location: Option<(u32, u32)>, message: String) -> LinkError {
    let (line, col) = location.map_or((0, 0), |(l, c)| (l as usize, c as usize));
    let (origin, line) = if line == 0 { ("<generated>".to_owned(), 0) } else { map.locate(line) };
    log::error!("{origin}:{line}:{col}: {message}");
    LinkError::Backend { origin, line, col, message }
}
