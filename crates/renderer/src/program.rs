//! Links a vertex and a fragment stage into a [`Pipeline`].
//!
//! Linking checks the interface between the two stages (stage tags, varyings,
//! shared uniform blocks) and reflects every name the rest of the renderer
//! needs into small lookup tables. Those tables are built once here and live
//! as long as the pipeline.

use std::collections::BTreeMap;

use wgpu::naga;
use wgpu::naga::{AddressSpace, Binding, ScalarKind, TypeInner};

use crate::shader::{CompiledShader, ShaderStage};

/// Result of resolving a name against a linked pipeline.
///
/// `NotFound` is a regular value: unused or optimised-out variables are legal
/// and callers skip them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Found(u32),
    NotFound,
}

impl Location {
    pub fn index(self) -> Option<u32> {
        match self {
            Location::Found(index) => Some(index),
            Location::NotFound => None,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, Location::Found(_))
    }
}

/// Raised when two stages cannot be combined.
#[derive(Debug, Clone, thiserror::Error)]
#[error("pipeline failed to link:\n{log}")]
pub struct LinkError {
    pub log: String,
}

/// Numeric class of a shader input component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericClass {
    Float,
    Sint,
    Uint,
    Other,
}

impl NumericClass {
    fn from_scalar(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Float => NumericClass::Float,
            ScalarKind::Sint => NumericClass::Sint,
            ScalarKind::Uint => NumericClass::Uint,
            _ => NumericClass::Other,
        }
    }
}

/// Per-vertex input declared by the vertex stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub name: String,
    pub location: u32,
    pub components: u32,
    pub class: NumericClass,
}

/// Value passed from the vertex stage to the fragment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varying {
    pub name: Option<String>,
    pub location: u32,
}

/// Shader-side type of a uniform member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Uint,
    Mat4,
    Unsupported,
}

impl UniformKind {
    /// Bytes occupied by one value of this kind.
    pub fn size(self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::Uint => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
            UniformKind::Unsupported => 0,
        }
    }

    fn from_type(inner: &TypeInner) -> Self {
        match *inner {
            TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
                ScalarKind::Float => UniformKind::Float,
                ScalarKind::Sint => UniformKind::Int,
                ScalarKind::Uint => UniformKind::Uint,
                _ => UniformKind::Unsupported,
            },
            TypeInner::Vector { size, scalar }
                if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
            {
                match size {
                    naga::VectorSize::Bi => UniformKind::Vec2,
                    naga::VectorSize::Tri => UniformKind::Vec3,
                    naga::VectorSize::Quad => UniformKind::Vec4,
                }
            }
            TypeInner::Matrix {
                columns: naga::VectorSize::Quad,
                rows: naga::VectorSize::Quad,
                scalar,
            } if scalar.kind == ScalarKind::Float && scalar.width == 4 => UniformKind::Mat4,
            _ => UniformKind::Unsupported,
        }
    }
}

/// Which stages reference a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Visibility {
    pub vertex: bool,
    pub fragment: bool,
}

impl Visibility {
    fn mark(&mut self, stage: ShaderStage) {
        match stage {
            ShaderStage::Vertex => self.vertex = true,
            ShaderStage::Fragment => self.fragment = true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub kind: UniformKind,
    pub offset: u32,
}

/// A uniform buffer binding and the layout of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub members: Vec<UniformMember>,
    pub visibility: Visibility,
}

/// Resolved uniform: the member plus the block it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation<'a> {
    pub block: &'a UniformBlock,
    pub member: &'a UniformMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Texture,
    Sampler,
}

/// Texture or sampler binding declared by either stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
    pub visibility: Visibility,
}

/// A linked vertex + fragment program with its reflection tables.
#[derive(Debug, Clone)]
pub struct Pipeline {
    vertex: CompiledShader,
    fragment: CompiledShader,
    inputs: Vec<VertexInput>,
    varyings: Vec<Varying>,
    uniform_blocks: Vec<UniformBlock>,
    resources: Vec<ResourceSlot>,
}

impl Pipeline {
    pub fn vertex(&self) -> &CompiledShader {
        &self.vertex
    }

    pub fn fragment(&self) -> &CompiledShader {
        &self.fragment
    }

    /// Location of the vertex input called `name`.
    pub fn attribute_location(&self, name: &str) -> Location {
        self.vertex_input(name)
            .map_or(Location::NotFound, |input| Location::Found(input.location))
    }

    pub fn vertex_input(&self, name: &str) -> Option<&VertexInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn vertex_inputs(&self) -> &[VertexInput] {
        &self.inputs
    }

    pub fn varyings(&self) -> &[Varying] {
        &self.varyings
    }

    /// Looks up a uniform by member name across every uniform block.
    pub fn uniform(&self, name: &str) -> Option<UniformLocation<'_>> {
        self.uniform_blocks.iter().find_map(|block| {
            block
                .members
                .iter()
                .find(|member| member.name == name)
                .map(|member| UniformLocation { block, member })
        })
    }

    pub fn uniform_blocks(&self) -> &[UniformBlock] {
        &self.uniform_blocks
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSlot> {
        self.resources.iter().find(|slot| slot.name == name)
    }

    pub fn resources(&self) -> &[ResourceSlot] {
        &self.resources
    }

    /// Texture bindings only, in declaration order.
    pub fn texture_slots(&self) -> impl Iterator<Item = &ResourceSlot> {
        self.resources
            .iter()
            .filter(|slot| slot.kind == ResourceKind::Texture)
    }

    /// Highest bind group index used by any uniform block or resource.
    pub fn bind_group_count(&self) -> u32 {
        let blocks = self.uniform_blocks.iter().map(|block| block.group + 1);
        let resources = self.resources.iter().map(|slot| slot.group + 1);
        blocks.chain(resources).max().unwrap_or(0)
    }
}

/// Links `vertex` and `fragment` into a pipeline.
///
/// The compiled stages are cloned into the pipeline; callers may drop their
/// copies afterwards.
pub fn link(vertex: &CompiledShader, fragment: &CompiledShader) -> Result<Pipeline, LinkError> {
    let mut problems = Vec::new();

    if vertex.stage() != ShaderStage::Vertex {
        problems.push(format!(
            "stage mismatch: vertex slot holds a {} shader",
            vertex.stage()
        ));
    }
    if fragment.stage() != ShaderStage::Fragment {
        problems.push(format!(
            "stage mismatch: fragment slot holds a {} shader",
            fragment.stage()
        ));
    }
    if !problems.is_empty() {
        return Err(report(problems));
    }

    let inputs = reflect_vertex_inputs(vertex);
    let outputs = reflect_vertex_outputs(vertex);
    let varyings = match_varyings(&outputs, fragment, &mut problems);

    let mut blocks = BTreeMap::new();
    let mut resources = BTreeMap::new();
    for shader in [vertex, fragment] {
        reflect_globals(shader, &mut blocks, &mut resources, &mut problems);
    }

    if !problems.is_empty() {
        return Err(report(problems));
    }

    let pipeline = Pipeline {
        vertex: vertex.clone(),
        fragment: fragment.clone(),
        inputs,
        varyings,
        uniform_blocks: blocks.into_values().collect(),
        resources: resources.into_values().collect(),
    };
    tracing::debug!(
        attributes = pipeline.inputs.len(),
        varyings = pipeline.varyings.len(),
        uniform_blocks = pipeline.uniform_blocks.len(),
        resources = pipeline.resources.len(),
        "linked pipeline"
    );
    Ok(pipeline)
}

fn report(problems: Vec<String>) -> LinkError {
    let log = problems.join("\n");
    tracing::error!("pipeline link failed:\n{log}");
    LinkError { log }
}

/// A value crossing a stage boundary at a location.
struct StageValue<'a> {
    name: Option<&'a str>,
    location: u32,
    ty: &'a TypeInner,
}

fn location_of(binding: Option<&Binding>) -> Option<u32> {
    match binding {
        Some(Binding::Location { location, .. }) => Some(*location),
        _ => None,
    }
}

fn reflect_vertex_inputs(vertex: &CompiledShader) -> Vec<VertexInput> {
    let module = vertex.module();
    vertex
        .entry_point()
        .function
        .arguments
        .iter()
        .filter_map(|argument| {
            let location = location_of(argument.binding.as_ref())?;
            let (components, class) = match module.types[argument.ty].inner {
                TypeInner::Scalar(scalar) => (1, NumericClass::from_scalar(scalar.kind)),
                TypeInner::Vector { size, scalar } => {
                    (size as u32, NumericClass::from_scalar(scalar.kind))
                }
                _ => (0, NumericClass::Other),
            };
            Some(VertexInput {
                name: argument.name.clone().unwrap_or_default(),
                location,
                components,
                class,
            })
        })
        .collect()
}

fn reflect_vertex_outputs(vertex: &CompiledShader) -> Vec<StageValue<'_>> {
    let module = vertex.module();
    let Some(result) = vertex.entry_point().function.result.as_ref() else {
        return Vec::new();
    };

    if let Some(location) = location_of(result.binding.as_ref()) {
        return vec![StageValue {
            name: None,
            location,
            ty: &module.types[result.ty].inner,
        }];
    }

    match &module.types[result.ty].inner {
        TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|member| {
                Some(StageValue {
                    name: member.name.as_deref(),
                    location: location_of(member.binding.as_ref())?,
                    ty: &module.types[member.ty].inner,
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn match_varyings(
    outputs: &[StageValue<'_>],
    fragment: &CompiledShader,
    problems: &mut Vec<String>,
) -> Vec<Varying> {
    let module = fragment.module();
    let mut varyings = Vec::new();
    for argument in &fragment.entry_point().function.arguments {
        let Some(location) = location_of(argument.binding.as_ref()) else {
            continue;
        };
        let name = argument.name.as_deref();
        let display = name.unwrap_or("<unnamed>");
        let Some(output) = outputs.iter().find(|output| output.location == location) else {
            problems.push(format!(
                "unresolved varying `{display}`: fragment stage reads location {location} \
                 but the vertex stage does not write it"
            ));
            continue;
        };
        if *output.ty != module.types[argument.ty].inner {
            problems.push(format!(
                "varying `{display}` at location {location} has a different type in each stage"
            ));
            continue;
        }
        if let (Some(written), Some(read)) = (output.name, name) {
            if written != read {
                tracing::warn!(
                    location,
                    vertex = written,
                    fragment = read,
                    "varying names differ across stages; matching by location"
                );
            }
        }
        varyings.push(Varying {
            name: name.map(str::to_owned),
            location,
        });
    }
    varyings
}

fn reflect_globals(
    shader: &CompiledShader,
    blocks: &mut BTreeMap<(u32, u32), UniformBlock>,
    resources: &mut BTreeMap<(u32, u32), ResourceSlot>,
    problems: &mut Vec<String>,
) {
    let module = shader.module();
    let stage = shader.stage();
    for (_, global) in module.global_variables.iter() {
        let Some(binding) = global.binding.as_ref() else {
            continue;
        };
        let key = (binding.group, binding.binding);
        let inner = &module.types[global.ty].inner;
        match global.space {
            AddressSpace::Uniform => {
                let mut block = uniform_block(module, global, inner, key);
                match blocks.get_mut(&key) {
                    Some(existing) if existing.members != block.members => problems.push(format!(
                        "uniform block at group {} binding {} is declared differently in each stage",
                        key.0, key.1
                    )),
                    Some(existing) => existing.visibility.mark(stage),
                    None => {
                        block.visibility.mark(stage);
                        blocks.insert(key, block);
                    }
                }
            }
            AddressSpace::Handle => {
                let kind = match inner {
                    TypeInner::Image { .. } => ResourceKind::Texture,
                    TypeInner::Sampler { .. } => ResourceKind::Sampler,
                    _ => continue,
                };
                let slot = resources.entry(key).or_insert_with(|| ResourceSlot {
                    name: global.name.clone().unwrap_or_default(),
                    group: key.0,
                    binding: key.1,
                    kind,
                    visibility: Visibility::default(),
                });
                if slot.kind != kind {
                    problems.push(format!(
                        "resource at group {} binding {} is a {:?} in one stage and a {:?} in the other",
                        key.0, key.1, slot.kind, kind
                    ));
                }
                slot.visibility.mark(stage);
            }
            _ => {}
        }
    }
}

fn uniform_block(
    module: &naga::Module,
    global: &naga::GlobalVariable,
    inner: &TypeInner,
    (group, binding): (u32, u32),
) -> UniformBlock {
    let (members, size) = match inner {
        TypeInner::Struct { members, span } => (
            members
                .iter()
                .map(|member| UniformMember {
                    name: member.name.clone().unwrap_or_default(),
                    kind: UniformKind::from_type(&module.types[member.ty].inner),
                    offset: member.offset,
                })
                .collect(),
            *span,
        ),
        other => {
            let kind = UniformKind::from_type(other);
            (
                vec![UniformMember {
                    name: global.name.clone().unwrap_or_default(),
                    kind,
                    offset: 0,
                }],
                kind.size() as u32,
            )
        }
    };
    UniformBlock {
        group,
        binding,
        size,
        members,
        visibility: Visibility::default(),
    }
}
