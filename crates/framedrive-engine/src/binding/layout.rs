use crate::device::GpuContext;
use crate::resource::{ConstantBufferView, ResourceArena, SignatureId, TableId, TextureId};

use super::signature::{
    BindSignatureDesc, RangeKind, SamplerFilter, SerializedSignature, SignatureError,
    StaticSampler,
};

/// Recordable reference to a bind signature in the arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SignatureHandle {
    pub id: SignatureId,
    pub table_count: u32,
}

/// Descriptor table created against one slot of a signature.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DescriptorTable {
    pub id: TableId,
    pub signature: SignatureId,
    pub slot: u32,
}

/// Resource placed into a descriptor table, in declared range order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TableResource {
    Texture(TextureId),
    ConstantBuffer(ConstantBufferView),
}

impl TableResource {
    pub fn kind(&self) -> RangeKind {
        match self {
            TableResource::Texture(_) => RangeKind::ShaderResource,
            TableResource::ConstantBuffer(_) => RangeKind::ConstantBuffer,
        }
    }
}

/// GPU-side bind signature: one bind group layout per table plus baked samplers.
pub struct BindSignature {
    desc: BindSignatureDesc,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    samplers: Vec<wgpu::Sampler>,
}

impl BindSignature {
    /// Decodes a serialized signature and creates its layout objects.
    pub fn create(ctx: &GpuContext, blob: &SerializedSignature) -> Result<Self, SignatureError> {
        let desc = blob.decode()?;

        let (group_layouts, pipeline_layout, samplers) = ctx
            .capture_validation(|device| {
                let group_layouts: Vec<wgpu::BindGroupLayout> = (0..desc.table_count())
                    .map(|slot| {
                        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                            label: Some("framedrive table layout"),
                            entries: &layout_entries(&desc, slot),
                        })
                    })
                    .collect();

                let layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();
                let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("framedrive pipeline layout"),
                    bind_group_layouts: &layout_refs,
                    immediate_size: 0,
                });

                let samplers: Vec<wgpu::Sampler> = desc
                    .samplers
                    .iter()
                    .map(|s| device.create_sampler(&sampler_descriptor(s)))
                    .collect();

                (group_layouts, pipeline_layout, samplers)
            })
            .map_err(SignatureError::Device)?;

        log::debug!(
            "bind signature created: {} tables, {} static samplers, {} byte blob",
            desc.table_count(),
            desc.samplers.len(),
            blob.as_bytes().len()
        );

        Ok(Self {
            desc,
            group_layouts,
            pipeline_layout,
            samplers,
        })
    }

    pub fn desc(&self) -> &BindSignatureDesc {
        &self.desc
    }

    pub fn pipeline_layout(&self) -> &wgpu::PipelineLayout {
        &self.pipeline_layout
    }
}

/// Serializes `desc`, creates the signature and stores it in the arena.
pub fn build_signature(
    ctx: &GpuContext,
    arena: &mut ResourceArena,
    desc: &BindSignatureDesc,
) -> Result<SignatureHandle, SignatureError> {
    let blob = desc.serialize()?;
    let signature = BindSignature::create(ctx, &blob)?;
    let table_count = signature.desc().table_count();
    let id = arena.insert_signature(signature);
    Ok(SignatureHandle { id, table_count })
}

/// Creates the bind group for `slot` of `signature` from `resources`.
pub fn create_table(
    ctx: &GpuContext,
    arena: &mut ResourceArena,
    signature: SignatureHandle,
    slot: u32,
    resources: &[TableResource],
) -> Result<DescriptorTable, SignatureError> {
    let group = {
        let sig = arena
            .signature(signature.id)
            .ok_or(SignatureError::MissingResource("signature"))?;
        let table = sig
            .desc
            .tables
            .get(slot as usize)
            .ok_or(SignatureError::UnknownSlot { slot })?;

        let kinds: Vec<RangeKind> = resources.iter().map(TableResource::kind).collect();
        check_table_resources(slot, &table.descriptor_kinds(), &kinds)?;

        let mut entries = Vec::new();
        let mut next = resources.iter();
        for range in &table.ranges {
            for i in 0..range.count {
                let Some(res) = next.next() else {
                    return Err(SignatureError::MissingResource("table resource"));
                };
                let resource = match res {
                    TableResource::Texture(id) => wgpu::BindingResource::TextureView(
                        arena
                            .texture_view(*id)
                            .ok_or(SignatureError::MissingResource("texture"))?,
                    ),
                    TableResource::ConstantBuffer(view) => arena
                        .buffer(view.buffer)
                        .ok_or(SignatureError::MissingResource("constant buffer"))?
                        .as_entire_binding(),
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: range.binding + i,
                    resource,
                });
            }
        }

        for (s, sampler) in sig.desc.samplers.iter().enumerate() {
            if sampler.table == slot {
                entries.push(wgpu::BindGroupEntry {
                    binding: sampler.binding,
                    resource: wgpu::BindingResource::Sampler(&sig.samplers[s]),
                });
            }
        }

        ctx.capture_validation(|device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("framedrive descriptor table"),
                layout: &sig.group_layouts[slot as usize],
                entries: &entries,
            })
        })
        .map_err(SignatureError::Device)?
    };

    let id = arena.insert_table(group);
    log::debug!("descriptor table {id:?} created for slot {slot}");
    Ok(DescriptorTable {
        id,
        signature: signature.id,
        slot,
    })
}

/// Resources must match the slot's ranges one to one, in order.
pub fn check_table_resources(
    slot: u32,
    expected: &[RangeKind],
    actual: &[RangeKind],
) -> Result<(), SignatureError> {
    if expected != actual {
        return Err(SignatureError::ResourceMismatch {
            slot,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

/// Bind group layout entries for table `slot`, static samplers included.
pub fn layout_entries(desc: &BindSignatureDesc, slot: u32) -> Vec<wgpu::BindGroupLayoutEntry> {
    let Some(table) = desc.tables.get(slot as usize) else {
        return Vec::new();
    };
    let visibility = table.visibility.stages();

    let mut entries = Vec::new();
    for range in &table.ranges {
        let ty = match range.kind {
            RangeKind::ShaderResource => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            RangeKind::ConstantBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        };
        for i in 0..range.count {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: range.binding + i,
                visibility,
                ty,
                count: None,
            });
        }
    }

    for sampler in desc.samplers.iter().filter(|s| s.table == slot) {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: sampler.binding,
            visibility: sampler.visibility.stages(),
            ty: wgpu::BindingType::Sampler(sampler_binding_type(sampler)),
            count: None,
        });
    }

    entries
}

pub(crate) fn sampler_binding_type(sampler: &StaticSampler) -> wgpu::SamplerBindingType {
    if sampler.compare.is_some() {
        wgpu::SamplerBindingType::Comparison
    } else if sampler.filter == SamplerFilter::Linear {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    }
}

fn sampler_descriptor(s: &StaticSampler) -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("framedrive static sampler"),
        address_mode_u: s.address_u.into(),
        address_mode_v: s.address_v.into(),
        address_mode_w: s.address_w.into(),
        mag_filter: s.filter.into(),
        min_filter: s.filter.into(),
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        compare: s.compare.map(Into::into),
        ..Default::default()
    }
}
