//! Bind signature description and its serialized form.

use bitcode::{Decode, Encode};

/// Shader stages that can see a table or sampler.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub enum ShaderVisibility {
    Vertex,
    Pixel,
    All,
}

impl ShaderVisibility {
    pub fn stages(self) -> wgpu::ShaderStages {
        match self {
            ShaderVisibility::Vertex => wgpu::ShaderStages::VERTEX,
            ShaderVisibility::Pixel => wgpu::ShaderStages::FRAGMENT,
            ShaderVisibility::All => wgpu::ShaderStages::VERTEX_FRAGMENT,
        }
    }

    fn covers(self, other: ShaderVisibility) -> bool {
        self == ShaderVisibility::All || self == other
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub enum RangeKind {
    /// Sampled texture, read-only.
    ShaderResource,
    /// Uniform (constant) buffer.
    ConstantBuffer,
}

/// `count` consecutive bindings of one kind starting at `binding`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub struct DescriptorRange {
    pub kind: RangeKind,
    pub count: u32,
    pub binding: u32,
}

#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct TableDesc {
    pub ranges: Vec<DescriptorRange>,
    pub visibility: ShaderVisibility,
}

impl TableDesc {
    /// Range kinds in binding order, one entry per descriptor.
    pub fn descriptor_kinds(&self) -> Vec<RangeKind> {
        self.ranges
            .iter()
            .flat_map(|r| std::iter::repeat_n(r.kind, r.count as usize))
            .collect()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub enum SamplerAddress {
    Clamp,
    Wrap,
    Mirror,
    Border,
}

impl From<SamplerAddress> for wgpu::AddressMode {
    fn from(a: SamplerAddress) -> Self {
        match a {
            SamplerAddress::Clamp => wgpu::AddressMode::ClampToEdge,
            SamplerAddress::Wrap => wgpu::AddressMode::Repeat,
            SamplerAddress::Mirror => wgpu::AddressMode::MirrorRepeat,
            SamplerAddress::Border => wgpu::AddressMode::ClampToBorder,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub enum SamplerFilter {
    Point,
    Linear,
}

impl From<SamplerFilter> for wgpu::FilterMode {
    fn from(f: SamplerFilter) -> Self {
        match f {
            SamplerFilter::Point => wgpu::FilterMode::Nearest,
            SamplerFilter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Depth comparison for comparison samplers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub enum SamplerCompare {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl From<SamplerCompare> for wgpu::CompareFunction {
    fn from(c: SamplerCompare) -> Self {
        match c {
            SamplerCompare::Never => wgpu::CompareFunction::Never,
            SamplerCompare::Less => wgpu::CompareFunction::Less,
            SamplerCompare::Equal => wgpu::CompareFunction::Equal,
            SamplerCompare::LessEqual => wgpu::CompareFunction::LessEqual,
            SamplerCompare::Greater => wgpu::CompareFunction::Greater,
            SamplerCompare::NotEqual => wgpu::CompareFunction::NotEqual,
            SamplerCompare::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            SamplerCompare::Always => wgpu::CompareFunction::Always,
        }
    }
}

/// Sampler fixed at signature creation and baked into `table`'s bind group.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Encode, Decode)]
pub struct StaticSampler {
    pub table: u32,
    pub binding: u32,
    pub visibility: ShaderVisibility,
    pub address_u: SamplerAddress,
    pub address_v: SamplerAddress,
    pub address_w: SamplerAddress,
    pub filter: SamplerFilter,
    pub compare: Option<SamplerCompare>,
}

/// Declared layout of every shader-visible resource a pipeline expects.
///
/// Table `i` maps to bind group `i`; tables are bound in index order.
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct BindSignatureDesc {
    pub tables: Vec<TableDesc>,
    pub samplers: Vec<StaticSampler>,
}

/// Slot of the texture table in [`BindSignatureDesc::textured_quad`].
pub const TEXTURE_SLOT: u32 = 0;
/// Slot of the transform table in [`BindSignatureDesc::textured_quad`].
pub const TRANSFORM_SLOT: u32 = 1;

impl BindSignatureDesc {
    /// One texture for the pixel stage, one constant buffer for the vertex stage,
    /// and a wrapping nearest-neighbor sampler next to the texture.
    pub fn textured_quad() -> Self {
        Self {
            tables: vec![
                TableDesc {
                    ranges: vec![DescriptorRange {
                        kind: RangeKind::ShaderResource,
                        count: 1,
                        binding: 0,
                    }],
                    visibility: ShaderVisibility::Pixel,
                },
                TableDesc {
                    ranges: vec![DescriptorRange {
                        kind: RangeKind::ConstantBuffer,
                        count: 1,
                        binding: 0,
                    }],
                    visibility: ShaderVisibility::Vertex,
                },
            ],
            samplers: vec![StaticSampler {
                table: TEXTURE_SLOT,
                binding: 1,
                visibility: ShaderVisibility::Pixel,
                address_u: SamplerAddress::Wrap,
                address_v: SamplerAddress::Wrap,
                address_w: SamplerAddress::Wrap,
                filter: SamplerFilter::Point,
                compare: None,
            }],
        }
    }

    pub fn table_count(&self) -> u32 {
        self.tables.len() as u32
    }

    /// Checks the description for structural errors.
    pub fn validate(&self) -> Result<(), SignatureError> {
        if self.tables.is_empty() {
            return Err(SignatureError::NoTables);
        }

        for (t, table) in self.tables.iter().enumerate() {
            let t = t as u32;
            if table.ranges.is_empty() {
                return Err(SignatureError::EmptyTable { table: t });
            }

            let mut used: Vec<u32> = Vec::new();
            for (r, range) in table.ranges.iter().enumerate() {
                if range.count == 0 {
                    return Err(SignatureError::EmptyRange {
                        table: t,
                        range: r as u32,
                    });
                }
                let Some(end) = range.binding.checked_add(range.count) else {
                    return Err(SignatureError::RangeOverflow {
                        table: t,
                        range: r as u32,
                    });
                };
                for binding in range.binding..end {
                    if used.contains(&binding) {
                        return Err(SignatureError::DuplicateBinding { table: t, binding });
                    }
                    used.push(binding);
                }
            }

            for (s, sampler) in self.samplers.iter().enumerate() {
                if sampler.table == t && used.contains(&sampler.binding) {
                    return Err(SignatureError::DuplicateBinding {
                        table: t,
                        binding: sampler.binding,
                    });
                }
                if sampler.table == t && !table.visibility.covers(sampler.visibility) {
                    return Err(SignatureError::SamplerVisibility { sampler: s as u32 });
                }
            }
        }

        for (s, sampler) in self.samplers.iter().enumerate() {
            if sampler.table >= self.table_count() {
                return Err(SignatureError::UnknownSamplerTable {
                    sampler: s as u32,
                    table: sampler.table,
                });
            }
            let duplicate = self.samplers[..s]
                .iter()
                .any(|o| o.table == sampler.table && o.binding == sampler.binding);
            if duplicate {
                return Err(SignatureError::DuplicateBinding {
                    table: sampler.table,
                    binding: sampler.binding,
                });
            }
        }

        Ok(())
    }

    /// Validates and encodes the description.
    ///
    /// The blob is the magic, a little-endian version, then the bitcode
    /// payload. Equal descriptions always produce identical bytes.
    pub fn serialize(&self) -> Result<SerializedSignature, SignatureError> {
        self.validate()?;

        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend(bitcode::encode(self));
        Ok(SerializedSignature(bytes))
    }
}

/// Reasons a signature fails to compile or decode.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature declares no tables")]
    NoTables,
    #[error("table {table} declares no ranges")]
    EmptyTable { table: u32 },
    #[error("range {range} of table {table} has zero descriptors")]
    EmptyRange { table: u32, range: u32 },
    #[error("binding {binding} declared twice in table {table}")]
    DuplicateBinding { table: u32, binding: u32 },
    #[error("static sampler {sampler} references unknown table {table}")]
    UnknownSamplerTable { sampler: u32, table: u32 },
    #[error("static sampler {sampler} is visible to stages its table is not")]
    SamplerVisibility { sampler: u32 },
    #[error("malformed signature blob: {0}")]
    Malformed(String),
    #[error("unsupported signature version {0}")]
    UnsupportedVersion(u32),
    #[error("table slot {slot} does not exist")]
    UnknownSlot { slot: u32 },
    #[error("table slot {slot} expects {expected:?}, got {actual:?}")]
    ResourceMismatch {
        slot: u32,
        expected: Vec<RangeKind>,
        actual: Vec<RangeKind>,
    },
    #[error("{0} not found in the resource arena")]
    MissingResource(&'static str),
    #[error("range {range} of table {table} runs past the last binding index")]
    RangeOverflow { table: u32, range: u32 },
    #[error("device rejected the signature objects: {0}")]
    Device(String),
}

impl SignatureError {
    /// Stable numeric reason code for diagnostics.
    pub fn code(&self) -> u32 {
        match self {
            SignatureError::NoTables => 1,
            SignatureError::EmptyTable { .. } => 2,
            SignatureError::EmptyRange { .. } => 3,
            SignatureError::DuplicateBinding { .. } => 4,
            SignatureError::UnknownSamplerTable { .. } => 5,
            SignatureError::SamplerVisibility { .. } => 6,
            SignatureError::Malformed(_) => 7,
            SignatureError::UnsupportedVersion(_) => 8,
            SignatureError::UnknownSlot { .. } => 9,
            SignatureError::ResourceMismatch { .. } => 10,
            SignatureError::MissingResource(_) => 11,
            SignatureError::RangeOverflow { .. } => 12,
            SignatureError::Device(_) => 13,
        }
    }
}

/// Encoded signature, as produced by [`BindSignatureDesc::serialize`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SerializedSignature(Vec<u8>);

impl SerializedSignature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decodes and re-validates the description.
    pub fn decode(&self) -> Result<BindSignatureDesc, SignatureError> {
        let bytes = self.0.as_slice();
        if bytes.len() < HEADER_LEN {
            return Err(SignatureError::Malformed("truncated header".into()));
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(SignatureError::Malformed("bad magic".into()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != VERSION {
            return Err(SignatureError::UnsupportedVersion(version));
        }

        let desc: BindSignatureDesc = bitcode::decode(&bytes[HEADER_LEN..])
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;
        desc.validate()?;
        Ok(desc)
    }
}

const MAGIC: &[u8] = b"FDSG";
const VERSION: u32 = 2;
const HEADER_LEN: usize = MAGIC.len() + 4;
