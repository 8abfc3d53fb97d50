//! Binding layout: which shader-visible resources a pipeline expects and where.
//!
//! A [`BindSignatureDesc`] is validated and serialized into a deterministic blob;
//! [`BindSignature::create`] turns the blob into GPU layout objects. Descriptor
//! tables are bind groups filled against one signature slot.

mod layout;
mod signature;

pub use layout::{
    build_signature, check_table_resources, create_table, layout_entries, BindSignature,
    DescriptorTable, SignatureHandle, TableResource,
};
pub use signature::{
    BindSignatureDesc, DescriptorRange, RangeKind, SamplerAddress, SamplerCompare, SamplerFilter,
    SerializedSignature, ShaderVisibility, SignatureError, StaticSampler, TableDesc, TEXTURE_SLOT,
    TRANSFORM_SLOT,
};
