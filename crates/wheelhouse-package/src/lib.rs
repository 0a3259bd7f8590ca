pub mod archive;
pub mod descriptor;
pub mod error;
pub mod filetype;
pub mod metadata;

pub use archive::read_descriptor;
pub use descriptor::Descriptor;
pub use error::{PackageError, Result};
pub use filetype::FileType;
pub use metadata::{
    is_multi_valued, MetadataResolver, MetadataVersion, PackageMetadata, UNKNOWN_LICENSE,
};
