pub mod folder_loader;
pub mod toml_loader;

pub use folder_loader::load_upload_folder;
pub use toml_loader::{load_attachment_manifest, AttachmentManifest};
