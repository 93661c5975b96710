pub mod file_state;
pub mod loaders;
pub mod processor;
pub mod status;

pub use file_state::{AttachmentRef, FileLifecycleState, UploadFile};
pub use loaders::{load_attachment_manifest, load_upload_folder, AttachmentManifest};
pub use processor::{
    DocumentRef, ProcessingStatus, ProcessingSubmission, ProcessorResult, ProcessorState,
    ANTIVIRUS_PROCESSOR_ID, QUARANTINE_MESSAGE,
};
pub use status::FileStatus;
