pub mod checksum;
pub mod downloader;
pub mod progress;
pub mod provision;
pub mod registry;
pub mod retry;

pub use checksum::{DigestAlgorithm, ExpectedDigest};
pub use downloader::{HttpTransfer, Transfer};
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use provision::{
	inspect, LocalState, LocalStatus, OutcomeStatus, ProvisioningResult, Provisioner,
	TransferOutcome,
};
pub use registry::{AssetDescriptor, AssetRegistry, ProvisioningMode};
pub use retry::RetryPolicy;
