mod api_password;
mod api_url;
mod api_username;
mod hostname;
mod network_kind;
mod password_delivery;
pub(crate) mod serde_helpers;
mod storage_device_type;
mod storage_size;
mod storage_title;
mod tri_state;

pub use api_password::ApiPassword;
pub use api_url::{ApiUrl, DEFAULT_API_URL};
pub use api_username::ApiUsername;
pub use hostname::Hostname;
pub use network_kind::{InterfaceType, IpAddressFamily};
pub use password_delivery::PasswordDelivery;
pub use storage_device_type::StorageDeviceType;
pub use storage_size::StorageSize;
pub use storage_title::StorageTitle;
pub use tri_state::TriState;

// Re-export validation functions for internal use
pub(crate) use hostname::validate_hostname;
pub(crate) use storage_size::validate_storage_size;
pub(crate) use storage_title::validate_storage_title;
