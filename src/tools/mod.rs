//! 工具箱：configure_gemini_token / generate_image / edit_image /
//! get_configuration_status 与注册表

pub mod configure;
pub mod edit;
pub mod generate;
pub mod registry;
pub mod status;

pub use configure::ConfigureTokenTool;
pub use edit::EditImageTool;
pub use generate::GenerateImageTool;
pub use registry::{Tool, ToolRegistry};
pub use status::ConfigStatusTool;
