pub mod settings;

pub use settings::{
    default_config_dir, default_data_dir, AuditSettings, PolicySettings, Settings,
};
