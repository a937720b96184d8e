pub mod config_cmd;
pub mod report_cmd;
