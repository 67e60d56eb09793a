pub mod import;
pub mod init;
pub mod optimize;
