pub mod curves;
pub mod info;
pub mod init;
pub mod pass;
