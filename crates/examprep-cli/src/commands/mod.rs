pub mod init;
pub mod review;
pub mod take;
pub mod validate;
